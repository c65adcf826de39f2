pub mod consensus;
pub mod process_utils;
pub mod propagate;
pub mod refine;

pub use consensus::build_consensus;
pub use propagate::propagate_landmarks_and_segments;
pub use refine::{RefineLog, StochasticRefiner};
