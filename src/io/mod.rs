pub mod input;
pub mod outline;

pub use outline::{Landmark, Outline, OutlinePoint, Population, ProfileKind, REFERENCE_LANDMARK};
