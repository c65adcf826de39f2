pub mod aggregate;
pub mod profile;
pub mod segment;

pub use aggregate::{PopulationProfile, ProfileAggregator};
pub use profile::{wrap_index, ContourProfile};
pub use segment::{ProfileSegment, SegmentSet};
