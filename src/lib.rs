pub mod entry;
pub mod errors;
pub mod io;
pub mod options;
pub mod processing;
pub mod profiles;
pub mod utils;

mod python_bind;

pub use entry::{run_and_install, run_consensus_analysis, run_population_comparison};
pub use errors::MorphError;
pub use io::outline::{Landmark, Outline, OutlinePoint, Population, ProfileKind, REFERENCE_LANDMARK};
pub use options::{AnalysisOptions, ConsensusStrategy};
pub use processing::refine::{RefineLog, StochasticRefiner};
pub use profiles::aggregate::{PopulationProfile, ProfileAggregator};
pub use profiles::profile::{wrap_index, ContourProfile};
pub use profiles::segment::{ProfileSegment, SegmentSet};

use pyo3::prelude::*;

/// This is the module importable from Python:
///
/// ```python
/// import nucleomorph as nm
/// consensus, report = nm.build_consensus(members, strategy="averaging")
/// ```
#[pymodule]
fn nucleomorph(_py: Python, m: pyo3::prelude::Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    python_bind::register(&m)?;
    Ok(())
}
