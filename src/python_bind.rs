use std::sync::atomic::AtomicBool;

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::entry::run_consensus_analysis;
use crate::io::input::load_population;
use crate::io::outline::{Landmark, Outline, OutlinePoint, Population, ProfileKind};
use crate::options::{AnalysisOptions, ConsensusStrategy};
use crate::profiles::aggregate::PopulationProfile;

/// Python representation of a single border point.
///
/// Attributes:
///     point_index (int): Index within the outline
///     x (float): X-coordinate in pixels
///     y (float): Y-coordinate in pixels
#[pyclass]
#[derive(Debug, Clone)]
pub struct PyOutlinePoint {
    #[pyo3(get, set)]
    pub point_index: u32,
    #[pyo3(get, set)]
    pub x: f64,
    #[pyo3(get, set)]
    pub y: f64,
}

#[pymethods]
impl PyOutlinePoint {
    #[new]
    fn new(point_index: u32, x: f64, y: f64) -> Self {
        Self { point_index, x, y }
    }

    fn __repr__(&self) -> String {
        format!(
            "OutlinePoint(pt_id={}, x={:.2}, y={:.2})",
            self.point_index, self.x, self.y
        )
    }

    /// Euclidean distance to another PyOutlinePoint
    pub fn distance(&self, other: &PyOutlinePoint) -> f64 {
        let p1 = OutlinePoint::from(self);
        let p2 = OutlinePoint::from(other);
        p1.distance_to(&p2)
    }
}

impl From<&PyOutlinePoint> for OutlinePoint {
    fn from(p: &PyOutlinePoint) -> Self {
        OutlinePoint {
            point_index: p.point_index,
            x: p.x,
            y: p.y,
        }
    }
}

impl From<&OutlinePoint> for PyOutlinePoint {
    fn from(p: &OutlinePoint) -> Self {
        PyOutlinePoint {
            point_index: p.point_index,
            x: p.x,
            y: p.y,
        }
    }
}

/// Python representation of a closed outline.
///
/// Attributes:
///     id (int): Cell identifier
///     points (list[PyOutlinePoint]): Border points, ordered
///     scale (float): Pixels per micron of the source image
///     landmarks (list[tuple[str, int]]): Named border indices; the
///         landmark named "reference" anchors all alignment
#[pyclass]
#[derive(Debug, Clone)]
pub struct PyOutline {
    #[pyo3(get, set)]
    pub id: u32,
    #[pyo3(get, set)]
    pub points: Vec<PyOutlinePoint>,
    #[pyo3(get, set)]
    pub scale: f64,
    #[pyo3(get, set)]
    pub landmarks: Vec<(String, usize)>,
}

#[pymethods]
impl PyOutline {
    #[new]
    #[pyo3(signature = (id, points, scale, landmarks = Vec::new()))]
    fn new(
        id: u32,
        points: Vec<PyOutlinePoint>,
        scale: f64,
        landmarks: Vec<(String, usize)>,
    ) -> Self {
        Self {
            id,
            points,
            scale,
            landmarks,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Outline(id={}, n_points={}, scale={:.3}, landmarks={})",
            self.id,
            self.points.len(),
            self.scale,
            self.landmarks.len()
        )
    }
}

impl From<&Outline> for PyOutline {
    fn from(o: &Outline) -> Self {
        PyOutline {
            id: o.id,
            points: o.points.iter().map(PyOutlinePoint::from).collect(),
            scale: o.scale,
            landmarks: o
                .landmarks
                .iter()
                .map(|l| (l.name.clone(), l.index))
                .collect(),
        }
    }
}

impl TryFrom<&PyOutline> for Outline {
    type Error = PyErr;

    fn try_from(o: &PyOutline) -> Result<Self, PyErr> {
        let points = o.points.iter().map(OutlinePoint::from).collect();
        let mut outline =
            Outline::new(o.id, points, o.scale).map_err(|e| PyValueError::new_err(e.to_string()))?;
        for (name, index) in &o.landmarks {
            outline.set_landmark(name, *index);
        }
        Ok(outline)
    }
}

/// Per-position statistics of a population, zeroed on the reference
/// landmark.
#[pyclass]
#[derive(Debug, Clone)]
pub struct PyPopulationProfile {
    #[pyo3(get)]
    pub median: Vec<f64>,
    #[pyo3(get)]
    pub lower_quartile: Vec<f64>,
    #[pyo3(get)]
    pub upper_quartile: Vec<f64>,
    #[pyo3(get)]
    pub landmarks: Vec<(String, usize)>,
}

impl From<&PopulationProfile> for PyPopulationProfile {
    fn from(p: &PopulationProfile) -> Self {
        PyPopulationProfile {
            median: p.median().values().to_vec(),
            lower_quartile: p.lower_quartile().values().to_vec(),
            upper_quartile: p.upper_quartile().values().to_vec(),
            landmarks: p
                .landmarks()
                .iter()
                .map(|l: &Landmark| (l.name.clone(), l.index))
                .collect(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn options_from_args(
    canonical_profile_length: usize,
    max_refiner_iterations: usize,
    min_neighbor_distance_factor: f64,
    max_neighbor_distance_factor: f64,
    strategy: &str,
    profile_window_proportion: f64,
    refine: bool,
    seed: Option<u64>,
) -> PyResult<AnalysisOptions> {
    let consensus_strategy = match strategy {
        "averaging" => ConsensusStrategy::Averaging,
        "similarity" => ConsensusStrategy::Similarity,
        other => {
            return Err(PyValueError::new_err(format!(
                "unknown consensus strategy {:?}, expected \"averaging\" or \"similarity\"",
                other
            )))
        }
    };
    let options = AnalysisOptions {
        canonical_profile_length,
        max_refiner_iterations,
        min_neighbor_distance_factor,
        max_neighbor_distance_factor,
        consensus_strategy,
        profile_window_proportion,
        refine,
        seed,
    };
    options
        .validate()
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(options)
}

fn population_from_members(members: Vec<PyOutline>, label: &str) -> PyResult<Population> {
    let outlines = members
        .iter()
        .map(Outline::try_from)
        .collect::<PyResult<Vec<_>>>()?;
    Population::new(outlines, label).map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Builds a consensus shape for a population of outlines.
///
/// Returns the consensus outline and a JSON report of the refinement
/// iterations (an empty list when refinement is disabled).
///
/// Example:
///     >>> import nucleomorph as nm
///     >>> consensus, report = nm.build_consensus(members, refine=True, seed=1)
#[pyfunction]
#[pyo3(signature = (
    members,
    label = "population",
    canonical_profile_length = 1000usize,
    max_refiner_iterations = 50usize,
    min_neighbor_distance_factor = 0.5f64,
    max_neighbor_distance_factor = 1.2f64,
    strategy = "averaging",
    profile_window_proportion = 0.05f64,
    refine = false,
    seed = None
))]
#[allow(clippy::too_many_arguments)]
fn build_consensus(
    members: Vec<PyOutline>,
    label: &str,
    canonical_profile_length: usize,
    max_refiner_iterations: usize,
    min_neighbor_distance_factor: f64,
    max_neighbor_distance_factor: f64,
    strategy: &str,
    profile_window_proportion: f64,
    refine: bool,
    seed: Option<u64>,
) -> PyResult<(PyOutline, String)> {
    let options = options_from_args(
        canonical_profile_length,
        max_refiner_iterations,
        min_neighbor_distance_factor,
        max_neighbor_distance_factor,
        strategy,
        profile_window_proportion,
        refine,
        seed,
    )?;
    let population = population_from_members(members, label)?;
    let cancel = AtomicBool::new(false);

    let (consensus, logs) = run_consensus_analysis(&population, &options, None, &cancel)
        .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
    let report =
        serde_json::to_string(&logs).map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
    Ok((PyOutline::from(&consensus), report))
}

/// Aggregates a population into its per-position median and quartile
/// profiles.
#[pyfunction]
#[pyo3(signature = (
    members,
    canonical_profile_length = 1000usize,
    profile_window_proportion = 0.05f64
))]
fn population_profile(
    members: Vec<PyOutline>,
    canonical_profile_length: usize,
    profile_window_proportion: f64,
) -> PyResult<PyPopulationProfile> {
    let options = AnalysisOptions {
        canonical_profile_length,
        profile_window_proportion,
        ..AnalysisOptions::default()
    };
    options
        .validate()
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    let population = population_from_members(members, "population")?;
    let cancel = AtomicBool::new(false);

    let profile = PopulationProfile::from_population(
        &population,
        ProfileKind::Angle,
        &options,
        None,
        &cancel,
    )
    .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
    Ok(PyPopulationProfile::from(&profile))
}

/// Loads outlines from `outlines.csv` and `reference_points.csv` in the
/// given directory and builds a consensus shape for them.
#[pyfunction]
#[pyo3(signature = (
    input_dir,
    label = "population",
    pixels_per_micron = 1.0f64,
    strategy = "averaging",
    refine = false,
    seed = None
))]
fn consensus_from_csv(
    input_dir: &str,
    label: &str,
    pixels_per_micron: f64,
    strategy: &str,
    refine: bool,
    seed: Option<u64>,
) -> PyResult<(PyOutline, String)> {
    let defaults = AnalysisOptions::default();
    let options = options_from_args(
        defaults.canonical_profile_length,
        defaults.max_refiner_iterations,
        defaults.min_neighbor_distance_factor,
        defaults.max_neighbor_distance_factor,
        strategy,
        defaults.profile_window_proportion,
        refine,
        seed,
    )?;
    let population = load_population(input_dir, label, pixels_per_micron)
        .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
    let cancel = AtomicBool::new(false);

    let (consensus, logs) = run_consensus_analysis(&population, &options, None, &cancel)
        .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
    let report =
        serde_json::to_string(&logs).map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
    Ok((PyOutline::from(&consensus), report))
}

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(build_consensus, m)?)?;
    m.add_function(wrap_pyfunction!(population_profile, m)?)?;
    m.add_function(wrap_pyfunction!(consensus_from_csv, m)?)?;
    m.add_class::<PyOutlinePoint>()?;
    m.add_class::<PyOutline>()?;
    m.add_class::<PyPopulationProfile>()?;
    Ok(())
}
