use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::Sender;
use rayon::prelude::*;

use crate::errors::MorphError;
use crate::io::outline::{Landmark, Population, ProfileKind, REFERENCE_LANDMARK};
use crate::options::AnalysisOptions;
use crate::profiles::profile::ContourProfile;
use crate::profiles::segment::SegmentSet;
use crate::utils::progress::{report, ProgressEvent};

/// Rank-order quartile: the value at `round(n * percentile / 100)` of the
/// sorted values.
pub fn rank_quartile(values: &[f64], percentile: f64) -> Result<f64, MorphError> {
    if values.is_empty() {
        return Err(MorphError::MissingData(
            "cannot take a quartile of no values".to_string(),
        ));
    }
    if values.len() == 1 {
        return Ok(values[0]);
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (sorted.len() as f64 * percentile / 100.0).round() as usize;
    Ok(sorted[rank.min(sorted.len() - 1)])
}

pub const LOWER_QUARTILE: f64 = 25.0;
pub const MEDIAN: f64 = 50.0;
pub const UPPER_QUARTILE: f64 = 75.0;

/// Collects one reference-aligned profile per population member, resampled
/// to a canonical length, and reduces them to per-position statistics.
pub struct ProfileAggregator {
    canonical_len: usize,
    rows: Vec<Vec<f64>>,
    landmark_fractions: Vec<Vec<(String, f64)>>,
}

impl ProfileAggregator {
    pub fn new(canonical_len: usize) -> Result<Self, MorphError> {
        if canonical_len == 0 {
            return Err(MorphError::EmptyProfile);
        }
        Ok(Self {
            canonical_len,
            rows: Vec::new(),
            landmark_fractions: Vec::new(),
        })
    }

    pub fn canonical_len(&self) -> usize {
        self.canonical_len
    }

    pub fn member_count(&self) -> usize {
        self.rows.len()
    }

    /// Adds one member: its profile rotated so the reference landmark sits at
    /// index 0, then sampled at the canonical positions. Landmarks are
    /// recorded as fractions of the perimeter relative to the reference.
    pub fn add_member(
        &mut self,
        profile: &ContourProfile,
        reference_index: usize,
        landmarks: &[Landmark],
    ) -> Result<(), MorphError> {
        let row = resample_row(profile, reference_index, self.canonical_len)?;
        let n = profile.len() as f64;
        let fractions = landmarks
            .iter()
            .filter(|l| l.name != REFERENCE_LANDMARK)
            .map(|l| {
                let offset = crate::profiles::profile::wrap_index(
                    l.index as isize - reference_index as isize,
                    profile.len(),
                );
                (l.name.clone(), offset as f64 / n)
            })
            .collect();
        self.rows.push(row);
        self.landmark_fractions.push(fractions);
        Ok(())
    }

    /// Reduces the collected rows to a population profile.
    ///
    /// Emits one progress event per canonical position and honours the
    /// cancellation flag at the same boundaries.
    pub fn build(
        &self,
        segments: Option<&SegmentSet>,
        progress: Option<&Sender<ProgressEvent>>,
        cancel: &AtomicBool,
    ) -> Result<PopulationProfile, MorphError> {
        if self.rows.is_empty() {
            return Err(MorphError::EmptyPopulation);
        }

        let l = self.canonical_len;
        let mut median = Vec::with_capacity(l);
        let mut lower = Vec::with_capacity(l);
        let mut upper = Vec::with_capacity(l);
        let mut column = vec![0.0; self.rows.len()];

        for i in 0..l {
            if cancel.load(Ordering::Relaxed) {
                return Err(MorphError::Cancelled);
            }
            for (j, row) in self.rows.iter().enumerate() {
                column[j] = row[i];
            }
            median.push(rank_quartile(&column, MEDIAN)?);
            lower.push(rank_quartile(&column, LOWER_QUARTILE)?);
            upper.push(rank_quartile(&column, UPPER_QUARTILE)?);
            report(progress, "aggregate", i + 1, l);
        }

        let mut landmarks = vec![Landmark {
            name: REFERENCE_LANDMARK.to_string(),
            index: 0,
        }];
        for name in self.shared_landmark_names() {
            let fractions: Vec<f64> = self
                .landmark_fractions
                .iter()
                .filter_map(|m| {
                    m.iter()
                        .find(|(n, _)| *n == name)
                        .map(|(_, f)| *f)
                })
                .collect();
            let fraction = rank_quartile(&fractions, MEDIAN)?;
            landmarks.push(Landmark {
                name,
                index: ((fraction * l as f64).round() as usize) % l,
            });
        }

        let segments = match segments {
            Some(s) => Some(s.scale_to(l)?),
            None => None,
        };

        Ok(PopulationProfile {
            median: ContourProfile::new(median)?,
            lower: ContourProfile::new(lower)?,
            upper: ContourProfile::new(upper)?,
            landmarks,
            segments,
        })
    }

    fn shared_landmark_names(&self) -> Vec<String> {
        let Some(first) = self.landmark_fractions.first() else {
            return Vec::new();
        };
        first
            .iter()
            .filter(|(name, _)| {
                self.landmark_fractions
                    .iter()
                    .all(|m| m.iter().any(|(n, _)| n == name))
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

fn resample_row(
    profile: &ContourProfile,
    reference_index: usize,
    canonical_len: usize,
) -> Result<Vec<f64>, MorphError> {
    let rotated = profile.rotate(reference_index);
    (0..canonical_len)
        .map(|i| rotated.value_at(i as f64 / canonical_len as f64))
        .collect()
}

/// Per-position statistics over a population, at a fixed canonical length,
/// zeroed on the reference landmark.
#[derive(Debug, Clone)]
pub struct PopulationProfile {
    median: ContourProfile,
    lower: ContourProfile,
    upper: ContourProfile,
    landmarks: Vec<Landmark>,
    segments: Option<SegmentSet>,
}

impl PopulationProfile {
    /// Builds the population profile for one profile kind.
    ///
    /// Members that cannot produce a profile are skipped with a warning;
    /// the population must keep at least one valid member.
    pub fn from_population(
        population: &Population,
        kind: ProfileKind,
        options: &AnalysisOptions,
        progress: Option<&Sender<ProgressEvent>>,
        cancel: &AtomicBool,
    ) -> Result<Self, MorphError> {
        let rows: Vec<_> = population
            .members
            .par_iter()
            .map(|member| {
                let profile = member.profile(kind, options.profile_window_proportion)?;
                let reference = member.reference_landmark_index()?;
                Ok::<_, MorphError>((profile, reference, member.landmarks.clone()))
            })
            .collect();

        let mut aggregator = ProfileAggregator::new(options.canonical_profile_length)?;
        for row in rows {
            match row {
                Ok((profile, reference, landmarks)) => {
                    aggregator.add_member(&profile, reference, &landmarks)?;
                }
                Err(e) => {
                    println!("Skipping population member during aggregation: {}", e);
                }
            }
        }

        aggregator.build(population.segments.as_ref(), progress, cancel)
    }

    pub fn len(&self) -> usize {
        self.median.len()
    }

    pub fn median(&self) -> &ContourProfile {
        &self.median
    }

    pub fn lower_quartile(&self) -> &ContourProfile {
        &self.lower
    }

    pub fn upper_quartile(&self) -> &ContourProfile {
        &self.upper
    }

    /// Interquartile spread at each position.
    pub fn spread(&self) -> Result<ContourProfile, MorphError> {
        let values = self
            .upper
            .values()
            .iter()
            .zip(self.lower.values())
            .map(|(u, l)| u - l)
            .collect();
        ContourProfile::new(values)
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn landmark_index(&self, name: &str) -> Result<usize, MorphError> {
        self.landmarks
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.index)
            .ok_or_else(|| {
                MorphError::MissingData(format!("population profile has no landmark {}", name))
            })
    }

    /// The median profile re-zeroed on the requested landmark.
    pub fn median_relative_to(&self, landmark: &str) -> Result<ContourProfile, MorphError> {
        Ok(self.median.rotate(self.landmark_index(landmark)?))
    }

    /// The shared segment layout re-expressed relative to the requested
    /// landmark.
    pub fn segments_relative_to(&self, landmark: &str) -> Result<SegmentSet, MorphError> {
        let segments = self.segments.as_ref().ok_or_else(|| {
            MorphError::MissingData("population has no shared segment layout".to_string())
        })?;
        segments.relative_to(self.landmark_index(landmark)?)
    }

    pub fn has_segments(&self) -> bool {
        self.segments.is_some()
    }
}

#[cfg(test)]
mod aggregate_tests {
    use super::*;
    use crate::utils::test_utils::{circle_population, regular_polygon_outline};
    use approx::assert_relative_eq;

    #[test]
    fn test_rank_quartile_rule() {
        let values = vec![3.0, 1.0, 2.0];
        // sorted: 1 2 3; rank(3 * 50 / 100) = 2
        assert_relative_eq!(rank_quartile(&values, MEDIAN).unwrap(), 3.0);
        assert_relative_eq!(rank_quartile(&values, LOWER_QUARTILE).unwrap(), 2.0);
        assert_relative_eq!(rank_quartile(&[5.0], MEDIAN).unwrap(), 5.0);
    }

    #[test]
    fn test_single_member_population_reproduces_profile() {
        let member = regular_polygon_outline(0, 100, 3.0, 1.0);
        let options = AnalysisOptions::default();
        let pop = Population::new(vec![member.clone()], "single").unwrap();
        let cancel = AtomicBool::new(false);

        let agg = PopulationProfile::from_population(
            &pop,
            ProfileKind::Radius,
            &options,
            None,
            &cancel,
        )
        .unwrap();

        let expected = member
            .profile(ProfileKind::Radius, options.profile_window_proportion)
            .unwrap()
            .interpolate(options.canonical_profile_length)
            .unwrap();
        assert_eq!(agg.len(), options.canonical_profile_length);
        for (a, b) in agg.median().values().iter().zip(expected.values()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_circle_population_has_constant_profile_and_no_spread() {
        let pop = circle_population(3, 100, 2.0);
        let options = AnalysisOptions::default();
        let cancel = AtomicBool::new(false);

        let agg =
            PopulationProfile::from_population(&pop, ProfileKind::Angle, &options, None, &cancel)
                .unwrap();

        let first = agg.median().get(0);
        for v in agg.median().values() {
            assert_relative_eq!(*v, first, epsilon = 1e-6);
        }
        for v in agg.spread().unwrap().values() {
            assert_relative_eq!(*v, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_median_lies_within_member_bounds() {
        let mut small = regular_polygon_outline(0, 80, 2.0, 1.0);
        let mut large = regular_polygon_outline(1, 120, 4.0, 1.0);
        small.set_landmark(crate::io::outline::REFERENCE_LANDMARK, 0);
        large.set_landmark(crate::io::outline::REFERENCE_LANDMARK, 0);
        let options = AnalysisOptions::default();
        let cancel = AtomicBool::new(false);
        let pop = Population::new(vec![small.clone(), large.clone()], "bounds").unwrap();

        let agg =
            PopulationProfile::from_population(&pop, ProfileKind::Radius, &options, None, &cancel)
                .unwrap();

        for v in agg.median().values() {
            assert!(*v >= 2.0 - 1e-9 && *v <= 4.0 + 1e-9);
        }
    }

    #[test]
    fn test_cancellation_aborts_aggregation() {
        let pop = circle_population(2, 50, 1.0);
        let options = AnalysisOptions::default();
        let cancel = AtomicBool::new(true);
        let result =
            PopulationProfile::from_population(&pop, ProfileKind::Angle, &options, None, &cancel);
        assert!(matches!(result, Err(MorphError::Cancelled)));
    }

    #[test]
    fn test_landmark_positions_are_aggregated() {
        let mut a = regular_polygon_outline(0, 100, 2.0, 1.0);
        let mut b = regular_polygon_outline(1, 100, 2.0, 1.0);
        a.set_landmark("tip", 25);
        b.set_landmark("tip", 25);
        let pop = Population::new(vec![a, b], "landmarks").unwrap();
        let options = AnalysisOptions::default();
        let cancel = AtomicBool::new(false);

        let agg =
            PopulationProfile::from_population(&pop, ProfileKind::Angle, &options, None, &cancel)
                .unwrap();

        // a quarter of the way around, scaled to the canonical length
        assert_eq!(agg.landmark_index("tip").unwrap(), 250);
        assert_eq!(agg.landmark_index(REFERENCE_LANDMARK).unwrap(), 0);
    }
}
