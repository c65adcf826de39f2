use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::Sender;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::errors::MorphError;
use crate::io::outline::{Outline, ProfileKind};
use crate::options::AnalysisOptions;
use crate::processing::process_utils::median_point_spacing;
use crate::profiles::profile::{wrap_index, ContourProfile};
use crate::utils::progress::{report, ProgressEvent};

/// Outcome of one refinement iteration.
#[derive(Debug, Clone, Serialize)]
pub struct RefineLog {
    pub iteration: usize,
    pub score: f64,
    pub accepted_points: usize,
}

/// Nudges the border points of a candidate shape until its profile matches a
/// target profile more closely.
///
/// Each border point in turn receives a random perturbation, rejected
/// outright when it would leave the habitable zone around its neighbours,
/// and otherwise kept only when the profile distance to the target drops.
/// The candidate is replaced by a fresh snapshot on every accepted move, so
/// a rejected proposal can never leak into later trials.
pub struct StochasticRefiner {
    max_iterations: usize,
    min_factor: f64,
    max_factor: f64,
    window_proportion: f64,
    rng: StdRng,
}

impl StochasticRefiner {
    /// Refiner with the generator seeded from the options, or from the
    /// operating system when no seed is set.
    pub fn new(options: &AnalysisOptions) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(options, rng)
    }

    /// Refiner with an explicit generator, for repeatable runs.
    pub fn with_rng(options: &AnalysisOptions, rng: StdRng) -> Self {
        Self {
            max_iterations: options.max_refiner_iterations,
            min_factor: options.min_neighbor_distance_factor,
            max_factor: options.max_neighbor_distance_factor,
            window_proportion: options.profile_window_proportion,
            rng,
        }
    }

    /// Runs up to the iteration cap, stopping early when an iteration
    /// accepts nothing or the cancellation flag is raised.
    ///
    /// The returned score never exceeds the starting score.
    pub fn refine(
        &mut self,
        outline: &Outline,
        target: &ContourProfile,
        progress: Option<&Sender<ProgressEvent>>,
        cancel: &AtomicBool,
    ) -> Result<(Outline, Vec<RefineLog>), MorphError> {
        let mut candidate = outline.clone();
        let mut score = self.profile_of(&candidate)?.squared_difference(target);
        let mut logs = Vec::with_capacity(self.max_iterations);

        for iteration in 0..self.max_iterations {
            if cancel.load(Ordering::Relaxed) {
                return Err(MorphError::Cancelled);
            }

            let spacing = median_point_spacing(&candidate)?;
            let min_distance = spacing * self.min_factor;
            let max_distance = spacing * self.max_factor;

            let mut accepted = 0;
            for index in 0..candidate.border_len() {
                // larger moves while far from the target, finer ones as the
                // score converges
                let magnitude = (score / 1000.0).min(1.0);
                let dx = magnitude * (self.rng.random::<f64>() - 0.5);
                let dy = magnitude * (self.rng.random::<f64>() - 0.5);

                let old = candidate.points[index];
                let proposal_x = old.x + dx;
                let proposal_y = old.y + dy;

                if !self.neighbours_in_zone(
                    &candidate,
                    index,
                    proposal_x,
                    proposal_y,
                    min_distance,
                    max_distance,
                ) {
                    continue;
                }

                let proposal = candidate.with_point(index, proposal_x, proposal_y);
                let proposal_score = self.profile_of(&proposal)?.squared_difference(target);
                if proposal_score < score {
                    candidate = proposal;
                    score = proposal_score;
                    accepted += 1;
                }
            }

            logs.push(RefineLog {
                iteration,
                score,
                accepted_points: accepted,
            });
            report(progress, "refine", iteration + 1, self.max_iterations);

            if accepted == 0 {
                break;
            }
        }

        Ok((candidate, logs))
    }

    fn profile_of(&self, outline: &Outline) -> Result<ContourProfile, MorphError> {
        let profile = outline.profile(ProfileKind::Angle, self.window_proportion)?;
        Ok(profile.rotate(outline.reference_landmark_index()?))
    }

    fn neighbours_in_zone(
        &self,
        outline: &Outline,
        index: usize,
        x: f64,
        y: f64,
        min_distance: f64,
        max_distance: f64,
    ) -> bool {
        let n = outline.border_len();
        for neighbour_index in [
            wrap_index(index as isize + 1, n),
            wrap_index(index as isize - 1, n),
        ] {
            let neighbour = &outline.points[neighbour_index];
            let dx = x - neighbour.x;
            let dy = y - neighbour.y;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance < min_distance || distance > max_distance {
                return false;
            }
        }
        true
    }
}
