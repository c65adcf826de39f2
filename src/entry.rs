use std::sync::atomic::AtomicBool;

use anyhow::{anyhow, Context, Result};
use crossbeam::channel::Sender;
use crossbeam::thread;

use crate::io::outline::{Outline, Population, ProfileKind};
use crate::options::AnalysisOptions;
use crate::processing::consensus::build_consensus;
use crate::processing::propagate::propagate_landmarks_and_segments;
use crate::processing::refine::{RefineLog, StochasticRefiner};
use crate::profiles::aggregate::PopulationProfile;
use crate::utils::progress::ProgressEvent;

/// Runs the full consensus pipeline for one population: aggregate the
/// member profiles, build a candidate shape, transfer landmarks and
/// segments onto it, and optionally refine it against the median profile.
///
/// The population is only read; the finished shape is returned for the
/// caller to install. Cancellation at any iteration boundary aborts the
/// run and leaves any previously installed consensus untouched.
pub fn run_consensus_analysis(
    population: &Population,
    options: &AnalysisOptions,
    progress: Option<&Sender<ProgressEvent>>,
    cancel: &AtomicBool,
) -> Result<(Outline, Vec<RefineLog>)> {
    options.validate()?;

    let population_profile =
        PopulationProfile::from_population(population, ProfileKind::Angle, options, progress, cancel)
            .with_context(|| format!("aggregating profiles of {}", population.label))?;

    let candidate = build_consensus(population, &population_profile, options)
        .with_context(|| format!("building consensus shape for {}", population.label))?;

    let propagated = propagate_landmarks_and_segments(&candidate, &population_profile, options)
        .with_context(|| format!("propagating landmarks onto consensus of {}", population.label))?;

    // a single member already matches its own median exactly
    if options.refine && population.members.len() > 1 {
        let mut refiner = StochasticRefiner::new(options);
        let (refined, logs) = refiner
            .refine(&propagated, population_profile.median(), progress, cancel)
            .with_context(|| format!("refining consensus of {}", population.label))?;
        return Ok((refined, logs));
    }

    Ok((propagated, Vec::new()))
}

/// Like [`run_consensus_analysis`], but installs the finished shape into the
/// population as a single wholesale replace. On any failure the population
/// keeps its previous consensus.
pub fn run_and_install(
    population: &mut Population,
    options: &AnalysisOptions,
    progress: Option<&Sender<ProgressEvent>>,
    cancel: &AtomicBool,
) -> Result<Vec<RefineLog>> {
    let (consensus, logs) = run_consensus_analysis(population, options, progress, cancel)?;
    population.set_consensus(consensus);
    Ok(logs)
}

/// Runs two populations side by side on scoped worker threads, as used when
/// comparing a control group against a treatment group.
pub fn run_population_comparison(
    population_a: &Population,
    population_b: &Population,
    options: &AnalysisOptions,
    progress: Option<Sender<ProgressEvent>>,
    cancel: &AtomicBool,
) -> Result<((Outline, Vec<RefineLog>), (Outline, Vec<RefineLog>))> {
    let progress_a = progress.clone();
    let progress_b = progress;

    let result = thread::scope(|s| -> Result<_> {
        let handle_a = s.spawn(|_| {
            run_consensus_analysis(population_a, options, progress_a.as_ref(), cancel)
                .with_context(|| format!("consensus analysis of {} failed", population_a.label))
        });

        let handle_b = s.spawn(|_| {
            run_consensus_analysis(population_b, options, progress_b.as_ref(), cancel)
                .with_context(|| format!("consensus analysis of {} failed", population_b.label))
        });

        let consensus_a = handle_a
            .join()
            .map_err(|_| anyhow!("worker thread for {} panicked", population_a.label))??;
        let consensus_b = handle_b
            .join()
            .map_err(|_| anyhow!("worker thread for {} panicked", population_b.label))??;

        Ok((consensus_a, consensus_b))
    })
    .map_err(|_| anyhow!("comparison scope panicked"))?;

    result
}
