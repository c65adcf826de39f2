use rayon::prelude::*;

use crate::errors::MorphError;
use crate::io::outline::{Outline, OutlinePoint, Population, ProfileKind};
use crate::options::{AnalysisOptions, ConsensusStrategy};
use crate::processing::process_utils::{coordinate_median, orient_vertical};
use crate::profiles::aggregate::PopulationProfile;

/// Builds a representative shape for the population using the configured
/// strategy. The returned outline is centred on the origin and oriented to
/// the reference landmark; the caller installs it.
pub fn build_consensus(
    population: &Population,
    population_profile: &PopulationProfile,
    options: &AnalysisOptions,
) -> Result<Outline, MorphError> {
    match options.consensus_strategy {
        ConsensusStrategy::Averaging => average_consensus(population, options),
        ConsensusStrategy::Similarity => {
            most_similar_member(population, population_profile, options)
        }
    }
}

/// One member's contribution to the averaged border: its point at each of
/// the canonical perimeter fractions, in micron units, after vertical
/// orientation and centring.
fn member_perimeter_points(
    member: &Outline,
    canonical_len: usize,
) -> Result<Vec<(f64, f64)>, MorphError> {
    let mut oriented = orient_vertical(member);
    oriented.move_centre_of_mass_to(0.0, 0.0);

    let reference = oriented.reference_landmark_index()?;
    let n = oriented.border_len();

    let mut points = Vec::with_capacity(canonical_len);
    for i in 0..canonical_len {
        let fraction = i as f64 / canonical_len as f64;
        let index_in_profile = (n as f64 * fraction) as usize;
        let border_index = oriented.index_relative_to(reference, index_in_profile);
        let p = &oriented.points[border_index];
        points.push((p.x / member.scale, p.y / member.scale));
    }
    Ok(points)
}

/// Averaging strategy: the border passes through the coordinate-wise median
/// position of all members at each of the canonical perimeter fractions.
///
/// Members that cannot contribute are skipped with a warning; at least one
/// member must survive.
fn average_consensus(
    population: &Population,
    options: &AnalysisOptions,
) -> Result<Outline, MorphError> {
    let canonical_len = options.canonical_profile_length;
    let scale = population.choose_pixel_micron_scale();

    let member_rows: Vec<_> = population
        .members
        .par_iter()
        .map(|m| member_perimeter_points(m, canonical_len))
        .collect();

    let mut rows = Vec::with_capacity(member_rows.len());
    for (member, row) in population.members.iter().zip(member_rows) {
        match row {
            Ok(points) => rows.push(points),
            Err(e) => println!(
                "Skipping outline {} during consensus averaging: {}",
                member.id, e
            ),
        }
    }
    if rows.is_empty() {
        return Err(MorphError::EmptyPopulation);
    }

    // Coordinate-wise median at each canonical position, dropping repeats of
    // the previous point. Repeats occur when the canonical length is large
    // relative to a member's raw point count and would create zero-length
    // border edges.
    let mut averaged: Vec<(f64, f64)> = Vec::with_capacity(canonical_len);
    let mut column = Vec::with_capacity(rows.len());
    for i in 0..canonical_len {
        column.clear();
        column.extend(rows.iter().map(|row| row[i]));
        let median = coordinate_median(&column)?;
        if averaged.last() != Some(&median) {
            averaged.push(median);
        }
    }

    let points = averaged
        .iter()
        .enumerate()
        .map(|(i, (x, y))| OutlinePoint {
            point_index: i as u32,
            x: x * scale,
            y: y * scale,
        })
        .collect();

    Outline::new(0, points, scale)
}

/// Similarity strategy: duplicate the real member whose reference-aligned
/// profile is closest to the population median. Any member failure is fatal
/// here; there is no safe partial result.
fn most_similar_member(
    population: &Population,
    population_profile: &PopulationProfile,
    options: &AnalysisOptions,
) -> Result<Outline, MorphError> {
    if population.members.len() == 1 {
        return Ok(population.members[0].duplicate_as_consensus());
    }

    let canonical_len = options.canonical_profile_length;
    let median = population_profile.median();

    let mut best: Option<(usize, f64)> = None;
    for (i, member) in population.members.iter().enumerate() {
        let profile = member
            .profile(ProfileKind::Angle, options.profile_window_proportion)?
            .rotate(member.reference_landmark_index()?);
        let difference = profile.squared_difference_at(median, canonical_len);
        let better = match best {
            Some((_, best_difference)) => difference < best_difference,
            None => true,
        };
        if better {
            best = Some((i, difference));
        }
    }

    let (index, _) = best.ok_or(MorphError::EmptyPopulation)?;
    Ok(population.members[index].duplicate_as_consensus())
}

#[cfg(test)]
mod consensus_tests {
    use super::*;
    use crate::utils::test_utils::{circle_population, regular_polygon_outline};
    use approx::assert_relative_eq;
    use std::sync::atomic::AtomicBool;

    fn population_profile(pop: &Population, options: &AnalysisOptions) -> PopulationProfile {
        let cancel = AtomicBool::new(false);
        PopulationProfile::from_population(pop, ProfileKind::Angle, options, None, &cancel)
            .unwrap()
    }

    #[test]
    fn test_averaged_circle_population_is_a_circle() {
        let pop = circle_population(3, 100, 2.0);
        let options = AnalysisOptions::default();
        let profile = population_profile(&pop, &options);

        let consensus = build_consensus(&pop, &profile, &options).unwrap();

        let (cx, cy) = consensus.centre_of_mass();
        assert_relative_eq!(cx, 0.0, epsilon = 1e-6);
        assert_relative_eq!(cy, 0.0, epsilon = 1e-6);
        for p in &consensus.points {
            let r = (p.x * p.x + p.y * p.y).sqrt();
            assert_relative_eq!(r, 2.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_averaging_is_scale_invariant() {
        // the same shapes imaged at twice the pixel density must produce the
        // same micron-space consensus
        let options = AnalysisOptions::default();

        let base = circle_population(3, 100, 2.0);
        let profile = population_profile(&base, &options);
        let consensus_a = build_consensus(&base, &profile, &options).unwrap();

        let mut doubled = base.clone();
        for m in doubled.members.iter_mut() {
            for p in m.points.iter_mut() {
                *p = p.scaled_by(2.0);
            }
            m.scale *= 2.0;
        }
        let profile = population_profile(&doubled, &options);
        let consensus_b = build_consensus(&doubled, &profile, &options).unwrap();

        assert_eq!(consensus_a.border_len(), consensus_b.border_len());
        for (a, b) in consensus_a.points.iter().zip(consensus_b.points.iter()) {
            assert_relative_eq!(a.x / consensus_a.scale, b.x / consensus_b.scale, epsilon = 1e-9);
            assert_relative_eq!(a.y / consensus_a.scale, b.y / consensus_b.scale, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_averaging_deduplicates_repeated_points() {
        // 12 raw points sampled at 1000 canonical positions repeat heavily
        let pop = circle_population(2, 12, 1.0);
        let options = AnalysisOptions::default();
        let profile = population_profile(&pop, &options);

        let consensus = build_consensus(&pop, &profile, &options).unwrap();
        assert_eq!(consensus.border_len(), 12);
        for window in consensus.points.windows(2) {
            assert!(window[0].x != window[1].x || window[0].y != window[1].y);
        }
    }

    #[test]
    fn test_similarity_ties_break_to_first_member() {
        let pop = circle_population(3, 100, 2.0);
        let mut options = AnalysisOptions::default();
        options.consensus_strategy = ConsensusStrategy::Similarity;
        let profile = population_profile(&pop, &options);

        let consensus = build_consensus(&pop, &profile, &options).unwrap();
        assert_eq!(consensus.id, pop.members[0].id);
        assert_eq!(consensus.border_len(), 100);
    }

    #[test]
    fn test_similarity_strips_measurements_and_recentres() {
        let mut member = regular_polygon_outline(7, 50, 1.5, 1.0);
        member.translate(10.0, 10.0);
        member.measurements.insert("area".to_string(), 7.0);
        let pop = Population::new(vec![member], "one").unwrap();
        let mut options = AnalysisOptions::default();
        options.consensus_strategy = ConsensusStrategy::Similarity;
        let profile = population_profile(&pop, &options);

        let consensus = build_consensus(&pop, &profile, &options).unwrap();
        assert!(consensus.measurements.is_empty());
        let (cx, cy) = consensus.centre_of_mass();
        assert_relative_eq!(cx, 0.0, epsilon = 1e-9);
        assert_relative_eq!(cy, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_similarity_missing_reference_is_fatal() {
        let mut pop = circle_population(2, 40, 1.0);
        pop.members[1].landmarks.clear();
        let mut options = AnalysisOptions::default();
        options.consensus_strategy = ConsensusStrategy::Similarity;
        // aggregation skips the broken member, so a median still exists
        let profile = population_profile(&pop, &options);

        let result = build_consensus(&pop, &profile, &options);
        assert!(matches!(result, Err(MorphError::MissingData(_))));
    }

    #[test]
    fn test_averaging_skips_broken_members() {
        let mut pop = circle_population(3, 60, 1.0);
        pop.members[2].landmarks.clear();
        let options = AnalysisOptions::default();
        let profile = population_profile(&pop, &options);

        let consensus = build_consensus(&pop, &profile, &options).unwrap();
        for p in &consensus.points {
            let r = (p.x * p.x + p.y * p.y).sqrt();
            assert_relative_eq!(r, 1.0, epsilon = 1e-6);
        }
    }
}
