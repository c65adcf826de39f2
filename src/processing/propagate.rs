use crate::errors::MorphError;
use crate::io::outline::{Outline, ProfileKind, REFERENCE_LANDMARK};
use crate::options::AnalysisOptions;
use crate::profiles::aggregate::PopulationProfile;
use crate::profiles::profile::wrap_index;

/// Transfers the population's landmarks and segment layout onto a freshly
/// built consensus shape.
///
/// The consensus border is already oriented to the reference, so the
/// reference landmark lands at index 0. Every other landmark is located by
/// best-fit alignment between the shape's profile and the population median
/// rotated to that landmark. Works on a copy: nothing is committed unless
/// every landmark and the segment layout transfer cleanly.
pub fn propagate_landmarks_and_segments(
    consensus: &Outline,
    population_profile: &PopulationProfile,
    options: &AnalysisOptions,
) -> Result<Outline, MorphError> {
    let mut shape = consensus.clone();
    shape.set_landmark(REFERENCE_LANDMARK, 0);

    let profile = shape
        .profile(ProfileKind::Angle, options.profile_window_proportion)?
        .rotate(shape.reference_landmark_index()?);
    let n = profile.len();

    let reference_offset = profile.best_fit_offset(population_profile.median())?;

    for landmark in population_profile.landmarks() {
        if landmark.name == REFERENCE_LANDMARK {
            continue;
        }
        let landmark_median = population_profile.median_relative_to(&landmark.name)?;
        let offset = profile.best_fit_offset(&landmark_median)?;
        shape.set_landmark(
            &landmark.name,
            wrap_index(offset as isize + reference_offset as isize, n),
        );
    }

    if population_profile.has_segments() {
        let segments = population_profile.segments_relative_to(REFERENCE_LANDMARK)?;
        shape.segments = Some(segments.scale_to(n)?);
    }

    Ok(shape)
}
