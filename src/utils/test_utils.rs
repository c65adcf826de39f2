use std::f64::consts::PI;

use crate::io::outline::{Outline, OutlinePoint, Population, REFERENCE_LANDMARK};
use crate::profiles::segment::{ProfileSegment, SegmentSet};

/// A regular polygon outline approximating a circle, counterclockwise,
/// centred on the origin, with the reference landmark at index 0.
pub fn regular_polygon_outline(id: u32, n_points: usize, radius: f64, scale: f64) -> Outline {
    let points = (0..n_points)
        .map(|i| {
            let theta = 2.0 * PI * i as f64 / n_points as f64;
            OutlinePoint {
                point_index: i as u32,
                x: radius * theta.cos(),
                y: radius * theta.sin(),
            }
        })
        .collect();
    let mut outline = Outline::new(id, points, scale).unwrap();
    outline.set_landmark(REFERENCE_LANDMARK, 0);
    outline
}

/// An axis-aligned ellipse outline, counterclockwise, centred on the origin,
/// with the reference landmark at index 0.
pub fn ellipse_outline(id: u32, n_points: usize, a: f64, b: f64, scale: f64) -> Outline {
    let points = (0..n_points)
        .map(|i| {
            let theta = 2.0 * PI * i as f64 / n_points as f64;
            OutlinePoint {
                point_index: i as u32,
                x: a * theta.cos(),
                y: b * theta.sin(),
            }
        })
        .collect();
    let mut outline = Outline::new(id, points, scale).unwrap();
    outline.set_landmark(REFERENCE_LANDMARK, 0);
    outline
}

/// An asymmetric blob outline with no rotational or mirror symmetry in its
/// shape profile, useful where a best-fit offset must be unique.
pub fn blob_outline(id: u32, n_points: usize, scale: f64) -> Outline {
    let points = (0..n_points)
        .map(|i| {
            let theta = 2.0 * PI * i as f64 / n_points as f64;
            let r = 2.0 + 0.4 * theta.cos() + 0.25 * (2.0 * theta).sin();
            OutlinePoint {
                point_index: i as u32,
                x: r * theta.cos(),
                y: r * theta.sin(),
            }
        })
        .collect();
    let mut outline = Outline::new(id, points, scale).unwrap();
    outline.set_landmark(REFERENCE_LANDMARK, 0);
    outline
}

/// A population of identical circle outlines.
pub fn circle_population(n_members: usize, n_points: usize, radius: f64) -> Population {
    let members = (0..n_members)
        .map(|i| regular_polygon_outline(i as u32, n_points, radius, 1.0))
        .collect();
    Population::new(members, "circles").unwrap()
}

/// A three-segment layout covering a profile of the given length.
pub fn three_segment_layout(profile_len: usize) -> SegmentSet {
    let a = profile_len * 3 / 10;
    let b = profile_len * 3 / 4;
    SegmentSet::new(
        vec![
            ProfileSegment::new("head", 0, a, profile_len).unwrap(),
            ProfileSegment::new("body", a, b, profile_len).unwrap(),
            ProfileSegment::new("tail", b, 0, profile_len).unwrap(),
        ],
        profile_len,
    )
    .unwrap()
}
