use std::f64::consts::FRAC_PI_2;

use nalgebra::Matrix2;

use crate::errors::MorphError;
use crate::io::outline::Outline;
use crate::profiles::aggregate::{rank_quartile, MEDIAN};

/// Copy of the outline rotated so its longest axis is vertical.
///
/// The dominant eigenvector of the border-point covariance matrix gives the
/// long axis; the outline is rotated about its centre of mass until that
/// axis points along +y.
pub fn orient_vertical(outline: &Outline) -> Outline {
    let (cx, cy) = outline.centre_of_mass();
    let n = outline.points.len() as f64;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in &outline.points {
        let dx = p.x - cx;
        let dy = p.y - cy;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    let cov = Matrix2::new(sxx / n, sxy / n, sxy / n, syy / n);

    let eigen = nalgebra::SymmetricEigen::new(cov);
    let dominant = eigen.eigenvalues.imax();
    let axis = eigen.eigenvectors.column(dominant);
    let axis_angle = axis[1].atan2(axis[0]);

    let mut oriented = outline.clone();
    oriented.rotate_about_centre(FRAC_PI_2 - axis_angle);
    oriented
}

/// The coordinate-wise median of a point cloud: median of the x values and
/// median of the y values, taken independently.
pub fn coordinate_median(points: &[(f64, f64)]) -> Result<(f64, f64), MorphError> {
    let xs: Vec<f64> = points.iter().map(|(x, _)| *x).collect();
    let ys: Vec<f64> = points.iter().map(|(_, y)| *y).collect();
    Ok((rank_quartile(&xs, MEDIAN)?, rank_quartile(&ys, MEDIAN)?))
}

/// Distances between each border point and its next neighbour, wrapping.
pub fn adjacent_distances(outline: &Outline) -> Vec<f64> {
    let n = outline.points.len();
    (0..n)
        .map(|i| outline.points[i].distance_to(&outline.points[(i + 1) % n]))
        .collect()
}

/// Median spacing between adjacent border points.
pub fn median_point_spacing(outline: &Outline) -> Result<f64, MorphError> {
    rank_quartile(&adjacent_distances(outline), MEDIAN)
}

#[cfg(test)]
mod process_utils_tests {
    use super::*;
    use crate::utils::test_utils::{ellipse_outline, regular_polygon_outline};
    use approx::assert_relative_eq;

    #[test]
    fn test_orient_vertical_turns_long_axis_upright() {
        // long axis along x
        let outline = ellipse_outline(0, 200, 4.0, 1.0, 1.0);
        let oriented = orient_vertical(&outline);

        let max_y = oriented
            .points
            .iter()
            .map(|p| p.y.abs())
            .fold(0.0, f64::max);
        let max_x = oriented
            .points
            .iter()
            .map(|p| p.x.abs())
            .fold(0.0, f64::max);
        assert_relative_eq!(max_y, 4.0, epsilon = 1e-6);
        assert_relative_eq!(max_x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_orient_vertical_preserves_centre_of_mass() {
        let mut outline = ellipse_outline(0, 100, 3.0, 1.0, 1.0);
        outline.translate(5.0, -2.0);
        let oriented = orient_vertical(&outline);
        let (cx, cy) = oriented.centre_of_mass();
        assert_relative_eq!(cx, 5.0, epsilon = 1e-9);
        assert_relative_eq!(cy, -2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_coordinate_median() {
        let points = vec![(1.0, 10.0), (2.0, 30.0), (3.0, 20.0)];
        let (mx, my) = coordinate_median(&points).unwrap();
        assert_relative_eq!(mx, 3.0);
        assert_relative_eq!(my, 30.0);
    }

    #[test]
    fn test_median_point_spacing_of_regular_polygon() {
        let outline = regular_polygon_outline(0, 100, 1.0, 1.0);
        let spacing = median_point_spacing(&outline).unwrap();
        let expected = 2.0 * (std::f64::consts::PI / 100.0).sin();
        assert_relative_eq!(spacing, expected, epsilon = 1e-9);
    }
}
