use std::collections::HashMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::errors::MorphError;
use crate::profiles::profile::{wrap_index, ContourProfile};
use crate::profiles::segment::SegmentSet;

/// Name of the landmark used as the zero point for all rotational alignment.
pub const REFERENCE_LANDMARK: &str = "reference";

/// A border point of a closed outline, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlinePoint {
    pub point_index: u32,
    pub x: f64,
    pub y: f64,
}

impl OutlinePoint {
    pub fn distance_to(&self, other: &OutlinePoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn translated(&self, dx: f64, dy: f64) -> OutlinePoint {
        OutlinePoint {
            point_index: self.point_index,
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn scaled_by(&self, factor: f64) -> OutlinePoint {
        OutlinePoint {
            point_index: self.point_index,
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    /// Rotates the point about a center by an angle in radians.
    pub fn rotated_about(&self, angle: f64, center: (f64, f64)) -> OutlinePoint {
        let (cx, cy) = center;
        let x = self.x - cx;
        let y = self.y - cy;
        let cos_a = angle.cos();
        let sin_a = angle.sin();
        OutlinePoint {
            point_index: self.point_index,
            x: x * cos_a - y * sin_a + cx,
            y: x * sin_a + y * cos_a + cy,
        }
    }
}

/// A named index position on an outline's border.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Landmark {
    pub name: String,
    pub index: usize,
}

/// The geometric property sampled around the perimeter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKind {
    /// Interior angle at each border point, in degrees.
    Angle,
    /// Distance from the centre of mass to each border point.
    Radius,
    /// Distance from each border point to the point half the perimeter away.
    Diameter,
}

/// A closed cell or nucleus outline.
///
/// Holds border points in pixel coordinates, the pixel-per-micron scale of
/// the source image, and any landmarks and segments placed on the border.
/// Profiles are recomputed from the current border on every request, so a
/// mutated outline can never serve a stale profile.
#[derive(Debug, Clone)]
pub struct Outline {
    pub id: u32,
    pub points: Vec<OutlinePoint>,
    /// Pixels per micron of the source image.
    pub scale: f64,
    pub landmarks: Vec<Landmark>,
    pub segments: Option<SegmentSet>,
    /// Per-member measurement annotations. Not meaningful on synthetic
    /// shapes; stripped when an outline is duplicated as a consensus.
    pub measurements: HashMap<String, f64>,
}

impl Outline {
    pub fn new(id: u32, points: Vec<OutlinePoint>, scale: f64) -> Result<Self, MorphError> {
        if points.len() < 3 {
            return Err(MorphError::MissingData(format!(
                "outline {} has {} border points, need at least 3",
                id,
                points.len()
            )));
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(MorphError::MissingData(format!(
                "outline {} has invalid pixel scale {}",
                id, scale
            )));
        }
        let mut outline = Outline {
            id,
            points,
            scale,
            landmarks: Vec::new(),
            segments: None,
            measurements: HashMap::new(),
        };
        outline.ensure_counterclockwise();
        Ok(outline)
    }

    pub fn border_len(&self) -> usize {
        self.points.len()
    }

    /// Mean of the border points.
    pub fn centre_of_mass(&self) -> (f64, f64) {
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        let n = self.points.len() as f64;
        (sx / n, sy / n)
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        for p in self.points.iter_mut() {
            p.x += dx;
            p.y += dy;
        }
    }

    pub fn move_centre_of_mass_to(&mut self, x: f64, y: f64) {
        let (cx, cy) = self.centre_of_mass();
        self.translate(x - cx, y - cy);
    }

    pub fn rotate_about_centre(&mut self, angle: f64) {
        let com = self.centre_of_mass();
        for p in self.points.iter_mut() {
            *p = p.rotated_about(angle, com);
        }
    }

    /// Signed area via the shoelace formula; positive for counterclockwise.
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        let mut sum = 0.0;
        for i in 0..n {
            let a = &self.points[i];
            let b = &self.points[(i + 1) % n];
            sum += a.x * b.y - b.x * a.y;
        }
        sum / 2.0
    }

    // Border walks must be counterclockwise; points keep their source
    // point_index so callers can still locate them after the reversal.
    fn ensure_counterclockwise(&mut self) {
        if self.signed_area() < 0.0 {
            self.points.reverse();
        }
    }

    /// Border position of the point carrying the given source point index.
    pub fn position_of_point_index(&self, point_index: u32) -> Result<usize, MorphError> {
        self.points
            .iter()
            .position(|p| p.point_index == point_index)
            .ok_or_else(|| {
                MorphError::MissingData(format!(
                    "outline {} has no border point with index {}",
                    self.id, point_index
                ))
            })
    }

    pub fn landmark(&self, name: &str) -> Option<&Landmark> {
        self.landmarks.iter().find(|l| l.name == name)
    }

    /// Adds the landmark, replacing any existing landmark of the same name.
    pub fn set_landmark(&mut self, name: &str, index: usize) {
        let index = wrap_index(index as isize, self.points.len());
        if let Some(l) = self.landmarks.iter_mut().find(|l| l.name == name) {
            l.index = index;
        } else {
            self.landmarks.push(Landmark {
                name: name.to_string(),
                index,
            });
        }
    }

    /// Index of the distinguished reference landmark.
    pub fn reference_landmark_index(&self) -> Result<usize, MorphError> {
        self.landmark(REFERENCE_LANDMARK)
            .map(|l| l.index)
            .ok_or_else(|| {
                MorphError::MissingData(format!("outline {} has no reference landmark", self.id))
            })
    }

    /// Border index at the given offset from a landmark.
    pub fn index_relative_to(&self, landmark_index: usize, offset: usize) -> usize {
        wrap_index(landmark_index as isize + offset as isize, self.points.len())
    }

    /// Computes the profile of the requested kind from the current border.
    ///
    /// `window_proportion` sets the measuring window for the angle profile as
    /// a fraction of the border length.
    pub fn profile(
        &self,
        kind: ProfileKind,
        window_proportion: f64,
    ) -> Result<ContourProfile, MorphError> {
        match kind {
            ProfileKind::Angle => self.angle_profile(window_proportion),
            ProfileKind::Radius => self.radius_profile(),
            ProfileKind::Diameter => self.diameter_profile(),
        }
    }

    fn angle_window(&self, window_proportion: f64) -> Result<usize, MorphError> {
        if !(window_proportion.is_finite() && window_proportion > 0.0) {
            return Err(MorphError::MissingData(format!(
                "invalid profile window proportion {}",
                window_proportion
            )));
        }
        let w = (self.points.len() as f64 * window_proportion).round() as usize;
        Ok(w.max(1))
    }

    fn angle_profile(&self, window_proportion: f64) -> Result<ContourProfile, MorphError> {
        let n = self.points.len();
        let w = self.angle_window(window_proportion)? as isize;

        let mut values = Vec::with_capacity(n);
        for i in 0..n {
            let p = &self.points[i];
            let prev = &self.points[wrap_index(i as isize - w, n)];
            let next = &self.points[wrap_index(i as isize + w, n)];

            let ux = next.x - p.x;
            let uy = next.y - p.y;
            let vx = prev.x - p.x;
            let vy = prev.y - p.y;

            // interior angle for a counterclockwise border: sweep from the
            // forward direction onto the backward direction
            let cross = ux * vy - uy * vx;
            let dot = ux * vx + uy * vy;
            let mut angle = cross.atan2(dot);
            if angle < 0.0 {
                angle += 2.0 * PI;
            }
            values.push(angle.to_degrees());
        }
        ContourProfile::new(values)
    }

    fn radius_profile(&self) -> Result<ContourProfile, MorphError> {
        let (cx, cy) = self.centre_of_mass();
        let values = self
            .points
            .iter()
            .map(|p| {
                let dx = p.x - cx;
                let dy = p.y - cy;
                (dx * dx + dy * dy).sqrt()
            })
            .collect();
        ContourProfile::new(values)
    }

    fn diameter_profile(&self) -> Result<ContourProfile, MorphError> {
        let n = self.points.len();
        let values = (0..n)
            .map(|i| {
                let opposite = &self.points[wrap_index(i as isize + (n / 2) as isize, n)];
                self.points[i].distance_to(opposite)
            })
            .collect();
        ContourProfile::new(values)
    }

    /// Copy with one border point replaced; landmarks and segments carry over.
    pub fn with_point(&self, index: usize, x: f64, y: f64) -> Outline {
        let mut copy = self.clone();
        let i = wrap_index(index as isize, copy.points.len());
        copy.points[i].x = x;
        copy.points[i].y = y;
        copy
    }

    /// Duplicate suitable for use as a synthetic consensus shape: member
    /// measurements are stripped and the centre of mass is recentred on the
    /// origin.
    pub fn duplicate_as_consensus(&self) -> Outline {
        let mut copy = self.clone();
        copy.measurements.clear();
        copy.move_centre_of_mass_to(0.0, 0.0);
        copy
    }
}

/// An ordered collection of outlines analysed together.
#[derive(Debug, Clone)]
pub struct Population {
    pub members: Vec<Outline>,
    pub label: String,
    /// Pixel-per-micron scale recorded for the whole population, if any.
    pub scale: Option<f64>,
    /// Shared segment layout, expressed relative to the reference landmark.
    pub segments: Option<SegmentSet>,
    /// The current consensus shape. Replaced wholesale on every rebuild.
    pub consensus: Option<Outline>,
}

impl Population {
    pub fn new(members: Vec<Outline>, label: &str) -> Result<Self, MorphError> {
        if members.is_empty() {
            return Err(MorphError::EmptyPopulation);
        }
        Ok(Population {
            members,
            label: label.to_string(),
            scale: None,
            segments: None,
            consensus: None,
        })
    }

    /// The pixel scale used when reconstructing consensus coordinates.
    ///
    /// The recorded population scale wins when every member shares it.
    /// Otherwise members were imaged at different scales and the choice is
    /// genuinely ambiguous; the first member's scale is used.
    pub fn choose_pixel_micron_scale(&self) -> f64 {
        if let Some(s) = self.scale {
            if self.members.iter().all(|m| m.scale == s) {
                return s;
            }
        }
        let fallback = self.members[0].scale;
        if self.members.iter().any(|m| m.scale != fallback) {
            println!(
                "Population {} has mixed pixel scales, using scale of first member ({})",
                self.label, fallback
            );
        }
        fallback
    }

    /// Landmark names shared by every member, in first-member order.
    pub fn shared_landmark_names(&self) -> Vec<String> {
        self.members[0]
            .landmarks
            .iter()
            .filter(|l| {
                self.members
                    .iter()
                    .all(|m| m.landmark(&l.name).is_some())
            })
            .map(|l| l.name.clone())
            .collect()
    }

    /// Installs a freshly built consensus, discarding any previous one.
    pub fn set_consensus(&mut self, consensus: Outline) {
        self.consensus = Some(consensus);
    }
}
