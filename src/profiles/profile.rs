use crate::errors::MorphError;

/// Wraps an index onto a circular sequence of the given length.
///
/// Every circular-index consumer in the crate goes through this helper so
/// that profile, segment and landmark arithmetic cannot drift apart.
pub fn wrap_index(i: isize, len: usize) -> usize {
    let len = len as isize;
    (((i % len) + len) % len) as usize
}

/// A circular sequence of real values sampled around a closed outline.
///
/// Index `len()` wraps back to 0. Profiles are immutable; every operation
/// returns a new profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourProfile {
    values: Vec<f64>,
}

impl ContourProfile {
    pub fn new(values: Vec<f64>) -> Result<Self, MorphError> {
        if values.is_empty() {
            return Err(MorphError::EmptyProfile);
        }
        Ok(Self { values })
    }

    /// A profile holding the same value at every position.
    pub fn constant(value: f64, len: usize) -> Result<Self, MorphError> {
        if len == 0 {
            return Err(MorphError::EmptyProfile);
        }
        Ok(Self {
            values: vec![value; len],
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at an integer position, wrapping at the boundary.
    pub fn get(&self, index: isize) -> f64 {
        self.values[wrap_index(index, self.values.len())]
    }

    /// Linearly interpolated value at a fractional perimeter position.
    pub fn value_at(&self, position: f64) -> Result<f64, MorphError> {
        if !(0.0..1.0).contains(&position) {
            return Err(MorphError::InvalidPosition(position));
        }
        let n = self.values.len();
        let exact = position * n as f64;
        let lower = exact.floor() as usize;
        let t = exact - exact.floor();
        let upper = wrap_index(lower as isize + 1, n);
        let a = self.values[lower];
        let b = self.values[upper];
        Ok(a + (b - a) * t)
    }

    /// New profile whose index 0 corresponds to index `offset` of this one.
    pub fn rotate(&self, offset: usize) -> ContourProfile {
        let n = self.values.len();
        let offset = offset % n;
        let mut rotated = Vec::with_capacity(n);
        rotated.extend_from_slice(&self.values[offset..]);
        rotated.extend_from_slice(&self.values[..offset]);
        ContourProfile { values: rotated }
    }

    /// Linear resample to a new length.
    pub fn interpolate(&self, new_len: usize) -> Result<ContourProfile, MorphError> {
        if new_len == 0 {
            return Err(MorphError::EmptyProfile);
        }
        if new_len == self.values.len() {
            return Ok(self.clone());
        }
        let n = self.values.len();
        let ratio = n as f64 / new_len as f64;
        let mut resampled = Vec::with_capacity(new_len);
        for i in 0..new_len {
            let exact = i as f64 * ratio;
            let lower = wrap_index(exact.floor() as isize, n);
            let upper = wrap_index(lower as isize + 1, n);
            let t = exact - exact.floor();
            resampled.push(self.values[lower] + (self.values[upper] - self.values[lower]) * t);
        }
        Ok(ContourProfile { values: resampled })
    }

    /// Windowed circular forward difference: `v[i+w] - v[i-w]` at each index.
    pub fn derivative(&self, window: usize) -> ContourProfile {
        let w = window.max(1) as isize;
        let n = self.values.len();
        let values = (0..n)
            .map(|i| self.get(i as isize + w) - self.get(i as isize - w))
            .collect();
        ContourProfile { values }
    }

    /// Circular moving average over a window of `2 * window + 1` values.
    pub fn smooth(&self, window: usize) -> ContourProfile {
        let w = window.max(1) as isize;
        let n = self.values.len();
        let span = (2 * w + 1) as f64;
        let values = (0..n)
            .map(|i| {
                let mut sum = 0.0;
                for j in -w..=w {
                    sum += self.get(i as isize + j);
                }
                sum / span
            })
            .collect();
        ContourProfile { values }
    }

    pub fn min_value(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_value(&self) -> f64 {
        self.values
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Sum of squared per-position differences.
    ///
    /// Profiles of unequal length are compared at the longer length, with the
    /// shorter profile linearly resampled first.
    pub fn squared_difference(&self, other: &ContourProfile) -> f64 {
        let n = self.values.len().max(other.values.len());
        self.squared_difference_at(other, n)
    }

    /// Squared difference with both profiles resampled to `interp_len`.
    pub fn squared_difference_at(&self, other: &ContourProfile, interp_len: usize) -> f64 {
        let a = resampled_values(&self.values, interp_len);
        let b = resampled_values(&other.values, interp_len);
        a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    /// The rotation of this profile that best matches `other`.
    ///
    /// Brute-force search over all rotations; ties resolve to the smallest
    /// offset, so `p.best_fit_offset(&p.rotate(k)) == k`.
    pub fn best_fit_offset(&self, other: &ContourProfile) -> Result<usize, MorphError> {
        let n = self.values.len();
        let test = resampled_values(&other.values, n);

        let mut best_score = f64::INFINITY;
        let mut best_offset = None;
        for offset in 0..n {
            let mut score = 0.0;
            for i in 0..n {
                let d = self.values[(i + offset) % n] - test[i];
                score += d * d;
            }
            if score.is_finite() && score < best_score {
                best_score = score;
                best_offset = Some(offset);
            }
        }

        best_offset.ok_or_else(|| {
            MorphError::AlignmentFailure(format!(
                "no finite score over {} candidate offsets",
                n
            ))
        })
    }
}

fn resampled_values(values: &[f64], new_len: usize) -> Vec<f64> {
    if values.len() == new_len {
        return values.to_vec();
    }
    let n = values.len();
    let ratio = n as f64 / new_len as f64;
    (0..new_len)
        .map(|i| {
            let exact = i as f64 * ratio;
            let lower = wrap_index(exact.floor() as isize, n);
            let upper = wrap_index(lower as isize + 1, n);
            let t = exact - exact.floor();
            values[lower] + (values[upper] - values[lower]) * t
        })
        .collect()
}

#[cfg(test)]
mod profile_tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(n: usize) -> ContourProfile {
        ContourProfile::new((0..n).map(|i| i as f64).collect()).unwrap()
    }

    #[test]
    fn test_wrap_index() {
        assert_eq!(wrap_index(0, 10), 0);
        assert_eq!(wrap_index(10, 10), 0);
        assert_eq!(wrap_index(13, 10), 3);
        assert_eq!(wrap_index(-1, 10), 9);
        assert_eq!(wrap_index(-336, 330), 324);
    }

    #[test]
    fn test_empty_profile_rejected() {
        assert!(matches!(
            ContourProfile::new(Vec::new()),
            Err(MorphError::EmptyProfile)
        ));
    }

    #[test]
    fn test_rotation_identity() {
        let p = ramp(10);
        assert_eq!(p.rotate(0), p);
        assert_eq!(p.rotate(10), p.rotate(0));
        assert_eq!(p.rotate(23), p.rotate(3));
    }

    #[test]
    fn test_rotation_moves_offset_to_front() {
        let p = ramp(5);
        let r = p.rotate(2);
        assert_eq!(r.values(), &[2.0, 3.0, 4.0, 0.0, 1.0]);
    }

    #[test]
    fn test_value_at_interpolates() {
        let p = ContourProfile::new(vec![0.0, 10.0, 20.0, 30.0]).unwrap();
        assert_relative_eq!(p.value_at(0.0).unwrap(), 0.0);
        assert_relative_eq!(p.value_at(0.25).unwrap(), 10.0);
        // halfway between index 0 and 1
        assert_relative_eq!(p.value_at(0.125).unwrap(), 5.0);
        // wraps from the last index back to the first
        assert_relative_eq!(p.value_at(0.875).unwrap(), 15.0);
    }

    #[test]
    fn test_value_at_rejects_out_of_range() {
        let p = ramp(4);
        assert!(matches!(
            p.value_at(1.0),
            Err(MorphError::InvalidPosition(_))
        ));
        assert!(matches!(
            p.value_at(-0.1),
            Err(MorphError::InvalidPosition(_))
        ));
    }

    #[test]
    fn test_interpolate_preserves_constant() {
        let p = ContourProfile::constant(42.0, 100).unwrap();
        let q = p.interpolate(1000).unwrap();
        assert_eq!(q.len(), 1000);
        for v in q.values() {
            assert_relative_eq!(*v, 42.0);
        }
    }

    #[test]
    fn test_squared_difference_equal_lengths() {
        let a = ContourProfile::constant(2.0, 8).unwrap();
        let b = ContourProfile::constant(5.0, 8).unwrap();
        assert_relative_eq!(a.squared_difference(&b), 8.0 * 9.0);
    }

    #[test]
    fn test_squared_difference_resamples_shorter() {
        let a = ContourProfile::constant(1.0, 10).unwrap();
        let b = ContourProfile::constant(1.0, 40).unwrap();
        assert_relative_eq!(a.squared_difference(&b), 0.0);
    }

    #[test]
    fn test_best_fit_offset_recovers_rotation() {
        let p = ContourProfile::new(vec![1.0, 5.0, 2.0, 8.0, 3.0, 9.0, 4.0, 7.0]).unwrap();
        for k in 0..p.len() {
            let rotated = p.rotate(k);
            assert_eq!(p.best_fit_offset(&rotated).unwrap(), k);
        }
    }

    #[test]
    fn test_best_fit_offset_tie_breaks_to_smallest() {
        let p = ContourProfile::constant(3.0, 12).unwrap();
        assert_eq!(p.best_fit_offset(&p).unwrap(), 0);
    }

    #[test]
    fn test_derivative_of_ramp_is_constant_inside() {
        let p = ramp(10);
        let d = p.derivative(1);
        // away from the wrap point the ramp has slope 1 per index
        assert_relative_eq!(d.get(4), 2.0);
        assert_relative_eq!(d.get(5), 2.0);
        assert_eq!(d.len(), p.len());
    }

    #[test]
    fn test_smooth_preserves_constant() {
        let p = ContourProfile::constant(7.0, 20).unwrap();
        let s = p.smooth(3);
        for v in s.values() {
            assert_relative_eq!(*v, 7.0);
        }
    }
}
