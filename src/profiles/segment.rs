use crate::errors::MorphError;
use crate::profiles::profile::wrap_index;

/// A named half-open index range `[start, end)` over a circular profile.
///
/// `start == end` denotes a segment spanning the entire profile. The name is
/// the segment's identity: rescaling changes indices, never the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSegment {
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub profile_len: usize,
}

impl ProfileSegment {
    pub fn new(
        name: &str,
        start: usize,
        end: usize,
        profile_len: usize,
    ) -> Result<Self, MorphError> {
        if profile_len == 0 {
            return Err(MorphError::SegmentLayout(
                "segment cannot cover a zero-length profile".to_string(),
            ));
        }
        if start >= profile_len || end >= profile_len {
            return Err(MorphError::SegmentLayout(format!(
                "segment {} indices ({}, {}) exceed profile length {}",
                name, start, end, profile_len
            )));
        }
        Ok(Self {
            name: name.to_string(),
            start,
            end,
            profile_len,
        })
    }

    /// Number of indices covered, accounting for wrap.
    pub fn length(&self) -> usize {
        if self.start == self.end {
            self.profile_len
        } else {
            wrap_index(self.end as isize - self.start as isize, self.profile_len)
        }
    }

    /// Whether the wrapped index lies inside this segment.
    pub fn contains(&self, index: usize) -> bool {
        let i = wrap_index(index as isize, self.profile_len);
        if self.start == self.end {
            return true;
        }
        if self.start < self.end {
            i >= self.start && i < self.end
        } else {
            i >= self.start || i < self.end
        }
    }
}

/// An ordered, contiguous set of segments covering a whole profile.
///
/// Adjacent segments share a boundary index: each segment's `end` is the next
/// segment's `start`, and the last wraps back onto the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSet {
    segments: Vec<ProfileSegment>,
    profile_len: usize,
}

impl SegmentSet {
    pub fn new(segments: Vec<ProfileSegment>, profile_len: usize) -> Result<Self, MorphError> {
        if segments.is_empty() {
            return Err(MorphError::SegmentLayout(
                "segment set cannot be empty".to_string(),
            ));
        }
        for s in &segments {
            if s.profile_len != profile_len {
                return Err(MorphError::SegmentLayout(format!(
                    "segment {} is defined over length {}, expected {}",
                    s.name, s.profile_len, profile_len
                )));
            }
        }
        for i in 0..segments.len() {
            let next = &segments[(i + 1) % segments.len()];
            if segments[i].end != next.start {
                return Err(MorphError::SegmentLayout(format!(
                    "segment {} ends at {} but segment {} starts at {}",
                    segments[i].name, segments[i].end, next.name, next.start
                )));
            }
        }
        let total: usize = segments.iter().map(ProfileSegment::length).sum();
        if total != profile_len {
            return Err(MorphError::SegmentLayout(format!(
                "segments cover {} of {} indices",
                total, profile_len
            )));
        }
        Ok(Self {
            segments,
            profile_len,
        })
    }

    pub fn profile_len(&self) -> usize {
        self.profile_len
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProfileSegment> {
        self.segments.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ProfileSegment> {
        self.segments.iter().find(|s| s.name == name)
    }

    /// Rescales all segments to a new profile length, preserving each
    /// segment's fractional share of the perimeter.
    ///
    /// Rounding slack is absorbed by the final segment, which always closes
    /// the loop back onto the first; round-tripping two lengths reproduces
    /// the original boundaries within one index.
    pub fn scale_to(&self, new_len: usize) -> Result<SegmentSet, MorphError> {
        if new_len == 0 {
            return Err(MorphError::SegmentLayout(
                "cannot scale segments to zero length".to_string(),
            ));
        }
        if new_len == self.profile_len {
            return Ok(self.clone());
        }

        let ratio = new_len as f64 / self.profile_len as f64;

        if self.segments.len() == 1 {
            let old = &self.segments[0];
            let start = ((old.start as f64 * ratio).round() as usize) % new_len;
            let seg = ProfileSegment::new(&old.name, start, start, new_len)?;
            return SegmentSet::new(vec![seg], new_len);
        }

        let first_start =
            ((self.segments[0].start as f64 * ratio).round() as usize) % new_len;

        let mut scaled = Vec::with_capacity(self.segments.len());
        let mut cursor = first_start;
        for (i, old) in self.segments.iter().enumerate() {
            let end = if i == self.segments.len() - 1 {
                first_start
            } else {
                let proportion = old.length() as f64 / self.profile_len as f64;
                let length = ((new_len as f64 * proportion).round() as usize).max(1);
                wrap_index(cursor as isize + length as isize, new_len)
            };
            scaled.push(ProfileSegment::new(&old.name, cursor, end, new_len)?);
            cursor = end;
        }

        SegmentSet::new(scaled, new_len)
    }

    /// Re-expresses all boundaries relative to a new zero index.
    ///
    /// Used to shift a reference-relative layout onto another landmark.
    pub fn relative_to(&self, zero_index: usize) -> Result<SegmentSet, MorphError> {
        let shift = |i: usize| wrap_index(i as isize - zero_index as isize, self.profile_len);
        let shifted = self
            .segments
            .iter()
            .map(|s| ProfileSegment::new(&s.name, shift(s.start), shift(s.end), self.profile_len))
            .collect::<Result<Vec<_>, _>>()?;
        SegmentSet::new(shifted, self.profile_len)
    }
}

#[cfg(test)]
mod segment_tests {
    use super::*;

    fn three_segments(len: usize) -> SegmentSet {
        SegmentSet::new(
            vec![
                ProfileSegment::new("head", 0, 30, len).unwrap(),
                ProfileSegment::new("body", 30, 75, len).unwrap(),
                ProfileSegment::new("tail", 75, 0, len).unwrap(),
            ],
            len,
        )
        .unwrap()
    }

    #[test]
    fn test_segment_length_wraps() {
        let s = ProfileSegment::new("tail", 75, 10, 100).unwrap();
        assert_eq!(s.length(), 35);
        let full = ProfileSegment::new("all", 5, 5, 100).unwrap();
        assert_eq!(full.length(), 100);
    }

    #[test]
    fn test_segment_contains() {
        let s = ProfileSegment::new("tail", 75, 10, 100).unwrap();
        assert!(s.contains(75));
        assert!(s.contains(99));
        assert!(s.contains(0));
        assert!(s.contains(9));
        assert!(!s.contains(10));
        assert!(!s.contains(50));
    }

    #[test]
    fn test_non_contiguous_segments_rejected() {
        let result = SegmentSet::new(
            vec![
                ProfileSegment::new("head", 0, 30, 100).unwrap(),
                ProfileSegment::new("tail", 40, 0, 100).unwrap(),
            ],
            100,
        );
        assert!(matches!(result, Err(MorphError::SegmentLayout(_))));
    }

    #[test]
    fn test_scale_preserves_proportions() {
        let set = three_segments(100);
        let scaled = set.scale_to(1000).unwrap();
        assert_eq!(scaled.len(), 3);
        assert_eq!(scaled.get("head").unwrap().start, 0);
        assert_eq!(scaled.get("head").unwrap().length(), 300);
        assert_eq!(scaled.get("body").unwrap().start, 300);
        assert_eq!(scaled.get("tail").unwrap().start, 750);
        // still a contiguous cover
        let total: usize = scaled.iter().map(ProfileSegment::length).sum();
        assert_eq!(total, 1000);
    }

    #[test]
    fn test_scale_round_trip_within_one_index() {
        let set = three_segments(100);
        let round_trip = set.scale_to(777).unwrap().scale_to(100).unwrap();
        for (a, b) in set.iter().zip(round_trip.iter()) {
            assert_eq!(a.name, b.name);
            let drift = (a.start as isize - b.start as isize).abs();
            assert!(drift <= 1, "{} drifted by {}", a.name, drift);
        }
    }

    #[test]
    fn test_single_segment_scales() {
        let set = SegmentSet::new(
            vec![ProfileSegment::new("all", 10, 10, 100).unwrap()],
            100,
        )
        .unwrap();
        let scaled = set.scale_to(50).unwrap();
        assert_eq!(scaled.get("all").unwrap().length(), 50);
        assert_eq!(scaled.get("all").unwrap().start, 5);
    }

    #[test]
    fn test_relative_to_shifts_boundaries() {
        let set = three_segments(100);
        let shifted = set.relative_to(30).unwrap();
        assert_eq!(shifted.get("body").unwrap().start, 0);
        assert_eq!(shifted.get("tail").unwrap().start, 45);
        assert_eq!(shifted.get("head").unwrap().start, 70);
    }
}
