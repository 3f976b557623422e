//! Layouts - ordered segments with reverse strut lookup

use std::collections::HashMap;

use crate::{Segment, StrutRegistry};

/// An ordered array of segments plus a reverse index from strut index to
/// segment position, so animations can find a strut's group in O(1).
#[derive(Debug, Clone)]
pub struct Layout {
    segments: Vec<Segment>,
    by_strut: HashMap<usize, usize>,
}

impl Layout {
    /// Build a layout. When a strut index appears in more than one segment
    /// (both directions of the same strut, say), the first segment wins the
    /// reverse lookup.
    pub fn new(registry: &StrutRegistry, segments: Vec<Segment>) -> Self {
        let mut by_strut = HashMap::new();
        for (pos, segment) in segments.iter().enumerate() {
            for &handle in segment.struts() {
                by_strut.entry(registry.get(handle).index).or_insert(pos);
            }
        }
        Self { segments, by_strut }
    }

    /// All segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment at `pos`.
    pub fn segment(&self, pos: usize) -> Option<&Segment> {
        self.segments.get(pos)
    }

    /// Position of the segment containing the strut with `strut_index`.
    pub fn segment_of(&self, strut_index: usize) -> Option<usize> {
        self.by_strut.get(&strut_index).copied()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the layout has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_lookup() {
        let registry = StrutRegistry::uniform(6, 30, 0);
        let seg_a = Segment::new(
            &registry,
            vec![
                registry.intern(0, false).unwrap(),
                registry.intern(1, false).unwrap(),
            ],
        );
        let seg_b = Segment::new(
            &registry,
            vec![
                registry.intern(4, true).unwrap(),
                registry.intern(5, false).unwrap(),
            ],
        );

        let layout = Layout::new(&registry, vec![seg_a, seg_b]);
        assert_eq!(layout.len(), 2);
        assert_eq!(layout.segment_of(1), Some(0));
        assert_eq!(layout.segment_of(4), Some(1));
        assert_eq!(layout.segment_of(3), None);
    }
}
