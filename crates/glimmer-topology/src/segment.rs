//! Segments - struts animated as one unit

use crate::{StrutHandle, StrutRegistry};

/// An unordered set of struts addressed and animated together.
///
/// Aggregate stats are derived once at construction; segments are immutable
/// afterwards.
#[derive(Debug, Clone)]
pub struct Segment {
    struts: Vec<StrutHandle>,
    total_length: usize,
    average_length: f32,
}

impl Segment {
    /// Build a segment from interned struts, caching its aggregate stats.
    pub fn new(registry: &StrutRegistry, struts: Vec<StrutHandle>) -> Self {
        let total_length: usize = struts.iter().map(|&h| registry.get(h).length).sum();
        let average_length = if struts.is_empty() {
            0.0
        } else {
            total_length as f32 / struts.len() as f32
        };
        Self {
            struts,
            total_length,
            average_length,
        }
    }

    /// The struts in this segment.
    pub fn struts(&self) -> &[StrutHandle] {
        &self.struts
    }

    /// Number of struts.
    pub fn len(&self) -> usize {
        self.struts.len()
    }

    /// Whether the segment holds no struts.
    pub fn is_empty(&self) -> bool {
        self.struts.is_empty()
    }

    /// Summed LED count over all member struts.
    pub fn total_length(&self) -> usize {
        self.total_length
    }

    /// Mean LED count per member strut (0 for an empty segment).
    pub fn average_length(&self) -> f32 {
        self.average_length
    }
}
