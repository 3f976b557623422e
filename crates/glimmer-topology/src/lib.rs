//! Glimmer Topology - Strut Graphs and Grouped Addressing
//!
//! This crate models the physical frame of an installation as an undirected
//! strut-and-node graph and derives the grouped addressing/animation ranges
//! the painting algorithms work with:
//! - Strut interning with stable handles
//! - Segments (struts animated as one unit) with cached aggregate stats
//! - Layouts (ordered segments + reverse strut lookup)
//! - Concentric expansion over the graph from seed points
//!
//! Everything here is built once at startup from a fixed edge list and never
//! mutated afterwards.

use thiserror::Error;

pub mod graph;
pub mod layout;
pub mod segment;
pub mod strut;

pub use graph::{ConcentricLayouts, Graph, PointId};
pub use layout::Layout;
pub use segment::Segment;
pub use strut::{Strut, StrutHandle, StrutRegistry};

/// Topology errors
#[derive(Error, Debug)]
pub enum TopologyError {
    /// A seed point does not exist in the graph
    #[error("Unknown point: {0}")]
    UnknownPoint(usize),

    /// A strut index is outside the registered edge list
    #[error("Unknown strut index: {0}")]
    UnknownStrut(usize),
}

/// Result type for topology operations
pub type Result<T> = std::result::Result<T, TopologyError>;
