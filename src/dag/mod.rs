// src/dag/mod.rs

//! DAG representation and selection.
//!
//! - [`graph`] holds the mutable dependency graph with its closure and
//!   cycle-detection algorithms.
//! - [`selection`] parses selector expressions into sub-graphs.
//! - [`plan`] linearises a graph for display.

pub mod graph;
pub mod plan;
pub mod selection;

pub use graph::{Dag, VertexId, DEFAULT_EDGE_WEIGHT};
pub use plan::execution_plan;
pub use selection::{Selector, SelectorToken};
