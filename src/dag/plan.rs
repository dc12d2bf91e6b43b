// src/dag/plan.rs

//! Linear execution plans for display (`ls`, `run --dry-run`).
//!
//! The scheduler never needs a total order; this is only used to print the
//! selected models in an order a human can follow.

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::graph::{Dag, VertexId};
use crate::errors::{Result, SqldagError};

/// Return the vertices of `dag` in a dependency-respecting order.
///
/// Vertices and edges are inserted in sorted order so the plan is stable
/// for a given graph.
pub fn execution_plan(dag: &Dag) -> Result<Vec<VertexId>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    let mut vertices: Vec<&str> = dag.vertices().collect();
    vertices.sort_unstable();
    for vertex in vertices {
        graph.add_node(vertex);
    }

    let edges = dag.edges();
    for (source, target) in edges.iter() {
        graph.add_edge(source.as_str(), target.as_str(), ());
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(SqldagError::DagCycle(format!(
            "cycle detected in model DAG involving model '{}'",
            cycle.node_id()
        ))),
    }
}
