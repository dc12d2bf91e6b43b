// src/dag/graph.rs

use std::collections::{HashMap, HashSet};

/// Canonical vertex identifier (a model name).
pub type VertexId = String;

/// Weight stored on every edge. Edges carry no behaviour today.
pub const DEFAULT_EDGE_WEIGHT: u32 = 1;

/// `vertex -> (neighbour -> weight)`
type Adjacency = HashMap<VertexId, HashMap<VertexId, u32>>;

/// Mutable directed graph of opaque vertex ids.
///
/// Edges are stored twice: `down[source]` holds the direct descendants of
/// `source` and `up[target]` holds the direct ancestors of `target`. Every
/// mutation keeps both indices symmetric, and removing a vertex purges all
/// edges touching it, so no edge ever points at a non-member.
///
/// Acyclicity is *not* enforced on insert; call [`Dag::valid`] once the
/// graph is built.
#[derive(Debug, Clone, Default)]
pub struct Dag {
    vertices: HashSet<VertexId>,
    /// Direct ancestors: target -> sources.
    up: Adjacency,
    /// Direct descendants: source -> targets.
    down: Adjacency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// On the current DFS path.
    Gray,
    /// Fully explored.
    Black,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.vertices.contains(id)
    }

    /// All member vertices, in no particular order.
    pub fn vertices(&self) -> impl Iterator<Item = &str> {
        self.vertices.iter().map(String::as_str)
    }

    /// Add a vertex. Adding an existing vertex is a no-op.
    pub fn add_vertex(&mut self, id: impl Into<VertexId>) {
        self.vertices.insert(id.into());
    }

    /// Remove a vertex and every edge into or out of it.
    ///
    /// Removing a vertex that is not a member is a no-op.
    pub fn remove_vertex(&mut self, id: &str) {
        self.vertices.remove(id);

        if let Some(parents) = self.up.remove(id) {
            for parent in parents.keys() {
                detach(&mut self.down, parent, id);
            }
        }

        if let Some(children) = self.down.remove(id) {
            for child in children.keys() {
                detach(&mut self.up, child, id);
            }
        }
    }

    /// Insert the edge `source -> target` ("target depends on source").
    ///
    /// Both endpoints become members if they were not already. Inserting an
    /// existing edge is a no-op. No cycle check happens here.
    pub fn add_edge(&mut self, source: impl Into<VertexId>, target: impl Into<VertexId>) {
        let source = source.into();
        let target = target.into();

        self.up
            .entry(target.clone())
            .or_default()
            .insert(source.clone(), DEFAULT_EDGE_WEIGHT);
        self.down
            .entry(source.clone())
            .or_default()
            .insert(target.clone(), DEFAULT_EDGE_WEIGHT);

        self.vertices.insert(source);
        self.vertices.insert(target);
    }

    /// Weight of the edge `source -> target`, if present.
    pub fn edge_weight(&self, source: &str, target: &str) -> Option<u32> {
        self.down.get(source)?.get(target).copied()
    }

    /// Direct descendants of `id`.
    pub fn children_of(&self, id: &str) -> impl Iterator<Item = &str> {
        neighbours(&self.down, id)
    }

    /// All edges as `(source, target)` pairs, sorted.
    pub fn edges(&self) -> Vec<(VertexId, VertexId)> {
        let mut edges: Vec<(VertexId, VertexId)> = self
            .down
            .iter()
            .flat_map(|(source, targets)| {
                targets
                    .keys()
                    .map(move |target| (source.clone(), target.clone()))
            })
            .collect();
        edges.sort();
        edges
    }

    /// Transitive ancestors of `id` (not including `id` itself unless it
    /// sits on a cycle).
    pub fn ancestors_of(&self, id: &str) -> HashSet<VertexId> {
        closure(&self.up, id)
    }

    /// Transitive descendants of `id` (not including `id` itself unless it
    /// sits on a cycle).
    pub fn descendants_of(&self, id: &str) -> HashSet<VertexId> {
        closure(&self.down, id)
    }

    /// Members with no ancestors: the frontier that can run right now.
    ///
    /// The order of the returned vector is unspecified.
    pub fn vertices_without_ancestors(&self) -> Vec<VertexId> {
        self.vertices
            .iter()
            .filter(|v| self.up.get(*v).is_none_or(|parents| parents.is_empty()))
            .cloned()
            .collect()
    }

    /// Whether the graph is acyclic.
    pub fn valid(&self) -> bool {
        self.find_cycle().is_none()
    }

    /// Find one directed cycle, returned as a closed path
    /// (`[a, b, c, a]`), or `None` if the graph is acyclic.
    ///
    /// Iterative three-colour DFS. A neighbour is checked for GRAY *before*
    /// descending into it; BLACK neighbours are never revisited.
    pub fn find_cycle(&self) -> Option<Vec<VertexId>> {
        let mut color: HashMap<&str, Color> = HashMap::new();

        // Sorted roots keep the reported cycle stable across runs.
        let mut roots: Vec<&str> = self.vertices().collect();
        roots.sort_unstable();

        for root in roots {
            if color.contains_key(root) {
                continue;
            }

            color.insert(root, Color::Gray);
            let mut stack: Vec<(&str, Vec<&str>)> = vec![(root, self.children_of(root).collect())];

            loop {
                let Some(frame) = stack.last_mut() else {
                    break;
                };
                let vertex = frame.0;
                let next = frame.1.pop();

                match next {
                    Some(child) => match color.get(child) {
                        Some(Color::Gray) => {
                            let start = stack
                                .iter()
                                .position(|(v, _)| *v == child)
                                .unwrap_or(0);
                            let mut cycle: Vec<VertexId> =
                                stack[start..].iter().map(|(v, _)| v.to_string()).collect();
                            cycle.push(child.to_string());
                            return Some(cycle);
                        }
                        Some(Color::Black) => {}
                        None => {
                            color.insert(child, Color::Gray);
                            stack.push((child, self.children_of(child).collect()));
                        }
                    },
                    None => {
                        color.insert(vertex, Color::Black);
                        stack.pop();
                    }
                }
            }
        }

        None
    }

    /// Deep copy; the result shares nothing with `self`.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Merge another graph's vertices and edges into `self`.
    pub fn union(&mut self, other: &Dag) {
        self.vertices.extend(other.vertices.iter().cloned());
        merge_adjacency(&mut self.up, &other.up);
        merge_adjacency(&mut self.down, &other.down);
    }
}

impl PartialEq for Dag {
    fn eq(&self, other: &Self) -> bool {
        self.vertices == other.vertices && weighted_edges(&self.down) == weighted_edges(&other.down)
    }
}

impl Eq for Dag {}

fn neighbours<'a>(index: &'a Adjacency, id: &str) -> impl Iterator<Item = &'a str> {
    index
        .get(id)
        .into_iter()
        .flat_map(|bucket| bucket.keys().map(String::as_str))
}

/// Drop `neighbour` from `index[owner]`, removing the bucket once empty.
fn detach(index: &mut Adjacency, owner: &str, neighbour: &str) {
    if let Some(bucket) = index.get_mut(owner) {
        bucket.remove(neighbour);
        if bucket.is_empty() {
            index.remove(owner);
        }
    }
}

fn closure(index: &Adjacency, start: &str) -> HashSet<VertexId> {
    let mut found: HashSet<VertexId> = HashSet::new();
    let mut stack: Vec<&str> = neighbours(index, start).collect();

    while let Some(vertex) = stack.pop() {
        if found.insert(vertex.to_string()) {
            stack.extend(neighbours(index, vertex));
        }
    }

    found
}

fn merge_adjacency(into: &mut Adjacency, from: &Adjacency) {
    for (vertex, bucket) in from {
        let target = into.entry(vertex.clone()).or_default();
        for (neighbour, weight) in bucket {
            target.insert(neighbour.clone(), *weight);
        }
    }
}

fn weighted_edges(index: &Adjacency) -> HashSet<(&str, &str, u32)> {
    index
        .iter()
        .flat_map(|(source, targets)| {
            targets
                .iter()
                .map(move |(target, weight)| (source.as_str(), target.as_str(), *weight))
        })
        .collect()
}
