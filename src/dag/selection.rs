// src/dag/selection.rs

//! Selector expressions: turning `"+orders customers+"` into a sub-graph.
//!
//! A selector is a whitespace-separated list of tokens:
//!
//! | token     | selects                                   |
//! |-----------|-------------------------------------------|
//! | `name`    | just `name`                               |
//! | `+name`   | `name` and all of its ancestors           |
//! | `name+`   | `name` and all of its descendants         |
//! | `+name+`  | `name`, its ancestors and its descendants |
//!
//! Each token yields the induced sub-graph of the base graph on the
//! selected vertices; the per-token sub-graphs are then unioned. An empty
//! selector selects the whole graph.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::dag::graph::{Dag, VertexId};
use crate::errors::{Result, SqldagError};

/// One parsed selector token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorToken {
    pub name: VertexId,
    /// Leading `+`: include upstream closure.
    pub ancestors: bool,
    /// Trailing `+`: include downstream closure.
    pub descendants: bool,
}

impl SelectorToken {
    fn parse(raw: &str) -> Result<Self> {
        let (rest, ancestors) = match raw.strip_prefix('+') {
            Some(rest) => (rest, true),
            None => (raw, false),
        };
        let (name, descendants) = match rest.strip_suffix('+') {
            Some(name) => (name, true),
            None => (rest, false),
        };

        if name.is_empty() {
            return Err(SqldagError::Selector(format!(
                "token '{raw}' does not name a model"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            ancestors,
            descendants,
        })
    }

    /// Vertices this token keeps when applied to `dag`.
    fn targets(&self, dag: &Dag) -> HashSet<VertexId> {
        let mut keep = HashSet::new();
        keep.insert(self.name.clone());
        if self.ancestors {
            keep.extend(dag.ancestors_of(&self.name));
        }
        if self.descendants {
            keep.extend(dag.descendants_of(&self.name));
        }
        keep
    }
}

impl fmt::Display for SelectorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ancestors {
            f.write_str("+")?;
        }
        f.write_str(&self.name)?;
        if self.descendants {
            f.write_str("+")?;
        }
        Ok(())
    }
}

/// A parsed selector expression.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selector {
    tokens: Vec<SelectorToken>,
}

impl Selector {
    /// Parse a selector. This only checks syntax; names are checked against
    /// a graph in [`Selector::apply`].
    pub fn parse(expr: &str) -> Result<Self> {
        let tokens = expr
            .split_whitespace()
            .map(SelectorToken::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { tokens })
    }

    /// `true` if the selector selects everything.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[SelectorToken] {
        &self.tokens
    }

    /// Evaluate the selector against `dag`, returning a new independent graph.
    ///
    /// Every token is checked for membership first; if any name is unknown
    /// nothing is evaluated.
    pub fn apply(&self, dag: &Dag) -> Result<Dag> {
        if self.is_empty() {
            return Ok(dag.copy());
        }

        let unknown: Vec<&str> = self
            .tokens
            .iter()
            .filter(|t| !dag.contains(&t.name))
            .map(|t| t.name.as_str())
            .collect();
        if !unknown.is_empty() {
            return Err(SqldagError::Selector(format!(
                "unknown model(s): {}",
                unknown.join(", ")
            )));
        }

        let mut selected = Dag::new();
        for token in &self.tokens {
            let keep = token.targets(dag);
            let mut sub = dag.copy();
            let drop: Vec<VertexId> = sub
                .vertices()
                .filter(|v| !keep.contains(*v))
                .map(str::to_string)
                .collect();
            for vertex in &drop {
                sub.remove_vertex(vertex);
            }
            debug!(token = %token, selected = sub.len(), "applied selector token");
            selected.union(&sub);
        }

        Ok(selected)
    }
}

impl FromStr for Selector {
    type Err = SqldagError;

    fn from_str(s: &str) -> Result<Self> {
        Selector::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.tokens.iter().map(|t| t.to_string()).collect();
        f.write_str(&parts.join(" "))
    }
}

impl Dag {
    /// Parse and apply a selector expression in one step.
    pub fn select(&self, expr: &str) -> Result<Dag> {
        Selector::parse(expr)?.apply(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Dag {
        let mut dag = Dag::new();
        dag.add_edge("A", "B");
        dag.add_edge("B", "C");
        dag
    }

    fn names(dag: &Dag) -> Vec<String> {
        let mut v: Vec<String> = dag.vertices().map(str::to_string).collect();
        v.sort();
        v
    }

    fn edge(s: &str, t: &str) -> (String, String) {
        (s.to_string(), t.to_string())
    }

    #[test]
    fn parses_plus_markers() {
        let selector = Selector::parse("  a +b c+ +d+ ").unwrap();
        let flags: Vec<(bool, bool)> = selector
            .tokens()
            .iter()
            .map(|t| (t.ancestors, t.descendants))
            .collect();
        assert_eq!(flags, vec![(false, false), (true, false), (false, true), (true, true)]);
        assert_eq!(selector.to_string(), "a +b c+ +d+");
    }

    #[test]
    fn rejects_tokens_without_a_name() {
        assert!(matches!(Selector::parse("+"), Err(SqldagError::Selector(_))));
        assert!(matches!(Selector::parse("a ++"), Err(SqldagError::Selector(_))));
    }

    #[test]
    fn bare_name_selects_singleton() {
        let selected = chain().select("B").unwrap();
        assert_eq!(names(&selected), vec!["B"]);
        assert!(selected.edges().is_empty());
    }

    #[test]
    fn leading_plus_selects_upstream() {
        let selected = chain().select("+B").unwrap();
        assert_eq!(names(&selected), vec!["A", "B"]);
        assert_eq!(selected.edges(), vec![edge("A", "B")]);
    }

    #[test]
    fn trailing_plus_on_leaf_selects_only_leaf() {
        let selected = chain().select("C+").unwrap();
        assert_eq!(names(&selected), vec!["C"]);
    }

    #[test]
    fn both_markers_select_both_closures() {
        let selected = chain().select("+B+").unwrap();
        assert_eq!(names(&selected), vec!["A", "B", "C"]);
        assert_eq!(selected.edges(), vec![edge("A", "B"), edge("B", "C")]);
    }

    #[test]
    fn empty_selector_is_identity() {
        let base = chain();
        assert_eq!(base.select("").unwrap(), base);
        assert_eq!(base.select("   ").unwrap(), base);
    }

    #[test]
    fn tokens_are_unioned_without_bridging_edges() {
        let selected = chain().select("+B C+").unwrap();
        assert_eq!(names(&selected), vec!["A", "B", "C"]);
        assert_eq!(selected.edges(), vec![edge("A", "B")]);
    }

    #[test]
    fn unknown_names_are_rejected_before_evaluation() {
        let err = chain().select("+B nope other+").unwrap_err();
        match err {
            SqldagError::Selector(msg) => {
                assert!(msg.contains("nope"));
                assert!(msg.contains("other"));
            }
            other => panic!("expected selector error, got {other:?}"),
        }
    }

    #[test]
    fn selection_does_not_touch_base_graph() {
        let base = chain();
        let before = base.copy();
        let _ = base.select("B").unwrap();
        assert_eq!(base, before);
    }

    #[test]
    fn downstream_selection_keeps_diamond_edges() {
        let mut dag = Dag::new();
        dag.add_edge("A", "B");
        dag.add_edge("A", "C");
        dag.add_edge("B", "D");
        dag.add_edge("C", "D");
        dag.add_vertex("E");

        let selected = dag.select("B+ C").unwrap();
        assert_eq!(names(&selected), vec!["B", "C", "D"]);
        assert_eq!(selected.edges(), vec![edge("B", "D")]);
    }
}
