use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// How a model's compiled `select` is persisted in the data store.
///
/// - `View` (default): `create or replace view <relation> as ...`
/// - `Table`: `create or replace table <relation> as ...`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Materialization {
    #[default]
    View,
    Table,
}

impl FromStr for Materialization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "view" => Ok(Materialization::View),
            "table" => Ok(Materialization::Table),
            other => Err(format!(
                "invalid materialization: {other} (expected \"view\" or \"table\")"
            )),
        }
    }
}

impl fmt::Display for Materialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Materialization::View => "view",
            Materialization::Table => "table",
        };
        f.write_str(s)
    }
}

/// Which adapter executes statements for a profile output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    /// Pipe each statement into the stdin of a shell command
    /// (e.g. `sqlite3 warehouse.db` or `psql -v ON_ERROR_STOP=1`).
    Shell,
    /// Log statements without executing anything.
    DryRun,
}

/// Order in which a batch of newly eligible vertices is handed to workers.
///
/// The scheduler only guarantees that a vertex is dispatched after all of
/// its ancestors; among independent vertices order is unspecified unless
/// `Lexical` is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    #[default]
    Unordered,
    Lexical,
}
