// src/project/resolver.rs

//! Name resolution for `ref()` and `source()` calls.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::errors::{Result, SqldagError};
use crate::project::template::TemplateContext;
use crate::project::{Model, ModelConfig};
use crate::types::Materialization;

/// Fully qualified name of an object in the data store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Relation {
    pub database: String,
    pub schema: String,
    pub object: String,
}

impl Relation {
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            object: object.into(),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.schema, self.object)
    }
}

/// Declared sources keyed by `(namespace, table)`.
pub type SourceMap = BTreeMap<(String, String), Relation>;

fn lookup_source(model: &str, sources: &SourceMap, namespace: &str, table: &str) -> Result<Relation> {
    sources
        .get(&(namespace.to_string(), table.to_string()))
        .cloned()
        .ok_or_else(|| SqldagError::UnknownSource {
            model: model.to_string(),
            namespace: namespace.to_string(),
            table: table.to_string(),
        })
}

/// Context used while loading: records the parents and `config()` of one
/// model.
///
/// Aliases of other models are not known yet at this point, so `ref()`
/// renders a placeholder relation named after the model. The rendered SQL
/// of this pass is discarded.
pub struct DiscoveryContext<'a> {
    model: &'a str,
    known_models: &'a BTreeSet<String>,
    sources: &'a SourceMap,
    database: &'a str,
    schema: &'a str,
    pub parents: BTreeSet<String>,
    pub config: ModelConfig,
}

impl<'a> DiscoveryContext<'a> {
    pub fn new(
        model: &'a str,
        known_models: &'a BTreeSet<String>,
        sources: &'a SourceMap,
        database: &'a str,
        schema: &'a str,
    ) -> Self {
        Self {
            model,
            known_models,
            sources,
            database,
            schema,
            parents: BTreeSet::new(),
            config: ModelConfig::default(),
        }
    }
}

impl TemplateContext for DiscoveryContext<'_> {
    fn resolve_ref(&mut self, name: &str) -> Result<Relation> {
        if !self.known_models.contains(name) {
            return Err(SqldagError::UnknownRef {
                model: self.model.to_string(),
                target: name.to_string(),
            });
        }
        self.parents.insert(name.to_string());
        Ok(Relation::new(self.database, self.schema, name))
    }

    fn resolve_source(&mut self, namespace: &str, table: &str) -> Result<Relation> {
        lookup_source(self.model, self.sources, namespace, table)
    }

    fn set_config(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "materialized" => {
                self.config.materialized =
                    value
                        .parse::<Materialization>()
                        .map_err(|message| SqldagError::Template {
                            model: self.model.to_string(),
                            message,
                        })?;
            }
            "alias" => {
                if value.trim().is_empty() {
                    return Err(SqldagError::Template {
                        model: self.model.to_string(),
                        message: "alias must not be empty".to_string(),
                    });
                }
                self.config.alias = Some(value.to_string());
            }
            other => {
                return Err(SqldagError::Template {
                    model: self.model.to_string(),
                    message: format!("unknown config key '{other}'"),
                });
            }
        }
        Ok(())
    }
}

/// Context used to produce executable SQL once every model is loaded.
///
/// `ref()` resolves to the target's final relation (honouring its alias).
/// `config()` was already applied during discovery and is ignored here.
pub struct LookupContext<'a> {
    model: &'a str,
    models: &'a BTreeMap<String, Model>,
    sources: &'a SourceMap,
    database: &'a str,
    schema: &'a str,
}

impl<'a> LookupContext<'a> {
    pub fn new(
        model: &'a str,
        models: &'a BTreeMap<String, Model>,
        sources: &'a SourceMap,
        database: &'a str,
        schema: &'a str,
    ) -> Self {
        Self {
            model,
            models,
            sources,
            database,
            schema,
        }
    }
}

impl TemplateContext for LookupContext<'_> {
    fn resolve_ref(&mut self, name: &str) -> Result<Relation> {
        let target = self.models.get(name).ok_or_else(|| SqldagError::UnknownRef {
            model: self.model.to_string(),
            target: name.to_string(),
        })?;
        Ok(Relation::new(self.database, self.schema, target.object_name()))
    }

    fn resolve_source(&mut self, namespace: &str, table: &str) -> Result<Relation> {
        lookup_source(self.model, self.sources, namespace, table)
    }

    fn set_config(&mut self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }
}
