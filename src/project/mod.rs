// src/project/mod.rs

//! Loaded project: models, sources and the dependency graph between them.
//!
//! Loading happens in two passes:
//!
//! 1. [`discover::discover`] finds every model and source file.
//! 2. Each model is compiled with a [`resolver::DiscoveryContext`] that
//!    records `ref()` targets and `config()` calls.
//!
//! Executable SQL is produced later by [`Project::compile_model`] through a
//! [`resolver::LookupContext`], once every alias is known.

pub mod discover;
pub mod resolver;
pub mod template;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::ProjectConfig;
use crate::dag::Dag;
use crate::errors::{Result, SqldagError};
use crate::fs::FileSystem;
use crate::project::discover::{Discovered, discover};
use crate::project::resolver::{DiscoveryContext, LookupContext, SourceMap};
use crate::project::template::compile;
use crate::types::Materialization;

pub use resolver::Relation;

/// Settings a model declares about itself through `config(...)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelConfig {
    pub materialized: Materialization,
    /// Object name to materialize as, instead of the model name.
    pub alias: Option<String>,
}

/// One model (a `*.sql` file).
#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    /// `model.<project>.<name>`
    pub unique_id: String,
    pub path: PathBuf,
    pub raw_sql: String,
    pub config: ModelConfig,
    /// Models this one selects from.
    pub parents: BTreeSet<String>,
    /// Models selecting from this one.
    pub children: BTreeSet<String>,
}

impl Model {
    /// Object name in the target schema.
    pub fn object_name(&self) -> &str {
        self.config.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A model rendered to executable SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModel {
    pub name: String,
    pub relation: Relation,
    pub materialization: Materialization,
    /// The rendered `select`.
    pub sql: String,
}

impl CompiledModel {
    /// DDL that materializes the model.
    pub fn statement(&self) -> String {
        format!(
            "create or replace {} {} as\n{}",
            self.materialization, self.relation, self.sql
        )
    }
}

#[derive(Debug, Clone)]
pub struct Project {
    name: String,
    database: String,
    schema: String,
    models: BTreeMap<String, Model>,
    sources: SourceMap,
}

impl Project {
    /// Discover and link every model below the configured model paths.
    pub fn load(fs: &dyn FileSystem, root: &Path, config: &ProjectConfig) -> Result<Self> {
        let discovered = discover(fs, root, &config.project.model_paths)?;
        let project = Self::from_discovered(
            &config.project.name,
            &config.output.database,
            &config.output.schema,
            discovered,
        )?;
        info!(
            project = %project.name,
            models = project.models.len(),
            sources = project.sources.len(),
            "project loaded"
        );
        Ok(project)
    }

    /// Link already discovered files: resolve every `ref()`/`source()` and
    /// apply `config()`.
    pub fn from_discovered(
        name: &str,
        database: &str,
        schema: &str,
        discovered: Discovered,
    ) -> Result<Self> {
        let known: BTreeSet<String> = discovered.models.keys().cloned().collect();
        let mut models = BTreeMap::new();

        for (model_name, file) in discovered.models {
            let mut ctx =
                DiscoveryContext::new(&model_name, &known, &discovered.sources, database, schema);
            compile(&model_name, &file.raw_sql, &mut ctx)?;
            debug!(model = %model_name, parents = ?ctx.parents, "resolved model references");

            let model = Model {
                unique_id: format!("model.{name}.{model_name}"),
                name: model_name.clone(),
                path: file.path,
                raw_sql: file.raw_sql,
                config: ctx.config,
                parents: ctx.parents,
                children: BTreeSet::new(),
            };
            models.insert(model_name, model);
        }

        let edges: Vec<(String, String)> = models
            .values()
            .flat_map(|m| m.parents.iter().map(|p| (p.clone(), m.name.clone())))
            .collect();
        for (parent, child) in edges {
            if let Some(model) = models.get_mut(&parent) {
                model.children.insert(child);
            }
        }

        Ok(Self {
            name: name.to_string(),
            database: database.to_string(),
            schema: schema.to_string(),
            models,
            sources: discovered.sources,
        })
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    pub fn sources(&self) -> &SourceMap {
        &self.sources
    }

    /// Relation a model materializes into.
    pub fn relation_of(&self, name: &str) -> Option<Relation> {
        self.models
            .get(name)
            .map(|m| Relation::new(&self.database, &self.schema, m.object_name()))
    }

    /// Dependency graph with one vertex per model and an edge
    /// `parent -> child` for every `ref()`.
    ///
    /// Fails with [`SqldagError::DagCycle`] if the references are circular.
    pub fn build_dag(&self) -> Result<Dag> {
        let mut dag = Dag::new();
        for model in self.models.values() {
            dag.add_vertex(model.name.clone());
            for parent in &model.parents {
                dag.add_edge(parent.clone(), model.name.clone());
            }
        }

        if let Some(cycle) = dag.find_cycle() {
            return Err(SqldagError::DagCycle(cycle.join(" -> ")));
        }
        Ok(dag)
    }

    /// Render a model to executable SQL.
    pub fn compile_model(&self, name: &str) -> Result<CompiledModel> {
        let model = self
            .models
            .get(name)
            .ok_or_else(|| SqldagError::Execution(format!("unknown model '{name}'")))?;

        let mut ctx = LookupContext::new(
            name,
            &self.models,
            &self.sources,
            &self.database,
            &self.schema,
        );
        let sql = compile(name, &model.raw_sql, &mut ctx)?;

        Ok(CompiledModel {
            name: name.to_string(),
            relation: Relation::new(&self.database, &self.schema, model.object_name()),
            materialization: model.config.materialized,
            sql: sql.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn load(files: &[(&str, &str)]) -> Result<Project> {
        let fs = MockFileSystem::new();
        fs.add_dir("/p/models");
        for (path, content) in files {
            fs.add_file(Path::new("/p/models").join(path), *content);
        }
        let discovered = discover(&fs, Path::new("/p"), &["models".to_string()])?;
        Project::from_discovered("shop", "db", "analytics", discovered)
    }

    #[test]
    fn links_parents_and_children() {
        let project = load(&[
            ("a.sql", "select 1"),
            ("b.sql", "select * from {{ ref('a') }}"),
            ("c.sql", "select * from {{ ref('a') }} join {{ ref('b') }} using (id)"),
        ])
        .unwrap();

        let a = project.model("a").unwrap();
        assert_eq!(a.unique_id, "model.shop.a");
        assert!(a.parents.is_empty());
        assert_eq!(a.children, BTreeSet::from(["b".to_string(), "c".to_string()]));
        assert_eq!(
            project.model("c").unwrap().parents,
            BTreeSet::from(["a".to_string(), "b".to_string()])
        );

        let dag = project.build_dag().unwrap();
        assert_eq!(dag.len(), 3);
        assert_eq!(
            dag.edges(),
            vec![
                ("a".to_string(), "b".to_string()),
                ("a".to_string(), "c".to_string()),
                ("b".to_string(), "c".to_string()),
            ]
        );
    }

    #[test]
    fn cyclic_references_fail_graph_build() {
        let project = load(&[
            ("a.sql", "select * from {{ ref('b') }}"),
            ("b.sql", "select * from {{ ref('a') }}"),
        ])
        .unwrap();
        let err = project.build_dag().unwrap_err();
        assert!(matches!(err, SqldagError::DagCycle(_)));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let project = load(&[("a.sql", "select * from {{ ref('a') }}")]).unwrap();
        assert!(matches!(project.build_dag(), Err(SqldagError::DagCycle(_))));
    }

    #[test]
    fn compile_uses_target_alias() {
        let project = load(&[
            ("a.sql", "{{ config(alias='a_final', materialized='table') }}\nselect 1 as id"),
            ("b.sql", "select * from {{ ref('a') }}"),
        ])
        .unwrap();

        let a = project.compile_model("a").unwrap();
        assert_eq!(a.relation.to_string(), "db.analytics.a_final");
        assert_eq!(a.materialization, Materialization::Table);
        assert_eq!(
            a.statement(),
            "create or replace table db.analytics.a_final as\nselect 1 as id"
        );

        let b = project.compile_model("b").unwrap();
        assert_eq!(b.sql, "select * from db.analytics.a_final");
        assert_eq!(
            b.statement(),
            "create or replace view db.analytics.b as\nselect * from db.analytics.a_final"
        );
    }

    #[test]
    fn sources_resolve_to_declared_relations() {
        let project = load(&[
            (
                "sources.toml",
                "[[sources]]\nname = \"raw\"\ndatabase = \"raw_db\"\nschema = \"public\"\ntables = [\"orders\"]\n",
            ),
            ("stg_orders.sql", "select * from {{ source('raw', 'orders') }}"),
        ])
        .unwrap();

        let compiled = project.compile_model("stg_orders").unwrap();
        assert_eq!(compiled.sql, "select * from raw_db.public.orders");
        assert!(project.model("stg_orders").unwrap().parents.is_empty());
    }

    #[test]
    fn unknown_references_fail_loading() {
        let err = load(&[("a.sql", "select * from {{ ref('nope') }}")]).unwrap_err();
        assert!(matches!(err, SqldagError::UnknownRef { .. }));

        let err = load(&[("a.sql", "select * from {{ source('raw', 'x') }}")]).unwrap_err();
        assert!(matches!(err, SqldagError::UnknownSource { .. }));
    }
}
