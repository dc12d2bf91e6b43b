#![allow(dead_code)]

use std::path::PathBuf;

use sqldag::dag::Dag;
use sqldag::fs::mock::MockFileSystem;

/// Build a `Dag` from `(parent, child)` pairs plus isolated vertices.
#[derive(Debug, Default)]
pub struct DagBuilder {
    dag: Dag,
}

impl DagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex(mut self, id: &str) -> Self {
        self.dag.add_vertex(id);
        self
    }

    pub fn edge(mut self, parent: &str, child: &str) -> Self {
        self.dag.add_edge(parent, child);
        self
    }

    /// Add `a -> b -> c -> ...` for consecutive names.
    pub fn chain(mut self, ids: &[&str]) -> Self {
        for id in ids {
            self.dag.add_vertex(*id);
        }
        for pair in ids.windows(2) {
            self.dag.add_edge(pair[0], pair[1]);
        }
        self
    }

    pub fn build(self) -> Dag {
        self.dag
    }
}

/// Shorthand for `DagBuilder` with edges only.
pub fn dag_from_edges(edges: &[(&str, &str)]) -> Dag {
    edges
        .iter()
        .fold(DagBuilder::new(), |b, (p, c)| b.edge(p, c))
        .build()
}

/// In-memory project layout:
///
/// ```text
/// <root>/sqldag_project.toml
/// <root>/profiles.toml
/// <root>/models/...
/// ```
pub struct ProjectBuilder {
    root: PathBuf,
    name: String,
    adapter: String,
    command: Option<String>,
    threads: usize,
    models: Vec<(String, String)>,
}

impl ProjectBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            root: PathBuf::from("/project"),
            name: name.to_string(),
            adapter: "dry_run".to_string(),
            command: None,
            threads: 2,
            models: Vec::new(),
        }
    }

    /// `models/<name>.sql`
    pub fn model(mut self, name: &str, sql: &str) -> Self {
        self.models.push((format!("{name}.sql"), sql.to_string()));
        self
    }

    /// Any file below `models/` (nested paths are fine).
    pub fn model_file(mut self, rel_path: &str, content: &str) -> Self {
        self.models.push((rel_path.to_string(), content.to_string()));
        self
    }

    pub fn shell(mut self, command: &str) -> Self {
        self.adapter = "shell".to_string();
        self.command = Some(command.to_string());
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn project_toml(&self) -> String {
        format!(
            "[project]\nname = \"{}\"\nprofile = \"test\"\nmodel_paths = [\"models\"]\n",
            self.name
        )
    }

    pub fn profiles_toml(&self) -> String {
        let mut out = format!(
            "[test]\ntarget = \"dev\"\n\n[test.outputs.dev]\ntype = \"{}\"\nthreads = {}\ndatabase = \"warehouse\"\nschema = \"analytics\"\n",
            self.adapter, self.threads
        );
        if let Some(cmd) = &self.command {
            out.push_str(&format!("command = \"{cmd}\"\n"));
        }
        out
    }

    pub fn build(self) -> (MockFileSystem, PathBuf) {
        let fs = MockFileSystem::new();
        fs.add_file(self.root.join("sqldag_project.toml"), self.project_toml());
        fs.add_file(self.root.join("profiles.toml"), self.profiles_toml());
        fs.add_dir(self.root.join("models"));
        for (rel, content) in &self.models {
            fs.add_file(self.root.join("models").join(rel), content.as_str());
        }
        (fs, self.root)
    }
}
