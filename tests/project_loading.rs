// tests/project_loading.rs

use std::fs;
use std::path::Path;
use std::sync::Arc;

use sqldag::config::load_and_validate;
use sqldag::dag::execution_plan;
use sqldag::engine::{Scheduler, Status};
use sqldag::errors::SqldagError;
use sqldag::exec::{ModelRunner, adapter_for};
use sqldag::fs::{FileSystem, RealFileSystem};
use sqldag::load_selection;
use sqldag::project::Project;
use sqldag_test_utils::builders::ProjectBuilder;
use sqldag_test_utils::{init_tracing, with_timeout};
use tempfile::TempDir;

const SOURCES: &str = r#"
[[sources]]
name = "raw"
database = "raw_db"
schema = "public"
tables = ["orders", "customers"]
"#;

fn jaffle() -> ProjectBuilder {
    ProjectBuilder::new("jaffle")
        .model_file("sources.toml", SOURCES)
        .model_file("staging/stg_orders.sql", "select * from {{ source('raw', 'orders') }}")
        .model_file(
            "staging/stg_customers.sql",
            "select * from {{ source('raw', 'customers') }}",
        )
        .model(
            "customers",
            "{{ config(materialized='table') }}\nselect c.*, count(o.id) as orders\nfrom {{ ref('stg_customers') }} c\nleft join {{ ref('stg_orders') }} o using (customer_id)\ngroup by 1",
        )
        .model("customer_report", "select * from {{ ref('customers') }}")
}

fn load(builder: ProjectBuilder) -> sqldag::errors::Result<Project> {
    let (fs, root) = builder.build();
    let config = load_and_validate(&fs, &root, &root, None)?;
    Project::load(&fs, &root, &config)
}

#[test]
fn loads_models_from_nested_directories() {
    let project = load(jaffle()).unwrap();

    let names: Vec<&str> = project.models().map(|m| m.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["customer_report", "customers", "stg_customers", "stg_orders"]
    );
    assert_eq!(project.sources().len(), 2);

    let dag = project.build_dag().unwrap();
    assert_eq!(
        execution_plan(&dag).unwrap().last().map(String::as_str),
        Some("customer_report")
    );
}

#[test]
fn compiled_sql_uses_profile_database_and_schema() {
    let project = load(jaffle()).unwrap();
    let compiled = project.compile_model("customers").unwrap();

    assert_eq!(compiled.relation.to_string(), "warehouse.analytics.customers");
    assert!(compiled.sql.contains("from warehouse.analytics.stg_customers c"));
    assert!(
        compiled
            .statement()
            .starts_with("create or replace table warehouse.analytics.customers as\n")
    );
    assert_eq!(
        project.compile_model("stg_orders").unwrap().sql,
        "select * from raw_db.public.orders"
    );
}

#[test]
fn selection_from_loaded_project() {
    let (fs, root) = jaffle().build();
    let config = load_and_validate(&fs, &root, &root, None).unwrap();

    let (_, dag) = load_selection(&fs, &root, &config, Some("+customers")).unwrap();
    let mut selected: Vec<&str> = dag.vertices().collect();
    selected.sort();
    assert_eq!(selected, vec!["customers", "stg_customers", "stg_orders"]);

    let (_, dag) = load_selection(&fs, &root, &config, Some("stg_orders+")).unwrap();
    let mut selected: Vec<&str> = dag.vertices().collect();
    selected.sort();
    assert_eq!(selected, vec!["customer_report", "customers", "stg_orders"]);

    let err = load_selection(&fs, &root, &config, Some("nope")).unwrap_err();
    assert!(matches!(err, SqldagError::Selector(_)));
}

#[test]
fn duplicate_model_names_fail() {
    let err = load(
        ProjectBuilder::new("p")
            .model("a", "select 1")
            .model_file("nested/a.sql", "select 2"),
    )
    .unwrap_err();
    assert!(matches!(err, SqldagError::DuplicateModel { ref name, .. } if name == "a"));
}

#[test]
fn unknown_ref_and_source_fail() {
    let err = load(ProjectBuilder::new("p").model("a", "select * from {{ ref('b') }}")).unwrap_err();
    assert!(matches!(err, SqldagError::UnknownRef { ref model, ref target } if model == "a" && target == "b"));

    let err = load(
        ProjectBuilder::new("p").model("a", "select * from {{ source('raw', 'orders') }}"),
    )
    .unwrap_err();
    assert!(matches!(err, SqldagError::UnknownSource { .. }));
}

#[test]
fn circular_refs_fail_at_graph_build() {
    let project = load(
        ProjectBuilder::new("p")
            .model("a", "select * from {{ ref('c') }}")
            .model("b", "select * from {{ ref('a') }}")
            .model("c", "select * from {{ ref('b') }}"),
    )
    .unwrap();

    match project.build_dag() {
        Err(SqldagError::DagCycle(path)) => {
            for name in ["a", "b", "c"] {
                assert!(path.contains(name), "{path}");
            }
        }
        other => panic!("expected cycle error, got {other:?}"),
    }
}

#[tokio::test]
async fn dry_run_adapter_runs_whole_project() {
    init_tracing();
    let (fs, root) = jaffle().build();
    let config = load_and_validate(&fs, &root, &root, None).unwrap();
    let (project, dag) = load_selection(&fs, &root, &config, None).unwrap();

    let runner = Arc::new(ModelRunner::new(
        Arc::new(project),
        adapter_for(&config.output).unwrap(),
    ));
    let report = with_timeout(Scheduler::new(config.output.threads).run(dag, runner))
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 4);
    assert!(report.succeeded());
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn shell_adapter_failure_skips_downstream_models() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let log = root.join("statements.log");

    // Append every statement to a log; fail whenever it mentions `broken`.
    let command = format!(
        "tee -a {} | grep -q broken && {{ echo 'relation is broken' >&2; exit 1; }} || exit 0",
        log.display()
    );
    let builder = ProjectBuilder::new("p")
        .shell(&command.replace('"', "\\\""))
        .threads(2);
    write(root, "sqldag_project.toml", &builder.project_toml());
    write(root, "profiles.toml", &builder.profiles_toml());
    write(root, "models/ok.sql", "select 1");
    write(root, "models/broken.sql", "select 2");
    write(root, "models/after_broken.sql", "select * from {{ ref('broken') }}");

    let real_fs = RealFileSystem;
    assert!(real_fs.is_file(&root.join("models/ok.sql")));
    let config = load_and_validate(&real_fs, root, root, None).unwrap();
    let (project, dag) = load_selection(&real_fs, root, &config, None).unwrap();
    let runner = Arc::new(ModelRunner::new(
        Arc::new(project),
        adapter_for(&config.output).unwrap(),
    ));

    let report = with_timeout(Scheduler::new(2).run(dag, runner)).await.unwrap();

    assert_eq!(report.outcome_of("ok").unwrap().status, Status::Ok);
    let broken = report.outcome_of("broken").unwrap();
    assert_eq!(broken.status, Status::Error);
    assert!(broken.description.contains("relation is broken"));
    assert_eq!(report.outcome_of("after_broken").unwrap().status, Status::Skipped);

    let logged = fs::read_to_string(&log).unwrap();
    assert!(logged.contains("create or replace view warehouse.analytics.ok as"));
    assert!(!logged.contains("after_broken"));
}
