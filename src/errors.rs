// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqldagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Duplicate model name '{name}' ({first} and {second})")]
    DuplicateModel {
        name: String,
        first: String,
        second: String,
    },

    #[error("Model '{model}' references unknown model '{target}'")]
    UnknownRef { model: String, target: String },

    #[error("Model '{model}' references unknown source '{namespace}.{table}'")]
    UnknownSource {
        model: String,
        namespace: String,
        table: String,
    },

    #[error("Template error in model '{model}': {message}")]
    Template { model: String, message: String },

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SqldagError>;
