// src/config/mod.rs

//! Project, profile and source configuration.
//!
//! - [`model`] holds the serde structs for the TOML files.
//! - [`validate`] turns raw files into checked configuration.
//! - [`loader`] reads the files through a [`crate::fs::FileSystem`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_profiles_dir, load_and_validate, load_sources_file};
pub use model::{
    OutputConfig, PROFILES_FILE, PROJECT_FILE, ProfileSection, ProjectConfig, ProjectFile,
    ProjectSection, RawProfilesFile, RawProjectFile, SourceConfig, SourcesFile,
};
