//! Input records on disk: courses, skills, skill metadata, horses and race parameters.

pub mod catalog;
pub mod loader;
pub mod validate;

use std::path::PathBuf;

use thiserror::Error;

use crate::race::InvariantError;

pub use catalog::{Dataset, SkillCatalog};
pub use loader::{
    data_dir_from_env, load_courses, load_horses, load_race_parameters, load_records, load_single,
    load_skill_meta, load_skills, DEFAULT_DATA_DIR,
};
pub use validate::{validate_dataset, ValidationDiagnostic, ValidationReport, ValidationSeverity};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("unable to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse yaml '{path}': {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("unable to parse json '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported data file extension: '{0}'")]
    UnsupportedFormat(PathBuf),
    #[error("no {kind} named '{name}'")]
    NotFound { kind: &'static str, name: String },
    #[error(transparent)]
    Invariant(#[from] InvariantError),
}
