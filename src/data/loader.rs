//! YAML/JSON record loaders. The format is picked from the file extension.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::data::DataError;
use crate::race::{Course, HorseDescriptor, RaceParameters, SkillDescriptor, SkillMeta};

pub const DEFAULT_DATA_DIR: &str = "data";

/// `RACESIM_DATA_DIR`, or `data` relative to the working directory.
pub fn data_dir_from_env() -> PathBuf {
    std::env::var("RACESIM_DATA_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

fn parse<T: DeserializeOwned>(path: &Path, raw: &str) -> Result<T, DataError> {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("yaml") | Some("yml") => serde_yaml::from_str(raw).map_err(|source| DataError::Yaml {
            path: path.to_path_buf(),
            source,
        }),
        Some("json") => serde_json::from_str(raw).map_err(|source| DataError::Json {
            path: path.to_path_buf(),
            source,
        }),
        _ => Err(DataError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Loads one record of any deserializable type.
pub fn load_single<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, DataError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(path, &raw)
}

/// Loads a top-level list of records.
pub fn load_records<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>, DataError> {
    load_single(path)
}

/// Loads and validates a course list. Unsorted geometry is rejected, never reordered.
pub fn load_courses(path: impl AsRef<Path>) -> Result<Vec<Course>, DataError> {
    let courses: Vec<Course> = load_records(path)?;
    for course in &courses {
        course.validate()?;
    }
    Ok(courses)
}

pub fn load_skills(path: impl AsRef<Path>) -> Result<Vec<SkillDescriptor>, DataError> {
    load_records(path)
}

pub fn load_skill_meta(path: impl AsRef<Path>) -> Result<Vec<SkillMeta>, DataError> {
    load_records(path)
}

pub fn load_horses(path: impl AsRef<Path>) -> Result<Vec<HorseDescriptor>, DataError> {
    load_records(path)
}

pub fn load_race_parameters(path: impl AsRef<Path>) -> Result<RaceParameters, DataError> {
    load_single(path)
}
