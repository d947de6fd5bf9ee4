//! In-memory lookup tables built once from the loaded records and shared read-only.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::data::loader::{load_courses, load_horses, load_race_parameters, load_skill_meta, load_skills};
use crate::data::DataError;
use crate::race::{Course, HorseDescriptor, RaceParameters, SkillDescriptor, SkillMeta};

/// Skill descriptors keyed by id, plus optional shop metadata.
#[derive(Debug, Clone, Default)]
pub struct SkillCatalog {
    skills: BTreeMap<String, SkillDescriptor>,
    meta: HashMap<String, SkillMeta>,
}

impl SkillCatalog {
    pub fn new(skills: Vec<SkillDescriptor>, meta: Vec<SkillMeta>) -> Self {
        let mut catalog = SkillCatalog::default();
        for skill in skills {
            catalog.insert(skill);
        }
        for entry in meta {
            catalog.meta.insert(entry.id.clone(), entry);
        }
        catalog
    }

    pub fn insert(&mut self, skill: SkillDescriptor) {
        if let Some(previous) = self.skills.insert(skill.id.clone(), skill) {
            warn!(skill = %previous.id, "duplicate skill id; keeping the later record");
        }
    }

    pub fn get(&self, id: &str) -> Option<&SkillDescriptor> {
        self.skills.get(id)
    }

    pub fn meta(&self, id: &str) -> Option<&SkillMeta> {
        self.meta.get(id)
    }

    pub fn meta_ids(&self) -> impl Iterator<Item = &str> {
        self.meta.keys().map(String::as_str)
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.skills.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SkillDescriptor> {
        self.skills.values()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

/// Everything under one data directory.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub courses: Vec<Arc<Course>>,
    pub skills: SkillCatalog,
    pub horses: Vec<HorseDescriptor>,
    pub params: RaceParameters,
}

impl Dataset {
    /// Loads `courses.yaml`, `skills.yaml`, `skill_meta.json`, `horses.yaml` and `params.yaml`.
    /// Missing metadata, horses or parameters fall back to empty/default; courses and skills are required.
    pub fn load(dir: impl AsRef<Path>) -> Result<Dataset, DataError> {
        let dir = dir.as_ref();
        let courses = load_courses(dir.join("courses.yaml"))?
            .into_iter()
            .map(Arc::new)
            .collect::<Vec<_>>();
        let skills = load_skills(dir.join("skills.yaml"))?;

        let meta_path = dir.join("skill_meta.json");
        let meta = if meta_path.is_file() {
            load_skill_meta(&meta_path)?
        } else {
            Vec::new()
        };
        let horses_path = dir.join("horses.yaml");
        let horses = if horses_path.is_file() {
            load_horses(&horses_path)?
        } else {
            Vec::new()
        };
        let params_path = dir.join("params.yaml");
        let params = if params_path.is_file() {
            load_race_parameters(&params_path)?
        } else {
            RaceParameters::default()
        };

        debug!(
            dir = %dir.display(),
            courses = courses.len(),
            skills = skills.len(),
            horses = horses.len(),
            "dataset loaded"
        );
        Ok(Dataset {
            courses,
            skills: SkillCatalog::new(skills, meta),
            horses,
            params,
        })
    }

    pub fn course(&self, id: u32) -> Result<Arc<Course>, DataError> {
        self.courses
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| DataError::NotFound {
                kind: "course",
                name: id.to_string(),
            })
    }

    /// Case-insensitive lookup by horse name.
    pub fn horse(&self, name: &str) -> Result<&HorseDescriptor, DataError> {
        self.horses
            .iter()
            .find(|h| h.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(name)))
            .ok_or_else(|| DataError::NotFound {
                kind: "horse",
                name: name.to_string(),
            })
    }
}
