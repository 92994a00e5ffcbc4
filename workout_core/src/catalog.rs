//! Read-only exercise catalog lookup.
//!
//! Sessions never hold a reference into the catalog. When an exercise is
//! added, its name is looked up once and copied into the session.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The part of a catalog entry the tracker needs
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogExercise {
    pub id: Uuid,
    pub name: String,
}

/// Lookup of exercises by id
pub trait ExerciseCatalog {
    fn lookup(&self, id: Uuid) -> Option<CatalogExercise>;
}

/// In-memory catalog
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog {
    exercises: HashMap<Uuid, CatalogExercise>,
}

impl StaticCatalog {
    pub fn new(entries: impl IntoIterator<Item = CatalogExercise>) -> Self {
        Self {
            exercises: entries.into_iter().map(|e| (e.id, e)).collect(),
        }
    }

    /// Entries sorted by name
    pub fn entries(&self) -> Vec<&CatalogExercise> {
        let mut entries: Vec<_> = self.exercises.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    /// Check that every entry has a non-nil id and a non-blank, unique name
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut names = HashMap::new();

        for (id, entry) in &self.exercises {
            if id.is_nil() {
                errors.push(format!("Exercise '{}' has an empty id", entry.name));
            }
            if entry.name.trim().is_empty() {
                errors.push(format!("Exercise {} has a blank name", id));
            }
            if let Some(other) = names.insert(entry.name.to_lowercase(), *id) {
                errors.push(format!(
                    "Exercises {} and {} share the name '{}'",
                    other, id, entry.name
                ));
            }
        }

        errors
    }
}

impl ExerciseCatalog for StaticCatalog {
    fn lookup(&self, id: Uuid) -> Option<CatalogExercise> {
        self.exercises.get(&id).cloned()
    }
}

impl<C: ExerciseCatalog + ?Sized> ExerciseCatalog for &C {
    fn lookup(&self, id: Uuid) -> Option<CatalogExercise> {
        (**self).lookup(id)
    }
}

/// Cached built-in catalog
static DEFAULT_CATALOG: Lazy<StaticCatalog> = Lazy::new(build_default_catalog);

/// Shared reference to the built-in catalog
pub fn get_default_catalog() -> &'static StaticCatalog {
    &DEFAULT_CATALOG
}

/// Builds the built-in catalog. Ids are stable across runs.
pub fn build_default_catalog() -> StaticCatalog {
    const BUILT_IN: [(u128, &str); 10] = [
        (0x0001, "Back Squat"),
        (0x0002, "Bench Press"),
        (0x0003, "Deadlift"),
        (0x0004, "Overhead Press"),
        (0x0005, "Barbell Row"),
        (0x0006, "Pull-up"),
        (0x0007, "Push-up"),
        (0x0008, "Plank"),
        (0x0009, "Running"),
        (0x000a, "Rowing Machine"),
    ];

    StaticCatalog::new(BUILT_IN.iter().map(|(n, name)| CatalogExercise {
        id: Uuid::from_u128(0x6578_0000_0000_4000_8000_0000_0000_0000 | n),
        name: (*name).to_string(),
    }))
}
