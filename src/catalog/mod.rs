mod models;

use std::collections::BTreeMap;
use std::{fs, path::Path};

use tracing::debug;

pub use models::{CatalogFile, DistributionEntry, Settings};

use crate::http::RetrievalClient;
use crate::recipes::{Recipe, Resolution};
use crate::scheduler::Scheduler;

/// Ordered set of registered recipes. Insertion order is kept for display;
/// resolution does not depend on it.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    recipes: Vec<Recipe>,
    settings: Settings,
}

impl Catalog {
    pub fn new(settings: Settings) -> Self {
        Self {
            recipes: Vec::new(),
            settings,
        }
    }

    /// Append a recipe. Names are unique by construction.
    pub fn register(&mut self, recipe: Recipe) {
        debug_assert!(
            self.by_name(recipe.name()).is_none(),
            "recipe '{}' registered twice",
            recipe.name()
        );
        self.recipes.push(recipe);
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn names(&self) -> Vec<&str> {
        self.recipes.iter().map(Recipe::name).collect()
    }

    pub fn by_name(&self, name: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.name() == name)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Resolve a single recipe on the caller's task.
    pub async fn resolve_one(&self, name: &str, client: &RetrievalClient) -> Result<Resolution, CatalogError> {
        let recipe = self
            .by_name(name)
            .ok_or_else(|| CatalogError::UnknownName(name.to_string()))?;
        Ok(recipe.resolve(client).await)
    }

    /// Resolve every recipe through the scheduler.
    pub async fn resolve_all(&self, scheduler: &Scheduler, client: &RetrievalClient) -> BTreeMap<String, Resolution> {
        scheduler.run(&self.recipes, client).await
    }
}

// ---- Loading ----

/// Load a catalog from a JSON file path.
pub fn init_from_file(path: impl AsRef<Path>) -> Result<Catalog, CatalogError> {
    let path = path.as_ref();
    debug!("Loading catalog from {}", path.display());
    let data = fs::read_to_string(path).map_err(CatalogError::Io)?;
    init_from_json_str(&data)
}

/// Load a catalog from a JSON string.
pub fn init_from_json_str(json: &str) -> Result<Catalog, CatalogError> {
    let parsed: CatalogFile = serde_json::from_str(json).map_err(CatalogError::Json)?;

    let mut catalog = Catalog::new(parsed.settings);
    for entry in parsed.distributions {
        if catalog.by_name(&entry.name).is_some() {
            return Err(CatalogError::DuplicateName(entry.name));
        }
        catalog.register(entry.into_recipe());
    }
    Ok(catalog)
}

/// Load a catalog from an env var containing JSON.
pub fn init_from_env(var: &str) -> Result<Catalog, CatalogError> {
    let s = std::env::var(var).map_err(|_| CatalogError::MissingEnv(var.to_string()))?;
    init_from_json_str(&s)
}

/// ---- Errors ----
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("missing env var: {0}")]
    MissingEnv(String),
    #[error("distribution '{0}' is defined more than once")]
    DuplicateName(String),
    #[error("unknown distribution '{0}'")]
    UnknownName(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
