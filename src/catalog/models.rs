use serde::Deserialize;

use crate::http::HttpSettings;
use crate::recipes::{Descriptor, KnownGood, Recipe, Source};
use crate::scheduler::SchedulerSettings;

/// Top-level layout of the catalog file; serde stays inside this module tree.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub(crate) settings: Settings,
    pub(crate) distributions: Vec<DistributionEntry>,
}

/// Tunables carried by the catalog file. Command-line flags override them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub http: HttpSettings,
    pub scheduler: SchedulerSettings,
}

/// One trackable distribution as written in the catalog file.
#[derive(Debug, Clone, Deserialize)]
pub struct DistributionEntry {
    pub(crate) name: String,
    pub(crate) family: String,
    pub(crate) flavor: String,
    #[serde(default = "default_arch")]
    pub(crate) arch: String,
    pub(crate) source: Source,
    #[serde(default)]
    pub(crate) fallback: Option<KnownGood>,
}

fn default_arch() -> String {
    "x86_64".to_string()
}

impl DistributionEntry {
    pub fn into_recipe(self) -> Recipe {
        let descriptor = Descriptor::new(self.name, self.family, self.flavor, self.arch, self.source.mechanism());
        Recipe::new(descriptor, self.source.into_strategy()).with_fallback(self.fallback)
    }
}
