//! Resolution strategies and the recipe boundary that wraps them.
//!
//! A [`Strategy`] only knows how to crawl one kind of upstream surface. A
//! [`Recipe`] binds a strategy to a [`Descriptor`] and an optional
//! [`KnownGood`] fallback, and is the only place where crawl errors are turned
//! into a [`Resolution`].

mod build_probe;
mod checksums;
mod directory;
mod feed;
mod models;
mod recursive_scrape;
mod release_page;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{Instrument, error, info, info_span, warn};

use crate::http::RetrievalClient;

pub use build_probe::BuildProbe;
pub use directory::{DirPattern, DirectoryLayout, FlatDirectory, MirrorFailover, VersionedDirectory};
pub use feed::{JsonFeed, RssFeed};
pub use models::{Artifact, Checksum, ChecksumKind, Descriptor, KnownGood, Mechanism, Resolution, Status};
pub use recursive_scrape::{MAX_DEPTH, RecursiveScrape};
pub use release_page::ReleasePage;

/// One upstream source family.
///
/// `Ok(Some(_))` is a live match, `Ok(None)` means every live path came up
/// empty, and `Err(_)` is anything unexpected. Implementations hold no state
/// between calls.
#[async_trait]
pub trait Strategy: Send + Sync {
    async fn crawl(&self, descriptor: &Descriptor, client: &RetrievalClient) -> Result<Option<Artifact>>;
}

/// Catalog-file form of every strategy, tagged by mechanism.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mechanism", rename_all = "snake_case")]
pub enum Source {
    JsonFeed(JsonFeed),
    RssFeed(RssFeed),
    FlatDirectory(FlatDirectory),
    VersionedDirectory(VersionedDirectory),
    MirrorFailover(MirrorFailover),
    RecursiveScrape(RecursiveScrape),
    BuildProbe(BuildProbe),
    ReleasePage(ReleasePage),
}

impl Source {
    pub fn mechanism(&self) -> Mechanism {
        match self {
            Source::JsonFeed(_) => Mechanism::JsonFeed,
            Source::RssFeed(_) => Mechanism::RssFeed,
            Source::FlatDirectory(_) => Mechanism::FlatDirectory,
            Source::VersionedDirectory(_) => Mechanism::VersionedDirectory,
            Source::MirrorFailover(_) => Mechanism::MirrorFailover,
            Source::RecursiveScrape(_) => Mechanism::RecursiveScrape,
            Source::BuildProbe(_) => Mechanism::BuildProbe,
            Source::ReleasePage(_) => Mechanism::ReleasePage,
        }
    }

    pub fn into_strategy(self) -> Arc<dyn Strategy> {
        match self {
            Source::JsonFeed(s) => Arc::new(s),
            Source::RssFeed(s) => Arc::new(s),
            Source::FlatDirectory(s) => Arc::new(s),
            Source::VersionedDirectory(s) => Arc::new(s),
            Source::MirrorFailover(s) => Arc::new(s),
            Source::RecursiveScrape(s) => Arc::new(s),
            Source::BuildProbe(s) => Arc::new(s),
            Source::ReleasePage(s) => Arc::new(s),
        }
    }
}

/// A descriptor bound to its strategy. Cheap to clone and safe to resolve
/// from many tasks at once.
#[derive(Clone)]
pub struct Recipe {
    descriptor: Descriptor,
    strategy: Arc<dyn Strategy>,
    fallback: Option<KnownGood>,
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipe")
            .field("descriptor", &self.descriptor)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl Recipe {
    pub fn new(descriptor: Descriptor, strategy: Arc<dyn Strategy>) -> Self {
        Self {
            descriptor,
            strategy,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Option<KnownGood>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn fallback(&self) -> Option<&KnownGood> {
        self.fallback.as_ref()
    }

    /// Resolve the descriptor. Never errors: crawl failures are logged here
    /// and degrade to the fallback, or to [`Resolution::Failed`] without one.
    pub async fn resolve(&self, client: &RetrievalClient) -> Resolution {
        let span = info_span!(
            "resolve",
            distro = %self.descriptor.name(),
            mechanism = %self.descriptor.mechanism()
        );
        self.resolve_live(client).instrument(span).await
    }

    async fn resolve_live(&self, client: &RetrievalClient) -> Resolution {
        match self.strategy.crawl(&self.descriptor, client).await {
            Ok(Some(artifact)) => {
                info!("Selected version {} -> {}", artifact.version, artifact.url);
                artifact.into()
            }
            Ok(None) => {
                warn!("No live match found");
                self.degrade("no matching artifact found".to_string())
            }
            Err(err) => {
                error!("Resolution failed: {err:#}");
                self.degrade(format!("{err:#}"))
            }
        }
    }

    fn degrade(&self, reason: String) -> Resolution {
        match &self.fallback {
            Some(known) => {
                warn!("Using hardcoded fallback {} ({reason})", known.version);
                known.clone().into()
            }
            None => Resolution::Failed { reason },
        }
    }
}
