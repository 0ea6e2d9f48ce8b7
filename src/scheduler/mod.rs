//! Bounded fan-out of recipe resolutions.
//!
//! Each resolution runs on its own spawned task behind a semaphore, so a
//! panic in one strategy surfaces as a `JoinError` for that task only. The
//! collecting loop is the single owner of the output map.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::http::RetrievalClient;
use crate::recipes::{Recipe, Resolution, Status};

pub const DEFAULT_MAX_WORKERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub max_workers: usize,
    /// Delay between task submissions, for hosts that throttle bursts.
    pub stagger_ms: Option<u64>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            stagger_ms: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    max_workers: usize,
    stagger: Option<Duration>,
}

impl Scheduler {
    pub fn new(settings: SchedulerSettings) -> Self {
        Self {
            max_workers: settings.max_workers.max(1),
            stagger: settings.stagger_ms.filter(|ms| *ms > 0).map(Duration::from_millis),
        }
    }

    #[cfg(test)]
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Resolve every recipe and return one entry per recipe name. Returns
    /// only once every task has finished.
    pub async fn run(&self, recipes: &[Recipe], client: &RetrievalClient) -> BTreeMap<String, Resolution> {
        info!(
            "Resolving {} distributions with {} workers",
            recipes.len(),
            self.max_workers
        );
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut pending = FuturesUnordered::new();

        for (index, recipe) in recipes.iter().enumerate() {
            if index > 0 {
                if let Some(delay) = self.stagger {
                    tokio::time::sleep(delay).await;
                }
            }

            let name = recipe.name().to_string();
            let recipe = recipe.clone();
            let client = client.clone();
            let semaphore = Arc::clone(&semaphore);

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                recipe.resolve(&client).await
            });
            pending.push(async move { (name, handle.await) });
        }

        let mut results = BTreeMap::new();
        while let Some((name, joined)) = pending.next().await {
            let resolution = match joined {
                Ok(resolution) => resolution,
                Err(err) => {
                    error!("Resolution task for {name} aborted: {err}");
                    Resolution::failed(format!("resolution task panicked: {err}"))
                }
            };
            debug!("{name}: {}", resolution.status());
            results.insert(name, resolution);
        }

        let failed = results.values().filter(|r| r.status() == Status::Failed).count();
        info!("Resolved {} distributions ({failed} failed)", results.len());
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::tests::{client, descriptor};
    use crate::recipes::{Artifact, Descriptor, Mechanism, Strategy};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    struct Fixed(&'static str);

    #[async_trait]
    impl Strategy for Fixed {
        async fn crawl(&self, _: &Descriptor, _: &RetrievalClient) -> Result<Option<Artifact>> {
            Ok(Some(Artifact::new(self.0, format!("https://example.org/{}.iso", self.0))))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Strategy for Panicking {
        async fn crawl(&self, _: &Descriptor, _: &RetrievalClient) -> Result<Option<Artifact>> {
            panic!("parser blew up")
        }
    }

    /// Records the peak number of concurrent crawls.
    struct Gauge {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Strategy for Gauge {
        async fn crawl(&self, _: &Descriptor, _: &RetrievalClient) -> Result<Option<Artifact>> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    fn recipe(flavor: &str, strategy: Arc<dyn Strategy>) -> Recipe {
        Recipe::new(descriptor(flavor, Mechanism::FlatDirectory), strategy)
    }

    #[tokio::test]
    async fn one_panicking_task_does_not_affect_siblings() {
        let recipes = vec![
            recipe("A", Arc::new(Fixed("1.0"))),
            recipe("B", Arc::new(Panicking)),
            recipe("C", Arc::new(Fixed("3.0"))),
            recipe("D", Arc::new(Fixed("4.0"))),
        ];

        let results = Scheduler::new(SchedulerSettings::default()).run(&recipes, &client()).await;

        assert_eq!(results.len(), 4);
        assert_eq!(results["Test B"].status(), Status::Failed);
        assert_eq!(results["Test A"].version(), Some("1.0"));
        assert_eq!(results["Test C"].version(), Some("3.0"));
        assert_eq!(results["Test D"].status(), Status::Live);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let recipes: Vec<Recipe> = (0..8)
            .map(|i| {
                recipe(
                    &format!("G{i}"),
                    Arc::new(Gauge {
                        active: Arc::clone(&active),
                        peak: Arc::clone(&peak),
                    }),
                )
            })
            .collect();

        let scheduler = Scheduler::new(SchedulerSettings {
            max_workers: 3,
            stagger_ms: None,
        });
        let results = scheduler.run(&recipes, &client()).await;

        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(results.values().all(|r| r.status() == Status::Failed));
    }

    #[tokio::test]
    async fn staggered_submission_spaces_tasks() {
        let recipes: Vec<Recipe> = (0..3)
            .map(|i| recipe(&format!("S{i}"), Arc::new(Fixed("1.0"))))
            .collect();
        let scheduler = Scheduler::new(SchedulerSettings {
            max_workers: 10,
            stagger_ms: Some(50),
        });

        let started = Instant::now();
        let results = scheduler.run(&recipes, &client()).await;
        assert_eq!(results.len(), 3);
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn zero_workers_is_clamped() {
        let scheduler = Scheduler::new(SchedulerSettings {
            max_workers: 0,
            stagger_ms: Some(0),
        });
        assert_eq!(scheduler.max_workers(), 1);
        assert!(scheduler.stagger.is_none());
    }
}
