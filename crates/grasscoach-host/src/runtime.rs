//! Lifecycle event dispatch.
//!
//! The host turns each lifecycle event into one call on the cache and runs it
//! as its own task. The returned `EventHandle` is the only way to learn the
//! outcome, and the event is not finished until that handle has been awaited.

use std::sync::Arc;

use anyhow::{Context, Result};
use grasscoach_cache::{
    Asset, ContentRequest, Epoch, LifecycleHandler, PopulateReport, ReclaimReport,
    RequestIdentity,
};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// A new epoch was deployed; fill its store.
    Install,
    /// The deployed epoch takes control; drop the others.
    Activate,
    /// The application asked for a resource.
    Fetch(ContentRequest),
}

impl LifecycleEvent {
    fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Install => "install",
            LifecycleEvent::Activate => "activate",
            LifecycleEvent::Fetch(_) => "fetch",
        }
    }
}

#[derive(Debug)]
pub enum EventOutcome {
    Installed(PopulateReport),
    Activated(ReclaimReport),
    Responded(Asset),
}

/// Pending work for one lifecycle event.
#[must_use = "a lifecycle event is only complete once its handle is awaited"]
pub struct EventHandle {
    event: &'static str,
    task: JoinHandle<Result<EventOutcome>>,
}

impl EventHandle {
    /// Wait for the event's work to finish and return its outcome.
    pub async fn wait_until(self) -> Result<EventOutcome> {
        self.task
            .await
            .with_context(|| format!("{} handler did not run to completion", self.event))?
    }
}

/// Dispatches events for a single deployment (one epoch, one seed set).
pub struct HostRuntime {
    handler: Arc<dyn LifecycleHandler>,
    epoch: Epoch,
    seed_set: Arc<[RequestIdentity]>,
}

impl HostRuntime {
    pub fn new(
        handler: Arc<dyn LifecycleHandler>,
        epoch: Epoch,
        seed_set: Vec<RequestIdentity>,
    ) -> Self {
        Self {
            handler,
            epoch,
            seed_set: seed_set.into(),
        }
    }

    pub fn epoch(&self) -> &Epoch {
        &self.epoch
    }

    pub fn dispatch(&self, event: LifecycleEvent) -> EventHandle {
        let name = event.name();
        let handler = Arc::clone(&self.handler);
        let epoch = self.epoch.clone();
        let seed_set = Arc::clone(&self.seed_set);
        debug!(event = name, epoch = %epoch, "Dispatching lifecycle event");

        let task = tokio::spawn(async move {
            match event {
                LifecycleEvent::Install => {
                    let report = handler
                        .populate(&epoch, &seed_set)
                        .await
                        .with_context(|| format!("Install of epoch {} failed", epoch))?;
                    Ok(EventOutcome::Installed(report))
                }
                LifecycleEvent::Activate => {
                    Ok(EventOutcome::Activated(handler.reclaim(&epoch).await))
                }
                LifecycleEvent::Fetch(request) => {
                    let asset = handler.intercept(&request).await?;
                    Ok(EventOutcome::Responded(asset))
                }
            }
        });

        EventHandle { event: name, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use grasscoach_cache::{CacheManager, FetchError, Fetcher, LifecycleState, MemoryStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct EchoFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for EchoFetcher {
        async fn fetch(&self, request: &ContentRequest) -> Result<Asset, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.url.ends_with(".offline") {
                return Err(FetchError::Transport("no route to host".to_string()));
            }
            Ok(Asset::new(200, vec![], request.url.clone().into_bytes()))
        }
    }

    fn runtime(
        epoch: &str,
        seeds: &[&str],
    ) -> (HostRuntime, Arc<CacheManager>, Arc<EchoFetcher>) {
        let fetcher = Arc::new(EchoFetcher::default());
        let manager = Arc::new(
            CacheManager::new("grass-coach", Arc::new(MemoryStore::new()), fetcher.clone())
                .unwrap(),
        );
        let seed_set = seeds.iter().map(|u| RequestIdentity::get(u)).collect();
        let runtime = HostRuntime::new(manager.clone(), Epoch::parse(epoch).unwrap(), seed_set);
        (runtime, manager, fetcher)
    }

    #[tokio::test]
    async fn test_install_activate_fetch() {
        let (runtime, manager, fetcher) = runtime("v1", &["/", "/index.html"]);

        match runtime.dispatch(LifecycleEvent::Install).wait_until().await.unwrap() {
            EventOutcome::Installed(report) => assert_eq!(report.entries, 2),
            other => panic!("unexpected outcome: {other:?}"),
        }
        match runtime.dispatch(LifecycleEvent::Activate).wait_until().await.unwrap() {
            EventOutcome::Activated(report) => assert_eq!(report.reclaimed_count(), 0),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            manager.state().await,
            LifecycleState::Ready { epoch: runtime.epoch().clone() }
        );

        let handle = runtime.dispatch(LifecycleEvent::Fetch(ContentRequest::get("/index.html")));
        match handle.wait_until().await.unwrap() {
            EventOutcome::Responded(asset) => assert_eq!(asset.body, b"/index.html"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_install_failure_surfaces() {
        let (runtime, manager, _) = runtime("v1", &["/", "/bundle.offline"]);

        let err = runtime
            .dispatch(LifecycleEvent::Install)
            .wait_until()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Install of epoch v1 failed"));
        assert_eq!(manager.state().await, LifecycleState::Uninitialized);
    }

    #[tokio::test]
    async fn test_fetch_before_install_is_rejected() {
        let (runtime, _, fetcher) = runtime("v1", &["/"]);

        let result = runtime
            .dispatch(LifecycleEvent::Fetch(ContentRequest::get("/")))
            .wait_until()
            .await;
        assert!(result.is_err());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_fetch_events() {
        let (runtime, _, fetcher) = runtime("v1", &["/", "/manifest.json"]);
        runtime.dispatch(LifecycleEvent::Install).wait_until().await.unwrap();

        let handles: Vec<EventHandle> = (0..8)
            .map(|_| runtime.dispatch(LifecycleEvent::Fetch(ContentRequest::get("/manifest.json"))))
            .collect();
        for handle in handles {
            handle.wait_until().await.unwrap();
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
