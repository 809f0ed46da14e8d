//! Debounced auto-sync driven by library revisions

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use super::engine::SyncEngine;
use super::report::SyncOutcome;
use crate::storage::RemoteFileStore;

/// Runs a pass after local edits settle down.
pub struct AutoSync<'a, R: RemoteFileStore> {
    engine: &'a SyncEngine<R>,
    debounce: Duration,
}

impl<'a, R: RemoteFileStore> AutoSync<'a, R> {
    pub const fn new(engine: &'a SyncEngine<R>, debounce: Duration) -> Self {
        Self { engine, debounce }
    }

    /// Wait for revisions and trigger one pass per burst of edits.
    ///
    /// `on_outcome` is awaited before the next burst is considered, so a
    /// caller can settle a conflict there. Returns only when the revision
    /// channel closes.
    pub async fn run<F, Fut>(&self, mut revisions: watch::Receiver<u64>, mut on_outcome: F)
    where
        F: FnMut(SyncOutcome) -> Fut,
        Fut: Future<Output = ()>,
    {
        while revisions.changed().await.is_ok() {
            revisions.borrow_and_update();

            loop {
                tokio::time::sleep(self.debounce).await;
                match revisions.has_changed() {
                    Ok(true) => {
                        revisions.borrow_and_update();
                    }
                    Ok(false) => break,
                    Err(_) => return,
                }
            }

            if let Some(outcome) = self.trigger().await {
                on_outcome(outcome).await;
            }
        }
        tracing::debug!("Revision channel closed; auto-sync stopped");
    }

    /// Run a pass now if the user opted in and credentials are available.
    pub async fn trigger(&self) -> Option<SyncOutcome> {
        let settings = match self.engine.library().settings().await {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!("Auto-sync could not read settings: {error}");
                return None;
            }
        };
        if !settings.sync_enabled {
            tracing::debug!("Auto-sync skipped: sync is disabled");
            return None;
        }
        if !self.engine.remote().has_credentials() {
            tracing::debug!("Auto-sync skipped: not signed in");
            return None;
        }

        let outcome = self.engine.run().await;
        tracing::debug!("Auto-sync finished: {}", outcome.summary());
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::LibraryService;
    use crate::storage::MemoryRemoteStore;
    use crate::sync::SyncPolicy;

    async fn engine(sync_enabled: bool) -> SyncEngine<MemoryRemoteStore> {
        let library = LibraryService::open_in_memory().await.unwrap();
        library.set_sync_enabled(sync_enabled).await.unwrap();
        SyncEngine::new(library, MemoryRemoteStore::new(), SyncPolicy::default())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn trigger_respects_opt_in() {
        let engine = engine(false).await;
        let auto = AutoSync::new(&engine, Duration::from_millis(10));
        assert!(auto.trigger().await.is_none());

        engine.library().set_sync_enabled(true).await.unwrap();
        assert!(auto.trigger().await.is_some_and(|o| o.is_completed()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn trigger_requires_credentials() {
        let engine = engine(true).await;
        engine.remote().set_signed_in(false);
        let auto = AutoSync::new(&engine, Duration::from_millis(10));
        assert!(auto.trigger().await.is_none());
    }
}
