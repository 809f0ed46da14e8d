//! Sync pass orchestration.
//!
//! A pass runs four ordered phases against one remote listing:
//! tombstone draining, per-deck upload/skip/conflict in queue order,
//! discovery of remote-only decks (full passes only), then completion.
//! A conflict suspends the pass and keeps the unprocessed tail of the
//! queue so it can be resumed once the user picks a winner.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::conflict::{ConflictChoice, ConflictResolver, ConflictView, PendingConflict, ResolverState};
use super::error::{SyncError, SyncResult};
use super::index::RemoteIndex;
use super::policy::{SyncPolicy, TransportFailurePolicy};
use super::report::{SyncOutcome, SyncReport};
use crate::models::{
    image_extension_for_mime, image_file_name, mime_for_extension, ConflictStrategy, ContentHash,
    Deck, DeckId, RemoteFile,
};
use crate::services::LibraryService;
use crate::storage::{ImagePayload, RemoteError, RemoteFileStore};
use crate::util::now_ms;

const DECK_MIME_TYPE: &str = "application/json";

/// Observable engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    /// Suspended on a conflict until it is resolved or dismissed
    PausedOnConflict,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::PausedOnConflict => "paused on conflict",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassMode {
    /// Whole local queue plus discovery
    Full,
    /// Explicit or resumed queue; discovery is skipped
    Partial,
}

#[derive(Debug, Default)]
struct EngineInner {
    running: bool,
    resolver: ConflictResolver,
}

fn lock(inner: &Mutex<EngineInner>) -> MutexGuard<'_, EngineInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the running gate when a pass ends, however it ends.
struct RunningGuard<'a> {
    inner: &'a Mutex<EngineInner>,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        lock(self.inner).running = false;
    }
}

enum DeckStep {
    Uploaded,
    Skipped,
    Conflict { remote: Deck, remote_file: RemoteFile },
}

/// Reconciles the local library with a remote file store.
pub struct SyncEngine<R: RemoteFileStore> {
    library: LibraryService,
    remote: R,
    policy: SyncPolicy,
    inner: Mutex<EngineInner>,
}

impl<R: RemoteFileStore> SyncEngine<R> {
    pub fn new(library: LibraryService, remote: R, policy: SyncPolicy) -> Self {
        Self {
            library,
            remote,
            policy,
            inner: Mutex::new(EngineInner::default()),
        }
    }

    pub const fn library(&self) -> &LibraryService {
        &self.library
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn policy(&self) -> SyncPolicy {
        self.policy
    }

    pub fn state(&self) -> EngineState {
        let inner = lock(&self.inner);
        if inner.running {
            EngineState::Running
        } else if inner.resolver.state() == ResolverState::Normal {
            EngineState::Idle
        } else {
            EngineState::PausedOnConflict
        }
    }

    pub fn resolver_state(&self) -> ResolverState {
        lock(&self.inner).resolver.state()
    }

    /// The conflict the engine is paused on, if any.
    pub fn pending_conflict(&self) -> Option<ConflictView> {
        lock(&self.inner).resolver.view()
    }

    /// Run a full pass over every local deck, including discovery.
    pub async fn run(&self) -> SyncOutcome {
        let guard = match self.acquire() {
            Ok(guard) => guard,
            Err(outcome) => return outcome,
        };
        let queue = match self.library.deck_ids().await {
            Ok(queue) => queue,
            Err(error) => {
                return SyncOutcome::Failed {
                    error: error.into(),
                    report: SyncReport::default(),
                }
            }
        };
        self.pass(queue, PassMode::Full, None, guard).await
    }

    /// Run a partial pass over `queue` only. Discovery is skipped.
    pub async fn run_queue(&self, queue: Vec<DeckId>) -> SyncOutcome {
        let guard = match self.acquire() {
            Ok(guard) => guard,
            Err(outcome) => return outcome,
        };
        self.pass(queue, PassMode::Partial, None, guard).await
    }

    /// Show both versions of the pending conflict to the user.
    pub fn begin_conflict_resolution(&self) -> SyncResult<ConflictView> {
        lock(&self.inner).resolver.begin_resolution()
    }

    /// Apply `choice` to the pending conflict, then resume the captured tail.
    pub async fn resolve_conflict(&self, choice: ConflictChoice) -> SyncResult<SyncOutcome> {
        let (guard, pending) = {
            let mut inner = lock(&self.inner);
            if inner.running {
                return Ok(SyncOutcome::Busy);
            }
            if inner.resolver.state() == ResolverState::ConflictPending {
                inner.resolver.begin_resolution()?;
            }
            let (_, pending) = inner.resolver.resolve(choice)?;
            inner.running = true;
            (RunningGuard { inner: &self.inner }, pending)
        };

        tracing::info!(
            deck = %pending.local.id,
            ?choice,
            remaining = pending.remaining.len(),
            "Resolving sync conflict"
        );
        let queue = pending.remaining.clone();
        Ok(self
            .pass(queue, PassMode::Partial, Some((choice, pending)), guard)
            .await)
    }

    /// Close the conflict without choosing; the rest of the paused pass is dropped.
    pub async fn dismiss_conflict(&self) -> SyncResult<SyncOutcome> {
        let pending = lock(&self.inner).resolver.dismiss()?;
        tracing::info!(
            deck = %pending.local.id,
            dropped = pending.remaining.len(),
            "Sync conflict dismissed; aborting remaining queue"
        );
        self.library
            .record_conflict(
                &pending.local.id,
                pending.local.updated_at,
                pending.remote_file.modified_at,
                ConflictStrategy::Dismissed,
            )
            .await?;
        Ok(SyncOutcome::Aborted)
    }

    fn acquire(&self) -> Result<RunningGuard<'_>, SyncOutcome> {
        let mut inner = lock(&self.inner);
        if inner.running {
            tracing::debug!("Sync already running; ignoring trigger");
            return Err(SyncOutcome::Busy);
        }
        if inner.resolver.state() != ResolverState::Normal {
            tracing::debug!("Sync paused on a conflict; ignoring trigger");
            return Err(SyncOutcome::AwaitingResolution);
        }
        inner.running = true;
        Ok(RunningGuard { inner: &self.inner })
    }

    async fn pass(
        &self,
        queue: Vec<DeckId>,
        mode: PassMode,
        resolution: Option<(ConflictChoice, PendingConflict)>,
        _guard: RunningGuard<'_>,
    ) -> SyncOutcome {
        tracing::info!(decks = queue.len(), ?mode, "Starting sync pass");
        let mut report = SyncReport::default();

        match self.execute(&queue, mode, resolution, &mut report).await {
            Ok(None) => {
                tracing::info!("Sync pass complete: {report}");
                SyncOutcome::Completed(report)
            }
            Ok(Some(conflict)) => {
                let mut inner = lock(&self.inner);
                match inner.resolver.pause(conflict) {
                    Ok(view) => {
                        inner.running = false;
                        tracing::info!(
                            deck = %view.deck_id,
                            remaining = view.remaining,
                            "Sync paused on conflict"
                        );
                        SyncOutcome::Conflict {
                            conflict: view,
                            report,
                        }
                    }
                    Err(error) => SyncOutcome::Failed { error, report },
                }
            }
            Err(error) => {
                tracing::warn!("Sync pass failed: {error}");
                SyncOutcome::Failed { error, report }
            }
        }
    }

    async fn execute(
        &self,
        queue: &[DeckId],
        mode: PassMode,
        resolution: Option<(ConflictChoice, PendingConflict)>,
        report: &mut SyncReport,
    ) -> SyncResult<Option<PendingConflict>> {
        let mut index = match self.list_remote().await {
            Ok(index) => index,
            Err(error) => {
                if let Some((_, pending)) = resolution {
                    self.restore_conflict(pending);
                }
                return Err(error);
            }
        };

        if let Some((choice, pending)) = resolution {
            if let Err(error) = self
                .apply_resolution(choice, &pending, &mut index, report)
                .await
            {
                self.restore_conflict(pending);
                return Err(error);
            }
        }

        self.drain_tombstones(&mut index, report).await?;

        for (position, deck_id) in queue.iter().enumerate() {
            let Some(local) = self.library.get_deck(deck_id).await? else {
                tracing::debug!(deck = %deck_id, "Queued deck no longer exists locally");
                continue;
            };

            self.push_images(&local, &mut index, report).await;

            match self.sync_deck(&local, &mut index).await {
                Ok(DeckStep::Uploaded) => report.uploaded += 1,
                Ok(DeckStep::Skipped) => report.skipped += 1,
                Ok(DeckStep::Conflict {
                    remote,
                    remote_file,
                }) => {
                    return Ok(Some(PendingConflict {
                        local,
                        remote,
                        remote_file,
                        remaining: queue[position + 1..].to_vec(),
                    }));
                }
                Err(error)
                    if error.is_transport()
                        && self.policy.transport_failure == TransportFailurePolicy::SkipDeck =>
                {
                    tracing::warn!(deck = %deck_id, "Skipping deck after transport failure: {error}");
                    report.failed_decks.push(*deck_id);
                }
                Err(error) => return Err(error),
            }
        }

        if mode == PassMode::Full {
            self.discover(&index, report).await?;
        }

        self.library.mark_synced(now_ms()).await?;
        Ok(None)
    }

    async fn list_remote(&self) -> SyncResult<RemoteIndex> {
        self.remote.ensure_signed_in().await?;
        let index = RemoteIndex::from_listing(self.remote.list_files().await?);
        tracing::debug!(
            decks = index.deck_count(),
            images = index.image_count(),
            "Listed remote files"
        );
        Ok(index)
    }

    /// Put a conflict whose resolution could not be applied back in front of the user.
    fn restore_conflict(&self, pending: PendingConflict) {
        let deck_id = pending.local.id;
        match lock(&self.inner).resolver.pause(pending) {
            Ok(_) => {
                tracing::info!(deck = %deck_id, "Conflict resolution failed; conflict still pending");
            }
            Err(error) => tracing::warn!(deck = %deck_id, "Could not restore conflict: {error}"),
        }
    }

    /// Phase 1: delete the remote copy of every locally deleted deck.
    async fn drain_tombstones(
        &self,
        index: &mut RemoteIndex,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        'tombstones: for deck_id in self.library.tombstones().await? {
            let files = index.deck_files(&deck_id).to_vec();
            let mut deleted = false;

            for file in &files {
                match self.remote.delete_file(&file.id).await {
                    Ok(()) => deleted = true,
                    Err(error) if error.is_transport() => {
                        // Keep the tombstone; the next pass retries.
                        if self.policy.transport_failure == TransportFailurePolicy::AbortPass {
                            return Err(error.into());
                        }
                        tracing::warn!(deck = %deck_id, "Remote deletion deferred: {error}");
                        continue 'tombstones;
                    }
                    Err(error @ RemoteError::Auth(_)) => {
                        // The file is still there; fail the pass and keep the tombstone.
                        return Err(error.into());
                    }
                    Err(error) => {
                        tracing::warn!(
                            deck = %deck_id,
                            "Remote deletion failed; treating as already gone: {error}"
                        );
                    }
                }
            }

            self.library.clear_tombstone(&deck_id).await?;
            index.remove_deck(&deck_id);
            if deleted {
                report.deleted_remote += 1;
            }
            tracing::debug!(deck = %deck_id, remote_files = files.len(), "Cleared tombstone");
        }
        Ok(())
    }

    /// Phase 2 for one deck: decide between upload, skip and conflict.
    async fn sync_deck(&self, local: &Deck, index: &mut RemoteIndex) -> SyncResult<DeckStep> {
        let bytes = local.serialize()?;

        let Some(remote_file) = index.deck(&local.id).cloned() else {
            tracing::debug!(deck = %local.id, "No remote copy; uploading");
            self.upload(local, &bytes, index).await?;
            return Ok(DeckStep::Uploaded);
        };

        let window = self.policy.conflict_window_ms;
        let drift = remote_file.modified_at - local.updated_at;
        if drift < -window {
            tracing::debug!(deck = %local.id, drift, "Local copy is newer; uploading");
            self.upload(local, &bytes, index).await?;
            return Ok(DeckStep::Uploaded);
        }

        let remote_bytes = match self.remote.get_file_content(&remote_file.id).await {
            Ok(remote_bytes) => remote_bytes,
            Err(error) if error.is_not_found() => {
                tracing::debug!(deck = %local.id, "Remote copy vanished; uploading");
                index.remove_deck(&local.id);
                self.upload(local, &bytes, index).await?;
                return Ok(DeckStep::Uploaded);
            }
            Err(error) => return Err(error.into()),
        };
        let parsed = Deck::parse(&remote_bytes);

        let same_content = remote_bytes == bytes
            || parsed
                .as_ref()
                .is_ok_and(|remote| remote.same_content(local));
        if same_content {
            tracing::debug!(deck = %local.id, drift, "Already in sync");
            return Ok(DeckStep::Skipped);
        }

        if drift <= window {
            tracing::debug!(deck = %local.id, drift, "Within conflict window; uploading");
            self.upload(local, &bytes, index).await?;
            return Ok(DeckStep::Uploaded);
        }

        match parsed {
            Ok(remote) if remote.id == local.id => {
                tracing::info!(deck = %local.id, drift, "Remote copy diverged");
                Ok(DeckStep::Conflict {
                    remote,
                    remote_file,
                })
            }
            Ok(remote) => {
                tracing::warn!(
                    deck = %local.id,
                    "Remote file holds deck {}; overwriting with local copy",
                    remote.id
                );
                self.upload(local, &bytes, index).await?;
                Ok(DeckStep::Uploaded)
            }
            Err(error) => {
                tracing::warn!(
                    deck = %local.id,
                    "Remote copy is unreadable ({error}); overwriting with local copy"
                );
                self.upload(local, &bytes, index).await?;
                Ok(DeckStep::Uploaded)
            }
        }
    }

    async fn upload(&self, deck: &Deck, bytes: &[u8], index: &mut RemoteIndex) -> SyncResult<()> {
        let file = self
            .remote
            .save_file(&deck.file_name(), bytes, DECK_MIME_TYPE)
            .await?;
        index.upsert_deck(deck.id, file);
        Ok(())
    }

    /// Phase 3: import remote decks that have no local counterpart.
    ///
    /// Per-file failures are counted and skipped.
    async fn discover(&self, index: &RemoteIndex, report: &mut SyncReport) -> SyncResult<()> {
        let local: HashSet<DeckId> = self.library.deck_ids().await?.into_iter().collect();
        let tombstoned: HashSet<DeckId> = self.library.tombstones().await?.into_iter().collect();

        let candidates: Vec<(DeckId, RemoteFile)> = index
            .deck_ids()
            .filter(|id| !local.contains(id) && !tombstoned.contains(id))
            .filter_map(|id| index.deck(id).map(|file| (*id, file.clone())))
            .collect();

        for (deck_id, file) in candidates {
            let bytes = match self.remote.get_file_content(&file.id).await {
                Ok(bytes) => bytes,
                Err(error) => {
                    tracing::warn!(name = %file.name, "Skipping remote deck: {error}");
                    report.discovery_failures += 1;
                    continue;
                }
            };
            let deck = match Deck::parse(&bytes) {
                Ok(deck) if deck.id == deck_id => deck,
                Ok(deck) => {
                    tracing::warn!(
                        name = %file.name,
                        "Skipping remote deck: file holds deck {}",
                        deck.id
                    );
                    report.discovery_failures += 1;
                    continue;
                }
                Err(error) => {
                    tracing::warn!(name = %file.name, "Skipping remote deck: {error}");
                    report.discovery_failures += 1;
                    continue;
                }
            };

            if self.library.insert_imported_deck(&deck).await? {
                tracing::info!(deck = %deck.id, name = %deck.name, "Imported deck from remote");
                report.downloaded += 1;
                self.pull_images(&deck, index, report).await;
            }
        }
        Ok(())
    }

    async fn apply_resolution(
        &self,
        choice: ConflictChoice,
        pending: &PendingConflict,
        index: &mut RemoteIndex,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let deck_id = pending.local.id;
        match choice {
            ConflictChoice::KeepLocal => {
                // Upload what is stored now; it may have been edited while paused.
                if let Some(local) = self.library.get_deck(&deck_id).await? {
                    self.push_images(&local, index, report).await;
                    self.upload(&local, &local.serialize()?, index).await?;
                    report.uploaded += 1;
                } else {
                    tracing::debug!(deck = %deck_id, "Deck deleted while conflict was pending");
                }
            }
            ConflictChoice::UseCloud => {
                if self.library.is_tombstoned(&deck_id).await? {
                    tracing::debug!(deck = %deck_id, "Deck deleted while conflict was pending");
                } else {
                    self.library.replace_deck_from_remote(&pending.remote).await?;
                    report.downloaded += 1;
                    self.pull_images(&pending.remote, index, report).await;
                }
            }
        }

        self.library
            .record_conflict(
                &deck_id,
                pending.local.updated_at,
                pending.remote_file.modified_at,
                choice.into(),
            )
            .await?;
        Ok(())
    }

    /// Upload referenced images the remote does not have yet.
    ///
    /// Failures are logged and never block the deck itself.
    async fn push_images(&self, deck: &Deck, index: &mut RemoteIndex, report: &mut SyncReport) {
        for hash in deck.image_references() {
            if index.has_image(&hash) {
                continue;
            }
            let image = match self.library.image(&hash).await {
                Ok(Some(image)) => image,
                Ok(None) => {
                    tracing::debug!(deck = %deck.id, %hash, "Referenced image is missing everywhere");
                    report.images_missing += 1;
                    continue;
                }
                Err(error) => {
                    tracing::warn!(%hash, "Could not read local image: {error}");
                    continue;
                }
            };

            let name = image_file_name(&hash, &image.mime_type);
            match self.remote.save_file(&name, &image.bytes, &image.mime_type).await {
                Ok(file) => {
                    index.upsert_image(hash, file, image_extension_for_mime(&image.mime_type));
                    report.images_pushed += 1;
                }
                Err(error) => tracing::warn!(%hash, "Image upload failed: {error}"),
            }
        }
    }

    /// Download referenced images not yet stored locally.
    async fn pull_images(&self, deck: &Deck, index: &RemoteIndex, report: &mut SyncReport) {
        let store = self.library.content_store();
        for hash in deck.image_references() {
            match store.contains(&hash).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(%hash, "Could not check local image: {error}");
                    continue;
                }
            }

            let Some((file, extension)) = index.image(&hash) else {
                tracing::debug!(deck = %deck.id, %hash, "Referenced image is missing everywhere");
                report.images_missing += 1;
                continue;
            };

            match self.fetch_image(&hash, file, extension).await {
                Ok(()) => report.images_pulled += 1,
                Err(error) => {
                    tracing::warn!(%hash, "Image download failed: {error}");
                    report.images_missing += 1;
                }
            }
        }
    }

    async fn fetch_image(
        &self,
        hash: &ContentHash,
        file: &RemoteFile,
        extension: &str,
    ) -> SyncResult<()> {
        let bytes = self.remote.get_file_content(&file.id).await?;
        let payload = ImagePayload::from_bytes(bytes, mime_for_extension(extension));
        if &payload.hash() != hash {
            return Err(SyncError::Remote(RemoteError::InvalidPayload(format!(
                "{} does not match its content hash",
                file.name
            ))));
        }
        self.library.import_image(payload).await?;
        Ok(())
    }
}
