//! Shared fixtures for sync scenario tests

#![allow(dead_code)]

use std::time::Duration;

use cardforge_core::models::RemoteFile;
use cardforge_core::services::LibraryService;
use cardforge_core::storage::{MemoryRemoteStore, RemoteFileStore, RemoteResult};
use cardforge_core::sync::{SyncEngine, SyncPolicy};
use cardforge_core::Deck;

pub const PIXEL_PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub fn pixel_data_url() -> String {
    format!("data:image/png;base64,{PIXEL_PNG_B64}")
}

pub async fn engine_with(policy: SyncPolicy) -> SyncEngine<MemoryRemoteStore> {
    let library = LibraryService::open_in_memory().await.unwrap();
    SyncEngine::new(library, MemoryRemoteStore::new(), policy)
}

pub async fn engine() -> SyncEngine<MemoryRemoteStore> {
    engine_with(SyncPolicy::default()).await
}

/// Second device sharing the same remote.
pub async fn second_device(remote: &MemoryRemoteStore) -> SyncEngine<MemoryRemoteStore> {
    let library = LibraryService::open_in_memory().await.unwrap();
    SyncEngine::new(library, remote.clone(), SyncPolicy::default())
}

/// Write `deck` remotely as another client would, stamped `modified_at`.
pub fn write_remote(remote: &MemoryRemoteStore, deck: &Deck, modified_at: i64) -> Vec<u8> {
    let bytes = deck.serialize().unwrap();
    remote.put_file(&deck.file_name(), &bytes, modified_at);
    bytes
}

/// A copy of `deck` edited elsewhere.
pub fn edited_elsewhere(deck: &Deck, name: &str) -> Deck {
    let mut remote = deck.clone();
    name.clone_into(&mut remote.name);
    remote.updated_at += 5_000;
    remote
}

/// Memory store whose sign-in takes a while, so passes can overlap.
pub struct SlowRemote {
    pub inner: MemoryRemoteStore,
    pub delay: Duration,
}

impl RemoteFileStore for SlowRemote {
    async fn ensure_signed_in(&self) -> RemoteResult<String> {
        tokio::time::sleep(self.delay).await;
        self.inner.ensure_signed_in().await
    }

    async fn list_files(&self) -> RemoteResult<Vec<RemoteFile>> {
        self.inner.list_files().await
    }

    async fn get_file_content(&self, file_id: &str) -> RemoteResult<Vec<u8>> {
        self.inner.get_file_content(file_id).await
    }

    async fn save_file(
        &self,
        name: &str,
        content: &[u8],
        mime_type: &str,
    ) -> RemoteResult<RemoteFile> {
        self.inner.save_file(name, content, mime_type).await
    }

    async fn delete_file(&self, file_id: &str) -> RemoteResult<()> {
        self.inner.delete_file(file_id).await
    }
}
