//! In-process `RemoteFileStore` with a controllable clock and failure injection.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::remote::{RemoteError, RemoteFileStore, RemoteResult};
use crate::models::RemoteFile;
use crate::util::now_ms;

/// Remote call kinds that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    SignIn,
    List,
    Get,
    Save,
    Delete,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    op: RemoteOp,
    /// Restrict to one file name; `None` matches every call of `op`
    name: Option<String>,
    error: RemoteError,
}

#[derive(Debug, Clone)]
struct StoredFile {
    name: String,
    content: Vec<u8>,
    modified_at: i64,
}

#[derive(Debug)]
struct MemoryState {
    files: BTreeMap<String, StoredFile>,
    next_id: u64,
    clock: Option<i64>,
    signed_in: bool,
    failures: Vec<InjectedFailure>,
    saves: Vec<String>,
    deletes: Vec<String>,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            files: BTreeMap::new(),
            next_id: 1,
            clock: None,
            signed_in: true,
            failures: Vec::new(),
            saves: Vec::new(),
            deletes: Vec::new(),
        }
    }
}

impl MemoryState {
    fn now(&self) -> i64 {
        self.clock.unwrap_or_else(now_ms)
    }

    fn check(&self, op: RemoteOp, name: Option<&str>) -> RemoteResult<()> {
        let failure = self.failures.iter().find(|failure| {
            failure.op == op
                && failure
                    .name
                    .as_deref()
                    .map_or(true, |wanted| Some(wanted) == name)
        });
        failure.map_or(Ok(()), |failure| Err(failure.error.clone()))
    }

    fn id_for_name(&self, name: &str) -> Option<String> {
        self.files
            .iter()
            .find(|(_, file)| file.name == name)
            .map(|(id, _)| id.clone())
    }

    fn upsert(&mut self, name: &str, content: &[u8], modified_at: i64) -> RemoteFile {
        let id = self.id_for_name(name).unwrap_or_else(|| {
            let id = format!("mem-{:06}", self.next_id);
            self.next_id += 1;
            id
        });
        self.files.insert(
            id.clone(),
            StoredFile {
                name: name.to_string(),
                content: content.to_vec(),
                modified_at,
            },
        );
        RemoteFile {
            id,
            name: name.to_string(),
            modified_at,
        }
    }
}

/// Shared handle; clones observe the same files.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemoteStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pin the server clock used for `modified_at` on writes.
    pub fn set_clock(&self, now: i64) {
        self.state().clock = Some(now);
    }

    /// Move the pinned clock forward (pins it at wall time first if unset).
    pub fn advance(&self, millis: i64) {
        let mut state = self.state();
        let now = state.now();
        state.clock = Some(now + millis);
    }

    pub fn set_signed_in(&self, signed_in: bool) {
        self.state().signed_in = signed_in;
    }

    /// Make every matching call fail with `error` until cleared.
    pub fn fail(&self, op: RemoteOp, name: Option<&str>, error: RemoteError) {
        self.state().failures.push(InjectedFailure {
            op,
            name: name.map(ToString::to_string),
            error,
        });
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Seed a file as if another client wrote it.
    pub fn put_file(&self, name: &str, content: &[u8], modified_at: i64) -> RemoteFile {
        self.state().upsert(name, content, modified_at)
    }

    pub fn remove_file(&self, name: &str) -> bool {
        let mut state = self.state();
        state
            .id_for_name(name)
            .and_then(|id| state.files.remove(&id))
            .is_some()
    }

    #[must_use]
    pub fn file(&self, name: &str) -> Option<(RemoteFile, Vec<u8>)> {
        let state = self.state();
        state.files.iter().find(|(_, file)| file.name == name).map(|(id, file)| {
            (
                RemoteFile {
                    id: id.clone(),
                    name: file.name.clone(),
                    modified_at: file.modified_at,
                },
                file.content.clone(),
            )
        })
    }

    #[must_use]
    pub fn content(&self, name: &str) -> Option<Vec<u8>> {
        self.file(name).map(|(_, content)| content)
    }

    /// All file names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state()
            .files
            .values()
            .map(|file| file.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Names passed to successful `save_file` calls, in call order.
    #[must_use]
    pub fn saved_names(&self) -> Vec<String> {
        self.state().saves.clone()
    }

    /// Names of files removed through `delete_file`, in call order.
    #[must_use]
    pub fn deleted_names(&self) -> Vec<String> {
        self.state().deletes.clone()
    }

    pub fn reset_call_log(&self) {
        let mut state = self.state();
        state.saves.clear();
        state.deletes.clear();
    }
}

impl RemoteFileStore for MemoryRemoteStore {
    async fn ensure_signed_in(&self) -> RemoteResult<String> {
        let state = self.state();
        state.check(RemoteOp::SignIn, None)?;
        if state.signed_in {
            Ok("memory-token".to_string())
        } else {
            Err(RemoteError::Auth("not signed in".to_string()))
        }
    }

    fn has_credentials(&self) -> bool {
        self.state().signed_in
    }

    async fn list_files(&self) -> RemoteResult<Vec<RemoteFile>> {
        let state = self.state();
        state.check(RemoteOp::List, None)?;
        Ok(state
            .files
            .iter()
            .map(|(id, file)| RemoteFile {
                id: id.clone(),
                name: file.name.clone(),
                modified_at: file.modified_at,
            })
            .collect())
    }

    async fn get_file_content(&self, file_id: &str) -> RemoteResult<Vec<u8>> {
        let state = self.state();
        let file = state
            .files
            .get(file_id)
            .ok_or_else(|| RemoteError::NotFound(file_id.to_string()))?;
        state.check(RemoteOp::Get, Some(&file.name))?;
        Ok(file.content.clone())
    }

    async fn save_file(
        &self,
        name: &str,
        content: &[u8],
        _mime_type: &str,
    ) -> RemoteResult<RemoteFile> {
        let mut state = self.state();
        state.check(RemoteOp::Save, Some(name))?;
        let now = state.now();
        let file = state.upsert(name, content, now);
        state.saves.push(name.to_string());
        Ok(file)
    }

    async fn delete_file(&self, file_id: &str) -> RemoteResult<()> {
        let mut state = self.state();
        let name = state.files.get(file_id).map(|file| file.name.clone());
        state.check(RemoteOp::Delete, name.as_deref())?;
        match state.files.remove(file_id) {
            Some(file) => {
                state.deletes.push(file.name);
                Ok(())
            }
            None => Err(RemoteError::NotFound(file_id.to_string())),
        }
    }
}
