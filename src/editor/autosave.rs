//! Debounced persistence coordinator.
//!
//! Edits apply to the in-memory tree immediately; a trailing-edge
//! debounce timer (default 2 s) batches them into store writes. At most
//! one write is in flight at a time, and the write always carries the
//! current full tree at fire time, so rapid mutations coalesce into a
//! single request. A failed write parks the coordinator in `Conflict`
//! with the dirty signal still raised instead of silently pretending
//! the data was persisted.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::database::SubresourceRepository;
use crate::editor::state::ProtocolEditor;
use crate::error::StoreError;
use crate::models::protocol::Protocol;
use crate::templates;

/// Default trailing-edge debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// Where protocol trees get persisted to and reloaded from.
#[async_trait]
pub trait ProtocolSink: Send + Sync + 'static {
    async fn save(
        &self,
        project_id: &str,
        protocols: &BTreeMap<String, Protocol>,
    ) -> Result<(), StoreError>;

    async fn load(&self, project_id: &str) -> Result<BTreeMap<String, Protocol>, StoreError>;
}

/// Production sink: writes through the sub-resource repository under a
/// fixed caller identity.
#[derive(Clone)]
pub struct StoreSink {
    repository: SubresourceRepository,
    caller: String,
}

impl StoreSink {
    pub fn new(repository: SubresourceRepository, caller: impl Into<String>) -> Self {
        Self {
            repository,
            caller: caller.into(),
        }
    }
}

#[async_trait]
impl ProtocolSink for StoreSink {
    async fn save(
        &self,
        project_id: &str,
        protocols: &BTreeMap<String, Protocol>,
    ) -> Result<(), StoreError> {
        self.repository
            .put_protocolos(project_id, &self.caller, protocols)
            .await?;
        Ok(())
    }

    async fn load(&self, project_id: &str) -> Result<BTreeMap<String, Protocol>, StoreError> {
        self.repository
            .get_protocolos(project_id, &self.caller)
            .await
    }
}

/// Observable persistence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    /// Memory matches the last confirmed write.
    Idle,
    /// Unsaved edits, write scheduled.
    Dirty,
    /// A write is in flight.
    Saving,
    /// The last write failed; memory and store have diverged and the
    /// caller must reconcile (retry by editing, or force a reload).
    Conflict,
}

struct Inner {
    editor: ProtocolEditor,
    deadline: Option<Instant>,
    save_state: SaveState,
    /// Bumped on every mutation.
    dirty_version: u64,
    /// Highest version known to have reached the store.
    confirmed_version: u64,
    last_error: Option<String>,
}

/// Debounced autosave around a [`ProtocolEditor`].
pub struct AutosaveCoordinator<S: ProtocolSink> {
    project_id: String,
    inner: Arc<Mutex<Inner>>,
    sink: Arc<S>,
    notify: Arc<Notify>,
    delay: Duration,
    worker: JoinHandle<()>,
}

impl<S: ProtocolSink> AutosaveCoordinator<S> {
    pub fn new(project_id: impl Into<String>, sink: S, delay: Duration) -> Self {
        let project_id = project_id.into();
        let inner = Arc::new(Mutex::new(Inner {
            editor: ProtocolEditor::new(),
            deadline: None,
            save_state: SaveState::Idle,
            dirty_version: 0,
            confirmed_version: 0,
            last_error: None,
        }));
        let sink = Arc::new(sink);
        let notify = Arc::new(Notify::new());

        let worker = tokio::spawn(save_loop(
            project_id.clone(),
            Arc::clone(&inner),
            Arc::clone(&sink),
            Arc::clone(&notify),
        ));

        Self {
            project_id,
            inner,
            sink,
            notify,
            delay,
            worker,
        }
    }

    /// Apply an edit optimistically and (re)arm the debounce timer.
    pub fn mutate<F, R>(&self, edit: F) -> R
    where
        F: FnOnce(&mut ProtocolEditor) -> R,
    {
        let result = {
            let mut guard = lock(&self.inner);
            let result = edit(&mut guard.editor);
            guard.dirty_version += 1;
            guard.deadline = Some(Instant::now() + self.delay);
            if guard.save_state != SaveState::Saving {
                guard.save_state = SaveState::Dirty;
            }
            result
        };
        self.notify.notify_one();
        result
    }

    /// Current protocol for a panel (cloned snapshot).
    pub fn snapshot(&self, panel_id: &str) -> Option<Protocol> {
        lock(&self.inner).editor.protocol(panel_id).cloned()
    }

    pub fn save_state(&self) -> SaveState {
        lock(&self.inner).save_state
    }

    /// True while edits exist that the store has not confirmed — this
    /// stays raised after a failed write.
    pub fn has_pending_changes(&self) -> bool {
        let guard = lock(&self.inner);
        guard.dirty_version > guard.confirmed_version
    }

    pub fn confirmed_version(&self) -> u64 {
        lock(&self.inner).confirmed_version
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.inner).last_error.clone()
    }

    /// Discard debounce state, re-fetch from the store and normalize the
    /// fetched tree against the checklist template before replacing
    /// memory. Pending unsaved edits are dropped by design.
    pub async fn force_reload(&self) -> Result<(), StoreError> {
        {
            let mut guard = lock(&self.inner);
            guard.deadline = None;
        }

        let mut fetched = self.sink.load(&self.project_id).await?;
        for protocol in fetched.values_mut() {
            templates::normalize(protocol);
        }

        let mut guard = lock(&self.inner);
        guard.editor.replace_all(fetched);
        guard.confirmed_version = guard.dirty_version;
        guard.save_state = SaveState::Idle;
        guard.last_error = None;
        Ok(())
    }
}

impl<S: ProtocolSink> Drop for AutosaveCoordinator<S> {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

fn lock(inner: &Arc<Mutex<Inner>>) -> MutexGuard<'_, Inner> {
    // A poisoned lock only means a panicking edit closure; the state
    // itself is still coherent.
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn save_loop(
    project_id: String,
    inner: Arc<Mutex<Inner>>,
    sink: Arc<impl ProtocolSink>,
    notify: Arc<Notify>,
) {
    loop {
        // Wait until a deadline is armed.
        let deadline = loop {
            if let Some(deadline) = lock(&inner).deadline {
                break deadline;
            }
            notify.notified().await;
        };

        // Trailing edge: every mutation pushes the deadline out, so a
        // notification during the sleep means "re-read and sleep again".
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {}
            _ = notify.notified() => continue,
        }

        let (snapshot, version) = {
            let mut guard = lock(&inner);
            match guard.deadline {
                Some(d) if d <= Instant::now() => {
                    guard.deadline = None;
                    guard.save_state = SaveState::Saving;
                    (guard.editor.protocols().clone(), guard.dirty_version)
                }
                // Deadline moved while we were waking up.
                _ => continue,
            }
        };

        let result = sink.save(&project_id, &snapshot).await;

        let mut guard = lock(&inner);
        match result {
            Ok(()) => {
                guard.confirmed_version = guard.confirmed_version.max(version);
                guard.last_error = None;
                // Mutations that landed mid-flight re-armed the deadline
                // and will be picked up on the next cycle.
                guard.save_state = if guard.dirty_version > guard.confirmed_version {
                    SaveState::Dirty
                } else {
                    SaveState::Idle
                };
                debug!(project_id = %project_id, version, "autosave confirmed");
            }
            Err(e) => {
                guard.last_error = Some(e.to_string());
                guard.save_state = SaveState::Conflict;
                warn!(project_id = %project_id, error = %e, "autosave failed; state diverged");
            }
        }
    }
}
