//! Session lifecycle around a shared store.
//!
//! A dashboard session owns one store and the pump feeding it, and decides
//! when the store's contents stop being valid: switching to another workspace
//! or signing out stops the pump and clears the store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::source::{EventSource, IngestPump, PumpReport};
use crate::store::RealtimeStore;

#[derive(Debug)]
pub struct WorkspaceSession {
    store: Arc<RealtimeStore>,
    workspace: Mutex<Option<String>>,
    pump: Mutex<Option<AbortHandle>>,
}

impl WorkspaceSession {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_store(Arc::new(RealtimeStore::new(config)))
    }

    /// Wrap an existing store. It is not cleared.
    pub fn with_store(store: Arc<RealtimeStore>) -> Self {
        Self {
            store,
            workspace: Mutex::new(None),
            pump: Mutex::new(None),
        }
    }

    fn lock_workspace(&self) -> MutexGuard<'_, Option<String>> {
        self.workspace.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pump(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.pump.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn store(&self) -> &Arc<RealtimeStore> {
        &self.store
    }

    pub fn current_workspace(&self) -> Option<String> {
        self.lock_workspace().clone()
    }

    /// Enter `workspace_id`. Returns `true` when the store was reset.
    ///
    /// Re-entering the current workspace keeps the log and the pump. Any
    /// other switch stops the attached pump before clearing the store. The
    /// first switch of a fresh session also resets, so anything ingested
    /// before a workspace was chosen is discarded.
    pub fn switch_workspace(&self, workspace_id: impl Into<String>) -> bool {
        let workspace_id = workspace_id.into();
        let previous = {
            let mut current = self.lock_workspace();
            if current.as_deref() == Some(workspace_id.as_str()) {
                return false;
            }
            current.replace(workspace_id.clone())
        };

        info!(
            subsystem = "session",
            workspace_id = %workspace_id,
            previous = ?previous,
            "Switching workspace, clearing activity log"
        );
        self.stop_pump();
        self.store.reset();
        true
    }

    /// Stop the pump, clear the log and forget the workspace.
    pub fn logout(&self) {
        let previous = self.lock_workspace().take();
        info!(subsystem = "session", previous = ?previous, "Session ended, clearing activity log");
        self.stop_pump();
        self.store.reset();
    }

    /// Pump `source` into this session's store on the tokio runtime.
    ///
    /// The session keeps one pump: attaching again stops the previous one.
    /// The pump is pinned to the store's current generation, so it ingests
    /// nothing after the next workspace switch or logout even if it is
    /// mid-message when aborted.
    pub fn attach<S>(&self, source: S) -> JoinHandle<PumpReport>
    where
        S: EventSource + 'static,
    {
        let handle = IngestPump::new(self.store.clone()).pinned().spawn(source);
        if let Some(previous) = self.lock_pump().replace(handle.abort_handle()) {
            previous.abort();
            debug!(subsystem = "session", "Replaced attached event source pump");
        }
        handle
    }

    /// Whether an attached pump is still running.
    pub fn is_attached(&self) -> bool {
        self.lock_pump()
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    fn stop_pump(&self) {
        if let Some(handle) = self.lock_pump().take() {
            handle.abort();
            debug!(subsystem = "session", "Stopped event source pump");
        }
    }
}

impl Default for WorkspaceSession {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl Drop for WorkspaceSession {
    fn drop(&mut self) {
        self.stop_pump();
    }
}
