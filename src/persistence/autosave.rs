use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::error::StoreError;
use super::persist::PersistenceService;
use crate::graph_utils::graph::Npc;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SaveStatus {
    pub is_saving: bool,
    pub last_saved_at: Option<OffsetDateTime>,
    pub last_error: Option<String>,
}

/// Coalesces bursts of edits into a single save after a quiet period.
pub struct AutosaveController {
    service: Arc<PersistenceService>,
    window: Duration,
    handle: Handle,
    pending: Mutex<Option<JoinHandle<()>>>,
    status: Arc<watch::Sender<SaveStatus>>,
}

fn run_save(service: &PersistenceService, status: &watch::Sender<SaveStatus>, data: &[Npc]) -> Result<(), StoreError> {
    status.send_modify(|s| s.is_saving = true);
    let result = service.save_all(data);
    status.send_modify(|s| {
        s.is_saving = false;
        match &result {
            Ok(()) => {
                s.last_saved_at = Some(OffsetDateTime::now_utc());
                s.last_error = None;
            }
            Err(e) => s.last_error = Some(format!("Save failed: {}", e)),
        }
    });
    result
}

impl AutosaveController {
    /// Timers are spawned on `handle`, so scheduling works from threads that
    /// aren't running inside the runtime.
    pub fn new(service: Arc<PersistenceService>, window: Duration, handle: Handle) -> Self {
        let (tx, _rx) = watch::channel(SaveStatus::default());
        Self {
            service,
            window,
            handle,
            pending: Mutex::new(None),
            status: Arc::new(tx),
        }
    }

    pub fn window(&self) -> Duration { self.window }

    fn pending(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn abort_task(slot: &mut Option<JoinHandle<()>>) -> bool {
        match slot.take() {
            Some(task) if !task.is_finished() => {
                task.abort();
                true
            }
            _ => false,
        }
    }

    /// Drop the pending debounced save, if any, without writing anything.
    pub fn cancel(&self) -> bool {
        let cancelled = Self::abort_task(&mut self.pending());
        if cancelled {
            debug!("pending autosave cancelled");
        }
        cancelled
    }

    /// Save `data` once no further call arrives within the debounce window.
    pub fn schedule(&self, data: Vec<Npc>) {
        let mut pending = self.pending();
        if Self::abort_task(&mut pending) {
            debug!("autosave rescheduled with newer data");
        }
        let service = self.service.clone();
        let status = self.status.clone();
        let window = self.window;
        *pending = Some(self.handle.spawn(async move {
            tokio::time::sleep(window).await;
            // No await past this point: once started, a save runs to completion
            if let Err(e) = run_save(&service, &status, &data) {
                warn!("autosave failed, will retry on next edit: {}", e);
            }
        }));
    }

    /// Drop any pending debounced save and write `data` right away on the
    /// calling thread.
    pub fn flush_now(&self, data: Vec<Npc>) -> Result<(), StoreError> {
        self.cancel();
        run_save(&self.service, &self.status, &data)
    }

    pub fn has_pending(&self) -> bool {
        self.pending().as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn status(&self) -> SaveStatus { self.status.borrow().clone() }
    pub fn is_saving(&self) -> bool { self.status.borrow().is_saving }
    pub fn last_saved_at(&self) -> Option<OffsetDateTime> { self.status.borrow().last_saved_at }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.status.subscribe()
    }
}

impl Drop for AutosaveController {
    fn drop(&mut self) {
        if self.has_pending() {
            warn!("autosave controller dropped with an unsaved change pending");
        }
    }
}
