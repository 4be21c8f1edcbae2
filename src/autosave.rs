use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::note::{Note, NoteStore};

/// Debounced single-slot autosave.
///
/// Each `schedule` aborts whatever flush is still pending and arms a fresh
/// one, so a burst of edits produces one write of the latest content. At most
/// one flush is ever pending.
#[derive(Default)]
pub struct AutoSaver {
    slot: Mutex<Option<JoinHandle<()>>>,
}

impl AutoSaver {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_pending(&self) -> Option<JoinHandle<()>> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Arm a flush of `note` after `delay`, replacing any pending one.
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, store: NoteStore, note: Note, delay: Duration) {
        let mut slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match store.save(&note).await {
                Ok(()) => log::info!("[autosave] Saved {}", note.path()),
                Err(e) => log::error!("[autosave] Failed to save {}: {}", note.path(), e),
            }
        }));
    }

    /// Drop the pending flush, if any
    pub fn cancel(&self) {
        if let Some(pending) = self.take_pending() {
            pending.abort();
            log::debug!("[autosave] Pending save cancelled");
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        self.cancel();
    }
}
