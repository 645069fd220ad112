use std::cell::{Cell, RefCell};

type SyncCallback = Box<dyn FnOnce() + 'static>;

/// Root callbacks that must run before control returns to the host's
/// regular task queue. Flushed from a single microtask.
#[derive(Default)]
pub(crate) struct SyncTaskQueue {
    callbacks: RefCell<Vec<SyncCallback>>,
    flushing: Cell<bool>,
}

impl SyncTaskQueue {
    /// Enqueues `callback`. Returns `true` when the queue was empty, meaning
    /// the caller must arrange a flush.
    pub(crate) fn schedule_sync_callback(&self, callback: SyncCallback) -> bool {
        let mut callbacks = self.callbacks.borrow_mut();
        let was_empty = callbacks.is_empty();
        callbacks.push(callback);
        was_empty
    }

    /// Runs queued callbacks until the queue stays empty. Re-entrant calls
    /// are ignored; callbacks queued while flushing run in the same flush.
    pub(crate) fn flush_sync_callbacks(&self) {
        if self.flushing.replace(true) {
            return;
        }
        loop {
            let batch = std::mem::take(&mut *self.callbacks.borrow_mut());
            if batch.is_empty() {
                break;
            }
            for callback in batch {
                callback();
            }
        }
        self.flushing.set(false);
    }
}

#[cfg(test)]
#[path = "tests/sync_queue_tests.rs"]
mod tests;
