//! FIFO update queues shared by the host root and state hooks.

use crate::lane::{is_subset_of_lanes, Lane, Lanes};
use crate::ReconcileError;
use std::fmt;
use std::rc::Rc;

/// A state transition: either a replacement value or a function of the
/// previous state.
pub enum Action<S> {
    Value(S),
    Updater(Rc<dyn Fn(&S) -> S>),
}

impl<S> Action<S> {
    pub fn updater(f: impl Fn(&S) -> S + 'static) -> Self {
        Action::Updater(Rc::new(f))
    }

    fn apply(&self, prev: S) -> S
    where
        S: Clone,
    {
        match self {
            Action::Value(value) => value.clone(),
            Action::Updater(f) => f(&prev),
        }
    }
}

impl<S: Clone> Clone for Action<S> {
    fn clone(&self) -> Self {
        match self {
            Action::Value(value) => Action::Value(value.clone()),
            Action::Updater(f) => Action::Updater(Rc::clone(f)),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Action<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Action::Updater(_) => f.write_str("Updater(..)"),
        }
    }
}

#[derive(Debug)]
pub struct Update<S> {
    pub action: Action<S>,
    pub lane: Lane,
}

impl<S: Clone> Clone for Update<S> {
    fn clone(&self) -> Self {
        Self {
            action: self.action.clone(),
            lane: self.lane,
        }
    }
}

/// Updates waiting for the next render that processes their lane.
#[derive(Debug)]
pub struct UpdateQueue<S> {
    pending: Vec<Update<S>>,
}

impl<S> Default for UpdateQueue<S> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<S> UpdateQueue<S> {
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending(&self) -> &[Update<S>] {
        &self.pending
    }

    /// Moves the pending updates out, leaving the queue empty.
    pub fn take_pending(&mut self) -> Vec<Update<S>> {
        std::mem::take(&mut self.pending)
    }
}

pub fn create_update<S>(action: Action<S>, lane: Lane) -> Update<S> {
    Update { action, lane }
}

pub fn create_update_queue<S>() -> UpdateQueue<S> {
    UpdateQueue::default()
}

pub fn enqueue_update<S>(queue: &mut UpdateQueue<S>, update: Update<S>) {
    queue.pending.push(update);
}

/// Folds `updates` over `base_state` in insertion order.
///
/// The slice is only read, so running the same fold twice yields the same
/// state. Every update must belong to `render_lanes`.
pub fn process_update_queue<S: Clone>(
    base_state: S,
    updates: &[Update<S>],
    render_lanes: Lanes,
) -> Result<S, ReconcileError> {
    updates.iter().try_fold(base_state, |state, update| {
        if !is_subset_of_lanes(render_lanes, update.lane) {
            return Err(ReconcileError::SkippedUpdateLane {
                update: update.lane,
                render: render_lanes,
            });
        }
        Ok(update.action.apply(state))
    })
}

#[cfg(test)]
#[path = "tests/update_queue_tests.rs"]
mod tests;
