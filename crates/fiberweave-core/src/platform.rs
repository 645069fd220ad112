//! Platform abstraction for the reconciler's scheduling needs.
//!
//! The reconciler never spins its own event loop. Synchronous updates are
//! coalesced onto a single microtask and passive effects are deferred to a
//! regular task; both are handed to the host through [`RuntimeScheduler`].

/// Priority hint attached to deferred tasks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TaskPriority {
    Immediate,
    UserBlocking,
    #[default]
    Normal,
    Low,
    Idle,
}

/// Schedules work on behalf of a fiber root.
///
/// Implementations run on the UI thread only; the callbacks capture `Rc`
/// handles and are therefore not `Send`.
pub trait RuntimeScheduler {
    /// Queue `task` to run after the current task finishes and before the
    /// next regular task starts.
    fn schedule_microtask(&self, task: Box<dyn FnOnce() + 'static>);

    /// Queue `task` as a regular task with the given priority.
    fn schedule_task(&self, priority: TaskPriority, task: Box<dyn FnOnce() + 'static>);
}

#[cfg(test)]
pub(crate) use test_scheduler::TestScheduler;
