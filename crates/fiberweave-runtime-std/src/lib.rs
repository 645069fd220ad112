//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides a single-threaded event loop implementing the
//! [`RuntimeScheduler`] trait defined in `fiberweave-core`. Applications
//! construct a [`StdRuntime`], create roots through it, and pump it with
//! [`StdRuntime::run_until_idle`] from their own loop.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

use fiberweave_core::{
    create_container, FiberRoot, HostConfig, NodeId, RootOptions, RuntimeScheduler, TaskPriority,
};

type Task = Box<dyn FnOnce() + 'static>;

struct QueuedTask {
    priority: TaskPriority,
    seq: u64,
    task: Task,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    // BinaryHeap pops the greatest entry: more urgent priorities first, then
    // the oldest task within a priority.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Scheduler that keeps microtasks and tasks in local queues until the
/// owning loop drains them.
pub struct StdScheduler {
    microtasks: RefCell<VecDeque<Task>>,
    tasks: RefCell<BinaryHeap<QueuedTask>>,
    next_seq: Cell<u64>,
    waker: RefCell<Option<Rc<dyn Fn()>>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            microtasks: RefCell::new(VecDeque::new()),
            tasks: RefCell::new(BinaryHeap::new()),
            next_seq: Cell::new(0),
            waker: RefCell::new(None),
        }
    }

    /// Registers a waker invoked whenever new work is queued.
    pub fn set_waker(&self, waker: impl Fn() + 'static) {
        *self.waker.borrow_mut() = Some(Rc::new(waker));
    }

    /// Clears any registered waker.
    pub fn clear_waker(&self) {
        *self.waker.borrow_mut() = None;
    }

    pub fn has_pending_work(&self) -> bool {
        !self.microtasks.borrow().is_empty() || !self.tasks.borrow().is_empty()
    }

    /// Runs every queued microtask, including ones queued while draining.
    pub fn run_microtasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.microtasks.borrow_mut().pop_front();
            let Some(task) = next else {
                return ran;
            };
            task();
            ran += 1;
        }
    }

    /// Runs the most urgent task followed by the microtasks it queued.
    /// Returns false when there was nothing to run.
    pub fn run_next_task(&self) -> bool {
        let next = self.tasks.borrow_mut().pop();
        let Some(QueuedTask { priority, task, .. }) = next else {
            return false;
        };
        log::trace!("running {priority:?} task");
        task();
        self.run_microtasks();
        true
    }

    /// Drains microtasks and tasks until both queues are empty. Returns the
    /// number of callbacks that ran.
    pub fn run_until_idle(&self) -> usize {
        let started = Instant::now();
        let mut ran = self.run_microtasks();
        loop {
            let next = self.tasks.borrow_mut().pop();
            let Some(QueuedTask { task, .. }) = next else {
                break;
            };
            task();
            ran += 1 + self.run_microtasks();
        }
        if ran > 0 {
            log::debug!("ran {ran} callbacks in {:?}", started.elapsed());
        }
        ran
    }

    fn wake(&self) {
        let waker = self.waker.borrow().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("microtasks", &self.microtasks.borrow().len())
            .field("tasks", &self.tasks.borrow().len())
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_microtask(&self, task: Task) {
        self.microtasks.borrow_mut().push_back(task);
        self.wake();
    }

    fn schedule_task(&self, priority: TaskPriority, task: Task) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.tasks.borrow_mut().push(QueuedTask {
            priority,
            seq,
            task,
        });
        self.wake();
    }
}

/// Convenience container owning the standard scheduler.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Rc<StdScheduler>,
}

impl StdRuntime {
    pub fn new() -> Self {
        Self {
            scheduler: Rc::new(StdScheduler::default()),
        }
    }

    /// Returns the scheduler implementation.
    pub fn scheduler(&self) -> Rc<StdScheduler> {
        Rc::clone(&self.scheduler)
    }

    /// Returns the scheduler as the trait object roots expect.
    pub fn scheduler_handle(&self) -> Rc<dyn RuntimeScheduler> {
        self.scheduler.clone()
    }

    /// Creates a root over `container` driven by this runtime.
    pub fn create_root<H: HostConfig + 'static>(
        &self,
        host: H,
        container: NodeId,
        options: RootOptions,
    ) -> FiberRoot<H> {
        create_container(host, container, self.scheduler_handle(), options)
    }

    pub fn has_pending_work(&self) -> bool {
        self.scheduler.has_pending_work()
    }

    pub fn run_until_idle(&self) -> usize {
        self.scheduler.run_until_idle()
    }

    pub fn set_waker(&self, waker: impl Fn() + 'static) {
        self.scheduler.set_waker(waker);
    }

    pub fn clear_waker(&self) {
        self.scheduler.clear_waker();
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tests/std_runtime_tests.rs"]
mod tests;
