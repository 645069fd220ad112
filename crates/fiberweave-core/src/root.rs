//! Public entry points: creating a root over a host container and feeding it
//! element trees.

use crate::element::Markup;
use crate::fiber::{Fiber, FiberArena, FiberId, RootQueue};
use crate::flags::ExecutionContext;
use crate::host_config::HostConfig;
use crate::lane::{request_update_lane, Lane, Lanes, NO_LANES};
use crate::platform::RuntimeScheduler;
use crate::sync_queue::SyncTaskQueue;
use crate::update_queue::{create_update, create_update_queue, enqueue_update, Action};
use crate::work_loop::{RenderSession, ScheduleUpdate};
use crate::{NodeId, ReconcileError};
use slotmap::SlotMap;
use std::cell::{Cell, Ref, RefCell};
use std::fmt::Write as _;
use std::rc::{Rc, Weak};

type ErrorCallback = Rc<dyn Fn(&ReconcileError)>;

/// Per-root configuration.
#[derive(Clone, Default)]
pub struct RootOptions {
    /// Invoked for every error the root reports on its own, after it has been
    /// logged.
    pub on_uncaught_error: Option<ErrorCallback>,
}

impl RootOptions {
    pub fn on_uncaught_error(mut self, f: impl Fn(&ReconcileError) + 'static) -> Self {
        self.on_uncaught_error = Some(Rc::new(f));
        self
    }
}

/// Deletions committed but not yet detached; they wait for the passive flush.
#[derive(Default)]
pub(crate) struct PendingPassive {
    pub(crate) deletions: Vec<FiberId>,
}

pub(crate) struct RootState {
    pub(crate) fibers: FiberArena,
    pub(crate) current: FiberId,
    pub(crate) finished_work: Option<FiberId>,
    pub(crate) finished_lanes: Lanes,
    pub(crate) in_flight: Option<RenderSession>,
    pub(crate) pending_passive: Option<PendingPassive>,
}

pub(crate) struct RootInner<H: HostConfig + 'static> {
    pub(crate) container: NodeId,
    pub(crate) host: RefCell<H>,
    pub(crate) state: RefCell<RootState>,
    pub(crate) queue: RootQueue,
    pub(crate) pending_lanes: Cell<Lanes>,
    pub(crate) execution_context: Cell<ExecutionContext>,
    pub(crate) callback_scheduled: Cell<bool>,
    pub(crate) passive_scheduled: Cell<bool>,
    pub(crate) sync_queue: SyncTaskQueue,
    pub(crate) scheduler: Rc<dyn RuntimeScheduler>,
    pub(crate) options: RootOptions,
    pub(crate) errors: RefCell<Vec<ReconcileError>>,
    pub(crate) self_ref: Weak<RootInner<H>>,
}

/// Handle to a mounted fiber tree. Cloning shares the root.
pub struct FiberRoot<H: HostConfig + 'static> {
    inner: Rc<RootInner<H>>,
}

impl<H: HostConfig + 'static> Clone for FiberRoot<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Creates an empty root rendering into `container`.
pub fn create_container<H: HostConfig + 'static>(
    host: H,
    container: NodeId,
    scheduler: Rc<dyn RuntimeScheduler>,
    options: RootOptions,
) -> FiberRoot<H> {
    let queue: RootQueue = Rc::new(RefCell::new(create_update_queue()));
    let mut fibers: FiberArena = SlotMap::with_key();
    let current = fibers.insert(Fiber::host_root(container, Rc::clone(&queue)));
    log::debug!("created root over container {container}");

    let inner = Rc::new_cyclic(|self_ref| RootInner {
        container,
        host: RefCell::new(host),
        state: RefCell::new(RootState {
            fibers,
            current,
            finished_work: None,
            finished_lanes: NO_LANES,
            in_flight: None,
            pending_passive: None,
        }),
        queue,
        pending_lanes: Cell::new(NO_LANES),
        execution_context: Cell::new(ExecutionContext::empty()),
        callback_scheduled: Cell::new(false),
        passive_scheduled: Cell::new(false),
        sync_queue: SyncTaskQueue::default(),
        scheduler,
        options,
        errors: RefCell::new(Vec::new()),
        self_ref: self_ref.clone(),
    });
    FiberRoot { inner }
}

/// Schedules `element` as the root's new content and returns the lane the
/// update was assigned.
pub fn update_container<H: HostConfig + 'static>(
    element: impl Into<Markup>,
    root: &FiberRoot<H>,
) -> Result<Lane, ReconcileError> {
    let inner = &root.inner;
    inner.check_update_allowed()?;
    let lane = request_update_lane();
    enqueue_update(
        &mut inner.queue.borrow_mut(),
        create_update(Action::Value(element.into()), lane),
    );
    match inner.state.try_borrow().map(|state| state.current) {
        Ok(current) => inner.schedule_update_on_fiber(current, lane)?,
        Err(_) => inner.schedule_root(lane),
    }
    Ok(lane)
}

impl<H: HostConfig + 'static> FiberRoot<H> {
    pub fn render(&self, element: impl Into<Markup>) -> Result<Lane, ReconcileError> {
        update_container(element, self)
    }

    /// Schedules removal of everything the root rendered.
    pub fn unmount(&self) -> Result<Lane, ReconcileError> {
        update_container(Markup::Empty, self)
    }

    pub fn container(&self) -> NodeId {
        self.inner.container
    }

    /// Renders and commits pending synchronous work right away instead of
    /// waiting for the scheduled microtask.
    pub fn flush_sync_work(&self) -> Result<(), ReconcileError> {
        self.inner.flush_sync_work()
    }

    /// Runs pending passive effects now. Returns whether there were any.
    pub fn flush_passive_effects(&self) -> bool {
        self.inner.flush_passive_effects()
    }

    pub fn has_pending_passive_effects(&self) -> bool {
        self.inner
            .state
            .try_borrow()
            .map(|state| state.pending_passive.is_some())
            .unwrap_or(false)
    }

    pub fn pending_lanes(&self) -> Lanes {
        self.inner.pending_lanes.get()
    }

    pub fn with_host<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(&mut self.inner.host.borrow_mut())
    }

    pub fn host(&self) -> Ref<'_, H> {
        self.inner.host.borrow()
    }

    /// Drains errors the root reported on its own.
    pub fn take_errors(&self) -> Vec<ReconcileError> {
        std::mem::take(&mut *self.inner.errors.borrow_mut())
    }

    /// Number of fibers in the arena, both buffers included.
    pub fn fiber_count(&self) -> usize {
        self.inner.state.borrow().fibers.len()
    }

    /// Indented dump of the committed fiber tree.
    pub fn dump_fibers(&self) -> String {
        let state = self.inner.state.borrow();
        let mut out = String::new();
        let mut stack = vec![(state.current, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(fiber) = state.fibers.get(id) else {
                continue;
            };
            let _ = write!(out, "{}{}", "  ".repeat(depth), fiber.kind().name());
            if let Some(key) = fiber.key() {
                let _ = write!(out, " key={key}");
            }
            if let Some(node) = fiber.state_node() {
                let _ = write!(out, " #{node}");
            }
            out.push('\n');

            let mut children = Vec::new();
            let mut child = fiber.child;
            while let Some(c) = child {
                children.push((c, depth + 1));
                child = state.fibers.get(c).and_then(|f| f.sibling);
            }
            stack.extend(children.into_iter().rev());
        }
        out
    }
}

#[cfg(test)]
pub(crate) fn test_root() -> (
    Rc<crate::platform::TestScheduler>,
    FiberRoot<crate::memory_host::MemoryHost>,
) {
    let scheduler = Rc::new(crate::platform::TestScheduler::default());
    let mut host = crate::memory_host::MemoryHost::new();
    let container = host.create_container();
    let root = create_container(host, container, scheduler.clone(), RootOptions::default());
    (scheduler, root)
}

#[cfg(test)]
impl FiberRoot<crate::memory_host::MemoryHost> {
    pub(crate) fn html(&self) -> String {
        self.host().inner_html(self.container())
    }
}
