//! Render and commit driver for a single root.
//!
//! Updates mark lanes on the root and make sure exactly one callback is
//! queued for them. Sync work is flushed from a microtask; the passive
//! effects of a commit run later from a regular task.

use crate::begin_work::{begin_work, RenderScope};
use crate::collections::map::HashSet;
use crate::commit_work::{
    collect_passive_effects, commit_mutation_effects, detach_deleted_fibers, CommitLog,
};
use crate::complete_work::complete_work;
use crate::fiber::{clone_for_work, subtree_preorder, FiberId, FiberKind, FiberProps};
use crate::flags::{ExecutionContext, Flags};
use crate::host_config::HostConfig;
use crate::lane::{
    get_highest_priority_lane, get_next_lanes, includes_some_lane, mark_root_finished,
    merge_lanes, Lane, Lanes, SYNC_LANE,
};
use crate::platform::TaskPriority;
use crate::root::{PendingPassive, RootInner, RootState};
use crate::ReconcileError;
use std::rc::Weak;

/// Implemented by roots so hooks can schedule work without knowing the host
/// type.
pub(crate) trait ScheduleUpdate {
    fn check_update_allowed(&self) -> Result<(), ReconcileError>;

    fn schedule_update_on_fiber(&self, fiber: FiberId, lane: Lane) -> Result<(), ReconcileError>;
}

/// A render pass in progress.
#[derive(Debug)]
pub(crate) struct RenderSession {
    pub(crate) root: FiberId,
    pub(crate) lanes: Lanes,
    pub(crate) work_in_progress: Option<FiberId>,
}

impl<H: HostConfig + 'static> ScheduleUpdate for RootInner<H> {
    fn check_update_allowed(&self) -> Result<(), ReconcileError> {
        if self
            .execution_context
            .get()
            .contains(ExecutionContext::RENDER)
        {
            return Err(ReconcileError::RenderPhaseUpdate);
        }
        Ok(())
    }

    fn schedule_update_on_fiber(&self, fiber: FiberId, lane: Lane) -> Result<(), ReconcileError> {
        self.check_update_allowed()?;
        // The tree is only borrowed while committing; the walk is skipped then.
        if let Ok(state) = self.state.try_borrow() {
            if !reaches_host_root(&state, fiber) {
                log::warn!("update on unmounted fiber {fiber:?} dropped");
                return Ok(());
            }
        }
        self.schedule_root(lane);
        Ok(())
    }
}

fn reaches_host_root(state: &RootState, fiber: FiberId) -> bool {
    let mut node = fiber;
    loop {
        let Some(current) = state.fibers.get(node) else {
            return false;
        };
        match current.parent {
            Some(parent) => node = parent,
            None => return current.kind == FiberKind::HostRoot,
        }
    }
}

impl<H: HostConfig + 'static> RootInner<H> {
    pub(crate) fn schedule_root(&self, lane: Lane) {
        self.pending_lanes
            .set(merge_lanes(self.pending_lanes.get(), lane));
        self.ensure_root_is_scheduled();
    }

    fn ensure_root_is_scheduled(&self) {
        let next = get_next_lanes(self.pending_lanes.get());
        if next.is_empty() || self.callback_scheduled.get() {
            return;
        }
        self.callback_scheduled.set(true);
        let root = self.self_ref.clone();

        if get_highest_priority_lane(next) == SYNC_LANE {
            log::debug!("scheduling sync work on container {}", self.container);
            let first = self.sync_queue.schedule_sync_callback(Box::new(move || {
                if let Some(root) = root.upgrade() {
                    root.perform_sync_work_on_root();
                }
            }));
            if first {
                let root = self.self_ref.clone();
                self.scheduler.schedule_microtask(Box::new(move || {
                    if let Some(root) = root.upgrade() {
                        root.sync_queue.flush_sync_callbacks();
                    }
                }));
            }
        } else {
            log::debug!("scheduling deferred work for lanes {:?}", next);
            self.scheduler.schedule_task(
                TaskPriority::Normal,
                Box::new(move || {
                    if let Some(root) = root.upgrade() {
                        root.perform_concurrent_work_on_root();
                    }
                }),
            );
        }
    }

    fn perform_sync_work_on_root(&self) {
        self.callback_scheduled.set(false);
        if !self.execution_context.get().is_empty() {
            self.ensure_root_is_scheduled();
            return;
        }
        self.flush_passive_effects();
        let lanes = get_next_lanes(self.pending_lanes.get());
        if !includes_some_lane(lanes, SYNC_LANE) {
            self.ensure_root_is_scheduled();
            return;
        }
        if let Err(err) = self.perform_work_on_root(lanes) {
            self.report_error(err);
        }
    }

    fn perform_concurrent_work_on_root(&self) {
        self.callback_scheduled.set(false);
        if !self.execution_context.get().is_empty() {
            self.ensure_root_is_scheduled();
            return;
        }
        self.flush_passive_effects();
        let lanes = get_next_lanes(self.pending_lanes.get());
        if lanes.is_empty() {
            return;
        }
        if let Err(err) = self.perform_work_on_root(lanes) {
            self.report_error(err);
        }
    }

    pub(crate) fn flush_sync_work(&self) -> Result<(), ReconcileError> {
        if !self.execution_context.get().is_empty() {
            return Err(ReconcileError::RootBusy);
        }
        self.flush_passive_effects();
        let lanes = get_next_lanes(self.pending_lanes.get());
        if lanes.is_empty() {
            return Ok(());
        }
        self.perform_work_on_root(lanes)
    }

    fn perform_work_on_root(&self, lanes: Lanes) -> Result<(), ReconcileError> {
        let result = self.render_and_commit(lanes);
        self.ensure_root_is_scheduled();
        result
    }

    fn render_and_commit(&self, lanes: Lanes) -> Result<(), ReconcileError> {
        let mut state = self
            .state
            .try_borrow_mut()
            .map_err(|_| ReconcileError::RootBusy)?;
        let mut host = self
            .host
            .try_borrow_mut()
            .map_err(|_| ReconcileError::RootBusy)?;
        let state = &mut *state;
        let host: &mut dyn HostConfig = &mut *host;
        let root_link: Weak<dyn ScheduleUpdate> = self.self_ref.clone();

        log::debug!("render lanes {:?} on container {}", lanes, self.container);
        self.execution_context.set(ExecutionContext::RENDER);
        let rendered = render_root_sync(state, host, &root_link, lanes);
        self.execution_context.set(ExecutionContext::empty());

        match rendered {
            Ok(finished) => {
                state.finished_work = Some(finished);
                state.finished_lanes = lanes;
                self.commit_root(state, host);
                Ok(())
            }
            Err(err) => {
                // No retry: the lanes are dropped, their updates stay queued
                // and replay with the next update.
                self.pending_lanes
                    .set(mark_root_finished(self.pending_lanes.get(), lanes));
                discard_work_in_progress(state, host);
                Err(err)
            }
        }
    }

    fn commit_root(&self, state: &mut RootState, host: &mut dyn HostConfig) {
        let Some(finished) = state.finished_work.take() else {
            return;
        };
        let lanes = std::mem::take(&mut state.finished_lanes);
        state.in_flight = None;
        self.pending_lanes
            .set(mark_root_finished(self.pending_lanes.get(), lanes));

        let root_flags = state.fibers[finished].flags | state.fibers[finished].subtree_flags;
        let has_passive = root_flags.intersects(Flags::PASSIVE_MASK);

        let mut log = CommitLog::default();
        if root_flags.intersects(Flags::MUTATION_MASK) {
            self.execution_context.set(ExecutionContext::COMMIT);
            commit_mutation_effects(&mut state.fibers, host, finished, &mut log);
            self.execution_context.set(ExecutionContext::empty());
        }
        state.current = finished;
        log::debug!(
            "committed container {} ({} deletions)",
            self.container,
            log.deletions.len()
        );

        if has_passive {
            state
                .pending_passive
                .get_or_insert_with(PendingPassive::default)
                .deletions
                .extend(log.deletions);
            self.schedule_passive_flush();
        }
        for err in log.errors {
            self.report_error(err);
        }
    }

    fn schedule_passive_flush(&self) {
        if self.passive_scheduled.replace(true) {
            return;
        }
        let root = self.self_ref.clone();
        self.scheduler.schedule_task(
            TaskPriority::Normal,
            Box::new(move || {
                if let Some(root) = root.upgrade() {
                    root.flush_passive_effects();
                }
            }),
        );
    }

    /// Runs every pending passive destroy, detaches deleted fibers, then runs
    /// every pending create.
    pub(crate) fn flush_passive_effects(&self) -> bool {
        let (effects, deletions) = {
            let Ok(mut state) = self.state.try_borrow_mut() else {
                return false;
            };
            let Some(pending) = state.pending_passive.take() else {
                return false;
            };
            self.passive_scheduled.set(false);
            let effects = collect_passive_effects(&state.fibers, state.current, &pending.deletions);
            (effects, pending.deletions)
        };
        log::debug!(
            "flushing passive effects: {} destroys, {} creates",
            effects.destroys.len(),
            effects.creates.len()
        );

        for destroy in effects.destroys {
            destroy();
        }
        if let (Ok(mut state), Ok(mut host)) =
            (self.state.try_borrow_mut(), self.host.try_borrow_mut())
        {
            detach_deleted_fibers(&mut state.fibers, &mut *host, &deletions);
        }
        for effect in effects.creates {
            if let Some(create) = effect.take_create() {
                effect.inst.set_destroy(create());
            }
        }
        true
    }

    pub(crate) fn report_error(&self, err: ReconcileError) {
        log::error!("container {}: {err}", self.container);
        if let Some(callback) = &self.options.on_uncaught_error {
            callback(&err);
        }
        self.errors.borrow_mut().push(err);
    }
}

/// Renders the whole tree for `lanes` and returns the finished root.
fn render_root_sync(
    state: &mut RootState,
    host: &mut dyn HostConfig,
    root_link: &Weak<dyn ScheduleUpdate>,
    lanes: Lanes,
) -> Result<FiberId, ReconcileError> {
    let resume = matches!(&state.in_flight, Some(session) if session.lanes == lanes);
    if !resume {
        prepare_fresh_stack(state, lanes);
    }
    let RootState {
        fibers, in_flight, ..
    } = state;
    let Some(session) = in_flight.as_mut() else {
        return Err(ReconcileError::InvalidFiberState {
            fiber: FiberKind::HostRoot.name().to_string(),
            reason: "no render in flight",
        });
    };
    let mut cx = RenderScope {
        fibers,
        host,
        root: root_link,
        render_lanes: lanes,
    };
    while let Some(unit) = session.work_in_progress {
        perform_unit_of_work(&mut cx, session, unit)?;
    }
    Ok(session.root)
}

fn prepare_fresh_stack(state: &mut RootState, lanes: Lanes) {
    state.finished_work = None;
    let root = clone_for_work(&mut state.fibers, state.current, FiberProps::None);
    state.in_flight = Some(RenderSession {
        root,
        lanes,
        work_in_progress: Some(root),
    });
}

fn perform_unit_of_work(
    cx: &mut RenderScope<'_>,
    session: &mut RenderSession,
    unit: FiberId,
) -> Result<(), ReconcileError> {
    let current = cx.fibers[unit].alternate;
    let next = begin_work(cx, current, unit)?;
    let fiber = &mut cx.fibers[unit];
    fiber.memoized_props = Some(fiber.pending_props.clone());
    match next {
        Some(child) => {
            session.work_in_progress = Some(child);
            Ok(())
        }
        None => complete_unit_of_work(cx, session, unit),
    }
}

fn complete_unit_of_work(
    cx: &mut RenderScope<'_>,
    session: &mut RenderSession,
    unit: FiberId,
) -> Result<(), ReconcileError> {
    let mut completed = unit;
    loop {
        let current = cx.fibers[completed].alternate;
        complete_work(cx, current, completed)?;
        if let Some(sibling) = cx.fibers[completed].sibling {
            session.work_in_progress = Some(sibling);
            return Ok(());
        }
        match cx.fibers[completed].parent {
            Some(parent) if completed != session.root => completed = parent,
            _ => {
                session.work_in_progress = None;
                return Ok(());
            }
        }
    }
}

/// Throws away an abandoned pass. Fibers it created are swept from the arena
/// and their host nodes released; the committed tree, its twins and deletions
/// still awaiting the passive flush survive.
fn discard_work_in_progress(state: &mut RootState, host: &mut dyn HostConfig) {
    state.in_flight = None;
    state.finished_work = None;

    let mut live = HashSet::default();
    let mut roots = vec![state.current];
    if let Some(pending) = &state.pending_passive {
        roots.extend(pending.deletions.iter().copied());
    }
    for root in roots {
        for id in subtree_preorder(&state.fibers, root) {
            live.insert(id);
            if let Some(alternate) = state.fibers[id].alternate {
                live.insert(alternate);
            }
        }
    }

    let stale: Vec<FiberId> = state
        .fibers
        .keys()
        .filter(|id| !live.contains(id))
        .collect();
    log::debug!("discarding render: sweeping {} fibers", stale.len());
    for id in stale {
        if let Some(fiber) = state.fibers.remove(id) {
            if fiber.kind.is_host() {
                if let Some(instance) = fiber.state_node {
                    host.detach_deleted_instance(instance);
                }
            }
        }
    }
}
