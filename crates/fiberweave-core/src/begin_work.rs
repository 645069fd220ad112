use crate::child_fiber::{MOUNT_CHILD_FIBERS, RECONCILE_CHILD_FIBERS};
use crate::element::{Component, Markup};
use crate::fiber::{
    FiberArena, FiberId, FiberKind, FiberProps, FiberQueue, MemoizedState, RootMemo,
};
use crate::hooks::render_with_hooks;
use crate::host_config::HostConfig;
use crate::lane::Lanes;
use crate::update_queue::process_update_queue;
use crate::work_loop::ScheduleUpdate;
use crate::ReconcileError;
use std::rc::Weak;

/// Everything a unit of work may touch while the root is rendering.
pub(crate) struct RenderScope<'a> {
    pub(crate) fibers: &'a mut FiberArena,
    pub(crate) host: &'a mut dyn HostConfig,
    pub(crate) root: &'a Weak<dyn ScheduleUpdate>,
    pub(crate) render_lanes: Lanes,
}

fn invalid(kind: &FiberKind, reason: &'static str) -> ReconcileError {
    ReconcileError::InvalidFiberState {
        fiber: kind.name().to_string(),
        reason,
    }
}

/// Renders `wip` and returns its first child, if any.
pub(crate) fn begin_work(
    cx: &mut RenderScope<'_>,
    current: Option<FiberId>,
    wip: FiberId,
) -> Result<Option<FiberId>, ReconcileError> {
    let kind = cx.fibers[wip].kind.clone();
    log::trace!("begin_work {}", kind.name());
    match kind {
        FiberKind::HostRoot => update_host_root(cx, current, wip),
        FiberKind::FunctionComponent(component) => {
            update_function_component(cx, current, wip, &component)
        }
        FiberKind::HostComponent(_) => {
            let children = match cx.fibers[wip].pending_props.as_element() {
                Some(props) => props.children()?,
                None => return Err(invalid(&kind, "host component without element props")),
            };
            reconcile_children(cx, current, wip, &children)
        }
        FiberKind::Fragment => {
            let children = match &cx.fibers[wip].pending_props {
                FiberProps::Fragment(children) => children.clone(),
                _ => return Err(invalid(&kind, "fragment without children")),
            };
            reconcile_children(cx, current, wip, &children)
        }
        FiberKind::HostText => Ok(None),
    }
}

fn update_host_root(
    cx: &mut RenderScope<'_>,
    current: Option<FiberId>,
    wip: FiberId,
) -> Result<Option<FiberId>, ReconcileError> {
    let kind = FiberKind::HostRoot;
    let Some(current) = current else {
        return Err(invalid(&kind, "host root without a committed twin"));
    };
    let FiberQueue::Root(queue) = &cx.fibers[wip].update_queue else {
        return Err(invalid(&kind, "host root without an update queue"));
    };
    let pending = queue.borrow_mut().take_pending();

    let MemoizedState::Root(committed) = &mut cx.fibers[current].memoized_state else {
        return Err(invalid(&kind, "host root without root state"));
    };
    committed.base_queue.extend(pending);
    let base_element = committed.element.clone();
    let base_queue = committed.base_queue.clone();

    let element = process_update_queue(base_element, &base_queue, cx.render_lanes)?;
    cx.fibers[wip].memoized_state = MemoizedState::Root(RootMemo {
        element: element.clone(),
        base_queue: Vec::new(),
    });
    reconcile_children(cx, Some(current), wip, &element)
}

fn update_function_component(
    cx: &mut RenderScope<'_>,
    current: Option<FiberId>,
    wip: FiberId,
    component: &Component,
) -> Result<Option<FiberId>, ReconcileError> {
    let Some(props) = cx.fibers[wip].pending_props.as_element().cloned() else {
        return Err(invalid(&cx.fibers[wip].kind, "component without element props"));
    };
    let children = render_with_hooks(
        cx.fibers,
        cx.root,
        current,
        wip,
        component,
        &props,
        cx.render_lanes,
    )?;
    reconcile_children(cx, current, wip, &children)
}

fn reconcile_children(
    cx: &mut RenderScope<'_>,
    current: Option<FiberId>,
    wip: FiberId,
    next_children: &Markup,
) -> Result<Option<FiberId>, ReconcileError> {
    let child = match current {
        Some(current) => {
            let current_child = cx.fibers[current].child;
            RECONCILE_CHILD_FIBERS.reconcile_child_fibers(
                cx.fibers,
                wip,
                current_child,
                next_children,
            )?
        }
        None => MOUNT_CHILD_FIBERS.reconcile_child_fibers(cx.fibers, wip, None, next_children)?,
    };
    cx.fibers[wip].child = child;
    Ok(child)
}
