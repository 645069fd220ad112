//! Commit phase: applies the flags of a finished tree to the host, and the
//! deferred passive-effect flush that follows it.

use crate::fiber::{detach_subtree, FiberArena, FiberId, FiberKind, FiberProps};
use crate::flags::Flags;
use crate::hooks::{Cleanup, Effect};
use crate::host_config::{HostConfig, HostError};
use crate::{NodeId, ReconcileError};
use std::rc::Rc;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum HostParent {
    Container(NodeId),
    Instance(NodeId),
}

/// Bookkeeping produced while committing one tree.
#[derive(Default)]
pub(crate) struct CommitLog {
    /// Deleted subtree roots, detached once the passive flush has run.
    pub(crate) deletions: Vec<FiberId>,
    pub(crate) errors: Vec<ReconcileError>,
}

impl CommitLog {
    fn host_failure(&mut self, fiber: &FiberKind, err: HostError) {
        log::error!("commit of {} failed: {err}", fiber.name());
        self.errors.push(ReconcileError::Host(err));
    }
}

pub(crate) fn commit_mutation_effects(
    fibers: &mut FiberArena,
    host: &mut dyn HostConfig,
    finished: FiberId,
    log: &mut CommitLog,
) {
    commit_mutation_effects_on_fiber(fibers, host, finished, log);
}

fn commit_mutation_effects_on_fiber(
    fibers: &mut FiberArena,
    host: &mut dyn HostConfig,
    fiber: FiberId,
    log: &mut CommitLog,
) {
    recursively_traverse_mutation_effects(fibers, host, fiber, log);
    commit_reconciliation_effects(fibers, host, fiber, log);

    if !fibers[fiber].flags.contains(Flags::UPDATE) {
        return;
    }
    let kind = fibers[fiber].kind.clone();
    let Some(instance) = fibers[fiber].state_node else {
        return;
    };
    let committed = fibers[fiber]
        .alternate
        .and_then(|alternate| fibers.get(alternate))
        .and_then(|alternate| alternate.memoized_props.clone());
    let next = fibers[fiber].memoized_props.clone();

    let result = match (&kind, next) {
        (FiberKind::HostComponent(tag), Some(FiberProps::Element(new_props))) => {
            match committed.as_ref().and_then(FiberProps::as_element) {
                Some(old_props) => host.commit_update(instance, tag, old_props, &new_props),
                None => host.commit_mount(instance, tag, &new_props),
            }
        }
        (FiberKind::HostText, Some(FiberProps::Text(new_text))) => {
            let old_text = committed
                .as_ref()
                .and_then(FiberProps::as_text)
                .cloned()
                .unwrap_or_else(|| new_text.clone());
            host.commit_text_update(instance, &old_text, &new_text)
        }
        _ => Ok(()),
    };
    if let Err(err) = result {
        log.host_failure(&kind, err);
    }
}

fn recursively_traverse_mutation_effects(
    fibers: &mut FiberArena,
    host: &mut dyn HostConfig,
    parent: FiberId,
    log: &mut CommitLog,
) {
    let deletions = fibers[parent].deletions.clone();
    for deleted in deletions {
        commit_deletion_effects(fibers, host, parent, deleted, log);
    }

    if !fibers[parent].subtree_flags.intersects(Flags::MUTATION_MASK) {
        return;
    }
    let mut child = fibers[parent].child;
    while let Some(id) = child {
        commit_mutation_effects_on_fiber(fibers, host, id, log);
        child = fibers[id].sibling;
    }
}

fn commit_reconciliation_effects(
    fibers: &mut FiberArena,
    host: &mut dyn HostConfig,
    fiber: FiberId,
    log: &mut CommitLog,
) {
    if !fibers[fiber].flags.contains(Flags::PLACEMENT) {
        return;
    }
    if let Err(err) = commit_placement(fibers, host, fiber) {
        match err {
            PlacementError::Host(err) => log.host_failure(&fibers[fiber].kind, err),
            PlacementError::Reconcile(err) => {
                log::error!("placement of {} failed: {err}", fibers[fiber].kind.name());
                log.errors.push(err);
            }
        }
    }
    fibers[fiber].flags.remove(Flags::PLACEMENT);
}

enum PlacementError {
    Host(HostError),
    Reconcile(ReconcileError),
}

impl From<HostError> for PlacementError {
    fn from(err: HostError) -> Self {
        PlacementError::Host(err)
    }
}

fn commit_placement(
    fibers: &FiberArena,
    host: &mut dyn HostConfig,
    fiber: FiberId,
) -> Result<(), PlacementError> {
    let parent = host_parent_of(fibers, fibers[fiber].parent).map_err(PlacementError::Reconcile)?;
    let before = host_sibling(fibers, fiber);
    insert_or_append_placement_node(fibers, host, fiber, before, parent)?;
    Ok(())
}

/// Nearest host ancestor, starting at `from` itself.
fn host_parent_of(fibers: &FiberArena, from: Option<FiberId>) -> Result<HostParent, ReconcileError> {
    let mut node = from;
    while let Some(id) = node {
        let fiber = &fibers[id];
        match (&fiber.kind, fiber.state_node) {
            (FiberKind::HostComponent(_), Some(instance)) => return Ok(HostParent::Instance(instance)),
            (FiberKind::HostRoot, Some(container)) => return Ok(HostParent::Container(container)),
            _ => node = fiber.parent,
        }
    }
    Err(ReconcileError::MissingHostParent)
}

/// First host node after `fiber` that is already attached, used as the
/// insertion anchor. Placed siblings are skipped because they are not in
/// the host tree yet.
fn host_sibling(fibers: &FiberArena, fiber: FiberId) -> Option<NodeId> {
    let mut node = fiber;
    'siblings: loop {
        while fibers[node].sibling.is_none() {
            match fibers[node].parent {
                Some(parent) if !fibers[parent].kind.is_host_parent() => node = parent,
                _ => return None,
            }
        }
        let Some(sibling) = fibers[node].sibling else {
            return None;
        };
        node = sibling;
        while !fibers[node].kind.is_host() {
            if fibers[node].flags.contains(Flags::PLACEMENT) {
                continue 'siblings;
            }
            match fibers[node].child {
                Some(child) => node = child,
                None => continue 'siblings,
            }
        }
        if !fibers[node].flags.contains(Flags::PLACEMENT) {
            return fibers[node].state_node;
        }
    }
}

fn insert_or_append_placement_node(
    fibers: &FiberArena,
    host: &mut dyn HostConfig,
    node: FiberId,
    before: Option<NodeId>,
    parent: HostParent,
) -> Result<(), HostError> {
    let fiber = &fibers[node];
    if fiber.kind.is_host() {
        let Some(instance) = fiber.state_node else {
            return Ok(());
        };
        return match (parent, before) {
            (HostParent::Container(container), Some(before)) => {
                host.insert_in_container_before(container, instance, before)
            }
            (HostParent::Container(container), None) => {
                host.append_child_to_container(container, instance)
            }
            (HostParent::Instance(parent), Some(before)) => {
                host.insert_before(parent, instance, before)
            }
            (HostParent::Instance(parent), None) => host.append_child(parent, instance),
        };
    }
    let mut child = fiber.child;
    while let Some(id) = child {
        insert_or_append_placement_node(fibers, host, id, before, parent)?;
        child = fibers[id].sibling;
    }
    Ok(())
}

fn commit_deletion_effects(
    fibers: &mut FiberArena,
    host: &mut dyn HostConfig,
    parent: FiberId,
    deleted: FiberId,
    log: &mut CommitLog,
) {
    // Cleanups must observe the subtree still attached.
    for destroy in take_deleted_subtree_destroys(fibers, deleted) {
        destroy();
    }

    match host_parent_of(fibers, Some(parent)) {
        Ok(host_parent) => {
            if let Err(err) = remove_host_children(fibers, host, host_parent, deleted) {
                log.host_failure(&fibers[deleted].kind, err);
            }
        }
        Err(err) => {
            log::error!("deleting {} failed: {err}", fibers[deleted].kind.name());
            log.errors.push(err);
        }
    }
    log.deletions.push(deleted);
}

/// Removes only the topmost host nodes of a deleted subtree; their
/// descendants leave the host tree with them.
fn remove_host_children(
    fibers: &FiberArena,
    host: &mut dyn HostConfig,
    parent: HostParent,
    node: FiberId,
) -> Result<(), HostError> {
    let fiber = &fibers[node];
    if fiber.kind.is_host() {
        let Some(instance) = fiber.state_node else {
            return Ok(());
        };
        return match parent {
            HostParent::Container(container) => host.remove_child_from_container(container, instance),
            HostParent::Instance(parent) => host.remove_child(parent, instance),
        };
    }
    let mut child = fiber.child;
    while let Some(id) = child {
        remove_host_children(fibers, host, parent, id)?;
        child = fibers[id].sibling;
    }
    Ok(())
}

fn postorder(fibers: &FiberArena, root: FiberId, out: &mut Vec<FiberId>) {
    let mut child = fibers[root].child;
    while let Some(id) = child {
        postorder(fibers, id, out);
        child = fibers[id].sibling;
    }
    out.push(root);
}

/// Pending destroy callbacks of every effect in a deleted subtree, children
/// before parents.
pub(crate) fn take_deleted_subtree_destroys(fibers: &FiberArena, deleted: FiberId) -> Vec<Cleanup> {
    let mut order = Vec::new();
    postorder(fibers, deleted, &mut order);
    order
        .into_iter()
        .flat_map(move |id| fibers[id].effects().iter())
        .filter_map(|effect| effect.inst.take_destroy())
        .collect()
}

/// Work gathered from a committed tree for the passive flush.
#[derive(Default)]
pub(crate) struct PassiveEffects {
    pub(crate) destroys: Vec<Cleanup>,
    pub(crate) creates: Vec<Rc<Effect>>,
}

fn collect_passive_fibers(fibers: &FiberArena, id: FiberId, out: &mut Vec<FiberId>) {
    let fiber = &fibers[id];
    if fiber.subtree_flags.intersects(Flags::PASSIVE) {
        let mut child = fiber.child;
        while let Some(c) = child {
            collect_passive_fibers(fibers, c, out);
            child = fibers[c].sibling;
        }
    }
    if fiber.flags.contains(Flags::PASSIVE) {
        out.push(id);
    }
}

/// Collects every destroy that must run before any create: leftovers in
/// deleted subtrees first, then effects about to re-fire.
pub(crate) fn collect_passive_effects(
    fibers: &FiberArena,
    finished: FiberId,
    deletions: &[FiberId],
) -> PassiveEffects {
    let mut effects = PassiveEffects::default();
    for deleted in deletions {
        if fibers.contains_key(*deleted) {
            effects
                .destroys
                .extend(take_deleted_subtree_destroys(fibers, *deleted));
        }
    }

    let mut passive = Vec::new();
    if fibers.contains_key(finished) {
        collect_passive_fibers(fibers, finished, &mut passive);
    }
    for id in passive {
        for effect in fibers[id].effects() {
            if !effect.needs_fire() {
                continue;
            }
            if let Some(destroy) = effect.inst.take_destroy() {
                effects.destroys.push(destroy);
            }
            effects.creates.push(Rc::clone(effect));
        }
    }
    effects
}

/// Drops deleted fibers from the arena and lets the host release their
/// nodes.
pub(crate) fn detach_deleted_fibers(
    fibers: &mut FiberArena,
    host: &mut dyn HostConfig,
    deletions: &[FiberId],
) {
    for deleted in deletions {
        if !fibers.contains_key(*deleted) {
            continue;
        }
        for instance in detach_subtree(fibers, *deleted) {
            host.detach_deleted_instance(instance);
        }
    }
}

#[cfg(test)]
#[path = "tests/commit_work_tests.rs"]
mod tests;
