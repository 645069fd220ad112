use crate::begin_work::RenderScope;
use crate::fiber::{FiberArena, FiberId, FiberKind, FiberProps};
use crate::flags::Flags;
use crate::{NodeId, ReconcileError};

fn invalid(kind: &FiberKind, reason: &'static str) -> ReconcileError {
    ReconcileError::InvalidFiberState {
        fiber: kind.name().to_string(),
        reason,
    }
}

/// Finishes `wip` once all of its children are complete: materializes host
/// nodes off-screen, marks host updates, and bubbles flags.
pub(crate) fn complete_work(
    cx: &mut RenderScope<'_>,
    current: Option<FiberId>,
    wip: FiberId,
) -> Result<(), ReconcileError> {
    let kind = cx.fibers[wip].kind.clone();
    log::trace!("complete_work {}", kind.name());
    match &kind {
        FiberKind::HostRoot | FiberKind::FunctionComponent(_) | FiberKind::Fragment => {}
        FiberKind::HostComponent(tag) => {
            let Some(new_props) = cx.fibers[wip].pending_props.as_element().cloned() else {
                return Err(invalid(&kind, "host component without element props"));
            };
            match (current, cx.fibers[wip].state_node) {
                (Some(current), Some(_)) => {
                    let changed = match cx.fibers[current]
                        .memoized_props
                        .as_ref()
                        .and_then(FiberProps::as_element)
                    {
                        Some(old_props) => cx.host.props_differ(tag, old_props, &new_props),
                        None => true,
                    };
                    if changed {
                        cx.fibers[wip].flags |= Flags::UPDATE;
                    }
                }
                _ => {
                    let instance = cx.host.create_instance(tag, &new_props)?;
                    append_all_children(cx, instance, wip)?;
                    cx.fibers[wip].state_node = Some(instance);
                    if cx.host.finalize_initial_children(instance, tag, &new_props)? {
                        cx.fibers[wip].flags |= Flags::UPDATE;
                    }
                }
            }
        }
        FiberKind::HostText => {
            let Some(new_text) = cx.fibers[wip].pending_props.as_text().cloned() else {
                return Err(invalid(&kind, "text fiber without text"));
            };
            match (current, cx.fibers[wip].state_node) {
                (Some(current), Some(_)) => {
                    let old_text = cx.fibers[current]
                        .memoized_props
                        .as_ref()
                        .and_then(FiberProps::as_text);
                    if old_text != Some(&new_text) {
                        cx.fibers[wip].flags |= Flags::UPDATE;
                    }
                }
                _ => {
                    let instance = cx.host.create_text_instance(&new_text)?;
                    cx.fibers[wip].state_node = Some(instance);
                }
            }
        }
    }
    bubble_properties(cx.fibers, wip);
    Ok(())
}

/// Attaches the nearest host descendants of `wip` to `parent`, looking
/// through components and fragments.
fn append_all_children(
    cx: &mut RenderScope<'_>,
    parent: NodeId,
    wip: FiberId,
) -> Result<(), ReconcileError> {
    let mut node = cx.fibers[wip].child;
    while let Some(id) = node {
        let fiber = &cx.fibers[id];
        if fiber.kind.is_host() {
            if let Some(instance) = fiber.state_node {
                cx.host.append_initial_child(parent, instance)?;
            }
        } else if let Some(child) = fiber.child {
            node = Some(child);
            continue;
        }

        let mut cursor = id;
        node = loop {
            if let Some(sibling) = cx.fibers[cursor].sibling {
                break Some(sibling);
            }
            match cx.fibers[cursor].parent {
                Some(parent_fiber) if parent_fiber != wip => cursor = parent_fiber,
                _ => break None,
            }
        };
    }
    Ok(())
}

fn bubble_properties(fibers: &mut FiberArena, wip: FiberId) {
    let mut subtree_flags = Flags::empty();
    let mut child = fibers[wip].child;
    while let Some(id) = child {
        let fiber = &mut fibers[id];
        subtree_flags |= fiber.subtree_flags | fiber.flags;
        fiber.parent = Some(wip);
        child = fiber.sibling;
    }
    fibers[wip].subtree_flags |= subtree_flags;
}
