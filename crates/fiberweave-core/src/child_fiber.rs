//! Child list reconciliation.
//!
//! Diffs the committed children of a fiber against freshly rendered markup
//! and produces the work-in-progress child list, tagging placements and
//! recording deletions on the parent. Moves are detected with a single
//! forward scan: a reused child whose old index is behind the last stable
//! one is re-inserted, everything else stays put.

use crate::collections::map::HashMap;
use crate::collections::map_with_capacity;
use crate::element::{Element, ElementType, Key, Markup};
use crate::fiber::{
    clone_for_work, fiber_from_element, fiber_from_fragment, fiber_from_text, FiberArena,
    FiberId, FiberKind, FiberProps,
};
use crate::flags::Flags;
use crate::ReconcileError;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum ChildKey {
    Key(Key),
    Index(usize),
}

impl ChildKey {
    fn of(key: Option<&Key>, index: usize) -> Self {
        match key {
            Some(key) => ChildKey::Key(key.clone()),
            None => ChildKey::Index(index),
        }
    }
}

fn text_child(markup: &Markup) -> Option<&Rc<str>> {
    match markup {
        Markup::Text(text) if !text.is_empty() => Some(text),
        _ => None,
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct ChildReconciler {
    track_side_effects: bool,
}

/// Used for fibers without a committed twin: nothing to delete or move.
pub(crate) const MOUNT_CHILD_FIBERS: ChildReconciler = ChildReconciler {
    track_side_effects: false,
};

pub(crate) const RECONCILE_CHILD_FIBERS: ChildReconciler = ChildReconciler {
    track_side_effects: true,
};

impl ChildReconciler {
    fn delete_child(self, fibers: &mut FiberArena, return_fiber: FiberId, child: FiberId) {
        if !self.track_side_effects {
            return;
        }
        let parent = &mut fibers[return_fiber];
        parent.deletions.push(child);
        parent.flags |= Flags::CHILD_DELETION;
    }

    fn delete_remaining_children(
        self,
        fibers: &mut FiberArena,
        return_fiber: FiberId,
        current_first: Option<FiberId>,
    ) {
        if !self.track_side_effects {
            return;
        }
        let mut child = current_first;
        while let Some(id) = child {
            self.delete_child(fibers, return_fiber, id);
            child = fibers[id].sibling;
        }
    }

    fn map_remaining_children(
        fibers: &FiberArena,
        current_first: Option<FiberId>,
        capacity: usize,
    ) -> HashMap<ChildKey, FiberId> {
        let mut existing = map_with_capacity(capacity);
        let mut child = current_first;
        while let Some(id) = child {
            let fiber = &fibers[id];
            existing.insert(ChildKey::of(fiber.key.as_ref(), fiber.index), id);
            child = fiber.sibling;
        }
        existing
    }

    fn use_fiber(fibers: &mut FiberArena, fiber: FiberId, pending_props: FiberProps) -> FiberId {
        let clone = clone_for_work(fibers, fiber, pending_props);
        let wip = &mut fibers[clone];
        wip.index = 0;
        wip.sibling = None;
        clone
    }

    fn place_child(
        self,
        fibers: &mut FiberArena,
        new_fiber: FiberId,
        last_placed_index: usize,
        new_index: usize,
    ) -> usize {
        fibers[new_fiber].index = new_index;
        if !self.track_side_effects {
            return last_placed_index;
        }
        match fibers[new_fiber].alternate {
            Some(current) => {
                let old_index = fibers[current].index;
                if old_index < last_placed_index {
                    fibers[new_fiber].flags |= Flags::PLACEMENT;
                    last_placed_index
                } else {
                    old_index
                }
            }
            None => {
                fibers[new_fiber].flags |= Flags::PLACEMENT;
                last_placed_index
            }
        }
    }

    fn place_single_child(self, fibers: &mut FiberArena, new_fiber: FiberId) -> FiberId {
        if self.track_side_effects && fibers[new_fiber].alternate.is_none() {
            fibers[new_fiber].flags |= Flags::PLACEMENT;
        }
        new_fiber
    }

    fn update_text_node(
        fibers: &mut FiberArena,
        return_fiber: FiberId,
        current: Option<FiberId>,
        text: &Rc<str>,
    ) -> FiberId {
        let fiber = match current {
            Some(current) if fibers[current].kind == FiberKind::HostText => {
                Self::use_fiber(fibers, current, FiberProps::Text(text.clone()))
            }
            _ => fiber_from_text(fibers, text.clone()),
        };
        fibers[fiber].parent = Some(return_fiber);
        fiber
    }

    fn update_element(
        fibers: &mut FiberArena,
        return_fiber: FiberId,
        current: Option<FiberId>,
        element: &Element,
    ) -> Result<FiberId, ReconcileError> {
        if let ElementType::Fragment = element.ty() {
            let children = element.props().children()?;
            return Ok(Self::update_fragment(
                fibers,
                return_fiber,
                current,
                children,
                element.key_ref().cloned(),
            ));
        }
        let fiber = match current {
            Some(current) if fibers[current].kind.matches_element(element.ty()) => Self::use_fiber(
                fibers,
                current,
                FiberProps::Element(element.props().clone()),
            ),
            _ => fiber_from_element(fibers, element)?,
        };
        fibers[fiber].parent = Some(return_fiber);
        Ok(fiber)
    }

    fn update_fragment(
        fibers: &mut FiberArena,
        return_fiber: FiberId,
        current: Option<FiberId>,
        children: Markup,
        key: Option<Key>,
    ) -> FiberId {
        let fiber = match current {
            Some(current) if fibers[current].kind == FiberKind::Fragment => {
                Self::use_fiber(fibers, current, FiberProps::Fragment(children))
            }
            _ => fiber_from_fragment(fibers, children, key),
        };
        fibers[fiber].parent = Some(return_fiber);
        fiber
    }

    fn create_child(
        fibers: &mut FiberArena,
        return_fiber: FiberId,
        new_child: &Markup,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let created = match new_child {
            Markup::Element(element) => fiber_from_element(fibers, element)?,
            Markup::List(items) => fiber_from_fragment(fibers, Markup::List(items.clone()), None),
            other => match text_child(other) {
                Some(text) => fiber_from_text(fibers, text.clone()),
                None => return Ok(None),
            },
        };
        fibers[created].parent = Some(return_fiber);
        Ok(Some(created))
    }

    /// Attempts to pair `new_child` with the old fiber in the same slot.
    /// `None` means the keys disagree and the lockstep pass must stop.
    fn update_slot(
        fibers: &mut FiberArena,
        return_fiber: FiberId,
        old_fiber: Option<FiberId>,
        new_child: &Markup,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let key = old_fiber.and_then(|old| fibers[old].key.clone());
        match new_child {
            Markup::Element(element) => {
                if element.key_ref() == key.as_ref() {
                    Self::update_element(fibers, return_fiber, old_fiber, element).map(Some)
                } else {
                    Ok(None)
                }
            }
            Markup::List(items) => {
                if key.is_some() {
                    return Ok(None);
                }
                Ok(Some(Self::update_fragment(
                    fibers,
                    return_fiber,
                    old_fiber,
                    Markup::List(items.clone()),
                    None,
                )))
            }
            other => match text_child(other) {
                Some(_) if key.is_some() => Ok(None),
                Some(text) => Ok(Some(Self::update_text_node(
                    fibers,
                    return_fiber,
                    old_fiber,
                    text,
                ))),
                None => Ok(None),
            },
        }
    }

    fn update_from_map(
        fibers: &mut FiberArena,
        existing: &HashMap<ChildKey, FiberId>,
        return_fiber: FiberId,
        new_index: usize,
        new_child: &Markup,
    ) -> Result<Option<FiberId>, ReconcileError> {
        match new_child {
            Markup::Element(element) => {
                let matched = existing
                    .get(&ChildKey::of(element.key_ref(), new_index))
                    .copied();
                Self::update_element(fibers, return_fiber, matched, element).map(Some)
            }
            Markup::List(items) => {
                let matched = existing.get(&ChildKey::Index(new_index)).copied();
                Ok(Some(Self::update_fragment(
                    fibers,
                    return_fiber,
                    matched,
                    Markup::List(items.clone()),
                    None,
                )))
            }
            other => match text_child(other) {
                Some(text) => {
                    let matched = existing.get(&ChildKey::Index(new_index)).copied();
                    Ok(Some(Self::update_text_node(
                        fibers,
                        return_fiber,
                        matched,
                        text,
                    )))
                }
                None => Ok(None),
            },
        }
    }

    fn reconcile_children_array(
        self,
        fibers: &mut FiberArena,
        return_fiber: FiberId,
        current_first: Option<FiberId>,
        new_children: &[Markup],
    ) -> Result<Option<FiberId>, ReconcileError> {
        let mut first: Option<FiberId> = None;
        let mut previous: Option<FiberId> = None;
        let mut link = |fibers: &mut FiberArena, fiber: FiberId| {
            match previous {
                Some(prev) => fibers[prev].sibling = Some(fiber),
                None => first = Some(fiber),
            }
            previous = Some(fiber);
        };

        let mut old_fiber = current_first;
        let mut last_placed_index = 0;
        let mut new_index = 0;

        // Walk old and new in lockstep while the slots keep matching.
        while let Some(old) = old_fiber {
            if new_index >= new_children.len() {
                break;
            }
            let (slot, next_old) = if fibers[old].index > new_index {
                (None, Some(old))
            } else {
                (Some(old), fibers[old].sibling)
            };
            let new_fiber =
                Self::update_slot(fibers, return_fiber, slot, &new_children[new_index])?;
            let Some(new_fiber) = new_fiber else {
                old_fiber = slot.or(next_old);
                break;
            };
            if let Some(slot) = slot {
                if fibers[new_fiber].alternate.is_none() {
                    self.delete_child(fibers, return_fiber, slot);
                }
            }
            last_placed_index = self.place_child(fibers, new_fiber, last_placed_index, new_index);
            link(fibers, new_fiber);
            old_fiber = next_old;
            new_index += 1;
        }

        if new_index == new_children.len() {
            self.delete_remaining_children(fibers, return_fiber, old_fiber);
            return Ok(first);
        }

        if old_fiber.is_none() {
            for (index, child) in new_children.iter().enumerate().skip(new_index) {
                if let Some(new_fiber) = Self::create_child(fibers, return_fiber, child)? {
                    last_placed_index = self.place_child(fibers, new_fiber, last_placed_index, index);
                    link(fibers, new_fiber);
                }
            }
            return Ok(first);
        }

        let remaining = new_children.len() - new_index;
        let mut existing = Self::map_remaining_children(fibers, old_fiber, remaining);
        for (index, child) in new_children.iter().enumerate().skip(new_index) {
            let Some(new_fiber) =
                Self::update_from_map(fibers, &existing, return_fiber, index, child)?
            else {
                continue;
            };
            if self.track_side_effects && fibers[new_fiber].alternate.is_some() {
                existing.remove(&ChildKey::of(fibers[new_fiber].key.as_ref(), index));
            }
            last_placed_index = self.place_child(fibers, new_fiber, last_placed_index, index);
            link(fibers, new_fiber);
        }

        if self.track_side_effects {
            // Delete leftovers in their old order so host removals are stable.
            let mut child = old_fiber;
            while let Some(id) = child {
                let fiber = &fibers[id];
                child = fiber.sibling;
                let key = ChildKey::of(fiber.key.as_ref(), fiber.index);
                if existing.get(&key) == Some(&id) {
                    self.delete_child(fibers, return_fiber, id);
                }
            }
        }
        Ok(first)
    }

    fn reconcile_single_element(
        self,
        fibers: &mut FiberArena,
        return_fiber: FiberId,
        current_first: Option<FiberId>,
        element: &Element,
    ) -> Result<FiberId, ReconcileError> {
        let key = element.key_ref();
        let mut child = current_first;
        while let Some(id) = child {
            if fibers[id].key.as_ref() == key {
                if fibers[id].kind.matches_element(element.ty()) {
                    let sibling = fibers[id].sibling;
                    self.delete_remaining_children(fibers, return_fiber, sibling);
                    let props = match element.ty() {
                        ElementType::Fragment => FiberProps::Fragment(element.props().children()?),
                        _ => FiberProps::Element(element.props().clone()),
                    };
                    let existing = Self::use_fiber(fibers, id, props);
                    fibers[existing].parent = Some(return_fiber);
                    return Ok(existing);
                }
                self.delete_remaining_children(fibers, return_fiber, Some(id));
                break;
            }
            self.delete_child(fibers, return_fiber, id);
            child = fibers[id].sibling;
        }

        let created = fiber_from_element(fibers, element)?;
        fibers[created].parent = Some(return_fiber);
        Ok(created)
    }

    fn reconcile_single_text_node(
        self,
        fibers: &mut FiberArena,
        return_fiber: FiberId,
        current_first: Option<FiberId>,
        text: &Rc<str>,
    ) -> FiberId {
        if let Some(current) = current_first {
            if fibers[current].kind == FiberKind::HostText {
                let sibling = fibers[current].sibling;
                self.delete_remaining_children(fibers, return_fiber, sibling);
                let existing = Self::use_fiber(fibers, current, FiberProps::Text(text.clone()));
                fibers[existing].parent = Some(return_fiber);
                return existing;
            }
        }
        self.delete_remaining_children(fibers, return_fiber, current_first);
        let created = fiber_from_text(fibers, text.clone());
        fibers[created].parent = Some(return_fiber);
        created
    }

    /// Reconciles `new_child` against the committed children starting at
    /// `current_first` and returns the first work-in-progress child.
    pub(crate) fn reconcile_child_fibers(
        self,
        fibers: &mut FiberArena,
        return_fiber: FiberId,
        current_first: Option<FiberId>,
        new_child: &Markup,
    ) -> Result<Option<FiberId>, ReconcileError> {
        let unwrapped;
        let mut new_child = new_child;
        if let Markup::Element(element) = new_child {
            if element.is_unkeyed_fragment() {
                unwrapped = element.props().children()?;
                new_child = &unwrapped;
            }
        }

        match new_child {
            Markup::Element(element) => {
                let fiber =
                    self.reconcile_single_element(fibers, return_fiber, current_first, element)?;
                Ok(Some(self.place_single_child(fibers, fiber)))
            }
            Markup::List(items) => {
                self.reconcile_children_array(fibers, return_fiber, current_first, items)
            }
            other => match text_child(other) {
                Some(text) => {
                    let fiber =
                        self.reconcile_single_text_node(fibers, return_fiber, current_first, text);
                    Ok(Some(self.place_single_child(fibers, fiber)))
                }
                None => {
                    self.delete_remaining_children(fibers, return_fiber, current_first);
                    Ok(None)
                }
            },
        }
    }
}

#[cfg(test)]
#[path = "tests/child_fiber_tests.rs"]
mod tests;
