//! The fiber node model.
//!
//! Fibers live in a generational arena owned by their root. A fiber and its
//! alternate form a double buffer: one is committed ("current"), the other is
//! being rebuilt ("work in progress"), and they swap roles on commit.

use crate::element::{Component, Element, ElementType, Key, Markup, Props};
use crate::flags::Flags;
use crate::hooks::{Effect, Hook};
use crate::update_queue::{Update, UpdateQueue};
use crate::{NodeId, ReconcileError};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

new_key_type! {
    pub struct FiberId;
}

pub(crate) type FiberArena = SlotMap<FiberId, Fiber>;

#[derive(Clone, Debug, PartialEq)]
pub enum FiberKind {
    HostRoot,
    FunctionComponent(Component),
    HostComponent(Rc<str>),
    HostText,
    Fragment,
}

impl FiberKind {
    pub fn is_host(&self) -> bool {
        matches!(self, FiberKind::HostComponent(_) | FiberKind::HostText)
    }

    pub fn is_host_parent(&self) -> bool {
        matches!(self, FiberKind::HostComponent(_) | FiberKind::HostRoot)
    }

    pub fn name(&self) -> &str {
        match self {
            FiberKind::HostRoot => "HostRoot",
            FiberKind::FunctionComponent(component) => component.name(),
            FiberKind::HostComponent(tag) => tag,
            FiberKind::HostText => "#text",
            FiberKind::Fragment => "Fragment",
        }
    }

    /// Whether a fiber of this kind can be reused for `ty`.
    pub(crate) fn matches_element(&self, ty: &ElementType) -> bool {
        match (self, ty) {
            (FiberKind::HostComponent(tag), ElementType::Host(other)) => tag == other,
            (FiberKind::FunctionComponent(c), ElementType::Function(other)) => c == other,
            (FiberKind::Fragment, ElementType::Fragment) => true,
            _ => false,
        }
    }
}

/// Input a fiber is rendered with.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum FiberProps {
    #[default]
    None,
    Element(Props),
    Text(Rc<str>),
    Fragment(Markup),
}

impl FiberProps {
    pub(crate) fn as_element(&self) -> Option<&Props> {
        match self {
            FiberProps::Element(props) => Some(props),
            _ => None,
        }
    }

    pub(crate) fn as_text(&self) -> Option<&Rc<str>> {
        match self {
            FiberProps::Text(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct RootMemo {
    pub(crate) element: Markup,
    /// Updates pulled from the shared queue but not yet committed.
    pub(crate) base_queue: Vec<Update<Markup>>,
}

#[derive(Clone, Default)]
pub(crate) enum MemoizedState {
    #[default]
    None,
    Root(RootMemo),
    Hooks(Vec<Hook>),
}

pub(crate) type RootQueue = Rc<RefCell<UpdateQueue<Markup>>>;

#[derive(Clone, Default)]
pub(crate) enum FiberQueue {
    #[default]
    None,
    Root(RootQueue),
    Effects(Vec<Rc<Effect>>),
}

pub struct Fiber {
    pub(crate) kind: FiberKind,
    pub(crate) key: Option<Key>,
    pub(crate) state_node: Option<NodeId>,
    pub(crate) parent: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,
    pub(crate) index: usize,
    pub(crate) pending_props: FiberProps,
    pub(crate) memoized_props: Option<FiberProps>,
    pub(crate) memoized_state: MemoizedState,
    pub(crate) update_queue: FiberQueue,
    pub(crate) alternate: Option<FiberId>,
    pub(crate) flags: Flags,
    pub(crate) subtree_flags: Flags,
    pub(crate) deletions: SmallVec<[FiberId; 2]>,
}

impl Fiber {
    pub(crate) fn new(kind: FiberKind, pending_props: FiberProps, key: Option<Key>) -> Self {
        Self {
            kind,
            key,
            state_node: None,
            parent: None,
            child: None,
            sibling: None,
            index: 0,
            pending_props,
            memoized_props: None,
            memoized_state: MemoizedState::None,
            update_queue: FiberQueue::None,
            alternate: None,
            flags: Flags::empty(),
            subtree_flags: Flags::empty(),
            deletions: SmallVec::new(),
        }
    }

    pub(crate) fn host_root(container: NodeId, queue: RootQueue) -> Self {
        let mut fiber = Self::new(FiberKind::HostRoot, FiberProps::None, None);
        fiber.state_node = Some(container);
        fiber.update_queue = FiberQueue::Root(queue);
        fiber.memoized_state = MemoizedState::Root(RootMemo::default());
        fiber
    }

    pub fn kind(&self) -> &FiberKind {
        &self.kind
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn state_node(&self) -> Option<NodeId> {
        self.state_node
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn subtree_flags(&self) -> Flags {
        self.subtree_flags
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn hooks(&self) -> &[Hook] {
        match &self.memoized_state {
            MemoizedState::Hooks(hooks) => hooks,
            _ => &[],
        }
    }

    pub(crate) fn effects(&self) -> &[Rc<Effect>] {
        match &self.update_queue {
            FiberQueue::Effects(effects) => effects,
            _ => &[],
        }
    }
}

impl fmt::Debug for Fiber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("kind", &self.kind.name())
            .field("key", &self.key)
            .field("index", &self.index)
            .field("state_node", &self.state_node)
            .field("flags", &self.flags)
            .field("subtree_flags", &self.subtree_flags)
            .finish()
    }
}

/// Prepares the work-in-progress twin of `current` for a new pass.
///
/// The alternate is reused when it exists; either way the returned fiber has
/// no flags, no deletions, and aliases `current`'s children.
pub(crate) fn clone_for_work(
    fibers: &mut FiberArena,
    current: FiberId,
    pending_props: FiberProps,
) -> FiberId {
    let source = &fibers[current];
    let reusable = source.alternate.filter(|alt| fibers.contains_key(*alt));
    let child = source.child;
    let sibling = source.sibling;
    let index = source.index;
    let memoized_props = source.memoized_props.clone();
    let memoized_state = source.memoized_state.clone();
    let update_queue = source.update_queue.clone();

    let wip = match reusable {
        Some(wip) => {
            let fiber = &mut fibers[wip];
            fiber.pending_props = pending_props;
            fiber.flags = Flags::empty();
            fiber.subtree_flags = Flags::empty();
            fiber.deletions.clear();
            wip
        }
        None => {
            let source = &fibers[current];
            let mut fiber = Fiber::new(source.kind.clone(), pending_props, source.key.clone());
            fiber.state_node = source.state_node;
            fiber.alternate = Some(current);
            let wip = fibers.insert(fiber);
            fibers[current].alternate = Some(wip);
            wip
        }
    };

    let fiber = &mut fibers[wip];
    fiber.child = child;
    fiber.sibling = sibling;
    fiber.index = index;
    fiber.memoized_props = memoized_props;
    fiber.memoized_state = memoized_state;
    fiber.update_queue = update_queue;
    wip
}

fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        }
        _ => false,
    }
}

pub(crate) fn fiber_from_element(
    fibers: &mut FiberArena,
    element: &Element,
) -> Result<FiberId, ReconcileError> {
    let key = element.key_ref().cloned();
    let fiber = match element.ty() {
        ElementType::Host(tag) => {
            if !is_valid_tag(tag) {
                return Err(ReconcileError::InvalidElementType {
                    found: format!("{tag:?}"),
                });
            }
            Fiber::new(
                FiberKind::HostComponent(tag.clone()),
                FiberProps::Element(element.props().clone()),
                key,
            )
        }
        ElementType::Function(component) => Fiber::new(
            FiberKind::FunctionComponent(component.clone()),
            FiberProps::Element(element.props().clone()),
            key,
        ),
        ElementType::Fragment => Fiber::new(
            FiberKind::Fragment,
            FiberProps::Fragment(element.props().children()?),
            key,
        ),
    };
    Ok(fibers.insert(fiber))
}

pub(crate) fn fiber_from_text(fibers: &mut FiberArena, text: Rc<str>) -> FiberId {
    fibers.insert(Fiber::new(FiberKind::HostText, FiberProps::Text(text), None))
}

pub(crate) fn fiber_from_fragment(
    fibers: &mut FiberArena,
    children: Markup,
    key: Option<Key>,
) -> FiberId {
    fibers.insert(Fiber::new(
        FiberKind::Fragment,
        FiberProps::Fragment(children),
        key,
    ))
}

/// Pre-order walk of the subtree rooted at `root`, following child and
/// sibling links but never leaving the subtree.
pub(crate) fn subtree_preorder(fibers: &FiberArena, root: FiberId) -> Vec<FiberId> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let Some(fiber) = fibers.get(id) else {
            continue;
        };
        out.push(id);
        let mut children = Vec::new();
        let mut child = fiber.child;
        while let Some(c) = child {
            children.push(c);
            child = fibers.get(c).and_then(|f| f.sibling);
        }
        stack.extend(children.into_iter().rev());
    }
    out
}

/// Removes every fiber of a deleted subtree together with their alternates.
/// Returns the host handles that were released.
pub(crate) fn detach_subtree(fibers: &mut FiberArena, root: FiberId) -> Vec<NodeId> {
    let mut released = Vec::new();
    for id in subtree_preorder(fibers, root) {
        let Some(fiber) = fibers.remove(id) else {
            continue;
        };
        if fiber.kind.is_host() {
            released.extend(fiber.state_node);
        }
        if let Some(alternate) = fiber.alternate {
            fibers.remove(alternate);
        }
    }
    released
}

#[cfg(test)]
#[path = "tests/fiber_tests.rs"]
mod tests;
