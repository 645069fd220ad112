//! Hook state machine for function components.
//!
//! A [`Hooks`] value is the render session of one function component: it
//! owns the hook cursor, decides between the mount and update paths once per
//! render, and writes the rebuilt hook list back onto the work-in-progress
//! fiber when the component returns.

use crate::element::{Component, Markup, Props};
use crate::fiber::{FiberArena, FiberId, FiberQueue, MemoizedState};
use crate::flags::{Flags, HookFlags};
use crate::lane::{request_update_lane, Lanes};
use crate::update_queue::{
    create_update, create_update_queue, enqueue_update, process_update_queue, Action, Update,
    UpdateQueue,
};
use crate::work_loop::ScheduleUpdate;
use crate::ReconcileError;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Cleanup returned by an effect; runs before the effect fires again and
/// when the component unmounts.
pub type Cleanup = Box<dyn FnOnce()>;

pub(crate) type EffectCreate = Box<dyn FnOnce() -> Option<Cleanup>>;

/// Wraps a closure as an effect cleanup.
pub fn cleanup(f: impl FnOnce() + 'static) -> Option<Cleanup> {
    Some(Box::new(f))
}

/// Dependency snapshot compared between renders.
pub(crate) trait DepList {
    fn same_as(&self, other: &dyn DepList) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<D: PartialEq + 'static> DepList for D {
    fn same_as(&self, other: &dyn DepList) -> bool {
        other
            .as_any()
            .downcast_ref::<D>()
            .is_some_and(|other| other == self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Survives across renders so a re-fired effect can still reach the
/// cleanup of its previous firing.
#[derive(Default)]
pub(crate) struct EffectInstance {
    destroy: RefCell<Option<Cleanup>>,
}

impl EffectInstance {
    pub(crate) fn take_destroy(&self) -> Option<Cleanup> {
        self.destroy.borrow_mut().take()
    }

    pub(crate) fn set_destroy(&self, destroy: Option<Cleanup>) {
        *self.destroy.borrow_mut() = destroy;
    }
}

pub(crate) struct Effect {
    pub(crate) tag: HookFlags,
    create: RefCell<Option<EffectCreate>>,
    pub(crate) inst: Rc<EffectInstance>,
    deps: Option<Rc<dyn DepList>>,
}

impl Effect {
    pub(crate) fn needs_fire(&self) -> bool {
        self.tag.contains(HookFlags::HAS_EFFECT | HookFlags::PASSIVE)
    }

    pub(crate) fn take_create(&self) -> Option<EffectCreate> {
        self.create.borrow_mut().take()
    }
}

/// Handle returned by [`Hooks::use_state`] for scheduling state changes.
pub struct Dispatch<T> {
    fiber: FiberId,
    queue: Rc<RefCell<UpdateQueue<T>>>,
    root: Weak<dyn ScheduleUpdate>,
}

impl<T> Clone for Dispatch<T> {
    fn clone(&self) -> Self {
        Self {
            fiber: self.fiber,
            queue: Rc::clone(&self.queue),
            root: self.root.clone(),
        }
    }
}

impl<T> fmt::Debug for Dispatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("fiber", &self.fiber)
            .finish()
    }
}

impl<T: 'static> Dispatch<T> {
    /// Enqueues `action` and schedules the owning root.
    pub fn dispatch(&self, action: Action<T>) -> Result<(), ReconcileError> {
        let Some(root) = self.root.upgrade() else {
            log::warn!("state update dropped: the root of fiber {:?} is gone", self.fiber);
            return Ok(());
        };
        root.check_update_allowed()?;
        let lane = request_update_lane();
        enqueue_update(&mut self.queue.borrow_mut(), create_update(action, lane));
        root.schedule_update_on_fiber(self.fiber, lane)
    }

    pub fn set(&self, value: T) -> Result<(), ReconcileError> {
        self.dispatch(Action::Value(value))
    }

    pub fn update(&self, f: impl Fn(&T) -> T + 'static) -> Result<(), ReconcileError> {
        self.dispatch(Action::updater(f))
    }
}

struct StateHook<T> {
    memoized_state: T,
    base_state: T,
    base_queue: Vec<Update<T>>,
    queue: Rc<RefCell<UpdateQueue<T>>>,
    dispatch: Dispatch<T>,
}

impl<T: Clone> Clone for StateHook<T> {
    fn clone(&self) -> Self {
        Self {
            memoized_state: self.memoized_state.clone(),
            base_state: self.base_state.clone(),
            base_queue: self.base_queue.clone(),
            queue: Rc::clone(&self.queue),
            dispatch: self.dispatch.clone(),
        }
    }
}

pub(crate) trait StateSlot {
    fn clone_slot(&self) -> Box<dyn StateSlot>;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn state_type(&self) -> &'static str;
}

impl<T: Clone + 'static> StateSlot for StateHook<T> {
    fn clone_slot(&self) -> Box<dyn StateSlot> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn state_type(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// One entry of a fiber's ordered hook list.
pub(crate) enum Hook {
    State(Box<dyn StateSlot>),
    Effect(Rc<Effect>),
}

impl Hook {
    fn describe(&self) -> &'static str {
        match self {
            Hook::State(slot) => slot.state_type(),
            Hook::Effect(_) => "effect",
        }
    }
}

impl Clone for Hook {
    fn clone(&self) -> Self {
        match self {
            Hook::State(slot) => Hook::State(slot.clone_slot()),
            Hook::Effect(effect) => Hook::Effect(Rc::clone(effect)),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dispatcher {
    Mount,
    Update,
}

/// Hook entry points available while a function component renders.
pub struct Hooks<'a> {
    fibers: &'a mut FiberArena,
    root: &'a Weak<dyn ScheduleUpdate>,
    fiber: FiberId,
    current: Option<FiberId>,
    dispatcher: Dispatcher,
    component: Rc<str>,
    render_lanes: Lanes,
    cursor: usize,
    work_in_progress_hooks: Vec<Hook>,
    effects: Vec<Rc<Effect>>,
    flags: Flags,
}

impl<'a> Hooks<'a> {
    fn new(
        fibers: &'a mut FiberArena,
        root: &'a Weak<dyn ScheduleUpdate>,
        current: Option<FiberId>,
        fiber: FiberId,
        component: Rc<str>,
        render_lanes: Lanes,
    ) -> Self {
        let dispatcher = match current {
            Some(_) => Dispatcher::Update,
            None => Dispatcher::Mount,
        };
        Self {
            fibers,
            root,
            fiber,
            current,
            dispatcher,
            component,
            render_lanes,
            cursor: 0,
            work_in_progress_hooks: Vec::new(),
            effects: Vec::new(),
            flags: Flags::empty(),
        }
    }

    pub fn component_name(&self) -> &str {
        &self.component
    }

    /// Local state. `init` only runs on the first render of this fiber.
    pub fn use_state<T: Clone + 'static>(
        &mut self,
        init: impl FnOnce() -> T,
    ) -> Result<(T, Dispatch<T>), ReconcileError> {
        match self.dispatcher {
            Dispatcher::Mount => Ok(self.mount_state(init)),
            Dispatcher::Update => self.update_state(),
        }
    }

    /// Passive effect that re-fires whenever `deps` differs from the value
    /// passed on the previous render.
    pub fn use_effect<D: PartialEq + 'static>(
        &mut self,
        create: impl FnOnce() -> Option<Cleanup> + 'static,
        deps: D,
    ) -> Result<(), ReconcileError> {
        self.effect_hook(Box::new(create), Some(Rc::new(deps)))
    }

    /// Passive effect without a dependency list; fires after every commit.
    pub fn use_effect_every_render(
        &mut self,
        create: impl FnOnce() -> Option<Cleanup> + 'static,
    ) -> Result<(), ReconcileError> {
        self.effect_hook(Box::new(create), None)
    }

    fn mount_state<T: Clone + 'static>(&mut self, init: impl FnOnce() -> T) -> (T, Dispatch<T>) {
        let initial = init();
        let queue = Rc::new(RefCell::new(create_update_queue()));
        let dispatch = Dispatch {
            fiber: self.fiber,
            queue: Rc::clone(&queue),
            root: self.root.clone(),
        };
        self.cursor += 1;
        self.work_in_progress_hooks.push(Hook::State(Box::new(StateHook {
            memoized_state: initial.clone(),
            base_state: initial.clone(),
            base_queue: Vec::new(),
            queue,
            dispatch: dispatch.clone(),
        })));
        (initial, dispatch)
    }

    fn update_state<T: Clone + 'static>(&mut self) -> Result<(T, Dispatch<T>), ReconcileError> {
        let index = self.cursor;
        self.cursor += 1;
        let component = Rc::clone(&self.component);

        // Pending updates are parked on the committed hook first so that an
        // abandoned pass can replay them.
        let current = self.current_hook_mut(index)?;
        let current = downcast_state::<T>(current, &component, index)?;
        let pending = current.queue.borrow_mut().take_pending();
        current.base_queue.extend(pending);

        let mut hook = current.clone();
        let next =
            process_update_queue(hook.base_state.clone(), &hook.base_queue, self.render_lanes)?;
        hook.memoized_state = next.clone();
        hook.base_state = next.clone();
        hook.base_queue.clear();
        let dispatch = hook.dispatch.clone();
        self.work_in_progress_hooks.push(Hook::State(Box::new(hook)));
        Ok((next, dispatch))
    }

    fn effect_hook(
        &mut self,
        create: EffectCreate,
        deps: Option<Rc<dyn DepList>>,
    ) -> Result<(), ReconcileError> {
        let index = self.cursor;
        self.cursor += 1;
        let inst = match self.dispatcher {
            Dispatcher::Mount => Rc::new(EffectInstance::default()),
            Dispatcher::Update => {
                let component = Rc::clone(&self.component);
                let prev = match self.current_hook_mut(index)? {
                    Hook::Effect(effect) => Rc::clone(effect),
                    other => {
                        return Err(ReconcileError::HookKindMismatch {
                            component: component.to_string(),
                            index,
                            expected: "effect",
                            found: other.describe(),
                        })
                    }
                };
                if let (Some(next), Some(prev_deps)) = (&deps, &prev.deps) {
                    if (**next).same_as(&**prev_deps) {
                        let inst = Rc::clone(&prev.inst);
                        let effect = self.push_effect(HookFlags::PASSIVE, create, inst, deps);
                        self.work_in_progress_hooks.push(Hook::Effect(effect));
                        return Ok(());
                    }
                }
                Rc::clone(&prev.inst)
            }
        };
        self.flags |= Flags::PASSIVE;
        let tag = HookFlags::HAS_EFFECT | HookFlags::PASSIVE;
        let effect = self.push_effect(tag, create, inst, deps);
        self.work_in_progress_hooks.push(Hook::Effect(effect));
        Ok(())
    }

    fn push_effect(
        &mut self,
        tag: HookFlags,
        create: EffectCreate,
        inst: Rc<EffectInstance>,
        deps: Option<Rc<dyn DepList>>,
    ) -> Rc<Effect> {
        let effect = Rc::new(Effect {
            tag,
            create: RefCell::new(Some(create)),
            inst,
            deps,
        });
        self.effects.push(Rc::clone(&effect));
        effect
    }

    fn current_hook_mut(&mut self, index: usize) -> Result<&mut Hook, ReconcileError> {
        let expected = self.current_hook_count();
        let component = &self.component;
        let hooks = self
            .current
            .and_then(|current| self.fibers.get_mut(current))
            .and_then(|fiber| match &mut fiber.memoized_state {
                MemoizedState::Hooks(hooks) => Some(hooks),
                _ => None,
            });
        hooks
            .and_then(|hooks| hooks.get_mut(index))
            .ok_or_else(|| ReconcileError::RenderedMoreHooks {
                component: component.to_string(),
                expected,
            })
    }

    fn current_hook_count(&self) -> usize {
        self.current
            .and_then(|current| self.fibers.get(current))
            .map_or(0, |fiber| fiber.hooks().len())
    }

    fn finish(self) -> Result<(), ReconcileError> {
        if self.dispatcher == Dispatcher::Update {
            let expected = self.current_hook_count();
            if self.cursor < expected {
                return Err(ReconcileError::RenderedFewerHooks {
                    component: self.component.to_string(),
                    expected,
                    rendered: self.cursor,
                });
            }
        }
        let fiber = &mut self.fibers[self.fiber];
        fiber.memoized_state = MemoizedState::Hooks(self.work_in_progress_hooks);
        fiber.update_queue = FiberQueue::Effects(self.effects);
        fiber.flags |= self.flags;
        Ok(())
    }
}

fn downcast_state<'h, T: Clone + 'static>(
    hook: &'h mut Hook,
    component: &str,
    index: usize,
) -> Result<&'h mut StateHook<T>, ReconcileError> {
    let found = hook.describe();
    let mismatch = || ReconcileError::HookKindMismatch {
        component: component.to_string(),
        index,
        expected: std::any::type_name::<T>(),
        found,
    };
    match hook {
        Hook::State(slot) => slot
            .as_any_mut()
            .downcast_mut::<StateHook<T>>()
            .ok_or_else(mismatch),
        Hook::Effect(_) => Err(mismatch()),
    }
}

/// Runs `component` for the work-in-progress fiber `fiber` and records its
/// hooks and effects on that fiber.
pub(crate) fn render_with_hooks(
    fibers: &mut FiberArena,
    root: &Weak<dyn ScheduleUpdate>,
    current: Option<FiberId>,
    fiber: FiberId,
    component: &Component,
    props: &Props,
    render_lanes: Lanes,
) -> Result<Markup, ReconcileError> {
    let mut hooks = Hooks::new(
        fibers,
        root,
        current,
        fiber,
        component.name().into(),
        render_lanes,
    );
    let children = component.render(&mut hooks, props)?;
    hooks.finish()?;
    Ok(children)
}

#[cfg(test)]
#[path = "tests/hooks_tests.rs"]
mod tests;
