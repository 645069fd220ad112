#![doc = r"Fiber reconciler: turns element trees into minimal host mutations."]

pub extern crate self as fiberweave_core;

mod begin_work;
mod child_fiber;
pub mod collections;
mod commit_work;
mod complete_work;
pub mod element;
pub mod fiber;
pub mod flags;
pub mod hooks;
pub mod host_config;
pub mod lane;
pub mod memory_host;
pub mod platform;
mod root;
mod sync_queue;
pub mod update_queue;
mod work_loop;

pub use element::{
    Component, Element, ElementType, Handler, Key, Markup, PropValue, Props, CHILDREN_PROP,
};
pub use fiber::{FiberId, FiberKind};
pub use flags::{Flags, HookFlags};
pub use hooks::{cleanup, Cleanup, Dispatch, Hooks};
pub use host_config::{HostConfig, HostError};
pub use lane::{Lane, Lanes, NO_LANE, NO_LANES, SYNC_LANE};
pub use memory_host::{HostOp, MemoryHost};
pub use platform::{RuntimeScheduler, TaskPriority};
pub use root::{create_container, update_container, FiberRoot, RootOptions};
pub use update_queue::Action;

/// Opaque handle to a node owned by the host.
pub type NodeId = usize;

/// Errors raised while rendering or committing a fiber tree.
#[derive(Clone, Debug, PartialEq)]
pub enum ReconcileError {
    InvalidElementType {
        found: String,
    },
    InvalidChild {
        found: String,
    },
    SkippedUpdateLane {
        update: Lanes,
        render: Lanes,
    },
    HookKindMismatch {
        component: String,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
    RenderedMoreHooks {
        component: String,
        expected: usize,
    },
    RenderedFewerHooks {
        component: String,
        expected: usize,
        rendered: usize,
    },
    InvalidFiberState {
        fiber: String,
        reason: &'static str,
    },
    MissingHostParent,
    RenderPhaseUpdate,
    /// The root is rendering or committing and cannot be re-entered.
    RootBusy,
    /// Raised by a component's render function.
    Component {
        component: String,
        message: String,
    },
    Host(HostError),
}

impl ReconcileError {
    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        ReconcileError::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::InvalidElementType { found } => write!(
                f,
                "element type is invalid: expected a host tag or a function component but got: {found}"
            ),
            ReconcileError::InvalidChild { found } => {
                write!(f, "objects are not valid as a child (found: {found})")
            }
            ReconcileError::SkippedUpdateLane { update, render } => write!(
                f,
                "update in lane {:#b} skipped while rendering lanes {:#b}",
                update.bits(),
                render.bits()
            ),
            ReconcileError::HookKindMismatch {
                component,
                index,
                expected,
                found,
            } => write!(
                f,
                "hook {index} of {component} changed kind between renders: expected {expected}, found {found}"
            ),
            ReconcileError::RenderedMoreHooks {
                component,
                expected,
            } => write!(
                f,
                "{component} rendered more hooks than during the previous render ({expected})"
            ),
            ReconcileError::RenderedFewerHooks {
                component,
                expected,
                rendered,
            } => write!(
                f,
                "{component} rendered fewer hooks than expected: {rendered} of {expected}"
            ),
            ReconcileError::InvalidFiberState { fiber, reason } => {
                write!(f, "invalid state on fiber {fiber}: {reason}")
            }
            ReconcileError::MissingHostParent => {
                write!(f, "expected to find a host parent for a placed fiber")
            }
            ReconcileError::RenderPhaseUpdate => {
                write!(f, "cannot update state while a component is rendering")
            }
            ReconcileError::RootBusy => write!(f, "root is already rendering or committing"),
            ReconcileError::Component { component, message } => {
                write!(f, "{component} failed to render: {message}")
            }
            ReconcileError::Host(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::Host(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HostError> for ReconcileError {
    fn from(err: HostError) -> Self {
        ReconcileError::Host(err)
    }
}

#[cfg(test)]
#[path = "tests/root_tests.rs"]
mod tests;
