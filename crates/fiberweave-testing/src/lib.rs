//! Headless harness for exercising fiber roots in tests.

use fiberweave_core::{FiberRoot, HostOp, Markup, MemoryHost, NodeId, ReconcileError, RootOptions};
use fiberweave_runtime_std::StdRuntime;
use std::cell::RefCell;
use std::rc::Rc;

/// Owns a root over an in-memory host together with the runtime that drives
/// it, and exposes helpers for rendering and inspecting the produced tree.
pub struct FiberTestRule {
    runtime: StdRuntime,
    root: FiberRoot<MemoryHost>,
    container: NodeId,
    uncaught: Rc<RefCell<Vec<String>>>,
}

impl FiberTestRule {
    pub fn new() -> Self {
        let runtime = StdRuntime::new();
        let mut host = MemoryHost::new();
        let container = host.create_container();
        let uncaught = Rc::new(RefCell::new(Vec::new()));
        let options = {
            let uncaught = Rc::clone(&uncaught);
            RootOptions::default()
                .on_uncaught_error(move |err| uncaught.borrow_mut().push(err.to_string()))
        };
        let root = runtime.create_root(host, container, options);
        Self {
            runtime,
            root,
            container,
            uncaught,
        }
    }

    /// Render `content` and pump until nothing is left to do, passive effects
    /// included.
    pub fn set_content(&mut self, content: impl Into<Markup>) -> Result<(), ReconcileError> {
        self.root.render(content)?;
        self.pump_until_idle();
        Ok(())
    }

    /// Run scheduled microtasks and tasks until the runtime is idle.
    pub fn pump_until_idle(&mut self) {
        self.runtime.run_until_idle();
    }

    /// Run `f`, then settle all work it scheduled.
    pub fn act<R>(&mut self, f: impl FnOnce(&FiberRoot<MemoryHost>) -> R) -> R {
        let result = f(&self.root);
        self.pump_until_idle();
        result
    }

    /// Invoke the `event` handler registered on the first node whose `id`
    /// attribute equals `id`, then settle. Returns false if no such handler
    /// exists.
    pub fn fire(&mut self, id: &str, event: &str) -> bool {
        let handler = {
            let host = self.root.host();
            host.find_by_attribute(self.container, "id", id)
                .and_then(|node| host.handler(node, event))
        };
        let Some(handler) = handler else {
            return false;
        };
        handler.call();
        self.pump_until_idle();
        true
    }

    pub fn root(&self) -> &FiberRoot<MemoryHost> {
        &self.root
    }

    pub fn runtime(&self) -> &StdRuntime {
        &self.runtime
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn html(&self) -> String {
        self.root.host().inner_html(self.container)
    }

    pub fn text(&self) -> String {
        self.root.host().text_content(self.container)
    }

    /// Drain the host operations recorded since the last call.
    pub fn take_ops(&mut self) -> Vec<HostOp> {
        self.root.with_host(|host| host.take_ops())
    }

    /// Like [`FiberTestRule::take_ops`] but keeps only tree mutations.
    pub fn take_mutations(&mut self) -> Vec<HostOp> {
        self.take_ops()
            .into_iter()
            .filter(HostOp::is_mutation)
            .collect()
    }

    /// Drain errors the root reported.
    pub fn take_errors(&mut self) -> Vec<ReconcileError> {
        self.root.take_errors()
    }

    /// Messages passed to the root's uncaught-error callback, in order.
    pub fn uncaught_messages(&self) -> Vec<String> {
        self.uncaught.borrow().clone()
    }

    /// Dump the host tree as text for debugging.
    pub fn dump_tree(&self) -> String {
        self.root.host().dump_tree(Some(self.container))
    }
}

impl Default for FiberTestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `FiberTestRule`.
pub fn run_test_root<R>(f: impl FnOnce(&mut FiberTestRule) -> R) -> R {
    let mut rule = FiberTestRule::new();
    f(&mut rule)
}

#[cfg(test)]
#[path = "tests/testing_tests.rs"]
mod tests;
