use super::*;
use crate::element::{Component, Element, Markup, Props};
use crate::hooks::cleanup;
use crate::memory_host::{HostOp, MemoryHost};
use crate::platform::TestScheduler;
use crate::root::{create_container, test_root, FiberRoot, RootOptions};
use std::cell::RefCell;

type Log = Rc<RefCell<Vec<String>>>;

fn take(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.borrow_mut())
}

/// Memory host that also writes attached-tree removals into a shared log,
/// so they can be ordered against effect callbacks.
struct TracingHost {
    inner: MemoryHost,
    log: Log,
}

impl HostConfig for TracingHost {
    fn create_instance(&mut self, tag: &str, props: &Props) -> Result<NodeId, HostError> {
        self.inner.create_instance(tag, props)
    }

    fn create_text_instance(&mut self, text: &str) -> Result<NodeId, HostError> {
        self.inner.create_text_instance(text)
    }

    fn append_initial_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        self.inner.append_initial_child(parent, child)
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        self.inner.append_child(parent, child)
    }

    fn append_child_to_container(
        &mut self,
        container: NodeId,
        child: NodeId,
    ) -> Result<(), HostError> {
        self.log.borrow_mut().push(format!("append {child}"));
        self.inner.append_child_to_container(container, child)
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: NodeId,
    ) -> Result<(), HostError> {
        self.inner.insert_before(parent, child, before)
    }

    fn insert_in_container_before(
        &mut self,
        container: NodeId,
        child: NodeId,
        before: NodeId,
    ) -> Result<(), HostError> {
        self.log.borrow_mut().push(format!("insert {child}"));
        self.inner.insert_in_container_before(container, child, before)
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        self.inner.remove_child(parent, child)
    }

    fn remove_child_from_container(
        &mut self,
        container: NodeId,
        child: NodeId,
    ) -> Result<(), HostError> {
        self.log.borrow_mut().push(format!("remove {child}"));
        self.inner.remove_child_from_container(container, child)
    }

    fn finalize_initial_children(
        &mut self,
        instance: NodeId,
        tag: &str,
        props: &Props,
    ) -> Result<bool, HostError> {
        self.inner.finalize_initial_children(instance, tag, props)
    }

    fn commit_update(
        &mut self,
        instance: NodeId,
        tag: &str,
        old: &Props,
        new: &Props,
    ) -> Result<(), HostError> {
        self.inner.commit_update(instance, tag, old, new)
    }

    fn commit_text_update(&mut self, instance: NodeId, old: &str, new: &str) -> Result<(), HostError> {
        self.inner.commit_text_update(instance, old, new)
    }

    fn detach_deleted_instance(&mut self, instance: NodeId) {
        self.inner.detach_deleted_instance(instance)
    }
}

fn tracing_root(log: &Log) -> (Rc<TestScheduler>, FiberRoot<TracingHost>) {
    let scheduler = Rc::new(TestScheduler::default());
    let mut inner = MemoryHost::new();
    let container = inner.create_container();
    let host = TracingHost {
        inner,
        log: Rc::clone(log),
    };
    let root = create_container(host, container, scheduler.clone(), RootOptions::default());
    (scheduler, root)
}

/// Component that logs its effect under `name` and renders `children`.
fn logged(name: &'static str, log: &Log, children: Markup) -> Component {
    let log = Rc::clone(log);
    Component::new(name, move |hooks, _| {
        let log = Rc::clone(&log);
        hooks.use_effect(
            move || {
                log.borrow_mut().push(format!("create {name}"));
                cleanup(move || log.borrow_mut().push(format!("destroy {name}")))
            },
            (),
        )?;
        Ok(children.clone())
    })
}

fn item(key: &str) -> Element {
    Element::host("li").key(key).prop("id", key).text(key)
}

fn node(root: &FiberRoot<MemoryHost>, id: &str) -> NodeId {
    root.host()
        .find_by_attribute(root.container(), "id", id)
        .expect("node rendered")
}

#[test]
fn deletion_is_applied_before_placement() {
    let (scheduler, root) = test_root();
    let list = |keys: &[&str]| {
        Element::host("ul")
            .prop("id", "ul")
            .children(keys.iter().map(|key| item(key)))
    };
    root.render(list(&["a", "b", "c"])).unwrap();
    scheduler.run_until_idle();
    let (ul, a, b, c) = (node(&root, "ul"), node(&root, "a"), node(&root, "b"), node(&root, "c"));
    root.with_host(|host| host.take_ops());

    root.render(list(&["x", "c", "b"])).unwrap();
    scheduler.run_until_idle();
    let x = node(&root, "x");
    let mutations: Vec<HostOp> = root
        .with_host(|host| host.take_ops())
        .into_iter()
        .filter(HostOp::is_mutation)
        .collect();

    assert_eq!(
        mutations,
        vec![
            HostOp::RemoveChild { parent: ul, child: a },
            HostOp::InsertBefore { parent: ul, child: x, before: c },
            HostOp::AppendChild { parent: ul, child: b },
        ]
    );
    assert_eq!(
        root.html(),
        "<ul id=\"ul\"><li id=\"x\">x</li><li id=\"c\">c</li><li id=\"b\">b</li></ul>"
    );
}

#[test]
fn deleted_subtree_cleans_up_before_host_removal() {
    let log = Log::default();
    let (scheduler, root) = tracing_root(&log);
    let child = logged("child", &log, Element::host("span").text("leaf").into());
    let parent = logged(
        "parent",
        &log,
        Element::host("div").child(child.element()).into(),
    );
    let next = logged("next", &log, Markup::from("next"));

    root.render(parent.element()).unwrap();
    scheduler.run_until_idle();
    assert_eq!(take(&log)[1..], ["create child", "create parent"]);

    root.render(next.element()).unwrap();
    scheduler.run_until_idle();
    let events = take(&log);
    assert_eq!(events.len(), 5);
    assert_eq!(events[..2], ["destroy child", "destroy parent"]);
    assert!(events[2].starts_with("remove "));
    assert!(events[3].starts_with("append "));
    assert_eq!(events[4], "create next");
}

#[test]
fn host_failure_is_logged_and_recorded() {
    let (scheduler, root) = test_root();
    root.with_host(|host| host.fail_next("append_child_to_container"));
    root.render(Element::host("p").text("hello")).unwrap();
    scheduler.run_until_idle();

    let errors = root.take_errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        ReconcileError::Host(HostError::Rejected { op: "append_child_to_container", .. })
    ));
    assert_eq!(root.html(), "");

    // The root keeps working after a failed commit.
    root.render(Element::host("p").text("again")).unwrap();
    scheduler.run_until_idle();
    assert!(root.take_errors().is_empty());
}

#[test]
fn changed_props_and_text_commit_as_updates() {
    let (scheduler, root) = test_root();
    root.render(Element::host("div").prop("id", "box").prop("title", "a").text("one"))
        .unwrap();
    scheduler.run_until_idle();
    let div = node(&root, "box");
    let text = root.host().children(div)[0];
    root.with_host(|host| host.take_ops());

    root.render(Element::host("div").prop("id", "box").prop("title", "b").text("two"))
        .unwrap();
    scheduler.run_until_idle();
    let ops = root.with_host(|host| host.take_ops());
    assert_eq!(
        ops,
        vec![
            HostOp::CommitTextUpdate { id: text, text: "two".into() },
            HostOp::CommitUpdate { id: div },
        ]
    );
    assert_eq!(root.html(), "<div id=\"box\" title=\"b\">two</div>");
}

#[test]
fn unchanged_tree_commits_nothing() {
    let (scheduler, root) = test_root();
    let tree = || Element::host("ul").children([item("a"), item("b")]);
    root.render(tree()).unwrap();
    scheduler.run_until_idle();
    root.with_host(|host| host.take_ops());

    root.render(tree()).unwrap();
    scheduler.run_until_idle();
    assert!(root.with_host(|host| host.take_ops()).is_empty());
}

#[test]
fn autofocus_mounts_after_attach() {
    let (scheduler, root) = test_root();
    root.render(Element::host("input").prop("id", "name").prop("autoFocus", true))
        .unwrap();
    scheduler.run_until_idle();
    let input = node(&root, "name");
    assert_eq!(root.host().focused(), Some(input));
    assert!(root
        .host()
        .ops()
        .contains(&HostOp::CommitMount { id: input }));
}

#[test]
fn deleted_fibers_are_released_after_passive_flush() {
    let (scheduler, root) = test_root();
    root.render(Element::host("div").prop("id", "gone").text("bye")).unwrap();
    scheduler.run_until_idle();
    let div = node(&root, "gone");
    let text = root.host().children(div)[0];
    let mounted = root.fiber_count();

    root.render(Markup::Empty).unwrap();
    scheduler.run_microtasks();
    assert!(root.has_pending_passive_effects());
    assert!(!root.host().is_detached(div));

    scheduler.run_until_idle();
    assert!(!root.has_pending_passive_effects());
    assert!(root.host().is_detached(div));
    assert!(root.host().is_detached(text));
    assert!(root.fiber_count() < mounted);
}
