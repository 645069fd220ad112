use super::*;
use crate::platform::TestScheduler;
use crate::root::test_root;
use std::cell::RefCell;
use std::rc::Rc;

type Slot<T> = Rc<RefCell<Option<Dispatch<T>>>>;

fn dispatcher<T>(slot: &Slot<T>) -> Dispatch<T> {
    slot.borrow().clone().expect("component rendered")
}

#[test]
fn renders_are_coalesced_into_one_microtask() {
    let (scheduler, root) = test_root();
    assert_eq!(root.render(Element::host("p").text("one")), Ok(SYNC_LANE));
    root.render(Element::host("p").text("two")).unwrap();
    root.render(Element::host("p").text("three")).unwrap();

    assert_eq!(scheduler.microtasks_scheduled(), 1);
    assert_eq!(root.pending_lanes(), SYNC_LANE);
    assert_eq!(root.html(), "");

    scheduler.run_microtasks();
    assert_eq!(root.html(), "<p>three</p>");
    assert_eq!(root.pending_lanes(), NO_LANES);
}

#[test]
fn flush_sync_work_renders_without_the_scheduler() {
    let (scheduler, root) = test_root();
    root.render(Element::host("p").text("now")).unwrap();
    root.flush_sync_work().unwrap();
    assert_eq!(root.html(), "<p>now</p>");

    // The queued microtask finds nothing left to do.
    scheduler.run_until_idle();
    assert_eq!(root.html(), "<p>now</p>");
    assert!(root.take_errors().is_empty());
}

#[test]
fn passive_effects_wait_for_a_task() {
    let (scheduler, root) = test_root();
    let fired = Rc::new(RefCell::new(0));
    let app = {
        let fired = Rc::clone(&fired);
        Component::new("App", move |hooks, _| {
            let fired = Rc::clone(&fired);
            hooks.use_effect(
                move || {
                    *fired.borrow_mut() += 1;
                    None
                },
                (),
            )?;
            Ok(Markup::from("app"))
        })
    };
    root.render(app.element()).unwrap();
    scheduler.run_microtasks();
    assert_eq!(root.html(), "app");
    assert_eq!(*fired.borrow(), 0);
    assert!(root.has_pending_passive_effects());
    assert_eq!(scheduler.pending_tasks(), 1);
    assert_eq!(scheduler.tasks_scheduled(), 1);

    scheduler.run_until_idle();
    assert_eq!(*fired.borrow(), 1);
    assert!(!root.has_pending_passive_effects());
}

#[test]
fn render_error_is_reported_and_discarded() {
    let scheduler = Rc::new(TestScheduler::default());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let root = {
        let seen = Rc::clone(&seen);
        let mut host = MemoryHost::new();
        let container = host.create_container();
        let options = RootOptions::default()
            .on_uncaught_error(move |err| seen.borrow_mut().push(err.to_string()));
        create_container(host, container, scheduler.clone(), options)
    };
    root.render(Element::host("div").text("ok")).unwrap();
    scheduler.run_until_idle();
    let committed = root.fiber_count();

    let broken = Component::new("Broken", |_, _| {
        Err(ReconcileError::component("Broken", "no data"))
    });
    root.render(
        Element::host("div").children([
            Markup::from(Element::host("b").text("new")),
            broken.element().into(),
        ]),
    )
    .unwrap();
    scheduler.run_until_idle();

    assert_eq!(*seen.borrow(), vec!["Broken failed to render: no data"]);
    assert_eq!(
        root.take_errors(),
        vec![ReconcileError::component("Broken", "no data")]
    );
    assert_eq!(root.host().inner_html(root.container()), "<div>ok</div>");
    assert_eq!(root.fiber_count(), committed + 1);
    assert_eq!(root.pending_lanes(), NO_LANES);

    // A later update replays the queue and renders normally.
    root.render(Element::host("div").text("fixed")).unwrap();
    scheduler.run_until_idle();
    assert_eq!(root.host().inner_html(root.container()), "<div>fixed</div>");
}

#[test]
fn object_children_are_rejected() {
    let (scheduler, root) = test_root();
    root.render(Element::host("div").prop(CHILDREN_PROP, Props::new().with("a", 1)))
        .unwrap();
    scheduler.run_until_idle();
    let errors = root.take_errors();
    assert_eq!(
        errors,
        vec![ReconcileError::InvalidChild {
            found: "object with keys {a}".into()
        }]
    );
    assert_eq!(
        errors[0].to_string(),
        "objects are not valid as a child (found: object with keys {a})"
    );
}

#[test]
fn cleanup_during_commit_schedules_a_follow_up_render() {
    let (scheduler, root) = test_root();
    let toggle: Slot<bool> = Slot::default();
    let child = Component::new("Child", |hooks, props| {
        let Some(on_close) = props.get("onClose").and_then(PropValue::as_handler).cloned() else {
            return Ok(Markup::Empty);
        };
        hooks.use_effect(move || cleanup(move || on_close.call()), ())?;
        Ok(Markup::from("child"))
    });
    let app = {
        let toggle = Rc::clone(&toggle);
        Component::new("App", move |hooks, _| {
            let (open, set_open) = hooks.use_state(|| true)?;
            let (closed, set_closed) = hooks.use_state(|| 0)?;
            *toggle.borrow_mut() = Some(set_open);
            let on_close = Handler::new(move || {
                set_closed.update(|n| n + 1).ok();
            });
            let body: Markup = if open {
                child.element().prop("onClose", on_close).into()
            } else {
                Markup::from(format!("closed {closed}"))
            };
            Ok(body)
        })
    };
    root.render(app.element()).unwrap();
    scheduler.run_until_idle();
    assert_eq!(root.html(), "child");

    dispatcher(&toggle).set(false).unwrap();
    scheduler.run_until_idle();
    assert_eq!(root.html(), "closed 1");
    assert!(root.take_errors().is_empty());
}

#[test]
fn dropped_root_ignores_late_dispatches() {
    let (scheduler, root) = test_root();
    let slot: Slot<i32> = Slot::default();
    let app = {
        let slot = Rc::clone(&slot);
        Component::new("App", move |hooks, _| {
            let (value, set_value) = hooks.use_state(|| 0)?;
            *slot.borrow_mut() = Some(set_value);
            Ok(Markup::from(value))
        })
    };
    root.render(app.element()).unwrap();
    scheduler.run_until_idle();
    drop(root);

    assert_eq!(dispatcher(&slot).set(1), Ok(()));
    assert_eq!(scheduler.pending_microtasks(), 0);
}

#[test]
fn dump_lists_committed_fibers() {
    let (scheduler, root) = test_root();
    root.render(Element::host("ul").children([Element::host("li").key("a").text("a")]))
        .unwrap();
    scheduler.run_until_idle();
    let dump = root.dump_fibers();
    let lines: Vec<&str> = dump.lines().map(str::trim_end).collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("HostRoot"));
    assert!(lines[1].starts_with("  ul"));
    assert!(lines[2].starts_with("    li key=a"));
    assert!(lines[3].starts_with("      #text"));
}

#[test]
fn error_messages_name_the_problem() {
    let err = ReconcileError::RenderedFewerHooks {
        component: "App".into(),
        expected: 3,
        rendered: 2,
    };
    assert_eq!(
        err.to_string(),
        "App rendered fewer hooks than expected: 2 of 3"
    );
    let err = ReconcileError::from(HostError::Missing { id: 4 });
    assert_eq!(err.to_string(), "host node 4 missing");
    assert!(std::error::Error::source(&err).is_some());
}
