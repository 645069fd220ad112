use super::*;
use fiberweave_core::{Component, Element, Handler, HostOp, ReconcileError};

fn counter() -> Component {
    Component::new("Counter", |hooks, _| {
        let (count, set_count) = hooks.use_state(|| 0)?;
        let on_click = Handler::new(move || {
            set_count.update(|n| n + 1).ok();
        });
        Ok(Element::host("button")
            .prop("id", "inc")
            .prop("onClick", on_click)
            .child(format!("clicked {count}"))
            .into())
    })
}

fn button(rule: &FiberTestRule) -> NodeId {
    rule.root()
        .host()
        .find_by_attribute(rule.container(), "id", "inc")
        .expect("button rendered")
}

#[test]
fn set_content_settles_the_first_render() {
    let mut rule = FiberTestRule::new();
    rule.set_content(Element::host("h1").text("hello")).unwrap();
    assert_eq!(rule.html(), "<h1>hello</h1>");
    assert!(!rule.runtime().has_pending_work());
    assert!(!rule.root().has_pending_passive_effects());
}

#[test]
fn fire_invokes_handlers_and_rerenders() {
    run_test_root(|rule| {
        rule.set_content(counter().element()).unwrap();
        rule.take_ops();

        assert!(rule.fire("inc", "onClick"));
        assert!(rule.fire("inc", "onClick"));
        assert_eq!(rule.text(), "clicked 2");
        let ops = rule.take_ops();
        assert!(ops.contains(&HostOp::CommitTextUpdate {
            id: rule.root().host().children(button(rule))[0],
            text: "clicked 2".into(),
        }));
        assert!(!ops
            .iter()
            .any(|op| matches!(op, HostOp::CreateInstance { .. } | HostOp::CreateText { .. })));

        assert!(!rule.fire("missing", "onClick"));
        assert!(!rule.fire("inc", "onHover"));
    });
}

#[test]
fn act_settles_work_scheduled_inside() {
    let mut rule = FiberTestRule::new();
    rule.set_content(Element::host("p").text("a")).unwrap();
    rule.take_ops();
    rule.act(|root| root.render(Element::host("p").text("b")))
        .unwrap();
    assert_eq!(rule.html(), "<p>b</p>");
    let mutations = rule.take_mutations();
    assert_eq!(mutations.len(), 1);
    assert!(matches!(&mutations[0], HostOp::CommitTextUpdate { text, .. } if text == "b"));
}

#[test]
fn uncaught_errors_reach_the_callback() {
    let mut rule = FiberTestRule::new();
    let broken = Component::new("Broken", |_, _| {
        Err(ReconcileError::component("Broken", "boom"))
    });
    rule.set_content(broken.element()).unwrap();
    assert_eq!(
        rule.uncaught_messages(),
        vec!["Broken failed to render: boom".to_string()]
    );
    assert_eq!(rule.take_errors().len(), 1);
    assert_eq!(rule.html(), "");
}

#[test]
fn dump_tree_shows_host_nodes() {
    let mut rule = FiberTestRule::new();
    rule.set_content(Element::host("ul").child(Element::host("li").text("x")))
        .unwrap();
    let dump = rule.dump_tree();
    assert!(dump.contains("#container"));
    assert!(dump.contains("<ul>"));
    assert!(dump.contains("\"x\""));
}
