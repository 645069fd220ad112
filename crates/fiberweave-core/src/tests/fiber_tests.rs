use super::*;

fn host(fibers: &mut FiberArena, tag: &str) -> FiberId {
    fibers.insert(Fiber::new(
        FiberKind::HostComponent(tag.into()),
        FiberProps::Element(Props::new()),
        None,
    ))
}

fn link_children(fibers: &mut FiberArena, parent: FiberId, children: &[FiberId]) {
    fibers[parent].child = children.first().copied();
    for (index, pair) in children.windows(2).enumerate() {
        fibers[pair[0]].sibling = Some(pair[1]);
        fibers[pair[0]].index = index;
    }
    for child in children {
        fibers[*child].parent = Some(parent);
    }
}

#[test]
fn clone_for_work_creates_then_reuses_the_twin() {
    let mut fibers = FiberArena::with_key();
    let current = host(&mut fibers, "div");
    fibers[current].state_node = Some(7);

    let wip = clone_for_work(&mut fibers, current, FiberProps::None);
    assert_ne!(wip, current);
    assert_eq!(fibers[wip].alternate, Some(current));
    assert_eq!(fibers[current].alternate, Some(wip));
    assert_eq!(fibers[wip].state_node, Some(7));

    fibers[wip].flags |= Flags::PLACEMENT;
    fibers[wip].deletions.push(current);
    let again = clone_for_work(&mut fibers, current, FiberProps::Text("x".into()));
    assert_eq!(again, wip);
    assert!(fibers[again].flags.is_empty());
    assert!(fibers[again].deletions.is_empty());
    assert_eq!(fibers[again].pending_props, FiberProps::Text("x".into()));
    assert_eq!(fibers.len(), 2);
}

#[test]
fn clone_for_work_aliases_current_children() {
    let mut fibers = FiberArena::with_key();
    let parent = host(&mut fibers, "ul");
    let a = host(&mut fibers, "li");
    let b = host(&mut fibers, "li");
    link_children(&mut fibers, parent, &[a, b]);

    let wip = clone_for_work(&mut fibers, parent, FiberProps::None);
    assert_eq!(fibers[wip].child, Some(a));
}

#[test]
fn preorder_stays_inside_the_subtree() {
    let mut fibers = FiberArena::with_key();
    let root = host(&mut fibers, "div");
    let left = host(&mut fibers, "p");
    let right = host(&mut fibers, "p");
    let leaf = host(&mut fibers, "span");
    link_children(&mut fibers, root, &[left, right]);
    link_children(&mut fibers, left, &[leaf]);

    assert_eq!(subtree_preorder(&fibers, root), vec![root, left, leaf, right]);
    // `left` has a sibling, but the walk must not leave its subtree.
    assert_eq!(subtree_preorder(&fibers, left), vec![left, leaf]);
}

#[test]
fn detach_subtree_drops_both_buffers() {
    let mut fibers = FiberArena::with_key();
    let root = host(&mut fibers, "div");
    let child = host(&mut fibers, "span");
    link_children(&mut fibers, root, &[child]);
    fibers[root].state_node = Some(1);
    fibers[child].state_node = Some(2);
    let twin = clone_for_work(&mut fibers, child, FiberProps::None);

    let released = detach_subtree(&mut fibers, root);
    assert_eq!(released, vec![1, 2]);
    assert!(fibers.is_empty());
    assert!(!fibers.contains_key(twin));
}

#[test]
fn rejects_malformed_host_tags() {
    let mut fibers = FiberArena::with_key();
    for tag in ["", "1div", "my tag"] {
        let err = fiber_from_element(&mut fibers, &Element::host(tag)).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidElementType { .. }), "{tag}");
    }
    assert!(fiber_from_element(&mut fibers, &Element::host("my-widget")).is_ok());
}

#[test]
fn element_kinds_map_to_fiber_kinds() {
    let mut fibers = FiberArena::with_key();
    let component = Component::new("App", |_, _| Ok(Markup::Empty));
    let id = fiber_from_element(&mut fibers, &component.element().key("k")).unwrap();
    assert_eq!(fibers[id].kind, FiberKind::FunctionComponent(component));
    assert_eq!(fibers[id].key.as_deref(), Some("k"));

    let id = fiber_from_element(&mut fibers, &Element::fragment("hi")).unwrap();
    assert_eq!(fibers[id].kind, FiberKind::Fragment);
    assert_eq!(fibers[id].pending_props, FiberProps::Fragment(Markup::from("hi")));
}
