use super::*;
use crate::element::Props;
use crate::fiber::Fiber;

fn item(key: &str) -> Markup {
    Element::host("li").key(key).text(key).into()
}

fn list(keys: &[&str]) -> Markup {
    Markup::list(keys.iter().map(|key| item(key)))
}

struct Parent {
    fibers: FiberArena,
    current: FiberId,
}

impl Parent {
    fn mount(children: &Markup) -> Self {
        let mut fibers = FiberArena::with_key();
        let current = fibers.insert(Fiber::new(
            FiberKind::HostComponent("ul".into()),
            FiberProps::Element(Props::new()),
            None,
        ));
        let child = MOUNT_CHILD_FIBERS
            .reconcile_child_fibers(&mut fibers, current, None, children)
            .unwrap();
        fibers[current].child = child;
        Self { fibers, current }
    }

    /// Reconciles `next` against the committed children and returns the
    /// work-in-progress parent.
    fn reconcile(&mut self, next: &Markup) -> Result<FiberId, ReconcileError> {
        let wip = clone_for_work(
            &mut self.fibers,
            self.current,
            FiberProps::Element(Props::new()),
        );
        let current_first = self.fibers[self.current].child;
        let first =
            RECONCILE_CHILD_FIBERS.reconcile_child_fibers(&mut self.fibers, wip, current_first, next)?;
        self.fibers[wip].child = first;
        Ok(wip)
    }

    fn children(&self, parent: FiberId) -> Vec<FiberId> {
        let mut out = Vec::new();
        let mut child = self.fibers[parent].child;
        while let Some(id) = child {
            out.push(id);
            child = self.fibers[id].sibling;
        }
        out
    }

    fn keys(&self, ids: &[FiberId]) -> Vec<String> {
        ids.iter()
            .map(|id| self.fibers[*id].key.as_deref().unwrap_or("-").to_string())
            .collect()
    }

    fn placed(&self, ids: &[FiberId]) -> Vec<String> {
        let placed: Vec<FiberId> = ids
            .iter()
            .copied()
            .filter(|id| self.fibers[*id].flags.contains(Flags::PLACEMENT))
            .collect();
        self.keys(&placed)
    }

    fn deleted(&self, parent: FiberId) -> Vec<String> {
        self.keys(&self.fibers[parent].deletions)
    }
}

#[test]
fn mount_creates_children_without_flags() {
    let parent = Parent::mount(&list(&["a", "b"]));
    let children = parent.children(parent.current);
    assert_eq!(parent.keys(&children), vec!["a", "b"]);
    assert!(children.iter().all(|id| parent.fibers[*id].flags.is_empty()));
    assert_eq!(parent.fibers[children[1]].index, 1);
}

#[test]
fn unchanged_list_produces_no_flags() {
    let mut parent = Parent::mount(&list(&["a", "b", "c"]));
    let before = parent.children(parent.current);
    let wip = parent.reconcile(&list(&["a", "b", "c"])).unwrap();
    let after = parent.children(wip);

    assert_eq!(parent.keys(&after), vec!["a", "b", "c"]);
    for (old, new) in before.iter().zip(&after) {
        assert_eq!(parent.fibers[*new].alternate, Some(*old));
        assert!(parent.fibers[*new].flags.is_empty());
    }
    assert!(parent.fibers[wip].deletions.is_empty());
    assert!(!parent.fibers[wip].flags.contains(Flags::CHILD_DELETION));
}

#[test]
fn rotate_left_moves_one_child() {
    let mut parent = Parent::mount(&list(&["a", "b", "c"]));
    let wip = parent.reconcile(&list(&["b", "c", "a"])).unwrap();
    let after = parent.children(wip);

    assert_eq!(parent.keys(&after), vec!["b", "c", "a"]);
    assert_eq!(parent.placed(&after), vec!["a"]);
    assert!(after.iter().all(|id| parent.fibers[*id].alternate.is_some()));
    assert!(parent.deleted(wip).is_empty());
}

#[test]
fn moving_last_to_front_moves_the_others() {
    // Only forward moves are cheap: pulling `c` to the front keeps `c`
    // stable and re-inserts everything behind it.
    let mut parent = Parent::mount(&list(&["a", "b", "c"]));
    let wip = parent.reconcile(&list(&["c", "a", "b"])).unwrap();
    let after = parent.children(wip);

    assert_eq!(parent.keys(&after), vec!["c", "a", "b"]);
    assert_eq!(parent.placed(&after), vec!["a", "b"]);
}

#[test]
fn type_change_at_same_key_remounts() {
    let mut parent = Parent::mount(&Markup::list([Element::host("div").key("x").text("hi")]));
    let old = parent.children(parent.current)[0];
    let wip = parent
        .reconcile(&Markup::list([Element::host("span").key("x").text("hi")]))
        .unwrap();
    let after = parent.children(wip);

    assert_eq!(after.len(), 1);
    let new = after[0];
    assert_ne!(new, old);
    assert_eq!(parent.fibers[new].alternate, None);
    assert_eq!(parent.fibers[new].kind, FiberKind::HostComponent("span".into()));
    assert!(parent.fibers[new].flags.contains(Flags::PLACEMENT));
    assert_eq!(parent.fibers[wip].deletions.as_slice(), &[old]);
    assert!(parent.fibers[wip].flags.contains(Flags::CHILD_DELETION));
}

#[test]
fn shrinking_list_deletes_the_tail() {
    let mut parent = Parent::mount(&list(&["a", "b", "c"]));
    let wip = parent.reconcile(&list(&["a"])).unwrap();
    let after = parent.children(wip);

    assert_eq!(parent.keys(&after), vec!["a"]);
    assert!(parent.placed(&after).is_empty());
    assert_eq!(parent.deleted(wip), vec!["b", "c"]);
}

#[test]
fn growing_list_places_only_new_children() {
    let mut parent = Parent::mount(&list(&["a"]));
    let wip = parent.reconcile(&list(&["a", "b"])).unwrap();
    let after = parent.children(wip);

    assert_eq!(parent.keys(&after), vec!["a", "b"]);
    assert_eq!(parent.placed(&after), vec!["b"]);
    assert!(parent.fibers[after[0]].alternate.is_some());
    assert!(parent.fibers[after[1]].alternate.is_none());
}

#[test]
fn removed_key_in_the_middle_is_deleted() {
    let mut parent = Parent::mount(&list(&["a", "b", "c"]));
    let wip = parent.reconcile(&list(&["a", "c"])).unwrap();
    let after = parent.children(wip);

    assert_eq!(parent.keys(&after), vec!["a", "c"]);
    assert!(parent.placed(&after).is_empty());
    assert_eq!(parent.deleted(wip), vec!["b"]);
}

#[test]
fn single_text_child_reuses_text_fiber() {
    let mut parent = Parent::mount(&Markup::from("0"));
    let old = parent.children(parent.current)[0];
    let wip = parent.reconcile(&Markup::from("1")).unwrap();
    let after = parent.children(wip);

    assert_eq!(after.len(), 1);
    assert_eq!(parent.fibers[after[0]].alternate, Some(old));
    assert_eq!(
        parent.fibers[after[0]].pending_props,
        FiberProps::Text("1".into())
    );
}

#[test]
fn empty_markup_deletes_every_child() {
    let mut parent = Parent::mount(&list(&["a", "b"]));
    let wip = parent.reconcile(&Markup::Empty).unwrap();
    assert!(parent.children(wip).is_empty());
    assert_eq!(parent.deleted(wip), vec!["a", "b"]);
}

#[test]
fn unkeyed_top_level_fragment_is_unwrapped() {
    let mut parent = Parent::mount(&list(&["a", "b"]));
    let wip = parent
        .reconcile(&Element::fragment(list(&["a", "b"])).into())
        .unwrap();
    let after = parent.children(wip);
    assert_eq!(parent.keys(&after), vec!["a", "b"]);
    assert!(parent.placed(&after).is_empty());
}

#[test]
fn nested_list_becomes_fragment() {
    let parent = Parent::mount(&Markup::list([item("a"), list(&["b", "c"])]));
    let children = parent.children(parent.current);
    assert_eq!(children.len(), 2);
    assert_eq!(parent.fibers[children[1]].kind, FiberKind::Fragment);
    assert_eq!(
        parent.fibers[children[1]].pending_props,
        FiberProps::Fragment(list(&["b", "c"]))
    );
}

#[test]
fn invalid_host_tag_is_rejected() {
    let mut parent = Parent::mount(&Markup::Empty);
    let err = parent.reconcile(&Element::host("").into()).unwrap_err();
    assert!(matches!(err, ReconcileError::InvalidElementType { .. }));
}

fn keyed_fragment(key: &str) -> Markup {
    Element::fragment(Element::host("i").text(key)).key(key).into()
}

#[test]
fn keyed_fragments_are_reused_across_a_reorder() {
    let mut parent = Parent::mount(&Markup::list(["a", "b", "c"].map(keyed_fragment)));
    let before = parent.children(parent.current);
    let wip = parent
        .reconcile(&Markup::list(["c", "a", "b"].map(keyed_fragment)))
        .unwrap();
    let after = parent.children(wip);

    assert_eq!(parent.keys(&after), vec!["c", "a", "b"]);
    assert!(after
        .iter()
        .all(|id| parent.fibers[*id].kind == FiberKind::Fragment));
    assert_eq!(parent.fibers[after[0]].alternate, Some(before[2]));
    assert_eq!(parent.fibers[after[1]].alternate, Some(before[0]));
    assert_eq!(parent.fibers[after[2]].alternate, Some(before[1]));
    assert_eq!(parent.placed(&after), vec!["a", "b"]);
    assert!(parent.deleted(wip).is_empty());
    assert_eq!(
        parent.fibers[after[0]].pending_props,
        FiberProps::Fragment(Element::host("i").text("c").into())
    );
}

#[test]
fn keyed_fragment_replaced_by_element_at_same_key_remounts() {
    let mut parent = Parent::mount(&Markup::list([keyed_fragment("x")]));
    let old = parent.children(parent.current)[0];
    let wip = parent
        .reconcile(&Markup::list([Element::host("i").key("x").text("x")]))
        .unwrap();
    let after = parent.children(wip);

    assert_eq!(after.len(), 1);
    assert_eq!(parent.fibers[after[0]].kind, FiberKind::HostComponent("i".into()));
    assert_eq!(parent.fibers[after[0]].alternate, None);
    assert!(parent.fibers[after[0]].flags.contains(Flags::PLACEMENT));
    assert_eq!(parent.fibers[wip].deletions.as_slice(), &[old]);
    assert!(parent.fibers[wip].flags.contains(Flags::CHILD_DELETION));
}

#[test]
fn top_level_keyed_fragment_is_kept_as_a_fiber() {
    let fragment = |key: &str| -> Markup { Element::fragment(list(&["a", "b"])).key(key).into() };
    let mut parent = Parent::mount(&fragment("f"));
    let old = parent.children(parent.current);
    assert_eq!(old.len(), 1);
    assert_eq!(parent.fibers[old[0]].kind, FiberKind::Fragment);
    assert_eq!(parent.keys(&old), vec!["f"]);

    let wip = parent.reconcile(&fragment("f")).unwrap();
    let after = parent.children(wip);
    assert_eq!(parent.fibers[after[0]].alternate, Some(old[0]));
    assert!(parent.placed(&after).is_empty());
    assert!(parent.deleted(wip).is_empty());

    let wip = parent.reconcile(&fragment("g")).unwrap();
    let after = parent.children(wip);
    assert_eq!(parent.keys(&after), vec!["g"]);
    assert_eq!(parent.placed(&after), vec!["g"]);
    assert_eq!(parent.deleted(wip), vec!["f"]);
}
