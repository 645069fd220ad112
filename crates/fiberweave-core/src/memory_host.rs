use crate::element::{Handler, PropValue, Props};
use crate::host_config::{HostConfig, HostError};
use crate::NodeId;
use std::fmt::Write as _;
use std::rc::Rc;

/// Host mutation recorded by [`MemoryHost`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostOp {
    CreateInstance { id: NodeId, tag: Rc<str> },
    CreateText { id: NodeId, text: String },
    AppendInitialChild { parent: NodeId, child: NodeId },
    AppendChild { parent: NodeId, child: NodeId },
    AppendToContainer { container: NodeId, child: NodeId },
    InsertBefore { parent: NodeId, child: NodeId, before: NodeId },
    InsertInContainerBefore { container: NodeId, child: NodeId, before: NodeId },
    RemoveChild { parent: NodeId, child: NodeId },
    RemoveFromContainer { container: NodeId, child: NodeId },
    CommitMount { id: NodeId },
    CommitUpdate { id: NodeId },
    CommitTextUpdate { id: NodeId, text: String },
    Detach { id: NodeId },
}

impl HostOp {
    /// Whether the op changed the attached tree (as opposed to creating or
    /// assembling detached nodes).
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            HostOp::CreateInstance { .. }
                | HostOp::CreateText { .. }
                | HostOp::AppendInitialChild { .. }
                | HostOp::Detach { .. }
        )
    }
}

enum NodeKind {
    Container,
    Element {
        tag: Rc<str>,
        attributes: Vec<(Rc<str>, String)>,
        listeners: Vec<(Rc<str>, Handler)>,
    },
    Text(String),
}

struct MemoryNode {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    detached: bool,
}

/// DOM-like host that keeps its tree in memory and logs every operation.
///
/// Node ids index straight into `nodes` and are never reused: detached nodes
/// stay in place, flagged, so tests can still inspect them. Storage grows with
/// every node ever created.
#[derive(Default)]
pub struct MemoryHost {
    nodes: Vec<MemoryNode>,
    ops: Vec<HostOp>,
    failures: Vec<&'static str>,
    focused: Option<NodeId>,
}

const AUTO_FOCUS_TAGS: [&str; 4] = ["button", "input", "select", "textarea"];

fn attribute_name(prop: &str) -> &str {
    match prop {
        "className" => "class",
        "htmlFor" => "for",
        other => other,
    }
}

fn style_string(style: &Props) -> String {
    let mut out = String::new();
    for (name, value) in style.iter() {
        let value = match value {
            PropValue::Str(s) => s.to_string(),
            PropValue::Int(n) => format!("{n}px"),
            PropValue::Float(n) => format!("{n}px"),
            _ => continue,
        };
        if !out.is_empty() {
            out.push(' ');
        }
        let _ = write!(out, "{name}: {value};");
    }
    out
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached container node that roots can render into.
    pub fn create_container(&mut self) -> NodeId {
        self.push(NodeKind::Container)
    }

    /// Makes the next call of the named host operation fail.
    pub fn fail_next(&mut self, op: &'static str) {
        self.failures.push(op);
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map_or(&[], |node| &node.children)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|node| node.parent)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.nodes.get(id).map(|node| &node.kind) {
            Some(NodeKind::Element { tag, .. }) => Some(tag),
            _ => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.nodes.get(id).map(|node| &node.kind) {
            Some(NodeKind::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.nodes.get(id).map(|node| &node.kind) {
            Some(NodeKind::Element { attributes, .. }) => attributes
                .iter()
                .find(|(attr, _)| &**attr == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn handler(&self, id: NodeId, event: &str) -> Option<Handler> {
        match self.nodes.get(id).map(|node| &node.kind) {
            Some(NodeKind::Element { listeners, .. }) => listeners
                .iter()
                .find(|(name, _)| &**name == event)
                .map(|(_, handler)| handler.clone()),
            _ => None,
        }
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn is_detached(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|node| node.detached)
    }

    /// Concatenated text of every text node below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.nodes.get(id).map(|node| &node.kind) {
            Some(NodeKind::Text(text)) => out.push_str(text),
            Some(_) => {
                for child in self.children(id) {
                    self.collect_text(*child, out);
                }
            }
            None => {}
        }
    }

    /// First element below `id` (depth first, `id` included) carrying the
    /// attribute `name` with `value`.
    pub fn find_by_attribute(&self, id: NodeId, name: &str, value: &str) -> Option<NodeId> {
        if self.attribute(id, name) == Some(value) {
            return Some(id);
        }
        self.children(id)
            .iter()
            .find_map(|child| self.find_by_attribute(*child, name, value))
    }

    /// Serializes the children of `id` as markup.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_html(*child, &mut out);
        }
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => out.push_str(&escape(text)),
            NodeKind::Container => {
                for child in &node.children {
                    self.write_html(*child, out);
                }
            }
            NodeKind::Element {
                tag, attributes, ..
            } => {
                let _ = write!(out, "<{tag}");
                for (name, value) in attributes {
                    let _ = write!(out, " {name}=\"{}\"", escape(value));
                }
                out.push('>');
                for child in &node.children {
                    self.write_html(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    pub fn dump_tree(&self, root: Option<NodeId>) -> String {
        let mut output = String::new();
        match root {
            Some(root) => self.dump_node(&mut output, root, 0),
            None => output.push_str("(no root)\n"),
        }
        output
    }

    fn dump_node(&self, output: &mut String, id: NodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        let Some(node) = self.nodes.get(id) else {
            let _ = writeln!(output, "{indent}[{id}] (missing)");
            return;
        };
        let label = match &node.kind {
            NodeKind::Container => "#container".to_string(),
            NodeKind::Element { tag, .. } => format!("<{tag}>"),
            NodeKind::Text(text) => format!("{text:?}"),
        };
        let _ = writeln!(output, "{indent}[{id}] {label}");
        for child in &node.children {
            self.dump_node(output, *child, depth + 1);
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(MemoryNode {
            kind,
            parent: None,
            children: Vec::new(),
            detached: false,
        });
        id
    }

    fn check_failure(&mut self, op: &'static str) -> Result<(), HostError> {
        match self.failures.iter().position(|failing| *failing == op) {
            Some(index) => {
                self.failures.remove(index);
                Err(HostError::Rejected {
                    op,
                    reason: "injected failure".into(),
                })
            }
            None => Ok(()),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut MemoryNode, HostError> {
        self.nodes.get_mut(id).ok_or(HostError::Missing { id })
    }

    fn check_parent(&self, id: NodeId) -> Result<(), HostError> {
        match self.nodes.get(id).map(|node| &node.kind) {
            None => Err(HostError::Missing { id }),
            Some(NodeKind::Text(_)) => Err(HostError::NotAContainer { id }),
            Some(_) => Ok(()),
        }
    }

    fn unlink(&mut self, child: NodeId) -> Result<(), HostError> {
        if let Some(old_parent) = self.node_mut(child)?.parent.take() {
            self.node_mut(old_parent)?.children.retain(|c| *c != child);
        }
        Ok(())
    }

    fn insert(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
    ) -> Result<(), HostError> {
        self.check_parent(parent)?;
        self.node_mut(child)?;
        if let Some(before) = before {
            if !self.children(parent).contains(&before) {
                return Err(HostError::NotAChild {
                    parent,
                    child: before,
                });
            }
        }
        self.unlink(child)?;
        let node = self.node_mut(parent)?;
        let position = before
            .and_then(|before| node.children.iter().position(|c| *c == before))
            .unwrap_or(node.children.len());
        node.children.insert(position, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn remove(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        if !self.children(parent).contains(&child) {
            return Err(HostError::NotAChild { parent, child });
        }
        self.unlink(child)
    }

    fn set_prop(&mut self, id: NodeId, name: &str, value: Option<&PropValue>) -> Result<(), HostError> {
        let NodeKind::Element {
            attributes,
            listeners,
            ..
        } = &mut self.node_mut(id)?.kind
        else {
            return Err(HostError::Rejected {
                op: "set_prop",
                reason: format!("node {id} is not an element"),
            });
        };
        if name == crate::element::CHILDREN_PROP {
            return Ok(());
        }
        if let Some(PropValue::Handler(handler)) = value {
            listeners.retain(|(event, _)| &**event != name);
            listeners.push((name.into(), handler.clone()));
            return Ok(());
        }
        if name.starts_with("on") {
            listeners.retain(|(event, _)| &**event != name);
        }
        let attr = attribute_name(name);
        let rendered = match value {
            None | Some(PropValue::Null) | Some(PropValue::Bool(false)) => None,
            Some(PropValue::Bool(true)) => Some(String::new()),
            Some(PropValue::Int(n)) => Some(n.to_string()),
            Some(PropValue::Float(n)) => Some(n.to_string()),
            Some(PropValue::Str(s)) => Some(s.to_string()),
            Some(PropValue::Object(style)) if name == "style" => Some(style_string(style)),
            Some(PropValue::Object(_)) | Some(PropValue::Node(_)) | Some(PropValue::Handler(_)) => {
                None
            }
        };
        attributes.retain(|(existing, _)| &**existing != attr);
        if let Some(rendered) = rendered {
            attributes.push((attr.into(), rendered));
        }
        Ok(())
    }
}

impl HostConfig for MemoryHost {
    fn create_instance(&mut self, tag: &str, _props: &Props) -> Result<NodeId, HostError> {
        self.check_failure("create_instance")?;
        let tag: Rc<str> = tag.into();
        let id = self.push(NodeKind::Element {
            tag: tag.clone(),
            attributes: Vec::new(),
            listeners: Vec::new(),
        });
        self.ops.push(HostOp::CreateInstance { id, tag });
        Ok(id)
    }

    fn create_text_instance(&mut self, text: &str) -> Result<NodeId, HostError> {
        self.check_failure("create_text_instance")?;
        let id = self.push(NodeKind::Text(text.to_string()));
        self.ops.push(HostOp::CreateText {
            id,
            text: text.to_string(),
        });
        Ok(id)
    }

    fn append_initial_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        self.check_failure("append_initial_child")?;
        self.insert(parent, child, None)?;
        self.ops.push(HostOp::AppendInitialChild { parent, child });
        Ok(())
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        self.check_failure("append_child")?;
        self.insert(parent, child, None)?;
        self.ops.push(HostOp::AppendChild { parent, child });
        Ok(())
    }

    fn append_child_to_container(
        &mut self,
        container: NodeId,
        child: NodeId,
    ) -> Result<(), HostError> {
        self.check_failure("append_child_to_container")?;
        self.insert(container, child, None)?;
        self.ops.push(HostOp::AppendToContainer { container, child });
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: NodeId,
    ) -> Result<(), HostError> {
        self.check_failure("insert_before")?;
        self.insert(parent, child, Some(before))?;
        self.ops.push(HostOp::InsertBefore {
            parent,
            child,
            before,
        });
        Ok(())
    }

    fn insert_in_container_before(
        &mut self,
        container: NodeId,
        child: NodeId,
        before: NodeId,
    ) -> Result<(), HostError> {
        self.check_failure("insert_in_container_before")?;
        self.insert(container, child, Some(before))?;
        self.ops.push(HostOp::InsertInContainerBefore {
            container,
            child,
            before,
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError> {
        self.check_failure("remove_child")?;
        self.remove(parent, child)?;
        self.ops.push(HostOp::RemoveChild { parent, child });
        Ok(())
    }

    fn remove_child_from_container(
        &mut self,
        container: NodeId,
        child: NodeId,
    ) -> Result<(), HostError> {
        self.check_failure("remove_child_from_container")?;
        self.remove(container, child)?;
        self.ops.push(HostOp::RemoveFromContainer { container, child });
        Ok(())
    }

    fn finalize_initial_children(
        &mut self,
        instance: NodeId,
        tag: &str,
        props: &Props,
    ) -> Result<bool, HostError> {
        self.check_failure("finalize_initial_children")?;
        for (name, value) in props.attributes() {
            self.set_prop(instance, name, Some(value))?;
        }
        if AUTO_FOCUS_TAGS.contains(&tag) {
            return Ok(props.get("autoFocus").and_then(PropValue::as_bool) == Some(true));
        }
        Ok(tag == "img")
    }

    fn commit_mount(&mut self, instance: NodeId, tag: &str, props: &Props) -> Result<(), HostError> {
        self.check_failure("commit_mount")?;
        if AUTO_FOCUS_TAGS.contains(&tag)
            && props.get("autoFocus").and_then(PropValue::as_bool) == Some(true)
        {
            self.focused = Some(instance);
        }
        self.ops.push(HostOp::CommitMount { id: instance });
        Ok(())
    }

    fn commit_update(
        &mut self,
        instance: NodeId,
        _tag: &str,
        old: &Props,
        new: &Props,
    ) -> Result<(), HostError> {
        self.check_failure("commit_update")?;
        for (name, _) in old.attributes() {
            if new.get(name).is_none() {
                self.set_prop(instance, name, None)?;
            }
        }
        for (name, value) in new.attributes() {
            if old.get(name) != Some(value) {
                self.set_prop(instance, name, Some(value))?;
            }
        }
        self.ops.push(HostOp::CommitUpdate { id: instance });
        Ok(())
    }

    fn commit_text_update(
        &mut self,
        instance: NodeId,
        _old: &str,
        new: &str,
    ) -> Result<(), HostError> {
        self.check_failure("commit_text_update")?;
        match &mut self.node_mut(instance)?.kind {
            NodeKind::Text(text) => {
                *text = new.to_string();
            }
            _ => {
                return Err(HostError::Rejected {
                    op: "commit_text_update",
                    reason: format!("node {instance} is not a text node"),
                })
            }
        }
        self.ops.push(HostOp::CommitTextUpdate {
            id: instance,
            text: new.to_string(),
        });
        Ok(())
    }

    fn detach_deleted_instance(&mut self, instance: NodeId) {
        if let Some(node) = self.nodes.get_mut(instance) {
            node.detached = true;
            if let NodeKind::Element { listeners, .. } = &mut node.kind {
                listeners.clear();
            }
            if self.focused == Some(instance) {
                self.focused = None;
            }
            self.ops.push(HostOp::Detach { id: instance });
        }
    }
}

#[cfg(test)]
#[path = "tests/memory_host_tests.rs"]
mod tests;
