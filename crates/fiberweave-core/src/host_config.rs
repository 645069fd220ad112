//! Host adapter boundary.
//!
//! The reconciler never touches a concrete UI tree. Everything it needs from
//! the host goes through [`HostConfig`], and host nodes are referred to by
//! opaque [`NodeId`] handles.

use crate::element::Props;
use crate::NodeId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostError {
    Missing { id: NodeId },
    NotAContainer { id: NodeId },
    NotAChild { parent: NodeId, child: NodeId },
    Rejected { op: &'static str, reason: String },
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostError::Missing { id } => write!(f, "host node {id} missing"),
            HostError::NotAContainer { id } => write!(f, "host node {id} cannot hold children"),
            HostError::NotAChild { parent, child } => {
                write!(f, "host node {child} is not a child of {parent}")
            }
            HostError::Rejected { op, reason } => write!(f, "host rejected {op}: {reason}"),
        }
    }
}

impl std::error::Error for HostError {}

/// Operations the reconciler performs on the host tree.
///
/// Creation happens during render (off-screen), everything that changes the
/// attached tree happens during commit.
pub trait HostConfig {
    fn create_instance(&mut self, tag: &str, props: &Props) -> Result<NodeId, HostError>;

    fn create_text_instance(&mut self, text: &str) -> Result<NodeId, HostError>;

    /// Appends while the parent is still detached.
    fn append_initial_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError>;

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError>;

    fn append_child_to_container(
        &mut self,
        container: NodeId,
        child: NodeId,
    ) -> Result<(), HostError>;

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: NodeId,
    ) -> Result<(), HostError>;

    fn insert_in_container_before(
        &mut self,
        container: NodeId,
        child: NodeId,
        before: NodeId,
    ) -> Result<(), HostError>;

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), HostError>;

    fn remove_child_from_container(
        &mut self,
        container: NodeId,
        child: NodeId,
    ) -> Result<(), HostError>;

    /// Applies initial props once all children are attached. Returning
    /// `true` requests [`HostConfig::commit_mount`] after the node is attached.
    fn finalize_initial_children(
        &mut self,
        _instance: NodeId,
        _tag: &str,
        _props: &Props,
    ) -> Result<bool, HostError> {
        Ok(false)
    }

    /// Whether moving from `old` to `new` requires [`HostConfig::commit_update`].
    /// Children are reconciled as fibers and never count as a difference.
    fn props_differ(&self, _tag: &str, old: &Props, new: &Props) -> bool {
        !old.attributes().eq(new.attributes())
    }

    fn commit_mount(&mut self, _instance: NodeId, _tag: &str, _props: &Props) -> Result<(), HostError> {
        Ok(())
    }

    fn commit_update(
        &mut self,
        instance: NodeId,
        tag: &str,
        old: &Props,
        new: &Props,
    ) -> Result<(), HostError>;

    fn commit_text_update(&mut self, instance: NodeId, old: &str, new: &str)
        -> Result<(), HostError>;

    /// Called once the fiber owning `instance` has been discarded.
    fn detach_deleted_instance(&mut self, _instance: NodeId) {}
}
