use tracing::debug;

use crate::error::ValidationError;
use crate::model::{FileNode, NodeId};

/// Where a new file or folder is being created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentSelection {
    Root,
    Node(NodeId),
}

impl ParentSelection {
    pub fn parent_id(&self) -> Option<&NodeId> {
        match self {
            ParentSelection::Root => None,
            ParentSelection::Node(id) => Some(id),
        }
    }
}

impl From<Option<NodeId>> for ParentSelection {
    fn from(id: Option<NodeId>) -> Self {
        id.map_or(ParentSelection::Root, ParentSelection::Node)
    }
}

/// Build the path for a new entry under `selected`.
///
/// A parent id that is not in `known` (stale selection) degrades to root
/// placement instead of failing. No collision check happens here.
pub fn resolve_path(selected: &ParentSelection, entry_name: &str, known: &[FileNode]) -> String {
    let ParentSelection::Node(parent_id) = selected else {
        return format!("/{entry_name}");
    };
    match known.iter().find(|node| &node.id == parent_id) {
        Some(parent) => format!("{}/{}", parent.path, entry_name),
        None => {
            debug!(%parent_id, entry_name, "Parent not in listing, placing entry at root");
            format!("/{entry_name}")
        }
    }
}

/// Trim and check a user-supplied entry name.
pub fn validate_entry_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.contains('/') || name == "." || name == ".." {
        return Err(ValidationError::InvalidName(name.to_string()));
    }
    Ok(name.to_string())
}

/// Reject paths already taken by a known node.
pub fn ensure_unique(path: &str, known: &[FileNode]) -> Result<(), ValidationError> {
    if known.iter().any(|node| node.path == path) {
        return Err(ValidationError::DuplicatePath(path.to_string()));
    }
    Ok(())
}
