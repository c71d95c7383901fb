use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a file or folder, assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Project metadata. Owned by the backend; the client keeps a cached copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
}

/// A file or folder in a project tree.
///
/// `path` is derived from the parent chain: `parent_path + "/" + name`, with
/// root-level entries starting with a single `/`. Folders never carry content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub id: NodeId,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl FileNode {
    pub fn file(id: &str, name: &str, path: &str, content: &str) -> Self {
        Self {
            id: NodeId::new(id),
            name: name.to_string(),
            path: path.to_string(),
            is_folder: false,
            parent_id: None,
            content: Some(content.to_string()),
        }
    }

    pub fn folder(id: &str, name: &str, path: &str) -> Self {
        Self {
            id: NodeId::new(id),
            name: name.to_string(),
            path: path.to_string(),
            is_folder: true,
            parent_id: None,
            content: None,
        }
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent_id = Some(NodeId::new(parent));
        self
    }
}

/// Body of `POST /projects/{projectId}/files`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntryRequest {
    pub name: String,
    pub is_folder: bool,
    pub parent_id: Option<NodeId>,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One file of a `POST /projects/{projectId}/upload` batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadEntry {
    pub name: String,
    pub content: String,
    pub path: String,
}

/// Response of an upload: created nodes plus any files the backend refused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    #[serde(default)]
    pub created: Vec<FileNode>,
    #[serde(default)]
    pub failed: Vec<UploadFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFailure {
    pub name: String,
    #[serde(default)]
    pub error: String,
}
