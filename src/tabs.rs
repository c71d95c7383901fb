use tracing::debug;

use crate::model::{FileNode, NodeId};

/// An open file: the node snapshot taken at open time plus its edit buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub node: FileNode,
    buffer: String,
    persisted: String,
}

impl Tab {
    fn new(node: FileNode) -> Self {
        let content = node.content.clone().unwrap_or_default();
        Self {
            node,
            buffer: content.clone(),
            persisted: content,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.node.id
    }

    pub fn content(&self) -> &str {
        &self.buffer
    }

    /// Unsaved edits exist.
    pub fn is_dirty(&self) -> bool {
        self.buffer != self.persisted
    }

    pub(crate) fn set_buffer(&mut self, content: String) {
        self.buffer = content;
    }

    pub(crate) fn mark_persisted(&mut self, content: String) {
        self.persisted = content;
    }
}

/// Ordered set of open files and the current one.
///
/// Invariants after every operation: no duplicate ids, and the current id is
/// `None` or refers to an open tab.
#[derive(Debug, Default)]
pub struct TabManager {
    tabs: Vec<Tab>,
    current: Option<NodeId>,
}

impl TabManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `file` unless already open, then make it current.
    ///
    /// Reopening an open file keeps its existing buffer.
    pub fn open(&mut self, file: FileNode) {
        let id = file.id.clone();
        if !self.contains(&id) {
            debug!(file_id = %id, path = %file.path, "Opening tab");
            self.tabs.push(Tab::new(file));
        }
        self.current = Some(id);
    }

    /// Remove the tab. If it was current, the tab now last in the sequence
    /// becomes current (most recently appended, not most recently viewed).
    pub fn close(&mut self, id: &NodeId) -> Option<Tab> {
        let pos = self.tabs.iter().position(|t| t.id() == id)?;
        let removed = self.tabs.remove(pos);
        if self.current.as_ref() == Some(id) {
            self.current = self.tabs.last().map(|t| t.id().clone());
            debug!(file_id = %id, next = ?self.current, "Closed current tab");
        }
        Some(removed)
    }

    /// Make an already open tab current. No-op for files that are not open.
    pub fn switch_to(&mut self, id: &NodeId) -> bool {
        if !self.contains(id) {
            debug!(file_id = %id, "Ignoring switch to a tab that is not open");
            return false;
        }
        self.current = Some(id.clone());
        true
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.tabs.iter().any(|t| t.id() == id)
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn get(&self, id: &NodeId) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id() == id)
    }

    pub(crate) fn get_mut(&mut self, id: &NodeId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.id() == id)
    }

    pub fn current_id(&self) -> Option<&NodeId> {
        self.current.as_ref()
    }

    pub fn current(&self) -> Option<&Tab> {
        self.current.as_ref().and_then(|id| self.get(id))
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> FileNode {
        FileNode::file(id, &format!("{id}.ts"), &format!("/{id}.ts"), id)
    }

    fn ids(tabs: &TabManager) -> Vec<&str> {
        tabs.tabs().iter().map(|t| t.id().as_str()).collect()
    }

    fn assert_invariants(tabs: &TabManager) {
        let mut seen = ids(tabs);
        let n = seen.len();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), n, "duplicate tab ids");
        if let Some(cur) = tabs.current_id() {
            assert!(tabs.contains(cur), "current tab not open");
        }
    }

    #[test]
    fn open_is_idempotent_on_id() {
        let mut tabs = TabManager::new();
        tabs.open(node("a"));
        tabs.open(node("b"));
        tabs.open(node("a"));
        assert_eq!(ids(&tabs), ["a", "b"]);
        assert_eq!(tabs.current_id(), Some(&NodeId::new("a")));
        assert_invariants(&tabs);
    }

    #[test]
    fn closing_current_selects_last_remaining() {
        let mut tabs = TabManager::new();
        for id in ["a", "b", "c"] {
            tabs.open(node(id));
        }
        // View order differs from append order.
        tabs.switch_to(&NodeId::new("a"));
        tabs.switch_to(&NodeId::new("b"));
        tabs.close(&NodeId::new("b"));
        assert_eq!(tabs.current_id(), Some(&NodeId::new("c")));

        tabs.close(&NodeId::new("c"));
        assert_eq!(tabs.current_id(), Some(&NodeId::new("a")));

        tabs.close(&NodeId::new("a"));
        assert!(tabs.current().is_none());
        assert!(tabs.is_empty());
    }

    #[test]
    fn closing_other_tab_keeps_current() {
        let mut tabs = TabManager::new();
        tabs.open(node("a"));
        tabs.open(node("b"));
        assert!(tabs.close(&NodeId::new("a")).is_some());
        assert_eq!(tabs.current_id(), Some(&NodeId::new("b")));
        assert!(tabs.close(&NodeId::new("zzz")).is_none());
    }

    #[test]
    fn switch_to_unknown_is_noop() {
        let mut tabs = TabManager::new();
        tabs.open(node("a"));
        assert!(!tabs.switch_to(&NodeId::new("x")));
        assert_eq!(tabs.current_id(), Some(&NodeId::new("a")));
    }

    #[test]
    fn invariants_hold_over_mixed_sequences() {
        let mut tabs = TabManager::new();
        let script = [
            ("open", "a"),
            ("open", "b"),
            ("close", "a"),
            ("open", "c"),
            ("open", "b"),
            ("close", "b"),
            ("close", "b"),
            ("open", "a"),
            ("close", "c"),
            ("close", "a"),
            ("open", "d"),
        ];
        for (op, id) in script {
            match op {
                "open" => tabs.open(node(id)),
                _ => {
                    tabs.close(&NodeId::new(id));
                }
            }
            assert_invariants(&tabs);
        }
        assert_eq!(ids(&tabs), ["d"]);
    }

    #[test]
    fn reopen_keeps_unsaved_buffer() {
        let mut tabs = TabManager::new();
        tabs.open(node("a"));
        tabs.get_mut(&NodeId::new("a")).unwrap().set_buffer("edited".into());
        tabs.open(node("a"));
        let tab = tabs.current().unwrap();
        assert_eq!(tab.content(), "edited");
        assert!(tab.is_dirty());
    }
}
