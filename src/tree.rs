// promptmap/src/tree.rs
//! Aggregation tree node.
//!
//! Children live in a hash map (arrival order is irrelevant); every read
//! goes through `sorted_children`, which materializes a by-name view.
//! Lines keep arrival order.
//!
//! Locks are per node and held only for a lookup/insert or a push.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

/// One member line attached to a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub sort_key: Option<String>,
}

#[derive(Debug)]
pub struct TreeNode {
    name: String,
    children: RwLock<HashMap<String, Arc<TreeNode>>>,
    lines: Mutex<Vec<Line>>,
}

impl TreeNode {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: RwLock::new(HashMap::new()),
            lines: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert-if-absent. Callers racing on the same name all get the one node
    /// that made it into the map.
    pub(crate) fn child_or_insert(&self, name: &str) -> Arc<TreeNode> {
        // fast path: already there
        {
            let children = self.children.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(child) = children.get(name) {
                return Arc::clone(child);
            }
        }
        let mut children = self.children.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            children
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(TreeNode::new(name))),
        )
    }

    pub(crate) fn push_line(&self, line: Line) {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).push(line);
    }

    pub fn child(&self, name: &str) -> Option<Arc<TreeNode>> {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Children ordered by name (byte order), whatever order they arrived in.
    pub fn sorted_children(&self) -> Vec<Arc<TreeNode>> {
        let mut out: Vec<Arc<TreeNode>> = self
            .children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn child_count(&self) -> usize {
        self.children.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Snapshot of lines in arrival order.
    pub fn lines(&self) -> Vec<Line> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn line_texts(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|l| l.text.clone())
            .collect()
    }

    /// Walk existing children only; `None` if any segment is missing.
    pub fn find<S: AsRef<str>>(self: &Arc<Self>, segments: &[S]) -> Option<Arc<TreeNode>> {
        let mut cur = Arc::clone(self);
        for seg in segments {
            cur = cur.child(seg.as_ref())?;
        }
        Some(cur)
    }

    pub fn is_empty(&self) -> bool {
        self.child_count() == 0 && self.lines.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_come_back_sorted() {
        let root = TreeNode::new("");
        for name in ["Zeta", "alpha", "Beta", "A.B"] {
            root.child_or_insert(name);
        }
        let names: Vec<String> = root.sorted_children().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["A.B", "Beta", "Zeta", "alpha"]);
    }

    #[test]
    fn same_name_returns_same_node() {
        let root = TreeNode::new("root");
        let a = root.child_or_insert("X");
        let b = root.child_or_insert("X");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(root.child_count(), 1);
    }

    #[test]
    fn lines_keep_arrival_order() {
        let n = TreeNode::new("T");
        for t in ["b", "a", "c"] {
            n.push_line(Line { text: t.into(), sort_key: None });
        }
        assert_eq!(n.line_texts(), vec!["b", "a", "c"]);
    }

    #[test]
    fn find_walks_existing_nodes_only() {
        let root = Arc::new(TreeNode::new(""));
        root.child_or_insert("P").child_or_insert("NS");
        assert!(root.find(&["P", "NS"]).is_some());
        assert!(root.find(&["P", "missing"]).is_none());
        assert_eq!(root.child_count(), 1);
    }
}
