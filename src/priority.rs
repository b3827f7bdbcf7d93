//! Height-indexed priority list for the top-down phase.
//!
//! Buckets nodes of one tree by height so the matcher can walk both trees
//! from the tallest subtrees downward. Bucket `i` holds the nodes of height
//! `max_height - i`; nodes below `min_height` are never admitted.

use indextree::NodeId;

use crate::tree::Tree;

pub(crate) struct PriorityTreeList<'a> {
    tree: &'a Tree,
    buckets: Vec<Vec<NodeId>>,
    max_height: usize,
    current: Option<usize>,
    min_height: usize,
}

impl<'a> PriorityTreeList<'a> {
    pub(crate) fn new(tree: &'a Tree, min_height: usize) -> Self {
        let max_height = tree.height(tree.root());
        let len = (max_height + 1).saturating_sub(min_height);
        let mut list = PriorityTreeList {
            tree,
            buckets: vec![Vec::new(); len],
            max_height,
            current: if len == 0 { None } else { Some(0) },
            min_height,
        };
        list.add_node(tree.root());
        list
    }

    /// Greatest height currently present, or `None` if the list is empty.
    pub(crate) fn peek_height(&self) -> Option<usize> {
        self.current.map(|idx| self.max_height - idx)
    }

    /// Remove and return all nodes in the top bucket.
    pub(crate) fn pop(&mut self) -> Vec<NodeId> {
        match self.current {
            Some(idx) => core::mem::take(&mut self.buckets[idx]),
            None => Vec::new(),
        }
    }

    /// Pop the top bucket, admit the popped nodes' children, and re-seek the
    /// top index.
    pub(crate) fn open(&mut self) {
        for node in self.pop() {
            self.add_children(node);
        }
        self.update_height();
    }

    /// Admit the children of `node` that meet the height floor.
    pub(crate) fn add_children(&mut self, node: NodeId) {
        let children: Vec<NodeId> = self.tree.children(node).collect();
        for child in children {
            self.add_node(child);
        }
    }

    /// Re-seek the index of the first non-empty bucket.
    pub(crate) fn update_height(&mut self) {
        self.current = self.buckets.iter().position(|b| !b.is_empty());
    }

    fn add_node(&mut self, node: NodeId) {
        let height = self.tree.height(node);
        if height < self.min_height {
            return;
        }
        self.buckets[self.max_height - height].push(node);
    }
}
