//! Labeled ordered trees with derived structural metadata.
//!
//! Trees are arena-backed: nodes are [`NodeId`] handles into an
//! [`indextree::Arena`], which keeps parent back-links without cyclic
//! ownership. After building a tree (or mutating its structure), call
//! [`Tree::refresh`] to recompute the derived fields — subtree `size`,
//! `height`, the structural `hash`, and stable breadth-first `id`s.
//!
//! Two subtrees with equal hashes are treated as isomorphic: the hash is a
//! 128-bit digest over the canonical pre-order serialization
//! `[(kind@@label child₁ child₂ …)]`, so it covers kind, label, and child
//! order recursively.

use core::hash::Hasher;
use std::collections::VecDeque;

use indextree::{Arena, NodeEdge, NodeId};
use rapidhash::{RapidHashMap, RapidHasher};

/// 128-bit structural digest of a subtree.
///
/// Equal hashes ⇒ the subtrees serialize identically (same kinds, labels,
/// and child order, recursively).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeHash(pub u128);

fn digest128(bytes: &[u8]) -> NodeHash {
    let mut lo = RapidHasher::default();
    lo.write(bytes);
    // Second pass with a domain-separation prefix for the high half.
    let mut hi = RapidHasher::default();
    hi.write(&[0x9e]);
    hi.write(bytes);
    NodeHash(((hi.finish() as u128) << 64) | lo.finish() as u128)
}

/// Payload of a tree node: its grammatical kind, its label (token text,
/// possibly empty), and the derived fields maintained by [`Tree::refresh`].
#[derive(Debug, Clone)]
pub struct NodeData {
    pub(crate) kind: String,
    pub(crate) label: String,
    pub(crate) id: usize,
    pub(crate) size: usize,
    pub(crate) height: usize,
    pub(crate) hash: NodeHash,
}

impl NodeData {
    /// Create node data with the given kind and label.
    ///
    /// The kind must be non-empty for real nodes; the derived fields start
    /// zeroed and become meaningful after [`Tree::refresh`].
    pub fn new(kind: impl Into<String>, label: impl Into<String>) -> Self {
        NodeData {
            kind: kind.into(),
            label: label.into(),
            id: 0,
            size: 0,
            height: 0,
            hash: NodeHash::default(),
        }
    }
}

/// An ordered, rooted, labeled tree.
///
/// Build with [`Tree::new`] + [`Tree::add_child`], then call
/// [`Tree::refresh`] before handing the tree to the matcher. During matching
/// trees are read-only; the action generator works on its own clone.
#[derive(Debug, Clone)]
pub struct Tree {
    pub(crate) arena: Arena<NodeData>,
    pub(crate) root: NodeId,
}

impl Tree {
    /// Create a tree consisting of a single root node.
    pub fn new(data: NodeData) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(data);
        Tree { arena, root }
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes in the tree. Meaningful after [`Tree::refresh`].
    pub fn node_count(&self) -> usize {
        self.size(self.root)
    }

    pub(crate) fn data(&self, id: NodeId) -> &NodeData {
        self.arena[id].get()
    }

    pub(crate) fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        self.arena[id].get_mut()
    }

    /// Grammatical kind of a node.
    pub fn kind(&self, id: NodeId) -> &str {
        &self.data(id).kind
    }

    /// Label of a node (may be empty).
    pub fn label(&self, id: NodeId) -> &str {
        &self.data(id).label
    }

    /// Replace the label of a node.
    pub fn set_label(&mut self, id: NodeId, label: impl Into<String>) {
        self.data_mut(id).label = label.into();
    }

    /// Stable id of a node, unique within a refreshed tree.
    ///
    /// Ids are assigned in breadth-first order starting at 0, so smaller ids
    /// sit closer to the root.
    pub fn id(&self, id: NodeId) -> usize {
        self.data(id).id
    }

    /// Number of nodes in the subtree rooted at `id`.
    pub fn size(&self, id: NodeId) -> usize {
        self.data(id).size
    }

    /// Height of the subtree rooted at `id`: 1 for a leaf.
    pub fn height(&self, id: NodeId) -> usize {
        self.data(id).height
    }

    /// Structural hash of the subtree rooted at `id`.
    pub fn hash(&self, id: NodeId) -> NodeHash {
        self.data(id).hash
    }

    /// Parent of a node, or `None` for the root.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    /// Children of a node, in order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// Number of children of a node.
    pub fn child_count(&self, id: NodeId) -> usize {
        id.children(&self.arena).count()
    }

    /// Whether a node has no children.
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.arena[id].first_child().is_none()
    }

    /// Position of a node among its siblings; 0 for the root.
    pub fn position_in_parent(&self, id: NodeId) -> usize {
        match self.parent(id) {
            Some(p) => p
                .children(&self.arena)
                .position(|c| c == id)
                .unwrap_or(0),
            None => 0,
        }
    }

    /// Whether the subtree at `id` is isomorphic to `other_id` in `other`
    /// (equal structural hashes).
    pub fn is_isomorphic(&self, id: NodeId, other: &Tree, other_id: NodeId) -> bool {
        self.hash(id) == other.hash(other_id)
    }

    /// Append a new child under `parent` and return its id.
    pub fn add_child(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let child = self.arena.new_node(data);
        parent.append(child, &mut self.arena);
        child
    }

    /// Create a detached node; attach it later with [`Tree::insert_child`].
    pub fn new_node(&mut self, data: NodeData) -> NodeId {
        self.arena.new_node(data)
    }

    /// Insert `child` under `parent` at `position` (clamped to the end).
    pub fn insert_child(&mut self, parent: NodeId, position: usize, child: NodeId) {
        let occupant = parent.children(&self.arena).nth(position);
        match occupant {
            Some(occupant) => occupant.insert_before(child, &mut self.arena),
            None => parent.append(child, &mut self.arena),
        }
    }

    /// Detach a node from its parent, leaving its subtree intact.
    pub fn detach(&mut self, id: NodeId) {
        id.detach(&mut self.arena);
    }

    /// Pre-order traversal of the subtree at `from`, including `from`.
    pub fn pre_order(&self, from: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        from.descendants(&self.arena)
    }

    /// Post-order traversal of the subtree at `from`, including `from`.
    pub fn post_order(&self, from: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        from.traverse(&self.arena).filter_map(|edge| match edge {
            NodeEdge::End(id) => Some(id),
            NodeEdge::Start(_) => None,
        })
    }

    /// Breadth-first traversal of the subtree at `from`, including `from`.
    pub fn breadth_first(&self, from: NodeId) -> BreadthFirst<'_> {
        let mut queue = VecDeque::new();
        queue.push_back(from);
        BreadthFirst { tree: self, queue }
    }

    /// All nodes strictly below `id`, in pre-order.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.pre_order(id).skip(1)
    }

    /// Recompute `size`, `height`, and `hash` bottom-up, then assign
    /// breadth-first ids starting at 0.
    ///
    /// Must be called after building or structurally mutating a tree and
    /// before matching. Ids are stable until the next `refresh`.
    pub fn refresh(&mut self) {
        self.refresh_derived();
        let order: Vec<NodeId> = self.breadth_first(self.root).collect();
        for (i, id) in order.into_iter().enumerate() {
            self.data_mut(id).id = i;
        }
    }

    /// Recompute `size`, `height`, and `hash` without touching ids.
    ///
    /// Used on pruned working copies whose nodes must keep the ids of the
    /// originals they were cloned from.
    pub(crate) fn refresh_derived(&mut self) {
        let order: Vec<NodeId> = self.post_order(self.root).collect();
        // Children are serialized before their parents, so each node can
        // splice its children's canonical forms directly.
        let mut serials: RapidHashMap<NodeId, String> = RapidHashMap::default();
        for id in order {
            let children: Vec<NodeId> = self.children(id).collect();
            let mut size = 1;
            let mut height = 0;
            let data = self.data(id);
            let mut serial = String::with_capacity(8 + data.kind.len() + data.label.len());
            serial.push_str("[(");
            serial.push_str(&data.kind);
            serial.push_str("@@");
            serial.push_str(&data.label);
            for child in children {
                let cd = self.data(child);
                size += cd.size;
                height = height.max(cd.height);
                serial.push_str(&serials[&child]);
            }
            serial.push_str(")]");

            let data = self.data_mut(id);
            data.size = size;
            data.height = height + 1;
            data.hash = digest128(serial.as_bytes());
            serials.insert(id, serial);
        }
    }
}

/// Breadth-first node iterator, see [`Tree::breadth_first`].
pub struct BreadthFirst<'a> {
    tree: &'a Tree,
    queue: VecDeque<NodeId>,
}

impl Iterator for BreadthFirst<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.queue.pop_front()?;
        self.queue.extend(self.tree.children(id));
        Some(id)
    }
}
