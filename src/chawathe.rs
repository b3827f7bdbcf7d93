//! Chawathe edit script generation.
//!
//! Given two trees and a node mapping, produces the ordered sequence of
//! insert / update / move / delete operations that turns the source tree
//! into the destination tree. Based on "Change Detection in Hierarchically
//! Structured Information" (Chawathe et al., 1996).
//!
//! The generator never touches the caller's trees: it simulates every edit
//! on a private clone of the source, wired back to the originals through the
//! stable node ids. A synthetic fake root sits above the working copy so the
//! real root has a parent slot like everybody else.

use core::fmt;

use indextree::NodeId;
use rapidhash::RapidHashMap;
use rapidhash::RapidHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::matching::{Mapping, MappingStore};
use crate::tracing_macros::debug;
use crate::tree::{NodeData, Tree};

/// Reference to a node of one of the two trees involved in a diff.
///
/// Parents of edit actions can live on either side: a mapped container is a
/// source node, while a parent fabricated by an earlier insert only exists
/// in the destination tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// Node of the source tree.
    Src(NodeId),
    /// Node of the destination tree.
    Dst(NodeId),
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Src(id) => write!(f, "src:{}", usize::from(*id)),
            NodeRef::Dst(id) => write!(f, "dst:{}", usize::from(*id)),
        }
    }
}

/// One edit operation.
///
/// `Insert`/`InsertTree` carry the destination node being materialized;
/// `Update`, `Move`, `Delete`, and `DeleteTree` carry the source node they
/// act on. Positions are child offsets at the moment the action applies,
/// assuming all preceding actions in the script have been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Insert a single (childless) copy of `node` under `parent`.
    Insert {
        /// Destination node to copy.
        node: NodeId,
        /// Parent to insert under.
        parent: NodeRef,
        /// Child offset.
        position: usize,
    },
    /// Insert the whole subtree of `node` under `parent`.
    InsertTree {
        /// Destination node whose subtree is copied.
        node: NodeId,
        /// Parent to insert under.
        parent: NodeRef,
        /// Child offset.
        position: usize,
    },
    /// Replace the label of `node` with `value`.
    Update {
        /// Source node to relabel.
        node: NodeId,
        /// The new label.
        value: String,
    },
    /// Move `node` (with its subtree) under `parent`.
    Move {
        /// Source node to move.
        node: NodeId,
        /// New parent.
        parent: NodeRef,
        /// Child offset.
        position: usize,
    },
    /// Remove the (childless) `node`.
    Delete {
        /// Source node to remove.
        node: NodeId,
    },
    /// Remove `node` and its whole subtree.
    DeleteTree {
        /// Source node whose subtree is removed.
        node: NodeId,
    },
}

/// The six stable action kinds, with their wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Single-node insert.
    Insert,
    /// Whole-subtree insert.
    InsertTree,
    /// Single-node delete.
    Delete,
    /// Whole-subtree delete.
    DeleteTree,
    /// Label update.
    Update,
    /// Subtree move.
    Move,
}

impl ActionKind {
    /// The stable textual name (`insert`, `insert-tree`, …).
    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Insert => "insert",
            ActionKind::InsertTree => "insert-tree",
            ActionKind::Delete => "delete",
            ActionKind::DeleteTree => "delete-tree",
            ActionKind::Update => "update",
            ActionKind::Move => "move",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Serializable flat form of an [`Action`], keyed by stable node ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Which operation this is.
    pub kind: ActionKind,
    /// Stable id of the acted-on node (a destination id for inserts, a
    /// source id otherwise).
    pub tree_id: usize,
    /// Stable id of the parent, for inserts and moves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<usize>,
    /// Child offset, for inserts and moves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    /// New label, for updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Action {
    /// Which of the six kinds this action is.
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Insert { .. } => ActionKind::Insert,
            Action::InsertTree { .. } => ActionKind::InsertTree,
            Action::Update { .. } => ActionKind::Update,
            Action::Move { .. } => ActionKind::Move,
            Action::Delete { .. } => ActionKind::Delete,
            Action::DeleteTree { .. } => ActionKind::DeleteTree,
        }
    }

    /// Flatten into the serializable record form, resolving node handles to
    /// the stable ids of the given trees.
    pub fn to_record(&self, src: &Tree, dst: &Tree) -> ActionRecord {
        let resolve = |r: &NodeRef| match r {
            NodeRef::Src(id) => src.id(*id),
            NodeRef::Dst(id) => dst.id(*id),
        };
        match self {
            Action::Insert {
                node,
                parent,
                position,
            }
            | Action::InsertTree {
                node,
                parent,
                position,
            } => ActionRecord {
                kind: self.kind(),
                tree_id: dst.id(*node),
                parent_id: Some(resolve(parent)),
                position: Some(*position),
                label: None,
            },
            Action::Move {
                node,
                parent,
                position,
            } => ActionRecord {
                kind: ActionKind::Move,
                tree_id: src.id(*node),
                parent_id: Some(resolve(parent)),
                position: Some(*position),
                label: None,
            },
            Action::Update { node, value } => ActionRecord {
                kind: ActionKind::Update,
                tree_id: src.id(*node),
                parent_id: None,
                position: None,
                label: Some(value.clone()),
            },
            Action::Delete { node } | Action::DeleteTree { node } => ActionRecord {
                kind: self.kind(),
                tree_id: src.id(*node),
                parent_id: None,
                position: None,
                label: None,
            },
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Insert {
                node,
                parent,
                position,
            } => write!(
                f,
                "insert(dst:{} under {} at {})",
                usize::from(*node),
                parent,
                position
            ),
            Action::InsertTree {
                node,
                parent,
                position,
            } => write!(
                f,
                "insert-tree(dst:{} under {} at {})",
                usize::from(*node),
                parent,
                position
            ),
            Action::Update { node, value } => {
                write!(f, "update(src:{} -> {:?})", usize::from(*node), value)
            }
            Action::Move {
                node,
                parent,
                position,
            } => write!(
                f,
                "move(src:{} under {} at {})",
                usize::from(*node),
                parent,
                position
            ),
            Action::Delete { node } => write!(f, "delete(src:{})", usize::from(*node)),
            Action::DeleteTree { node } => write!(f, "delete-tree(src:{})", usize::from(*node)),
        }
    }
}

/// Generate the unsimplified edit script turning `src` into `dst` under the
/// given mapping. Pass the result through
/// [`simplify_actions`](crate::simplify_actions) (or use
/// [`patch`](crate::patch)) to collapse whole-subtree inserts and deletes.
///
/// # Panics
///
/// Panics on caller bugs: a mapping that does not pair the two roots while
/// leaving the destination root unmapped, or node handles that do not belong
/// to the given trees.
pub fn generate_actions(src: &Tree, dst: &Tree, mappings: &[Mapping]) -> Vec<Action> {
    ActionGenerator::new(src, dst, mappings).run()
}

struct ActionGenerator<'a> {
    src: &'a Tree,
    dst: &'a Tree,
    /// Private clone of `src` that every edit is replayed on. Cloning an
    /// arena keeps node ids, so a non-fabricated working node doubles as the
    /// handle of its original.
    work: Tree,
    real_root: NodeId,
    fake_root: NodeId,
    /// Working node fabricated by an insert → the destination node it
    /// stands in for.
    fabricated: RapidHashMap<NodeId, NodeId>,
    /// The caller's mapping, over working-copy handles.
    orig_mappings: MappingStore,
    /// Caller's mapping plus links for fabricated nodes and the fake roots.
    mappings: MappingStore,
    src_in_order: RapidHashSet<NodeId>,
    dst_in_order: RapidHashSet<NodeId>,
    next_id: usize,
    actions: Vec<Action>,
}

impl<'a> ActionGenerator<'a> {
    fn new(src: &'a Tree, dst: &'a Tree, pairs: &[Mapping]) -> Self {
        let mut work = src.clone();
        let real_root = work.root();
        let fake_root = work.new_node(NodeData::new("", ""));
        work.insert_child(fake_root, 0, real_root);
        work.root = fake_root;

        let mut orig_mappings = MappingStore::new();
        let mut mappings = MappingStore::new();
        for m in pairs {
            orig_mappings.link(m.src, m.dst);
            mappings.link(m.src, m.dst);
        }

        ActionGenerator {
            src,
            dst,
            work,
            real_root,
            fake_root,
            fabricated: RapidHashMap::default(),
            orig_mappings,
            mappings,
            src_in_order: RapidHashSet::default(),
            dst_in_order: RapidHashSet::default(),
            // Fresh ids for fabricated nodes, disjoint from both trees'
            // 0-based numbering.
            next_id: src.node_count() + 1,
            actions: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Action> {
        let order: Vec<NodeId> = self.dst.breadth_first(self.dst.root()).collect();
        for x in order {
            let w = match self.mappings.get_src(x) {
                None => self.insert_phase(x),
                Some(w) => {
                    if self.dst.parent(x).is_some() {
                        self.update_and_move_phase(w, x);
                    }
                    w
                }
            };

            self.src_in_order.insert(w);
            self.dst_in_order.insert(x);
            self.align_children(w, x);
        }

        // Whatever the walk above never claimed does not exist in the
        // destination: delete bottom-up.
        let order: Vec<NodeId> = self.work.post_order(self.real_root).collect();
        for w in order {
            if self.mappings.get_dst(w).is_none() {
                self.actions.push(Action::Delete { node: w });
            }
        }

        debug!(total = self.actions.len(), "edit script generated");
        self.actions
    }

    fn insert_phase(&mut self, x: NodeId) -> NodeId {
        let z = self.partner_of_parent(x);
        let k = self.find_pos(x);

        let mut data = NodeData::new(self.dst.kind(x), self.dst.label(x));
        data.id = self.next_id;
        self.next_id += 1;

        let w = self.work.new_node(data);
        let parent = self.original_of(z);
        self.actions.push(Action::Insert {
            node: x,
            parent,
            position: k,
        });
        self.fabricated.insert(w, x);
        self.mappings.link(w, x);
        self.work.insert_child(z, k, w);
        w
    }

    fn update_and_move_phase(&mut self, w: NodeId, x: NodeId) {
        if self.work.label(w) != self.dst.label(x) {
            let value = self.dst.label(x).to_owned();
            self.actions.push(Action::Update {
                node: w,
                value: value.clone(),
            });
            self.work.set_label(w, value);
        }

        let z = self.partner_of_parent(x);
        if self.work.parent(w) != Some(z) {
            let k = self.find_pos(x);
            let parent = self.original_of(z);
            self.actions.push(Action::Move {
                node: w,
                parent,
                position: k,
            });
            self.work.detach(w);
            self.work.insert_child(z, k, w);
        }
    }

    /// Align the children of a matched pair: the longest common subsequence
    /// of mapped children stays put, every other mapped child is moved next
    /// to its nearest stable sibling.
    fn align_children(&mut self, w: NodeId, x: NodeId) {
        let w_children: SmallVec<[NodeId; 8]> = self.work.children(w).collect();
        let x_children: SmallVec<[NodeId; 8]> = self.dst.children(x).collect();
        for c in &w_children {
            self.src_in_order.remove(c);
        }
        for c in &x_children {
            self.dst_in_order.remove(c);
        }

        // Children of w mapped to a child of x, and vice versa.
        let s1: SmallVec<[NodeId; 8]> = w_children
            .iter()
            .copied()
            .filter(|&c| {
                self.mappings
                    .get_dst(c)
                    .is_some_and(|d| self.dst.parent(d) == Some(x))
            })
            .collect();
        let s2: SmallVec<[NodeId; 8]> = x_children
            .iter()
            .copied()
            .filter(|&c| {
                self.mappings
                    .get_src(c)
                    .is_some_and(|s| self.work.parent(s) == Some(w))
            })
            .collect();

        let lcs = self.lcs(&s1, &s2);
        for &(a, b) in &lcs {
            self.src_in_order.insert(a);
            self.dst_in_order.insert(b);
        }

        for &a in &s1 {
            for &b in &s2 {
                if !self.orig_mappings.has(a, b) || lcs.contains(&(a, b)) {
                    continue;
                }
                let k = self.find_pos(b);
                let parent = self.original_of(w);
                self.actions.push(Action::Move {
                    node: a,
                    parent,
                    position: k,
                });

                let old_k = self.work.position_in_parent(a);
                self.work.detach(a);
                // The slot was computed while `a` still sat to its left.
                let k = if k > old_k { k - 1 } else { k };
                self.work.insert_child(w, k, a);

                self.src_in_order.insert(a);
                self.dst_in_order.insert(b);
            }
        }
    }

    /// Longest common subsequence of two child lists under the predicate
    /// "these two children are mapped to each other".
    fn lcs(&self, s1: &[NodeId], s2: &[NodeId]) -> Vec<(NodeId, NodeId)> {
        let m = s1.len();
        let n = s2.len();
        let mut opt = vec![vec![0usize; n + 1]; m + 1];
        for i in (0..m).rev() {
            for j in (0..n).rev() {
                opt[i][j] = if self.mappings.get_src(s2[j]) == Some(s1[i]) {
                    opt[i + 1][j + 1] + 1
                } else {
                    opt[i + 1][j].max(opt[i][j + 1])
                };
            }
        }

        let mut result = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < m && j < n {
            if self.mappings.get_src(s2[j]) == Some(s1[i]) {
                result.push((s1[i], s2[j]));
                i += 1;
                j += 1;
            } else if opt[i + 1][j] >= opt[i][j + 1] {
                i += 1;
            } else {
                j += 1;
            }
        }
        result
    }

    /// Where to put the working counterpart of destination node `x`: right
    /// after the partner of its nearest in-order left sibling.
    fn find_pos(&self, x: NodeId) -> usize {
        let Some(y) = self.dst.parent(x) else {
            panic!("cannot place the destination root: the roots must be mapped");
        };
        let siblings: SmallVec<[NodeId; 8]> = self.dst.children(y).collect();

        // x being the leftmost in-order child means "go first".
        for &c in &siblings {
            if self.dst_in_order.contains(&c) {
                if c == x {
                    return 0;
                }
                break;
            }
        }

        let x_pos = self.dst.position_in_parent(x);
        let v = siblings[..x_pos]
            .iter()
            .rev()
            .find(|c| self.dst_in_order.contains(*c));
        // No stable anchor to the left: go first.
        let Some(&v) = v else { return 0 };
        let Some(u) = self.mappings.get_src(v) else {
            return 0;
        };
        self.work.position_in_parent(u) + 1
    }

    fn partner_of_parent(&self, x: NodeId) -> NodeId {
        match self.dst.parent(x) {
            Some(y) => self.mappings.get_src(y).unwrap_or_else(|| {
                panic!("destination parent without a partner: breadth-first order guarantees one")
            }),
            None => self.fake_root,
        }
    }

    /// Resolve a working-copy handle to the node an emitted action should
    /// reference: its source original, or the destination node a fabricated
    /// insert stands in for.
    fn original_of(&self, w: NodeId) -> NodeRef {
        match self.fabricated.get(&w) {
            Some(&x) => NodeRef::Dst(x),
            None => NodeRef::Src(w),
        }
    }
}
