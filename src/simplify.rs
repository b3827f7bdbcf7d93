//! Edit script simplification.
//!
//! When a whole subtree is inserted, the script contains one insert per
//! node; the reader (and any patch consumer) is better served by a single
//! whole-subtree operation. The same goes for deletes. This pass collapses
//! every maximal fully-inserted subtree into an [`Action::InsertTree`] and
//! every maximal fully-deleted subtree into an [`Action::DeleteTree`];
//! independent groups each collapse on their own.
//!
//! A subtree is collapsible only when *every* node below its root is
//! covered by the same kind of action in the script — otherwise the
//! subtree op would fabricate (or destroy) nodes the script handles
//! individually. Because such a subtree is entirely unmapped, the updates
//! and moves interleaved with its per-node actions always target unrelated
//! nodes, so they do not break the group apart. Applying the simplified
//! script yields the same tree as the original script.

use indextree::NodeId;
use rapidhash::{RapidHashMap, RapidHashSet};

use crate::chawathe::Action;
use crate::tracing_macros::debug;
use crate::tree::Tree;

/// Collapse whole-subtree inserts and deletes in `actions`.
///
/// `src` and `dst` must be the trees the script was generated from.
pub fn simplify_actions(actions: Vec<Action>, src: &Tree, dst: &Tree) -> Vec<Action> {
    let mut inserted: RapidHashMap<NodeId, usize> = RapidHashMap::default();
    let mut deleted: RapidHashMap<NodeId, usize> = RapidHashMap::default();
    for (i, action) in actions.iter().enumerate() {
        match action {
            Action::Insert { node, .. } => {
                inserted.insert(*node, i);
            }
            Action::Delete { node } => {
                deleted.insert(*node, i);
            }
            _ => {}
        }
    }

    let mut replaced: RapidHashMap<usize, Action> = RapidHashMap::default();
    let mut removed: RapidHashSet<usize> = RapidHashSet::default();

    // Every maximal inserted subtree whose nodes are all inserted by the
    // script. A qualifying root below another qualifying root is swallowed
    // by its ancestor's collapse, so only roots whose parent does not
    // qualify are rewritten. Leaves stay plain inserts.
    for (i, action) in actions.iter().enumerate() {
        if let Action::Insert {
            node,
            parent,
            position,
        } = action
        {
            let node = *node;
            if dst.height(node) < 2 || !fully_covered(dst, node, &inserted) {
                continue;
            }
            let dominated = dst
                .parent(node)
                .is_some_and(|p| inserted.contains_key(&p) && fully_covered(dst, p, &inserted));
            if dominated {
                continue;
            }
            replaced.insert(
                i,
                Action::InsertTree {
                    node,
                    parent: *parent,
                    position: *position,
                },
            );
            for d in dst.descendants(node) {
                removed.insert(inserted[&d]);
            }
        }
    }

    // Symmetric pass for deletes, over the source tree.
    for (i, action) in actions.iter().enumerate() {
        if let Action::Delete { node } = action {
            let node = *node;
            if src.height(node) < 2 || !fully_covered(src, node, &deleted) {
                continue;
            }
            let dominated = src
                .parent(node)
                .is_some_and(|p| deleted.contains_key(&p) && fully_covered(src, p, &deleted));
            if dominated {
                continue;
            }
            replaced.insert(i, Action::DeleteTree { node });
            for d in src.descendants(node) {
                removed.insert(deleted[&d]);
            }
        }
    }

    if replaced.is_empty() {
        return actions;
    }

    let before = actions.len();
    let result: Vec<Action> = actions
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !removed.contains(i))
        .map(|(i, action)| replaced.remove(&i).unwrap_or(action))
        .collect();
    debug!(before, after = result.len(), "simplified edit script");
    result
}

/// Every node strictly below `root` has an action index in `covered`.
fn fully_covered(tree: &Tree, root: NodeId, covered: &RapidHashMap<NodeId, usize>) -> bool {
    tree.descendants(root).all(|d| covered.contains_key(&d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chawathe::NodeRef;
    use crate::tree::NodeData;

    #[test]
    fn subtree_insert_collapses() {
        // dst grows parent(leaf_a, leaf_b) under its root.
        let mut dst = Tree::new(NodeData::new("root", ""));
        let parent = dst.add_child(dst.root(), NodeData::new("parent", ""));
        let a = dst.add_child(parent, NodeData::new("leaf", "a"));
        let b = dst.add_child(parent, NodeData::new("leaf", "b"));
        dst.refresh();

        let mut src = Tree::new(NodeData::new("root", ""));
        src.refresh();

        let anchor = NodeRef::Src(src.root());
        let actions = vec![
            Action::Insert {
                node: parent,
                parent: anchor,
                position: 0,
            },
            Action::Insert {
                node: a,
                parent: NodeRef::Dst(parent),
                position: 0,
            },
            Action::Insert {
                node: b,
                parent: NodeRef::Dst(parent),
                position: 1,
            },
        ];

        let simplified = simplify_actions(actions, &src, &dst);
        assert_eq!(
            simplified,
            vec![Action::InsertTree {
                node: parent,
                parent: anchor,
                position: 0,
            }]
        );
    }

    #[test]
    fn subtree_delete_collapses() {
        let mut src = Tree::new(NodeData::new("root", ""));
        let parent = src.add_child(src.root(), NodeData::new("parent", ""));
        let a = src.add_child(parent, NodeData::new("leaf", "a"));
        let b = src.add_child(parent, NodeData::new("leaf", "b"));
        src.refresh();

        let mut dst = Tree::new(NodeData::new("root", ""));
        dst.refresh();

        let actions = vec![
            Action::Delete { node: a },
            Action::Delete { node: b },
            Action::Delete { node: parent },
        ];

        let simplified = simplify_actions(actions, &src, &dst);
        assert_eq!(simplified, vec![Action::DeleteTree { node: parent }]);
    }

    #[test]
    fn independent_subtree_inserts_each_collapse() {
        // Two disjoint new subtrees under the root: both must collapse.
        let mut dst = Tree::new(NodeData::new("root", ""));
        let p = dst.add_child(dst.root(), NodeData::new("p", ""));
        let pa = dst.add_child(p, NodeData::new("leaf", "a"));
        let q = dst.add_child(dst.root(), NodeData::new("q", ""));
        let qb = dst.add_child(q, NodeData::new("leaf", "b"));
        dst.refresh();

        let mut src = Tree::new(NodeData::new("root", ""));
        src.refresh();

        let anchor = NodeRef::Src(src.root());
        let actions = vec![
            Action::Insert {
                node: p,
                parent: anchor,
                position: 0,
            },
            Action::Insert {
                node: q,
                parent: anchor,
                position: 1,
            },
            Action::Insert {
                node: pa,
                parent: NodeRef::Dst(p),
                position: 0,
            },
            Action::Insert {
                node: qb,
                parent: NodeRef::Dst(q),
                position: 0,
            },
        ];

        let simplified = simplify_actions(actions, &src, &dst);
        assert_eq!(
            simplified,
            vec![
                Action::InsertTree {
                    node: p,
                    parent: anchor,
                    position: 0,
                },
                Action::InsertTree {
                    node: q,
                    parent: anchor,
                    position: 1,
                },
            ]
        );
    }

    #[test]
    fn independent_subtree_deletes_each_collapse() {
        let mut src = Tree::new(NodeData::new("root", ""));
        let p = src.add_child(src.root(), NodeData::new("p", ""));
        let pa = src.add_child(p, NodeData::new("leaf", "a"));
        let q = src.add_child(src.root(), NodeData::new("q", ""));
        let qb = src.add_child(q, NodeData::new("leaf", "b"));
        src.refresh();

        let mut dst = Tree::new(NodeData::new("root", ""));
        dst.refresh();

        let actions = vec![
            Action::Delete { node: pa },
            Action::Delete { node: p },
            Action::Delete { node: qb },
            Action::Delete { node: q },
        ];

        let simplified = simplify_actions(actions, &src, &dst);
        assert_eq!(
            simplified,
            vec![Action::DeleteTree { node: p }, Action::DeleteTree { node: q }]
        );
    }

    #[test]
    fn nested_inserts_collapse_at_the_outermost_root() {
        // root(p(q(a))): only p becomes a subtree insert; q is swallowed.
        let mut dst = Tree::new(NodeData::new("root", ""));
        let p = dst.add_child(dst.root(), NodeData::new("p", ""));
        let q = dst.add_child(p, NodeData::new("q", ""));
        let a = dst.add_child(q, NodeData::new("leaf", "a"));
        dst.refresh();

        let mut src = Tree::new(NodeData::new("root", ""));
        src.refresh();

        let anchor = NodeRef::Src(src.root());
        let actions = vec![
            Action::Insert {
                node: p,
                parent: anchor,
                position: 0,
            },
            Action::Insert {
                node: q,
                parent: NodeRef::Dst(p),
                position: 0,
            },
            Action::Insert {
                node: a,
                parent: NodeRef::Dst(q),
                position: 0,
            },
        ];

        let simplified = simplify_actions(actions, &src, &dst);
        assert_eq!(
            simplified,
            vec![Action::InsertTree {
                node: p,
                parent: anchor,
                position: 0,
            }]
        );
    }

    #[test]
    fn independent_leaf_deletes_are_kept() {
        let mut src = Tree::new(NodeData::new("root", ""));
        let a = src.add_child(src.root(), NodeData::new("leaf", "a"));
        let b = src.add_child(src.root(), NodeData::new("leaf", "b"));
        src.refresh();
        let mut dst = Tree::new(NodeData::new("root", ""));
        dst.refresh();

        let actions = vec![Action::Delete { node: a }, Action::Delete { node: b }];
        let simplified = simplify_actions(actions.clone(), &src, &dst);
        assert_eq!(simplified, actions);
    }

    #[test]
    fn partial_subtree_insert_does_not_collapse() {
        // Only one of the two children is inserted by the script (the other
        // is a moved node), so the parent must stay a plain insert.
        let mut dst = Tree::new(NodeData::new("root", ""));
        let parent = dst.add_child(dst.root(), NodeData::new("parent", ""));
        let a = dst.add_child(parent, NodeData::new("leaf", "a"));
        dst.add_child(parent, NodeData::new("leaf", "b"));
        dst.refresh();

        let mut src = Tree::new(NodeData::new("root", ""));
        src.refresh();

        let actions = vec![
            Action::Insert {
                node: parent,
                parent: NodeRef::Src(src.root()),
                position: 0,
            },
            Action::Insert {
                node: a,
                parent: NodeRef::Dst(parent),
                position: 0,
            },
        ];
        let simplified = simplify_actions(actions.clone(), &src, &dst);
        assert_eq!(simplified, actions);
    }
}
