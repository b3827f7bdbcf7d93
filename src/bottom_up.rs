//! Bottom-up phase: container mappings and Zhang–Shasha recovery.
//!
//! Walking the source tree in post-order, every unmatched internal node
//! looks for a container partner: a destination node of the same kind whose
//! descendants already share enough mappings (Jaccard similarity over the
//! mapped descendants). Once a container pair is found, the still-unmatched
//! residue under both nodes is handed to the optimal Zhang–Shasha matcher to
//! recover fine-grained pairs — but only while the residue is small, since
//! that step is cubic.
//!
//! The roots are always paired at the end: both sides represent the same
//! compilation unit even when nothing else survived.

use indextree::NodeId;
use rapidhash::{RapidHashMap, RapidHashSet};

use crate::matching::MappingStore;
use crate::tracing_macros::{debug, trace};
use crate::tree::Tree;
use crate::zs::zs_match;

/// Run the bottom-up phase, extending `store` in place.
///
/// `store` holds the pairs found by the top-down phase. `max_size` caps the
/// residue size for recovery; `sim_threshold` is the minimum Jaccard
/// similarity for a container mapping.
pub fn bottom_up_match(
    src: &Tree,
    dst: &Tree,
    store: &mut MappingStore,
    max_size: usize,
    sim_threshold: f64,
) {
    BottomUpMatcher {
        src,
        dst,
        mapped_src: store.iter().map(|m| m.src).collect(),
        mapped_dst: store.iter().map(|m| m.dst).collect(),
        src_ids: src.pre_order(src.root()).map(|n| (src.id(n), n)).collect(),
        dst_ids: dst.pre_order(dst.root()).map(|n| (dst.id(n), n)).collect(),
        max_size,
        sim_threshold,
    }
    .run(store);
}

struct BottomUpMatcher<'a> {
    src: &'a Tree,
    dst: &'a Tree,
    /// Nodes consumed on each side, including whole container subtrees.
    mapped_src: RapidHashSet<NodeId>,
    mapped_dst: RapidHashSet<NodeId>,
    /// Stable id → node, to translate recovery pairs found on working
    /// copies back to the original trees.
    src_ids: RapidHashMap<usize, NodeId>,
    dst_ids: RapidHashMap<usize, NodeId>,
    max_size: usize,
    sim_threshold: f64,
}

impl BottomUpMatcher<'_> {
    fn run(&mut self, store: &mut MappingStore) {
        let order: Vec<NodeId> = self.src.post_order(self.src.root()).collect();
        for t in order {
            if self.src.parent(t).is_none() {
                // The roots always pair, unless an earlier phase already
                // claimed one of them.
                let dst_root = self.dst.root();
                if store.has(t, dst_root)
                    || (!self.mapped_src.contains(&t) && !self.mapped_dst.contains(&dst_root))
                {
                    self.add_mapping(store, t, dst_root);
                }
                self.last_chance_match(store, t, dst_root);
                break;
            }

            if self.mapped_src.contains(&t) || self.src.is_leaf(t) {
                continue;
            }

            let mut best: Option<NodeId> = None;
            let mut best_sim = -1.0;
            for candidate in self.dst_candidates(store, t) {
                let sim = self.jaccard(store, t, candidate);
                if sim > best_sim && sim >= self.sim_threshold {
                    best_sim = sim;
                    best = Some(candidate);
                }
            }

            if let Some(best) = best {
                trace!(sim = best_sim, "container mapping");
                self.last_chance_match(store, t, best);
                self.add_mapping(store, t, best);
            }
        }
    }

    /// Destination candidates for `t`: unmatched, non-root ancestors of the
    /// partners of `t`'s already-mapped descendants, restricted to `t`'s
    /// kind. Each ancestor is considered once.
    fn dst_candidates(&self, store: &MappingStore, t: NodeId) -> Vec<NodeId> {
        let mut seeds = Vec::new();
        for c in self.src.descendants(t) {
            if let Some(partner) = store.get_dst(c) {
                seeds.push(partner);
            }
        }

        let mut candidates = Vec::new();
        let mut visited: RapidHashSet<NodeId> = RapidHashSet::default();
        for seed in seeds {
            let mut current = seed;
            while let Some(parent) = self.dst.parent(current) {
                if !visited.insert(parent) {
                    break;
                }
                if self.dst.kind(parent) == self.src.kind(t)
                    && !self.mapped_dst.contains(&parent)
                    && self.dst.parent(parent).is_some()
                {
                    candidates.push(parent);
                }
                current = parent;
            }
        }

        candidates
    }

    /// Jaccard similarity over mapped descendants of a candidate pair.
    fn jaccard(&self, store: &MappingStore, s: NodeId, d: NodeId) -> f64 {
        let dst_desc: RapidHashSet<NodeId> = self.dst.descendants(d).collect();
        let mut src_count = 0;
        let mut common = 0;
        for c in self.src.descendants(s) {
            src_count += 1;
            if let Some(partner) = store.get_dst(c)
                && dst_desc.contains(&partner)
            {
                common += 1;
            }
        }
        common as f64 / (src_count + dst_desc.len() - common) as f64
    }

    /// Recovery: run the optimal matcher on working copies of both subtrees
    /// with already-consumed nodes pruned away, then adopt every compatible
    /// pair. Finally the whole container subtrees are marked consumed on
    /// both sides.
    fn last_chance_match(&mut self, store: &mut MappingStore, s: NodeId, d: NodeId) {
        let pruned_src = self.pruned_copy(self.src, s, &self.mapped_src);
        let pruned_dst = self.pruned_copy(self.dst, d, &self.mapped_dst);

        if pruned_src.node_count() < self.max_size || pruned_dst.node_count() < self.max_size {
            for (ps, pd) in zs_match(&pruned_src, &pruned_dst) {
                let left = self.src_ids[&pruned_src.id(ps)];
                let right = self.dst_ids[&pruned_dst.id(pd)];

                if left == s || right == d {
                    // The container pair itself is recorded by the caller.
                    continue;
                }
                if self.mapped_src.contains(&left) || self.mapped_dst.contains(&right) {
                    continue;
                }
                if self.src.kind(left) != self.dst.kind(right) {
                    continue;
                }
                let compatible_parents = match (self.src.parent(left), self.dst.parent(right)) {
                    (Some(pl), Some(pr)) => self.src.kind(pl) == self.dst.kind(pr),
                    _ => false,
                };
                if !compatible_parents {
                    continue;
                }
                self.add_mapping(store, left, right);
            }
        } else {
            debug!(
                src_residue = pruned_src.node_count(),
                dst_residue = pruned_dst.node_count(),
                "recovery skipped, residue over size cap"
            );
        }

        for n in self.src.pre_order(s) {
            self.mapped_src.insert(n);
        }
        for n in self.dst.pre_order(d) {
            self.mapped_dst.insert(n);
        }
    }

    /// Copy the subtree at `root`, skipping consumed subtrees (consumed
    /// regions are subtree-closed, so skipping a node skips its whole
    /// subtree). Node data keeps the original stable ids; only the derived
    /// metrics are refreshed.
    fn pruned_copy(&self, tree: &Tree, root: NodeId, consumed: &RapidHashSet<NodeId>) -> Tree {
        let mut copy = Tree::new(tree.data(root).clone());
        let mut stack: Vec<(NodeId, NodeId)> = vec![(root, copy.root())];
        while let Some((orig, copied)) = stack.pop() {
            let children: Vec<NodeId> = tree
                .children(orig)
                .filter(|c| !consumed.contains(c))
                .collect();
            for child in children {
                let c = copy.add_child(copied, tree.data(child).clone());
                stack.push((child, c));
            }
        }
        copy.refresh_derived();
        copy
    }

    fn add_mapping(&mut self, store: &mut MappingStore, s: NodeId, d: NodeId) {
        self.mapped_src.insert(s);
        self.mapped_dst.insert(d);
        store.link(s, d);
    }
}
