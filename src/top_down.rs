//! Top-down phase: greedy matching of the largest isomorphic subtrees.
//!
//! Both trees are walked height-by-height through [`PriorityTreeList`]s.
//! Whenever two popped subtrees hash equal they become candidates; subtrees
//! that found no partner are opened so their children compete at the next
//! height. Unambiguous candidates are accepted outright (together with their
//! whole subtrees); ambiguous ones are ranked by the similarity comparator
//! and accepted greedily.

use indextree::NodeId;
use rapidhash::RapidHashSet;

use crate::comparator::MappingComparator;
use crate::matching::{Mapping, MappingStore, MultiMapping};
use crate::priority::PriorityTreeList;
use crate::tracing_macros::{debug, trace};
use crate::tree::Tree;

/// Run the top-down phase and return the resulting mapping.
///
/// Only subtrees of height at least `min_height` are considered, so small
/// fragments (single identifiers, most of the time) wait for the bottom-up
/// phase instead of matching all over the place.
pub fn subtree_match(src: &Tree, dst: &Tree, min_height: usize) -> MappingStore {
    let max_tree_size = src.node_count().max(dst.node_count());

    let mut candidates = MultiMapping::new();
    let mut src_list = PriorityTreeList::new(src, min_height);
    let mut dst_list = PriorityTreeList::new(dst, min_height);

    while let (Some(src_height), Some(dst_height)) =
        (src_list.peek_height(), dst_list.peek_height())
    {
        // Open the taller side until both lists expose the same height.
        if src_height != dst_height {
            if src_height > dst_height {
                src_list.open();
            } else {
                dst_list.open();
            }
            continue;
        }

        let src_bucket = src_list.pop();
        let dst_bucket = dst_list.pop();
        let mut src_marked = vec![false; src_bucket.len()];
        let mut dst_marked = vec![false; dst_bucket.len()];

        for (i, &s) in src_bucket.iter().enumerate() {
            for (j, &d) in dst_bucket.iter().enumerate() {
                if src.is_isomorphic(s, dst, d) {
                    trace!(src_height, "isomorphic candidate");
                    candidates.link(s, d);
                    src_marked[i] = true;
                    dst_marked[j] = true;
                }
            }
        }

        // Subtrees without a partner get broken up: their children join
        // the competition.
        for (i, &s) in src_bucket.iter().enumerate() {
            if !src_marked[i] {
                src_list.add_children(s);
            }
        }
        for (j, &d) in dst_bucket.iter().enumerate() {
            if !dst_marked[j] {
                dst_list.add_children(d);
            }
        }

        src_list.update_height();
        dst_list.update_height();
    }

    let store = filter_mappings(src, dst, &candidates, max_tree_size);
    debug!(mapped = store.size(), "top-down phase done");
    store
}

/// Resolve the candidate multi-mapping into a one-to-one store.
fn filter_mappings(
    src: &Tree,
    dst: &Tree,
    candidates: &MultiMapping,
    max_tree_size: usize,
) -> MappingStore {
    let mut store = MappingStore::new();
    let mut ambiguous: Vec<Mapping> = Vec::new();
    let mut processed: RapidHashSet<NodeId> = RapidHashSet::default();

    for &s in candidates.srcs() {
        if candidates.is_src_unique(s) {
            let d = candidates.dsts_of(s)[0];
            map_recursively(src, dst, s, d, &mut store);
            continue;
        }

        if processed.contains(&s) {
            continue;
        }
        // Gather the full cross product around this source's first partner,
        // marking every involved source so the group is only emitted once.
        let dsts = candidates.dsts_of(s);
        let srcs = candidates.srcs_of(dsts[0]);
        for &s2 in srcs {
            for &d2 in dsts {
                ambiguous.push(Mapping { src: s2, dst: d2 });
            }
            processed.insert(s2);
        }
    }

    debug!(ambiguous = ambiguous.len(), "resolving ambiguous candidates");
    let comparator = MappingComparator::new(&ambiguous, &store, src, dst, max_tree_size);
    ambiguous.sort_by(|a, b| comparator.cmp(a, b));

    let mut src_taken: RapidHashSet<NodeId> = RapidHashSet::default();
    let mut dst_taken: RapidHashSet<NodeId> = RapidHashSet::default();
    for m in ambiguous {
        if src_taken.contains(&m.src) || dst_taken.contains(&m.dst) {
            continue;
        }
        map_recursively(src, dst, m.src, m.dst, &mut store);
        src_taken.insert(m.src);
        dst_taken.insert(m.dst);
    }

    store
}

/// Map two isomorphic subtrees node by node: equal hashes guarantee the
/// pre-order walks line up exactly.
fn map_recursively(src: &Tree, dst: &Tree, s: NodeId, d: NodeId, store: &mut MappingStore) {
    debug_assert!(src.is_isomorphic(s, dst, d));
    for (cs, cd) in src.pre_order(s).zip(dst.pre_order(d)) {
        store.link(cs, cd);
    }
}
