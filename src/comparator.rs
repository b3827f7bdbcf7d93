//! Ranking of ambiguous candidate mappings.
//!
//! When the top-down phase finds a subtree that is isomorphic to several
//! partners, the candidates are ranked by a weighted similarity:
//!
//! ```text
//! sim(s, d) = 100 · jaccard(parent(s), parent(d))
//!           +  10 · pos_similarity(s, d)
//!           +       id_similarity(s, d)
//! ```
//!
//! Jaccard similarity counts descendants already related by the current
//! mapping; position similarity compares offsets among siblings; id
//! similarity compares breadth-first numbering, preferring nodes at similar
//! distances from their roots. Ties are broken toward the pair closer to the
//! roots (smaller source id, then smaller destination id).

use core::cmp::Ordering;

use indextree::NodeId;
use rapidhash::{RapidHashMap, RapidHashSet};

use crate::matching::{Mapping, MappingStore};
use crate::tree::Tree;

pub(crate) struct MappingComparator<'a> {
    src: &'a Tree,
    dst: &'a Tree,
    similarities: RapidHashMap<Mapping, f64>,
}

impl<'a> MappingComparator<'a> {
    /// Pre-compute similarities for all ambiguous candidates.
    pub(crate) fn new(
        ambiguous: &[Mapping],
        mappings: &MappingStore,
        src: &'a Tree,
        dst: &'a Tree,
        max_tree_size: usize,
    ) -> Self {
        // Descendant sets are cached per parent node; candidates are
        // siblings more often than not.
        let mut src_descendants: RapidHashMap<NodeId, RapidHashSet<NodeId>> =
            RapidHashMap::default();
        let mut dst_descendants: RapidHashMap<NodeId, RapidHashSet<NodeId>> =
            RapidHashMap::default();

        let mut similarities = RapidHashMap::default();
        for &m in ambiguous {
            let jaccard = match (src.parent(m.src), dst.parent(m.dst)) {
                (Some(ps), Some(pd)) => {
                    let sd = src_descendants
                        .entry(ps)
                        .or_insert_with(|| src.descendants(ps).collect());
                    let dd = dst_descendants
                        .entry(pd)
                        .or_insert_with(|| dst.descendants(pd).collect());
                    let common = sd
                        .iter()
                        .filter(|&&c| mappings.get_dst(c).is_some_and(|p| dd.contains(&p)))
                        .count();
                    let den = (sd.len() + dd.len() - common) as f64;
                    if den > 0.0 { common as f64 / den } else { 0.0 }
                }
                // Roots never end up ambiguous; score parentless nodes low.
                _ => 0.0,
            };

            let sim = 100.0 * jaccard
                + 10.0 * pos_similarity(src, m.src, dst, m.dst)
                + id_similarity(src, m.src, dst, m.dst, max_tree_size);
            similarities.insert(m, sim);
        }

        MappingComparator {
            src,
            dst,
            similarities,
        }
    }

    /// Total order: greater similarity first, then smaller source id, then
    /// smaller destination id.
    pub(crate) fn cmp(&self, a: &Mapping, b: &Mapping) -> Ordering {
        let sa = self.similarities[a];
        let sb = self.similarities[b];
        sb.total_cmp(&sa)
            .then_with(|| self.src.id(a.src).cmp(&self.src.id(b.src)))
            .then_with(|| self.dst.id(a.dst).cmp(&self.dst.id(b.dst)))
    }
}

fn pos_similarity(src: &Tree, s: NodeId, dst: &Tree, d: NodeId) -> f64 {
    let (pos_s, max_s) = match src.parent(s) {
        Some(p) => (src.position_in_parent(s), src.child_count(p)),
        None => (0, 1),
    };
    let (pos_d, max_d) = match dst.parent(d) {
        Some(p) => (dst.position_in_parent(d), dst.child_count(p)),
        None => (0, 1),
    };
    1.0 - (pos_s as f64 - pos_d as f64).abs() / max_s.max(max_d) as f64
}

fn id_similarity(src: &Tree, s: NodeId, dst: &Tree, d: NodeId, max_tree_size: usize) -> f64 {
    1.0 - (src.id(s) as f64 - dst.id(d) as f64).abs() / max_tree_size as f64
}
