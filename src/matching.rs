//! Mapping stores and the two-phase matching driver.
//!
//! A mapping is a partial bijection between the nodes of two trees. The
//! bijective [`MappingStore`] is the working result of matching; the
//! [`MultiMapping`] holds ambiguous many-to-many candidates during the
//! top-down phase until they are resolved.
//!
//! Stores are keyed by node identity ([`NodeId`]), never by node content.
//! The bijective store is hit on every comparison, so lookups index a plain
//! `Vec` by arena index instead of hashing.

use indextree::NodeId;
use rapidhash::RapidHashMap;

use crate::bottom_up::bottom_up_match;
use crate::top_down::subtree_match;
use crate::tracing_macros::debug;
use crate::tree::Tree;

/// A matched pair: `src` is a node of the source tree, `dst` of the
/// destination tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mapping {
    /// Node of the source tree.
    pub src: NodeId,
    /// Node of the destination tree.
    pub dst: NodeId,
}

/// Bidirectional one-to-one store of matched node pairs.
///
/// Pairs are remembered in insertion order, so [`MappingStore::to_list`] is
/// deterministic for deterministic callers.
#[derive(Debug, Default)]
pub struct MappingStore {
    src_to_dst: Vec<Option<NodeId>>,
    dst_to_src: Vec<Option<NodeId>>,
    pairs: Vec<Mapping>,
}

impl MappingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        MappingStore::default()
    }

    /// Record the pair `(src, dst)`. Re-linking an existing pair is a no-op;
    /// callers guarantee each side is linked at most once.
    pub fn link(&mut self, src: NodeId, dst: NodeId) {
        if self.has(src, dst) {
            return;
        }
        debug_assert!(
            self.get_dst(src).is_none() && self.get_src(dst).is_none(),
            "mapping store: node linked twice"
        );
        let s = usize::from(src);
        let d = usize::from(dst);
        if s >= self.src_to_dst.len() {
            self.src_to_dst.resize(s + 1, None);
        }
        if d >= self.dst_to_src.len() {
            self.dst_to_src.resize(d + 1, None);
        }
        self.src_to_dst[s] = Some(dst);
        self.dst_to_src[d] = Some(src);
        self.pairs.push(Mapping { src, dst });
    }

    /// Whether exactly the pair `(src, dst)` is present.
    pub fn has(&self, src: NodeId, dst: NodeId) -> bool {
        self.get_dst(src) == Some(dst)
    }

    /// Partner of a source node, if any.
    pub fn get_dst(&self, src: NodeId) -> Option<NodeId> {
        self.src_to_dst.get(usize::from(src)).copied().flatten()
    }

    /// Partner of a destination node, if any.
    pub fn get_src(&self, dst: NodeId) -> Option<NodeId> {
        self.dst_to_src.get(usize::from(dst)).copied().flatten()
    }

    /// Number of pairs in the store.
    pub fn size(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the store holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// All pairs, in insertion order.
    pub fn to_list(&self) -> Vec<Mapping> {
        self.pairs.clone()
    }

    /// Iterate pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Mapping> + '_ {
        self.pairs.iter().copied()
    }
}

/// Many-to-many candidate store used while isomorphic subtrees can still
/// match several partners.
#[derive(Debug, Default)]
pub(crate) struct MultiMapping {
    srcs: RapidHashMap<NodeId, Vec<NodeId>>,
    dsts: RapidHashMap<NodeId, Vec<NodeId>>,
    // Insertion order of distinct sources, for deterministic resolution.
    src_order: Vec<NodeId>,
}

impl MultiMapping {
    pub(crate) fn new() -> Self {
        MultiMapping::default()
    }

    pub(crate) fn link(&mut self, src: NodeId, dst: NodeId) {
        let dsts = self.srcs.entry(src).or_insert_with(|| {
            self.src_order.push(src);
            Vec::new()
        });
        if !dsts.contains(&dst) {
            dsts.push(dst);
        }
        let srcs = self.dsts.entry(dst).or_default();
        if !srcs.contains(&src) {
            srcs.push(src);
        }
    }

    /// `src` has exactly one candidate, and that candidate has exactly one
    /// preimage (which must be `src`).
    pub(crate) fn is_src_unique(&self, src: NodeId) -> bool {
        match self.srcs.get(&src) {
            Some(dsts) if dsts.len() == 1 => self.dsts[&dsts[0]].len() == 1,
            _ => false,
        }
    }

    pub(crate) fn srcs(&self) -> &[NodeId] {
        &self.src_order
    }

    pub(crate) fn dsts_of(&self, src: NodeId) -> &[NodeId] {
        &self.srcs[&src]
    }

    pub(crate) fn srcs_of(&self, dst: NodeId) -> &[NodeId] {
        &self.dsts[&dst]
    }
}

/// Tuning knobs for [`compute_matching`].
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Minimum height for a subtree to take part in top-down matching.
    /// 2 is recommended so lone identifiers do not match all over the tree.
    pub min_height: usize,
    /// Size cap for the Zhang–Shasha recovery step, which is cubic.
    pub max_size: usize,
    /// Minimum ratio of common mapped descendants for a container mapping.
    pub similarity_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        MatchingConfig {
            min_height: 2,
            max_size: 100,
            similarity_threshold: 0.5,
        }
    }
}

/// Compute the node matching between two refreshed trees.
///
/// Phase 1 greedily pairs the largest isomorphic subtrees top-down; phase 2
/// pairs containers bottom-up by the ratio of already-mapped descendants and
/// recovers small residuals with Zhang–Shasha.
pub fn compute_matching(src: &Tree, dst: &Tree, config: &MatchingConfig) -> MappingStore {
    debug!(
        src_nodes = src.node_count(),
        dst_nodes = dst.node_count(),
        "compute_matching start"
    );

    let mut store = subtree_match(src, dst, config.min_height);
    debug!(matched = store.size(), "after top-down phase");

    bottom_up_match(
        src,
        dst,
        &mut store,
        config.max_size,
        config.similarity_threshold,
    );
    debug!(matched = store.size(), "after bottom-up phase");

    store
}
