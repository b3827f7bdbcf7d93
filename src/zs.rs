//! Zhang–Shasha optimal tree edit distance, used to recover mappings in the
//! residual subtrees left behind by the greedy phases.
//!
//! The algorithm works on post-order numbering. For each tree it precomputes
//! the left-most leaf descendant of every node and the keyroots (the root
//! plus every node with a left sibling), then fills a forest-distance matrix
//! per keyroot pair and extracts node pairs by tracing the optimal path
//! back.
//!
//! Costs are unit insertion/deletion; an update is only available between
//! nodes of the same kind, priced by how dissimilar their labels are
//! (see [`qgram_distance`]). A sentinel cost keeps mismatched kinds off
//! every optimal path, so the traceback never pairs them.

use std::collections::VecDeque;

use indextree::NodeId;
use rapidhash::RapidHashMap;

use crate::qgram::qgram_distance;
use crate::tree::Tree;

/// Compute the optimal edit-distance mapping between two refreshed trees.
///
/// Returns matched pairs `(src_node, dst_node)` in discovery order; every
/// pair has equal kinds. Intended for small trees — the algorithm is cubic,
/// and the bottom-up matcher gates it behind a size cap.
pub fn zs_match(src: &Tree, dst: &Tree) -> Vec<(NodeId, NodeId)> {
    ZsMatcher::new(src, dst).matching()
}

struct ZsMatcher<'a> {
    src: &'a Tree,
    dst: &'a Tree,
    zs_src: ZsTree,
    zs_dst: ZsTree,
    /// Distance between two subtrees, ignoring siblings and ancestors.
    tree_dist: Vec<Vec<f64>>,
    /// Scratch matrix: distance between two subforests, refilled per
    /// keyroot pair.
    forest_dist: Vec<Vec<f64>>,
}

impl<'a> ZsMatcher<'a> {
    fn new(src: &'a Tree, dst: &'a Tree) -> Self {
        let zs_src = ZsTree::new(src);
        let zs_dst = ZsTree::new(dst);
        let rows = zs_src.node_count + 1;
        let cols = zs_dst.node_count + 1;
        ZsMatcher {
            src,
            dst,
            zs_src,
            zs_dst,
            tree_dist: vec![vec![0.0; cols]; rows],
            forest_dist: vec![vec![0.0; cols]; rows],
        }
    }

    fn matching(mut self) -> Vec<(NodeId, NodeId)> {
        // Fill tree distances for all keyroot pairs; the last pair is
        // (root, root), whose forest matrix the first traceback reuses.
        for i in 1..self.zs_src.keyroots.len() {
            for j in 1..self.zs_dst.keyroots.len() {
                let (kr_s, kr_d) = (self.zs_src.keyroots[i], self.zs_dst.keyroots[j]);
                self.fill_forest_dist(kr_s, kr_d);
            }
        }

        let mut pairs = Vec::new();
        let mut root_pair = true;
        let mut subproblems: VecDeque<(usize, usize)> = VecDeque::new();
        subproblems.push_front((self.zs_src.node_count, self.zs_dst.node_count));

        while let Some((last_row, last_col)) = subproblems.pop_front() {
            if !root_pair {
                self.fill_forest_dist(last_row, last_col);
            }
            root_pair = false;

            let first_row = self.zs_src.lld(last_row) - 1;
            let first_col = self.zs_dst.lld(last_col) - 1;
            let mut row = last_row;
            let mut col = last_col;

            while row > first_row || col > first_col {
                if row > first_row
                    && self.forest_dist[row - 1][col] + 1.0 == self.forest_dist[row][col]
                {
                    // Node at post-order `row` is deleted from the source.
                    row -= 1;
                } else if col > first_col
                    && self.forest_dist[row][col - 1] + 1.0 == self.forest_dist[row][col]
                {
                    // Node at post-order `col` is inserted into the
                    // destination.
                    col -= 1;
                } else if self.zs_src.lld(row) == self.zs_src.lld(last_row)
                    && self.zs_dst.lld(col) == self.zs_dst.lld(last_col)
                {
                    // Both prefixes are whole trees: the nodes pair up.
                    let s = self.zs_src.node(row);
                    let d = self.zs_dst.node(col);
                    debug_assert_eq!(
                        self.src.kind(s),
                        self.dst.kind(d),
                        "optimal path paired incompatible kinds"
                    );
                    if self.src.kind(s) == self.dst.kind(d) {
                        pairs.push((s, d));
                    }
                    row -= 1;
                    col -= 1;
                } else {
                    // Descend into the subtree pair, then continue with the
                    // forest to its left.
                    subproblems.push_front((row, col));
                    row = self.zs_src.lld(row) - 1;
                    col = self.zs_dst.lld(col) - 1;
                }
            }
        }

        pairs
    }

    fn fill_forest_dist(&mut self, i: usize, j: usize) {
        let lld_i = self.zs_src.lld(i);
        let lld_j = self.zs_dst.lld(j);

        self.forest_dist[lld_i - 1][lld_j - 1] = 0.0;
        for di in lld_i..=i {
            let cost_del = 1.0;
            self.forest_dist[di][lld_j - 1] = self.forest_dist[di - 1][lld_j - 1] + cost_del;
            for dj in lld_j..=j {
                let cost_ins = 1.0;
                self.forest_dist[lld_i - 1][dj] = self.forest_dist[lld_i - 1][dj - 1] + cost_ins;

                if self.zs_src.lld(di) == lld_i && self.zs_dst.lld(dj) == lld_j {
                    let cost_upd = self.update_cost(self.zs_src.node(di), self.zs_dst.node(dj));
                    let dist = (self.forest_dist[di - 1][dj] + cost_del)
                        .min(self.forest_dist[di][dj - 1] + cost_ins)
                        .min(self.forest_dist[di - 1][dj - 1] + cost_upd);
                    self.forest_dist[di][dj] = dist;
                    self.tree_dist[di][dj] = dist;
                } else {
                    self.forest_dist[di][dj] = (self.forest_dist[di - 1][dj] + cost_del)
                        .min(self.forest_dist[di][dj - 1] + cost_ins)
                        .min(
                            self.forest_dist[self.zs_src.lld(di) - 1][self.zs_dst.lld(dj) - 1]
                                + self.tree_dist[di][dj],
                        );
                }
            }
        }
    }

    /// Renaming is only possible between equal kinds; the label distance
    /// prices it. Mismatched kinds get a cost no optimal path can afford.
    fn update_cost(&self, s: NodeId, d: NodeId) -> f64 {
        if self.src.kind(s) != self.dst.kind(d) {
            return f64::MAX;
        }
        let ls = self.src.label(s);
        let ld = self.dst.label(d);
        if ls.is_empty() || ld.is_empty() {
            1.0
        } else {
            1.0 - qgram_distance(ls, ld)
        }
    }
}

/// Post-order view of a tree with the precomputed data Zhang–Shasha needs.
/// Indices are 1-based, matching the classic formulation.
struct ZsTree {
    node_count: usize,
    /// `llds[i]` is the 0-based post-order id of the left-most leaf
    /// descendant of the node with 0-based post-order id `i`.
    llds: Vec<usize>,
    nodes: Vec<NodeId>,
    /// Root plus every node with a left sibling; index 0 is unused.
    keyroots: Vec<usize>,
}

impl ZsTree {
    fn new(tree: &Tree) -> Self {
        let order: Vec<NodeId> = tree.post_order(tree.root()).collect();
        let node_count = order.len();

        let mut post_ids: RapidHashMap<NodeId, usize> = RapidHashMap::default();
        let mut llds = vec![0; node_count];
        let mut nodes = vec![order[0]; node_count];
        let mut leaf_count = 0;
        for (i, &n) in order.iter().enumerate() {
            post_ids.insert(n, i);
            nodes[i] = n;
            llds[i] = post_ids[&first_leaf(tree, n)];
            if tree.is_leaf(n) {
                leaf_count += 1;
            }
        }

        let mut zt = ZsTree {
            node_count,
            llds,
            nodes,
            keyroots: vec![0; leaf_count + 1],
        };

        // Walking post-order ids from the top, the first node seen for each
        // left-most leaf is a keyroot.
        let mut visited = vec![false; node_count + 1];
        let mut k = zt.keyroots.len() - 1;
        for i in (1..=node_count).rev() {
            if !visited[zt.lld(i)] {
                zt.keyroots[k] = i;
                visited[zt.lld(i)] = true;
                k -= 1;
            }
        }

        zt
    }

    /// 1-based post-order id of the left-most leaf descendant of node `i`.
    fn lld(&self, i: usize) -> usize {
        self.llds[i - 1] + 1
    }

    /// Node with 1-based post-order id `i`.
    fn node(&self, i: usize) -> NodeId {
        self.nodes[i - 1]
    }
}

fn first_leaf(tree: &Tree, mut id: NodeId) -> NodeId {
    while let Some(child) = tree.children(id).next() {
        id = child;
    }
    id
}
