//! # eucalypt
//!
//! Structural diffing of labeled ordered trees, the habitat of choice for
//! abstract syntax trees.
//!
//! Given a source and a destination tree, eucalypt computes a **mapping** —
//! a partial bijection saying which nodes are "the same" — and an **edit
//! script** — an ordered list of insert/update/move/delete operations (plus
//! their whole-subtree variants) that turns the source into the destination.
//!
//! The matcher is the GumTree algorithm (Falleri et al., 2014):
//!
//! 1. **Top-down**: greedily match the largest isomorphic subtrees, found by
//!    comparing structural hashes height by height.
//! 2. **Bottom-up**: match container nodes whose descendants already agree,
//!    then recover fine-grained pairs in the leftover fragments with the
//!    optimal Zhang–Shasha tree edit distance.
//!
//! Scripts come from the classic Chawathe change-detection algorithm, with a
//! final pass that collapses whole-subtree inserts and deletes.
//!
//! ## Example
//!
//! ```
//! use eucalypt::{MatchingConfig, NodeData, Tree, diff_trees};
//!
//! let mut src = Tree::new(NodeData::new("file", ""));
//! let root = src.root();
//! src.add_child(root, NodeData::new("word", "hello"));
//! src.refresh();
//!
//! let mut dst = Tree::new(NodeData::new("file", ""));
//! let root = dst.root();
//! dst.add_child(root, NodeData::new("word", "world"));
//! dst.refresh();
//!
//! let actions = diff_trees(&src, &dst, &MatchingConfig::default());
//! assert_eq!(actions.len(), 1); // a single label update
//! ```
//!
//! Trees are read-only during matching; the script generator works on a
//! private clone, so the inputs come back untouched.

#![warn(missing_docs)]

mod tracing_macros;

mod bottom_up;
mod chawathe;
mod comparator;
mod matching;
mod priority;
mod qgram;
mod simplify;
mod top_down;
mod tree;
mod zs;

pub use chawathe::{Action, ActionKind, ActionRecord, NodeRef, generate_actions};
pub use indextree::NodeId;
pub use matching::{Mapping, MappingStore, MatchingConfig, compute_matching};
pub use qgram::qgram_distance;
pub use simplify::simplify_actions;
pub use top_down::subtree_match;
pub use bottom_up::bottom_up_match;
pub use tree::{BreadthFirst, NodeData, NodeHash, Tree};
pub use zs::zs_match;

/// Compute the node mapping between two refreshed trees.
///
/// Convenience wrapper around [`compute_matching`] returning the pairs as a
/// list, in the order they were discovered.
pub fn match_trees(src: &Tree, dst: &Tree, config: &MatchingConfig) -> Vec<Mapping> {
    compute_matching(src, dst, config).to_list()
}

/// Produce the simplified edit script turning `src` into `dst` under the
/// given mapping.
///
/// Equivalent to [`generate_actions`] followed by [`simplify_actions`].
///
/// # Panics
///
/// Panics on caller bugs — mappings whose handles do not belong to the given
/// trees, or a hand-built mapping that leaves the destination root unmapped.
pub fn patch(src: &Tree, dst: &Tree, mappings: &[Mapping]) -> Vec<Action> {
    let actions = generate_actions(src, dst, mappings);
    simplify_actions(actions, src, dst)
}

/// Match two trees and generate the edit script in one call.
pub fn diff_trees(src: &Tree, dst: &Tree, config: &MatchingConfig) -> Vec<Action> {
    let mappings = match_trees(src, dst, config);
    patch(src, dst, &mappings)
}
