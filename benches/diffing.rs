use divan::{Bencher, black_box};
use eucalypt::{MatchingConfig, NodeData, Tree, diff_trees, match_trees};

fn main() {
    divan::main();
}

/// Synthetic source file: `functions` functions of `stmts` statements each.
fn build_tree(functions: usize, stmts: usize, edited: bool) -> Tree {
    let mut tree = Tree::new(NodeData::new("file", ""));
    let root = tree.root();
    for f in 0..functions {
        let func = tree.add_child(root, NodeData::new("function", format!("fn_{f}")));
        let body = tree.add_child(func, NodeData::new("block", ""));
        for s in 0..stmts {
            let stmt = tree.add_child(body, NodeData::new("assign", ""));
            tree.add_child(stmt, NodeData::new("name", format!("var_{s}")));
            let value = if edited && f == functions / 2 {
                format!("edited_{s}")
            } else {
                format!("value_{s}")
            };
            tree.add_child(stmt, NodeData::new("literal", value));
        }
    }
    tree.refresh();
    tree
}

#[divan::bench]
fn match_identical(bencher: Bencher) {
    let src = build_tree(20, 10, false);
    let dst = build_tree(20, 10, false);
    let config = MatchingConfig::default();
    bencher.bench_local(|| match_trees(black_box(&src), black_box(&dst), &config));
}

#[divan::bench]
fn match_edited(bencher: Bencher) {
    let src = build_tree(20, 10, false);
    let dst = build_tree(20, 10, true);
    let config = MatchingConfig::default();
    bencher.bench_local(|| match_trees(black_box(&src), black_box(&dst), &config));
}

#[divan::bench]
fn diff_edited(bencher: Bencher) {
    let src = build_tree(20, 10, false);
    let dst = build_tree(20, 10, true);
    let config = MatchingConfig::default();
    bencher.bench_local(|| diff_trees(black_box(&src), black_box(&dst), &config));
}

#[divan::bench]
fn refresh(bencher: Bencher) {
    bencher.bench_local(|| {
        let tree = build_tree(20, 10, false);
        black_box(tree.node_count())
    });
}
