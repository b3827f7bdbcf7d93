//! Shared helpers for the integration suites: fixture trees, a reference
//! interpreter for edit scripts, and a canonical tree serializer.

#![allow(dead_code)]

use std::collections::HashMap;

use eucalypt::{Action, NodeData, NodeId, NodeRef, Tree};

/// Walk a child-index path from the root.
pub fn child(tree: &Tree, path: &[usize]) -> NodeId {
    let mut id = tree.root();
    for &i in path {
        id = tree.children(id).nth(i).unwrap();
    }
    id
}

/// Canonical serialization: `(kind[label] child…)`, pre-order.
pub fn tree_string(tree: &Tree, id: NodeId) -> String {
    let mut out = String::new();
    out.push('(');
    out.push_str(tree.kind(id));
    if !tree.label(id).is_empty() {
        out.push('[');
        out.push_str(tree.label(id));
        out.push(']');
    }
    for c in tree.children(id) {
        out.push(' ');
        out.push_str(&tree_string(tree, c));
    }
    out.push(')');
    out
}

/// Reference interpreter: apply an edit script to a clone of `src`.
///
/// Relies on arena clones preserving node handles, so `NodeRef::Src`
/// references resolve directly in the clone; nodes fabricated by inserts
/// are tracked under the destination handle of their action.
pub fn apply(src: &Tree, dst: &Tree, actions: &[Action]) -> Tree {
    let mut out = src.clone();
    let mut fabricated: HashMap<NodeId, NodeId> = HashMap::new();

    fn resolve(fabricated: &HashMap<NodeId, NodeId>, r: NodeRef) -> NodeId {
        match r {
            NodeRef::Src(id) => id,
            NodeRef::Dst(id) => fabricated[&id],
        }
    }

    for action in actions {
        match action {
            Action::Insert {
                node,
                parent,
                position,
            } => {
                let p = resolve(&fabricated, *parent);
                let n = out.new_node(NodeData::new(dst.kind(*node), dst.label(*node)));
                out.insert_child(p, *position, n);
                fabricated.insert(*node, n);
            }
            Action::InsertTree {
                node,
                parent,
                position,
            } => {
                let p = resolve(&fabricated, *parent);
                let n = copy_subtree(&mut out, dst, *node, &mut fabricated);
                out.insert_child(p, *position, n);
            }
            Action::Update { node, value } => out.set_label(*node, value.clone()),
            Action::Move {
                node,
                parent,
                position,
            } => {
                let p = resolve(&fabricated, *parent);
                out.detach(*node);
                out.insert_child(p, *position, *node);
            }
            Action::Delete { node } | Action::DeleteTree { node } => out.detach(*node),
        }
    }

    out
}

fn copy_subtree(
    out: &mut Tree,
    dst: &Tree,
    root: NodeId,
    fabricated: &mut HashMap<NodeId, NodeId>,
) -> NodeId {
    let n = out.new_node(NodeData::new(dst.kind(root), dst.label(root)));
    fabricated.insert(root, n);
    let children: Vec<NodeId> = dst.children(root).collect();
    for (i, c) in children.into_iter().enumerate() {
        let copied = copy_subtree(out, dst, c, fabricated);
        out.insert_child(n, i, copied);
    }
    n
}

/// The tree pair from the GumTree paper:
///
/// ```java
/// // src                                  // dst
/// public class Test {                     public class Test {
///   public String foo(int i) {              private String foo(int i) {
///     if (i == 0) return "Foo!";              if (i == 0) return "Bar!";
///   }                                         else if (i == -1) return "Foo!";
/// }                                         }
/// }
/// ```
pub fn paper_fixture() -> (Tree, Tree) {
    let mut src = Tree::new(NodeData::new("CompilationUnit", ""));
    let ty = src.add_child(src.root(), NodeData::new("TypeDeclaration", ""));
    src.add_child(ty, NodeData::new("Modifier", "public"));
    src.add_child(ty, NodeData::new("SimpleName", "Test"));
    let method = src.add_child(ty, NodeData::new("MethodDeclaration", ""));
    src.add_child(method, NodeData::new("Modifier", "public"));
    let sty = src.add_child(method, NodeData::new("SimpleType", "String"));
    src.add_child(sty, NodeData::new("SimpleName", "String"));
    src.add_child(method, NodeData::new("SimpleName", "foo"));
    let param = src.add_child(method, NodeData::new("SingleVariableDeclaration", ""));
    src.add_child(param, NodeData::new("PrimitiveType", "int"));
    src.add_child(param, NodeData::new("SimpleName", "i"));
    let block = src.add_child(method, NodeData::new("Block", ""));
    let if_stmt = src.add_child(block, NodeData::new("IfStatement", ""));
    let cond = src.add_child(if_stmt, NodeData::new("InfixExpression", "=="));
    src.add_child(cond, NodeData::new("SimpleName", "i"));
    src.add_child(cond, NodeData::new("NumberLiteral", "0"));
    let ret = src.add_child(if_stmt, NodeData::new("ReturnStatement", ""));
    src.add_child(ret, NodeData::new("StringLiteral", "Foo!"));
    src.refresh();

    let mut dst = Tree::new(NodeData::new("CompilationUnit", ""));
    let ty = dst.add_child(dst.root(), NodeData::new("TypeDeclaration", ""));
    dst.add_child(ty, NodeData::new("Modifier", "public"));
    dst.add_child(ty, NodeData::new("SimpleName", "Test"));
    let method = dst.add_child(ty, NodeData::new("MethodDeclaration", ""));
    dst.add_child(method, NodeData::new("Modifier", "private"));
    let sty = dst.add_child(method, NodeData::new("SimpleType", "String"));
    dst.add_child(sty, NodeData::new("SimpleName", "String"));
    dst.add_child(method, NodeData::new("SimpleName", "foo"));
    let param = dst.add_child(method, NodeData::new("SingleVariableDeclaration", ""));
    dst.add_child(param, NodeData::new("PrimitiveType", "int"));
    dst.add_child(param, NodeData::new("SimpleName", "i"));
    let block = dst.add_child(method, NodeData::new("Block", ""));
    let if_stmt = dst.add_child(block, NodeData::new("IfStatement", ""));
    let cond = dst.add_child(if_stmt, NodeData::new("InfixExpression", "=="));
    dst.add_child(cond, NodeData::new("SimpleName", "i"));
    dst.add_child(cond, NodeData::new("NumberLiteral", "0"));
    let ret = dst.add_child(if_stmt, NodeData::new("ReturnStatement", ""));
    dst.add_child(ret, NodeData::new("StringLiteral", "Bar!"));
    let else_if = dst.add_child(if_stmt, NodeData::new("IfStatement", ""));
    let cond2 = dst.add_child(else_if, NodeData::new("InfixExpression", "=="));
    dst.add_child(cond2, NodeData::new("SimpleName", "i"));
    let neg = dst.add_child(cond2, NodeData::new("PrefixExpression", "-"));
    dst.add_child(neg, NodeData::new("NumberLiteral", "1"));
    let ret2 = dst.add_child(else_if, NodeData::new("ReturnStatement", ""));
    dst.add_child(ret2, NodeData::new("StringLiteral", "Foo!"));
    dst.refresh();

    (src, dst)
}
