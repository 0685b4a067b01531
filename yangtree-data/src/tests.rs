use yangtree_schema::Context;

use crate::{DataTree, NodeId, Value};

mod building;
mod editing;
mod filtering;
mod values;

/// Loads a single module into a fresh context
fn context_with(source: &str) -> Context {
    let mut ctx = Context::new();
    ctx.load_module(source).unwrap_or_else(|e| panic!("{e:#}"));
    ctx
}

/// The decoded value of a top-level leaf
fn leaf_value(tree: &DataTree<'_>, name: &str) -> Value {
    let id = tree
        .find_child(None, name)
        .unwrap_or_else(|| panic!("no top-level \"{name}\""));
    tree.node(id).leaf().expect("not a leaf").value.clone()
}

/// Names of the children of a node (or of the roots), in document order
fn names_under(tree: &DataTree<'_>, parent: Option<NodeId>) -> Vec<String> {
    let ctx = tree.context();
    let iter = match parent {
        Some(p) => tree.children(p),
        None => tree.roots(),
    };
    iter.map(|c| {
        ctx.dict()
            .resolve(ctx.snode(tree.node(c).schema).name)
            .to_owned()
    })
    .collect()
}
