//! NETCONF subtree filter normalization.
//!
//! In filter mode the structural rules turn into rewrites: duplicate
//! selection nodes collapse, a selection swallows its containment twin, and
//! matching list instances merge. A node that collapses is unlinked by the
//! caller and sibling processing continues at the next element.

use yangtree_schema::SnodeKind;

use crate::{DataTree, NodeId};

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Keep,
    /// Unlink the just-built node; an earlier instance covers it
    Collapse,
}

pub(crate) fn normalize(tree: &mut DataTree<'_>, id: NodeId) -> Outcome {
    let ctx = tree.context();
    let schema = tree.node(id).schema;
    match ctx.snode(schema).kind {
        SnodeKind::Container { .. } => normalize_container(tree, id),
        SnodeKind::Leaf { .. } => {
            // Duplicate leaves with the same interned value collapse
            let value = tree.node(id).leaf().map(|l| l.value_str);
            match prev_same_schema(tree, id) {
                Some(prev) if tree.node(prev).leaf().map(|l| l.value_str) == value => {
                    Outcome::Collapse
                }
                _ => Outcome::Keep,
            }
        }
        SnodeKind::Anyxml => {
            // Anyxml in a filter is always a selection node
            match prev_same_schema(tree, id) {
                Some(_) => Outcome::Collapse,
                None => Outcome::Keep,
            }
        }
        SnodeKind::LeafList { .. } => {
            let value = tree.node(id).leaf().map(|l| l.value_str);
            let mut cur = tree.node(id).same_prev;
            while let Some(prev) = cur {
                if tree.node(prev).leaf().map(|l| l.value_str) == value {
                    return Outcome::Collapse;
                }
                cur = tree.node(prev).same_prev;
            }
            Outcome::Keep
        }
        SnodeKind::List { .. } => {
            let mut cur = tree.node(id).same_prev;
            while let Some(prev) = cur {
                if content_match_equal(tree, prev, id) {
                    merge_lists(tree, prev, id);
                    return Outcome::Collapse;
                }
                cur = tree.node(prev).same_prev;
            }
            Outcome::Keep
        }
        _ => Outcome::Keep,
    }
}

/// A container with no children is a selection node. A duplicate pair
/// collapses to the narrower meaning: any selection wins, and two
/// containment nodes merge their contents.
fn normalize_container(tree: &mut DataTree<'_>, id: NodeId) -> Outcome {
    let Some(prev) = prev_same_schema(tree, id) else {
        return Outcome::Keep;
    };
    let prev_has_children = tree.node(prev).child.is_some();
    let new_has_children = tree.node(id).child.is_some();
    if !prev_has_children {
        // The earlier instance already selects everything
        return Outcome::Collapse;
    }
    if !new_has_children {
        // The new instance selects everything; strip the earlier one down
        // to a selection node
        while let Some(child) = tree.node(prev).child {
            tree.unlink(child);
        }
        return Outcome::Collapse;
    }
    // Two containment nodes: graft the new children into the earlier one
    let children: Vec<NodeId> = tree.children(id).collect();
    for child in children {
        tree.unlink(child);
        tree.attach(Some(prev), child);
    }
    Outcome::Collapse
}

fn prev_same_schema(tree: &DataTree<'_>, id: NodeId) -> Option<NodeId> {
    let schema = tree.node(id).schema;
    let mut sibling = tree.node(id).prev;
    while sibling != id {
        if tree.node(sibling).schema == schema {
            return Some(sibling);
        }
        sibling = tree.node(sibling).prev;
    }
    None
}

/// A list child is a content-match node when it is a leaf carrying a value
fn is_content_match(tree: &DataTree<'_>, id: NodeId) -> bool {
    let node = tree.node(id);
    matches!(
        tree.context().snode(node.schema).kind,
        SnodeKind::Leaf { .. }
    ) && node
        .leaf()
        .map(|l| !tree.context().dict().resolve(l.value_str).is_empty())
        .unwrap_or(false)
}

/// Two list instances filter the same entries when their content-match
/// nodes agree
fn content_match_equal(tree: &DataTree<'_>, a: NodeId, b: NodeId) -> bool {
    let mut b_matches: Vec<(yangtree_schema::SnodeId, yangtree_dict::Sym)> = tree
        .children(b)
        .filter(|&c| is_content_match(tree, c))
        .map(|c| {
            let node = tree.node(c);
            (node.schema, node.leaf().map(|l| l.value_str).unwrap())
        })
        .collect();
    for c in tree.children(a).filter(|&c| is_content_match(tree, c)) {
        let node = tree.node(c);
        let entry = (node.schema, node.leaf().map(|l| l.value_str).unwrap());
        match b_matches.iter().position(|&e| e == entry) {
            Some(pos) => {
                b_matches.swap_remove(pos);
            }
            None => return false,
        }
    }
    b_matches.is_empty()
}

/// Grafts the selection and containment children of `new` into `old`
///
/// When `old` has no children besides its content matches it already
/// returns whole entries, and grafting selections would narrow it; it is
/// left alone in that case.
fn merge_lists(tree: &mut DataTree<'_>, old: NodeId, new: NodeId) {
    let old_has_selection = tree
        .children(old)
        .any(|c| !is_content_match(tree, c));
    if !old_has_selection {
        return;
    }
    let graft: Vec<NodeId> = tree
        .children(new)
        .filter(|&c| !is_content_match(tree, c))
        .collect();
    for child in graft {
        tree.unlink(child);
        tree.attach(Some(old), child);
    }
}
