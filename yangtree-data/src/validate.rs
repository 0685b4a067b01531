//! Structural validation of a just-built subtree: keys, mandatory children,
//! cardinality, uniqueness and choice exclusivity.

use yangtree_dict::Sym;
use yangtree_schema::{Context, SnodeId, SnodeKind};

use crate::{DataError, DataTree, ErrorKind, NodeId, ParseOptions};

pub(crate) fn validate_node(
    tree: &DataTree<'_>,
    id: NodeId,
    options: ParseOptions,
) -> Result<(), DataError> {
    let ctx = tree.context();
    let node = tree.node(id);
    let snode = ctx.snode(node.schema);
    let line = node.line;
    let name = ctx.dict().resolve(snode.name);

    // Presence of all declared keys
    if let SnodeKind::List { keys, .. } = &snode.kind {
        for &key in keys {
            if !tree.children(id).any(|c| tree.node(c).schema == key) {
                return Err(DataError::new(
                    ErrorKind::MissingElement,
                    line,
                    format!(
                        "missing key \"{}\" in list \"{name}\"",
                        ctx.dict().resolve(ctx.snode(key).name)
                    ),
                ));
            }
        }
    }

    // Mandatory children and element counts; relaxed for edit-config
    if matches!(
        snode.kind,
        SnodeKind::Container { .. } | SnodeKind::List { .. }
    ) && !options.edit
    {
        check_mandatory(tree, id, &snode.children)?;
    }

    // Only one instance per parent for non-list nodes
    if matches!(
        snode.kind,
        SnodeKind::Container { .. } | SnodeKind::Leaf { .. } | SnodeKind::Anyxml
    ) {
        let mut sibling = node.prev;
        while sibling != id {
            if tree.node(sibling).schema == node.schema {
                return Err(DataError::new(
                    ErrorKind::TooMany,
                    line,
                    format!("too many instances of \"{name}\""),
                ));
            }
            sibling = tree.node(sibling).prev;
        }
    }

    // Uniqueness among instances of the same schema node
    if matches!(snode.kind, SnodeKind::LeafList { .. }) {
        let value = node.leaf().map(|l| l.value_str);
        let mut cur = node.same_prev;
        while let Some(prev) = cur {
            if tree.node(prev).leaf().map(|l| l.value_str) == value {
                return Err(DataError::new(
                    ErrorKind::DuplicateLeafList,
                    line,
                    format!("duplicate value in leaf-list \"{name}\""),
                ));
            }
            cur = tree.node(prev).same_prev;
        }
    }
    if let SnodeKind::List { keys, unique, .. } = &snode.kind {
        let mut cur = node.same_prev;
        while let Some(prev) = cur {
            if keys_equal(tree, prev, id, keys) || unique_violated(tree, prev, id, unique) {
                return Err(DataError::new(
                    ErrorKind::DuplicateList,
                    line,
                    format!("duplicate instance of list \"{name}\""),
                ));
            }
            cur = tree.node(prev).same_prev;
        }
    }

    check_choice(tree, id)?;
    Ok(())
}

/// Mandatory descendants and min/max element counts under a freshly built
/// container or list: direct leaves and anyxml, element counts, absent
/// non-presence containers that transitively require something, and the
/// members of whichever choice case was selected
fn check_mandatory(
    tree: &DataTree<'_>,
    parent: NodeId,
    children: &[SnodeId],
) -> Result<(), DataError> {
    let ctx = tree.context();
    let line = tree.node(parent).line;
    for &cid in children {
        if !ctx.snode_enabled(cid) {
            continue;
        }
        let cs = ctx.snode(cid);
        let cname = ctx.dict().resolve(cs.name);
        match &cs.kind {
            SnodeKind::Leaf { .. } | SnodeKind::Anyxml => {
                if cs.mandatory && !has_instance(tree, parent, cid) {
                    return Err(DataError::new(
                        ErrorKind::MissingElement,
                        line,
                        format!("missing mandatory \"{cname}\""),
                    ));
                }
            }
            SnodeKind::Container { presence } => {
                match tree
                    .children(parent)
                    .find(|&c| tree.node(c).schema == cid)
                {
                    Some(instance) => check_mandatory(tree, instance, &cs.children)?,
                    // An absent presence container legitimately omits its
                    // whole subtree; an absent plain container does not
                    None if presence.is_none() => {
                        if let Some(missing) = mandatory_descendant(ctx, &cs.children) {
                            return Err(DataError::new(
                                ErrorKind::MissingElement,
                                line,
                                format!(
                                    "missing mandatory \"{}\" in absent \"{cname}\"",
                                    ctx.dict().resolve(ctx.snode(missing).name)
                                ),
                            ));
                        }
                    }
                    None => {}
                }
            }
            SnodeKind::List {
                min_elements,
                max_elements,
                ..
            }
            | SnodeKind::LeafList {
                min_elements,
                max_elements,
                ..
            } => {
                let count = tree
                    .children(parent)
                    .filter(|&c| tree.node(c).schema == cid)
                    .count() as u32;
                if let Some(min) = min_elements {
                    if count < *min {
                        return Err(DataError::new(
                            ErrorKind::MissingElement,
                            line,
                            format!(
                                "number of \"{cname}\" instances does not follow min-elements"
                            ),
                        ));
                    }
                }
                if let Some(max) = max_elements {
                    if count > *max {
                        return Err(DataError::new(
                            ErrorKind::TooMany,
                            line,
                            format!(
                                "number of \"{cname}\" instances does not follow max-elements"
                            ),
                        ));
                    }
                }
            }
            SnodeKind::Choice { .. } => {
                // selected_case walks straight through nested choice
                // layers; same limitation as noted in check_choice
                match selected_case(tree, parent, cid) {
                    Some(case) => {
                        let case_node = ctx.snode(case);
                        // A shorthand member is its own single-node case
                        if matches!(case_node.kind, SnodeKind::Case) {
                            check_mandatory(tree, parent, &case_node.children)?;
                        }
                    }
                    None => {
                        if cs.mandatory {
                            return Err(DataError::new(
                                ErrorKind::MissingElement,
                                line,
                                format!("missing mandatory choice \"{cname}\""),
                            ));
                        }
                    }
                }
            }
            SnodeKind::Uses { grouping } => {
                if let Some(g) = grouping {
                    check_mandatory(tree, parent, &ctx.snode(*g).children)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn has_instance(tree: &DataTree<'_>, parent: NodeId, schema: SnodeId) -> bool {
    tree.children(parent).any(|c| tree.node(c).schema == schema)
}

/// The first node under `children` that some instance would have to carry:
/// a mandatory leaf/anyxml/choice, a list with a minimum, or anything such
/// reached through a non-presence container or a grouping
fn mandatory_descendant(ctx: &Context, children: &[SnodeId]) -> Option<SnodeId> {
    for &cid in children {
        if !ctx.snode_enabled(cid) {
            continue;
        }
        let cs = ctx.snode(cid);
        match &cs.kind {
            SnodeKind::Leaf { .. } | SnodeKind::Anyxml | SnodeKind::Choice { .. } => {
                if cs.mandatory {
                    return Some(cid);
                }
            }
            SnodeKind::List { min_elements, .. } | SnodeKind::LeafList { min_elements, .. } => {
                if min_elements.map_or(false, |min| min > 0) {
                    return Some(cid);
                }
            }
            SnodeKind::Container { presence } => {
                if presence.is_none() {
                    if let Some(found) = mandatory_descendant(ctx, &cs.children) {
                        return Some(found);
                    }
                }
            }
            SnodeKind::Uses { grouping } => {
                if let Some(g) = grouping {
                    if let Some(found) = mandatory_descendant(ctx, &ctx.snode(*g).children) {
                        return Some(found);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// The case of `choice` some data child under `parent` was instantiated
/// from: a proper case node, or the shorthand member itself
///
/// The upward walk passes through nested choice layers without
/// distinguishing them, matching the limitation warned about in
/// `check_choice`.
fn selected_case(tree: &DataTree<'_>, parent: NodeId, choice: SnodeId) -> Option<SnodeId> {
    let ctx = tree.context();
    for c in tree.children(parent) {
        let mut cur = tree.node(c).schema;
        loop {
            let Some(p) = ctx.snode(cur).parent else {
                break;
            };
            if p == choice {
                return Some(cur);
            }
            cur = p;
        }
    }
    None
}

fn keys_equal(tree: &DataTree<'_>, a: NodeId, b: NodeId, keys: &[SnodeId]) -> bool {
    if keys.is_empty() {
        return false;
    }
    keys.iter().all(|&key| {
        let va = child_leaf_value(tree, a, key);
        let vb = child_leaf_value(tree, b, key);
        match (va, vb) {
            (Some(va), Some(vb)) => va == vb,
            _ => false,
        }
    })
}

/// A `unique` tuple is violated when both instances hold all of its leaves
/// with pairwise equal values
fn unique_violated(tree: &DataTree<'_>, a: NodeId, b: NodeId, unique: &[Vec<Sym>]) -> bool {
    let ctx = tree.context();
    unique.iter().any(|tuple| {
        tuple.iter().all(|&path| {
            let path = ctx.dict().resolve(path);
            let va = leaf_value_at(tree, a, path);
            let vb = leaf_value_at(tree, b, path);
            match (va, vb) {
                (Some(va), Some(vb)) => va == vb,
                _ => false,
            }
        })
    })
}

fn child_leaf_value(
    tree: &DataTree<'_>,
    parent: NodeId,
    schema: SnodeId,
) -> Option<Sym> {
    tree.children(parent)
        .find(|&c| tree.node(c).schema == schema)
        .and_then(|c| tree.node(c).leaf().map(|l| l.value_str))
}

/// Resolves a slash-separated descendant leaf path by schema names
fn leaf_value_at(
    tree: &DataTree<'_>,
    from: NodeId,
    path: &str,
) -> Option<Sym> {
    let mut cur = from;
    for step in path.split('/').filter(|s| !s.is_empty()) {
        cur = tree.find_child(Some(cur), step)?;
    }
    tree.node(cur).leaf().map(|l| l.value_str)
}

/// No two data siblings may come from distinct cases of one choice
fn check_choice(tree: &DataTree<'_>, id: NodeId) -> Result<(), DataError> {
    let ctx = tree.context();
    let node = tree.node(id);
    let snode = ctx.snode(node.schema);
    let Some(parent_schema) = snode.parent else {
        return Ok(());
    };
    // (case, enclosing choice) for this node; direct children of a choice
    // form their own shorthand case
    let (my_case, choice) = match ctx.snode(parent_schema).kind {
        SnodeKind::Choice { .. } => (node.schema, parent_schema),
        SnodeKind::Case => (
            parent_schema,
            match ctx.snode(parent_schema).parent {
                Some(ch) => ch,
                None => return Ok(()),
            },
        ),
        _ => return Ok(()),
    };
    if let Some(above) = ctx.snode(choice).parent {
        if matches!(ctx.snode(above).kind, SnodeKind::Case) {
            tracing::warn!("not checking parent branches of nested choice");
        }
    }
    let mut sibling = node.prev;
    while sibling != id {
        let other_schema = tree.node(sibling).schema;
        if let Some(op) = ctx.snode(other_schema).parent {
            let other = match ctx.snode(op).kind {
                SnodeKind::Choice { .. } => Some((other_schema, op)),
                SnodeKind::Case => ctx.snode(op).parent.map(|ch| (op, ch)),
                _ => None,
            };
            if let Some((other_case, other_choice)) = other {
                if other_choice == choice && other_case != my_case {
                    return Err(DataError::new(
                        ErrorKind::MultipleCases,
                        node.line,
                        format!(
                            "data for more than one case of choice \"{}\"",
                            ctx.dict().resolve(ctx.snode(choice).name)
                        ),
                    ));
                }
            }
        }
        sibling = tree.node(sibling).prev;
    }
    Ok(())
}
