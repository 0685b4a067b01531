//! Deferred resolution of leafrefs and instance-identifiers.
//!
//! While the tree is being built these references may point at nodes that do
//! not exist yet, so the parser queues them. Once the outermost call has
//! finished, the queue is drained in enqueue order against the complete
//! tree; any entry that does not resolve fails the whole parse.

use crate::{
    path::{parse_data_path, DataPath, Predicate, Step},
    DataError, DataTree, ErrorKind, NodeId, Value,
};

/// What kind of reference a queued leaf holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeferKind {
    Leafref,
    Instance,
}

/// A leaf waiting for the finished tree, with the source line to report
/// failures against
#[derive(Debug)]
pub(crate) struct Deferred {
    pub node: NodeId,
    pub line: u32,
    pub kind: DeferKind,
}

pub(crate) fn resolve_deferred(
    tree: &mut DataTree<'_>,
    items: &[Deferred],
) -> Result<(), DataError> {
    for item in items {
        match item.kind {
            DeferKind::Leafref => resolve_leafref(tree, item)?,
            DeferKind::Instance => resolve_instance(tree, item)?,
        }
    }
    Ok(())
}

fn resolve_leafref(tree: &mut DataTree<'_>, item: &Deferred) -> Result<(), DataError> {
    let ctx = tree.context();
    let node = tree.node(item.node);
    let value_str = node
        .leaf()
        .map(|l| l.value_str)
        .ok_or_else(|| internal(item.line, "queued leafref is not a leaf"))?;
    let snode = ctx.snode(node.schema);
    let path_sym = snode
        .leaf_type()
        .and_then(|ty| ctx.leafref_path(ty))
        .ok_or_else(|| internal(item.line, "queued leafref has no path"))?;
    let path = parse_data_path(ctx.dict().resolve(path_sym))
        .ok_or_else(|| internal(item.line, "leafref path does not parse"))?;
    let current_module = ctx.dict().resolve(ctx.module(snode.module).name);

    // Predicates in leafref paths are accepted but not evaluated; the
    // target must exist with an equal value
    let candidates = walk(tree, item.node, &path, false, current_module);
    let target = candidates
        .into_iter()
        .find(|&c| tree.node(c).leaf().map(|l| l.value_str) == Some(value_str));
    match target {
        Some(target) => {
            if let Some(leaf) = tree.node_mut(item.node).leaf_mut() {
                leaf.value = Value::Leafref(target);
                leaf.unresolved = false;
            }
            Ok(())
        }
        None => Err(DataError::new(
            ErrorKind::InvalidValue,
            item.line,
            format!(
                "leafref value \"{}\" does not point to an existing leaf",
                tree.context().dict().resolve(value_str)
            ),
        )),
    }
}

fn resolve_instance(tree: &mut DataTree<'_>, item: &Deferred) -> Result<(), DataError> {
    let ctx = tree.context();
    let node = tree.node(item.node);
    let value_str = node
        .leaf()
        .map(|l| l.value_str)
        .ok_or_else(|| internal(item.line, "queued instance-identifier is not a leaf"))?;
    let raw = ctx.dict().resolve(value_str);
    let invalid = || {
        DataError::new(
            ErrorKind::InvalidValue,
            item.line,
            format!("invalid instance-identifier \"{raw}\""),
        )
    };
    let path = parse_data_path(raw).ok_or_else(invalid)?;
    if !path.absolute {
        return Err(invalid());
    }
    let current_module = ctx
        .dict()
        .resolve(ctx.module(ctx.snode(node.schema).module).name);

    let matches = walk(tree, item.node, &path, true, current_module);
    match matches.as_slice() {
        [target] => {
            let target = *target;
            if let Some(leaf) = tree.node_mut(item.node).leaf_mut() {
                leaf.value = Value::Instance(target);
                leaf.unresolved = false;
            }
            Ok(())
        }
        [] => Err(DataError::new(
            ErrorKind::InvalidValue,
            item.line,
            format!("instance-identifier \"{raw}\" does not match any node"),
        )),
        _ => Err(DataError::new(
            ErrorKind::InvalidValue,
            item.line,
            format!("instance-identifier \"{raw}\" matches more than one node"),
        )),
    }
}

/// A walk context: under a node, or at the top level of the tree
#[derive(Clone, Copy, PartialEq)]
enum At {
    Top,
    Node(NodeId),
}

/// Walks a data path through the tree, returning every node the path leads
/// to in document order
fn walk(
    tree: &DataTree<'_>,
    from: NodeId,
    path: &DataPath,
    apply_predicates: bool,
    current_module: &str,
) -> Vec<NodeId> {
    let mut contexts = if path.absolute {
        vec![At::Top]
    } else {
        vec![At::Node(from)]
    };
    for step in &path.steps {
        let mut next = Vec::new();
        match step {
            Step::Up => {
                for at in contexts {
                    if let At::Node(n) = at {
                        next.push(match tree.node(n).parent {
                            Some(p) => At::Node(p),
                            None => At::Top,
                        });
                    }
                }
            }
            Step::Node(node_step) => {
                for at in contexts {
                    let children = match at {
                        At::Top => tree.roots(),
                        At::Node(n) => tree.children(n),
                    };
                    let mut matched = Vec::new();
                    for child in children {
                        if !step_matches(tree, child, node_step, current_module) {
                            continue;
                        }
                        if apply_predicates
                            && !predicates_hold(tree, child, &node_step.predicates)
                        {
                            continue;
                        }
                        matched.push(child);
                    }
                    if apply_predicates {
                        for predicate in &node_step.predicates {
                            if let Predicate::Position(pos) = predicate {
                                matched = match pos
                                    .checked_sub(1)
                                    .and_then(|i| matched.get(i as usize))
                                {
                                    Some(&m) => vec![m],
                                    None => Vec::new(),
                                };
                            }
                        }
                    }
                    next.extend(matched.into_iter().map(At::Node));
                }
            }
        }
        contexts = next;
        if contexts.is_empty() {
            break;
        }
    }
    contexts
        .into_iter()
        .filter_map(|at| match at {
            At::Node(n) => Some(n),
            At::Top => None,
        })
        .collect()
}

fn step_matches(
    tree: &DataTree<'_>,
    child: NodeId,
    step: &crate::path::NodeStep,
    current_module: &str,
) -> bool {
    let ctx = tree.context();
    let snode = ctx.snode(tree.node(child).schema);
    if ctx.dict().resolve(snode.name) != step.name {
        return false;
    }
    let module_name = ctx.dict().resolve(ctx.module(snode.module).name);
    match &step.module {
        Some(required) => required == module_name,
        None => module_name == current_module,
    }
}

fn predicates_hold(tree: &DataTree<'_>, node: NodeId, predicates: &[Predicate]) -> bool {
    let ctx = tree.context();
    predicates.iter().all(|predicate| match predicate {
        Predicate::Key { name, value, .. } => tree
            .find_child(Some(node), name)
            .and_then(|key| tree.node(key).leaf().map(|l| l.value_str))
            .map(|sym| ctx.dict().resolve(sym) == value)
            .unwrap_or(false),
        Predicate::Value(value) => tree
            .node(node)
            .leaf()
            .map(|l| ctx.dict().resolve(l.value_str) == value)
            .unwrap_or(false),
        // Applied over the matched set afterwards
        Predicate::Position(_) => true,
    })
}

fn internal(line: u32, message: &str) -> DataError {
    DataError::new(ErrorKind::Internal, line, message)
}
