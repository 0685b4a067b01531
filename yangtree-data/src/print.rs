//! Serializes a data tree back to XML.
//!
//! The output is the instance encoding [`crate::read_data`] accepts: each
//! top-level element declares its module's namespace, children inherit it
//! until the module changes, and leaves print their stored lexical form.
//! Module names referenced by identityref and instance-identifier values are
//! declared as prefixes of the same name, which keeps the stored
//! module-qualified form valid as written.

use yangtree_schema::{ModuleId, TypeBase};

use crate::{DataKind, DataTree, NodeId};

/// Prints the tree's top-level elements, concatenated; wrap them in an
/// envelope element to feed them back to [`crate::read_data`]
pub fn print_xml(tree: &DataTree<'_>) -> String {
    let mut out = String::new();
    for root in tree.roots() {
        print_node(tree, root, None, &mut out);
    }
    out
}

fn print_node(tree: &DataTree<'_>, id: NodeId, parent: Option<ModuleId>, out: &mut String) {
    let ctx = tree.context();
    let node = tree.node(id);
    let snode = ctx.snode(node.schema);
    let name = ctx.dict().resolve(snode.name);

    if let DataKind::Anyxml { xml: Some(xml) } = &node.kind {
        // The detached subtree carries its own markup; re-tag it so the
        // namespace declaration survives
        out.push('<');
        out.push_str(name);
        push_ns_default(ctx, snode.module, out);
        match inner_of(xml) {
            Some(inner) if !inner.is_empty() => {
                out.push('>');
                out.push_str(inner);
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            _ => out.push_str("/>"),
        }
        return;
    }

    out.push('<');
    out.push_str(name);
    if parent != Some(snode.module) {
        push_ns_default(ctx, snode.module, out);
    }

    // Values holding module-qualified names need those modules bound as
    // prefixes on this element
    if let Some(leaf) = node.leaf() {
        if matches!(leaf.base, TypeBase::Identityref | TypeBase::InstanceId) {
            let value = ctx.dict().resolve(leaf.value_str);
            for module_name in qualified_names(value) {
                if let Some(module) = ctx.module_by_name(module_name) {
                    out.push_str(" xmlns:");
                    out.push_str(module_name);
                    out.push_str("=\"");
                    push_escaped(ctx.dict().resolve(ctx.module(module).ns), true, out);
                    out.push('"');
                }
            }
        }
    }

    match &node.kind {
        DataKind::Container | DataKind::List => {
            if node.child.is_none() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in tree.children(id) {
                print_node(tree, child, Some(snode.module), out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        DataKind::Leaf(leaf) | DataKind::LeafList(leaf) => {
            let value = ctx.dict().resolve(leaf.value_str);
            if value.is_empty() {
                out.push_str("/>");
            } else {
                out.push('>');
                push_escaped(value, false, out);
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
        DataKind::Anyxml { xml: None } => out.push_str("/>"),
        DataKind::Anyxml { .. } => unreachable!("handled above"),
    }
}

fn push_ns_default(
    ctx: &yangtree_schema::Context,
    module: ModuleId,
    out: &mut String,
) {
    out.push_str(" xmlns=\"");
    push_escaped(ctx.dict().resolve(ctx.module(module).ns), true, out);
    out.push('"');
}

/// The content between an element's open and close tags
fn inner_of(xml: &str) -> Option<&str> {
    let open_end = xml.find('>')?;
    if xml[..open_end].ends_with('/') {
        return Some("");
    }
    let close_start = xml.rfind("</")?;
    if close_start <= open_end {
        return None;
    }
    Some(&xml[open_end + 1..close_start])
}

/// Module names used as prefixes inside a module-qualified value
fn qualified_names(value: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = value;
    while let Some(col) = rest.find(':') {
        let before = &rest[..col];
        let start = before.rfind(['/', ' ', '[']).map(|i| i + 1).unwrap_or(0);
        let name = &before[start..];
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
        rest = &rest[col + 1..];
    }
    names
}

fn push_escaped(value: &str, attribute: bool, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
