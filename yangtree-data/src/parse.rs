//! Builds the data tree: matches each XML element against the schema,
//! allocates the typed node, decodes leaf content and runs the validators.

use tracing::{span, Level};
use yangtree_dict::Sym;
use yangtree_schema::{Context, Snode, SnodeId, SnodeKind};

use crate::{
    filter, unres, validate, value, Attr, DataError, DataKind, DataNode, DataTree, ErrorKind,
    LeafValue, NodeId, ParseOptions,
};

/// Namespace of the `insert`/`value` ordering attributes
const NS_YANG: &str = "urn:ietf:params:xml:ns:yang:1.0";

/// NETCONF base namespace; carries the `operation` attribute in edit-config
const NS_NETCONF_BASE: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

pub(crate) fn parse_document<'c>(
    ctx: &'c Context,
    text: &str,
    options: ParseOptions,
) -> Result<DataTree<'c>, DataError> {
    let span = span!(Level::DEBUG, "read_data");
    let _span = span.enter();

    let doc = roxmltree::Document::parse(text).map_err(|e| {
        DataError::new(ErrorKind::Internal, 0, format!("malformed XML: {e}"))
    })?;
    let mut parser = Parser {
        tree: DataTree::new(ctx),
        unres: Vec::new(),
        options,
    };
    // The document root is an envelope; its children are the data
    for elem in doc.root_element().children().filter(|c| c.is_element()) {
        parser.parse_element(elem, text, None)?;
    }
    let mut tree = parser.tree;
    unres::resolve_deferred(&mut tree, &parser.unres)?;
    Ok(tree)
}

struct Parser<'c> {
    tree: DataTree<'c>,
    unres: Vec<unres::Deferred>,
    options: ParseOptions,
}

impl Parser<'_> {
    fn parse_element(
        &mut self,
        elem: roxmltree::Node<'_, '_>,
        input: &str,
        parent: Option<NodeId>,
    ) -> Result<(), DataError> {
        let ctx = self.tree.context();
        let doc = elem.document();
        let line = doc.text_pos_at(elem.range().start).row;
        let local = elem.tag_name().name();
        let Some(ns) = elem.tag_name().namespace() else {
            return Err(DataError::new(
                ErrorKind::MissingXml,
                line,
                format!("element \"{local}\" has no namespace"),
            ));
        };

        let Some(schema) = self.match_schema(parent, local, ns) else {
            if self.options.strict || ctx.module_by_ns(ns).is_some() {
                return Err(DataError::new(
                    ErrorKind::UnknownElement,
                    line,
                    format!("unknown element \"{local}\""),
                ));
            }
            // Lax mode: an element from an unknown model is skipped whole
            tracing::debug!(r#"line {line}: skipping unknown element "{local}""#);
            return Ok(());
        };
        let snode = ctx.snode(schema);

        if !ctx.snode_enabled(schema) {
            return Err(DataError::new(
                ErrorKind::UnknownElement,
                line,
                format!("element \"{local}\" is disabled by its if-feature"),
            ));
        }
        if self.options.edit && !ctx.snode_config(schema) {
            return Err(DataError::new(
                ErrorKind::UnknownElement,
                line,
                format!("state data \"{local}\" in edit-config"),
            ));
        }
        if self.options.edit {
            check_edit_attrs(elem, snode, line)?;
        }

        let mut defer = None;
        let kind = match &snode.kind {
            SnodeKind::Container { .. } => DataKind::Container,
            SnodeKind::List { .. } => DataKind::List,
            SnodeKind::Leaf { typ, .. } | SnodeKind::LeafList { typ, .. } => {
                let decoded =
                    value::decode_leaf(ctx, schema, typ, elem.text(), elem, self.options, line)?;
                let value_str = match &decoded.value_str {
                    Some(rewritten) => ctx.dict().insert(rewritten),
                    None => ctx.dict().insert(elem.text().unwrap_or("")),
                };
                defer = decoded.defer;
                let leaf = LeafValue {
                    value_str,
                    value: decoded.value,
                    base: decoded.base,
                    unresolved: decoded.unresolved,
                };
                if matches!(snode.kind, SnodeKind::Leaf { .. }) {
                    DataKind::Leaf(leaf)
                } else {
                    DataKind::LeafList(leaf)
                }
            }
            SnodeKind::Anyxml => DataKind::Anyxml {
                // Outside filter mode the node takes the subtree verbatim
                xml: if self.options.filter {
                    None
                } else {
                    Some(input[elem.range()].to_owned())
                },
            },
            _ => {
                return Err(DataError::new(
                    ErrorKind::Internal,
                    line,
                    format!("matched a non-data schema node for \"{local}\""),
                ))
            }
        };
        let has_children = matches!(kind, DataKind::Container | DataKind::List);

        let id = self.tree.push_node(DataNode {
            schema,
            parent,
            child: None,
            next: None,
            prev: NodeId(0), // fixed by push_node
            same_prev: None,
            same_next: None,
            attrs: Vec::new(),
            line,
            kind,
        });
        self.tree.attach(parent, id);
        if let Some(kind) = defer {
            self.unres.push(unres::Deferred {
                node: id,
                line,
                kind,
            });
        }

        if has_children {
            for child in elem.children().filter(|c| c.is_element()) {
                self.parse_element(child, input, Some(id))?;
            }
        }

        let attrs: Vec<Attr> = elem
            .attributes()
            .iter()
            .map(|a| Attr {
                name: ctx.dict().insert(a.name()),
                ns: a.namespace().map(|n| ctx.dict().insert(n)),
                value: ctx.dict().insert(a.value()),
            })
            .collect();
        self.tree.node_mut(id).attrs = attrs;

        if self.options.filter {
            if filter::normalize(&mut self.tree, id) == filter::Outcome::Collapse {
                tracing::trace!(r#"line {line}: filter collapsed "{local}""#);
                self.tree.unlink(id);
            }
        } else {
            validate::validate_node(&self.tree, id, self.options)?;
        }
        Ok(())
    }

    /// Finds the schema node an element instantiates: at the root, the module
    /// is located by namespace first; below, the parent's children are
    /// searched with transparent descent through choice/case/uses
    fn match_schema(&self, parent: Option<NodeId>, local: &str, ns: &str) -> Option<SnodeId> {
        let ctx = self.tree.context();
        // Unknown names cannot match: interning made matching identity-based
        let name = ctx.dict().find(local)?;
        let ns_sym = ctx.dict().find(ns)?;
        match parent {
            None => {
                let module = ctx.module_by_ns(ns)?;
                search_schema(ctx, &ctx.module(module).data, name, ns_sym)
            }
            Some(p) => {
                let pschema = self.tree.node(p).schema;
                search_schema(ctx, &ctx.snode(pschema).children, name, ns_sym)
            }
        }
    }
}

fn search_schema(ctx: &Context, children: &[SnodeId], name: Sym, ns: Sym) -> Option<SnodeId> {
    for &id in children {
        let snode = ctx.snode(id);
        match snode.kind {
            SnodeKind::Grouping => continue,
            SnodeKind::Choice { .. } | SnodeKind::Case => {
                if let Some(found) = search_schema(ctx, &snode.children, name, ns) {
                    return Some(found);
                }
            }
            SnodeKind::Uses { grouping } => {
                if let Some(g) = grouping {
                    if let Some(found) =
                        search_schema(ctx, &ctx.snode(g).children, name, ns)
                    {
                        return Some(found);
                    }
                }
            }
            _ => {
                if snode.name == name && ctx.module(snode.module).ns == ns {
                    return Some(id);
                }
            }
        }
    }
    None
}

/// Validates the `insert`/`value` attribute pair on user-ordered nodes and
/// the `operation` attribute, both only meaningful in edit-config mode
fn check_edit_attrs(
    elem: roxmltree::Node<'_, '_>,
    snode: &Snode,
    line: u32,
) -> Result<(), DataError> {
    let mut insert = None;
    for attr in elem.attributes() {
        if attr.namespace() != Some(NS_YANG) || attr.name() != "insert" {
            continue;
        }
        if !snode.user_ordered {
            return Err(DataError::new(
                ErrorKind::UnexpectedAttribute,
                line,
                "insert attribute on a node that is not user-ordered",
            ));
        }
        if insert.is_some() {
            return Err(DataError::new(
                ErrorKind::TooMany,
                line,
                "more than one insert attribute",
            ));
        }
        match attr.value() {
            "first" | "last" | "before" | "after" => insert = Some(attr.value()),
            other => {
                return Err(DataError::new(
                    ErrorKind::InvalidArgument,
                    line,
                    format!("invalid insert value \"{other}\""),
                ))
            }
        }
    }
    let needs_value = matches!(insert, Some("before" | "after"));
    let mut value_count = 0;
    for attr in elem.attributes() {
        if attr.namespace() != Some(NS_YANG) || attr.name() != "value" {
            continue;
        }
        if !needs_value {
            return Err(DataError::new(
                ErrorKind::UnexpectedAttribute,
                line,
                "value attribute without insert \"before\" or \"after\"",
            ));
        }
        value_count += 1;
        if value_count > 1 {
            return Err(DataError::new(
                ErrorKind::TooMany,
                line,
                "more than one value attribute",
            ));
        }
    }
    if needs_value && value_count == 0 {
        return Err(DataError::new(
            ErrorKind::MissingAttribute,
            line,
            "insert \"before\"/\"after\" requires a value attribute",
        ));
    }
    for attr in elem.attributes() {
        if attr.namespace() == Some(NS_NETCONF_BASE) && attr.name() == "operation" {
            match attr.value() {
                "merge" | "replace" | "create" | "delete" => {}
                other => {
                    return Err(DataError::new(
                        ErrorKind::InvalidArgument,
                        line,
                        format!("invalid operation \"{other}\""),
                    ))
                }
            }
        }
    }
    Ok(())
}
