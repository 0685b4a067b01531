//! Typed data trees: XML instance documents parsed and validated against a
//! loaded schema [`Context`].
//!
//! [`read_data`] matches the children of an XML document's root element
//! against the top-level schema nodes of the context's modules and builds a
//! [`DataTree`] in which every node points back at its schema definition and
//! every leaf carries a decoded, type-checked value.
//!
//! ```
//! use yangtree_schema::Context;
//! use yangtree_data::{read_data, ParseOptions, Value};
//!
//! let mut ctx = Context::new();
//! ctx.load_module("
//!     module example {
//!         namespace \"urn:example\";
//!         prefix ex;
//!         leaf count { type uint8 { range \"1..10\"; } }
//!     }
//! ")?;
//!
//! let tree = read_data(
//!     &ctx,
//!     "<data><count xmlns=\"urn:example\">3</count></data>",
//!     ParseOptions::default(),
//! )?;
//! let count = tree.first_root().unwrap();
//! assert_eq!(tree.node(count).leaf().unwrap().value, Value::Uint8(3));
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Nodes live in an arena owned by the tree and refer to each other by
//! [`NodeId`]. Siblings form the ring the NETCONF data model expects: the
//! first sibling's `prev` points at the last, the last's `next` is empty.
//! List and leaf-list instances are additionally chained to the neighboring
//! instances of the same schema node, which is what keeps the duplicate
//! checks and filter merging away from quadratic scans over unrelated
//! siblings.
#![warn(missing_docs)]

use yangtree_dict::Sym;
use yangtree_schema::{Context, IdentityId, SnodeId, TypeBase};

mod error;
mod filter;
mod parse;
mod path;
mod pattern;
mod print;
mod qualify;
mod unres;
mod validate;
mod value;

pub use error::{DataError, ErrorKind};
pub use print::print_xml;

#[cfg(test)]
mod tests;

/// Option flags for [`read_data`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Unknown namespaces are fatal instead of skipped
    pub strict: bool,
    /// NETCONF `<edit-config>` semantics: `insert`/`value` attributes are
    /// honored on user-ordered lists, state data is rejected, and mandatory
    /// checks are relaxed
    pub edit: bool,
    /// NETCONF subtree filter semantics: duplicates collapse and
    /// selection/containment nodes merge instead of erroring
    pub filter: bool,
}

impl ParseOptions {
    /// Strict parsing: unknown namespaces are fatal
    pub fn strict() -> Self {
        ParseOptions {
            strict: true,
            ..Default::default()
        }
    }

    /// `<edit-config>` parsing
    pub fn edit() -> Self {
        ParseOptions {
            edit: true,
            ..Default::default()
        }
    }

    /// Subtree filter parsing
    pub fn filter() -> Self {
        ParseOptions {
            filter: true,
            ..Default::default()
        }
    }
}

/// Index of a [`DataNode`] within its [`DataTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// An attribute carried over verbatim from the source XML element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// Attribute local name
    pub name: Sym,
    /// Attribute namespace, if any
    pub ns: Option<Sym>,
    /// Attribute value
    pub value: Sym,
}

/// The decoded value of a leaf or leaf-list instance, tagged by the base
/// type the decoder settled on
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No decoded value: a filter selection leaf, or a reference still
    /// waiting for resolution
    None,
    /// `binary` content, kept verbatim
    Binary(Sym),
    /// `bits` as set-flags indexed by declaration position
    Bits(Vec<bool>),
    /// `boolean`
    Bool(bool),
    /// `decimal64`, scaled by 10^fraction-digits
    Dec64(i64),
    /// `empty`
    Empty,
    /// An `enumeration` member
    Enum {
        /// Member name
        name: Sym,
        /// Member value
        value: i32,
    },
    /// A resolved `identityref`
    Identity(IdentityId),
    /// A resolved `instance-identifier`
    Instance(NodeId),
    /// A resolved `leafref`
    Leafref(NodeId),
    /// `string`
    String(Sym),
    /// `int8`
    Int8(i8),
    /// `int16`
    Int16(i16),
    /// `int32`
    Int32(i32),
    /// `int64`
    Int64(i64),
    /// `uint8`
    Uint8(u8),
    /// `uint16`
    Uint16(u16),
    /// `uint32`
    Uint32(u32),
    /// `uint64`
    Uint64(u64),
}

/// The value slot of a leaf or leaf-list data node
#[derive(Debug, Clone, PartialEq)]
pub struct LeafValue {
    /// The raw lexical form, interned (identityref and instance-identifier
    /// values are stored in their module-qualified form)
    pub value_str: Sym,
    /// The decoded value
    pub value: Value,
    /// The effective base type: for unions, the branch that accepted the
    /// value; never `Union` itself
    pub base: TypeBase,
    /// Set for leafrefs and instance-identifiers that have not been resolved
    /// against a finished tree (edit/filter modes leave them this way)
    pub unresolved: bool,
}

/// Kind-specific parts of a data node
#[derive(Debug)]
pub enum DataKind {
    /// A container instance
    Container,
    /// A list instance
    List,
    /// A leaf instance
    Leaf(LeafValue),
    /// A leaf-list instance
    LeafList(LeafValue),
    /// An anyxml instance; outside filter mode it owns the verbatim text of
    /// its XML subtree
    Anyxml {
        /// The detached subtree text (`None` for filter selection nodes)
        xml: Option<String>,
    },
}

/// A node of a parsed data tree
#[derive(Debug)]
pub struct DataNode {
    /// The schema node this instance was matched against
    pub schema: SnodeId,
    /// Parent data node; `None` for top-level nodes
    pub parent: Option<NodeId>,
    /// First child
    pub child: Option<NodeId>,
    /// Next sibling; empty for the last sibling
    pub next: Option<NodeId>,
    /// Previous sibling; the first sibling points at the last, closing the
    /// ring
    pub prev: NodeId,
    /// Previous instance of the same schema node among the siblings
    /// (list/leaf-list only)
    pub same_prev: Option<NodeId>,
    /// Next instance of the same schema node among the siblings
    pub same_next: Option<NodeId>,
    /// Attributes carried over from the XML element
    pub attrs: Vec<Attr>,
    /// Source line of the XML element
    pub line: u32,
    /// Kind-specific parts
    pub kind: DataKind,
}

impl DataNode {
    /// The leaf value, for leaf and leaf-list nodes
    pub fn leaf(&self) -> Option<&LeafValue> {
        match &self.kind {
            DataKind::Leaf(v) | DataKind::LeafList(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn leaf_mut(&mut self) -> Option<&mut LeafValue> {
        match &mut self.kind {
            DataKind::Leaf(v) | DataKind::LeafList(v) => Some(v),
            _ => None,
        }
    }
}

/// A data tree built against (and borrowing) a schema context
#[derive(Debug)]
pub struct DataTree<'c> {
    ctx: &'c Context,
    nodes: Vec<DataNode>,
    first: Option<NodeId>,
}

impl<'c> DataTree<'c> {
    pub(crate) fn new(ctx: &'c Context) -> Self {
        DataTree {
            ctx,
            nodes: Vec::new(),
            first: None,
        }
    }

    /// The schema context this tree was parsed against
    pub fn context(&self) -> &'c Context {
        self.ctx
    }

    /// The first top-level node, if the tree is non-empty
    pub fn first_root(&self) -> Option<NodeId> {
        self.first
    }

    /// Returns a node by id
    pub fn node(&self, id: NodeId) -> &DataNode {
        &self.nodes[id.0 as usize]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut DataNode {
        &mut self.nodes[id.0 as usize]
    }

    /// Iterates the top-level sibling list
    pub fn roots(&self) -> Siblings<'_, 'c> {
        Siblings {
            tree: self,
            cur: self.first,
        }
    }

    /// Iterates the children of a node
    pub fn children(&self, id: NodeId) -> Siblings<'_, 'c> {
        Siblings {
            tree: self,
            cur: self.node(id).child,
        }
    }

    /// Finds the first child (or root, with `parent` `None`) whose schema
    /// name matches
    pub fn find_child(&self, parent: Option<NodeId>, name: &str) -> Option<NodeId> {
        let iter = match parent {
            Some(p) => self.children(p),
            None => self.roots(),
        };
        let sym = self.ctx.dict().find(name)?;
        let mut iter = iter;
        iter.find(|&c| self.ctx.snode(self.node(c).schema).name == sym)
    }

    pub(crate) fn push_node(&mut self, node: DataNode) -> NodeId {
        self.nodes.push(node);
        let id = NodeId((self.nodes.len() - 1) as u32);
        // A lone node is its own ring
        self.nodes[id.0 as usize].prev = id;
        id
    }

    fn head_of(&self, parent: Option<NodeId>) -> Option<NodeId> {
        match parent {
            Some(p) => self.node(p).child,
            None => self.first,
        }
    }

    fn set_head(&mut self, parent: Option<NodeId>, head: Option<NodeId>) {
        match parent {
            Some(p) => self.node_mut(p).child = head,
            None => self.first = head,
        }
    }

    /// Splices `id` in as the last sibling under `parent` and links it into
    /// the same-schema neighbor chain
    pub(crate) fn attach(&mut self, parent: Option<NodeId>, id: NodeId) {
        self.node_mut(id).parent = parent;
        match self.head_of(parent) {
            None => {
                self.node_mut(id).prev = id;
                self.set_head(parent, Some(id));
            }
            Some(head) => {
                let tail = self.node(head).prev;
                self.node_mut(tail).next = Some(id);
                self.node_mut(id).prev = tail;
                self.node_mut(head).prev = id;
            }
        }
        // List and leaf-list instances chain to the nearest earlier
        // instance of the same schema node
        if !matches!(
            self.node(id).kind,
            DataKind::List | DataKind::LeafList(_)
        ) {
            return;
        }
        let schema = self.node(id).schema;
        let mut cursor = self.node(id).prev;
        let mut same_prev = None;
        while cursor != id {
            if self.node(cursor).schema == schema {
                same_prev = Some(cursor);
                break;
            }
            cursor = self.node(cursor).prev;
        }
        if let Some(p) = same_prev {
            self.node_mut(p).same_next = Some(id);
            self.node_mut(id).same_prev = Some(p);
        }
    }

    /// Unlinks `id` from its parent, its sibling ring and its same-schema
    /// chain; the slot becomes unreachable and dies with the tree
    pub(crate) fn unlink(&mut self, id: NodeId) {
        let (parent, next, prev) = {
            let node = self.node(id);
            (node.parent, node.next, node.prev)
        };
        let head = self
            .head_of(parent)
            .expect("unlink of a node that is not attached");
        if head == id {
            self.set_head(parent, next);
            if let Some(n) = next {
                // The new head keeps pointing at the tail
                self.node_mut(n).prev = prev;
            }
        } else {
            self.node_mut(prev).next = next;
            match next {
                Some(n) => self.node_mut(n).prev = prev,
                // id was the tail; the head's back pointer moves
                None => self.node_mut(head).prev = prev,
            }
        }
        let (same_prev, same_next) = {
            let node = self.node(id);
            (node.same_prev, node.same_next)
        };
        if let Some(p) = same_prev {
            self.node_mut(p).same_next = same_next;
        }
        if let Some(n) = same_next {
            self.node_mut(n).same_prev = same_prev;
        }
        let node = self.node_mut(id);
        node.parent = None;
        node.next = None;
        node.prev = id;
        node.same_prev = None;
        node.same_next = None;
    }
}

/// Iterator over a sibling list in document order
pub struct Siblings<'a, 'c> {
    tree: &'a DataTree<'c>,
    cur: Option<NodeId>,
}

impl Iterator for Siblings<'_, '_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        self.cur = self.tree.node(id).next;
        Some(id)
    }
}

/// Parses an XML instance document into a typed data tree
///
/// The children of the document's root element are matched against the
/// top-level schema nodes of the context's modules. On any failure the
/// partial tree is discarded and the first error is returned, reported
/// against the XML source line it arose on. Queued leafrefs and
/// instance-identifiers are resolved against the finished tree before it is
/// returned.
pub fn read_data<'c>(
    ctx: &'c Context,
    text: &str,
    options: ParseOptions,
) -> Result<DataTree<'c>, DataError> {
    parse::parse_document(ctx, text, options)
}
