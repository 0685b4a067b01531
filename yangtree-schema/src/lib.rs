//! The in-memory YANG schema model and the text parser that builds it.
//!
//! A [`Context`] is the registry of everything schema-related: loaded
//! [`Module`]s, their schema node trees, typedefs and identities, and the
//! string dictionary shared with any data trees parsed against the context.
//!
//! Loading a module from YANG source text:
//!
//! ```
//! use yangtree_schema::{Context, SnodeKind};
//!
//! let mut ctx = Context::new();
//! let module = ctx.load_module("
//!     module example {
//!         namespace \"urn:example\";
//!         prefix ex;
//!
//!         container system {
//!             leaf hostname {
//!                 type string {
//!                     length \"1..64\";
//!                 }
//!             }
//!         }
//!     }
//! ")?;
//!
//! let system = ctx.module(module).data[0];
//! assert_eq!(ctx.dict().resolve(ctx.snode(system).name), "system");
//! assert!(matches!(ctx.snode(system).kind, SnodeKind::Container { .. }));
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Schema nodes live in an arena owned by the context and refer to each other
//! by [`SnodeId`]. Parent and child links are plain indices, so the model can
//! be walked in both directions without reference cycles. The node kinds that
//! carry data (`container`, `list`, `leaf`, `leaf-list`, `anyxml`) are matched
//! against instance documents; `choice`, `case` and `uses` are transparent to
//! that matching, and `grouping` definitions are inert until referenced.
#![warn(missing_docs)]

use yangtree_dict::Sym;

mod context;
mod text;
mod types;
pub mod xpath;

pub use context::Context;
pub use text::ParseError;
pub use types::{
    anchored_pattern, BitDef, EnumDef, IntervalSet, Pattern, Restriction, Type, TypeBase,
    TypeSpec,
};

/// Index of a [`Module`] within its [`Context`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub(crate) u32);

/// Index of a [`Snode`] within its [`Context`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnodeId(pub(crate) u32);

/// Index of a [`Typedef`] within its [`Context`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypedefId(pub(crate) u32);

/// Index of an [`Identity`] within its [`Context`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityId(pub(crate) u32);

/// A loaded YANG module: a named collection of schema nodes under a globally
/// unique XML namespace
#[derive(Debug)]
pub struct Module {
    /// Module name
    pub name: Sym,
    /// The XML namespace URI bound to this module
    pub ns: Sym,
    /// The module's own prefix for its namespace
    pub prefix: Sym,
    /// `organization` statement, if given
    pub organization: Option<Sym>,
    /// `contact` statement, if given
    pub contact: Option<Sym>,
    /// `description` statement, if given
    pub description: Option<Sym>,
    /// `reference` statement, if given
    pub reference: Option<Sym>,
    /// Imported modules with the prefixes this module knows them by
    pub imports: Vec<Import>,
    /// Names of merged submodules
    pub includes: Vec<Sym>,
    /// Revision history; the newest revision is kept first
    pub revisions: Vec<Revision>,
    /// Features declared by this module (disabled until enabled on the context)
    pub features: Vec<Feature>,
    /// Identities declared by this module
    pub identities: Vec<IdentityId>,
    /// Module-level typedefs
    pub typedefs: Vec<TypedefId>,
    /// Top-level schema nodes, groupings included
    pub data: Vec<SnodeId>,
}

/// One `import` of another module
#[derive(Debug)]
pub struct Import {
    /// The imported module
    pub module: ModuleId,
    /// Prefix the importing module uses for it
    pub prefix: Sym,
    /// Requested `revision-date`, if any
    pub revision: Option<Sym>,
}

/// One entry of a module's revision history
#[derive(Debug)]
pub struct Revision {
    /// Revision date in `YYYY-MM-DD` form
    pub date: Sym,
    /// `description` statement, if given
    pub description: Option<Sym>,
    /// `reference` statement, if given
    pub reference: Option<Sym>,
}

/// A `feature` declaration
#[derive(Debug)]
pub struct Feature {
    /// Feature name
    pub name: Sym,
    /// Features this feature itself depends on
    pub if_features: Vec<FeatureRef>,
    /// Lifecycle status
    pub status: Status,
    /// `description` statement, if given
    pub description: Option<Sym>,
    /// `reference` statement, if given
    pub reference: Option<Sym>,
    pub(crate) enabled: bool,
}

/// Reference to a feature of some module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureRef {
    /// The declaring module
    pub module: ModuleId,
    /// Position in that module's feature list
    pub index: u32,
}

/// An `identity` declaration
#[derive(Debug)]
pub struct Identity {
    /// Identity name
    pub name: Sym,
    /// The declaring module
    pub module: ModuleId,
    /// The identity this one is derived from, if any
    pub base: Option<IdentityId>,
    /// Lifecycle status
    pub status: Status,
    /// `description` statement, if given
    pub description: Option<Sym>,
    /// `reference` statement, if given
    pub reference: Option<Sym>,
}

/// A module-level `typedef`: a named derived type
#[derive(Debug)]
pub struct Typedef {
    /// Typedef name
    pub name: Sym,
    /// The declaring module
    pub module: ModuleId,
    /// The derived type, linking back to further typedefs or a built-in
    pub typ: Type,
    /// `units` statement, if given
    pub units: Option<Sym>,
    /// `default` statement, if given
    pub default: Option<Sym>,
    /// Lifecycle status
    pub status: Status,
    /// `description` statement, if given
    pub description: Option<Sym>,
    /// `reference` statement, if given
    pub reference: Option<Sym>,
}

/// Lifecycle status of a schema entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// Current definition (the default)
    #[default]
    Current,
    /// Obsolescent; still valid but discouraged
    Deprecated,
    /// No longer valid
    Obsolete,
}

/// A `must` constraint: an XPath expression held for later evaluation
#[derive(Debug)]
pub struct Must {
    /// The constraint expression, prefixes rewritten to module names
    pub expr: Sym,
    /// `error-message` substatement, if given
    pub error_message: Option<Sym>,
    /// `error-app-tag` substatement, if given
    pub error_app_tag: Option<Sym>,
    /// `description` substatement, if given
    pub description: Option<Sym>,
    /// `reference` substatement, if given
    pub reference: Option<Sym>,
}

/// A node of the compiled schema tree
#[derive(Debug)]
pub struct Snode {
    /// Node name (for `uses` nodes, the name of the referenced grouping)
    pub name: Sym,
    /// Owning module
    pub module: ModuleId,
    /// Parent schema node; `None` for top-level nodes
    pub parent: Option<SnodeId>,
    /// Child schema nodes in declaration order
    pub children: Vec<SnodeId>,
    /// Explicit `config` statement; effective value inherits from the parent
    /// (see [`Context::snode_config`])
    pub config: Option<bool>,
    /// `mandatory true`
    pub mandatory: bool,
    /// `ordered-by user`
    pub user_ordered: bool,
    /// Lifecycle status
    pub status: Status,
    /// `when` condition, prefixes rewritten to module names
    pub when: Option<Sym>,
    /// `must` constraints
    pub musts: Vec<Must>,
    /// Features that must be enabled for this node to exist
    pub if_features: Vec<FeatureRef>,
    /// `description` statement, if given
    pub description: Option<Sym>,
    /// `reference` statement, if given
    pub reference: Option<Sym>,
    /// Kind-specific parts of the node
    pub kind: SnodeKind,
}

/// The kind-specific parts of a schema node
#[derive(Debug)]
pub enum SnodeKind {
    /// A `container`
    Container {
        /// `presence` statement; a presence container carries meaning by
        /// existing
        presence: Option<Sym>,
    },
    /// A `list`
    List {
        /// Key leaves, resolved to direct children
        keys: Vec<SnodeId>,
        /// `unique` constraints, each a tuple of descendant leaf paths
        unique: Vec<Vec<Sym>>,
        /// `min-elements`, if given
        min_elements: Option<u32>,
        /// `max-elements`, if given
        max_elements: Option<u32>,
    },
    /// A `leaf`
    Leaf {
        /// The leaf's type
        typ: Type,
        /// `default` statement, if given
        default: Option<Sym>,
        /// `units` statement, if given
        units: Option<Sym>,
    },
    /// A `leaf-list`
    LeafList {
        /// The leaf-list's type
        typ: Type,
        /// `min-elements`, if given
        min_elements: Option<u32>,
        /// `max-elements`, if given
        max_elements: Option<u32>,
        /// `units` statement, if given
        units: Option<Sym>,
    },
    /// An `anyxml` node; instance content is opaque
    Anyxml,
    /// A `choice` between cases
    Choice {
        /// `default` case name, if given
        default: Option<Sym>,
    },
    /// A `case` of a choice
    Case,
    /// A `grouping` definition; inert until referenced by `uses`
    Grouping,
    /// A `uses` reference to a grouping
    Uses {
        /// The referenced grouping, bound when the module finishes loading
        grouping: Option<SnodeId>,
    },
}

impl Snode {
    /// Whether instances of this node appear in data trees
    pub fn is_data(&self) -> bool {
        matches!(
            self.kind,
            SnodeKind::Container { .. }
                | SnodeKind::List { .. }
                | SnodeKind::Leaf { .. }
                | SnodeKind::LeafList { .. }
                | SnodeKind::Anyxml
        )
    }

    /// The leaf type, for leaf and leaf-list nodes
    pub fn leaf_type(&self) -> Option<&Type> {
        match &self.kind {
            SnodeKind::Leaf { typ, .. } | SnodeKind::LeafList { typ, .. } => Some(typ),
            _ => None,
        }
    }

    /// The YANG keyword this node was declared with
    pub fn keyword(&self) -> &'static str {
        match self.kind {
            SnodeKind::Container { .. } => "container",
            SnodeKind::List { .. } => "list",
            SnodeKind::Leaf { .. } => "leaf",
            SnodeKind::LeafList { .. } => "leaf-list",
            SnodeKind::Anyxml => "anyxml",
            SnodeKind::Choice { .. } => "choice",
            SnodeKind::Case => "case",
            SnodeKind::Grouping => "grouping",
            SnodeKind::Uses { .. } => "uses",
        }
    }
}

/// Measures how much of `value` is a valid YANG identifier, returning the
/// number of leading bytes that conform
///
/// An identifier starts with a letter or underscore and continues with
/// letters, digits, underscores, dots and dashes.
pub fn identifier_len(value: &str) -> usize {
    let mut chars = value.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    for (i, c) in chars {
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-') {
            return i;
        }
    }
    value.len()
}

/// Splits a `module:name` qualified identifier into its optional module part
/// and local name
pub fn split_qualified(value: &str) -> (Option<&str>, &str) {
    match value.split_once(':') {
        Some((module, name)) => (Some(module), name),
        None => (None, value),
    }
}
