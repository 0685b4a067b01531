//! A YANG schema and data tree library.
//!
//! Yangtree loads YANG modules into an in-memory schema model and parses XML
//! instance documents against it, producing data trees in which every node
//! is typed, constrained and linked to its schema definition.
//!
//! # Loading a schema
//!
//! Modules are YANG source text loaded into a [`schema::Context`], the
//! registry that owns the schema model and the shared string dictionary:
//!
//! ```
//! use yangtree::schema::Context;
//!
//! let mut ctx = Context::new();
//! ctx.load_module(r#"
//!     module network {
//!         namespace "urn:example:network";
//!         prefix net;
//!
//!         container interfaces {
//!             list iface {
//!                 key name;
//!                 leaf name { type string; }
//!                 leaf mtu { type uint16 { range "68..9216"; } }
//!             }
//!         }
//!     }
//! "#)?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! # Parsing instance data
//!
//! [`data::read_data`] matches the children of the document's root element
//! against the loaded modules, decodes every leaf against its type, and
//! enforces the structural rules (keys, mandatory children, cardinality,
//! uniqueness, choice exclusivity):
//!
//! ```
//! use yangtree::data::{read_data, ParseOptions, Value};
//! # let mut ctx = yangtree::schema::Context::new();
//! # ctx.load_module(r#"
//! #     module network {
//! #         namespace "urn:example:network";
//! #         prefix net;
//! #         container interfaces {
//! #             list iface {
//! #                 key name;
//! #                 leaf name { type string; }
//! #                 leaf mtu { type uint16 { range "68..9216"; } }
//! #             }
//! #         }
//! #     }
//! # "#)?;
//!
//! let tree = read_data(&ctx, r#"
//!     <data>
//!       <interfaces xmlns="urn:example:network">
//!         <iface><name>eth0</name><mtu>1500</mtu></iface>
//!       </interfaces>
//!     </data>
//! "#, ParseOptions::default())?;
//!
//! let interfaces = tree.first_root().unwrap();
//! let iface = tree.children(interfaces).next().unwrap();
//! let mtu = tree.find_child(Some(iface), "mtu").unwrap();
//! assert_eq!(tree.node(mtu).leaf().unwrap().value, Value::Uint16(1500));
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! A value outside its range, a missing list key, or a second instance of a
//! single-instance node all fail the parse with an error naming the kind of
//! violation and the XML source line.
//!
//! # NETCONF modes
//!
//! Two option flags change the rules to match their NETCONF contexts:
//!
//! * [`ParseOptions::edit`][data::ParseOptions::edit] applies
//!   `<edit-config>` semantics: `insert`/`value` ordering attributes are
//!   validated on user-ordered lists, state data is rejected, and mandatory
//!   checks are relaxed.
//! * [`ParseOptions::filter`][data::ParseOptions::filter] applies subtree
//!   filter semantics: instead of erroring, duplicate selection nodes
//!   collapse and matching containment nodes merge, preserving the
//!   narrowest filter meaning.
//!
//! # Serializing
//!
//! [`data::print_xml`] writes a tree back out in the same instance
//! encoding, so a parse/print/parse round trip reproduces the tree.

pub use yangtree_data as data;
pub use yangtree_dict as dict;
pub use yangtree_schema as schema;
