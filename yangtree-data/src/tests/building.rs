use indoc::indoc;

use super::{context_with, names_under};
use crate::{read_data, DataKind, ErrorKind, ParseOptions, Value};

const MODULE: &str = indoc! {"
    module net {
        namespace 'urn:net';
        prefix n;

        container interfaces {
            list iface {
                key name;
                leaf name { type string; }
                leaf mtu { type uint16; }
                leaf-list port { type uint16; }
            }
        }
        leaf gateway { type string; }
        choice speed {
            case fixed { leaf rate { type uint32; } }
            case negotiated { leaf auto { type empty; } }
        }
        container box { leaf req { type string; mandatory true; } }
        anyxml blob;

        identity proto;
        identity tcp { base proto; }
        leaf protocol { type identityref { base proto; } }
        leaf primary { type leafref { path '/n:interfaces/n:iface/n:name'; } }
        leaf target { type instance-identifier; }

        container outer {
            container inner { leaf deep { type string; mandatory true; } }
        }
        container wrap {
            container opt {
                presence 'enabled';
                leaf p { type string; mandatory true; }
            }
        }
        container pair {
            choice duo {
                case both {
                    leaf first { type string; mandatory true; }
                    leaf second { type string; mandatory true; }
                }
                case other { leaf lone { type empty; } }
            }
        }
    }
"};

#[test]
fn builds_a_nested_tree() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        indoc! {r#"
            <data>
              <interfaces xmlns="urn:net">
                <iface><name>eth0</name><mtu>1500</mtu></iface>
                <iface><name>eth1</name></iface>
              </interfaces>
              <gateway xmlns="urn:net">eth0</gateway>
            </data>
        "#},
        ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(names_under(&tree, None), ["interfaces", "gateway"]);
    let interfaces = tree.find_child(None, "interfaces").unwrap();
    assert_eq!(names_under(&tree, Some(interfaces)), ["iface", "iface"]);
    let first = tree.children(interfaces).next().unwrap();
    let name = tree.find_child(Some(first), "name").unwrap();
    let leaf = tree.node(name).leaf().unwrap();
    assert_eq!(ctx.dict().resolve(leaf.value_str), "eth0");
}

#[test]
fn sibling_ring_is_closed() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        indoc! {r#"
            <data>
              <interfaces xmlns="urn:net">
                <iface><name>a</name></iface>
                <iface><name>b</name></iface>
                <iface><name>c</name></iface>
              </interfaces>
            </data>
        "#},
        ParseOptions::default(),
    )
    .unwrap();
    let interfaces = tree.first_root().unwrap();
    let children: Vec<_> = tree.children(interfaces).collect();
    let (head, tail) = (children[0], children[2]);
    // Head's prev is the tail, tail's next is empty
    assert_eq!(tree.node(head).prev, tail);
    assert_eq!(tree.node(tail).next, None);
    assert_eq!(tree.node(children[1]).prev, head);

    // Same-schema chain runs through all three instances in order
    assert_eq!(tree.node(head).same_next, Some(children[1]));
    assert_eq!(tree.node(children[1]).same_next, Some(tail));
    assert_eq!(tree.node(tail).same_prev, Some(children[1]));
    assert_eq!(tree.node(head).same_prev, None);
}

#[test]
fn element_needs_a_namespace() {
    let ctx = context_with(MODULE);
    let err = read_data(&ctx, "<data><gateway>x</gateway></data>", ParseOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingXml);
}

#[test]
fn unknown_element_in_known_namespace_is_fatal() {
    let ctx = context_with(MODULE);
    let err = read_data(
        &ctx,
        "<data><nonsense xmlns=\"urn:net\">x</nonsense></data>",
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownElement);
}

#[test]
fn unknown_namespace_skips_or_fails_by_strictness() {
    let ctx = context_with(MODULE);
    let xml = indoc! {r#"
        <data>
          <mystery xmlns="urn:other"><inner/></mystery>
          <gateway xmlns="urn:net">x</gateway>
        </data>
    "#};
    // Lax: the whole foreign subtree is skipped
    let tree = read_data(&ctx, xml, ParseOptions::default()).unwrap();
    assert_eq!(names_under(&tree, None), ["gateway"]);
    // Strict: it is fatal
    let err = read_data(&ctx, xml, ParseOptions::strict()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownElement);
}

#[test]
fn single_instance_nodes_refuse_duplicates() {
    let ctx = context_with(MODULE);
    let err = read_data(
        &ctx,
        indoc! {r#"
            <data>
              <gateway xmlns="urn:net">a</gateway>
              <gateway xmlns="urn:net">b</gateway>
            </data>
        "#},
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TooMany);
}

#[test]
fn list_keys_must_be_present() {
    let ctx = context_with(MODULE);
    let err = read_data(
        &ctx,
        indoc! {r#"
            <data>
              <interfaces xmlns="urn:net">
                <iface><mtu>1500</mtu></iface>
              </interfaces>
            </data>
        "#},
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingElement);
}

#[test]
fn duplicate_list_keys_are_rejected() {
    let ctx = context_with(MODULE);
    let err = read_data(
        &ctx,
        indoc! {r#"
            <data>
              <interfaces xmlns="urn:net">
                <iface><name>eth0</name></iface>
                <iface><name>eth0</name></iface>
              </interfaces>
            </data>
        "#},
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateList);
}

#[test]
fn duplicate_leaf_list_values_are_rejected() {
    let ctx = context_with(MODULE);
    let err = read_data(
        &ctx,
        indoc! {r#"
            <data>
              <interfaces xmlns="urn:net">
                <iface>
                  <name>eth0</name>
                  <port>80</port>
                  <port>80</port>
                </iface>
              </interfaces>
            </data>
        "#},
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateLeafList);
}

#[test]
fn choice_cases_are_exclusive() {
    let ctx = context_with(MODULE);
    let err = read_data(
        &ctx,
        indoc! {r#"
            <data>
              <rate xmlns="urn:net">100</rate>
              <auto xmlns="urn:net"/>
            </data>
        "#},
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MultipleCases);
}

#[test]
fn one_case_alone_is_fine() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        "<data><rate xmlns=\"urn:net\">100</rate></data>",
        ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(names_under(&tree, None), ["rate"]);
}

#[test]
fn mandatory_children_are_enforced() {
    let ctx = context_with(MODULE);
    let err = read_data(
        &ctx,
        "<data><box xmlns=\"urn:net\"/></data>",
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingElement);
}

#[test]
fn mandatory_descendants_reach_through_absent_containers() {
    let ctx = context_with(MODULE);
    // "deep" is mandatory two levels down; leaving "inner" out entirely
    // does not excuse it
    let err = read_data(
        &ctx,
        "<data><outer xmlns=\"urn:net\"/></data>",
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingElement);
    read_data(
        &ctx,
        "<data><outer xmlns=\"urn:net\"><inner><deep>x</deep></inner></outer></data>",
        ParseOptions::default(),
    )
    .unwrap();
}

#[test]
fn absent_presence_container_is_not_required() {
    let ctx = context_with(MODULE);
    read_data(
        &ctx,
        "<data><wrap xmlns=\"urn:net\"/></data>",
        ParseOptions::default(),
    )
    .unwrap();
    // Once instantiated, the presence container enforces its own members
    let err = read_data(
        &ctx,
        "<data><wrap xmlns=\"urn:net\"><opt/></wrap></data>",
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingElement);
}

#[test]
fn selected_case_members_are_enforced() {
    let ctx = context_with(MODULE);
    // Case "both" was selected, so all of its mandatory members are due
    let err = read_data(
        &ctx,
        "<data><pair xmlns=\"urn:net\"><first>x</first></pair></data>",
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingElement);
    read_data(
        &ctx,
        "<data><pair xmlns=\"urn:net\"><first>x</first><second>y</second></pair></data>",
        ParseOptions::default(),
    )
    .unwrap();
    // Selecting nothing, or the other case, asks for nothing more
    read_data(
        &ctx,
        "<data><pair xmlns=\"urn:net\"/></data>",
        ParseOptions::default(),
    )
    .unwrap();
    read_data(
        &ctx,
        "<data><pair xmlns=\"urn:net\"><lone/></pair></data>",
        ParseOptions::default(),
    )
    .unwrap();
}

#[test]
fn identityref_resolves_through_the_element_namespaces() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        "<data><protocol xmlns=\"urn:net\" xmlns:p=\"urn:net\">p:tcp</protocol></data>",
        ParseOptions::default(),
    )
    .unwrap();
    let id = tree.find_child(None, "protocol").unwrap();
    let leaf = tree.node(id).leaf().unwrap();
    // The stored lexical form is module-qualified
    assert_eq!(ctx.dict().resolve(leaf.value_str), "net:tcp");
    let Value::Identity(ident) = leaf.value else {
        panic!("expected an identity");
    };
    assert_eq!(ctx.dict().resolve(ctx.identity(ident).name), "tcp");
}

#[test]
fn identityref_must_derive_from_the_base() {
    let ctx = context_with(MODULE);
    // "proto" is the base itself, not derived from it
    let err = read_data(
        &ctx,
        "<data><protocol xmlns=\"urn:net\" xmlns:p=\"urn:net\">p:proto</protocol></data>",
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
}

#[test]
fn identityref_with_unbound_prefix_fails() {
    let ctx = context_with(MODULE);
    let err = read_data(
        &ctx,
        "<data><protocol xmlns=\"urn:net\">nope:tcp</protocol></data>",
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
}

#[test]
fn leafref_resolves_after_the_tree_is_whole() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        indoc! {r#"
            <data>
              <primary xmlns="urn:net">eth1</primary>
              <interfaces xmlns="urn:net">
                <iface><name>eth0</name></iface>
                <iface><name>eth1</name></iface>
              </interfaces>
            </data>
        "#},
        ParseOptions::default(),
    )
    .unwrap();
    let id = tree.find_child(None, "primary").unwrap();
    let leaf = tree.node(id).leaf().unwrap();
    assert!(!leaf.unresolved);
    let Value::Leafref(target) = leaf.value else {
        panic!("expected a resolved leafref");
    };
    let target_leaf = tree.node(target).leaf().unwrap();
    assert_eq!(ctx.dict().resolve(target_leaf.value_str), "eth1");
}

#[test]
fn dangling_leafref_fails_the_parse() {
    let ctx = context_with(MODULE);
    let err = read_data(
        &ctx,
        indoc! {r#"
            <data>
              <primary xmlns="urn:net">eth9</primary>
              <interfaces xmlns="urn:net">
                <iface><name>eth0</name></iface>
              </interfaces>
            </data>
        "#},
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
}

#[test]
fn instance_identifier_resolves_with_predicates() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        indoc! {r#"
            <data>
              <interfaces xmlns="urn:net">
                <iface><name>eth0</name><mtu>1500</mtu></iface>
                <iface><name>eth1</name><mtu>9000</mtu></iface>
              </interfaces>
              <target xmlns="urn:net" xmlns:x="urn:net">/x:interfaces/x:iface[x:name='eth1']/x:mtu</target>
            </data>
        "#},
        ParseOptions::default(),
    )
    .unwrap();
    let id = tree.find_child(None, "target").unwrap();
    let leaf = tree.node(id).leaf().unwrap();
    let Value::Instance(target) = leaf.value else {
        panic!("expected a resolved instance-identifier");
    };
    assert_eq!(leaf_str(&tree, target), "9000");
}

fn leaf_str(tree: &crate::DataTree<'_>, id: crate::NodeId) -> String {
    let sym = tree.node(id).leaf().unwrap().value_str;
    tree.context().dict().resolve(sym).to_owned()
}

#[test]
fn unresolvable_instance_identifier_fails() {
    let ctx = context_with(MODULE);
    let err = read_data(
        &ctx,
        indoc! {r#"
            <data>
              <target xmlns="urn:net" xmlns:x="urn:net">/x:interfaces/x:iface[x:name='none']</target>
            </data>
        "#},
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
}

#[test]
fn anyxml_takes_its_subtree_verbatim() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        "<data><blob xmlns=\"urn:net\"><a><b>text</b></a></blob></data>",
        ParseOptions::default(),
    )
    .unwrap();
    let id = tree.find_child(None, "blob").unwrap();
    let DataKind::Anyxml { xml: Some(xml) } = &tree.node(id).kind else {
        panic!("expected captured anyxml");
    };
    assert!(xml.contains("<a><b>text</b></a>"));
    // The anyxml content was not schema-matched
    assert_eq!(tree.node(id).child, None);
}

#[test]
fn attributes_are_transferred_verbatim() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        "<data><gateway xmlns=\"urn:net\" note=\"keep\">x</gateway></data>",
        ParseOptions::default(),
    )
    .unwrap();
    let id = tree.find_child(None, "gateway").unwrap();
    let attrs = &tree.node(id).attrs;
    assert_eq!(attrs.len(), 1);
    assert_eq!(ctx.dict().resolve(attrs[0].name), "note");
    assert_eq!(ctx.dict().resolve(attrs[0].value), "keep");
}

#[test]
fn errors_carry_the_source_line() {
    let ctx = context_with(MODULE);
    let err = read_data(
        &ctx,
        "<data>\n  <gateway xmlns=\"urn:net\">a</gateway>\n  <gateway xmlns=\"urn:net\">b</gateway>\n</data>",
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.line(), 3);
}
