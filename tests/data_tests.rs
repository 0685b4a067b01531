//! End-to-end scenarios: schema in YANG text, data in XML, assertions on
//! the resulting trees and error kinds.

use indoc::indoc;

use yangtree::data::{print_xml, read_data, ErrorKind, ParseOptions, Value};
use yangtree::schema::Context;

fn context(source: &str) -> Context {
    let mut ctx = Context::new();
    ctx.load_module(source).unwrap_or_else(|e| panic!("{e:#}"));
    ctx
}

#[test]
fn range_restricted_leaf() {
    let ctx = context(indoc! {"
        module m {
            namespace 'urn:m';
            prefix m;
            leaf x { type int8 { range '1..10'; } }
        }
    "});
    let tree = read_data(
        &ctx,
        "<data><x xmlns=\"urn:m\">3</x></data>",
        ParseOptions::default(),
    )
    .unwrap();
    let x = tree.first_root().unwrap();
    assert_eq!(tree.node(x).leaf().unwrap().value, Value::Int8(3));

    let err = read_data(
        &ctx,
        "<data><x xmlns=\"urn:m\">11</x></data>",
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
}

#[test]
fn leaf_list_duplicates_error_or_drop() {
    let ctx = context(indoc! {"
        module m {
            namespace 'urn:m';
            prefix m;
            leaf-list port { type uint16; }
        }
    "});
    let xml = indoc! {r#"
        <data>
          <port xmlns="urn:m">8080</port>
          <port xmlns="urn:m">8080</port>
        </data>
    "#};
    let err = read_data(&ctx, xml, ParseOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateLeafList);

    // The same input is silently deduplicated in filter mode
    let tree = read_data(&ctx, xml, ParseOptions::filter()).unwrap();
    assert_eq!(tree.roots().count(), 1);
}

#[test]
fn list_duplicates_error_or_merge() {
    let ctx = context(indoc! {"
        module m {
            namespace 'urn:m';
            prefix m;
            list iface {
                key name;
                leaf name { type string; }
                leaf mtu { type uint16; }
            }
        }
    "});
    let xml = indoc! {r#"
        <data>
          <iface xmlns="urn:m"><name>eth0</name></iface>
          <iface xmlns="urn:m"><name>eth0</name></iface>
        </data>
    "#};
    let err = read_data(&ctx, xml, ParseOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateList);

    let tree = read_data(&ctx, xml, ParseOptions::filter()).unwrap();
    assert_eq!(tree.roots().count(), 1);
}

#[test]
fn union_decides_an_effective_base() {
    let ctx = context(indoc! {"
        module m {
            namespace 'urn:m';
            prefix m;
            leaf x { type union { type int32; type enumeration { enum auto; } } }
        }
    "});
    let tree = read_data(
        &ctx,
        "<data><x xmlns=\"urn:m\">42</x></data>",
        ParseOptions::default(),
    )
    .unwrap();
    let leaf = tree.node(tree.first_root().unwrap()).leaf().unwrap().clone();
    assert_eq!(leaf.value, Value::Int32(42));

    let tree = read_data(
        &ctx,
        "<data><x xmlns=\"urn:m\">auto</x></data>",
        ParseOptions::default(),
    )
    .unwrap();
    let leaf = tree.node(tree.first_root().unwrap()).leaf().unwrap().clone();
    assert!(matches!(leaf.value, Value::Enum { .. }));

    let err = read_data(
        &ctx,
        "<data><x xmlns=\"urn:m\">xyz</x></data>",
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
}

#[test]
fn identityref_is_stored_module_qualified() {
    let ctx = context(indoc! {"
        module ids {
            namespace 'urn:ids';
            prefix i;
            identity alg;
            identity foo { base alg; }
            leaf pick { type identityref { base alg; } }
        }
    "});
    // The element binds prefix "a" to the module's namespace
    let tree = read_data(
        &ctx,
        "<data><pick xmlns=\"urn:ids\" xmlns:a=\"urn:ids\">a:foo</pick></data>",
        ParseOptions::default(),
    )
    .unwrap();
    let leaf = tree.node(tree.first_root().unwrap()).leaf().unwrap();
    assert_eq!(ctx.dict().resolve(leaf.value_str), "ids:foo");
}

#[test]
fn both_cases_of_a_choice_fail() {
    let ctx = context(indoc! {"
        module m {
            namespace 'urn:m';
            prefix m;
            choice c {
                case x { leaf a { type empty; } }
                case y { leaf b { type empty; } }
            }
        }
    "});
    let err = read_data(
        &ctx,
        "<data><a xmlns=\"urn:m\"/><b xmlns=\"urn:m\"/></data>",
        ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MultipleCases);
}

#[test]
fn parse_print_parse_round_trip() {
    let ctx = context(indoc! {"
        module rt {
            namespace 'urn:rt';
            prefix r;
            container system {
                leaf hostname { type string; }
                leaf-list dns { type string; }
                list user {
                    key name;
                    leaf name { type string; }
                    leaf uid { type uint32; }
                }
            }
            leaf ratio { type decimal64 { fraction-digits 2; } }
        }
    "});
    let tree = read_data(
        &ctx,
        indoc! {r#"
            <data>
              <system xmlns="urn:rt">
                <hostname>router1</hostname>
                <dns>10.0.0.1</dns>
                <dns>10.0.0.2</dns>
                <user><name>admin</name><uid>0</uid></user>
                <user><name>guest</name><uid>1000</uid></user>
              </system>
              <ratio xmlns="urn:rt">2.50</ratio>
            </data>
        "#},
        ParseOptions::default(),
    )
    .unwrap();
    let printed = print_xml(&tree);
    let reparsed = read_data(
        &ctx,
        &format!("<data>{printed}</data>"),
        ParseOptions::default(),
    )
    .unwrap();
    // Printing the reparsed tree reproduces the serialization exactly
    assert_eq!(print_xml(&reparsed), printed);
    assert_eq!(reparsed.roots().count(), tree.roots().count());
}

#[test]
fn interned_values_compare_by_handle() {
    let ctx = context(indoc! {"
        module m {
            namespace 'urn:m';
            prefix m;
            list host {
                key name;
                leaf name { type string; }
                leaf color { type string; }
            }
        }
    "});
    let tree = read_data(
        &ctx,
        indoc! {r#"
            <data>
              <host xmlns="urn:m"><name>a</name><color>blue</color></host>
              <host xmlns="urn:m"><name>b</name><color>blue</color></host>
            </data>
        "#},
        ParseOptions::default(),
    )
    .unwrap();
    let hosts: Vec<_> = tree.roots().collect();
    let color = |h| {
        let c = tree.find_child(Some(h), "color").unwrap();
        tree.node(c).leaf().unwrap().value_str
    };
    // Same canonical value, same handle
    assert_eq!(color(hosts[0]), color(hosts[1]));
}

#[test]
fn nested_unknown_subtree_is_skipped_in_lax_mode() {
    let ctx = context(indoc! {"
        module m {
            namespace 'urn:m';
            prefix m;
            container keep { leaf x { type string; } }
        }
    "});
    let tree = read_data(
        &ctx,
        indoc! {r#"
            <data>
              <foreign xmlns="urn:elsewhere"><deep><deeper/></deep></foreign>
              <keep xmlns="urn:m"><x>1</x></keep>
            </data>
        "#},
        ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(tree.roots().count(), 1);
}
