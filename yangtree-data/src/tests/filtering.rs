use indoc::indoc;

use super::{context_with, names_under};
use crate::{read_data, ParseOptions, Value};

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
                container stats { leaf rx { type uint64; } leaf tx { type uint64; } }
            }
        }
        leaf gateway { type string; }
        anyxml blob;
    }
"};

#[test]
fn selection_leaf_has_no_value() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        "<filter><gateway xmlns=\"urn:net\"/></filter>",
        ParseOptions::filter(),
    )
    .unwrap();
    let id = tree.find_child(None, "gateway").unwrap();
    assert_eq!(tree.node(id).leaf().unwrap().value, Value::None);
}

#[test]
fn duplicate_selection_containers_collapse() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        indoc! {r#"
            <filter>
              <interfaces xmlns="urn:net"/>
              <interfaces xmlns="urn:net"/>
            </filter>
        "#},
        ParseOptions::filter(),
    )
    .unwrap();
    assert_eq!(names_under(&tree, None), ["interfaces"]);
}

#[test]
fn selection_wins_over_containment() {
    let ctx = context_with(MODULE);
    // The second instance selects everything, so the first instance's
    // narrowing children are dropped
    let tree = read_data(
        &ctx,
        indoc! {r#"
            <filter>
              <interfaces xmlns="urn:net"><iface><name>eth0</name></iface></interfaces>
              <interfaces xmlns="urn:net"/>
            </filter>
        "#},
        ParseOptions::filter(),
    )
    .unwrap();
    assert_eq!(names_under(&tree, None), ["interfaces"]);
    let interfaces = tree.first_root().unwrap();
    assert_eq!(tree.node(interfaces).child, None);
}

#[test]
fn containment_containers_merge() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        indoc! {r#"
            <filter>
              <interfaces xmlns="urn:net"><iface><name>eth0</name></iface></interfaces>
              <interfaces xmlns="urn:net"><iface><name>eth1</name></iface></interfaces>
            </filter>
        "#},
        ParseOptions::filter(),
    )
    .unwrap();
    assert_eq!(names_under(&tree, None), ["interfaces"]);
    let interfaces = tree.first_root().unwrap();
    assert_eq!(names_under(&tree, Some(interfaces)), ["iface", "iface"]);
}

#[test]
fn duplicate_leaves_with_equal_values_collapse() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        indoc! {r#"
            <filter>
              <gateway xmlns="urn:net">a</gateway>
              <gateway xmlns="urn:net">a</gateway>
            </filter>
        "#},
        ParseOptions::filter(),
    )
    .unwrap();
    assert_eq!(names_under(&tree, None), ["gateway"]);
    // Unequal values are content matches for different data; both stay
    let tree = read_data(
        &ctx,
        indoc! {r#"
            <filter>
              <gateway xmlns="urn:net">a</gateway>
              <gateway xmlns="urn:net">b</gateway>
            </filter>
        "#},
        ParseOptions::filter(),
    )
    .unwrap();
    assert_eq!(names_under(&tree, None), ["gateway", "gateway"]);
}

#[test]
fn duplicate_leaf_list_values_are_dropped_silently() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        indoc! {r#"
            <filter>
              <interfaces xmlns="urn:net">
                <iface>
                  <name>eth0</name>
                  <port>80</port>
                  <port>80</port>
                </iface>
              </interfaces>
            </filter>
        "#},
        ParseOptions::filter(),
    )
    .unwrap();
    let interfaces = tree.first_root().unwrap();
    let iface = tree.children(interfaces).next().unwrap();
    assert_eq!(names_under(&tree, Some(iface)), ["name", "port"]);
}

#[test]
fn duplicate_anyxml_collapses() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        indoc! {r#"
            <filter>
              <blob xmlns="urn:net"/>
              <blob xmlns="urn:net"/>
            </filter>
        "#},
        ParseOptions::filter(),
    )
    .unwrap();
    assert_eq!(names_under(&tree, None), ["blob"]);
}

#[test]
fn matching_list_instances_merge() {
    let ctx = context_with(MODULE);
    // Same content match (name=eth0); the selections are combined
    let tree = read_data(
        &ctx,
        indoc! {r#"
            <filter>
              <interfaces xmlns="urn:net">
                <iface><name>eth0</name><mtu/></iface>
                <iface><name>eth0</name><stats/></iface>
              </interfaces>
            </filter>
        "#},
        ParseOptions::filter(),
    )
    .unwrap();
    let interfaces = tree.first_root().unwrap();
    let ifaces: Vec<_> = tree.children(interfaces).collect();
    assert_eq!(ifaces.len(), 1);
    assert_eq!(
        names_under(&tree, Some(ifaces[0])),
        ["name", "mtu", "stats"]
    );
}

#[test]
fn differing_list_instances_stay_apart() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        indoc! {r#"
            <filter>
              <interfaces xmlns="urn:net">
                <iface><name>eth0</name></iface>
                <iface><name>eth1</name></iface>
              </interfaces>
            </filter>
        "#},
        ParseOptions::filter(),
    )
    .unwrap();
    let interfaces = tree.first_root().unwrap();
    assert_eq!(tree.children(interfaces).count(), 2);
}

#[test]
fn selection_only_duplicates_merge_to_one() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        indoc! {r#"
            <filter>
              <interfaces xmlns="urn:net">
                <iface><name>eth0</name></iface>
                <iface><name>eth0</name></iface>
              </interfaces>
            </filter>
        "#},
        ParseOptions::filter(),
    )
    .unwrap();
    let interfaces = tree.first_root().unwrap();
    assert_eq!(tree.children(interfaces).count(), 1);
}
