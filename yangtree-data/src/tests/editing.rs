use indoc::indoc;

use super::context_with;
use crate::{read_data, ErrorKind, ParseOptions};

const MODULE: &str = indoc! {"
    module edits {
        namespace 'urn:edits';
        prefix e;

        list entry {
            key k;
            ordered-by user;
            leaf k { type string; }
        }
        list plain {
            key k;
            leaf k { type string; }
        }
        container state {
            config false;
            leaf counter { type uint64; }
        }
        container cfg { leaf must-have { type string; mandatory true; } }
    }
"};

const NS_YANG: &str = "urn:ietf:params:xml:ns:yang:1.0";

fn edit(xml: &str) -> Result<(), ErrorKind> {
    let ctx = context_with(MODULE);
    match read_data(&ctx, xml, ParseOptions::edit()) {
        Ok(_) => Ok(()),
        Err(e) => Err(e.kind()),
    }
}

#[test]
fn insert_on_user_ordered_list() {
    let xml = format!(
        r#"<config><entry xmlns="urn:edits" xmlns:y="{NS_YANG}" y:insert="first"><k>a</k></entry></config>"#
    );
    assert_eq!(edit(&xml), Ok(()));
}

#[test]
fn insert_needs_user_ordering() {
    let xml = format!(
        r#"<config><plain xmlns="urn:edits" xmlns:y="{NS_YANG}" y:insert="first"><k>a</k></plain></config>"#
    );
    assert_eq!(edit(&xml), Err(ErrorKind::UnexpectedAttribute));
}

#[test]
fn insert_value_must_be_known() {
    let xml = format!(
        r#"<config><entry xmlns="urn:edits" xmlns:y="{NS_YANG}" y:insert="middle"><k>a</k></entry></config>"#
    );
    assert_eq!(edit(&xml), Err(ErrorKind::InvalidArgument));
}

#[test]
fn before_and_after_require_a_value() {
    let xml = format!(
        r#"<config><entry xmlns="urn:edits" xmlns:y="{NS_YANG}" y:insert="before"><k>a</k></entry></config>"#
    );
    assert_eq!(edit(&xml), Err(ErrorKind::MissingAttribute));

    let xml = format!(
        r#"<config><entry xmlns="urn:edits" xmlns:y="{NS_YANG}" y:insert="after" y:value="b"><k>a</k></entry></config>"#
    );
    assert_eq!(edit(&xml), Ok(()));
}

#[test]
fn value_without_insert_is_unexpected() {
    let xml = format!(
        r#"<config><entry xmlns="urn:edits" xmlns:y="{NS_YANG}" y:value="b"><k>a</k></entry></config>"#
    );
    assert_eq!(edit(&xml), Err(ErrorKind::UnexpectedAttribute));
}

#[test]
fn state_data_is_rejected_in_edits() {
    let xml = r#"<config><state xmlns="urn:edits"><counter>1</counter></state></config>"#;
    assert_eq!(edit(xml), Err(ErrorKind::UnknownElement));
    // The same data parses fine outside edit mode
    let ctx = context_with(MODULE);
    assert!(read_data(&ctx, xml, ParseOptions::default()).is_ok());
}

#[test]
fn mandatory_checks_are_relaxed_in_edits() {
    let xml = r#"<config><cfg xmlns="urn:edits"/></config>"#;
    assert_eq!(edit(xml), Ok(()));
    let ctx = context_with(MODULE);
    let err = read_data(&ctx, xml, ParseOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingElement);
}

#[test]
fn operation_attribute_is_validated() {
    let nc = "urn:ietf:params:xml:ns:netconf:base:1.0";
    let xml = format!(
        r#"<config><cfg xmlns="urn:edits" xmlns:nc="{nc}" nc:operation="delete"/></config>"#
    );
    assert_eq!(edit(&xml), Ok(()));
    let xml = format!(
        r#"<config><cfg xmlns="urn:edits" xmlns:nc="{nc}" nc:operation="explode"/></config>"#
    );
    assert_eq!(edit(&xml), Err(ErrorKind::InvalidArgument));
}
