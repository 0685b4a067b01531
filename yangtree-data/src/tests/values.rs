use indoc::indoc;
use yangtree_schema::TypeBase;

use super::{context_with, leaf_value};
use crate::{read_data, ErrorKind, ParseOptions, Value};

const MODULE: &str = indoc! {"
    module vals {
        namespace 'urn:vals';
        prefix v;

        leaf i8 { type int8 { range '1..10'; } }
        leaf i64 { type int64; }
        leaf u64 { type uint64; }
        leaf d { type decimal64 { fraction-digits 2; } }
        leaf e { type empty; }
        leaf b { type boolean; }
        leaf flags { type bits { bit one; bit two; bit three; } }
        leaf mode { type enumeration { enum auto; enum manual; } }
        leaf s { type string { length '2..5'; pattern '[a-z]+'; } }
        leaf u { type union { type int32; type enumeration { enum auto; } } }
        leaf bin { type binary { length '1..4'; } }
    }
"};

fn decode(leaf: &str, content: &str) -> Result<Value, ErrorKind> {
    let ctx = context_with(MODULE);
    let xml = format!("<data><{leaf} xmlns=\"urn:vals\">{content}</{leaf}></data>");
    match read_data(&ctx, &xml, ParseOptions::default()) {
        Ok(tree) => Ok(leaf_value(&tree, leaf)),
        Err(e) => Err(e.kind()),
    }
}

#[test]
fn int_in_declared_range() {
    assert_eq!(decode("i8", "3"), Ok(Value::Int8(3)));
    assert_eq!(decode("i8", "11"), Err(ErrorKind::OutOfRange));
    assert_eq!(decode("i8", "0"), Err(ErrorKind::OutOfRange));
    assert_eq!(decode("i8", "abc"), Err(ErrorKind::InvalidValue));
}

#[test]
fn int64_boundaries() {
    assert_eq!(
        decode("i64", "9223372036854775807"),
        Ok(Value::Int64(i64::MAX))
    );
    assert_eq!(
        decode("i64", "-9223372036854775808"),
        Ok(Value::Int64(i64::MIN))
    );
    assert_eq!(
        decode("i64", "9223372036854775808"),
        Err(ErrorKind::OutOfRange)
    );
}

#[test]
fn uint64_boundaries() {
    assert_eq!(
        decode("u64", "18446744073709551615"),
        Ok(Value::Uint64(u64::MAX))
    );
    assert_eq!(
        decode("u64", "18446744073709551616"),
        Err(ErrorKind::OutOfRange)
    );
}

#[test]
fn integers_accept_hex_and_octal() {
    assert_eq!(decode("i64", "0x1A"), Ok(Value::Int64(26)));
    assert_eq!(decode("i64", "-0x10"), Ok(Value::Int64(-16)));
    assert_eq!(decode("u64", "017"), Ok(Value::Uint64(15)));
}

#[test]
fn decimal64_shifts_by_fraction_digits() {
    assert_eq!(decode("d", "1.2"), Ok(Value::Dec64(120)));
    assert_eq!(decode("d", "-0.01"), Ok(Value::Dec64(-1)));
    assert_eq!(decode("d", "3"), Ok(Value::Dec64(300)));
    assert_eq!(decode("d", "1.234"), Err(ErrorKind::OutOfRange));
    assert_eq!(decode("d", "1.2.3"), Err(ErrorKind::InvalidValue));
}

#[test]
fn empty_type_wants_no_content() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        "<data><e xmlns=\"urn:vals\"/></data>",
        ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(leaf_value(&tree, "e"), Value::Empty);
    assert_eq!(decode("e", "x"), Err(ErrorKind::InvalidValue));
}

#[test]
fn boolean_is_true_or_not() {
    assert_eq!(decode("b", "true"), Ok(Value::Bool(true)));
    assert_eq!(decode("b", "false"), Ok(Value::Bool(false)));
    // Anything else decodes as false rather than erroring
    assert_eq!(decode("b", "yes"), Ok(Value::Bool(false)));
}

#[test]
fn bits_must_follow_declaration_order() {
    assert_eq!(
        decode("flags", "one three"),
        Ok(Value::Bits(vec![true, false, true]))
    );
    assert_eq!(
        decode("flags", "two"),
        Ok(Value::Bits(vec![false, true, false]))
    );
    assert_eq!(decode("flags", "three one"), Err(ErrorKind::InvalidValue));
    assert_eq!(decode("flags", "four"), Err(ErrorKind::InvalidValue));
}

#[test]
fn enumeration_matches_exactly() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        "<data><mode xmlns=\"urn:vals\">manual</mode></data>",
        ParseOptions::default(),
    )
    .unwrap();
    let Value::Enum { name, value } = leaf_value(&tree, "mode") else {
        panic!("expected an enum");
    };
    assert_eq!(ctx.dict().resolve(name), "manual");
    assert_eq!(value, 1);
    assert_eq!(decode("mode", "off"), Err(ErrorKind::InvalidValue));
    assert_eq!(decode("mode", "Auto"), Err(ErrorKind::InvalidValue));
}

#[test]
fn string_length_and_patterns() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        "<data><s xmlns=\"urn:vals\">abc</s></data>",
        ParseOptions::default(),
    )
    .unwrap();
    let Value::String(sym) = leaf_value(&tree, "s") else {
        panic!("expected a string");
    };
    assert_eq!(ctx.dict().resolve(sym), "abc");
    assert_eq!(decode("s", "a"), Err(ErrorKind::OutOfRange));
    assert_eq!(decode("s", "toolongvalue"), Err(ErrorKind::OutOfRange));
    // The pattern is anchored on both ends
    assert_eq!(decode("s", "aBc"), Err(ErrorKind::InvalidValue));
}

#[test]
fn union_tries_branches_in_order() {
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        "<data><u xmlns=\"urn:vals\">42</u></data>",
        ParseOptions::default(),
    )
    .unwrap();
    let id = tree.find_child(None, "u").unwrap();
    let leaf = tree.node(id).leaf().unwrap();
    assert_eq!(leaf.value, Value::Int32(42));
    assert_eq!(leaf.base, TypeBase::Int32);

    let tree = read_data(
        &ctx,
        "<data><u xmlns=\"urn:vals\">auto</u></data>",
        ParseOptions::default(),
    )
    .unwrap();
    let id = tree.find_child(None, "u").unwrap();
    let leaf = tree.node(id).leaf().unwrap();
    assert!(matches!(leaf.value, Value::Enum { .. }));
    assert_eq!(leaf.base, TypeBase::Enum);
    // The effective base is never the union itself
    assert_ne!(leaf.base, TypeBase::Union);

    assert_eq!(decode("u", "xyz"), Err(ErrorKind::InvalidValue));
}

#[test]
fn binary_checks_byte_length() {
    assert_eq!(decode("bin", "abcde"), Err(ErrorKind::OutOfRange));
    let ctx = context_with(MODULE);
    let tree = read_data(
        &ctx,
        "<data><bin xmlns=\"urn:vals\">abcd</bin></data>",
        ParseOptions::default(),
    )
    .unwrap();
    assert!(matches!(leaf_value(&tree, "bin"), Value::Binary(_)));
}

#[test]
fn empty_content_fails_non_empty_types() {
    assert_eq!(decode("i8", ""), Err(ErrorKind::InvalidValue));
    assert_eq!(decode("s", ""), Err(ErrorKind::InvalidValue));
}
