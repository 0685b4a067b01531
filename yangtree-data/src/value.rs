//! The leaf value decoder: one lexical-parse-and-check routine per built-in
//! base type.
//!
//! The decoder is given the declared type of a leaf and the raw element
//! content, walks the typedef chain for the constraints in effect, and
//! produces the decoded [`Value`] together with the effective base. Union
//! decoding tries each member branch in declaration order and keeps the
//! first that accepts the value; branch failures are ordinary `Err` values
//! that the loop discards, so nothing is logged for them.

use std::num::IntErrorKind;

use yangtree_schema::{Context, SnodeId, Type, TypeBase};

use crate::{
    pattern::CompiledPattern, qualify, unres::DeferKind, DataError, ErrorKind, ParseOptions,
    Value,
};

/// Longest accepted decimal64 lexical form
const DECSIZE: usize = 21;

/// What the decoder produced for one leaf
pub(crate) struct Decoded {
    pub value: Value,
    /// Effective base; for unions, the accepting branch's base
    pub base: TypeBase,
    /// Reference types that were not (or cannot yet be) resolved
    pub unresolved: bool,
    /// Queue the leaf for post-parse resolution
    pub defer: Option<DeferKind>,
    /// Replacement for the stored lexical form (prefix-transformed values)
    pub value_str: Option<String>,
}

impl Decoded {
    fn plain(value: Value, base: TypeBase) -> Self {
        Decoded {
            value,
            base,
            unresolved: false,
            defer: None,
            value_str: None,
        }
    }
}

/// Decodes the content of a leaf or leaf-list element against its type
pub(crate) fn decode_leaf(
    ctx: &Context,
    snode: SnodeId,
    ty: &Type,
    raw: Option<&str>,
    elem: roxmltree::Node<'_, '_>,
    options: ParseOptions,
    line: u32,
) -> Result<Decoded, DataError> {
    let name = elem.tag_name().name();
    let raw_str = raw.unwrap_or("");

    if raw_str.is_empty() {
        if options.filter {
            // A filter leaf without content is a selection node
            return Ok(Decoded::plain(Value::None, ty.base));
        }
        // Only the empty type accepts an empty value; unions get to try
        // their branches (one of which may be empty)
        if !matches!(ty.base, TypeBase::Empty | TypeBase::Union) {
            return Err(invalid(raw_str, name, line));
        }
    }

    match ty.base {
        TypeBase::Binary => {
            check_length(ctx, ty, raw_str.len() as u64, raw_str, line)?;
            Ok(Decoded::plain(
                Value::Binary(ctx.dict().insert(raw_str)),
                TypeBase::Binary,
            ))
        }

        TypeBase::Bits => {
            let defs = ctx
                .bit_defs(ty)
                .ok_or_else(|| internal(line, "bits type without bit definitions"))?;
            let mut set = vec![false; defs.len()];
            // Identifiers must appear in declaration order; the cursor only
            // moves forward
            let mut cursor = 0;
            for token in raw_str.split_whitespace() {
                let mut found = false;
                while cursor < defs.len() {
                    let index = cursor;
                    cursor += 1;
                    if ctx.dict().resolve(defs[index].name) == token {
                        set[index] = true;
                        found = true;
                        break;
                    }
                }
                if !found {
                    return Err(invalid(raw_str, name, line));
                }
            }
            Ok(Decoded::plain(Value::Bits(set), TypeBase::Bits))
        }

        TypeBase::Bool => Ok(Decoded::plain(
            Value::Bool(raw_str == "true"),
            TypeBase::Bool,
        )),

        TypeBase::Dec64 => {
            let digits = ctx
                .fraction_digits(ty)
                .ok_or_else(|| internal(line, "decimal64 type without fraction-digits"))?;
            let num = decode_dec64(ctx, ty, raw_str, digits, name, line)?;
            Ok(Decoded::plain(Value::Dec64(num), TypeBase::Dec64))
        }

        TypeBase::Empty => {
            if !raw_str.is_empty() {
                return Err(invalid(raw_str, name, line));
            }
            Ok(Decoded::plain(Value::Empty, TypeBase::Empty))
        }

        TypeBase::Enum => {
            let defs = ctx
                .enum_defs(ty)
                .ok_or_else(|| internal(line, "enumeration type without members"))?;
            let found = defs
                .iter()
                .find(|e| ctx.dict().resolve(e.name) == raw_str)
                .ok_or_else(|| invalid(raw_str, name, line))?;
            Ok(Decoded::plain(
                Value::Enum {
                    name: found.name,
                    value: found.value,
                },
                TypeBase::Enum,
            ))
        }

        TypeBase::Identityref => {
            let qualified = qualify::transform_value(ctx, elem, raw_str, line)?;
            let base = ctx
                .identityref_base(ty)
                .ok_or_else(|| internal(line, "identityref type without base"))?;
            let module = ctx.snode(snode).module;
            let ident = ctx
                .resolve_identity(&qualified, module)
                .ok_or_else(|| invalid(raw_str, name, line))?;
            if !ctx.identity_derives(ident, base) {
                return Err(invalid(raw_str, name, line));
            }
            Ok(Decoded {
                value: Value::Identity(ident),
                base: TypeBase::Identityref,
                unresolved: false,
                defer: None,
                value_str: Some(qualified),
            })
        }

        TypeBase::InstanceId => {
            let qualified = qualify::transform_value(ctx, elem, raw_str, line)?;
            // The tree is not complete; resolution happens in a second pass,
            // except in edit/filter modes where the reference may legally
            // point outside the document
            let defer = if options.edit || options.filter {
                None
            } else {
                Some(DeferKind::Instance)
            };
            Ok(Decoded {
                value: Value::None,
                base: TypeBase::InstanceId,
                unresolved: true,
                defer,
                value_str: Some(qualified),
            })
        }

        TypeBase::Leafref => {
            if options.edit || options.filter {
                // Take the effective base from the target leaf, chasing
                // chained leafrefs
                let mut target = snode;
                let mut base = TypeBase::Leafref;
                for _ in 0..32 {
                    target = ctx
                        .leafref_target(target)
                        .ok_or_else(|| internal(line, "leafref target not resolved"))?;
                    let target_type = ctx
                        .snode(target)
                        .leaf_type()
                        .ok_or_else(|| internal(line, "leafref target is not a leaf"))?;
                    if target_type.base != TypeBase::Leafref {
                        base = target_type.base;
                        break;
                    }
                }
                if base == TypeBase::Leafref {
                    return Err(internal(line, "leafref chain does not terminate"));
                }
                Ok(Decoded {
                    value: Value::None,
                    base,
                    unresolved: true,
                    defer: None,
                    value_str: None,
                })
            } else {
                Ok(Decoded {
                    value: Value::None,
                    base: TypeBase::Leafref,
                    unresolved: true,
                    defer: Some(DeferKind::Leafref),
                    value_str: None,
                })
            }
        }

        TypeBase::String => {
            check_length(ctx, ty, raw_str.len() as u64, raw_str, line)?;
            for pattern in ctx.effective_patterns(ty) {
                let compiled = CompiledPattern::compile(ctx.dict().resolve(pattern.expr), line)?;
                if !compiled.matches(raw_str) {
                    // A declared error-message wins over the stock report
                    return Err(match pattern.error_message {
                        Some(message) => DataError::new(
                            ErrorKind::InvalidValue,
                            line,
                            ctx.dict().resolve(message),
                        ),
                        None => invalid(raw_str, name, line),
                    });
                }
            }
            Ok(Decoded::plain(
                Value::String(ctx.dict().insert(raw_str)),
                TypeBase::String,
            ))
        }

        TypeBase::Union => {
            for branch in ctx.union_branches(ty) {
                match decode_leaf(ctx, snode, branch, raw, elem, options, line) {
                    Ok(decoded) => return Ok(decoded),
                    Err(e) => {
                        tracing::trace!(
                            "union branch \"{}\" rejected \"{raw_str}\": {e}",
                            branch.base.name()
                        );
                    }
                }
            }
            Err(invalid(raw_str, name, line))
        }

        TypeBase::Int8 => {
            let num = decode_int(ctx, ty, raw_str, i8::MIN as i64, i8::MAX as i64, name, line)?;
            Ok(Decoded::plain(Value::Int8(num as i8), TypeBase::Int8))
        }
        TypeBase::Int16 => {
            let num =
                decode_int(ctx, ty, raw_str, i16::MIN as i64, i16::MAX as i64, name, line)?;
            Ok(Decoded::plain(Value::Int16(num as i16), TypeBase::Int16))
        }
        TypeBase::Int32 => {
            let num =
                decode_int(ctx, ty, raw_str, i32::MIN as i64, i32::MAX as i64, name, line)?;
            Ok(Decoded::plain(Value::Int32(num as i32), TypeBase::Int32))
        }
        TypeBase::Int64 => {
            let num = decode_int(ctx, ty, raw_str, i64::MIN, i64::MAX, name, line)?;
            Ok(Decoded::plain(Value::Int64(num), TypeBase::Int64))
        }
        TypeBase::Uint8 => {
            let num = decode_uint(ctx, ty, raw_str, u8::MAX as u64, name, line)?;
            Ok(Decoded::plain(Value::Uint8(num as u8), TypeBase::Uint8))
        }
        TypeBase::Uint16 => {
            let num = decode_uint(ctx, ty, raw_str, u16::MAX as u64, name, line)?;
            Ok(Decoded::plain(Value::Uint16(num as u16), TypeBase::Uint16))
        }
        TypeBase::Uint32 => {
            let num = decode_uint(ctx, ty, raw_str, u32::MAX as u64, name, line)?;
            Ok(Decoded::plain(Value::Uint32(num as u32), TypeBase::Uint32))
        }
        TypeBase::Uint64 => {
            let num = decode_uint(ctx, ty, raw_str, u64::MAX, name, line)?;
            Ok(Decoded::plain(Value::Uint64(num), TypeBase::Uint64))
        }
    }
}

fn invalid(value: &str, elem: &str, line: u32) -> DataError {
    DataError::new(
        ErrorKind::InvalidValue,
        line,
        format!("invalid value \"{value}\" in \"{elem}\" element"),
    )
}

fn out_of_range(value: &str, line: u32) -> DataError {
    DataError::new(
        ErrorKind::OutOfRange,
        line,
        format!("value \"{value}\" is out of range or length"),
    )
}

/// An out-of-range report honoring the restriction's own `error-message`
fn range_violation(ctx: &Context, ty: &Type, value: &str, line: u32) -> DataError {
    match ctx.restriction_error_message(ty) {
        Some(message) => DataError::new(
            ErrorKind::OutOfRange,
            line,
            ctx.dict().resolve(message),
        ),
        None => out_of_range(value, line),
    }
}

fn internal(line: u32, message: &str) -> DataError {
    DataError::new(ErrorKind::Internal, line, message)
}

fn check_length(
    ctx: &Context,
    ty: &Type,
    length: u64,
    raw_str: &str,
    line: u32,
) -> Result<(), DataError> {
    let intervals = ctx
        .effective_intervals(ty)
        .map_err(|e| internal(line, &e.to_string()))?;
    match intervals {
        Some(set) if !set.contains_unsigned(length) => {
            Err(range_violation(ctx, ty, raw_str, line))
        }
        _ => Ok(()),
    }
}

fn decode_int(
    ctx: &Context,
    ty: &Type,
    raw_str: &str,
    min: i64,
    max: i64,
    elem: &str,
    line: u32,
) -> Result<i64, DataError> {
    let num = parse_int(raw_str, min, max, elem, line)?;
    let intervals = ctx
        .effective_intervals(ty)
        .map_err(|e| internal(line, &e.to_string()))?;
    match intervals {
        Some(set) if !set.contains_signed(num) => Err(range_violation(ctx, ty, raw_str, line)),
        _ => Ok(num),
    }
}

fn decode_uint(
    ctx: &Context,
    ty: &Type,
    raw_str: &str,
    max: u64,
    elem: &str,
    line: u32,
) -> Result<u64, DataError> {
    let num = parse_uint(raw_str, max, elem, line)?;
    let intervals = ctx
        .effective_intervals(ty)
        .map_err(|e| internal(line, &e.to_string()))?;
    match intervals {
        Some(set) if !set.contains_unsigned(num) => {
            Err(range_violation(ctx, ty, raw_str, line))
        }
        _ => Ok(num),
    }
}

/// Signed 64-bit conversion with auto-detected radix: `0x` hexadecimal,
/// leading `0` octal, decimal otherwise
fn parse_int(raw_str: &str, min: i64, max: i64, elem: &str, line: u32) -> Result<i64, DataError> {
    let (radix, body) = split_radix(raw_str, elem, line)?;
    match i64::from_str_radix(&body, radix) {
        Ok(num) if num < min || num > max => Err(out_of_range(raw_str, line)),
        Ok(num) => Ok(num),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                Err(out_of_range(raw_str, line))
            }
            _ => Err(invalid(raw_str, elem, line)),
        },
    }
}

/// Unsigned 64-bit conversion, same radix handling
fn parse_uint(raw_str: &str, max: u64, elem: &str, line: u32) -> Result<u64, DataError> {
    let (radix, body) = split_radix(raw_str, elem, line)?;
    match u64::from_str_radix(&body, radix) {
        Ok(num) if num > max => Err(out_of_range(raw_str, line)),
        Ok(num) => Ok(num),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Err(out_of_range(raw_str, line)),
            _ => Err(invalid(raw_str, elem, line)),
        },
    }
}

fn split_radix(raw_str: &str, elem: &str, line: u32) -> Result<(u32, String), DataError> {
    let trimmed = raw_str.trim();
    if trimmed.is_empty() {
        return Err(invalid(raw_str, elem, line));
    }
    let (sign, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        Ok((16, format!("{sign}{hex}")))
    } else if rest.len() > 1 && rest.starts_with('0') {
        Ok((8, format!("{sign}{}", &rest[1..])))
    } else {
        Ok((10, format!("{sign}{rest}")))
    }
}

/// Normalizes a decimal64 lexical form by shifting the decimal point
/// `digits` places, then parses and range-checks it
fn decode_dec64(
    ctx: &Context,
    ty: &Type,
    raw_str: &str,
    digits: u8,
    elem: &str,
    line: u32,
) -> Result<i64, DataError> {
    let trimmed = raw_str.trim();
    if trimmed.is_empty() || trimmed.len() > DECSIZE {
        return Err(invalid(raw_str, elem, line));
    }
    let (sign, body) = match trimmed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", trimmed),
    };
    let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(raw_str, elem, line));
    }
    if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(raw_str, elem, line));
    }
    if frac_part.len() > digits as usize {
        // More fraction digits than the type allows
        return Err(out_of_range(raw_str, line));
    }
    let width = digits as usize;
    let scaled = format!("{sign}{int_part}{frac_part:0<width$}");
    let num: i64 = match scaled.parse() {
        Ok(num) => num,
        Err(e) => {
            let e: std::num::ParseIntError = e;
            return match e.kind() {
                IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                    Err(out_of_range(raw_str, line))
                }
                _ => Err(invalid(raw_str, elem, line)),
            };
        }
    };
    let intervals = ctx
        .effective_intervals(ty)
        .map_err(|e| internal(line, &e.to_string()))?;
    if let Some(set) = intervals {
        let value = num as f64 / 10f64.powi(digits as i32);
        if !set.contains_float(value) {
            return Err(range_violation(ctx, ty, raw_str, line));
        }
    }
    Ok(num)
}
