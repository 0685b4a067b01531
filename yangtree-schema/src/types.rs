//! YANG types: the built-in bases, the typedef derivation chain, and the
//! computation of the restrictions in effect for a leaf.
//!
//! A [`Type`] records its resolved built-in base, the typedef it derives from
//! (if any), and whatever refinements were declared at its own step of the
//! chain. The effective constraint set for a value is the intersection of the
//! refinements along the whole chain: length/range intervals narrow
//! monotonically and patterns accumulate.

use anyhow::{bail, Result};
use yangtree_dict::Sym;

use crate::{Context, IdentityId, TypedefId};

/// The built-in YANG data types every derivation chain terminates in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeBase {
    /// `binary`
    Binary,
    /// `bits`
    Bits,
    /// `boolean`
    Bool,
    /// `decimal64`
    Dec64,
    /// `empty`
    Empty,
    /// `enumeration`
    Enum,
    /// `identityref`
    Identityref,
    /// `instance-identifier`
    InstanceId,
    /// `leafref`
    Leafref,
    /// `string`
    String,
    /// `union`
    Union,
    /// `int8`
    Int8,
    /// `int16`
    Int16,
    /// `int32`
    Int32,
    /// `int64`
    Int64,
    /// `uint8`
    Uint8,
    /// `uint16`
    Uint16,
    /// `uint32`
    Uint32,
    /// `uint64`
    Uint64,
}

impl TypeBase {
    /// The YANG name of the built-in type
    pub fn name(self) -> &'static str {
        match self {
            TypeBase::Binary => "binary",
            TypeBase::Bits => "bits",
            TypeBase::Bool => "boolean",
            TypeBase::Dec64 => "decimal64",
            TypeBase::Empty => "empty",
            TypeBase::Enum => "enumeration",
            TypeBase::Identityref => "identityref",
            TypeBase::InstanceId => "instance-identifier",
            TypeBase::Leafref => "leafref",
            TypeBase::String => "string",
            TypeBase::Union => "union",
            TypeBase::Int8 => "int8",
            TypeBase::Int16 => "int16",
            TypeBase::Int32 => "int32",
            TypeBase::Int64 => "int64",
            TypeBase::Uint8 => "uint8",
            TypeBase::Uint16 => "uint16",
            TypeBase::Uint32 => "uint32",
            TypeBase::Uint64 => "uint64",
        }
    }

    /// Looks a built-in type up by its YANG name
    pub fn from_name(name: &str) -> Option<TypeBase> {
        Some(match name {
            "binary" => TypeBase::Binary,
            "bits" => TypeBase::Bits,
            "boolean" => TypeBase::Bool,
            "decimal64" => TypeBase::Dec64,
            "empty" => TypeBase::Empty,
            "enumeration" => TypeBase::Enum,
            "identityref" => TypeBase::Identityref,
            "instance-identifier" => TypeBase::InstanceId,
            "leafref" => TypeBase::Leafref,
            "string" => TypeBase::String,
            "union" => TypeBase::Union,
            "int8" => TypeBase::Int8,
            "int16" => TypeBase::Int16,
            "int32" => TypeBase::Int32,
            "int64" => TypeBase::Int64,
            "uint8" => TypeBase::Uint8,
            "uint16" => TypeBase::Uint16,
            "uint32" => TypeBase::Uint32,
            "uint64" => TypeBase::Uint64,
            _ => return None,
        })
    }

    /// Bounds of the signed integer types
    pub fn int_bounds(self) -> Option<(i64, i64)> {
        Some(match self {
            TypeBase::Int8 => (i8::MIN as i64, i8::MAX as i64),
            TypeBase::Int16 => (i16::MIN as i64, i16::MAX as i64),
            TypeBase::Int32 => (i32::MIN as i64, i32::MAX as i64),
            TypeBase::Int64 => (i64::MIN, i64::MAX),
            _ => return None,
        })
    }

    /// Upper bounds of the unsigned integer types
    pub fn uint_max(self) -> Option<u64> {
        Some(match self {
            TypeBase::Uint8 => u8::MAX as u64,
            TypeBase::Uint16 => u16::MAX as u64,
            TypeBase::Uint32 => u32::MAX as u64,
            TypeBase::Uint64 => u64::MAX,
            _ => return None,
        })
    }
}

/// A type as declared on a leaf, leaf-list or typedef
///
/// `base` is always the resolved built-in; `typedef` links one step up the
/// derivation chain; `spec` holds only the refinements declared at this step.
#[derive(Debug)]
pub struct Type {
    /// The resolved built-in base
    pub base: TypeBase,
    /// The typedef this type derives from, or `None` when declared directly
    /// on a built-in
    pub typedef: Option<TypedefId>,
    /// Refinements declared at this step of the chain
    pub spec: TypeSpec,
}

/// Refinements a `type` statement may carry, keyed by the base they apply to
#[derive(Debug)]
pub enum TypeSpec {
    /// No refinements at this step
    None,
    /// `binary` with an optional `length`
    Binary {
        /// Byte-length restriction
        length: Option<Restriction>,
    },
    /// `bits` with its positions
    Bits {
        /// Bit definitions in declaration order
        bits: Vec<BitDef>,
    },
    /// `decimal64`
    Dec64 {
        /// Number of fraction digits (1..=18)
        fraction_digits: u8,
        /// Value range restriction
        range: Option<Restriction>,
    },
    /// `enumeration` with its members
    Enum {
        /// Enum definitions in declaration order
        enums: Vec<EnumDef>,
    },
    /// `identityref` with its base identity
    Identityref {
        /// Values must be derived from this identity
        base: IdentityId,
    },
    /// `leafref` with its path
    Leafref {
        /// Target path, prefixes rewritten to module names
        path: Sym,
    },
    /// An integer type with an optional `range`
    Numeric {
        /// Value range restriction
        range: Option<Restriction>,
    },
    /// `string` with optional `length` and `pattern`s
    String {
        /// Character-length restriction
        length: Option<Restriction>,
        /// Patterns declared at this step; all must match, along with any
        /// inherited from the chain
        patterns: Vec<Pattern>,
    },
    /// `union` with its member types
    Union {
        /// Member types in declaration order
        branches: Vec<Type>,
    },
}

impl TypeSpec {
    /// The length or range restriction declared at this step, if any
    pub fn restriction(&self) -> Option<&Restriction> {
        match self {
            TypeSpec::Binary { length } => length.as_ref(),
            TypeSpec::Dec64 { range, .. } => range.as_ref(),
            TypeSpec::Numeric { range } => range.as_ref(),
            TypeSpec::String { length, .. } => length.as_ref(),
            _ => None,
        }
    }
}

/// A `length` or `range` restriction
#[derive(Debug)]
pub struct Restriction {
    /// The interval expression, e.g. `"1..10 | 15"`
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

/// A `pattern` restriction (an XSD regular expression)
#[derive(Debug)]
pub struct Pattern {
    /// The pattern text as written in the schema
    pub expr: Sym,
    /// `error-message` substatement, if given
    pub error_message: Option<Sym>,
    /// `error-app-tag` substatement, if given
    pub error_app_tag: Option<Sym>,
}

/// One position of a `bits` type
#[derive(Debug)]
pub struct BitDef {
    /// Bit name
    pub name: Sym,
    /// Bit position
    pub position: u32,
    /// `description` substatement, if given
    pub description: Option<Sym>,
}

/// One member of an `enumeration` type
#[derive(Debug)]
pub struct EnumDef {
    /// Enum name, matched exactly against values
    pub name: Sym,
    /// Assigned or auto-incremented value
    pub value: i32,
    /// `description` substatement, if given
    pub description: Option<Sym>,
}

/// A sorted, disjoint set of allowed intervals, split by the value domain of
/// the base type it constrains
#[derive(Debug, Clone, PartialEq)]
pub enum IntervalSet {
    /// Signed integer values
    Signed(Vec<(i64, i64)>),
    /// Unsigned integer values and lengths
    Unsigned(Vec<(u64, u64)>),
    /// decimal64 values
    Float(Vec<(f64, f64)>),
}

impl IntervalSet {
    /// The full value domain of a built-in base, or `None` for bases that
    /// have no length/range semantics
    pub fn for_base(base: TypeBase, fraction_digits: u8) -> Option<IntervalSet> {
        if let Some((min, max)) = base.int_bounds() {
            return Some(IntervalSet::Signed(vec![(min, max)]));
        }
        if let Some(max) = base.uint_max() {
            return Some(IntervalSet::Unsigned(vec![(0, max)]));
        }
        match base {
            TypeBase::Dec64 => {
                let scale = 10f64.powi(fraction_digits as i32);
                Some(IntervalSet::Float(vec![(
                    i64::MIN as f64 / scale,
                    i64::MAX as f64 / scale,
                )]))
            }
            // Lengths of strings and binary values
            TypeBase::String | TypeBase::Binary => {
                Some(IntervalSet::Unsigned(vec![(0, u64::MAX)]))
            }
            _ => None,
        }
    }

    /// Narrows this set by a `length`/`range` expression, `min`/`max`
    /// keywords resolving against the current bounds
    pub fn restrict(&self, expr: &str) -> Result<IntervalSet> {
        let narrowed = match self {
            IntervalSet::Signed(cur) => {
                IntervalSet::Signed(restrict_parts(expr, cur, |s| s.parse().ok())?)
            }
            IntervalSet::Unsigned(cur) => {
                IntervalSet::Unsigned(restrict_parts(expr, cur, |s| s.parse().ok())?)
            }
            IntervalSet::Float(cur) => {
                IntervalSet::Float(restrict_parts(expr, cur, |s| s.parse().ok())?)
            }
        };
        Ok(narrowed)
    }

    /// Whether a signed value falls inside the set
    pub fn contains_signed(&self, value: i64) -> bool {
        match self {
            IntervalSet::Signed(intervals) => contains(intervals, value),
            _ => false,
        }
    }

    /// Whether an unsigned value (or a length) falls inside the set
    pub fn contains_unsigned(&self, value: u64) -> bool {
        match self {
            IntervalSet::Unsigned(intervals) => contains(intervals, value),
            _ => false,
        }
    }

    /// Whether a decimal64 value falls inside the set
    pub fn contains_float(&self, value: f64) -> bool {
        match self {
            IntervalSet::Float(intervals) => contains(intervals, value),
            _ => false,
        }
    }
}

/// Interval membership with the early exit the intervals' ordering allows:
/// stop as soon as the value sits below the interval under consideration
fn contains<T: PartialOrd + Copy>(intervals: &[(T, T)], value: T) -> bool {
    for &(min, max) in intervals {
        if value < min {
            return false;
        }
        if value <= max {
            return true;
        }
    }
    false
}

fn restrict_parts<T: PartialOrd + Copy>(
    expr: &str,
    current: &[(T, T)],
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<(T, T)>> {
    let cur_min = current.first().map(|&(min, _)| min);
    let cur_max = current.last().map(|&(_, max)| max);
    let (Some(cur_min), Some(cur_max)) = (cur_min, cur_max) else {
        bail!("restriction \"{expr}\" applied to an empty value set");
    };
    let bound = |s: &str| -> Result<T> {
        match s {
            "min" => Ok(cur_min),
            "max" => Ok(cur_max),
            _ => parse(s).ok_or_else(|| anyhow::anyhow!("invalid bound \"{s}\" in \"{expr}\"")),
        }
    };
    let mut parts = Vec::new();
    for part in expr.split('|') {
        let part = part.trim();
        let (lo, hi) = match part.split_once("..") {
            Some((lo, hi)) => (bound(lo.trim())?, bound(hi.trim())?),
            None => {
                let v = bound(part)?;
                (v, v)
            }
        };
        if hi < lo {
            bail!("descending interval in \"{expr}\"");
        }
        if let Some(&(prev_lo, _)) = parts.last() {
            if lo < prev_lo {
                bail!("intervals out of order in \"{expr}\"");
            }
        }
        parts.push((lo, hi));
    }
    let narrowed = intersect(current, &parts);
    if narrowed.is_empty() {
        bail!("restriction \"{expr}\" does not intersect the base type");
    }
    Ok(narrowed)
}

fn intersect<T: PartialOrd + Copy>(a: &[(T, T)], b: &[(T, T)]) -> Vec<(T, T)> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (alo, ahi) = a[i];
        let (blo, bhi) = b[j];
        let lo = if alo > blo { alo } else { blo };
        let hi = if ahi < bhi { ahi } else { bhi };
        if lo <= hi {
            out.push((lo, hi));
        }
        if ahi < bhi {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

/// Rewrites an XSD pattern to its anchored POSIX-style equivalent: `^` is
/// prepended unless the pattern already starts with `.*`, and `$` appended
/// unless it ends with `.*`
pub fn anchored_pattern(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len() + 2);
    if !expr.starts_with(".*") {
        out.push('^');
    }
    out.push_str(expr);
    if !expr.ends_with(".*") {
        out.push('$');
    }
    out
}

impl Context {
    /// The length/range intervals in effect for `ty`: the intersection of
    /// every restriction declared along its typedef chain, or `None` when the
    /// chain declares none
    pub fn effective_intervals(&self, ty: &Type) -> Result<Option<IntervalSet>> {
        let mut exprs = Vec::new();
        let mut t = ty;
        loop {
            if let Some(r) = t.spec.restriction() {
                exprs.push(r.expr);
            }
            match t.typedef {
                Some(td) => t = &self.typedef(td).typ,
                None => break,
            }
        }
        if exprs.is_empty() {
            return Ok(None);
        }
        let fraction_digits = self.fraction_digits(ty).unwrap_or(0);
        let Some(mut set) = IntervalSet::for_base(ty.base, fraction_digits) else {
            bail!(
                "length/range restriction on type \"{}\" which has none",
                ty.base.name()
            );
        };
        // Chain walk produced outermost-first; apply innermost-first so each
        // min/max keyword sees the bounds it narrows
        for expr in exprs.iter().rev() {
            set = set.restrict(self.dict().resolve(*expr))?;
        }
        Ok(Some(set))
    }

    /// Every pattern in effect for `ty`: its own plus all inherited from the
    /// typedef chain
    pub fn effective_patterns<'a>(&'a self, ty: &'a Type) -> Vec<&'a Pattern> {
        let mut out = Vec::new();
        let mut t = ty;
        loop {
            if let TypeSpec::String { patterns, .. } = &t.spec {
                out.extend(patterns.iter());
            }
            match t.typedef {
                Some(td) => t = &self.typedef(td).typ,
                None => break,
            }
        }
        // Inherited patterns first, matching the order they were declared in
        out.reverse();
        out
    }

    /// The `error-message` of the nearest length/range restriction along the
    /// chain, if one was declared
    pub fn restriction_error_message(&self, ty: &Type) -> Option<Sym> {
        self.find_in_chain(ty, |spec| {
            spec.restriction().and_then(|r| r.error_message)
        })
    }

    fn find_in_chain<'a, T>(
        &'a self,
        ty: &'a Type,
        f: impl Fn(&'a TypeSpec) -> Option<T>,
    ) -> Option<T> {
        let mut t = ty;
        loop {
            if let Some(found) = f(&t.spec) {
                return Some(found);
            }
            match t.typedef {
                Some(td) => t = &self.typedef(td).typ,
                None => return None,
            }
        }
    }

    /// The `fraction-digits` of a decimal64 type, wherever in the chain the
    /// defining step sits
    pub fn fraction_digits(&self, ty: &Type) -> Option<u8> {
        self.find_in_chain(ty, |spec| match spec {
            TypeSpec::Dec64 {
                fraction_digits, ..
            } => Some(*fraction_digits),
            _ => None,
        })
    }

    /// The bit definitions of a bits type
    pub fn bit_defs<'a>(&'a self, ty: &'a Type) -> Option<&'a [BitDef]> {
        self.find_in_chain(ty, |spec| match spec {
            TypeSpec::Bits { bits } => Some(bits.as_slice()),
            _ => None,
        })
    }

    /// The member definitions of an enumeration type
    pub fn enum_defs<'a>(&'a self, ty: &'a Type) -> Option<&'a [EnumDef]> {
        self.find_in_chain(ty, |spec| match spec {
            TypeSpec::Enum { enums } => Some(enums.as_slice()),
            _ => None,
        })
    }

    /// The base identity of an identityref type
    pub fn identityref_base(&self, ty: &Type) -> Option<IdentityId> {
        self.find_in_chain(ty, |spec| match spec {
            TypeSpec::Identityref { base } => Some(*base),
            _ => None,
        })
    }

    /// The target path of a leafref type
    pub fn leafref_path(&self, ty: &Type) -> Option<Sym> {
        self.find_in_chain(ty, |spec| match spec {
            TypeSpec::Leafref { path } => Some(*path),
            _ => None,
        })
    }

    /// The non-union member types reachable from a union, in declaration
    /// order, nested unions flattened
    pub fn union_branches<'a>(&'a self, ty: &'a Type) -> Vec<&'a Type> {
        let mut out = Vec::new();
        self.collect_union_branches(ty, &mut out);
        out
    }

    fn collect_union_branches<'a>(&'a self, ty: &'a Type, out: &mut Vec<&'a Type>) {
        let before = out.len();
        if let TypeSpec::Union { branches } = &ty.spec {
            for branch in branches {
                if branch.base == TypeBase::Union {
                    self.collect_union_branches(branch, out);
                } else {
                    out.push(branch);
                }
            }
        }
        // A step that declared no branches of its own inherits the typedef's
        if out.len() == before {
            if let Some(td) = ty.typedef {
                self.collect_union_branches(&self.typedef(td).typ, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restrict_narrows_and_keeps_order() {
        let full = IntervalSet::for_base(TypeBase::Int8, 0).unwrap();
        let set = full.restrict("1..10 | 15").unwrap();
        assert_eq!(set, IntervalSet::Signed(vec![(1, 10), (15, 15)]));
        assert!(set.contains_signed(3));
        assert!(set.contains_signed(15));
        assert!(!set.contains_signed(11));
        assert!(!set.contains_signed(0));
    }

    #[test]
    fn min_max_resolve_to_current_bounds() {
        let full = IntervalSet::for_base(TypeBase::Uint16, 0).unwrap();
        let set = full.restrict("min..100").unwrap();
        assert_eq!(set, IntervalSet::Unsigned(vec![(0, 100)]));
        let narrower = set.restrict("50..max").unwrap();
        assert_eq!(narrower, IntervalSet::Unsigned(vec![(50, 100)]));
    }

    #[test]
    fn disjoint_restriction_is_rejected() {
        let full = IntervalSet::for_base(TypeBase::Uint8, 0).unwrap();
        let set = full.restrict("1..10").unwrap();
        assert!(set.restrict("20..30").is_err());
    }

    #[test]
    fn anchoring_leaves_open_ends_alone() {
        assert_eq!(anchored_pattern("[a-z]+"), "^[a-z]+$");
        assert_eq!(anchored_pattern(".*[a-z]"), ".*[a-z]$");
        assert_eq!(anchored_pattern("[a-z].*"), "^[a-z].*");
        assert_eq!(anchored_pattern(".*"), ".*");
    }
}
