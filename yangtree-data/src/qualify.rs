//! Rewrites XML-prefixed qualified names inside values to module-name form.
//!
//! Identityref and instance-identifier values arrive carrying `prefix:name`
//! pairs whose prefixes only mean something in the originating element's
//! in-scope namespaces. This pass substitutes each prefix with the name of
//! the module bound to that prefix's namespace, producing the form the rest
//! of the library (and the deferred resolver) works with.

use yangtree_schema::{identifier_len, Context};

use crate::{DataError, ErrorKind};

/// Transforms every `prefix:` occurrence in `value`, resolving prefixes in
/// the in-scope namespaces of `elem`
pub(crate) fn transform_value(
    ctx: &Context,
    elem: roxmltree::Node<'_, '_>,
    value: &str,
    line: u32,
) -> Result<String, DataError> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    loop {
        let Some(col) = rest.find(':') else {
            out.push_str(rest);
            return Ok(out);
        };
        // Walk back over identifier characters to isolate the prefix,
        // bounded by the nearest path or predicate delimiter
        let before = &rest[..col];
        let start = before.rfind(['/', ' ', '[']).map(|i| i + 1).unwrap_or(0);
        let prefix = &before[start..];
        let ok = identifier_len(prefix);
        if prefix.is_empty() || ok < prefix.len() {
            let bad = prefix[ok..].chars().next().unwrap_or(':');
            return Err(DataError::new(
                ErrorKind::InvalidChar,
                line,
                format!("invalid character \"{bad}\" in \"{value}\""),
            ));
        }
        let Some(ns) = elem.lookup_namespace_uri(Some(prefix)) else {
            return Err(DataError::new(
                ErrorKind::InvalidValue,
                line,
                format!("XML namespace with prefix \"{prefix}\" not defined"),
            ));
        };
        let Some(module) = ctx.module_by_ns(ns) else {
            return Err(DataError::new(
                ErrorKind::InvalidValue,
                line,
                format!("module with the namespace \"{ns}\" could not be found"),
            ));
        };
        out.push_str(&rest[..start]);
        out.push_str(ctx.dict().resolve(ctx.module(module).name));
        out.push(':');
        rest = &rest[col + 1..];
    }
}
