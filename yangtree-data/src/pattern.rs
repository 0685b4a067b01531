use regex::Regex;
use yangtree_schema::anchored_pattern;

use crate::{DataError, ErrorKind};

/// A YANG pattern compiled to its anchored form
///
/// Patterns were compile-checked when the schema was ingested, so a failure
/// here is an internal inconsistency rather than a user error.
#[derive(Debug)]
pub(crate) struct CompiledPattern {
    regex: Regex,
}

impl CompiledPattern {
    pub fn compile(expr: &str, line: u32) -> Result<CompiledPattern, DataError> {
        let regex = Regex::new(&anchored_pattern(expr)).map_err(|e| {
            DataError::new(
                ErrorKind::Internal,
                line,
                format!("pattern \"{expr}\" no longer compiles: {e}"),
            )
        })?;
        Ok(CompiledPattern { regex })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}
