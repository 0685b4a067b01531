use std::fmt::Display;

/// An error from reading YANG source text
///
/// Carries the position and a copy of the offending line, so it outlives
/// the source buffer it was produced from.
#[derive(Debug, PartialEq, Eq)]
pub struct ParseError {
    message: String,
    line: usize,
    column: usize,
    source_line: String,
}

impl ParseError {
    /// Builds an error pointing at `span`, which must be a slice of `text`
    pub(crate) fn at(message: String, text: &str, span: &str) -> ParseError {
        let pos = span.as_ptr() as usize - text.as_ptr() as usize;
        let line_start = text[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
        ParseError {
            message,
            line: text[..pos].chars().filter(|&c| c == '\n').count() + 1,
            column: pos - line_start,
            source_line: text[line_start..].lines().next().unwrap_or("").to_owned(),
        }
    }

    /// The 1-based source line the error points at
    pub fn line_number(&self) -> usize {
        self.line
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}:{}: {}", self.line, self.column + 1, self.message)?;
        writeln!(f, "  | {}", self.source_line)?;
        write!(f, "  | {0:1$}^", "", self.column)
    }
}

impl std::error::Error for ParseError {}
