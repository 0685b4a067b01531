//! Shallow syntax checking for the XPath expressions held in `must` and
//! `when` statements.
//!
//! Full evaluation is out of scope; expressions are only checked for the
//! well-formedness problems that would make them unusable later: unbalanced
//! parentheses and brackets, unterminated literals, and emptiness.

use anyhow::{bail, Result};

/// Checks an XPath expression for gross syntax errors, reporting against the
/// given source line
pub fn syntax_check(expr: &str, line: u32) -> Result<()> {
    if expr.trim().is_empty() {
        bail!("line {line}: empty XPath expression");
    }
    let mut stack = Vec::new();
    let mut quote: Option<char> = None;
    for c in expr.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' | '[' => stack.push(c),
                ')' => {
                    if stack.pop() != Some('(') {
                        bail!("line {line}: unbalanced \")\" in \"{expr}\"");
                    }
                }
                ']' => {
                    if stack.pop() != Some('[') {
                        bail!("line {line}: unbalanced \"]\" in \"{expr}\"");
                    }
                }
                _ => {}
            },
        }
    }
    if quote.is_some() {
        bail!("line {line}: unterminated literal in \"{expr}\"");
    }
    if let Some(open) = stack.pop() {
        bail!("line {line}: unclosed \"{open}\" in \"{expr}\"");
    }
    Ok(())
}
