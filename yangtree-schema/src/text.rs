//! The YANG statement reader.
//!
//! YANG source is a uniform tree of statements: a keyword, an optional
//! argument, and either `;` or a braced block of substatements. This module
//! parses that surface grammar — quoting, string concatenation and comments
//! included — into an owned [`Ystmt`] tree. Interpreting the keywords is the
//! builder's job.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_till, take_until, take_while1},
    character::complete::{anychar, char, multispace1},
    combinator::{all_consuming, consumed, map, opt, recognize, verify},
    error::{VerboseError, VerboseErrorKind},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

pub(crate) mod builder;

mod error;
pub use error::ParseError;

/// One parsed YANG statement
#[derive(Debug, Clone)]
pub(crate) struct Ystmt {
    pub keyword: String,
    pub arg: Option<String>,
    pub line: u32,
    pub children: Vec<Ystmt>,
}

impl Ystmt {
    /// The first child with the given keyword
    pub fn child(&self, keyword: &str) -> Option<&Ystmt> {
        self.children.iter().find(|c| c.keyword == keyword)
    }

    /// The argument, or an error naming the statement
    pub fn arg(&self) -> anyhow::Result<&str> {
        self.arg.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "line {}: \"{}\" statement is missing its argument",
                self.line,
                self.keyword
            )
        })
    }
}

#[derive(Debug)]
struct Stmt<'t> {
    keyword: &'t str,
    arg: Option<String>,
    span: &'t str,
    children: Vec<Stmt<'t>>,
}

/// Parses a whole YANG source text into its single top-level statement
pub(crate) fn parse_text(text: &str) -> Result<Ystmt, ParseError> {
    let (_, stmt) =
        all_consuming(delimited(optsep, statement, optsep))(text).map_err(|e| {
            let e = match e {
                nom::Err::Error(e) | nom::Err::Failure(e) => e,
                nom::Err::Incomplete(_) => unreachable!(),
            };
            // The deepest entry names the actual point of failure; the rest
            // of the list is just the combinator stack above it
            match e.errors.first() {
                Some((remaining, kind)) => ParseError::at(
                    match kind {
                        VerboseErrorKind::Char(c) => format!("expected \"{c}\""),
                        VerboseErrorKind::Context(what) => format!("expected {what}"),
                        VerboseErrorKind::Nom(parser) => {
                            format!("invalid token while looking for {parser:?}")
                        }
                    },
                    text,
                    remaining,
                ),
                None => ParseError::at("empty input".to_owned(), text, text),
            }
        })?;
    Ok(into_owned(&stmt, text))
}

fn into_owned(stmt: &Stmt<'_>, text: &str) -> Ystmt {
    let offset = stmt.span.as_ptr() as usize - text.as_ptr() as usize;
    let line = text[..offset].chars().filter(|&c| c == '\n').count() as u32 + 1;
    Ystmt {
        keyword: stmt.keyword.to_owned(),
        arg: stmt.arg.clone(),
        line,
        children: stmt.children.iter().map(|c| into_owned(c, text)).collect(),
    }
}

fn statement(s: &str) -> Res<'_, Stmt<'_>> {
    map(
        consumed(tuple((
            keyword,
            opt(preceded(sep, argument)),
            preceded(
                optsep,
                alt((
                    map(char(';'), |_| Vec::new()),
                    delimited(
                        char('{'),
                        many0(preceded(optsep, statement)),
                        preceded(optsep, char('}')),
                    ),
                )),
            ),
        ))),
        |(span, (keyword, arg, children))| Stmt {
            keyword,
            arg,
            span,
            children,
        },
    )(s)
}

/// A statement keyword, possibly `prefix:identifier` for extensions
fn keyword(s: &str) -> Res<'_, &str> {
    recognize(pair(identifier, opt(pair(char(':'), identifier))))(s)
}

fn identifier(s: &str) -> Res<'_, &str> {
    verify(
        take_while1(|c: char| c.is_ascii_alphanumeric() || "_-.".contains(c)),
        |id: &str| id.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_'),
    )(s)
}

/// A statement argument: quoted parts joined by `+`, or a bare word
fn argument(s: &str) -> Res<'_, String> {
    alt((
        map(
            separated_list1(delimited(optsep, char('+'), optsep), quoted),
            |parts| parts.concat(),
        ),
        map(unquoted, str::to_owned),
    ))(s)
}

/// An unquoted argument runs to whitespace or structural punctuation
fn unquoted(s: &str) -> Res<'_, &str> {
    is_not(" \t\r\n;{}\"'")(s)
}

fn quoted(s: &str) -> Res<'_, String> {
    alt((double_quoted, single_quoted))(s)
}

/// Double quotes process the `\n`, `\t`, `\"` and `\\` escapes
fn double_quoted(s: &str) -> Res<'_, String> {
    map(
        delimited(
            char('"'),
            recognize(many0(alt((
                is_not("\\\""),
                recognize(pair(char('\\'), anychar)),
            )))),
            char('"'),
        ),
        unescape,
    )(s)
}

/// Single quotes are entirely literal
fn single_quoted(s: &str) -> Res<'_, String> {
    map(
        delimited(char('\''), opt(is_not("'")), char('\'')),
        |content: Option<&str>| content.unwrap_or("").to_owned(),
    )(s)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn line_comment(s: &str) -> Res<'_, &str> {
    recognize(pair(tag("//"), take_till(|c| c == '\r' || c == '\n')))(s)
}

fn block_comment(s: &str) -> Res<'_, &str> {
    recognize(tuple((tag("/*"), take_until("*/"), tag("*/"))))(s)
}

/// Mandatory separation: whitespace and comments
fn sep(s: &str) -> Res<'_, &str> {
    recognize(nom::multi::many1(alt((
        multispace1,
        line_comment,
        block_comment,
    ))))(s)
}

fn optsep(s: &str) -> Res<'_, &str> {
    recognize(many0(alt((multispace1, line_comment, block_comment))))(s)
}
