//! Parser for instance-identifier and leafref data paths.
//!
//! Paths arrive in module-qualified form (`/module:node[key='value']/leaf`),
//! the prefixes having been rewritten on the way in. Steps may carry key
//! predicates, leaf-list value predicates (`[.='value']`) and positional
//! predicates.

use nom::{
    branch::alt,
    bytes::complete::{is_not, take_while1},
    character::complete::{char, digit1, space0},
    combinator::{all_consuming, map, opt, verify},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated},
    IResult,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Predicate {
    /// `[key='value']`
    Key {
        module: Option<String>,
        name: String,
        value: String,
    },
    /// `[.='value']`
    Value(String),
    /// `[3]` (1-based)
    Position(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NodeStep {
    pub module: Option<String>,
    pub name: String,
    pub predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Step {
    /// `..`
    Up,
    Node(NodeStep),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DataPath {
    pub absolute: bool,
    pub steps: Vec<Step>,
}

/// Parses a data path, `None` when it does not conform
pub(crate) fn parse_data_path(input: &str) -> Option<DataPath> {
    let trimmed = input.trim();
    let (absolute, body) = match trimmed.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (_, steps) = all_consuming(separated_list1(char('/'), step))(body).ok()?;
    Some(DataPath { absolute, steps })
}

fn step(s: &str) -> IResult<&str, Step> {
    alt((
        map(verify(take_while1(|c| c == '.'), |d: &str| d == ".."), |_| {
            Step::Up
        }),
        map(node_step, Step::Node),
    ))(s)
}

fn node_step(s: &str) -> IResult<&str, NodeStep> {
    map(pair(qname, many0(predicate)), |((module, name), predicates)| {
        NodeStep {
            module: module.map(str::to_owned),
            name: name.to_owned(),
            predicates,
        }
    })(s)
}

fn qname(s: &str) -> IResult<&str, (Option<&str>, &str)> {
    pair(opt(terminated(identifier, char(':'))), identifier)(s)
}

fn identifier(s: &str) -> IResult<&str, &str> {
    verify(
        take_while1(|c: char| c.is_ascii_alphanumeric() || "_-.".contains(c)),
        |id: &str| {
            id.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') && id != ".."
        },
    )(s)
}

fn predicate(s: &str) -> IResult<&str, Predicate> {
    delimited(
        pair(char('['), space0),
        alt((
            map(
                preceded(char('.'), preceded(eq, quoted)),
                |value| Predicate::Value(value.to_owned()),
            ),
            map(separated_pair(qname, eq, quoted), |((module, name), value)| {
                Predicate::Key {
                    module: module.map(str::to_owned),
                    name: name.to_owned(),
                    value: value.to_owned(),
                }
            }),
            map(digit1, |d: &str| Predicate::Position(d.parse().unwrap_or(0))),
        )),
        pair(space0, char(']')),
    )(s)
}

fn eq(s: &str) -> IResult<&str, char> {
    delimited(space0, char('='), space0)(s)
}

fn quoted(s: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('\''), map(opt(is_not("'")), Option::unwrap_or_default), char('\'')),
        delimited(char('"'), map(opt(is_not("\"")), Option::unwrap_or_default), char('"')),
    ))(s)
}
