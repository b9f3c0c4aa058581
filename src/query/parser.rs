//! RQL Parser
//!
//! Parses RQL query strings into the [`Node`] AST.
//!
//! # Supported Syntax
//!
//! ```text
//! query      := ε | and_chain
//! and_chain  := unary (("&" | ",") unary)*
//! or_chain   := and_chain (("|" | ";") and_chain)*
//! unary      := and(unary, unary, ...) | or(unary, unary, ...) | not(unary)
//!             | "(" or_chain ")" | expr_term
//! expr_term  := ordering | select | listing | searching | comparison | tuple
//! comparison := op(prop,val) | prop=op=val | prop=val
//! listing    := in(prop,(val,...)) | out(prop,(val,...))
//! searching  := like(prop,val) | ilike(prop,val)
//! ordering   := ordering([+|-]prop, ...)
//! select     := select([+|-]prop, ...)
//! tuple      := prop=tuple(comparison|searching, ...)
//! ```
//!
//! Properties match `[a-zA-Z][\w\-.]*`, so operator keywords are valid
//! property names wherever the grammar expects a property. Values are
//! `null()`, `empty()`, single/double quoted strings or unquoted tokens
//! matching `[\w\-*+\\][\w.\s\-:+@*\\]*`. No whitespace is skipped.

use lru::LruCache;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, one_of, satisfy},
    combinator::{map, opt, recognize, value, verify},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated},
    IResult,
};
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::query::ast::*;
use crate::query::error::{RqlError, RqlResult};

/// Parse a query string into an AST
///
/// An empty query yields `None`.
pub fn parse_query(input: &str) -> RqlResult<Option<Node>> {
    if input.is_empty() {
        return Ok(None);
    }

    match and_chain(input) {
        Ok((remaining, node)) => {
            if remaining.is_empty() {
                Ok(Some(node))
            } else {
                Err(RqlError::syntax(offset(input, remaining)))
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(RqlError::syntax(offset(input, e.input)))
        }
        Err(nom::Err::Incomplete(_)) => Err(RqlError::syntax(input.len())),
    }
}

fn offset(input: &str, remaining: &str) -> usize {
    input.len() - remaining.len()
}

/// Parse a chain of `&`/`,` separated terms
fn and_chain(input: &str) -> IResult<&str, Node> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(preceded(one_of("&,"), unary))(input)?;
    Ok((input, Node::and_of(first, rest)))
}

/// Parse a chain of `|`/`;` separated terms (only valid inside parentheses)
fn or_chain(input: &str) -> IResult<&str, Node> {
    let (input, first) = and_chain(input)?;
    let (input, rest) = many0(preceded(one_of("|;"), and_chain))(input)?;
    Ok((input, Node::or_of(first, rest)))
}

/// Parse a single operand of a logical chain
fn unary(input: &str) -> IResult<&str, Node> {
    alt((and_call, or_call, not_call, group, expr_term))(input)
}

/// Parse a parenthesized group
fn group(input: &str) -> IResult<&str, Node> {
    delimited(char('('), or_chain, char(')'))(input)
}

/// Parse `and(a,b,...)`
fn and_call(input: &str) -> IResult<&str, Node> {
    map(preceded(tag("and"), logical_args), |children| Node::Logical {
        op: LogicalOp::And,
        children,
    })(input)
}

/// Parse `or(a,b,...)`
fn or_call(input: &str) -> IResult<&str, Node> {
    map(preceded(tag("or"), logical_args), |children| Node::Logical {
        op: LogicalOp::Or,
        children,
    })(input)
}

/// Parse `not(a)`
fn not_call(input: &str) -> IResult<&str, Node> {
    map(
        preceded(tag("not"), delimited(char('('), unary, char(')'))),
        Node::not,
    )(input)
}

/// Parse the argument list of `and()`/`or()`: at least two operands
fn logical_args(input: &str) -> IResult<&str, Vec<Node>> {
    verify(
        delimited(char('('), separated_list1(char(','), unary), char(')')),
        |children: &Vec<Node>| children.len() >= 2,
    )(input)
}

/// Parse a non-logical expression
fn expr_term(input: &str) -> IResult<&str, Node> {
    alt((
        ordering,
        select,
        listing,
        searching,
        comparison_call,
        namespace_tuple,
        comparison_infix,
    ))(input)
}

/// Parse `ordering(...)`
fn ordering(input: &str) -> IResult<&str, Node> {
    map(preceded(tag("ordering"), signed_props), |props| {
        Node::Ordering { props }
    })(input)
}

/// Parse `select(...)`
fn select(input: &str) -> IResult<&str, Node> {
    map(preceded(tag("select"), signed_props), |props| Node::Select {
        props,
    })(input)
}

/// Parse `in(prop,(v1,v2))` / `out(prop,(v1,v2))`
fn listing(input: &str) -> IResult<&str, Node> {
    let (input, op) = alt((value(ListOp::In, tag("in")), value(ListOp::Out, tag("out"))))(input)?;
    let (input, _) = char('(')(input)?;
    let (input, prop) = prop(input)?;
    let (input, _) = char(',')(input)?;
    let (input, values) = delimited(char('('), separated_list1(char(','), val), char(')'))(input)?;
    let (input, _) = char(')')(input)?;

    Ok((
        input,
        Node::Listing {
            op,
            prop: prop.to_string(),
            values: values.into_iter().map(str::to_string).collect(),
        },
    ))
}

/// Parse `like(prop,val)` / `ilike(prop,val)`
fn searching(input: &str) -> IResult<&str, Node> {
    let (input, op) = alt((
        value(SearchOp::ILike, tag("ilike")),
        value(SearchOp::Like, tag("like")),
    ))(input)?;
    let (input, (prop, value)) = prop_value_args(input)?;

    Ok((
        input,
        Node::Searching {
            op,
            prop: prop.to_string(),
            value: value.to_string(),
        },
    ))
}

/// Parse `op(prop,val)`
fn comparison_call(input: &str) -> IResult<&str, Node> {
    let (input, op) = comparison_op(input)?;
    let (input, (prop, value)) = prop_value_args(input)?;
    Ok((input, Node::comparison(prop, op, value)))
}

/// Parse `prop=op=val` and `prop=val`
fn comparison_infix(input: &str) -> IResult<&str, Node> {
    let (input, prop) = prop(input)?;
    let (input, _) = char('=')(input)?;
    let (input, op) = opt(terminated(comparison_op, char('=')))(input)?;
    let (input, value) = val(input)?;
    Ok((input, Node::comparison(prop, op.unwrap_or(ComparisonOp::Eq), value)))
}

/// Parse `prop=tuple(...)`
fn namespace_tuple(input: &str) -> IResult<&str, Node> {
    let (input, prop) = prop(input)?;
    let (input, _) = tag("=tuple(")(input)?;
    let (input, children) = separated_list1(
        char(','),
        alt((searching, comparison_call, comparison_infix)),
    )(input)?;
    let (input, _) = char(')')(input)?;

    Ok((
        input,
        Node::NamespaceTuple {
            prop: prop.to_string(),
            children,
        },
    ))
}

/// Parse `(prop,val)`
fn prop_value_args(input: &str) -> IResult<&str, (&str, &str)> {
    delimited(char('('), separated_pair(prop, char(','), val), char(')'))(input)
}

/// Parse a comparison operator keyword
fn comparison_op(input: &str) -> IResult<&str, ComparisonOp> {
    alt((
        value(ComparisonOp::Eq, tag("eq")),
        value(ComparisonOp::Ne, tag("ne")),
        value(ComparisonOp::Gt, tag("gt")),
        value(ComparisonOp::Ge, tag("ge")),
        value(ComparisonOp::Lt, tag("lt")),
        value(ComparisonOp::Le, tag("le")),
    ))(input)
}

/// Parse `(+a,-b,c)`, possibly empty
fn signed_props(input: &str) -> IResult<&str, Vec<SignedProp>> {
    delimited(char('('), separated_list0(char(','), signed_prop), char(')'))(input)
}

/// Parse a property with an optional sign
fn signed_prop(input: &str) -> IResult<&str, SignedProp> {
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, prop) = prop(input)?;
    let sign = if sign == Some(RQL_MINUS) {
        Sign::Minus
    } else {
        Sign::Plus
    };
    Ok((
        input,
        SignedProp {
            prop: prop.to_string(),
            sign,
        },
    ))
}

/// Parse a property name
fn prop(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic()),
        take_while(is_prop_char),
    ))(input)
}

/// Parse a value, keeping quotes in the returned slice
fn val(input: &str) -> IResult<&str, &str> {
    alt((tag(RQL_NULL), tag(RQL_EMPTY), quoted, unquoted))(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    recognize(alt((
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
    )))(input)
}

fn unquoted(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(is_value_start), take_while(is_value_char)))(input)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_prop_char(c: char) -> bool {
    is_word_char(c) || c == '-' || c == '.'
}

fn is_value_start(c: char) -> bool {
    is_word_char(c) || matches!(c, '-' | '*' | '+' | '\\')
}

fn is_value_char(c: char) -> bool {
    is_word_char(c) || c.is_whitespace() || matches!(c, '.' | '-' | ':' | '+' | '@' | '*' | '\\')
}

/// Parser with a bounded LRU memo of parsed ASTs keyed by query text
///
/// Failed parses are not cached.
pub struct CachedParser {
    cache: Option<Mutex<LruCache<String, Option<Arc<Node>>>>>,
}

impl CachedParser {
    /// Default number of memoized ASTs
    pub const DEFAULT_CAPACITY: usize = 1000;

    /// Create a parser memoizing up to `capacity` ASTs (0 disables memoization)
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    /// Parse a query, serving repeated queries from the memo
    pub fn parse(&self, input: &str) -> RqlResult<Option<Arc<Node>>> {
        let Some(cache) = &self.cache else {
            return Ok(parse_query(input)?.map(Arc::new));
        };

        if let Some(ast) = cache.lock().get(input) {
            tracing::trace!(query = %input, "AST cache hit");
            return Ok(ast.clone());
        }

        let ast = parse_query(input)?.map(Arc::new);
        cache.lock().put(input.to_string(), ast.clone());
        Ok(ast)
    }

    /// Number of memoized ASTs
    pub fn len(&self) -> usize {
        self.cache.as_ref().map_or(0, |c| c.lock().len())
    }

    /// Check if the memo is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every memoized AST
    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().clear();
        }
    }
}

impl Default for CachedParser {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
