use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_until, take_while, take_while1},
    character::complete::{char, digit1, multispace0, satisfy},
    combinator::{map, map_res, not, opt, peek, recognize},
    error::ParseError,
    sequence::{delimited, pair, terminated},
    IResult, Parser,
};

use crate::query_builder::Literal;

pub fn ws<'a, O, E: ParseError<&'a str>, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
{
    delimited(multispace0, inner, multispace0)
}

pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

// letter or underscore, then letters, digits or underscores
// e.g. "title", "uid_local", "__typename"
pub fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_identifier_char),
    ))
    .parse(input)
}

/// Case-insensitive keyword that is not the prefix of a longer identifier
pub fn keyword<'a>(word: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(tag_no_case(word), not(peek(satisfy(is_identifier_char))))
}

/// Parse a numeric literal: 123, -123, 3.14, -3.14
fn numeric_literal(input: &str) -> IResult<&str, Literal> {
    alt((
        map_res(
            recognize((opt(char('-')), digit1, char('.'), digit1)),
            |s: &str| s.parse::<f64>().map(Literal::Float),
        ),
        map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
            s.parse::<i64>().map(Literal::Int)
        }),
    ))
    .parse(input)
}

// backtick-quoted, no escapes
fn string_literal(input: &str) -> IResult<&str, Literal> {
    map(delimited(char('`'), take_until("`"), char('`')), |s: &str| {
        Literal::String(s.to_string())
    })
    .parse(input)
}

pub fn literal(input: &str) -> IResult<&str, Literal> {
    alt((
        string_literal,
        numeric_literal,
        map(keyword("null"), |_| Literal::Null),
    ))
    .parse(input)
}

/// First characters of `input`, for error messages
pub fn near(input: &str) -> String {
    let trimmed = input.trim_start();
    if trimmed.is_empty() {
        return "end of input".to_string();
    }
    trimmed.chars().take(24).collect()
}
