use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{char, digit1, multispace1},
    combinator::{map, map_res, opt, recognize, value},
    error::{Error, ErrorKind},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
    IResult, Parser,
};

use super::ast::{Argument, ArgumentValue, Document, FieldSelection, InlineFragment, Selection};
use crate::errors::SyntaxError;
use crate::expression::common::{identifier, keyword, near};

// whitespace, commas and `#` comments carry no meaning
fn ignored(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            multispace1,
            tag(","),
            recognize(pair(char('#'), opt(is_not("\r\n")))),
        ))),
    )
    .parse(input)
}

fn token<'a, O, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = Error<&'a str>>
where
    F: Parser<&'a str, Output = O, Error = Error<&'a str>>,
{
    delimited(ignored, inner, ignored)
}

fn string_value(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = char('"').parse(input)?;
    let mut out = String::new();
    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None => return Err(nom::Err::Error(Error::new(rest, ErrorKind::Char))),
            Some('"') => return Ok((chars.as_str(), out)),
            Some('\\') => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(c @ ('"' | '\\' | '/')) => out.push(c),
                _ => return Err(nom::Err::Error(Error::new(rest, ErrorKind::Escaped))),
            },
            Some(c) => out.push(c),
        }
        rest = chars.as_str();
    }
}

fn argument_value(input: &str) -> IResult<&str, ArgumentValue> {
    alt((
        map(string_value, ArgumentValue::String),
        map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
            s.parse::<i64>().map(ArgumentValue::Int)
        }),
        map(preceded(char('$'), identifier), |name: &str| {
            ArgumentValue::Variable(name.to_string())
        }),
    ))
    .parse(input)
}

fn argument(input: &str) -> IResult<&str, Argument> {
    let (input, name) = token(identifier).parse(input)?;
    let (input, _) = token(char(':')).parse(input)?;
    let (input, value) = token(argument_value).parse(input)?;
    Ok((
        input,
        Argument {
            name: name.to_string(),
            value,
        },
    ))
}

fn arguments(input: &str) -> IResult<&str, Vec<Argument>> {
    delimited(token(char('(')), many0(argument), token(char(')'))).parse(input)
}

fn selection_set(input: &str) -> IResult<&str, Vec<Selection>> {
    delimited(token(char('{')), many0(selection), token(char('}'))).parse(input)
}

fn inline_fragment(input: &str) -> IResult<&str, Selection> {
    let (input, _) = token(tag("...")).parse(input)?;
    let (input, _) = token(keyword("on")).parse(input)?;
    let (input, type_condition) = token(identifier).parse(input)?;
    let (input, selections) = selection_set(input)?;
    Ok((
        input,
        Selection::InlineFragment(InlineFragment {
            type_condition: type_condition.to_string(),
            selections,
        }),
    ))
}

fn field(input: &str) -> IResult<&str, Selection> {
    let (input, first) = token(identifier).parse(input)?;
    let (input, aliased) = opt(preceded(token(char(':')), token(identifier))).parse(input)?;
    let (alias, name) = match aliased {
        Some(name) => (Some(first.to_string()), name.to_string()),
        None => (None, first.to_string()),
    };
    let (input, arguments) = opt(arguments).parse(input)?;
    let (input, selections) = opt(selection_set).parse(input)?;
    Ok((
        input,
        Selection::Field(FieldSelection {
            alias,
            name,
            arguments: arguments.unwrap_or_default(),
            selections,
        }),
    ))
}

fn selection(input: &str) -> IResult<&str, Selection> {
    alt((inline_fragment, field)).parse(input)
}

// optional `query [Name]` prefix
fn operation_header(input: &str) -> IResult<&str, ()> {
    value(
        (),
        opt(pair(token(keyword("query")), opt(terminated(identifier, ignored)))),
    )
    .parse(input)
}

/// Parse a query document
pub fn parse_document(text: &str) -> Result<Document, SyntaxError> {
    let parsed = (operation_header, selection_set, ignored).parse(text);
    match parsed {
        Ok((rest, (_, selections, _))) if rest.is_empty() => Ok(Document { selections }),
        Ok((rest, _)) => Err(SyntaxError::Document { near: near(rest) }),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(SyntaxError::Document { near: near(e.input) })
        }
        Err(nom::Err::Incomplete(_)) => Err(SyntaxError::Document { near: near("") }),
    }
}
