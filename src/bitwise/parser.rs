// nom parser for the memory layout language

use super::schema::SchemaError;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit1, hex_digit1, multispace1, not_line_ending},
    combinator::{all_consuming, map_res, opt, recognize, value},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};

/// One declared name inside a field or struct declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub name: String,
    /// `[n]` suffix
    pub count: Option<u64>,
    /// `:n` suffix
    pub bits: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub ty: String,
    pub items: Vec<Item>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDecl {
    pub members: Vec<Directive>,
    pub name: String,
    pub count: Option<u64>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    SeekTo { target: u64, line: usize },
    Field(FieldDecl),
    Struct(StructDecl),
}

/// Whitespace and `//` comments
fn ws(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), pair(tag("//"), not_line_ending)),
        ))),
    )
    .parse(input)
}

pub(crate) fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

pub(crate) fn number(input: &str) -> IResult<&str, u64> {
    alt((
        map_res(preceded(alt((tag("0x"), tag("0X"))), hex_digit1), |digits: &str| {
            u64::from_str_radix(digits, 16)
        }),
        map_res(digit1, |digits: &str| digits.parse::<u64>()),
    ))
    .parse(input)
}

/// `[n]`
fn subscript(input: &str) -> IResult<&str, u64> {
    delimited((char('['), ws), number, (ws, char(']'))).parse(input)
}

fn item(input: &str) -> IResult<&str, Item> {
    let (input, name) = identifier(input)?;
    let (input, count) = opt(preceded(ws, subscript)).parse(input)?;
    let (input, bits) = opt(preceded((ws, char(':'), ws), number)).parse(input)?;
    Ok((
        input,
        Item {
            name: name.to_string(),
            count,
            bits,
        },
    ))
}

/// Tracks the source so directives can report their line numbers
struct LayoutParser<'a> {
    src: &'a str,
}

impl<'a> LayoutParser<'a> {
    fn line_of(&self, rest: &str) -> usize {
        let consumed = self.src.len().saturating_sub(rest.len());
        self.src[..consumed].matches('\n').count() + 1
    }

    fn seekto(&self, input: &'a str) -> IResult<&'a str, Directive> {
        let line = self.line_of(input);
        let (input, target) = delimited((tag("#seekto"), ws), number, (ws, char(';'))).parse(input)?;
        Ok((input, Directive::SeekTo { target, line }))
    }

    fn field(&self, input: &'a str) -> IResult<&'a str, Directive> {
        let line = self.line_of(input);
        let (input, (ty, _)) = (identifier, multispace1).parse(input)?;
        let (input, items) = separated_list1((ws, char(','), ws), item).parse(input)?;
        let (input, _) = (ws, char(';')).parse(input)?;
        Ok((
            input,
            Directive::Field(FieldDecl {
                ty: ty.to_string(),
                items,
                line,
            }),
        ))
    }

    fn structure(&self, input: &'a str) -> IResult<&'a str, Directive> {
        let line = self.line_of(input);
        let (input, _) = (tag("struct"), ws, char('{')).parse(input)?;
        let (input, members) = many0(preceded(ws, |i: &'a str| self.directive(i))).parse(input)?;
        let (input, _) = (ws, char('}'), ws).parse(input)?;
        let (input, name) = identifier(input)?;
        let (input, count) = opt(preceded(ws, subscript)).parse(input)?;
        let (input, _) = (ws, char(';')).parse(input)?;
        Ok((
            input,
            Directive::Struct(StructDecl {
                members,
                name: name.to_string(),
                count,
                line,
            }),
        ))
    }

    fn directive(&self, input: &'a str) -> IResult<&'a str, Directive> {
        alt((
            |i: &'a str| self.seekto(i),
            |i: &'a str| self.structure(i),
            |i: &'a str| self.field(i),
        ))
        .parse(input)
    }
}

/// Parse layout text into its directive list
pub fn parse_layout(src: &str) -> Result<Vec<Directive>, SchemaError> {
    let parser = LayoutParser { src };
    let mut directives = Vec::new();
    let mut rest = src;

    loop {
        // ws cannot fail; it matches the empty string
        if let Ok((remaining, _)) = ws(rest) {
            rest = remaining;
        }
        if rest.is_empty() {
            break;
        }

        match parser.directive(rest) {
            Ok((remaining, directive)) => {
                directives.push(directive);
                rest = remaining;
            }
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                return Err(syntax_error(&parser, rest, e.input));
            }
            Err(nom::Err::Incomplete(_)) => {
                return Err(syntax_error(&parser, rest, rest));
            }
        }
    }

    Ok(directives)
}

/// Reported against the line where the failing directive starts
fn syntax_error(parser: &LayoutParser<'_>, start: &str, at: &str) -> SchemaError {
    let near: String = at.lines().next().unwrap_or("").chars().take(32).collect();
    SchemaError::Syntax {
        line: parser.line_of(start),
        message: if near.is_empty() {
            "unexpected end of input".to_string()
        } else {
            format!("unexpected input near `{}`", near.trim())
        },
    }
}

/// Segment of a concrete address such as `memory[12]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSegment {
    pub name: String,
    pub index: Option<u64>,
}

/// Parse `memory[12].name[3]` into its segments
pub fn parse_address(address: &str) -> Option<Vec<AddressSegment>> {
    let segment = pair(identifier, opt(subscript));
    let result = all_consuming(separated_list1(char('.'), segment)).parse(address.trim());
    let (_, segments) = result.ok()?;

    Some(
        segments
            .into_iter()
            .map(|(name, index)| AddressSegment {
                name: name.to_string(),
                index,
            })
            .collect(),
    )
}
