//! Tagset text format
//!
//! Parses and prints the canonical text form of tagsets.
//!
//! # Syntax
//!
//! ```text
//! tagset   := tag (',' tag)*       | <empty>
//! tag      := name ['=' value]
//! patterns := tagset (';' tagset)*
//! ```
//!
//! A bare `name` is a wildcard tag, `name=` carries the empty string. The
//! characters `\`, `=`, `,` and `;` inside names or values are escaped with a
//! backslash, so any tag content round-trips exactly.
//!
//! # Examples
//!
//! ```text
//! color=red,size=xl
//! run,site=lab\,north
//! color=red;color=blue
//! ```

use nom::{
    branch::alt,
    character::complete::{anychar, char, none_of},
    combinator::{map, opt, verify},
    multi::{fold_many0, separated_list0, separated_list1},
    sequence::{pair, preceded},
    IResult,
};

use crate::tagset::error::{TagsetError, TagsetResult};
use crate::tagset::types::{Tag, Tagset};

/// Characters that must be escaped inside names and values
const RESERVED: &str = "\\=,;";

/// Parse a single tagset
pub fn parse_tagset(input: &str) -> TagsetResult<Tagset> {
    finish(input, tagset(input))
}

/// Parse a `;`-separated list of tagsets
pub fn parse_tagsets(input: &str) -> TagsetResult<Vec<Tagset>> {
    finish(input, separated_list1(char(';'), tagset)(input))
}

/// Print the canonical text form of a tagset
pub fn format_tagset(tagset: &Tagset) -> String {
    let mut out = String::new();
    for (i, tag) in tagset.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        escape_into(&mut out, &tag.name);
        if let Some(value) = &tag.value {
            out.push('=');
            escape_into(&mut out, value);
        }
    }
    out
}

/// Print several tagsets joined with `;`
pub fn format_tagsets(tagsets: &[Tagset]) -> String {
    tagsets
        .iter()
        .map(format_tagset)
        .collect::<Vec<_>>()
        .join(";")
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        if RESERVED.contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
}

fn finish<T>(input: &str, result: IResult<&str, T>) -> TagsetResult<T> {
    match result {
        Ok((remaining, value)) if remaining.is_empty() => Ok(value),
        Ok((remaining, _)) => Err(TagsetError::Parse {
            offset: input.len() - remaining.len(),
            message: format!("unexpected input '{}'", remaining),
        }),
        Err(e) => Err(TagsetError::Parse {
            offset: 0,
            message: format!("{:?}", e),
        }),
    }
}

/// Unescaped run of characters (possibly empty)
fn text(input: &str) -> IResult<&str, String> {
    fold_many0(
        alt((none_of(RESERVED), preceded(char('\\'), anychar))),
        String::new,
        |mut acc, c| {
            acc.push(c);
            acc
        },
    )(input)
}

fn name(input: &str) -> IResult<&str, String> {
    verify(text, |s: &str| !s.is_empty())(input)
}

fn tag(input: &str) -> IResult<&str, Tag> {
    map(
        pair(name, opt(preceded(char('='), text))),
        |(name, value)| Tag { name, value },
    )(input)
}

fn tagset(input: &str) -> IResult<&str, Tagset> {
    map(separated_list0(char(','), tag), |tags| {
        tags.into_iter().collect::<Tagset>()
    })(input)
}
