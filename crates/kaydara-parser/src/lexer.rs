//! Lexer for ASCII FBX documents.

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{eof, map, opt, peek, recognize},
    sequence::{delimited, pair, terminated, tuple},
    IResult,
};

/// Parse a node key: a word followed by a colon (`Vertices:`).
pub fn key(input: &str) -> IResult<&str, &str> {
    terminated(
        take_while1(|c: char| c.is_alphanumeric() || c == '_'),
        char(':'),
    )(input)
}

/// A scalar literal on the right of a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Str(String),
    Int(i64),
    Float(f64),
    /// Unquoted word (`Y`, `T`, `W`).
    Word(String),
    /// Array length marker (`*24`).
    Count(usize),
}

fn separator(c: char) -> bool {
    c == ',' || c.is_whitespace()
}

fn quoted(input: &str) -> IResult<&str, Token> {
    map(
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        |s: &str| Token::Str(s.to_string()),
    )(input)
}

fn count(input: &str) -> IResult<&str, Token> {
    map(pair(char('*'), digit1), |(_, digits): (char, &str)| {
        Token::Count(digits.parse().unwrap_or(0))
    })(input)
}

/// Parse an integer or float, including exponents (`-1.5e-05`).
pub fn number(input: &str) -> IResult<&str, Token> {
    let (rest, text) = terminated(
        recognize(tuple((
            opt(one_of("+-")),
            digit1,
            opt(pair(char('.'), digit0)),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        peek(alt((eof, take_while1(separator)))),
    )(input)?;

    let token = match text.parse::<i64>() {
        Ok(int) => Token::Int(int),
        Err(_) => Token::Float(text.parse().unwrap_or(0.0)),
    };
    Ok((rest, token))
}

fn word(input: &str) -> IResult<&str, Token> {
    map(take_while1(|c: char| !separator(c) && c != '"'), |s: &str| {
        Token::Word(s.to_string())
    })(input)
}

fn token(input: &str) -> IResult<&str, Token> {
    alt((quoted, count, number, word))(input)
}

/// Split a value list (`"OO",3000,0`) into tokens.
///
/// Returns the unparsed remainder on failure.
pub fn tokens(input: &str) -> Result<Vec<Token>, String> {
    let mut rest = input;
    let mut out = Vec::new();
    loop {
        rest = rest.trim_start_matches(separator);
        if rest.is_empty() {
            return Ok(out);
        }
        match token(rest) {
            Ok((next, token)) => {
                out.push(token);
                rest = next;
            }
            Err(_) => return Err(rest.to_string()),
        }
    }
}

/// A trimmed line of input.
#[derive(Debug, Clone)]
pub struct Line<'a> {
    pub content: &'a str,
    pub line_number: usize,
}

/// Split input into lines, dropping blank and `;` comment lines.
pub fn split_lines(input: &str) -> Vec<Line<'_>> {
    input
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(';') {
                None
            } else {
                Some(Line {
                    content: trimmed,
                    line_number: i + 1,
                })
            }
        })
        .collect()
}
