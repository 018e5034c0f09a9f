//! Token stream over one SRC source file.
//!
//! The lexer tokenizes the whole file up front; [`Scanner`] then replays the
//! stream with the cursor semantics the translator relies on: `scan` advances
//! exactly one token, `peek` looks at the next raw character after the
//! current token, and a one-slot pushback lets a caller that over-read by one
//! token hand it back. Multi-character operators (`:=`, `==`, `+=`, …) arrive
//! as two single-character punctuation tokens; the translator reconstructs
//! them via `peek`.

use std::ops::Range;

use anyhow::{anyhow, Result};
use chumsky::prelude::*;
use enum_as_inner::EnumAsInner;
use itertools::Itertools;
use strum_macros::Display;

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumAsInner, Display)]
pub enum TokenKind {
    Ident,
    Int,
    Float,
    String,
    RawString,
    Comment,
    Punct(char),
    Eof,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Range<usize>,
}

fn lexer() -> impl Parser<char, Vec<(TokenKind, Range<usize>)>, Error = Simple<char>> {
    let line_comment = just("//")
        .then(none_of("\n").repeated())
        .to(TokenKind::Comment);
    let block_comment = just("/*").then(take_until(just("*/"))).to(TokenKind::Comment);

    let digits = filter(|c: &char| c.is_ascii_digit()).repeated().at_least(1);
    let hex = just('0')
        .then(one_of("xX"))
        .then(filter(|c: &char| c.is_ascii_hexdigit()).repeated().at_least(1))
        .to(TokenKind::Int);
    let exp = one_of("eE").then(one_of("+-").or_not()).then(digits.clone());
    let float = digits
        .clone()
        .then(just('.').then(digits.clone()))
        .then(exp.clone().or_not())
        .to(TokenKind::Float);
    let float_exp = digits.clone().then(exp).to(TokenKind::Float);
    let int = digits.clone().to(TokenKind::Int);

    let escape = just('\\').then(any());
    let string = just('"')
        .then(escape.ignored().or(none_of("\\\"").ignored()).repeated())
        .then(just('"'))
        .to(TokenKind::String);
    let raw_string = just('`')
        .then(none_of("`").repeated())
        .then(just('`'))
        .to(TokenKind::RawString);

    let ident = filter(|c: &char| c.is_ascii_alphabetic() || *c == '_')
        .then(filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_').repeated())
        .to(TokenKind::Ident);

    let punct = filter(|c: &char| !c.is_whitespace()).map(TokenKind::Punct);

    choice((
        line_comment,
        block_comment,
        hex,
        float,
        float_exp,
        int,
        string,
        raw_string,
        ident,
        punct,
    ))
    .map_with_span(|kind, span| (kind, span))
    .padded()
    .repeated()
    .then_ignore(end())
}

pub struct Scanner {
    file: String,
    src: String,
    tokens: Vec<(TokenKind, Range<usize>)>,
    next: usize,
    last: Token,
    skip_next_scan: bool,
    line_starts: Vec<usize>,
}

impl Scanner {
    pub fn new(src: &str, file: &str) -> Result<Scanner> {
        let tokens = lexer().parse(src).map_err(|errs| {
            anyhow!(
                "{file}: lex error: {}",
                errs.iter().map(|e| e.to_string()).join("; ")
            )
        })?;
        let line_starts = std::iter::once(0)
            .chain(
                src.bytes()
                    .enumerate()
                    .filter(|(_, b)| *b == b'\n')
                    .map(|(i, _)| i + 1),
            )
            .collect();
        Ok(Scanner {
            file: file.to_string(),
            src: src.to_string(),
            tokens,
            next: 0,
            last: Token {
                kind: TokenKind::Eof,
                text: Default::default(),
                span: 0..0,
            },
            skip_next_scan: false,
            line_starts,
        })
    }

    pub fn empty() -> Scanner {
        Scanner::new("", "<empty>").expect("empty source always lexes")
    }

    fn token_at(&self, i: usize) -> Token {
        match self.tokens.get(i) {
            Some((kind, span)) => Token {
                kind: *kind,
                text: self.src[span.clone()].to_string(),
                span: span.clone(),
            },
            None => Token {
                kind: TokenKind::Eof,
                text: Default::default(),
                span: self.src.len()..self.src.len(),
            },
        }
    }

    /// Advances one token, masking comments.
    pub fn scan(&mut self) -> TokenKind {
        self.scan_inner(true)
    }

    /// Advances one token with comments un-masked.
    pub fn scan_with_comments(&mut self) -> TokenKind {
        self.scan_inner(false)
    }

    fn scan_inner(&mut self, skip_comments: bool) -> TokenKind {
        if self.skip_next_scan {
            self.skip_next_scan = false;
            return self.last.kind;
        }
        loop {
            let t = self.token_at(self.next);
            if self.next < self.tokens.len() {
                self.next += 1;
            }
            if skip_comments && t.kind.is_comment() {
                continue;
            }
            self.last = t;
            return self.last.kind;
        }
    }

    /// Makes the next `scan` yield the current token again. One slot only:
    /// every caller that over-reads does so by at most one token.
    pub fn push_back(&mut self) {
        self.skip_next_scan = true;
    }

    /// The next raw character after the current token, `'\0'` at EOF.
    pub fn peek(&self) -> char {
        self.src[self.last.span.end..].chars().next().unwrap_or('\0')
    }

    pub fn kind(&self) -> TokenKind {
        self.last.kind
    }

    pub fn token_text(&self) -> &str {
        &self.last.text
    }

    pub fn line(&self) -> usize {
        self.line_col(self.last.span.start).0
    }

    /// `file:line:column` of the current token, for unknown-token comments.
    pub fn position(&self) -> String {
        let (line, col) = self.line_col(self.last.span.start);
        format!("{}:{}:{}", self.file, line, col)
    }

    fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = self.line_starts.partition_point(|s| *s <= offset) - 1;
        (line + 1, offset - self.line_starts[line] + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut s = Scanner::new(src, "test.go").unwrap();
        let mut out = Vec::new();
        loop {
            let k = s.scan();
            if k.is_eof() {
                return out;
            }
            out.push(k);
        }
    }

    #[test]
    fn classifies_literals() {
        assert_eq!(
            kinds("x 12 1.5 0x1F \"s\" `raw`"),
            vec![
                TokenKind::Ident,
                TokenKind::Int,
                TokenKind::Float,
                TokenKind::Int,
                TokenKind::String,
                TokenKind::RawString,
            ]
        );
    }

    #[test]
    fn two_char_operators_arrive_split() {
        assert_eq!(
            kinds("a := 1"),
            vec![
                TokenKind::Ident,
                TokenKind::Punct(':'),
                TokenKind::Punct('='),
                TokenKind::Int,
            ]
        );
    }

    #[test]
    fn comments_are_masked_unless_requested() {
        let mut s = Scanner::new("a // hi\nb", "t.go").unwrap();
        assert_eq!(s.scan(), TokenKind::Ident);
        assert_eq!(s.scan(), TokenKind::Ident);
        assert_eq!(s.token_text(), "b");

        let mut s = Scanner::new("a // hi\nb", "t.go").unwrap();
        assert_eq!(s.scan_with_comments(), TokenKind::Ident);
        assert_eq!(s.scan_with_comments(), TokenKind::Comment);
        assert_eq!(s.token_text(), "// hi");
    }

    #[test]
    fn peek_sees_the_next_raw_char() {
        let mut s = Scanner::new("f(x)\ny", "t.go").unwrap();
        s.scan();
        assert_eq!(s.peek(), '(');
        s.scan(); // (
        s.scan(); // x
        s.scan(); // )
        assert_eq!(s.peek(), '\n');
    }

    #[test]
    fn push_back_replays_one_token() {
        let mut s = Scanner::new("a b", "t.go").unwrap();
        s.scan();
        assert_eq!(s.token_text(), "a");
        s.push_back();
        s.scan();
        assert_eq!(s.token_text(), "a");
        s.scan();
        assert_eq!(s.token_text(), "b");
    }

    #[test]
    fn string_literals_keep_their_quotes() {
        let mut s = Scanner::new("\"a b\"", "t.go").unwrap();
        s.scan();
        assert_eq!(s.token_text(), "\"a b\"");
    }

    #[test]
    fn positions_are_one_based() {
        let mut s = Scanner::new("a\n  b", "t.go").unwrap();
        s.scan();
        s.scan();
        assert_eq!(s.position(), "t.go:2:3");
        assert_eq!(s.line(), 2);
    }
}
