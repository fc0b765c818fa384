//! Tokens of a single marker's content and the pushback stream over them

use std::str::FromStr;

use pest::Parser;
use pest::error::ErrorVariant;
use pest_derive::Parser;
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{Error, LexicalError, Location, Result, SyntaxError};

#[derive(Parser)]
#[grammar = "src/token.pest"]
struct Scanner;

/// Coarse token classification produced by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TokenKind {
    #[strum(serialize = "name")]
    Name,
    #[strum(serialize = "number")]
    Number,
    #[strum(serialize = "string")]
    String,
    #[strum(serialize = "operator")]
    Operator,
    #[strum(serialize = "end of expression")]
    EndMarker,
}

/// Exact identity of an operator token, looked up from its text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
pub enum Punct {
    #[strum(serialize = "(")]
    LPar,
    #[strum(serialize = ")")]
    RPar,
    #[strum(serialize = "[")]
    LSqb,
    #[strum(serialize = "]")]
    RSqb,
    #[strum(serialize = ":")]
    Colon,
    #[strum(serialize = ",")]
    Comma,
    #[strum(serialize = ";")]
    Semi,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "*")]
    Star,
    #[strum(serialize = "/")]
    Slash,
    #[strum(serialize = "|")]
    VBar,
    #[strum(serialize = "&")]
    Amper,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = "=")]
    Equal,
    #[strum(serialize = ".")]
    Dot,
    #[strum(serialize = "%")]
    Percent,
    #[strum(serialize = "{")]
    LBrace,
    #[strum(serialize = "}")]
    RBrace,
    #[strum(serialize = "==")]
    EqEqual,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "<=")]
    LessEqual,
    #[strum(serialize = ">=")]
    GreaterEqual,
    #[strum(serialize = "~")]
    Tilde,
    #[strum(serialize = "^")]
    Circumflex,
    #[strum(serialize = "<<")]
    LeftShift,
    #[strum(serialize = ">>")]
    RightShift,
    #[strum(serialize = "**")]
    DoubleStar,
    #[strum(serialize = "+=")]
    PlusEqual,
    #[strum(serialize = "-=")]
    MinEqual,
    #[strum(serialize = "*=")]
    StarEqual,
    #[strum(serialize = "/=")]
    SlashEqual,
    #[strum(serialize = "%=")]
    PercentEqual,
    #[strum(serialize = "&=")]
    AmperEqual,
    #[strum(serialize = "|=")]
    VBarEqual,
    #[strum(serialize = "^=")]
    CircumflexEqual,
    #[strum(serialize = "<<=")]
    LeftShiftEqual,
    #[strum(serialize = ">>=")]
    RightShiftEqual,
    #[strum(serialize = "**=")]
    DoubleStarEqual,
    #[strum(serialize = "//")]
    DoubleSlash,
    #[strum(serialize = "//=")]
    DoubleSlashEqual,
    #[strum(serialize = "@")]
    At,
}

/// A token borrowed from the content it was scanned from
///
/// `start` and `end` are byte offsets into that content; `line` is the
/// physical line the token sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
    pub line: &'a str,
}

impl Token<'_> {
    /// Fine-grained operator identity; `None` for anything but operators
    pub fn punct(&self) -> Option<Punct> {
        match self.kind {
            TokenKind::Operator => Punct::from_str(self.text).ok(),
            TokenKind::Name | TokenKind::Number | TokenKind::String | TokenKind::EndMarker => None,
        }
    }

    pub fn is_punct(&self, punct: Punct) -> bool {
        self.punct() == Some(punct)
    }

    pub fn is_end(&self) -> bool {
        self.kind == TokenKind::EndMarker
    }

    /// How the token is named in diagnostics
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::EndMarker => self.kind.to_string(),
            _ => format!("{} `{}`", self.kind, self.text),
        }
    }
}

/// Lazily scanned tokens of one content string, with a LIFO pushback buffer
///
/// Pushed-back tokens are replayed before anything new is scanned. Once the
/// end marker has been produced every further call returns it again.
pub struct TokenStream<'a> {
    content: &'a str,
    origin: Location,
    offset: usize,
    finished: bool,
    pending: Vec<Token<'a>>,
    /// Byte range of the line the last scanned token sits on
    line: (usize, usize),
}

impl<'a> TokenStream<'a> {
    pub fn new(content: &'a str) -> Self {
        Self::with_origin(content, Location::new(1, 1))
    }

    /// Stream whose diagnostics are reported relative to `origin`, the
    /// location of the content's first character in the template.
    pub fn with_origin(content: &'a str, origin: Location) -> Self {
        Self {
            content,
            origin,
            offset: 0,
            finished: false,
            pending: Vec::new(),
            line: (0, line_end(content, 0)),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Token<'a>> {
        match self.pending.pop() {
            Some(token) => Ok(token),
            None => self.scan(),
        }
    }

    pub fn push(&mut self, token: Token<'a>) {
        self.pending.push(token);
    }

    /// Number of pushed-back tokens not yet replayed
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn location_of(&self, offset: usize) -> Location {
        self.origin.advance(&self.content[..offset])
    }

    pub fn syntax_error(&self, kind: SyntaxError, token: &Token<'_>) -> Error {
        Error::Syntax {
            kind,
            location: self.location_of(token.start),
        }
    }

    fn scan(&mut self) -> Result<Token<'a>> {
        if self.finished {
            return Ok(self.end_marker());
        }

        let rest = &self.content[self.offset..];
        let mut pairs = Scanner::parse(Rule::token, rest).map_err(|err| match err.variant {
            ErrorVariant::ParsingError { .. } => self.lexical_error(rest),
            ErrorVariant::CustomError { message } => Error::Lexical {
                kind: LexicalError::Scanner(message),
                location: self.location_of(self.offset),
            },
        })?;
        let scanned = pairs
            .next()
            .and_then(|pair| pair.into_inner().next())
            .and_then(|pair| {
                let kind = match pair.as_rule() {
                    Rule::name => TokenKind::Name,
                    Rule::number => TokenKind::Number,
                    Rule::string => TokenKind::String,
                    Rule::operator => TokenKind::Operator,
                    Rule::end_marker => TokenKind::EndMarker,
                    _ => return None,
                };
                let span = pair.as_span();
                Some((kind, span.start(), span.end()))
            });

        let Some((kind, start, end)) = scanned else {
            return Err(self.lexical_error(rest));
        };

        let (start, end) = (self.offset + start, self.offset + end);
        self.seek_line(start);
        self.offset = end;
        if kind == TokenKind::EndMarker {
            self.finished = true;
            return Ok(self.end_marker());
        }

        Ok(Token {
            kind,
            text: &self.content[start..end],
            start,
            end,
            line: self.current_line(),
        })
    }

    fn end_marker(&self) -> Token<'a> {
        let len = self.content.len();
        Token {
            kind: TokenKind::EndMarker,
            text: "",
            start: len,
            end: len,
            line: self.current_line(),
        }
    }

    /// Move the current line forward to the one holding `start`. Only the
    /// whitespace skipped since the last token can contain line breaks.
    fn seek_line(&mut self, start: usize) {
        if let Some(i) = self.content[self.offset..start].rfind('\n') {
            let begin = self.offset + i + 1;
            self.line = (begin, line_end(self.content, begin));
        }
    }

    fn current_line(&self) -> &'a str {
        &self.content[self.line.0..self.line.1]
    }

    fn lexical_error(&self, rest: &str) -> Error {
        let trimmed = rest.trim_start_matches([' ', '\t', '\r', '\n']);
        let offset = self.offset + (rest.len() - trimmed.len());
        let kind = match trimmed.chars().next() {
            Some('\'' | '"') => LexicalError::UnterminatedString,
            Some(c) => LexicalError::UnexpectedChar(c),
            None => LexicalError::UnexpectedChar('\0'),
        };
        Error::Lexical {
            kind,
            location: self.location_of(offset),
        }
    }
}

fn line_end(content: &str, begin: usize) -> usize {
    content[begin..].find('\n').map_or(content.len(), |i| begin + i)
}
