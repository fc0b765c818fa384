use pest::{Parser, iterators::Pair};
use pest_derive::Parser;
use strum::Display;

use crate::error::{Error, LexicalError, Location, Result};

#[derive(Parser)]
#[grammar = "src/template.pest"]
pub struct TemplateLexer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SpanKind {
    Text,
    Var,
    Block,
    Comment,
}

/// A classified piece of template source
///
/// For markers, `content` is the text between the delimiters and `location`
/// points at the opening delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span<'a> {
    pub kind: SpanKind,
    pub content: &'a str,
    pub location: Location,
}

impl Span<'_> {
    /// Location of the first character of `content`
    pub fn content_location(&self) -> Location {
        match self.kind {
            SpanKind::Text => self.location,
            SpanKind::Var | SpanKind::Block | SpanKind::Comment => {
                Location::new(self.location.line, self.location.column + 2)
            }
        }
    }
}

impl TemplateLexer {
    /// Split template source into spans, in source order
    pub fn tokenize(source: &str) -> Result<Vec<Span<'_>>> {
        let mut pairs = TemplateLexer::parse(Rule::template, source)
            .map_err(|e| Self::lexical_error(source, e))?;
        let Some(template) = pairs.next() else {
            return Ok(Vec::new());
        };

        Ok(template.into_inner().filter_map(Self::span).collect())
    }

    fn span(pair: Pair<'_, Rule>) -> Option<Span<'_>> {
        let (line, column) = pair.line_col();
        let location = Location::new(line, column);

        let kind = match pair.as_rule() {
            Rule::text => {
                return Some(Span {
                    kind: SpanKind::Text,
                    content: pair.as_str(),
                    location,
                });
            }
            Rule::var => SpanKind::Var,
            Rule::block => SpanKind::Block,
            Rule::comment => SpanKind::Comment,
            _ => return None,
        };

        let content = pair.into_inner().next().map_or("", |body| body.as_str());
        Some(Span {
            kind,
            content,
            location,
        })
    }

    fn lexical_error(source: &str, err: pest::error::Error<Rule>) -> Error {
        let offset = match err.location {
            pest::error::InputLocation::Pos(pos) => pos,
            pest::error::InputLocation::Span((start, _)) => start,
        };
        let kind = match err.variant {
            pest::error::ErrorVariant::ParsingError { .. } => {
                LexicalError::UnexpectedChar(source[offset..].chars().next().unwrap_or('\0'))
            }
            pest::error::ErrorVariant::CustomError { message } => LexicalError::Scanner(message),
        };
        Error::Lexical {
            kind,
            location: Location::new(1, 1).advance(&source[..offset]),
        }
    }
}
