use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// 1-based line and column of a point in the template source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Advance over `text`, as if it started at this location
    pub fn advance(self, text: &str) -> Self {
        text.chars().fold(self, |loc, c| {
            if c == '\n' {
                Location::new(loc.line + 1, 1)
            } else {
                Location::new(loc.line, loc.column + 1)
            }
        })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("syntax error at {location}: {kind}")]
    Syntax { kind: SyntaxError, location: Location },

    #[error("lexical error at {location}: {kind}")]
    Lexical { kind: LexicalError, location: Location },

    #[error("lookup error at {location}: {kind}")]
    Lookup { kind: LookupError, location: Location },

    #[error("tag `{tag}` failed: {message}")]
    Tag { tag: String, message: String },

    #[error("invalid context: {0}")]
    Context(String),

    #[error("context serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    pub fn location(&self) -> Option<Location> {
        match self {
            Self::Syntax { location, .. }
            | Self::Lexical { location, .. }
            | Self::Lookup { location, .. } => Some(*location),
            _ => None,
        }
    }
}

/// Grammar violations found while compiling a template
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("expected {expected}, found {found}")]
    Unexpected { expected: &'static str, found: String },

    #[error("unclosed '[': expected ']', found end of expression")]
    UnclosedBracket,

    #[error("invalid number literal `{0}`")]
    InvalidNumber(String),

    #[error("nested deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("unknown tag `{0}`")]
    UnknownTag(String),

    #[error("tag `{name}` is never closed by `{end}`")]
    UnclosedTag { name: String, end: String },

    #[error("unexpected end tag `{0}`")]
    UnexpectedEndTag(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexicalError {
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    /// The scanner gave up for a reason other than the input itself
    #[error("scanner failed: {0}")]
    Scanner(String),
}

/// Failures resolving an expression against a context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("`{name}` is not defined in the context")]
    KeyNotFound { name: String },

    #[error("{type_name} has no attribute `{attribute}`")]
    AttributeNotFound {
        attribute: String,
        type_name: &'static str,
    },

    #[error("{type_name} has no item at index {index}")]
    IndexNotFound {
        index: String,
        type_name: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_advance() {
        let start = Location::new(1, 3);
        assert_eq!(start.advance(""), start);
        assert_eq!(start.advance("ab"), Location::new(1, 5));
        assert_eq!(start.advance("a\nbc"), Location::new(2, 3));
    }

    #[test]
    fn test_error_display() {
        let err = Error::Syntax {
            kind: SyntaxError::UnknownTag("frob".to_string()),
            location: Location::new(2, 7),
        };
        assert_eq!(
            err.to_string(),
            "syntax error at line 2, column 7: unknown tag `frob`"
        );
        assert_eq!(err.location(), Some(Location::new(2, 7)));
    }
}
