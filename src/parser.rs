//! Recursive-descent parsing of marker content
//!
//! ```text
//! expr    := atom trailer*
//! atom    := STRING | NUMBER | NAME
//! trailer := '.' NAME | '[' expr ']'
//! ```

use crate::ast::Expr;
use crate::error::{Result, SyntaxError};
use crate::token::{Punct, Token, TokenKind, TokenStream};
use crate::value::Value;

/// Default bound on `[ ... ]` nesting
pub const DEFAULT_MAX_DEPTH: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct ExpressionParser {
    max_depth: usize,
}

impl Default for ExpressionParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl ExpressionParser {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Parse one expression
    ///
    /// Stops at the end marker or at the first token that cannot extend the
    /// expression; that token is pushed back for the caller.
    pub fn parse(&self, stream: &mut TokenStream<'_>) -> Result<Expr> {
        self.parse_expr(stream, 0)
    }

    fn parse_expr(&self, stream: &mut TokenStream<'_>, depth: usize) -> Result<Expr> {
        let token = stream.next()?;
        let atom = Self::atom(stream, &token)?;
        self.parse_trailers(stream, atom, depth)
    }

    /// Extend an already parsed expression with `.name` and `[expr]` trailers
    pub fn parse_trailers(
        &self,
        stream: &mut TokenStream<'_>,
        mut expr: Expr,
        depth: usize,
    ) -> Result<Expr> {
        loop {
            let token = stream.next()?;
            match (token.kind, token.punct()) {
                (TokenKind::EndMarker, _) => return Ok(expr),
                (TokenKind::Operator, Some(Punct::Dot)) => {
                    let name = stream.next()?;
                    if name.kind != TokenKind::Name {
                        return Err(stream.syntax_error(
                            SyntaxError::Unexpected {
                                expected: "a name after '.'",
                                found: name.describe(),
                            },
                            &name,
                        ));
                    }
                    expr = Expr::Attribute(Box::new(expr), name.text.to_string());
                }
                (TokenKind::Operator, Some(Punct::LSqb)) => {
                    if depth >= self.max_depth {
                        return Err(stream
                            .syntax_error(SyntaxError::NestingTooDeep(self.max_depth), &token));
                    }
                    let first = stream.next()?;
                    if first.is_end() {
                        return Err(stream.syntax_error(SyntaxError::UnclosedBracket, &token));
                    }
                    unread(stream, first);

                    let key = self.parse_expr(stream, depth + 1)?;
                    let close = stream.next()?;
                    if !close.is_punct(Punct::RSqb) {
                        return Err(stream.syntax_error(
                            SyntaxError::Unexpected {
                                expected: "']'",
                                found: close.describe(),
                            },
                            &close,
                        ));
                    }
                    expr = Expr::Index(Box::new(expr), Box::new(key));
                }
                _ => {
                    unread(stream, token);
                    return Ok(expr);
                }
            }
        }
    }

    fn atom(stream: &TokenStream<'_>, token: &Token<'_>) -> Result<Expr> {
        match token.kind {
            TokenKind::String => {
                // Quotes are single ASCII bytes; escapes are kept verbatim
                let inner = &token.text[1..token.text.len() - 1];
                Ok(Expr::Literal(Value::String(inner.to_string())))
            }
            TokenKind::Number => Self::number(stream, token),
            TokenKind::Name => Ok(Expr::Lookup(token.text.to_string())),
            TokenKind::Operator | TokenKind::EndMarker => Err(stream.syntax_error(
                SyntaxError::Unexpected {
                    expected: "a literal or name",
                    found: token.describe(),
                },
                token,
            )),
        }
    }

    fn number(stream: &TokenStream<'_>, token: &Token<'_>) -> Result<Expr> {
        let value = if token.text.contains('.') {
            token.text.parse().ok().map(Value::Float)
        } else {
            token.text.parse().ok().map(Value::Int)
        };
        value.map(Expr::Literal).ok_or_else(|| {
            stream.syntax_error(SyntaxError::InvalidNumber(token.text.to_string()), token)
        })
    }
}

/// Name and arguments of a `{% ... %}` block
#[derive(Debug, Clone, PartialEq)]
pub struct TagHeader {
    pub name: String,
    pub args: Vec<Expr>,
    pub kwargs: Vec<(String, Expr)>,
}

/// Parses `name (key '=' expr | expr)*`, arguments optionally comma separated
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockTagParser {
    expr: ExpressionParser,
}

impl BlockTagParser {
    pub fn new(expr: ExpressionParser) -> Self {
        Self { expr }
    }

    /// Parse a whole tag header
    pub fn parse(&self, stream: &mut TokenStream<'_>) -> Result<TagHeader> {
        let name = self.parse_name(stream)?;
        self.parse_args(stream, name.text)
    }

    pub fn parse_name<'a>(&self, stream: &mut TokenStream<'a>) -> Result<Token<'a>> {
        let name = stream.next()?;
        if name.kind != TokenKind::Name {
            return Err(stream.syntax_error(
                SyntaxError::Unexpected {
                    expected: "a tag name",
                    found: name.describe(),
                },
                &name,
            ));
        }
        Ok(name)
    }

    /// Parse the arguments following an already consumed tag name
    pub fn parse_args(&self, stream: &mut TokenStream<'_>, name: &str) -> Result<TagHeader> {
        let mut header = TagHeader {
            name: name.to_string(),
            args: Vec::new(),
            kwargs: Vec::new(),
        };

        loop {
            let token = stream.next()?;
            match (token.kind, token.punct()) {
                (TokenKind::EndMarker, _) => return Ok(header),
                (TokenKind::Operator, Some(Punct::Comma)) => {}
                (TokenKind::Name, _) => {
                    let next = stream.next()?;
                    if next.is_punct(Punct::Equal) {
                        let value = self.expr.parse(stream)?;
                        header.kwargs.push((token.text.to_string(), value));
                    } else {
                        // A bare name starts a positional argument
                        unread(stream, next);
                        let lookup = Expr::Lookup(token.text.to_string());
                        header.args.push(self.expr.parse_trailers(stream, lookup, 0)?);
                    }
                }
                _ => {
                    unread(stream, token);
                    header.args.push(self.expr.parse(stream)?);
                }
            }
        }
    }
}

/// The parser never holds more than one token back
fn unread<'a>(stream: &mut TokenStream<'a>, token: Token<'a>) {
    debug_assert_eq!(stream.pending(), 0, "more than one token pushed back");
    stream.push(token);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn parse(content: &str) -> Result<Expr> {
        ExpressionParser::default().parse(&mut TokenStream::new(content))
    }

    fn lookup(name: &str) -> Box<Expr> {
        Box::new(Expr::Lookup(name.to_string()))
    }

    fn syntax_kind(err: Error) -> SyntaxError {
        match err {
            Error::Syntax { kind, .. } => kind,
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse("'x'").unwrap(), Expr::Literal(Value::from("x")));
        assert_eq!(parse(r#" "a\nb" "#).unwrap(), Expr::Literal(Value::from(r"a\nb")));
        assert_eq!(parse("3").unwrap(), Expr::Literal(Value::Int(3)));
        assert_eq!(parse("3.5").unwrap(), Expr::Literal(Value::Float(3.5)));
        assert_eq!(parse("4.").unwrap(), Expr::Literal(Value::Float(4.0)));
    }

    #[test]
    fn test_parse_name_is_deferred_lookup() {
        assert_eq!(parse(" name ").unwrap(), Expr::Lookup("name".to_string()));
    }

    #[test]
    fn test_parse_trailers_left_associative() {
        assert_eq!(
            parse("a.b[c].d").unwrap(),
            Expr::Attribute(
                Box::new(Expr::Index(
                    Box::new(Expr::Attribute(lookup("a"), "b".to_string())),
                    lookup("c"),
                )),
                "d".to_string(),
            )
        );
    }

    #[test]
    fn test_parse_nested_index() {
        assert_eq!(
            parse("a[b[0]]").unwrap(),
            Expr::Index(
                lookup("a"),
                Box::new(Expr::Index(
                    lookup("b"),
                    Box::new(Expr::Literal(Value::Int(0)))
                )),
            )
        );
    }

    #[test]
    fn test_parse_pushes_back_foreign_token() {
        let mut stream = TokenStream::new("a.b + c");
        let expr = ExpressionParser::default().parse(&mut stream).unwrap();
        assert_eq!(expr, Expr::Attribute(lookup("a"), "b".to_string()));
        assert_eq!(stream.pending(), 1);
        assert!(stream.next().unwrap().is_punct(Punct::Plus));
        assert_eq!(stream.next().unwrap().text, "c");
    }

    #[test]
    fn test_bad_leading_token() {
        let err = parse("[a]").unwrap_err();
        assert_eq!(
            syntax_kind(err),
            SyntaxError::Unexpected {
                expected: "a literal or name",
                found: "operator `[`".to_string(),
            }
        );
        assert!(matches!(
            syntax_kind(parse("").unwrap_err()),
            SyntaxError::Unexpected { .. }
        ));
    }

    #[test]
    fn test_dot_requires_name() {
        let err = parse("a.'b'").unwrap_err();
        assert_eq!(
            syntax_kind(err),
            SyntaxError::Unexpected {
                expected: "a name after '.'",
                found: "string `'b'`".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_close_bracket() {
        assert_eq!(syntax_kind(parse("a[").unwrap_err()), SyntaxError::UnclosedBracket);
        assert_eq!(
            syntax_kind(parse("a[b c]").unwrap_err()),
            SyntaxError::Unexpected {
                expected: "']'",
                found: "name `c`".to_string(),
            }
        );
        assert_eq!(
            syntax_kind(parse("a[b").unwrap_err()),
            SyntaxError::Unexpected {
                expected: "']'",
                found: "end of expression".to_string(),
            }
        );
    }

    #[test]
    fn test_nesting_limit() {
        let parser = ExpressionParser::new(1);
        assert!(parser.parse(&mut TokenStream::new("a[b]")).is_ok());
        let err = parser.parse(&mut TokenStream::new("a[b[c]]")).unwrap_err();
        assert_eq!(syntax_kind(err), SyntaxError::NestingTooDeep(1));
    }

    #[test]
    fn test_invalid_number() {
        let err = parse("99999999999999999999").unwrap_err();
        assert_eq!(
            syntax_kind(err),
            SyntaxError::InvalidNumber("99999999999999999999".to_string())
        );
    }

    #[test]
    fn test_tag_header() {
        let mut stream = TokenStream::new(" include 'nav' items[0], title = page.title level=2 ");
        let header = BlockTagParser::default().parse(&mut stream).unwrap();
        assert_eq!(header.name, "include");
        assert_eq!(
            header.args,
            vec![
                Expr::Literal(Value::from("nav")),
                Expr::Index(lookup("items"), Box::new(Expr::Literal(Value::Int(0)))),
            ]
        );
        assert_eq!(
            header.kwargs,
            vec![
                (
                    "title".to_string(),
                    Expr::Attribute(lookup("page"), "title".to_string())
                ),
                ("level".to_string(), Expr::Literal(Value::Int(2))),
            ]
        );
    }

    #[test]
    fn test_tag_header_bare_names() {
        let mut stream = TokenStream::new("cycle a b");
        let header = BlockTagParser::default().parse(&mut stream).unwrap();
        assert_eq!(header.args, vec![*lookup("a"), *lookup("b")]);
        assert!(header.kwargs.is_empty());
    }

    #[test]
    fn test_tag_header_requires_name() {
        let err = BlockTagParser::default()
            .parse(&mut TokenStream::new(" 'x' "))
            .unwrap_err();
        assert_eq!(
            syntax_kind(err),
            SyntaxError::Unexpected {
                expected: "a tag name",
                found: "string `'x'`".to_string(),
            }
        );
    }

    #[test]
    fn test_tag_kwarg_requires_value() {
        let err = BlockTagParser::default()
            .parse(&mut TokenStream::new("t key="))
            .unwrap_err();
        assert!(matches!(syntax_kind(err), SyntaxError::Unexpected { .. }));
    }
}
