use crate::ast::{RenderNode, TagNode};
use crate::error::{Error, Location, Result, SyntaxError};
use crate::lexer::{Span, SpanKind, TemplateLexer};
use crate::parser::{BlockTagParser, DEFAULT_MAX_DEPTH, ExpressionParser};
use crate::render::Renderer;
use crate::tags::{TagHandler, TagRegistry};
use crate::token::TokenStream;
use crate::value::Context;

/// Turns template source into a [`Template`]
///
/// Carries the tag handlers blocks may refer to and the nesting bound shared
/// by index expressions and body tags.
#[derive(Debug, Clone)]
pub struct Compiler {
    tags: TagRegistry,
    max_depth: usize,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(TagRegistry::new())
    }
}

/// A body tag waiting for its end tag
struct OpenTag<'s> {
    name: &'s str,
    end: String,
    location: Location,
    depth: usize,
}

impl Compiler {
    pub fn new(tags: TagRegistry) -> Self {
        Self {
            tags,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Bound how deeply `[ ... ]` may nest inside one expression, and body
    /// tags inside each other
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Register a tag handler
    pub fn tag(mut self, name: impl Into<String>, handler: impl TagHandler + 'static) -> Self {
        self.tags.register(name, handler);
        self
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    /// Compile source into a render plan
    ///
    /// Fails on the first error; nothing partially compiled escapes.
    pub fn compile(&self, source: &str) -> Result<Template> {
        let spans = TemplateLexer::tokenize(source)?;
        let span_count = spans.len();
        let nodes = self.compile_spans(&mut spans.into_iter(), None)?;

        tracing::debug!(spans = span_count, nodes = nodes.len(), "compiled template");
        Ok(Template { nodes })
    }

    fn expression_parser(&self) -> ExpressionParser {
        ExpressionParser::new(self.max_depth)
    }

    fn compile_spans<'s>(
        &self,
        spans: &mut impl Iterator<Item = Span<'s>>,
        open: Option<&OpenTag<'_>>,
    ) -> Result<Vec<RenderNode>> {
        let mut nodes = Vec::new();

        while let Some(span) = spans.next() {
            tracing::trace!(kind = %span.kind, location = %span.location, "compiling span");
            match span.kind {
                SpanKind::Text => nodes.push(RenderNode::Text(span.content.to_string())),
                SpanKind::Comment => {}
                SpanKind::Var => {
                    let mut stream = TokenStream::with_origin(span.content, span.content_location());
                    let expr = self.expression_parser().parse(&mut stream)?;
                    expect_end(&mut stream)?;
                    nodes.push(RenderNode::Expr(expr, span.location));
                }
                SpanKind::Block => {
                    let mut stream = TokenStream::with_origin(span.content, span.content_location());
                    let parser = BlockTagParser::new(self.expression_parser());
                    let name = parser.parse_name(&mut stream)?;

                    if open.is_some_and(|open| open.end == name.text) {
                        expect_end(&mut stream)?;
                        return Ok(nodes);
                    }

                    let Some(handler) = self.tags.get(name.text) else {
                        let kind = if self.closes_body_tag(name.text) {
                            SyntaxError::UnexpectedEndTag(name.text.to_string())
                        } else {
                            SyntaxError::UnknownTag(name.text.to_string())
                        };
                        return Err(stream.syntax_error(kind, &name));
                    };

                    let depth = open.map_or(0, |open| open.depth) + 1;
                    if handler.has_body() && depth > self.max_depth {
                        return Err(
                            stream.syntax_error(SyntaxError::NestingTooDeep(self.max_depth), &name)
                        );
                    }

                    let header = parser.parse_args(&mut stream, name.text)?;
                    let body = if handler.has_body() {
                        let open = OpenTag {
                            name: name.text,
                            end: format!("end{}", name.text),
                            location: span.location,
                            depth,
                        };
                        Some(self.compile_spans(spans, Some(&open))?)
                    } else {
                        None
                    };

                    nodes.push(RenderNode::Tag(TagNode {
                        name: header.name,
                        handler: handler.clone(),
                        args: header.args,
                        kwargs: header.kwargs,
                        body,
                        location: span.location,
                    }));
                }
            }
        }

        match open {
            Some(open) => Err(Error::Syntax {
                kind: SyntaxError::UnclosedTag {
                    name: open.name.to_string(),
                    end: open.end.clone(),
                },
                location: open.location,
            }),
            None => Ok(nodes),
        }
    }

    /// Whether `name` is the end tag of some registered body tag
    fn closes_body_tag(&self, name: &str) -> bool {
        name.strip_prefix("end")
            .and_then(|base| self.tags.get(base))
            .is_some_and(|handler| handler.has_body())
    }
}

/// Anything left after a complete expression is an error
fn expect_end(stream: &mut TokenStream<'_>) -> Result<()> {
    let token = stream.next()?;
    if token.is_end() {
        return Ok(());
    }
    Err(stream.syntax_error(
        SyntaxError::Unexpected {
            expected: "end of expression",
            found: token.describe(),
        },
        &token,
    ))
}

/// A compiled template
///
/// Immutable once built: render it any number of times, from any number of
/// threads.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<RenderNode>,
}

impl Template {
    /// Compile with the default [`Compiler`] (no tags registered)
    pub fn compile(source: &str) -> Result<Self> {
        Compiler::default().compile(source)
    }

    /// The render plan, in output order
    pub fn nodes(&self) -> &[RenderNode] {
        &self.nodes
    }

    pub fn render(&self, ctx: &Context) -> Result<String> {
        let output = Renderer::new(ctx).render(&self.nodes)?;
        tracing::debug!(bytes = output.len(), "rendered template");
        Ok(output)
    }
}
