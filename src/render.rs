use std::borrow::Cow;

use crate::ast::{Expr, RenderNode, TagNode};
use crate::error::{Error, Location, LookupError, Result};
use crate::tags::TagInvocation;
use crate::value::{Context, Value};

/// Evaluates render plans against a context
///
/// Holds nothing but a shared borrow of the context, so any number of
/// renderers may walk the same plan at once.
pub struct Renderer<'c> {
    ctx: &'c Context,
}

impl<'c> Renderer<'c> {
    pub fn new(ctx: &'c Context) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &'c Context {
        self.ctx
    }

    /// Render a whole plan into a fresh string
    pub fn render(&self, nodes: &[RenderNode]) -> Result<String> {
        let mut out = String::new();
        self.render_nodes(nodes, &mut out)?;
        Ok(out)
    }

    pub fn render_nodes(&self, nodes: &[RenderNode], out: &mut String) -> Result<()> {
        for node in nodes {
            self.render_node(node, out)?;
        }
        Ok(())
    }

    fn render_node(&self, node: &RenderNode, out: &mut String) -> Result<()> {
        match node {
            RenderNode::Text(text) => out.push_str(text),
            RenderNode::Expr(expr, location) => {
                let value = self.eval_at(expr, *location)?;
                out.push_str(&value.to_string());
            }
            RenderNode::Tag(tag) => self.render_tag(tag, out)?,
        }
        Ok(())
    }

    fn render_tag(&self, tag: &TagNode, out: &mut String) -> Result<()> {
        let args = tag
            .args
            .iter()
            .map(|expr| self.eval_at(expr, tag.location).map(Cow::into_owned))
            .collect::<Result<Vec<_>>>()?;
        let kwargs = tag
            .kwargs
            .iter()
            .map(|(key, expr)| {
                self.eval_at(expr, tag.location)
                    .map(|value| (key.as_str(), value.into_owned()))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::trace!(tag = %tag.name, args = args.len(), kwargs = kwargs.len(), "rendering tag");
        let invocation = TagInvocation {
            node: tag,
            args,
            kwargs,
            renderer: self,
        };
        tag.handler.render(&invocation, out)
    }

    fn eval_at<'a>(&'a self, expr: &'a Expr, location: Location) -> Result<Cow<'a, Value>> {
        self.eval(expr)
            .map_err(|kind| Error::Lookup { kind, location })
    }

    /// Evaluate an expression, borrowing from the context or the expression
    /// itself wherever possible
    ///
    /// Trailer chains are walked in a loop, so their length never shows up
    /// on the stack; only `[ ... ]` keys recurse, and the compiler bounds
    /// their nesting.
    pub fn eval<'a>(&'a self, expr: &'a Expr) -> std::result::Result<Cow<'a, Value>, LookupError> {
        let mut trailers = Vec::new();
        let mut node = expr;
        let mut value = loop {
            match node {
                Expr::Literal(value) => break Cow::Borrowed(value),
                Expr::Lookup(name) => break self.lookup(name)?,
                Expr::Attribute(base, name) => {
                    trailers.push(Trailer::Attribute(name));
                    node = base;
                }
                Expr::Index(base, key) => {
                    trailers.push(Trailer::Index(key));
                    node = base;
                }
            }
        };

        for trailer in trailers.into_iter().rev() {
            value = match trailer {
                Trailer::Attribute(name) => attribute(value, name)?,
                Trailer::Index(key) => {
                    let key = self.eval(key)?;
                    index(value, &key)?
                }
            };
        }
        Ok(value)
    }

    fn lookup<'a>(&'a self, name: &str) -> std::result::Result<Cow<'a, Value>, LookupError> {
        self.ctx
            .get(name)
            .map(Cow::Borrowed)
            .ok_or_else(|| LookupError::KeyNotFound {
                name: name.to_string(),
            })
    }
}

/// `.name` or `[key]` applied on top of an already evaluated base
enum Trailer<'a> {
    Attribute(&'a str),
    Index(&'a Expr),
}

fn attribute<'a>(
    base: Cow<'a, Value>,
    name: &str,
) -> std::result::Result<Cow<'a, Value>, LookupError> {
    let type_name = base.type_name();
    let found = match base {
        Cow::Borrowed(value) => value.attribute(name).map(Cow::Borrowed),
        Cow::Owned(value) => value.attribute(name).cloned().map(Cow::Owned),
    };
    found.ok_or_else(|| LookupError::AttributeNotFound {
        attribute: name.to_string(),
        type_name,
    })
}

fn index<'a>(
    base: Cow<'a, Value>,
    key: &Value,
) -> std::result::Result<Cow<'a, Value>, LookupError> {
    let type_name = base.type_name();
    let found = match base {
        Cow::Borrowed(value) => value.index(key),
        Cow::Owned(value) => value.index(key).map(|v| Cow::Owned(v.into_owned())),
    };
    found.ok_or_else(|| LookupError::IndexNotFound {
        index: key.repr(),
        type_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lookup(name: &str) -> Expr {
        Expr::Lookup(name.to_string())
    }

    fn context() -> Context {
        Context::from_serialize(&json!({
            "user": {"name": "Ada", "langs": ["en", "fr"]},
            "n": 1,
            "word": "hey",
        }))
        .unwrap()
    }

    #[test]
    fn test_eval_borrows_from_context() {
        let ctx = context();
        let renderer = Renderer::new(&ctx);
        let expr = Expr::Attribute(Box::new(lookup("user")), "name".to_string());
        let value = renderer.eval(&expr).unwrap();
        assert!(matches!(value, Cow::Borrowed(Value::String(s)) if s == "Ada"));
    }

    #[test]
    fn test_eval_index_chain() {
        let ctx = context();
        let renderer = Renderer::new(&ctx);
        let langs = Expr::Attribute(Box::new(lookup("user")), "langs".to_string());
        let expr = Expr::Index(Box::new(langs), Box::new(lookup("n")));
        assert_eq!(*renderer.eval(&expr).unwrap(), Value::from("fr"));
    }

    #[test]
    fn test_eval_owned_intermediate() {
        let ctx = context();
        let renderer = Renderer::new(&ctx);
        let first = Expr::Index(Box::new(lookup("word")), Box::new(Expr::Literal(Value::Int(0))));
        let again = Expr::Index(Box::new(first), Box::new(Expr::Literal(Value::Int(-1))));
        assert_eq!(*renderer.eval(&again).unwrap(), Value::from("h"));
    }

    #[test]
    fn test_eval_missing_name() {
        let ctx = context();
        let err = Renderer::new(&ctx).eval(&lookup("nope")).unwrap_err();
        assert_eq!(
            err,
            LookupError::KeyNotFound {
                name: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_eval_missing_attribute() {
        let ctx = context();
        let expr = Expr::Attribute(Box::new(lookup("word")), "upper".to_string());
        let err = Renderer::new(&ctx).eval(&expr).unwrap_err();
        assert_eq!(
            err,
            LookupError::AttributeNotFound {
                attribute: "upper".to_string(),
                type_name: "string",
            }
        );
    }

    #[test]
    fn test_eval_bad_index() {
        let ctx = context();
        let renderer = Renderer::new(&ctx);

        let out_of_range = Expr::Index(Box::new(lookup("n")), Box::new(Expr::Literal(Value::Int(0))));
        assert_eq!(
            renderer.eval(&out_of_range).unwrap_err(),
            LookupError::IndexNotFound {
                index: "0".to_string(),
                type_name: "int",
            }
        );

        let missing_key = Expr::Index(
            Box::new(lookup("user")),
            Box::new(Expr::Literal(Value::from("age"))),
        );
        assert_eq!(
            renderer.eval(&missing_key).unwrap_err(),
            LookupError::IndexNotFound {
                index: "\"age\"".to_string(),
                type_name: "map",
            }
        );
    }

    #[test]
    fn test_render_nodes_in_order() {
        let ctx = context();
        let nodes = vec![
            RenderNode::Text("Hi ".to_string()),
            RenderNode::Expr(
                Expr::Attribute(Box::new(lookup("user")), "name".to_string()),
                Location::new(1, 4),
            ),
            RenderNode::Text("!".to_string()),
        ];
        assert_eq!(Renderer::new(&ctx).render(&nodes).unwrap(), "Hi Ada!");
    }

    #[test]
    fn test_render_error_carries_location() {
        let ctx = Context::new();
        let nodes = vec![RenderNode::Expr(lookup("x"), Location::new(2, 5))];
        let err = Renderer::new(&ctx).render(&nodes).unwrap_err();
        assert!(matches!(
            err,
            Error::Lookup {
                kind: LookupError::KeyNotFound { .. },
                location: Location { line: 2, column: 5 },
            }
        ));
    }
}
