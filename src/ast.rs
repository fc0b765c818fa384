use std::fmt;
use std::sync::Arc;

use crate::error::Location;
use crate::tags::TagHandler;
use crate::value::Value;

/// Parsed expression from a `{{ ... }}` marker or a tag argument
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// String, integer or float literal
    Literal(Value),
    /// Variable resolved against the context at render time
    Lookup(String),
    /// `base.name`
    Attribute(Box<Expr>, String),
    /// `base[key]`
    Index(Box<Expr>, Box<Expr>),
}

// Trailer chains are as long as the source allows; tear them down with an
// explicit stack instead of one drop frame per link.
impl Drop for Expr {
    fn drop(&mut self) {
        let mut stack = Vec::new();
        self.detach_children(&mut stack);
        while let Some(mut expr) = stack.pop() {
            expr.detach_children(&mut stack);
        }
    }
}

impl Expr {
    fn detach_children(&mut self, stack: &mut Vec<Expr>) {
        let leaf = || Expr::Literal(Value::None);
        match self {
            Expr::Literal(_) | Expr::Lookup(_) => {}
            Expr::Attribute(base, _) => stack.push(std::mem::replace(&mut **base, leaf())),
            Expr::Index(base, key) => {
                stack.push(std::mem::replace(&mut **base, leaf()));
                stack.push(std::mem::replace(&mut **key, leaf()));
            }
        }
    }
}

/// One step of a compiled render plan
#[derive(Debug, Clone)]
pub enum RenderNode {
    /// Literal text, copied verbatim
    Text(String),
    /// Interpolated expression and the location of its `{{`
    Expr(Expr, Location),
    Tag(TagNode),
}

/// A registered block tag together with its parsed arguments
#[derive(Clone)]
pub struct TagNode {
    pub name: String,
    pub handler: Arc<dyn TagHandler>,
    pub args: Vec<Expr>,
    pub kwargs: Vec<(String, Expr)>,
    /// Nodes up to the matching end tag, for tags that have a body
    pub body: Option<Vec<RenderNode>>,
    pub location: Location,
}

impl fmt::Debug for TagNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagNode")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("kwargs", &self.kwargs)
            .field("body", &self.body)
            .field("location", &self.location)
            .finish()
    }
}
