//! Block tag extension point
//!
//! A `{% name ... %}` block compiles only if `name` is registered. The handler
//! receives the evaluated arguments and, for tags with a body, can render the
//! nodes up to the matching `{% endname %}` as often as it likes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::ast::TagNode;
use crate::error::{Error, Location, Result};
use crate::render::Renderer;
use crate::value::{Context, Value};

pub trait TagHandler: Send + Sync {
    /// Whether the tag encloses a body closed by `end<name>`
    fn has_body(&self) -> bool {
        false
    }

    fn render(&self, tag: &TagInvocation<'_>, out: &mut String) -> Result<()>;
}

impl<F> TagHandler for F
where
    F: Fn(&TagInvocation<'_>, &mut String) -> Result<()> + Send + Sync,
{
    fn render(&self, tag: &TagInvocation<'_>, out: &mut String) -> Result<()> {
        self(tag, out)
    }
}

/// Registry of tag handlers by name
#[derive(Clone, Default)]
pub struct TagRegistry(HashMap<String, Arc<dyn TagHandler>>);

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one with the same name
    pub fn register(&mut self, name: impl Into<String>, handler: impl TagHandler + 'static) {
        self.0.insert(name.into(), Arc::new(handler));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn TagHandler>> {
        self.0.get(name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// A tag being rendered: its evaluated arguments and access to its body
pub struct TagInvocation<'a> {
    pub(crate) node: &'a TagNode,
    pub(crate) args: Vec<Value>,
    pub(crate) kwargs: Vec<(&'a str, Value)>,
    pub(crate) renderer: &'a Renderer<'a>,
}

impl<'a> TagInvocation<'a> {
    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn location(&self) -> Location {
        self.node.location
    }

    /// Positional arguments, in source order
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Keyword arguments, in source order
    pub fn kwargs(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.kwargs.iter().map(|(k, v)| (*k, v))
    }

    /// The context the enclosing template is rendered with
    pub fn context(&self) -> &Context {
        self.renderer.context()
    }

    pub fn has_body(&self) -> bool {
        self.node.body.is_some()
    }

    /// Render the body against the current context, or nothing for bodiless tags
    pub fn render_body(&self, out: &mut String) -> Result<()> {
        match &self.node.body {
            Some(body) => self.renderer.render_nodes(body, out),
            None => Ok(()),
        }
    }

    /// Render the body against another context, e.g. one with extra variables
    pub fn render_body_with(&self, ctx: &Context, out: &mut String) -> Result<()> {
        match &self.node.body {
            Some(body) => Renderer::new(ctx).render_nodes(body, out),
            None => Ok(()),
        }
    }

    /// Error attributed to this tag
    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::Tag {
            tag: self.node.name.clone(),
            message: message.into(),
        }
    }
}
