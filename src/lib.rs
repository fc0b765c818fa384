//! rattle - compile `{{ ... }}` templates once, render them many times.
//!
//! ```text
//! Hello {{ user.name }}!      - interpolation with attribute access
//! {{ items[0] }} {{ m['k'] }} - indexing by integer or string
//! {# ignored #}               - comments
//! {% tag arg key=value %}     - block tags, dispatched to registered handlers
//! ```
//!
//! Compilation parses every marker into an expression tree up front; names
//! are only resolved when rendering, so one [`Template`] can be rendered
//! against any number of [`Context`]s, concurrently if need be.
//!
//! ```
//! let template = rattle::compile("{{ greeting }}, {{ names[1] }}!").unwrap();
//!
//! let mut ctx = rattle::Context::new();
//! ctx.insert("greeting", "Hello");
//! ctx.insert("names", vec!["Ada", "Grace"]);
//!
//! assert_eq!(rattle::render(&template, &ctx).unwrap(), "Hello, Grace!");
//! ```

pub mod ast;
mod compiler;
mod error;
pub mod lexer;
pub mod parser;
mod render;
mod tags;
pub mod token;
mod value;

pub use compiler::{Compiler, Template};
pub use error::{Error, LexicalError, Location, LookupError, Result, SyntaxError};
pub use render::Renderer;
pub use tags::{TagHandler, TagInvocation, TagRegistry};
pub use value::{Context, Value};

/// Compile template source with the default [`Compiler`]
pub fn compile(source: &str) -> Result<Template> {
    Template::compile(source)
}

/// Render a compiled template against a context
pub fn render(template: &Template, context: &Context) -> Result<String> {
    template.render(context)
}
