//! An intermediate representation of Cypher programs.
//!
//! Query trees are assembled from [`ast`] nodes, with every generated name handed out by one
//! [`Environment`], and turned into text plus a parameter map by the [`visitor::Cypher`] renderer.
//!
//! ```rust
//! # use cypher_builder::{ast::*, visitor::Cypher, Environment};
//! let env = Environment::new();
//! let this = Variable::named("this");
//! let title = env.next_param("", "The Matrix");
//!
//! let query = Clause::sequence([
//!     Match::new(Pattern::node(NodePattern::new(this.clone()).label("Movie")))
//!         .filter(Expr::property(&this, "title").equals(title))
//!         .into(),
//!     Projection::new([ProjectionItem::aliased(Expr::from(&this), this.clone())]).into_return(),
//! ]);
//!
//! let rendered = Cypher::build(&query, &env).unwrap();
//!
//! assert_eq!("MATCH (this:`Movie`)\nWHERE this.title = $param0\nRETURN this", rendered.text);
//! assert_eq!(rendered.params["param0"], "The Matrix".into());
//! ```

pub mod ast;
pub mod visitor;

mod environment;
mod error;

pub use environment::{Environment, VariableRole};
pub use error::RenderError;
pub use visitor::Rendered;
