//! The clause tree. Nodes own their children; names inside come from an
//! [`Environment`](crate::Environment) so the tree itself never allocates any.

mod clause;
mod conditions;
mod conjunctive;
mod expression;
mod ordering;
mod pattern;
mod union;
mod variable;

pub use clause::*;
pub use conditions::*;
pub use conjunctive::*;
pub use expression::*;
pub use ordering::*;
pub use pattern::*;
pub use union::*;
pub use variable::*;
