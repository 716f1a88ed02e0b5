use cypher_builder::RenderError;
use thiserror::Error;

use crate::binding::RELATIONSHIP_REQUIRED;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    /// The selection references a field or type the schema does not have.
    #[error("Unknown reference `{name}` on `{parent}`.")]
    SchemaReference { parent: String, name: String },

    #[error("Invalid filter field `{field}` on `{node}`.")]
    InvalidFilterField { node: String, field: String },

    #[error("Unauthenticated")]
    AuthenticationRequired,

    #[error("Forbidden")]
    AuthorizationDenied,

    /// Returned instead of a batched create that cannot serve this request. Callers are
    /// expected to retry with [`CreateStrategy::PerRow`](crate::CreateStrategy::PerRow).
    #[error("Unsupported optimization: {0}")]
    UnsupportedOptimization(String),

    #[error(transparent)]
    CardinalityViolation(#[from] CardinalityViolation),

    #[error("Invalid operation dispatch: {0}")]
    InvalidOperationDispatch(String),

    #[error("Invalid argument `{argument}`: {message}")]
    InvalidArgument { argument: String, message: String },

    #[error("Callback `{name}` failed: {message}")]
    Callback { name: String, message: String },

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl CompileError {
    pub(crate) fn unknown(parent: impl Into<String>, name: impl Into<String>) -> Self {
        CompileError::SchemaReference {
            parent: parent.into(),
            name: name.into(),
        }
    }

    pub(crate) fn invalid_filter(node: impl Into<String>, field: impl Into<String>) -> Self {
        CompileError::InvalidFilterField {
            node: node.into(),
            field: field.into(),
        }
    }

    pub(crate) fn invalid_argument(argument: impl Into<String>, message: impl Into<String>) -> Self {
        CompileError::InvalidArgument {
            argument: argument.into(),
            message: message.into(),
        }
    }

    pub fn is_unsupported_optimization(&self) -> bool {
        matches!(self, CompileError::UnsupportedOptimization(_))
    }
}

/// A relationship count constraint breached at execution time.
///
/// The compiled query carries the check itself. The database aborts with the message built by
/// [`CardinalityViolation::message`], which [`CardinalityViolation::from_database_message`]
/// turns back into this error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{}", self.describe())]
pub struct CardinalityViolation {
    pub node: String,
    pub field: String,
    pub required: bool,
}

const REQUIRED_SUFFIX: &str = " required exactly once";
const AT_MOST_ONE_SUFFIX: &str = " must be less than or equal to one";

impl CardinalityViolation {
    fn describe(&self) -> String {
        let suffix = if self.required { REQUIRED_SUFFIX } else { AT_MOST_ONE_SUFFIX };
        format!("{}.{}{suffix}", self.node, self.field)
    }

    /// The message the generated validation aborts with.
    pub fn message(&self) -> String {
        format!("{RELATIONSHIP_REQUIRED}{}", self.describe())
    }

    /// Recognizes a violation inside an error message reported by the database, which usually
    /// wraps the message of the failed validation.
    pub fn from_database_message(message: &str) -> Option<Self> {
        let start = message.find(RELATIONSHIP_REQUIRED)? + RELATIONSHIP_REQUIRED.len();
        let rest = &message[start..];

        let (path, required) = if let Some(idx) = rest.find(REQUIRED_SUFFIX) {
            (&rest[..idx], true)
        } else {
            (&rest[..rest.find(AT_MOST_ONE_SUFFIX)?], false)
        };

        let (node, field) = path.split_once('.')?;

        Some(CardinalityViolation {
            node: node.to_owned(),
            field: field.to_owned(),
            required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violations_survive_database_wrapping() {
        let violation = CardinalityViolation {
            node: "Movie".into(),
            field: "director".into(),
            required: true,
        };

        let reported = format!(
            "Failed to invoke procedure `apoc.util.validate`: Caused by: java.lang.RuntimeException: {}",
            violation.message()
        );

        assert_eq!(CardinalityViolation::from_database_message(&reported), Some(violation));
    }

    #[test]
    fn optional_relationships_report_the_upper_bound() {
        let violation = CardinalityViolation {
            node: "Post".into(),
            field: "author".into(),
            required: false,
        };

        assert_eq!(
            CardinalityViolation::from_database_message(&violation.message()),
            Some(violation.clone())
        );
        assert_eq!(violation.to_string(), "Post.author must be less than or equal to one");
    }

    #[test]
    fn unrelated_messages_are_ignored() {
        assert_eq!(CardinalityViolation::from_database_message("Node(1) already exists"), None);
    }
}
