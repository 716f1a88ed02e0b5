use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("External slot `{0}` is not bound by an enclosing rebind.")]
    UnboundSlot(String),
}
