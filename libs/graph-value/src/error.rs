use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unable to convert '{from}' to '{to}'")]
pub struct ConversionFailure {
    pub from: &'static str,
    pub to: &'static str,
}

impl ConversionFailure {
    pub fn new(from: &'static str, to: &'static str) -> ConversionFailure {
        ConversionFailure { from, to }
    }
}
