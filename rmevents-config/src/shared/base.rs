use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A field holds a value outside its accepted range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// A watched table has no source configured.
    #[error("no source configured for watched table `{0}`")]
    MissingSource(String),
    /// A watched table has more than one source configured.
    #[error("watched table `{0}` is configured more than once")]
    DuplicateSource(String),
}
