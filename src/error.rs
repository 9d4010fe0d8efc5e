use thiserror::Error;

/// Result type alias for the engine
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the resolution and synthesis engine.
///
/// Every variant is an ordinary value handed back to the caller; none of them
/// abort a run on their own.
#[derive(Debug, Error)]
pub enum Error {
    /// No resolution strategy could map the reference to a declaration
    #[error("cannot resolve type `{type_ref}`")]
    Unresolvable { type_ref: String },

    /// Generic instantiation with the wrong number of type arguments
    #[error("generic `{name}` expects {expected} type argument(s), got {actual}")]
    ArityMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// An annotation that is invalid for the base type of its field
    #[error("field `{field}`: {message}")]
    AnnotationConflict { field: String, message: String },

    /// On-demand loading of a package outside the indexed tree failed
    #[error("failed to load external package `{package}`: {message}")]
    ExternalLoad { package: String, message: String },

    /// A textual type reference that is not valid type syntax
    #[error("invalid type reference `{type_ref}`: {message}")]
    InvalidTypeRef { type_ref: String, message: String },

    /// Operation manifest that references unknown files or modules
    #[error("invalid operation manifest: {0}")]
    Manifest(String),
}

impl Error {
    pub fn unresolvable(type_ref: impl Into<String>) -> Self {
        Error::Unresolvable {
            type_ref: type_ref.into(),
        }
    }

    pub fn conflict(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::AnnotationConflict {
            field: field.into(),
            message: message.into(),
        }
    }
}
