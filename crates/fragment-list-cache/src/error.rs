pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No fragment named {0}.")]
    FragmentNotFound(String),
    #[error("Could not parse operation: {0}")]
    InvalidOperation(String),
    #[error("No operation named {0} in the document")]
    OperationNotFound(String),
    #[error("The document does not contain any operation")]
    MissingOperation,
    #[error("Invalid @{directive} directive: {message}")]
    InvalidDirective { directive: String, message: String },
    #[error("Invalid cacheable type declaration: {0}")]
    InvalidDeclaration(String),
    #[error("Type {0} has more than one cacheable type declaration")]
    DuplicateDeclaration(String),
    #[error("Invalid key naming: {0}")]
    InvalidNaming(String),
    #[error("Key {key} is generated for both {first} and {second}")]
    KeyCollision { key: String, first: String, second: String },
    #[error("Invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures reported by a [`Store`](crate::Store) implementation.
///
/// These are infrastructure failures, not misses: a store signals a miss by
/// returning `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Read(String),
    #[error("{0}")]
    Write(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl Error {
    pub(crate) fn invalid_directive(directive: &str, message: impl Into<String>) -> Self {
        Error::InvalidDirective {
            directive: directive.to_string(),
            message: message.into(),
        }
    }
}
