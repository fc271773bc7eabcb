use thiserror::Error;

/// When things go awry
#[derive(Debug, Error)]
pub enum IbexError {
    /// Inbound wire bytes that don't parse. Dropped on UDP, a 400 on HTTP.
    #[error("malformed DNS message")]
    MalformedMessage,
    /// Every configured upstream failed to answer.
    #[error("no upstream resolver answered")]
    UpstreamUnavailable,
    /// The answer cache couldn't be reached; the resolver carries on without it.
    #[error("answer cache unavailable")]
    CacheUnavailable,
    /// A record that fails store validation.
    #[error("invalid record: {field}: {message}")]
    InvalidRecord { field: String, message: String },
    #[error("invalid name: {0}")]
    InvalidName(String),
    /// Something failed in the start up of the platform
    #[error("startup error: {0}")]
    StartupError(String),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),
    #[error("byte packing error: {0}")]
    BytePackingError(String),
}

impl IbexError {
    pub fn invalid_record(field: &str, message: impl Into<String>) -> Self {
        IbexError::InvalidRecord {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<packed_struct::PackingError> for IbexError {
    fn from(error: packed_struct::PackingError) -> Self {
        IbexError::BytePackingError(error.to_string())
    }
}

impl From<IbexError> for std::io::Error {
    fn from(error: IbexError) -> Self {
        match error {
            IbexError::IoError(err) => err,
            other => std::io::Error::other(format!("{other}")),
        }
    }
}
