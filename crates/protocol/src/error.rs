use thiserror::Error;

/// Every failure the daemon surfaces on the wire. The kind string is the
/// `error` field of the response object.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    BadArgument(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Db(String),

    #[error("request exceeded its deadline after {0} ms")]
    Timeout(u64),

    #[error("{0}")]
    Internal(String),
}

impl DaemonError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::BadArgument(_) => "bad_argument",
            Self::Io(_) => "io_error",
            Self::Db(_) => "db_error",
            Self::Timeout(_) => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}
