use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Connection failure or non-2xx status from the remote endpoint.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Response carried no readable body")]
    NoResponseBody,

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Stream read failed: {0}")]
    StreamRead(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, RelayError>;
