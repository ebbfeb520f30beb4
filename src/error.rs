//! Error types for the gpodder.net client

use reqwest::StatusCode;
use std::io::ErrorKind;
use thiserror::Error;

/// Outcome code of a single network request.
///
/// `NoError` is a regular value so the request bridge can hand back one code
/// for every request; use [`NetworkError::is_error`] before trusting a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Error)]
pub enum NetworkError {
    #[default]
    #[error("no error")]
    NoError,

    // Connection level
    #[error("connection refused")]
    ConnectionRefused,
    #[error("remote host closed the connection")]
    RemoteHostClosed,
    #[error("host not found")]
    HostNotFound,
    #[error("request timed out")]
    Timeout,
    #[error("operation canceled")]
    OperationCanceled,
    #[error("TLS handshake failed")]
    SslHandshakeFailed,
    #[error("temporary network failure")]
    TemporaryNetworkFailure,
    #[error("unknown network error")]
    UnknownNetwork,

    // Content level (HTTP 4xx)
    #[error("access to content denied")]
    ContentAccessDenied,
    #[error("operation not permitted on content")]
    ContentOperationNotPermitted,
    #[error("content not found")]
    ContentNotFound,
    #[error("authentication required")]
    AuthenticationRequired,
    #[error("request body must be re-sent")]
    ContentReSend,
    #[error("content conflict")]
    ContentConflict,
    #[error("content gone")]
    ContentGone,
    #[error("unknown content error")]
    UnknownContent,

    // Protocol level
    #[error("protocol unknown")]
    ProtocolUnknown,
    #[error("invalid operation for protocol")]
    ProtocolInvalidOperation,
    #[error("unknown protocol error")]
    UnknownProtocol,

    // Server level (HTTP 5xx)
    #[error("internal server error")]
    InternalServer,
    #[error("operation not implemented by server")]
    OperationNotImplemented,
    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("unknown server error")]
    UnknownServer,
}

impl NetworkError {
    /// Stable numeric code, grouped by category (0 none, 1-99 connection,
    /// 201-299 content, 301-399 protocol, 401-499 server).
    pub fn code(self) -> u16 {
        match self {
            NetworkError::NoError => 0,
            NetworkError::ConnectionRefused => 1,
            NetworkError::RemoteHostClosed => 2,
            NetworkError::HostNotFound => 3,
            NetworkError::Timeout => 4,
            NetworkError::OperationCanceled => 5,
            NetworkError::SslHandshakeFailed => 6,
            NetworkError::TemporaryNetworkFailure => 7,
            NetworkError::UnknownNetwork => 99,
            NetworkError::ContentAccessDenied => 201,
            NetworkError::ContentOperationNotPermitted => 202,
            NetworkError::ContentNotFound => 203,
            NetworkError::AuthenticationRequired => 204,
            NetworkError::ContentReSend => 205,
            NetworkError::ContentConflict => 206,
            NetworkError::ContentGone => 207,
            NetworkError::UnknownContent => 299,
            NetworkError::ProtocolUnknown => 301,
            NetworkError::ProtocolInvalidOperation => 302,
            NetworkError::UnknownProtocol => 399,
            NetworkError::InternalServer => 401,
            NetworkError::OperationNotImplemented => 402,
            NetworkError::ServiceUnavailable => 403,
            NetworkError::UnknownServer => 499,
        }
    }

    /// Whether this code describes a failure
    pub fn is_error(self) -> bool {
        self != NetworkError::NoError
    }

    /// Map an HTTP status to an error code; `None` for success statuses.
    pub fn from_status(status: StatusCode) -> Option<Self> {
        if status.is_success() {
            return None;
        }

        let code = match status {
            StatusCode::BAD_REQUEST => NetworkError::ProtocolInvalidOperation,
            StatusCode::UNAUTHORIZED => NetworkError::AuthenticationRequired,
            StatusCode::FORBIDDEN => NetworkError::ContentAccessDenied,
            StatusCode::NOT_FOUND => NetworkError::ContentNotFound,
            StatusCode::METHOD_NOT_ALLOWED => NetworkError::ContentOperationNotPermitted,
            StatusCode::CONFLICT => NetworkError::ContentConflict,
            StatusCode::GONE => NetworkError::ContentGone,
            StatusCode::INTERNAL_SERVER_ERROR => NetworkError::InternalServer,
            StatusCode::NOT_IMPLEMENTED => NetworkError::OperationNotImplemented,
            StatusCode::SERVICE_UNAVAILABLE => NetworkError::ServiceUnavailable,
            s if s.is_client_error() => NetworkError::UnknownContent,
            s if s.is_server_error() => NetworkError::UnknownServer,
            // 1xx/3xx that reqwest did not resolve
            _ => NetworkError::UnknownProtocol,
        };
        Some(code)
    }

    /// Map a `reqwest` failure to an error code
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return NetworkError::Timeout;
        }
        if let Some(status) = err.status() {
            if let Some(code) = NetworkError::from_status(status) {
                return code;
            }
        }
        if let Some(code) = NetworkError::from_io_source(err) {
            return code;
        }
        if err.is_connect() {
            return NetworkError::ConnectionRefused;
        }
        if err.is_body() || err.is_decode() {
            return NetworkError::RemoteHostClosed;
        }
        if err.is_redirect() {
            return NetworkError::UnknownProtocol;
        }
        if err.is_builder() || err.is_request() {
            return NetworkError::ProtocolInvalidOperation;
        }
        NetworkError::UnknownNetwork
    }

    /// Code for the first `io::Error` in the source chain of `err`, if it has a
    /// recognizable kind
    fn from_io_source(err: &(dyn std::error::Error + 'static)) -> Option<Self> {
        let mut source = err.source();
        while let Some(cause) = source {
            if let Some(io) = cause.downcast_ref::<std::io::Error>() {
                let code = match io.kind() {
                    ErrorKind::ConnectionRefused => NetworkError::ConnectionRefused,
                    ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof => NetworkError::RemoteHostClosed,
                    ErrorKind::TimedOut => NetworkError::Timeout,
                    _ => return None,
                };
                return Some(code);
            }
            source = cause.source();
        }
        None
    }
}

/// Client error
#[derive(Debug, Error)]
pub enum ClientError {
    /// URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration is incomplete or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request finished with a network error code
    #[error("Request failed ({code}): {0}", code = .0.code())]
    Request(NetworkError),
}

impl From<NetworkError> for ClientError {
    fn from(e: NetworkError) -> Self {
        ClientError::Request(e)
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
