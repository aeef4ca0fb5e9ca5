//! Errors surfaced by the client core.
//!
//! Every failure reaching a cache ends up as the `Display` text of a
//! [`ClientError`]; views that need to choose between "try again" and "check
//! your connection" match on [`ClientError::kind`] instead.
use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never reached the server (DNS, refused connection, TLS).
    #[error("could not reach the server: {0}")]
    Transport(String),
    #[error("the server did not answer in time")]
    Timeout,
    /// Server-authored failure, passed through verbatim.
    #[error("{message}")]
    Server {
        status: Option<StatusCode>,
        message: String,
    },
    /// The credential is no longer valid; the session has been torn down.
    #[error("session expired, please sign in again")]
    Unauthorized,
    /// The payload did not have the shape declared for the entity.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),
    #[error("the current session cannot switch branch")]
    Forbidden,
    #[error("not signed in")]
    NotSignedIn,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("session storage error: {0}")]
    Storage(String),
}

/// Coarse classification of a [`ClientError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Connectivity,
    Timeout,
    Server,
    Unauthorized,
    Invalid,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Connectivity,
            Self::Timeout => ErrorKind::Timeout,
            Self::Server { .. } => ErrorKind::Server,
            Self::Unauthorized | Self::NotSignedIn => ErrorKind::Unauthorized,
            Self::UnexpectedShape(_) | Self::Forbidden | Self::Config(_) | Self::Storage(_) => {
                ErrorKind::Invalid
            }
        }
    }

    pub(crate) fn server(status: Option<StatusCode>, message: Option<String>) -> Self {
        let message = message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| "the server could not complete the request".to_string());
        Self::Server { status, message }
    }

    pub(crate) fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Server {
                status: Some(StatusCode::NOT_FOUND),
                ..
            }
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::UnexpectedShape(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
