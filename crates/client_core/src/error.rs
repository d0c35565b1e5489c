use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotAvailable,
    Auth,
    Network,
}

/// Every failure a workspace operation can surface. The payload is the
/// human-readable message; server-side rejections carry the response
/// `detail` verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Malformed input, rejected locally or by the server. Re-prompt.
    #[error("{0}")]
    Validation(String),
    /// A state precondition does not hold (track locked, duplicate work, ...).
    #[error("{0}")]
    Conflict(String),
    /// Nothing to hand out right now, e.g. no peer submission left to review.
    #[error("{0}")]
    NotAvailable(String),
    /// Missing or rejected credential. Fatal to the session.
    #[error("{0}")]
    Auth(String),
    /// Transport failure, timeout, 5xx or an undecodable body. Safe to retry.
    #[error("{0}")]
    Network(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn not_available(message: impl Into<String>) -> Self {
        Self::NotAvailable(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn with_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::Conflict => Self::Conflict(message),
            ErrorKind::NotAvailable => Self::NotAvailable(message),
            ErrorKind::Auth => Self::Auth(message),
            ErrorKind::Network => Self::Network(message),
        }
    }

    /// Maps a non-2xx response. Statuses with a fixed meaning win; the
    /// remaining client errors take the calling operation's `rejection` kind.
    pub fn from_status(status: StatusCode, detail: Option<String>, rejection: ErrorKind) -> Self {
        let message = detail.unwrap_or_else(|| match status.canonical_reason() {
            Some(reason) => format!("{} {reason}", status.as_u16()),
            None => format!("HTTP {}", status.as_u16()),
        });
        let kind = match status {
            StatusCode::UNAUTHORIZED => ErrorKind::Auth,
            StatusCode::UNPROCESSABLE_ENTITY => ErrorKind::Validation,
            StatusCode::CONFLICT => ErrorKind::Conflict,
            status if status.is_server_error() => ErrorKind::Network,
            _ => rejection,
        };
        Self::with_kind(kind, message)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NotAvailable(_) => ErrorKind::NotAvailable,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Network(_) => ErrorKind::Network,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation(message)
            | Self::Conflict(message)
            | Self::NotAvailable(message)
            | Self::Auth(message)
            | Self::Network(message) => message,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        !self.requires_reauth()
    }

    pub fn requires_reauth(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network(format!("request timed out: {err}"))
        } else if err.is_decode() {
            Self::Network(format!("malformed response: {err}"))
        } else {
            Self::Network(format!("transport failure: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_statuses_override_operation_rejection_kind() {
        let err = ClientError::from_status(
            StatusCode::UNAUTHORIZED,
            Some("Could not validate credentials".into()),
            ErrorKind::Conflict,
        );
        assert_eq!(err, ClientError::auth("Could not validate credentials"));
        assert!(err.requires_reauth());
        assert!(!err.is_recoverable());

        let err = ClientError::from_status(StatusCode::BAD_GATEWAY, None, ErrorKind::Validation);
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.message(), "502 Bad Gateway");
    }

    #[test]
    fn plain_rejections_use_operation_kind() {
        let err = ClientError::from_status(
            StatusCode::BAD_REQUEST,
            Some("Track already started".into()),
            ErrorKind::Conflict,
        );
        assert_eq!(err, ClientError::conflict("Track already started"));
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "Track already started");
    }
}
