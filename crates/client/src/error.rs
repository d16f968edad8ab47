use photopoet_core::attempt::{GENERIC_FAILURE_MESSAGE, MISSING_PHOTO_MESSAGE};
use serde::Deserialize;

/// Errors from the client library.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("API error ({status} {code}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Machine-readable code, e.g. `ANALYSIS_FAILED`.
        code: String,
        /// Message meant for the user.
        message: String,
    },

    /// Failed to establish the live history connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A frame on the live connection could not be understood.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Input rejected before sending.
    #[error("{0}")]
    Validation(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),

    /// The session is still being established.
    #[error("Session is still loading")]
    SessionLoading,

    /// No identity is attached to the session.
    #[error("Not signed in")]
    NotSignedIn,

    /// Submitted without a photo. No request was sent.
    #[error("{}", MISSING_PHOTO_MESSAGE)]
    MissingPhoto,

    /// A generation is already running in this client.
    #[error("A poem is already being generated")]
    AttemptInFlight,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// The message to show the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::Validation(message) => message.clone(),
            Self::MissingPhoto | Self::AttemptInFlight => self.to_string(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Error body rendered by the server.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
    pub code: String,
}

impl ErrorBody {
    /// Build an [`ClientError::Api`] from a status and raw body. Bodies that
    /// are not the server's error shape are kept verbatim.
    pub(crate) fn into_error(status: u16, raw: &str) -> ClientError {
        match serde_json::from_str::<ErrorBody>(raw) {
            Ok(body) => ClientError::Api {
                status,
                code: body.code,
                message: body.error,
            },
            Err(_) => ClientError::Api {
                status,
                code: "UNKNOWN".into(),
                message: raw.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn server_error_body_is_parsed() {
        let err = ErrorBody::into_error(
            502,
            r#"{"error":"Could not analyze photo themes and emotions.","code":"ANALYSIS_FAILED"}"#,
        );
        assert_matches!(&err, ClientError::Api { status: 502, code, .. } if code == "ANALYSIS_FAILED");
        assert_eq!(err.user_message(), "Could not analyze photo themes and emotions.");
    }

    #[test]
    fn foreign_body_is_kept_verbatim() {
        let err = ErrorBody::into_error(503, "Service Unavailable");
        assert_matches!(err, ClientError::Api { code, message, .. } if code == "UNKNOWN" && message == "Service Unavailable");
    }

    #[test]
    fn transport_failures_use_generic_message() {
        assert_eq!(
            ClientError::Connection("refused".into()).user_message(),
            GENERIC_FAILURE_MESSAGE
        );
        assert_eq!(ClientError::MissingPhoto.user_message(), MISSING_PHOTO_MESSAGE);
    }
}
