use thiserror::Error;

/// Result type alias for provisioning operations.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// Centralized error enum for the OPC-UA node client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProvisionError {
    /// The resource store answered with a non-2xx status.
    #[error("Store request failed: {status} - {status_text}")]
    Store { status: u16, status_text: String },

    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The discovery gateway rejected a browse request.
    ///
    /// The display form is the exact message reported to the notification
    /// sink, e.g. `Error: 500 - Internal Server Error`.
    #[error("Error: {status} - {status_text}")]
    Gateway { status: u16, status_text: String },

    /// A channel was created but its `Location` header could not be parsed.
    #[error("Missing or malformed location header: {0:?}")]
    Location(String),

    /// A thing does not carry OPC-UA node metadata.
    #[error("Malformed OPC-UA node: {0}")]
    MalformedNode(String),

    /// Caller supplied an unusable request (e.g. an empty node batch).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The store returned data that contradicts itself.
    #[error("Inconsistent store response: {0}")]
    Inconsistent(String),

    /// JSON encoding/decoding failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for unexpected internal failures.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProvisionError {
    /// HTTP status carried by the error, if the remote side produced one.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Store { status, .. } | Self::Gateway { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<tokio::task::JoinError> for ProvisionError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("Async task join failed: {err}"))
    }
}

#[cfg(feature = "http-backend")]
impl From<reqwest::Error> for ProvisionError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Store {
                status: status.as_u16(),
                status_text: status_text(status.canonical_reason()),
            },
            None if err.is_decode() => Self::Inconsistent(format!("undecodable body: {err}")),
            None => Self::Transport(err.to_string()),
        }
    }
}

/// Status text for a response, `Unknown Error` when the code has no
/// canonical reason phrase.
pub(crate) fn status_text(reason: Option<&str>) -> String {
    reason.unwrap_or("Unknown Error").to_string()
}

/// Formats the user-facing gateway failure message.
///
/// # Examples
/// ```
/// use opcua_node_client::format_status_message;
///
/// assert_eq!(
///     format_status_message(500, "Internal Server Error"),
///     "Error: 500 - Internal Server Error",
/// );
/// ```
pub fn format_status_message(status: u16, status_text: &str) -> String {
    format!("Error: {status} - {status_text}")
}

/// Maps well-known management API statuses to actionable user hints.
///
/// # Examples
/// ```
/// use opcua_node_client::{ProvisionError, friendly_status_hint};
///
/// let err = ProvisionError::Store { status: 401, status_text: "Unauthorized".into() };
/// assert_eq!(
///     friendly_status_hint(&err),
///     Some("Missing or expired token — check OPCUA_STORE_TOKEN"),
/// );
///
/// let other = ProvisionError::InvalidInput("empty".into());
/// assert_eq!(friendly_status_hint(&other), None);
/// ```
pub fn friendly_status_hint(error: &ProvisionError) -> Option<&'static str> {
    match error {
        ProvisionError::Transport(_) => {
            Some("Management API unreachable — check OPCUA_STORE_URL and network access")
        }
        ProvisionError::Gateway { status: 0, .. } => {
            Some("Browse gateway unreachable — check OPCUA_BROWSE_URL")
        }
        _ => match error.status()? {
            400 => Some("Request rejected — the metadata or filter is malformed"),
            401 => Some("Missing or expired token — check OPCUA_STORE_TOKEN"),
            403 => Some("Token is valid but not allowed to manage things/channels"),
            404 => Some("Resource not found — it may have been deleted concurrently"),
            409 => Some("Resource already exists or is still referenced"),
            415 => Some("Unsupported content type — the API expects JSON"),
            502..=504 => Some("Upstream unavailable — the OPC-UA server may be offline"),
            _ => None,
        },
    }
}
