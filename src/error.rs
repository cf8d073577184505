use std::fmt;

/// Substring the script service puts in the body of an update rejected for
/// bad script content. Matching on it is best-effort: the service exposes no
/// structured error code for this case.
const CONTENT_ERROR_FINGERPRINT: &str = "Syntax error";

/// Payload reported for content-validation failures. The service message
/// does not identify the offending file or line.
pub const VALIDATION_DETAILS_UNAVAILABLE: &str = "(details unavailable)";

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failed call against the remote store
#[derive(Debug)]
pub struct TransportError {
    message: String,
    status: Option<u16>,
    source: Option<BoxedSource>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Error for a response that came back with a non-success HTTP status
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
            source: None,
        }
    }

    /// Attach the underlying cause
    pub fn caused_by<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let message = e.to_string();
        let status = e.status().map(|s| s.as_u16());
        Self {
            message,
            status,
            source: Some(Box::new(e)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Network or server call failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server refused written content because the content itself is bad
    #[error("remote content validation failed {details}")]
    RemoteValidation {
        details: &'static str,
        #[source]
        cause: TransportError,
    },

    /// The server answered but broke an expected invariant
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A response body could not be parsed into the expected structure
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A request body could not be serialized
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    /// An extension or type tag outside the registered set
    #[error("unsupported file extension or type: {0}")]
    InvalidExtension(String),

    /// No credential could be obtained
    #[error("authentication failed: {0}")]
    Auth(String),
}

impl SyncError {
    pub fn is_remote_validation(&self) -> bool {
        matches!(self, SyncError::RemoteValidation { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, SyncError::Transport(_))
    }
}

/// Classify a failed write.
///
/// Looks for the content-error fingerprint in the transport message. On a
/// match the failure becomes `RemoteValidation` with a fixed payload, anything
/// else stays a plain transport error. This is the only place that inspects
/// error text; structured error codes from the service would replace it.
pub fn classify_write_failure(err: TransportError) -> SyncError {
    if err.message.contains(CONTENT_ERROR_FINGERPRINT) {
        tracing::debug!("write failure matched content-error fingerprint: {}", err);
        SyncError::RemoteValidation {
            details: VALIDATION_DETAILS_UNAVAILABLE,
            cause: err,
        }
    } else {
        SyncError::Transport(err)
    }
}
