use thiserror::Error;

/// Raised before any network I/O when a parameter tree cannot be rendered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("required field `{0}` is missing")]
    MissingField(String),
    #[error("field `{field}` is invalid: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("namespace prefix `{0}` is used in the body but not declared by the service")]
    UndeclaredPrefix(String),
    #[error("malformed parameters: {0}")]
    Malformed(String),
}

impl ValidationError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        let message = err.to_string();
        match message
            .strip_prefix("missing field `")
            .and_then(|rest| rest.split_once('`'))
        {
            Some((field, _)) => Self::MissingField(field.to_string()),
            None => Self::Malformed(message),
        }
    }
}

/// The HTTP exchange itself did not produce a usable SOAP reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection to {endpoint} failed: {cause}")]
    Connect { endpoint: String, cause: String },
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },
    #[error("request to {endpoint} failed: {cause}")]
    Request { endpoint: String, cause: String },
    #[error("device replied with HTTP {status} and no SOAP fault")]
    HttpStatus { status: u16, body: String },
    #[error("reply is not a SOAP envelope: {0}")]
    MalformedReply(String),
}

/// A SOAP fault reported by the device. The reason text is kept exactly as
/// the device sent it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("device fault {code}: {reason}")]
pub struct ProtocolFault {
    pub status: u16,
    pub code: String,
    pub subcodes: Vec<String>,
    pub reason: String,
    pub detail: Option<String>,
}

impl ProtocolFault {
    pub fn subcode(&self) -> Option<&str> {
        self.subcodes.first().map(String::as_str)
    }

    /// True when the device rejected the credentials or the security header,
    /// which is also how devices report a stale `Created` timestamp.
    pub fn is_not_authorized(&self) -> bool {
        self.subcodes
            .iter()
            .chain(std::iter::once(&self.code))
            .any(|code| {
                let local = code.rsplit(':').next().unwrap_or(code);
                matches!(
                    local,
                    "NotAuthorized" | "FailedAuthentication" | "InvalidSecurity"
                )
            })
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Fault(#[from] ProtocolFault),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
