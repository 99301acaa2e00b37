//! Failure kinds reported by the Dynamics client
//!
//! Every client operation is total over `CrmResult`: transport problems and
//! remote rejections come back as values and never escape as panics. A
//! lookup that matches nothing is `Ok(None)`, not an error.

use super::binding::BindingError;

pub type CrmResult<T> = Result<T, CrmError>;

#[derive(Debug, Clone, PartialEq)]
pub enum CrmError {
    /// The server answered with a non-success status
    Rejected { status: u16, body: String },
    /// Transport, timeout, credential, or (de)serialization failure
    Client(String),
    /// A create succeeded remotely but its response carried no usable record id
    Protocol(String),
}

impl CrmError {
    pub fn client(message: impl Into<String>) -> Self {
        CrmError::Client(message.into())
    }

    /// Short label used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            CrmError::Rejected { .. } => "remote_rejected",
            CrmError::Client(_) => "client_error",
            CrmError::Protocol(_) => "protocol_violation",
        }
    }
}

impl std::fmt::Display for CrmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrmError::Rejected { status, body } => {
                write!(f, "Request rejected with HTTP {}: {}", status, body)
            }
            CrmError::Client(message) => write!(f, "Client error: {}", message),
            CrmError::Protocol(message) => write!(f, "Protocol violation: {}", message),
        }
    }
}

impl std::error::Error for CrmError {}

impl From<reqwest::Error> for CrmError {
    fn from(err: reqwest::Error) -> Self {
        CrmError::Client(err.to_string())
    }
}

impl From<BindingError> for CrmError {
    fn from(err: BindingError) -> Self {
        CrmError::Client(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_body() {
        let err = CrmError::Rejected {
            status: 400,
            body: "{\"error\":{\"message\":\"bad\"}}".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Request rejected with HTTP 400: {\"error\":{\"message\":\"bad\"}}"
        );
        assert_eq!(err.kind(), "remote_rejected");
    }

    #[test]
    fn test_binding_errors_are_client_errors() {
        let err: CrmError = BindingError::NotAnObject { entity: "product" }.into();
        assert_eq!(err.kind(), "client_error");
    }
}
