//! Errors produced by compiled operations.

use std::fmt::Display;

/// Failure of a single operation invocation.
///
/// `Clone` because one in-flight future is shared between its caller and any
/// drain waiting on it; every waiter receives its own copy of the error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    /// The node named no loadable module, or the module produced no function
    /// for its details.
    #[error("Failed to get asyncFn for module {}", .module.as_deref().unwrap_or("undefined"))]
    ModuleUnavailable { module: Option<String> },

    #[error("Invalid HTTP method {method}")]
    InvalidMethod { method: String },

    /// Non-success HTTP status.
    #[error("request to {url} failed with status {status} {status_text}")]
    Status {
        url: String,
        status: u16,
        status_text: String,
        body: String,
    },

    /// Opaque transport failure (network, filesystem, database).
    #[error("{module} transport failed: {message}")]
    Transport { module: String, message: String },

    #[error("unknown operation: {id}")]
    UnknownOperation { id: String },

    #[error("Unable to merge aggregate responses")]
    Aggregate,

    /// Operation details a transport cannot work with.
    #[error("invalid operation definition: {message}")]
    InvalidDefinition { message: String },
}

impl OperationError {
    /// Wraps any displayable transport error, keeping its full message.
    pub fn transport(module: impl Into<String>, error: impl Display) -> Self {
        Self::Transport {
            module: module.into(),
            message: error.to_string(),
        }
    }

    pub fn invalid_definition(message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            message: message.into(),
        }
    }

    /// `true` for failures caused by the definition document rather than by
    /// the remote side.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ModuleUnavailable { .. }
                | Self::InvalidMethod { .. }
                | Self::UnknownOperation { .. }
                | Self::InvalidDefinition { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_unavailable_names_the_module() {
        let err = OperationError::ModuleUnavailable {
            module: Some("ftp".to_string()),
        };
        assert_eq!(err.to_string(), "Failed to get asyncFn for module ftp");
    }

    #[test]
    fn module_unavailable_without_name_says_undefined() {
        let err = OperationError::ModuleUnavailable { module: None };
        assert_eq!(err.to_string(), "Failed to get asyncFn for module undefined");
    }

    #[test]
    fn transport_keeps_source_message() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = OperationError::transport("file", &io);
        assert_eq!(err.to_string(), "file transport failed: no such file");
        assert!(!err.is_configuration());
    }

    #[test]
    fn status_display_includes_code() {
        let err = OperationError::Status {
            url: "http://h/a".to_string(),
            status: 404,
            status_text: "Not Found".to_string(),
            body: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "request to http://h/a failed with status 404 Not Found"
        );
    }

    #[test]
    fn configuration_errors_are_classified() {
        assert!(OperationError::InvalidMethod {
            method: "PATCH".to_string()
        }
        .is_configuration());
        assert!(!OperationError::Aggregate.is_configuration());
    }
}
