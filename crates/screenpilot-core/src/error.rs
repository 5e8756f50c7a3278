//! Error types with actionable suggestions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::port::PortError;

/// Error codes for gesture failures and protocol responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidArgument,
    InvalidOperation,
    InvalidState,
    UnsupportedUsage,
    PortFailure,
    SessionNotFound,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::InvalidArgument => write!(f, "INVALID_ARGUMENT"),
            ErrorCode::InvalidOperation => write!(f, "INVALID_OPERATION"),
            ErrorCode::InvalidState => write!(f, "INVALID_STATE"),
            ErrorCode::UnsupportedUsage => write!(f, "UNSUPPORTED_USAGE"),
            ErrorCode::PortFailure => write!(f, "PORT_FAILURE"),
            ErrorCode::SessionNotFound => write!(f, "SESSION_NOT_FOUND"),
            ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

/// An error with a machine-readable code and a hint for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub suggestion: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (hint: {})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidArgument,
            message: message.into(),
            suggestion: Some("Pass whole, non-negative pixel counts".into()),
        }
    }

    /// Create an invalid argument error with a custom suggestion.
    pub fn invalid_argument_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            code: ErrorCode::InvalidArgument,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidOperation,
            message: message.into(),
            suggestion: Some("Vectors can only be divided by a non-zero scalar".into()),
        }
    }

    /// The drop half of a drag was requested without a preceding drag.
    pub fn not_dragged(point: impl fmt::Display) -> Self {
        Self {
            code: ErrorCode::InvalidState,
            message: format!("Cannot drop {}: it was not dragged before", point),
            suggestion: Some("Start the gesture with 'screenpilot drag-to' first".into()),
        }
    }

    /// Create an unsupported usage error with a custom suggestion.
    pub fn unsupported_usage_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            code: ErrorCode::UnsupportedUsage,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// The input backend refused or failed an operation.
    pub fn port_failed(operation: &str, error: &PortError) -> Self {
        Self {
            code: ErrorCode::PortFailure,
            message: format!("Input backend failed during {}: {}", operation, error),
            suggestion: Some(
                "Check that the daemon runs in a graphical session with input permissions".into(),
            ),
        }
    }

    pub fn handle_not_found(handle: &str) -> Self {
        Self {
            code: ErrorCode::SessionNotFound,
            message: format!("Handle '{}' not found", handle),
            suggestion: Some("Run 'screenpilot handles' to see open handles".into()),
        }
    }

    pub fn no_handles() -> Self {
        Self {
            code: ErrorCode::SessionNotFound,
            message: "No open handles".to_string(),
            suggestion: Some("Run 'screenpilot open <x> <y>' to create a handle".into()),
        }
    }

    /// Several handles are open and none was named.
    pub fn ambiguous_handle(count: usize) -> Self {
        Self {
            code: ErrorCode::SessionNotFound,
            message: format!("{} handles are open and none was selected", count),
            suggestion: Some("Pass --handle <name-or-id>".into()),
        }
    }

    pub fn duplicate_handle_name(name: &str) -> Self {
        Self {
            code: ErrorCode::InvalidArgument,
            message: format!("Handle name '{}' already exists", name),
            suggestion: Some(format!(
                "Choose a different name with --name, or close the existing '{}' handle first",
                name
            )),
        }
    }

    /// Create an error when the handle limit is reached.
    pub fn handle_limit_reached(max: usize) -> Self {
        Self {
            code: ErrorCode::InvalidState,
            message: format!("Maximum handle limit ({}) reached", max),
            suggestion: Some(
                "Close an existing handle with 'screenpilot close' before opening a new one"
                    .into(),
            ),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InternalError,
            message: message.into(),
            suggestion: Some("This is an internal error. Please report it if it persists.".into()),
        }
    }
}
