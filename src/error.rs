//! Error types and handling for controllers, the container and the pipeline.
//!
//! Errors carry an [`ErrorKind`] that decides the HTTP status and a stable
//! error code. Every error implements `IntoResponse` and serializes to JSON,
//! which is also how the pipeline answers a request whose error no exception
//! filter handled.
//!
//! # Design
//!
//! This module uses an opaque `Error` struct paired with an `ErrorKind` enum,
//! following the `std::io::Error` pattern. Handlers and pipes can wrap any
//! error source without the framework knowing its concrete type.
//!
//! # Example
//!
//! ```rust
//! use axum_controllers::{Error, ErrorKind};
//!
//! let error = Error::invalid_input("name must not be empty");
//!
//! match error.kind() {
//!     ErrorKind::InvalidInput => println!("Bad request: {}", error),
//!     ErrorKind::NotInjectable => println!("Startup failure: {}", error),
//!     _ => println!("Other error: {}", error),
//! }
//!
//! use axum::http::StatusCode;
//! assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The kind of error that occurred.
///
/// `NotInjectable` and `CyclicDependency` only ever happen while the
/// application is being compiled; they are fatal and never produced while
/// serving a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A type was resolved from the container without being registered.
    #[error("not injectable")]
    NotInjectable,

    /// The declared dependencies of injectable types form a cycle.
    #[error("cyclic dependency")]
    CyclicDependency,

    /// Configuration error (invalid TOML, bad values).
    #[error("configuration error")]
    Configuration,

    /// Invalid input (unparsable body, rejected parameter, bad route metadata).
    #[error("invalid input")]
    InvalidInput,

    /// The caller is not allowed to perform the request.
    #[error("forbidden")]
    Forbidden,

    /// The requested entity does not exist.
    #[error("not found")]
    NotFound,

    /// The request body exceeds the configured payload limit.
    #[error("payload too large")]
    PayloadTooLarge,

    /// I/O error (file operations, network).
    #[error("I/O error")]
    Io,

    /// Internal/unexpected error.
    #[error("internal error")]
    Internal,
}

/// An error produced by the framework or by user handlers, pipes and
/// constructors.
///
/// Use [`Error::kind()`] to match on the category and the `Display`
/// implementation for a human-readable message.
///
/// ```rust
/// use axum_controllers::Error;
///
/// let err = Error::internal("unexpected state");
/// let err = Error::not_found("user 42");
/// let err = Error::config("bind_port must not be 0");
/// ```
pub struct Error {
    kind: ErrorKind,
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl Error {
    /// Creates a new error with the given kind and source.
    ///
    /// ```rust
    /// use axum_controllers::{Error, ErrorKind};
    ///
    /// let err = Error::new(ErrorKind::Internal, "something went wrong");
    /// assert_eq!(err.kind(), ErrorKind::Internal);
    /// ```
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self {
            kind,
            source: error.into(),
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error code string for this error.
    ///
    /// This is a stable identifier suitable for client-side error handling.
    pub fn error_code(&self) -> &'static str {
        match self.kind {
            ErrorKind::NotInjectable => "NOT_INJECTABLE",
            ErrorKind::CyclicDependency => "CYCLIC_DEPENDENCY",
            ErrorKind::Configuration => "CONFIG_ERROR",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorKind::Io => "IO_ERROR",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::NotInjectable
            | ErrorKind::CyclicDependency
            | ErrorKind::Configuration
            | ErrorKind::Io
            | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converts the error into a structured error response.
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.error_code(), self.to_string())
    }

    /// Consumes the error and returns the inner error source.
    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self.source
    }

    /// Builds the generic error response without consuming the error.
    ///
    /// Used by the pipeline when an error is shared with exception filters.
    pub(crate) fn to_response(&self) -> Response {
        let status = self.status_code();
        let error_response = self.to_error_response();

        tracing::error!(
            error_code = %error_response.error_code,
            message = %error_response.message,
            status = %status.as_u16(),
            "Error occurred"
        );

        (status, Json(error_response)).into_response()
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl Error {
    /// Creates a "not injectable" error naming the offending type.
    pub fn not_injectable(type_name: &str) -> Self {
        Self::new(
            ErrorKind::NotInjectable,
            format!("Type {type_name} is not registered as injectable"),
        )
    }

    /// Creates a cyclic dependency error from the chain of type names that
    /// closes the cycle, e.g. `["A", "B", "A"]`.
    pub fn cyclic_dependency<S: AsRef<str>>(cycle: &[S]) -> Self {
        let chain = cycle
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" -> ");
        Self::new(
            ErrorKind::CyclicDependency,
            format!("Cyclic dependency detected: {chain}"),
        )
    }

    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, msg.into())
    }

    /// Creates an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, msg.into())
    }

    /// Creates a forbidden error.
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, msg.into())
    }

    /// Creates a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg.into())
    }

    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::PayloadTooLarge, msg.into())
    }

    /// Creates an I/O error from a message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, msg.into())
    }

    /// Creates an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg.into())
    }
}

// ============================================================================
// Trait implementations
// ============================================================================

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        self.to_response()
    }
}

// ============================================================================
// From implementations
// ============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::new(ErrorKind::Configuration, err)
    }
}

impl From<std::env::VarError> for Error {
    fn from(err: std::env::VarError) -> Self {
        Self::new(ErrorKind::Configuration, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::InvalidInput, err)
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::new(ErrorKind::InvalidInput, err)
    }
}

// ============================================================================
// ErrorResponse
// ============================================================================

/// Structured error response with error code and details.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Unique error code for client-side error handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Creates a new error response.
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Adds details to the error response.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
