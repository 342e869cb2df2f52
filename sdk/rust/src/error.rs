//! Typed error system for the Cuckoo SDK.
//!
//! Every failure surfaces as an [`SdkError`] carrying an [`ErrorCode`]. Codes
//! separate build-time mistakes, missing records, server-reported GraphQL
//! errors and transport failures, and only transport failures are retryable.

use cuckoo_document::DocumentError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::transport::GraphQLError;

/// Typed error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // Build-time errors
    InvalidOperation,
    HandlePending,
    BatchAborted,
    BatchClosed,

    // Result errors
    NotFound,
    InsertFailed,
    MutationFailed,
    GraphqlErrors,

    // Network errors
    NetworkError,
    Timeout,
    ConnectionRefused,

    // Protocol errors
    HttpError,
    HttpsNotSupported,
    InvalidUrl,
    InvalidResponse,

    // Serialization errors
    SerializeError,
    DeserializeError,

    RetriesExhausted,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidOperation => "INVALID_OPERATION",
            Self::HandlePending => "HANDLE_PENDING",
            Self::BatchAborted => "BATCH_ABORTED",
            Self::BatchClosed => "BATCH_CLOSED",
            Self::NotFound => "NOT_FOUND",
            Self::InsertFailed => "INSERT_FAILED",
            Self::MutationFailed => "MUTATION_FAILED",
            Self::GraphqlErrors => "GRAPHQL_ERRORS",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::ConnectionRefused => "CONNECTION_REFUSED",
            Self::HttpError => "HTTP_ERROR",
            Self::HttpsNotSupported => "HTTPS_NOT_SUPPORTED",
            Self::InvalidUrl => "INVALID_URL",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::SerializeError => "SERIALIZE_ERROR",
            Self::DeserializeError => "DESERIALIZE_ERROR",
            Self::RetriesExhausted => "RETRIES_EXHAUSTED",
        }
    }

    /// Returns true if a retry policy may repeat the request.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::Timeout | Self::ConnectionRefused | Self::HttpError
        )
    }

    /// Returns true for mistakes in how the SDK was used.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidOperation
                | Self::HandlePending
                | Self::BatchAborted
                | Self::BatchClosed
                | Self::InvalidUrl
                | Self::SerializeError
        )
    }

    /// Returns true for failures of the transport or the endpoint.
    pub const fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::NetworkError
                | Self::Timeout
                | Self::ConnectionRefused
                | Self::HttpError
                | Self::HttpsNotSupported
                | Self::InvalidUrl
                | Self::InvalidResponse
                | Self::RetriesExhausted
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strongly typed SDK error.
#[derive(Error, Debug, Clone)]
#[error("[{code}] {message}")]
pub struct SdkError {
    /// Typed error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Underlying error, e.g. the last attempt of an exhausted retry loop.
    #[source]
    pub source: Option<Box<SdkError>>,
    /// Errors reported by the server, set for [`ErrorCode::GraphqlErrors`].
    pub graphql_errors: Vec<GraphQLError>,
    /// Extension data for debugging.
    pub extensions: Option<IndexMap<String, serde_json::Value>>,
}

impl SdkError {
    /// Creates a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            graphql_errors: Vec::new(),
            extensions: None,
        }
    }

    /// Adds a source error.
    pub fn with_source(mut self, source: SdkError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Adds extension data.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let extensions = self.extensions.get_or_insert_with(IndexMap::new);
        if let Ok(v) = serde_json::to_value(value) {
            extensions.insert(key.into(), v);
        }
        self
    }

    // Convenience constructors

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidOperation, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    pub fn timeout() -> Self {
        Self::new(ErrorCode::Timeout, "Request timed out")
    }

    pub fn not_found(resource: impl fmt::Display) -> Self {
        Self::new(ErrorCode::NotFound, format!("{resource} not found"))
    }

    pub fn serialize(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializeError, message)
    }

    pub fn deserialize(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DeserializeError, message)
    }

    /// Aggregates the errors a server returned for one document.
    pub fn graphql(errors: Vec<GraphQLError>) -> Self {
        let message = errors
            .iter()
            .map(|error| error.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            graphql_errors: errors,
            ..Self::new(ErrorCode::GraphqlErrors, message)
        }
    }

    /// Returns the messages of every server-reported error.
    pub fn graphql_messages(&self) -> impl Iterator<Item = &str> {
        self.graphql_errors.iter().map(|error| error.message.as_str())
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn is_client_error(&self) -> bool {
        self.code.is_client_error()
    }

    pub fn is_transport_error(&self) -> bool {
        self.code.is_transport_error()
    }
}

impl From<DocumentError> for SdkError {
    fn from(error: DocumentError) -> Self {
        Self::invalid_operation(error.to_string())
    }
}

impl Serialize for SdkError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("SdkError", 4)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("message", &self.message)?;
        if !self.graphql_errors.is_empty() {
            state.serialize_field("errors", &self.graphql_errors)?;
        }
        if let Some(ref ext) = self.extensions {
            state.serialize_field("extensions", ext)?;
        }
        state.end()
    }
}

/// Type alias for SDK results.
pub type SdkResult<T> = std::result::Result<T, SdkError>;

/// Extension trait for converting other errors to SdkError.
pub trait IntoSdkError {
    fn into_sdk_error(self, code: ErrorCode) -> SdkError;
}

impl<E: std::error::Error> IntoSdkError for E {
    fn into_sdk_error(self, code: ErrorCode) -> SdkError {
        SdkError::new(code, self.to_string())
    }
}

/// Result extension for mapping errors with context.
pub trait ResultExt<T> {
    /// Maps the error to an SdkError with the given code.
    fn map_sdk_err(self, code: ErrorCode) -> SdkResult<T>;

    /// Maps the error to an SdkError with the given code and message.
    fn map_sdk_err_with(self, code: ErrorCode, message: impl Into<String>) -> SdkResult<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn map_sdk_err(self, code: ErrorCode) -> SdkResult<T> {
        self.map_err(|e| e.into_sdk_error(code))
    }

    fn map_sdk_err_with(self, code: ErrorCode, message: impl Into<String>) -> SdkResult<T> {
        self.map_err(|e| {
            SdkError::new(code, message).with_extension("original_error", e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_properties() {
        assert!(ErrorCode::Timeout.is_retryable());
        assert!(!ErrorCode::GraphqlErrors.is_retryable());
        assert!(!ErrorCode::NotFound.is_retryable());

        assert!(ErrorCode::HandlePending.is_client_error());
        assert!(!ErrorCode::NetworkError.is_client_error());

        assert!(ErrorCode::RetriesExhausted.is_transport_error());
        assert!(!ErrorCode::GraphqlErrors.is_transport_error());
    }

    #[test]
    fn test_graphql_errors_are_aggregated() {
        let err = SdkError::graphql(vec![
            GraphQLError::new("field 'x' not found"),
            GraphQLError::new("permission denied"),
        ]);

        assert_eq!(err.code, ErrorCode::GraphqlErrors);
        assert_eq!(err.message, "field 'x' not found; permission denied");
        assert_eq!(
            err.graphql_messages().collect::<Vec<_>>(),
            ["field 'x' not found", "permission denied"]
        );
    }

    #[test]
    fn test_document_errors_are_invalid_operations() {
        let err: SdkError = DocumentError::MissingAggregate.into();
        assert_eq!(err.code, ErrorCode::InvalidOperation);
        assert!(err.message.contains("at least one aggregate"));
    }

    #[test]
    fn test_error_serialization() {
        let err = SdkError::network("Connection failed").with_extension("attempt", 2);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("NETWORK_ERROR"));
        assert!(json.contains("Connection failed"));
        assert!(json.contains("\"attempt\":2"));
    }

    #[test]
    fn test_result_ext() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));

        let sdk_result = result.map_sdk_err(ErrorCode::ConnectionRefused);
        assert_eq!(sdk_result.unwrap_err().code, ErrorCode::ConnectionRefused);
    }
}
