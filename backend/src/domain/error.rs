//! Domain-level error types.
//!
//! These errors are adapter agnostic: the CLI renders them as JSON, and any
//! future inbound adapter maps [`ErrorCode`] onto its own envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is malformed, out of bounds, or fails validation.
    InvalidInput,
    /// Every upstream path failed and no fallback could be produced.
    UpstreamUnavailable,
    /// The requested record does not exist.
    NotFound,
    /// The caller abandoned the request before it completed.
    Cancelled,
    /// An unexpected error occurred inside the domain.
    InternalError,
}

/// Domain error payload.
///
/// ## Invariants
/// - `message` is non-empty once trimmed of whitespace.
///
/// # Examples
/// ```
/// use geo_analysis::domain::{Error, ErrorCode};
///
/// let err = Error::invalid_input("latitude must be between -90 and 90");
/// assert_eq!(err.code(), ErrorCode::InvalidInput);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
#[serde(try_from = "ErrorDto", into = "ErrorDto")]
pub struct Error {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

/// Validation errors emitted by [`Error::try_new`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorValidationError {
    /// The message was blank.
    #[error("error message must not be empty")]
    EmptyMessage,
}

const PLACEHOLDER_MESSAGE: &str = "unspecified error";

impl Error {
    /// Create a new error.
    ///
    /// Blank messages are replaced with a fixed placeholder so callers never
    /// have to handle a construction failure on an error path.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            PLACEHOLDER_MESSAGE.to_owned()
        } else {
            message
        };
        Self {
            code,
            message,
            details: None,
        }
    }

    /// Fallible constructor that rejects blank messages.
    pub fn try_new(code: ErrorCode, message: impl Into<String>) -> Result<Self, ErrorValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ErrorValidationError::EmptyMessage);
        }
        Ok(Self {
            code,
            message,
            details: None,
        })
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Supplementary structured details.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Attach structured details to the error.
    ///
    /// # Examples
    /// ```
    /// use geo_analysis::domain::Error;
    /// use serde_json::json;
    ///
    /// let err = Error::invalid_input("bad radius").with_details(json!({ "field": "radius_m" }));
    /// assert!(err.details().is_some());
    /// ```
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Convenience constructor for [`ErrorCode::InvalidInput`].
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Convenience constructor for [`ErrorCode::UpstreamUnavailable`].
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamUnavailable, message)
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::Cancelled`].
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cancelled, message)
    }

    /// Convenience constructor for [`ErrorCode::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDto {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl From<Error> for ErrorDto {
    fn from(value: Error) -> Self {
        Self {
            code: value.code,
            message: value.message,
            details: value.details,
        }
    }
}

impl TryFrom<ErrorDto> for Error {
    type Error = ErrorValidationError;

    fn try_from(value: ErrorDto) -> Result<Self, Self::Error> {
        let ErrorDto {
            code,
            message,
            details,
        } = value;
        let mut error = Error::try_new(code, message)?;
        error.details = details;
        Ok(error)
    }
}

#[cfg(test)]
mod tests {
    //! Serialisation and constructor behaviour of domain errors.

    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(Error::invalid_input("x"), ErrorCode::InvalidInput)]
    #[case(Error::upstream_unavailable("x"), ErrorCode::UpstreamUnavailable)]
    #[case(Error::not_found("x"), ErrorCode::NotFound)]
    #[case(Error::cancelled("x"), ErrorCode::Cancelled)]
    #[case(Error::internal("x"), ErrorCode::InternalError)]
    fn constructors_set_code(#[case] err: Error, #[case] expected: ErrorCode) {
        assert_eq!(err.code(), expected);
    }

    #[test]
    fn blank_message_is_rejected_by_try_new() {
        let err = Error::try_new(ErrorCode::NotFound, "  ").expect_err("blank rejected");
        assert_eq!(err, ErrorValidationError::EmptyMessage);
    }

    #[test]
    fn blank_message_falls_back_to_placeholder() {
        let err = Error::internal("");
        assert_eq!(err.message(), PLACEHOLDER_MESSAGE);
    }

    #[test]
    fn serialises_with_snake_case_code() {
        let err = Error::invalid_input("radius too large").with_details(json!({ "field": "radius_m" }));
        let value = serde_json::to_value(&err).expect("serialise");
        assert_eq!(
            value,
            json!({
                "code": "invalid_input",
                "message": "radius too large",
                "details": { "field": "radius_m" }
            })
        );
    }

    #[test]
    fn deserialising_blank_message_fails() {
        let raw = json!({ "code": "not_found", "message": " " });
        assert!(serde_json::from_value::<Error>(raw).is_err());
    }
}
