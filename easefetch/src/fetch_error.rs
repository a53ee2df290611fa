#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::any::Any;
use thiserror::Error;

/// Where in a fetch cycle an error was raised.
///
/// The kind is visible to the `on_error` observer only. Emitted state does not
/// distinguish a failed fetch from a failed transform.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorKind {
    /// The fetch capability resolved to an error.
    Fetch,
    /// The transform rejected a successful result.
    Transform,
    /// The fetch capability, its future, or the transform panicked.
    Panicked,
}

/// A single record of an API error body.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ErrorRecord {
    pub code: Option<String>,
    pub description: Option<String>,
}

impl ErrorRecord {
    pub fn described(description: impl Into<String>) -> Self {
        ErrorRecord {
            code: None,
            description: Some(description.into()),
        }
    }
}

/// Response data attached to an error by a transport, e.g. an HTTP error body.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ErrorResponse {
    pub data: Vec<ErrorRecord>,
}

impl ErrorResponse {
    pub fn new(data: Vec<ErrorRecord>) -> Self {
        ErrorResponse { data }
    }

    /// Parses a body of the form `{"data": [{"description": "..."}]}`.
    #[cfg(feature = "serde")]
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// Description of the first record, when there is a non-empty one.
    pub fn first_description(&self) -> Option<&str> {
        self.data
            .first()
            .and_then(|record| record.description.as_deref())
            .filter(|description| !description.is_empty())
    }
}

/// Error raised or returned during a fetch cycle.
///
/// Carries a generic message and, optionally, structured response data. Use
/// [`FetchError::normalized_message`] to get the string shown to users.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{}", .message.as_deref().unwrap_or("fetch failed"))]
pub struct FetchError {
    kind: ErrorKind,
    message: Option<String>,
    response: Option<ErrorResponse>,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        FetchError {
            kind: ErrorKind::Fetch,
            message: Some(message.into()),
            response: None,
        }
    }

    /// An error with no generic message at all.
    pub fn empty() -> Self {
        FetchError {
            kind: ErrorKind::Fetch,
            message: None,
            response: None,
        }
    }

    /// Wraps any error type, keeping its `Display` output as the message.
    pub fn from_error<E: std::error::Error>(error: E) -> Self {
        FetchError::new(error.to_string())
    }

    pub fn transform(message: impl Into<String>) -> Self {
        FetchError::new(message).with_kind(ErrorKind::Transform)
    }

    pub(crate) fn panicked(panic: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = panic.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = panic.downcast_ref::<String>() {
            message.clone()
        } else {
            "fetch cycle panicked".to_string()
        };
        FetchError::new(message).with_kind(ErrorKind::Panicked)
    }

    pub fn with_response(self, response: ErrorResponse) -> Self {
        FetchError {
            response: Some(response),
            ..self
        }
    }

    pub fn with_kind(self, kind: ErrorKind) -> Self {
        FetchError { kind, ..self }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn response(&self) -> Option<&ErrorResponse> {
        self.response.as_ref()
    }

    /// Display string for this error.
    ///
    /// The first response record's description wins when present. Otherwise
    /// the generic message is used as is, which may be absent.
    pub fn normalized_message(&self) -> Option<String> {
        self.response
            .as_ref()
            .and_then(ErrorResponse::first_description)
            .map(str::to_string)
            .or_else(|| self.message.clone())
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self.kind, ErrorKind::Fetch)
    }

    pub fn is_transform(&self) -> bool {
        matches!(self.kind, ErrorKind::Transform)
    }

    pub fn is_panicked(&self) -> bool {
        matches!(self.kind, ErrorKind::Panicked)
    }
}

impl From<&str> for FetchError {
    fn from(message: &str) -> Self {
        FetchError::new(message)
    }
}

impl From<String> for FetchError {
    fn from(message: String) -> Self {
        FetchError::new(message)
    }
}
