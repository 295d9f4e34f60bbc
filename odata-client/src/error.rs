//! Error taxonomy
//!
//! Parse-time faults are `MetadataParsingError`s governed by the configured
//! policies. Caller misuse is a `ProgramError`. Non-success HTTP statuses are
//! `HttpError`s. A failure confined to one slot of a batch is a `BatchPartError`.

use std::fmt;

use crate::config::ElementKind;
use crate::transport::{HttpResponse, TransportError};
use crate::vendor::ErrorDetails;
use crate::version::ODataVersion;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Any error produced by the client
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Metadata(#[from] MetadataParsingError),
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl Error {
    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Error::Decode(message.into())
    }
}

/// Why a metadata element could not be built or resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFault {
    /// The element itself is malformed
    Malformed(String),
    /// The element references something that does not exist
    Unresolved(String),
    /// The element kind has no build routine for the selected protocol version
    NotImplemented(ODataVersion),
}

impl fmt::Display for ParseFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseFault::Malformed(message) | ParseFault::Unresolved(message) => {
                f.write_str(message)
            }
            ParseFault::NotImplemented(version) => {
                write!(f, "element is not implemented in OData {version}")
            }
        }
    }
}

/// A metadata element failed to parse or resolve
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{kind}] {location}: {fault}")]
pub struct MetadataParsingError {
    pub kind: ElementKind,
    /// Slash-separated path to the element, e.g. `EPM/EntityType(Employee)/Property(Age)`
    pub location: String,
    pub fault: ParseFault,
}

impl MetadataParsingError {
    pub fn malformed(
        kind: ElementKind,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            location: location.into(),
            fault: ParseFault::Malformed(message.into()),
        }
    }

    pub fn unresolved(
        kind: ElementKind,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            location: location.into(),
            fault: ParseFault::Unresolved(message.into()),
        }
    }

    pub fn not_implemented(
        kind: ElementKind,
        location: impl Into<String>,
        version: ODataVersion,
    ) -> Self {
        Self {
            kind,
            location: location.into(),
            fault: ParseFault::NotImplemented(version),
        }
    }

    /// Document-level error, never subject to a policy
    pub fn document(message: impl Into<String>) -> Self {
        Self::malformed(ElementKind::Schema, "", message)
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self.fault, ParseFault::NotImplemented(_))
    }
}

/// Caller misuse, raised immediately
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgramError {
    #[error("Entity set {0} does not exist")]
    UnknownEntitySet(String),
    #[error("Type {0} does not exist")]
    UnknownType(String),
    #[error("Property {property} is not declared in {entity_type} entity type")]
    UnknownProperty {
        entity_type: String,
        property: String,
    },
    #[error("Navigation property {property} is not declared in {entity_type} entity type")]
    UnknownNavigationProperty {
        entity_type: String,
        property: String,
    },
    #[error("Function import {0} does not exist")]
    UnknownFunction(String),
    #[error("Parameter {parameter} is not declared in function import {function}")]
    UnknownParameter { function: String, parameter: String },
    #[error("Missing value for parameter {parameter} of function import {function}")]
    MissingParameter { function: String, parameter: String },
    #[error("{0}")]
    InvalidKey(String),
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    #[error("{0}")]
    InvalidRequest(String),
}

/// Reading through a stub substituted during metadata parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error(
        "Cannot access {kind} {name}. An error occurred during parsing ({reason}), therefore it has been replaced with a stub."
    )]
    Unresolved {
        kind: ElementKind,
        name: String,
        reason: String,
    },
}

/// A value could not be converted between its native and wire forms
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("Cannot represent {value} as {edm}")]
    TypeMismatch { edm: String, value: String },
    #[error("Invalid {edm} literal '{text}'")]
    InvalidLiteral { edm: String, text: String },
    #[error("Invalid {edm} JSON value {json}")]
    InvalidJson { edm: String, json: String },
    #[error("Value {value} is out of range for {edm}")]
    OutOfRange { edm: String, value: String },
    #[error("Facet {facet} violated: {message}")]
    FacetViolation {
        facet: &'static str,
        message: String,
    },
    #[error("{edm} values have no {form} representation")]
    Unsupported { edm: String, form: &'static str },
    #[error("Absent values cannot be encoded")]
    Absent,
}

/// The server answered with a status the request did not expect
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HttpError {
    pub message: String,
    /// The raw response, kept for inspection
    pub response: HttpResponse,
    /// Vendor-specific detail extracted by an `HttpErrorParser`
    pub details: Option<ErrorDetails>,
}

impl HttpError {
    pub fn new(message: impl Into<String>, response: HttpResponse) -> Self {
        Self {
            message: message.into(),
            response,
            details: None,
        }
    }

    pub fn with_details(mut self, details: Option<ErrorDetails>) -> Self {
        if let Some(message) = details.as_ref().and_then(|d| d.message.as_deref()) {
            self.message = format!("{}: {}", self.message, message);
        }
        self.details = details;
        self
    }

    pub fn status(&self) -> u16 {
        self.response.status
    }
}

/// Isolated failure of exactly one slot of a batch response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchPartError {
    #[error("Batch part {index} has malformed headers: {detail}")]
    MalformedHeaders { index: usize, detail: String },
    #[error("Batch part {index} is truncated: {detail}")]
    Truncated { index: usize, detail: String },
    #[error("Batch part {index} declares Content-Length {declared} but carries {actual} bytes")]
    LengthMismatch {
        index: usize,
        declared: usize,
        actual: usize,
    },
    #[error("Batch part {index} has an invalid status line '{line}'")]
    MalformedStatusLine { index: usize, line: String },
    #[error("Batch part {index} failed with status {status}")]
    Status {
        index: usize,
        status: u16,
        body: String,
    },
    #[error("Batch part {index} could not be decoded: {detail}")]
    Decode { index: usize, detail: String },
    #[error("Batch part {index} is missing from the response")]
    Missing { index: usize },
    #[error("Batch part {index} does not match its request: {detail}")]
    Unexpected { index: usize, detail: String },
}

impl BatchPartError {
    /// Position of the failing part within its batch or changeset
    pub fn index(&self) -> usize {
        match self {
            BatchPartError::MalformedHeaders { index, .. }
            | BatchPartError::Truncated { index, .. }
            | BatchPartError::LengthMismatch { index, .. }
            | BatchPartError::MalformedStatusLine { index, .. }
            | BatchPartError::Status { index, .. }
            | BatchPartError::Decode { index, .. }
            | BatchPartError::Missing { index }
            | BatchPartError::Unexpected { index, .. } => *index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_error_display() {
        let error = MetadataParsingError::unresolved(
            ElementKind::NavigationProperty,
            "EPM/EntityType(Employee)/NavigationProperty(Manager)",
            "Association EPM.Missing does not exist",
        );
        assert_eq!(
            error.to_string(),
            "[NavigationProperty] EPM/EntityType(Employee)/NavigationProperty(Manager): Association EPM.Missing does not exist"
        );
        assert!(!error.is_not_implemented());
    }

    #[test]
    fn test_not_implemented_display() {
        let error = MetadataParsingError::not_implemented(
            ElementKind::Association,
            "Cars/Association(Link)",
            ODataVersion::V4,
        );
        assert!(error.is_not_implemented());
        assert!(error.to_string().contains("not implemented in OData V4"));
    }

    #[test]
    fn test_http_error_details_extend_message() {
        let response = HttpResponse::new(400);
        let details = ErrorDetails {
            code: Some("SY/530".to_string()),
            message: Some("Employee is locked".to_string()),
            details: Vec::new(),
        };
        let error = HttpError::new("POST Employees failed with status 400", response)
            .with_details(Some(details));
        assert_eq!(
            error.to_string(),
            "POST Employees failed with status 400: Employee is locked"
        );
        assert_eq!(error.status(), 400);
    }

    #[test]
    fn test_batch_part_error_index() {
        let error = BatchPartError::LengthMismatch {
            index: 1,
            declared: 10,
            actual: 4,
        };
        assert_eq!(error.index(), 1);
    }
}
