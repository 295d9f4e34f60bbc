//! Deferred-fault placeholders for elements that failed to parse

use super::QualifiedName;
use crate::config::ElementKind;
use crate::error::ModelError;

/// Placeholder left in the graph where an element could not be built or resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stub {
    pub kind: ElementKind,
    pub name: QualifiedName,
    /// The parse fault that caused the substitution
    pub reason: String,
}

impl Stub {
    pub fn new(kind: ElementKind, name: QualifiedName, reason: impl Into<String>) -> Self {
        Self {
            kind,
            name,
            reason: reason.into(),
        }
    }

    /// The fault raised when something reads through this stub
    pub fn fault(&self) -> ModelError {
        ModelError::Unresolved {
            kind: self.kind,
            name: self.name.to_string(),
            reason: self.reason.clone(),
        }
    }
}

/// Either a fully built element or the stub that replaced it
#[derive(Debug, Clone, PartialEq)]
pub enum Resolvable<T> {
    Resolved(T),
    Unresolved(Stub),
}

impl<T> Resolvable<T> {
    /// Read through to the element; a stub raises its deferred fault here
    pub fn get(&self) -> Result<&T, ModelError> {
        match self {
            Resolvable::Resolved(value) => Ok(value),
            Resolvable::Unresolved(stub) => Err(stub.fault()),
        }
    }

    pub fn get_mut(&mut self) -> Result<&mut T, ModelError> {
        match self {
            Resolvable::Resolved(value) => Ok(value),
            Resolvable::Unresolved(stub) => Err(stub.fault()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolvable::Resolved(_))
    }

    pub fn stub(&self) -> Option<&Stub> {
        match self {
            Resolvable::Resolved(_) => None,
            Resolvable::Unresolved(stub) => Some(stub),
        }
    }

    /// The element, if resolved
    pub fn resolved(&self) -> Option<&T> {
        match self {
            Resolvable::Resolved(value) => Some(value),
            Resolvable::Unresolved(_) => None,
        }
    }

    pub fn resolved_mut(&mut self) -> Option<&mut T> {
        match self {
            Resolvable::Resolved(value) => Some(value),
            Resolvable::Unresolved(_) => None,
        }
    }
}
