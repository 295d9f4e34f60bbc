//! Qualified names and type references

use std::fmt;

/// A namespace-qualified element name such as `EPM.Employee`.
///
/// Names written without a namespace keep `namespace: None` and match any
/// namespace on lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    pub namespace: Option<String>,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// A name without namespace
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Split `Ns.Sub.Name` at the last dot
    pub fn parse(text: &str) -> Self {
        match text.rsplit_once('.') {
            Some((namespace, name)) => Self::new(namespace, name),
            None => Self::local(text),
        }
    }

    /// Whether `self`, used as a lookup key, designates `candidate`
    pub fn matches(&self, candidate: &QualifiedName) -> bool {
        self.name == candidate.name
            && match (&self.namespace, &candidate.namespace) {
                (Some(wanted), Some(actual)) => wanted == actual,
                _ => true,
            }
    }

    /// Same name, namespace filled in when missing
    pub fn or_namespace(mut self, namespace: &str) -> Self {
        if self.namespace.is_none() {
            self.namespace = Some(namespace.to_string());
        }
        self
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}.{}", namespace, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A type reference as written in metadata, e.g. `Collection(Edm.String)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    pub name: QualifiedName,
    pub is_collection: bool,
}

impl TypeInfo {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text
            .strip_prefix("Collection(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            Some(inner) => Self {
                name: QualifiedName::parse(inner.trim()),
                is_collection: true,
            },
            None => Self {
                name: QualifiedName::parse(text),
                is_collection: false,
            },
        }
    }

    /// Whether the reference designates an `Edm.*` primitive
    pub fn is_primitive(&self) -> bool {
        self.name.namespace.as_deref() == Some("Edm")
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_collection {
            write!(f, "Collection({})", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}
