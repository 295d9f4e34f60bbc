//! Protocol version strategy
//!
//! Each protocol version has one immutable [`Capabilities`] table, built on
//! first use: its primitive types, the build routine for every element kind it
//! allows, its annotation handlers and its wire conventions. The parser and
//! the request builders consult the table and never branch on the version.

mod v2;
mod v4;

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use roxmltree::Node;
use serde::{Deserialize, Serialize};

use crate::config::ElementKind;
use crate::error::MetadataParsingError;
use crate::metadata::{AnnotationDecl, Declaration, ParseContext};
use crate::model::QualifiedName;
use crate::types::{EdmType, Typ};

/// Supported OData protocol versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ODataVersion {
    #[default]
    V2,
    V3,
    V4,
}

impl ODataVersion {
    /// Capability table of this version
    pub fn capabilities(self) -> &'static Capabilities {
        match self {
            ODataVersion::V2 => &V2_CAPABILITIES,
            ODataVersion::V3 => &V3_CAPABILITIES,
            ODataVersion::V4 => &V4_CAPABILITIES,
        }
    }
}

impl fmt::Display for ODataVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ODataVersion::V2 => f.write_str("V2"),
            ODataVersion::V3 => f.write_str("V3"),
            ODataVersion::V4 => f.write_str("V4"),
        }
    }
}

static V2_CAPABILITIES: Lazy<Capabilities> = Lazy::new(v2::capabilities_v2);
static V3_CAPABILITIES: Lazy<Capabilities> = Lazy::new(v2::capabilities_v3);
static V4_CAPABILITIES: Lazy<Capabilities> = Lazy::new(v4::capabilities);

/// Builds one metadata element from its XML node
pub type BuildFn =
    for<'a, 'input> fn(
        &mut ParseContext<'_>,
        Node<'a, 'input>,
    ) -> Result<Declaration, MetadataParsingError>;

/// Builds one annotation; the `&str` is the annotation target path
pub type AnnotationFn =
    for<'a, 'input> fn(
        &mut ParseContext<'_>,
        &str,
        Node<'a, 'input>,
    ) -> Result<AnnotationDecl, MetadataParsingError>;

/// Vocabulary terms the client understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    /// `com.sap.vocabularies.Common.v1.ValueList`
    ValueList,
    /// `Org.OData.Measures.V1.Unit`
    Unit,
}

impl AnnotationKind {
    /// Recognize an alias-resolved term name
    pub fn from_term(term: &QualifiedName) -> Option<Self> {
        match (term.namespace.as_deref(), term.name.as_str()) {
            (Some("com.sap.vocabularies.Common.v1"), "ValueList") => Some(AnnotationKind::ValueList),
            (Some("Org.OData.Measures.V1"), "Unit") => Some(AnnotationKind::Unit),
            _ => None,
        }
    }
}

/// JSON payload layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadStyle {
    /// `{"d": {"results": [...], "__count": "3"}}`
    Verbose,
    /// `{"value": [...], "@odata.count": 3}`
    Minimal,
}

/// How function import parameters are passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterStyle {
    /// `GetProducts?Category='Food'`
    Query,
    /// `GetProducts(Category='Food')`
    Path,
}

/// Wire conventions that differ between protocol versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conventions {
    /// Request headers announcing the protocol version
    pub version_headers: &'static [(&'static str, &'static str)],
    /// Query option requesting an inline count
    pub inline_count: (&'static str, &'static str),
    /// Whether substring matching is written `substringof('v',P)` instead of `contains(P,'v')`
    pub substringof: bool,
    pub payload: PayloadStyle,
    pub parameters: ParameterStyle,
    /// Whether the `MERGE` method is available for partial updates
    pub merge: bool,
}

/// Everything the parser and request builders need to know about one version
pub struct Capabilities {
    pub version: ODataVersion,
    primitive_types: Vec<Typ>,
    build_routines: HashMap<ElementKind, BuildFn>,
    annotation_handlers: HashMap<AnnotationKind, AnnotationFn>,
    edmx_namespaces: &'static [&'static str],
    edm_namespaces: &'static [&'static str],
    pub conventions: Conventions,
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&ElementKind> = self.build_routines.keys().collect();
        kinds.sort();
        f.debug_struct("Capabilities")
            .field("version", &self.version)
            .field("primitive_types", &self.primitive_types)
            .field("element_kinds", &kinds)
            .field("conventions", &self.conventions)
            .finish()
    }
}

impl Capabilities {
    pub fn primitive_types(&self) -> &[Typ] {
        &self.primitive_types
    }

    /// The primitive type for `edm`, if this version supports it
    pub fn typ(&self, edm: EdmType) -> Option<&Typ> {
        self.primitive_types.iter().find(|typ| typ.edm() == edm)
    }

    /// The primitive type named e.g. `Edm.Int32`
    pub fn typ_by_name(&self, name: &str) -> Option<&Typ> {
        EdmType::from_name(name).and_then(|edm| self.typ(edm))
    }

    pub fn build_routine(&self, kind: ElementKind) -> Option<BuildFn> {
        self.build_routines.get(&kind).copied()
    }

    pub fn annotation_handler(&self, kind: AnnotationKind) -> Option<AnnotationFn> {
        self.annotation_handlers.get(&kind).copied()
    }

    pub fn edmx_namespaces(&self) -> &'static [&'static str] {
        self.edmx_namespaces
    }

    pub fn edm_namespaces(&self) -> &'static [&'static str] {
        self.edm_namespaces
    }
}
