//! Parse state shared by build routines, and XML access helpers

use std::collections::BTreeMap;

use roxmltree::Node;

use crate::config::{Config, ElementKind, ErrorPolicy};
use crate::error::MetadataParsingError;
use crate::model::{
    Association, AssociationConstraint, AssociationSet, Diagnostic, EntitySet, EnumType,
    FunctionImport, NavigationBinding, NavigationProperty, Operation, Property,
    ReferentialConstraint, Resolvable, StructType, Stub, Term, TypeDefinition, TypeInfo, Unit,
    ValueHelper,
};
use crate::model::QualifiedName;
use crate::version::Capabilities;

pub(crate) const SAP_NAMESPACE: &str = "http://www.sap.com/Protocols/SAPData";
pub(crate) const METADATA_NAMESPACE: &str =
    "http://schemas.microsoft.com/ado/2007/08/dataservices/metadata";

/// Output of one build routine, before cross-references are resolved
#[derive(Debug, Clone)]
pub enum Declaration {
    EntityType(StructType),
    ComplexType(StructType),
    EnumType(EnumType),
    TypeDefinition(TypeDefinition),
    Property(Property),
    NavigationProperty(NavigationProperty),
    NavigationPropertyBinding(NavigationBinding),
    /// V2 association-level constraint
    AssociationConstraint(AssociationConstraint),
    /// V4 navigation-level constraint
    ReferentialConstraint(ReferentialConstraint),
    Association(Association),
    AssociationSet(AssociationSet),
    EntitySet(EntitySet),
    FunctionImport(FunctionImport),
    Operation(Operation),
    Term(Term),
    Annotations(Vec<AnnotationDecl>),
    /// `None` for terms the client does not handle
    Annotation(Option<AnnotationDecl>),
}

impl Declaration {
    fn label(&self) -> &'static str {
        match self {
            Declaration::EntityType(_) => "EntityType",
            Declaration::ComplexType(_) => "ComplexType",
            Declaration::EnumType(_) => "EnumType",
            Declaration::TypeDefinition(_) => "TypeDefinition",
            Declaration::Property(_) => "Property",
            Declaration::NavigationProperty(_) => "NavigationProperty",
            Declaration::NavigationPropertyBinding(_) => "NavigationPropertyBinding",
            Declaration::AssociationConstraint(_) | Declaration::ReferentialConstraint(_) => {
                "ReferentialConstraint"
            }
            Declaration::Association(_) => "Association",
            Declaration::AssociationSet(_) => "AssociationSet",
            Declaration::EntitySet(_) => "EntitySet",
            Declaration::FunctionImport(_) => "FunctionImport",
            Declaration::Operation(_) => "Operation",
            Declaration::Term(_) => "Term",
            Declaration::Annotations(_) => "Annotations",
            Declaration::Annotation(_) => "Annotation",
        }
    }
}

/// A handled annotation waiting to be attached to its target
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationDecl {
    ValueList(ValueHelper),
    Unit { target: String, unit: Unit },
}

impl AnnotationDecl {
    pub fn target(&self) -> &str {
        match self {
            AnnotationDecl::ValueList(helper) => &helper.target,
            AnnotationDecl::Unit { target, .. } => target,
        }
    }
}

/// State threaded through every build routine
pub struct ParseContext<'c> {
    config: &'c Config,
    capabilities: &'static Capabilities,
    namespace: String,
    aliases: BTreeMap<String, String>,
    location: Vec<String>,
    diagnostics: Vec<Diagnostic>,
    annotations: Vec<AnnotationDecl>,
}

impl<'c> ParseContext<'c> {
    pub(crate) fn new(config: &'c Config, aliases: BTreeMap<String, String>) -> Self {
        Self {
            config,
            capabilities: config.version.capabilities(),
            namespace: String::new(),
            aliases,
            location: Vec::new(),
            diagnostics: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    pub fn capabilities(&self) -> &'static Capabilities {
        self.capabilities
    }

    /// Namespace of the schema being read
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub(crate) fn enter_schema(&mut self, namespace: &str) {
        self.namespace = namespace.to_string();
        self.location = vec![namespace.to_string()];
    }

    /// Slash-separated path of the element being built
    pub fn location(&self) -> String {
        self.location.join("/")
    }

    /// Location of a nested element, e.g. `EPM/EntityType(Employee)`
    pub fn location_of(&self, segment: impl AsRef<str>) -> String {
        format!("{}/{}", self.namespace, segment.as_ref())
    }

    /// Parse a possibly aliased name, replacing the alias by its namespace
    pub fn qualify(&self, text: &str) -> QualifiedName {
        let mut name = QualifiedName::parse(text.trim());
        if let Some(namespace) = name.namespace.as_ref().and_then(|ns| self.aliases.get(ns)) {
            name.namespace = Some(namespace.clone());
        }
        name
    }

    pub fn type_info(&self, text: &str) -> TypeInfo {
        let mut info = TypeInfo::parse(text);
        info.name = self.qualify(&info.name.to_string());
        info
    }

    /// A name declared in the current schema
    pub fn name(&self, local: &str) -> QualifiedName {
        QualifiedName::new(self.namespace.clone(), local)
    }

    pub fn malformed(&self, kind: ElementKind, message: impl Into<String>) -> MetadataParsingError {
        MetadataParsingError::malformed(kind, self.location(), message)
    }

    /// Build `node` with the routine registered for `kind`.
    ///
    /// Faults are routed through the policy of their element kind: `Fatal`
    /// propagates, the others yield a stub for the element.
    pub fn build(
        &mut self,
        kind: ElementKind,
        node: Node<'_, '_>,
    ) -> Result<Resolvable<Declaration>, MetadataParsingError> {
        let name = element_name(node);
        self.location.push(format!("{kind}({name})"));
        let result = match self.capabilities.build_routine(kind) {
            Some(routine) => routine(self, node),
            None => Err(MetadataParsingError::not_implemented(
                kind,
                self.location(),
                self.capabilities.version,
            )),
        };
        let stub_name = self.name(&name);
        let built = match result {
            Ok(declaration) => Ok(Resolvable::Resolved(declaration)),
            Err(error) => self.fault(kind, stub_name, error).map(Resolvable::Unresolved),
        };
        self.location.pop();
        built
    }

    /// Apply the configured policy to a fault of the element `name`
    pub fn fault(
        &mut self,
        kind: ElementKind,
        name: QualifiedName,
        error: MetadataParsingError,
    ) -> Result<Stub, MetadataParsingError> {
        match self.config.policy_for(error.kind) {
            ErrorPolicy::Fatal => Err(error),
            ErrorPolicy::Warning => {
                log::warn!("{}", error);
                self.diagnostics.push(Diagnostic {
                    kind: error.kind,
                    location: error.location.clone(),
                    message: error.fault.to_string(),
                });
                Ok(Stub::new(kind, name, error.fault.to_string()))
            }
            ErrorPolicy::Ignore => Ok(Stub::new(kind, name, error.fault.to_string())),
        }
    }

    /// Like [`fault`](Self::fault) for faults that leave nothing to stub
    pub fn report(&mut self, error: MetadataParsingError) -> Result<(), MetadataParsingError> {
        let name = QualifiedName::local(error.location.clone());
        self.fault(error.kind, name, error).map(|_| ())
    }

    /// Error for a build routine that returned the wrong declaration
    pub(crate) fn unexpected(&self, kind: ElementKind, declaration: &Declaration) -> MetadataParsingError {
        self.malformed(
            kind,
            format!("expected {kind}, got {}", declaration.label()),
        )
    }

    pub(crate) fn defer_annotation(&mut self, annotation: AnnotationDecl) {
        self.annotations.push(annotation);
    }

    pub(crate) fn take_annotations(&mut self) -> Vec<AnnotationDecl> {
        std::mem::take(&mut self.annotations)
    }

    pub(crate) fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Name used for locations and stubs: `Name`, `Role`, `Term`, `Path` or `Target`
pub(crate) fn element_name(node: Node<'_, '_>) -> String {
    ["Name", "Role", "Term", "Path", "Target", "Property"]
        .iter()
        .find_map(|attribute| node.attribute(*attribute))
        .unwrap_or_else(|| node.tag_name().name())
        .to_string()
}

pub(crate) fn attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute(name)
}

pub(crate) fn required_attr<'a>(
    ctx: &ParseContext<'_>,
    kind: ElementKind,
    node: Node<'a, '_>,
    name: &str,
) -> Result<&'a str, MetadataParsingError> {
    node.attribute(name).ok_or_else(|| {
        ctx.malformed(
            kind,
            format!("{} is missing the attribute {}", node.tag_name().name(), name),
        )
    })
}

/// `sap:<name>` attribute
pub(crate) fn sap_attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute((SAP_NAMESPACE, name))
}

pub(crate) fn sap_bool(node: Node<'_, '_>, name: &str, default: bool) -> bool {
    sap_attr(node, name).map(parse_bool).unwrap_or(default)
}

/// `m:<name>` attribute
pub(crate) fn metadata_attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute((METADATA_NAMESPACE, name))
}

pub(crate) fn parse_bool(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("true")
}

pub(crate) fn children<'a, 'input>(
    node: Node<'a, 'input>,
    local_name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == local_name)
}

pub(crate) fn child<'a, 'input>(
    node: Node<'a, 'input>,
    local_name: &'static str,
) -> Option<Node<'a, 'input>> {
    children(node, local_name).next()
}

pub(crate) fn elements<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|child| child.is_element())
}
