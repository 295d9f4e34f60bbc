//! Metadata document parser
//!
//! Parsing runs in two passes. Pass 1 walks every `Schema` once and builds
//! each declared element through the build routine the version's
//! [`Capabilities`](crate::version::Capabilities) register for its kind,
//! without following references. Pass 2 ([`resolve`]) resolves type
//! references, associations, base types, keys, bindings and annotations.
//!
//! Faults in either pass go through [`ParseContext::fault`], which applies the
//! error policy configured for the element kind.

pub(crate) mod annotations;
pub(crate) mod build;
pub(crate) mod build_v2;
pub(crate) mod build_v4;
mod context;
mod resolve;

use std::collections::BTreeMap;

use roxmltree::{Document, Node};

pub use context::{AnnotationDecl, Declaration, ParseContext};

use crate::config::{Config, ElementKind};
use crate::error::MetadataParsingError;
use crate::model::{Operation, QualifiedName, Resolvable, Schema, Stub};
use crate::model::schema::Elements;
use context::{attr, child, children, elements};

/// Parse a metadata document into a resolved [`Schema`].
///
/// Fails only for document-level problems or when an element fault meets a
/// `Fatal` policy; everything else ends up as a stub plus, under `Warning`,
/// a diagnostic on the schema.
pub fn parse(document: &[u8], config: &Config) -> Result<Schema, MetadataParsingError> {
    let text = std::str::from_utf8(document).map_err(|e| {
        MetadataParsingError::document(format!("Metadata document is not valid UTF-8: {e}"))
    })?;
    let xml = Document::parse(text.trim_start_matches('\u{feff}')).map_err(|e| {
        MetadataParsingError::document(format!("Metadata document is not well-formed XML: {e}"))
    })?;

    let edmx = xml.root_element();
    if edmx.tag_name().name() != "Edmx" {
        return Err(MetadataParsingError::document(
            "Metadata document is missing the element Edmx",
        ));
    }
    let edmx_namespace = edmx.tag_name().namespace().unwrap_or_default();
    if !config.edmx_namespaces().contains(&edmx_namespace) {
        return Err(MetadataParsingError::document(format!(
            "Unsupported Edmx namespace - {edmx_namespace}"
        )));
    }

    let schema_nodes: Vec<Node<'_, '_>> = child(edmx, "DataServices")
        .map(|data_services| children(data_services, "Schema").collect())
        .unwrap_or_default();
    if schema_nodes.is_empty() {
        return Err(MetadataParsingError::document(
            "Metadata document is missing the element DataServices/Schema",
        ));
    }
    let edm_namespaces = config.edm_namespaces();
    for node in &schema_nodes {
        let namespace = node.tag_name().namespace().unwrap_or_default();
        if !edm_namespaces.contains(&namespace) {
            return Err(MetadataParsingError::document(format!(
                "Unsupported Schema namespace - {namespace}"
            )));
        }
    }

    let aliases = collect_aliases(edmx, &schema_nodes);
    let mut schema = Schema {
        version: config.version,
        aliases: aliases.clone(),
        ..Schema::default()
    };
    let mut ctx = ParseContext::new(config, aliases);

    for node in schema_nodes {
        let namespace = attr(node, "Namespace").ok_or_else(|| {
            MetadataParsingError::document("Schema is missing the attribute Namespace")
        })?;
        log::debug!("Reading schema {namespace}");
        ctx.enter_schema(namespace);
        schema.namespaces.push(namespace.to_string());
        declare_schema(&mut ctx, &mut schema, node)?;
    }

    resolve::resolve(&mut ctx, &mut schema)?;
    schema.diagnostics = ctx.into_diagnostics();
    log::info!(
        "Parsed OData {} metadata: {} entity types, {} entity sets, {} function imports",
        schema.version,
        schema.entity_types.len(),
        schema.entity_sets.len(),
        schema.function_imports.len()
    );
    Ok(schema)
}

/// Aliases declared by `edmx:Reference/edmx:Include` and `Schema@Alias`
fn collect_aliases(edmx: Node<'_, '_>, schema_nodes: &[Node<'_, '_>]) -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();
    for reference in children(edmx, "Reference") {
        for include in children(reference, "Include") {
            if let (Some(namespace), Some(alias)) = (attr(include, "Namespace"), attr(include, "Alias")) {
                aliases.insert(alias.to_string(), namespace.to_string());
            }
        }
    }
    for node in schema_nodes {
        if let (Some(namespace), Some(alias)) = (attr(*node, "Namespace"), attr(*node, "Alias")) {
            aliases.insert(alias.to_string(), namespace.to_string());
        }
    }
    aliases
}

/// Pass 1 over one `Schema`, entity container contents included
fn declare_schema(
    ctx: &mut ParseContext<'_>,
    schema: &mut Schema,
    node: Node<'_, '_>,
) -> Result<(), MetadataParsingError> {
    for element in elements(node) {
        if element.tag_name().name() == "EntityContainer" {
            for item in elements(element) {
                declare(ctx, schema, item)?;
            }
        } else {
            declare(ctx, schema, element)?;
        }
    }
    Ok(())
}

fn declare(
    ctx: &mut ParseContext<'_>,
    schema: &mut Schema,
    node: Node<'_, '_>,
) -> Result<(), MetadataParsingError> {
    let tag = node.tag_name().name();
    let kind = match ElementKind::from_tag(tag) {
        Some(
            kind @ (ElementKind::Schema
            | ElementKind::Property
            | ElementKind::NavigationProperty
            | ElementKind::NavigationPropertyBinding
            | ElementKind::ReferentialConstraint),
        ) => {
            log::debug!("Skipping {kind} outside of its parent element");
            return Ok(());
        }
        Some(kind) => kind,
        None => {
            log::debug!("Skipping unsupported element {tag}");
            return Ok(());
        }
    };

    match ctx.build(kind, node)? {
        Resolvable::Resolved(declaration) => insert_declaration(ctx, schema, kind, declaration),
        Resolvable::Unresolved(stub) => {
            insert_stub(schema, stub);
            Ok(())
        }
    }
}

fn insert_declaration(
    ctx: &mut ParseContext<'_>,
    schema: &mut Schema,
    kind: ElementKind,
    declaration: Declaration,
) -> Result<(), MetadataParsingError> {
    match declaration {
        Declaration::EntityType(t) => insert(ctx, kind, &mut schema.entity_types, t.name.clone(), t),
        Declaration::ComplexType(t) => {
            insert(ctx, kind, &mut schema.complex_types, t.name.clone(), t)
        }
        Declaration::EnumType(t) => insert(ctx, kind, &mut schema.enum_types, t.name.clone(), t),
        Declaration::TypeDefinition(t) => {
            insert(ctx, kind, &mut schema.type_definitions, t.name.clone(), t)
        }
        Declaration::Association(a) => {
            insert(ctx, kind, &mut schema.associations, a.name.clone(), a)
        }
        Declaration::AssociationSet(a) => {
            insert(ctx, kind, &mut schema.association_sets, a.name.clone(), a)
        }
        Declaration::EntitySet(s) => insert(ctx, kind, &mut schema.entity_sets, s.name.clone(), s),
        Declaration::FunctionImport(f) => {
            insert(ctx, kind, &mut schema.function_imports, f.name.clone(), f)
        }
        Declaration::Operation(operation) => {
            insert_operation(&mut schema.operations, operation);
            Ok(())
        }
        Declaration::Term(t) => insert(ctx, kind, &mut schema.terms, t.name.clone(), t),
        Declaration::Annotations(annotations) => {
            for annotation in annotations {
                ctx.defer_annotation(annotation);
            }
            Ok(())
        }
        Declaration::Annotation(Some(annotation)) => {
            ctx.defer_annotation(annotation);
            Ok(())
        }
        Declaration::Annotation(None) => Ok(()),
        other => Err(ctx.unexpected(kind, &other)),
    }
}

/// Add a declaration; a second declaration of the same name is a fault of its kind
fn insert<T>(
    ctx: &mut ParseContext<'_>,
    kind: ElementKind,
    elements: &mut Elements<T>,
    name: QualifiedName,
    element: T,
) -> Result<(), MetadataParsingError> {
    if elements.contains_key(&name) {
        let error = MetadataParsingError::malformed(
            kind,
            ctx.location_of(format!("{kind}({})", name.name)),
            format!("{kind} {name} is declared more than once"),
        );
        ctx.fault(kind, name, error)?;
        return Ok(());
    }
    elements.insert(name, Resolvable::Resolved(element));
    Ok(())
}

/// Overloads share a name; the unbound overload is the one imports expose
fn insert_operation(operations: &mut Elements<Operation>, operation: Operation) {
    let replace = match operations.get(&operation.name) {
        Some(Resolvable::Resolved(existing)) => existing.is_bound && !operation.is_bound,
        Some(Resolvable::Unresolved(_)) | None => true,
    };
    if replace {
        operations.insert(operation.name.clone(), Resolvable::Resolved(operation));
    }
}

/// Keep a stub where a top-level element failed to build
fn insert_stub(schema: &mut Schema, stub: Stub) {
    let name = stub.name.clone();
    match stub.kind {
        ElementKind::EntityType => {
            schema.entity_types.entry(name).or_insert(Resolvable::Unresolved(stub));
        }
        ElementKind::ComplexType => {
            schema.complex_types.entry(name).or_insert(Resolvable::Unresolved(stub));
        }
        ElementKind::EnumType => {
            schema.enum_types.entry(name).or_insert(Resolvable::Unresolved(stub));
        }
        ElementKind::TypeDefinition => {
            schema.type_definitions.entry(name).or_insert(Resolvable::Unresolved(stub));
        }
        ElementKind::Association => {
            schema.associations.entry(name).or_insert(Resolvable::Unresolved(stub));
        }
        ElementKind::AssociationSet => {
            schema.association_sets.entry(name).or_insert(Resolvable::Unresolved(stub));
        }
        ElementKind::EntitySet | ElementKind::Singleton => {
            schema.entity_sets.entry(name).or_insert(Resolvable::Unresolved(stub));
        }
        ElementKind::FunctionImport | ElementKind::ActionImport => {
            schema.function_imports.entry(name).or_insert(Resolvable::Unresolved(stub));
        }
        ElementKind::Function | ElementKind::Action => {
            schema.operations.entry(name).or_insert(Resolvable::Unresolved(stub));
        }
        ElementKind::Term => {
            schema.terms.entry(name).or_insert(Resolvable::Unresolved(stub));
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::ErrorPolicy;
    use crate::model::{Multiplicity, PropertyType};
    use crate::types::EdmType;
    use crate::version::ODataVersion;

    const NORTHWIND: &str = include_str!("../../tests/fixtures/northwind_v2.xml");
    const CARS: &str = include_str!("../../tests/fixtures/cars_v4.xml");
    const BROKEN: &str = include_str!("../../tests/fixtures/broken_association_v2.xml");

    #[test]
    fn test_parse_v2_document() {
        let schema = parse(NORTHWIND.as_bytes(), &Config::new(ODataVersion::V2)).unwrap();
        assert_eq!(schema.namespaces(), ["NorthwindModel", "ODataWeb.Northwind.Model"]);

        let order_details = schema.entity_type("Order_Detail").unwrap();
        assert_eq!(order_details.key, ["OrderID", "ProductID"]);
        let order = order_details.navigation_property("Order").unwrap();
        assert_eq!(order.target().unwrap().multiplicity, Multiplicity::One);

        let orders = schema.entity_set("Orders").unwrap();
        assert_eq!(
            orders.binding("Order_Details").map(|b| b.target.name.as_str()),
            Some("Order_Details")
        );

        let freight = schema.entity_type("Order").unwrap().property("Freight").unwrap();
        assert_eq!(freight.typ().unwrap(), &PropertyType::Primitive(EdmType::Decimal));
        assert_eq!(freight.facets.scale, Some(4));
        assert!(schema.diagnostics().is_empty());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let config = Config::new(ODataVersion::V4);
        let first = parse(CARS.as_bytes(), &config).unwrap();
        let second = parse(CARS.as_bytes(), &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_forward_references_resolve() {
        let schema = parse(CARS.as_bytes(), &Config::new(ODataVersion::V4)).unwrap();
        let car = schema.entity_type("Car").unwrap();
        let manufacturer = car.navigation_property("Manufacturer").unwrap();
        assert_eq!(
            manufacturer.target().unwrap().entity_type,
            QualifiedName::new("Cars", "Manufacturer")
        );
        let sports_car = schema.entity_type("SportsCar").unwrap();
        assert!(sports_car.find_property("Model").is_some());
        assert_eq!(sports_car.key, ["ID"]);
    }

    #[test]
    fn test_broken_association_is_isolated() {
        let config = Config::builder()
            .version(ODataVersion::V2)
            .default_error_policy(ErrorPolicy::Warning)
            .build();
        let schema = parse(BROKEN.as_bytes(), &config).unwrap();

        assert!(schema.association("Assoc_Customer_Orders").is_err());
        let customer = schema.entity_type("Customer").unwrap();
        let orders = customer.navigation_property("Orders").unwrap();
        let fault = orders.target().unwrap_err();
        assert!(fault.to_string().contains("Assoc_Customer_Orders"));

        assert!(schema.entity_type("Order").unwrap().property("Total").is_ok());
        assert!(schema.entity_set("Customers").is_ok());
        assert_eq!(schema.diagnostics().len(), 1);
        assert_eq!(schema.diagnostics()[0].kind, ElementKind::Association);
    }

    #[test]
    fn test_broken_association_is_fatal_by_default() {
        let error = parse(BROKEN.as_bytes(), &Config::new(ODataVersion::V2)).unwrap_err();
        assert_eq!(error.kind, ElementKind::Association);
        assert_eq!(
            error.location,
            "Sales/Association(Assoc_Customer_Orders)"
        );
    }

    #[test]
    fn test_envelope_errors() {
        let config = Config::new(ODataVersion::V2);
        let error = parse(CARS.as_bytes(), &config).unwrap_err();
        assert_eq!(
            error.fault.to_string(),
            "Unsupported Edmx namespace - http://docs.oasis-open.org/odata/ns/edmx"
        );

        let empty = r#"<edmx:Edmx xmlns:edmx="http://schemas.microsoft.com/ado/2007/06/edmx" Version="1.0">
            <edmx:DataServices/></edmx:Edmx>"#;
        let error = parse(empty.as_bytes(), &config).unwrap_err();
        assert_eq!(
            error.fault.to_string(),
            "Metadata document is missing the element DataServices/Schema"
        );

        let other = NORTHWIND.replace(
            "http://schemas.microsoft.com/ado/2008/09/edm",
            "http://example.com/edm",
        );
        let error = parse(other.as_bytes(), &config).unwrap_err();
        assert_eq!(
            error.fault.to_string(),
            "Unsupported Schema namespace - http://example.com/edm"
        );
    }

    #[test]
    fn test_custom_schema_namespace() {
        let other = NORTHWIND.replace(
            "http://schemas.microsoft.com/ado/2008/09/edm",
            "http://example.com/edm",
        );
        let config = Config::builder()
            .version(ODataVersion::V2)
            .xml_namespace("edm", "http://example.com/edm")
            .build();
        assert!(parse(other.as_bytes(), &config).is_ok());
    }

    #[test]
    fn test_v4_elements_under_v2_are_not_implemented() {
        let config = Config::builder()
            .version(ODataVersion::V3)
            .error_policy(ElementKind::Singleton, ErrorPolicy::Warning)
            .build();
        let document = NORTHWIND.replace(
            "<EntitySet Name=\"Regions\"",
            "<Singleton Name=\"Headquarters\" Type=\"NorthwindModel.Region\"/><EntitySet Name=\"Regions\"",
        );
        let schema = parse(document.as_bytes(), &config).unwrap();
        assert!(schema.entity_set("Headquarters").is_err());
        assert!(
            schema.diagnostics()[0]
                .message
                .contains("not implemented in OData V3")
        );
    }
}
