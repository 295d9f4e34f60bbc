//! Build routines shared by every protocol version

use roxmltree::Node;

use super::context::{
    attr, child, children, parse_bool, required_attr, sap_attr, sap_bool, AnnotationDecl,
    Declaration, ParseContext,
};
use crate::config::ElementKind;
use crate::error::MetadataParsingError;
use crate::model::{
    EntitySet, EnumMember, EnumType, NavigationProperty, NavigationSource, Property,
    QualifiedName, Resolvable, SapEntitySetAttributes, SapPropertyAttributes, StructKind,
    StructType, Stub, TypeInfo,
};
use crate::types::{EdmType, Facets, MaxLength};
use crate::version::AnnotationKind;

const PENDING: &str = "not resolved";

/// Placeholder type of a declared but not yet resolved reference
pub(crate) fn pending<T>(kind: ElementKind, name: QualifiedName) -> Resolvable<T> {
    Resolvable::Unresolved(Stub::new(kind, name, PENDING))
}

/// Whether `element` still waits for pass 2, as opposed to a failed build
pub(crate) fn is_pending<T>(element: &Resolvable<T>) -> bool {
    element.stub().is_some_and(|stub| stub.reason == PENDING)
}

/// Read the facet attributes of a property, parameter or type definition
pub(crate) fn parse_facets(
    ctx: &ParseContext<'_>,
    kind: ElementKind,
    node: Node<'_, '_>,
) -> Result<Facets, MetadataParsingError> {
    let mut facets = Facets::default();
    if let Some(nullable) = attr(node, "Nullable") {
        facets.nullable = !nullable.trim().eq_ignore_ascii_case("false");
    }
    if let Some(text) = attr(node, "MaxLength") {
        facets.max_length = Some(
            MaxLength::parse(text.trim())
                .ok_or_else(|| ctx.malformed(kind, format!("Invalid MaxLength value {text}")))?,
        );
    }
    if let Some(text) = attr(node, "Precision") {
        facets.precision = Some(
            text.trim()
                .parse()
                .map_err(|_| ctx.malformed(kind, format!("Invalid Precision value {text}")))?,
        );
    }
    if let Some(text) = attr(node, "Scale") {
        let text = text.trim();
        if !text.eq_ignore_ascii_case("variable") && !text.eq_ignore_ascii_case("floating") {
            facets.scale = Some(
                text.parse()
                    .map_err(|_| ctx.malformed(kind, format!("Invalid Scale value {text}")))?,
            );
        }
    }
    if let Some(precision) = facets.precision {
        let scale = facets.scale.unwrap_or(0);
        if scale > precision {
            return Err(ctx.malformed(
                kind,
                format!(
                    "Scale value ({scale}) must be less than or equal to precision value ({precision})"
                ),
            ));
        }
    }
    if let Some(unicode) = attr(node, "Unicode").or_else(|| sap_attr(node, "unicode")) {
        facets.unicode = parse_bool(unicode);
    }
    facets.fixed_length = attr(node, "FixedLength").map(parse_bool).unwrap_or(false);
    Ok(facets)
}

pub fn build_entity_type(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    build_struct(ctx, node, StructKind::Entity).map(Declaration::EntityType)
}

pub fn build_complex_type(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    build_struct(ctx, node, StructKind::Complex).map(Declaration::ComplexType)
}

fn build_struct(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
    struct_kind: StructKind,
) -> Result<StructType, MetadataParsingError> {
    let kind = match struct_kind {
        StructKind::Entity => ElementKind::EntityType,
        StructKind::Complex => ElementKind::ComplexType,
    };
    let name = required_attr(ctx, kind, node, "Name")?;
    let mut stype = StructType::new(ctx.name(name), struct_kind);
    stype.base_type = attr(node, "BaseType").map(|base| ctx.qualify(base));
    stype.is_abstract = attr(node, "Abstract").map(parse_bool).unwrap_or(false);
    stype.label = sap_attr(node, "label").map(String::from);
    stype.is_value_list = sap_bool(node, "value-list", false);

    for property_node in children(node, "Property") {
        let property = match ctx.build(ElementKind::Property, property_node)? {
            Resolvable::Resolved(Declaration::Property(property)) => property,
            Resolvable::Resolved(other) => {
                return Err(ctx.unexpected(ElementKind::Property, &other));
            }
            Resolvable::Unresolved(stub) => stub_property(ctx, property_node, stub),
        };
        if stype.find_property(&property.name).is_some() {
            return Err(ctx.malformed(
                kind,
                format!("Property {} is declared twice in {}", property.name, stype.name),
            ));
        }
        stype.properties.push(property);
    }

    if struct_kind == StructKind::Entity {
        if let Some(key) = child(node, "Key") {
            for property_ref in children(key, "PropertyRef") {
                let key_name = required_attr(ctx, kind, property_ref, "Name")?;
                stype.key.push(key_name.to_string());
            }
        }
    }

    for nav_node in children(node, "NavigationProperty") {
        let navigation = match ctx.build(ElementKind::NavigationProperty, nav_node)? {
            Resolvable::Resolved(Declaration::NavigationProperty(navigation)) => navigation,
            Resolvable::Resolved(other) => {
                return Err(ctx.unexpected(ElementKind::NavigationProperty, &other));
            }
            Resolvable::Unresolved(stub) => stub_navigation(ctx, nav_node, stub),
        };
        if stype.find_navigation_property(&navigation.name).is_some() {
            return Err(ctx.malformed(
                kind,
                format!(
                    "Navigation property {} is declared twice in {}",
                    navigation.name, stype.name
                ),
            ));
        }
        stype.navigation_properties.push(navigation);
    }

    Ok(stype)
}

/// Property kept in its type after its own build failed; reading its type faults
fn stub_property(ctx: &ParseContext<'_>, node: Node<'_, '_>, stub: Stub) -> Property {
    Property {
        name: attr(node, "Name").unwrap_or(&stub.name.name).to_string(),
        type_info: ctx.type_info(attr(node, "Type").unwrap_or_default()),
        typ: Resolvable::Unresolved(stub),
        facets: Facets::default(),
        sap: SapPropertyAttributes::default(),
        value_helper: None,
        unit: None,
    }
}

fn stub_navigation(ctx: &ParseContext<'_>, node: Node<'_, '_>, stub: Stub) -> NavigationProperty {
    let source = match attr(node, "Relationship") {
        Some(relationship) => NavigationSource::Association {
            relationship: ctx.qualify(relationship),
            from_role: attr(node, "FromRole").unwrap_or_default().to_string(),
            to_role: attr(node, "ToRole").unwrap_or_default().to_string(),
        },
        None => NavigationSource::Typed {
            type_info: ctx.type_info(attr(node, "Type").unwrap_or_default()),
            nullable: true,
            partner: None,
            contains_target: false,
            referential_constraints: Vec::new(),
        },
    };
    NavigationProperty {
        name: attr(node, "Name").unwrap_or(&stub.name.name).to_string(),
        source,
        target: Resolvable::Unresolved(stub),
    }
}

pub fn build_property(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    let kind = ElementKind::Property;
    let name = required_attr(ctx, kind, node, "Name")?;
    let type_info: TypeInfo = ctx.type_info(required_attr(ctx, kind, node, "Type")?);
    let facets = parse_facets(ctx, kind, node)?;

    let defaults = SapPropertyAttributes::default();
    let sap = SapPropertyAttributes {
        label: sap_attr(node, "label").map(String::from),
        creatable: sap_bool(node, "creatable", defaults.creatable),
        updatable: sap_bool(node, "updatable", defaults.updatable),
        sortable: sap_bool(node, "sortable", defaults.sortable),
        filterable: sap_bool(node, "filterable", defaults.filterable),
        filter_restriction: sap_attr(node, "filter-restriction").map(String::from),
        required_in_filter: sap_bool(node, "required-in-filter", defaults.required_in_filter),
        text: sap_attr(node, "text").map(String::from),
        visible: sap_bool(node, "visible", defaults.visible),
        display_format: sap_attr(node, "display-format").map(String::from),
        value_list: sap_attr(node, "value-list").map(String::from),
    };

    for annotation in children(node, "Annotation") {
        collect_annotation(ctx, annotation)?;
    }

    Ok(Declaration::Property(Property {
        name: name.to_string(),
        typ: pending(kind, type_info.name.clone()),
        type_info,
        facets,
        sap,
        value_helper: None,
        unit: None,
    }))
}

/// Build an inline annotation and queue it for attachment
fn collect_annotation(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<(), MetadataParsingError> {
    match ctx.build(ElementKind::Annotation, node)? {
        Resolvable::Resolved(Declaration::Annotation(Some(annotation))) => {
            ctx.defer_annotation(annotation);
        }
        Resolvable::Resolved(Declaration::Annotation(None)) | Resolvable::Unresolved(_) => {}
        Resolvable::Resolved(other) => {
            return Err(ctx.unexpected(ElementKind::Annotation, &other));
        }
    }
    Ok(())
}

pub fn build_enum_type(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    let kind = ElementKind::EnumType;
    let name = required_attr(ctx, kind, node, "Name")?;
    let underlying_name = attr(node, "UnderlyingType").unwrap_or("Edm.Int32");
    let underlying = EdmType::from_name(underlying_name)
        .filter(|edm| edm.is_integer())
        .ok_or_else(|| {
            ctx.malformed(
                kind,
                format!(
                    "Type {underlying_name} is not valid as underlying type for EnumType - must be one of Edm.Byte, Edm.SByte, Edm.Int16, Edm.Int32, Edm.Int64"
                ),
            )
        })?;
    let (min, max) = underlying.integer_range().unwrap_or((i64::MIN, i64::MAX));

    let mut members: Vec<EnumMember> = Vec::new();
    let mut next = 0i64;
    for member in children(node, "Member") {
        let member_name = required_attr(ctx, kind, member, "Name")?;
        let value = match attr(member, "Value") {
            Some(text) => text.trim().parse::<i64>().map_err(|_| {
                ctx.malformed(kind, format!("Invalid value {text} of member {member_name}"))
            })?,
            None => next,
        };
        if value < min || value > max {
            return Err(ctx.malformed(
                kind,
                format!("Value of {member_name} ({value}) is out of range for {underlying}"),
            ));
        }
        if members.iter().any(|m| m.name == member_name) {
            return Err(ctx.malformed(kind, format!("Member {member_name} is declared twice")));
        }
        members.push(EnumMember {
            name: member_name.to_string(),
            value,
        });
        next = value.saturating_add(1);
    }

    Ok(Declaration::EnumType(EnumType {
        name: ctx.name(name),
        underlying,
        is_flags: attr(node, "IsFlags").map(parse_bool).unwrap_or(false),
        members,
    }))
}

pub fn build_entity_set(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    let kind = ElementKind::EntitySet;
    let name = required_attr(ctx, kind, node, "Name")?;
    let entity_type = ctx.qualify(required_attr(ctx, kind, node, "EntityType")?);

    let mut bindings = Vec::new();
    for binding in children(node, "NavigationPropertyBinding") {
        match ctx.build(ElementKind::NavigationPropertyBinding, binding)? {
            Resolvable::Resolved(Declaration::NavigationPropertyBinding(binding)) => {
                bindings.push(binding)
            }
            Resolvable::Resolved(other) => {
                return Err(ctx.unexpected(ElementKind::NavigationPropertyBinding, &other));
            }
            Resolvable::Unresolved(_) => {}
        }
    }

    let defaults = SapEntitySetAttributes::default();
    let sap = SapEntitySetAttributes {
        label: sap_attr(node, "label").map(String::from),
        addressable: sap_bool(node, "addressable", defaults.addressable),
        creatable: sap_bool(node, "creatable", defaults.creatable),
        updatable: sap_bool(node, "updatable", defaults.updatable),
        deletable: sap_bool(node, "deletable", defaults.deletable),
        searchable: sap_bool(node, "searchable", defaults.searchable),
        countable: sap_bool(node, "countable", defaults.countable),
        pageable: sap_bool(node, "pageable", defaults.pageable),
        topable: sap_bool(node, "topable", defaults.topable),
        requires_filter: sap_bool(node, "requires-filter", defaults.requires_filter),
    };

    Ok(Declaration::EntitySet(EntitySet {
        name: ctx.name(name),
        entity_type,
        is_singleton: false,
        bindings,
        sap,
    }))
}

pub fn build_annotations(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    let target = required_attr(ctx, ElementKind::Annotations, node, "Target")?;
    if let Some(qualifier) = attr(node, "Qualifier") {
        log::warn!("Ignoring Annotations of {target} with qualifier {qualifier}");
        return Ok(Declaration::Annotations(Vec::new()));
    }

    let mut annotations: Vec<AnnotationDecl> = Vec::new();
    for annotation in children(node, "Annotation") {
        match ctx.build(ElementKind::Annotation, annotation)? {
            Resolvable::Resolved(Declaration::Annotation(Some(built))) => annotations.push(built),
            Resolvable::Resolved(Declaration::Annotation(None)) | Resolvable::Unresolved(_) => {}
            Resolvable::Resolved(other) => {
                return Err(ctx.unexpected(ElementKind::Annotation, &other));
            }
        }
    }
    Ok(Declaration::Annotations(annotations))
}

pub fn build_annotation(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    let kind = ElementKind::Annotation;
    let term = ctx.qualify(required_attr(ctx, kind, node, "Term")?);
    if let Some(qualifier) = attr(node, "Qualifier") {
        log::warn!("Ignoring Annotation({term}) with qualifier {qualifier}");
        return Ok(Declaration::Annotation(None));
    }

    let handler = AnnotationKind::from_term(&term)
        .and_then(|annotation_kind| ctx.capabilities().annotation_handler(annotation_kind));
    let Some(handler) = handler else {
        log::warn!("Unsupported Annotation({term})");
        return Ok(Declaration::Annotation(None));
    };

    let target = annotation_target(ctx, node)
        .ok_or_else(|| ctx.malformed(kind, format!("Annotation({term}) has no target")))?;
    handler(ctx, &target, node).map(|annotation| Declaration::Annotation(Some(annotation)))
}

/// Target path of an annotation: the enclosing `Annotations@Target`, or the
/// element it is written inside of
fn annotation_target(ctx: &ParseContext<'_>, node: Node<'_, '_>) -> Option<String> {
    let parent = node.parent_element()?;
    match parent.tag_name().name() {
        "Annotations" => attr(parent, "Target").map(|target| match target.split_once('/') {
            Some((owner, path)) => format!("{}/{}", ctx.qualify(owner), path),
            None => ctx.qualify(target).to_string(),
        }),
        "Property" | "NavigationProperty" => {
            let owner = parent.parent_element()?;
            Some(format!(
                "{}/{}",
                ctx.name(attr(owner, "Name")?),
                attr(parent, "Name")?
            ))
        }
        _ => attr(parent, "Name").map(|name| ctx.name(name).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::{Config, ErrorPolicy};
    use crate::version::ODataVersion;

    fn built(
        version: ODataVersion,
        kind: ElementKind,
        xml: &str,
    ) -> Result<Resolvable<Declaration>, MetadataParsingError> {
        let config = Config::new(version);
        let document = roxmltree::Document::parse(xml).unwrap();
        let mut ctx = ParseContext::new(&config, BTreeMap::new());
        ctx.enter_schema("EPM");
        ctx.build(kind, document.root_element())
    }

    #[test]
    fn test_scale_must_not_exceed_precision() {
        let error = built(
            ODataVersion::V2,
            ElementKind::Property,
            r#"<Property Name="Price" Type="Edm.Decimal" Precision="3" Scale="5"/>"#,
        )
        .unwrap_err();
        assert_eq!(error.kind, ElementKind::Property);
        assert_eq!(error.location, "EPM/Property(Price)");
        assert_eq!(
            error.fault.to_string(),
            "Scale value (5) must be less than or equal to precision value (3)"
        );
    }

    #[test]
    fn test_variable_scale_is_unset() {
        let declaration = built(
            ODataVersion::V4,
            ElementKind::Property,
            r#"<Property Name="Price" Type="Edm.Decimal" Precision="16" Scale="variable" Nullable="false"/>"#,
        )
        .unwrap();
        let Resolvable::Resolved(Declaration::Property(property)) = declaration else {
            panic!("expected a property");
        };
        assert_eq!(property.facets.precision, Some(16));
        assert_eq!(property.facets.scale, None);
        assert!(!property.facets.nullable);
    }

    #[test]
    fn test_sap_property_attributes() {
        let xml = r#"<Property xmlns:sap="http://www.sap.com/Protocols/SAPData"
            Name="Name" Type="Edm.String" MaxLength="40"
            sap:label="Name" sap:creatable="false" sap:required-in-filter="true"/>"#;
        let Resolvable::Resolved(Declaration::Property(property)) =
            built(ODataVersion::V2, ElementKind::Property, xml).unwrap()
        else {
            panic!("expected a property");
        };
        assert_eq!(property.sap.label.as_deref(), Some("Name"));
        assert!(!property.sap.creatable);
        assert!(property.sap.updatable);
        assert!(property.sap.required_in_filter);
        assert_eq!(property.facets.max_length, Some(MaxLength::Limit(40)));
    }

    #[test]
    fn test_enum_member_values_auto_increment() {
        let xml = r#"<EnumType Name="Level" UnderlyingType="Edm.Byte">
            <Member Name="Low"/><Member Name="High" Value="10"/><Member Name="Top"/>
        </EnumType>"#;
        let Resolvable::Resolved(Declaration::EnumType(level)) =
            built(ODataVersion::V4, ElementKind::EnumType, xml).unwrap()
        else {
            panic!("expected an enum type");
        };
        let values: Vec<i64> = level.members.iter().map(|m| m.value).collect();
        assert_eq!(values, [0, 10, 11]);
    }

    #[test]
    fn test_enum_member_out_of_range() {
        let xml = r#"<EnumType Name="Level" UnderlyingType="Edm.Byte"><Member Name="Big" Value="300"/></EnumType>"#;
        assert!(built(ODataVersion::V4, ElementKind::EnumType, xml).is_err());
        let xml = r#"<EnumType Name="Level" UnderlyingType="Edm.String"/>"#;
        assert!(built(ODataVersion::V4, ElementKind::EnumType, xml).is_err());
    }

    #[test]
    fn test_malformed_property_stubs_inside_entity_type() {
        let config = Config::builder()
            .version(ODataVersion::V2)
            .error_policy(ElementKind::Property, ErrorPolicy::Warning)
            .build();
        let document = roxmltree::Document::parse(
            r#"<EntityType Name="Employee">
                <Key><PropertyRef Name="ID"/></Key>
                <Property Name="ID" Type="Edm.Int32" Nullable="false"/>
                <Property Name="Salary" Type="Edm.Decimal" Precision="2" Scale="4"/>
            </EntityType>"#,
        )
        .unwrap();
        let mut ctx = ParseContext::new(&config, BTreeMap::new());
        ctx.enter_schema("EPM");
        let Resolvable::Resolved(Declaration::EntityType(employee)) =
            ctx.build(ElementKind::EntityType, document.root_element()).unwrap()
        else {
            panic!("expected an entity type");
        };
        assert_eq!(employee.properties.len(), 2);
        assert!(employee.find_property("Salary").unwrap().typ().is_err());
        let diagnostics = ctx.into_diagnostics();
        assert_eq!(diagnostics[0].location, "EPM/EntityType(Employee)/Property(Salary)");
    }

    #[test]
    fn test_unknown_annotation_term_is_skipped() {
        let xml = r#"<Annotation Term="Org.OData.Core.V1.Description" String="x"/>"#;
        let declaration = built(ODataVersion::V4, ElementKind::Annotation, xml).unwrap();
        assert!(matches!(
            declaration,
            Resolvable::Resolved(Declaration::Annotation(None))
        ));
    }
}
