//! Handlers for the vocabulary annotations the client understands

use roxmltree::Node;

use super::context::{attr, child, children, parse_bool, AnnotationDecl, ParseContext};
use crate::config::ElementKind;
use crate::error::MetadataParsingError;
use crate::model::{Unit, ValueHelper, ValueHelperDirection, ValueHelperParameter};

const COMMON_VOCABULARY: &str = "com.sap.vocabularies.Common.v1";

/// Value of a `PropertyValue` given either as attribute or as child element
fn property_value(node: Node<'_, '_>, expression: &'static str) -> Option<String> {
    attr(node, expression)
        .map(String::from)
        .or_else(|| child(node, expression).and_then(|c| c.text()).map(|t| t.trim().to_string()))
}

/// `com.sap.vocabularies.Common.v1.ValueList`
pub fn build_value_list(
    ctx: &mut ParseContext<'_>,
    target: &str,
    node: Node<'_, '_>,
) -> Result<AnnotationDecl, MetadataParsingError> {
    let kind = ElementKind::Annotation;
    let record = child(node, "Record")
        .ok_or_else(|| ctx.malformed(kind, format!("ValueList annotation of {target} has no Record")))?;

    let mut helper = ValueHelper {
        target: target.to_string(),
        label: None,
        collection_path: None,
        search_supported: false,
        parameters: Vec::new(),
    };
    for value in children(record, "PropertyValue") {
        match attr(value, "Property") {
            Some("Label") => helper.label = property_value(value, "String"),
            Some("CollectionPath") => helper.collection_path = property_value(value, "String"),
            Some("SearchSupported") => {
                helper.search_supported = property_value(value, "Bool")
                    .map(|text| parse_bool(&text))
                    .unwrap_or(false)
            }
            Some("Parameters") => {
                let Some(collection) = child(value, "Collection") else {
                    continue;
                };
                for parameter in children(collection, "Record") {
                    helper.parameters.push(value_list_parameter(ctx, parameter)?);
                }
            }
            Some(other) => log::debug!("Skipping ValueList property {other} of {target}"),
            None => {}
        }
    }
    Ok(AnnotationDecl::ValueList(helper))
}

fn value_list_parameter(
    ctx: &ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<ValueHelperParameter, MetadataParsingError> {
    let kind = ElementKind::Annotation;
    let record_type = attr(node, "Type").unwrap_or_default();
    let qualified = ctx.qualify(record_type);
    let direction = match qualified.namespace.as_deref() {
        Some(COMMON_VOCABULARY) => ValueHelperDirection::from_record_type(&qualified.name),
        _ => None,
    }
    .ok_or_else(|| {
            ctx.malformed(kind, format!("Unknown value helper parameter type {record_type}"))
        })?;

    let mut parameter = ValueHelperParameter {
        direction,
        local_property: None,
        list_property: None,
    };
    for value in children(node, "PropertyValue") {
        match attr(value, "Property") {
            Some("LocalDataProperty") => {
                parameter.local_property = property_value(value, "PropertyPath")
            }
            Some("ValueListProperty") => parameter.list_property = property_value(value, "String"),
            _ => {}
        }
    }
    Ok(parameter)
}

/// `Org.OData.Measures.V1.Unit`
pub fn build_unit(
    ctx: &mut ParseContext<'_>,
    target: &str,
    node: Node<'_, '_>,
) -> Result<AnnotationDecl, MetadataParsingError> {
    let unit = if let Some(path) = property_value(node, "Path") {
        Unit::Path(path)
    } else if let Some(symbol) = property_value(node, "String") {
        Unit::Symbol(symbol)
    } else {
        return Err(ctx.malformed(
            ElementKind::Annotation,
            format!("Unit annotation of {target} has no value"),
        ));
    };
    Ok(AnnotationDecl::Unit {
        target: target.to_string(),
        unit,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::Config;
    use crate::model::Resolvable;
    use crate::metadata::Declaration;
    use crate::version::ODataVersion;

    const VALUE_LIST: &str = r#"
<Annotations xmlns="http://docs.oasis-open.org/odata/ns/edm" Target="EPM.MasterEntity/Data">
    <Annotation Term="com.sap.vocabularies.Common.v1.ValueList">
        <Record>
            <PropertyValue Property="Label" String="Data"/>
            <PropertyValue Property="CollectionPath" String="ValueHelps"/>
            <PropertyValue Property="SearchSupported" Bool="true"/>
            <PropertyValue Property="Parameters">
                <Collection>
                    <Record Type="com.sap.vocabularies.Common.v1.ValueListParameterInOut">
                        <PropertyValue Property="LocalDataProperty" PropertyPath="Data"/>
                        <PropertyValue Property="ValueListProperty" String="Key"/>
                    </Record>
                    <Record Type="com.sap.vocabularies.Common.v1.ValueListParameterDisplayOnly">
                        <PropertyValue Property="ValueListProperty" String="Label"/>
                    </Record>
                </Collection>
            </PropertyValue>
        </Record>
    </Annotation>
</Annotations>"#;

    fn annotations(version: ODataVersion, xml: &str) -> Vec<AnnotationDecl> {
        let config = Config::new(version);
        let document = roxmltree::Document::parse(xml).unwrap();
        let mut ctx = ParseContext::new(&config, BTreeMap::new());
        ctx.enter_schema("EPM");
        match ctx.build(ElementKind::Annotations, document.root_element()).unwrap() {
            Resolvable::Resolved(Declaration::Annotations(list)) => list,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_value_list() {
        let list = annotations(ODataVersion::V2, VALUE_LIST);
        let AnnotationDecl::ValueList(helper) = &list[0] else {
            panic!("expected a value list");
        };
        assert_eq!(helper.target, "EPM.MasterEntity/Data");
        assert_eq!(helper.collection_path.as_deref(), Some("ValueHelps"));
        assert!(helper.search_supported);
        assert_eq!(helper.parameters.len(), 2);
        assert_eq!(helper.parameters[0].direction, ValueHelperDirection::InOut);
        assert_eq!(helper.parameters[0].local_property.as_deref(), Some("Data"));
        assert_eq!(helper.parameters[1].list_property.as_deref(), Some("Label"));
    }

    #[test]
    fn test_qualified_annotations_are_skipped() {
        let xml = VALUE_LIST.replace("Target=", "Qualifier=\"Alt\" Target=");
        assert!(annotations(ODataVersion::V2, &xml).is_empty());
    }

    #[test]
    fn test_unit_needs_v4() {
        let xml = r#"<Annotations xmlns="http://docs.oasis-open.org/odata/ns/edm" Target="EPM.Product/Weight">
            <Annotation Term="Org.OData.Measures.V1.Unit" String="kg"/>
        </Annotations>"#;
        assert_eq!(
            annotations(ODataVersion::V4, xml),
            vec![AnnotationDecl::Unit {
                target: "EPM.Product/Weight".to_string(),
                unit: Unit::Symbol("kg".to_string()),
            }]
        );
        assert!(annotations(ODataVersion::V2, xml).is_empty());
    }
}
