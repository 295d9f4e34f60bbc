//! OData V4 capability table

use std::collections::HashMap;

use super::{
    AnnotationFn, AnnotationKind, BuildFn, Capabilities, Conventions, ODataVersion,
    ParameterStyle, PayloadStyle,
};
use crate::config::ElementKind;
use crate::metadata::{annotations, build, build_v4};
use crate::types::traits::{
    BinaryTraits, BooleanTraits, DateTimeOffsetTraits, DateTraits, DecimalTraits, DurationTraits,
    FloatTraits, GuidTraits, IntegerTraits, OpaqueTraits, StringTraits, TimeOfDayTraits,
};
use crate::types::{EdmType, Typ};

const EDMX_NAMESPACES: &[&str] = &["http://docs.oasis-open.org/odata/ns/edmx"];

const EDM_NAMESPACES: &[&str] = &["http://docs.oasis-open.org/odata/ns/edm"];

const GEOGRAPHY: [EdmType; 8] = [
    EdmType::Geography,
    EdmType::GeographyPoint,
    EdmType::GeographyLineString,
    EdmType::GeographyPolygon,
    EdmType::GeographyMultiPoint,
    EdmType::GeographyMultiLineString,
    EdmType::GeographyMultiPolygon,
    EdmType::GeographyCollection,
];

fn integer(edm: EdmType) -> Typ {
    Typ::new(
        edm,
        "0",
        Box::new(IntegerTraits {
            edm,
            suffix: "",
            json_string: false,
        }),
    )
}

fn float(edm: EdmType) -> Typ {
    Typ::new(edm, "0.0", Box::new(FloatTraits { edm, suffix: "" }))
}

fn primitive_types() -> Vec<Typ> {
    let mut types = vec![
        Typ::new(EdmType::Binary, "", Box::new(BinaryTraits { url_safe: true })),
        Typ::new(EdmType::Boolean, "false", Box::new(BooleanTraits)),
        integer(EdmType::Byte),
        Typ::new(EdmType::Date, "0000-00-00", Box::new(DateTraits)),
        Typ::new(EdmType::Decimal, "0.0", Box::new(DecimalTraits { suffix: "" })),
        float(EdmType::Double),
        Typ::new(EdmType::Duration, "P", Box::new(DurationTraits)),
        Typ::new(
            EdmType::Stream,
            "null",
            Box::new(OpaqueTraits {
                edm: EdmType::Stream,
            }),
        ),
        float(EdmType::Single),
        Typ::new(
            EdmType::Guid,
            "00000000-0000-0000-0000-000000000000",
            Box::new(GuidTraits { prefixed: false }),
        ),
        integer(EdmType::Int16),
        integer(EdmType::Int32),
        integer(EdmType::Int64),
        integer(EdmType::SByte),
        Typ::new(EdmType::String, "''", Box::new(StringTraits)),
        Typ::new(EdmType::TimeOfDay, "00:00:00", Box::new(TimeOfDayTraits)),
        Typ::new(
            EdmType::DateTimeOffset,
            "0000-00-00T00:00:00",
            Box::new(DateTimeOffsetTraits { prefixed: false }),
        ),
    ];
    types.extend(
        GEOGRAPHY
            .into_iter()
            .map(|edm| Typ::new(edm, "", Box::new(OpaqueTraits { edm }))),
    );
    types
}

fn build_routines() -> HashMap<ElementKind, BuildFn> {
    let routines: [(ElementKind, BuildFn); 17] = [
        (ElementKind::EntityType, build::build_entity_type),
        (ElementKind::ComplexType, build::build_complex_type),
        (ElementKind::EnumType, build::build_enum_type),
        (ElementKind::TypeDefinition, build_v4::build_type_definition),
        (ElementKind::Property, build::build_property),
        (ElementKind::NavigationProperty, build_v4::build_navigation_property),
        (
            ElementKind::NavigationPropertyBinding,
            build_v4::build_navigation_property_binding,
        ),
        (ElementKind::ReferentialConstraint, build_v4::build_referential_constraint),
        (ElementKind::EntitySet, build::build_entity_set),
        (ElementKind::Singleton, build_v4::build_singleton),
        (ElementKind::FunctionImport, build_v4::build_function_import),
        (ElementKind::ActionImport, build_v4::build_action_import),
        (ElementKind::Function, build_v4::build_function),
        (ElementKind::Action, build_v4::build_action),
        (ElementKind::Term, build_v4::build_term),
        (ElementKind::Annotations, build::build_annotations),
        (ElementKind::Annotation, build::build_annotation),
    ];
    routines.into_iter().collect()
}

fn annotation_handlers() -> HashMap<AnnotationKind, AnnotationFn> {
    let handlers: [(AnnotationKind, AnnotationFn); 2] = [
        (AnnotationKind::ValueList, annotations::build_value_list),
        (AnnotationKind::Unit, annotations::build_unit),
    ];
    handlers.into_iter().collect()
}

pub(super) fn capabilities() -> Capabilities {
    Capabilities {
        version: ODataVersion::V4,
        primitive_types: primitive_types(),
        build_routines: build_routines(),
        annotation_handlers: annotation_handlers(),
        edmx_namespaces: EDMX_NAMESPACES,
        edm_namespaces: EDM_NAMESPACES,
        conventions: Conventions {
            version_headers: &[("OData-Version", "4.0"), ("OData-MaxVersion", "4.0")],
            inline_count: ("$count", "true"),
            substringof: false,
            payload: PayloadStyle::Minimal,
            parameters: ParameterStyle::Path,
            merge: false,
        },
    }
}
