//! OData V2 and V3 capability tables

use std::collections::HashMap;

use super::{
    AnnotationFn, AnnotationKind, BuildFn, Capabilities, Conventions, ODataVersion,
    ParameterStyle, PayloadStyle,
};
use crate::config::ElementKind;
use crate::metadata::{annotations, build, build_v2};
use crate::types::traits::{
    BinaryTraits, BooleanTraits, DateTimeOffsetTraits, DateTimeTraits, DecimalTraits,
    FloatTraits, GuidTraits, IntegerTraits, OpaqueTraits, StringTraits, TimeTraits,
};
use crate::types::{EdmType, Typ};

const EDMX_NAMESPACES: &[&str] = &["http://schemas.microsoft.com/ado/2007/06/edmx"];

const EDM_NAMESPACES: &[&str] = &[
    "http://schemas.microsoft.com/ado/2006/04/edm",
    "http://schemas.microsoft.com/ado/2007/05/edm",
    "http://schemas.microsoft.com/ado/2008/09/edm",
    "http://schemas.microsoft.com/ado/2009/11/edm",
];

fn integer(edm: EdmType, null_value: &'static str) -> Typ {
    let (suffix, json_string) = match edm {
        EdmType::Int64 => ("L", true),
        _ => ("", false),
    };
    Typ::new(
        edm,
        null_value,
        Box::new(IntegerTraits {
            edm,
            suffix,
            json_string,
        }),
    )
}

fn primitive_types() -> Vec<Typ> {
    vec![
        Typ::new(
            EdmType::Binary,
            "binary''",
            Box::new(BinaryTraits { url_safe: false }),
        ),
        Typ::new(EdmType::Boolean, "false", Box::new(BooleanTraits)),
        integer(EdmType::Byte, "0"),
        Typ::new(
            EdmType::DateTime,
            "datetime'2000-01-01T00:00'",
            Box::new(DateTimeTraits),
        ),
        Typ::new(
            EdmType::Decimal,
            "0.0M",
            Box::new(DecimalTraits { suffix: "M" }),
        ),
        Typ::new(
            EdmType::Double,
            "0.0d",
            Box::new(FloatTraits {
                edm: EdmType::Double,
                suffix: "d",
            }),
        ),
        Typ::new(
            EdmType::Single,
            "0.0f",
            Box::new(FloatTraits {
                edm: EdmType::Single,
                suffix: "f",
            }),
        ),
        Typ::new(
            EdmType::Guid,
            "guid'00000000-0000-0000-0000-000000000000'",
            Box::new(GuidTraits { prefixed: true }),
        ),
        integer(EdmType::Int16, "0"),
        integer(EdmType::Int32, "0"),
        integer(EdmType::Int64, "0L"),
        integer(EdmType::SByte, "0"),
        Typ::new(EdmType::String, "''", Box::new(StringTraits)),
        Typ::new(EdmType::Time, "time'PT00H00M'", Box::new(TimeTraits)),
        Typ::new(
            EdmType::DateTimeOffset,
            "datetimeoffset'0000-00-00T00:00:00'",
            Box::new(DateTimeOffsetTraits { prefixed: true }),
        ),
    ]
}

fn build_routines() -> HashMap<ElementKind, BuildFn> {
    let routines: [(ElementKind, BuildFn); 12] = [
        (ElementKind::EntityType, build::build_entity_type),
        (ElementKind::ComplexType, build::build_complex_type),
        (ElementKind::EnumType, build::build_enum_type),
        (ElementKind::Property, build::build_property),
        (ElementKind::NavigationProperty, build_v2::build_navigation_property),
        (ElementKind::ReferentialConstraint, build_v2::build_referential_constraint),
        (ElementKind::Association, build_v2::build_association),
        (ElementKind::AssociationSet, build_v2::build_association_set),
        (ElementKind::EntitySet, build::build_entity_set),
        (ElementKind::FunctionImport, build_v2::build_function_import),
        (ElementKind::Annotations, build::build_annotations),
        (ElementKind::Annotation, build::build_annotation),
    ];
    routines.into_iter().collect()
}

fn annotation_handlers() -> HashMap<AnnotationKind, AnnotationFn> {
    let handlers: [(AnnotationKind, AnnotationFn); 1] =
        [(AnnotationKind::ValueList, annotations::build_value_list)];
    handlers.into_iter().collect()
}

fn conventions(protocol_version: ODataVersion) -> Conventions {
    let version_headers: &'static [(&'static str, &'static str)] = match protocol_version {
        ODataVersion::V3 => &[
            ("DataServiceVersion", "3.0"),
            ("MaxDataServiceVersion", "3.0"),
        ],
        _ => &[
            ("DataServiceVersion", "2.0"),
            ("MaxDataServiceVersion", "2.0"),
        ],
    };
    Conventions {
        version_headers,
        inline_count: ("$inlinecount", "allpages"),
        substringof: true,
        payload: PayloadStyle::Verbose,
        parameters: ParameterStyle::Query,
        merge: true,
    }
}

pub(super) fn capabilities_v2() -> Capabilities {
    Capabilities {
        version: ODataVersion::V2,
        primitive_types: primitive_types(),
        build_routines: build_routines(),
        annotation_handlers: annotation_handlers(),
        edmx_namespaces: EDMX_NAMESPACES,
        edm_namespaces: EDM_NAMESPACES,
        conventions: conventions(ODataVersion::V2),
    }
}

/// V3 keeps the V2 element set and adds streams and geography values
pub(super) fn capabilities_v3() -> Capabilities {
    let mut primitive_types = primitive_types();
    primitive_types.push(Typ::new(
        EdmType::Stream,
        "null",
        Box::new(OpaqueTraits {
            edm: EdmType::Stream,
        }),
    ));
    for edm in [
        EdmType::Geography,
        EdmType::GeographyPoint,
        EdmType::GeographyLineString,
        EdmType::GeographyPolygon,
        EdmType::GeographyMultiPoint,
        EdmType::GeographyMultiLineString,
        EdmType::GeographyMultiPolygon,
        EdmType::GeographyCollection,
    ] {
        primitive_types.push(Typ::new(edm, "", Box::new(OpaqueTraits { edm })));
    }

    Capabilities {
        version: ODataVersion::V3,
        primitive_types,
        build_routines: build_routines(),
        annotation_handlers: annotation_handlers(),
        edmx_namespaces: EDMX_NAMESPACES,
        edm_namespaces: EDM_NAMESPACES,
        conventions: conventions(ODataVersion::V3),
    }
}
