//! JSON payloads: V2/V3 verbose (`{"d": ...}`) and V4 minimal metadata

use serde_json::{Map, Value as Json};

use super::{EntityProxy, EntitySource, NavigationPayload, assemble};
use crate::error::{Error, Result};
use crate::model::{EntityType, NavigationProperty, Property, PropertyType, QualifiedName};
use crate::query::request::RequestContext;
use crate::types::{Facets, Value};
use crate::version::PayloadStyle;

/// One page of a collection response
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Page {
    pub entities: Vec<EntityProxy>,
    pub count: Option<u64>,
    pub next_link: Option<String>,
}

struct JsonEntity<'j> {
    object: &'j Map<String, Json>,
    style: PayloadStyle,
}

impl JsonEntity<'_> {
    fn metadata(&self, member: &str) -> Option<String> {
        let node = match self.style {
            PayloadStyle::Verbose => self.object.get("__metadata")?.get(member)?,
            PayloadStyle::Minimal => self.object.get(&format!("@odata.{member}"))?,
        };
        node.as_str().map(str::to_string)
    }
}

impl EntitySource for JsonEntity<'_> {
    fn type_name(&self) -> Option<String> {
        self.metadata("type")
    }

    fn etag(&self) -> Option<String> {
        self.metadata("etag")
    }

    fn property(
        &self,
        ctx: &RequestContext<'_>,
        property: &Property,
        typ: &PropertyType,
    ) -> Result<Option<Value>> {
        self.object
            .get(&property.name)
            .map(|node| ctx.codec().from_json(typ, node, &property.facets))
            .transpose()
    }

    fn navigation(
        &self,
        ctx: &RequestContext<'_>,
        navigation: &NavigationProperty,
        target: &EntityType,
        target_set: Option<&QualifiedName>,
        many: bool,
    ) -> Result<NavigationPayload> {
        let Some(node) = self.object.get(&navigation.name) else {
            return Ok(NavigationPayload::Absent);
        };
        if let Some(deferred) = node.get("__deferred") {
            let uri = deferred.get("uri").and_then(Json::as_str).map(str::to_string);
            return Ok(NavigationPayload::Deferred(uri));
        }
        if node.is_null() {
            return Ok(if many {
                NavigationPayload::Many(Vec::new())
            } else {
                NavigationPayload::One(None)
            });
        }
        if many {
            let items = results(node).ok_or_else(|| {
                Error::decode(format!(
                    "Navigation property {} is not a collection",
                    navigation.name
                ))
            })?;
            let entities = items
                .iter()
                .map(|item| decode_entity(ctx, target, target_set, item))
                .collect::<Result<Vec<_>>>()?;
            Ok(NavigationPayload::Many(entities))
        } else {
            Ok(NavigationPayload::One(Some(decode_entity(
                ctx, target, target_set, node,
            )?)))
        }
    }
}

/// Items of a collection node: a bare array or V2 `{"results": [...]}`
fn results(node: &Json) -> Option<&Vec<Json>> {
    match node {
        Json::Array(items) => Some(items),
        Json::Object(object) => object.get("results")?.as_array(),
        _ => None,
    }
}

/// Strip the V2 `{"d": ...}` envelope
fn unwrap_envelope(ctx: &RequestContext<'_>, body: &Json) -> Result<Json> {
    match ctx.conventions().payload {
        PayloadStyle::Verbose => body
            .get("d")
            .cloned()
            .ok_or_else(|| Error::decode("Response is missing the member d")),
        PayloadStyle::Minimal => Ok(body.clone()),
    }
}

fn count_of(node: Option<&Json>) -> Option<u64> {
    match node? {
        Json::Number(number) => number.as_u64(),
        Json::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Decode one entity object, nested or top level
pub(crate) fn decode_entity(
    ctx: &RequestContext<'_>,
    entity_type: &EntityType,
    entity_set: Option<&QualifiedName>,
    node: &Json,
) -> Result<EntityProxy> {
    let object = node.as_object().ok_or_else(|| {
        Error::decode(format!(
            "Expected an object for entity {}, got {node}",
            entity_type.name
        ))
    })?;
    let source = JsonEntity {
        object,
        style: ctx.conventions().payload,
    };
    assemble(ctx, entity_type, entity_set, &source)
}

/// Decode a single entity response body
pub(crate) fn decode_entity_body(
    ctx: &RequestContext<'_>,
    entity_type: &EntityType,
    entity_set: Option<&QualifiedName>,
    body: &Json,
) -> Result<EntityProxy> {
    let root = unwrap_envelope(ctx, body)?;
    // some V2 services wrap a single entity in `results` as well
    let node = match root.get("results") {
        Some(inner @ Json::Object(_)) => inner,
        _ => &root,
    };
    decode_entity(ctx, entity_type, entity_set, node)
}

/// Decode a collection response body with its count and next link
pub(crate) fn decode_collection_body(
    ctx: &RequestContext<'_>,
    entity_type: &EntityType,
    entity_set: Option<&QualifiedName>,
    body: &Json,
) -> Result<Page> {
    let root = unwrap_envelope(ctx, body)?;
    let (items, count, next_link) = match ctx.conventions().payload {
        PayloadStyle::Verbose => (
            results(&root),
            count_of(root.get("__count")),
            root.get("__next"),
        ),
        PayloadStyle::Minimal => (
            root.get("value").and_then(Json::as_array),
            count_of(root.get("@odata.count")),
            root.get("@odata.nextLink"),
        ),
    };
    let items = items.ok_or_else(|| {
        Error::decode(format!(
            "Response does not contain a collection of {}",
            entity_type.name
        ))
    })?;
    let entities = items
        .iter()
        .map(|item| decode_entity(ctx, entity_type, entity_set, item))
        .collect::<Result<Vec<_>>>()?;
    Ok(Page {
        entities,
        count,
        next_link: next_link.and_then(Json::as_str).map(str::to_string),
    })
}

/// Decode a non-entity function result
pub(crate) fn decode_value_body(
    ctx: &RequestContext<'_>,
    function: &str,
    typ: &PropertyType,
    body: &Json,
) -> Result<Value> {
    let root = unwrap_envelope(ctx, body)?;
    let node = match ctx.conventions().payload {
        PayloadStyle::Verbose => match root.get(function) {
            Some(inner) if !typ.is_collection() || inner.is_array() => inner.clone(),
            _ => root,
        },
        PayloadStyle::Minimal => match root.get("value") {
            Some(inner) => inner.clone(),
            None => root,
        },
    };
    ctx.codec().from_json(typ, &node, &Facets::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::metadata::parse;
    use crate::model::Schema;
    use crate::proxy::{Navigation, NavigationValue};
    use crate::types::EdmType;
    use crate::version::ODataVersion;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const EPM: &str = include_str!("../../tests/fixtures/sap_epm_v2.xml");
    const CARS: &str = include_str!("../../tests/fixtures/cars_v4.xml");

    fn epm(config: &Config) -> Schema {
        parse(EPM.as_bytes(), config).unwrap()
    }

    fn employees(schema: &Schema) -> (&EntityType, QualifiedName) {
        let set = schema.entity_set("Employees").unwrap();
        (schema.entity_type_of(set).unwrap(), set.name.clone())
    }

    #[test]
    fn test_verbose_entity_with_deferred_navigation() {
        let config = Config::new(ODataVersion::V2);
        let schema = epm(&config);
        let ctx = RequestContext::new(&schema, &config);
        let (employee, set) = employees(&schema);

        let body = json!({"d": {
            "__metadata": {"uri": "http://x/Employees(23)", "type": "EPM.Employee", "etag": "W/\"1\""},
            "ID": 23,
            "NameFirst": "Rob",
            "StartDate": "/Date(1514140205000)/",
            "Addresses": {"__deferred": {"uri": "http://x/Employees(23)/Addresses"}}
        }});
        let entity = decode_entity_body(&ctx, employee, Some(&set), &body).unwrap();

        assert_eq!(entity.get_as::<i32>("ID").unwrap(), 23);
        assert_eq!(entity.get_as::<String>("NameFirst").unwrap(), "Rob");
        assert_eq!(entity.path(), Some("Employees(23)"));
        assert_eq!(entity.etag(), Some("W/\"1\""));
        assert!(!entity.is_expanded("Addresses"));

        let Navigation::Deferred(request) = entity.navigation("Addresses").unwrap() else {
            panic!("navigation should be deferred");
        };
        assert_eq!(request.path, "Employees(23)/Addresses");
        assert!(matches!(request.expect, crate::query::Expect::Entities { .. }));

        let error = entity.get("Shoe").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Property Shoe is not declared in EPM.Employee entity type"
        );
    }

    #[test]
    fn test_missing_datetime_follows_retain_null() {
        let body = json!({"d": {"ID": 1}});

        let config = Config::new(ODataVersion::V2);
        let schema = epm(&config);
        let ctx = RequestContext::new(&schema, &config);
        let (employee, set) = employees(&schema);
        let entity = decode_entity_body(&ctx, employee, Some(&set), &body).unwrap();
        let default = NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(entity.get("StartDate").unwrap(), &Value::DateTime(default));

        let retaining = Config::builder()
            .version(ODataVersion::V2)
            .retain_null(true)
            .build();
        let ctx = RequestContext::new(&schema, &retaining);
        let entity = decode_entity_body(&ctx, employee, Some(&set), &body).unwrap();
        let start = entity.get("StartDate").unwrap();
        assert_eq!(start, &Value::Absent);
        assert_ne!(start, &Value::Null);
        assert_ne!(start, &Value::DateTime(default));
        assert_eq!(entity.get_as::<Option<NaiveDate>>("StartDate").unwrap(), None);
    }

    #[test]
    fn test_verbose_collection_with_expansion_and_count() {
        let config = Config::new(ODataVersion::V2);
        let schema = epm(&config);
        let ctx = RequestContext::new(&schema, &config);
        let (employee, set) = employees(&schema);

        let body = json!({"d": {
            "__count": "12",
            "__next": "http://x/Employees?$skiptoken=2",
            "results": [
                {"ID": 1, "Addresses": {"results": [{"ID": 7, "City": "Brno"}]}},
                {"ID": 2, "Addresses": {"results": []}}
            ]
        }});
        let page = decode_collection_body(&ctx, employee, Some(&set), &body).unwrap();
        assert_eq!(page.count, Some(12));
        assert_eq!(page.next_link.as_deref(), Some("http://x/Employees?$skiptoken=2"));
        assert_eq!(page.entities.len(), 2);

        let Navigation::Loaded(NavigationValue::Many(addresses)) =
            page.entities[0].navigation("Addresses").unwrap()
        else {
            panic!("navigation should be expanded");
        };
        assert_eq!(addresses[0].get_as::<String>("City").unwrap(), "Brno");
        assert_eq!(addresses[0].path(), Some("Addresses(7)"));
    }

    #[test]
    fn test_minimal_collection_and_derived_type() {
        let config = Config::new(ODataVersion::V4);
        let schema = parse(CARS.as_bytes(), &config).unwrap();
        let ctx = RequestContext::new(&schema, &config);
        let set = schema.entity_set("Cars").unwrap();
        let car = schema.entity_type_of(set).unwrap();

        let body = json!({
            "@odata.count": 2,
            "value": [
                {"ID": 1, "Model": "Octavia", "Color": "Blue", "Price": 120.5,
                 "Manufacturer": {"ID": 3, "Name": "Skoda"}},
                {"@odata.type": "#Cars.SportsCar", "ID": 2, "TopSpeed": 300, "Manufacturer": null}
            ]
        });
        let page = decode_collection_body(&ctx, car, Some(&set.name), &body).unwrap();
        assert_eq!(page.count, Some(2));

        let first = &page.entities[0];
        assert_eq!(first.get("Color").unwrap().as_enum().unwrap().members, ["Blue"]);
        let Navigation::Loaded(NavigationValue::One(Some(maker))) =
            first.navigation("Manufacturer").unwrap()
        else {
            panic!("manufacturer should be expanded");
        };
        assert_eq!(maker.path(), Some("Manufacturers(3)"));

        let second = &page.entities[1];
        assert_eq!(second.entity_type(), &QualifiedName::new("Cars", "SportsCar"));
        assert_eq!(second.get_as::<i32>("TopSpeed").unwrap(), 300);
        assert_eq!(
            second.navigation("Manufacturer").unwrap(),
            Navigation::Loaded(NavigationValue::One(None))
        );
    }

    #[test]
    fn test_function_values() {
        let config = Config::new(ODataVersion::V2);
        let schema = epm(&config);
        let ctx = RequestContext::new(&schema, &config);
        let int32 = PropertyType::Primitive(EdmType::Int32);

        assert_eq!(
            decode_value_body(&ctx, "sum", &int32, &json!({"d": 6})).unwrap(),
            Value::Int32(6)
        );
        assert_eq!(
            decode_value_body(&ctx, "sum", &int32, &json!({"d": {"sum": 6}})).unwrap(),
            Value::Int32(6)
        );

        let v4 = Config::new(ODataVersion::V4);
        let ctx = RequestContext::new(&schema, &v4);
        assert_eq!(
            decode_value_body(&ctx, "sum", &int32, &json!({"@odata.context": "x", "value": 6}))
                .unwrap(),
            Value::Int32(6)
        );
    }

    #[test]
    fn test_missing_envelope_is_decode_error() {
        let config = Config::new(ODataVersion::V2);
        let schema = epm(&config);
        let ctx = RequestContext::new(&schema, &config);
        let (employee, set) = employees(&schema);
        let error = decode_entity_body(&ctx, employee, Some(&set), &json!({"ID": 1})).unwrap_err();
        assert!(matches!(error, Error::Decode(_)));
    }
}
