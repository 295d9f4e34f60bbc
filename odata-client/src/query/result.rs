//! Decoding successful responses according to [`Expect`]

use crate::error::{Error, ProgramError, Result};
use crate::model::{EntityType, QualifiedName};
use crate::proxy::{EntityProxy, atom, json};
use crate::query::request::{Expect, RequestContext};
use crate::transport::HttpResponse;
use crate::types::Value;

/// What a request produced
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Entity(EntityProxy),
    Entities {
        entities: Vec<EntityProxy>,
        /// Inline count, when it was requested
        count: Option<u64>,
        /// Server-driven paging link to the next page
        next_link: Option<String>,
    },
    Count(u64),
    Value(Value),
    /// No content, e.g. after an update or delete
    Empty,
}

impl Outcome {
    fn mismatch(&self, wanted: &str) -> Error {
        Error::decode(format!("Expected {wanted}, the request produced {}", self.kind()))
    }

    fn kind(&self) -> &'static str {
        match self {
            Outcome::Entity(_) => "an entity",
            Outcome::Entities { .. } => "a collection",
            Outcome::Count(_) => "a count",
            Outcome::Value(_) => "a value",
            Outcome::Empty => "no content",
        }
    }

    pub fn into_entity(self) -> Result<EntityProxy> {
        match self {
            Outcome::Entity(entity) => Ok(entity),
            other => Err(other.mismatch("an entity")),
        }
    }

    pub fn into_entities(self) -> Result<Vec<EntityProxy>> {
        match self {
            Outcome::Entities { entities, .. } => Ok(entities),
            other => Err(other.mismatch("a collection")),
        }
    }

    pub fn into_count(self) -> Result<u64> {
        match self {
            Outcome::Count(count) => Ok(count),
            Outcome::Entities {
                count: Some(count), ..
            } => Ok(count),
            other => Err(other.mismatch("a count")),
        }
    }

    pub fn into_value(self) -> Result<Value> {
        match self {
            Outcome::Value(value) => Ok(value),
            other => Err(other.mismatch("a value")),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Outcome::Empty)
    }
}

fn is_xml(response: &HttpResponse) -> bool {
    response
        .content_type()
        .is_some_and(|ct| ct.contains("xml"))
}

fn entity_type<'a>(ctx: &RequestContext<'a>, name: &QualifiedName) -> Result<&'a EntityType> {
    let found = ctx
        .schema
        .entity_type_by_name(name)
        .ok_or_else(|| ProgramError::UnknownType(name.to_string()))?;
    Ok(found.get()?)
}

/// Decode a response whose status the request accepted
pub fn decode(ctx: &RequestContext<'_>, expect: &Expect, response: &HttpResponse) -> Result<Outcome> {
    let text = response.text();
    if response.status == 204 || (text.trim().is_empty() && !matches!(expect, Expect::Count)) {
        return Ok(Outcome::Empty);
    }

    match expect {
        Expect::Nothing => Ok(Outcome::Empty),
        Expect::Count => text
            .trim()
            .parse()
            .map(Outcome::Count)
            .map_err(|_| Error::decode(format!("Invalid count '{}'", text.trim()))),
        Expect::Entity {
            entity_type: name,
            entity_set,
        } => {
            let entity_type = entity_type(ctx, name)?;
            let entity = if is_xml(response) {
                atom::decode_entity_document(ctx, entity_type, entity_set.as_ref(), &text)?
            } else {
                json::decode_entity_body(ctx, entity_type, entity_set.as_ref(), &response.json()?)?
            };
            Ok(Outcome::Entity(entity))
        }
        Expect::Entities {
            entity_type: name,
            entity_set,
        } => {
            let entity_type = entity_type(ctx, name)?;
            let page = if is_xml(response) {
                atom::decode_feed_document(ctx, entity_type, entity_set.as_ref(), &text)?
            } else {
                json::decode_collection_body(ctx, entity_type, entity_set.as_ref(), &response.json()?)?
            };
            Ok(Outcome::Entities {
                entities: page.entities,
                count: page.count,
                next_link: page.next_link,
            })
        }
        Expect::Value { function, typ } => {
            let value = if is_xml(response) {
                atom::decode_value_document(ctx, typ, &text)?
            } else {
                json::decode_value_body(ctx, function, typ, &response.json()?)?
            };
            Ok(Outcome::Value(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::metadata::parse;
    use crate::model::{PropertyType, Schema};
    use crate::types::EdmType;
    use crate::version::ODataVersion;
    use pretty_assertions::assert_eq;

    fn cars() -> (Schema, Config) {
        let config = Config::new(ODataVersion::V4);
        let schema = parse(include_str!("../../tests/fixtures/cars_v4.xml").as_bytes(), &config).unwrap();
        (schema, config)
    }

    fn json_response(body: &str) -> HttpResponse {
        HttpResponse::new(200)
            .with_header("Content-Type", "application/json;odata.metadata=minimal")
            .with_body(body)
    }

    #[test]
    fn test_count_body() {
        let (schema, config) = cars();
        let ctx = RequestContext::new(&schema, &config);
        let response = HttpResponse::new(200).with_body(" 42\n");
        assert_eq!(decode(&ctx, &Expect::Count, &response).unwrap(), Outcome::Count(42));

        let response = HttpResponse::new(200).with_body("many");
        assert!(matches!(decode(&ctx, &Expect::Count, &response), Err(Error::Decode(_))));
    }

    #[test]
    fn test_entity_and_collection() {
        let (schema, config) = cars();
        let ctx = RequestContext::new(&schema, &config);
        let expect = Expect::Entities {
            entity_type: QualifiedName::new("Cars", "Car"),
            entity_set: Some(QualifiedName::new("Cars", "Cars")),
        };
        let outcome = decode(
            &ctx,
            &expect,
            &json_response(r#"{"value":[{"ID":1},{"ID":2}],"@odata.nextLink":"Cars?$skip=2"}"#),
        )
        .unwrap();
        let Outcome::Entities {
            entities,
            count,
            next_link,
        } = outcome
        else {
            panic!("expected a collection");
        };
        assert_eq!(entities.len(), 2);
        assert_eq!(count, None);
        assert_eq!(next_link.as_deref(), Some("Cars?$skip=2"));
        assert_eq!(entities[1].path(), Some("Cars(2)"));

        let expect = Expect::Entity {
            entity_type: QualifiedName::new("Cars", "Car"),
            entity_set: Some(QualifiedName::new("Cars", "Cars")),
        };
        let entity = decode(&ctx, &expect, &json_response(r#"{"ID":7,"Model":"Fabia"}"#))
            .unwrap()
            .into_entity()
            .unwrap();
        assert_eq!(entity.get_as::<String>("Model").unwrap(), "Fabia");
    }

    #[test]
    fn test_no_content_and_accessor_mismatch() {
        let (schema, config) = cars();
        let ctx = RequestContext::new(&schema, &config);
        let outcome = decode(&ctx, &Expect::Nothing, &HttpResponse::new(204)).unwrap();
        assert!(outcome.is_empty());
        let error = outcome.into_entity().unwrap_err();
        assert_eq!(
            error.to_string(),
            "Failed to decode response: Expected an entity, the request produced no content"
        );

        let expect = Expect::Value {
            function: "Total".to_string(),
            typ: PropertyType::Primitive(EdmType::Double),
        };
        let value = decode(&ctx, &expect, &json_response(r#"{"value":2.5}"#))
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(value, Value::Double(2.5));
    }
}
