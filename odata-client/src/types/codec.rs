//! Encoding of values typed by the schema rather than by a bare primitive

use roxmltree::Node;
use serde_json::{Map, Value as Json};

use super::{EdmType, Facets, Typ, Value};
use crate::config::{Config, Dialect};
use crate::error::{Error, ProgramError, Result, ValueError};
use crate::model::{ComplexType, EnumType, Property, PropertyType, QualifiedName, Schema};
use crate::vendor::sharepoint::SHAREPOINT_DATETIME;
use crate::version::Capabilities;

/// Converts values of any resolved `PropertyType`: primitives, type
/// definitions, enums, complex values and collections of those.
#[derive(Debug, Clone, Copy)]
pub struct ValueCodec<'a> {
    schema: &'a Schema,
    config: &'a Config,
    caps: &'static Capabilities,
}

fn mismatch(typ: &PropertyType, value: &Value) -> Error {
    ValueError::TypeMismatch {
        edm: describe(typ),
        value: format!("{} value {}", value.kind_name(), value),
    }
    .into()
}

fn describe(typ: &PropertyType) -> String {
    match typ {
        PropertyType::Primitive(edm) => edm.to_string(),
        PropertyType::Definition { name, .. }
        | PropertyType::Enum(name)
        | PropertyType::Complex(name)
        | PropertyType::Entity(name) => name.to_string(),
        PropertyType::Collection(item) => format!("Collection({})", describe(item)),
    }
}

/// Whether an Atom property element carries `m:null="true"`
fn xml_null(node: Node<'_, '_>) -> bool {
    node.attributes()
        .any(|a| a.name() == "null" && a.value().eq_ignore_ascii_case("true"))
}

impl<'a> ValueCodec<'a> {
    pub fn new(schema: &'a Schema, config: &'a Config) -> Self {
        Self {
            schema,
            config,
            caps: config.version.capabilities(),
        }
    }

    fn primitive(&self, edm: EdmType) -> Result<&'static Typ> {
        if edm == EdmType::DateTime
            && self.config.dialect == Dialect::SharePoint
            && self.caps.typ(edm).is_some()
        {
            return Ok(&*SHAREPOINT_DATETIME);
        }
        self.caps.typ(edm).ok_or_else(|| {
            ProgramError::InvalidRequest(format!(
                "Type {edm} is not supported in OData {}",
                self.caps.version
            ))
            .into()
        })
    }

    fn enum_type(&self, name: &QualifiedName) -> Result<&'a EnumType> {
        let found = self
            .schema
            .enum_type_by_name(name)
            .ok_or_else(|| ProgramError::UnknownType(name.to_string()))?;
        Ok(found.get()?)
    }

    fn complex_type(&self, name: &QualifiedName) -> Result<&'a ComplexType> {
        let found = self
            .schema
            .complex_type_by_name(name)
            .ok_or_else(|| ProgramError::UnknownType(name.to_string()))?;
        Ok(found.get()?)
    }

    /// Value of a property missing from a payload: the `Absent` marker when
    /// nulls are retained, the type's documented default otherwise
    pub fn absent(&self, typ: &PropertyType) -> Value {
        if self.config.retain_null {
            return Value::Absent;
        }
        typ.primitive()
            .and_then(|edm| self.caps.typ(edm))
            .map(|typ| typ.default_value(&self.config.null_defaults))
            .unwrap_or(Value::Null)
    }

    /// Like [`ValueCodec::absent`], for a property whose type may be a stub
    pub fn absent_property(&self, property: &Property) -> Result<Value> {
        Ok(self.absent(property.typ()?))
    }

    /// URL literal, e.g. for key predicates, filters and function parameters
    pub fn to_literal(&self, typ: &PropertyType, value: &Value, facets: &Facets) -> Result<String> {
        match typ {
            PropertyType::Primitive(edm) | PropertyType::Definition { underlying: edm, .. } => {
                Ok(self.primitive(*edm)?.to_literal(value, facets)?)
            }
            PropertyType::Enum(name) => {
                if value.is_null() {
                    facets.validate(value)?;
                    return Ok("null".to_string());
                }
                Ok(self.enum_type(name)?.to_literal(value)?)
            }
            other => Err(ProgramError::InvalidRequest(format!(
                "{} values cannot be written as URL literals",
                describe(other)
            ))
            .into()),
        }
    }

    pub fn from_literal(&self, typ: &PropertyType, text: &str, facets: &Facets) -> Result<Value> {
        match typ {
            PropertyType::Primitive(edm) | PropertyType::Definition { underlying: edm, .. } => {
                Ok(self.primitive(*edm)?.from_literal(text, facets)?)
            }
            PropertyType::Enum(name) if text != "null" => {
                Ok(self.enum_type(name)?.from_literal(text)?)
            }
            PropertyType::Enum(_) => {
                facets.validate(&Value::Null)?;
                Ok(Value::Null)
            }
            other => Err(ProgramError::InvalidRequest(format!(
                "{} values cannot be read from URL literals",
                describe(other)
            ))
            .into()),
        }
    }

    pub fn to_json(&self, typ: &PropertyType, value: &Value, facets: &Facets) -> Result<Json> {
        if value.is_absent() {
            return Err(ValueError::Absent.into());
        }
        if value.is_null() && !matches!(typ, PropertyType::Primitive(_) | PropertyType::Definition { .. }) {
            facets.validate(value)?;
            return Ok(Json::Null);
        }
        match typ {
            PropertyType::Primitive(edm) | PropertyType::Definition { underlying: edm, .. } => {
                Ok(self.primitive(*edm)?.to_json(value, facets)?)
            }
            PropertyType::Enum(name) => Ok(self.enum_type(name)?.to_json(value)?),
            PropertyType::Complex(name) => {
                let Value::Complex(fields) = value else {
                    return Err(mismatch(typ, value));
                };
                let complex = self.complex_type(name)?;
                let mut object = Map::new();
                for (field, field_value) in fields {
                    if field_value.is_absent() {
                        continue;
                    }
                    let property = complex.property(field)?;
                    object.insert(
                        field.clone(),
                        self.to_json(property.typ()?, field_value, &property.facets)?,
                    );
                }
                Ok(Json::Object(object))
            }
            PropertyType::Collection(item) => {
                let Value::Collection(items) = value else {
                    return Err(mismatch(typ, value));
                };
                let encoded = items
                    .iter()
                    .map(|item_value| self.to_json(item, item_value, &Facets::default()))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Json::Array(encoded))
            }
            PropertyType::Entity(_) => Err(mismatch(typ, value)),
        }
    }

    pub fn from_json(&self, typ: &PropertyType, node: &Json, facets: &Facets) -> Result<Value> {
        if node.is_null() && !matches!(typ, PropertyType::Primitive(_) | PropertyType::Definition { .. }) {
            facets.validate(&Value::Null)?;
            return Ok(Value::Null);
        }
        match typ {
            PropertyType::Primitive(edm) | PropertyType::Definition { underlying: edm, .. } => {
                Ok(self.primitive(*edm)?.from_json(node, facets)?)
            }
            PropertyType::Enum(name) => Ok(self.enum_type(name)?.from_json(node)?),
            PropertyType::Complex(name) => {
                let Json::Object(object) = node else {
                    return Err(invalid_json(typ, node));
                };
                let complex = self.complex_type(name)?;
                let mut fields = Vec::with_capacity(complex.properties.len());
                for property in &complex.properties {
                    let property_type = property.typ()?;
                    let value = match object.get(&property.name) {
                        Some(field) => self.from_json(property_type, field, &property.facets)?,
                        None => self.absent(property_type),
                    };
                    fields.push((property.name.clone(), value));
                }
                Ok(Value::Complex(fields))
            }
            PropertyType::Collection(item) => {
                // V2 verbose JSON wraps collections in `results`
                let items = match node {
                    Json::Array(items) => items,
                    Json::Object(object) => match object.get("results") {
                        Some(Json::Array(items)) => items,
                        _ => return Err(invalid_json(typ, node)),
                    },
                    _ => return Err(invalid_json(typ, node)),
                };
                let decoded = items
                    .iter()
                    .map(|item_node| self.from_json(item, item_node, &Facets::default()))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Collection(decoded))
            }
            PropertyType::Entity(_) => Ok(Value::Json(node.clone())),
        }
    }

    /// Decode an Atom property element such as `<d:Price>12.50</d:Price>`
    pub fn from_xml(&self, typ: &PropertyType, node: Node<'_, '_>, facets: &Facets) -> Result<Value> {
        let is_null = xml_null(node);
        match typ {
            PropertyType::Primitive(edm) | PropertyType::Definition { underlying: edm, .. } => {
                let text = (!is_null).then(|| node.text().unwrap_or_default());
                Ok(self.primitive(*edm)?.from_xml(text, facets)?)
            }
            _ if is_null => {
                facets.validate(&Value::Null)?;
                Ok(Value::Null)
            }
            PropertyType::Enum(name) => {
                let text = node.text().unwrap_or_default().trim();
                Ok(self.enum_type(name)?.from_json(&Json::String(text.to_string()))?)
            }
            PropertyType::Complex(name) => {
                let complex = self.complex_type(name)?;
                let mut fields = Vec::with_capacity(complex.properties.len());
                for property in &complex.properties {
                    let property_type = property.typ()?;
                    let element = node
                        .children()
                        .find(|c| c.is_element() && c.tag_name().name() == property.name);
                    let value = match element {
                        Some(element) => self.from_xml(property_type, element, &property.facets)?,
                        None => self.absent(property_type),
                    };
                    fields.push((property.name.clone(), value));
                }
                Ok(Value::Complex(fields))
            }
            PropertyType::Collection(item) => {
                let decoded = node
                    .children()
                    .filter(|c| c.is_element() && c.tag_name().name() == "element")
                    .map(|element| self.from_xml(item, element, &Facets::default()))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Collection(decoded))
            }
            PropertyType::Entity(_) => Err(ProgramError::InvalidRequest(format!(
                "Entity {} cannot be decoded as a property value",
                describe(typ)
            ))
            .into()),
        }
    }
}

fn invalid_json(typ: &PropertyType, node: &Json) -> Error {
    ValueError::InvalidJson {
        edm: describe(typ),
        json: node.to_string(),
    }
    .into()
}
