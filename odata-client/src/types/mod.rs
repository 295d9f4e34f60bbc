//! Type trait engine
//!
//! A `Typ` pairs a primitive `EdmType` with the `TypeTraits` of the selected
//! protocol version. All conversions go through `Typ` so facets are enforced
//! the same way when encoding and when decoding.

pub mod codec;
pub mod edm;
pub mod facets;
pub mod traits;
pub mod value;

pub use codec::ValueCodec;
pub use edm::EdmType;
pub use facets::{Facets, MaxLength};
pub use traits::TypeTraits;
pub use value::{EdmDuration, EnumValue, FromValue, Value};

use chrono::NaiveTime;
use serde_json::Value as Json;
use uuid::Uuid;

use crate::config::NullDefaults;
use crate::error::ValueError;

/// A primitive type as supported by one protocol version
#[derive(Debug)]
pub struct Typ {
    edm: EdmType,
    null_value: &'static str,
    traits: Box<dyn TypeTraits>,
}

impl Typ {
    pub fn new(edm: EdmType, null_value: &'static str, traits: Box<dyn TypeTraits>) -> Self {
        Self {
            edm,
            null_value,
            traits,
        }
    }

    pub fn edm(&self) -> EdmType {
        self.edm
    }

    /// Qualified name, e.g. `Edm.String`
    pub fn name(&self) -> &'static str {
        self.edm.name()
    }

    /// Literal of the type's documented default value, e.g. `datetime'2000-01-01T00:00'`
    pub fn null_value(&self) -> &'static str {
        self.null_value
    }

    pub fn traits(&self) -> &dyn TypeTraits {
        self.traits.as_ref()
    }

    /// Value substituted for an absent property when nulls are not retained
    pub fn default_value(&self, defaults: &NullDefaults) -> Value {
        match self.edm {
            EdmType::Boolean => Value::Boolean(false),
            EdmType::Byte => Value::Byte(0),
            EdmType::SByte => Value::SByte(0),
            EdmType::Int16 => Value::Int16(0),
            EdmType::Int32 => Value::Int32(0),
            EdmType::Int64 => Value::Int64(0),
            EdmType::Single => Value::Single(0.0),
            EdmType::Double => Value::Double(0.0),
            EdmType::Decimal => Value::Decimal(rust_decimal::Decimal::ZERO),
            EdmType::String => Value::String(String::new()),
            EdmType::Binary => Value::Binary(Vec::new()),
            EdmType::Guid => Value::Guid(Uuid::nil()),
            EdmType::DateTime => Value::DateTime(defaults.datetime),
            EdmType::DateTimeOffset => {
                Value::DateTimeOffset(defaults.datetime.and_utc().fixed_offset())
            }
            EdmType::Date => Value::Date(defaults.datetime.date()),
            EdmType::Time | EdmType::TimeOfDay => Value::TimeOfDay(NaiveTime::MIN),
            EdmType::Duration => Value::Duration(EdmDuration::default()),
            _ => Value::Null,
        }
    }

    /// Coerce a caller-supplied value to this type and check it against `facets`
    pub fn validate(&self, value: &Value, facets: &Facets) -> Result<Value, ValueError> {
        if value.is_absent() {
            return Err(ValueError::Absent);
        }
        let coerced = value.coerce(self.edm)?;
        facets.validate(&coerced)?;
        Ok(coerced)
    }

    pub fn to_literal(&self, value: &Value, facets: &Facets) -> Result<String, ValueError> {
        let value = self.validate(value, facets)?;
        if value.is_null() {
            return Ok("null".to_string());
        }
        self.traits.to_literal(&value)
    }

    pub fn from_literal(&self, text: &str, facets: &Facets) -> Result<Value, ValueError> {
        let value = if text == "null" {
            Value::Null
        } else {
            self.traits.from_literal(text)?
        };
        facets.validate(&value)?;
        Ok(value)
    }

    pub fn to_json(&self, value: &Value, facets: &Facets) -> Result<Json, ValueError> {
        let value = self.validate(value, facets)?;
        if value.is_null() {
            return Ok(Json::Null);
        }
        self.traits.to_json(&value)
    }

    pub fn from_json(&self, node: &Json, facets: &Facets) -> Result<Value, ValueError> {
        let value = if node.is_null() {
            Value::Null
        } else {
            self.traits.from_json(node)?
        };
        facets.validate(&value)?;
        Ok(value)
    }

    /// Text of an XML property element; `None` stands for `m:null="true"`
    pub fn to_xml(&self, value: &Value, facets: &Facets) -> Result<Option<String>, ValueError> {
        let value = self.validate(value, facets)?;
        if value.is_null() {
            return Ok(None);
        }
        self.traits.to_xml(&value).map(Some)
    }

    pub fn from_xml(&self, text: Option<&str>, facets: &Facets) -> Result<Value, ValueError> {
        let value = match text {
            None => Value::Null,
            Some(text) => self.traits.from_xml(text)?,
        };
        facets.validate(&value)?;
        Ok(value)
    }
}
