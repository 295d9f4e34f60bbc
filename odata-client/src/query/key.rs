//! Entity keys and their path predicates

use crate::error::{ProgramError, Result};
use crate::model::EntityType;
use crate::types::{ValueCodec, Value};

/// Key values as supplied by the caller
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// The value of the only key property
    Single(Value),
    /// Values by key property name, in any order
    Named(Vec<(String, Value)>),
}

impl Key {
    pub fn single(value: impl Into<Value>) -> Self {
        Key::Single(value.into())
    }

    pub fn named<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<Value>,
    {
        Key::Named(
            pairs
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// A validated key, ordered as the entity type declares it
#[derive(Debug, Clone, PartialEq)]
pub struct EntityKey {
    values: Vec<(String, Value)>,
    predicate: String,
}

impl EntityKey {
    pub fn new(codec: &ValueCodec<'_>, entity_type: &EntityType, key: Key) -> Result<Self> {
        let declared = &entity_type.key;
        let values = match key {
            Key::Single(value) => {
                if declared.len() != 1 {
                    return Err(ProgramError::InvalidKey(format!(
                        "Key of entity type {} consists of multiple properties {} and cannot be initialized by single value",
                        entity_type.name,
                        declared.join(", ")
                    ))
                    .into());
                }
                vec![(declared[0].clone(), value)]
            }
            Key::Named(mut pairs) => {
                if let Some((name, _)) = pairs.iter().find(|(name, _)| !declared.contains(name)) {
                    return Err(ProgramError::InvalidKey(format!(
                        "Property {} is not a key property of entity type {}",
                        name, entity_type.name
                    ))
                    .into());
                }
                let mut ordered = Vec::with_capacity(declared.len());
                for name in declared {
                    let position = pairs.iter().position(|(given, _)| given == name).ok_or_else(|| {
                        ProgramError::InvalidKey(format!("Missing value for key property {name}"))
                    })?;
                    ordered.push(pairs.swap_remove(position));
                }
                ordered
            }
        };

        let mut literals = Vec::with_capacity(values.len());
        for (name, value) in &values {
            let property = entity_type.property(name)?;
            literals.push(codec.to_literal(property.typ()?, value, &property.facets)?);
        }
        let predicate = if literals.len() == 1 {
            format!("({})", literals[0])
        } else {
            let pairs: Vec<String> = values
                .iter()
                .zip(&literals)
                .map(|((name, _), literal)| format!("{name}={literal}"))
                .collect();
            format!("({})", pairs.join(","))
        };
        Ok(Self { values, predicate })
    }

    /// Key of a decoded entity, if every key property carries a value
    pub(crate) fn from_entity(
        codec: &ValueCodec<'_>,
        entity_type: &EntityType,
        properties: &[(String, Value)],
    ) -> Option<Self> {
        let mut pairs = Vec::with_capacity(entity_type.key.len());
        for name in &entity_type.key {
            let (_, value) = properties.iter().find(|(property, _)| property == name)?;
            if value.is_null() || value.is_absent() {
                return None;
            }
            pairs.push((name.clone(), value.clone()));
        }
        Self::new(codec, entity_type, Key::Named(pairs)).ok()
    }

    /// Values in declared key order
    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }

    /// Path predicate such as `(10248)` or `(OrderID=10248,ProductID=42)`
    pub fn predicate(&self) -> &str {
        &self.predicate
    }
}
