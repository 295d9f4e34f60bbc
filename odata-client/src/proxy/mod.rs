//! Decoded entities
//!
//! An [`EntityProxy`] holds every declared property of one entity, decoded
//! through the declared property type, plus the state of each navigation
//! property: expanded in the same payload, or deferred to a later fetch.

pub(crate) mod atom;
pub(crate) mod json;

use crate::error::{Error, ModelError, ProgramError, Result, ValueError};
use crate::model::{EntityType, NavigationProperty, Property, PropertyType, QualifiedName};
use crate::query::key::EntityKey;
use crate::query::request::{Expect, ODataRequest, RequestContext, encode_segment};
use crate::transport::Method;
use crate::types::{FromValue, Value};
use crate::version::ODataVersion;

/// Navigation data that arrived with the entity
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationValue {
    One(Option<Box<EntityProxy>>),
    Many(Vec<EntityProxy>),
}

/// Result of reading a navigation property
#[derive(Debug, Clone, PartialEq)]
pub enum Navigation {
    /// Expanded by the server
    Loaded(NavigationValue),
    /// Not in the payload; executing the request fetches it
    Deferred(ODataRequest),
}

#[derive(Debug, Clone, PartialEq)]
enum NavigationState {
    Loaded(NavigationValue),
    Deferred {
        entity_type: QualifiedName,
        entity_set: Option<QualifiedName>,
        many: bool,
        /// Absolute link announced by the server, if any
        uri: Option<String>,
    },
    Broken(ModelError),
}

/// One entity decoded from a response
#[derive(Debug, Clone, PartialEq)]
pub struct EntityProxy {
    entity_type: QualifiedName,
    entity_set: Option<QualifiedName>,
    version: ODataVersion,
    properties: Vec<(String, std::result::Result<Value, ModelError>)>,
    navigations: Vec<(String, NavigationState)>,
    key: Option<EntityKey>,
    path: Option<String>,
    etag: Option<String>,
}

impl EntityProxy {
    pub fn entity_type(&self) -> &QualifiedName {
        &self.entity_type
    }

    pub fn entity_set(&self) -> Option<&QualifiedName> {
        self.entity_set.as_ref()
    }

    pub fn key(&self) -> Option<&EntityKey> {
        self.key.as_ref()
    }

    /// Canonical path relative to the service root, e.g. `Employees(23)`
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn unknown_property(&self, name: &str) -> Error {
        ProgramError::UnknownProperty {
            entity_type: self.entity_type.to_string(),
            property: name.to_string(),
        }
        .into()
    }

    /// Value of a declared property. Properties missing from the payload
    /// carry their default or `Value::Absent`, depending on `retain_null`.
    pub fn get(&self, name: &str) -> Result<&Value> {
        match self.properties.iter().find(|(property, _)| property == name) {
            Some((_, Ok(value))) => Ok(value),
            Some((_, Err(fault))) => Err(fault.clone().into()),
            None => Err(self.unknown_property(name)),
        }
    }

    /// Typed read, e.g. `get_as::<i32>("Age")` or `get_as::<Option<String>>("Name")`
    pub fn get_as<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get(name)?;
        T::from_value(value).ok_or_else(|| {
            ValueError::TypeMismatch {
                edm: std::any::type_name::<T>().to_string(),
                value: format!("{} value {}", value.kind_name(), value),
            }
            .into()
        })
    }

    /// Declared properties with readable values, in declaration order
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties
            .iter()
            .filter_map(|(name, value)| value.as_ref().ok().map(|value| (name.as_str(), value)))
    }

    /// Whether the server expanded this navigation property in the payload
    pub fn is_expanded(&self, name: &str) -> bool {
        self.navigations
            .iter()
            .any(|(nav, state)| nav == name && matches!(state, NavigationState::Loaded(_)))
    }

    /// Read a navigation property: the expanded data, or the request that fetches it
    pub fn navigation(&self, name: &str) -> Result<Navigation> {
        let (_, state) = self
            .navigations
            .iter()
            .find(|(nav, _)| nav == name)
            .ok_or_else(|| ProgramError::UnknownNavigationProperty {
                entity_type: self.entity_type.to_string(),
                property: name.to_string(),
            })?;
        match state {
            NavigationState::Loaded(value) => Ok(Navigation::Loaded(value.clone())),
            NavigationState::Broken(fault) => Err(fault.clone().into()),
            NavigationState::Deferred {
                entity_type,
                entity_set,
                many,
                uri,
            } => {
                let Some(path) = &self.path else {
                    return Err(ProgramError::InvalidRequest(format!(
                        "Entity of type {} has no key, navigation {name} cannot be fetched{}",
                        self.entity_type,
                        uri.as_ref().map(|u| format!(" (server link {u})")).unwrap_or_default()
                    ))
                    .into());
                };
                let expect = if *many {
                    Expect::Entities {
                        entity_type: entity_type.clone(),
                        entity_set: entity_set.clone(),
                    }
                } else {
                    Expect::Entity {
                        entity_type: entity_type.clone(),
                        entity_set: entity_set.clone(),
                    }
                };
                Ok(Navigation::Deferred(ODataRequest::for_version(
                    self.version,
                    Method::Get,
                    format!("{path}/{}", encode_segment(name)),
                    expect,
                )))
            }
        }
    }
}

/// Navigation data as found in a payload, before it is attached to its entity
#[derive(Debug)]
pub(crate) enum NavigationPayload {
    Absent,
    Deferred(Option<String>),
    One(Option<EntityProxy>),
    Many(Vec<EntityProxy>),
}

/// Reads one payload format for [`assemble`]
pub(crate) trait EntitySource {
    /// Type name announced by the payload, e.g. `EPM.Employee`
    fn type_name(&self) -> Option<String>;

    fn etag(&self) -> Option<String>;

    /// `None` when the property is missing from the payload
    fn property(&self, ctx: &RequestContext<'_>, property: &Property, typ: &PropertyType)
    -> Result<Option<Value>>;

    fn navigation(
        &self,
        ctx: &RequestContext<'_>,
        navigation: &NavigationProperty,
        target: &EntityType,
        target_set: Option<&QualifiedName>,
        many: bool,
    ) -> Result<NavigationPayload>;
}

/// The payload's own type when it names a known entity type, the declared type otherwise
fn actual_type<'a>(
    ctx: &RequestContext<'a>,
    declared: &'a EntityType,
    announced: Option<String>,
) -> &'a EntityType {
    let Some(name) = announced else {
        return declared;
    };
    match ctx.schema.entity_type(name.trim_start_matches('#')) {
        Ok(entity_type) => entity_type,
        Err(_) => {
            log::debug!("Payload type {name} is not declared, decoding as {}", declared.name);
            declared
        }
    }
}

/// Build an entity from any payload format
pub(crate) fn assemble(
    ctx: &RequestContext<'_>,
    declared: &EntityType,
    entity_set: Option<&QualifiedName>,
    source: &dyn EntitySource,
) -> Result<EntityProxy> {
    let entity_type = actual_type(ctx, declared, source.type_name());
    let codec = ctx.codec();

    let mut properties = Vec::with_capacity(entity_type.properties.len());
    for property in &entity_type.properties {
        let value = match property.typ() {
            Ok(typ) => match source.property(ctx, property, typ)? {
                Some(value) => Ok(value),
                None => Ok(codec.absent(typ)),
            },
            Err(fault) => Err(fault),
        };
        properties.push((property.name.clone(), value));
    }

    let set = entity_set.and_then(|name| ctx.schema.entity_set_by_name(name)?.resolved());
    let mut navigations = Vec::with_capacity(entity_type.navigation_properties.len());
    for navigation in &entity_type.navigation_properties {
        let target = match navigation.target() {
            Ok(target) => target,
            Err(fault) => {
                navigations.push((navigation.name.clone(), NavigationState::Broken(fault)));
                continue;
            }
        };
        let target_type = match ctx.schema.entity_type_by_name(&target.entity_type) {
            Some(found) => match found.get() {
                Ok(target_type) => target_type,
                Err(fault) => {
                    navigations.push((navigation.name.clone(), NavigationState::Broken(fault)));
                    continue;
                }
            },
            None => return Err(ProgramError::UnknownType(target.entity_type.to_string()).into()),
        };
        let target_set = set
            .and_then(|set| set.binding(&navigation.name))
            .map(|binding| binding.target.clone());
        let many = target.multiplicity.is_many();
        let state = match source.navigation(ctx, navigation, target_type, target_set.as_ref(), many)? {
            NavigationPayload::Absent => NavigationState::Deferred {
                entity_type: target_type.name.clone(),
                entity_set: target_set,
                many,
                uri: None,
            },
            NavigationPayload::Deferred(uri) => NavigationState::Deferred {
                entity_type: target_type.name.clone(),
                entity_set: target_set,
                many,
                uri,
            },
            NavigationPayload::One(entity) => {
                NavigationState::Loaded(NavigationValue::One(entity.map(Box::new)))
            }
            NavigationPayload::Many(entities) => {
                NavigationState::Loaded(NavigationValue::Many(entities))
            }
        };
        navigations.push((navigation.name.clone(), state));
    }

    let readable: Vec<(String, Value)> = properties
        .iter()
        .filter_map(|(name, value)| value.as_ref().ok().map(|v| (name.clone(), v.clone())))
        .collect();
    let key = if entity_type.key.is_empty() {
        None
    } else {
        EntityKey::from_entity(&codec, entity_type, &readable)
    };
    let path = match set {
        Some(set) if set.is_singleton => Some(encode_segment(&set.name.name)),
        Some(set) => key
            .as_ref()
            .map(|key| encode_segment(&format!("{}{}", set.name.name, key.predicate()))),
        None => None,
    };

    Ok(EntityProxy {
        entity_type: entity_type.name.clone(),
        entity_set: set.map(|set| set.name.clone()),
        version: ctx.config.version,
        properties,
        navigations,
        key,
        path,
        etag: source.etag(),
    })
}
