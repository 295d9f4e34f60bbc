//! Structural schema elements: types, properties and navigation properties

use serde_json::Value as Json;

use super::{QualifiedName, Resolvable, TypeInfo};
use crate::error::{ModelError, ProgramError, ValueError};
use crate::types::{EdmType, EnumValue, Facets, Value};

/// What a property, parameter or return type refers to once resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyType {
    Primitive(EdmType),
    /// V4 type definition; values behave like the underlying primitive
    Definition {
        name: QualifiedName,
        underlying: EdmType,
    },
    Enum(QualifiedName),
    Complex(QualifiedName),
    /// Only valid as a return type or navigation target
    Entity(QualifiedName),
    Collection(Box<PropertyType>),
}

impl PropertyType {
    /// Primitive kind carried on the wire, if any
    pub fn primitive(&self) -> Option<EdmType> {
        match self {
            PropertyType::Primitive(edm) => Some(*edm),
            PropertyType::Definition { underlying, .. } => Some(*underlying),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, PropertyType::Collection(_))
    }
}

/// SAP Gateway attributes of a property (`sap:*`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SapPropertyAttributes {
    pub label: Option<String>,
    pub creatable: bool,
    pub updatable: bool,
    pub sortable: bool,
    pub filterable: bool,
    pub filter_restriction: Option<String>,
    pub required_in_filter: bool,
    pub text: Option<String>,
    pub visible: bool,
    pub display_format: Option<String>,
    pub value_list: Option<String>,
}

impl Default for SapPropertyAttributes {
    fn default() -> Self {
        Self {
            label: None,
            creatable: true,
            updatable: true,
            sortable: true,
            filterable: true,
            filter_restriction: None,
            required_in_filter: false,
            text: None,
            visible: true,
            display_format: None,
            value_list: None,
        }
    }
}

/// `Org.OData.Measures.V1.Unit` attached to a property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    /// Unit stored in another property
    Path(String),
    /// Fixed unit symbol
    Symbol(String),
}

/// A structural property of an entity or complex type
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub type_info: TypeInfo,
    pub typ: Resolvable<PropertyType>,
    pub facets: Facets,
    pub sap: SapPropertyAttributes,
    pub value_helper: Option<ValueHelper>,
    pub unit: Option<Unit>,
}

impl Property {
    /// Resolved type; fails if the type could not be resolved during parsing
    pub fn typ(&self) -> Result<&PropertyType, ModelError> {
        self.typ.get()
    }
}

/// Association end multiplicity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    ZeroOrOne,
    One,
    Many,
}

impl Multiplicity {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "0..1" => Some(Multiplicity::ZeroOrOne),
            "1" => Some(Multiplicity::One),
            "*" => Some(Multiplicity::Many),
            _ => None,
        }
    }

    pub fn is_many(self) -> bool {
        self == Multiplicity::Many
    }
}

/// Resolved far end of a navigation property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavTarget {
    pub entity_type: QualifiedName,
    pub multiplicity: Multiplicity,
}

/// V4 `ReferentialConstraint` on a navigation property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferentialConstraint {
    pub property: String,
    pub referenced_property: String,
}

/// How a navigation property was declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationSource {
    /// V2/V3: through an association and its roles
    Association {
        relationship: QualifiedName,
        from_role: String,
        to_role: String,
    },
    /// V4: directly by target type
    Typed {
        type_info: TypeInfo,
        nullable: bool,
        partner: Option<String>,
        contains_target: bool,
        referential_constraints: Vec<ReferentialConstraint>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationProperty {
    pub name: String,
    pub source: NavigationSource,
    pub target: Resolvable<NavTarget>,
}

impl NavigationProperty {
    /// Resolved target; a stubbed association or type raises its fault here
    pub fn target(&self) -> Result<&NavTarget, ModelError> {
        self.target.get()
    }

    pub fn is_collection(&self) -> Result<bool, ModelError> {
        Ok(self.target()?.multiplicity.is_many())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructKind {
    Entity,
    Complex,
}

/// Entity or complex type
#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    pub name: QualifiedName,
    pub kind: StructKind,
    pub base_type: Option<QualifiedName>,
    pub is_abstract: bool,
    /// Own properties first-to-last; base properties are prepended on resolution
    pub properties: Vec<Property>,
    /// Key property names in declared order (entity types only)
    pub key: Vec<String>,
    pub navigation_properties: Vec<NavigationProperty>,
    pub label: Option<String>,
    pub is_value_list: bool,
}

pub type EntityType = StructType;
pub type ComplexType = StructType;

impl StructType {
    pub fn new(name: QualifiedName, kind: StructKind) -> Self {
        Self {
            name,
            kind,
            base_type: None,
            is_abstract: false,
            properties: Vec::new(),
            key: Vec::new(),
            navigation_properties: Vec::new(),
            label: None,
            is_value_list: false,
        }
    }

    pub fn is_entity(&self) -> bool {
        self.kind == StructKind::Entity
    }

    pub fn find_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub(crate) fn find_property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name == name)
    }

    /// Look up a property, failing with a caller error if it is not declared
    pub fn property(&self, name: &str) -> Result<&Property, ProgramError> {
        self.find_property(name)
            .ok_or_else(|| ProgramError::UnknownProperty {
                entity_type: self.name.to_string(),
                property: name.to_string(),
            })
    }

    pub fn find_navigation_property(&self, name: &str) -> Option<&NavigationProperty> {
        self.navigation_properties.iter().find(|n| n.name == name)
    }

    pub fn navigation_property(&self, name: &str) -> Result<&NavigationProperty, ProgramError> {
        self.find_navigation_property(name)
            .ok_or_else(|| ProgramError::UnknownNavigationProperty {
                entity_type: self.name.to_string(),
                property: name.to_string(),
            })
    }

    /// Key properties in declared key order
    pub fn key_properties(&self) -> Vec<&Property> {
        self.key
            .iter()
            .filter_map(|name| self.find_property(name))
            .collect()
    }

    /// Take over properties, key and navigation properties of an already flattened base
    pub(crate) fn inherit(&mut self, base: &StructType) {
        let own = std::mem::take(&mut self.properties);
        self.properties = base.properties.clone();
        self.properties
            .extend(own.into_iter().filter(|p| base.find_property(&p.name).is_none()));

        if self.key.is_empty() {
            self.key = base.key.clone();
        }

        let own = std::mem::take(&mut self.navigation_properties);
        self.navigation_properties = base.navigation_properties.clone();
        self.navigation_properties.extend(
            own.into_iter()
                .filter(|n| base.find_navigation_property(&n.name).is_none()),
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

/// Enumeration type with integer-valued members
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    pub name: QualifiedName,
    pub underlying: EdmType,
    pub is_flags: bool,
    pub members: Vec<EnumMember>,
}

impl EnumType {
    pub fn member(&self, name: &str) -> Option<&EnumMember> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn member_by_value(&self, value: i64) -> Option<&EnumMember> {
        self.members.iter().find(|m| m.value == value)
    }

    fn invalid(&self, text: &str) -> ValueError {
        ValueError::InvalidLiteral {
            edm: self.name.to_string(),
            text: text.to_string(),
        }
    }

    /// Parse `A,B` member lists, checking each member exists
    fn members_of(&self, text: &str) -> Result<EnumValue, ValueError> {
        let members: Vec<String> = text
            .split(',')
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if members.is_empty() || (!self.is_flags && members.len() > 1) {
            return Err(self.invalid(text));
        }
        if let Some(unknown) = members.iter().find(|m| self.member(m).is_none()) {
            return Err(self.invalid(unknown));
        }
        Ok(EnumValue {
            type_name: self.name.to_string(),
            members,
        })
    }

    /// Accept enum values, member names and member values
    pub fn coerce(&self, value: &Value) -> Result<EnumValue, ValueError> {
        match value {
            Value::Enum(e) => self.members_of(&e.members.join(",")),
            Value::String(s) => self.members_of(s),
            other => match other.as_i64().and_then(|v| self.member_by_value(v)) {
                Some(member) => Ok(EnumValue::new(self.name.to_string(), member.name.clone())),
                None => Err(ValueError::TypeMismatch {
                    edm: self.name.to_string(),
                    value: other.to_string(),
                }),
            },
        }
    }

    /// Literal such as `Ns.Color'Red'`
    pub fn to_literal(&self, value: &Value) -> Result<String, ValueError> {
        let value = self.coerce(value)?;
        Ok(format!("{}'{}'", self.name, value.members.join(",")))
    }

    pub fn from_literal(&self, text: &str) -> Result<Value, ValueError> {
        let prefix = self.name.to_string();
        let inner = text
            .strip_prefix(prefix.as_str())
            .unwrap_or(text)
            .strip_prefix('\'')
            .and_then(|rest| rest.strip_suffix('\''))
            .ok_or_else(|| self.invalid(text))?;
        self.members_of(inner).map(Value::Enum)
    }

    pub fn to_json(&self, value: &Value) -> Result<Json, ValueError> {
        Ok(Json::String(self.coerce(value)?.members.join(",")))
    }

    pub fn from_json(&self, node: &Json) -> Result<Value, ValueError> {
        match node {
            Json::String(text) => self.members_of(text).map(Value::Enum),
            Json::Number(n) => n
                .as_i64()
                .and_then(|v| self.member_by_value(v))
                .map(|m| Value::Enum(EnumValue::new(self.name.to_string(), m.name.clone())))
                .ok_or_else(|| self.invalid(&n.to_string())),
            other => Err(ValueError::InvalidJson {
                edm: self.name.to_string(),
                json: other.to_string(),
            }),
        }
    }
}

/// V4 `TypeDefinition`: a named primitive with fixed facets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub name: QualifiedName,
    pub underlying: EdmType,
    pub facets: Facets,
}

/// Direction of a value-help parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueHelperDirection {
    In,
    InOut,
    Out,
    DisplayOnly,
    FilterOnly,
}

impl ValueHelperDirection {
    /// Map a `com.sap.vocabularies.Common.v1.ValueListParameter*` record type
    pub fn from_record_type(local_name: &str) -> Option<Self> {
        match local_name {
            "ValueListParameterIn" => Some(Self::In),
            "ValueListParameterInOut" => Some(Self::InOut),
            "ValueListParameterOut" => Some(Self::Out),
            "ValueListParameterDisplayOnly" => Some(Self::DisplayOnly),
            "ValueListParameterFilterOnly" => Some(Self::FilterOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueHelperParameter {
    pub direction: ValueHelperDirection,
    pub local_property: Option<String>,
    pub list_property: Option<String>,
}

/// SAP value help (`Common.ValueList`) for a property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueHelper {
    /// Annotation target, e.g. `EPM.Employee/Department`
    pub target: String,
    pub label: Option<String>,
    /// Entity set providing the values
    pub collection_path: Option<String>,
    pub search_supported: bool,
    pub parameters: Vec<ValueHelperParameter>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ElementKind;
    use crate::model::Stub;

    fn color() -> EnumType {
        EnumType {
            name: QualifiedName::new("Cars", "Color"),
            underlying: EdmType::Int32,
            is_flags: false,
            members: vec![
                EnumMember {
                    name: "Red".to_string(),
                    value: 0,
                },
                EnumMember {
                    name: "Blue".to_string(),
                    value: 1,
                },
            ],
        }
    }

    fn property(name: &str) -> Property {
        Property {
            name: name.to_string(),
            type_info: TypeInfo::parse("Edm.String"),
            typ: Resolvable::Resolved(PropertyType::Primitive(EdmType::String)),
            facets: Facets::default(),
            sap: SapPropertyAttributes::default(),
            value_helper: None,
            unit: None,
        }
    }

    #[test]
    fn test_enum_literals() {
        let color = color();
        assert_eq!(
            color.to_literal(&Value::from("Blue")).unwrap(),
            "Cars.Color'Blue'"
        );
        assert_eq!(color.to_literal(&Value::Int32(0)).unwrap(), "Cars.Color'Red'");
        assert_eq!(
            color.from_literal("Cars.Color'Red'").unwrap(),
            Value::Enum(EnumValue::new("Cars.Color", "Red"))
        );
        assert!(color.from_literal("Cars.Color'Green'").is_err());
        assert!(color.from_literal("Cars.Color'Red,Blue'").is_err());
        assert_eq!(
            color.from_json(&Json::from(1)).unwrap(),
            Value::Enum(EnumValue::new("Cars.Color", "Blue"))
        );
    }

    #[test]
    fn test_flags_enum_accepts_member_lists() {
        let mut flags = color();
        flags.is_flags = true;
        let value = flags.from_json(&Json::from("Red,Blue")).unwrap();
        assert_eq!(flags.to_json(&value).unwrap(), Json::from("Red,Blue"));
    }

    #[test]
    fn test_inherit_prepends_base_members() {
        let mut base = StructType::new(QualifiedName::new("EPM", "Person"), StructKind::Entity);
        base.properties.push(property("ID"));
        base.key.push("ID".to_string());
        let mut derived = StructType::new(QualifiedName::new("EPM", "Employee"), StructKind::Entity);
        derived.properties.push(property("Salary"));

        derived.inherit(&base);

        let names: Vec<&str> = derived.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["ID", "Salary"]);
        assert_eq!(derived.key, ["ID"]);
        assert_eq!(derived.key_properties().len(), 1);
    }

    #[test]
    fn test_unknown_property_is_program_error() {
        let entity = StructType::new(QualifiedName::new("EPM", "Employee"), StructKind::Entity);
        assert_eq!(
            entity.property("Age").unwrap_err().to_string(),
            "Property Age is not declared in EPM.Employee entity type"
        );
        assert_eq!(
            entity.navigation_property("Manager").unwrap_err().to_string(),
            "Navigation property Manager is not declared in EPM.Employee entity type"
        );
    }

    #[test]
    fn test_stubbed_navigation_target() {
        let nav = NavigationProperty {
            name: "Manager".to_string(),
            source: NavigationSource::Association {
                relationship: QualifiedName::new("EPM", "Assoc"),
                from_role: "Employee".to_string(),
                to_role: "Manager".to_string(),
            },
            target: Resolvable::Unresolved(Stub::new(
                ElementKind::Association,
                QualifiedName::new("EPM", "Assoc"),
                "broken",
            )),
        };
        assert!(nav.target().is_err());
        assert!(nav.is_collection().is_err());
    }
}
