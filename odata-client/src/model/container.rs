//! Entity container elements: entity sets, associations and function imports

use super::{Multiplicity, PropertyType, QualifiedName, Resolvable, TypeInfo};
use crate::error::ModelError;
use crate::transport::Method;
use crate::types::Facets;

/// SAP Gateway capabilities of an entity set (`sap:*`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SapEntitySetAttributes {
    pub label: Option<String>,
    pub addressable: bool,
    pub creatable: bool,
    pub updatable: bool,
    pub deletable: bool,
    pub searchable: bool,
    pub countable: bool,
    pub pageable: bool,
    pub topable: bool,
    pub requires_filter: bool,
}

impl Default for SapEntitySetAttributes {
    fn default() -> Self {
        Self {
            label: None,
            addressable: true,
            creatable: true,
            updatable: true,
            deletable: true,
            searchable: false,
            countable: true,
            pageable: true,
            topable: true,
            requires_filter: false,
        }
    }
}

/// Maps a navigation path of an entity set to the entity set holding its targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationBinding {
    pub path: String,
    pub target: QualifiedName,
}

/// Entity set or (V4) singleton
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySet {
    pub name: QualifiedName,
    pub entity_type: QualifiedName,
    pub is_singleton: bool,
    pub bindings: Vec<NavigationBinding>,
    pub sap: SapEntitySetAttributes,
}

impl EntitySet {
    /// Target entity set of a navigation property, by path
    pub fn binding(&self, path: &str) -> Option<&NavigationBinding> {
        self.bindings.iter().find(|b| {
            b.path == path || b.path.rsplit('/').next() == Some(path)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationEnd {
    pub role: String,
    pub entity_type: QualifiedName,
    pub multiplicity: Multiplicity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleConstraint {
    pub role: String,
    pub properties: Vec<String>,
}

/// V2 referential constraint between association ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationConstraint {
    pub principal: RoleConstraint,
    pub dependent: RoleConstraint,
}

/// V2/V3 association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub name: QualifiedName,
    pub ends: Vec<AssociationEnd>,
    pub referential_constraint: Option<AssociationConstraint>,
}

impl Association {
    pub fn end(&self, role: &str) -> Option<&AssociationEnd> {
        self.ends.iter().find(|end| end.role == role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationSetEnd {
    pub role: String,
    pub entity_set: String,
}

/// V2/V3 association set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationSet {
    pub name: QualifiedName,
    pub association: QualifiedName,
    pub ends: Vec<AssociationSetEnd>,
}

impl AssociationSet {
    pub fn end(&self, role: &str) -> Option<&AssociationSetEnd> {
        self.ends.iter().find(|end| end.role == role)
    }
}

/// Parameter of a function import or operation
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionParameter {
    pub name: String,
    pub type_info: TypeInfo,
    pub typ: Resolvable<PropertyType>,
    pub facets: Facets,
    /// `In`, `Out` or `InOut` (V2)
    pub mode: Option<String>,
}

impl FunctionParameter {
    pub fn typ(&self) -> Result<&PropertyType, ModelError> {
        self.typ.get()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnType {
    pub type_info: TypeInfo,
    pub typ: Resolvable<PropertyType>,
}

impl ReturnType {
    pub fn typ(&self) -> Result<&PropertyType, ModelError> {
        self.typ.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Function,
    Action,
}

/// V4 `Function` or `Action` declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub name: QualifiedName,
    pub kind: OperationKind,
    pub is_bound: bool,
    pub parameters: Vec<FunctionParameter>,
    pub return_type: Option<ReturnType>,
}

/// Callable service operation: a V2 function import or a V4 function/action import
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionImport {
    pub name: QualifiedName,
    pub kind: OperationKind,
    pub http_method: Method,
    /// Entity set of the returned entities
    pub entity_set: Option<String>,
    /// V4 operation this import exposes
    pub operation: Option<QualifiedName>,
    pub parameters: Vec<FunctionParameter>,
    pub return_type: Option<ReturnType>,
}

impl FunctionImport {
    pub fn parameter(&self, name: &str) -> Option<&FunctionParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// V4 vocabulary term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub name: QualifiedName,
    pub type_info: TypeInfo,
    pub applies_to: Vec<String>,
}
