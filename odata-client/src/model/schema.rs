//! The resolved, immutable schema graph

use std::collections::BTreeMap;

use super::{
    Association, AssociationSet, ComplexType, EntitySet, EntityType, EnumType, FunctionImport,
    Operation, QualifiedName, Resolvable, Term, TypeDefinition,
};
use crate::config::ElementKind;
use crate::error::{Error, ProgramError, Result};
use crate::version::ODataVersion;

/// A fault downgraded by the `Warning` policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: ElementKind,
    pub location: String,
    pub message: String,
}

pub(crate) type Elements<T> = BTreeMap<QualifiedName, Resolvable<T>>;

/// All schemas of one metadata document, merged and cross-reference resolved.
///
/// Built once by [`crate::metadata::parse`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub(crate) version: ODataVersion,
    pub(crate) namespaces: Vec<String>,
    /// Alias to namespace
    pub(crate) aliases: BTreeMap<String, String>,
    pub(crate) entity_types: Elements<EntityType>,
    pub(crate) complex_types: Elements<ComplexType>,
    pub(crate) enum_types: Elements<EnumType>,
    pub(crate) type_definitions: Elements<TypeDefinition>,
    pub(crate) associations: Elements<Association>,
    pub(crate) association_sets: Elements<AssociationSet>,
    pub(crate) entity_sets: Elements<EntitySet>,
    pub(crate) function_imports: Elements<FunctionImport>,
    pub(crate) operations: Elements<Operation>,
    pub(crate) terms: Elements<Term>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

/// Find an element by possibly unqualified name
pub(crate) fn find<'a, T>(
    elements: &'a Elements<T>,
    name: &QualifiedName,
) -> Option<&'a Resolvable<T>> {
    if let Some(found) = elements.get(name) {
        return Some(found);
    }
    elements
        .iter()
        .find(|(declared, _)| name.matches(declared))
        .map(|(_, element)| element)
}

/// Key under which `name` is stored, if any element matches it
pub(crate) fn find_key<T>(elements: &Elements<T>, name: &QualifiedName) -> Option<QualifiedName> {
    if elements.contains_key(name) {
        return Some(name.clone());
    }
    elements
        .keys()
        .find(|declared| name.matches(declared))
        .cloned()
}

impl Schema {
    pub fn version(&self) -> ODataVersion {
        self.version
    }

    /// Namespaces of all schemas in the document, in document order
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// Faults downgraded by the `Warning` policy
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Replace a leading alias with the namespace it stands for
    pub(crate) fn qualify(&self, name: &str) -> QualifiedName {
        let mut qualified = QualifiedName::parse(name);
        if let Some(namespace) = qualified
            .namespace
            .as_ref()
            .and_then(|ns| self.aliases.get(ns))
        {
            qualified.namespace = Some(namespace.clone());
        }
        qualified
    }

    pub fn entity_type(&self, name: &str) -> Result<&EntityType> {
        let found = find(&self.entity_types, &self.qualify(name))
            .ok_or_else(|| ProgramError::UnknownType(name.to_string()))?;
        Ok(found.get()?)
    }

    pub fn complex_type(&self, name: &str) -> Result<&ComplexType> {
        let found = find(&self.complex_types, &self.qualify(name))
            .ok_or_else(|| ProgramError::UnknownType(name.to_string()))?;
        Ok(found.get()?)
    }

    pub fn enum_type(&self, name: &str) -> Result<&EnumType> {
        let found = find(&self.enum_types, &self.qualify(name))
            .ok_or_else(|| ProgramError::UnknownType(name.to_string()))?;
        Ok(found.get()?)
    }

    pub fn type_definition(&self, name: &str) -> Result<&TypeDefinition> {
        let found = find(&self.type_definitions, &self.qualify(name))
            .ok_or_else(|| ProgramError::UnknownType(name.to_string()))?;
        Ok(found.get()?)
    }

    pub fn association(&self, name: &str) -> Result<&Association> {
        let found = find(&self.associations, &self.qualify(name))
            .ok_or_else(|| ProgramError::UnknownType(name.to_string()))?;
        Ok(found.get()?)
    }

    pub fn association_set(&self, name: &str) -> Result<&AssociationSet> {
        let found = find(&self.association_sets, &self.qualify(name))
            .ok_or_else(|| ProgramError::UnknownType(name.to_string()))?;
        Ok(found.get()?)
    }

    pub fn entity_set(&self, name: &str) -> Result<&EntitySet> {
        let found = find(&self.entity_sets, &self.qualify(name))
            .ok_or_else(|| ProgramError::UnknownEntitySet(name.to_string()))?;
        Ok(found.get()?)
    }

    pub fn function_import(&self, name: &str) -> Result<&FunctionImport> {
        let found = find(&self.function_imports, &self.qualify(name))
            .ok_or_else(|| ProgramError::UnknownFunction(name.to_string()))?;
        Ok(found.get()?)
    }

    pub fn term(&self, name: &str) -> Result<&Term> {
        let found = find(&self.terms, &self.qualify(name))
            .ok_or_else(|| ProgramError::UnknownType(name.to_string()))?;
        Ok(found.get()?)
    }

    /// Entity type backing an entity set
    pub fn entity_type_of(&self, entity_set: &EntitySet) -> Result<&EntityType> {
        let found = find(&self.entity_types, &entity_set.entity_type).ok_or_else(|| {
            Error::from(ProgramError::UnknownType(entity_set.entity_type.to_string()))
        })?;
        Ok(found.get()?)
    }

    pub(crate) fn entity_set_by_name(&self, name: &QualifiedName) -> Option<&Resolvable<EntitySet>> {
        find(&self.entity_sets, name)
    }

    pub(crate) fn entity_type_by_name(
        &self,
        name: &QualifiedName,
    ) -> Option<&Resolvable<EntityType>> {
        find(&self.entity_types, name)
    }

    pub(crate) fn complex_type_by_name(
        &self,
        name: &QualifiedName,
    ) -> Option<&Resolvable<ComplexType>> {
        find(&self.complex_types, name)
    }

    pub(crate) fn enum_type_by_name(&self, name: &QualifiedName) -> Option<&Resolvable<EnumType>> {
        find(&self.enum_types, name)
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &Resolvable<EntityType>> {
        self.entity_types.values()
    }

    pub fn complex_types(&self) -> impl Iterator<Item = &Resolvable<ComplexType>> {
        self.complex_types.values()
    }

    pub fn enum_types(&self) -> impl Iterator<Item = &Resolvable<EnumType>> {
        self.enum_types.values()
    }

    pub fn type_definitions(&self) -> impl Iterator<Item = &Resolvable<TypeDefinition>> {
        self.type_definitions.values()
    }

    pub fn associations(&self) -> impl Iterator<Item = &Resolvable<Association>> {
        self.associations.values()
    }

    pub fn association_sets(&self) -> impl Iterator<Item = &Resolvable<AssociationSet>> {
        self.association_sets.values()
    }

    pub fn entity_sets(&self) -> impl Iterator<Item = &Resolvable<EntitySet>> {
        self.entity_sets.values()
    }

    pub fn function_imports(&self) -> impl Iterator<Item = &Resolvable<FunctionImport>> {
        self.function_imports.values()
    }

    pub fn operations(&self) -> impl Iterator<Item = &Resolvable<Operation>> {
        self.operations.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SapEntitySetAttributes, Stub, StructKind, StructType};

    fn schema() -> Schema {
        let mut schema = Schema::default();
        let employee = QualifiedName::new("EPM", "Employee");
        schema.entity_types.insert(
            employee.clone(),
            Resolvable::Resolved(StructType::new(employee.clone(), StructKind::Entity)),
        );
        let broken = QualifiedName::new("EPM", "Broken");
        schema.entity_types.insert(
            broken.clone(),
            Resolvable::Unresolved(Stub::new(ElementKind::EntityType, broken, "bad key")),
        );
        schema.entity_sets.insert(
            QualifiedName::new("EPM", "Employees"),
            Resolvable::Resolved(EntitySet {
                name: QualifiedName::new("EPM", "Employees"),
                entity_type: employee,
                is_singleton: false,
                bindings: Vec::new(),
                sap: SapEntitySetAttributes::default(),
            }),
        );
        schema.aliases.insert("E".to_string(), "EPM".to_string());
        schema
    }

    #[test]
    fn test_lookup_by_qualified_local_and_alias() {
        let schema = schema();
        assert!(schema.entity_type("EPM.Employee").is_ok());
        assert!(schema.entity_type("Employee").is_ok());
        assert!(schema.entity_type("E.Employee").is_ok());
        assert!(schema.entity_set("Employees").is_ok());
    }

    #[test]
    fn test_missing_is_program_error_and_stub_is_model_error() {
        let schema = schema();
        assert!(matches!(
            schema.entity_set("Customers"),
            Err(Error::Program(ProgramError::UnknownEntitySet(_)))
        ));
        assert!(matches!(
            schema.entity_type("EPM.Broken"),
            Err(Error::Model(_))
        ));
    }
}
