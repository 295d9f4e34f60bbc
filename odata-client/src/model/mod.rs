//! Schema model
//!
//! The in-memory graph built from a metadata document. Elements reference each
//! other by qualified name; elements that failed to parse under a non-fatal
//! policy are kept as [`Stub`]s and fault when read.

pub mod container;
pub mod elements;
pub mod names;
pub mod resolvable;
pub mod schema;

pub use container::{
    Association, AssociationConstraint, AssociationEnd, AssociationSet, AssociationSetEnd,
    EntitySet, FunctionImport, FunctionParameter, NavigationBinding, Operation, OperationKind,
    ReturnType, RoleConstraint, SapEntitySetAttributes, Term,
};
pub use elements::{
    ComplexType, EntityType, EnumMember, EnumType, Multiplicity, NavTarget, NavigationProperty,
    NavigationSource, Property, PropertyType, ReferentialConstraint, SapPropertyAttributes,
    StructKind, StructType, TypeDefinition, Unit, ValueHelper, ValueHelperDirection,
    ValueHelperParameter,
};
pub use names::{QualifiedName, TypeInfo};
pub use resolvable::{Resolvable, Stub};
pub use schema::{Diagnostic, Schema};
