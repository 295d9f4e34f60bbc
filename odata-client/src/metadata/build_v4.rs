//! Build routines for V4 elements

use roxmltree::Node;

use super::build::{parse_facets, pending};
use super::build_v2::build_parameters;
use super::context::{
    attr, child, children, parse_bool, required_attr, sap_attr, Declaration, ParseContext,
};
use crate::config::ElementKind;
use crate::error::MetadataParsingError;
use crate::model::{
    EntitySet, FunctionImport, NavigationBinding, NavigationProperty, NavigationSource,
    Operation, OperationKind, QualifiedName, ReferentialConstraint, Resolvable, ReturnType,
    SapEntitySetAttributes, Term, TypeDefinition,
};
use crate::transport::Method;
use crate::types::EdmType;

pub fn build_type_definition(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    let kind = ElementKind::TypeDefinition;
    let name = required_attr(ctx, kind, node, "Name")?;
    let underlying_name = required_attr(ctx, kind, node, "UnderlyingType")?;
    let underlying = EdmType::from_name(underlying_name)
        .filter(|edm| ctx.capabilities().typ(*edm).is_some())
        .ok_or_else(|| {
            ctx.malformed(
                kind,
                format!("Type {underlying_name} is not supported in OData V4"),
            )
        })?;
    Ok(Declaration::TypeDefinition(TypeDefinition {
        name: ctx.name(name),
        underlying,
        facets: parse_facets(ctx, kind, node)?,
    }))
}

pub fn build_navigation_property(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    let kind = ElementKind::NavigationProperty;
    let name = required_attr(ctx, kind, node, "Name")?;
    let type_info = ctx.type_info(required_attr(ctx, kind, node, "Type")?);

    let mut referential_constraints = Vec::new();
    for constraint in children(node, "ReferentialConstraint") {
        match ctx.build(ElementKind::ReferentialConstraint, constraint)? {
            Resolvable::Resolved(Declaration::ReferentialConstraint(constraint)) => {
                referential_constraints.push(constraint)
            }
            Resolvable::Resolved(other) => {
                return Err(ctx.unexpected(ElementKind::ReferentialConstraint, &other));
            }
            Resolvable::Unresolved(_) => {}
        }
    }

    Ok(Declaration::NavigationProperty(NavigationProperty {
        name: name.to_string(),
        target: pending(kind, type_info.name.clone()),
        source: NavigationSource::Typed {
            type_info,
            nullable: attr(node, "Nullable").map(parse_bool).unwrap_or(true),
            partner: attr(node, "Partner").map(String::from),
            contains_target: attr(node, "ContainsTarget").map(parse_bool).unwrap_or(false),
            referential_constraints,
        },
    }))
}

pub fn build_referential_constraint(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    let kind = ElementKind::ReferentialConstraint;
    Ok(Declaration::ReferentialConstraint(ReferentialConstraint {
        property: required_attr(ctx, kind, node, "Property")?.to_string(),
        referenced_property: required_attr(ctx, kind, node, "ReferencedProperty")?.to_string(),
    }))
}

/// `Target` is `Set`, `Container/Set` or `Ns.Container/Set`; only the set name is kept
pub fn build_navigation_property_binding(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    let kind = ElementKind::NavigationPropertyBinding;
    let path = required_attr(ctx, kind, node, "Path")?;
    let target = required_attr(ctx, kind, node, "Target")?;
    let set_name = target.rsplit('/').next().unwrap_or(target);
    Ok(Declaration::NavigationPropertyBinding(NavigationBinding {
        path: path.to_string(),
        target: QualifiedName::local(set_name),
    }))
}

pub fn build_singleton(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    let kind = ElementKind::Singleton;
    let name = required_attr(ctx, kind, node, "Name")?;
    let entity_type = ctx.qualify(required_attr(ctx, kind, node, "Type")?);

    let mut bindings = Vec::new();
    for binding in children(node, "NavigationPropertyBinding") {
        match ctx.build(ElementKind::NavigationPropertyBinding, binding)? {
            Resolvable::Resolved(Declaration::NavigationPropertyBinding(binding)) => {
                bindings.push(binding)
            }
            Resolvable::Resolved(other) => {
                return Err(ctx.unexpected(ElementKind::NavigationPropertyBinding, &other));
            }
            Resolvable::Unresolved(_) => {}
        }
    }

    Ok(Declaration::EntitySet(EntitySet {
        name: ctx.name(name),
        entity_type,
        is_singleton: true,
        bindings,
        sap: SapEntitySetAttributes {
            label: sap_attr(node, "label").map(String::from),
            ..SapEntitySetAttributes::default()
        },
    }))
}

fn build_import(
    ctx: &ParseContext<'_>,
    node: Node<'_, '_>,
    kind: ElementKind,
    operation_kind: OperationKind,
) -> Result<Declaration, MetadataParsingError> {
    let (reference, http_method) = match operation_kind {
        OperationKind::Function => ("Function", Method::Get),
        OperationKind::Action => ("Action", Method::Post),
    };
    let name = required_attr(ctx, kind, node, "Name")?;
    let operation = ctx.qualify(required_attr(ctx, kind, node, reference)?);
    Ok(Declaration::FunctionImport(FunctionImport {
        name: ctx.name(name),
        kind: operation_kind,
        http_method,
        entity_set: attr(node, "EntitySet").map(|set| {
            set.rsplit('/').next().unwrap_or(set).to_string()
        }),
        operation: Some(operation),
        parameters: Vec::new(),
        return_type: None,
    }))
}

pub fn build_function_import(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    build_import(ctx, node, ElementKind::FunctionImport, OperationKind::Function)
}

pub fn build_action_import(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    build_import(ctx, node, ElementKind::ActionImport, OperationKind::Action)
}

fn build_operation(
    ctx: &ParseContext<'_>,
    node: Node<'_, '_>,
    kind: ElementKind,
    operation_kind: OperationKind,
) -> Result<Declaration, MetadataParsingError> {
    let name = required_attr(ctx, kind, node, "Name")?;
    let return_type = match child(node, "ReturnType") {
        Some(return_node) => {
            let type_info = ctx.type_info(required_attr(ctx, kind, return_node, "Type")?);
            Some(ReturnType {
                typ: pending(kind, type_info.name.clone()),
                type_info,
            })
        }
        None => None,
    };
    if operation_kind == OperationKind::Function && return_type.is_none() {
        return Err(ctx.malformed(kind, format!("Function {name} has no return type")));
    }
    Ok(Declaration::Operation(Operation {
        name: ctx.name(name),
        kind: operation_kind,
        is_bound: attr(node, "IsBound").map(parse_bool).unwrap_or(false),
        parameters: build_parameters(ctx, kind, node)?,
        return_type,
    }))
}

pub fn build_function(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    build_operation(ctx, node, ElementKind::Function, OperationKind::Function)
}

pub fn build_action(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    build_operation(ctx, node, ElementKind::Action, OperationKind::Action)
}

pub fn build_term(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    let kind = ElementKind::Term;
    let name = required_attr(ctx, kind, node, "Name")?;
    Ok(Declaration::Term(Term {
        name: ctx.name(name),
        type_info: ctx.type_info(required_attr(ctx, kind, node, "Type")?),
        applies_to: attr(node, "AppliesTo")
            .map(|targets| targets.split_whitespace().map(String::from).collect())
            .unwrap_or_default(),
    }))
}
