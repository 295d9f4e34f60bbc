//! Build routines for V2/V3 elements: associations, association sets and
//! function imports

use roxmltree::Node;

use super::build::{parse_facets, pending};
use super::context::{
    attr, children, metadata_attr, required_attr, Declaration, ParseContext,
};
use crate::config::ElementKind;
use crate::error::MetadataParsingError;
use crate::model::{
    Association, AssociationConstraint, AssociationEnd, AssociationSet, AssociationSetEnd,
    FunctionImport, FunctionParameter, Multiplicity, NavigationProperty, NavigationSource,
    OperationKind, Resolvable, ReturnType, RoleConstraint,
};
use crate::transport::Method;

pub fn build_navigation_property(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    let kind = ElementKind::NavigationProperty;
    let name = required_attr(ctx, kind, node, "Name")?;
    let relationship = ctx.qualify(required_attr(ctx, kind, node, "Relationship")?);
    let from_role = required_attr(ctx, kind, node, "FromRole")?;
    let to_role = required_attr(ctx, kind, node, "ToRole")?;

    Ok(Declaration::NavigationProperty(NavigationProperty {
        name: name.to_string(),
        target: pending(kind, relationship.clone()),
        source: NavigationSource::Association {
            relationship,
            from_role: from_role.to_string(),
            to_role: to_role.to_string(),
        },
    }))
}

fn role_constraint(
    ctx: &ParseContext<'_>,
    node: Node<'_, '_>,
    side: &'static str,
) -> Result<RoleConstraint, MetadataParsingError> {
    let kind = ElementKind::ReferentialConstraint;
    let mut nodes = children(node, side);
    let (Some(role_node), None) = (nodes.next(), nodes.next()) else {
        return Err(ctx.malformed(
            kind,
            format!(
                "Referential constraint must contain exactly one {} element",
                side.to_lowercase()
            ),
        ));
    };
    let role = attr(role_node, "Role").ok_or_else(|| {
        ctx.malformed(kind, format!("{side} role name was not specified"))
    })?;
    let properties = children(role_node, "PropertyRef")
        .filter_map(|property_ref| attr(property_ref, "Name"))
        .map(String::from)
        .collect();
    Ok(RoleConstraint {
        role: role.to_string(),
        properties,
    })
}

pub fn build_referential_constraint(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    let kind = ElementKind::ReferentialConstraint;
    let principal = role_constraint(ctx, node, "Principal")?;
    if principal.properties.is_empty() {
        return Err(ctx.malformed(
            kind,
            format!(
                "In role {} should be at least one principal property defined",
                principal.role
            ),
        ));
    }
    let dependent = role_constraint(ctx, node, "Dependent")?;
    if principal.properties.len() != dependent.properties.len() {
        return Err(ctx.malformed(
            kind,
            format!(
                "Number of properties should be equal for the principal {} and the dependent {}",
                principal.role, dependent.role
            ),
        ));
    }
    Ok(Declaration::AssociationConstraint(AssociationConstraint {
        principal,
        dependent,
    }))
}

pub fn build_association(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    let kind = ElementKind::Association;
    let name = required_attr(ctx, kind, node, "Name")?;

    let mut ends = Vec::new();
    for end in children(node, "End") {
        let entity_type = attr(end, "Type").ok_or_else(|| {
            ctx.malformed(
                kind,
                format!("End type is not specified in the association {name}"),
            )
        })?;
        let multiplicity_text = required_attr(ctx, kind, end, "Multiplicity")?;
        let multiplicity = Multiplicity::parse(multiplicity_text).ok_or_else(|| {
            ctx.malformed(kind, format!("Unknown multiplicity {multiplicity_text}"))
        })?;
        ends.push(AssociationEnd {
            role: required_attr(ctx, kind, end, "Role")?.to_string(),
            entity_type: ctx.qualify(entity_type),
            multiplicity,
        });
    }
    if ends.len() != 2 {
        return Err(ctx.malformed(
            kind,
            format!("Association {name} does not have two end roles"),
        ));
    }

    let constraints: Vec<Node<'_, '_>> = children(node, "ReferentialConstraint").collect();
    if constraints.len() > 1 {
        return Err(ctx.malformed(
            kind,
            format!("In association {name} is defined more than one referential constraint"),
        ));
    }
    let referential_constraint = match constraints.first() {
        Some(constraint) => match ctx.build(ElementKind::ReferentialConstraint, *constraint)? {
            Resolvable::Resolved(Declaration::AssociationConstraint(constraint)) => Some(constraint),
            Resolvable::Resolved(other) => {
                return Err(ctx.unexpected(ElementKind::ReferentialConstraint, &other));
            }
            Resolvable::Unresolved(_) => None,
        },
        None => None,
    };

    Ok(Declaration::Association(Association {
        name: ctx.name(name),
        ends,
        referential_constraint,
    }))
}

pub fn build_association_set(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    let kind = ElementKind::AssociationSet;
    let name = required_attr(ctx, kind, node, "Name")?;
    let association = ctx.qualify(required_attr(ctx, kind, node, "Association")?);

    let mut ends = Vec::new();
    for end in children(node, "End") {
        ends.push(AssociationSetEnd {
            role: required_attr(ctx, kind, end, "Role")?.to_string(),
            entity_set: required_attr(ctx, kind, end, "EntitySet")?.to_string(),
        });
    }
    if ends.len() > 2 {
        return Err(ctx.malformed(
            kind,
            format!("Association {name} cannot have more than 2 end roles"),
        ));
    }

    Ok(Declaration::AssociationSet(AssociationSet {
        name: ctx.name(name),
        association,
        ends,
    }))
}

/// `Parameter` children of a function import or operation
pub(crate) fn build_parameters(
    ctx: &ParseContext<'_>,
    kind: ElementKind,
    node: Node<'_, '_>,
) -> Result<Vec<FunctionParameter>, MetadataParsingError> {
    let mut parameters: Vec<FunctionParameter> = Vec::new();
    for parameter in children(node, "Parameter") {
        let name = required_attr(ctx, kind, parameter, "Name")?;
        if parameters.iter().any(|p| p.name == name) {
            return Err(ctx.malformed(kind, format!("Parameter {name} is declared twice")));
        }
        let type_info = ctx.type_info(required_attr(ctx, kind, parameter, "Type")?);
        parameters.push(FunctionParameter {
            name: name.to_string(),
            typ: pending(kind, type_info.name.clone()),
            type_info,
            facets: parse_facets(ctx, kind, parameter)?,
            mode: attr(parameter, "Mode").map(String::from),
        });
    }
    Ok(parameters)
}

pub fn build_function_import(
    ctx: &mut ParseContext<'_>,
    node: Node<'_, '_>,
) -> Result<Declaration, MetadataParsingError> {
    let kind = ElementKind::FunctionImport;
    let name = required_attr(ctx, kind, node, "Name")?;
    let http_method = match metadata_attr(node, "HttpMethod") {
        Some(text) => Method::from_name(text)
            .ok_or_else(|| ctx.malformed(kind, format!("Unknown HTTP method {text}")))?,
        None => Method::Get,
    };
    let return_type = attr(node, "ReturnType").map(|text| {
        let type_info = ctx.type_info(text);
        ReturnType {
            typ: pending(kind, type_info.name.clone()),
            type_info,
        }
    });

    Ok(Declaration::FunctionImport(FunctionImport {
        name: ctx.name(name),
        kind: OperationKind::Function,
        http_method,
        entity_set: attr(node, "EntitySet").map(String::from),
        operation: None,
        parameters: build_parameters(ctx, kind, node)?,
        return_type,
    }))
}
