//! Pass 2: resolve cross-references between declared elements

use std::collections::{BTreeMap, BTreeSet};

use super::build::is_pending;
use super::context::{AnnotationDecl, ParseContext};
use crate::config::ElementKind;
use crate::error::MetadataParsingError;
use crate::model::schema::{find, find_key, Elements};
use crate::model::{
    Association, AssociationSet, Multiplicity, NavTarget, NavigationBinding, NavigationSource,
    OperationKind, PropertyType, QualifiedName, Resolvable, Schema, StructType, Stub, TypeInfo,
};
use crate::types::EdmType;
use crate::version::Capabilities;

pub(super) fn resolve(
    ctx: &mut ParseContext<'_>,
    schema: &mut Schema,
) -> Result<(), MetadataParsingError> {
    let index = TypeIndex::new(schema);
    resolve_associations(ctx, schema)?;
    resolve_properties(ctx, &index, &mut schema.entity_types)?;
    resolve_properties(ctx, &index, &mut schema.complex_types)?;
    attach_annotations(ctx, schema)?;
    resolve_navigations(ctx, &index, &mut schema.entity_types, &schema.associations)?;
    resolve_navigations(ctx, &index, &mut schema.complex_types, &schema.associations)?;
    flatten_base_types(ctx, &mut schema.entity_types)?;
    flatten_base_types(ctx, &mut schema.complex_types)?;
    check_keys(ctx, schema)?;
    resolve_entity_sets(ctx, &index, schema)?;
    resolve_association_sets(ctx, schema)?;
    resolve_operations(ctx, &index, schema)?;
    resolve_function_imports(ctx, &index, schema)
}

/// What a declared type name stands for
#[derive(Debug, Clone)]
enum Declared {
    Entity,
    Complex,
    Enum,
    Definition(EdmType),
    /// A type definition that failed to build; nothing is known of its underlying type
    Broken(Stub),
}

/// Snapshot of declared type names, taken before anything is mutated
struct TypeIndex {
    types: BTreeMap<QualifiedName, Declared>,
    /// Navigation property names per entity type, base types included
    navigations: BTreeMap<QualifiedName, Vec<String>>,
}

impl TypeIndex {
    fn new(schema: &Schema) -> Self {
        let mut types = BTreeMap::new();
        for name in schema.entity_types.keys() {
            types.insert(name.clone(), Declared::Entity);
        }
        for name in schema.complex_types.keys() {
            types.insert(name.clone(), Declared::Complex);
        }
        for name in schema.enum_types.keys() {
            types.insert(name.clone(), Declared::Enum);
        }
        for (name, definition) in &schema.type_definitions {
            let declared = match definition {
                Resolvable::Resolved(definition) => Declared::Definition(definition.underlying),
                Resolvable::Unresolved(stub) => Declared::Broken(stub.clone()),
            };
            types.insert(name.clone(), declared);
        }

        let navigations = schema
            .entity_types
            .keys()
            .filter(|name| schema.entity_types.get(*name).is_some_and(Resolvable::is_resolved))
            .map(|name| {
                let names = lineage(&schema.entity_types, name)
                    .into_iter()
                    .flat_map(|stype| stype.navigation_properties.iter().map(|n| n.name.clone()))
                    .collect();
                (name.clone(), names)
            })
            .collect();

        Self { types, navigations }
    }

    fn lookup(&self, name: &QualifiedName) -> Option<(&QualifiedName, &Declared)> {
        self.types
            .get_key_value(name)
            .or_else(|| self.types.iter().find(|(declared, _)| name.matches(declared)))
    }
}

/// A type and its base types, nearest first; stops at stubs and cycles
fn lineage<'a>(types: &'a Elements<StructType>, name: &QualifiedName) -> Vec<&'a StructType> {
    let mut chain: Vec<&StructType> = Vec::new();
    let mut next = Some(name.clone());
    while let Some(current) = next.take() {
        let Some(Resolvable::Resolved(stype)) = find(types, &current) else {
            break;
        };
        if chain.iter().any(|seen| seen.name == stype.name) {
            break;
        }
        next = stype.base_type.clone();
        chain.push(stype);
    }
    chain
}

/// Why a reference did not resolve
enum Unresolved {
    /// The reference is wrong: a fault of the referencing element
    Missing(String),
    /// The referenced element is itself a stub: inherit it silently
    Broken(Stub),
}

/// Turn a resolution failure into a stub, applying the policy of `kind` when
/// the fault is new
fn settle<T>(
    ctx: &mut ParseContext<'_>,
    kind: ElementKind,
    name: QualifiedName,
    location: String,
    unresolved: Unresolved,
) -> Result<Resolvable<T>, MetadataParsingError> {
    match unresolved {
        Unresolved::Broken(stub) => Ok(Resolvable::Unresolved(stub)),
        Unresolved::Missing(message) => {
            let error = MetadataParsingError::unresolved(kind, location, message);
            Ok(Resolvable::Unresolved(ctx.fault(kind, name, error)?))
        }
    }
}

/// `Ns/Path` location of something inside the schema of `owner`
fn at(owner: &QualifiedName, path: impl AsRef<str>) -> String {
    format!(
        "{}/{}",
        owner.namespace.as_deref().unwrap_or_default(),
        path.as_ref()
    )
}

/// Stub name of a member, e.g. `EPM.Employee/Age`
fn member_name(owner: &QualifiedName, member: &str) -> QualifiedName {
    QualifiedName {
        namespace: owner.namespace.clone(),
        name: format!("{}/{}", owner.name, member),
    }
}

fn struct_kind(stype: &StructType) -> ElementKind {
    if stype.is_entity() {
        ElementKind::EntityType
    } else {
        ElementKind::ComplexType
    }
}

fn resolve_type(
    caps: &Capabilities,
    index: &TypeIndex,
    info: &TypeInfo,
    allow_entity: bool,
) -> Result<PropertyType, Unresolved> {
    let single = if info.is_primitive() {
        caps.typ_by_name(&info.name.to_string())
            .map(|typ| PropertyType::Primitive(typ.edm()))
            .ok_or_else(|| {
                Unresolved::Missing(format!(
                    "Type {} is not supported in OData {}",
                    info.name, caps.version
                ))
            })?
    } else {
        match index.lookup(&info.name) {
            Some((name, Declared::Entity)) if allow_entity => PropertyType::Entity(name.clone()),
            Some((name, Declared::Entity)) => {
                return Err(Unresolved::Missing(format!(
                    "Entity type {name} cannot be the type of a property"
                )));
            }
            Some((name, Declared::Complex)) => PropertyType::Complex(name.clone()),
            Some((name, Declared::Enum)) => PropertyType::Enum(name.clone()),
            Some((name, Declared::Definition(underlying))) => PropertyType::Definition {
                name: name.clone(),
                underlying: *underlying,
            },
            Some((_, Declared::Broken(stub))) => return Err(Unresolved::Broken(stub.clone())),
            None => {
                return Err(Unresolved::Missing(format!(
                    "Type {} does not exist",
                    info.name
                )));
            }
        }
    };
    Ok(if info.is_collection {
        PropertyType::Collection(Box::new(single))
    } else {
        single
    })
}

fn resolve_associations(
    ctx: &mut ParseContext<'_>,
    schema: &mut Schema,
) -> Result<(), MetadataParsingError> {
    let kind = ElementKind::Association;
    for slot in schema.associations.values_mut() {
        let Resolvable::Resolved(association) = slot else {
            continue;
        };
        let name = association.name.clone();
        if let Err(message) = check_association(association, &schema.entity_types) {
            let error = MetadataParsingError::unresolved(
                kind,
                at(&name, format!("{kind}({})", name.name)),
                message,
            );
            *slot = Resolvable::Unresolved(ctx.fault(kind, name, error)?);
        }
    }
    Ok(())
}

fn check_association(
    association: &mut Association,
    entity_types: &Elements<StructType>,
) -> Result<(), String> {
    for end in &mut association.ends {
        end.entity_type = find_key(entity_types, &end.entity_type).ok_or_else(|| {
            format!(
                "EntityType {} does not exist in Schema Namespace {}",
                end.entity_type.name,
                end.entity_type.namespace.as_deref().unwrap_or_default()
            )
        })?;
    }
    let Some(constraint) = &association.referential_constraint else {
        return Ok(());
    };
    for role in [&constraint.principal, &constraint.dependent] {
        let end = association.end(&role.role).ok_or_else(|| {
            format!(
                "Role {} was not defined in association {}",
                role.role, association.name.name
            )
        })?;
        let chain = lineage(entity_types, &end.entity_type);
        if chain.is_empty() {
            continue;
        }
        if let Some(missing) = role
            .properties
            .iter()
            .find(|property| !chain.iter().any(|t| t.find_property(property).is_some()))
        {
            return Err(format!(
                "Property {missing} of role {} does not exist in {}",
                role.role, end.entity_type
            ));
        }
    }
    Ok(())
}

fn resolve_properties(
    ctx: &mut ParseContext<'_>,
    index: &TypeIndex,
    types: &mut Elements<StructType>,
) -> Result<(), MetadataParsingError> {
    let caps = ctx.capabilities();
    for stype in types.values_mut().filter_map(Resolvable::resolved_mut) {
        let owner = stype.name.clone();
        let kind = struct_kind(stype);
        for property in &mut stype.properties {
            if !is_pending(&property.typ) {
                continue;
            }
            property.typ = match resolve_type(caps, index, &property.type_info, false) {
                Ok(typ) => Resolvable::Resolved(typ),
                Err(unresolved) => settle(
                    ctx,
                    ElementKind::Property,
                    member_name(&owner, &property.name),
                    at(&owner, format!("{kind}({})/Property({})", owner.name, property.name)),
                    unresolved,
                )?,
            };
        }
    }
    Ok(())
}

fn attach_annotations(
    ctx: &mut ParseContext<'_>,
    schema: &mut Schema,
) -> Result<(), MetadataParsingError> {
    for annotation in ctx.take_annotations() {
        let target = annotation.target().to_string();
        if let Err(message) = attach(schema, annotation) {
            ctx.report(MetadataParsingError::unresolved(
                ElementKind::Annotation,
                format!("Annotations({target})"),
                message,
            ))?;
        }
    }
    Ok(())
}

fn attach(schema: &mut Schema, annotation: AnnotationDecl) -> Result<(), String> {
    let target = annotation.target().to_string();
    let Some((type_path, property_name)) = target.split_once('/') else {
        return Err(format!("Target {target} is not a property"));
    };
    let type_name = schema.qualify(type_path);

    if let AnnotationDecl::ValueList(helper) = &annotation {
        if let Some(path) = &helper.collection_path {
            if find(&schema.entity_sets, &QualifiedName::local(path.as_str())).is_none() {
                return Err(format!(
                    "Entity Set {path} for ValueList of {target} does not exist"
                ));
            }
        }
    }

    let owner = match find_key(&schema.entity_types, &type_name) {
        Some(key) => schema.entity_types.get_mut(&key),
        None => find_key(&schema.complex_types, &type_name)
            .and_then(|key| schema.complex_types.get_mut(&key)),
    };
    let stype = owner
        .ok_or_else(|| format!("Target Type {type_name} of {target} does not exist"))?
        .get_mut()
        .map_err(|fault| fault.to_string())?;
    let property = stype.find_property_mut(property_name).ok_or_else(|| {
        format!("Target Property {property_name} of {type_name} as defined in {target} does not exist")
    })?;

    match annotation {
        AnnotationDecl::ValueList(helper) => property.value_helper = Some(helper),
        AnnotationDecl::Unit { unit, .. } => property.unit = Some(unit),
    }
    Ok(())
}

fn resolve_navigations(
    ctx: &mut ParseContext<'_>,
    index: &TypeIndex,
    types: &mut Elements<StructType>,
    associations: &Elements<Association>,
) -> Result<(), MetadataParsingError> {
    for stype in types.values_mut().filter_map(Resolvable::resolved_mut) {
        let owner = stype.name.clone();
        let kind = struct_kind(stype);
        for navigation in &mut stype.navigation_properties {
            if !is_pending(&navigation.target) {
                continue;
            }
            let outcome = match &navigation.source {
                NavigationSource::Association {
                    relationship,
                    from_role,
                    to_role,
                } => association_target(associations, relationship, from_role, to_role),
                NavigationSource::Typed {
                    type_info,
                    nullable,
                    partner,
                    ..
                } => typed_target(index, type_info, *nullable, partner.as_deref()),
            };
            navigation.target = match outcome {
                Ok(target) => Resolvable::Resolved(target),
                Err(unresolved) => settle(
                    ctx,
                    ElementKind::NavigationProperty,
                    member_name(&owner, &navigation.name),
                    at(
                        &owner,
                        format!("{kind}({})/NavigationProperty({})", owner.name, navigation.name),
                    ),
                    unresolved,
                )?,
            };
        }
    }
    Ok(())
}

fn association_target(
    associations: &Elements<Association>,
    relationship: &QualifiedName,
    from_role: &str,
    to_role: &str,
) -> Result<NavTarget, Unresolved> {
    match find(associations, relationship) {
        None => Err(Unresolved::Missing(format!(
            "Association {relationship} does not exist"
        ))),
        Some(Resolvable::Unresolved(stub)) => Err(Unresolved::Broken(stub.clone())),
        Some(Resolvable::Resolved(association)) => {
            let role_missing = |role: &str| {
                Unresolved::Missing(format!(
                    "Role {role} is not defined in association {}",
                    association.name
                ))
            };
            association.end(from_role).ok_or_else(|| role_missing(from_role))?;
            let end = association.end(to_role).ok_or_else(|| role_missing(to_role))?;
            Ok(NavTarget {
                entity_type: end.entity_type.clone(),
                multiplicity: end.multiplicity,
            })
        }
    }
}

fn typed_target(
    index: &TypeIndex,
    type_info: &TypeInfo,
    nullable: bool,
    partner: Option<&str>,
) -> Result<NavTarget, Unresolved> {
    match index.lookup(&type_info.name) {
        Some((name, Declared::Entity)) => {
            if let (Some(partner), Some(navigations)) = (partner, index.navigations.get(name)) {
                if !navigations.iter().any(|n| n == partner) {
                    return Err(Unresolved::Missing(format!(
                        "Partner {partner} is not a navigation property of {name}"
                    )));
                }
            }
            let multiplicity = if type_info.is_collection {
                Multiplicity::Many
            } else if nullable {
                Multiplicity::ZeroOrOne
            } else {
                Multiplicity::One
            };
            Ok(NavTarget {
                entity_type: name.clone(),
                multiplicity,
            })
        }
        Some((name, _)) => Err(Unresolved::Missing(format!(
            "Navigation target {name} is not an entity type"
        ))),
        None => Err(Unresolved::Missing(format!(
            "Entity type {} does not exist",
            type_info.name
        ))),
    }
}

fn flatten_base_types(
    ctx: &mut ParseContext<'_>,
    types: &mut Elements<StructType>,
) -> Result<(), MetadataParsingError> {
    let names: Vec<QualifiedName> = types.keys().cloned().collect();
    let mut done = BTreeSet::new();
    for name in names {
        flatten(ctx, types, &name, &mut done, &mut Vec::new())?;
    }
    Ok(())
}

enum Base {
    Inherit(QualifiedName, StructType),
    Fault(String),
    Cascade(Stub),
}

/// Copy base members into `name`, flattening the base first; `stack` holds
/// the types being flattened to detect cycles
fn flatten(
    ctx: &mut ParseContext<'_>,
    types: &mut Elements<StructType>,
    name: &QualifiedName,
    done: &mut BTreeSet<QualifiedName>,
    stack: &mut Vec<QualifiedName>,
) -> Result<(), MetadataParsingError> {
    if done.contains(name) {
        return Ok(());
    }
    let (base_name, kind) = match types.get(name) {
        Some(Resolvable::Resolved(stype)) => match &stype.base_type {
            Some(base_name) => (base_name.clone(), struct_kind(stype)),
            None => {
                done.insert(name.clone());
                return Ok(());
            }
        },
        _ => {
            done.insert(name.clone());
            return Ok(());
        }
    };

    stack.push(name.clone());
    let base = match find_key(types, &base_name) {
        None => Base::Fault(format!("Base type {base_name} of {name} does not exist")),
        Some(key) if stack.contains(&key) => {
            Base::Fault(format!("Base type {base_name} of {name} forms an inheritance cycle"))
        }
        Some(key) => {
            flatten(ctx, types, &key, done, stack)?;
            match types.get(&key) {
                Some(Resolvable::Resolved(base)) => Base::Inherit(key.clone(), base.clone()),
                Some(Resolvable::Unresolved(stub)) => Base::Cascade(stub.clone()),
                None => Base::Fault(format!("Base type {base_name} of {name} does not exist")),
            }
        }
    };
    stack.pop();

    match base {
        Base::Inherit(key, base) => {
            if let Some(Resolvable::Resolved(stype)) = types.get_mut(name) {
                stype.base_type = Some(key);
                stype.inherit(&base);
            }
        }
        Base::Fault(message) => {
            let error = MetadataParsingError::unresolved(
                kind,
                at(name, format!("{kind}({})", name.name)),
                message,
            );
            let stub = ctx.fault(kind, name.clone(), error)?;
            types.insert(name.clone(), Resolvable::Unresolved(stub));
        }
        Base::Cascade(stub) => {
            let reason = format!("base type {} is unresolved: {}", stub.name, stub.reason);
            types.insert(
                name.clone(),
                Resolvable::Unresolved(Stub::new(kind, name.clone(), reason)),
            );
        }
    }
    done.insert(name.clone());
    Ok(())
}

fn check_keys(ctx: &mut ParseContext<'_>, schema: &mut Schema) -> Result<(), MetadataParsingError> {
    let kind = ElementKind::EntityType;
    for slot in schema.entity_types.values_mut() {
        let Resolvable::Resolved(stype) = slot else {
            continue;
        };
        let message = if stype.key.is_empty() {
            (!stype.is_abstract).then(|| format!("Entity type {} has no key", stype.name))
        } else {
            stype
                .key
                .iter()
                .find(|key| stype.find_property(key).is_none())
                .map(|key| format!("Key property {key} is not declared in entity type {}", stype.name))
        };
        if let Some(message) = message {
            let name = stype.name.clone();
            let error = MetadataParsingError::unresolved(
                kind,
                at(&name, format!("{kind}({})", name.name)),
                message,
            );
            *slot = Resolvable::Unresolved(ctx.fault(kind, name, error)?);
        }
    }
    Ok(())
}

fn resolve_entity_sets(
    ctx: &mut ParseContext<'_>,
    index: &TypeIndex,
    schema: &mut Schema,
) -> Result<(), MetadataParsingError> {
    let set_names: Vec<QualifiedName> = schema.entity_sets.keys().cloned().collect();
    for slot in schema.entity_sets.values_mut() {
        let Resolvable::Resolved(set) = slot else {
            continue;
        };
        let name = set.name.clone();
        let kind = if set.is_singleton {
            ElementKind::Singleton
        } else {
            ElementKind::EntitySet
        };
        let location = at(&name, format!("{kind}({})", name.name));

        let Some(entity_type) = find_key(&schema.entity_types, &set.entity_type) else {
            let error = MetadataParsingError::unresolved(
                kind,
                location,
                format!("Entity type {} of {kind} {} does not exist", set.entity_type, name.name),
            );
            *slot = Resolvable::Unresolved(ctx.fault(kind, name, error)?);
            continue;
        };
        set.entity_type = entity_type;

        let navigations = index.navigations.get(&set.entity_type);
        let mut bindings: Vec<NavigationBinding> = Vec::new();
        for mut binding in std::mem::take(&mut set.bindings) {
            let problem = match set_names.iter().find(|n| binding.target.matches(n)) {
                None => Some(format!(
                    "Target {} of binding {} does not exist",
                    binding.target, binding.path
                )),
                Some(target) => {
                    binding.target = target.clone();
                    navigations
                        .filter(|names| {
                            !binding.path.contains('/') && !names.iter().any(|n| *n == binding.path)
                        })
                        .map(|_| {
                            format!(
                                "Navigation property {} is not declared in {}",
                                binding.path, set.entity_type
                            )
                        })
                }
            };
            match problem {
                None => bindings.push(binding),
                Some(message) => ctx.report(MetadataParsingError::unresolved(
                    ElementKind::NavigationPropertyBinding,
                    format!("{location}/NavigationPropertyBinding({})", binding.path),
                    message,
                ))?,
            }
        }
        set.bindings = bindings;
    }
    Ok(())
}

fn resolve_association_sets(
    ctx: &mut ParseContext<'_>,
    schema: &mut Schema,
) -> Result<(), MetadataParsingError> {
    let kind = ElementKind::AssociationSet;
    let set_names: Vec<QualifiedName> = schema.entity_sets.keys().cloned().collect();
    for slot in schema.association_sets.values_mut() {
        let Resolvable::Resolved(association_set) = slot else {
            continue;
        };
        let name = association_set.name.clone();
        match check_association_set(association_set, &schema.associations, &set_names) {
            Ok(()) => {}
            Err(Unresolved::Broken(stub)) => {
                *slot = Resolvable::Unresolved(Stub::new(kind, name, stub.reason));
            }
            Err(Unresolved::Missing(message)) => {
                let error = MetadataParsingError::unresolved(
                    kind,
                    at(&name, format!("{kind}({})", name.name)),
                    message,
                );
                *slot = Resolvable::Unresolved(ctx.fault(kind, name, error)?);
            }
        }
    }

    // V2 navigation bindings follow from the association sets
    let mut derived: Vec<(QualifiedName, NavigationBinding)> = Vec::new();
    for association_set in schema.association_sets.values().filter_map(Resolvable::resolved) {
        for stype in schema.entity_types.values().filter_map(Resolvable::resolved) {
            for navigation in &stype.navigation_properties {
                let NavigationSource::Association {
                    relationship,
                    from_role,
                    to_role,
                } = &navigation.source
                else {
                    continue;
                };
                if !relationship.matches(&association_set.association) {
                    continue;
                }
                let (Some(from), Some(to)) =
                    (association_set.end(from_role), association_set.end(to_role))
                else {
                    continue;
                };
                let set_named = |local: &str| set_names.iter().find(|n| n.name == local).cloned();
                if let (Some(from_set), Some(to_set)) =
                    (set_named(&from.entity_set), set_named(&to.entity_set))
                {
                    derived.push((
                        from_set,
                        NavigationBinding {
                            path: navigation.name.clone(),
                            target: to_set,
                        },
                    ));
                }
            }
        }
    }
    for (set_name, binding) in derived {
        if let Some(Resolvable::Resolved(set)) = schema.entity_sets.get_mut(&set_name) {
            if set.binding(&binding.path).is_none() {
                set.bindings.push(binding);
            }
        }
    }
    Ok(())
}

fn check_association_set(
    association_set: &mut AssociationSet,
    associations: &Elements<Association>,
    set_names: &[QualifiedName],
) -> Result<(), Unresolved> {
    let association = match find(associations, &association_set.association) {
        None => {
            return Err(Unresolved::Missing(format!(
                "Association {} does not exist in namespace {}",
                association_set.association.name,
                association_set.association.namespace.as_deref().unwrap_or_default()
            )));
        }
        Some(Resolvable::Unresolved(stub)) => return Err(Unresolved::Broken(stub.clone())),
        Some(Resolvable::Resolved(association)) => association,
    };
    association_set.association = association.name.clone();
    let namespace = association_set.name.namespace.as_deref().unwrap_or_default();
    for end in &association_set.ends {
        if !set_names.iter().any(|n| n.name == end.entity_set) {
            return Err(Unresolved::Missing(format!(
                "EntitySet {} does not exist in Schema Namespace {namespace}",
                end.entity_set
            )));
        }
        if association.end(&end.role).is_none() {
            return Err(Unresolved::Missing(format!(
                "Role {} is not defined in association {}",
                end.role, association.name.name
            )));
        }
    }
    Ok(())
}

fn resolve_operations(
    ctx: &mut ParseContext<'_>,
    index: &TypeIndex,
    schema: &mut Schema,
) -> Result<(), MetadataParsingError> {
    let caps = ctx.capabilities();
    for operation in schema.operations.values_mut().filter_map(Resolvable::resolved_mut) {
        let kind = match operation.kind {
            OperationKind::Function => ElementKind::Function,
            OperationKind::Action => ElementKind::Action,
        };
        let name = operation.name.clone();
        let location = at(&name, format!("{kind}({})", name.name));
        for parameter in &mut operation.parameters {
            if is_pending(&parameter.typ) {
                parameter.typ = match resolve_type(caps, index, &parameter.type_info, true) {
                    Ok(typ) => Resolvable::Resolved(typ),
                    Err(unresolved) => settle(
                        ctx,
                        kind,
                        member_name(&name, &parameter.name),
                        format!("{location}/Parameter({})", parameter.name),
                        unresolved,
                    )?,
                };
            }
        }
        if let Some(return_type) = &mut operation.return_type {
            if is_pending(&return_type.typ) {
                return_type.typ = match resolve_type(caps, index, &return_type.type_info, true) {
                    Ok(typ) => Resolvable::Resolved(typ),
                    Err(unresolved) => settle(
                        ctx,
                        kind,
                        member_name(&name, "ReturnType"),
                        format!("{location}/ReturnType"),
                        unresolved,
                    )?,
                };
            }
        }
    }
    Ok(())
}

fn resolve_function_imports(
    ctx: &mut ParseContext<'_>,
    index: &TypeIndex,
    schema: &mut Schema,
) -> Result<(), MetadataParsingError> {
    let caps = ctx.capabilities();
    for slot in schema.function_imports.values_mut() {
        let Resolvable::Resolved(import) = slot else {
            continue;
        };
        let kind = match import.kind {
            OperationKind::Function => ElementKind::FunctionImport,
            OperationKind::Action => ElementKind::ActionImport,
        };
        let name = import.name.clone();
        let location = at(&name, format!("{kind}({})", name.name));

        if let Some(operation_name) = import.operation.clone() {
            match find(&schema.operations, &operation_name) {
                Some(Resolvable::Resolved(operation)) => {
                    import.operation = Some(operation.name.clone());
                    import.parameters = operation.parameters.clone();
                    import.return_type = operation.return_type.clone();
                }
                Some(Resolvable::Unresolved(stub)) => {
                    *slot = Resolvable::Unresolved(Stub::new(kind, name, stub.reason.clone()));
                    continue;
                }
                None => {
                    let error = MetadataParsingError::unresolved(
                        kind,
                        location,
                        format!("Operation {operation_name} of {} does not exist", name.name),
                    );
                    *slot = Resolvable::Unresolved(ctx.fault(kind, name, error)?);
                    continue;
                }
            }
        }

        if let Some(set) = &import.entity_set {
            if find(&schema.entity_sets, &QualifiedName::local(set.as_str())).is_none() {
                let error = MetadataParsingError::unresolved(
                    kind,
                    location,
                    format!("EntitySet {set} of {} does not exist", name.name),
                );
                *slot = Resolvable::Unresolved(ctx.fault(kind, name, error)?);
                continue;
            }
        }

        for parameter in &mut import.parameters {
            if is_pending(&parameter.typ) {
                parameter.typ = match resolve_type(caps, index, &parameter.type_info, false) {
                    Ok(typ) => Resolvable::Resolved(typ),
                    Err(unresolved) => settle(
                        ctx,
                        kind,
                        member_name(&name, &parameter.name),
                        format!("{location}/Parameter({})", parameter.name),
                        unresolved,
                    )?,
                };
            }
        }
        if let Some(return_type) = &mut import.return_type {
            if is_pending(&return_type.typ) {
                return_type.typ = match resolve_type(caps, index, &return_type.type_info, true) {
                    Ok(typ) => Resolvable::Resolved(typ),
                    Err(unresolved) => settle(
                        ctx,
                        kind,
                        member_name(&name, "ReturnType"),
                        format!("{location}/ReturnType"),
                        unresolved,
                    )?,
                };
            }
        }
    }
    Ok(())
}
