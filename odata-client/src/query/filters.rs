//! Filter expressions for `$filter`
//!
//! Expressions reference properties by path (`Location/City`, `Customer/Country`)
//! and are checked against the schema when the request is built. Values are
//! rendered with the declared type of the property they are compared to.

use std::fmt;

use crate::error::{ProgramError, Result};
use crate::model::{EntityType, Property, PropertyType, StructType};
use crate::query::request::RequestContext;
use crate::types::{EdmType, Facets, Value};

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Eq => "eq",
            Comparison::Ne => "ne",
            Comparison::Gt => "gt",
            Comparison::Ge => "ge",
            Comparison::Lt => "lt",
            Comparison::Le => "le",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String matching functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matching {
    Contains,
    StartsWith,
    EndsWith,
}

/// Filter expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        property: String,
        op: Comparison,
        value: Value,
    },
    Match {
        property: String,
        function: Matching,
        text: String,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// Caller-written expression, only checked for balanced quotes and parentheses
    Raw(String),
}

impl Filter {
    fn compare(property: impl Into<String>, op: Comparison, value: impl Into<Value>) -> Self {
        Filter::Compare {
            property: property.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, Comparison::Eq, value)
    }

    pub fn ne(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, Comparison::Ne, value)
    }

    pub fn gt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, Comparison::Gt, value)
    }

    pub fn ge(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, Comparison::Ge, value)
    }

    pub fn lt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, Comparison::Lt, value)
    }

    pub fn le(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, Comparison::Le, value)
    }

    pub fn contains(property: impl Into<String>, text: impl Into<String>) -> Self {
        Filter::Match {
            property: property.into(),
            function: Matching::Contains,
            text: text.into(),
        }
    }

    pub fn starts_with(property: impl Into<String>, text: impl Into<String>) -> Self {
        Filter::Match {
            property: property.into(),
            function: Matching::StartsWith,
            text: text.into(),
        }
    }

    pub fn ends_with(property: impl Into<String>, text: impl Into<String>) -> Self {
        Filter::Match {
            property: property.into(),
            function: Matching::EndsWith,
            text: text.into(),
        }
    }

    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    pub fn raw(expression: impl Into<String>) -> Self {
        Filter::Raw(expression.into())
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut filters) => {
                filters.push(other);
                Filter::Or(filters)
            }
            first => Filter::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// Render against the entity type the filter applies to
    pub(crate) fn render(&self, ctx: &RequestContext<'_>, entity_type: &EntityType) -> Result<String> {
        match self {
            Filter::Compare { property, op, value } => {
                let target = resolve_path(ctx, entity_type, property)?;
                let literal = ctx
                    .codec()
                    .to_literal(target.typ()?, value, &Facets::default())?;
                Ok(format!("{property} {op} {literal}"))
            }
            Filter::Match {
                property,
                function,
                text,
            } => {
                let target = resolve_path(ctx, entity_type, property)?;
                if target.typ()?.primitive() != Some(EdmType::String) {
                    return Err(ProgramError::InvalidFilter(format!(
                        "{property} is not a string property"
                    ))
                    .into());
                }
                let literal = ctx.codec().to_literal(
                    &PropertyType::Primitive(EdmType::String),
                    &Value::from(text.as_str()),
                    &Facets::default(),
                )?;
                Ok(match function {
                    Matching::Contains if ctx.conventions().substringof => {
                        format!("substringof({literal},{property})")
                    }
                    Matching::Contains => format!("contains({property},{literal})"),
                    Matching::StartsWith => format!("startswith({property},{literal})"),
                    Matching::EndsWith => format!("endswith({property},{literal})"),
                })
            }
            Filter::And(filters) => render_group(ctx, entity_type, filters, " and "),
            Filter::Or(filters) => render_group(ctx, entity_type, filters, " or "),
            Filter::Not(inner) => Ok(format!("not ({})", inner.render(ctx, entity_type)?)),
            Filter::Raw(expression) => {
                check_raw(expression)?;
                Ok(expression.trim().to_string())
            }
        }
    }
}

fn render_group(
    ctx: &RequestContext<'_>,
    entity_type: &EntityType,
    filters: &[Filter],
    separator: &str,
) -> Result<String> {
    if filters.is_empty() {
        return Err(ProgramError::InvalidFilter("empty filter group".to_string()).into());
    }
    let mut parts = Vec::with_capacity(filters.len());
    for filter in filters {
        let rendered = filter.render(ctx, entity_type)?;
        let grouped = matches!(filter, Filter::And(f) | Filter::Or(f) if f.len() > 1);
        parts.push(if grouped || (matches!(filter, Filter::Raw(_)) && filters.len() > 1) {
            format!("({rendered})")
        } else {
            rendered
        });
    }
    Ok(parts.join(separator))
}

fn check_raw(expression: &str) -> Result<()> {
    if expression.trim().is_empty() {
        return Err(ProgramError::InvalidFilter("expression is empty".to_string()).into());
    }
    let mut depth = 0usize;
    let mut in_string = false;
    for c in expression.chars() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    ProgramError::InvalidFilter(format!("unbalanced parentheses in '{expression}'"))
                })?;
            }
            _ => {}
        }
    }
    if in_string {
        return Err(
            ProgramError::InvalidFilter(format!("unterminated string in '{expression}'")).into(),
        );
    }
    if depth != 0 {
        return Err(
            ProgramError::InvalidFilter(format!("unbalanced parentheses in '{expression}'")).into(),
        );
    }
    Ok(())
}

/// Follow a `/`-separated path through complex properties and navigations
pub(crate) fn resolve_path<'a>(
    ctx: &RequestContext<'a>,
    entity_type: &'a EntityType,
    path: &str,
) -> Result<&'a Property> {
    let mut current: &'a StructType = entity_type;
    let mut segments = path.split('/').peekable();
    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        if let Some(property) = current.find_property(segment) {
            if last {
                return Ok(property);
            }
            current = match property.typ()? {
                PropertyType::Complex(name) => ctx.schema.complex_type(&name.to_string())?,
                _ => {
                    return Err(ProgramError::InvalidFilter(format!(
                        "{segment} in {path} has no members"
                    ))
                    .into());
                }
            };
            continue;
        }
        if let Some(navigation) = current.find_navigation_property(segment) {
            if last || navigation.is_collection()? {
                return Err(ProgramError::InvalidFilter(format!(
                    "{path} does not end in a property"
                ))
                .into());
            }
            current = ctx
                .schema
                .entity_type(&navigation.target()?.entity_type.to_string())?;
            continue;
        }
        return Err(ProgramError::UnknownProperty {
            entity_type: current.name.to_string(),
            property: segment.to_string(),
        }
        .into());
    }
    Err(ProgramError::InvalidFilter("empty property path".to_string()).into())
}
