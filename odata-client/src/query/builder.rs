//! Fluent request builders
//!
//! Builders are plain values: every step consumes and returns the builder,
//! nothing is checked or sent until `build()`. `build()` validates names
//! against the schema and renders an [`ODataRequest`].

use serde_json::{Map, Value as Json, json};

use crate::error::{ProgramError, Result};
use crate::model::{EntityType, FunctionImport, OperationKind, PropertyType, QualifiedName};
use crate::query::filters::Filter;
use crate::query::orderby::OrderBy;
use crate::query::request::{Expect, ODataRequest, RequestContext, encode_segment};
use crate::transport::Method;
use crate::types::Value;
use crate::version::{ParameterStyle, PayloadStyle};

/// How `$count` is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountMode {
    /// `Set/$count`, the body is the number
    Only,
    /// `$inlinecount=allpages` (V2) or `$count=true` (V4) next to the entities
    Inline,
}

/// Entity type and set a request is addressed to
#[derive(Debug, Clone)]
pub(crate) struct Target<'a> {
    pub path: String,
    pub entity_type: &'a EntityType,
    pub entity_set: Option<QualifiedName>,
}

fn check_select(ctx: &RequestContext<'_>, entity_type: &EntityType, path: &str) -> Result<()> {
    if path == "*" {
        return Ok(());
    }
    let mut current = entity_type;
    let mut segments = path.split('/').peekable();
    while let Some(segment) = segments.next() {
        let last = segments.peek().is_none();
        if current.find_property(segment).is_some() && last {
            return Ok(());
        }
        match current.find_navigation_property(segment) {
            Some(_) if last => return Ok(()),
            Some(navigation) => {
                current = ctx
                    .schema
                    .entity_type(&navigation.target()?.entity_type.to_string())?;
            }
            None => {
                return Err(ProgramError::UnknownProperty {
                    entity_type: current.name.to_string(),
                    property: segment.to_string(),
                }
                .into());
            }
        }
    }
    Ok(())
}

fn check_expand(ctx: &RequestContext<'_>, entity_type: &EntityType, path: &str) -> Result<()> {
    let mut current = entity_type;
    for segment in path.split('/') {
        // V4 nested options such as `Cars($select=Model)` are passed through
        let name = segment.split('(').next().unwrap_or_default().trim();
        let navigation = current.navigation_property(name)?;
        current = ctx
            .schema
            .entity_type(&navigation.target()?.entity_type.to_string())?;
    }
    Ok(())
}

/// Collection read: `Set`, `Set(key)/Nav` or their `$count`
#[derive(Debug, Clone)]
pub struct QueryBuilder<'a> {
    ctx: RequestContext<'a>,
    target: Target<'a>,
    filter: Option<Filter>,
    select: Vec<String>,
    expand: Vec<String>,
    order_by: Vec<OrderBy>,
    top: Option<u64>,
    skip: Option<u64>,
    count: Option<CountMode>,
    custom: Vec<(String, String)>,
}

impl<'a> QueryBuilder<'a> {
    pub(crate) fn new(ctx: RequestContext<'a>, target: Target<'a>) -> Self {
        Self {
            ctx,
            target,
            filter: None,
            select: Vec::new(),
            expand: Vec::new(),
            order_by: Vec::new(),
            top: None,
            skip: None,
            count: None,
            custom: Vec::new(),
        }
    }

    /// Add a filter; repeated calls are combined with `and`
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    pub fn select<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(properties.into_iter().map(Into::into));
        self
    }

    pub fn expand<I, S>(mut self, navigations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expand.extend(navigations.into_iter().map(Into::into));
        self
    }

    pub fn order_by(mut self, order: impl Into<OrderBy>) -> Self {
        self.order_by.push(order.into());
        self
    }

    pub fn top(mut self, top: u64) -> Self {
        self.top = Some(top);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Request only the number of matching entities
    pub fn count(mut self) -> Self {
        self.count = Some(CountMode::Only);
        self
    }

    /// Request the total count alongside the entities
    pub fn inline_count(mut self) -> Self {
        self.count = Some(CountMode::Inline);
        self
    }

    /// Custom query option, passed through verbatim apart from encoding
    pub fn custom(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> Result<ODataRequest> {
        let ctx = &self.ctx;
        let entity_type = self.target.entity_type;
        let filter = self
            .filter
            .as_ref()
            .map(|filter| filter.render(ctx, entity_type))
            .transpose()?;

        if self.count == Some(CountMode::Only) {
            let mut request = ODataRequest::new(
                ctx,
                Method::Get,
                format!("{}/$count", self.target.path),
                Expect::Count,
            );
            request.headers.retain(|(name, _)| name != "Accept");
            request.headers.push(("Accept".to_string(), "text/plain".to_string()));
            if let Some(filter) = filter {
                request.query.push(("$filter".to_string(), filter));
            }
            request.query.extend(self.custom);
            return Ok(request);
        }

        for path in &self.select {
            check_select(ctx, entity_type, path)?;
        }
        for path in &self.expand {
            check_expand(ctx, entity_type, path)?;
        }
        let order_by = self
            .order_by
            .iter()
            .map(|order| order.render(ctx, entity_type))
            .collect::<Result<Vec<_>>>()?;

        let mut request = ODataRequest::new(
            ctx,
            Method::Get,
            self.target.path,
            Expect::Entities {
                entity_type: entity_type.name.clone(),
                entity_set: self.target.entity_set,
            },
        );
        if let Some(filter) = filter {
            request.query.push(("$filter".to_string(), filter));
        }
        if !self.select.is_empty() {
            request.query.push(("$select".to_string(), self.select.join(",")));
        }
        if !self.expand.is_empty() {
            request.query.push(("$expand".to_string(), self.expand.join(",")));
        }
        if !order_by.is_empty() {
            request.query.push(("$orderby".to_string(), order_by.join(",")));
        }
        if let Some(top) = self.top {
            request.query.push(("$top".to_string(), top.to_string()));
        }
        if let Some(skip) = self.skip {
            request.query.push(("$skip".to_string(), skip.to_string()));
        }
        if self.count == Some(CountMode::Inline) {
            let (name, value) = ctx.conventions().inline_count;
            request.query.push((name.to_string(), value.to_string()));
        }
        request.query.extend(self.custom);
        Ok(request)
    }
}

/// Single entity read: `Set(key)`, a singleton, or a to-one navigation
#[derive(Debug, Clone)]
pub struct EntityGetBuilder<'a> {
    ctx: RequestContext<'a>,
    target: Target<'a>,
    select: Vec<String>,
    expand: Vec<String>,
    custom: Vec<(String, String)>,
}

impl<'a> EntityGetBuilder<'a> {
    pub(crate) fn new(ctx: RequestContext<'a>, target: Target<'a>) -> Self {
        Self {
            ctx,
            target,
            select: Vec::new(),
            expand: Vec::new(),
            custom: Vec::new(),
        }
    }

    pub fn select<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(properties.into_iter().map(Into::into));
        self
    }

    pub fn expand<I, S>(mut self, navigations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expand.extend(navigations.into_iter().map(Into::into));
        self
    }

    pub fn custom(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> Result<ODataRequest> {
        let ctx = &self.ctx;
        let entity_type = self.target.entity_type;
        for path in &self.select {
            check_select(ctx, entity_type, path)?;
        }
        for path in &self.expand {
            check_expand(ctx, entity_type, path)?;
        }
        let mut request = ODataRequest::new(
            ctx,
            Method::Get,
            self.target.path,
            Expect::Entity {
                entity_type: entity_type.name.clone(),
                entity_set: self.target.entity_set,
            },
        );
        if !self.select.is_empty() {
            request.query.push(("$select".to_string(), self.select.join(",")));
        }
        if !self.expand.is_empty() {
            request.query.push(("$expand".to_string(), self.expand.join(",")));
        }
        request.query.extend(self.custom);
        Ok(request)
    }
}

/// A navigation read, to-one or to-many
#[derive(Debug, Clone)]
pub enum NavigationQuery<'a> {
    Single(EntityGetBuilder<'a>),
    Collection(QueryBuilder<'a>),
}

impl NavigationQuery<'_> {
    pub fn build(self) -> Result<ODataRequest> {
        match self {
            NavigationQuery::Single(builder) => builder.build(),
            NavigationQuery::Collection(builder) => builder.build(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteKind {
    Create,
    Update,
}

/// Create (`POST Set`) or modify (`PATCH Set(key)`) an entity
#[derive(Debug, Clone)]
pub struct EntityWriteBuilder<'a> {
    ctx: RequestContext<'a>,
    target: Target<'a>,
    kind: WriteKind,
    method: Method,
    values: Vec<(String, Value)>,
    bindings: Vec<(String, String)>,
}

impl<'a> EntityWriteBuilder<'a> {
    pub(crate) fn new(ctx: RequestContext<'a>, target: Target<'a>, kind: WriteKind) -> Self {
        let method = match kind {
            WriteKind::Create => Method::Post,
            WriteKind::Update => Method::Patch,
        };
        Self {
            ctx,
            target,
            kind,
            method,
            values: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// Set a property; the last value set for a name wins
    pub fn set(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        let property = property.into();
        self.values.retain(|(name, _)| *name != property);
        self.values.push((property, value.into()));
        self
    }

    /// Link a navigation property to an existing entity, addressed by its
    /// path (`Customers('ALFKI')`) or by a changeset Content-ID (`$1`)
    pub fn bind(mut self, navigation: impl Into<String>, target: impl Into<String>) -> Self {
        self.bindings.push((navigation.into(), target.into()));
        self
    }

    /// Update method: `PATCH` (default), `PUT` or, before V4, `MERGE`
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    fn body(&self) -> Result<Json> {
        let ctx = &self.ctx;
        let codec = ctx.codec();
        let entity_type = self.target.entity_type;
        let mut object = Map::new();
        for (name, value) in &self.values {
            let property = entity_type.property(name)?;
            object.insert(
                name.clone(),
                codec.to_json(property.typ()?, value, &property.facets)?,
            );
        }

        let mut grouped: Vec<(&str, Vec<&str>)> = Vec::new();
        for (navigation, target) in &self.bindings {
            match grouped.iter_mut().find(|(name, _)| name == navigation) {
                Some((_, targets)) => targets.push(target),
                None => grouped.push((navigation, vec![target])),
            }
        }
        for (navigation, targets) in grouped {
            let many = entity_type.navigation_property(navigation)?.is_collection()?;
            if !many && targets.len() > 1 {
                return Err(ProgramError::InvalidRequest(format!(
                    "Navigation property {navigation} of {} is single-valued",
                    entity_type.name
                ))
                .into());
            }
            match ctx.conventions().payload {
                PayloadStyle::Minimal => {
                    let link = if many {
                        json!(targets)
                    } else {
                        json!(targets[0])
                    };
                    object.insert(format!("{navigation}@odata.bind"), link);
                }
                PayloadStyle::Verbose => {
                    let links: Vec<Json> = targets
                        .iter()
                        .map(|target| json!({"__metadata": {"uri": target}}))
                        .collect();
                    let link = if many {
                        Json::Array(links)
                    } else {
                        links.into_iter().next().unwrap_or(Json::Null)
                    };
                    object.insert(navigation.to_string(), link);
                }
            }
        }
        Ok(Json::Object(object))
    }

    pub fn build(self) -> Result<ODataRequest> {
        let ctx = &self.ctx;
        if self.kind == WriteKind::Create && self.method != Method::Post {
            return Err(ProgramError::InvalidRequest(
                "Entities are always created with POST".to_string(),
            )
            .into());
        }
        match self.method {
            Method::Merge if !ctx.conventions().merge => {
                return Err(ProgramError::InvalidRequest(format!(
                    "MERGE is not available in OData {}",
                    ctx.config.version
                ))
                .into());
            }
            Method::Get | Method::Delete => {
                return Err(ProgramError::InvalidRequest(format!(
                    "{} cannot carry an entity body",
                    self.method
                ))
                .into());
            }
            _ => {}
        }
        let body = self.body()?.to_string();
        let expect = match self.kind {
            WriteKind::Create => Expect::Entity {
                entity_type: self.target.entity_type.name.clone(),
                entity_set: self.target.entity_set.clone(),
            },
            WriteKind::Update => Expect::Nothing,
        };
        Ok(ODataRequest::new(ctx, self.method, self.target.path, expect).with_json_body(body))
    }
}

/// Call of a function or action import
#[derive(Debug, Clone)]
pub struct FunctionBuilder<'a> {
    ctx: RequestContext<'a>,
    function: &'a FunctionImport,
    parameters: Vec<(String, Value)>,
}

impl<'a> FunctionBuilder<'a> {
    pub(crate) fn new(ctx: RequestContext<'a>, function: &'a FunctionImport) -> Self {
        Self {
            ctx,
            function,
            parameters: Vec::new(),
        }
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        self.parameters.retain(|(given, _)| *given != name);
        self.parameters.push((name, value.into()));
        self
    }

    fn expect(&self) -> Result<Expect> {
        let Some(return_type) = &self.function.return_type else {
            return Ok(Expect::Nothing);
        };
        let entity_set = match &self.function.entity_set {
            Some(name) => Some(self.ctx.schema.entity_set(name)?.name.clone()),
            None => None,
        };
        Ok(match return_type.typ()? {
            PropertyType::Entity(entity_type) => Expect::Entity {
                entity_type: entity_type.clone(),
                entity_set,
            },
            PropertyType::Collection(item) => match item.as_ref() {
                PropertyType::Entity(entity_type) => Expect::Entities {
                    entity_type: entity_type.clone(),
                    entity_set,
                },
                _ => Expect::Value {
                    function: self.function.name.name.clone(),
                    typ: return_type.typ()?.clone(),
                },
            },
            other => Expect::Value {
                function: self.function.name.name.clone(),
                typ: other.clone(),
            },
        })
    }

    pub fn build(self) -> Result<ODataRequest> {
        let ctx = &self.ctx;
        let codec = ctx.codec();
        let function = self.function;
        let name = &function.name.name;

        for (given, _) in &self.parameters {
            if function.parameter(given).is_none() {
                return Err(ProgramError::UnknownParameter {
                    function: name.clone(),
                    parameter: given.clone(),
                }
                .into());
            }
        }
        for parameter in &function.parameters {
            let given = self.parameters.iter().any(|(p, _)| *p == parameter.name);
            if !given && !parameter.facets.nullable {
                return Err(ProgramError::MissingParameter {
                    function: name.clone(),
                    parameter: parameter.name.clone(),
                }
                .into());
            }
        }

        let expect = self.expect()?;
        let mut request = match (ctx.conventions().parameters, function.kind) {
            (ParameterStyle::Query, _) => {
                let mut request =
                    ODataRequest::new(ctx, function.http_method, encode_segment(name), expect);
                for parameter in &function.parameters {
                    if let Some((_, value)) = self.parameters.iter().find(|(p, _)| *p == parameter.name) {
                        let literal = codec.to_literal(parameter.typ()?, value, &parameter.facets)?;
                        request.query.push((parameter.name.clone(), literal));
                    }
                }
                request
            }
            (ParameterStyle::Path, OperationKind::Function) => {
                let mut pairs = Vec::with_capacity(self.parameters.len());
                for parameter in &function.parameters {
                    if let Some((_, value)) = self.parameters.iter().find(|(p, _)| *p == parameter.name) {
                        let literal = codec.to_literal(parameter.typ()?, value, &parameter.facets)?;
                        pairs.push(format!("{}={}", parameter.name, literal));
                    }
                }
                let path = encode_segment(&format!("{name}({})", pairs.join(",")));
                ODataRequest::new(ctx, Method::Get, path, expect)
            }
            (ParameterStyle::Path, OperationKind::Action) => {
                let mut body = Map::new();
                for parameter in &function.parameters {
                    if let Some((_, value)) = self.parameters.iter().find(|(p, _)| *p == parameter.name) {
                        body.insert(
                            parameter.name.clone(),
                            codec.to_json(parameter.typ()?, value, &parameter.facets)?,
                        );
                    }
                }
                ODataRequest::new(ctx, Method::Post, encode_segment(name), expect)
                    .with_json_body(Json::Object(body).to_string())
            }
        };
        request.success = vec![200, 201, 204];
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::metadata::parse;
    use crate::model::Schema;
    use crate::version::ODataVersion;
    use pretty_assertions::assert_eq;

    const EPM: &str = include_str!("../../tests/fixtures/sap_epm_v2.xml");
    const CARS: &str = include_str!("../../tests/fixtures/cars_v4.xml");

    fn target<'a>(schema: &'a Schema, set: &str, path: &str) -> Target<'a> {
        let entity_set = schema.entity_set(set).unwrap();
        Target {
            path: path.to_string(),
            entity_type: schema.entity_type_of(entity_set).unwrap(),
            entity_set: Some(entity_set.name.clone()),
        }
    }

    #[test]
    fn test_query_options_in_order() {
        let config = Config::new(ODataVersion::V2);
        let schema = parse(EPM.as_bytes(), &config).unwrap();
        let ctx = RequestContext::new(&schema, &config);

        let request = QueryBuilder::new(ctx, target(&schema, "Employees", "Employees"))
            .filter(Filter::gt("Age", 30))
            .filter(Filter::eq("NameFirst", "Ann"))
            .select(["NameFirst", "NameLast"])
            .expand(["Addresses"])
            .order_by(OrderBy::desc("Age"))
            .top(10)
            .skip(20)
            .inline_count()
            .custom("sap-client", "100")
            .build()
            .unwrap();

        assert_eq!(
            request.query,
            vec![
                ("$filter".to_string(), "Age gt 30 and NameFirst eq 'Ann'".to_string()),
                ("$select".to_string(), "NameFirst,NameLast".to_string()),
                ("$expand".to_string(), "Addresses".to_string()),
                ("$orderby".to_string(), "Age desc".to_string()),
                ("$top".to_string(), "10".to_string()),
                ("$skip".to_string(), "20".to_string()),
                ("$inlinecount".to_string(), "allpages".to_string()),
                ("sap-client".to_string(), "100".to_string()),
            ]
        );
        assert_eq!(request.method, Method::Get);
    }

    #[test]
    fn test_count_only() {
        let config = Config::new(ODataVersion::V4);
        let schema = parse(CARS.as_bytes(), &config).unwrap();
        let ctx = RequestContext::new(&schema, &config);

        let request = QueryBuilder::new(ctx, target(&schema, "Cars", "Cars"))
            .filter(Filter::eq("Model", "Octavia"))
            .top(3)
            .count()
            .build()
            .unwrap();
        assert_eq!(request.path_and_query(), "Cars/$count?$filter=Model%20eq%20%27Octavia%27");
        assert_eq!(request.expect, Expect::Count);

        let inline = QueryBuilder::new(ctx, target(&schema, "Cars", "Cars"))
            .inline_count()
            .build()
            .unwrap();
        assert_eq!(inline.query_option("$count"), Some("true"));
    }

    #[test]
    fn test_unknown_names_fail_at_build() {
        let config = Config::new(ODataVersion::V2);
        let schema = parse(EPM.as_bytes(), &config).unwrap();
        let ctx = RequestContext::new(&schema, &config);

        let error = QueryBuilder::new(ctx, target(&schema, "Employees", "Employees"))
            .select(["Shoe"])
            .build()
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Property Shoe is not declared in EPM.Employee entity type"
        );
        let error = EntityGetBuilder::new(ctx, target(&schema, "Employees", "Employees(1)"))
            .expand(["Manager"])
            .build()
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Navigation property Manager is not declared in EPM.Employee entity type"
        );
    }

    #[test]
    fn test_create_body_v2_and_binding() {
        let config = Config::new(ODataVersion::V2);
        let schema = parse(EPM.as_bytes(), &config).unwrap();
        let ctx = RequestContext::new(&schema, &config);

        let request = EntityWriteBuilder::new(
            ctx,
            target(&schema, "Employees", "Employees"),
            WriteKind::Create,
        )
        .set("NameFirst", "Ann")
        .set("Age", 41)
        .bind("Addresses", "Addresses(7)")
        .build()
        .unwrap();

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        let body: Json = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "NameFirst": "Ann",
                "Age": 41,
                "Addresses": [{"__metadata": {"uri": "Addresses(7)"}}]
            })
        );

        let error = EntityWriteBuilder::new(
            ctx,
            target(&schema, "Employees", "Employees"),
            WriteKind::Create,
        )
        .set("Shoe", 1)
        .build()
        .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Property Shoe is not declared in EPM.Employee entity type"
        );
    }

    #[test]
    fn test_update_v4_binding_and_merge() {
        let config = Config::new(ODataVersion::V4);
        let schema = parse(CARS.as_bytes(), &config).unwrap();
        let ctx = RequestContext::new(&schema, &config);

        let request = EntityWriteBuilder::new(ctx, target(&schema, "Cars", "Cars(1)"), WriteKind::Update)
            .set("Model", "Superb")
            .bind("Manufacturer", "$1")
            .build()
            .unwrap();
        assert_eq!(request.method, Method::Patch);
        assert_eq!(request.expect, Expect::Nothing);
        let body: Json = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"Model": "Superb", "Manufacturer@odata.bind": "$1"}));

        let error = EntityWriteBuilder::new(ctx, target(&schema, "Cars", "Cars(1)"), WriteKind::Update)
            .method(Method::Merge)
            .build()
            .unwrap_err();
        assert_eq!(error.to_string(), "MERGE is not available in OData V4");
    }

    #[test]
    fn test_function_import_v2_query_parameters() {
        let config = Config::new(ODataVersion::V2);
        let schema = parse(EPM.as_bytes(), &config).unwrap();
        let ctx = RequestContext::new(&schema, &config);
        let sum = schema.function_import("sum").unwrap();

        let request = FunctionBuilder::new(ctx, sum)
            .parameter("B", 4)
            .parameter("A", 2)
            .build()
            .unwrap();
        assert_eq!(request.path_and_query(), "sum?A=2&B=4");
        assert_eq!(request.method, Method::Get);
        assert!(matches!(request.expect, Expect::Value { .. }));

        let error = FunctionBuilder::new(ctx, sum)
            .parameter("C", 1)
            .build()
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Parameter C is not declared in function import sum"
        );

        let refresh = schema.function_import("refresh").unwrap();
        let request = FunctionBuilder::new(ctx, refresh).build().unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.expect, Expect::Nothing);
    }

    #[test]
    fn test_function_and_action_v4() {
        let config = Config::new(ODataVersion::V4);
        let schema = parse(CARS.as_bytes(), &config).unwrap();
        let ctx = RequestContext::new(&schema, &config);

        let nearest = schema.function_import("GetNearestCar").unwrap();
        let request = FunctionBuilder::new(ctx, nearest)
            .parameter("Distance", 2.5)
            .build()
            .unwrap();
        assert_eq!(request.path, "GetNearestCar(Distance=2.5)");
        assert_eq!(
            request.expect,
            Expect::Entity {
                entity_type: QualifiedName::new("Cars", "Car"),
                entity_set: Some(QualifiedName::new("Cars", "Cars")),
            }
        );
        let error = FunctionBuilder::new(ctx, nearest).build().unwrap_err();
        assert_eq!(
            error.to_string(),
            "Missing value for parameter Distance of function import GetNearestCar"
        );

        let reset = schema.function_import("ResetDataSource").unwrap();
        let request = FunctionBuilder::new(ctx, reset).build().unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.body.as_deref(), Some("{}"));
    }
}
