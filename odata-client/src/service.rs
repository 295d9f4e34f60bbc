//! A connected OData service
//!
//! [`Service`] owns the parsed schema and the injected transport. Builders
//! borrow the schema to render requests; `execute` sends them and decodes the
//! response.

use std::sync::Arc;

use crate::batch::{Batch, BatchResponseParser, SlotResult};
use crate::config::Config;
use crate::error::{Error, HttpError, ProgramError, Result};
use crate::metadata;
use crate::model::{EntitySet, EntityType, Schema};
use crate::observer::RequestObserver;
use crate::proxy::{EntityProxy, Navigation, NavigationValue};
use crate::query::builder::{Target, WriteKind};
use crate::query::request::encode_segment;
use crate::query::{
    EntityGetBuilder, EntityKey, EntityWriteBuilder, Expect, FunctionBuilder, Key, NavigationQuery,
    ODataRequest, Outcome, QueryBuilder, RequestContext, result,
};
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};
use crate::vendor::{HttpErrorParser, ODataErrorParser};

/// Client bound to one service root
pub struct Service {
    url: String,
    config: Config,
    schema: Arc<Schema>,
    transport: Arc<dyn Transport>,
    error_parser: Arc<dyn HttpErrorParser>,
    observer: Option<Arc<dyn RequestObserver>>,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("url", &self.url)
            .field("version", &self.config.version)
            .field("error_parser", &self.error_parser)
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Fetch `$metadata` from the service root and parse it
    pub async fn connect(
        url: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: Config,
    ) -> Result<Self> {
        let url = url.into();
        let root = url.trim_end_matches('/').to_string();
        let request = HttpRequest {
            method: Method::Get,
            url: format!("{root}/$metadata"),
            headers: vec![("Accept".to_string(), "application/xml".to_string())],
            body: None,
        };
        log::debug!("GET {}", request.url);
        let response = transport.execute(request).await?;

        let is_xml = response
            .content_type()
            .is_some_and(|ct| ct.contains("xml"));
        if response.status != 200 || !is_xml {
            return Err(HttpError::new(
                format!(
                    "Metadata request failed with status {} and content type {}",
                    response.status,
                    response.content_type().unwrap_or_default()
                ),
                response,
            )
            .into());
        }

        let schema = metadata::parse(&response.body, &config)?;
        log::info!(
            "Loaded OData {} metadata of {root}: {} entity sets, {} diagnostics",
            config.version,
            schema.entity_sets().count(),
            schema.diagnostics().len()
        );
        Ok(Self::from_schema(root, transport, config, schema))
    }

    /// Use an already parsed schema, e.g. one loaded from a local file
    pub fn from_schema(
        url: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: Config,
        schema: Schema,
    ) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            config,
            schema: Arc::new(schema),
            transport,
            error_parser: Arc::new(ODataErrorParser),
            observer: None,
        }
    }

    /// Replace the parser extracting detail from error responses
    pub fn with_error_parser(mut self, parser: Arc<dyn HttpErrorParser>) -> Self {
        self.error_parser = parser;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn context(&self) -> RequestContext<'_> {
        RequestContext::new(&self.schema, &self.config)
    }

    pub fn entity_set(&self, name: &str) -> Result<EntitySetProxy<'_>> {
        let set = self.schema.entity_set(name)?;
        let entity_type = self.schema.entity_type_of(set)?;
        Ok(EntitySetProxy {
            ctx: self.context(),
            set,
            entity_type,
        })
    }

    /// Call a function import (V2) or a function/action import (V4)
    pub fn function(&self, name: &str) -> Result<FunctionBuilder<'_>> {
        let function = self.schema.function_import(name)?;
        Ok(FunctionBuilder::new(self.context(), function))
    }

    fn http_error(&self, message: String, response: HttpResponse) -> Error {
        let details = self.error_parser.parse(&response);
        HttpError::new(message, response).with_details(details).into()
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        log::debug!("{} {}", request.method, request.url);
        let response = self.transport.execute(request.clone()).await?;
        log::debug!(
            "{} {} answered {}",
            request.method,
            request.url,
            response.status
        );
        if let Some(observer) = &self.observer {
            observer.http_response(&request, &response);
        }
        Ok(response)
    }

    async fn exchange(&self, request: &ODataRequest, http: HttpRequest) -> Result<Outcome> {
        let response = self.send(http).await?;
        if !request.accepts(response.status) {
            return Err(self.http_error(
                format!(
                    "HTTP {} failed with status code {}",
                    request.describe(),
                    response.status
                ),
                response,
            ));
        }
        result::decode(&self.context(), &request.expect, &response)
    }

    /// Send one request and decode its response
    pub async fn execute(&self, request: &ODataRequest) -> Result<Outcome> {
        self.exchange(request, request.to_http(&self.url)).await
    }

    /// Follow a server-driven paging link returned with a collection
    pub async fn next_page(&self, request: &ODataRequest, next_link: &str) -> Result<Outcome> {
        let mut http = request.to_http(&self.url);
        http.url = if next_link.starts_with("http://") || next_link.starts_with("https://") {
            next_link.to_string()
        } else {
            format!("{}/{}", self.url, next_link.trim_start_matches('/'))
        };
        self.exchange(request, http).await
    }

    /// Send all slots of a batch in one exchange. Failing parts are reported
    /// per slot; only a failure of the exchange itself is an error.
    pub async fn execute_batch(&self, batch: &Batch) -> Result<Vec<SlotResult>> {
        let request = batch.to_request(self.config.version);
        let response = self.send(request.to_http(&self.url)).await?;
        if !request.accepts(response.status) {
            return Err(self.http_error(
                format!(
                    "HTTP POST for batch {} failed with status code {}",
                    batch.id(),
                    response.status
                ),
                response,
            ));
        }
        BatchResponseParser::new(self.context()).parse(batch, &response)
    }

    /// Read a navigation property, fetching it when it was not expanded
    pub async fn fetch_navigation(&self, entity: &EntityProxy, name: &str) -> Result<NavigationValue> {
        let request = match entity.navigation(name)? {
            Navigation::Loaded(value) => return Ok(value),
            Navigation::Deferred(request) => request,
        };
        match self.execute(&request).await? {
            Outcome::Entity(target) => Ok(NavigationValue::One(Some(Box::new(target)))),
            Outcome::Entities { entities, .. } => Ok(NavigationValue::Many(entities)),
            Outcome::Empty => Ok(NavigationValue::One(None)),
            other => Err(Error::decode(format!(
                "Navigation {name} produced an unexpected result {other:?}"
            ))),
        }
    }
}

/// Requests addressed to one entity set or singleton
#[derive(Debug, Clone, Copy)]
pub struct EntitySetProxy<'s> {
    ctx: RequestContext<'s>,
    set: &'s EntitySet,
    entity_type: &'s EntityType,
}

impl<'s> EntitySetProxy<'s> {
    pub fn entity_set(&self) -> &'s EntitySet {
        self.set
    }

    pub fn entity_type(&self) -> &'s EntityType {
        self.entity_type
    }

    fn target(&self, path: String) -> Target<'s> {
        Target {
            path,
            entity_type: self.entity_type,
            entity_set: Some(self.set.name.clone()),
        }
    }

    fn collection_path(&self) -> Result<String> {
        if self.set.is_singleton {
            return Err(ProgramError::InvalidRequest(format!(
                "{} is a singleton, not an entity set",
                self.set.name
            ))
            .into());
        }
        Ok(encode_segment(&self.set.name.name))
    }

    /// Canonical path of one entity, e.g. `Orders(OrderID=1,ProductID=2)`
    pub fn entity_path(&self, key: Key) -> Result<String> {
        let key = EntityKey::new(&self.ctx.codec(), self.entity_type, key)?;
        Ok(format!("{}{}", self.collection_path()?, encode_segment(key.predicate())))
    }

    pub fn get_entity(&self, key: Key) -> Result<EntityGetBuilder<'s>> {
        Ok(EntityGetBuilder::new(self.ctx, self.target(self.entity_path(key)?)))
    }

    pub fn get_entities(&self) -> Result<QueryBuilder<'s>> {
        Ok(QueryBuilder::new(self.ctx, self.target(self.collection_path()?)))
    }

    /// `Set/$count`; filters may still be added
    pub fn count(&self) -> Result<QueryBuilder<'s>> {
        Ok(self.get_entities()?.count())
    }

    /// The singleton itself
    pub fn get(&self) -> Result<EntityGetBuilder<'s>> {
        if !self.set.is_singleton {
            return Err(ProgramError::InvalidRequest(format!(
                "{} is an entity set, address its entities by key",
                self.set.name
            ))
            .into());
        }
        let path = encode_segment(&self.set.name.name);
        Ok(EntityGetBuilder::new(self.ctx, self.target(path)))
    }

    pub fn create_entity(&self) -> Result<EntityWriteBuilder<'s>> {
        Ok(EntityWriteBuilder::new(
            self.ctx,
            self.target(self.collection_path()?),
            WriteKind::Create,
        ))
    }

    pub fn update_entity(&self, key: Key) -> Result<EntityWriteBuilder<'s>> {
        Ok(EntityWriteBuilder::new(
            self.ctx,
            self.target(self.entity_path(key)?),
            WriteKind::Update,
        ))
    }

    pub fn delete_entity(&self, key: Key) -> Result<ODataRequest> {
        Ok(ODataRequest::new(
            &self.ctx,
            Method::Delete,
            self.entity_path(key)?,
            Expect::Nothing,
        ))
    }

    /// Related entities of one entity: `Set(key)/Nav`
    pub fn navigate(&self, key: Key, navigation: &str) -> Result<NavigationQuery<'s>> {
        let property = self.entity_type.navigation_property(navigation)?;
        let nav_target = property.target()?;
        let entity_type = self
            .ctx
            .schema
            .entity_type(&nav_target.entity_type.to_string())?;
        let entity_set = self
            .set
            .binding(navigation)
            .map(|binding| binding.target.clone());
        let target = Target {
            path: format!("{}/{}", self.entity_path(key)?, encode_segment(navigation)),
            entity_type,
            entity_set,
        };
        Ok(if nav_target.multiplicity.is_many() {
            NavigationQuery::Collection(QueryBuilder::new(self.ctx, target))
        } else {
            NavigationQuery::Single(EntityGetBuilder::new(self.ctx, target))
        })
    }
}
