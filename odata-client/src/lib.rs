//! Typed OData client
//!
//! Parses a service's CSDL metadata (V2, V3 or V4) into an immutable
//! [`Schema`], renders typed requests against it, and decodes responses into
//! [`EntityProxy`] values. Requests can be grouped into multipart batches.
//! All I/O goes through an injected [`Transport`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use odata_client::{Config, Filter, Key, ODataVersion, ReqwestTransport, Service};
//!
//! # async fn run() -> odata_client::Result<()> {
//! let service = Service::connect(
//!     "https://services.odata.org/V2/Northwind/Northwind.svc",
//!     Arc::new(ReqwestTransport::new()),
//!     Config::new(ODataVersion::V2),
//! )
//! .await?;
//!
//! let customers = service.entity_set("Customers")?;
//! let request = customers
//!     .get_entities()?
//!     .filter(Filter::starts_with("CompanyName", "Al"))
//!     .top(5)
//!     .build()?;
//! for customer in service.execute(&request).await?.into_entities()? {
//!     println!("{}", customer.get_as::<String>("CompanyName")?);
//! }
//!
//! let alfki = customers.get_entity(Key::single("ALFKI"))?.build()?;
//! let entity = service.execute(&alfki).await?.into_entity()?;
//! println!("{:?}", entity.path());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod metadata;
pub mod model;
pub mod observer;
pub mod proxy;
pub mod query;
pub mod service;
pub mod transport;
pub mod types;
pub mod vendor;
pub mod version;

pub use batch::{Batch, BatchItem, Changeset, PartResult, SlotResult};
pub use config::{Config, ConfigBuilder, Dialect, ElementKind, ErrorPolicy, NullDefaults};
pub use error::{
    BatchPartError, Error, HttpError, MetadataParsingError, ModelError, ProgramError, Result,
    ValueError,
};
pub use metadata::parse;
pub use model::{QualifiedName, Schema};
pub use observer::{LastCallObserver, RequestObserver};
pub use proxy::{EntityProxy, Navigation, NavigationValue};
pub use query::{
    CountMode, Direction, EntityKey, Expect, Filter, Key, ODataRequest, OrderBy, Outcome,
    RequestContext,
};
pub use service::{EntitySetProxy, Service};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{HttpRequest, HttpResponse, Method, Transport, TransportError};
pub use types::{EdmType, Facets, Value};
pub use vendor::{ErrorDetails, HttpErrorParser, ODataErrorParser, SapGatewayErrorParser};
pub use version::ODataVersion;
