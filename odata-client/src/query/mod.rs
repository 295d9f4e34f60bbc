//! Request construction and response decoding
//!
//! Builders render an [`ODataRequest`] from the schema without touching the
//! network. [`result::decode`] turns an accepted response back into an
//! [`Outcome`].

pub mod builder;
pub mod filters;
pub mod key;
pub mod orderby;
pub mod request;
pub mod result;

pub use builder::{
    CountMode, EntityGetBuilder, EntityWriteBuilder, FunctionBuilder, NavigationQuery, QueryBuilder,
};
pub use filters::{Comparison, Filter, Matching};
pub use key::{EntityKey, Key};
pub use orderby::{Direction, OrderBy};
pub use request::{Expect, ODataRequest, RequestContext};
pub use result::Outcome;
