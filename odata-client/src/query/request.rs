//! Rendered requests and what their responses are decoded into

use std::fmt::Write as _;

use crate::model::{PropertyType, QualifiedName, Schema};
use crate::config::Config;
use crate::transport::{HttpRequest, Method};
use crate::types::ValueCodec;
use crate::version::{Capabilities, Conventions, ODataVersion};

/// Everything a builder needs: the immutable schema and the caller's configuration
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub schema: &'a Schema,
    pub config: &'a Config,
}

impl<'a> RequestContext<'a> {
    pub fn new(schema: &'a Schema, config: &'a Config) -> Self {
        Self { schema, config }
    }

    pub fn codec(&self) -> ValueCodec<'a> {
        ValueCodec::new(self.schema, self.config)
    }

    pub fn capabilities(&self) -> &'static Capabilities {
        self.config.version.capabilities()
    }

    pub fn conventions(&self) -> &'static Conventions {
        &self.capabilities().conventions
    }
}

/// How a successful response body is read back
#[derive(Debug, Clone, PartialEq)]
pub enum Expect {
    /// A single entity of the given type
    Entity {
        entity_type: QualifiedName,
        entity_set: Option<QualifiedName>,
    },
    /// A collection of entities, possibly with an inline count and a next link
    Entities {
        entity_type: QualifiedName,
        entity_set: Option<QualifiedName>,
    },
    /// A plain-text `$count` body
    Count,
    /// A non-entity function result, keyed by the function name in V2 payloads
    Value { function: String, typ: PropertyType },
    /// No body expected
    Nothing,
}

/// A request rendered from the schema, not yet bound to a service URL.
///
/// `path` is relative to the service root and already percent-encoded;
/// `query` keeps option order and holds raw values, encoded on output.
#[derive(Debug, Clone, PartialEq)]
pub struct ODataRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub expect: Expect,
    /// Statuses accepted as success
    pub success: Vec<u16>,
}

impl ODataRequest {
    pub(crate) fn new(ctx: &RequestContext<'_>, method: Method, path: String, expect: Expect) -> Self {
        Self::for_version(ctx.config.version, method, path, expect)
    }

    pub(crate) fn for_version(
        version: ODataVersion,
        method: Method,
        path: String,
        expect: Expect,
    ) -> Self {
        let mut headers: Vec<(String, String)> = version
            .capabilities()
            .conventions
            .version_headers
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        headers.push(("Accept".to_string(), "application/json".to_string()));
        let success = match method {
            Method::Post if matches!(expect, Expect::Entity { .. }) => vec![201, 204],
            Method::Put | Method::Patch | Method::Merge | Method::Delete => vec![200, 204],
            _ => vec![200],
        };
        Self {
            method,
            path,
            query: Vec::new(),
            headers,
            body: None,
            expect,
            success,
        }
    }

    pub(crate) fn with_json_body(mut self, body: String) -> Self {
        self.headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        self.body = Some(body);
        self
    }

    /// Add a header such as `If-Match` before sending
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn query_option(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn accepts(&self, status: u16) -> bool {
        self.success.contains(&status)
    }

    /// Encoded query string without the leading `?`
    pub fn query_string(&self) -> String {
        let mut out = String::new();
        for (i, (name, value)) in self.query.iter().enumerate() {
            if i > 0 {
                out.push('&');
            }
            let _ = write!(out, "{}={}", encode_option_name(name), urlencoding::encode(value));
        }
        out
    }

    /// Path plus query string, relative to the service root
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query_string())
        }
    }

    pub fn url(&self, service_root: &str) -> String {
        format!(
            "{}/{}",
            service_root.trim_end_matches('/'),
            self.path_and_query()
        )
    }

    /// Short description used in log lines and error messages
    pub fn describe(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    pub fn to_http(&self, service_root: &str) -> HttpRequest {
        HttpRequest {
            method: self.method,
            url: self.url(service_root),
            headers: self.headers.clone(),
            body: self.body.as_ref().map(|body| body.as_bytes().to_vec()),
        }
    }
}

/// Percent-encode a path segment, keeping the characters that structure
/// key predicates and literals (`'(),=:`) readable
pub(crate) fn encode_segment(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'.'
            | b'_'
            | b'~'
            | b'\''
            | b'('
            | b')'
            | b','
            | b'='
            | b':'
            | b'@'
            | b'$'
            | b'!'
            | b'*'
            | b'+'
            | b';' => out.push(byte as char),
            other => {
                let _ = write!(out, "%{other:02X}");
            }
        }
    }
    out
}

/// Percent-encode a query option name, keeping the `$` of system options
fn encode_option_name(name: &str) -> String {
    name.split('$')
        .map(|part| urlencoding::encode(part).into_owned())
        .collect::<Vec<_>>()
        .join("$")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_query_values_are_encoded_in_order() {
        let schema = Schema::default();
        let config = Config::new(ODataVersion::V4);
        let ctx = RequestContext::new(&schema, &config);
        let mut request = ODataRequest::new(&ctx, Method::Get, "Cars".to_string(), Expect::Count);
        request.query.push(("$filter".to_string(), "Model eq 'A&B'".to_string()));
        request.query.push(("$top".to_string(), "2".to_string()));

        assert_eq!(
            request.url("http://example.com/odata/"),
            "http://example.com/odata/Cars?$filter=Model%20eq%20%27A%26B%27&$top=2"
        );
        assert_eq!(request.header("odata-version"), Some("4.0"));
        assert_eq!(request.header("Accept"), Some("application/json"));
        assert!(request.accepts(200));
    }

    #[test]
    fn test_custom_option_names_are_encoded() {
        let schema = Schema::default();
        let config = Config::new(ODataVersion::V2);
        let ctx = RequestContext::new(&schema, &config);
        let mut request = ODataRequest::new(&ctx, Method::Get, "Employees".to_string(), Expect::Count);
        request.query.push(("$top".to_string(), "2".to_string()));
        request.query.push(("sap-client".to_string(), "100".to_string()));
        request.query.push(("a b&c=d".to_string(), "x=y".to_string()));

        assert_eq!(
            request.query_string(),
            "$top=2&sap-client=100&a%20b%26c%3Dd=x%3Dy"
        );
    }

    #[test]
    fn test_success_statuses_by_method() {
        let schema = Schema::default();
        let config = Config::new(ODataVersion::V2);
        let ctx = RequestContext::new(&schema, &config);
        let entity = Expect::Entity {
            entity_type: QualifiedName::new("EPM", "Employee"),
            entity_set: None,
        };
        let create = ODataRequest::new(&ctx, Method::Post, "Employees".into(), entity);
        assert_eq!(create.success, [201, 204]);
        let delete = ODataRequest::new(&ctx, Method::Delete, "Employees(1)".into(), Expect::Nothing);
        assert_eq!(delete.success, [200, 204]);
        assert_eq!(delete.header("DataServiceVersion"), Some("2.0"));
    }

    #[test]
    fn test_segment_encoding() {
        assert_eq!(encode_segment("Customers('A B/C')"), "Customers('A%20B%2FC')");
        assert_eq!(encode_segment("Cars(ID=1,Model='X')"), "Cars(ID=1,Model='X')");
        assert_eq!(encode_segment("Städte"), "St%C3%A4dte");
    }
}
