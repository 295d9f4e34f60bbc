//! Client configuration with builder pattern
//!
//! A `Config` is supplied once by the caller and threaded through metadata
//! parsing and request building. The library never mutates it.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use anyhow::Context as _;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::version::ODataVersion;

/// What the metadata parser does when an element is malformed or unresolvable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Abort the whole parse
    #[default]
    Fatal,
    /// Substitute a stub, record a diagnostic and log it
    Warning,
    /// Substitute a stub silently
    Ignore,
}

/// Server family whose value formats depart from the protocol defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Standard,
    /// `Edm.DateTime` travels as ISO 8601 UTC text in JSON
    SharePoint,
}

/// Kinds of metadata elements, used as error-policy keys and dispatch keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Schema,
    EntityType,
    ComplexType,
    EnumType,
    TypeDefinition,
    Property,
    NavigationProperty,
    NavigationPropertyBinding,
    ReferentialConstraint,
    Association,
    AssociationSet,
    EntitySet,
    Singleton,
    FunctionImport,
    ActionImport,
    Function,
    Action,
    Term,
    Annotations,
    Annotation,
}

impl ElementKind {
    /// Map an XML element's local name to its kind
    pub fn from_tag(local_name: &str) -> Option<Self> {
        let kind = match local_name {
            "Schema" => ElementKind::Schema,
            "EntityType" => ElementKind::EntityType,
            "ComplexType" => ElementKind::ComplexType,
            "EnumType" => ElementKind::EnumType,
            "TypeDefinition" => ElementKind::TypeDefinition,
            "Property" => ElementKind::Property,
            "NavigationProperty" => ElementKind::NavigationProperty,
            "NavigationPropertyBinding" => ElementKind::NavigationPropertyBinding,
            "ReferentialConstraint" => ElementKind::ReferentialConstraint,
            "Association" => ElementKind::Association,
            "AssociationSet" => ElementKind::AssociationSet,
            "EntitySet" => ElementKind::EntitySet,
            "Singleton" => ElementKind::Singleton,
            "FunctionImport" => ElementKind::FunctionImport,
            "ActionImport" => ElementKind::ActionImport,
            "Function" => ElementKind::Function,
            "Action" => ElementKind::Action,
            "Term" => ElementKind::Term,
            "Annotations" => ElementKind::Annotations,
            "Annotation" => ElementKind::Annotation,
            _ => return None,
        };
        Some(kind)
    }

    /// The XML element name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Schema => "Schema",
            ElementKind::EntityType => "EntityType",
            ElementKind::ComplexType => "ComplexType",
            ElementKind::EnumType => "EnumType",
            ElementKind::TypeDefinition => "TypeDefinition",
            ElementKind::Property => "Property",
            ElementKind::NavigationProperty => "NavigationProperty",
            ElementKind::NavigationPropertyBinding => "NavigationPropertyBinding",
            ElementKind::ReferentialConstraint => "ReferentialConstraint",
            ElementKind::Association => "Association",
            ElementKind::AssociationSet => "AssociationSet",
            ElementKind::EntitySet => "EntitySet",
            ElementKind::Singleton => "Singleton",
            ElementKind::FunctionImport => "FunctionImport",
            ElementKind::ActionImport => "ActionImport",
            ElementKind::Function => "Function",
            ElementKind::Action => "Action",
            ElementKind::Term => "Term",
            ElementKind::Annotations => "Annotations",
            ElementKind::Annotation => "Annotation",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Documented values substituted for properties missing from a payload
/// when `retain_null` is off.
///
/// The date/time default is an arbitrary reference instant kept for
/// compatibility with existing services; it carries no business meaning.
#[derive(Debug, Clone, PartialEq)]
pub struct NullDefaults {
    /// Used for `Edm.DateTime`, `Edm.DateTimeOffset` (at UTC) and `Edm.Date`
    pub datetime: NaiveDateTime,
}

/// Textual form of the default substitution instant
pub const DEFAULT_NULL_DATETIME: &str = "2000-01-01T00:00:00";

impl Default for NullDefaults {
    fn default() -> Self {
        let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default();
        Self {
            datetime: date.and_time(NaiveTime::default()),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Protocol version; selects the capability table used everywhere else
    pub version: ODataVersion,
    /// Overrides for recognized namespace URIs, keyed by `edmx` or `edm`
    pub xml_namespaces: HashMap<String, String>,
    pub default_error_policy: ErrorPolicy,
    pub custom_error_policies: HashMap<ElementKind, ErrorPolicy>,
    /// Keep absent properties as `Value::Absent` instead of substituting defaults
    pub retain_null: bool,
    pub null_defaults: NullDefaults,
    pub dialect: Dialect,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: ODataVersion::default(),
            xml_namespaces: HashMap::new(),
            default_error_policy: ErrorPolicy::Fatal,
            custom_error_policies: HashMap::new(),
            retain_null: false,
            null_defaults: NullDefaults::default(),
            dialect: Dialect::Standard,
        }
    }
}

impl Config {
    /// Default configuration for the given protocol version
    pub fn new(version: ODataVersion) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Create a builder for custom configuration
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Every malformed element aborts parsing
    pub fn strict(version: ODataVersion) -> Self {
        Self::new(version)
    }

    /// Malformed elements become stubs and are reported as diagnostics
    pub fn tolerant(version: ODataVersion) -> Self {
        Self {
            version,
            default_error_policy: ErrorPolicy::Warning,
            ..Self::default()
        }
    }

    /// Policy for one element kind, falling back to the default policy
    pub fn policy_for(&self, kind: ElementKind) -> ErrorPolicy {
        self.custom_error_policies
            .get(&kind)
            .copied()
            .unwrap_or(self.default_error_policy)
    }

    /// Recognized EDMX envelope namespaces
    pub fn edmx_namespaces(&self) -> Vec<&str> {
        self.namespaces("edmx", self.version.capabilities().edmx_namespaces())
    }

    /// Recognized EDM schema namespaces
    pub fn edm_namespaces(&self) -> Vec<&str> {
        self.namespaces("edm", self.version.capabilities().edm_namespaces())
    }

    fn namespaces<'a>(&'a self, prefix: &str, builtin: &'a [&'static str]) -> Vec<&'a str> {
        let mut namespaces: Vec<&str> = builtin.to_vec();
        if let Some(custom) = self.xml_namespaces.get(prefix) {
            namespaces.push(custom.as_str());
        }
        namespaces
    }

    /// Load configuration from a TOML document
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let file: ConfigFile =
            toml::from_str(text).context("Failed to parse client configuration")?;
        Ok(file.into_config())
    }

    /// Load configuration from a TOML file on disk
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }
}

/// On-disk shape of the configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    version: ODataVersion,
    xml_namespaces: HashMap<String, String>,
    default_error_policy: ErrorPolicy,
    custom_error_policies: HashMap<ElementKind, ErrorPolicy>,
    retain_null: bool,
    null_datetime: Option<NaiveDateTime>,
    dialect: Dialect,
}

impl ConfigFile {
    fn into_config(self) -> Config {
        let mut null_defaults = NullDefaults::default();
        if let Some(datetime) = self.null_datetime {
            null_defaults.datetime = datetime;
        }
        Config {
            version: self.version,
            xml_namespaces: self.xml_namespaces,
            default_error_policy: self.default_error_policy,
            custom_error_policies: self.custom_error_policies,
            retain_null: self.retain_null,
            null_defaults,
            dialect: self.dialect,
        }
    }
}

/// Builder for `Config`
#[derive(Debug)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn version(mut self, version: ODataVersion) -> Self {
        self.config.version = version;
        self
    }

    pub fn default_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.config.default_error_policy = policy;
        self
    }

    /// Override the policy for a single element kind
    pub fn error_policy(mut self, kind: ElementKind, policy: ErrorPolicy) -> Self {
        self.config.custom_error_policies.insert(kind, policy);
        self
    }

    pub fn xml_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.config.xml_namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn retain_null(mut self, retain: bool) -> Self {
        self.config.retain_null = retain;
        self
    }

    pub fn null_datetime(mut self, datetime: NaiveDateTime) -> Self {
        self.config.null_defaults.datetime = datetime;
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.config.dialect = dialect;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, ODataVersion::V2);
        assert_eq!(config.default_error_policy, ErrorPolicy::Fatal);
        assert!(!config.retain_null);
        assert_eq!(
            config.null_defaults.datetime.to_string(),
            "2000-01-01 00:00:00"
        );
    }

    #[test]
    fn test_policy_lookup_falls_back_to_default() {
        let config = Config::builder()
            .default_error_policy(ErrorPolicy::Warning)
            .error_policy(ElementKind::Property, ErrorPolicy::Ignore)
            .build();

        assert_eq!(config.policy_for(ElementKind::Property), ErrorPolicy::Ignore);
        assert_eq!(
            config.policy_for(ElementKind::NavigationProperty),
            ErrorPolicy::Warning
        );
    }

    #[test]
    fn test_tolerant_preset() {
        let config = Config::tolerant(ODataVersion::V4);
        assert_eq!(config.version, ODataVersion::V4);
        assert_eq!(config.policy_for(ElementKind::EntitySet), ErrorPolicy::Warning);
    }

    #[test]
    fn test_custom_namespace_is_recognized() {
        let config = Config::builder()
            .xml_namespace("edm", "http://example.com/custom/edm")
            .build();
        let namespaces = config.edm_namespaces();
        assert!(namespaces.contains(&"http://example.com/custom/edm"));
        assert!(namespaces.contains(&"http://schemas.microsoft.com/ado/2008/09/edm"));
    }

    #[test]
    fn test_from_toml() {
        let config = Config::from_toml_str(
            r#"
version = "v4"
default_error_policy = "warning"
retain_null = true
null_datetime = "1990-05-01T12:00:00"
dialect = "sharepoint"

[custom_error_policies]
navigation_property = "ignore"

[xml_namespaces]
edmx = "http://example.com/edmx"
"#,
        )
        .unwrap();

        assert_eq!(config.version, ODataVersion::V4);
        assert_eq!(config.default_error_policy, ErrorPolicy::Warning);
        assert_eq!(
            config.policy_for(ElementKind::NavigationProperty),
            ErrorPolicy::Ignore
        );
        assert!(config.retain_null);
        assert_eq!(
            config.null_defaults.datetime.to_string(),
            "1990-05-01 12:00:00"
        );
        assert!(config.edmx_namespaces().contains(&"http://example.com/edmx"));
        assert_eq!(config.dialect, Dialect::SharePoint);
    }

    #[test]
    fn test_from_toml_rejects_unknown_policy() {
        let result = Config::from_toml_str("default_error_policy = \"explode\"");
        assert!(result.is_err());
    }
}
