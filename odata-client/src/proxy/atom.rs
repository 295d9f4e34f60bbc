//! Atom/XML payloads, as still returned by many V2 services

use roxmltree::{Document, Node};

use super::json::Page;
use super::{EntityProxy, EntitySource, NavigationPayload, assemble};
use crate::error::{Error, Result};
use crate::model::{EntityType, NavigationProperty, Property, PropertyType, QualifiedName};
use crate::query::request::RequestContext;
use crate::types::{Facets, Value};

const RELATED: &str = "/related/";

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == name)
}

fn attribute<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|a| a.name() == name)
        .map(|a| a.value())
}

fn parse_document(text: &str) -> Result<Document<'_>> {
    Document::parse(text).map_err(|e| Error::decode(format!("Malformed Atom payload: {e}")))
}

struct AtomEntry<'a, 'input> {
    entry: Node<'a, 'input>,
    /// `m:properties`, inside `content` or directly under the entry for media entries
    properties: Option<Node<'a, 'input>>,
}

impl<'a, 'input> AtomEntry<'a, 'input> {
    fn new(entry: Node<'a, 'input>) -> Self {
        let properties = child(entry, "content")
            .and_then(|content| child(content, "properties"))
            .or_else(|| child(entry, "properties"));
        Self { entry, properties }
    }

    fn link(&self, navigation: &str) -> Option<Node<'a, 'input>> {
        children(self.entry, "link").find(|link| {
            attribute(*link, "rel")
                .and_then(|rel| rel.rsplit_once(RELATED))
                .is_some_and(|(_, name)| name == navigation)
        })
    }
}

impl EntitySource for AtomEntry<'_, '_> {
    fn type_name(&self) -> Option<String> {
        child(self.entry, "category")
            .and_then(|category| attribute(category, "term"))
            .map(str::to_string)
    }

    fn etag(&self) -> Option<String> {
        attribute(self.entry, "etag").map(str::to_string)
    }

    fn property(
        &self,
        ctx: &RequestContext<'_>,
        property: &Property,
        typ: &PropertyType,
    ) -> Result<Option<Value>> {
        let Some(element) = self.properties.and_then(|props| child(props, &property.name)) else {
            return Ok(None);
        };
        ctx.codec()
            .from_xml(typ, element, &property.facets)
            .map(Some)
    }

    fn navigation(
        &self,
        ctx: &RequestContext<'_>,
        navigation: &NavigationProperty,
        target: &EntityType,
        target_set: Option<&QualifiedName>,
        many: bool,
    ) -> Result<NavigationPayload> {
        let Some(link) = self.link(&navigation.name) else {
            return Ok(NavigationPayload::Absent);
        };
        let Some(inline) = child(link, "inline") else {
            return Ok(NavigationPayload::Deferred(
                attribute(link, "href").map(str::to_string),
            ));
        };
        if let Some(feed) = child(inline, "feed") {
            let entities = children(feed, "entry")
                .map(|entry| decode_entry(ctx, target, target_set, entry))
                .collect::<Result<Vec<_>>>()?;
            return Ok(NavigationPayload::Many(entities));
        }
        match child(inline, "entry") {
            Some(entry) => Ok(NavigationPayload::One(Some(decode_entry(
                ctx, target, target_set, entry,
            )?))),
            None if many => Ok(NavigationPayload::Many(Vec::new())),
            None => Ok(NavigationPayload::One(None)),
        }
    }
}

fn decode_entry(
    ctx: &RequestContext<'_>,
    entity_type: &EntityType,
    entity_set: Option<&QualifiedName>,
    entry: Node<'_, '_>,
) -> Result<EntityProxy> {
    assemble(ctx, entity_type, entity_set, &AtomEntry::new(entry))
}

/// Decode an `<entry>` document
pub(crate) fn decode_entity_document(
    ctx: &RequestContext<'_>,
    entity_type: &EntityType,
    entity_set: Option<&QualifiedName>,
    text: &str,
) -> Result<EntityProxy> {
    let document = parse_document(text)?;
    let root = document.root_element();
    if root.tag_name().name() != "entry" {
        return Err(Error::decode(format!(
            "Expected an Atom entry, got <{}>",
            root.tag_name().name()
        )));
    }
    decode_entry(ctx, entity_type, entity_set, root)
}

/// Decode a `<feed>` document with its `m:count` and next link
pub(crate) fn decode_feed_document(
    ctx: &RequestContext<'_>,
    entity_type: &EntityType,
    entity_set: Option<&QualifiedName>,
    text: &str,
) -> Result<Page> {
    let document = parse_document(text)?;
    let feed = document.root_element();
    if feed.tag_name().name() != "feed" {
        return Err(Error::decode(format!(
            "Expected an Atom feed, got <{}>",
            feed.tag_name().name()
        )));
    }
    let entities = children(feed, "entry")
        .map(|entry| decode_entry(ctx, entity_type, entity_set, entry))
        .collect::<Result<Vec<_>>>()?;
    let count = child(feed, "count")
        .and_then(|count| count.text())
        .and_then(|text| text.trim().parse().ok());
    let next_link = children(feed, "link")
        .find(|link| attribute(*link, "rel") == Some("next"))
        .and_then(|link| attribute(link, "href"))
        .map(str::to_string);
    Ok(Page {
        entities,
        count,
        next_link,
    })
}

/// Decode a function result such as `<d:sum>6</d:sum>`
pub(crate) fn decode_value_document(
    ctx: &RequestContext<'_>,
    typ: &PropertyType,
    text: &str,
) -> Result<Value> {
    let document = parse_document(text)?;
    ctx.codec()
        .from_xml(typ, document.root_element(), &Facets::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::metadata::parse;
    use crate::model::Schema;
    use crate::proxy::{Navigation, NavigationValue};
    use crate::types::EdmType;
    use crate::version::ODataVersion;
    use pretty_assertions::assert_eq;

    const EPM: &str = include_str!("../../tests/fixtures/sap_epm_v2.xml");

    const ENTRY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<entry xmlns="http://www.w3.org/2005/Atom"
       xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata"
       xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices"
       m:etag="W/&quot;7&quot;">
  <id>http://x/Employees(23)</id>
  <category term="EPM.Employee" scheme="http://schemas.microsoft.com/ado/2007/08/dataservices/scheme"/>
  <link rel="edit" href="Employees(23)"/>
  <link rel="http://schemas.microsoft.com/ado/2007/08/dataservices/related/Addresses"
        type="application/atom+xml;type=feed" href="Employees(23)/Addresses">
    <m:inline>
      <feed>
        <entry>
          <category term="EPM.AddressEntity"/>
          <content type="application/xml">
            <m:properties><d:ID m:type="Edm.Int32">4</d:ID><d:City>Brno</d:City></m:properties>
          </content>
        </entry>
      </feed>
    </m:inline>
  </link>
  <content type="application/xml">
    <m:properties>
      <d:ID m:type="Edm.Int32">23</d:ID>
      <d:NameFirst>Rob</d:NameFirst>
      <d:Age m:null="true"/>
      <d:Location><d:City>Praha</d:City></d:Location>
    </m:properties>
  </content>
</entry>"#;

    fn epm() -> (Schema, Config) {
        let config = Config::new(ODataVersion::V2);
        (parse(EPM.as_bytes(), &config).unwrap(), config)
    }

    #[test]
    fn test_entry_with_inline_feed() {
        let (schema, config) = epm();
        let ctx = RequestContext::new(&schema, &config);
        let set = schema.entity_set("Employees").unwrap();
        let employee = schema.entity_type_of(set).unwrap();

        let entity = decode_entity_document(&ctx, employee, Some(&set.name), ENTRY).unwrap();
        assert_eq!(entity.get_as::<i32>("ID").unwrap(), 23);
        assert_eq!(entity.get("Age").unwrap(), &Value::Null);
        assert_eq!(
            entity.get("Location").unwrap().field("City"),
            Some(&Value::String("Praha".to_string()))
        );
        assert_eq!(entity.etag(), Some("W/\"7\""));
        assert_eq!(entity.path(), Some("Employees(23)"));

        let Navigation::Loaded(NavigationValue::Many(addresses)) =
            entity.navigation("Addresses").unwrap()
        else {
            panic!("addresses should be inline");
        };
        assert_eq!(addresses.len(), 1);
        assert_eq!(addresses[0].path(), Some("Addresses(4)"));
    }

    #[test]
    fn test_feed_count_and_next_link() {
        let (schema, config) = epm();
        let ctx = RequestContext::new(&schema, &config);
        let set = schema.entity_set("Addresses").unwrap();
        let address = schema.entity_type_of(set).unwrap();
        let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom"
              xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata"
              xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices">
          <m:count>40</m:count>
          <entry><m:properties><d:ID>1</d:ID></m:properties></entry>
          <entry><m:properties><d:ID>2</d:ID></m:properties></entry>
          <link rel="next" href="Addresses?$skiptoken=2"/>
        </feed>"#;

        let page = decode_feed_document(&ctx, address, Some(&set.name), feed).unwrap();
        assert_eq!(page.count, Some(40));
        assert_eq!(page.next_link.as_deref(), Some("Addresses?$skiptoken=2"));
        let ids: Vec<i32> = page
            .entities
            .iter()
            .map(|e| e.get_as::<i32>("ID").unwrap())
            .collect();
        assert_eq!(ids, [1, 2]);
    }

    #[test]
    fn test_function_value_and_wrong_root() {
        let (schema, config) = epm();
        let ctx = RequestContext::new(&schema, &config);
        let int32 = PropertyType::Primitive(EdmType::Int32);
        let text = r#"<d:sum xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices">6</d:sum>"#;
        assert_eq!(decode_value_document(&ctx, &int32, text).unwrap(), Value::Int32(6));

        let employee = schema.entity_type("Employee").unwrap();
        assert!(matches!(
            decode_entity_document(&ctx, employee, None, "<feed/>"),
            Err(Error::Decode(_))
        ));
    }
}
