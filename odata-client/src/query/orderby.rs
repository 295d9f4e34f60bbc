//! `$orderby` clauses

use crate::error::Result;
use crate::model::EntityType;
use crate::query::filters::resolve_path;
use crate::query::request::RequestContext;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub property: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Descending,
        }
    }

    pub(crate) fn render(&self, ctx: &RequestContext<'_>, entity_type: &EntityType) -> Result<String> {
        resolve_path(ctx, entity_type, &self.property)?;
        Ok(match self.direction {
            Direction::Ascending => self.property.clone(),
            Direction::Descending => format!("{} desc", self.property),
        })
    }
}

impl From<&str> for OrderBy {
    fn from(property: &str) -> Self {
        OrderBy::asc(property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::metadata::parse;
    use crate::version::ODataVersion;

    #[test]
    fn test_render_checks_property() {
        let config = Config::new(ODataVersion::V2);
        let schema = parse(
            include_str!("../../tests/fixtures/sap_epm_v2.xml").as_bytes(),
            &config,
        )
        .unwrap();
        let ctx = RequestContext::new(&schema, &config);
        let employee = schema.entity_type("Employee").unwrap();

        assert_eq!(OrderBy::desc("Age").render(&ctx, employee).unwrap(), "Age desc");
        assert_eq!(OrderBy::from("Location/City").render(&ctx, employee).unwrap(), "Location/City");
        assert!(OrderBy::asc("Shoe").render(&ctx, employee).is_err());
    }
}
