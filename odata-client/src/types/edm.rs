//! EDM primitive type identifiers

use std::fmt;

/// Every primitive type known to any supported protocol version.
///
/// Which of them a given version accepts is decided by its capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdmType {
    Binary,
    Boolean,
    Byte,
    SByte,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    String,
    Guid,
    DateTime,
    DateTimeOffset,
    Time,
    Date,
    TimeOfDay,
    Duration,
    Stream,
    Geography,
    GeographyPoint,
    GeographyLineString,
    GeographyPolygon,
    GeographyMultiPoint,
    GeographyMultiLineString,
    GeographyMultiPolygon,
    GeographyCollection,
}

const NAMES: &[(EdmType, &str)] = &[
    (EdmType::Binary, "Edm.Binary"),
    (EdmType::Boolean, "Edm.Boolean"),
    (EdmType::Byte, "Edm.Byte"),
    (EdmType::SByte, "Edm.SByte"),
    (EdmType::Int16, "Edm.Int16"),
    (EdmType::Int32, "Edm.Int32"),
    (EdmType::Int64, "Edm.Int64"),
    (EdmType::Single, "Edm.Single"),
    (EdmType::Double, "Edm.Double"),
    (EdmType::Decimal, "Edm.Decimal"),
    (EdmType::String, "Edm.String"),
    (EdmType::Guid, "Edm.Guid"),
    (EdmType::DateTime, "Edm.DateTime"),
    (EdmType::DateTimeOffset, "Edm.DateTimeOffset"),
    (EdmType::Time, "Edm.Time"),
    (EdmType::Date, "Edm.Date"),
    (EdmType::TimeOfDay, "Edm.TimeOfDay"),
    (EdmType::Duration, "Edm.Duration"),
    (EdmType::Stream, "Edm.Stream"),
    (EdmType::Geography, "Edm.Geography"),
    (EdmType::GeographyPoint, "Edm.GeographyPoint"),
    (EdmType::GeographyLineString, "Edm.GeographyLineString"),
    (EdmType::GeographyPolygon, "Edm.GeographyPolygon"),
    (EdmType::GeographyMultiPoint, "Edm.GeographyMultiPoint"),
    (EdmType::GeographyMultiLineString, "Edm.GeographyMultiLineString"),
    (EdmType::GeographyMultiPolygon, "Edm.GeographyMultiPolygon"),
    (EdmType::GeographyCollection, "Edm.GeographyCollection"),
];

impl EdmType {
    /// Qualified name, e.g. `Edm.Int32`
    pub fn name(self) -> &'static str {
        NAMES
            .iter()
            .find(|(edm, _)| *edm == self)
            .map(|(_, name)| *name)
            .unwrap_or("Edm.Unknown")
    }

    /// Look up a type by its qualified name
    pub fn from_name(name: &str) -> Option<Self> {
        NAMES
            .iter()
            .find(|(_, candidate)| *candidate == name)
            .map(|(edm, _)| *edm)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            EdmType::Byte | EdmType::SByte | EdmType::Int16 | EdmType::Int32 | EdmType::Int64
        )
    }

    /// Whether values of this type may appear in a key or filter literal
    pub fn has_literal(self) -> bool {
        !matches!(self, EdmType::Stream) && !self.is_spatial()
    }

    pub fn is_spatial(self) -> bool {
        matches!(
            self,
            EdmType::Geography
                | EdmType::GeographyPoint
                | EdmType::GeographyLineString
                | EdmType::GeographyPolygon
                | EdmType::GeographyMultiPoint
                | EdmType::GeographyMultiLineString
                | EdmType::GeographyMultiPolygon
                | EdmType::GeographyCollection
        )
    }

    /// Inclusive range of the integer types
    pub(crate) fn integer_range(self) -> Option<(i64, i64)> {
        match self {
            EdmType::Byte => Some((u8::MIN as i64, u8::MAX as i64)),
            EdmType::SByte => Some((i8::MIN as i64, i8::MAX as i64)),
            EdmType::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            EdmType::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            EdmType::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}

impl fmt::Display for EdmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_lookup_is_symmetric() {
        for (edm, name) in NAMES {
            assert_eq!(edm.name(), *name);
            assert_eq!(EdmType::from_name(name), Some(*edm));
        }
        assert_eq!(EdmType::from_name("Edm.Money"), None);
    }

    #[test]
    fn test_integer_ranges() {
        assert_eq!(EdmType::Byte.integer_range(), Some((0, 255)));
        assert_eq!(EdmType::SByte.integer_range(), Some((-128, 127)));
        assert_eq!(EdmType::String.integer_range(), None);
        assert!(EdmType::Int64.is_integer());
        assert!(!EdmType::Decimal.is_integer());
    }

    #[test]
    fn test_spatial_types_have_no_literal() {
        assert!(!EdmType::GeographyPoint.has_literal());
        assert!(!EdmType::Stream.has_literal());
        assert!(EdmType::Guid.has_literal());
    }
}
