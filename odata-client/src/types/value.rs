//! Native value representation for EDM-typed data

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use super::EdmType;
use crate::error::ValueError;

/// A decoded property, parameter or key value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Explicit null
    #[default]
    Null,
    /// The property was not present in the payload at all
    Absent,
    Boolean(bool),
    Byte(u8),
    SByte(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Single(f32),
    Double(f64),
    /// Decimal with explicit scale
    Decimal(Decimal),
    String(String),
    Binary(Vec<u8>),
    Guid(Uuid),
    /// Date and time without offset
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Date(NaiveDate),
    TimeOfDay(NaiveTime),
    Duration(EdmDuration),
    Enum(EnumValue),
    /// Complex value as ordered property/value pairs
    Complex(Vec<(String, Value)>),
    Collection(Vec<Value>),
    /// Opaque JSON carried through untouched (streams, geography)
    Json(serde_json::Value),
}

impl Value {
    /// Check if this value is an explicit null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value was missing from the payload
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get any integer width as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(*v as i64),
            Value::SByte(v) => Some(*v as i64),
            Value::Int16(v) => Some(*v as i64),
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as float, widening integers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Single(f) => Some(*f as f64),
            Value::Double(f) => Some(*f),
            Value::Decimal(d) => d.to_f64(),
            _ => self.as_i64().map(|i| i as f64),
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            _ => self.as_i64().map(Decimal::from),
        }
    }

    /// Try to get as GUID
    pub fn as_guid(&self) -> Option<Uuid> {
        match self {
            Value::Guid(g) => Some(*g),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_datetime_offset(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Value::DateTimeOffset(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_time_of_day(&self) -> Option<NaiveTime> {
        match self {
            Value::TimeOfDay(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<&EdmDuration> {
        match self {
            Value::Duration(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            Value::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// Look up a member of a complex value
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Complex(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[Value]> {
        match self {
            Value::Collection(items) => Some(items),
            _ => None,
        }
    }

    /// Short label of the variant, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Absent => "absent",
            Value::Boolean(_) => "Boolean",
            Value::Byte(_) => "Byte",
            Value::SByte(_) => "SByte",
            Value::Int16(_) => "Int16",
            Value::Int32(_) => "Int32",
            Value::Int64(_) => "Int64",
            Value::Single(_) => "Single",
            Value::Double(_) => "Double",
            Value::Decimal(_) => "Decimal",
            Value::String(_) => "String",
            Value::Binary(_) => "Binary",
            Value::Guid(_) => "Guid",
            Value::DateTime(_) => "DateTime",
            Value::DateTimeOffset(_) => "DateTimeOffset",
            Value::Date(_) => "Date",
            Value::TimeOfDay(_) => "TimeOfDay",
            Value::Duration(_) => "Duration",
            Value::Enum(_) => "Enum",
            Value::Complex(_) => "Complex",
            Value::Collection(_) => "Collection",
            Value::Json(_) => "Json",
        }
    }

    /// Convert numeric values to the representation `target` expects.
    ///
    /// Integers widen or narrow with range checks, integers and floats become
    /// decimals or floats. Anything else is returned unchanged.
    pub fn coerce(&self, target: EdmType) -> Result<Value, ValueError> {
        if let (Some(wide), Some(_)) = (self.as_i64(), target.integer_range()) {
            return integer_value(target, wide);
        }
        let coerced = match (target, self) {
            (EdmType::Decimal, Value::Single(f)) => Decimal::from_str(&f.to_string())
                .map(Value::Decimal)
                .map_err(|_| out_of_range(target, self))?,
            (EdmType::Decimal, Value::Double(f)) => Decimal::from_str(&f.to_string())
                .map(Value::Decimal)
                .map_err(|_| out_of_range(target, self))?,
            (EdmType::Decimal, _) => match self.as_i64() {
                Some(wide) => Value::Decimal(Decimal::from(wide)),
                None => self.clone(),
            },
            (EdmType::Double, Value::Single(f)) => Value::Double(*f as f64),
            (EdmType::Double, _) => match self.as_i64() {
                Some(wide) => Value::Double(wide as f64),
                None => self.clone(),
            },
            (EdmType::Single, Value::Double(f)) => Value::Single(*f as f32),
            (EdmType::Single, _) => match self.as_i64() {
                Some(wide) => Value::Single(wide as f32),
                None => self.clone(),
            },
            _ => self.clone(),
        };
        Ok(coerced)
    }
}

/// Build the integer variant for `edm`, checking its range
pub(crate) fn integer_value(edm: EdmType, wide: i64) -> Result<Value, ValueError> {
    let value = match edm {
        EdmType::Byte => u8::try_from(wide).ok().map(Value::Byte),
        EdmType::SByte => i8::try_from(wide).ok().map(Value::SByte),
        EdmType::Int16 => i16::try_from(wide).ok().map(Value::Int16),
        EdmType::Int32 => i32::try_from(wide).ok().map(Value::Int32),
        EdmType::Int64 => Some(Value::Int64(wide)),
        _ => None,
    };
    value.ok_or_else(|| ValueError::OutOfRange {
        edm: edm.to_string(),
        value: wide.to_string(),
    })
}

fn out_of_range(edm: EdmType, value: &Value) -> ValueError {
    ValueError::OutOfRange {
        edm: edm.to_string(),
        value: value.to_string(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "(null)"),
            Value::Absent => write!(f, "(absent)"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Byte(v) => write!(f, "{}", v),
            Value::SByte(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Single(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{}", s),
            Value::Binary(b) => write!(f, "<{} bytes>", b.len()),
            Value::Guid(g) => write!(f, "{}", g),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            Value::DateTimeOffset(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Date(d) => write!(f, "{}", d),
            Value::TimeOfDay(t) => write!(f, "{}", t),
            Value::Duration(d) => write!(f, "{}", d),
            Value::Enum(e) => write!(f, "{}", e),
            Value::Complex(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
            Value::Collection(items) => write!(f, "[{} items]", items.len()),
            Value::Json(json) => write!(f, "{}", json),
        }
    }
}

macro_rules! value_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from(value: $source) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

value_from! {
    bool => Boolean,
    u8 => Byte,
    i8 => SByte,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Single,
    f64 => Double,
    Decimal => Decimal,
    String => String,
    Vec<u8> => Binary,
    Uuid => Guid,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    NaiveDate => Date,
    NaiveTime => TimeOfDay,
    EdmDuration => Duration,
    EnumValue => Enum,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Extraction of native Rust values from a `Value`
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! from_value {
    ($($target:ty => $accessor:expr),* $(,)?) => {
        $(
            impl FromValue for $target {
                fn from_value(value: &Value) -> Option<Self> {
                    $accessor(value)
                }
            }
        )*
    };
}

from_value! {
    bool => Value::as_bool,
    i64 => Value::as_i64,
    i32 => |v: &Value| v.as_i64().and_then(|i| i32::try_from(i).ok()),
    i16 => |v: &Value| v.as_i64().and_then(|i| i16::try_from(i).ok()),
    u8 => |v: &Value| v.as_i64().and_then(|i| u8::try_from(i).ok()),
    f64 => Value::as_f64,
    Decimal => Value::as_decimal,
    String => |v: &Value| v.as_str().map(str::to_string),
    Uuid => Value::as_guid,
    Vec<u8> => |v: &Value| v.as_bytes().map(<[u8]>::to_vec),
    NaiveDateTime => Value::as_datetime,
    DateTime<FixedOffset> => Value::as_datetime_offset,
    NaiveDate => Value::as_date,
    NaiveTime => Value::as_time_of_day,
    EdmDuration => |v: &Value| v.as_duration().copied(),
    EnumValue => |v: &Value| v.as_enum().cloned(),
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null | Value::Absent => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Value of an enumeration type; flags enums may carry several members
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    /// Qualified name of the enum type
    pub type_name: String,
    pub members: Vec<String>,
}

impl EnumValue {
    pub fn new(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            members: vec![member.into()],
        }
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.members.join(","))
    }
}

/// ISO 8601 duration, as used by `Edm.Duration` and `Edm.Time`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdmDuration {
    pub negative: bool,
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub nanoseconds: u32,
}

static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(-)?P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.(\d{1,9}))?S)?)?$",
    )
    .expect("valid duration pattern")
});

impl EdmDuration {
    /// Parse an ISO 8601 duration such as `P1DT2H30M` or `-PT0.5S`
    pub fn parse(text: &str) -> Option<Self> {
        let captures = DURATION_PATTERN.captures(text)?;
        let number = |index: usize| -> Option<u32> {
            match captures.get(index) {
                Some(m) => m.as_str().parse().ok(),
                None => Some(0),
            }
        };
        let nanoseconds = match captures.get(8) {
            Some(m) => format!("{:0<9}", m.as_str()).parse().ok()?,
            None => 0,
        };
        Some(Self {
            negative: captures.get(1).is_some(),
            years: number(2)?,
            months: number(3)?,
            days: number(4)?,
            hours: number(5)?,
            minutes: number(6)?,
            seconds: number(7)?,
            nanoseconds,
        })
    }

    /// Time of day expressed as a duration since midnight
    pub fn from_time_of_day(time: NaiveTime) -> Self {
        Self {
            hours: time.hour(),
            minutes: time.minute(),
            seconds: time.second(),
            nanoseconds: time.nanosecond(),
            ..Self::default()
        }
    }

    /// Interpret the duration as a time of day, if it fits within one day
    pub fn to_time_of_day(&self) -> Option<NaiveTime> {
        if self.negative || self.years > 0 || self.months > 0 || self.days > 0 {
            return None;
        }
        NaiveTime::from_hms_nano_opt(self.hours, self.minutes, self.seconds, self.nanoseconds)
    }

    fn is_zero(&self) -> bool {
        self.years == 0
            && self.months == 0
            && self.days == 0
            && self.hours == 0
            && self.minutes == 0
            && self.seconds == 0
            && self.nanoseconds == 0
    }
}

impl fmt::Display for EdmDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("PT0S");
        }
        if self.negative {
            f.write_str("-")?;
        }
        f.write_str("P")?;
        if self.years > 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months > 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.days > 0 {
            write!(f, "{}D", self.days)?;
        }
        if self.hours > 0 || self.minutes > 0 || self.seconds > 0 || self.nanoseconds > 0 {
            f.write_str("T")?;
            if self.hours > 0 {
                write!(f, "{}H", self.hours)?;
            }
            if self.minutes > 0 {
                write!(f, "{}M", self.minutes)?;
            }
            if self.seconds > 0 || self.nanoseconds > 0 {
                write!(f, "{}", self.seconds)?;
                if self.nanoseconds > 0 {
                    let fraction = format!("{:09}", self.nanoseconds);
                    write!(f, ".{}", fraction.trim_end_matches('0'))?;
                }
                f.write_str("S")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Int16(7).as_i64(), Some(7));
        assert_eq!(Value::Int32(7).as_f64(), Some(7.0));
        assert_eq!(Value::from("abc").as_str(), Some("abc"));
        assert!(Value::Null.is_null());
        assert!(Value::Absent.is_absent());
        assert_ne!(Value::Absent, Value::Null);
    }

    #[test]
    fn test_coerce_integers() {
        assert_eq!(Value::Int32(42).coerce(EdmType::Int64).unwrap(), Value::Int64(42));
        assert_eq!(Value::Int32(42).coerce(EdmType::Byte).unwrap(), Value::Byte(42));
        assert!(Value::Int32(300).coerce(EdmType::Byte).is_err());
        assert_eq!(
            Value::Int32(3).coerce(EdmType::Decimal).unwrap(),
            Value::Decimal(Decimal::from(3))
        );
        assert_eq!(Value::Int32(3).coerce(EdmType::Double).unwrap(), Value::Double(3.0));
        assert_eq!(
            Value::from("x").coerce(EdmType::Int32).unwrap(),
            Value::from("x")
        );
    }

    #[test]
    fn test_coerce_float_to_decimal() {
        let coerced = Value::Double(1.25).coerce(EdmType::Decimal).unwrap();
        assert_eq!(coerced, Value::Decimal(Decimal::from_str("1.25").unwrap()));
    }

    #[test]
    fn test_from_value_option() {
        assert_eq!(Option::<i32>::from_value(&Value::Null), Some(None));
        assert_eq!(Option::<i32>::from_value(&Value::Int32(5)), Some(Some(5)));
        assert_eq!(i32::from_value(&Value::from("5")), None);
    }

    #[test]
    fn test_duration_parse_and_display() {
        let duration = EdmDuration::parse("P1Y2M3DT4H5M6.5S").unwrap();
        assert_eq!(duration.years, 1);
        assert_eq!(duration.days, 3);
        assert_eq!(duration.seconds, 6);
        assert_eq!(duration.nanoseconds, 500_000_000);
        assert_eq!(duration.to_string(), "P1Y2M3DT4H5M6.5S");

        assert_eq!(EdmDuration::parse("PT00H00M").unwrap().to_string(), "PT0S");
        assert_eq!(EdmDuration::parse("-PT1M").unwrap().to_string(), "-PT1M");
        assert!(EdmDuration::parse("1 day").is_none());
    }

    #[test]
    fn test_duration_time_of_day() {
        let time = NaiveTime::from_hms_opt(13, 20, 0).unwrap();
        let duration = EdmDuration::from_time_of_day(time);
        assert_eq!(duration.to_string(), "PT13H20M");
        assert_eq!(duration.to_time_of_day(), Some(time));
        assert_eq!(EdmDuration::parse("P1D").unwrap().to_time_of_day(), None);
    }
}
