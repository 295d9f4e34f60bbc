//! Per-type codecs between native values and their literal, JSON and XML forms
//!
//! Trait implementations never see `Null` or `Absent`; `Typ` handles those
//! before dispatching here.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Number, Value as Json};
use uuid::Uuid;

use super::value::integer_value;
use super::{EdmDuration, EdmType, Value};
use crate::error::ValueError;

/// Conversion rules of one primitive type
pub trait TypeTraits: Send + Sync + fmt::Debug {
    /// URL literal, e.g. `datetime'2000-01-01T00:00:00'` or `10L`
    fn to_literal(&self, value: &Value) -> Result<String, ValueError>;
    fn from_literal(&self, text: &str) -> Result<Value, ValueError>;
    fn to_json(&self, value: &Value) -> Result<Json, ValueError>;
    fn from_json(&self, node: &Json) -> Result<Value, ValueError>;
    /// Text content of an XML (Atom) property element
    fn to_xml(&self, value: &Value) -> Result<String, ValueError>;
    fn from_xml(&self, text: &str) -> Result<Value, ValueError>;
}

fn mismatch(edm: EdmType, value: &Value) -> ValueError {
    ValueError::TypeMismatch {
        edm: edm.to_string(),
        value: format!("{} value {}", value.kind_name(), value),
    }
}

fn bad_literal(edm: EdmType, text: &str) -> ValueError {
    ValueError::InvalidLiteral {
        edm: edm.to_string(),
        text: text.to_string(),
    }
}

fn bad_json(edm: EdmType, node: &Json) -> ValueError {
    ValueError::InvalidJson {
        edm: edm.to_string(),
        json: node.to_string(),
    }
}

/// Strip `prefix'...'` decoration, case-insensitively on the prefix
fn unwrap_prefixed<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    text[prefix.len()..]
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
}

/// Strip one trailing type suffix such as `L` or `M`, case-insensitively
fn strip_suffix<'a>(text: &'a str, suffix: &str) -> &'a str {
    if suffix.is_empty() || text.len() <= suffix.len() {
        return text;
    }
    let split = text.len() - suffix.len();
    match text.get(split..) {
        Some(tail) if tail.eq_ignore_ascii_case(suffix) => &text[..split],
        _ => text,
    }
}

#[derive(Debug)]
pub struct BooleanTraits;

impl TypeTraits for BooleanTraits {
    fn to_literal(&self, value: &Value) -> Result<String, ValueError> {
        match value {
            Value::Boolean(b) => Ok(b.to_string()),
            other => Err(mismatch(EdmType::Boolean, other)),
        }
    }

    fn from_literal(&self, text: &str) -> Result<Value, ValueError> {
        match text.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Boolean(true)),
            "false" | "0" => Ok(Value::Boolean(false)),
            _ => Err(bad_literal(EdmType::Boolean, text)),
        }
    }

    fn to_json(&self, value: &Value) -> Result<Json, ValueError> {
        match value {
            Value::Boolean(b) => Ok(Json::Bool(*b)),
            other => Err(mismatch(EdmType::Boolean, other)),
        }
    }

    fn from_json(&self, node: &Json) -> Result<Value, ValueError> {
        match node {
            Json::Bool(b) => Ok(Value::Boolean(*b)),
            Json::String(s) => self.from_literal(s),
            other => Err(bad_json(EdmType::Boolean, other)),
        }
    }

    fn to_xml(&self, value: &Value) -> Result<String, ValueError> {
        self.to_literal(value)
    }

    fn from_xml(&self, text: &str) -> Result<Value, ValueError> {
        self.from_literal(text.trim())
    }
}

/// Byte, SByte, Int16, Int32 and Int64
#[derive(Debug)]
pub struct IntegerTraits {
    pub edm: EdmType,
    /// Literal suffix, `L` for V2 Int64
    pub suffix: &'static str,
    /// Emit JSON strings instead of numbers
    pub json_string: bool,
}

impl IntegerTraits {
    fn wide(&self, value: &Value) -> Result<i64, ValueError> {
        value.as_i64().ok_or_else(|| mismatch(self.edm, value))
    }

    fn parse(&self, text: &str) -> Result<Value, ValueError> {
        let digits = strip_suffix(text.trim(), self.suffix);
        let wide: i64 = digits.parse().map_err(|_| bad_literal(self.edm, text))?;
        integer_value(self.edm, wide)
    }
}

impl TypeTraits for IntegerTraits {
    fn to_literal(&self, value: &Value) -> Result<String, ValueError> {
        Ok(format!("{}{}", self.wide(value)?, self.suffix))
    }

    fn from_literal(&self, text: &str) -> Result<Value, ValueError> {
        self.parse(text)
    }

    fn to_json(&self, value: &Value) -> Result<Json, ValueError> {
        let wide = self.wide(value)?;
        if self.json_string {
            Ok(Json::String(wide.to_string()))
        } else {
            Ok(Json::Number(wide.into()))
        }
    }

    fn from_json(&self, node: &Json) -> Result<Value, ValueError> {
        match node {
            Json::Number(n) => match n.as_i64() {
                Some(wide) => integer_value(self.edm, wide),
                None => Err(bad_json(self.edm, node)),
            },
            Json::String(s) => self.parse(s),
            other => Err(bad_json(self.edm, other)),
        }
    }

    fn to_xml(&self, value: &Value) -> Result<String, ValueError> {
        Ok(self.wide(value)?.to_string())
    }

    fn from_xml(&self, text: &str) -> Result<Value, ValueError> {
        self.parse(text)
    }
}

/// Single and Double
#[derive(Debug)]
pub struct FloatTraits {
    pub edm: EdmType,
    /// `d` or `f` in V2, empty in V4
    pub suffix: &'static str,
}

impl FloatTraits {
    fn wide(&self, value: &Value) -> Result<f64, ValueError> {
        match (self.edm, value) {
            (EdmType::Single, Value::Single(f)) => Ok(*f as f64),
            (EdmType::Double, Value::Double(f)) => Ok(*f),
            (_, other) => Err(mismatch(self.edm, other)),
        }
    }

    fn format(&self, value: &Value) -> Result<String, ValueError> {
        let text = match value {
            Value::Single(f) if f.is_nan() => "NaN".to_string(),
            Value::Double(f) if f.is_nan() => "NaN".to_string(),
            _ => {
                let wide = self.wide(value)?;
                if wide.is_infinite() {
                    (if wide > 0.0 { "INF" } else { "-INF" }).to_string()
                } else if let Value::Single(f) = value {
                    format!("{:?}", f)
                } else {
                    format!("{:?}", wide)
                }
            }
        };
        Ok(text)
    }

    fn parse(&self, text: &str) -> Result<Value, ValueError> {
        let trimmed = text.trim();
        let body = match trimmed {
            "INF" | "-INF" | "NaN" => trimmed,
            _ => strip_suffix(trimmed, self.suffix),
        };
        let wide = match body {
            "INF" => f64::INFINITY,
            "-INF" => f64::NEG_INFINITY,
            "NaN" => f64::NAN,
            _ => body.parse().map_err(|_| bad_literal(self.edm, text))?,
        };
        Ok(self.narrow(wide, body))
    }

    fn narrow(&self, wide: f64, text: &str) -> Value {
        match self.edm {
            EdmType::Single => Value::Single(text.parse::<f32>().unwrap_or(wide as f32)),
            _ => Value::Double(wide),
        }
    }
}

impl TypeTraits for FloatTraits {
    fn to_literal(&self, value: &Value) -> Result<String, ValueError> {
        let text = self.format(value)?;
        Ok(format!("{}{}", text, self.suffix))
    }

    fn from_literal(&self, text: &str) -> Result<Value, ValueError> {
        self.parse(text)
    }

    fn to_json(&self, value: &Value) -> Result<Json, ValueError> {
        let wide = self.wide(value)?;
        match Number::from_f64(wide) {
            Some(number) if matches!(value, Value::Double(_)) => Ok(Json::Number(number)),
            Some(_) => {
                // f32 printed through f64 would gain spurious digits
                let text = self.format(value)?;
                let reparsed: f64 = text.parse().map_err(|_| mismatch(self.edm, value))?;
                Number::from_f64(reparsed)
                    .map(Json::Number)
                    .ok_or_else(|| mismatch(self.edm, value))
            }
            None => Ok(Json::String(self.format(value)?)),
        }
    }

    fn from_json(&self, node: &Json) -> Result<Value, ValueError> {
        match node {
            Json::Number(n) => {
                let text = n.to_string();
                let wide = n.as_f64().ok_or_else(|| bad_json(self.edm, node))?;
                Ok(self.narrow(wide, &text))
            }
            Json::String(s) => self.parse(s),
            other => Err(bad_json(self.edm, other)),
        }
    }

    fn to_xml(&self, value: &Value) -> Result<String, ValueError> {
        self.format(value)
    }

    fn from_xml(&self, text: &str) -> Result<Value, ValueError> {
        self.parse(text)
    }
}

#[derive(Debug)]
pub struct DecimalTraits {
    /// `M` in V2, empty in V4
    pub suffix: &'static str,
}

impl DecimalTraits {
    fn decimal(value: &Value) -> Result<Decimal, ValueError> {
        match value {
            Value::Decimal(d) => Ok(*d),
            other => Err(mismatch(EdmType::Decimal, other)),
        }
    }

    fn parse(&self, text: &str) -> Result<Value, ValueError> {
        let body = strip_suffix(text.trim(), self.suffix);
        Decimal::from_str(body)
            .or_else(|_| Decimal::from_scientific(body))
            .map(Value::Decimal)
            .map_err(|_| bad_literal(EdmType::Decimal, text))
    }
}

impl TypeTraits for DecimalTraits {
    fn to_literal(&self, value: &Value) -> Result<String, ValueError> {
        Ok(format!("{}{}", Self::decimal(value)?, self.suffix))
    }

    fn from_literal(&self, text: &str) -> Result<Value, ValueError> {
        self.parse(text)
    }

    /// Decimals travel as JSON strings so no digit is lost to float parsing
    fn to_json(&self, value: &Value) -> Result<Json, ValueError> {
        Ok(Json::String(Self::decimal(value)?.to_string()))
    }

    fn from_json(&self, node: &Json) -> Result<Value, ValueError> {
        match node {
            Json::Number(n) => self.parse(&n.to_string()),
            Json::String(s) => self.parse(s),
            other => Err(bad_json(EdmType::Decimal, other)),
        }
    }

    fn to_xml(&self, value: &Value) -> Result<String, ValueError> {
        Ok(Self::decimal(value)?.to_string())
    }

    fn from_xml(&self, text: &str) -> Result<Value, ValueError> {
        self.parse(text)
    }
}

#[derive(Debug)]
pub struct StringTraits;

impl StringTraits {
    fn text(value: &Value) -> Result<&str, ValueError> {
        value.as_str().ok_or_else(|| mismatch(EdmType::String, value))
    }
}

impl TypeTraits for StringTraits {
    fn to_literal(&self, value: &Value) -> Result<String, ValueError> {
        Ok(format!("'{}'", Self::text(value)?.replace('\'', "''")))
    }

    fn from_literal(&self, text: &str) -> Result<Value, ValueError> {
        text.strip_prefix('\'')
            .and_then(|rest| rest.strip_suffix('\''))
            .map(|inner| Value::String(inner.replace("''", "'")))
            .ok_or_else(|| bad_literal(EdmType::String, text))
    }

    fn to_json(&self, value: &Value) -> Result<Json, ValueError> {
        Ok(Json::String(Self::text(value)?.to_string()))
    }

    fn from_json(&self, node: &Json) -> Result<Value, ValueError> {
        match node {
            Json::String(s) => Ok(Value::String(s.clone())),
            other => Err(bad_json(EdmType::String, other)),
        }
    }

    fn to_xml(&self, value: &Value) -> Result<String, ValueError> {
        Ok(Self::text(value)?.to_string())
    }

    fn from_xml(&self, text: &str) -> Result<Value, ValueError> {
        Ok(Value::String(text.to_string()))
    }
}

/// `Edm.Binary`: hex literals in V2, base64url literals in V4
#[derive(Debug)]
pub struct BinaryTraits {
    pub url_safe: bool,
}

impl BinaryTraits {
    fn bytes(value: &Value) -> Result<&[u8], ValueError> {
        value.as_bytes().ok_or_else(|| mismatch(EdmType::Binary, value))
    }

    fn decode_base64(text: &str) -> Option<Vec<u8>> {
        STANDARD
            .decode(text)
            .or_else(|_| URL_SAFE.decode(text))
            .or_else(|_| URL_SAFE_NO_PAD.decode(text))
            .ok()
    }

    fn decode_hex(text: &str) -> Option<Vec<u8>> {
        if text.len() % 2 != 0 {
            return None;
        }
        (0..text.len())
            .step_by(2)
            .map(|i| text.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
            .collect()
    }
}

impl TypeTraits for BinaryTraits {
    fn to_literal(&self, value: &Value) -> Result<String, ValueError> {
        let bytes = Self::bytes(value)?;
        if self.url_safe {
            Ok(format!("binary'{}'", URL_SAFE.encode(bytes)))
        } else {
            let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
            Ok(format!("binary'{hex}'"))
        }
    }

    fn from_literal(&self, text: &str) -> Result<Value, ValueError> {
        let decoded = if let Some(inner) = unwrap_prefixed(text, "binary") {
            if self.url_safe {
                Self::decode_base64(inner)
            } else {
                Self::decode_hex(inner)
            }
        } else {
            unwrap_prefixed(text, "X").and_then(Self::decode_hex)
        };
        decoded
            .map(Value::Binary)
            .ok_or_else(|| bad_literal(EdmType::Binary, text))
    }

    fn to_json(&self, value: &Value) -> Result<Json, ValueError> {
        let bytes = Self::bytes(value)?;
        let encoded = if self.url_safe {
            URL_SAFE.encode(bytes)
        } else {
            STANDARD.encode(bytes)
        };
        Ok(Json::String(encoded))
    }

    fn from_json(&self, node: &Json) -> Result<Value, ValueError> {
        node.as_str()
            .and_then(Self::decode_base64)
            .map(Value::Binary)
            .ok_or_else(|| bad_json(EdmType::Binary, node))
    }

    fn to_xml(&self, value: &Value) -> Result<String, ValueError> {
        Ok(STANDARD.encode(Self::bytes(value)?))
    }

    fn from_xml(&self, text: &str) -> Result<Value, ValueError> {
        Self::decode_base64(text.trim())
            .map(Value::Binary)
            .ok_or_else(|| bad_literal(EdmType::Binary, text))
    }
}

#[derive(Debug)]
pub struct GuidTraits {
    /// `guid'...'` in V2, bare in V4
    pub prefixed: bool,
}

impl GuidTraits {
    fn guid(value: &Value) -> Result<Uuid, ValueError> {
        value.as_guid().ok_or_else(|| mismatch(EdmType::Guid, value))
    }

    fn parse(text: &str) -> Result<Value, ValueError> {
        Uuid::parse_str(text.trim())
            .map(Value::Guid)
            .map_err(|_| bad_literal(EdmType::Guid, text))
    }
}

impl TypeTraits for GuidTraits {
    fn to_literal(&self, value: &Value) -> Result<String, ValueError> {
        let guid = Self::guid(value)?;
        if self.prefixed {
            Ok(format!("guid'{guid}'"))
        } else {
            Ok(guid.to_string())
        }
    }

    fn from_literal(&self, text: &str) -> Result<Value, ValueError> {
        Self::parse(unwrap_prefixed(text, "guid").unwrap_or(text))
    }

    fn to_json(&self, value: &Value) -> Result<Json, ValueError> {
        Ok(Json::String(Self::guid(value)?.to_string()))
    }

    fn from_json(&self, node: &Json) -> Result<Value, ValueError> {
        node.as_str()
            .ok_or_else(|| bad_json(EdmType::Guid, node))
            .and_then(Self::parse)
    }

    fn to_xml(&self, value: &Value) -> Result<String, ValueError> {
        Ok(Self::guid(value)?.to_string())
    }

    fn from_xml(&self, text: &str) -> Result<Value, ValueError> {
        Self::parse(text)
    }
}

static JSON_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/Date\((-?\d+)([+-]\d{4})?\)/$").expect("valid JSON date pattern")
});

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

fn parse_naive_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim().trim_end_matches('Z');
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

fn format_naive_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

/// Parse `/Date(ms)/` or `/Date(ms+hhmm)/`, returning UTC milliseconds and offset minutes
fn parse_json_date(text: &str) -> Option<(i64, i32)> {
    let captures = JSON_DATE.captures(text)?;
    let millis: i64 = captures.get(1)?.as_str().parse().ok()?;
    let offset = match captures.get(2) {
        Some(m) => {
            let raw = m.as_str();
            let minutes: i32 = raw[1..].parse().ok()?;
            if raw.starts_with('-') { -minutes } else { minutes }
        }
        None => 0,
    };
    Some((millis, offset))
}

/// V2/V3 `Edm.DateTime`
#[derive(Debug)]
pub struct DateTimeTraits;

impl DateTimeTraits {
    fn datetime(value: &Value) -> Result<NaiveDateTime, ValueError> {
        value
            .as_datetime()
            .ok_or_else(|| mismatch(EdmType::DateTime, value))
    }

    fn parse(text: &str) -> Result<Value, ValueError> {
        parse_naive_datetime(text)
            .map(Value::DateTime)
            .ok_or_else(|| bad_literal(EdmType::DateTime, text))
    }
}

impl TypeTraits for DateTimeTraits {
    fn to_literal(&self, value: &Value) -> Result<String, ValueError> {
        Ok(format!(
            "datetime'{}'",
            format_naive_datetime(&Self::datetime(value)?)
        ))
    }

    fn from_literal(&self, text: &str) -> Result<Value, ValueError> {
        let inner =
            unwrap_prefixed(text, "datetime").ok_or_else(|| bad_literal(EdmType::DateTime, text))?;
        Self::parse(inner)
    }

    /// Verbose JSON carries milliseconds since the epoch
    fn to_json(&self, value: &Value) -> Result<Json, ValueError> {
        let dt = Self::datetime(value)?;
        if dt.nanosecond() % 1_000_000 != 0 {
            return Err(ValueError::FacetViolation {
                facet: "Precision",
                message: format!(
                    "{} has sub-millisecond digits, JSON dates carry milliseconds",
                    format_naive_datetime(&dt)
                ),
            });
        }
        let millis = dt.and_utc().timestamp_millis();
        Ok(Json::String(format!("/Date({millis})/")))
    }

    fn from_json(&self, node: &Json) -> Result<Value, ValueError> {
        let text = node.as_str().ok_or_else(|| bad_json(EdmType::DateTime, node))?;
        if let Some((millis, _)) = parse_json_date(text) {
            return DateTime::from_timestamp_millis(millis)
                .map(|dt| Value::DateTime(dt.naive_utc()))
                .ok_or_else(|| bad_json(EdmType::DateTime, node));
        }
        Self::parse(text).map_err(|_| bad_json(EdmType::DateTime, node))
    }

    fn to_xml(&self, value: &Value) -> Result<String, ValueError> {
        Ok(format_naive_datetime(&Self::datetime(value)?))
    }

    fn from_xml(&self, text: &str) -> Result<Value, ValueError> {
        Self::parse(text)
    }
}

#[derive(Debug)]
pub struct DateTimeOffsetTraits {
    /// `datetimeoffset'...'` in V2/V3, bare in V4
    pub prefixed: bool,
}

impl DateTimeOffsetTraits {
    fn text(value: &Value) -> Result<String, ValueError> {
        value
            .as_datetime_offset()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .ok_or_else(|| mismatch(EdmType::DateTimeOffset, value))
    }

    fn parse(text: &str) -> Result<Value, ValueError> {
        DateTime::parse_from_rfc3339(text.trim())
            .map(Value::DateTimeOffset)
            .map_err(|_| bad_literal(EdmType::DateTimeOffset, text))
    }
}

impl TypeTraits for DateTimeOffsetTraits {
    fn to_literal(&self, value: &Value) -> Result<String, ValueError> {
        let text = Self::text(value)?;
        if self.prefixed {
            Ok(format!("datetimeoffset'{text}'"))
        } else {
            Ok(text)
        }
    }

    fn from_literal(&self, text: &str) -> Result<Value, ValueError> {
        Self::parse(unwrap_prefixed(text, "datetimeoffset").unwrap_or(text))
    }

    fn to_json(&self, value: &Value) -> Result<Json, ValueError> {
        Ok(Json::String(Self::text(value)?))
    }

    fn from_json(&self, node: &Json) -> Result<Value, ValueError> {
        let text = node
            .as_str()
            .ok_or_else(|| bad_json(EdmType::DateTimeOffset, node))?;
        if let Some((millis, offset_minutes)) = parse_json_date(text) {
            let offset = chrono::FixedOffset::east_opt(offset_minutes * 60)
                .ok_or_else(|| bad_json(EdmType::DateTimeOffset, node))?;
            return DateTime::from_timestamp_millis(millis)
                .map(|dt| Value::DateTimeOffset(dt.with_timezone(&offset)))
                .ok_or_else(|| bad_json(EdmType::DateTimeOffset, node));
        }
        Self::parse(text).map_err(|_| bad_json(EdmType::DateTimeOffset, node))
    }

    fn to_xml(&self, value: &Value) -> Result<String, ValueError> {
        Self::text(value)
    }

    fn from_xml(&self, text: &str) -> Result<Value, ValueError> {
        Self::parse(text)
    }
}

/// V4 `Edm.Date`
#[derive(Debug)]
pub struct DateTraits;

impl DateTraits {
    fn date(value: &Value) -> Result<NaiveDate, ValueError> {
        value.as_date().ok_or_else(|| mismatch(EdmType::Date, value))
    }

    fn parse(text: &str) -> Result<Value, ValueError> {
        NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|_| bad_literal(EdmType::Date, text))
    }
}

impl TypeTraits for DateTraits {
    fn to_literal(&self, value: &Value) -> Result<String, ValueError> {
        Ok(Self::date(value)?.format("%Y-%m-%d").to_string())
    }

    fn from_literal(&self, text: &str) -> Result<Value, ValueError> {
        Self::parse(text)
    }

    fn to_json(&self, value: &Value) -> Result<Json, ValueError> {
        Ok(Json::String(self.to_literal(value)?))
    }

    fn from_json(&self, node: &Json) -> Result<Value, ValueError> {
        node.as_str()
            .ok_or_else(|| bad_json(EdmType::Date, node))
            .and_then(Self::parse)
    }

    fn to_xml(&self, value: &Value) -> Result<String, ValueError> {
        self.to_literal(value)
    }

    fn from_xml(&self, text: &str) -> Result<Value, ValueError> {
        Self::parse(text)
    }
}

/// V4 `Edm.TimeOfDay`
#[derive(Debug)]
pub struct TimeOfDayTraits;

impl TimeOfDayTraits {
    fn time(value: &Value) -> Result<NaiveTime, ValueError> {
        value
            .as_time_of_day()
            .ok_or_else(|| mismatch(EdmType::TimeOfDay, value))
    }

    fn parse(text: &str) -> Result<Value, ValueError> {
        let text = text.trim();
        NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
            .map(Value::TimeOfDay)
            .map_err(|_| bad_literal(EdmType::TimeOfDay, text))
    }
}

impl TypeTraits for TimeOfDayTraits {
    fn to_literal(&self, value: &Value) -> Result<String, ValueError> {
        Ok(Self::time(value)?.format("%H:%M:%S%.f").to_string())
    }

    fn from_literal(&self, text: &str) -> Result<Value, ValueError> {
        Self::parse(text)
    }

    fn to_json(&self, value: &Value) -> Result<Json, ValueError> {
        Ok(Json::String(self.to_literal(value)?))
    }

    fn from_json(&self, node: &Json) -> Result<Value, ValueError> {
        node.as_str()
            .ok_or_else(|| bad_json(EdmType::TimeOfDay, node))
            .and_then(Self::parse)
    }

    fn to_xml(&self, value: &Value) -> Result<String, ValueError> {
        self.to_literal(value)
    }

    fn from_xml(&self, text: &str) -> Result<Value, ValueError> {
        Self::parse(text)
    }
}

/// V2/V3 `Edm.Time`: a time of day written as an ISO 8601 duration
#[derive(Debug)]
pub struct TimeTraits;

impl TimeTraits {
    fn duration(value: &Value) -> Result<EdmDuration, ValueError> {
        value
            .as_time_of_day()
            .map(EdmDuration::from_time_of_day)
            .ok_or_else(|| mismatch(EdmType::Time, value))
    }

    fn parse(text: &str) -> Result<Value, ValueError> {
        EdmDuration::parse(text.trim())
            .and_then(|d| d.to_time_of_day())
            .map(Value::TimeOfDay)
            .ok_or_else(|| bad_literal(EdmType::Time, text))
    }
}

impl TypeTraits for TimeTraits {
    fn to_literal(&self, value: &Value) -> Result<String, ValueError> {
        Ok(format!("time'{}'", Self::duration(value)?))
    }

    fn from_literal(&self, text: &str) -> Result<Value, ValueError> {
        let inner = unwrap_prefixed(text, "time").ok_or_else(|| bad_literal(EdmType::Time, text))?;
        Self::parse(inner)
    }

    fn to_json(&self, value: &Value) -> Result<Json, ValueError> {
        Ok(Json::String(Self::duration(value)?.to_string()))
    }

    fn from_json(&self, node: &Json) -> Result<Value, ValueError> {
        node.as_str()
            .ok_or_else(|| bad_json(EdmType::Time, node))
            .and_then(Self::parse)
    }

    fn to_xml(&self, value: &Value) -> Result<String, ValueError> {
        Ok(Self::duration(value)?.to_string())
    }

    fn from_xml(&self, text: &str) -> Result<Value, ValueError> {
        Self::parse(text)
    }
}

/// V4 `Edm.Duration`
#[derive(Debug)]
pub struct DurationTraits;

impl DurationTraits {
    fn duration(value: &Value) -> Result<EdmDuration, ValueError> {
        value
            .as_duration()
            .copied()
            .ok_or_else(|| mismatch(EdmType::Duration, value))
    }

    fn parse(text: &str) -> Result<Value, ValueError> {
        EdmDuration::parse(text.trim())
            .map(Value::Duration)
            .ok_or_else(|| bad_literal(EdmType::Duration, text))
    }
}

impl TypeTraits for DurationTraits {
    fn to_literal(&self, value: &Value) -> Result<String, ValueError> {
        Ok(format!("duration'{}'", Self::duration(value)?))
    }

    fn from_literal(&self, text: &str) -> Result<Value, ValueError> {
        Self::parse(unwrap_prefixed(text, "duration").unwrap_or(text))
    }

    fn to_json(&self, value: &Value) -> Result<Json, ValueError> {
        Ok(Json::String(Self::duration(value)?.to_string()))
    }

    fn from_json(&self, node: &Json) -> Result<Value, ValueError> {
        node.as_str()
            .ok_or_else(|| bad_json(EdmType::Duration, node))
            .and_then(Self::parse)
    }

    fn to_xml(&self, value: &Value) -> Result<String, ValueError> {
        Ok(Self::duration(value)?.to_string())
    }

    fn from_xml(&self, text: &str) -> Result<Value, ValueError> {
        Self::parse(text)
    }
}

/// Streams and geography values pass through as opaque JSON
#[derive(Debug)]
pub struct OpaqueTraits {
    pub edm: EdmType,
}

impl TypeTraits for OpaqueTraits {
    fn to_literal(&self, _value: &Value) -> Result<String, ValueError> {
        Err(ValueError::Unsupported {
            edm: self.edm.to_string(),
            form: "literal",
        })
    }

    fn from_literal(&self, _text: &str) -> Result<Value, ValueError> {
        Err(ValueError::Unsupported {
            edm: self.edm.to_string(),
            form: "literal",
        })
    }

    fn to_json(&self, value: &Value) -> Result<Json, ValueError> {
        match value {
            Value::Json(json) => Ok(json.clone()),
            other => Err(mismatch(self.edm, other)),
        }
    }

    fn from_json(&self, node: &Json) -> Result<Value, ValueError> {
        Ok(Value::Json(node.clone()))
    }

    fn to_xml(&self, _value: &Value) -> Result<String, ValueError> {
        Err(ValueError::Unsupported {
            edm: self.edm.to_string(),
            form: "XML",
        })
    }

    fn from_xml(&self, text: &str) -> Result<Value, ValueError> {
        Ok(Value::Json(Json::String(text.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use pretty_assertions::assert_eq;

    fn literal_round_trip(traits: &dyn TypeTraits, value: Value) -> String {
        let literal = traits.to_literal(&value).unwrap();
        assert_eq!(traits.from_literal(&literal).unwrap(), value, "{literal}");
        let json = traits.to_json(&value).unwrap();
        assert_eq!(traits.from_json(&json).unwrap(), value, "{json}");
        let xml = traits.to_xml(&value).unwrap();
        assert_eq!(traits.from_xml(&xml).unwrap(), value, "{xml}");
        literal
    }

    #[test]
    fn test_integer_literals() {
        let v2_int64 = IntegerTraits {
            edm: EdmType::Int64,
            suffix: "L",
            json_string: true,
        };
        assert_eq!(literal_round_trip(&v2_int64, Value::Int64(10)), "10L");
        assert_eq!(v2_int64.to_json(&Value::Int64(10)).unwrap(), Json::from("10"));

        let int32 = IntegerTraits {
            edm: EdmType::Int32,
            suffix: "",
            json_string: false,
        };
        assert_eq!(literal_round_trip(&int32, Value::Int32(-23)), "-23");
        assert!(int32.from_literal("3000000000").is_err());
        assert!(int32.to_literal(&Value::from("x")).is_err());
    }

    #[test]
    fn test_float_literals() {
        let double = FloatTraits {
            edm: EdmType::Double,
            suffix: "d",
        };
        assert_eq!(literal_round_trip(&double, Value::Double(0.1)), "0.1d");
        assert_eq!(literal_round_trip(&double, Value::Double(1e300)), "1e300d");
        assert_eq!(double.to_literal(&Value::Double(f64::INFINITY)).unwrap(), "INFd");
        assert_eq!(
            double.from_literal("INF").unwrap(),
            Value::Double(f64::INFINITY)
        );

        let single = FloatTraits {
            edm: EdmType::Single,
            suffix: "f",
        };
        assert_eq!(literal_round_trip(&single, Value::Single(0.1)), "0.1f");
    }

    #[test]
    fn test_decimal_keeps_scale() {
        let v2 = DecimalTraits { suffix: "M" };
        let value = Value::Decimal(Decimal::from_str("1.50").unwrap());
        assert_eq!(literal_round_trip(&v2, value.clone()), "1.50M");
        assert_eq!(v2.to_json(&value).unwrap(), Json::from("1.50"));
        assert_eq!(
            v2.from_json(&serde_json::json!(2.5)).unwrap(),
            Value::Decimal(Decimal::from_str("2.5").unwrap())
        );
    }

    #[test]
    fn test_string_literal_escapes_quotes() {
        assert_eq!(
            literal_round_trip(&StringTraits, Value::from("O'Neil")),
            "'O''Neil'"
        );
        assert!(StringTraits.from_literal("unquoted").is_err());
    }

    #[test]
    fn test_binary_literals() {
        let v2 = BinaryTraits { url_safe: false };
        assert_eq!(
            literal_round_trip(&v2, Value::Binary(vec![0x0a, 0xff])),
            "binary'0AFF'"
        );
        assert_eq!(
            v2.from_literal("X'0AFF'").unwrap(),
            Value::Binary(vec![0x0a, 0xff])
        );

        let v4 = BinaryTraits { url_safe: true };
        assert_eq!(
            literal_round_trip(&v4, Value::Binary(vec![0xfb, 0xff])),
            "binary'-_8='"
        );
    }

    #[test]
    fn test_guid_literals() {
        let guid = Uuid::parse_str("0a7f2d4e-1c3b-4b5a-9e8f-7d6c5b4a3921").unwrap();
        let v2 = GuidTraits { prefixed: true };
        assert_eq!(
            literal_round_trip(&v2, Value::Guid(guid)),
            "guid'0a7f2d4e-1c3b-4b5a-9e8f-7d6c5b4a3921'"
        );
        let v4 = GuidTraits { prefixed: false };
        assert_eq!(
            literal_round_trip(&v4, Value::Guid(guid)),
            "0a7f2d4e-1c3b-4b5a-9e8f-7d6c5b4a3921"
        );
    }

    #[test]
    fn test_datetime_v2() {
        let dt = NaiveDate::from_ymd_opt(2017, 12, 24)
            .unwrap()
            .and_hms_milli_opt(18, 30, 5, 250)
            .unwrap();
        assert_eq!(
            literal_round_trip(&DateTimeTraits, Value::DateTime(dt)),
            "datetime'2017-12-24T18:30:05.250'"
        );
        assert_eq!(
            DateTimeTraits.to_json(&Value::DateTime(dt)).unwrap(),
            Json::from("/Date(1514140205250)/")
        );
        assert_eq!(
            DateTimeTraits
                .from_literal("datetime'2000-01-01T00:00'")
                .unwrap(),
            Value::DateTime(
                NaiveDate::from_ymd_opt(2000, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            )
        );
        assert!(DateTimeTraits.from_literal("2000-01-01T00:00").is_err());
    }

    #[test]
    fn test_datetimeoffset() {
        let offset = FixedOffset::east_opt(3600).unwrap();
        let dt = DateTime::parse_from_rfc3339("2020-02-29T10:00:00+01:00")
            .unwrap()
            .with_timezone(&offset);
        let v2 = DateTimeOffsetTraits { prefixed: true };
        assert_eq!(
            literal_round_trip(&v2, Value::DateTimeOffset(dt)),
            "datetimeoffset'2020-02-29T10:00:00+01:00'"
        );
        let v4 = DateTimeOffsetTraits { prefixed: false };
        let utc = DateTime::parse_from_rfc3339("2020-02-29T10:00:00Z").unwrap();
        assert_eq!(
            literal_round_trip(&v4, Value::DateTimeOffset(utc)),
            "2020-02-29T10:00:00Z"
        );
        assert_eq!(
            v2.from_json(&Json::from("/Date(1582966800000+0060)/"))
                .unwrap(),
            Value::DateTimeOffset(dt)
        );
    }

    #[test]
    fn test_time_and_duration() {
        let time = NaiveTime::from_hms_opt(13, 20, 0).unwrap();
        assert_eq!(
            literal_round_trip(&TimeTraits, Value::TimeOfDay(time)),
            "time'PT13H20M'"
        );
        assert_eq!(
            literal_round_trip(&TimeOfDayTraits, Value::TimeOfDay(time)),
            "13:20:00"
        );
        let duration = EdmDuration::parse("P12DT23H59M59.999999999S").unwrap();
        assert_eq!(
            literal_round_trip(&DurationTraits, Value::Duration(duration)),
            "duration'P12DT23H59M59.999999999S'"
        );
    }

    #[test]
    fn test_date() {
        let date = NaiveDate::from_ymd_opt(2019, 1, 31).unwrap();
        assert_eq!(literal_round_trip(&DateTraits, Value::Date(date)), "2019-01-31");
    }

    #[test]
    fn test_opaque_has_no_literal() {
        let traits = OpaqueTraits {
            edm: EdmType::GeographyPoint,
        };
        let point = serde_json::json!({"type": "Point", "coordinates": [1.0, 2.0]});
        assert_eq!(traits.from_json(&point).unwrap(), Value::Json(point.clone()));
        assert!(matches!(
            traits.to_literal(&Value::Json(point)),
            Err(ValueError::Unsupported { .. })
        ));
    }
}
