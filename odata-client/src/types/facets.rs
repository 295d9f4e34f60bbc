//! Facet constraints and their validation

use chrono::Timelike;

use super::Value;
use crate::error::ValueError;

/// `MaxLength` facet; `MAX` means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxLength {
    Max,
    Limit(u32),
}

impl MaxLength {
    pub fn parse(text: &str) -> Option<Self> {
        if text.eq_ignore_ascii_case("max") {
            Some(MaxLength::Max)
        } else {
            text.parse().ok().map(MaxLength::Limit)
        }
    }

    fn limit(&self) -> Option<usize> {
        match self {
            MaxLength::Max => None,
            MaxLength::Limit(n) => Some(*n as usize),
        }
    }
}

/// Constraints declared on a property or parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facets {
    pub nullable: bool,
    pub max_length: Option<MaxLength>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub unicode: bool,
    pub fixed_length: bool,
}

impl Default for Facets {
    fn default() -> Self {
        Self {
            nullable: true,
            max_length: None,
            precision: None,
            scale: None,
            unicode: true,
            fixed_length: false,
        }
    }
}

impl Facets {
    /// Facets of a value that must not be null
    pub fn required() -> Self {
        Self {
            nullable: false,
            ..Self::default()
        }
    }

    /// Check a value against these facets.
    ///
    /// `Absent` always passes; it is never encoded.
    pub fn validate(&self, value: &Value) -> Result<(), ValueError> {
        match value {
            Value::Null if !self.nullable => Err(violation("Nullable", "null is not allowed")),
            Value::String(s) => {
                self.check_length(s.chars().count())?;
                if !self.unicode && !s.is_ascii() {
                    return Err(violation(
                        "Unicode",
                        "non-ASCII characters are not allowed",
                    ));
                }
                Ok(())
            }
            Value::Binary(bytes) => self.check_length(bytes.len()),
            Value::Decimal(d) => {
                let scale = d.scale();
                if let Some(max_scale) = self.scale {
                    if scale > max_scale {
                        return Err(violation(
                            "Scale",
                            format!(
                                "{d} has {scale} fractional digits, at most {max_scale} allowed"
                            ),
                        ));
                    }
                }
                if let Some(precision) = self.precision {
                    let mantissa_digits = d.mantissa().unsigned_abs().to_string().len() as u32;
                    let integer_digits = mantissa_digits.saturating_sub(scale);
                    let digits = integer_digits + self.scale.unwrap_or(scale);
                    if digits > precision {
                        return Err(violation(
                            "Precision",
                            format!("{d} has {digits} digits, at most {precision} allowed"),
                        ));
                    }
                }
                Ok(())
            }
            Value::DateTime(dt) => self.check_fraction(dt.nanosecond()),
            Value::DateTimeOffset(dt) => self.check_fraction(dt.nanosecond()),
            Value::TimeOfDay(t) => self.check_fraction(t.nanosecond()),
            _ => Ok(()),
        }
    }

    fn check_length(&self, length: usize) -> Result<(), ValueError> {
        let Some(limit) = self.max_length.as_ref().and_then(MaxLength::limit) else {
            return Ok(());
        };
        if length > limit {
            return Err(violation(
                "MaxLength",
                format!("length {length} exceeds {limit}"),
            ));
        }
        if self.fixed_length && length != limit {
            return Err(violation(
                "FixedLength",
                format!("length {length} differs from fixed length {limit}"),
            ));
        }
        Ok(())
    }

    /// Fractional seconds must fit in `precision` digits
    fn check_fraction(&self, nanoseconds: u32) -> Result<(), ValueError> {
        let Some(precision) = self.precision.filter(|p| *p < 9) else {
            return Ok(());
        };
        let unit = 10u32.pow(9 - precision);
        if nanoseconds % (unit.max(1)) != 0 {
            return Err(violation(
                "Precision",
                format!("fractional seconds exceed {precision} digits"),
            ));
        }
        Ok(())
    }
}

fn violation(facet: &'static str, message: impl Into<String>) -> ValueError {
    ValueError::FacetViolation {
        facet,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_nullable() {
        assert!(Facets::default().validate(&Value::Null).is_ok());
        assert!(Facets::required().validate(&Value::Null).is_err());
        assert!(Facets::required().validate(&Value::Absent).is_ok());
    }

    #[test]
    fn test_max_length_and_fixed_length() {
        let facets = Facets {
            max_length: Some(MaxLength::Limit(3)),
            ..Facets::default()
        };
        assert!(facets.validate(&Value::from("abc")).is_ok());
        assert!(facets.validate(&Value::from("abcd")).is_err());
        assert!(facets.validate(&Value::Binary(vec![1, 2, 3, 4])).is_err());

        let fixed = Facets {
            fixed_length: true,
            ..facets
        };
        assert!(fixed.validate(&Value::from("ab")).is_err());

        let unbounded = Facets {
            max_length: MaxLength::parse("MAX"),
            ..Facets::default()
        };
        assert!(unbounded.validate(&Value::from("x".repeat(10_000))).is_ok());
    }

    #[test]
    fn test_unicode() {
        let facets = Facets {
            unicode: false,
            ..Facets::default()
        };
        assert!(facets.validate(&Value::from("plain")).is_ok());
        assert!(facets.validate(&Value::from("naïve")).is_err());
    }

    #[test]
    fn test_decimal_precision_and_scale() {
        let facets = Facets {
            precision: Some(5),
            scale: Some(2),
            ..Facets::default()
        };
        let ok = Value::Decimal(Decimal::from_str("123.45").unwrap());
        let too_precise = Value::Decimal(Decimal::from_str("1.234").unwrap());
        let too_large = Value::Decimal(Decimal::from_str("1234.5").unwrap());
        let small = Value::Decimal(Decimal::from_str("0.05").unwrap());

        assert!(facets.validate(&ok).is_ok());
        assert!(facets.validate(&small).is_ok());
        assert!(matches!(
            facets.validate(&too_precise),
            Err(ValueError::FacetViolation { facet: "Scale", .. })
        ));
        assert!(matches!(
            facets.validate(&too_large),
            Err(ValueError::FacetViolation { facet: "Precision", .. })
        ));
    }

    #[test]
    fn test_fractional_second_precision() {
        let facets = Facets {
            precision: Some(3),
            ..Facets::default()
        };
        let millis = NaiveTime::from_hms_milli_opt(7, 59, 59, 999).unwrap();
        let micros = NaiveTime::from_hms_micro_opt(7, 59, 59, 999_999).unwrap();
        assert!(facets.validate(&Value::TimeOfDay(millis)).is_ok());
        assert!(facets.validate(&Value::TimeOfDay(micros)).is_err());
    }
}
