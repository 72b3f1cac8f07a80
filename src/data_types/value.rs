use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Raw, untyped value as delivered by a row source.
pub type RawValue = serde_json::Value;

/// Type of the values held by a dimension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Any,
    String,
    Number,
    Boolean,
    Date,
}

impl ValueType {
    /// Numbers and dates are continuous; everything else is discrete.
    pub fn is_continuous(self) -> bool {
        matches!(self, Self::Number | Self::Date)
    }

    /// Casts a raw value into this type.
    ///
    /// Returns `None` for null-like input and for anything that cannot be
    /// represented in this type. Callers map `None` onto the null atom.
    pub fn cast(self, raw: &RawValue) -> Option<Value> {
        match self {
            Self::Any => match raw {
                RawValue::String(s) => cast_text(s),
                RawValue::Number(n) => n.as_f64().and_then(cast_number),
                RawValue::Bool(b) => Some(Value::Boolean(*b)),
                _ => None,
            },
            Self::String => match raw {
                RawValue::String(s) => cast_text(s),
                RawValue::Number(n) => Some(Value::Text(n.to_string())),
                RawValue::Bool(b) => Some(Value::Text(b.to_string())),
                _ => None,
            },
            Self::Number => match raw {
                RawValue::Number(n) => n.as_f64().and_then(cast_number),
                RawValue::String(s) => s.trim().parse::<f64>().ok().and_then(cast_number),
                RawValue::Bool(b) => Some(Value::Number(if *b { 1.0 } else { 0.0 })),
                _ => None,
            },
            Self::Boolean => match raw {
                RawValue::Bool(b) => Some(Value::Boolean(*b)),
                RawValue::Number(n) => n.as_f64().map(|f| Value::Boolean(f != 0.0)),
                RawValue::String(s) => match s.trim() {
                    "true" | "1" => Some(Value::Boolean(true)),
                    "false" | "0" => Some(Value::Boolean(false)),
                    _ => None,
                },
                _ => None,
            },
            Self::Date => match raw {
                RawValue::Number(n) => n
                    .as_f64()
                    .filter(|f| f.is_finite())
                    .and_then(|ms| Utc.timestamp_millis_opt(ms as i64).single())
                    .map(Value::Date),
                RawValue::String(s) => parse_date(s.trim()).map(Value::Date),
                _ => None,
            },
        }
    }
}

fn cast_text(s: &str) -> Option<Value> {
    // The empty key is reserved for the null atom.
    if s.is_empty() {
        None
    } else {
        Some(Value::Text(s.to_owned()))
    }
}

fn cast_number(f: f64) -> Option<Value> {
    if f.is_finite() {
        // -0 and 0 must share a key
        Some(Value::Number(if f == 0.0 { 0.0 } else { f }))
    } else {
        None
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&ndt));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

/// A typed, non-null value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
}

impl Value {
    /// Unique string form of the value within its dimension.
    pub fn key(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Date(d) => d.timestamp_millis().to_string(),
        }
    }

    /// Numeric view of the value: numbers as is, dates in UTC milliseconds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Date(d) => Some(d.timestamp_millis() as f64),
            Self::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Converts back into a raw value that casts to the same key.
    pub fn to_raw(&self) -> RawValue {
        match self {
            Self::Text(s) => RawValue::String(s.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(RawValue::Number)
                .unwrap_or(RawValue::Null),
            Self::Boolean(b) => RawValue::Bool(*b),
            Self::Date(d) => RawValue::from(d.timestamp_millis()),
        }
    }

    /// Natural order. Values of different variants are ordered by variant.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Boolean(_) => 0,
            Self::Number(_) => 1,
            Self::Date(_) => 2,
            Self::Text(_) => 3,
        }
    }
}
