use crate::data_types::Value;
use crate::utils::date_formatter::{determine_date_format, format_date};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Declarative label format of a dimension.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Format {
    /// Numbers with up to two decimals, dates as `%Y-%m-%d`, text as is.
    #[default]
    Auto,
    Fixed {
        decimals: usize,
    },
    Percent {
        decimals: usize,
    },
    Date {
        pattern: String,
        #[serde(default)]
        timezone: Option<String>,
    },
    /// Date pattern chosen from the span of dates shown together.
    SmartDate {
        span_secs: f64,
        #[serde(default)]
        timezone: Option<String>,
    },
}

type CustomFormat = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Turns atom values into labels.
#[derive(Clone, Default)]
pub struct Formatter {
    format: Format,
    tz: Option<Tz>,
    custom: Option<CustomFormat>,
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formatter")
            .field("format", &self.format)
            .field("tz", &self.tz)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

impl Formatter {
    pub fn new(format: Format) -> Self {
        let timezone = match &format {
            Format::Date { timezone, .. } | Format::SmartDate { timezone, .. } => {
                timezone.as_deref()
            }
            _ => None,
        };
        let tz = timezone.and_then(|name| match name.parse::<Tz>() {
            Ok(tz) => Some(tz),
            Err(e) => {
                warn!("Unknown timezone {}, falling back to UTC: {}", name, e);
                None
            }
        });
        Self {
            format,
            tz,
            custom: None,
        }
    }

    pub fn custom(f: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        Self {
            custom: Some(Arc::new(f)),
            ..Default::default()
        }
    }

    pub fn format_spec(&self) -> &Format {
        &self.format
    }

    /// Label of a value. The null atom's label is always empty and never
    /// reaches the formatter.
    pub fn format(&self, value: &Value) -> String {
        if let Some(custom) = &self.custom {
            return custom(value);
        }

        match (&self.format, value) {
            (Format::Fixed { decimals }, _) => match value.as_f64() {
                Some(n) => format!("{:.*}", decimals, n),
                None => auto(value, self.tz),
            },
            (Format::Percent { decimals }, Value::Number(n)) => {
                format!("{:.*}%", decimals, n * 100.0)
            }
            (Format::Date { pattern, .. }, Value::Date(d)) => format_date(d, pattern, self.tz),
            (Format::SmartDate { span_secs, .. }, Value::Date(d)) => {
                format_date(d, determine_date_format(*span_secs).pattern(), self.tz)
            }
            _ => auto(value, self.tz),
        }
    }
}

fn auto(value: &Value, tz: Option<Tz>) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Boolean(b) => b.to_string(),
        Value::Date(d) => format_date(d, "%Y-%m-%d", tz),
        Value::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{:.0}", n)
            } else if n.abs() < 0.001 {
                format!("{:.4}", n)
            } else {
                format!("{:.2}", n)
            }
        }
    }
}
