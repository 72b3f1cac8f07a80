#![cfg(feature = "polars")]

use crate::data_types::{RawValue, Row, RowValue};
use eyre::Result;
use polars::prelude::*;

/// Turns the rows of a `DataFrame` into named rows, column name = dimension
/// name. Dates become UTC milliseconds.
pub struct PolarsRowSource {
    df: DataFrame,
    columns: Option<Vec<String>>,
}

impl PolarsRowSource {
    pub fn new(mut df: DataFrame) -> Self {
        // Single chunk per column keeps row access cheap
        df.rechunk_mut();
        Self { df, columns: None }
    }

    /// Restricts the rows to these columns.
    pub fn with_columns(mut self, names: &[&str]) -> Self {
        self.columns = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    fn selected_columns(&self) -> Result<Vec<&Column>> {
        match &self.columns {
            Some(names) => names
                .iter()
                .map(|n| self.df.column(n).map_err(Into::into))
                .collect(),
            None => Ok(self.df.get_columns().iter().collect()),
        }
    }

    pub fn rows(&self) -> Result<Vec<Row>> {
        let columns = self.selected_columns()?;
        let names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();
        let mut rows = Vec::with_capacity(self.df.height());
        for i in 0..self.df.height() {
            let mut pairs = Vec::with_capacity(columns.len());
            for (name, column) in names.iter().zip(&columns) {
                let value = column.get(i)?;
                pairs.push((name.clone(), RowValue::Raw(any_value_to_raw(&value))));
            }
            rows.push(Row::Named(pairs));
        }
        Ok(rows)
    }
}

pub fn any_value_to_raw(value: &AnyValue) -> RawValue {
    match value {
        AnyValue::Null => RawValue::Null,
        AnyValue::Boolean(b) => RawValue::Bool(*b),
        AnyValue::String(s) => RawValue::from(*s),
        AnyValue::StringOwned(s) => RawValue::from(s.as_str()),
        AnyValue::Int8(v) => RawValue::from(*v),
        AnyValue::Int16(v) => RawValue::from(*v),
        AnyValue::Int32(v) => RawValue::from(*v),
        AnyValue::Int64(v) => RawValue::from(*v),
        AnyValue::UInt8(v) => RawValue::from(*v),
        AnyValue::UInt16(v) => RawValue::from(*v),
        AnyValue::UInt32(v) => RawValue::from(*v),
        AnyValue::UInt64(v) => RawValue::from(*v),
        AnyValue::Float32(v) => float(*v as f64),
        AnyValue::Float64(v) => float(*v),
        AnyValue::Date(days) => RawValue::from(*days as i64 * 86_400_000),
        AnyValue::Datetime(v, unit, _) => RawValue::from(to_millis(*v, *unit)),
        AnyValue::DatetimeOwned(v, unit, _) => RawValue::from(to_millis(*v, *unit)),
        other => other.extract::<f64>().map(float).unwrap_or(RawValue::Null),
    }
}

fn float(v: f64) -> RawValue {
    serde_json::Number::from_f64(v)
        .map(RawValue::Number)
        .unwrap_or(RawValue::Null)
}

fn to_millis(v: i64, unit: TimeUnit) -> i64 {
    match unit {
        TimeUnit::Nanoseconds => v / 1_000_000,
        TimeUnit::Microseconds => v / 1_000,
        TimeUnit::Milliseconds => v,
    }
}
