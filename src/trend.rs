use crate::data::Data;
use crate::data_types::{Datum, RawValue, Value, VirtualKind};
use crate::interpolation::{CategoryTable, InterpolationRoles};
use eyre::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrendKind {
    Linear,
    MovingAverage { window: usize },
}

impl TrendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::MovingAverage { .. } => "moving_average",
        }
    }
}

/// Atom stamped on trend datums so that they do not share a key with the
/// source datums, e.g. `dataPart = "trend"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendPart {
    pub dimension: String,
    pub value: RawValue,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrendReport {
    pub series: usize,
    /// Series with too few points for the trend.
    pub skipped_series: usize,
    pub added: usize,
}

/// Slope and intercept of the least-squares line through `points`.
pub fn least_squares(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
    let (mean_x, mean_y) = (sum_x / n, sum_y / n);
    let (mut sxx, mut sxy) = (0.0, 0.0);
    for (x, y) in points {
        sxx += (x - mean_x) * (x - mean_x);
        sxy += (x - mean_x) * (y - mean_y);
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}

/// Trend value per category of one series, `None` where it is undefined.
fn series_trend(table: &CategoryTable, series: usize, kind: &TrendKind) -> Option<Vec<Option<f64>>> {
    let count = table.category_count();
    match kind {
        TrendKind::Linear => {
            let points: Vec<(f64, f64)> = (0..count)
                .filter_map(|c| table.cell(series, c).map(|cell| (table.categories()[c].position, cell.value)))
                .collect();
            let (slope, intercept) = least_squares(&points)?;
            Some(
                table
                    .categories()
                    .iter()
                    .map(|c| Some(intercept + slope * c.position))
                    .collect(),
            )
        }
        TrendKind::MovingAverage { window } => {
            let mut recent: Vec<f64> = Vec::with_capacity(*window);
            let mut out = Vec::with_capacity(count);
            for c in 0..count {
                if let Some(cell) = table.cell(series, c) {
                    if recent.len() == *window {
                        recent.remove(0);
                    }
                    recent.push(cell.value);
                }
                out.push(if recent.is_empty() {
                    None
                } else {
                    Some(recent.iter().sum::<f64>() / recent.len() as f64)
                });
            }
            Some(out)
        }
    }
}

pub(crate) fn run(
    owner: &mut Data,
    roles: &InterpolationRoles,
    kind: TrendKind,
    part: Option<&TrendPart>,
) -> Result<TrendReport> {
    if let TrendKind::MovingAverage { window } = kind {
        ensure!(window > 0, "A moving average needs a window of at least one category");
    }
    let part_dim = part
        .map(|p| owner.complex_type().require_index(&p.dimension))
        .transpose()?;
    let table = CategoryTable::build(owner, roles)?;
    let value_dim = table.value_dim();
    let dimension: Arc<str> = Arc::from(roles.value.as_str());

    let part_atom = match (part, part_dim) {
        (Some(p), Some(i)) => Some((i, owner.dimension_at_mut(i).intern_virtual(&p.value))),
        _ => None,
    };

    let mut report = TrendReport {
        series: table.series_count(),
        ..Default::default()
    };
    let mut datums = Vec::new();
    for series in 0..table.series_count() {
        let Some(values) = series_trend(&table, series, &kind) else {
            report.skipped_series += 1;
            continue;
        };
        let Some(source) = (0..table.category_count()).find_map(|c| table.cell(series, c)) else {
            report.skipped_series += 1;
            continue;
        };
        let source = source.source.clone();
        for (category, value) in values.into_iter().enumerate() {
            let Some(value) = value else { continue };
            let mut atoms = table.place(&source, category);
            atoms[value_dim] = owner
                .dimension_at_mut(value_dim)
                .intern_value(&Value::Number(value), true);
            if let Some((i, atom)) = &part_atom {
                atoms[*i] = atom.clone();
            }
            datums.push(Datum::new(
                owner.complex_type().clone(),
                atoms,
                false,
                Some(VirtualKind::Trend {
                    kind: kind.clone(),
                    dimension: dimension.clone(),
                }),
            ));
        }
    }
    report.added = owner.add_virtual_datums(datums)?;

    debug!(
        "{} trend over {} series: {} datums added, {} series skipped",
        kind.as_str(),
        report.series,
        report.added,
        report.skipped_series
    );
    Ok(report)
}
