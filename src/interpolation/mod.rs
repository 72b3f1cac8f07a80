pub mod common;
pub mod linear;
pub mod zero;

pub use common::{choose_side, scan_series, CategoryTable, Endpoint, Side, Synthesis};
pub use linear::LinearInterpolation;
pub use zero::ZeroInterpolation;

use crate::data::Data;
use crate::data_types::{Datum, Value, VirtualKind};
use eyre::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMode {
    #[default]
    None,
    Linear,
    Zero,
}

impl InterpolationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Linear => "linear",
            Self::Zero => "zero",
        }
    }

    pub fn interpolator(self) -> Option<Box<dyn Interpolator>> {
        match self {
            Self::None => None,
            Self::Linear => Some(Box::new(LinearInterpolation)),
            Self::Zero => Some(Box::new(ZeroInterpolation)),
        }
    }
}

/// Supplies the value of a point synthesized inside a null run.
pub trait Interpolator: Send + Sync {
    fn mode(&self) -> InterpolationMode;

    /// Value at `position`, strictly between `last` and `next`. `side` is
    /// the endpoint the point's group membership was given to.
    fn interpolate(&self, last: &Endpoint, next: &Endpoint, position: f64, side: Side) -> f64;
}

/// Dimensions playing the category, series and value roles.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpolationRoles {
    pub category: Vec<String>,
    #[serde(default)]
    pub series: Vec<String>,
    pub value: String,
    /// Overrides whether the category axis is discrete.
    #[serde(default)]
    pub category_discrete: Option<bool>,
}

impl InterpolationRoles {
    pub fn new(category: &[&str], series: &[&str], value: &str) -> Self {
        Self {
            category: category.iter().map(|s| s.to_string()).collect(),
            series: series.iter().map(|s| s.to_string()).collect(),
            value: value.to_string(),
            category_discrete: None,
        }
    }

    pub fn with_category_discrete(mut self, discrete: bool) -> Self {
        self.category_discrete = Some(discrete);
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InterpolationReport {
    pub categories: usize,
    pub series: usize,
    pub synthesized: usize,
    /// Synthesized datums that were not already present from a previous pass.
    pub added: usize,
}

pub(crate) fn run(
    owner: &mut Data,
    roles: &InterpolationRoles,
    mode: InterpolationMode,
    stretch_ends: bool,
) -> Result<InterpolationReport> {
    let Some(interpolator) = mode.interpolator() else {
        return Ok(InterpolationReport::default());
    };
    let start = Instant::now();
    let table = CategoryTable::build(owner, roles)?;

    let mut syntheses: Vec<Synthesis> = (0..table.series_count())
        .into_par_iter()
        .flat_map_iter(|series| scan_series(&table, series, interpolator.as_ref(), stretch_ends))
        .collect();
    syntheses.sort_by_key(|s| (s.category, s.series));

    let value_dim = table.value_dim();
    let dimension: Arc<str> = Arc::from(roles.value.as_str());
    let mut datums = Vec::with_capacity(syntheses.len());
    for s in &syntheses {
        let mut atoms = table.place(&s.source, s.category);
        atoms[value_dim] = owner
            .dimension_at_mut(value_dim)
            .intern_value(&Value::Number(s.value), true);
        datums.push(Datum::new(
            owner.complex_type().clone(),
            atoms,
            false,
            Some(VirtualKind::Interpolation {
                mode,
                dimension: dimension.clone(),
            }),
        ));
    }
    let added = owner.add_virtual_datums(datums)?;

    let report = InterpolationReport {
        categories: table.category_count(),
        series: table.series_count(),
        synthesized: syntheses.len(),
        added,
    };
    debug!(
        "{} interpolation over {} categories x {} series: {} synthesized, {} added in {:?}",
        interpolator.mode().as_str(),
        report.categories,
        report.series,
        report.synthesized,
        report.added,
        start.elapsed()
    );
    Ok(report)
}
