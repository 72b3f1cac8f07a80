//! chart_data crate: the data engine behind charts.
//!
//! Rows are interned into per-dimension atoms, turned into datums owned by a
//! [`Data`], grouped into [`GroupTree`]s and post-processed by the
//! interpolation and trend operators.

pub mod complex_type;
pub mod config;
pub mod data;
pub mod data_types;
pub mod dimension;
pub mod format;
pub mod grouping;
pub mod interpolation;
#[cfg(feature = "polars")]
pub mod polars_source;
pub mod trend;
pub mod utils;

pub use complex_type::{ComplexType, ComplexTypeProject, DimensionSpec};
pub use config::ChartDataConfig;
pub use data::{ChangeKind, Data, DatumChange, LoadReport};
pub use data_types::{Atom, Datum, DatumFilter, RawValue, Row, RowValue, Value, ValueType, VirtualKind};
pub use dimension::{AtomOrder, AtomQuery, Dimension, DimensionType};
pub use format::{Format, Formatter};
pub use grouping::{
    DataNode, FlatteningMode, GroupTree, GroupingId, GroupingLevelSpec, GroupingOptions, GroupingSpec,
    NodeId,
};
pub use interpolation::{InterpolationMode, InterpolationReport, InterpolationRoles, Interpolator};
pub use trend::{TrendKind, TrendPart, TrendReport};
