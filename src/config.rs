use crate::complex_type::{ComplexTypeProject, DimensionSpec};
use crate::data::Data;
use crate::grouping::GroupingSpec;
use crate::interpolation::{InterpolationMode, InterpolationReport, InterpolationRoles};
use crate::trend::{TrendKind, TrendPart, TrendReport};
use eyre::{bail, Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    pub mode: InterpolationMode,
    /// Fill runs touching the ends of a series (stacked charts).
    pub stretch_ends: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendConfig {
    pub kind: TrendKind,
    #[serde(default)]
    pub part: Option<TrendPart>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartDataConfig {
    pub dimensions: Vec<DimensionSpec>,
    /// Dimensions every grouping must answer for, such as a data part.
    pub extension_dimensions: Vec<DimensionSpec>,
    pub roles: Option<InterpolationRoles>,
    /// Textual grouping, e.g. `"series, category"`.
    pub grouping: Option<String>,
    pub interpolation: InterpolationConfig,
    pub trend: Option<TrendConfig>,
}

/// Outcome of [`ChartDataConfig::run_operators`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OperatorReport {
    pub interpolation: Option<InterpolationReport>,
    pub trend: Option<TrendReport>,
}

impl ChartDataConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).wrap_err("Invalid chart data configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<()> {
        let project = self.project()?;
        let grouping = self.grouping_spec()?;
        let mut referenced: Vec<&str> = Vec::new();
        if let Some(roles) = &self.roles {
            referenced.extend(roles.category.iter().map(String::as_str));
            referenced.extend(roles.series.iter().map(String::as_str));
            referenced.push(&roles.value);
        }
        if let Some(spec) = &grouping {
            referenced.extend(spec.dimension_names());
        }
        if let Some(part) = self.trend.as_ref().and_then(|t| t.part.as_ref()) {
            referenced.push(&part.dimension);
        }
        for name in referenced {
            if !project.has_dimension(name) {
                bail!("Configuration references undeclared dimension '{}'", name);
            }
        }

        if self.interpolation.mode != InterpolationMode::None || self.trend.is_some() {
            if self.roles.is_none() {
                bail!("Interpolation and trends need category, series and value roles");
            }
        } else if self.interpolation.stretch_ends {
            warn!("stretch_ends is set but interpolation is disabled, ignoring it");
        }
        Ok(())
    }

    pub fn project(&self) -> Result<ComplexTypeProject> {
        let mut project = ComplexTypeProject::new();
        for spec in &self.dimensions {
            if project.has_dimension(&spec.name) {
                bail!("Dimension '{}' is declared twice", spec.name);
            }
            project.set_dimension(spec.clone());
        }
        for spec in &self.extension_dimensions {
            project.set_extension_dimension(spec.clone());
        }
        Ok(project)
    }

    pub fn grouping_spec(&self) -> Result<Option<GroupingSpec>> {
        self.grouping.as_deref().map(GroupingSpec::parse).transpose()
    }

    /// Builds an empty owner for this configuration.
    pub fn build_data(&self) -> Result<Data> {
        Ok(Data::new(self.project()?.configure()?))
    }

    /// Runs the configured interpolation, then the trend.
    pub fn run_operators(&self, data: &mut Data) -> Result<OperatorReport> {
        let mut report = OperatorReport::default();
        let Some(roles) = &self.roles else {
            return Ok(report);
        };
        if self.interpolation.mode != InterpolationMode::None {
            report.interpolation =
                Some(data.interpolate(roles, self.interpolation.mode, self.interpolation.stretch_ends)?);
        }
        if let Some(trend) = &self.trend {
            report.trend = Some(data.trend(roles, trend.kind.clone(), trend.part.as_ref())?);
        }
        Ok(report)
    }
}
