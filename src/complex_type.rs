use crate::data_types::{join_keys, Atom, ValueType};
use crate::dimension::DimensionType;
use crate::format::{Format, Formatter};
use eyre::{ensure, eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered set of dimension types shared by all datums of an owner.
#[derive(Debug)]
pub struct ComplexType {
    dimensions: Vec<Arc<DimensionType>>,
    index: HashMap<String, usize>,
    key_indices: Vec<usize>,
    extension: Vec<usize>,
}

impl ComplexType {
    pub fn new(dimensions: Vec<DimensionType>) -> Result<Self> {
        Self::with_extensions(dimensions, &[])
    }

    /// `extension` names dimensions that are not part of any grouping path
    /// but must be present (discriminators such as a data part).
    pub fn with_extensions(dimensions: Vec<DimensionType>, extension: &[&str]) -> Result<Self> {
        ensure!(!dimensions.is_empty(), "A complex type needs at least one dimension");

        let mut index = HashMap::with_capacity(dimensions.len());
        for (i, dim) in dimensions.iter().enumerate() {
            ensure!(!dim.name().is_empty(), "Dimension names cannot be empty");
            ensure!(
                index.insert(dim.name().to_string(), i).is_none(),
                "Dimension '{}' is declared twice",
                dim.name()
            );
        }

        let mut key_indices: Vec<usize> = dimensions
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_key())
            .map(|(i, _)| i)
            .collect();
        if key_indices.is_empty() {
            key_indices = (0..dimensions.len()).collect();
        }

        let extension = extension
            .iter()
            .map(|name| {
                index
                    .get(*name)
                    .copied()
                    .ok_or_else(|| eyre!("Extension dimension '{}' is not declared", name))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            dimensions: dimensions.into_iter().map(Arc::new).collect(),
            index,
            key_indices,
            extension,
        })
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn dimensions(&self) -> &[Arc<DimensionType>] {
        &self.dimensions
    }

    pub fn dimension(&self, name: &str) -> Option<&Arc<DimensionType>> {
        self.dimension_index(name).map(|i| &self.dimensions[i])
    }

    pub fn dimension_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Like [`Self::dimension_index`], but an unknown name is an error.
    pub fn require_index(&self, name: &str) -> Result<usize> {
        self.dimension_index(name)
            .ok_or_else(|| eyre!("Unknown dimension '{}'", name))
    }

    pub fn key_indices(&self) -> &[usize] {
        &self.key_indices
    }

    pub fn extension_indices(&self) -> &[usize] {
        &self.extension
    }

    pub fn is_extension(&self, name: &str) -> bool {
        self.dimension_index(name)
            .is_some_and(|i| self.extension.contains(&i))
    }

    /// Semantic key of a full atom vector.
    pub fn key_of(&self, atoms: &[Arc<Atom>]) -> String {
        join_keys(self.key_indices.iter().map(|&i| &atoms[i]))
    }
}

fn default_true() -> bool {
    true
}

/// Declaration of one dimension, as read from configuration or roles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DimensionSpec {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub value_type: ValueType,
    /// Forces a continuous type to be handled as discrete.
    #[serde(default)]
    pub is_discrete: Option<bool>,
    #[serde(default = "default_true")]
    pub is_key: bool,
    /// Rows where this dimension is null are rejected on load.
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub format: Format,
}

impl DimensionSpec {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            label: None,
            value_type,
            is_discrete: None,
            is_key: true,
            required: false,
            reverse: false,
            format: Format::Auto,
        }
    }

    pub fn discrete(mut self, is_discrete: bool) -> Self {
        self.is_discrete = Some(is_discrete);
        self
    }

    pub fn key(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn to_dimension_type(&self) -> DimensionType {
        let mut ty = DimensionType::new(self.name.clone(), self.value_type)
            .with_key(self.is_key)
            .with_required(self.required)
            .with_reverse(self.reverse)
            .with_formatter(Formatter::new(self.format.clone()));
        if let Some(is_discrete) = self.is_discrete {
            ty = ty.with_discrete(is_discrete);
        }
        if let Some(label) = &self.label {
            ty = ty.with_label(label.clone());
        }
        ty
    }
}

/// Collects dimension declarations before the complex type is fixed.
///
/// Later declarations of the same name refine earlier ones; dimensions that
/// are only read (referenced by a role but never declared) default to
/// [`ValueType::Any`].
#[derive(Clone, Debug, Default)]
pub struct ComplexTypeProject {
    specs: Vec<DimensionSpec>,
    index: HashMap<String, usize>,
    extension: Vec<String>,
}

impl ComplexTypeProject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares or replaces a dimension, keeping its original position.
    pub fn set_dimension(&mut self, spec: DimensionSpec) -> &mut Self {
        match self.index.get(&spec.name) {
            Some(&i) => self.specs[i] = spec,
            None => {
                self.index.insert(spec.name.clone(), self.specs.len());
                self.specs.push(spec);
            }
        }
        self
    }

    /// Makes sure a dimension exists, declaring it with defaults if needed.
    pub fn read_dimension(&mut self, name: &str) -> &mut Self {
        if !self.index.contains_key(name) {
            self.set_dimension(DimensionSpec::new(name, ValueType::Any));
        }
        self
    }

    /// Declares a dimension that must exist even when no role uses it.
    pub fn set_extension_dimension(&mut self, spec: DimensionSpec) -> &mut Self {
        if !self.extension.contains(&spec.name) {
            self.extension.push(spec.name.clone());
        }
        self.set_dimension(spec)
    }

    pub fn has_dimension(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn dimension_spec(&self, name: &str) -> Option<&DimensionSpec> {
        self.index.get(name).map(|&i| &self.specs[i])
    }

    pub fn dimension_names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|s| s.name.as_str())
    }

    pub fn configure(&self) -> Result<ComplexType> {
        let extension: Vec<&str> = self.extension.iter().map(String::as_str).collect();
        ComplexType::with_extensions(
            self.specs.iter().map(DimensionSpec::to_dimension_type).collect(),
            &extension,
        )
    }
}
