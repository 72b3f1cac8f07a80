use super::atom::Atom;
use super::value::RawValue;
use std::sync::Arc;

/// A cell of a source row: a raw value to intern, or an atom that must
/// already belong to the target dimension.
#[derive(Clone, Debug)]
pub enum RowValue {
    Raw(RawValue),
    Atom(Arc<Atom>),
}

impl From<RawValue> for RowValue {
    fn from(raw: RawValue) -> Self {
        Self::Raw(raw)
    }
}

impl From<Arc<Atom>> for RowValue {
    fn from(atom: Arc<Atom>) -> Self {
        Self::Atom(atom)
    }
}

impl From<&str> for RowValue {
    fn from(s: &str) -> Self {
        Self::Raw(RawValue::from(s))
    }
}

impl From<String> for RowValue {
    fn from(s: String) -> Self {
        Self::Raw(RawValue::from(s))
    }
}

impl From<f64> for RowValue {
    fn from(f: f64) -> Self {
        Self::Raw(RawValue::from(f))
    }
}

impl From<i64> for RowValue {
    fn from(i: i64) -> Self {
        Self::Raw(RawValue::from(i))
    }
}

impl From<bool> for RowValue {
    fn from(b: bool) -> Self {
        Self::Raw(RawValue::from(b))
    }
}

impl<T: Into<RowValue>> From<Option<T>> for RowValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Raw(RawValue::Null))
    }
}

/// One source row, either keyed by dimension name or positional in
/// complex-type order. Dimensions missing from a row get the null atom.
#[derive(Clone, Debug)]
pub enum Row {
    Named(Vec<(String, RowValue)>),
    Positional(Vec<RowValue>),
}

impl Row {
    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RowValue>,
    {
        Self::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RowValue>,
    {
        Self::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn from_json_object(object: &serde_json::Map<String, RawValue>) -> Self {
        Self::Named(
            object
                .iter()
                .map(|(k, v)| (k.clone(), RowValue::Raw(v.clone())))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Named(pairs) => pairs.len(),
            Self::Positional(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
