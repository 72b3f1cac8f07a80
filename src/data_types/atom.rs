use super::value::{RawValue, Value};
use crate::format::Formatter;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};

/// Id of the null atom of every dimension. Non-null atoms get ids from 1 up.
pub const NULL_ATOM_ID: i64 = -1;

/// Ranks of atoms no source row of the last load touched start here, then
/// follow the atom id.
pub(crate) const UNRANKED: i64 = 1 << 40;

/// Canonical, interned value of a dimension.
///
/// Atoms are only created by a [`crate::dimension::Dimension`]. Two equal
/// values of one dimension always resolve to the same `Arc<Atom>` for as long
/// as the atom stays interned.
pub struct Atom {
    dimension: Arc<str>,
    id: i64,
    key: String,
    value: Option<Value>,
    raw: RawValue,
    formatter: Arc<Formatter>,
    label: OnceLock<String>,
    rank: AtomicI64,
}

impl Atom {
    pub(crate) fn new(
        dimension: Arc<str>,
        id: i64,
        value: Value,
        raw: RawValue,
        formatter: Arc<Formatter>,
    ) -> Self {
        Self {
            dimension,
            id,
            key: value.key(),
            value: Some(value),
            raw,
            formatter,
            label: OnceLock::new(),
            rank: AtomicI64::new(UNRANKED + id),
        }
    }

    pub(crate) fn null(dimension: Arc<str>, formatter: Arc<Formatter>) -> Self {
        Self {
            dimension,
            id: NULL_ATOM_ID,
            key: String::new(),
            value: None,
            raw: RawValue::Null,
            formatter,
            label: OnceLock::from(String::new()),
            rank: AtomicI64::new(NULL_ATOM_ID),
        }
    }

    pub fn dimension(&self) -> &str {
        &self.dimension
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// Position of the atom's first occurrence in the rows of the last load.
    pub fn first_seen_rank(&self) -> i64 {
        self.rank.load(Ordering::Relaxed)
    }

    pub(crate) fn set_first_seen_rank(&self, rank: i64) {
        self.rank.store(rank, Ordering::Relaxed);
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn raw_value(&self) -> &RawValue {
        &self.raw
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Formatted label, computed on first access.
    pub fn label(&self) -> &str {
        self.label.get_or_init(|| match &self.value {
            Some(v) => self.formatter.format(v),
            None => String::new(),
        })
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.dimension == other.dimension
    }
}

impl Eq for Atom {}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("dimension", &self.dimension)
            .field("id", &self.id)
            .field("key", &self.key)
            .finish()
    }
}

/// Joins atom keys with `,`. Backslashes and commas inside a key are
/// escaped with a backslash, so distinct tuples never share a key.
pub fn join_keys<'a>(atoms: impl IntoIterator<Item = &'a Arc<Atom>>) -> String {
    let mut key = String::new();
    for (i, atom) in atoms.into_iter().enumerate() {
        if i > 0 {
            key.push(',');
        }
        for c in atom.key().chars() {
            if c == '\\' || c == ',' {
                key.push('\\');
            }
            key.push(c);
        }
    }
    key
}
