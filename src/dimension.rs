use crate::data_types::atom::UNRANKED;
use crate::data_types::{Atom, RawValue, Value, ValueType};
use crate::format::Formatter;
use eyre::{bail, ensure, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;

/// How the atoms of a dimension are ordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomOrder {
    /// Order in which values were first interned.
    FirstSeen,
    /// Natural order of the values (numeric, temporal, lexical).
    Natural,
}

/// Static description of a dimension: a named, typed column.
#[derive(Clone, Debug)]
pub struct DimensionType {
    name: Arc<str>,
    label: String,
    value_type: ValueType,
    is_discrete: bool,
    is_key: bool,
    is_required: bool,
    reverse: bool,
    formatter: Arc<Formatter>,
}

impl DimensionType {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        let name: String = name.into();
        Self {
            label: name.clone(),
            name: name.into(),
            value_type,
            is_discrete: !value_type.is_continuous(),
            is_key: true,
            is_required: false,
            reverse: false,
            formatter: Arc::new(Formatter::default()),
        }
    }

    /// A continuous type can be treated as discrete (e.g. years as labels).
    /// Discrete types stay discrete.
    pub fn with_discrete(mut self, is_discrete: bool) -> Self {
        self.is_discrete = is_discrete || !self.value_type.is_continuous();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_key(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    pub fn with_required(mut self, is_required: bool) -> Self {
        self.is_required = is_required;
        self
    }

    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn is_discrete(&self) -> bool {
        self.is_discrete
    }

    pub fn is_key(&self) -> bool {
        self.is_key
    }

    pub fn is_required(&self) -> bool {
        self.is_required
    }

    pub fn is_reversed(&self) -> bool {
        self.reverse
    }

    pub fn formatter(&self) -> &Arc<Formatter> {
        &self.formatter
    }

    /// Default order: first-seen for discrete dimensions, natural otherwise.
    pub fn default_order(&self) -> AtomOrder {
        if self.is_discrete {
            AtomOrder::FirstSeen
        } else {
            AtomOrder::Natural
        }
    }

    /// Compares two atoms of this dimension. The null atom always sorts first,
    /// regardless of `reverse`.
    pub fn compare_atoms(&self, a: &Atom, b: &Atom, order: AtomOrder, reverse: bool) -> Ordering {
        let ord = match (a.value(), b.value()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(va), Some(vb)) => match order {
                AtomOrder::FirstSeen => a
                    .first_seen_rank()
                    .cmp(&b.first_seen_rank())
                    .then_with(|| a.id().cmp(&b.id())),
                AtomOrder::Natural => va.compare(vb).then_with(|| a.id().cmp(&b.id())),
            },
        };
        if reverse != self.reverse {
            ord.reverse()
        } else {
            ord
        }
    }
}

/// Filters and order of [`Dimension::atoms`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AtomQuery {
    pub include_null: bool,
    pub include_virtual: bool,
    pub order: Option<AtomOrder>,
}

pub(crate) struct DimensionCheckpoint {
    next_id: i64,
    virtual_keys: HashSet<String>,
}

/// Registry of the interned atoms of one dimension.
///
/// Owned by the owner [`crate::data::Data`]; there is no registry shared
/// between owners.
#[derive(Debug)]
pub struct Dimension {
    ty: Arc<DimensionType>,
    atoms: HashMap<String, Arc<Atom>>,
    virtual_keys: HashSet<String>,
    null_atom: Arc<Atom>,
    next_id: i64,
}

impl Dimension {
    pub fn new(ty: Arc<DimensionType>) -> Self {
        let null_atom = Arc::new(Atom::null(ty.name.clone(), ty.formatter.clone()));
        Self {
            ty,
            atoms: HashMap::new(),
            virtual_keys: HashSet::new(),
            null_atom,
            next_id: 1,
        }
    }

    pub fn name(&self) -> &str {
        self.ty.name()
    }

    pub fn dimension_type(&self) -> &Arc<DimensionType> {
        &self.ty
    }

    pub fn null_atom(&self) -> &Arc<Atom> {
        &self.null_atom
    }

    /// Number of interned non-null atoms.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn atom(&self, key: &str) -> Option<&Arc<Atom>> {
        if key.is_empty() {
            Some(&self.null_atom)
        } else {
            self.atoms.get(key)
        }
    }

    pub fn contains(&self, atom: &Arc<Atom>) -> bool {
        if atom.is_null() {
            return Arc::ptr_eq(atom, &self.null_atom);
        }
        self.atoms
            .get(atom.key())
            .is_some_and(|a| Arc::ptr_eq(a, atom))
    }

    /// Interns a raw value coming from a source row.
    pub fn intern(&mut self, raw: &RawValue) -> Arc<Atom> {
        self.intern_raw(raw, false)
    }

    /// Interns a raw value produced by an operator rather than a source row.
    pub fn intern_virtual(&mut self, raw: &RawValue) -> Arc<Atom> {
        self.intern_raw(raw, true)
    }

    /// Interns an already typed value.
    pub fn intern_value(&mut self, value: &Value, is_virtual: bool) -> Arc<Atom> {
        self.intern_raw(&value.to_raw(), is_virtual)
    }

    fn intern_raw(&mut self, raw: &RawValue, is_virtual: bool) -> Arc<Atom> {
        let Some(value) = self.ty.value_type.cast(raw) else {
            if !raw.is_null() {
                trace!("Cannot cast {} into dimension {}, using null", raw, self.name());
            }
            return self.null_atom.clone();
        };

        let key = value.key();
        if let Some(atom) = self.atoms.get(&key) {
            if !is_virtual {
                self.virtual_keys.remove(&key);
            }
            return atom.clone();
        }

        let atom = Arc::new(Atom::new(
            self.ty.name.clone(),
            self.next_id,
            value,
            raw.clone(),
            self.ty.formatter.clone(),
        ));
        self.next_id += 1;
        if is_virtual {
            self.virtual_keys.insert(key.clone());
        }
        self.atoms.insert(key, atom.clone());
        atom
    }

    /// Accepts an atom built elsewhere. It must be this registry's own atom.
    pub fn intern_atom(&mut self, atom: &Arc<Atom>) -> Result<Arc<Atom>> {
        ensure!(
            atom.dimension() == self.name(),
            "Atom of dimension '{}' cannot be interned into dimension '{}'",
            atom.dimension(),
            self.name()
        );
        if atom.is_null() {
            ensure!(
                Arc::ptr_eq(atom, &self.null_atom),
                "Foreign null atom for dimension '{}'",
                self.name()
            );
            return Ok(self.null_atom.clone());
        }
        match self.atoms.get(atom.key()) {
            Some(existing) if Arc::ptr_eq(existing, atom) => Ok(existing.clone()),
            Some(_) => bail!(
                "Two different atoms claim key '{}' in dimension '{}'",
                atom.key(),
                self.name()
            ),
            None => bail!(
                "Atom '{}' is not registered in dimension '{}'",
                atom.key(),
                self.name()
            ),
        }
    }

    /// Looks a raw value up without interning it.
    pub fn read(&self, raw: &RawValue) -> Option<&Arc<Atom>> {
        match self.ty.value_type.cast(raw) {
            Some(value) => self.atoms.get(&value.key()),
            None => Some(&self.null_atom),
        }
    }

    /// Removes an atom from the registry.
    pub fn unintern(&mut self, atom: &Arc<Atom>) -> Result<()> {
        ensure!(
            !atom.is_null(),
            "The null atom of dimension '{}' cannot be uninterned",
            self.name()
        );
        ensure!(
            self.contains(atom),
            "Atom '{}' is not interned in dimension '{}'",
            atom.key(),
            self.name()
        );
        self.atoms.remove(atom.key());
        self.virtual_keys.remove(atom.key());
        Ok(())
    }

    /// Uninterns every atom whose key is not in `keep`. Returns how many were
    /// removed.
    pub(crate) fn retain_keys(&mut self, keep: &HashSet<String>) -> Result<usize> {
        let stale: Vec<Arc<Atom>> = self
            .atoms
            .values()
            .filter(|a| !keep.contains(a.key()))
            .cloned()
            .collect();
        for atom in &stale {
            self.unintern(atom)?;
        }
        Ok(stale.len())
    }

    pub(crate) fn checkpoint(&self) -> DimensionCheckpoint {
        DimensionCheckpoint {
            next_id: self.next_id,
            virtual_keys: self.virtual_keys.clone(),
        }
    }

    /// Forgets every atom interned since `checkpoint`.
    pub(crate) fn rollback(&mut self, checkpoint: DimensionCheckpoint) {
        let before = self.atoms.len();
        self.atoms.retain(|_, a| a.id() < checkpoint.next_id);
        self.virtual_keys = checkpoint.virtual_keys;
        self.next_id = checkpoint.next_id;
        trace!(
            "Rolled back {} atoms of dimension {}",
            before - self.atoms.len(),
            self.name()
        );
    }

    /// Ranks atoms by their first occurrence in a row stream. Atoms missing
    /// from `first_seen` fall back to id order, after the ranked ones.
    pub(crate) fn rank_first_seen(&self, first_seen: &[Arc<Atom>]) {
        for atom in self.atoms.values() {
            atom.set_first_seen_rank(UNRANKED + atom.id());
        }
        for (rank, atom) in first_seen.iter().enumerate() {
            atom.set_first_seen_rank(rank as i64);
        }
    }

    pub fn is_virtual(&self, atom: &Atom) -> bool {
        self.virtual_keys.contains(atom.key())
    }

    /// Interned atoms, sorted by the dimension comparer.
    pub fn atoms(&self, query: AtomQuery) -> Vec<Arc<Atom>> {
        let order = query.order.unwrap_or_else(|| self.ty.default_order());
        let mut atoms: Vec<Arc<Atom>> = self
            .atoms
            .values()
            .filter(|a| query.include_virtual || !self.virtual_keys.contains(a.key()))
            .cloned()
            .collect();
        if query.include_null {
            atoms.push(self.null_atom.clone());
        }
        atoms.sort_by(|a, b| self.ty.compare_atoms(a, b, order, false));
        atoms
    }
}
