use crate::complex_type::ComplexType;
use crate::data_types::{join_keys, Atom, Datum, DatumFilter, RawValue, Row, RowValue};
use crate::dimension::Dimension;
use crate::grouping::{GroupTree, GroupingId, GroupingOptions, GroupingSpec};
use crate::interpolation::{self, InterpolationMode, InterpolationReport, InterpolationRoles};
use crate::trend::{self, TrendKind, TrendPart, TrendReport};
use eyre::{ensure, eyre, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Selected(bool),
    Visible(bool),
}

/// Passed to the hook installed with [`Data::on_datum_changed`].
#[derive(Clone, Debug)]
pub struct DatumChange {
    pub datum: Arc<Datum>,
    pub kind: ChangeKind,
}

type ChangeHook = Box<dyn FnMut(&DatumChange) + Send + Sync>;

/// Counters of one [`Data::load`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_read: usize,
    /// Datums created by this load.
    pub datums_added: usize,
    /// Datums of the previous load kept because their key reappeared.
    pub datums_kept: usize,
    pub duplicates: usize,
    /// Rows rejected by the filter or by a null required dimension.
    pub rejected: usize,
    pub atoms_collected: usize,
}

impl LoadReport {
    pub fn datum_count(&self) -> usize {
        self.datums_added + self.datums_kept
    }
}

struct RowPass {
    datums: Vec<Arc<Datum>>,
    by_key: HashMap<String, usize>,
    /// Per dimension, atoms in order of first occurrence.
    first_seen: Vec<Vec<Arc<Atom>>>,
}

struct CachedGrouping {
    spec: GroupingSpec,
    options: GroupingOptions,
    tree: GroupTree,
}

/// Root of a data set. Sole mutator of its atom registries and datums.
pub struct Data {
    complex_type: Arc<ComplexType>,
    dimensions: Vec<Dimension>,
    datums: Vec<Arc<Datum>>,
    by_key: HashMap<String, usize>,
    virtual_keys: HashSet<String>,
    loaded: bool,
    state: Arc<AtomicU64>,
    groupings: Vec<CachedGrouping>,
    on_change: Option<ChangeHook>,
}

impl Data {
    pub fn new(complex_type: ComplexType) -> Self {
        let complex_type = Arc::new(complex_type);
        let dimensions = complex_type
            .dimensions()
            .iter()
            .map(|ty| Dimension::new(ty.clone()))
            .collect();
        Self {
            complex_type,
            dimensions,
            datums: Vec::new(),
            by_key: HashMap::new(),
            virtual_keys: HashSet::new(),
            loaded: false,
            state: Arc::new(AtomicU64::new(0)),
            groupings: Vec::new(),
            on_change: None,
        }
    }

    pub fn complex_type(&self) -> &Arc<ComplexType> {
        &self.complex_type
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.complex_type
            .dimension_index(name)
            .map(|i| &self.dimensions[i])
    }

    pub(crate) fn dimension_at_mut(&mut self, index: usize) -> &mut Dimension {
        &mut self.dimensions[index]
    }

    /// Interns a raw value into one of this owner's dimensions.
    pub fn intern(&mut self, dimension: &str, raw: &RawValue) -> Result<Arc<Atom>> {
        let index = self.complex_type.require_index(dimension)?;
        Ok(self.dimensions[index].intern(raw))
    }

    pub fn datums(&self) -> &[Arc<Datum>] {
        &self.datums
    }

    pub fn datums_where(&self, filter: &DatumFilter) -> Vec<Arc<Datum>> {
        self.datums
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect()
    }

    /// Source datum with the given semantic key.
    pub fn datum(&self, key: &str) -> Option<&Arc<Datum>> {
        self.by_key.get(key).map(|&i| &self.datums[i])
    }

    pub fn len(&self) -> usize {
        self.datums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datums.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Bumped on every selection or visibility change.
    pub fn state_token(&self) -> u64 {
        self.state.load(Ordering::Acquire)
    }

    pub(crate) fn state_handle(&self) -> Arc<AtomicU64> {
        self.state.clone()
    }

    fn row_atoms(&mut self, row: &Row) -> Result<Vec<Arc<Atom>>> {
        let mut atoms: Vec<Arc<Atom>> = self
            .dimensions
            .iter()
            .map(|d| d.null_atom().clone())
            .collect();
        match row {
            Row::Named(pairs) => {
                for (name, value) in pairs {
                    match self.complex_type.dimension_index(name) {
                        Some(i) => atoms[i] = intern_cell(&mut self.dimensions[i], value)?,
                        None => trace!("Ignoring column {} outside the complex type", name),
                    }
                }
            }
            Row::Positional(values) => {
                ensure!(
                    values.len() <= self.dimensions.len(),
                    "Row has {} values but the complex type has {} dimensions",
                    values.len(),
                    self.dimensions.len()
                );
                for (i, value) in values.iter().enumerate() {
                    atoms[i] = intern_cell(&mut self.dimensions[i], value)?;
                }
            }
        }
        Ok(atoms)
    }

    /// Loads (or reloads) the datum set from `rows`.
    ///
    /// The first occurrence of a semantic key wins. On reload, datums whose key
    /// reappears keep their identity and state, virtual and null datums are
    /// dropped, atoms no surviving datum references are uninterned, and every
    /// cached grouping is rebuilt. A row that does not fit the complex type
    /// fails the whole load and leaves the registries as they were.
    pub fn load<I>(&mut self, rows: I, filter: Option<&dyn Fn(&Datum) -> bool>) -> Result<LoadReport>
    where
        I: IntoIterator<Item = Row>,
    {
        let start = Instant::now();
        let is_reload = self.loaded;
        let mut report = LoadReport::default();

        let checkpoints: Vec<_> = self.dimensions.iter().map(Dimension::checkpoint).collect();
        let pass = match self.read_rows(rows, filter, &mut report) {
            Ok(pass) => pass,
            Err(e) => {
                for (dimension, checkpoint) in self.dimensions.iter_mut().zip(checkpoints) {
                    dimension.rollback(checkpoint);
                }
                return Err(e);
            }
        };
        let RowPass {
            datums,
            by_key,
            first_seen,
        } = pass;

        if is_reload {
            let mut touched: Vec<HashSet<String>> = vec![HashSet::new(); self.dimensions.len()];
            for datum in &datums {
                for (keys, atom) in touched.iter_mut().zip(datum.atoms()) {
                    if !atom.is_null() {
                        keys.insert(atom.key().to_string());
                    }
                }
            }
            for (dimension, keys) in self.dimensions.iter_mut().zip(&touched) {
                report.atoms_collected += dimension.retain_keys(keys)?;
            }
        }

        for (dimension, order) in self.dimensions.iter().zip(&first_seen) {
            dimension.rank_first_seen(order);
        }

        self.datums = datums;
        self.by_key = by_key;
        self.virtual_keys.clear();
        self.loaded = true;
        self.state.fetch_add(1, Ordering::AcqRel);
        self.regroup()?;

        debug!(
            "Loaded {} rows into {} datums ({} kept, {} duplicates, {} rejected, {} atoms collected) in {:?}",
            report.rows_read,
            report.datum_count(),
            report.datums_kept,
            report.duplicates,
            report.rejected,
            report.atoms_collected,
            start.elapsed()
        );
        Ok(report)
    }

    fn read_rows<I>(
        &mut self,
        rows: I,
        filter: Option<&dyn Fn(&Datum) -> bool>,
        report: &mut LoadReport,
    ) -> Result<RowPass>
    where
        I: IntoIterator<Item = Row>,
    {
        let mut previous: HashMap<String, Arc<Datum>> = self
            .datums
            .iter()
            .filter(|d| !d.is_virtual() && !d.is_null())
            .map(|d| (d.key().to_string(), d.clone()))
            .collect();

        let mut pass = RowPass {
            datums: Vec::new(),
            by_key: HashMap::new(),
            first_seen: vec![Vec::new(); self.dimensions.len()],
        };
        let mut seen: Vec<HashSet<i64>> = vec![HashSet::new(); self.dimensions.len()];

        for row in rows {
            report.rows_read += 1;
            let atoms = self.row_atoms(&row)?;
            for ((order, ids), atom) in pass.first_seen.iter_mut().zip(&mut seen).zip(&atoms) {
                if !atom.is_null() && ids.insert(atom.id()) {
                    order.push(atom.clone());
                }
            }

            let missing_required = self
                .complex_type
                .dimensions()
                .iter()
                .zip(&atoms)
                .any(|(ty, atom)| ty.is_required() && atom.is_null());
            if missing_required {
                report.rejected += 1;
                continue;
            }

            let candidate = Datum::new(self.complex_type.clone(), atoms, false, None);
            if let Some(accept) = filter {
                if !accept(&candidate) {
                    report.rejected += 1;
                    continue;
                }
            }
            if pass.by_key.contains_key(candidate.key()) {
                report.duplicates += 1;
                continue;
            }

            let datum = match previous.remove(candidate.key()) {
                Some(existing) => {
                    report.datums_kept += 1;
                    existing
                }
                None => {
                    report.datums_added += 1;
                    Arc::new(candidate)
                }
            };
            pass.by_key.insert(datum.key().to_string(), pass.datums.len());
            pass.datums.push(datum);
        }
        Ok(pass)
    }

    /// Adds a null datum: a placeholder that is always visible and never
    /// selected. It is not indexed by key and does not survive a reload.
    pub fn add_null_datum(&mut self, row: Row) -> Result<Arc<Datum>> {
        let atoms = self.row_atoms(&row)?;
        let datum = Arc::new(Datum::new(self.complex_type.clone(), atoms, true, None));
        self.datums.push(datum.clone());
        self.regroup()?;
        Ok(datum)
    }

    /// Adds operator-built virtual datums at the end of a pass. A datum whose
    /// atoms equal an already added virtual datum is skipped. Returns how many
    /// were added.
    pub(crate) fn add_virtual_datums(&mut self, datums: Vec<Datum>) -> Result<usize> {
        let mut added = 0;
        for datum in datums {
            ensure!(
                Arc::ptr_eq(datum.complex_type(), &self.complex_type),
                "Datum belongs to a different owner"
            );
            ensure!(datum.is_virtual(), "Only virtual datums can be added by operators");
            let full_key = format!("{:?}|{}", datum.virtual_kind(), join_keys(datum.atoms()));
            if !self.virtual_keys.insert(full_key) {
                continue;
            }
            self.datums.push(Arc::new(datum));
            added += 1;
        }
        if added > 0 {
            self.regroup()?;
        }
        Ok(added)
    }

    pub fn set_selected(&mut self, datum: &Arc<Datum>, selected: bool) -> bool {
        if !datum.set_selected(selected) {
            return false;
        }
        self.notify(datum, ChangeKind::Selected(selected));
        true
    }

    pub fn set_visible(&mut self, datum: &Arc<Datum>, visible: bool) -> bool {
        if !datum.set_visible(visible) {
            return false;
        }
        self.notify(datum, ChangeKind::Visible(visible));
        true
    }

    /// Unselects every datum. Returns whether anything changed.
    pub fn clear_selected(&mut self) -> bool {
        let selected = self.selected_datums();
        let mut changed = false;
        for datum in &selected {
            changed |= self.set_selected(datum, false);
        }
        changed
    }

    /// Selects all of `datums` unless they are all selected already, in which
    /// case they are all unselected.
    pub fn toggle_selected(&mut self, datums: &[Arc<Datum>]) -> bool {
        let select = datums.iter().any(|d| !d.is_null() && !d.is_selected());
        let mut changed = false;
        for datum in datums {
            changed |= self.set_selected(datum, select);
        }
        changed
    }

    pub fn selected_datums(&self) -> Vec<Arc<Datum>> {
        self.datums
            .iter()
            .filter(|d| d.is_selected())
            .cloned()
            .collect()
    }

    /// Installs the hook called after every selection or visibility change.
    /// The hook must not reload this owner.
    pub fn on_datum_changed<F>(&mut self, hook: F)
    where
        F: FnMut(&DatumChange) + Send + Sync + 'static,
    {
        self.on_change = Some(Box::new(hook));
    }

    fn notify(&mut self, datum: &Arc<Datum>, kind: ChangeKind) {
        self.state.fetch_add(1, Ordering::AcqRel);
        if let Some(hook) = self.on_change.as_mut() {
            hook(&DatumChange {
                datum: datum.clone(),
                kind,
            });
        }
    }

    /// Groups the owner's datums, reusing a cached tree for an identical
    /// request. The tree is rebuilt whenever the datum set changes.
    pub fn group_by(&mut self, spec: GroupingSpec, options: GroupingOptions) -> Result<GroupingId> {
        if let Some(i) = self
            .groupings
            .iter()
            .position(|g| g.spec == spec && g.options == options)
        {
            return Ok(GroupingId(i));
        }
        let tree = GroupTree::build(self, &spec, &options)?;
        self.groupings.push(CachedGrouping {
            spec,
            options,
            tree,
        });
        Ok(GroupingId(self.groupings.len() - 1))
    }

    pub fn grouping(&self, id: GroupingId) -> Option<&GroupTree> {
        self.groupings.get(id.0).map(|g| &g.tree)
    }

    /// Shorthand for grouping and returning the tree.
    pub fn grouped(&mut self, spec: GroupingSpec, options: GroupingOptions) -> Result<&GroupTree> {
        let id = self.group_by(spec, options)?;
        self.grouping(id)
            .ok_or_else(|| eyre!("Grouping {:?} vanished from the cache", id))
    }

    fn regroup(&mut self) -> Result<()> {
        for i in 0..self.groupings.len() {
            let tree = GroupTree::build(self, &self.groupings[i].spec, &self.groupings[i].options)?;
            self.groupings[i].tree = tree;
        }
        Ok(())
    }

    /// Fills null gaps of every series with interpolation datums.
    pub fn interpolate(
        &mut self,
        roles: &InterpolationRoles,
        mode: InterpolationMode,
        stretch_ends: bool,
    ) -> Result<InterpolationReport> {
        interpolation::run(self, roles, mode, stretch_ends)
    }

    /// Adds trend datums for every series.
    pub fn trend(
        &mut self,
        roles: &InterpolationRoles,
        kind: TrendKind,
        part: Option<&TrendPart>,
    ) -> Result<TrendReport> {
        trend::run(self, roles, kind, part)
    }
}

fn intern_cell(dimension: &mut Dimension, value: &RowValue) -> Result<Arc<Atom>> {
    match value {
        RowValue::Raw(raw) => Ok(dimension.intern(raw)),
        RowValue::Atom(atom) => dimension.intern_atom(atom),
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("complex_type", &self.complex_type)
            .field("datums", &self.datums.len())
            .field("loaded", &self.loaded)
            .field("groupings", &self.groupings.len())
            .field("state", &self.state_token())
            .finish()
    }
}
