use super::{InterpolationRoles, Interpolator};
use crate::data::Data;
use crate::data_types::{join_keys, Atom, Datum, DatumFilter};
use crate::dimension::AtomOrder;
use crate::grouping::{GroupTree, GroupingDimensionSpec, GroupingLevelSpec, GroupingOptions, GroupingSpec, ROOT};
use eyre::{ensure, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Which endpoint of a null run a synthesized point belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Last,
    Next,
}

/// A non-null cell bounding a null run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Endpoint {
    pub index: usize,
    pub position: f64,
    pub value: f64,
}

/// Group membership of the point at category `index`, strictly between
/// `last` and `next`.
///
/// Discrete axes compare indexes: with `step_count = next - last` and
/// `middle = step_count / 2`, the point stays with `last` iff
/// `offset < middle` when `step_count - 1` is odd, and iff
/// `offset <= middle` otherwise. Continuous axes compare positions, ties go
/// to `next`.
pub fn choose_side(discrete: bool, last: &Endpoint, next: &Endpoint, index: usize, position: f64) -> Side {
    if discrete {
        assert!(
            next.index >= last.index + 2,
            "A discrete gap needs at least two steps between {} and {}",
            last.index,
            next.index
        );
        let step_count = next.index - last.index;
        let middle = step_count / 2;
        let offset = index - last.index;
        let odd = (step_count - 1) % 2 > 0;
        if (odd && offset < middle) || (!odd && offset <= middle) {
            Side::Last
        } else {
            Side::Next
        }
    } else if (position - last.position).abs() < (next.position - position).abs() {
        Side::Last
    } else {
        Side::Next
    }
}

#[derive(Clone, Debug)]
pub struct Cell {
    pub value: f64,
    /// First visible datum of the cell, lending its atoms to synthesized
    /// datums that belong to this side.
    pub source: Arc<Datum>,
}

#[derive(Clone, Debug)]
pub struct Category {
    pub atoms: Vec<Arc<Atom>>,
    pub position: f64,
}

/// Category × series view of an owner, built from source datums only.
#[derive(Debug)]
pub struct CategoryTable {
    discrete: bool,
    category_dims: Vec<usize>,
    value_dim: usize,
    categories: Vec<Category>,
    series_count: usize,
    cells: Vec<Vec<Option<Cell>>>,
}

fn level(names: &[String], order: AtomOrder) -> GroupingLevelSpec {
    GroupingLevelSpec {
        dimensions: names
            .iter()
            .map(|name| GroupingDimensionSpec {
                name: name.clone(),
                reverse: false,
            })
            .collect(),
        order: Some(order),
    }
}

impl CategoryTable {
    pub fn build(owner: &Data, roles: &InterpolationRoles) -> Result<Self> {
        let ct = owner.complex_type();
        ensure!(!roles.category.is_empty(), "Operators need a category role");
        let category_dims = roles
            .category
            .iter()
            .map(|n| ct.require_index(n))
            .collect::<Result<Vec<_>>>()?;
        let series_dims = roles
            .series
            .iter()
            .map(|n| ct.require_index(n))
            .collect::<Result<Vec<_>>>()?;
        let value_dim = ct.require_index(&roles.value)?;
        ensure!(
            !category_dims.contains(&value_dim) && !series_dims.contains(&value_dim),
            "The value dimension '{}' cannot also be a category or series dimension",
            roles.value
        );

        let discrete = roles
            .category_discrete
            .unwrap_or_else(|| category_dims.iter().all(|&i| ct.dimensions()[i].is_discrete()));
        let order = if discrete {
            AtomOrder::FirstSeen
        } else {
            AtomOrder::Natural
        };

        let by_category = GroupTree::build(
            owner,
            &GroupingSpec::new(vec![level(&roles.category, order)]),
            &GroupingOptions {
                filter: DatumFilter {
                    exclude_virtual: true,
                    ..Default::default()
                },
                keep_null_groups: false,
            },
        )?;

        let mut categories = Vec::new();
        let mut category_index = HashMap::new();
        for node in by_category.children(ROOT) {
            let position = if discrete {
                categories.len() as f64
            } else {
                match node.atoms()[0].value().and_then(|v| v.as_f64()) {
                    Some(p) => p,
                    None => continue,
                }
            };
            category_index.insert(node.key().to_string(), categories.len());
            categories.push(Category {
                atoms: node.atoms().to_vec(),
                position,
            });
        }

        let visible = GroupingOptions {
            filter: DatumFilter::visible_source(),
            keep_null_groups: true,
        };
        let series_nodes: Vec<Vec<Arc<Datum>>> = if roles.series.is_empty() {
            let all = owner.datums_where(&visible.filter);
            if all.is_empty() {
                vec![]
            } else {
                vec![all]
            }
        } else {
            let by_series = GroupTree::build(
                owner,
                &GroupingSpec::new(vec![level(&roles.series, AtomOrder::FirstSeen)]),
                &visible,
            )?;
            by_series.children(ROOT).map(|n| n.datums().to_vec()).collect()
        };

        let mut cells = Vec::with_capacity(series_nodes.len());
        for datums in &series_nodes {
            let mut row: Vec<Option<Cell>> = vec![None; categories.len()];
            for datum in datums {
                let key = join_keys(category_dims.iter().map(|&i| &datum.atoms()[i]));
                let Some(&c) = category_index.get(&key) else {
                    continue;
                };
                let Some(value) = datum.atoms()[value_dim].value().and_then(|v| v.as_f64()) else {
                    continue;
                };
                match &mut row[c] {
                    Some(cell) => cell.value += value,
                    slot => {
                        *slot = Some(Cell {
                            value,
                            source: datum.clone(),
                        })
                    }
                }
            }
            cells.push(row);
        }

        Ok(Self {
            discrete,
            category_dims,
            value_dim,
            categories,
            series_count: cells.len(),
            cells,
        })
    }

    pub fn is_discrete(&self) -> bool {
        self.discrete
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn series_count(&self) -> usize {
        self.series_count
    }

    pub fn cell(&self, series: usize, category: usize) -> Option<&Cell> {
        self.cells[series][category].as_ref()
    }

    pub fn category_dims(&self) -> &[usize] {
        &self.category_dims
    }

    pub fn value_dim(&self) -> usize {
        self.value_dim
    }

    fn endpoint(&self, series: usize, index: usize) -> Option<Endpoint> {
        self.cell(series, index).map(|cell| Endpoint {
            index,
            position: self.categories[index].position,
            value: cell.value,
        })
    }

    /// Atoms of a virtual datum placed at `category`: the source's atoms
    /// with the category atoms replaced.
    pub(crate) fn place(&self, source: &Datum, category: usize) -> Vec<Arc<Atom>> {
        let mut atoms = source.atoms().to_vec();
        for (&dim, atom) in self.category_dims.iter().zip(&self.categories[category].atoms) {
            atoms[dim] = atom.clone();
        }
        atoms
    }
}

/// A point to be turned into an interpolation datum.
#[derive(Clone, Debug)]
pub struct Synthesis {
    pub category: usize,
    pub series: usize,
    pub value: f64,
    pub source: Arc<Datum>,
}

/// Scans one series, filling each null run between known cells and, when
/// `stretch_ends` is set, the runs touching either end.
pub fn scan_series<I>(table: &CategoryTable, series: usize, interpolator: &I, stretch_ends: bool) -> Vec<Synthesis>
where
    I: Interpolator + ?Sized,
{
    let mut out = Vec::new();
    let mut last: Option<Endpoint> = None;
    // Outer None: not resolved yet for the current run
    let mut next: Option<Option<Endpoint>> = None;

    for index in 0..table.category_count() {
        if let Some(known) = table.endpoint(series, index) {
            last = Some(known);
            next = None;
            continue;
        }

        let resolved = *next.get_or_insert_with(|| {
            (index + 1..table.category_count()).find_map(|j| table.endpoint(series, j))
        });
        let position = table.categories[index].position;

        let (value, from) = match (last, resolved) {
            (Some(l), Some(n)) => {
                let side = choose_side(table.discrete, &l, &n, index, position);
                let value = interpolator.interpolate(&l, &n, position, side);
                let from = match side {
                    Side::Last => l.index,
                    Side::Next => n.index,
                };
                (value, from)
            }
            (Some(only), None) | (None, Some(only)) if stretch_ends => (only.value, only.index),
            _ => continue,
        };

        if let Some(cell) = table.cell(series, from) {
            out.push(Synthesis {
                category: index,
                series,
                value,
                source: cell.source.clone(),
            });
        }
    }
    out
}
