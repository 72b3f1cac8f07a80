use super::atom::Atom;
use super::value::Value;
use crate::complex_type::ComplexType;
use crate::interpolation::InterpolationMode;
use crate::trend::TrendKind;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Why a datum does not come from the source rows.
#[derive(Clone, Debug, PartialEq)]
pub enum VirtualKind {
    Interpolation {
        mode: InterpolationMode,
        dimension: Arc<str>,
    },
    Trend {
        kind: TrendKind,
        dimension: Arc<str>,
    },
}

/// One observation: a set of atoms, one per dimension of the complex type.
///
/// Selection and visibility are changed through the owner
/// ([`crate::data::Data::set_selected`]) so that the owner is notified.
pub struct Datum {
    complex_type: Arc<ComplexType>,
    atoms: Vec<Arc<Atom>>,
    key: String,
    is_null: bool,
    virtual_kind: Option<VirtualKind>,
    selected: AtomicBool,
    visible: AtomicBool,
}

impl Datum {
    pub(crate) fn new(
        complex_type: Arc<ComplexType>,
        atoms: Vec<Arc<Atom>>,
        is_null: bool,
        virtual_kind: Option<VirtualKind>,
    ) -> Self {
        debug_assert_eq!(atoms.len(), complex_type.len());
        let key = complex_type.key_of(&atoms);
        Self {
            complex_type,
            atoms,
            key,
            is_null,
            virtual_kind,
            selected: AtomicBool::new(false),
            visible: AtomicBool::new(true),
        }
    }

    pub fn complex_type(&self) -> &Arc<ComplexType> {
        &self.complex_type
    }

    /// Semantic key: the atom keys of the key dimensions.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Atoms in complex-type order.
    pub fn atoms(&self) -> &[Arc<Atom>] {
        &self.atoms
    }

    pub fn atom(&self, dimension: &str) -> Option<&Arc<Atom>> {
        self.complex_type
            .dimension_index(dimension)
            .map(|i| &self.atoms[i])
    }

    pub fn value(&self, dimension: &str) -> Option<&Value> {
        self.atom(dimension).and_then(|a| a.value())
    }

    pub fn is_null(&self) -> bool {
        self.is_null
    }

    pub fn is_virtual(&self) -> bool {
        self.virtual_kind.is_some()
    }

    pub fn virtual_kind(&self) -> Option<&VirtualKind> {
        self.virtual_kind.as_ref()
    }

    pub fn is_interpolated(&self) -> bool {
        matches!(self.virtual_kind, Some(VirtualKind::Interpolation { .. }))
    }

    pub fn is_trend(&self) -> bool {
        matches!(self.virtual_kind, Some(VirtualKind::Trend { .. }))
    }

    pub fn is_selected(&self) -> bool {
        self.selected.load(Ordering::Relaxed)
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Relaxed)
    }

    /// Returns whether the state changed. Null datums stay unselected.
    pub(crate) fn set_selected(&self, selected: bool) -> bool {
        if self.is_null {
            return false;
        }
        self.selected.swap(selected, Ordering::Relaxed) != selected
    }

    /// Returns whether the state changed. Null datums stay visible.
    pub(crate) fn set_visible(&self, visible: bool) -> bool {
        if self.is_null {
            return false;
        }
        self.visible.swap(visible, Ordering::Relaxed) != visible
    }
}

impl fmt::Debug for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datum")
            .field("key", &self.key)
            .field("is_null", &self.is_null)
            .field("virtual_kind", &self.virtual_kind)
            .field("selected", &self.is_selected())
            .field("visible", &self.is_visible())
            .finish()
    }
}

/// State-based datum filter used by grouping and the operators.
/// `None` fields do not filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DatumFilter {
    pub visible: Option<bool>,
    pub selected: Option<bool>,
    pub is_null: Option<bool>,
    pub exclude_virtual: bool,
}

impl DatumFilter {
    /// Visible, non-null source datums.
    pub fn visible_source() -> Self {
        Self {
            visible: Some(true),
            is_null: Some(false),
            exclude_virtual: true,
            ..Default::default()
        }
    }

    pub fn matches(&self, datum: &Datum) -> bool {
        self.visible.map_or(true, |v| datum.is_visible() == v)
            && self.selected.map_or(true, |s| datum.is_selected() == s)
            && self.is_null.map_or(true, |n| datum.is_null() == n)
            && !(self.exclude_virtual && datum.is_virtual())
    }
}
