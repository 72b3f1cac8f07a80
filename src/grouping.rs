//! Grouping of datums into trees of data nodes.
//!
//! A grouping tree is derived state: it is built from the owner's datums and
//! thrown away (and rebuilt) whenever the owner's datum set changes. Nodes live
//! in an arena and refer to each other by [`NodeId`].

use crate::complex_type::ComplexType;
use crate::data::Data;
use crate::data_types::{join_keys, Atom, Datum, DatumFilter, Value};
use crate::dimension::AtomOrder;
use eyre::{bail, ensure, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::debug;

/// Index of a node inside its [`GroupTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Handle of a cached grouping of an owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroupingId(pub usize);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupingDimensionSpec {
    pub name: String,
    #[serde(default)]
    pub reverse: bool,
}

/// One level of a grouping: one or more dimensions grouped together.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupingLevelSpec {
    pub dimensions: Vec<GroupingDimensionSpec>,
    /// Defaults to first-seen when every dimension is discrete, natural
    /// otherwise.
    #[serde(default)]
    pub order: Option<AtomOrder>,
}

impl GroupingLevelSpec {
    pub fn new(names: &[&str]) -> Self {
        Self {
            dimensions: names
                .iter()
                .map(|n| GroupingDimensionSpec {
                    name: n.to_string(),
                    reverse: false,
                })
                .collect(),
            order: None,
        }
    }

    pub fn with_order(mut self, order: AtomOrder) -> Self {
        self.order = Some(order);
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatteningMode {
    /// One tree level per grouping level.
    #[default]
    None,
    /// Leaf combinations of all levels become the root's children.
    SingleLevel,
    /// Every node becomes a root child, parents before children.
    TreePre,
    /// Every node becomes a root child, children before parents.
    TreePost,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupingSpec {
    pub levels: Vec<GroupingLevelSpec>,
    #[serde(default)]
    pub flattening: FlatteningMode,
    /// Dimensions outside the grouping path that nodes must still answer for.
    #[serde(default)]
    pub extension_dimensions: Vec<String>,
}

impl GroupingSpec {
    pub fn new(levels: Vec<GroupingLevelSpec>) -> Self {
        Self {
            levels,
            ..Default::default()
        }
    }

    pub fn by_levels(levels: &[&[&str]]) -> Self {
        Self::new(levels.iter().map(|l| GroupingLevelSpec::new(l)).collect())
    }

    /// Parses `"series, category|year desc"`: levels are separated by `,`,
    /// dimensions of a level by `|`, and a trailing `desc` reverses one.
    pub fn parse(text: &str) -> Result<Self> {
        let mut levels = Vec::new();
        for level_text in text.split(',') {
            let mut level = GroupingLevelSpec::default();
            for dim_text in level_text.split('|') {
                let mut parts = dim_text.split_whitespace();
                let Some(name) = parts.next() else {
                    bail!("Empty dimension in grouping '{}'", text);
                };
                let reverse = match parts.next() {
                    None | Some("asc") => false,
                    Some("desc") => true,
                    Some(other) => bail!("Unknown sort direction '{}' in grouping '{}'", other, text),
                };
                ensure!(parts.next().is_none(), "Malformed grouping '{}'", text);
                level.dimensions.push(GroupingDimensionSpec {
                    name: name.to_string(),
                    reverse,
                });
            }
            levels.push(level);
        }
        Ok(Self::new(levels))
    }

    pub fn with_flattening(mut self, flattening: FlatteningMode) -> Self {
        self.flattening = flattening;
        self
    }

    pub fn with_extension_dimensions(mut self, names: &[&str]) -> Self {
        self.extension_dimensions = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn dimension_names(&self) -> impl Iterator<Item = &str> {
        self.levels
            .iter()
            .flat_map(|l| l.dimensions.iter().map(|d| d.name.as_str()))
    }

    /// True when every grouping dimension is discrete.
    pub fn is_discrete(&self, complex_type: &ComplexType) -> Result<bool> {
        for name in self.dimension_names() {
            let index = complex_type.require_index(name)?;
            if !complex_type.dimensions()[index].is_discrete() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupingOptions {
    pub filter: DatumFilter,
    /// When false, groups whose atoms are all null are left out (together
    /// with their datums).
    pub keep_null_groups: bool,
}

impl Default for GroupingOptions {
    fn default() -> Self {
        Self {
            filter: DatumFilter::default(),
            keep_null_groups: true,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct ResolvedDim {
    index: usize,
    order: AtomOrder,
    reverse: bool,
}

#[derive(Clone, Debug)]
struct ResolvedLevel {
    dims: Vec<ResolvedDim>,
}

fn resolve_levels(complex_type: &ComplexType, spec: &GroupingSpec) -> Result<Vec<ResolvedLevel>> {
    spec.levels
        .iter()
        .map(|level| {
            ensure!(!level.dimensions.is_empty(), "Grouping levels cannot be empty");
            let dims = level
                .dimensions
                .iter()
                .map(|d| complex_type.require_index(&d.name).map(|i| (i, d.reverse)))
                .collect::<Result<Vec<_>>>()?;
            let order = level.order.unwrap_or_else(|| {
                if dims.iter().all(|(i, _)| complex_type.dimensions()[*i].is_discrete()) {
                    AtomOrder::FirstSeen
                } else {
                    AtomOrder::Natural
                }
            });
            Ok(ResolvedLevel {
                dims: dims
                    .into_iter()
                    .map(|(index, reverse)| ResolvedDim {
                        index,
                        order,
                        reverse,
                    })
                    .collect(),
            })
        })
        .collect()
}

struct Partition {
    key: String,
    atoms: Vec<Arc<Atom>>,
    datums: Vec<Arc<Datum>>,
}

fn partition(
    complex_type: &ComplexType,
    datums: &[Arc<Datum>],
    level: &ResolvedLevel,
    keep_null_groups: bool,
) -> Vec<Partition> {
    let mut groups: Vec<Partition> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for datum in datums {
        let atoms: Vec<Arc<Atom>> = level
            .dims
            .iter()
            .map(|d| datum.atoms()[d.index].clone())
            .collect();
        let key = join_keys(&atoms);
        match index.get(&key) {
            Some(&i) => groups[i].datums.push(datum.clone()),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(Partition {
                    key,
                    atoms,
                    datums: vec![datum.clone()],
                });
            }
        }
    }

    if !keep_null_groups {
        groups.retain(|g| !g.atoms.iter().all(|a| a.is_null()));
    }

    groups.sort_by(|a, b| compare_groups(complex_type, &level.dims, &a.atoms, &b.atoms));
    groups
}

fn compare_groups(
    complex_type: &ComplexType,
    dims: &[ResolvedDim],
    a: &[Arc<Atom>],
    b: &[Arc<Atom>],
) -> Ordering {
    for (i, d) in dims.iter().enumerate() {
        let ord = complex_type.dimensions()[d.index].compare_atoms(&a[i], &b[i], d.order, d.reverse);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[derive(Debug, Default, Clone, Copy)]
struct NodeStats {
    token: u64,
    visible: usize,
    selected: usize,
}

/// A node of a grouping tree.
#[derive(Debug)]
pub struct DataNode {
    id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    child_index: HashMap<String, NodeId>,
    key: String,
    depth: usize,
    dims: Vec<usize>,
    atoms: Vec<Arc<Atom>>,
    datums: Vec<Arc<Datum>>,
    stats: Mutex<Option<NodeStats>>,
}

impl DataNode {
    fn new(
        id: NodeId,
        parent: Option<NodeId>,
        depth: usize,
        key: String,
        dims: Vec<usize>,
        atoms: Vec<Arc<Atom>>,
        datums: Vec<Arc<Datum>>,
    ) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            child_index: HashMap::new(),
            key,
            depth,
            dims,
            atoms,
            datums,
            stats: Mutex::new(None),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Group atoms of this node's own level (empty for the root).
    pub fn atoms(&self) -> &[Arc<Atom>] {
        &self.atoms
    }

    pub fn datums(&self) -> &[Arc<Datum>] {
        &self.datums
    }

    pub fn len(&self) -> usize {
        self.datums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datums.is_empty()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_null_group(&self) -> bool {
        !self.atoms.is_empty() && self.atoms.iter().all(|a| a.is_null())
    }

    /// Value of a single-dimension group.
    pub fn value(&self) -> Option<&Value> {
        match self.atoms.as_slice() {
            [atom] => atom.value(),
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        self.atoms
            .iter()
            .map(|a| a.label())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ~ ")
    }
}

pub const ROOT: NodeId = NodeId(0);

/// Arena-backed grouping tree.
#[derive(Debug)]
pub struct GroupTree {
    complex_type: Arc<ComplexType>,
    nodes: Vec<DataNode>,
    extension_atoms: Vec<(usize, Arc<Atom>)>,
    state: Arc<AtomicU64>,
}

impl GroupTree {
    pub(crate) fn build(owner: &Data, spec: &GroupingSpec, options: &GroupingOptions) -> Result<Self> {
        let complex_type = owner.complex_type().clone();
        let levels = resolve_levels(&complex_type, spec)?;

        let mut extension_atoms = Vec::new();
        let requested = spec
            .extension_dimensions
            .iter()
            .map(|name| complex_type.require_index(name))
            .collect::<Result<Vec<_>>>()?;
        for index in complex_type.extension_indices().iter().copied().chain(requested) {
            if !extension_atoms.iter().any(|(i, _)| *i == index) {
                extension_atoms.push((index, owner.dimensions()[index].null_atom().clone()));
            }
        }

        let datums: Vec<Arc<Datum>> = owner
            .datums()
            .iter()
            .filter(|d| options.filter.matches(d))
            .cloned()
            .collect();

        let mut tree = Self {
            complex_type,
            nodes: vec![DataNode::new(ROOT, None, 0, String::new(), vec![], vec![], datums)],
            extension_atoms,
            state: owner.state_handle(),
        };

        match spec.flattening {
            FlatteningMode::None => tree.group_children(ROOT, &levels, options.keep_null_groups),
            FlatteningMode::SingleLevel => {
                if !levels.is_empty() {
                    let combined = ResolvedLevel {
                        dims: levels.iter().flat_map(|l| l.dims.iter().copied()).collect(),
                    };
                    tree.group_children(ROOT, &[combined], options.keep_null_groups);
                }
            }
            FlatteningMode::TreePre | FlatteningMode::TreePost => {
                let mut nested = Self {
                    complex_type: tree.complex_type.clone(),
                    nodes: vec![DataNode::new(
                        ROOT,
                        None,
                        0,
                        String::new(),
                        vec![],
                        vec![],
                        tree.nodes[0].datums.clone(),
                    )],
                    extension_atoms: vec![],
                    state: tree.state.clone(),
                };
                nested.group_children(ROOT, &levels, options.keep_null_groups);
                let post_order = spec.flattening == FlatteningMode::TreePost;
                for id in nested.descendants(ROOT, post_order) {
                    let (dims, atoms) = nested.path_atoms(id);
                    let key = nested.path_key(id);
                    let datums = nested.nodes[id.0].datums.clone();
                    tree.add_child(ROOT, key, dims, atoms, datums);
                }
            }
        }

        debug!(
            "Grouped {} datums into {} nodes ({:?})",
            tree.nodes[0].datums.len(),
            tree.nodes.len(),
            spec.flattening
        );
        Ok(tree)
    }

    fn group_children(&mut self, parent: NodeId, levels: &[ResolvedLevel], keep_null_groups: bool) {
        let Some((level, rest)) = levels.split_first() else {
            return;
        };
        let groups = partition(
            &self.complex_type,
            &self.nodes[parent.0].datums,
            level,
            keep_null_groups,
        );
        let dims: Vec<usize> = level.dims.iter().map(|d| d.index).collect();
        for group in groups {
            let child = self.add_child(parent, group.key, dims.clone(), group.atoms, group.datums);
            self.group_children(child, rest, keep_null_groups);
        }
    }

    fn add_child(
        &mut self,
        parent: NodeId,
        key: String,
        dims: Vec<usize>,
        atoms: Vec<Arc<Atom>>,
        datums: Vec<Arc<Datum>>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let depth = self.nodes[parent.0].depth + 1;
        let parent_node = &mut self.nodes[parent.0];
        parent_node.children.push(id);
        parent_node.child_index.insert(key.clone(), id);
        self.nodes
            .push(DataNode::new(id, Some(parent), depth, key, dims, atoms, datums));
        id
    }

    /// Dimensions and atoms accumulated from the root down to `id`.
    fn path_atoms(&self, id: NodeId) -> (Vec<usize>, Vec<Arc<Atom>>) {
        let mut chain = self.ancestors(id);
        chain.reverse();
        let mut dims = Vec::new();
        let mut atoms = Vec::new();
        for nid in chain {
            let node = &self.nodes[nid.0];
            dims.extend(node.dims.iter().copied());
            atoms.extend(node.atoms.iter().cloned());
        }
        (dims, atoms)
    }

    fn path_key(&self, id: NodeId) -> String {
        let mut chain = self.ancestors(id);
        chain.reverse();
        chain
            .iter()
            .filter(|nid| **nid != ROOT)
            .map(|nid| self.nodes[nid.0].key.as_str())
            .collect::<Vec<_>>()
            .join("~")
    }

    /// `id` and its ancestors, nearest first.
    fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = self.nodes[id.0].parent;
        while let Some(p) = current {
            chain.push(p);
            current = self.nodes[p.0].parent;
        }
        chain
    }

    /// All nodes below `id`, in pre-order or post-order.
    pub fn descendants(&self, id: NodeId, post_order: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants(id, post_order, &mut out);
        out
    }

    fn collect_descendants(&self, id: NodeId, post_order: bool, out: &mut Vec<NodeId>) {
        for &child in &self.nodes[id.0].children {
            if !post_order {
                out.push(child);
            }
            self.collect_descendants(child, post_order, out);
            if post_order {
                out.push(child);
            }
        }
    }

    pub fn complex_type(&self) -> &Arc<ComplexType> {
        &self.complex_type
    }

    pub fn root(&self) -> &DataNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> &DataNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &DataNode> {
        self.nodes[id.0].children.iter().map(|c| &self.nodes[c.0])
    }

    pub fn child(&self, id: NodeId, key: &str) -> Option<&DataNode> {
        self.nodes[id.0]
            .child_index
            .get(key)
            .map(|c| &self.nodes[c.0])
    }

    pub fn parent(&self, id: NodeId) -> Option<&DataNode> {
        self.nodes[id.0].parent.map(|p| &self.nodes[p.0])
    }

    /// Leaf nodes below `id` (or `id` itself when it is a leaf), in order.
    pub fn leaves(&self, id: NodeId) -> Vec<NodeId> {
        if self.nodes[id.0].is_leaf() {
            return vec![id];
        }
        self.descendants(id, false)
            .into_iter()
            .filter(|n| self.nodes[n.0].is_leaf())
            .collect()
    }

    /// Atom of `dimension` for a node: its own group atom, an ancestor's, or
    /// the null atom of an extension dimension.
    pub fn atom(&self, id: NodeId, dimension: &str) -> Option<&Arc<Atom>> {
        let index = self.complex_type.dimension_index(dimension)?;
        let mut current = Some(id);
        while let Some(nid) = current {
            let node = &self.nodes[nid.0];
            if let Some(pos) = node.dims.iter().position(|&d| d == index) {
                return Some(&node.atoms[pos]);
            }
            current = node.parent;
        }
        self.extension_atoms
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, atom)| atom)
    }

    pub fn datums_where(&self, id: NodeId, filter: &DatumFilter) -> Vec<Arc<Datum>> {
        self.nodes[id.0]
            .datums
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect()
    }

    fn stats(&self, id: NodeId) -> NodeStats {
        let token = self.state.load(AtomicOrdering::Acquire);
        let node = &self.nodes[id.0];
        let mut cache = node.stats.lock();
        match *cache {
            Some(stats) if stats.token == token => stats,
            _ => {
                let stats = NodeStats {
                    token,
                    visible: node.datums.iter().filter(|d| d.is_visible()).count(),
                    selected: node.datums.iter().filter(|d| d.is_selected()).count(),
                };
                *cache = Some(stats);
                stats
            }
        }
    }

    /// Cached until the owner's selection/visibility state changes.
    pub fn visible_datum_count(&self, id: NodeId) -> usize {
        self.stats(id).visible
    }

    pub fn selected_datum_count(&self, id: NodeId) -> usize {
        self.stats(id).selected
    }

    pub fn is_any_visible(&self, id: NodeId) -> bool {
        self.visible_datum_count(id) > 0
    }
}
