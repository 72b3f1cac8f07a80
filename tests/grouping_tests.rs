use chart_data::grouping::ROOT;
use chart_data::{
    AtomOrder, ComplexType, Data, DatumFilter, DimensionType, FlatteningMode, GroupTree, GroupingLevelSpec,
    GroupingOptions, GroupingSpec, NodeId, Row, RowValue, ValueType,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

fn owner() -> Data {
    Data::new(
        ComplexType::with_extensions(
            vec![
                DimensionType::new("series", ValueType::String),
                DimensionType::new("category", ValueType::String),
                DimensionType::new("year", ValueType::Number),
                DimensionType::new("value", ValueType::Number).with_key(false),
                DimensionType::new("dataPart", ValueType::String),
            ],
            &["dataPart"],
        )
        .unwrap(),
    )
}

fn row(series: Option<&str>, category: &str, year: i64, value: f64) -> Row {
    Row::named([
        ("series", RowValue::from(series)),
        ("category", RowValue::from(category)),
        ("year", RowValue::from(year)),
        ("value", RowValue::from(value)),
    ])
}

fn child_keys(tree: &GroupTree, id: NodeId) -> Vec<String> {
    tree.children(id).map(|n| n.key().to_string()).collect()
}

fn loaded() -> Data {
    let mut data = owner();
    data.load(
        vec![
            row(Some("S2"), "b", 2021, 1.0),
            row(Some("S1"), "a", 2019, 2.0),
            row(Some("S2"), "a", 2020, 3.0),
            row(Some("S1"), "c", 2018, 4.0),
            row(None, "b", 2022, 5.0),
        ],
        None,
    )
    .unwrap();
    data
}

#[test]
fn test_discrete_levels_keep_first_seen_order() {
    let mut data = loaded();
    let tree = data
        .grouped(GroupingSpec::parse("series, category").unwrap(), GroupingOptions::default())
        .unwrap();
    // The null group sorts first
    assert_eq!(child_keys(tree, ROOT), ["", "S2", "S1"]);
    let s2 = tree.child(ROOT, "S2").unwrap();
    assert_eq!(child_keys(tree, s2.id()), ["b", "a"]);
    assert_eq!(s2.depth(), 1);
    assert_eq!(tree.node(s2.children()[0]).depth(), 2);
}

#[test]
fn test_continuous_levels_sort_by_value() {
    let mut data = loaded();
    let tree = data
        .grouped(GroupingSpec::parse("year").unwrap(), GroupingOptions::default())
        .unwrap();
    assert_eq!(child_keys(tree, ROOT), ["2018", "2019", "2020", "2021", "2022"]);

    let tree = data
        .grouped(GroupingSpec::parse("year desc").unwrap(), GroupingOptions::default())
        .unwrap();
    assert_eq!(child_keys(tree, ROOT), ["2022", "2021", "2020", "2019", "2018"]);
}

#[test]
fn test_explicit_level_order() {
    let mut data = loaded();
    let spec = GroupingSpec::new(vec![GroupingLevelSpec::new(&["category"]).with_order(AtomOrder::Natural)]);
    let tree = data.grouped(spec, GroupingOptions::default()).unwrap();
    assert_eq!(child_keys(tree, ROOT), ["a", "b", "c"]);
}

#[test]
fn test_null_groups_can_be_dropped() {
    let mut data = loaded();
    let options = GroupingOptions {
        keep_null_groups: false,
        ..Default::default()
    };
    let tree = data.grouped(GroupingSpec::parse("series").unwrap(), options).unwrap();
    assert_eq!(child_keys(tree, ROOT), ["S2", "S1"]);
    assert_eq!(tree.root().len(), 5);
}

#[test]
fn test_multi_dimension_level() {
    let mut data = loaded();
    let tree = data
        .grouped(GroupingSpec::parse("series|category").unwrap(), GroupingOptions::default())
        .unwrap();
    assert_eq!(tree.children(ROOT).count(), 5);
    let node = tree.child(ROOT, "S1,c").unwrap();
    assert_eq!(node.atoms().len(), 2);
    assert_eq!(node.label(), "S1 ~ c");
}

#[test]
fn test_single_level_flattening() {
    let mut data = loaded();
    let nested = data
        .grouped(GroupingSpec::parse("series, category").unwrap(), GroupingOptions::default())
        .unwrap();
    let nested_leaves: Vec<String> = nested
        .leaves(ROOT)
        .into_iter()
        .map(|id| {
            let node = nested.node(id);
            let parent = nested.parent(id).unwrap();
            format!("{},{}", parent.key(), node.key())
        })
        .collect();

    let flat = data
        .grouped(
            GroupingSpec::parse("series, category")
                .unwrap()
                .with_flattening(FlatteningMode::SingleLevel),
            GroupingOptions::default(),
        )
        .unwrap();
    assert_eq!(child_keys(flat, ROOT), nested_leaves);
    assert!(flat.children(ROOT).all(|n| n.is_leaf()));
}

#[test]
fn test_tree_flattening_orders() {
    let mut data = loaded();
    let spec = GroupingSpec::parse("series, category").unwrap();

    let pre = data
        .grouped(spec.clone().with_flattening(FlatteningMode::TreePre), GroupingOptions::default())
        .unwrap();
    assert_eq!(
        child_keys(pre, ROOT),
        ["", "~b", "S2", "S2~b", "S2~a", "S1", "S1~a", "S1~c"]
    );
    let s2a = pre.child(ROOT, "S2~a").unwrap();
    assert_eq!(s2a.atoms().len(), 2);
    assert_eq!(pre.atom(s2a.id(), "series").unwrap().key(), "S2");
    assert_eq!(pre.child(ROOT, "S2").unwrap().len(), 2);

    let post = data
        .grouped(spec.with_flattening(FlatteningMode::TreePost), GroupingOptions::default())
        .unwrap();
    assert_eq!(
        child_keys(post, ROOT),
        ["~b", "", "S2~b", "S2~a", "S2", "S1~a", "S1~c", "S1"]
    );
}

#[test]
fn test_atoms_are_inherited_and_extensions_are_null() {
    let mut data = loaded();
    let tree = data
        .grouped(GroupingSpec::parse("series, category").unwrap(), GroupingOptions::default())
        .unwrap();
    let s1 = tree.child(ROOT, "S1").unwrap();
    let leaf = tree.child(s1.id(), "c").unwrap();
    assert_eq!(tree.atom(leaf.id(), "series").unwrap().key(), "S1");
    assert_eq!(tree.atom(leaf.id(), "category").unwrap().key(), "c");
    assert!(tree.atom(leaf.id(), "dataPart").unwrap().is_null());
    assert!(tree.atom(leaf.id(), "value").is_none());
    assert!(tree.atom(leaf.id(), "missing").is_none());
}

#[test]
fn test_unknown_dimension_is_an_error() {
    let mut data = loaded();
    assert!(data
        .group_by(GroupingSpec::parse("colour").unwrap(), GroupingOptions::default())
        .is_err());
    assert!(data
        .group_by(
            GroupingSpec::parse("series").unwrap().with_extension_dimensions(&["colour"]),
            GroupingOptions::default()
        )
        .is_err());
}

#[test]
fn test_grouping_cache_reuses_ids() {
    let mut data = loaded();
    let spec = GroupingSpec::parse("series").unwrap();
    let a = data.group_by(spec.clone(), GroupingOptions::default()).unwrap();
    let b = data.group_by(spec.clone(), GroupingOptions::default()).unwrap();
    let c = data
        .group_by(
            spec,
            GroupingOptions {
                filter: DatumFilter::visible_source(),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_visible_count_follows_state_changes() {
    let mut data = loaded();
    let id = data
        .group_by(GroupingSpec::parse("series").unwrap(), GroupingOptions::default())
        .unwrap();
    let s1 = data.grouping(id).unwrap().child(ROOT, "S1").unwrap().id();
    assert_eq!(data.grouping(id).unwrap().visible_datum_count(s1), 2);

    let hidden = data.grouping(id).unwrap().node(s1).datums()[0].clone();
    data.set_visible(&hidden, false);
    data.set_selected(&hidden, true);
    let tree = data.grouping(id).unwrap();
    assert_eq!(tree.visible_datum_count(s1), 1);
    assert_eq!(tree.selected_datum_count(s1), 1);
    assert_eq!(tree.visible_datum_count(ROOT), 4);
    assert!(tree.is_any_visible(s1));

    let last = tree.node(s1).datums()[1].clone();
    data.set_visible(&last, false);
    let tree = data.grouping(id).unwrap();
    assert!(!tree.is_any_visible(s1));
    assert!(tree.is_any_visible(ROOT));
}

#[test]
fn test_reload_follows_the_new_row_order() {
    let mut data = owner();
    data.load(vec![row(Some("S"), "b", 2020, 1.0), row(Some("S"), "a", 2020, 2.0)], None)
        .unwrap();
    let id = data
        .group_by(GroupingSpec::parse("category").unwrap(), GroupingOptions::default())
        .unwrap();
    assert_eq!(child_keys(data.grouping(id).unwrap(), ROOT), ["b", "a"]);

    data.load(
        vec![
            row(Some("S"), "c", 2020, 3.0),
            row(Some("S"), "a", 2020, 2.0),
            row(Some("S"), "b", 2020, 1.0),
        ],
        None,
    )
    .unwrap();
    assert_eq!(child_keys(data.grouping(id).unwrap(), ROOT), ["c", "a", "b"]);
}

#[test]
fn test_random_partitions_cover_the_root() {
    let mut rng = StdRng::seed_from_u64(42);
    let series = ["S1", "S2", "S3"];
    let categories = ["a", "b", "c", "d", "e", "f"];

    for _ in 0..20 {
        let mut data = owner();
        let rows: Vec<Row> = (0..200)
            .map(|_| {
                let s = if rng.random_range(0..10) == 0 {
                    None
                } else {
                    Some(series[rng.random_range(0..series.len())])
                };
                let c = categories[rng.random_range(0..categories.len())];
                row(s, c, rng.random_range(2000..2010), rng.random_range(0.0..100.0))
            })
            .collect();
        data.load(rows, None).unwrap();

        for text in ["series", "series, category", "category, year", "series|category, year"] {
            for flattening in [FlatteningMode::None, FlatteningMode::SingleLevel] {
                let spec = GroupingSpec::parse(text).unwrap().with_flattening(flattening);
                let tree = data.grouped(spec, GroupingOptions::default()).unwrap();

                let mut seen = HashSet::new();
                let mut total = 0;
                for leaf in tree.leaves(ROOT) {
                    for datum in tree.node(leaf).datums() {
                        assert!(seen.insert(datum.key().to_string()), "duplicate datum {}", datum.key());
                        total += 1;
                    }
                }
                assert_eq!(total, tree.root().len());
                let root: HashSet<String> = tree.root().datums().iter().map(|d| d.key().to_string()).collect();
                assert_eq!(seen, root);

                for id in tree.descendants(ROOT, false) {
                    let parent = tree.parent(id).unwrap();
                    let parent_keys: HashSet<&str> = parent.datums().iter().map(|d| d.key()).collect();
                    assert!(tree.node(id).datums().iter().all(|d| parent_keys.contains(d.key())));
                }
            }
        }
    }
}
