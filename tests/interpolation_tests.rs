use chart_data::grouping::ROOT;
use chart_data::{
    ComplexType, Data, DimensionType, GroupingOptions, GroupingSpec, InterpolationMode, InterpolationRoles, Row,
    RowValue, ValueType, VirtualKind,
};

fn owner(category_type: ValueType) -> Data {
    Data::new(
        ComplexType::new(vec![
            DimensionType::new("series", ValueType::String),
            DimensionType::new("category", category_type),
            DimensionType::new("value", ValueType::Number).with_key(false),
        ])
        .unwrap(),
    )
}

fn load_series(data: &mut Data, series: &str, categories: &[RowValue], values: &[Option<f64>]) {
    let rows: Vec<Row> = categories
        .iter()
        .zip(values)
        .map(|(c, v)| {
            Row::named([
                ("series", RowValue::from(series)),
                ("category", c.clone()),
                ("value", RowValue::from(*v)),
            ])
        })
        .collect();
    data.load(rows, None).unwrap();
}

fn letters(n: usize) -> Vec<RowValue> {
    ["A", "B", "C", "D", "E"][..n].iter().map(|&c| RowValue::from(c)).collect()
}

/// (series, category label, value) of every interpolated datum.
fn synthesized(data: &Data) -> Vec<(String, String, f64)> {
    let mut out: Vec<_> = data
        .datums()
        .iter()
        .filter(|d| d.is_interpolated())
        .map(|d| {
            (
                d.atom("series").unwrap().key().to_string(),
                d.atom("category").unwrap().label().to_string(),
                d.value("value").unwrap().as_f64().unwrap(),
            )
        })
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    out
}

fn roles() -> InterpolationRoles {
    InterpolationRoles::new(&["category"], &["series"], "value")
}

fn gap_series() -> Data {
    let mut data = owner(ValueType::String);
    load_series(&mut data, "S", &letters(5), &[Some(10.0), None, None, None, Some(30.0)]);
    data
}

#[test]
fn test_linear_fills_a_discrete_gap() {
    let mut data = gap_series();
    let report = data.interpolate(&roles(), InterpolationMode::Linear, false).unwrap();
    assert_eq!(report.categories, 5);
    assert_eq!(report.series, 1);
    assert_eq!(report.added, 3);
    assert_eq!(
        synthesized(&data),
        [
            ("S".to_string(), "B".to_string(), 15.0),
            ("S".to_string(), "C".to_string(), 20.0),
            ("S".to_string(), "D".to_string(), 25.0)
        ]
    );

    let datum = data.datums().iter().find(|d| d.is_interpolated()).unwrap();
    assert!(datum.is_virtual());
    assert_eq!(
        datum.virtual_kind(),
        Some(&VirtualKind::Interpolation {
            mode: InterpolationMode::Linear,
            dimension: "value".into()
        })
    );
}

#[test]
fn test_zero_is_a_step() {
    let mut data = gap_series();
    data.interpolate(&roles(), InterpolationMode::Zero, false).unwrap();
    let values: Vec<f64> = synthesized(&data).into_iter().map(|s| s.2).collect();
    // Four steps: the midpoint C belongs to the next side
    assert_eq!(values, [10.0, 30.0, 30.0]);
}

#[test]
fn test_stretch_ends() {
    let values = [None, None, Some(5.0), None, None];

    let mut data = owner(ValueType::String);
    load_series(&mut data, "S", &letters(5), &values);
    let report = data.interpolate(&roles(), InterpolationMode::Linear, true).unwrap();
    assert_eq!(report.added, 4);
    let filled: Vec<(String, f64)> = synthesized(&data).into_iter().map(|s| (s.1, s.2)).collect();
    assert_eq!(
        filled,
        [
            ("A".to_string(), 5.0),
            ("B".to_string(), 5.0),
            ("D".to_string(), 5.0),
            ("E".to_string(), 5.0)
        ]
    );

    let mut data = owner(ValueType::String);
    load_series(&mut data, "S", &letters(5), &values);
    let report = data.interpolate(&roles(), InterpolationMode::Linear, false).unwrap();
    assert_eq!(report.synthesized, 0);
    assert!(synthesized(&data).is_empty());
}

#[test]
fn test_second_pass_is_idempotent() {
    let mut data = gap_series();
    data.interpolate(&roles(), InterpolationMode::Linear, false).unwrap();
    let first = synthesized(&data);
    let count = data.len();

    let report = data.interpolate(&roles(), InterpolationMode::Linear, false).unwrap();
    assert_eq!(report.synthesized, 3);
    assert_eq!(report.added, 0);
    assert_eq!(data.len(), count);
    assert_eq!(synthesized(&data), first);
}

#[test]
fn test_none_mode_does_nothing() {
    let mut data = gap_series();
    let report = data.interpolate(&roles(), InterpolationMode::None, true).unwrap();
    assert_eq!(report.added, 0);
    assert!(synthesized(&data).is_empty());
}

#[test]
fn test_hidden_datums_are_not_endpoints() {
    let mut data = gap_series();
    let first = data.datum("S,A").unwrap().clone();
    data.set_visible(&first, false);
    let report = data.interpolate(&roles(), InterpolationMode::Linear, false).unwrap();
    assert_eq!(report.added, 0);
}

#[test]
fn test_series_are_scanned_independently() {
    let mut data = owner(ValueType::String);
    let rows = vec![
        ("S1", "A", Some(1.0)),
        ("S2", "A", None),
        ("S1", "B", None),
        ("S2", "B", Some(4.0)),
        ("S1", "C", Some(3.0)),
        ("S2", "C", None),
    ]
    .into_iter()
    .map(|(s, c, v)| {
        Row::named([
            ("series", RowValue::from(s)),
            ("category", RowValue::from(c)),
            ("value", RowValue::from(v)),
        ])
    })
    .collect::<Vec<_>>();
    data.load(rows, None).unwrap();

    let report = data.interpolate(&roles(), InterpolationMode::Linear, false).unwrap();
    assert_eq!(report.series, 2);
    assert_eq!(synthesized(&data), [("S1".to_string(), "B".to_string(), 2.0)]);

    data.interpolate(&roles(), InterpolationMode::Zero, true).unwrap();
    let zero = data
        .datums()
        .iter()
        .filter(|d| matches!(d.virtual_kind(), Some(VirtualKind::Interpolation { mode: InterpolationMode::Zero, .. })))
        .count();
    assert_eq!(zero, 3);
}

#[test]
fn test_continuous_category_axis() {
    let mut data = owner(ValueType::Number);
    let xs: Vec<RowValue> = [0.0, 1.0, 4.0, 6.0, 10.0].iter().map(|&x| RowValue::from(x)).collect();
    load_series(&mut data, "S", &xs, &[Some(0.0), None, None, None, Some(10.0)]);

    data.interpolate(&roles(), InterpolationMode::Linear, false).unwrap();
    let linear: Vec<(String, f64)> = synthesized(&data).into_iter().map(|s| (s.1, s.2)).collect();
    assert_eq!(
        linear,
        [("1".to_string(), 1.0), ("4".to_string(), 4.0), ("6".to_string(), 6.0)]
    );

    let mut data = owner(ValueType::Number);
    load_series(&mut data, "S", &xs, &[Some(0.0), None, None, None, Some(10.0)]);
    data.interpolate(&roles(), InterpolationMode::Zero, false).unwrap();
    let zero: Vec<f64> = synthesized(&data).into_iter().map(|s| s.2).collect();
    assert_eq!(zero, [0.0, 0.0, 10.0]);
}

#[test]
fn test_interpolated_datums_join_groupings() {
    let mut data = gap_series();
    let id = data
        .group_by(GroupingSpec::parse("series, category").unwrap(), GroupingOptions::default())
        .unwrap();
    data.interpolate(&roles(), InterpolationMode::Linear, false).unwrap();

    let tree = data.grouping(id).unwrap();
    let series = tree.child(ROOT, "S").unwrap();
    let c = tree.child(series.id(), "C").unwrap();
    assert_eq!(c.len(), 2);
    assert_eq!(c.datums().iter().filter(|d| d.is_interpolated()).count(), 1);
    assert_eq!(tree.child(series.id(), "A").unwrap().len(), 1);
}

#[test]
fn test_roles_on_unknown_dimensions_fail() {
    let mut data = gap_series();
    let bad = InterpolationRoles::new(&["nope"], &["series"], "value");
    assert!(data.interpolate(&bad, InterpolationMode::Linear, false).is_err());
    let same = InterpolationRoles::new(&["category"], &["series"], "category");
    assert!(data.interpolate(&same, InterpolationMode::Linear, false).is_err());
}
