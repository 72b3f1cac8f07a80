use chart_data::{
    ComplexType, Data, DimensionType, GroupingOptions, GroupingSpec, InterpolationMode, InterpolationRoles, Row,
    RowValue, ValueType,
};
use std::time::Instant;

fn rows(series: usize, categories: usize, reload_offset: usize) -> Vec<Row> {
    let mut rows = Vec::with_capacity(series * categories);
    for s in 0..series {
        for c in 0..categories {
            // Every seventh cell is a gap
            let value = if (s + c) % 7 == 0 {
                None
            } else {
                Some(((c + reload_offset) as f64 * 0.01).sin() * 100.0)
            };
            rows.push(Row::named([
                ("series", RowValue::from(format!("S{}", s))),
                ("category", RowValue::from(format!("C{}", c + reload_offset))),
                ("value", RowValue::from(value)),
            ]));
        }
    }
    rows
}

fn owner() -> Data {
    Data::new(
        ComplexType::new(vec![
            DimensionType::new("series", ValueType::String),
            DimensionType::new("category", ValueType::String),
            DimensionType::new("value", ValueType::Number).with_key(false),
        ])
        .unwrap(),
    )
}

#[test]
fn test_load_group_interpolate_performance() {
    let (series, categories) = (20, 5_000);
    let mut data = owner();

    let start_load = Instant::now();
    let report = data.load(rows(series, categories, 0), None).unwrap();
    println!("Load of {} rows: {:?}", report.rows_read, start_load.elapsed());
    assert_eq!(report.datum_count(), series * categories);

    let start_group = Instant::now();
    let id = data
        .group_by(GroupingSpec::parse("series, category").unwrap(), GroupingOptions::default())
        .unwrap();
    println!("Grouping: {:?}", start_group.elapsed());
    assert_eq!(data.grouping(id).unwrap().root().children().len(), series);

    let roles = InterpolationRoles::new(&["category"], &["series"], "value");
    let start_interp = Instant::now();
    let interp = data.interpolate(&roles, InterpolationMode::Linear, true).unwrap();
    println!(
        "Linear interpolation ({} synthesized): {:?}",
        interp.synthesized,
        start_interp.elapsed()
    );
    assert!(interp.added > 0);

    // Half of the categories survive a shifted reload
    let start_reload = Instant::now();
    let report = data.load(rows(series, categories, categories / 2), None).unwrap();
    println!(
        "Reload ({} kept, {} atoms collected): {:?}",
        report.datums_kept,
        report.atoms_collected,
        start_reload.elapsed()
    );
    assert_eq!(report.datums_kept, series * categories / 2);
    assert_eq!(data.dimension("category").unwrap().len(), categories);
}
