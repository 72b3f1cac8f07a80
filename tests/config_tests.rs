use chart_data::grouping::ROOT;
use chart_data::{ChartDataConfig, Row};
use serde_json::json;

const CONFIG: &str = r#"{
    "dimensions": [
        {"name": "series", "value_type": "string", "required": true},
        {"name": "day", "value_type": "date",
         "format": {"kind": "date", "pattern": "%b %d", "timezone": "Europe/Paris"}},
        {"name": "value", "value_type": "number", "is_key": false}
    ],
    "extension_dimensions": [{"name": "dataPart", "value_type": "string"}],
    "roles": {"category": ["day"], "series": ["series"], "value": "value"},
    "grouping": "series, day",
    "interpolation": {"mode": "zero", "stretch_ends": false},
    "trend": {"kind": {"type": "moving_average", "window": 2},
              "part": {"dimension": "dataPart", "value": "trend"}}
}"#;

#[test]
fn test_pipeline_from_config() {
    let config = ChartDataConfig::from_json_str(CONFIG).unwrap();
    let mut data = config.build_data().unwrap();

    let rows = [
        json!({"series": "A", "day": "2024-01-01", "value": 1.0}),
        json!({"series": "A", "day": "2024-01-02", "value": null}),
        json!({"series": "A", "day": "2024-01-03", "value": 3.0}),
        json!({"series": null, "day": "2024-01-03", "value": 3.0}),
        json!({"series": "A", "day": "2024-01-01", "value": 7.0}),
    ];
    let rows: Vec<Row> = rows
        .iter()
        .map(|r| Row::from_json_object(r.as_object().unwrap()))
        .collect();
    let report = data.load(rows, None).unwrap();
    assert_eq!(report.rejected, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(data.len(), 3);

    let operators = config.run_operators(&mut data).unwrap();
    let interpolation = operators.interpolation.unwrap();
    assert_eq!(interpolation.added, 1);
    let trend = operators.trend.unwrap();
    assert_eq!(trend.added, 3);

    let spec = config.grouping_spec().unwrap().unwrap();
    let tree = data.grouped(spec, Default::default()).unwrap();
    let series = tree.child(ROOT, "A").unwrap();
    assert_eq!(series.len(), 7);
    let days: Vec<String> = tree.children(series.id()).map(|n| n.label()).collect();
    assert_eq!(days, ["Jan 01", "Jan 02", "Jan 03"]);
    assert!(tree.atom(series.id(), "dataPart").unwrap().is_null());
}
