//! Integration tests for reading an attribution panel from CSV.

use approx::assert_relative_eq;
use chrono::NaiveDate;
use hobart_data::{AttributionPanel, DataError};
use std::io::Write;

const PANEL: &str = "\
calcDate,applyDate,code,nextReturn1day,todayHolding,evolvedBMWeight,evolvedPreHolding,value,momentum
2024-01-02,2024-01-03,1,0.02,0.5,0.4,0.45,1.0,0.1
2024-01-02,2024-01-03,2,-0.01,0.3,0.4,0.35,-1.0,0.2
2024-01-03,2024-01-04,1,0.01,0.505,0.404,,1.1,0.1
2024-01-03,2024-01-04,2,0.01,0.297,0.396,,-0.9,0.3
";

fn write_panel(name: &str, contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn test_read_csv_panel() {
    let path = write_panel("hobart_panel_test.csv", PANEL);
    let panel = AttributionPanel::read_csv(&path, &["value", "momentum"]).unwrap();

    assert_eq!(panel.len(), 2);
    assert_eq!(panel.factor_names(), &["value".to_string(), "momentum".to_string()]);

    let first = &panel.periods()[0];
    assert_eq!(
        first.period().apply_date,
        NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
    );
    assert_eq!(first.codes(), &[1, 2]);
    let pre = first.evolved_pre_holding().unwrap();
    assert_relative_eq!(pre[0], 0.45);
    assert_relative_eq!(pre[1], 0.35);

    let second = &panel.periods()[1];
    assert!(second.evolved_pre_holding().is_none());
    assert_relative_eq!(second.exposure("value").unwrap()[1], -0.9);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_read_csv_missing_factor() {
    let path = write_panel("hobart_panel_missing_factor.csv", PANEL);
    let err = AttributionPanel::read_csv(&path, &["value", "quality"]).unwrap_err();
    assert!(matches!(err, DataError::Schema { ref column, .. } if column == "quality"));
    std::fs::remove_file(path).ok();
}
