use auctionscout_lib::aggregate::{summarize, TransactionRecord};
use auctionscout_lib::{Db, ValidatedItem, ValidatedRecord};
use chrono::NaiveDate;
use serde_json::Value;
use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("CLI crate should be inside workspace")
        .to_path_buf()
}

fn load_schema(name: &str) -> Value {
    let path = workspace_root().join("schema").join(name);
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("read schema {}: {}", path.display(), e));
    serde_json::from_str(&text).expect("schema is valid JSON")
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Records as `list --output json` reads them: one plain, one enriched.
fn stored_records() -> Vec<ValidatedRecord> {
    let db = Db::open_in_memory().unwrap();
    db.init().unwrap();
    db.insert_validated_item(&ValidatedItem {
        tid: 1,
        case_number: Some("2024-16379(2)".to_string()),
        address: "경기도 성남시 분당구 정자동 10 201동 804호".to_string(),
        building_area: Some("84.97㎡".to_string()),
        building_area_pyung: Some(25.7),
        floor_count: Some(20),
        yearly_transaction_count: 3,
        bdsplanet_link: Some("https://www.bdsplanet.com/map/realprice_map/RZ1".to_string()),
        ..ValidatedItem::default()
    })
    .unwrap();
    db.insert_validated_item(&ValidatedItem {
        tid: 2,
        address: "대구 수성구 범어동".to_string(),
        yearly_transaction_count: 1,
        ..ValidatedItem::default()
    })
    .unwrap();

    let records = vec![
        TransactionRecord { price: 52000, floor: "12층".to_string(), date: day(2025, 8, 29) },
        TransactionRecord { price: 48000, floor: "3층".to_string(), date: day(2025, 3, 2) },
    ];
    let summary = summarize(&records, day(2025, 9, 1)).unwrap();
    db.update_transaction_summary(1, &summary, Some(25.7)).unwrap();
    db.update_unit_prices(1, Some(61000), Some(41000)).unwrap();

    db.validated_items(None).unwrap()
}

#[test]
fn test_validated_items_conform_to_schema() {
    let schema = load_schema("validated_item.schema.json");
    let data = serde_json::to_value(stored_records()).unwrap();

    let validator = jsonschema::draft202012::new(&schema).expect("validated item schema compiles");
    let result = validator.validate(&data);
    if let Err(e) = &result {
        panic!("validated items failed validation: {e}");
    }
}

#[test]
fn test_empty_list_conforms_to_schema() {
    let schema = load_schema("validated_item.schema.json");
    let validator = jsonschema::draft202012::new(&schema).expect("validated item schema compiles");
    assert!(validator.is_valid(&serde_json::json!([])));
}

#[test]
fn test_schema_rejects_missing_tid() {
    let schema = load_schema("validated_item.schema.json");
    let mut data = serde_json::to_value(stored_records()).unwrap();
    data[0].as_object_mut().unwrap().remove("tid");

    let validator = jsonschema::draft202012::new(&schema).expect("validated item schema compiles");
    assert!(!validator.is_valid(&data));
}

#[test]
fn test_schema_rejects_malformed_case_number() {
    let schema = load_schema("validated_item.schema.json");
    let mut data = serde_json::to_value(stored_records()).unwrap();
    data[0]["case_number"] = Value::String("2024타경16379".to_string());

    let validator = jsonschema::draft202012::new(&schema).expect("validated item schema compiles");
    assert!(!validator.is_valid(&data));
}

#[test]
fn test_schema_rejects_unknown_fields() {
    let schema = load_schema("validated_item.schema.json");
    let mut data = serde_json::to_value(stored_records()).unwrap();
    data[1]["raw_price"] = Value::String("1억".to_string());

    let validator = jsonschema::draft202012::new(&schema).expect("validated item schema compiles");
    assert!(!validator.is_valid(&data));
}
