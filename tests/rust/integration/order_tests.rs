use test_case::test_case;

use super::common::reader;

#[test_case("title descending", vec!["Entity 5", "Entity 4", "Entity 3", "Entity 2", "Entity 1"] ; "descending")]
#[test_case(
    "scalar_string ascending, title ascending",
    vec!["Entity 2", "Entity 3", "Entity 5", "Entity 1", "Entity 4"]
    ; "two terms"
)]
#[test_case(
    "scalar_string on tx_persistence_entity descending, title ascending",
    vec!["Entity 1", "Entity 4", "Entity 2", "Entity 3", "Entity 5"]
    ; "qualified term"
)]
#[test_case(
    "scalar_float ascending",
    vec!["Entity 4", "Entity 1", "Entity 3", "Entity 5", "Entity 2"]
    ; "ties fall back to key"
)]
fn test_read_ordered(order: &str, expected: Vec<&str>) {
    let reader = reader();
    let query = format!(
        "{{ tx_persistence_entity(order: \"{}\") {{ title }} }}",
        order
    );
    let result = reader.execute(&query).unwrap();
    let titles: Vec<&str> = result["data"]["tx_persistence_entity"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, expected);
}

#[test]
fn test_order_applies_before_window() {
    let reader = reader();
    let result = reader
        .execute("{ tx_persistence_entity(order: \"title descending\", limit: 2, offset: 1) { uid } }")
        .unwrap();
    assert_eq!(
        result["data"]["tx_persistence_entity"],
        serde_json::json!([{"uid": 1027}, {"uid": 1026}])
    );
}
