use test_case::test_case;

use super::common::reader;

fn filtered_uids(filter: &str) -> Vec<i64> {
    let reader = reader();
    let query = format!(
        "{{ tx_persistence_entity(filter: \"{}\") {{ uid }} }}",
        filter
    );
    let result = reader.execute(&query).unwrap();
    result["data"]["tx_persistence_entity"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["uid"].as_i64().unwrap())
        .collect()
}

#[test_case("scalar_string = `String`", vec![1024, 1027] ; "string equality")]
#[test_case("not uid = 1026", vec![1024, 1025, 1027, 1028] ; "negation")]
#[test_case("uid >= 1027", vec![1027, 1028] ; "comparison")]
#[test_case("scalar_float = 3.1415 or scalar_integer = 1", vec![1025, 1026, 1027] ; "disjunction")]
#[test_case(
    "scalar_float = -3.1415 or scalar_float = 3.1415 and l10n_state = null",
    vec![1025, 1027]
    ; "conjunction binds tighter"
)]
#[test_case(
    "scalar_text = `` and not (scalar_float = -3.1415 or scalar_integer = null)",
    vec![1024, 1025, 1026]
    ; "negated group"
)]
#[test_case("not (scalar_float = 0 or scalar_integer = 1)", vec![1025] ; "negated disjunction")]
#[test_case("l10n_state != null", vec![] ; "not null")]
#[test_case("title on tx_persistence_entity = `Entity 5`", vec![1028] ; "qualified field")]
fn test_read_filtered(filter: &str, expected: Vec<i64>) {
    assert_eq!(filtered_uids(filter), expected);
}

#[test]
fn test_filter_combines_with_window() {
    let reader = reader();
    let result = reader
        .execute(
            "{ tx_persistence_entity(filter: \"scalar_integer = 0\", order: \"title descending\", limit: 2) { title } }",
        )
        .unwrap();
    assert_eq!(
        result["data"]["tx_persistence_entity"],
        serde_json::json!([{"title": "Entity 5"}, {"title": "Entity 2"}])
    );
}
