use serde_json::{json, Value};
use test_case::test_case;

use relgraph::{AccessContext, Variables};

use super::common::reader;

/// `label` of every related row, one list per root row
fn labels(result: &Value, relation: &str, label: &str) -> Value {
    Value::Array(
        result["data"]["tx_persistence_entity"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| {
                Value::Array(
                    row[relation]
                        .as_array()
                        .unwrap()
                        .iter()
                        .map(|child| child[label].clone())
                        .collect(),
                )
            })
            .collect(),
    )
}

#[test_case(
    "relation_select_mn_mm_content", "", "header",
    json!([[], ["Content 1", "Content 2", "Content 3"], [], [], []])
    ; "many to many select"
)]
#[test_case(
    "relation_inline_mn_mm_content", "", "header",
    json!([[], [], ["Content 3", "Content 1"], [], []])
    ; "many to many inline"
)]
#[test_case(
    "relation_inline_1n_file_reference", "", "title",
    json!([[null], [], ["File 2", "File 1"], [], []])
    ; "one to many inline with match fields"
)]
#[test_case(
    "relation_select_1n_page", "", "title",
    json!([[], ["Page 1.1"], [], [], []])
    ; "single key list"
)]
#[test_case(
    "relation_select_mn_csv_category", "", "title",
    json!([[], ["Category 1.1", "Category 1.2"], [], [], []])
    ; "key list"
)]
#[test_case(
    "relation_inline_mn_symmetric_entity", "", "title",
    json!([["Entity 2", "Entity 3"], ["Entity 4", "Entity 1"], ["Entity 1"], ["Entity 2"], []])
    ; "symmetric"
)]
#[test_case(
    "relation_select_mn_mm_content", "(order: \"bodytext ascending, header descending\")", "header",
    json!([[], ["Content 2", "Content 3", "Content 1"], [], [], []])
    ; "ordered many to many"
)]
#[test_case(
    "relation_select_mn_mm_content", "(limit: 1, offset: 1)", "header",
    json!([[], ["Content 2"], [], [], []])
    ; "windowed many to many"
)]
#[test_case(
    "relation_select_mn_mm_content", "(filter: \"header != `Content 2`\")", "header",
    json!([[], ["Content 1", "Content 3"], [], [], []])
    ; "filtered many to many"
)]
#[test_case(
    "relation_inline_1n_file_reference", "(order: \"title descending\")", "title",
    json!([[null], [], ["File 2", "File 1"], [], []])
    ; "ordered one to many inline"
)]
fn test_read_relation(relation: &str, arguments: &str, label: &str, expected: Value) {
    let reader = reader();
    let query = format!(
        "{{ tx_persistence_entity {{ uid {}{} {{ {} }} }} }}",
        relation, arguments, label
    );
    let result = reader.execute(&query).unwrap();
    assert_eq!(labels(&result, relation, label), expected);
    // one root query plus one query for the whole batch
    assert_eq!(reader.executor().count(), 2, "{:?}", reader.executor().tables());
}

const GROUP_SELECTION: &str =
    "{ __typename ... on pages { label: title } ... on tt_content { label: header } }";

#[test_case(
    "relation_group_mn_csv_content_page", "",
    json!(["Content 2", "Page 1.1", "Content 3", "Page 1.2", "Content 1", "Page 1"])
    ; "key list keeps list order"
)]
#[test_case(
    "relation_group_mn_csv_content_page",
    "(order: \"pid ascending, title on pages ascending, header on tt_content descending\")",
    json!(["Page 1", "Content 3", "Content 2", "Content 1", "Page 1.1", "Page 1.2"])
    ; "ordered key list"
)]
#[test_case(
    "relation_group_mn_mm_content_page", "",
    json!(["Page 1.2", "Page 1", "Content 3", "Content 1", "Page 1.1"])
    ; "association keeps sorting"
)]
#[test_case(
    "relation_group_mn_mm_content_page",
    "(order: \"pid ascending, title on pages ascending, header on tt_content descending\")",
    json!(["Page 1", "Content 3", "Content 1", "Page 1.1", "Page 1.2"])
    ; "ordered association"
)]
fn test_read_group_relation(relation: &str, arguments: &str, expected: Value) {
    let reader = reader();
    let query = format!(
        "{{ tx_persistence_entity(filter: \"uid = 1026\") {{ {}{} {} }} }}",
        relation, arguments, GROUP_SELECTION
    );
    let result = reader.execute(&query).unwrap();
    let children = &result["data"]["tx_persistence_entity"][0][relation];
    let labels: Vec<Value> = children
        .as_array()
        .unwrap()
        .iter()
        .map(|child| child["label"].clone())
        .collect();
    assert_eq!(Value::Array(labels), expected);

    for child in children.as_array().unwrap() {
        let type_name = child["__typename"].as_str().unwrap();
        let expected_prefix = if type_name == "pages" { "Page" } else { "Content" };
        assert!(child["label"].as_str().unwrap().starts_with(expected_prefix));
    }
    // one query per target table
    assert_eq!(reader.executor().count(), 3, "{:?}", reader.executor().tables());
}

const BRANCH_FILTER: &str = "title on pages = `Page 1` or header on tt_content = `Content 3`";

#[test_case("relation_group_mn_csv_content_page", BRANCH_FILTER, vec![514, 128] ; "key list with qualified filter")]
#[test_case("relation_group_mn_mm_content_page", BRANCH_FILTER, vec![128, 514] ; "association with qualified filter")]
#[test_case(
    "relation_group_mn_csv_content_page", "pid = 128",
    vec![513, 129, 514, 130, 512]
    ; "key list with shared field filter"
)]
#[test_case(
    "relation_group_mn_mm_content_page", "pid = 128",
    vec![130, 514, 512, 129]
    ; "association with shared field filter"
)]
fn test_read_filtered_group_relation(relation: &str, filter: &str, expected: Vec<i64>) {
    let reader = reader();
    let query = format!(
        "{{ tx_persistence_entity(filter: \"uid = 1026\") {{ {}(filter: \"{}\") {{ uid }} }} }}",
        relation, filter
    );
    let result = reader.execute(&query).unwrap();
    let uids: Vec<i64> = result["data"]["tx_persistence_entity"][0][relation]
        .as_array()
        .unwrap()
        .iter()
        .map(|child| child["uid"].as_i64().unwrap())
        .collect();
    assert_eq!(uids, expected);
    // still one query per target table
    assert_eq!(reader.executor().count(), 3, "{:?}", reader.executor().tables());
}

#[test]
fn test_group_fragments_select_per_type() {
    let reader = reader();
    let result = reader
        .execute(
            "{ tx_persistence_entity(filter: \"uid = 1026\") {
                relation_group_mn_mm_content_page(limit: 3) {
                    uid
                    ... on pages { title }
                    ... on tt_content { header layout }
                }
            } }",
        )
        .unwrap();
    assert_eq!(
        result["data"]["tx_persistence_entity"][0]["relation_group_mn_mm_content_page"],
        json!([
            {"uid": 130, "title": "Page 1.2"},
            {"uid": 128, "title": "Page 1"},
            {"uid": 514, "header": "Content 3", "layout": 0}
        ])
    );
}

#[test]
fn test_relation_batches_are_shared_between_blocks() {
    let reader = reader();
    let result = reader
        .execute(
            "{
                first: tx_persistence_entity { relation_select_mn_mm_content { uid } }
                second: tx_persistence_entity(limit: 2) { relation_select_mn_mm_content(limit: 1) { uid } }
            }",
        )
        .unwrap();
    assert_eq!(
        result["data"]["second"],
        json!([
            {"relation_select_mn_mm_content": []},
            {"relation_select_mn_mm_content": [{"uid": 512}]}
        ])
    );
    assert_eq!(
        reader.executor().tables(),
        vec!["tx_persistence_entity", "tt_content", "tx_persistence_entity"]
    );
}

#[test]
fn test_different_arguments_fetch_again() {
    let reader = reader();
    reader
        .execute(
            "{
                first: tx_persistence_entity { relation_select_mn_mm_content { uid } }
                second: tx_persistence_entity { relation_select_mn_mm_content(order: \"header descending\") { uid } }
            }",
        )
        .unwrap();
    assert_eq!(reader.executor().count(), 4);
}

#[test]
fn test_nested_relations_resolve_level_by_level() {
    let reader = reader();
    let result = reader
        .execute(
            "{ tx_persistence_entity(filter: \"uid = 1024\") {
                title
                relation_inline_mn_symmetric_entity {
                    title
                    relation_select_mn_mm_content(limit: 2) { header }
                }
            } }",
        )
        .unwrap();
    assert_eq!(
        result,
        json!({"data": {"tx_persistence_entity": [{
            "title": "Entity 1",
            "relation_inline_mn_symmetric_entity": [
                {
                    "title": "Entity 2",
                    "relation_select_mn_mm_content": [{"header": "Content 1"}, {"header": "Content 2"}]
                },
                {"title": "Entity 3", "relation_select_mn_mm_content": []}
            ]
        }]}})
    );
    assert_eq!(reader.executor().count(), 3);
}

#[test]
fn test_hidden_parents_resolve_their_relations() {
    let reader = reader();
    let query =
        "{ tx_persistence_entity(filter: \"uid = 1029\") { title relation_select_mn_csv_category { title } } }";
    let hidden = reader.execute(query).unwrap();
    assert_eq!(hidden, json!({"data": {"tx_persistence_entity": []}}));

    let access = AccessContext {
        include_hidden: true,
        ..AccessContext::default()
    };
    let result = reader
        .execute_with(query, &Variables::new(), &access)
        .unwrap();
    assert_eq!(
        result["data"]["tx_persistence_entity"],
        json!([{"title": "Entity 6", "relation_select_mn_csv_category": [{"title": "Category 1"}]}])
    );
}

#[test]
fn test_repeated_relation_fields_share_one_result() {
    let reader = reader();
    let result = reader
        .execute(
            "{ tx_persistence_entity(filter: \"uid = 1025\") {
                relation_select_mn_mm_content(limit: 2) { uid }
                ... on Entity { relation_select_mn_mm_content(limit: 2) { header } }
            } }",
        )
        .unwrap();
    assert_eq!(
        result["data"]["tx_persistence_entity"],
        json!([{"relation_select_mn_mm_content": [
            {"uid": 512, "header": "Content 1"},
            {"uid": 513, "header": "Content 2"}
        ]}])
    );
    assert_eq!(reader.executor().count(), 2);
}
