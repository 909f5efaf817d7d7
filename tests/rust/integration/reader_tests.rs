use serde_json::{json, Value};
use std::sync::Arc;
use test_case::test_case;

use relgraph::{AccessContext, EntityReader, ErrorKind, Schema, SqliteExecutor, Variables};

use super::common::{reader, schema, CountingExecutor, DATASET};

#[test_case(
    "{ tt_content { uid header } }",
    json!({"tt_content": [
        {"uid": 512, "header": "Content 1"},
        {"uid": 513, "header": "Content 2"},
        {"uid": 514, "header": "Content 3"}
    ]})
    ; "content headers"
)]
#[test_case(
    "{ tx_persistence_entity { uid scalar_float, scalar_string } }",
    json!({"tx_persistence_entity": [
        {"uid": 1024, "scalar_float": 0.0, "scalar_string": "String"},
        {"uid": 1025, "scalar_float": 3.1415, "scalar_string": ""},
        {"uid": 1026, "scalar_float": 0.0, "scalar_string": ""},
        {"uid": 1027, "scalar_float": -3.1415, "scalar_string": "String"},
        {"uid": 1028, "scalar_float": 0.0, "scalar_string": ""}
    ]})
    ; "typed entity scalars"
)]
#[test_case(
    "{ pages { title layout } }",
    json!({"pages": [
        {"title": "Page 1", "layout": "default"},
        {"title": "Page 1.1", "layout": null},
        {"title": "Page 1.2", "layout": "wide"}
    ]})
    ; "null scalar"
)]
#[test_case(
    "{ categories: sys_category { id: uid } }",
    json!({"categories": [{"id": 32}, {"id": 33}, {"id": 34}]})
    ; "aliases"
)]
fn test_read_scalar_property(query: &str, expected: Value) {
    let reader = reader();
    let result = reader.execute(query).unwrap();
    assert_eq!(result, json!({ "data": expected }));
}

#[test]
fn test_several_root_blocks_keep_document_order() {
    let reader = reader();
    let result = reader
        .execute("{ sys_category { uid } pages(limit: 1) { __typename title } }")
        .unwrap();
    let keys: Vec<&String> = result["data"].as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["sys_category", "pages"]);
    assert_eq!(
        result["data"]["pages"],
        json!([{"__typename": "pages", "title": "Page 1"}])
    );
    assert_eq!(reader.executor().count(), 2);
}

#[test_case(AccessContext::default(), vec![1024, 1025, 1026, 1027, 1028] ; "live rows only")]
#[test_case(
    AccessContext { include_hidden: true, include_deleted: false },
    vec![1024, 1025, 1026, 1027, 1028, 1029]
    ; "with hidden rows"
)]
#[test_case(
    AccessContext { include_hidden: false, include_deleted: true },
    vec![1024, 1025, 1026, 1027, 1028, 1030]
    ; "with deleted rows"
)]
fn test_read_context_restricted(access: AccessContext, expected: Vec<i64>) {
    let reader = reader();
    let result = reader
        .execute_with("{ tx_persistence_entity { uid } }", &Variables::new(), &access)
        .unwrap();
    let uids: Vec<i64> = result["data"]["tx_persistence_entity"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["uid"].as_i64().unwrap())
        .collect();
    assert_eq!(uids, expected);
}

#[test]
fn test_hidden_relation_rows_follow_access_context() {
    let query = "{ tx_persistence_entity(filter: \"uid = 1025\") { relation_select_mn_mm_content { header } } }";
    let headers = |access: &AccessContext| -> Vec<String> {
        let result = reader()
            .execute_with(query, &Variables::new(), access)
            .unwrap();
        result["data"]["tx_persistence_entity"][0]["relation_select_mn_mm_content"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["header"].as_str().unwrap().to_string())
            .collect()
    };

    assert_eq!(
        headers(&AccessContext::default()),
        vec!["Content 1", "Content 2", "Content 3"]
    );
    let with_hidden = AccessContext {
        include_hidden: true,
        ..AccessContext::default()
    };
    assert_eq!(
        headers(&with_hidden),
        vec!["Content 1", "Content 2", "Content 3", "Content 4"]
    );
}

#[test]
fn test_variables_bind_arguments() {
    let reader = reader();
    let mut variables = Variables::new();
    variables.insert("filter".to_string(), json!("scalar_integer = 1"));
    variables.insert("limit".to_string(), json!(1));
    variables.insert("offset".to_string(), json!(1));

    let result = reader
        .execute_with(
            "query Entities { tx_persistence_entity(filter: $filter, limit: $limit, offset: $offset) { uid } }",
            &variables,
            &AccessContext::default(),
        )
        .unwrap();
    assert_eq!(
        result,
        json!({"data": {"tx_persistence_entity": [{"uid": 1027}]}})
    );
}

#[test_case(
    "{ tx_persistence_entity (order: \"unknown ascending\") { title } }",
    ErrorKind::Schema, 1560645175
    ; "unknown order field"
)]
#[test_case(
    "{ tx_persistence_entity (order: \"title on unknown ascending\") { title } }",
    ErrorKind::Schema, 1560598849
    ; "unknown qualifier"
)]
#[test_case(
    "{ tx_persistence_entity { title relation_select_mn_mm_content (order: \"title on tx_persistence_entity ascending\") { header } } }",
    ErrorKind::Schema, 1560655028
    ; "qualifier not applicable"
)]
#[test_case(
    "{ tx_persistence_entity(order: \"relation_select_mn_mm_content ascending\") { title relation_select_mn_mm_content { header } } }",
    ErrorKind::Unsupported, 1560598442
    ; "order by relation"
)]
#[test_case(
    "{ tx_persistence_entity(order: \"relation_select_mn_mm_content.header ascending\") { title relation_select_mn_mm_content { header } } }",
    ErrorKind::Unsupported, 1560598442
    ; "order by relation path"
)]
#[test_case(
    "{ tx_persistence_entity (order: \"title on String ascending\") { title } }",
    ErrorKind::Unsupported, 1560598849
    ; "scalar qualifier"
)]
#[test_case(
    "{ tx_persistence_entity (order: \"title on Entity ascending\") { title } }",
    ErrorKind::Unsupported, 1560648120
    ; "abstract qualifier"
)]
#[test_case(
    "{ tx_persistence_entity { relation_group_mn_csv_content_page (order: \"layout ascending\") { uid } } }",
    ErrorKind::Schema, 1560656034
    ; "ambiguous field"
)]
#[test_case(
    "{ tx_persistence_entity { relation_group_mn_csv_content_page (order: \"title ascending\") { uid } } }",
    ErrorKind::Unsupported, 1560663120
    ; "heterogeneous branches"
)]
#[test_case(
    "{ tx_persistence_entity(filter: \"relation_select_mn_mm_content = 1\") { uid } }",
    ErrorKind::Unsupported, 1560670301
    ; "filter on relation"
)]
#[test_case(
    "{ tx_persistence_entity { title }",
    ErrorKind::Syntax, 1560670101
    ; "unterminated document"
)]
#[test_case(
    "{ tx_persistence_entity(filter: \"title = \") { uid } }",
    ErrorKind::Syntax, 1560670103
    ; "incomplete filter"
)]
#[test_case(
    "{ tx_persistence_entity(order: $order) { uid } }",
    ErrorKind::Syntax, 1560670104
    ; "unbound variable"
)]
#[test_case(
    "{ be_users { uid } }",
    ErrorKind::Schema, 1560670201
    ; "unknown entity type"
)]
fn test_invalid_queries_fail_before_reading(query: &str, kind: ErrorKind, code: u32) {
    let reader = reader();
    let err = reader.execute(query).unwrap_err();
    assert_eq!((err.kind(), err.code()), (kind, code), "{}", err);
    assert_eq!(reader.executor().count(), 0);
}

#[test]
fn test_execution_failure_aborts_the_query() {
    let schema = Schema::from_yaml_str(
        r#"
types:
  - name: be_users
    properties:
      - { name: uid, type: int }
"#,
    )
    .unwrap();
    let reader = EntityReader::new(Arc::new(schema), CountingExecutor::seeded());
    let err = reader.execute("{ be_users { uid } }").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert_eq!(err.code(), 1560670401);
}

#[test]
fn test_fixture_schema_loads() {
    let schema = schema();
    let names: Vec<&str> = schema.entity_types().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["pages", "sys_category", "sys_file_reference", "tt_content", "tx_persistence_entity"]
    );
}

#[test]
fn test_read_from_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("entities.sqlite");
    SqliteExecutor::open(&path)
        .unwrap()
        .execute_batch(DATASET)
        .unwrap();

    let reader = EntityReader::new(schema(), SqliteExecutor::open(&path).unwrap());
    let result = reader
        .execute("{ tx_persistence_entity(filter: \"uid = 1025\") { title relation_select_mn_csv_category { title } } }")
        .unwrap();
    assert_eq!(
        result,
        json!({"data": {"tx_persistence_entity": [{
            "title": "Entity 2",
            "relation_select_mn_csv_category": [{"title": "Category 1.1"}, {"title": "Category 1.2"}]
        }]}})
    );
}
