//! Integration tests for the SQLite store against an in-memory database.

use std::collections::BTreeMap;

use serde_json::{Value, json};
use tessel_core::{
  column::{ColumnProperty, ColumnRecord, FieldType},
  recompute::RecomputeEngine,
  record::SqlValue,
  row::Row,
  script::{
    Command, EnvMap, EnvSlot, ScriptKind, ScriptRecord, ScriptStatus, TableBinding,
  },
  signal::SignalKind,
};
use tessel_signal::Subscription;

use crate::{DataSpace, Filter, MetaTable, ScriptTable, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn scripts() -> ScriptTable {
  ScriptTable::open(store().await).await.expect("script table")
}

fn row(value: Value) -> Row { value.as_object().cloned().unwrap() }

fn drain(sub: &mut Subscription) -> Vec<tessel_core::signal::ChangeSignal> {
  std::iter::from_fn(|| sub.try_recv()).collect()
}

fn script(id: &str, kind: ScriptKind) -> ScriptRecord {
  let mut script = ScriptRecord::new(id, format!("{id} script"), kind);
  script.version = "1.0.0".into();
  script.code = "export default () => 1".into();
  script
}

// ─── MetaTable ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn ensure_schema_is_idempotent() {
  let s = store().await;
  let table = MetaTable::<ScriptRecord>::open(s.clone()).await.unwrap();
  table.ensure_schema().await.unwrap();
  MetaTable::<ScriptRecord>::open(s).await.unwrap();
}

#[tokio::test]
async fn open_on_closed_store_is_schema_error() {
  let s = store().await;
  s.clone().close().await.unwrap();

  let err = MetaTable::<ScriptRecord>::open(s).await.unwrap_err();
  assert!(matches!(err, crate::Error::Core(tessel_core::Error::Schema(_))));
}

#[tokio::test]
async fn insert_and_get_roundtrips_structured_fields() {
  let t = scripts().await;

  let mut original = script("s1", ScriptKind::Script);
  original.commands.push(Command {
    name:               "sync".into(),
    description:        "Sync rows".into(),
    input_json_schema:  Some(json!({ "type": "object", "properties": { "n": { "type": "number" } } })),
    output_json_schema: None,
    as_table_action:    Some(false),
  });
  original.envs = Some(vec![EnvSlot {
    name:     "API_KEY".into(),
    env_type: "string".into(),
    readonly: None,
  }]);
  original.fields_map.insert("todos".into(), TableBinding {
    id:         "t1".into(),
    name:       "todos".into(),
    fields_map: BTreeMap::from([("title".to_owned(), "cl_title".to_owned())]),
  });

  t.add(original.clone()).await.unwrap();
  let fetched = t.get("s1").await.unwrap();
  assert_eq!(fetched, original);
}

#[tokio::test]
async fn duplicate_primary_key_is_constraint_error() {
  let t = scripts().await;
  t.add(script("s1", ScriptKind::Script)).await.unwrap();

  let err = t.add(script("s1", ScriptKind::Udf)).await.unwrap_err();
  assert!(err.is_constraint(), "unexpected error: {err}");
}

#[tokio::test]
async fn get_missing_is_not_found() {
  let t = scripts().await;
  let err = t.get("nope").await.unwrap_err();
  assert!(err.is_not_found());
  assert!(t.meta().find("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn update_field_serializes_structured_values() {
  let t = scripts().await;
  t.add(script("s1", ScriptKind::Script)).await.unwrap();

  let updated = t
    .meta()
    .update_field("s1", "commands", json!([{ "name": "go", "description": "Go" }]))
    .await
    .unwrap();
  assert_eq!(updated.commands.len(), 1);
  assert_eq!(updated.commands[0].name, "go");

  let raw = t
    .meta()
    .store()
    .query("SELECT commands FROM scripts WHERE id = ?1", vec![SqlValue::from("s1")])
    .await
    .unwrap();
  let SqlValue::Text(text) = &raw.values[0][0] else {
    panic!("commands not stored as text: {:?}", raw.values[0][0]);
  };
  let stored: Value = serde_json::from_str(text).unwrap();
  assert_eq!(stored, json!([{ "name": "go", "description": "Go" }]));
}

#[tokio::test]
async fn update_field_rejects_unknown_field_and_missing_id() {
  let t = scripts().await;
  t.add(script("s1", ScriptKind::Script)).await.unwrap();

  let err = t.meta().update_field("s1", "colour", json!("red")).await.unwrap_err();
  assert!(err.is_constraint());

  let err = t.meta().update_field("s1", "id", json!("s2")).await.unwrap_err();
  assert!(err.is_constraint());

  let err = t.meta().update_field("ghost", "name", json!("x")).await.unwrap_err();
  assert!(err.is_not_found());
}

#[tokio::test]
async fn delete_is_idempotent() {
  let t = scripts().await;
  t.add(script("s1", ScriptKind::Script)).await.unwrap();

  assert!(t.delete("s1").await.unwrap());
  assert!(!t.delete("s1").await.unwrap());
  assert!(t.get("s1").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn list_reports_corrupt_records_without_aborting() {
  let t = scripts().await;
  t.add(script("good-1", ScriptKind::Script)).await.unwrap();
  t.add(script("bad", ScriptKind::Script)).await.unwrap();
  t.add(script("good-2", ScriptKind::Prompt)).await.unwrap();

  t.meta()
    .store()
    .execute(
      "UPDATE scripts SET env_map = ?1 WHERE id = ?2",
      vec![SqlValue::from("{not json"), SqlValue::from("bad")],
    )
    .await
    .unwrap();

  let listing = t.meta().list(&Filter::new()).await.unwrap();
  let ids: Vec<_> = listing.records.iter().map(|r| r.id.as_str()).collect();
  assert_eq!(ids, ["good-1", "good-2"]);
  assert_eq!(listing.failures.len(), 1);
  assert_eq!(listing.failures[0].id, "bad");
  assert!(matches!(
    listing.failures[0].error,
    tessel_core::Error::Serialization { ref field, .. } if field == "env_map"
  ));
}

#[tokio::test]
async fn list_rejects_filters_on_structured_fields() {
  let t = scripts().await;
  let err = t
    .meta()
    .list(&Filter::new().eq("env_map", json!({})))
    .await
    .unwrap_err();
  assert!(err.is_constraint());
}

#[tokio::test]
async fn mutations_publish_signals() {
  let t = scripts().await;
  let mut sub = t.meta().store().bus().subscribe();

  t.add(script("s1", ScriptKind::Script)).await.unwrap();
  t.meta().update_field("s1", "name", json!("Renamed")).await.unwrap();
  t.delete("s1").await.unwrap();
  t.delete("s1").await.unwrap();

  let signals = drain(&mut sub);
  let kinds: Vec<_> = signals.iter().map(|s| s.kind.clone()).collect();
  assert_eq!(kinds, [SignalKind::Insert, SignalKind::Update, SignalKind::Delete]);
  assert!(signals.iter().all(|s| s.table() == "scripts"));

  assert_eq!(signals[1].new_row_id(), Some("s1"));
  assert_eq!(signals[1].payload.new.as_ref().unwrap()["name"], "Renamed");
  assert_eq!(signals[1].payload.old.as_ref().unwrap()["name"], "s1 script");
  assert_eq!(signals[2].old_row_id(), Some("s1"));
}

// ─── ScriptTable ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn new_scripts_start_disabled() {
  let t = scripts().await;
  let mut s = script("s1", ScriptKind::Script);
  s.enabled = true;

  let stored = t.add(s).await.unwrap();
  assert!(!stored.enabled);
  assert!(!t.get("s1").await.unwrap().enabled);
}

#[tokio::test]
async fn enable_twice_stays_enabled() {
  let t = scripts().await;
  t.add(script("s1", ScriptKind::Script)).await.unwrap();
  let mut sub = t.meta().store().bus().subscribe();

  t.enable("s1").await.unwrap();
  assert!(t.get("s1").await.unwrap().enabled);
  t.enable("s1").await.unwrap();
  assert!(t.get("s1").await.unwrap().enabled);

  // The second call is a no-op: one Update only.
  assert_eq!(drain(&mut sub).len(), 1);

  t.disable("s1").await.unwrap();
  t.disable("s1").await.unwrap();
  assert!(!t.get("s1").await.unwrap().enabled);
}

#[tokio::test]
async fn enable_missing_is_not_found() {
  let t = scripts().await;
  assert!(t.enable("ghost").await.unwrap_err().is_not_found());
  assert!(t.disable("ghost").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn update_env_map_replaces_whole_map() {
  let t = scripts().await;
  t.add(script("s1", ScriptKind::Script)).await.unwrap();

  let first: EnvMap = BTreeMap::from([
    ("A".to_owned(), "1".to_owned()),
    ("B".to_owned(), "2".to_owned()),
  ]);
  t.update_env_map("s1", &first).await.unwrap();

  let second: EnvMap = BTreeMap::from([("C".to_owned(), "3".to_owned())]);
  let updated = t.update_env_map("s1", &second).await.unwrap();
  assert_eq!(updated.env_map, second);
  assert_eq!(t.get("s1").await.unwrap().env_map, second);
}

#[tokio::test]
async fn list_scripts_filters_by_status_across_kinds() {
  let t = scripts().await;
  t.add(script("script", ScriptKind::Script)).await.unwrap();
  t.add(script("udf", ScriptKind::Udf)).await.unwrap();
  t.add(script("prompt", ScriptKind::Prompt)).await.unwrap();
  t.add(script("block", ScriptKind::Block)).await.unwrap();
  t.enable("udf").await.unwrap();
  t.enable("block").await.unwrap();

  let all = t.list_scripts(ScriptStatus::All).await.unwrap().into_records();
  assert_eq!(all.len(), 4);

  let enabled = t.list_scripts(ScriptStatus::Enabled).await.unwrap().into_records();
  let ids: Vec<_> = enabled.iter().map(|s| s.id.as_str()).collect();
  assert_eq!(ids, ["udf", "block"]);

  let disabled = t.list_scripts(ScriptStatus::Disabled).await.unwrap().into_records();
  assert_eq!(disabled.len(), 2);
  assert!(disabled.iter().all(|s| !s.enabled));
}

// ─── DataSpace ───────────────────────────────────────────────────────────────

async fn space_with_doubles() -> DataSpace {
  let space = DataSpace::open(store().await).await.unwrap();
  space.create_table_with_id("t").await.unwrap();
  space
    .add_column(ColumnRecord::new("tb_t", "val", "Value", FieldType::Number))
    .await
    .unwrap();
  space
    .add_column(ColumnRecord::formula("tb_t", "doubled", "val*2", "val * 2"))
    .await
    .unwrap();
  space
}

#[tokio::test]
async fn recompute_evaluates_formulas() {
  let space = space_with_doubles().await;
  space.insert_row("t", row(json!({ "_id": "r1", "val": 5 }))).await.unwrap();

  let rows = space.recompute("t", &["r1".to_owned()]).await.unwrap();
  assert_eq!(rows, [row(json!({ "_id": "r1", "val": 5, "doubled": 10 }))]);
}

#[tokio::test]
async fn recompute_spans_more_ids_than_one_statement_binds() {
  let space = space_with_doubles().await;
  space
    .store()
    .execute_batch(
      "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 40000) \
       INSERT INTO tb_t (_id, val) SELECT 'r' || i, i FROM n",
    )
    .await
    .unwrap();

  let mut ids: Vec<String> = (1..=40_000).map(|i| format!("r{i}")).collect();
  ids.push("gone".to_owned());
  let rows = space.recompute("t", &ids).await.unwrap();

  assert_eq!(rows.len(), 40_000);
  let last = rows.iter().find(|r| r["_id"] == "r40000").unwrap();
  assert_eq!(last["doubled"], json!(80000));
}

#[tokio::test]
async fn recompute_omits_missing_rows() {
  let space = space_with_doubles().await;
  space.insert_row("t", row(json!({ "_id": "r1", "val": 1 }))).await.unwrap();

  let rows = space
    .recompute("t", &["r1".to_owned(), "gone".to_owned()])
    .await
    .unwrap();
  assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn recompute_with_no_ids_touches_nothing() {
  let space = space_with_doubles().await;
  space.store().clone().close().await.unwrap();

  assert!(space.recompute("t", &[]).await.unwrap().is_empty());
  assert!(space.recompute("t", &["r1".to_owned()]).await.is_err());
}

#[tokio::test]
async fn row_mutations_publish_signals() {
  let space = space_with_doubles().await;
  let mut sub = space.store().bus().subscribe();

  let id = space.insert_row("t", row(json!({ "val": 2 }))).await.unwrap();
  space.update_row("t", &id, row(json!({ "val": 3 }))).await.unwrap();
  assert!(space.delete_row("t", &id).await.unwrap());
  assert!(!space.delete_row("t", &id).await.unwrap());

  let signals = drain(&mut sub);
  let kinds: Vec<_> = signals.iter().map(|s| s.kind.clone()).collect();
  assert_eq!(kinds, [SignalKind::Insert, SignalKind::Update, SignalKind::Delete]);
  assert!(signals.iter().all(|s| s.table() == "tb_t"));
  assert_eq!(signals[0].new_row_id(), Some(id.as_str()));
  assert_eq!(signals[1].payload.new.as_ref().unwrap()["val"].as_f64(), Some(3.0));
  assert_eq!(signals[1].payload.old.as_ref().unwrap()["val"].as_f64(), Some(2.0));
  assert_eq!(signals[2].old_row_id(), Some(id.as_str()));
}

#[tokio::test]
async fn rows_reject_computed_and_unknown_columns() {
  let space = space_with_doubles().await;

  let err = space
    .insert_row("t", row(json!({ "_id": "r1", "doubled": 4 })))
    .await
    .unwrap_err();
  assert!(err.is_constraint());

  let err = space
    .insert_row("t", row(json!({ "_id": "r1", "nope": 4 })))
    .await
    .unwrap_err();
  assert!(err.is_constraint());
}

#[tokio::test]
async fn update_missing_row_is_not_found() {
  let space = space_with_doubles().await;
  let err = space
    .update_row("t", "ghost", row(json!({ "val": 1 })))
    .await
    .unwrap_err();
  assert!(err.is_not_found());
}

#[tokio::test]
async fn unknown_table_is_not_found() {
  let space = DataSpace::open(store().await).await.unwrap();
  let err = space
    .insert_row("missing", row(json!({ "_id": "r1" })))
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::TableNotFound(ref t) if t == "tb_missing"));
}

#[tokio::test]
async fn column_changes_publish_column_signals() {
  let space = DataSpace::open(store().await).await.unwrap();
  space.create_table_with_id("t").await.unwrap();
  let mut sub = space.store().bus().subscribe();

  space
    .add_column(ColumnRecord::new("tb_t", "val", "Value", FieldType::Number))
    .await
    .unwrap();
  space
    .update_column("t", "val", FieldType::Text, ColumnProperty::default())
    .await
    .unwrap();

  let column_signals: Vec<_> = drain(&mut sub)
    .into_iter()
    .filter(|s| s.table() == "tb_t")
    .collect();
  assert_eq!(column_signals.len(), 2);
  assert_eq!(column_signals[0].kind, SignalKind::AddColumn);
  assert_eq!(column_signals[1].kind, SignalKind::UpdateColumn);
  let new = column_signals[1].payload.new.as_ref().unwrap();
  let old = column_signals[1].payload.old.as_ref().unwrap();
  assert_eq!(new["type"], "text");
  assert_eq!(old["type"], "number");
}

#[tokio::test]
async fn column_becoming_formula_drops_physical_column() {
  let space = space_with_doubles().await;
  space
    .add_column(ColumnRecord::new("tb_t", "note", "Note", FieldType::Text))
    .await
    .unwrap();
  space.insert_row("t", row(json!({ "_id": "r1", "val": 4, "note": "x" }))).await.unwrap();

  space
    .update_column("t", "note", FieldType::Formula, ColumnProperty {
      formula: Some("val + 1".into()),
      ..Default::default()
    })
    .await
    .unwrap();

  let rows = space.rows("t").await.unwrap();
  assert_eq!(rows[0]["note"], json!(5));
  assert_eq!(rows[0]["doubled"], json!(8));

  let err = space
    .update_column("t", "val", FieldType::Formula, ColumnProperty::default())
    .await
    .unwrap_err();
  assert!(err.is_constraint());
}
