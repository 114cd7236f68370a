//! `tessel table watch`: an interactive session over one table's reconciled
//! cache.
//!
//! Each stdin line is a mutation, applied through the same data space the
//! reconciler listens to:
//!
//! ```text
//! insert {"val": 5}
//! update <row id> {"val": 7}
//! delete <row id>
//! column <column> <type> [formula]
//! ```
//!
//! After every line the cache changes it caused are printed.

use std::sync::Arc;

use anyhow::{Context as _, bail};
use serde_json::Value;
use tessel_core::{
  column::{ColumnProperty, FieldType},
  row::{Row, raw_table_name},
};
use tessel_signal::Subscription;
use tessel_store_sqlite::DataSpace;
use tessel_sync::{CacheEvent, PresentationContext, RowCache};
use tokio::{
  io::{AsyncBufReadExt, BufReader},
  sync::broadcast::{self, error::TryRecvError},
};

use crate::commands::{parse_field_type, parse_row};

#[derive(Debug, Clone, PartialEq)]
pub enum WatchInput {
  Insert(Row),
  Update(String, Row),
  Delete(String),
  SetColumn { column: String, field_type: FieldType, formula: Option<String> },
}

const USAGE: &str =
  "expected insert JSON, update ROW JSON, delete ROW or column NAME TYPE [FORMULA]";

/// Parse one input line; blank lines yield `None`.
pub fn parse_line(line: &str) -> anyhow::Result<Option<WatchInput>> {
  let line = line.trim();
  if line.is_empty() {
    return Ok(None);
  }
  let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
  let rest = rest.trim();

  let input = match verb {
    "insert" => WatchInput::Insert(parse_row(rest)?),
    "update" => {
      let (id, changes) = rest.split_once(char::is_whitespace).context(USAGE)?;
      WatchInput::Update(id.to_owned(), parse_row(changes)?)
    }
    "delete" if !rest.is_empty() && !rest.contains(char::is_whitespace) => {
      WatchInput::Delete(rest.to_owned())
    }
    "column" => {
      let mut parts = rest.splitn(3, char::is_whitespace);
      let column = parts.next().filter(|c| !c.is_empty()).context(USAGE)?;
      let field_type =
        parse_field_type(parts.next().context(USAGE)?).map_err(anyhow::Error::msg)?;
      let formula = parts.next().map(str::trim).filter(|f| !f.is_empty()).map(str::to_owned);
      WatchInput::SetColumn { column: column.to_owned(), field_type, formula }
    }
    _ => bail!("unknown command {verb:?}; {USAGE}"),
  };
  Ok(Some(input))
}

// ─── Session ─────────────────────────────────────────────────────────────────

pub struct WatchSession {
  table_id:  String,
  raw_table: String,
  space:     Arc<DataSpace>,
  context:   PresentationContext<DataSpace>,
  /// Counts every signal on the bus, so the session knows how far the
  /// reconciler has to get before the cache reflects a mutation.
  tap:       Subscription,
  published: u64,
  events:    broadcast::Receiver<CacheEvent>,
}

impl WatchSession {
  /// Watch `table_id` and seed the cache with its current rows.
  pub async fn start(space: DataSpace, table_id: &str) -> anyhow::Result<Self> {
    let raw_table = raw_table_name(table_id);
    let space = Arc::new(space);
    let bus = space.store().bus().clone();
    let context = PresentationContext::new(bus.clone(), space.clone());
    let events = context.cache().subscribe();
    let tap = bus.subscribe();

    context.watch(&raw_table);
    let rows = space
      .rows(table_id)
      .await
      .with_context(|| format!("loading {raw_table}"))?;
    context.seed(&raw_table, rows);

    Ok(Self {
      table_id: table_id.to_owned(),
      raw_table,
      space,
      context,
      tap,
      published: 0,
      events,
    })
  }

  pub fn cache(&self) -> &RowCache { self.context.cache() }

  /// Apply `input` and wait until the reconciler has caught up with it.
  pub async fn apply(&mut self, input: WatchInput) -> anyhow::Result<()> {
    let result = self.mutate(input).await;
    self.settle().await;
    result
  }

  async fn mutate(&self, input: WatchInput) -> anyhow::Result<()> {
    let space = &self.space;
    let table = self.table_id.as_str();
    match input {
      WatchInput::Insert(row) => {
        space.insert_row(table, row).await?;
      }
      WatchInput::Update(id, changes) => space.update_row(table, &id, changes).await?,
      WatchInput::Delete(id) => {
        if !space.delete_row(table, &id).await? {
          bail!("no row {id:?} in {table}");
        }
      }
      WatchInput::SetColumn { column, field_type, formula } => {
        let property = ColumnProperty { formula, ..Default::default() };
        space.update_column(table, &column, field_type, property).await?;
      }
    }
    Ok(())
  }

  async fn settle(&mut self) {
    while self.tap.try_recv().is_some() {
      self.published += 1;
    }
    self.context.wait_processed(&self.raw_table, self.published).await;
  }

  /// Cache events since the last call.
  pub fn drain_events(&mut self) -> Vec<CacheEvent> {
    let mut drained = Vec::new();
    loop {
      match self.events.try_recv() {
        Ok(event) => drained.push(event),
        Err(TryRecvError::Lagged(skipped)) => {
          tracing::warn!(skipped, "cache events dropped");
        }
        Err(TryRecvError::Empty | TryRecvError::Closed) => return drained,
      }
    }
  }

  pub async fn finish(self) { self.context.shutdown().await }
}

fn print_event(cache: &RowCache, event: &CacheEvent) {
  match event {
    CacheEvent::Upserted { table, row_ids } => {
      for id in row_ids {
        if let Some(row) = cache.get(table, id) {
          println!("= {}", Value::Object(row));
        }
      }
    }
    CacheEvent::Removed { row_ids, .. } => {
      for id in row_ids {
        println!("- {id}");
      }
    }
    CacheEvent::Cleared { table } => println!("- every row of {table}"),
  }
}

/// Run a session on stdin until EOF or Ctrl-C.
pub async fn run(space: DataSpace, table_id: &str) -> anyhow::Result<()> {
  let mut session = WatchSession::start(space, table_id).await?;
  let mut lines = BufReader::new(tokio::io::stdin()).lines();

  loop {
    for event in session.drain_events() {
      print_event(session.cache(), &event);
    }
    tokio::select! {
      line = lines.next_line() => {
        let Some(line) = line.context("reading stdin")? else {
          break;
        };
        let applied = match parse_line(&line) {
          Ok(Some(input)) => session.apply(input).await,
          Ok(None) => Ok(()),
          Err(e) => Err(e),
        };
        if let Err(e) = applied {
          eprintln!("error: {e:#}");
        }
      }
      _ = tokio::signal::ctrl_c() => break,
    }
  }

  session.finish().await;
  Ok(())
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use tessel_core::column::ColumnRecord;
  use tessel_store_sqlite::SqliteStore;

  use super::*;

  fn row(value: Value) -> Row { value.as_object().cloned().unwrap() }

  #[test]
  fn parses_each_command() {
    assert_eq!(parse_line("  ").unwrap(), None);
    assert_eq!(
      parse_line(r#"insert {"val": 5}"#).unwrap(),
      Some(WatchInput::Insert(row(json!({ "val": 5 }))))
    );
    assert_eq!(
      parse_line(r#"update r1 {"val": 7}"#).unwrap(),
      Some(WatchInput::Update("r1".into(), row(json!({ "val": 7 }))))
    );
    assert_eq!(parse_line("delete r1").unwrap(), Some(WatchInput::Delete("r1".into())));
    assert_eq!(
      parse_line("column doubled formula val * 3").unwrap(),
      Some(WatchInput::SetColumn {
        column:     "doubled".into(),
        field_type: FieldType::Formula,
        formula:    Some("val * 3".into()),
      })
    );
    assert_eq!(
      parse_line("column note text").unwrap(),
      Some(WatchInput::SetColumn { column: "note".into(), field_type: FieldType::Text, formula: None })
    );
  }

  #[test]
  fn rejects_malformed_commands() {
    assert!(parse_line("truncate").is_err());
    assert!(parse_line("delete").is_err());
    assert!(parse_line("update r1").is_err());
    assert!(parse_line("insert [1]").is_err());
    assert!(parse_line("column doubled sparkle").is_err());
  }

  #[tokio::test]
  async fn session_follows_mutations() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let space = DataSpace::open(store).await.unwrap();
    space.create_table_with_id("t").await.unwrap();
    space
      .add_column(ColumnRecord::new("tb_t", "val", "Value", FieldType::Number))
      .await
      .unwrap();
    space
      .add_column(ColumnRecord::formula("tb_t", "doubled", "Doubled", "val * 2"))
      .await
      .unwrap();
    space.insert_row("t", row(json!({ "_id": "r0", "val": 1 }))).await.unwrap();

    let mut session = WatchSession::start(space, "t").await.unwrap();
    assert_eq!(session.drain_events(), [CacheEvent::Upserted {
      table:   "t".into(),
      row_ids: vec!["r0".into()],
    }]);

    let insert = parse_line(r#"insert {"_id": "r1", "val": 5}"#).unwrap().unwrap();
    session.apply(insert).await.unwrap();
    assert_eq!(
      session.cache().get("t", "r1").unwrap(),
      row(json!({ "_id": "r1", "val": 5, "doubled": 10 }))
    );

    let retype = parse_line("column doubled formula val * 3").unwrap().unwrap();
    session.apply(retype).await.unwrap();
    assert_eq!(session.cache().get("t", "r0").unwrap()["doubled"], json!(3));
    assert_eq!(session.cache().get("t", "r1").unwrap()["doubled"], json!(15));

    session.drain_events();
    session.apply(WatchInput::Delete("r0".into())).await.unwrap();
    assert_eq!(session.drain_events(), [CacheEvent::Removed {
      table:   "t".into(),
      row_ids: vec!["r0".into()],
    }]);
    assert!(session.apply(WatchInput::Delete("r0".into())).await.is_err());

    session.finish().await;
  }

  #[tokio::test]
  async fn missing_table_fails_to_start() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let space = DataSpace::open(store).await.unwrap();
    assert!(WatchSession::start(space, "ghost").await.is_err());
  }
}
