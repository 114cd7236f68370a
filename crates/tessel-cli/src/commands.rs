//! Subcommand implementations.

use std::{path::Path, sync::Arc};

use anyhow::{Context as _, bail};
use clap::Subcommand;
use serde::Serialize;
use serde_json::Value;
use tessel_api::{ApiState, api_router};
use tessel_core::{
  column::{ColumnProperty, ColumnRecord, FieldType},
  row::{Row, raw_table_name},
  script::{EnvMap, ScriptRecord, ScriptStatus},
};
use tessel_ext::{ExtensionCatalog, LocalVfs};
use tessel_store_sqlite::{DataSpace, ScriptTable, SqliteStore};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::TesselConfig;

// ─── Subcommands ──────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum ScriptsCommand {
  /// List scripts.
  List {
    /// all, enabled, or disabled.
    #[arg(long, default_value = "all")]
    status: ScriptStatus,
  },
  /// Install a script from a JSON file. It starts disabled.
  Add { file: std::path::PathBuf },
  /// Print one script.
  Show { id: String },
  Enable { id: String },
  Disable { id: String },
  /// Remove a script.
  Rm { id: String },
  /// Replace a script's environment with the given KEY=VALUE pairs.
  Env {
    id:   String,
    #[arg(value_parser = parse_env_pair)]
    vars: Vec<(String, String)>,
  },
}

#[derive(Subcommand, Debug)]
pub enum ExtCommand {
  /// List installed extensions.
  List,
  /// Install the extension in a local directory.
  Install { dir: std::path::PathBuf },
  /// Remove an installed extension.
  Rm { name: String },
}

#[derive(Subcommand, Debug)]
pub enum TableCommand {
  /// Create a table and print its id.
  Create {
    #[arg(long)]
    id: Option<String>,
  },
  /// List a table's columns.
  Columns { table: String },
  /// Add a column. Formula columns need `--formula`.
  AddColumn {
    table:      String,
    column:     String,
    #[arg(long = "type", value_parser = parse_field_type)]
    field_type: FieldType,
    #[arg(long)]
    name:       Option<String>,
    #[arg(long)]
    formula:    Option<String>,
  },
  /// Change a column's type or formula.
  SetColumn {
    table:      String,
    column:     String,
    #[arg(long = "type", value_parser = parse_field_type)]
    field_type: FieldType,
    #[arg(long)]
    formula:    Option<String>,
  },
  /// Insert a row given as a JSON object.
  Insert { table: String, row: String },
  /// Apply JSON changes to a row.
  Update { table: String, row_id: String, changes: String },
  /// Delete a row.
  Delete { table: String, row_id: String },
  /// Print every row with computed columns evaluated.
  Rows { table: String },
  /// Follow the table's reconciled cache while applying mutations read from
  /// stdin.
  Watch { table: String },
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
  match s.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
    _ => Err(format!("expected KEY=VALUE, got {s:?}")),
  }
}

pub(crate) fn parse_field_type(s: &str) -> Result<FieldType, String> {
  serde_json::from_value(Value::String(s.to_owned())).map_err(|_| format!("unknown field type {s:?}"))
}

pub(crate) fn parse_row(text: &str) -> anyhow::Result<Row> {
  match serde_json::from_str(text).context("row is not JSON")? {
    Value::Object(row) => Ok(row),
    _ => bail!("row must be a JSON object"),
  }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

// ─── Opening ──────────────────────────────────────────────────────────────────

async fn open_store(cfg: &TesselConfig) -> anyhow::Result<SqliteStore> {
  if let Some(parent) = cfg.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))
}

async fn open_catalog(cfg: &TesselConfig) -> anyhow::Result<ExtensionCatalog<LocalVfs>> {
  tokio::fs::create_dir_all(&cfg.extensions_root)
    .await
    .with_context(|| format!("failed to create {}", cfg.extensions_root.display()))?;
  Ok(ExtensionCatalog::new(LocalVfs::new(&cfg.extensions_root)))
}

// ─── Serve ────────────────────────────────────────────────────────────────────

pub async fn serve(cfg: &TesselConfig) -> anyhow::Result<()> {
  let store = open_store(cfg).await?;
  let scripts = ScriptTable::open(store.clone()).await.context("opening scripts table")?;
  let catalog = open_catalog(cfg).await?;

  // Trace every committed change.
  let mut signals = store.bus().subscribe();
  tokio::spawn(async move {
    while let Some(signal) = signals.recv().await {
      tracing::debug!(kind = signal.kind.as_str(), table = signal.table(), "change signal");
    }
  });

  let state = Arc::new(ApiState::new(scripts, catalog));
  let app = axum::Router::new()
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", cfg.host, cfg.port);
  tracing::info!("Listening on http://{address}/api");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      tracing::info!("shutting down");
    })
    .await
    .context("server error")?;

  store.close().await.context("closing store")?;
  Ok(())
}

// ─── Scripts ──────────────────────────────────────────────────────────────────

pub async fn scripts(cfg: &TesselConfig, cmd: ScriptsCommand) -> anyhow::Result<()> {
  let table = ScriptTable::open(open_store(cfg).await?).await?;

  match cmd {
    ScriptsCommand::List { status } => {
      let listing = table.list_scripts(status).await?;
      for failure in &listing.failures {
        eprintln!("warning: script {} is unreadable: {}", failure.id, failure.error);
      }
      for script in &listing.records {
        let state = if script.enabled { "enabled" } else { "disabled" };
        println!("{}\t{:?}\t{}\t{}", script.id, script.kind, state, script.name);
      }
    }
    ScriptsCommand::Add { file } => {
      let text = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
      let script: ScriptRecord =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", file.display()))?;
      let script = table.add(script).await?;
      println!("{}", script.id);
    }
    ScriptsCommand::Show { id } => print_json(&table.get(&id).await?)?,
    ScriptsCommand::Enable { id } => table.enable(&id).await?,
    ScriptsCommand::Disable { id } => table.disable(&id).await?,
    ScriptsCommand::Rm { id } => {
      if !table.delete(&id).await? {
        bail!("no script with id {id:?}");
      }
    }
    ScriptsCommand::Env { id, vars } => {
      let env_map: EnvMap = vars.into_iter().collect();
      table.update_env_map(&id, &env_map).await?;
    }
  }
  Ok(())
}

// ─── Extensions ───────────────────────────────────────────────────────────────

pub async fn ext(cfg: &TesselConfig, cmd: ExtCommand) -> anyhow::Result<()> {
  let catalog = open_catalog(cfg).await?;

  match cmd {
    ExtCommand::List => {
      for ext in catalog.list().await? {
        println!("{}\t{}\t{:?}\t{}", ext.id, ext.version, ext.display_mode, ext.description);
      }
    }
    ExtCommand::Install { dir } => {
      let dir = std::fs::canonicalize(&dir)
        .with_context(|| format!("resolving {}", dir.display()))?;
      let (parent, name) = split_dir(&dir)?;
      let manifest = catalog
        .install(&LocalVfs::new(parent), &[name])
        .await
        .with_context(|| format!("installing {}", dir.display()))?;
      println!("{}", manifest.id);
    }
    ExtCommand::Rm { name } => catalog.remove(&name).await?,
  }
  Ok(())
}

fn split_dir(dir: &Path) -> anyhow::Result<(&Path, &str)> {
  let parent = dir.parent().context("cannot install from the file-system root")?;
  let name = dir
    .file_name()
    .and_then(|n| n.to_str())
    .context("directory name is not UTF-8")?;
  Ok((parent, name))
}

// ─── Tables ───────────────────────────────────────────────────────────────────

pub async fn table(cfg: &TesselConfig, cmd: TableCommand) -> anyhow::Result<()> {
  let space = DataSpace::open(open_store(cfg).await?).await?;

  match cmd {
    TableCommand::Create { id } => {
      let id = match id {
        Some(id) => {
          space.create_table_with_id(&id).await?;
          id
        }
        None => space.create_table().await?,
      };
      println!("{id}");
    }
    TableCommand::Columns { table } => {
      for column in space.columns(&table).await? {
        let formula = column.property.formula.as_deref().unwrap_or("");
        println!("{}\t{:?}\t{}\t{formula}", column.table_column_name, column.field_type, column.name);
      }
    }
    TableCommand::AddColumn { table, column, field_type, name, formula } => {
      let display_name = name.unwrap_or_else(|| column.clone());
      let mut record = ColumnRecord::new(raw_table_name(&table), column, display_name, field_type);
      record.property.formula = formula;
      space.add_column(record).await?;
    }
    TableCommand::SetColumn { table, column, field_type, formula } => {
      let property = ColumnProperty { formula, ..Default::default() };
      space.update_column(&table, &column, field_type, property).await?;
    }
    TableCommand::Insert { table, row } => {
      let id = space.insert_row(&table, parse_row(&row)?).await?;
      println!("{id}");
    }
    TableCommand::Update { table, row_id, changes } => {
      space.update_row(&table, &row_id, parse_row(&changes)?).await?;
    }
    TableCommand::Delete { table, row_id } => {
      if !space.delete_row(&table, &row_id).await? {
        bail!("no row {row_id:?} in {table}");
      }
    }
    TableCommand::Rows { table } => {
      for row in space.rows(&table).await? {
        println!("{}", Value::Object(row));
      }
    }
    TableCommand::Watch { table } => crate::watch::run(space, &table).await?,
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn env_pairs_split_on_first_equals() {
    assert_eq!(parse_env_pair("A=b=c"), Ok(("A".into(), "b=c".into())));
    assert_eq!(parse_env_pair("EMPTY="), Ok(("EMPTY".into(), String::new())));
    assert!(parse_env_pair("=x").is_err());
    assert!(parse_env_pair("novalue").is_err());
  }

  #[test]
  fn field_types_parse_kebab_case() {
    assert_eq!(parse_field_type("multi-select"), Ok(FieldType::MultiSelect));
    assert_eq!(parse_field_type("formula"), Ok(FieldType::Formula));
    assert!(parse_field_type("Formula").is_err());
  }

  #[test]
  fn rows_must_be_objects() {
    assert_eq!(parse_row(r#"{"val": 1}"#).unwrap()["val"], 1);
    assert!(parse_row("[1]").is_err());
    assert!(parse_row("nope").is_err());
  }

  #[test]
  fn install_dir_splits_into_parent_and_name() {
    let (parent, name) = split_dir(Path::new("/tmp/ext/kanban")).unwrap();
    assert_eq!(parent, Path::new("/tmp/ext"));
    assert_eq!(name, "kanban");
    assert!(split_dir(Path::new("/")).is_err());
  }
}
