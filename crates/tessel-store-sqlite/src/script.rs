//! [`ScriptTable`]: the meta-table of installed scripts.

use tessel_core::script::{EnvMap, FieldsMap, ScriptRecord, ScriptStatus};

use crate::{Filter, Listing, MetaTable, Result, SqliteStore};

/// Scripts, transform functions, prompts, and blocks installed in a space.
#[derive(Debug, Clone)]
pub struct ScriptTable {
  table: MetaTable<ScriptRecord>,
}

impl ScriptTable {
  pub async fn open(store: SqliteStore) -> Result<Self> {
    Ok(Self { table: MetaTable::open(store).await? })
  }

  /// The underlying generic table.
  pub fn meta(&self) -> &MetaTable<ScriptRecord> { &self.table }

  /// Install `script`. New scripts always start disabled.
  pub async fn add(&self, mut script: ScriptRecord) -> Result<ScriptRecord> {
    script.enabled = false;
    self.table.insert(&script).await?;
    tracing::info!(id = %script.id, kind = ?script.kind, "script installed");
    Ok(script)
  }

  pub async fn get(&self, id: &str) -> Result<ScriptRecord> { self.table.get_by_id(id).await }

  /// Remove the script entirely. Returns whether it existed.
  pub async fn delete(&self, id: &str) -> Result<bool> { self.table.delete(id).await }

  pub async fn enable(&self, id: &str) -> Result<()> { self.set_enabled(id, true).await }

  pub async fn disable(&self, id: &str) -> Result<()> { self.set_enabled(id, false).await }

  /// Setting the flag to its current value writes nothing and publishes no
  /// signal.
  async fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
    let current = self.table.get_by_id(id).await?;
    if current.enabled == enabled {
      return Ok(());
    }
    self.table.update_field(id, "enabled", enabled.into()).await?;
    tracing::info!(id, enabled, "script toggled");
    Ok(())
  }

  /// Replace the whole environment map. Keys absent from `env_map` are
  /// removed; callers wanting a merge must read, modify, and write back.
  pub async fn update_env_map(&self, id: &str, env_map: &EnvMap) -> Result<ScriptRecord> {
    self
      .table
      .update_field(id, "env_map", serde_json::to_value(env_map)?)
      .await
  }

  /// Replace the resolved table bindings.
  pub async fn update_fields_map(&self, id: &str, fields_map: &FieldsMap) -> Result<ScriptRecord> {
    self
      .table
      .update_field(id, "fields_map", serde_json::to_value(fields_map)?)
      .await
  }

  /// List scripts by enabled flag. Every kind is included; callers filter by
  /// kind themselves.
  pub async fn list_scripts(&self, status: ScriptStatus) -> Result<Listing<ScriptRecord>> {
    let filter = match status.enabled_filter() {
      Some(enabled) => Filter::new().eq("enabled", enabled),
      None => Filter::new(),
    };
    self.table.list(&filter).await
  }
}
