//! Script records: executable scripts, transform functions (UDFs), prompts,
//! and editor blocks installed into a space.
//!
//! A script starts disabled. Its environment map and its resolved table
//! bindings are updated independently of the rest of the record.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  Error, Result,
  record::{FieldKind, FieldSpec, Record, RecordSchema},
};

/// Name of the table backing [`ScriptRecord`].
pub const SCRIPT_TABLE: &str = "scripts";

// ─── Kind ────────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
  #[default]
  Script,
  /// A transform function usable from formulas.
  Udf,
  Prompt,
  /// A document-editor block provided by an extension.
  Block,
}

// ─── Declarations ────────────────────────────────────────────────────────────

/// A command exposed by a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
  pub name:               String,
  pub description:        String,
  #[serde(
    rename = "inputJSONSchema",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub input_json_schema:  Option<Value>,
  #[serde(
    rename = "outputJSONSchema",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub output_json_schema: Option<Value>,
  /// Whether the command may be offered as a table action.
  #[serde(
    rename = "asTableAction",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub as_table_action:    Option<bool>,
}

/// A field a script expects to find in a dependent table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDependency {
  pub name:       String,
  #[serde(rename = "type")]
  pub field_type: String,
}

/// A table a script declares it reads or writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDependency {
  pub name:   String,
  pub fields: Vec<FieldDependency>,
}

/// A declared environment-variable slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvSlot {
  pub name:     String,
  #[serde(rename = "type")]
  pub env_type: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub readonly: Option<bool>,
}

/// Environment variable name → value.
pub type EnvMap = BTreeMap<String, String>;

/// The concrete table a declared dependency was bound to after installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBinding {
  /// Resolved table id.
  pub id:         String,
  pub name:       String,
  /// Declared field name → resolved column id.
  #[serde(rename = "fieldsMap")]
  pub fields_map: BTreeMap<String, String>,
}

/// Declared table name → binding.
pub type FieldsMap = BTreeMap<String, TableBinding>;

// ─── Record ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRecord {
  pub id:          String,
  pub name:        String,
  #[serde(rename = "type", default)]
  pub kind:        ScriptKind,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub version:     String,
  #[serde(default)]
  pub code:        String,
  #[serde(default)]
  pub enabled:     bool,
  /// Model identifier; only meaningful for [`ScriptKind::Prompt`].
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model:       Option<String>,
  #[serde(default)]
  pub commands:    Vec<Command>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tables:      Option<Vec<TableDependency>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub envs:        Option<Vec<EnvSlot>>,
  #[serde(default)]
  pub env_map:     EnvMap,
  #[serde(default)]
  pub fields_map:  FieldsMap,
}

impl ScriptRecord {
  /// A disabled script with empty declarations.
  pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ScriptKind) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      kind,
      description: String::new(),
      version: String::new(),
      code: String::new(),
      enabled: false,
      model: None,
      commands: Vec::new(),
      tables: None,
      envs: None,
      env_map: EnvMap::new(),
      fields_map: FieldsMap::new(),
    }
  }
}

impl Record for ScriptRecord {
  const SCHEMA: RecordSchema = RecordSchema {
    table:       SCRIPT_TABLE,
    primary_key: "id",
    fields:      &[
      FieldSpec::new("id", FieldKind::Text),
      FieldSpec::new("name", FieldKind::Text),
      FieldSpec::new("description", FieldKind::Text),
      FieldSpec::new("type", FieldKind::Text).with_default("'script'"),
      FieldSpec::new("version", FieldKind::Text),
      FieldSpec::new("code", FieldKind::Text),
      FieldSpec::new("model", FieldKind::Text),
      FieldSpec::new("commands", FieldKind::Json),
      FieldSpec::new("tables", FieldKind::Json),
      FieldSpec::new("envs", FieldKind::Json),
      FieldSpec::new("env_map", FieldKind::Json),
      FieldSpec::new("fields_map", FieldKind::Json),
      FieldSpec::new("enabled", FieldKind::Boolean).with_default("0"),
    ],
  };

  fn id(&self) -> &str { &self.id }
}

// ─── Status filter ───────────────────────────────────────────────────────────

/// Which scripts to list by enabled flag. `All` includes every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptStatus {
  #[default]
  All,
  Enabled,
  Disabled,
}

impl ScriptStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::All => "all",
      Self::Enabled => "enabled",
      Self::Disabled => "disabled",
    }
  }

  /// The `enabled` value to filter on, if any.
  pub fn enabled_filter(self) -> Option<bool> {
    match self {
      Self::All => None,
      Self::Enabled => Some(true),
      Self::Disabled => Some(false),
    }
  }
}

impl fmt::Display for ScriptStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ScriptStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "all" => Ok(Self::All),
      "enabled" => Ok(Self::Enabled),
      "disabled" => Ok(Self::Disabled),
      other => Err(Error::UnknownStatus(other.to_owned())),
    }
  }
}
