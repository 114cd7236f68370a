//! Extension manifests, read from an extension's `package.json`.
//!
//! The manifest fields sit either under an `eidos` key or at the top level:
//!
//! ```json
//! { "name": "kanban", "version": "1.0.0", "eidos": { "displayMode": "side" } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
  #[default]
  Full,
  Side,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionManifest {
  pub id:           String,
  pub name:         String,
  pub version:      String,
  pub description:  String,
  pub display_mode: DisplayMode,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
  #[serde(default)]
  id:           Option<String>,
  name:         String,
  #[serde(default)]
  version:      String,
  #[serde(default)]
  description:  String,
  #[serde(default)]
  display_mode: DisplayMode,
}

impl ExtensionManifest {
  /// Parse manifest text. Anything unreadable yields `None`.
  pub fn parse(text: &str) -> Option<Self> {
    let value: Value = match serde_json::from_str(text) {
      Ok(value) => value,
      Err(e) => {
        tracing::debug!(error = %e, "manifest is not JSON");
        return None;
      }
    };
    let body = match value.get("eidos") {
      Some(nested) if !nested.is_null() => nested.clone(),
      _ => value,
    };
    let raw: RawManifest = match serde_json::from_value(body) {
      Ok(raw) => raw,
      Err(e) => {
        tracing::debug!(error = %e, "manifest is malformed");
        return None;
      }
    };

    let id = raw.id.filter(|id| !id.is_empty()).unwrap_or_else(|| raw.name.clone());
    Some(Self {
      id,
      name: raw.name,
      version: raw.version,
      description: raw.description,
      display_mode: raw.display_mode,
    })
  }
}
