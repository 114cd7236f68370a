//! Editor blocks contributed by extensions.

use std::sync::{OnceLock, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tessel_core::script::{ScriptKind, ScriptRecord};

/// What the editor needs to offer a block in its insert menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDescriptor {
  pub name:     String,
  pub icon:     String,
  #[serde(default)]
  pub keywords: Vec<String>,
}

impl BlockDescriptor {
  pub fn new(name: impl Into<String>, icon: impl Into<String>) -> Self {
    Self { name: name.into(), icon: icon.into(), keywords: Vec::new() }
  }

  pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.keywords = keywords.into_iter().map(Into::into).collect();
    self
  }
}

/// Blocks registered by loaded extensions, in registration order.
///
/// Extensions register at load and unregister at unload; the editor pulls
/// the current list with [`list`](Self::list).
#[derive(Debug, Default)]
pub struct BlockRegistry {
  blocks: RwLock<Vec<BlockDescriptor>>,
}

static GLOBAL: OnceLock<BlockRegistry> = OnceLock::new();

impl BlockRegistry {
  pub fn new() -> Self { Self::default() }

  /// The process-wide registry.
  pub fn global() -> &'static Self { GLOBAL.get_or_init(Self::new) }

  /// Add `block`, replacing any block with the same name. Returns the
  /// replaced block.
  pub fn register(&self, block: BlockDescriptor) -> Option<BlockDescriptor> {
    let mut blocks = self.blocks.write().unwrap_or_else(PoisonError::into_inner);
    tracing::debug!(block = %block.name, "block registered");
    match blocks.iter_mut().find(|b| b.name == block.name) {
      Some(existing) => Some(std::mem::replace(existing, block)),
      None => {
        blocks.push(block);
        None
      }
    }
  }

  /// Remove the block `name`. Returns whether it was registered.
  pub fn unregister(&self, name: &str) -> bool {
    let mut blocks = self.blocks.write().unwrap_or_else(PoisonError::into_inner);
    let before = blocks.len();
    blocks.retain(|b| b.name != name);
    blocks.len() != before
  }

  pub fn clear(&self) { self.blocks.write().unwrap_or_else(PoisonError::into_inner).clear(); }

  pub fn get(&self, name: &str) -> Option<BlockDescriptor> {
    let blocks = self.blocks.read().unwrap_or_else(PoisonError::into_inner);
    blocks.iter().find(|b| b.name == name).cloned()
  }

  pub fn list(&self) -> Vec<BlockDescriptor> {
    self.blocks.read().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub fn len(&self) -> usize { self.blocks.read().unwrap_or_else(PoisonError::into_inner).len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// The enabled block scripts among `scripts`.
pub fn enabled_blocks(scripts: impl IntoIterator<Item = ScriptRecord>) -> Vec<ScriptRecord> {
  scripts
    .into_iter()
    .filter(|s| s.kind == ScriptKind::Block && s.enabled)
    .collect()
}
