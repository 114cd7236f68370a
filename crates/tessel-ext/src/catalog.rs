//! [`ExtensionCatalog`]: installed extensions under `/extensions/apps`.

use crate::{
  Error, ExtensionManifest, Result,
  vfs::{Vfs, VfsFile, display},
};

/// Directory holding one sub-directory per installed extension.
pub const APPS_ROOT: [&str; 2] = ["extensions", "apps"];
pub const MANIFEST_FILE: &str = "package.json";
pub const INDEX_FILE: &str = "index.html";

#[derive(Debug, Clone)]
pub struct ExtensionCatalog<V> {
  vfs: V,
}

fn app_path<'a>(name: &'a str, file: Option<&'a str>) -> Vec<&'a str> {
  let mut path = APPS_ROOT.to_vec();
  path.push(name);
  path.extend(file);
  path
}

impl<V: Vfs> ExtensionCatalog<V> {
  pub fn new(vfs: V) -> Self { Self { vfs } }

  pub fn vfs(&self) -> &V { &self.vfs }

  async fn ensure_root(&self) -> Result<()> {
    for depth in 0..APPS_ROOT.len() {
      self.vfs.add_dir(&APPS_ROOT[..depth], APPS_ROOT[depth]).await?;
    }
    Ok(())
  }

  /// Manifests of every installed extension, by directory name.
  ///
  /// A directory without a readable manifest is skipped.
  pub async fn list(&self) -> Result<Vec<ExtensionManifest>> {
    let entries = match self.vfs.list_dir(&APPS_ROOT).await {
      Ok(entries) => entries,
      Err(e) if e.is_not_found() => return Ok(Vec::new()),
      Err(e) => return Err(e),
    };

    let mut manifests = Vec::with_capacity(entries.len());
    for entry in entries.iter().filter(|e| e.is_dir()) {
      let path = app_path(&entry.name, Some(MANIFEST_FILE));
      let file = match self.vfs.get_file(&path).await {
        Ok(file) => file,
        Err(e) => {
          tracing::warn!(extension = %entry.name, error = %e, "extension has no manifest");
          continue;
        }
      };
      match ExtensionManifest::parse(&file.text()) {
        Some(manifest) => manifests.push(manifest),
        None => tracing::warn!(extension = %entry.name, "skipping invalid extension manifest"),
      }
    }
    Ok(manifests)
  }

  /// The entry page of extension `name`.
  pub async fn index(&self, name: &str) -> Result<String> {
    let file = self.vfs.get_file(&app_path(name, Some(INDEX_FILE))).await?;
    Ok(file.text().into_owned())
  }

  /// Copy the extension in directory `dir` of `source` into the catalog.
  ///
  /// The destination directory is named after the manifest id. Files
  /// already installed under that id are overwritten.
  pub async fn install<S: Vfs>(&self, source: &S, dir: &[&str]) -> Result<ExtensionManifest> {
    let manifest_path = [dir, &[MANIFEST_FILE][..]].concat();
    let text = source.get_file(&manifest_path).await?;
    let manifest = ExtensionManifest::parse(&text.text())
      .ok_or_else(|| Error::InvalidManifest(display(&manifest_path)))?;

    self.ensure_root().await?;
    self.vfs.add_dir(&APPS_ROOT, &manifest.id).await?;

    // (source directory, destination directory) pairs still to copy.
    let mut pending: Vec<(Vec<String>, Vec<String>)> = vec![(
      dir.iter().map(|s| s.to_string()).collect(),
      app_path(&manifest.id, None).into_iter().map(str::to_owned).collect(),
    )];
    let mut copied = 0usize;
    while let Some((from, to)) = pending.pop() {
      let from_ref: Vec<&str> = from.iter().map(String::as_str).collect();
      let to_ref: Vec<&str> = to.iter().map(String::as_str).collect();
      for entry in source.list_dir(&from_ref).await? {
        let mut child = from.clone();
        child.push(entry.name.clone());
        if entry.is_dir() {
          self.vfs.add_dir(&to_ref, &entry.name).await?;
          let mut target = to.clone();
          target.push(entry.name);
          pending.push((child, target));
        } else {
          let child_ref: Vec<&str> = child.iter().map(String::as_str).collect();
          let file = source.get_file(&child_ref).await?;
          self.vfs.add_file(&to_ref, VfsFile::new(entry.name, file.bytes)).await?;
          copied += 1;
        }
      }
    }

    tracing::info!(id = %manifest.id, version = %manifest.version, files = copied, "extension installed");
    Ok(manifest)
  }

  /// Delete extension `name` and everything under it.
  pub async fn remove(&self, name: &str) -> Result<()> {
    self.vfs.delete_entry(&app_path(name, None), true).await?;
    tracing::info!(extension = name, "extension removed");
    Ok(())
  }
}
