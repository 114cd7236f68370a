//! The [`Vfs`] trait: where extension files live.
//!
//! Paths are lists of segments relative to the file-system root; the empty
//! list is the root itself.

use std::{borrow::Cow, future::Future};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
  File,
  Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
  pub name: String,
  pub kind: EntryKind,
}

impl DirEntry {
  pub fn is_dir(&self) -> bool { self.kind == EntryKind::Directory }
}

/// A named file and its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfsFile {
  pub name:  String,
  pub bytes: Vec<u8>,
}

impl VfsFile {
  pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
    Self { name: name.into(), bytes: bytes.into() }
  }

  /// The contents as UTF-8, with invalid sequences replaced.
  pub fn text(&self) -> Cow<'_, str> { String::from_utf8_lossy(&self.bytes) }
}

/// A hierarchical file store.
pub trait Vfs: Send + Sync + 'static {
  /// Entries of the directory at `path`, sorted by name.
  fn list_dir<'a>(
    &'a self,
    path: &'a [&'a str],
  ) -> impl Future<Output = Result<Vec<DirEntry>>> + Send + 'a;

  fn get_file<'a>(&'a self, path: &'a [&'a str]) -> impl Future<Output = Result<VfsFile>> + Send + 'a;

  /// Create directory `name` inside `path`. An existing directory is left
  /// as is.
  fn add_dir<'a>(
    &'a self,
    path: &'a [&'a str],
    name: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Write `file` into the directory at `path`, replacing any file of the
  /// same name.
  fn add_file<'a>(
    &'a self,
    path: &'a [&'a str],
    file: VfsFile,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Delete the entry at `path`. A non-empty directory needs `recursive`.
  fn delete_entry<'a>(
    &'a self,
    path: &'a [&'a str],
    recursive: bool,
  ) -> impl Future<Output = Result<()>> + Send + 'a;
}

/// Reject segments that could escape or alias a directory.
pub(crate) fn check_segment(segment: &str) -> Result<()> {
  if segment.is_empty()
    || segment == "."
    || segment == ".."
    || segment.contains(['/', '\\', '\0'])
  {
    return Err(Error::InvalidPath(segment.to_owned()));
  }
  Ok(())
}

pub(crate) fn check_path(path: &[&str]) -> Result<()> {
  path.iter().try_for_each(|segment| check_segment(segment))
}

pub(crate) fn display(path: &[&str]) -> String { format!("/{}", path.join("/")) }
