//! [`MemoryVfs`]: an in-process file tree.

use std::{
  collections::BTreeMap,
  sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{
  Error, Result,
  vfs::{DirEntry, EntryKind, Vfs, VfsFile, check_path, check_segment, display},
};

#[derive(Debug)]
enum Node {
  File(Vec<u8>),
  Dir(BTreeMap<String, Node>),
}

/// A [`Vfs`] held entirely in memory. Contents are lost on drop.
#[derive(Debug)]
pub struct MemoryVfs {
  root: Mutex<Node>,
}

impl Default for MemoryVfs {
  fn default() -> Self { Self::new() }
}

impl MemoryVfs {
  pub fn new() -> Self { Self { root: Mutex::new(Node::Dir(BTreeMap::new())) } }

  fn root(&self) -> MutexGuard<'_, Node> { self.root.lock().unwrap_or_else(PoisonError::into_inner) }
}

/// The children of the directory at `path`.
fn dir_mut<'n>(root: &'n mut Node, path: &[&str]) -> Result<&'n mut BTreeMap<String, Node>> {
  let mut node = root;
  for (depth, segment) in path.iter().enumerate() {
    let Node::Dir(children) = node else {
      return Err(Error::NotADirectory(display(&path[..depth])));
    };
    node = children
      .get_mut(*segment)
      .ok_or_else(|| Error::NotFound(display(&path[..=depth])))?;
  }
  match node {
    Node::Dir(children) => Ok(children),
    Node::File(_) => Err(Error::NotADirectory(display(path))),
  }
}

/// Split `path` into its parent directory and final segment.
fn split<'p>(path: &'p [&'p str]) -> Result<(&'p [&'p str], &'p str)> {
  match path.split_last() {
    Some((name, parent)) => Ok((parent, name)),
    None => Err(Error::InvalidPath(String::new())),
  }
}

impl Vfs for MemoryVfs {
  async fn list_dir(&self, path: &[&str]) -> Result<Vec<DirEntry>> {
    check_path(path)?;
    let mut root = self.root();
    let children = dir_mut(&mut root, path)?;
    Ok(
      children
        .iter()
        .map(|(name, node)| DirEntry {
          name: name.clone(),
          kind: match node {
            Node::File(_) => EntryKind::File,
            Node::Dir(_) => EntryKind::Directory,
          },
        })
        .collect(),
    )
  }

  async fn get_file(&self, path: &[&str]) -> Result<VfsFile> {
    check_path(path)?;
    let (parent, name) = split(path)?;
    let mut root = self.root();
    match dir_mut(&mut root, parent)?.get(name) {
      Some(Node::File(bytes)) => Ok(VfsFile::new(name, bytes.clone())),
      Some(Node::Dir(_)) => Err(Error::NotAFile(display(path))),
      None => Err(Error::NotFound(display(path))),
    }
  }

  async fn add_dir(&self, path: &[&str], name: &str) -> Result<()> {
    check_path(path)?;
    check_segment(name)?;
    let mut root = self.root();
    let children = dir_mut(&mut root, path)?;
    match children.entry(name.to_owned()).or_insert_with(|| Node::Dir(BTreeMap::new())) {
      Node::Dir(_) => Ok(()),
      Node::File(_) => Err(Error::NotADirectory(display(&[path, &[name][..]].concat()))),
    }
  }

  async fn add_file(&self, path: &[&str], file: VfsFile) -> Result<()> {
    check_path(path)?;
    check_segment(&file.name)?;
    let mut root = self.root();
    let children = dir_mut(&mut root, path)?;
    if let Some(Node::Dir(_)) = children.get(&file.name) {
      return Err(Error::NotAFile(display(&[path, &[file.name.as_str()][..]].concat())));
    }
    children.insert(file.name, Node::File(file.bytes));
    Ok(())
  }

  async fn delete_entry(&self, path: &[&str], recursive: bool) -> Result<()> {
    check_path(path)?;
    let (parent, name) = split(path)?;
    let mut root = self.root();
    let children = dir_mut(&mut root, parent)?;
    match children.get(name) {
      None => return Err(Error::NotFound(display(path))),
      Some(Node::Dir(entries)) if !recursive && !entries.is_empty() => {
        return Err(Error::NotEmpty(display(path)));
      }
      Some(_) => {}
    }
    children.remove(name);
    Ok(())
  }
}
