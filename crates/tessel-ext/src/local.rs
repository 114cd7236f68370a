//! [`LocalVfs`]: a [`Vfs`] rooted at a directory on disk.

use std::{
  io::ErrorKind,
  path::{Path, PathBuf},
};

use tokio::fs;

use crate::{
  Error, Result,
  vfs::{DirEntry, EntryKind, Vfs, VfsFile, check_path, check_segment, display},
};

#[derive(Debug, Clone)]
pub struct LocalVfs {
  root: PathBuf,
}

impl LocalVfs {
  /// Serve the directory `root`. It is not created here.
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn root(&self) -> &Path { &self.root }

  fn resolve(&self, path: &[&str]) -> Result<PathBuf> {
    check_path(path)?;
    Ok(path.iter().fold(self.root.clone(), |acc, segment| acc.join(segment)))
  }
}

fn io_error(path: &[&str], e: std::io::Error) -> Error {
  match e.kind() {
    ErrorKind::NotFound => Error::NotFound(display(path)),
    _ => Error::Io(e),
  }
}

impl Vfs for LocalVfs {
  async fn list_dir(&self, path: &[&str]) -> Result<Vec<DirEntry>> {
    let dir = self.resolve(path)?;
    let mut reader = fs::read_dir(&dir).await.map_err(|e| io_error(path, e))?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
      let kind = if entry.file_type().await?.is_dir() {
        EntryKind::Directory
      } else {
        EntryKind::File
      };
      entries.push(DirEntry { name: entry.file_name().to_string_lossy().into_owned(), kind });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
  }

  async fn get_file(&self, path: &[&str]) -> Result<VfsFile> {
    let file = self.resolve(path)?;
    let Some(name) = path.last() else {
      return Err(Error::NotAFile(display(path)));
    };
    if fs::metadata(&file).await.map_err(|e| io_error(path, e))?.is_dir() {
      return Err(Error::NotAFile(display(path)));
    }
    let bytes = fs::read(&file).await.map_err(|e| io_error(path, e))?;
    Ok(VfsFile::new(*name, bytes))
  }

  async fn add_dir(&self, path: &[&str], name: &str) -> Result<()> {
    check_segment(name)?;
    let dir = self.resolve(path)?.join(name);
    match fs::create_dir(&dir).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == ErrorKind::AlreadyExists => {
        if fs::metadata(&dir).await?.is_dir() {
          Ok(())
        } else {
          Err(Error::NotADirectory(dir.display().to_string()))
        }
      }
      Err(e) => Err(io_error(path, e)),
    }
  }

  async fn add_file(&self, path: &[&str], file: VfsFile) -> Result<()> {
    check_segment(&file.name)?;
    let dir = self.resolve(path)?;
    if !fs::metadata(&dir).await.map_err(|e| io_error(path, e))?.is_dir() {
      return Err(Error::NotADirectory(display(path)));
    }
    fs::write(dir.join(&file.name), file.bytes).await?;
    Ok(())
  }

  async fn delete_entry(&self, path: &[&str], recursive: bool) -> Result<()> {
    if path.is_empty() {
      return Err(Error::InvalidPath(String::new()));
    }
    let target = self.resolve(path)?;
    let metadata = fs::symlink_metadata(&target).await.map_err(|e| io_error(path, e))?;
    if !metadata.is_dir() {
      fs::remove_file(&target).await?;
    } else if recursive {
      fs::remove_dir_all(&target).await?;
    } else {
      if fs::read_dir(&target).await?.next_entry().await?.is_some() {
        return Err(Error::NotEmpty(display(path)));
      }
      fs::remove_dir(&target).await?;
    }
    Ok(())
  }
}
