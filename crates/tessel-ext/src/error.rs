use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("no such entry: {0}")]
  NotFound(String),

  #[error("not a directory: {0}")]
  NotADirectory(String),

  #[error("not a file: {0}")]
  NotAFile(String),

  #[error("directory not empty: {0}")]
  NotEmpty(String),

  #[error("invalid path segment {0:?}")]
  InvalidPath(String),

  #[error("invalid extension manifest in {0}")]
  InvalidManifest(String),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

impl Error {
  pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
