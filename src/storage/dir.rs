use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{archive as ArchiveError, Error};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^\w+$").unwrap();
}

#[derive(Clone, Debug)]
pub struct Dir(PathBuf);

impl Dir {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    // Identifiers are single path segments made of word characters only,
    // so the resolved path can never leave the base directory.
    pub fn archive_path(&self, id: &str) -> Option<PathBuf> {
        if !IDENTIFIER.is_match(id) {
            return None;
        }
        Some(self.0.join(id).join(""))
    }

    /// Resolve an archive identifier to a readable directory.
    pub async fn archive_dir(&self, id: &str) -> Result<PathBuf, Error> {
        let path = match self.archive_path(id) {
            Some(path) => path,
            None => {
                log::error!("Invalid archive identifier {:?}", id);
                return Err(ArchiveError::NotFound);
            }
        };
        match tokio::fs::metadata(&path).await {
            Ok(md) if md.is_dir() => (),
            _ => {
                log::error!("Path {} does not exist", path.display());
                return Err(ArchiveError::NotFound);
            }
        }
        if let Err(err) = tokio::fs::read_dir(&path).await {
            log::error!("Path {} is not readable: {}", path.display(), err);
            return Err(ArchiveError::NotFound);
        }
        Ok(path)
    }
}
