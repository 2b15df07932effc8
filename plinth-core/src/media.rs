//! File uploads.
//!
//! Minimal storage under the configured uploads directory, also mounted
//! read-only at `/uploads` by the app router. Stored names get a random
//! prefix so repeated uploads of the same filename never collide.

use crate::auth::AuthContext;
use crate::error::{Error, Result};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
}

#[derive(Clone)]
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    pub(crate) fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<StoredFile> {
        let name = sanitize_filename(filename)?;
        let prefix = Uuid::new_v4().simple().to_string();
        let stored = format!("{}-{}", &prefix[..8], name);
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&stored), bytes).await?;
        log::info!("stored upload {stored} ({} bytes)", bytes.len());
        Ok(StoredFile { name: stored, size: bytes.len() as u64 })
    }

    async fn list(&self) -> Result<Vec<StoredFile>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_file() {
                files.push(StoredFile {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    size: meta.len(),
                });
            }
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let name = sanitize_filename(name)?;
        match tokio::fs::remove_file(self.dir.join(&name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("No file \"{name}\"")))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Guarded media operations.
pub struct MediaApi<'a> {
    store: &'a MediaStore,
    guard: &'a crate::auth::Guard,
    ctx: &'a AuthContext,
}

impl<'a> MediaApi<'a> {
    pub(crate) fn new(store: &'a MediaStore, guard: &'a crate::auth::Guard, ctx: &'a AuthContext) -> Self {
        Self { store, guard, ctx }
    }

    pub async fn upload(&self, filename: &str, bytes: &[u8]) -> Result<StoredFile> {
        self.ctx.authorize(self.guard, "media.file.upload")?;
        self.store.save(filename, bytes).await
    }

    pub async fn list(&self) -> Result<Vec<StoredFile>> {
        self.ctx.authorize(self.guard, "media.file.list")?;
        self.store.list().await
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        self.ctx.authorize(self.guard, "media.file.delete")?;
        self.store.delete(name).await
    }
}

/// Uploads are flat: no separators, no traversal, no hidden files.
fn sanitize_filename(name: &str) -> Result<String> {
    if name.is_empty()
        || name.len() > 255
        || name.starts_with('.')
        || name.contains("..")
        || name.chars().any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(Error::BadRequest(format!("Invalid filename \"{name}\"")));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_rejects_traversal() {
        assert!(sanitize_filename("photo.png").is_ok());
        assert!(sanitize_filename("../etc/passwd").is_err());
        assert!(sanitize_filename("a/b.png").is_err());
        assert!(sanitize_filename("a\\b.png").is_err());
        assert!(sanitize_filename(".env").is_err());
        assert!(sanitize_filename("").is_err());
    }

    #[tokio::test]
    async fn save_list_delete_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MediaStore::new(tmp.path().join("uploads"));

        let stored = store.save("note.txt", b"hello").await.unwrap();
        assert!(stored.name.ends_with("-note.txt"));
        assert_eq!(stored.size, 5);

        let files = store.list().await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, stored.name);

        store.delete(&stored.name).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert!(matches!(store.delete(&stored.name).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn list_of_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MediaStore::new(tmp.path().join("never-created"));
        assert!(store.list().await.unwrap().is_empty());
    }
}
