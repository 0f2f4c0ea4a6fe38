//! # IO Utilities
//!
//! Async file system helpers for session artifacts. Every helper maps
//! failures into `GhostwriterError::Io` carrying the offending path.

use crate::error::{GhostwriterError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Read a UTF-8 file
pub async fn read_text(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path)
        .await
        .map_err(|e| GhostwriterError::io(path, e))
}

/// Write a file, creating parent directories as needed
pub async fn write_text(path: impl AsRef<Path>, content: &str) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| GhostwriterError::io(parent, e))?;
    }

    fs::write(path, content)
        .await
        .map_err(|e| GhostwriterError::io(path, e))
}

/// Serialize `value` as pretty JSON and write it
pub async fn write_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    write_text(path, &content).await
}

pub async fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let content = read_text(path).await?;
    Ok(serde_json::from_str(&content)?)
}

/// Check if a path exists
pub async fn exists(path: impl AsRef<Path>) -> bool {
    fs::metadata(path.as_ref()).await.is_ok()
}

/// List regular files in a directory, sorted by name.
///
/// A missing directory yields an empty list.
pub async fn list_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    list_entries(dir.as_ref(), true).await
}

/// List subdirectories of a directory, sorted by name
pub async fn list_dirs(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    list_entries(dir.as_ref(), false).await
}

async fn list_entries(dir: &Path, want_files: bool) -> Result<Vec<PathBuf>> {
    if !exists(dir).await {
        return Ok(Vec::new());
    }

    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| GhostwriterError::io(dir, e))?;

    let mut found = Vec::new();

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| GhostwriterError::io(dir, e))?
    {
        if let Ok(file_type) = entry.file_type().await {
            if file_type.is_file() == want_files && (want_files || file_type.is_dir()) {
                found.push(entry.path());
            }
        }
    }

    found.sort();
    Ok(found)
}
