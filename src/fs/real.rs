use super::{DirEntry, EntryKind, FileSystem};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// FileSystem backed by `std::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl RealFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("Failed to read file {}", path.display()))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let entries = fs::read_dir(path)
            .with_context(|| format!("Failed to read directory {}", path.display()))?;

        let mut result = Vec::new();
        for entry in entries {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            let kind = if path.is_dir() {
                EntryKind::Directory
            } else if path.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };

            result.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                path,
                kind,
            });
        }

        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }
}
