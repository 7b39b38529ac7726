use crate::error::{ArchiveReadError, Result};
use auditmap_protocol::EvidenceFileEntry;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// A file the walk saw but could not inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexWarning {
    pub path: String,
    pub message: String,
}

/// Flat inventory of an extracted evidence tree
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveIndex {
    pub entries: Vec<EvidenceFileEntry>,
    pub warnings: Vec<IndexWarning>,
}

/// Walks an already-extracted evidence directory
pub struct ArchiveIndexer {
    root: PathBuf,
}

impl ArchiveIndexer {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Inventory every regular file below the root, at any depth, in file-name order.
    ///
    /// Hidden files and nested extractions are included. Entries that cannot
    /// be stat'ed are reported in [`ArchiveIndex::warnings`] instead of failing
    /// the walk; only an unusable root is fatal.
    pub fn index(&self) -> Result<ArchiveIndex> {
        if !self.root.exists() {
            return Err(ArchiveReadError::MissingRoot(self.root.display().to_string()));
        }
        if !self.root.is_dir() {
            return Err(ArchiveReadError::NotADirectory(
                self.root.display().to_string(),
            ));
        }

        let mut index = ArchiveIndex::default();

        for result in WalkDir::new(&self.root)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
        {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    log::warn!("Failed to read entry {path}: {e}");
                    index.warnings.push(IndexWarning {
                        path,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            // Symlinks are resolved so a dangling link surfaces as a warning.
            let meta = if entry.path_is_symlink() {
                std::fs::metadata(path)
            } else {
                entry.metadata().map_err(std::io::Error::from)
            };
            match meta {
                Ok(meta) if meta.is_file() => {}
                Ok(_) => {
                    log::debug!("Skipping non-regular entry {}", path.display());
                    continue;
                }
                Err(e) => {
                    log::warn!("Skipping unreadable file {}: {e}", path.display());
                    index.warnings.push(IndexWarning {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    });
                    continue;
                }
            }

            match Self::entry_for(&self.root, path) {
                Some(file) => index.entries.push(file),
                None => {
                    log::warn!("Skipping entry outside root {}", path.display());
                    index.warnings.push(IndexWarning {
                        path: path.display().to_string(),
                        message: "path is not below the archive root".to_string(),
                    });
                }
            }
        }

        log::info!(
            "Indexed {} evidence files ({} skipped)",
            index.entries.len(),
            index.warnings.len()
        );
        Ok(index)
    }

    fn entry_for(root: &Path, path: &Path) -> Option<EvidenceFileEntry> {
        let relative = path.strip_prefix(root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        let (filename, dirs) = parts.split_last()?;
        let containing_folder = dirs.last().cloned().unwrap_or_default();

        Some(EvidenceFileEntry {
            filename: filename.clone(),
            relative_path: parts.join("/"),
            containing_folder,
        })
    }
}
