//! Asset staging
//!
//! Copies bundled model and grammar files into a writable directory before
//! any engine is created. The source directory carries an `assets.lst` file
//! listing every asset by relative path. Files whose SHA256 already matches
//! are left alone, and files staged by a previous run that are no longer
//! listed are removed.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

/// Name of the asset list in both source and staging directories
pub const ASSET_LIST: &str = "assets.lst";

/// Asset staging errors
#[derive(Debug, thiserror::Error)]
pub enum AssetSyncError {
    #[error("Failed to read asset list {path}: {source}")]
    ReadList {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Listed asset not found: {0}")]
    MissingAsset(PathBuf),

    #[error("Invalid asset path in list: {0}")]
    InvalidPath(String),

    #[error("Failed to stage {path}: {source}")]
    Copy {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Asset staging I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a staging run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Writable root containing the staged assets
    pub root: PathBuf,
    pub copied: usize,
    pub unchanged: usize,
    pub removed: usize,
}

/// Synchronise the assets listed in `source` into `dest`
pub fn sync_assets(source: &Path, dest: &Path) -> Result<SyncReport, AssetSyncError> {
    let entries = read_asset_list(&source.join(ASSET_LIST))?;
    fs::create_dir_all(dest)?;

    let mut report = SyncReport {
        root: dest.to_path_buf(),
        copied: 0,
        unchanged: 0,
        removed: 0,
    };

    for entry in &entries {
        let from = source.join(entry);
        if !from.is_file() {
            return Err(AssetSyncError::MissingAsset(from));
        }

        let to = dest.join(entry);
        if to.is_file() && sha256_file(&to)? == sha256_file(&from)? {
            report.unchanged += 1;
            continue;
        }

        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&from, &to).map_err(|source| AssetSyncError::Copy {
            path: to.clone(),
            source,
        })?;
        tracing::debug!("Staged asset {}", entry.display());
        report.copied += 1;
    }

    // Drop assets staged by a previous run that are no longer listed
    let previous_list = dest.join(ASSET_LIST);
    if previous_list.is_file() {
        let current: HashSet<&PathBuf> = entries.iter().collect();
        for old in read_asset_list(&previous_list)? {
            if current.contains(&old) {
                continue;
            }
            let path = dest.join(&old);
            if path.is_file() {
                fs::remove_file(&path)?;
                tracing::debug!("Removed stale asset {}", old.display());
                report.removed += 1;
            }
        }
    }

    fs::copy(source.join(ASSET_LIST), &previous_list).map_err(|source| AssetSyncError::Copy {
        path: previous_list.clone(),
        source,
    })?;

    tracing::info!(
        "Assets synchronised to {} ({} copied, {} unchanged, {} removed)",
        dest.display(),
        report.copied,
        report.unchanged,
        report.removed
    );
    Ok(report)
}

/// Parse an asset list: one relative path per line, `#` starts a comment
fn read_asset_list(path: &Path) -> Result<Vec<PathBuf>, AssetSyncError> {
    let contents = fs::read_to_string(path).map_err(|source| AssetSyncError::ReadList {
        path: path.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let entry = PathBuf::from(line);
        let escapes = entry
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(AssetSyncError::InvalidPath(line.to_string()));
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// Hex SHA256 of a file
fn sha256_file(path: &Path) -> Result<String, AssetSyncError> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
