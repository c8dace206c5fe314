//! # File Management Module
//!
//! Questo modulo gestisce tutte le operazioni sui file e la discovery delle immagini.
//!
//! ## Responsabilità:
//! - Scansione (non ricorsiva) della directory immagini
//! - Ordinamento per dimensione decrescente: i file più grandi per primi
//! - Determinazione formato file (candidati alla compressione vs backup)
//! - Sostituzione atomica: file temporaneo, verifica, rename
//! - Utilità per calcoli dimensioni e percentuali
//!
//! ## Formati:
//! - **Compressione**: PNG, JPG, JPEG, GIF, BMP
//! - **Backup**: gli stessi più WebP
//!
//! ## Sicurezza operazioni:
//! - Il file temporaneo vive nella stessa directory del target (rename atomico)
//! - Prima del rename il contenuto scritto viene riletto e confrontato via SHA-256
//! - In caso di errore il temporaneo viene eliminato e l'originale resta intatto
//!
//! ## Esempio:
//! ```ignore
//! let assets = FileManager::scan_images(Path::new("images"))?;
//! for asset in assets.iter() {
//!     println!("{} ({})", asset.file_name, FileManager::format_size(asset.size));
//! }
//! ```

use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{OptimizeError, Result};

const COMPRESSIBLE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];
const BACKUP_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// An image found by the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub path: PathBuf,
    pub file_name: String,
    /// On-disk size at scan time
    pub size: u64,
    /// Lowercased original extension
    pub extension: String,
}

/// Candidate assets, largest first
#[derive(Debug, Clone, Default)]
pub struct AssetScan {
    assets: Vec<ImageAsset>,
}

impl AssetScan {
    /// Iterate from the start; can be called any number of times
    pub fn iter(&self) -> std::slice::Iter<'_, ImageAsset> {
        self.assets.iter()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.assets.iter().map(|a| a.size).sum()
    }
}

impl<'a> IntoIterator for &'a AssetScan {
    type Item = &'a ImageAsset;
    type IntoIter = std::slice::Iter<'a, ImageAsset>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// List the compressible images directly inside `dir`, sorted by
    /// descending size (ties by name).
    pub fn scan_images(dir: &Path) -> Result<AssetScan> {
        if !dir.is_dir() {
            return Err(OptimizeError::DirectoryNotFound(dir.to_path_buf()));
        }

        let mut assets = Vec::new();
        for entry in Self::top_level_files(dir) {
            let path = entry.path();
            if !Self::is_compressible(path) {
                continue;
            }

            let size = entry.metadata().map_err(std::io::Error::from)?.len();

            assets.push(ImageAsset {
                path: path.to_path_buf(),
                file_name: entry.file_name().to_string_lossy().into_owned(),
                size,
                extension: crate::normalizer::lowercase_extension(path).unwrap_or_default(),
            });
        }

        assets.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.file_name.cmp(&b.file_name)));
        debug!("Scanned {}: {} candidate images", dir.display(), assets.len());

        Ok(AssetScan { assets })
    }

    /// Regular files directly inside `dir`. Symlinks count by their
    /// target; dangling ones are ignored.
    pub fn top_level_files(dir: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
        WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
    }

    /// Check if a file is a compression candidate
    pub fn is_compressible(path: &Path) -> bool {
        Self::has_extension_in(path, COMPRESSIBLE_EXTENSIONS)
    }

    /// Check if a file belongs in the backup snapshot
    pub fn is_backup_candidate(path: &Path) -> bool {
        Self::has_extension_in(path, BACKUP_EXTENSIONS)
    }

    fn has_extension_in(path: &Path, extensions: &[&str]) -> bool {
        crate::normalizer::lowercase_extension(path)
            .map(|ext| extensions.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    /// Write `bytes` to `target` through a verified temporary sibling.
    ///
    /// The temporary file is created next to `target` so the final rename
    /// stays on one filesystem. It is removed on every error path.
    pub fn replace_atomically(target: &Path, bytes: &[u8]) -> Result<()> {
        let dir = target.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let mut temp = tempfile::Builder::new()
            .prefix(".shrink-")
            .suffix(".temp")
            .tempfile_in(dir)?;

        temp.write_all(bytes)?;
        temp.flush()?;
        temp.as_file().sync_all()?;

        let expected = Sha256::digest(bytes);
        let written = Sha256::digest(fs::read(temp.path())?);
        if written != expected {
            return Err(OptimizeError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("temporary file {} does not match encoded output", temp.path().display()),
            )));
        }
        debug!("Verified {} ({} bytes, sha256 {})", temp.path().display(), bytes.len(), hex::encode(&written[..8]));

        temp.persist(target).map_err(|e| OptimizeError::Io(e.error))?;
        Ok(())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.1} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, len: usize) {
        fs::write(dir.join(name), vec![0u8; len]).unwrap();
    }

    #[test]
    fn test_scan_filters_and_sorts_largest_first() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        write(dir, "small.png", 10);
        write(dir, "big.JPG", 300);
        write(dir, "mid.bmp", 200);
        write(dir, "anim.gif", 200);
        write(dir, "modern.webp", 900);
        write(dir, "notes.txt", 5000);
        fs::create_dir(dir.join("original_backup")).unwrap();
        write(&dir.join("original_backup"), "huge.jpg", 10_000);

        let scan = FileManager::scan_images(dir).unwrap();
        let names: Vec<&str> = scan.iter().map(|a| a.file_name.as_str()).collect();

        assert_eq!(names, vec!["big.JPG", "anim.gif", "mid.bmp", "small.png"]);
        assert_eq!(scan.total_size(), 710);
        assert_eq!(scan.iter().next().map(|a| a.extension.as_str()), Some("jpg"));

        // Restartable
        assert_eq!(scan.iter().count(), scan.len());
        assert_eq!((&scan).into_iter().count(), 4);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_follows_symlinked_images() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let shared = TempDir::new().unwrap();
        write(shared.path(), "logo.png", 120);
        std::os::unix::fs::symlink(shared.path().join("logo.png"), dir.join("logo.png")).unwrap();
        std::os::unix::fs::symlink(dir.join("gone.jpg"), dir.join("dangling.jpg")).unwrap();
        std::os::unix::fs::symlink(shared.path(), dir.join("linked_dir.jpg")).unwrap();

        let scan = FileManager::scan_images(dir).unwrap();
        let names: Vec<&str> = scan.iter().map(|a| a.file_name.as_str()).collect();

        assert_eq!(names, vec!["logo.png"]);
        assert_eq!(scan.total_size(), 120);
    }

    #[test]
    fn test_scan_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let err = FileManager::scan_images(&temp_dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, OptimizeError::DirectoryNotFound(_)));
    }

    #[test]
    fn test_format_detection() {
        assert!(FileManager::is_compressible(Path::new("a.JPEG")));
        assert!(!FileManager::is_compressible(Path::new("a.webp")));
        assert!(FileManager::is_backup_candidate(Path::new("a.webp")));
        assert!(!FileManager::is_backup_candidate(Path::new("README")));
    }

    #[test]
    fn test_replace_atomically() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("photo.jpg");
        fs::write(&target, b"old contents").unwrap();

        FileManager::replace_atomically(&target, b"new contents").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new contents");
        let leftovers: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(200 * 1024), "200.0 KB");
        assert_eq!(FileManager::format_size(3 * 1024 * 1024 / 2), "1.5 MB");
    }

    #[test]
    fn test_calculate_reduction() {
        assert_eq!(FileManager::calculate_reduction(0, 10), 0.0);
        assert_eq!(FileManager::calculate_reduction(400, 100), 75.0);
    }
}
