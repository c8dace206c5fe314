//! # Backup Management Module
//!
//! Snapshot unico e non versionato degli originali, preso prima di qualsiasi
//! modifica distruttiva.
//!
//! ## Regole:
//! - Se `images/original_backup/` non esiste viene creato e riempito con tutte
//!   le immagini riconosciute (PNG, JPG, JPEG, GIF, BMP, WebP), preservando
//!   permessi e timestamp
//! - Se esiste già, l'operazione è un no-op: i run successivi non catturano
//!   mai una seconda generazione di originali
//! - Lo snapshot viene costruito in una directory temporanea e rinominato solo
//!   a copia completata, così un run interrotto non lascia un backup parziale
//!
//! ## Esempio:
//! ```ignore
//! let record = BackupManager::ensure_backup(Path::new("images"), "original_backup").await?;
//! let optimizer = BatchOptimizer::new(config, record)?;
//! ```

use std::fs::{File, FileTimes};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{OptimizeError, Result};
use crate::file_manager::FileManager;

/// Whether a snapshot of the originals exists for a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub backup_dir: PathBuf,
    pub exists: bool,
    /// The snapshot was taken by this run
    pub created_now: bool,
    /// Files copied by this run
    pub files_copied: usize,
}

impl BackupRecord {
    /// Inspect the backup directory without touching anything
    pub fn probe(backup_dir: &Path) -> Self {
        Self {
            backup_dir: backup_dir.to_path_buf(),
            exists: backup_dir.is_dir(),
            created_now: false,
            files_copied: 0,
        }
    }
}

/// Creates the one-time snapshot of original assets
pub struct BackupManager;

impl BackupManager {
    /// Snapshot every recognized image of `images_dir` into
    /// `images_dir/<backup_dir_name>` unless that directory already exists.
    pub async fn ensure_backup(images_dir: &Path, backup_dir_name: &str) -> Result<BackupRecord> {
        if !images_dir.is_dir() {
            return Err(OptimizeError::DirectoryNotFound(images_dir.to_path_buf()));
        }

        let backup_dir = images_dir.join(backup_dir_name);
        let record = BackupRecord::probe(&backup_dir);
        if record.exists {
            info!("Backup directory already exists, skipping backup: {}", backup_dir.display());
            return Ok(record);
        }
        if backup_dir.exists() {
            return Err(OptimizeError::Backup(format!(
                "{} exists but is not a directory",
                backup_dir.display()
            )));
        }

        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}-", backup_dir_name))
            .tempdir_in(images_dir)
            .map_err(|e| OptimizeError::Backup(format!("cannot create staging directory: {}", e)))?;

        let mut files_copied = 0;
        for entry in FileManager::top_level_files(images_dir) {
            let src = entry.path();
            if !FileManager::is_backup_candidate(src) {
                continue;
            }

            let dst = staging.path().join(entry.file_name());
            fs::copy(src, &dst)
                .await
                .map_err(|e| OptimizeError::Backup(format!("copy {} failed: {}", src.display(), e)))?;
            Self::preserve_times(src, &dst)?;
            debug!("Backed up {}", src.display());
            files_copied += 1;
        }

        fs::rename(staging.path(), &backup_dir)
            .await
            .map_err(|e| OptimizeError::Backup(format!("cannot finalize {}: {}", backup_dir.display(), e)))?;

        info!("Created backup directory {} ({} images)", backup_dir.display(), files_copied);

        Ok(BackupRecord {
            backup_dir,
            exists: true,
            created_now: true,
            files_copied,
        })
    }

    /// Carry access and modification times over to the copy
    fn preserve_times(src: &Path, dst: &Path) -> Result<()> {
        let metadata = std::fs::metadata(src)?;
        let mut times = FileTimes::new();
        if let Ok(accessed) = metadata.accessed() {
            times = times.set_accessed(accessed);
        }
        if let Ok(modified) = metadata.modified() {
            times = times.set_modified(modified);
        }
        File::options().write(true).open(dst)?.set_times(times)?;
        Ok(())
    }
}
