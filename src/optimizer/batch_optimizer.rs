//! # Batch Optimizer Main Orchestrator
//!
//! Orchestratore principale: scansiona la directory, processa gli asset in
//! ordine di dimensione decrescente, uno alla volta, e aggrega le statistiche.
//!
//! ## Flusso:
//! 1. Validazione configurazione e presenza della directory (prima di ogni modifica)
//! 2. Snapshot di backup una tantum (saltato in dry run)
//! 3. Scansione e ordinamento dei candidati
//! 4. Per ogni asset: skip, compressione + sostituzione atomica, o fallimento isolato
//! 5. Report finale con totali e percentuale risparmiata

use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::{
    backup::{BackupManager, BackupRecord},
    codec::{Codec, ImageCodec},
    config::Config,
    error::OptimizeError,
    file_manager::FileManager,
    optimizer::task_optimizer::{AssetOutcome, TaskOptimizer},
    progress::{ProgressManager, RunStatistics},
};

/// Everything a run produced
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub statistics: RunStatistics,
    pub outcomes: Vec<AssetOutcome>,
}

/// Sequential batch orchestrator
pub struct BatchOptimizer<C = ImageCodec> {
    config: Config,
    backup: BackupRecord,
    task_optimizer: TaskOptimizer<C>,
    show_progress: bool,
}

impl BatchOptimizer<ImageCodec> {
    /// Validate `config`, make sure the images directory exists and take the
    /// backup snapshot (a no-op if one already exists; skipped in dry run).
    pub async fn prepare(config: Config) -> Result<Self> {
        config.validate()?;

        if !config.images_dir.is_dir() {
            return Err(OptimizeError::DirectoryNotFound(config.images_dir.clone()).into());
        }

        let backup = if config.dry_run {
            BackupRecord::probe(&config.backup_dir())
        } else {
            BackupManager::ensure_backup(&config.images_dir, &config.backup_dir_name).await?
        };

        Ok(Self::new(config, backup, ImageCodec)?)
    }
}

impl<C> BatchOptimizer<C>
where
    C: Codec + Send + Sync + 'static,
{
    /// Build an orchestrator around an existing backup record.
    ///
    /// Refuses to run destructively unless the snapshot exists.
    pub fn new(config: Config, backup: BackupRecord, codec: C) -> std::result::Result<Self, OptimizeError> {
        config.validate()?;

        if !config.dry_run && !backup.exists {
            return Err(OptimizeError::Backup(format!(
                "refusing to modify {} without a backup snapshot at {}",
                config.images_dir.display(),
                backup.backup_dir.display()
            )));
        }

        let task_optimizer = TaskOptimizer::new(&config, codec);
        Ok(Self {
            config,
            backup,
            task_optimizer,
            show_progress: true,
        })
    }

    /// Disable the terminal progress bar
    pub fn without_progress_bar(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Run the batch over every candidate, largest first
    pub async fn run(&self) -> Result<RunReport> {
        let images_dir: &Path = &self.config.images_dir;
        let assets = FileManager::scan_images(images_dir)?;

        info!("Image directory: {}", images_dir.display());
        info!(
            "Found {} image files ({})",
            assets.len(),
            FileManager::format_size(assets.total_size())
        );
        info!("Target max size: {} KB", self.config.max_size_kb);
        info!(
            "At most {} encode attempts per image",
            self.config.budget().max_attempts(self.config.jpeg_quality)
        );
        if self.config.dry_run {
            info!("Dry run mode: No files will be modified");
        }

        let progress = if self.show_progress {
            ProgressManager::new(assets.len() as u64)
        } else {
            ProgressManager::hidden()
        };

        let mut report = RunReport {
            statistics: RunStatistics::new(),
            outcomes: Vec::with_capacity(assets.len()),
        };
        for asset in &assets {
            let outcome = self.task_optimizer.process(asset).await;

            let name = &outcome.asset().file_name;
            let message = match &outcome {
                AssetOutcome::Compressed(c) => {
                    report.statistics.add_processed(c.asset.size, c.final_size, !c.within_budget);
                    format!("[OK] {}: {:.1}% saved", name, c.reduction_percent())
                }
                AssetOutcome::Skipped { .. } => {
                    report.statistics.add_skipped();
                    format!("[SKIP] {}", name)
                }
                AssetOutcome::Failed { reason, .. } => {
                    report.statistics.add_failed();
                    format!("[ERROR] {}: {}", name, reason)
                }
            };
            progress.update(&message);
            report.outcomes.push(outcome);
        }

        progress.finish(&report.statistics.format_summary());
        self.print_final_stats(&report.statistics);

        Ok(report)
    }

    fn print_final_stats(&self, stats: &RunStatistics) {
        if stats.processed == 0 {
            info!("No files needed compression (skipped: {}, errors: {})", stats.skipped, stats.failed);
        } else {
            info!("=== Optimization Complete ===");
            info!("Files processed: {}", stats.processed);
            info!("Original total size: {}", FileManager::format_size(stats.original_bytes));
            info!("Compressed total size: {}", FileManager::format_size(stats.final_bytes));
            info!("Total reduction: {:.1}%", stats.percent_saved());
            info!("Space saved: {}", FileManager::format_size(stats.bytes_saved()));
            info!("Files skipped: {}", stats.skipped);
            info!("Errors: {}", stats.failed);
            if stats.fallback_used > 0 {
                info!("Files still above target after fallback: {}", stats.fallback_used);
            }
        }

        if self.backup.exists {
            info!(
                "Originals are backed up in {} - restore from there if the result is not satisfactory",
                self.backup.backup_dir.display()
            );
        }
    }
}
