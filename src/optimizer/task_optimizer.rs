//! # Task Optimizer Module
//!
//! Worker per la compressione di un singolo asset.
//! Separato dall'orchestratore principale per maggiore modularità.
//!
//! Ogni asset produce un `AssetOutcome` tipizzato: compresso, saltato o
//! fallito con un codice `FailureReason`. Un fallimento non tocca mai il file
//! originale e non interrompe il batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    codec::Codec,
    config::Config,
    engine::{CompressionEngine, CompressionResult, Stage},
    error::{FailureReason, OptimizeError, Result},
    file_manager::{FileManager, ImageAsset},
    normalizer::TargetFormat,
};

/// What happened to one asset
#[derive(Debug, Clone)]
pub enum AssetOutcome {
    Compressed(CompressedAsset),
    Skipped { asset: ImageAsset },
    Failed {
        asset: ImageAsset,
        reason: FailureReason,
        message: String,
    },
}

impl AssetOutcome {
    pub fn asset(&self) -> &ImageAsset {
        match self {
            AssetOutcome::Compressed(c) => &c.asset,
            AssetOutcome::Skipped { asset } | AssetOutcome::Failed { asset, .. } => asset,
        }
    }
}

/// A successfully compressed asset
#[derive(Debug, Clone)]
pub struct CompressedAsset {
    pub asset: ImageAsset,
    pub output_path: PathBuf,
    pub stage: Stage,
    pub format: TargetFormat,
    pub quality: Option<u8>,
    pub scale: f32,
    pub width: u32,
    pub height: u32,
    pub final_size: u64,
    pub within_budget: bool,
    pub attempts: usize,
    /// The pre-rename path was deleted because the extension changed
    pub removed_stale: bool,
}

impl CompressedAsset {
    fn from_result(asset: &ImageAsset, result: &CompressionResult) -> Self {
        Self {
            asset: asset.clone(),
            output_path: result.output_path.clone(),
            stage: result.stage,
            format: result.format,
            quality: result.quality,
            scale: result.scale,
            width: result.width,
            height: result.height,
            final_size: result.final_size,
            within_budget: result.within_budget,
            attempts: result.attempts.len(),
            removed_stale: false,
        }
    }

    pub fn reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(self.asset.size, self.final_size)
    }
}

/// Worker for single-asset compression
pub struct TaskOptimizer<C> {
    engine: Arc<CompressionEngine<C>>,
    jpeg_quality: u8,
    dry_run: bool,
}

impl<C> TaskOptimizer<C>
where
    C: Codec + Send + Sync + 'static,
{
    pub fn new(config: &Config, codec: C) -> Self {
        Self {
            engine: Arc::new(CompressionEngine::new(config.budget(), codec)),
            jpeg_quality: config.jpeg_quality,
            dry_run: config.dry_run,
        }
    }

    /// Compress one asset and commit the result in place
    pub async fn process(&self, asset: &ImageAsset) -> AssetOutcome {
        if self.engine.budget().fits(asset.size) {
            info!(
                "Skipping {} (already small enough: {})",
                asset.file_name,
                FileManager::format_size(asset.size)
            );
            return AssetOutcome::Skipped { asset: asset.clone() };
        }

        info!("Processing {} ({})", asset.file_name, FileManager::format_size(asset.size));

        match self.compress_and_commit(asset).await {
            Ok(Some(compressed)) => {
                Self::report(&compressed);
                AssetOutcome::Compressed(compressed)
            }
            Ok(None) => AssetOutcome::Skipped { asset: asset.clone() },
            Err(e) => {
                let reason = e.reason();
                error!("Failed to compress {} [{}]: {}", asset.file_name, reason, e);
                AssetOutcome::Failed {
                    asset: asset.clone(),
                    reason,
                    message: e.to_string(),
                }
            }
        }
    }

    async fn compress_and_commit(&self, asset: &ImageAsset) -> Result<Option<CompressedAsset>> {
        let original = tokio::fs::read(&asset.path).await?;

        let engine = Arc::clone(&self.engine);
        let path = asset.path.clone();
        let quality = self.jpeg_quality;
        let result = tokio::task::spawn_blocking(move || engine.compress(&path, &original, quality))
            .await
            .map_err(|e| OptimizeError::Encode(format!("compression task aborted: {}", e)))??;

        if result.is_skipped() {
            // Shrunk on disk between scan and read
            debug!("{} fits the budget after re-read", asset.file_name);
            return Ok(None);
        }

        Self::check_output_free(&asset.path, &result.output_path)?;

        let mut compressed = CompressedAsset::from_result(asset, &result);
        if self.dry_run {
            debug!("Dry run: would write {} bytes to {}", result.final_size, result.output_path.display());
            return Ok(Some(compressed));
        }

        compressed.removed_stale = Self::commit(&asset.path, result).await?;
        Ok(Some(compressed))
    }

    /// A re-targeted output path must not belong to another file
    fn check_output_free(original: &Path, target: &Path) -> Result<()> {
        if target != original && target.exists() {
            return Err(OptimizeError::OutputCollision(target.to_path_buf()));
        }
        Ok(())
    }

    /// Atomically put the accepted bytes in place. Returns whether the
    /// superseded original path was removed.
    async fn commit(original: &Path, result: CompressionResult) -> Result<bool> {
        let target = result.output_path;
        let retargeted = target != original;

        // Re-checked here: the path may have been taken since the search started
        Self::check_output_free(original, &target)?;

        let bytes = result.bytes;
        let write_target = target.clone();
        tokio::task::spawn_blocking(move || FileManager::replace_atomically(&write_target, &bytes))
            .await
            .map_err(|e| OptimizeError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        if !retargeted {
            return Ok(false);
        }

        match tokio::fs::remove_file(original).await {
            Ok(()) => {
                debug!("Removed superseded {}", original.display());
                Ok(true)
            }
            Err(e) => {
                warn!(
                    "Wrote {} but could not remove superseded {}: {}",
                    target.display(),
                    original.display(),
                    e
                );
                Ok(false)
            }
        }
    }

    fn report(compressed: &CompressedAsset) {
        let size = FileManager::format_size(compressed.final_size);
        let reduction = compressed.reduction_percent();
        match compressed.stage {
            Stage::Quality => info!(
                "  Compressed to {} (quality: {}), {:.1}% smaller",
                size,
                compressed.quality.unwrap_or_default(),
                reduction
            ),
            Stage::Lossless => info!("  Compressed to {} (lossless PNG), {:.1}% smaller", size, reduction),
            Stage::Downscale => info!(
                "  Scaled to {}x{} ({:.0}%): {}, {:.1}% smaller",
                compressed.width,
                compressed.height,
                compressed.scale * 100.0,
                size,
                reduction
            ),
            Stage::Fallback => {
                if !compressed.within_budget {
                    warn!("  Could not reach target size for {}", compressed.asset.file_name);
                }
                info!(
                    "  Fallback to {}x{} at quality {}: final size {}",
                    compressed.width,
                    compressed.height,
                    compressed.quality.unwrap_or_default(),
                    size
                );
            }
            Stage::Skipped => {}
        }

        if compressed.output_path != compressed.asset.path {
            info!("  Saved as {}", compressed.output_path.display());
        }
    }
}
