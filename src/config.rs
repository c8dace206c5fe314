//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri di compressione
//! - Costruisce il `CompressionBudget` immutabile condiviso da tutti gli asset
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//!
//! ## Parametri di configurazione:
//! - `images_dir`: Directory degli asset (default: "images")
//! - `max_size_kb`: Budget in KB da 1024 byte (default: 200)
//! - `jpeg_quality`: Qualità JPEG richiesta (1-100, default: 85)
//! - `quality_ladder`: Livelli di qualità decrescenti (default: 75, 65, 55, 45)
//! - `scale_ladder`: Fattori di scala decrescenti (default: 0.8, 0.6, 0.5, 0.4)
//! - `fallback_quality` / `fallback_scale`: Ultimo tentativo incondizionato (30 / 0.3)
//! - `backup_dir_name`: Sottodirectory dello snapshot (default: "original_backup")
//! - `dry_run`: Simulazione senza modifiche (default: false)
//!
//! ## Esempio:
//! ```ignore
//! let config = Config {
//!     max_size_kb: 150,
//!     ..Default::default()
//! };
//! config.validate()?;
//! let budget = config.budget();
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::OptimizeError;

/// Configuration for a compression run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory containing the image assets
    pub images_dir: PathBuf,
    /// Byte ceiling per asset, in KB (1 KB = 1024 bytes)
    pub max_size_kb: u64,
    /// Requested baseline JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// Quality levels tried after the requested one, strictly descending
    pub quality_ladder: Vec<u8>,
    /// Scale factors tried once the quality ladder is exhausted, strictly descending
    pub scale_ladder: Vec<f32>,
    /// Quality of the unconditional last attempt
    pub fallback_quality: u8,
    /// Scale of the unconditional last attempt
    pub fallback_scale: f32,
    /// Name of the backup subdirectory inside `images_dir`
    pub backup_dir_name: String,
    /// Dry run - decide everything but don't touch the directory
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("images"),
            max_size_kb: 200,
            jpeg_quality: 85,
            quality_ladder: vec![75, 65, 55, 45],
            scale_ladder: vec![0.8, 0.6, 0.5, 0.4],
            fallback_quality: 30,
            fallback_scale: 0.3,
            backup_dir_name: "original_backup".to_string(),
            dry_run: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> std::result::Result<(), OptimizeError> {
        let invalid = |msg: &str| Err(OptimizeError::Validation(msg.to_string()));

        if self.max_size_kb == 0 {
            return invalid("Max size must be greater than 0 KB");
        }

        if !is_valid_quality(self.jpeg_quality) || !is_valid_quality(self.fallback_quality) {
            return invalid("JPEG quality must be between 1 and 100");
        }

        if self.quality_ladder.is_empty() || !self.quality_ladder.iter().all(|&q| is_valid_quality(q)) {
            return invalid("Quality ladder must hold values between 1 and 100");
        }
        if !self.quality_ladder.windows(2).all(|w| w[0] > w[1]) {
            return invalid("Quality ladder must be strictly descending");
        }

        if self.scale_ladder.is_empty() || !self.scale_ladder.iter().all(|&s| is_valid_scale(s)) {
            return invalid("Scale ladder must hold factors in (0, 1]");
        }
        if !self.scale_ladder.windows(2).all(|w| w[0] > w[1]) {
            return invalid("Scale ladder must be strictly descending");
        }
        if !is_valid_scale(self.fallback_scale) {
            return invalid("Fallback scale must be in (0, 1]");
        }

        if self.backup_dir_name.is_empty()
            || self.backup_dir_name.contains(['/', '\\'])
            || self.backup_dir_name == "."
            || self.backup_dir_name == ".."
        {
            return invalid("Backup directory name must be a plain directory name");
        }

        Ok(())
    }

    /// Byte ceiling derived from `max_size_kb`
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_kb.saturating_mul(1024)
    }

    /// Path of the backup snapshot directory
    pub fn backup_dir(&self) -> PathBuf {
        self.images_dir.join(&self.backup_dir_name)
    }

    /// Build the immutable budget shared by every asset in the run
    pub fn budget(&self) -> CompressionBudget {
        CompressionBudget {
            max_bytes: self.max_size_bytes(),
            quality_ladder: self.quality_ladder.clone(),
            scale_ladder: self.scale_ladder.clone(),
            fallback_quality: self.fallback_quality,
            fallback_scale: self.fallback_scale,
        }
    }

    /// Load configuration from file
    pub async fn from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

fn is_valid_quality(quality: u8) -> bool {
    (1..=100).contains(&quality)
}

fn is_valid_scale(scale: f32) -> bool {
    scale > 0.0 && scale <= 1.0
}

/// Byte budget and parameter ladders for the compression search.
///
/// Built once per run from [`Config::budget`] and only ever read afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionBudget {
    pub max_bytes: u64,
    pub quality_ladder: Vec<u8>,
    pub scale_ladder: Vec<f32>,
    pub fallback_quality: u8,
    pub fallback_scale: f32,
}

impl Default for CompressionBudget {
    fn default() -> Self {
        Config::default().budget()
    }
}

impl CompressionBudget {
    /// Whether an encoded size satisfies the ceiling
    pub fn fits(&self, size: u64) -> bool {
        size <= self.max_bytes
    }

    /// Quality levels for Strategy A: the requested quality first, then every
    /// configured level strictly below it.
    pub fn quality_levels(&self, requested: u8) -> Vec<u8> {
        std::iter::once(requested)
            .chain(self.quality_ladder.iter().copied().filter(|&q| q < requested))
            .collect()
    }

    /// Upper bound on encode attempts for one asset
    pub fn max_attempts(&self, requested: u8) -> usize {
        self.quality_levels(requested).len() + self.scale_ladder.len() + 1
    }
}
