//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche del run.
//!
//! ## Componenti principali:
//! - `ProgressManager`: Progress bar `indicatif` sulla lista dei candidati
//! - `RunStatistics`: Statistiche cumulative, lette una volta a fine run
//!
//! ## Statistiche tracciate:
//! - **processed**: File compressi e sostituiti con successo
//! - **skipped**: File già entro il budget
//! - **failed**: File lasciati intatti per errore
//! - **fallback_used**: File accettati dal fallback oltre il budget
//! - **original_bytes** / **final_bytes**: Somme sui soli file processati
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:04] [========================================] 12/12 (100%) [OK] hero.jpg: 71.3% saved
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::file_manager::FileManager;

/// Manages progress reporting for a compression run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Progress manager that draws nothing (tests, dry pipelines)
    pub fn hidden() -> Self {
        Self { bar: ProgressBar::hidden() }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Totals accumulated over one run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunStatistics {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub fallback_used: usize,
    pub original_bytes: u64,
    pub final_bytes: u64,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_processed(&mut self, original_size: u64, final_size: u64, used_fallback: bool) {
        self.processed += 1;
        self.original_bytes += original_size;
        self.final_bytes += final_size;
        if used_fallback {
            self.fallback_used += 1;
        }
    }

    pub fn add_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn add_failed(&mut self) {
        self.failed += 1;
    }

    pub fn bytes_saved(&self) -> u64 {
        self.original_bytes.saturating_sub(self.final_bytes)
    }

    pub fn percent_saved(&self) -> f64 {
        FileManager::calculate_reduction(self.original_bytes, self.final_bytes)
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} | Skipped: {} | Errors: {} | Saved: {} ({:.1}%)",
            self.processed,
            self.skipped,
            self.failed,
            FileManager::format_size(self.bytes_saved()),
            self.percent_saved()
        )
    }
}
