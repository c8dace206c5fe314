//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `OptimizeError` enum per categorizzare tutti gli errori possibili
//! - Definisce `FailureReason`, il codice tipizzato dei fallimenti per-asset
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `DirectoryNotFound`: Directory immagini assente (fatale, prima di ogni modifica)
//! - `UnreadableImage`: Immagine corrotta o illeggibile (per-asset, il run continua)
//! - `Encode`: Encoder fallito (per-asset)
//! - `OutputCollision`: Il path ri-targettato `.jpg` appartiene già a un altro file
//! - `Backup`: Snapshot degli originali non creabile (fatale)
//! - `Io`: Errori di I/O
//! - `Validation`: Errori di validazione configurazione
//!
//! ## Esempio:
//! ```ignore
//! if !dir.is_dir() {
//!     return Err(OptimizeError::DirectoryNotFound(dir.to_path_buf()));
//! }
//! ```

use std::fmt;
use std::path::PathBuf;

/// Custom error types for image compression
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Unreadable or corrupt image: {0}")]
    UnreadableImage(String),

    #[error("Encode failure: {0}")]
    Encode(String),

    #[error("Output path already taken by another file: {}", .0.display())]
    OutputCollision(PathBuf),

    #[error("Backup error: {0}")]
    Backup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

impl OptimizeError {
    /// Reason code recorded when this error aborts a single asset
    pub fn reason(&self) -> FailureReason {
        match self {
            OptimizeError::UnreadableImage(_) => FailureReason::UnreadableImage,
            OptimizeError::Encode(_) => FailureReason::EncodeFailure,
            OptimizeError::OutputCollision(_) => FailureReason::OutputCollision,
            _ => FailureReason::Io,
        }
    }
}

/// Per-asset failure reason code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    UnreadableImage,
    EncodeFailure,
    OutputCollision,
    Io,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            FailureReason::UnreadableImage => "unreadable-image",
            FailureReason::EncodeFailure => "encode-failure",
            FailureReason::OutputCollision => "output-collision",
            FailureReason::Io => "io",
        };
        f.write_str(code)
    }
}

pub type Result<T> = std::result::Result<T, OptimizeError>;
