//! # Web Image Shrinker Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Riduce gli asset raster di un sito statico sotto un tetto in byte
//! - Conserva una copia di backup unica e non versionata degli originali
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione, validazione e `CompressionBudget`
//! - `error`: Tipi di errore custom e codici di fallimento per-asset
//! - `file_manager`: Scansione della directory e sostituzione atomica
//! - `backup`: Snapshot una tantum degli originali
//! - `codec`: Primitive decode/encode/resize sopra la crate `image`
//! - `normalizer`: Rimozione dell'alpha e scelta del codec
//! - `engine`: Ricerca a ladder su qualità e scala
//! - `optimizer`: Orchestratore del batch
//! - `progress`: Progress bar e statistiche
//!
//! ## Utilizzo:
//! ```ignore
//! use web_image_shrinker::{BatchOptimizer, Config};
//!
//! let optimizer = BatchOptimizer::prepare(Config::default()).await?;
//! let report = optimizer.run().await?;
//! println!("{}", report.statistics.format_summary());
//! ```

pub mod backup;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod file_manager;
pub mod normalizer;
pub mod optimizer;
pub mod progress;

pub use backup::{BackupManager, BackupRecord};
pub use config::{CompressionBudget, Config};
pub use engine::{CompressionEngine, CompressionResult};
pub use error::{FailureReason, OptimizeError};
pub use file_manager::{FileManager, ImageAsset};
pub use optimizer::{AssetOutcome, BatchOptimizer, RunReport};
pub use progress::RunStatistics;
