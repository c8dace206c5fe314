//! # Optimizer Module
//!
//! Separa le responsabilità in sottomoduli:
//! - `batch_optimizer`: Orchestratore principale del batch
//! - `task_optimizer`: Worker per singoli asset (compressione + sostituzione atomica)

pub mod batch_optimizer;
pub mod task_optimizer;

pub use batch_optimizer::{BatchOptimizer, RunReport};
pub use task_optimizer::{AssetOutcome, CompressedAsset, TaskOptimizer};
