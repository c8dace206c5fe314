//! # Web Image Shrinker - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Creazione della configurazione e avvio del batch
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (tutti opzionali: senza flag usa `images/` e 200 KB)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose, `RUST_LOG` se presente)
//! 3. Carica l'eventuale file di configurazione JSON e applica gli override
//! 4. Crea il backup una tantum e processa le immagini
//!
//! ## Esempio di utilizzo:
//! ```bash
//! image-shrinker                       # images/, 200 KB
//! image-shrinker site/images --max-size-kb 150 --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use web_image_shrinker::{BatchOptimizer, Config};

#[derive(Parser)]
#[command(name = "image-shrinker")]
#[command(about = "Shrink website images below a byte budget, keeping a one-time backup of the originals")]
struct Args {
    /// Directory containing the images (default: images)
    images_directory: Option<PathBuf>,

    /// Target maximum size per image, in KB
    #[arg(short, long)]
    max_size_kb: Option<u64>,

    /// Baseline JPEG quality (1-100)
    #[arg(short, long)]
    quality: Option<u8>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dry run - don't create the backup or replace files
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match args.config {
        Some(ref path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    if let Some(dir) = args.images_directory {
        config.images_dir = dir;
    }
    if let Some(max_size_kb) = args.max_size_kb {
        config.max_size_kb = max_size_kb;
    }
    if let Some(quality) = args.quality {
        config.jpeg_quality = quality;
    }
    config.dry_run |= args.dry_run;

    info!("=== Web Image Shrinker ===");

    let optimizer = BatchOptimizer::prepare(config).await?;
    optimizer.run().await?;

    Ok(())
}
