//! # Format Normalizer Module
//!
//! Prepara il buffer di pixel e sceglie il codec di destinazione.
//!
//! ## Regole:
//! - Modalità con alpha (RGBA, luminanza+alpha): composizione su canvas bianco
//!   opaco delle stesse dimensioni, usando l'alpha come maschera
//! - `.jpg` / `.jpeg` → encoder JPEG
//! - `.png` → encoder PNG
//! - Qualsiasi altra estensione riconosciuta → encoder JPEG, e il path logico
//!   di output diventa `.jpg`

use image::{DynamicImage, Rgb, RgbImage};
use std::path::{Path, PathBuf};

/// Encoder family selected for an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Jpeg,
    Png,
}

impl TargetFormat {
    /// Pick the encoder from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Self {
        match lowercase_extension(path).as_deref() {
            Some("png") => TargetFormat::Png,
            _ => TargetFormat::Jpeg,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "JPEG",
            TargetFormat::Png => "PNG",
        }
    }
}

/// Lowercased file extension, if any
pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Whether the extension already names a JPEG file
pub fn has_jpeg_extension(path: &Path) -> bool {
    matches!(lowercase_extension(path).as_deref(), Some("jpg") | Some("jpeg"))
}

/// Logical output path for an asset whose accepted candidate is `format`.
///
/// JPEG output keeps a `.jpg`/`.jpeg` name as-is and rewrites anything else
/// to `.jpg`; PNG output keeps the original path.
pub fn output_path_for(path: &Path, format: TargetFormat) -> PathBuf {
    match format {
        TargetFormat::Jpeg if !has_jpeg_extension(path) => path.with_extension("jpg"),
        _ => path.to_path_buf(),
    }
}

/// Flatten any alpha channel onto an opaque white background.
///
/// Buffers without alpha are returned untouched.
pub fn flatten_alpha(image: DynamicImage) -> DynamicImage {
    if !image.color().has_alpha() {
        return image;
    }

    let rgba = image.to_rgba8();
    let flattened = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        Rgb([blend_on_white(r, a), blend_on_white(g, a), blend_on_white(b, a)])
    });

    DynamicImage::ImageRgb8(flattened)
}

fn blend_on_white(channel: u8, alpha: u8) -> u8 {
    let alpha = alpha as u32;
    let value = (channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255;
    value as u8
}
