//! # Codec Module
//!
//! Interfaccia verso la libreria di codec: decode, encode JPEG con qualità,
//! encode PNG lossless ottimizzato, resize con filtro di alta qualità.
//!
//! Tutto avviene in memoria: il motore di compressione valuta i candidati
//! come buffer di byte e solo quello accettato arriva su disco.
//!
//! ## Encoder:
//! - JPEG: `jpeg-encoder` con tabelle di Huffman ottimizzate per ogni immagine
//! - PNG: `PngEncoder` a compressione massima, poi `oxipng` sul risultato

use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::io::Reader as ImageReader;
use image::{DynamicImage, ImageEncoder};
use jpeg_encoder::{ColorType as JpegColor, Encoder as JpegEncoder};
use std::io::Cursor;
use tracing::debug;

use crate::error::{OptimizeError, Result};

/// Decode/encode/resize primitives the compression engine relies on
pub trait Codec {
    /// Decode an encoded file into a pixel buffer
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage>;

    /// Encode as JPEG at the given quality
    fn encode_jpeg(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>>;

    /// Encode as PNG with lossless optimization
    fn encode_png_optimized(&self, image: &DynamicImage) -> Result<Vec<u8>>;

    /// Resample to exactly `width` x `height`
    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage;
}

/// [`Codec`] backed by the `image` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCodec;

impl Codec for ImageCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| OptimizeError::UnreadableImage(e.to_string()))?
            .decode()
            .map_err(|e| OptimizeError::UnreadableImage(e.to_string()))
    }

    fn encode_jpeg(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        encode_jpeg_with(image, quality, true)
    }

    fn encode_png_optimized(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        let encoded = encode_png_plain(image)?;

        match oxipng::optimize_from_memory(&encoded, &oxipng::Options::default()) {
            Ok(optimized) if optimized.len() < encoded.len() => Ok(optimized),
            Ok(_) => Ok(encoded),
            Err(e) => {
                debug!("oxipng pass skipped: {}", e);
                Ok(encoded)
            }
        }
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width, height, FilterType::Lanczos3)
    }
}

/// Baseline JPEG, optionally with per-image Huffman tables
fn encode_jpeg_with(image: &DynamicImage, quality: u8, optimize_huffman: bool) -> Result<Vec<u8>> {
    let encode_error = |e: String| OptimizeError::Encode(format!("JPEG (quality {}): {}", quality, e));

    let width = u16::try_from(image.width()).map_err(|_| encode_error(format!("width {} too large", image.width())))?;
    let height =
        u16::try_from(image.height()).map_err(|_| encode_error(format!("height {} too large", image.height())))?;

    // Only 8-bit luma or RGB goes in
    let (pixels, color) = match image {
        DynamicImage::ImageLuma8(gray) => (gray.as_raw().clone(), JpegColor::Luma),
        DynamicImage::ImageRgb8(rgb) => (rgb.as_raw().clone(), JpegColor::Rgb),
        other => (other.to_rgb8().into_raw(), JpegColor::Rgb),
    };

    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new(&mut out, quality);
    encoder.set_optimized_huffman_tables(optimize_huffman);
    encoder
        .encode(&pixels, width, height, color)
        .map_err(|e| encode_error(e.to_string()))?;
    Ok(out)
}

fn encode_png_plain(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, CompressionType::Best, PngFilter::Adaptive)
        .write_image(image.as_bytes(), image.width(), image.height(), image.color())
        .map_err(|e| OptimizeError::Encode(format!("PNG: {}", e)))?;
    Ok(out)
}
