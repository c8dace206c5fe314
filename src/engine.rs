//! # Compression Strategy Engine
//!
//! Il cuore dell'applicazione: dato un'immagine e un budget in byte, cerca
//! in uno spazio ordinato di parametri di encoding finché un candidato non
//! rientra nel budget, con un fallback che garantisce la terminazione.
//!
//! ## Pipeline
//!
//! 1. **Skip**: se l'originale è già ≤ budget, i byte vengono restituiti
//!    identici, senza alcun encode
//! 2. **Strategy A** (qualità): JPEG a qualità `[richiesta, 75, 65, 55, 45]`;
//!    per PNG un solo tentativo lossless ottimizzato
//! 3. **Strategy B** (downscale): scale `[0.8, 0.6, 0.5, 0.4]` sulle dimensioni
//!    originali, ricodificate JPEG alla qualità richiesta
//! 4. **Fallback**: scala 0.3 e qualità 30, accettato comunque
//!
//! Con i ladder di default il caso peggiore è 5 + 4 + 1 = 10 encode.
//! I livelli di qualità sono sempre esauriti prima di provare una scala,
//! e nessun valore viene ritentato.

use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::codec::Codec;
use crate::config::CompressionBudget;
use crate::error::Result;
use crate::normalizer::{self, TargetFormat};

/// Which step of the search produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Original already within budget, bytes passed through
    Skipped,
    /// Strategy A, JPEG quality ladder
    Quality,
    /// Strategy A, single lossless PNG attempt
    Lossless,
    /// Strategy B, scale ladder
    Downscale,
    /// Unconditional last attempt
    Fallback,
}

/// One encode performed during the search
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub stage: Stage,
    pub format: TargetFormat,
    pub quality: Option<u8>,
    pub scale: f32,
    pub size: u64,
}

/// Outcome of compressing a single asset
#[derive(Debug, Clone)]
pub struct CompressionResult {
    /// Accepted candidate satisfies the budget
    pub within_budget: bool,
    pub stage: Stage,
    pub format: TargetFormat,
    /// Chosen quality, `None` for pass-through and lossless PNG
    pub quality: Option<u8>,
    pub scale: f32,
    pub width: u32,
    pub height: u32,
    pub original_size: u64,
    pub final_size: u64,
    /// Where the accepted bytes belong; the extension may differ from the input
    pub output_path: PathBuf,
    pub bytes: Vec<u8>,
    /// Every encode in the order it happened
    pub attempts: Vec<Attempt>,
}

impl CompressionResult {
    pub fn is_skipped(&self) -> bool {
        self.stage == Stage::Skipped
    }

    pub fn reduction_percent(&self) -> f64 {
        crate::file_manager::FileManager::calculate_reduction(self.original_size, self.final_size)
    }
}

/// Bounded ladder search over quality and scale
#[derive(Debug, Clone)]
pub struct CompressionEngine<C> {
    budget: CompressionBudget,
    codec: C,
}

impl<C: Codec> CompressionEngine<C> {
    pub fn new(budget: CompressionBudget, codec: C) -> Self {
        Self { budget, codec }
    }

    pub fn budget(&self) -> &CompressionBudget {
        &self.budget
    }

    /// Compress `original` (the on-disk bytes of `path`) to fit the budget.
    ///
    /// Fails only when the bytes cannot be decoded or an encoder errors;
    /// exhausting both ladders is not a failure, the fallback is returned.
    pub fn compress(&self, path: &Path, original: &[u8], requested_quality: u8) -> Result<CompressionResult> {
        let original_size = original.len() as u64;

        if self.budget.fits(original_size) {
            debug!("{} already within budget ({} bytes), passing through", path.display(), original_size);
            return Ok(CompressionResult {
                within_budget: true,
                stage: Stage::Skipped,
                format: TargetFormat::from_path(path),
                quality: None,
                scale: 1.0,
                width: 0,
                height: 0,
                original_size,
                final_size: original_size,
                output_path: path.to_path_buf(),
                bytes: original.to_vec(),
                attempts: Vec::new(),
            });
        }

        let image = normalizer::flatten_alpha(self.codec.decode(original)?);
        let format = TargetFormat::from_path(path);
        let mut search = Search {
            engine: self,
            path,
            image: &image,
            original_size,
            attempts: Vec::new(),
        };

        // Strategy A
        match format {
            TargetFormat::Jpeg => {
                for quality in self.budget.quality_levels(requested_quality) {
                    let bytes = search.encode(Stage::Quality, TargetFormat::Jpeg, Some(quality), 1.0, None)?;
                    if self.budget.fits(bytes.len() as u64) {
                        return Ok(search.accept(Stage::Quality, TargetFormat::Jpeg, Some(quality), 1.0, &image, bytes));
                    }
                }
            }
            TargetFormat::Png => {
                let bytes = search.encode(Stage::Lossless, TargetFormat::Png, None, 1.0, None)?;
                if self.budget.fits(bytes.len() as u64) {
                    return Ok(search.accept(Stage::Lossless, TargetFormat::Png, None, 1.0, &image, bytes));
                }
            }
        }

        // Strategy B
        for &scale in &self.budget.scale_ladder {
            let resized = self.scaled(&image, scale);
            let bytes = search.encode(Stage::Downscale, TargetFormat::Jpeg, Some(requested_quality), scale, Some(&resized))?;
            if self.budget.fits(bytes.len() as u64) {
                return Ok(search.accept(Stage::Downscale, TargetFormat::Jpeg, Some(requested_quality), scale, &resized, bytes));
            }
        }

        // Fallback
        let (quality, scale) = (self.budget.fallback_quality, self.budget.fallback_scale);
        let resized = self.scaled(&image, scale);
        let bytes = search.encode(Stage::Fallback, TargetFormat::Jpeg, Some(quality), scale, Some(&resized))?;
        Ok(search.accept(Stage::Fallback, TargetFormat::Jpeg, Some(quality), scale, &resized, bytes))
    }

    fn scaled(&self, image: &DynamicImage, scale: f32) -> DynamicImage {
        let (width, height) = scaled_dimensions(image.width(), image.height(), scale);
        self.codec.resize(image, width, height)
    }
}

/// Dimensions after scaling, rounded to the nearest pixel and never zero
pub fn scaled_dimensions(width: u32, height: u32, scale: f32) -> (u32, u32) {
    let scale_one = |v: u32| ((v as f64 * scale as f64).round() as u32).max(1);
    (scale_one(width), scale_one(height))
}

/// Bookkeeping for one asset's search
struct Search<'a, C> {
    engine: &'a CompressionEngine<C>,
    path: &'a Path,
    image: &'a DynamicImage,
    original_size: u64,
    attempts: Vec<Attempt>,
}

impl<'a, C: Codec> Search<'a, C> {
    fn encode(
        &mut self,
        stage: Stage,
        format: TargetFormat,
        quality: Option<u8>,
        scale: f32,
        resized: Option<&DynamicImage>,
    ) -> Result<Vec<u8>> {
        let source = resized.unwrap_or(self.image);
        let codec = &self.engine.codec;
        let bytes = match (format, quality) {
            (TargetFormat::Png, _) => codec.encode_png_optimized(source)?,
            (TargetFormat::Jpeg, q) => codec.encode_jpeg(source, q.unwrap_or(self.engine.budget.fallback_quality))?,
        };

        debug!(
            "{}: {:?} {} quality={:?} scale={} -> {} bytes",
            self.path.display(),
            stage,
            format.name(),
            quality,
            scale,
            bytes.len()
        );

        self.attempts.push(Attempt {
            stage,
            format,
            quality,
            scale,
            size: bytes.len() as u64,
        });
        Ok(bytes)
    }

    fn accept(
        self,
        stage: Stage,
        format: TargetFormat,
        quality: Option<u8>,
        scale: f32,
        image: &DynamicImage,
        bytes: Vec<u8>,
    ) -> CompressionResult {
        let final_size = bytes.len() as u64;
        CompressionResult {
            within_budget: self.engine.budget.fits(final_size),
            stage,
            format,
            quality,
            scale,
            width: image.width(),
            height: image.height(),
            original_size: self.original_size,
            final_size,
            output_path: normalizer::output_path_for(self.path, format),
            bytes,
            attempts: self.attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OptimizeError;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use std::cell::Cell;

    type SizeModel = fn(TargetFormat, Option<u8>, u32, u32) -> usize;

    /// Codec whose output size is a pure function of format, quality and dimensions
    struct FakeCodec {
        image: DynamicImage,
        size_model: SizeModel,
        decodes: Cell<usize>,
        encodes: Cell<usize>,
    }

    impl FakeCodec {
        fn new(width: u32, height: u32, size_model: SizeModel) -> Self {
            Self {
                image: DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 90, 90]))),
                size_model,
                decodes: Cell::new(0),
                encodes: Cell::new(0),
            }
        }
    }

    impl Codec for &FakeCodec {
        fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
            self.decodes.set(self.decodes.get() + 1);
            if bytes.starts_with(b"corrupt") {
                return Err(OptimizeError::UnreadableImage("bad magic".into()));
            }
            Ok(self.image.clone())
        }

        fn encode_jpeg(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
            self.encodes.set(self.encodes.get() + 1);
            Ok(vec![0; (self.size_model)(TargetFormat::Jpeg, Some(quality), image.width(), image.height())])
        }

        fn encode_png_optimized(&self, image: &DynamicImage) -> Result<Vec<u8>> {
            self.encodes.set(self.encodes.get() + 1);
            Ok(vec![0; (self.size_model)(TargetFormat::Png, None, image.width(), image.height())])
        }

        fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
            image.resize_exact(width, height, image::imageops::FilterType::Nearest)
        }
    }

    fn budget(max_bytes: u64) -> CompressionBudget {
        CompressionBudget {
            max_bytes,
            ..CompressionBudget::default()
        }
    }

    fn qualities(result: &CompressionResult) -> Vec<Option<u8>> {
        result.attempts.iter().map(|a| a.quality).collect()
    }

    fn scales(result: &CompressionResult) -> Vec<f32> {
        result
            .attempts
            .iter()
            .filter(|a| a.stage == Stage::Downscale)
            .map(|a| a.scale)
            .collect()
    }

    #[test]
    fn test_skip_passes_bytes_through() {
        let codec = FakeCodec::new(10, 10, |_, _, _, _| 1);
        let engine = CompressionEngine::new(budget(200 * 1024), &codec);
        let original: Vec<u8> = (0..150 * 1024).map(|i| (i % 251) as u8).collect();

        let result = engine.compress(Path::new("images/logo.png"), &original, 85).unwrap();

        assert!(result.is_skipped());
        assert_eq!(result.bytes, original);
        assert_eq!(result.output_path, PathBuf::from("images/logo.png"));
        assert!(result.attempts.is_empty());
        assert_eq!(codec.decodes.get(), 0);
        assert_eq!(codec.encodes.get(), 0);
    }

    #[test]
    fn test_quality_ladder_stops_at_first_fit() {
        // 85 -> 255 000, 75 -> 225 000, 65 -> 195 000
        let codec = FakeCodec::new(100, 100, |_, q, _, _| q.unwrap_or(100) as usize * 3000);
        let engine = CompressionEngine::new(budget(200 * 1024), &codec);

        let result = engine.compress(Path::new("photo.jpg"), &vec![1; 500 * 1024], 85).unwrap();

        assert_eq!(result.stage, Stage::Quality);
        assert_eq!(result.quality, Some(65));
        assert_eq!(qualities(&result), vec![Some(85), Some(75), Some(65)]);
        assert!(result.within_budget);
        assert_eq!(result.final_size, 195_000);
        assert_eq!(result.output_path, PathBuf::from("photo.jpg"));
    }

    #[test]
    fn test_quality_ladder_walks_every_level_in_order() {
        // Only 45 fits: 45 * 4000 = 180 000
        let codec = FakeCodec::new(100, 100, |_, q, _, _| q.unwrap_or(100) as usize * 4000);
        let engine = CompressionEngine::new(budget(200 * 1024), &codec);

        let result = engine.compress(Path::new("photo.jpeg"), &vec![1; 500 * 1024], 85).unwrap();

        assert_eq!(qualities(&result), vec![Some(85), Some(75), Some(65), Some(55), Some(45)]);
        assert_eq!(result.quality, Some(45));
        assert!(scales(&result).is_empty());
    }

    #[test]
    fn test_exhausted_ladders_fall_back_unconditionally() {
        // Size depends on pixel count only, nothing fits a 1000 byte budget
        let codec = FakeCodec::new(1000, 1000, |_, _, w, h| (w * h) as usize);
        let engine = CompressionEngine::new(budget(1000), &codec);

        let result = engine.compress(Path::new("huge.jpg"), &vec![1; 2 * 1024 * 1024], 85).unwrap();

        assert_eq!(result.stage, Stage::Fallback);
        assert!(!result.within_budget);
        assert_eq!(result.quality, Some(30));
        assert_eq!((result.width, result.height), (300, 300));
        assert_eq!(result.final_size, 90_000);

        assert_eq!(result.attempts.len(), 10);
        assert_eq!(codec.encodes.get(), 10);
        assert_eq!(scales(&result), vec![0.8, 0.6, 0.5, 0.4]);
        // Strategy B re-encodes at the requested quality
        assert!(result
            .attempts
            .iter()
            .filter(|a| a.stage == Stage::Downscale)
            .all(|a| a.quality == Some(85)));
        assert_eq!(result.attempts.last().map(|a| a.stage), Some(Stage::Fallback));
    }

    #[test]
    fn test_downscale_accepts_first_fitting_scale() {
        // q-independent: 0.8 -> 640 000, 0.6 -> 360 000, 0.5 -> 250 000, 0.4 -> 160 000
        let codec = FakeCodec::new(1000, 1000, |_, _, w, h| (w * h) as usize);
        let engine = CompressionEngine::new(budget(200 * 1024), &codec);

        let result = engine.compress(Path::new("wide.jpg"), &vec![1; 2 * 1024 * 1024], 85).unwrap();

        assert_eq!(result.stage, Stage::Downscale);
        assert_eq!(result.scale, 0.4);
        assert_eq!((result.width, result.height), (400, 400));
        assert_eq!(result.attempts.len(), 5 + 4);
    }

    #[test]
    fn test_attempt_bound_and_first_fit_over_many_budgets() {
        let model: SizeModel = |_, q, w, h| (w * h) as usize * q.unwrap_or(100) as usize / 100;
        let codec = FakeCodec::new(400, 300, model);
        let levels = CompressionBudget::default().quality_levels(85);
        let scale_ladder = CompressionBudget::default().scale_ladder;

        for max_bytes in (5_000..130_000).step_by(2_500) {
            let engine = CompressionEngine::new(budget(max_bytes), &codec);
            let result = engine.compress(Path::new("p.jpg"), &vec![0; 200_000], 85).unwrap();
            assert!(result.attempts.len() <= 10);

            // Expected first fit in ladder order
            let candidates = levels
                .iter()
                .map(|&q| (Stage::Quality, Some(q), 1.0f32))
                .chain(scale_ladder.iter().map(|&s| (Stage::Downscale, Some(85), s)));
            let expected = candidates.into_iter().find(|&(_, q, s)| {
                let (w, h) = scaled_dimensions(400, 300, s);
                (model(TargetFormat::Jpeg, q, w, h) as u64) <= max_bytes
            });

            match expected {
                Some((stage, quality, scale)) => {
                    assert_eq!(result.stage, stage, "budget {}", max_bytes);
                    assert_eq!(result.quality, quality, "budget {}", max_bytes);
                    assert_eq!(result.scale, scale, "budget {}", max_bytes);
                    assert!(result.within_budget);
                }
                None => assert_eq!(result.stage, Stage::Fallback, "budget {}", max_bytes),
            }

            // No parameter tried twice, quality strictly before scale
            let mut seen = Vec::new();
            for attempt in &result.attempts {
                let key = (attempt.stage, attempt.quality, attempt.scale.to_bits());
                assert!(!seen.contains(&key));
                seen.push(key);
            }
            let first_scale = result.attempts.iter().position(|a| a.stage != Stage::Quality);
            if let Some(idx) = first_scale {
                assert!(result.attempts[idx..].iter().all(|a| a.stage != Stage::Quality));
            }
        }
    }

    #[test]
    fn test_png_single_lossless_attempt() {
        let codec = FakeCodec::new(200, 200, |f, _, _, _| match f {
            TargetFormat::Png => 150_000,
            TargetFormat::Jpeg => 1,
        });
        let engine = CompressionEngine::new(budget(200 * 1024), &codec);

        let result = engine.compress(Path::new("logo.png"), &vec![1; 300 * 1024], 85).unwrap();

        assert_eq!(result.stage, Stage::Lossless);
        assert_eq!(result.format, TargetFormat::Png);
        assert_eq!(result.quality, None);
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(result.output_path, PathBuf::from("logo.png"));
    }

    #[test]
    fn test_png_over_budget_downscales_as_jpeg() {
        let codec = FakeCodec::new(1000, 1000, |f, _, w, h| match f {
            TargetFormat::Png => 5_000_000,
            TargetFormat::Jpeg => (w * h) as usize / 2,
        });
        let engine = CompressionEngine::new(budget(200 * 1024), &codec);

        let result = engine.compress(Path::new("shot.PNG"), &vec![1; 900 * 1024], 85).unwrap();

        // 0.8 -> 320 000, 0.6 -> 180 000
        assert_eq!(result.stage, Stage::Downscale);
        assert_eq!(result.scale, 0.6);
        assert_eq!(result.format, TargetFormat::Jpeg);
        assert_eq!(result.output_path, PathBuf::from("shot.jpg"));
        let stages: Vec<Stage> = result.attempts.iter().map(|a| a.stage).collect();
        assert_eq!(stages, vec![Stage::Lossless, Stage::Downscale, Stage::Downscale]);
    }

    #[test]
    fn test_bmp_is_retargeted_to_jpeg() {
        let codec = FakeCodec::new(100, 100, |_, q, _, _| q.unwrap_or(100) as usize * 2000);
        let engine = CompressionEngine::new(budget(200 * 1024), &codec);

        let result = engine.compress(Path::new("images/scan.bmp"), &vec![1; 300 * 1024], 85).unwrap();

        assert_eq!(result.format, TargetFormat::Jpeg);
        assert_eq!(result.stage, Stage::Quality);
        assert_eq!(result.quality, Some(85));
        assert_eq!(result.output_path, PathBuf::from("images/scan.jpg"));
    }

    #[test]
    fn test_corrupt_input_is_reported() {
        let codec = FakeCodec::new(10, 10, |_, _, _, _| 1);
        let engine = CompressionEngine::new(budget(10), &codec);

        let mut bytes = b"corrupt".to_vec();
        bytes.resize(4096, 0);
        let err = engine.compress(Path::new("broken.jpg"), &bytes, 85).unwrap_err();

        assert!(matches!(err, OptimizeError::UnreadableImage(_)));
        assert_eq!(codec.encodes.get(), 0);
    }

    #[test]
    fn test_alpha_is_flattened_before_encoding() {
        struct InspectingCodec;
        impl Codec for InspectingCodec {
            fn decode(&self, _bytes: &[u8]) -> Result<DynamicImage> {
                Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0]))))
            }
            fn encode_jpeg(&self, image: &DynamicImage, _quality: u8) -> Result<Vec<u8>> {
                assert!(!image.color().has_alpha());
                assert_eq!(image.to_rgb8().get_pixel(0, 0).0, [255, 255, 255]);
                Ok(vec![0; 8])
            }
            fn encode_png_optimized(&self, _image: &DynamicImage) -> Result<Vec<u8>> {
                unreachable!("gif input is re-targeted to JPEG")
            }
            fn resize(&self, image: &DynamicImage, _width: u32, _height: u32) -> DynamicImage {
                image.clone()
            }
        }

        let engine = CompressionEngine::new(budget(100), InspectingCodec);
        let result = engine.compress(Path::new("anim.gif"), &[7; 512], 85).unwrap();
        assert_eq!(result.output_path, PathBuf::from("anim.jpg"));
    }

    #[test]
    fn test_scaled_dimensions_round_to_nearest() {
        assert_eq!(scaled_dimensions(1000, 750, 0.8), (800, 600));
        assert_eq!(scaled_dimensions(333, 101, 0.5), (167, 51));
        assert_eq!(scaled_dimensions(1, 1, 0.3), (1, 1));
    }
}
