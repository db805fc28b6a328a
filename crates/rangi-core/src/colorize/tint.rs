//! Reference colorizer model used when no external library binding is wired
//! in: a luma-preserving chromatic toning pass, vivid for the artistic
//! variant and muted for the stable one.

use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};
use tracing::debug;

use crate::colorize::ColorizerModel;
use crate::device::DeviceProfile;
use crate::error::{Error, Result};
use crate::model::{ColorizerVariant, ModelKey, ModelLoader};

pub struct TintColorizer {
    variant: ColorizerVariant,
    results_dir: String,
}

impl TintColorizer {
    pub fn new(variant: ColorizerVariant, results_dir: impl Into<String>) -> Self {
        Self {
            variant,
            results_dir: results_dir.into(),
        }
    }
}

impl ColorizerModel for TintColorizer {
    fn transform(&self, input: &Path, render_factor: u32) -> Result<()> {
        let source = image::open(input)?.to_rgb8();
        let (width, height) = source.dimensions();

        // render factor scales chroma strength up to the top of the range
        let strength = (render_factor.min(45) as f32) / 45.0;
        let (warm, cool) = match self.variant {
            ColorizerVariant::Artistic => (1.25f32, 0.75f32),
            ColorizerVariant::Stable => (1.10f32, 0.90f32),
        };

        let mut output = RgbImage::new(width, height);
        for (x, y, pixel) in source.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
            let toned = [
                luma * (1.0 + (warm - 1.0) * strength),
                luma,
                luma * (1.0 + (cool - 1.0) * strength),
            ];
            output.put_pixel(
                x,
                y,
                Rgb(toned.map(|v| v.clamp(0.0, 255.0) as u8)),
            );
        }

        // write into the library-controlled results directory, resolved
        // relative to the current working directory
        let results_dir = Path::new(&self.results_dir);
        fs::create_dir_all(results_dir)?;
        let file_name = input
            .file_name()
            .ok_or_else(|| Error::InvalidRequest(format!("not a file: {}", input.display())))?;
        let destination = results_dir.join(file_name);
        output.save(&destination)?;
        debug!(result = %destination.display(), variant = %self.variant, "tint colorizer wrote result");

        Ok(())
    }
}

/// Loads [`TintColorizer`] handles for the variant named in the cache key.
pub struct TintColorizerLoader {
    results_dir: String,
}

impl TintColorizerLoader {
    pub fn new(results_dir: impl Into<String>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }
}

impl ModelLoader for TintColorizerLoader {
    type Handle = TintColorizer;

    fn load(&self, key: &ModelKey, _device: &DeviceProfile) -> Result<TintColorizer> {
        let variant: ColorizerVariant = key.variant.parse()?;
        Ok(TintColorizer::new(variant, self.results_dir.clone()))
    }
}
