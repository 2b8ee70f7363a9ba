// buffer.rs — 按 GPano 裁剪信息重建完整的等距柱状投影纹理

use crate::error::{Result, ViewerError};
use crate::metadata::PanoramaMetadata;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImage, GenericImageView, ImageOutputFormat, RgbaImage};
use std::io::Cursor;

/// Width cap used when no hardware-accelerated renderer reports a limit.
pub const FALLBACK_MAX_TEXTURE_WIDTH: u32 = 2048;

pub fn working_width(renderer_limit: Option<u32>) -> u32 {
    match renderer_limit {
        Some(w) if w > 0 => w,
        _ => FALLBACK_MAX_TEXTURE_WIDTH,
    }
}

/// Metadata after the uniform downscale to the working width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledLayout {
    pub ratio: f64,
    pub full_width: u32,
    pub full_height: u32,
    pub cropped_width: u32,
    pub cropped_height: u32,
    pub cropped_x: u32,
    pub cropped_y: u32,
}

/// Scales every field of `meta` by `min(full_width, max_width) / full_width`.
///
/// Rounded values are pulled back inside the scaled panorama so the crop
/// region never overhangs the buffer.
pub fn scale_layout(meta: &PanoramaMetadata, max_width: u32) -> ScaledLayout {
    let full = meta.full_width.max(1);
    let ratio = full.min(max_width.max(1)) as f64 / full as f64;
    let scale = |v: u32| (v as f64 * ratio).round() as u32;

    let full_width = scale(meta.full_width).max(1);
    let full_height = scale(meta.full_height).max(1);
    let cropped_x = scale(meta.cropped_x).min(full_width - 1);
    let cropped_y = scale(meta.cropped_y).min(full_height - 1);
    let cropped_width = scale(meta.cropped_width).min(full_width - cropped_x);
    let cropped_height = scale(meta.cropped_height).min(full_height - cropped_y);

    ScaledLayout {
        ratio,
        full_width,
        full_height,
        cropped_width,
        cropped_height,
        cropped_x,
        cropped_y,
    }
}

/// The composed full panorama, ready to be encoded for the renderer.
#[derive(Debug, Clone)]
pub struct PanoramaBuffer {
    pub layout: ScaledLayout,
    pub image: RgbaImage,
}

/// Encoded image handed to [`crate::renderer::Renderer::create_scene`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureSource {
    pub width: u32,
    pub height: u32,
    /// PNG bytes; the area outside the crop stays transparent.
    pub encoded: Vec<u8>,
}

impl TextureSource {
    pub fn decode(&self) -> Result<RgbaImage> {
        let img = image::load_from_memory_with_format(&self.encoded, image::ImageFormat::Png)
            .map_err(ViewerError::ImageDecode)?;
        Ok(img.to_rgba8())
    }
}

/// Draws the (resampled) raw image at its crop offset inside an otherwise
/// empty `full_width × full_height` buffer.
pub fn compose(raw: &DynamicImage, meta: &PanoramaMetadata, max_width: u32) -> Result<PanoramaBuffer> {
    let layout = scale_layout(meta, max_width);
    if layout.ratio < 1.0 {
        log::info!(
            "panorama {}x{} exceeds working width {}, scaled by {:.4}",
            meta.full_width,
            meta.full_height,
            max_width,
            layout.ratio
        );
    }

    let mut canvas = RgbaImage::new(layout.full_width, layout.full_height);
    if layout.cropped_width > 0 && layout.cropped_height > 0 {
        let resized = if raw.width() == layout.cropped_width && raw.height() == layout.cropped_height {
            raw.to_rgba8()
        } else {
            image::imageops::resize(
                &raw.to_rgba8(),
                layout.cropped_width,
                layout.cropped_height,
                FilterType::Triangle,
            )
        };
        canvas
            .copy_from(&resized, layout.cropped_x, layout.cropped_y)
            .map_err(ViewerError::Encode)?;
    }

    Ok(PanoramaBuffer { layout, image: canvas })
}

impl PanoramaBuffer {
    pub fn encode(&self) -> Result<TextureSource> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(self.image.clone())
            .write_to(&mut out, ImageOutputFormat::Png)
            .map_err(ViewerError::Encode)?;
        Ok(TextureSource {
            width: self.image.width(),
            height: self.image.height(),
            encoded: out.into_inner(),
        })
    }
}
