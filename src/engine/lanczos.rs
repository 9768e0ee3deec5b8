// src/engine/lanczos.rs
//
// Gamma-aware Lanczos resampling.
//
// Colour channels are decoded through a partial gamma curve into f32, resized
// with a Lanczos convolution, and re-encoded through a 4096-entry table. Alpha
// is resampled linearly. All channels of a pixel share one resize pass, so the
// filter weights are computed once per image.

use crate::engine::buffer::{PixelBuffer, PixelFormat};
use crate::engine::common::{ensure_len, packed_len, required_len, EngineResult};
use crate::engine::DEFAULT_SOURCE_GAMMA;
use crate::error::BitmapOpsError;
use crate::ops::ImageDimensions;
use fast_image_resize::{self as fir, PixelType, ResizeOptions};
use image::imageops::FilterType;
use image::{ImageBuffer, Luma, Rgba32FImage};
use once_cell::sync::Lazy;
use std::borrow::Cow;
use tracing::{debug, warn};

const LINEAR_TO_SRGB_TABLE_SIZE: usize = 4096;

/// Lookup tables between 8-bit encoded values and linear light.
struct GammaTables {
    srgb_to_linear: [f32; 256],
    linear_to_srgb: [u8; LINEAR_TO_SRGB_TABLE_SIZE],
}

impl GammaTables {
    fn build() -> Self {
        let mut srgb_to_linear = [0.0f32; 256];
        for (i, value) in srgb_to_linear.iter_mut().enumerate() {
            *value = (i as f32 / 255.0).powf(DEFAULT_SOURCE_GAMMA);
        }

        let inverse_gamma = 1.0 / DEFAULT_SOURCE_GAMMA;
        let mut linear_to_srgb = [0u8; LINEAR_TO_SRGB_TABLE_SIZE];
        for (i, value) in linear_to_srgb.iter_mut().enumerate() {
            let linear = i as f32 / LINEAR_TO_SRGB_TABLE_SIZE as f32;
            *value = (255.0 * linear.powf(inverse_gamma) + 0.5).clamp(0.0, 255.0) as u8;
        }

        Self {
            srgb_to_linear,
            linear_to_srgb,
        }
    }

    #[inline]
    fn decode(&self, value: u8) -> f32 {
        self.srgb_to_linear[value as usize]
    }

    #[inline]
    fn encode(&self, linear: f32) -> u8 {
        let index = (LINEAR_TO_SRGB_TABLE_SIZE as f32 * linear + 0.5)
            .clamp(0.0, (LINEAR_TO_SRGB_TABLE_SIZE - 1) as f32) as usize;
        self.linear_to_srgb[index]
    }
}

static GAMMA_TABLES: Lazy<GammaTables> = Lazy::new(GammaTables::build);

#[inline]
fn encode_alpha(linear: f32) -> u8 {
    (255.0 * linear + 0.5).clamp(0.0, 255.0) as u8
}

#[derive(Debug)]
pub struct ResizeError {
    pub source_dims: (u32, u32),
    pub target_dims: (u32, u32),
    pub reason: String,
}

impl ResizeError {
    pub fn new(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        reason: impl Into<String>,
    ) -> Self {
        Self {
            source_dims,
            target_dims,
            reason: reason.into(),
        }
    }

    pub fn into_bitmap_ops_error(self) -> BitmapOpsError {
        BitmapOpsError::resize_failed(self.source_dims, self.target_dims, self.reason)
    }
}

/// Channel layout of a resample pass. Alpha, when present, is the last channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ChannelLayout {
    channels: usize,
    has_alpha: bool,
}

impl ChannelLayout {
    const SINGLE: Self = Self {
        channels: 1,
        has_alpha: false,
    };
    const FOUR_WITH_ALPHA: Self = Self {
        channels: 4,
        has_alpha: true,
    };

    fn for_format(format: PixelFormat) -> Option<Self> {
        match format {
            PixelFormat::L8 | PixelFormat::A8 => Some(Self::SINGLE),
            PixelFormat::RGBA8888 | PixelFormat::BGRA8888 => Some(Self::FOUR_WITH_ALPHA),
            _ => None,
        }
    }

    fn pixel_type(&self) -> PixelType {
        if self.channels == 4 {
            PixelType::F32x4
        } else {
            PixelType::F32
        }
    }

    #[inline]
    fn is_alpha(&self, channel: usize) -> bool {
        self.has_alpha && channel == self.channels - 1
    }
}

fn lanczos_options() -> ResizeOptions {
    ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3))
        .use_alpha(false)
}

fn resize_with_fir(
    samples: &[f32],
    pixel_type: PixelType,
    src_dims: (u32, u32),
    dst_dims: (u32, u32),
) -> std::result::Result<Vec<f32>, String> {
    let mut src_image = fir::images::Image::new(src_dims.0, src_dims.1, pixel_type);
    let src_buffer = src_image.buffer_mut();
    if src_buffer.len() != samples.len() * 4 {
        return Err(format!(
            "fir source buffer mismatch. expected {} bytes, got {} bytes",
            samples.len() * 4,
            src_buffer.len()
        ));
    }
    for (bytes, sample) in src_buffer.chunks_exact_mut(4).zip(samples) {
        bytes.copy_from_slice(&sample.to_ne_bytes());
    }

    let mut dst_image = fir::images::Image::new(dst_dims.0, dst_dims.1, pixel_type);
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &lanczos_options())
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    Ok(dst_image
        .buffer()
        .chunks_exact(4)
        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn resize_with_image_crate_fallback(
    samples: &[f32],
    layout: ChannelLayout,
    src_dims: (u32, u32),
    dst_dims: (u32, u32),
) -> std::result::Result<Vec<f32>, String> {
    let filter = FilterType::Lanczos3;
    match layout.channels {
        1 => {
            let luma: ImageBuffer<Luma<f32>, Vec<f32>> =
                ImageBuffer::from_raw(src_dims.0, src_dims.1, samples.to_vec())
                    .ok_or_else(|| "failed to build luma image for fallback resize".to_string())?;
            Ok(image::imageops::resize(&luma, dst_dims.0, dst_dims.1, filter).into_raw())
        }
        4 => {
            let rgba = Rgba32FImage::from_raw(src_dims.0, src_dims.1, samples.to_vec())
                .ok_or_else(|| "failed to build rgba image for fallback resize".to_string())?;
            Ok(image::imageops::resize(&rgba, dst_dims.0, dst_dims.1, filter).into_raw())
        }
        other => Err(format!("fallback resize does not support {other} channels")),
    }
}

/// Resize interleaved linear samples, falling back to the image crate if the
/// SIMD path fails.
fn resample_linear(
    samples: &[f32],
    layout: ChannelLayout,
    src_dims: (u32, u32),
    dst_dims: (u32, u32),
) -> std::result::Result<Vec<f32>, ResizeError> {
    match resize_with_fir(samples, layout.pixel_type(), src_dims, dst_dims) {
        Ok(resized) => Ok(resized),
        Err(err) => {
            debug!(target: "bitmap_ops::lanczos", %err, "falling back to image crate resize");
            resize_with_image_crate_fallback(samples, layout, src_dims, dst_dims)
                .map_err(|fallback_err| {
                    format!("{err}; image crate fallback failed: {fallback_err}")
                })
        }
    }
    .map_err(|reason| ResizeError::new(src_dims, dst_dims, reason))
}

fn resample(
    src: &[u8],
    src_dims: ImageDimensions,
    src_stride: u32,
    dst: &mut [u8],
    dst_dims: ImageDimensions,
    layout: ChannelLayout,
) -> EngineResult<()> {
    if src_dims.is_zero_area() || dst_dims.is_zero_area() {
        return Ok(());
    }
    let (src_width, src_height) = (src_dims.width_u32(), src_dims.height_u32());
    let (dst_width, dst_height) = (dst_dims.width_u32(), dst_dims.height_u32());
    let src_stride = src_stride.max(src_width);
    let channels = layout.channels;
    ensure_len(src.len(), required_len(src_width, src_height, src_stride, channels)?)?;
    ensure_len(dst.len(), packed_len(dst_width, dst_height, channels)?)?;

    let gamma = &*GAMMA_TABLES;
    let row_bytes = src_width as usize * channels;
    let mut samples = Vec::new();
    samples
        .try_reserve_exact(src_width as usize * src_height as usize * channels)
        .map_err(|_| BitmapOpsError::allocation_failed(row_bytes * src_height as usize * 4))?;
    for y in 0..src_height as usize {
        let start = y * src_stride as usize * channels;
        for (i, &value) in src[start..start + row_bytes].iter().enumerate() {
            samples.push(if layout.is_alpha(i % channels) {
                value as f32 / 255.0
            } else {
                gamma.decode(value)
            });
        }
    }

    let resized = resample_linear(
        &samples,
        layout,
        (src_width, src_height),
        (dst_width, dst_height),
    )
    .map_err(ResizeError::into_bitmap_ops_error)?;

    for (i, (out, &linear)) in dst.iter_mut().zip(&resized).enumerate() {
        *out = if layout.is_alpha(i % channels) {
            encode_alpha(linear)
        } else {
            gamma.encode(linear)
        };
    }
    Ok(())
}

/// Lanczos resample of `src` into the packed `dst`.
///
/// L8/A8 are treated as one gamma-encoded channel; RGBA8888/BGRA8888 as four
/// channels with linear alpha in the last byte. Other formats are logged and
/// left alone.
pub fn lanczos_sample(
    src: &[u8],
    src_dims: ImageDimensions,
    src_stride: u32,
    format: PixelFormat,
    dst: &mut [u8],
    dst_dims: ImageDimensions,
) -> EngineResult<()> {
    match ChannelLayout::for_format(format) {
        Some(layout) => resample(src, src_dims, src_stride, dst, dst_dims, layout),
        None => {
            warn!(
                target: "bitmap_ops::lanczos",
                %format,
                "bitmap was not lanczos sampled: unsupported pixel format"
            );
            Ok(())
        }
    }
}

/// Lanczos resample packed four-channel pixels with alpha last.
pub fn lanczos_sample_4_bpp(
    src: &[u8],
    src_dims: ImageDimensions,
    dst: &mut [u8],
    dst_dims: ImageDimensions,
) -> EngineResult<()> {
    resample(
        src,
        src_dims,
        src_dims.width_u32(),
        dst,
        dst_dims,
        ChannelLayout::FOUR_WITH_ALPHA,
    )
}

/// Lanczos resample packed single-channel pixels.
pub fn lanczos_sample_1_bpp(
    src: &[u8],
    src_dims: ImageDimensions,
    dst: &mut [u8],
    dst_dims: ImageDimensions,
) -> EngineResult<()> {
    resample(
        src,
        src_dims,
        src_dims.width_u32(),
        dst,
        dst_dims,
        ChannelLayout::SINGLE,
    )
}

/// Lanczos resize a whole buffer, as used for oversized glyph bitmaps.
///
/// Returns the input as-is when it already has the requested size, is empty,
/// or uses a format the resampler does not handle.
pub fn lanczos_downscale<'a>(
    bitmap: Cow<'a, PixelBuffer>,
    dimensions: ImageDimensions,
) -> EngineResult<Cow<'a, PixelBuffer>> {
    let (width, height) = bitmap.dimensions();
    if (width, height) == (dimensions.width_u32(), dimensions.height_u32())
        || dimensions.is_zero_area()
        || width == 0
        || height == 0
    {
        return Ok(bitmap);
    }
    let format = bitmap.format();
    if ChannelLayout::for_format(format).is_none() {
        warn!(
            target: "bitmap_ops::lanczos",
            %format,
            "bitmap was not lanczos downscaled: unsupported pixel format"
        );
        return Ok(bitmap);
    }

    let mut output = PixelBuffer::new(dimensions.width_u32(), dimensions.height_u32(), format)?;
    lanczos_sample(
        bitmap.pixels(),
        ImageDimensions::from_u32(width, height),
        bitmap.stride(),
        format,
        output.pixels_mut(),
        dimensions,
    )?;
    Ok(Cow::Owned(output))
}
