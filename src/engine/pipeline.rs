// src/engine/pipeline.rs
//
// Scaling pipeline: desired size, power-of-two box filter, secondary
// point/bilinear sampling, then crop/pad to the requested aspect ratio.
//
// Bitmaps travel as Cow<PixelBuffer>. A stage that has nothing to do hands its
// input straight back, so an untouched borrowed bitmap comes out borrowed.

use crate::engine::box_filter::{continue_scaling, downscale_in_place_pow2, BoxFilterResult};
use crate::engine::buffer::PixelBuffer;
use crate::engine::common::{packed_len, EngineResult};
use crate::engine::compositor::crop_and_pad_for_fitting_mode;
use crate::engine::config::ScalingConfig;
use crate::engine::fitting::{
    calculate_desired_dimensions_with_limit, dimension_test_for_fitting_mode, fit_to_scaling_mode,
};
use crate::engine::sampling::{linear_sample, point_sample};
use crate::ops::{
    FittingMode, ImageAttributes, ImageDimensions, SamplingMode, MAXIMUM_TARGET_BITMAP_SIZE,
};
use once_cell::sync::Lazy;
use std::borrow::Cow;
use tracing::{debug, warn};

/// Environment variable enabling copy-on-write debug logging.
pub const DEBUG_COW_ENV: &str = "BITMAP_OPS_DEBUG_COW";

// Optional debug logging for copy-on-write events.
// Enabled only when BITMAP_OPS_DEBUG_COW is set.
static COW_DEBUG_ENABLED: Lazy<bool> = Lazy::new(|| std::env::var(DEBUG_COW_ENV).is_ok());

fn log_copy(stage: &str, dims: (u32, u32)) {
    if *COW_DEBUG_ENABLED {
        debug!(target: "bitmap_ops::cow", %stage, width = dims.0, height = dims.1, "copy-on-write");
    }
}

/// Scale `bitmap` for a load request using the process-wide configuration.
///
/// Works out the desired box from `dimensions`, shrinks the bitmap toward it
/// and finally crops or pads it to the box's aspect ratio.
pub fn apply_attributes_to_bitmap<'a>(
    bitmap: Cow<'a, PixelBuffer>,
    dimensions: ImageDimensions,
    fitting_mode: FittingMode,
    sampling_mode: SamplingMode,
) -> EngineResult<Cow<'a, PixelBuffer>> {
    apply_attributes_to_bitmap_with_config(
        bitmap,
        dimensions,
        fitting_mode,
        sampling_mode,
        ScalingConfig::global(),
    )
}

pub fn apply_attributes_to_bitmap_with_config<'a>(
    bitmap: Cow<'a, PixelBuffer>,
    dimensions: ImageDimensions,
    fitting_mode: FittingMode,
    sampling_mode: SamplingMode,
    config: &ScalingConfig,
) -> EngineResult<Cow<'a, PixelBuffer>> {
    let (width, height) = bitmap.dimensions();
    let desired = calculate_desired_dimensions_with_limit(
        width,
        height,
        dimensions.width_u32(),
        dimensions.height_u32(),
        config.effective_max_texture_size(),
    );
    debug!(
        target: "bitmap_ops::pipeline",
        width,
        height,
        desired_width = desired.width(),
        desired_height = desired.height(),
        fitting = fitting_mode.as_str(),
        sampling = sampling_mode.as_str(),
        "applying attributes"
    );

    let bitmap = downscale_bitmap(bitmap, desired, fitting_mode, sampling_mode)?;
    crop_and_pad_for_fitting_mode(bitmap, desired, fitting_mode)
}

/// Shrink `bitmap` toward `desired` without going below it on the axes the
/// fitting mode cares about.
///
/// Runs only when `desired` is nonzero and smaller than the bitmap in at least
/// one dimension. The box filter works on a private copy of borrowed input.
pub fn downscale_bitmap<'a>(
    bitmap: Cow<'a, PixelBuffer>,
    desired: ImageDimensions,
    fitting_mode: FittingMode,
    sampling_mode: SamplingMode,
) -> EngineResult<Cow<'a, PixelBuffer>> {
    let (bitmap_width, bitmap_height) = bitmap.dimensions();
    let (desired_width, desired_height) = (desired.width_u32(), desired.height_u32());

    if desired.is_zero_area()
        || bitmap_width == 0
        || bitmap_height == 0
        || (desired_width >= bitmap_width && desired_height >= bitmap_height)
    {
        return Ok(bitmap);
    }

    let format = bitmap.format();
    let has_kernels = format.kernels().is_some();
    let mut bitmap = bitmap;
    let mut shrunk = BoxFilterResult {
        width: bitmap_width,
        height: bitmap_height,
        stride: bitmap.stride(),
    };

    let test = dimension_test_for_fitting_mode(fitting_mode);
    if sampling_mode.uses_box_filter()
        && has_kernels
        && continue_scaling(test, bitmap_width, bitmap_height, desired_width, desired_height)
    {
        if let Cow::Borrowed(source) = bitmap {
            log_copy("try_clone (box filter working copy)", (bitmap_width, bitmap_height));
            bitmap = Cow::Owned(source.try_clone()?);
        }
        let working = bitmap.to_mut();
        shrunk = downscale_in_place_pow2(
            working.pixels_mut(),
            format,
            bitmap_width,
            bitmap_height,
            shrunk.stride,
            desired_width,
            desired_height,
            fitting_mode,
            sampling_mode,
        )?;
    }

    if let Some(secondary) = sampling_mode.secondary_filter().filter(|_| has_kernels) {
        if shrunk.width > MAXIMUM_TARGET_BITMAP_SIZE || shrunk.height > MAXIMUM_TARGET_BITMAP_SIZE {
            warn!(
                target: "bitmap_ops::pipeline",
                width = shrunk.width,
                height = shrunk.height,
                "bitmap too large for secondary sampling"
            );
        } else {
            let shrunk_dims = ImageDimensions::from_u32(shrunk.width, shrunk.height);
            let filtered = fit_to_scaling_mode(desired, shrunk_dims, fitting_mode);
            if filtered.width_u32() < shrunk.width || filtered.height_u32() < shrunk.height {
                log_copy(
                    "allocate (secondary sampler output)",
                    (filtered.width_u32(), filtered.height_u32()),
                );
                let mut output =
                    PixelBuffer::new(filtered.width_u32(), filtered.height_u32(), format)?;
                let sample = match secondary {
                    SamplingMode::Nearest => point_sample,
                    _ => linear_sample,
                };
                sample(
                    bitmap.pixels(),
                    shrunk_dims,
                    shrunk.stride,
                    format,
                    output.pixels_mut(),
                    filtered,
                )?;
                debug!(
                    target: "bitmap_ops::pipeline",
                    sampling = secondary.as_str(),
                    from_width = shrunk.width,
                    from_height = shrunk.height,
                    to_width = filtered.width(),
                    to_height = filtered.height(),
                    "secondary sampling"
                );
                return Ok(Cow::Owned(output));
            }
        }
    }

    if shrunk.width < bitmap_width || shrunk.height < bitmap_height {
        // The box filter left the image packed at the start of the working buffer.
        log_copy("truncate (pack box-filtered pixels)", shrunk.dimensions());
        let mut pixels = bitmap.into_owned().into_raw();
        pixels.truncate(packed_len(shrunk.width, shrunk.height, format.bytes_per_pixel())?);
        pixels.shrink_to_fit();
        let packed = PixelBuffer::from_raw(shrunk.width, shrunk.height, format, pixels)?;
        debug!(
            target: "bitmap_ops::pipeline",
            from_width = bitmap_width,
            from_height = bitmap_height,
            to_width = shrunk.width,
            to_height = shrunk.height,
            "box filtered"
        );
        return Ok(Cow::Owned(packed));
    }

    Ok(bitmap)
}

impl ImageAttributes {
    /// Run the full scaling pipeline for these attributes.
    pub fn apply<'a>(&self, bitmap: Cow<'a, PixelBuffer>) -> EngineResult<Cow<'a, PixelBuffer>> {
        apply_attributes_to_bitmap(bitmap, self.dimensions, self.fitting_mode, self.sampling_mode)
    }

    pub fn apply_with_config<'a>(
        &self,
        bitmap: Cow<'a, PixelBuffer>,
        config: &ScalingConfig,
    ) -> EngineResult<Cow<'a, PixelBuffer>> {
        apply_attributes_to_bitmap_with_config(
            bitmap,
            self.dimensions,
            self.fitting_mode,
            self.sampling_mode,
            config,
        )
    }
}
