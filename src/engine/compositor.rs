// src/engine/compositor.rs
//
// Crop/pad compositor: gives a (possibly downscaled) bitmap exactly the
// requested size by centring it in a new buffer. Each axis is handled on its
// own: an overhang is trimmed evenly from both edges, a shortfall is filled
// with border pixels on both edges.

use crate::engine::buffer::PixelBuffer;
use crate::engine::common::{ensure_len, packed_len, EngineResult};
use crate::engine::fitting::calculate_borders_for_desired_size;
use crate::engine::BORDER_FILL_VALUE;
use crate::ops::{FittingMode, ImageDimensions};
use std::borrow::Cow;
use tracing::{debug, warn};

/// Crop and pad `bitmap` so it is exactly `desired` in size.
///
/// The fitting mode has already shaped the bitmap during downscaling; here
/// the result is centred, so a source larger than `desired` loses the same
/// number of lines on both edges (the odd one from the trailing edge) and a
/// smaller one gains borders the same way. The input comes back unchanged
/// when it already has the desired size, is empty, or `desired` is.
pub fn crop_and_pad_for_fitting_mode<'a>(
    bitmap: Cow<'a, PixelBuffer>,
    desired: ImageDimensions,
    fitting_mode: FittingMode,
) -> EngineResult<Cow<'a, PixelBuffer>> {
    let (input_width, input_height) = bitmap.dimensions();
    if desired.is_zero_area() {
        warn!(
            target: "bitmap_ops::compositor",
            width = desired.width(),
            height = desired.height(),
            "image scaling aborted as desired dimensions too small"
        );
        return Ok(bitmap);
    }
    let (final_width, final_height) = (desired.width_u32(), desired.height_u32());
    if (input_width, input_height) == (final_width, final_height) {
        return Ok(bitmap);
    }
    if input_width == 0 || input_height == 0 {
        debug!(target: "bitmap_ops::compositor", "zero-area bitmap is not cropped");
        return Ok(bitmap);
    }

    let plan = calculate_borders_for_desired_size(input_width, input_height, desired);
    let scanlines_to_pad = plan.scanlines_to_pad() as usize;
    let columns_to_pad = plan.columns_to_pad() as usize;
    let scanlines_to_crop = plan.scanlines_to_crop.max(0) as usize;
    let columns_to_crop = plan.columns_to_crop.max(0) as usize;

    let format = bitmap.format();
    let bpp = format.bytes_per_pixel();
    let mut output = PixelBuffer::new(final_width, final_height, format)?;

    // Crop moves the source origin, padding moves the destination origin.
    let input_stride = bitmap.stride() as usize;
    let final_width_px = final_width as usize;
    let source_offset = ((scanlines_to_crop / 2) * input_stride + columns_to_crop / 2) * bpp;
    let target_offset = ((scanlines_to_pad / 2) * final_width_px + columns_to_pad / 2) * bpp;
    let output_span = final_width_px * bpp;
    let scanlines_to_copy = final_height as usize - scanlines_to_pad;

    {
        let source = &bitmap.pixels()[source_offset..];
        let target = &mut output.pixels_mut()[target_offset..];
        if columns_to_crop == 0 && columns_to_pad == 0 && !bitmap.has_stride_gap() {
            let len = scanlines_to_copy * output_span;
            target[..len].copy_from_slice(&source[..len]);
        } else {
            let input_span = input_stride * bpp;
            let copy_span = (final_width_px - columns_to_pad) * bpp;
            for y in 0..scanlines_to_copy {
                let from = y * input_span;
                let to = y * output_span;
                target[to..to + copy_span].copy_from_slice(&source[from..from + copy_span]);
            }
        }
    }

    add_borders(
        output.pixels_mut(),
        bpp,
        desired,
        ImageDimensions::from_u32(columns_to_pad as u32, scanlines_to_pad as u32),
    )?;
    debug!(
        target: "bitmap_ops::compositor",
        mode = fitting_mode.as_str(),
        from_width = input_width,
        from_height = input_height,
        final_width,
        final_height,
        scanlines_to_crop = plan.scanlines_to_crop,
        columns_to_crop = plan.columns_to_crop,
        "cropped and padded"
    );
    Ok(Cow::Owned(output))
}

/// Fill symmetric borders with `BORDER_FILL_VALUE`.
///
/// `pad_dimensions` holds the total columns and rows to fill. Odd amounts put
/// the extra line on the bottom or right. Row and column borders are filled
/// independently, so both can be present at once.
pub fn add_borders(
    target: &mut [u8],
    bytes_per_pixel: usize,
    target_dimensions: ImageDimensions,
    pad_dimensions: ImageDimensions,
) -> EngineResult<()> {
    let width = target_dimensions.width() as usize;
    let height = target_dimensions.height() as usize;
    let output_span = width * bytes_per_pixel;
    ensure_len(
        target.len(),
        packed_len(width as u32, height as u32, bytes_per_pixel)?,
    )?;

    let scanlines_to_pad = (pad_dimensions.height() as usize).min(height);
    let columns_to_pad = (pad_dimensions.width() as usize).min(width);

    let top = scanlines_to_pad / 2;
    let bottom = height - (scanlines_to_pad - top);
    if scanlines_to_pad > 0 {
        target[..top * output_span].fill(BORDER_FILL_VALUE);
        target[bottom * output_span..height * output_span].fill(BORDER_FILL_VALUE);
    }
    if columns_to_pad > 0 {
        let left = columns_to_pad / 2;
        let right_start = (width - (columns_to_pad - left)) * bytes_per_pixel;
        // Rows inside the letterbox are already filled.
        for row in target[top * output_span..bottom * output_span].chunks_exact_mut(output_span) {
            row[..left * bytes_per_pixel].fill(BORDER_FILL_VALUE);
            row[right_start..].fill(BORDER_FILL_VALUE);
        }
    }
    Ok(())
}
