// src/engine/box_filter.rs
//
// Power-of-two box filter.
//
// Repeatedly halves an image in place with a 2x2 box until one more halving
// would undershoot the desired size (as judged by the dimension test derived
// from the fitting mode). Each pass writes packed rows at the start of the
// working buffer; the first pass reads rows at the input stride.

use crate::engine::buffer::PixelFormat;
use crate::engine::common::{ensure_len, required_len, try_alloc_zeroed, EngineResult};
use crate::engine::fitting::dimension_test_for_fitting_mode;
use crate::engine::kernels::{self, PixelKernels};
use crate::ops::{BoxDimensionTest, FittingMode, SamplingMode};
use tracing::{debug, trace};

/// Geometry of the image left at the start of the working buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoxFilterResult {
    pub width: u32,
    pub height: u32,
    /// Row pitch in pixels. Equals `width` once any halving happened.
    pub stride: u32,
}

impl BoxFilterResult {
    fn unchanged(width: u32, height: u32, stride: u32) -> Self {
        Self {
            width,
            height,
            stride,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Whether one more halving keeps the image large enough.
///
/// Never halves a dimension down to zero.
pub fn continue_scaling(
    test: BoxDimensionTest,
    width: u32,
    height: u32,
    desired_width: u32,
    desired_height: u32,
) -> bool {
    let next_width = width >> 1;
    let next_height = height >> 1;
    if next_width < 1 || next_height < 1 {
        return false;
    }
    match test {
        BoxDimensionTest::Either => next_width >= desired_width || next_height >= desired_height,
        BoxDimensionTest::Both => next_width >= desired_width && next_height >= desired_height,
        BoxDimensionTest::X => next_width >= desired_width,
        BoxDimensionTest::Y => next_height >= desired_height,
    }
}

/// Box filter `pixels` toward the desired size if `sampling_mode` asks for it.
///
/// Formats without kernels and non-box sampling modes leave the buffer
/// untouched and report the input geometry.
#[allow(clippy::too_many_arguments)]
pub fn downscale_in_place_pow2(
    pixels: &mut [u8],
    format: PixelFormat,
    input_width: u32,
    input_height: u32,
    input_stride: u32,
    desired_width: u32,
    desired_height: u32,
    fitting_mode: FittingMode,
    sampling_mode: SamplingMode,
) -> EngineResult<BoxFilterResult> {
    if !sampling_mode.uses_box_filter() {
        debug!(
            target: "bitmap_ops::box_filter",
            sampling = sampling_mode.as_str(),
            "sampling mode does not box filter"
        );
        return Ok(BoxFilterResult::unchanged(input_width, input_height, input_stride));
    }
    let Some(kernels) = format.kernels() else {
        debug!(
            target: "bitmap_ops::box_filter",
            %format,
            "no box filter for pixel format"
        );
        return Ok(BoxFilterResult::unchanged(input_width, input_height, input_stride));
    };
    downscale_with_kernels(
        kernels,
        pixels,
        input_width,
        input_height,
        input_stride,
        desired_width,
        desired_height,
        dimension_test_for_fitting_mode(fitting_mode),
    )
}

#[allow(clippy::too_many_arguments)]
fn downscale_with_kernels(
    kernels: &PixelKernels,
    pixels: &mut [u8],
    input_width: u32,
    input_height: u32,
    input_stride: u32,
    desired_width: u32,
    desired_height: u32,
    test: BoxDimensionTest,
) -> EngineResult<BoxFilterResult> {
    let unchanged = BoxFilterResult::unchanged(input_width, input_height, input_stride);
    if input_width == 0 || input_height == 0 {
        return Ok(unchanged);
    }
    debug_assert!(input_stride >= input_width, "stride shorter than width");
    let bpp = kernels.bytes_per_pixel;
    ensure_len(
        pixels.len(),
        required_len(input_width, input_height, input_stride, bpp)?,
    )?;
    if desired_width > input_width || desired_height > input_height {
        debug!(
            target: "bitmap_ops::box_filter",
            input_width, input_height, desired_width, desired_height,
            "box filter cannot upscale"
        );
    }
    if !continue_scaling(test, input_width, input_height, desired_width, desired_height) {
        return Ok(unchanged);
    }

    // The first pass produces the widest output row.
    let mut scratch = try_alloc_zeroed((input_width >> 1) as usize * bpp)?;
    let mut width = input_width;
    let mut height = input_height;
    let mut row_pitch = input_stride as usize * bpp;

    while continue_scaling(test, width, height, desired_width, desired_height) {
        let last_width = width;
        width >>= 1;
        height >>= 1;
        let in_row = last_width as usize * bpp;
        let out_row = width as usize * bpp;
        let averaged = &mut scratch[..out_row];

        for y in 0..height as usize {
            let upper = y * 2 * row_pitch;
            let lower = upper + row_pitch;
            (kernels.halve_scanline)(&mut pixels[upper..upper + in_row], last_width);
            (kernels.halve_scanline)(&mut pixels[lower..lower + in_row], last_width);
            (kernels.average_scanlines)(
                &pixels[upper..upper + out_row],
                &pixels[lower..lower + out_row],
                averaged,
                width,
            );
            pixels[y * out_row..(y + 1) * out_row].copy_from_slice(averaged);
        }

        trace!(
            target: "bitmap_ops::box_filter",
            from_width = last_width, width, height,
            "halved"
        );
        row_pitch = out_row;
    }

    Ok(BoxFilterResult {
        width,
        height,
        stride: width,
    })
}

macro_rules! format_downscaler {
    ($(#[$doc:meta])* $name:ident, $format:expr) => {
        $(#[$doc])*
        #[allow(clippy::too_many_arguments)]
        pub fn $name(
            pixels: &mut [u8],
            input_width: u32,
            input_height: u32,
            input_stride: u32,
            desired_width: u32,
            desired_height: u32,
            test: BoxDimensionTest,
        ) -> EngineResult<BoxFilterResult> {
            let unchanged = BoxFilterResult::unchanged(input_width, input_height, input_stride);
            match kernels::kernels_for($format) {
                Some(kernels) => downscale_with_kernels(
                    kernels,
                    pixels,
                    input_width,
                    input_height,
                    input_stride,
                    desired_width,
                    desired_height,
                    test,
                ),
                None => Ok(unchanged),
            }
        }
    };
}

format_downscaler!(
    /// Box filter packed 3-byte RGB.
    downscale_in_place_pow2_rgb888,
    PixelFormat::RGB888
);
format_downscaler!(
    /// Box filter 4-byte pixels of any channel order.
    downscale_in_place_pow2_rgba8888,
    PixelFormat::RGBA8888
);
format_downscaler!(downscale_in_place_pow2_rgb565, PixelFormat::RGB565);
format_downscaler!(
    /// Box filter two independent 8-bit components per pixel (e.g. luminance + alpha).
    downscale_in_place_pow2_component_pair,
    PixelFormat::LA88
);
format_downscaler!(downscale_in_place_pow2_single_byte_per_pixel, PixelFormat::L8);

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_square(width: u32, height: u32) -> Vec<u8> {
        (0..width as usize * height as usize * 4)
            .map(|i| (i * 7 % 256) as u8)
            .collect()
    }

    fn both(
        width: u32,
        height: u32,
        desired_width: u32,
        desired_height: u32,
    ) -> (u32, u32) {
        let mut pixels = rgba_square(width, height);
        downscale_in_place_pow2_rgba8888(
            &mut pixels,
            width,
            height,
            width,
            desired_width,
            desired_height,
            BoxDimensionTest::Both,
        )
        .unwrap()
        .dimensions()
    }

    mod continue_scaling_tests {
        use super::*;

        #[test]
        fn never_halves_to_zero() {
            assert!(!continue_scaling(BoxDimensionTest::Either, 1, 100, 0, 0));
            assert!(!continue_scaling(BoxDimensionTest::Both, 100, 1, 0, 0));
            assert!(continue_scaling(BoxDimensionTest::Both, 2, 2, 0, 0));
        }

        #[test]
        fn tests_select_dimensions() {
            // next = (50, 10)
            assert!(continue_scaling(BoxDimensionTest::Either, 100, 20, 40, 40));
            assert!(!continue_scaling(BoxDimensionTest::Both, 100, 20, 40, 40));
            assert!(continue_scaling(BoxDimensionTest::X, 100, 20, 40, 40));
            assert!(!continue_scaling(BoxDimensionTest::Y, 100, 20, 40, 40));
        }
    }

    mod dimension_tests {
        use super::*;

        #[test]
        fn both_test_dimension_table() {
            assert_eq!(both(600, 600, 75, 75), (75, 75));
            assert_eq!(both(601, 603, 75, 75), (75, 75));
            assert_eq!(both(737, 355, 23, 11), (23, 11));
            assert_eq!(both(387, 897, 3, 7), (3, 7));
            assert_eq!(both(63, 31, 7, 3), (7, 3));
            assert_eq!(both(63, 31, 4, 2), (7, 3));
            assert_eq!(both(15, 127, 4, 32), (7, 63));
            assert_eq!(both(512, 32, 7, 1), (16, 1));
            assert_eq!(both(32, 512, 1, 1), (1, 16));
            assert_eq!(both(33, 33, 3, 1), (4, 4));
            assert_eq!(both(33, 9, 3, 1), (4, 1));
        }

        #[test]
        fn zero_desired_size_halves_to_one_pixel_edge() {
            assert_eq!(both(512, 256, 0, 0), (2, 1));
            assert_eq!(both(2, 512, 0, 0), (1, 256));
        }

        #[test]
        fn upscale_request_is_a_no_op() {
            let mut pixels = rgba_square(300, 300);
            let before = pixels.clone();
            let result = downscale_in_place_pow2_rgba8888(
                &mut pixels,
                300,
                300,
                300,
                600,
                600,
                BoxDimensionTest::Both,
            )
            .unwrap();
            assert_eq!(result, BoxFilterResult::unchanged(300, 300, 300));
            assert_eq!(pixels, before);
        }

        #[test]
        fn rgb888_dimension_table() {
            for (size, desired, expected) in [(352, (44, 11), 44), (384, (3, 48), 48)] {
                let mut pixels = vec![0x40u8; size * size * 3];
                let result = downscale_in_place_pow2_rgb888(
                    &mut pixels,
                    size as u32,
                    size as u32,
                    size as u32,
                    desired.0,
                    desired.1,
                    BoxDimensionTest::Both,
                )
                .unwrap();
                assert_eq!(result.dimensions(), (expected, expected));
                assert_eq!(result.stride, expected);
            }
        }

        #[test]
        fn shrink_to_fit_square_table() {
            for (source, target, expected) in [
                (1024u32, 8u32, 8u32),
                (773, 1, 1),
                (47, 7, 11),
                (73, 17, 18),
                (61, 8, 15),
                (19, 5, 9),
                (353, 23, 44),
            ] {
                let mut pixels = rgba_square(source, source);
                let result = downscale_in_place_pow2(
                    &mut pixels,
                    PixelFormat::RGBA8888,
                    source,
                    source,
                    source,
                    target,
                    target,
                    FittingMode::ShrinkToFit,
                    SamplingMode::Box,
                )
                .unwrap();
                assert_eq!(result.dimensions(), (expected, expected), "source {source}");
            }
        }
    }

    mod pixel_tests {
        use super::*;

        #[test]
        fn checkerboard_averages_to_grey() {
            let mut pixels = Vec::with_capacity(4 * 4 * 3);
            for y in 0..4 {
                for x in 0..4 {
                    let value = if (x + y) % 2 == 0 { 0xff } else { 0 };
                    pixels.extend_from_slice(&[value; 3]);
                }
            }
            let result =
                downscale_in_place_pow2_rgb888(&mut pixels, 4, 4, 4, 1, 1, BoxDimensionTest::Both)
                    .unwrap();
            assert_eq!(result.dimensions(), (1, 1));
            assert_eq!(&pixels[..3], &[0x7f, 0x7f, 0x7f]);
        }

        #[test]
        fn single_white_pixel_fades() {
            let mut pixels = vec![0u8; 4 * 4 * 4];
            pixels[..4].copy_from_slice(&[0xff; 4]);
            let result = downscale_in_place_pow2_rgba8888(
                &mut pixels,
                4,
                4,
                4,
                1,
                1,
                BoxDimensionTest::Both,
            )
            .unwrap();
            assert_eq!(result.dimensions(), (1, 1));
            assert_eq!(&pixels[..4], &[0x0f; 4]);
        }

        #[test]
        fn stride_gap_matches_packed_input() {
            let (width, height, stride) = (8u32, 6u32, 11u32);
            let packed: Vec<u8> = (0..width * height).map(|i| (i * 5) as u8).collect();
            let mut padded = vec![0xaau8; (stride * height) as usize];
            for y in 0..height as usize {
                let w = width as usize;
                padded[y * stride as usize..y * stride as usize + w]
                    .copy_from_slice(&packed[y * w..(y + 1) * w]);
            }
            let mut packed_work = packed.clone();

            let a = downscale_in_place_pow2_single_byte_per_pixel(
                &mut packed_work,
                width,
                height,
                width,
                2,
                2,
                BoxDimensionTest::Both,
            )
            .unwrap();
            let b = downscale_in_place_pow2_single_byte_per_pixel(
                &mut padded,
                width,
                height,
                stride,
                2,
                2,
                BoxDimensionTest::Both,
            )
            .unwrap();

            assert_eq!(a, b);
            assert_eq!(a.dimensions(), (4, 3));
            let len = (a.width * a.height) as usize;
            assert_eq!(&packed_work[..len], &padded[..len]);
        }

        #[test]
        fn rgb565_and_component_pair_shrink() {
            let mut rgb565 = vec![0xffu8; 8 * 8 * 2];
            let result =
                downscale_in_place_pow2_rgb565(&mut rgb565, 8, 8, 8, 2, 2, BoxDimensionTest::Both)
                    .unwrap();
            assert_eq!(result.dimensions(), (2, 2));
            assert!(rgb565[..8].iter().all(|&b| b == 0xff));

            let mut pair = vec![0x20u8; 8 * 8 * 2];
            let result = downscale_in_place_pow2_component_pair(
                &mut pair,
                8,
                8,
                8,
                4,
                4,
                BoxDimensionTest::Either,
            )
            .unwrap();
            assert_eq!(result.dimensions(), (4, 4));
            assert!(pair[..32].iter().all(|&b| b == 0x20));
        }
    }

    mod policy_tests {
        use super::*;

        #[test]
        fn non_box_sampling_is_untouched() {
            let mut pixels = rgba_square(16, 16);
            let before = pixels.clone();
            for mode in [
                SamplingMode::Nearest,
                SamplingMode::Linear,
                SamplingMode::NoFilter,
                SamplingMode::Lanczos,
            ] {
                let result = downscale_in_place_pow2(
                    &mut pixels,
                    PixelFormat::RGBA8888,
                    16,
                    16,
                    16,
                    2,
                    2,
                    FittingMode::ShrinkToFit,
                    mode,
                )
                .unwrap();
                assert_eq!(result.dimensions(), (16, 16));
            }
            assert_eq!(pixels, before);
        }

        #[test]
        fn unsupported_format_is_untouched() {
            let mut pixels = vec![1u8; 16 * 16 * 2];
            let result = downscale_in_place_pow2(
                &mut pixels,
                PixelFormat::RGBA4444,
                16,
                16,
                16,
                2,
                2,
                FittingMode::ScaleToFill,
                SamplingMode::BoxThenLinear,
            )
            .unwrap();
            assert_eq!(result, BoxFilterResult::unchanged(16, 16, 16));
        }

        #[test]
        fn short_buffer_is_an_error() {
            let mut pixels = vec![0u8; 10];
            let err = downscale_in_place_pow2_single_byte_per_pixel(
                &mut pixels,
                4,
                4,
                4,
                1,
                1,
                BoxDimensionTest::Both,
            )
            .unwrap_err();
            assert!(matches!(err, crate::error::BitmapOpsError::BufferTooSmall { .. }));
        }

        #[test]
        fn fitting_mode_selects_axis() {
            // Wide image: FitHeight only cares about height.
            let mut pixels = vec![0u8; 64 * 8];
            let result = downscale_in_place_pow2(
                &mut pixels,
                PixelFormat::L8,
                64,
                8,
                64,
                2,
                4,
                FittingMode::FitHeight,
                SamplingMode::Box,
            )
            .unwrap();
            assert_eq!(result.dimensions(), (32, 4));
        }
    }
}
