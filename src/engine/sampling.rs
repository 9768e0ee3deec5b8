// src/engine/sampling.rs
//
// Point (nearest) and bilinear samplers.
//
// Both walk the output image in whole pixels while tracking the matching input
// position in 16.16 fixed point. Deltas are computed in 64 bits so 65535-wide
// inputs cannot overflow the shift. Sample indices are clamped to the last
// row/column, so upscaling never reads past the image.

use crate::engine::buffer::PixelFormat;
use crate::engine::common::{ensure_len, packed_len, required_len, EngineResult};
use crate::engine::kernels::PixelKernels;
use crate::ops::ImageDimensions;
use tracing::{trace, warn};

/// Input and output geometry shared by every sampler.
#[derive(Clone, Copy, Debug)]
struct SampleGeometry {
    in_width: usize,
    in_height: usize,
    in_stride: usize,
    out_width: usize,
    out_height: usize,
    delta_x: u64,
    delta_y: u64,
}

impl SampleGeometry {
    /// None when either image is empty.
    fn new(src_dims: ImageDimensions, src_stride: u32, dst_dims: ImageDimensions) -> Option<Self> {
        if src_dims.is_zero_area() || dst_dims.is_zero_area() {
            return None;
        }
        let (in_width, in_height) = (src_dims.width_u32() as u64, src_dims.height_u32() as u64);
        let (out_width, out_height) = (dst_dims.width_u32() as u64, dst_dims.height_u32() as u64);
        Some(Self {
            in_width: in_width as usize,
            in_height: in_height as usize,
            in_stride: (src_stride as usize).max(in_width as usize),
            out_width: out_width as usize,
            out_height: out_height as usize,
            delta_x: (in_width << 16) / out_width,
            delta_y: (in_height << 16) / out_height,
        })
    }

    fn check_buffers(&self, src: &[u8], dst: &[u8], bytes_per_pixel: usize) -> EngineResult<()> {
        ensure_len(
            src.len(),
            required_len(
                self.in_width as u32,
                self.in_height as u32,
                self.in_stride as u32,
                bytes_per_pixel,
            )?,
        )?;
        ensure_len(
            dst.len(),
            packed_len(self.out_width as u32, self.out_height as u32, bytes_per_pixel)?,
        )
    }
}

/// Round a 16.16 coordinate to the nearest index, clamped to `len - 1`.
#[inline]
fn nearest_index(coord: u64, len: usize) -> usize {
    (((coord + 0x8000) >> 16) as usize).min(len - 1)
}

/// Integer part of a 16.16 coordinate and its clamped right/lower neighbour.
#[inline]
fn neighbour_indices(coord: u64, len: usize) -> (usize, usize) {
    let first = ((coord >> 16) as usize).min(len - 1);
    (first, (first + 1).min(len - 1))
}

fn point_sample_pixels<const N: usize>(src: &[u8], dst: &mut [u8], geometry: &SampleGeometry) {
    let in_row = geometry.in_stride * N;
    let out_row = geometry.out_width * N;
    let mut in_y = 0u64;
    for out_scanline in dst.chunks_exact_mut(out_row).take(geometry.out_height) {
        let scanline = &src[nearest_index(in_y, geometry.in_height) * in_row..];
        let mut in_x = 0u64;
        for out_pixel in out_scanline.chunks_exact_mut(N) {
            let x = nearest_index(in_x, geometry.in_width) * N;
            out_pixel.copy_from_slice(&scanline[x..x + N]);
            in_x += geometry.delta_x;
        }
        in_y += geometry.delta_y;
    }
}

fn linear_sample_pixels(
    kernels: &PixelKernels,
    src: &[u8],
    dst: &mut [u8],
    geometry: &SampleGeometry,
) {
    let bpp = kernels.bytes_per_pixel;
    let in_row = geometry.in_stride * bpp;
    let out_row = geometry.out_width * bpp;
    let mut in_y = 0u64;
    for out_scanline in dst.chunks_exact_mut(out_row).take(geometry.out_height) {
        let (y1, y2) = neighbour_indices(in_y, geometry.in_height);
        let weight_y = (in_y & 0xffff) as u32;
        let scanline1 = &src[y1 * in_row..];
        let scanline2 = &src[y2 * in_row..];

        let mut in_x = 0u64;
        for out_pixel in out_scanline.chunks_exact_mut(bpp) {
            let (x1, x2) = neighbour_indices(in_x, geometry.in_width);
            let (x1, x2) = (x1 * bpp, x2 * bpp);
            (kernels.bilinear)(
                &scanline1[x1..x1 + bpp],
                &scanline1[x2..x2 + bpp],
                &scanline2[x1..x1 + bpp],
                &scanline2[x2..x2 + bpp],
                (in_x & 0xffff) as u32,
                weight_y,
                out_pixel,
            );
            in_x += geometry.delta_x;
        }
        in_y += geometry.delta_y;
    }
}

/// Nearest-neighbour resample of `src` into the packed `dst`.
///
/// Formats without kernels are logged and left alone.
pub fn point_sample(
    src: &[u8],
    src_dims: ImageDimensions,
    src_stride: u32,
    format: PixelFormat,
    dst: &mut [u8],
    dst_dims: ImageDimensions,
) -> EngineResult<()> {
    let Some(kernels) = format.kernels() else {
        warn!(
            target: "bitmap_ops::sampling",
            %format,
            "bitmap was not point sampled: unsupported pixel format"
        );
        return Ok(());
    };
    let Some(geometry) = SampleGeometry::new(src_dims, src_stride, dst_dims) else {
        return Ok(());
    };
    geometry.check_buffers(src, dst, kernels.bytes_per_pixel)?;
    trace!(
        target: "bitmap_ops::sampling",
        %format,
        from = ?src_dims,
        to = ?dst_dims,
        "point sample"
    );
    match kernels.bytes_per_pixel {
        1 => point_sample_pixels::<1>(src, dst, &geometry),
        2 => point_sample_pixels::<2>(src, dst, &geometry),
        3 => point_sample_pixels::<3>(src, dst, &geometry),
        _ => point_sample_pixels::<4>(src, dst, &geometry),
    }
    Ok(())
}

/// Bilinear resample of `src` into the packed `dst`.
///
/// Formats without kernels are logged and left alone.
pub fn linear_sample(
    src: &[u8],
    src_dims: ImageDimensions,
    src_stride: u32,
    format: PixelFormat,
    dst: &mut [u8],
    dst_dims: ImageDimensions,
) -> EngineResult<()> {
    let Some(kernels) = format.kernels() else {
        warn!(
            target: "bitmap_ops::sampling",
            %format,
            "bitmap was not linear sampled: unsupported pixel format"
        );
        return Ok(());
    };
    linear_sample_with(kernels, src, src_dims, src_stride, dst, dst_dims)
}

fn linear_sample_with(
    kernels: &PixelKernels,
    src: &[u8],
    src_dims: ImageDimensions,
    src_stride: u32,
    dst: &mut [u8],
    dst_dims: ImageDimensions,
) -> EngineResult<()> {
    let Some(geometry) = SampleGeometry::new(src_dims, src_stride, dst_dims) else {
        return Ok(());
    };
    geometry.check_buffers(src, dst, kernels.bytes_per_pixel)?;
    trace!(
        target: "bitmap_ops::sampling",
        from = ?src_dims,
        to = ?dst_dims,
        "linear sample"
    );
    linear_sample_pixels(kernels, src, dst, &geometry);
    Ok(())
}

fn point_sample_packed<const N: usize>(
    src: &[u8],
    src_dims: ImageDimensions,
    dst: &mut [u8],
    dst_dims: ImageDimensions,
) -> EngineResult<()> {
    let Some(geometry) = SampleGeometry::new(src_dims, src_dims.width_u32(), dst_dims) else {
        return Ok(());
    };
    geometry.check_buffers(src, dst, N)?;
    point_sample_pixels::<N>(src, dst, &geometry);
    Ok(())
}

/// Point sample packed 4-byte pixels (RGBA8888, BGRA8888).
pub fn point_sample_4_bpp(
    src: &[u8],
    src_dims: ImageDimensions,
    dst: &mut [u8],
    dst_dims: ImageDimensions,
) -> EngineResult<()> {
    point_sample_packed::<4>(src, src_dims, dst, dst_dims)
}

/// Point sample packed RGB888 pixels.
pub fn point_sample_3_bpp(
    src: &[u8],
    src_dims: ImageDimensions,
    dst: &mut [u8],
    dst_dims: ImageDimensions,
) -> EngineResult<()> {
    point_sample_packed::<3>(src, src_dims, dst, dst_dims)
}

/// Point sample packed 2-byte pixels (RGB565, LA88).
pub fn point_sample_2_bpp(
    src: &[u8],
    src_dims: ImageDimensions,
    dst: &mut [u8],
    dst_dims: ImageDimensions,
) -> EngineResult<()> {
    point_sample_packed::<2>(src, src_dims, dst, dst_dims)
}

/// Point sample packed single-byte pixels (L8, A8).
pub fn point_sample_1_bpp(
    src: &[u8],
    src_dims: ImageDimensions,
    dst: &mut [u8],
    dst_dims: ImageDimensions,
) -> EngineResult<()> {
    point_sample_packed::<1>(src, src_dims, dst, dst_dims)
}

macro_rules! packed_linear_sampler {
    ($(#[$doc:meta])* $name:ident, $format:expr) => {
        $(#[$doc])*
        pub fn $name(
            src: &[u8],
            src_dims: ImageDimensions,
            dst: &mut [u8],
            dst_dims: ImageDimensions,
        ) -> EngineResult<()> {
            match $format.kernels() {
                Some(kernels) => {
                    linear_sample_with(kernels, src, src_dims, src_dims.width_u32(), dst, dst_dims)
                }
                None => Ok(()),
            }
        }
    };
}

packed_linear_sampler!(
    /// Bilinear sample packed 4-byte pixels of any channel order.
    linear_sample_4_bpp,
    PixelFormat::RGBA8888
);
packed_linear_sampler!(linear_sample_3_bpp, PixelFormat::RGB888);
packed_linear_sampler!(
    /// Bilinear sample two independent byte components per pixel.
    linear_sample_2_bpp,
    PixelFormat::LA88
);
packed_linear_sampler!(linear_sample_1_bpp, PixelFormat::L8);
packed_linear_sampler!(
    /// Bilinear sample packed 5:6:5 pixels, blending each field separately.
    linear_sample_rgb565,
    PixelFormat::RGB565
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BitmapOpsError;

    fn dims(width: u16, height: u16) -> ImageDimensions {
        ImageDimensions::new(width, height)
    }

    /// RGBA pixels whose red channel encodes the index.
    fn indexed_rgba(width: u16, height: u16) -> Vec<u8> {
        (0..width as usize * height as usize)
            .flat_map(|i| [i as u8, 0x11, 0x22, 0xff])
            .collect()
    }

    mod point_tests {
        use super::*;

        #[test]
        fn same_size_is_a_copy() {
            let src = indexed_rgba(5, 3);
            let mut dst = vec![0u8; src.len()];
            point_sample(&src, dims(5, 3), 5, PixelFormat::RGBA8888, &mut dst, dims(5, 3)).unwrap();
            assert_eq!(dst, src);
        }

        #[test]
        fn halving_picks_every_other_pixel() {
            let src: Vec<u8> = (0..16).collect();
            let mut dst = vec![0u8; 4];
            point_sample(&src, dims(4, 4), 4, PixelFormat::L8, &mut dst, dims(2, 2)).unwrap();
            assert_eq!(dst, vec![0, 2, 8, 10]);
        }

        #[test]
        fn upscaling_clamps_to_the_last_pixel() {
            let src = vec![10u8, 20];
            let mut dst = vec![0u8; 4];
            point_sample_1_bpp(&src, dims(2, 1), &mut dst, dims(4, 1)).unwrap();
            assert_eq!(dst, vec![10, 20, 20, 20]);
        }

        #[test]
        fn rgb888_keeps_components_together() {
            let src: Vec<u8> = (0..4 * 3).collect();
            let mut dst = vec![0u8; 2 * 3];
            point_sample_3_bpp(&src, dims(4, 1), &mut dst, dims(2, 1)).unwrap();
            assert_eq!(dst, vec![0, 1, 2, 6, 7, 8]);
        }

        #[test]
        fn stride_gap_is_skipped() {
            // 2x2 image, stride 3, padding bytes are 99.
            let src = vec![1u8, 2, 99, 3, 4];
            let mut dst = vec![0u8; 4];
            point_sample(&src, dims(2, 2), 3, PixelFormat::A8, &mut dst, dims(2, 2)).unwrap();
            assert_eq!(dst, vec![1, 2, 3, 4]);
        }

        #[test]
        fn two_byte_formats_sample_whole_pixels() {
            let src: Vec<u8> = vec![1, 2, 3, 4, 5, 6, 7, 8];
            let mut dst = vec![0u8; 4];
            point_sample_2_bpp(&src, dims(4, 1), &mut dst, dims(2, 1)).unwrap();
            assert_eq!(dst, vec![1, 2, 5, 6]);
        }

        #[test]
        fn four_byte_downscale() {
            let src = indexed_rgba(8, 1);
            let mut dst = vec![0u8; 8];
            point_sample_4_bpp(&src, dims(8, 1), &mut dst, dims(2, 1)).unwrap();
            assert_eq!(dst, vec![0, 0x11, 0x22, 0xff, 4, 0x11, 0x22, 0xff]);
        }
    }

    mod linear_tests {
        use super::*;

        #[test]
        fn same_size_is_a_copy() {
            let src = indexed_rgba(6, 4);
            let mut dst = vec![0u8; src.len()];
            linear_sample(&src, dims(6, 4), 6, PixelFormat::RGBA8888, &mut dst, dims(6, 4))
                .unwrap();
            assert_eq!(dst, src);
        }

        #[test]
        fn upscale_blends_neighbours() {
            let src = vec![0u8, 200];
            let mut dst = vec![0u8; 4];
            linear_sample_1_bpp(&src, dims(2, 1), &mut dst, dims(4, 1)).unwrap();
            assert_eq!(dst, vec![0, 100, 200, 200]);
        }

        #[test]
        fn vertical_blend() {
            let src = vec![0u8, 0, 100, 100];
            let mut dst = vec![0u8; 2 * 4];
            linear_sample(&src, dims(2, 2), 2, PixelFormat::L8, &mut dst, dims(2, 4)).unwrap();
            assert_eq!(dst, vec![0, 0, 50, 50, 100, 100, 100, 100]);
        }

        #[test]
        fn rgb565_and_pairs() {
            let white = 0xffffu16.to_ne_bytes();
            let src: Vec<u8> = white.iter().chain(white.iter()).copied().collect();
            let mut dst = vec![0u8; 6];
            linear_sample_rgb565(&src, dims(2, 1), &mut dst, dims(3, 1)).unwrap();
            assert!(dst.iter().all(|&b| b == 0xff));

            let src = vec![10u8, 20, 30, 40];
            let mut dst = vec![0u8; 2];
            linear_sample_2_bpp(&src, dims(2, 1), &mut dst, dims(1, 1)).unwrap();
            assert_eq!(dst, vec![10, 20]);
        }

        #[test]
        fn bgra_is_sampled_like_rgba() {
            let src = indexed_rgba(4, 4);
            let mut a = vec![0u8; 2 * 2 * 4];
            let mut b = vec![0u8; 2 * 2 * 4];
            linear_sample(&src, dims(4, 4), 4, PixelFormat::BGRA8888, &mut a, dims(2, 2)).unwrap();
            linear_sample_4_bpp(&src, dims(4, 4), &mut b, dims(2, 2)).unwrap();
            assert_eq!(a, b);
            linear_sample_3_bpp(&src, dims(4, 4), &mut b, dims(2, 2)).unwrap();
        }
    }

    mod policy_tests {
        use super::*;

        #[test]
        fn unsupported_format_leaves_output_untouched() {
            let src = vec![0xffu8; 32];
            let mut dst = vec![7u8; 8];
            point_sample(&src, dims(4, 4), 4, PixelFormat::RGBA4444, &mut dst, dims(2, 2))
                .unwrap();
            linear_sample(&src, dims(4, 4), 4, PixelFormat::RGBA5551, &mut dst, dims(2, 2))
                .unwrap();
            assert!(dst.iter().all(|&b| b == 7));
        }

        #[test]
        fn zero_dimensions_are_a_no_op() {
            let src = vec![1u8; 4];
            let mut dst = vec![7u8; 4];
            point_sample(&src, dims(0, 4), 0, PixelFormat::L8, &mut dst, dims(2, 2)).unwrap();
            linear_sample(&src, dims(2, 2), 2, PixelFormat::L8, &mut dst, dims(2, 0)).unwrap();
            assert!(dst.iter().all(|&b| b == 7));
        }

        #[test]
        fn short_buffers_are_rejected() {
            let src = vec![1u8; 3];
            let mut dst = vec![0u8; 4];
            let err = point_sample(&src, dims(2, 2), 2, PixelFormat::L8, &mut dst, dims(2, 2))
                .unwrap_err();
            assert!(matches!(err, BitmapOpsError::BufferTooSmall { expected: 4, actual: 3 }));

            let src = vec![1u8; 4];
            let mut dst = vec![0u8; 3];
            let err = linear_sample(&src, dims(2, 2), 2, PixelFormat::L8, &mut dst, dims(2, 2))
                .unwrap_err();
            assert!(matches!(err, BitmapOpsError::BufferTooSmall { expected: 4, actual: 3 }));
        }

        #[test]
        fn widest_inputs_do_not_overflow() {
            let src = vec![9u8; 65535];
            let mut dst = vec![0u8; 3];
            let (wide, narrow) = (dims(65535, 1), dims(3, 1));
            point_sample(&src, wide, 65535, PixelFormat::L8, &mut dst, narrow).unwrap();
            linear_sample(&src, wide, 65535, PixelFormat::L8, &mut dst, narrow).unwrap();
            assert_eq!(dst, vec![9, 9, 9]);
        }
    }
}
