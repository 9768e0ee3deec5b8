// src/engine/buffer.rs
//
// Owned pixel storage.
//
// A PixelBuffer is a contiguous byte buffer plus geometry. Rows are `stride`
// pixels apart; only the first `width` pixels of a row are image data.
// Invariants: stride >= width, and the buffer holds at least
// ((height - 1) * stride + width) * bytes_per_pixel bytes.

use crate::engine::common::{ensure_len, packed_len, required_len, try_alloc_zeroed, EngineResult};
use crate::engine::kernels::{self, PixelKernels};
use crate::error::BitmapOpsError;
use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};
use std::fmt;

/// Pixel layouts understood by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit luminance
    L8,
    /// 8-bit alpha
    A8,
    /// 8-bit luminance + 8-bit alpha
    LA88,
    /// Packed 16-bit 5:6:5
    RGB565,
    RGB888,
    RGBA8888,
    BGRA8888,
    /// Packed 16-bit 4:4:4:4 (no kernels)
    RGBA4444,
    /// Packed 16-bit 5:5:5:1 (no kernels)
    RGBA5551,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::L8 | Self::A8 => 1,
            Self::LA88 | Self::RGB565 | Self::RGBA4444 | Self::RGBA5551 => 2,
            Self::RGB888 => 3,
            Self::RGBA8888 | Self::BGRA8888 => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(
            self,
            Self::A8
                | Self::LA88
                | Self::RGBA8888
                | Self::BGRA8888
                | Self::RGBA4444
                | Self::RGBA5551
        )
    }

    /// Kernel table for this format, or None if no scaler supports it.
    pub fn kernels(self) -> Option<&'static PixelKernels> {
        kernels::kernels_for(self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::L8 => "L8",
            Self::A8 => "A8",
            Self::LA88 => "LA88",
            Self::RGB565 => "RGB565",
            Self::RGB888 => "RGB888",
            Self::RGBA8888 => "RGBA8888",
            Self::BGRA8888 => "BGRA8888",
            Self::RGBA4444 => "RGBA4444",
            Self::RGBA5551 => "RGBA5551",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl PixelBuffer {
    /// Allocate a zero-filled, tightly packed buffer.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> EngineResult<Self> {
        Self::with_stride(width, height, width, format)
    }

    /// Allocate a zero-filled buffer whose rows are `stride` pixels apart.
    pub fn with_stride(
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
    ) -> EngineResult<Self> {
        if stride < width {
            return Err(BitmapOpsError::invalid_stride(width, stride));
        }
        let len = packed_len(stride, height, format.bytes_per_pixel())?;
        Ok(Self {
            pixels: try_alloc_zeroed(len)?,
            width,
            height,
            stride,
            format,
        })
    }

    /// Wrap existing tightly packed pixel data.
    pub fn from_raw(
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: Vec<u8>,
    ) -> EngineResult<Self> {
        Self::from_raw_with_stride(width, height, width, format, pixels)
    }

    /// Wrap existing pixel data with rows `stride` pixels apart.
    pub fn from_raw_with_stride(
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
        pixels: Vec<u8>,
    ) -> EngineResult<Self> {
        if stride < width {
            return Err(BitmapOpsError::invalid_stride(width, stride));
        }
        let expected = required_len(width, height, stride, format.bytes_per_pixel())?;
        ensure_len(pixels.len(), expected)?;
        Ok(Self {
            pixels,
            width,
            height,
            stride,
            format,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }

    /// Whether rows are padded beyond the image width.
    pub fn has_stride_gap(&self) -> bool {
        self.stride != self.width
    }

    /// Image bytes of row `y` (without stride padding).
    ///
    /// # Panics
    /// Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &[u8] {
        let bpp = self.bytes_per_pixel();
        let start = y as usize * self.stride as usize * bpp;
        &self.pixels[start..start + self.width as usize * bpp]
    }

    /// Bytes of the pixel at (x, y).
    ///
    /// # Panics
    /// Panics if the coordinate is outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.bytes_per_pixel();
        let start = (y as usize * self.stride as usize + x as usize) * bpp;
        &self.pixels[start..start + bpp]
    }

    /// Copy of this buffer with the stride gap removed.
    pub fn to_packed(&self) -> EngineResult<PixelBuffer> {
        let bpp = self.bytes_per_pixel();
        let row_bytes = self.width as usize * bpp;
        let mut packed = try_alloc_zeroed(packed_len(self.width, self.height, bpp)?)?;
        if row_bytes > 0 {
            for (y, dst) in packed.chunks_exact_mut(row_bytes).enumerate() {
                dst.copy_from_slice(self.row(y as u32));
            }
        }
        PixelBuffer::from_raw(self.width, self.height, self.format, packed)
    }

    /// Deep copy that reports allocation failure instead of aborting.
    pub fn try_clone(&self) -> EngineResult<PixelBuffer> {
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(self.pixels.len())
            .map_err(|_| BitmapOpsError::allocation_failed(self.pixels.len()))?;
        pixels.extend_from_slice(&self.pixels);
        Ok(Self { pixels, ..*self })
    }

    /// Convert a decoded image. Layouts without a direct equivalent go through RGBA8888.
    pub fn from_dynamic_image(img: &DynamicImage) -> EngineResult<Self> {
        let (width, height) = (img.width(), img.height());
        let (format, pixels) = match img {
            DynamicImage::ImageLuma8(gray) => (PixelFormat::L8, gray.as_raw().clone()),
            DynamicImage::ImageLumaA8(gray_alpha) => {
                (PixelFormat::LA88, gray_alpha.as_raw().clone())
            }
            DynamicImage::ImageRgb8(rgb) => (PixelFormat::RGB888, rgb.as_raw().clone()),
            DynamicImage::ImageRgba8(rgba) => (PixelFormat::RGBA8888, rgba.as_raw().clone()),
            other => (PixelFormat::RGBA8888, other.to_rgba8().into_raw()),
        };
        Self::from_raw(width, height, format, pixels)
    }

    /// Convert into a DynamicImage for encoding or inspection.
    pub fn to_dynamic_image(&self) -> EngineResult<DynamicImage> {
        let packed = if self.has_stride_gap() {
            self.to_packed()?.into_raw()
        } else {
            let len = packed_len(self.width, self.height, self.bytes_per_pixel())?;
            self.pixels[..len].to_vec()
        };
        let (w, h) = (self.width, self.height);
        let mismatch = || BitmapOpsError::internal_panic("pixel data does not match image size");
        let image = match self.format {
            PixelFormat::L8 => {
                DynamicImage::ImageLuma8(GrayImage::from_raw(w, h, packed).ok_or_else(mismatch)?)
            }
            PixelFormat::LA88 => DynamicImage::ImageLumaA8(
                GrayAlphaImage::from_raw(w, h, packed).ok_or_else(mismatch)?,
            ),
            PixelFormat::RGB888 => {
                DynamicImage::ImageRgb8(RgbImage::from_raw(w, h, packed).ok_or_else(mismatch)?)
            }
            PixelFormat::RGBA8888 => {
                DynamicImage::ImageRgba8(RgbaImage::from_raw(w, h, packed).ok_or_else(mismatch)?)
            }
            PixelFormat::BGRA8888 => {
                let mut rgba = packed;
                for px in rgba.chunks_exact_mut(4) {
                    px.swap(0, 2);
                }
                DynamicImage::ImageRgba8(RgbaImage::from_raw(w, h, rgba).ok_or_else(mismatch)?)
            }
            other => {
                return Err(BitmapOpsError::unsupported_pixel_format(
                    other.as_str(),
                    "to_dynamic_image",
                ))
            }
        };
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32, format: PixelFormat) -> PixelBuffer {
        let bpp = format.bytes_per_pixel();
        let pixels = (0..width as usize * height as usize * bpp)
            .map(|i| (i % 251) as u8)
            .collect();
        PixelBuffer::from_raw(width, height, format, pixels).unwrap()
    }

    mod format_tests {
        use super::*;

        #[test]
        fn bytes_per_pixel_table() {
            assert_eq!(PixelFormat::L8.bytes_per_pixel(), 1);
            assert_eq!(PixelFormat::A8.bytes_per_pixel(), 1);
            assert_eq!(PixelFormat::LA88.bytes_per_pixel(), 2);
            assert_eq!(PixelFormat::RGB565.bytes_per_pixel(), 2);
            assert_eq!(PixelFormat::RGB888.bytes_per_pixel(), 3);
            assert_eq!(PixelFormat::RGBA8888.bytes_per_pixel(), 4);
            assert_eq!(PixelFormat::BGRA8888.bytes_per_pixel(), 4);
            assert_eq!(PixelFormat::RGBA4444.bytes_per_pixel(), 2);
        }

        #[test]
        fn kernel_support_matches_bpp() {
            for format in [
                PixelFormat::L8,
                PixelFormat::A8,
                PixelFormat::LA88,
                PixelFormat::RGB565,
                PixelFormat::RGB888,
                PixelFormat::RGBA8888,
                PixelFormat::BGRA8888,
            ] {
                let kernels = format.kernels().expect("supported format");
                assert_eq!(kernels.bytes_per_pixel, format.bytes_per_pixel());
            }
            assert!(PixelFormat::RGBA4444.kernels().is_none());
            assert!(PixelFormat::RGBA5551.kernels().is_none());
        }

        #[test]
        fn alpha_flags() {
            assert!(PixelFormat::RGBA8888.has_alpha());
            assert!(PixelFormat::A8.has_alpha());
            assert!(!PixelFormat::RGB565.has_alpha());
            assert!(!PixelFormat::L8.has_alpha());
        }
    }

    mod construction_tests {
        use super::*;

        #[test]
        fn new_is_zeroed_and_packed() {
            let buf = PixelBuffer::new(3, 2, PixelFormat::RGB888).unwrap();
            assert_eq!(buf.pixels().len(), 18);
            assert_eq!(buf.stride(), 3);
            assert!(!buf.has_stride_gap());
            assert!(buf.pixels().iter().all(|&b| b == 0));
        }

        #[test]
        fn stride_smaller_than_width_is_rejected() {
            let err = PixelBuffer::with_stride(8, 2, 4, PixelFormat::L8).unwrap_err();
            assert!(matches!(err, BitmapOpsError::InvalidStride { width: 8, stride: 4 }));
        }

        #[test]
        fn from_raw_checks_length() {
            let err = PixelBuffer::from_raw(4, 4, PixelFormat::RGBA8888, vec![0; 63]).unwrap_err();
            assert!(matches!(
                err,
                BitmapOpsError::BufferTooSmall { expected: 64, actual: 63 }
            ));
        }

        #[test]
        fn from_raw_with_stride_accepts_short_last_row() {
            // Two rows of stride 4, width 2: the last row needs only 2 pixels.
            let buf =
                PixelBuffer::from_raw_with_stride(2, 2, 4, PixelFormat::L8, vec![1, 2, 0, 0, 3, 4])
                    .unwrap();
            assert_eq!(buf.row(0), &[1, 2]);
            assert_eq!(buf.row(1), &[3, 4]);
            assert_eq!(buf.pixel(1, 1), &[4]);
        }

        #[test]
        fn zero_sized_buffers_are_allowed() {
            let buf = PixelBuffer::new(0, 0, PixelFormat::RGBA8888).unwrap();
            assert!(buf.pixels().is_empty());
        }

        #[test]
        fn to_packed_drops_stride_gap() {
            let buf = PixelBuffer::from_raw_with_stride(
                2,
                2,
                3,
                PixelFormat::L8,
                vec![1, 2, 99, 3, 4, 99],
            )
            .unwrap();
            let packed = buf.to_packed().unwrap();
            assert_eq!(packed.pixels(), &[1, 2, 3, 4]);
            assert_eq!(packed.stride(), 2);
        }

        #[test]
        fn try_clone_keeps_geometry() {
            let buf = gradient(3, 2, PixelFormat::RGB565);
            assert_eq!(buf.try_clone().unwrap(), buf);
        }
    }

    mod interop_tests {
        use super::*;

        #[test]
        fn rgba_round_trips_through_dynamic_image() {
            let buf = gradient(5, 3, PixelFormat::RGBA8888);
            let img = buf.to_dynamic_image().unwrap();
            assert!(matches!(img, DynamicImage::ImageRgba8(_)));
            let back = PixelBuffer::from_dynamic_image(&img).unwrap();
            assert_eq!(back, buf);
        }

        #[test]
        fn luma_maps_to_l8() {
            let img = DynamicImage::ImageLuma8(GrayImage::from_fn(4, 4, |x, y| {
                image::Luma([(x * 16 + y) as u8])
            }));
            let buf = PixelBuffer::from_dynamic_image(&img).unwrap();
            assert_eq!(buf.format(), PixelFormat::L8);
            assert_eq!(buf.pixel(2, 1), &[33]);
        }

        #[test]
        fn other_layouts_become_rgba() {
            let img = DynamicImage::ImageRgb16(image::ImageBuffer::new(2, 2));
            let buf = PixelBuffer::from_dynamic_image(&img).unwrap();
            assert_eq!(buf.format(), PixelFormat::RGBA8888);
            assert_eq!(buf.dimensions(), (2, 2));
        }

        #[test]
        fn bgra_is_swizzled() {
            let buf =
                PixelBuffer::from_raw(1, 1, PixelFormat::BGRA8888, vec![10, 20, 30, 40]).unwrap();
            let img = buf.to_dynamic_image().unwrap();
            assert_eq!(img.to_rgba8().as_raw(), &vec![30, 20, 10, 40]);
        }

        #[test]
        fn packed_16_bit_formats_are_not_convertible() {
            let buf = PixelBuffer::new(2, 2, PixelFormat::RGB565).unwrap();
            let err = buf.to_dynamic_image().unwrap_err();
            assert!(matches!(err, BitmapOpsError::UnsupportedPixelFormat { .. }));
        }
    }
}
