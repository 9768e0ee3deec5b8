// src/engine/rotation.rs
//
// Rotation engine: exact quarter-turn remaps, plus a three-pass shear
// (horizontal, vertical, horizontal) for every other angle.
// Each stage allocates a fresh, tightly packed buffer. Intermediates are owned
// by the stage that consumes them and are released on every exit path.

use crate::engine::buffer::PixelBuffer;
use crate::engine::common::{ensure_len, packed_len, required_len, try_alloc_zeroed, EngineResult};
use crate::error::BitmapOpsError;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};
use tracing::{debug, trace};

/// Slant used for glyphs rendered with software italics (12 degrees).
pub const SOFTWARE_ITALIC_ANGLE: f32 = 12.0 * PI / 180.0;

/// Angles closer to zero than this are treated as no rotation.
pub const MACHINE_EPSILON_10: f32 = 10.0 * f32::EPSILON;

const RAD_135: f32 = 3.0 * FRAC_PI_4;
const RAD_225: f32 = 5.0 * FRAC_PI_4;
const RAD_270: f32 = 3.0 * FRAC_PI_2;
const RAD_315: f32 = 7.0 * FRAC_PI_4;

const MAX_PIXEL_SIZE: usize = 4;

/// Output of a rotation or shear: tightly packed pixels and their size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RotatedPixels {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

// ============================================================================
// Source geometry
// ============================================================================

#[derive(Clone, Copy)]
struct Plane<'a> {
    pixels: &'a [u8],
    width: usize,
    height: usize,
    stride: usize,
    pixel_size: usize,
}

impl<'a> Plane<'a> {
    fn new(
        pixels: &'a [u8],
        width: u32,
        height: u32,
        stride: u32,
        pixel_size: u32,
    ) -> EngineResult<Self> {
        let pixel_size = pixel_size as usize;
        if !(1..=MAX_PIXEL_SIZE).contains(&pixel_size) {
            return Err(BitmapOpsError::invalid_argument(
                "pixel_size",
                pixel_size.to_string(),
                "Expected 1 to 4 bytes per pixel",
            ));
        }
        if stride < width {
            return Err(BitmapOpsError::invalid_stride(width, stride));
        }
        ensure_len(pixels.len(), required_len(width, height, stride, pixel_size)?)?;
        Ok(Self {
            pixels,
            width: width as usize,
            height: height as usize,
            stride: stride as usize,
            pixel_size,
        })
    }

    fn packed(rotated: &'a RotatedPixels, pixel_size: usize) -> Self {
        Self {
            pixels: &rotated.pixels,
            width: rotated.width as usize,
            height: rotated.height as usize,
            stride: rotated.width as usize,
            pixel_size,
        }
    }

    #[inline]
    fn pixel(&self, x: usize, y: usize) -> &'a [u8] {
        let start = (y * self.stride + x) * self.pixel_size;
        &self.pixels[start..start + self.pixel_size]
    }
}

fn allocate(width: usize, height: usize, pixel_size: usize) -> EngineResult<Vec<u8>> {
    try_alloc_zeroed(packed_len(width as u32, height as u32, pixel_size)?)
}

#[inline]
fn pixel_mut(dst: &mut [u8], dst_width: usize, pixel_size: usize, x: usize, y: usize) -> &mut [u8] {
    let start = (y * dst_width + x) * pixel_size;
    &mut dst[start..start + pixel_size]
}

// ============================================================================
// Quarter turns
// ============================================================================

/// Copy every source pixel to the position `destination(x, y)` of a new
/// `out_width x out_height` buffer.
fn remap(
    src: &Plane<'_>,
    out_width: usize,
    out_height: usize,
    destination: impl Fn(usize, usize) -> (usize, usize),
) -> EngineResult<RotatedPixels> {
    let pixel_size = src.pixel_size;
    let mut pixels = allocate(out_width, out_height, pixel_size)?;
    for y in 0..src.height {
        for x in 0..src.width {
            let (dx, dy) = destination(x, y);
            pixel_mut(&mut pixels, out_width, pixel_size, dx, dy).copy_from_slice(src.pixel(x, y));
        }
    }
    Ok(RotatedPixels {
        pixels,
        width: out_width as u32,
        height: out_height as u32,
    })
}

fn copy_packed(src: &Plane<'_>) -> EngineResult<RotatedPixels> {
    remap(src, src.width, src.height, |x, y| (x, y))
}

fn rotate_plane_90(src: &Plane<'_>) -> EngineResult<RotatedPixels> {
    let (width, height) = (src.width, src.height);
    remap(src, height, width, |x, y| (y, width - 1 - x))
}

fn rotate_plane_180(src: &Plane<'_>) -> EngineResult<RotatedPixels> {
    let (width, height) = (src.width, src.height);
    remap(src, width, height, |x, y| (width - 1 - x, height - 1 - y))
}

fn rotate_plane_270(src: &Plane<'_>) -> EngineResult<RotatedPixels> {
    let (width, height) = (src.width, src.height);
    remap(src, height, width, |x, y| (height - 1 - y, x))
}

/// Rotate 90 degrees counter-clockwise. Output is `height x width`.
pub fn rotate_90(
    pixels: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    pixel_size: u32,
) -> EngineResult<RotatedPixels> {
    rotate_plane_90(&Plane::new(pixels, width, height, stride, pixel_size)?)
}

/// Rotate 180 degrees. Output keeps the input size.
pub fn rotate_180(
    pixels: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    pixel_size: u32,
) -> EngineResult<RotatedPixels> {
    rotate_plane_180(&Plane::new(pixels, width, height, stride, pixel_size)?)
}

/// Rotate 270 degrees counter-clockwise. Output is `height x width`.
pub fn rotate_270(
    pixels: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    pixel_size: u32,
) -> EngineResult<RotatedPixels> {
    rotate_plane_270(&Plane::new(pixels, width, height, stride, pixel_size)?)
}

// ============================================================================
// Skews
// ============================================================================

/// Move `weight` of every channel into the returned leftover and add the
/// leftover of the previous pixel back in.
#[inline]
fn split_weight(
    pixel: &mut [u8; MAX_PIXEL_SIZE],
    old_left: &[u8; MAX_PIXEL_SIZE],
    weight: f32,
) -> [u8; MAX_PIXEL_SIZE] {
    let mut left = [0u8; MAX_PIXEL_SIZE];
    for ((value, left), old) in pixel.iter_mut().zip(left.iter_mut()).zip(old_left) {
        *left = (*value as f32 * weight) as u8;
        *value = value.wrapping_sub(*left).wrapping_add(*old);
    }
    left
}

#[inline]
fn load(src: &Plane<'_>, x: usize, y: usize) -> [u8; MAX_PIXEL_SIZE] {
    let mut pixel = [0u8; MAX_PIXEL_SIZE];
    pixel[..src.pixel_size].copy_from_slice(src.pixel(x, y));
    pixel
}

/// Shift source row `row` right by `offset + weight` pixels into `dst`.
///
/// The leading gap and everything after the trailing leftover are cleared.
fn horizontal_skew(
    src: &Plane<'_>,
    dst: &mut [u8],
    dst_width: usize,
    row: usize,
    offset: i64,
    weight: f32,
) {
    let pixel_size = src.pixel_size;
    let row_bytes = dst_width * pixel_size;
    let dst_row = &mut dst[row * row_bytes..(row + 1) * row_bytes];

    if offset > 0 {
        let gap = (offset as usize).min(dst_width);
        dst_row[..gap * pixel_size].fill(0);
    }

    let columns = 0..dst_width as i64;
    let mut old_left = [0u8; MAX_PIXEL_SIZE];
    for i in 0..src.width {
        let mut pixel = load(src, i, row);
        let left = split_weight(&mut pixel, &old_left, weight);
        let x = i as i64 + offset;
        if columns.contains(&x) {
            let start = x as usize * pixel_size;
            dst_row[start..start + pixel_size].copy_from_slice(&pixel[..pixel_size]);
        }
        old_left = left;
    }

    let end = src.width as i64 + offset;
    if columns.contains(&end) {
        let start = end as usize * pixel_size;
        dst_row[start..start + pixel_size].copy_from_slice(&old_left[..pixel_size]);
        dst_row[start + pixel_size..].fill(0);
    }
}

/// Shift source column `column` down by `offset + weight` pixels into `dst`.
fn vertical_skew(
    src: &Plane<'_>,
    dst: &mut [u8],
    dst_width: usize,
    dst_height: usize,
    column: usize,
    offset: i64,
    weight: f32,
) {
    let pixel_size = src.pixel_size;
    let rows = 0..dst_height as i64;

    for y in 0..offset.clamp(0, dst_height as i64) as usize {
        pixel_mut(dst, dst_width, pixel_size, column, y).fill(0);
    }

    let mut old_left = [0u8; MAX_PIXEL_SIZE];
    for i in 0..src.height {
        let mut pixel = load(src, column, i);
        let left = split_weight(&mut pixel, &old_left, weight);
        let y = i as i64 + offset;
        if rows.contains(&y) {
            pixel_mut(dst, dst_width, pixel_size, column, y as usize)
                .copy_from_slice(&pixel[..pixel_size]);
        }
        old_left = left;
    }

    let end = src.height as i64 + offset;
    if rows.contains(&end) {
        pixel_mut(dst, dst_width, pixel_size, column, end as usize)
            .copy_from_slice(&old_left[..pixel_size]);
    }
    for y in (end + 1).max(0) as usize..dst_height {
        pixel_mut(dst, dst_width, pixel_size, column, y).fill(0);
    }
}

/// Horizontal skew of every row, with the shear for each row supplied in order.
fn skew_rows(
    src: &Plane<'_>,
    dst_width: usize,
    mut shear_for_row: impl FnMut(usize) -> f32,
) -> EngineResult<RotatedPixels> {
    let dst_height = src.height;
    let mut pixels = allocate(dst_width, dst_height, src.pixel_size)?;
    for row in 0..dst_height {
        let shear = shear_for_row(row);
        let whole = shear.floor();
        horizontal_skew(src, &mut pixels, dst_width, row, whole as i64, shear - whole);
    }
    Ok(RotatedPixels {
        pixels,
        width: dst_width as u32,
        height: dst_height as u32,
    })
}

/// Vertical skew of every column, with the shear for each column supplied in order.
fn skew_columns(
    src: &Plane<'_>,
    dst_height: usize,
    mut shear_for_column: impl FnMut(usize) -> f32,
) -> EngineResult<RotatedPixels> {
    let dst_width = src.width;
    let mut pixels = allocate(dst_width, dst_height, src.pixel_size)?;
    for column in 0..dst_width {
        let shear = shear_for_column(column);
        let whole = shear.floor();
        vertical_skew(
            src,
            &mut pixels,
            dst_width,
            dst_height,
            column,
            whole as i64,
            shear - whole,
        );
    }
    Ok(RotatedPixels {
        pixels,
        width: dst_width as u32,
        height: dst_height as u32,
    })
}

/// Row shear of the first horizontal pass: anchored at the top row for a
/// positive slope and at the bottom row for a negative one.
#[inline]
fn row_shear(slope: f32, row: usize, height: f32) -> f32 {
    let centre = 0.5 + row as f32;
    slope * if slope >= 0.0 { centre } else { centre - height }
}

// ============================================================================
// Arbitrary angles
// ============================================================================

/// Map any finite angle into (-45, 315] degrees.
fn normalize_angle(radians: f32) -> f32 {
    let turned = radians.rem_euclid(TAU);
    if turned > RAD_315 {
        turned - TAU
    } else {
        turned
    }
}

/// Rotate counter-clockwise by `radians` (any finite angle).
///
/// Quarter turns are exact. The residual angle in (-45, 45] degrees is
/// applied with three skew passes, which grows the output to hold the
/// rotated corners; uncovered pixels are zero.
pub fn rotate_by_shear(
    pixels: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    pixel_size: u32,
    radians: f32,
) -> EngineResult<RotatedPixels> {
    let source = Plane::new(pixels, width, height, stride, pixel_size)?;
    if !radians.is_finite() {
        return Err(BitmapOpsError::invalid_shear_angle(radians));
    }
    if width == 0 || height == 0 {
        return Err(BitmapOpsError::invalid_dimensions(width, height));
    }

    let mut residual = normalize_angle(radians);
    let quarter_turned = if residual > FRAC_PI_4 && residual <= RAD_135 {
        residual -= FRAC_PI_2;
        Some(rotate_plane_90(&source)?)
    } else if residual > RAD_135 && residual <= RAD_225 {
        residual -= PI;
        Some(rotate_plane_180(&source)?)
    } else if residual > RAD_225 && residual <= RAD_315 {
        residual -= RAD_270;
        Some(rotate_plane_270(&source)?)
    } else {
        None
    };

    if residual.abs() < MACHINE_EPSILON_10 {
        debug!(target: "bitmap_ops::rotation", radians, "rotation completed by quarter turns");
        return match quarter_turned {
            Some(rotated) => Ok(rotated),
            None => copy_packed(&source),
        };
    }

    let base = match &quarter_turned {
        Some(rotated) => Plane::packed(rotated, source.pixel_size),
        None => source,
    };
    let rotated = shear_three_pass(&base, residual)?;
    debug!(
        target: "bitmap_ops::rotation",
        radians,
        residual,
        width = rotated.width,
        height = rotated.height,
        "rotated by shear"
    );
    Ok(rotated)
}

/// Rotate by `radians` in (-45, 45] degrees with horizontal, vertical and
/// horizontal skews.
fn shear_three_pass(src: &Plane<'_>, radians: f32) -> EngineResult<RotatedPixels> {
    let pixel_size = src.pixel_size;
    let (width, height) = (src.width as f32, src.height as f32);
    let (sin, cos) = radians.sin_cos();
    let tan = (0.5 * radians).tan();

    let first_width = src.width + (tan.abs() * height) as usize;
    let second = {
        let first = skew_rows(src, first_width, |row| row_shear(tan, row, height))?;
        trace!(
            target: "bitmap_ops::rotation",
            width = first.width,
            height = first.height,
            "first shear"
        );

        let second_height = (width * sin.abs() + height * cos) as usize;
        let mut offset = sin * if sin > 0.0 {
            width - 1.0
        } else {
            first_width as f32 - width
        };
        skew_columns(&Plane::packed(&first, pixel_size), second_height, |_| {
            let shear = offset;
            offset -= sin;
            shear
        })?
    };
    trace!(
        target: "bitmap_ops::rotation",
        width = second.width,
        height = second.height,
        "second shear"
    );

    let third_width = (height * sin.abs() + width * cos) as usize + 1;
    let mut offset = if sin >= 0.0 {
        -sin * tan * (width - 1.0)
    } else {
        tan * ((width - 1.0) * -sin + (1.0 - second.height as f32))
    };
    skew_rows(&Plane::packed(&second, pixel_size), third_width, |_| {
        let shear = offset;
        offset += tan;
        shear
    })
}

/// Single horizontal shear by `radians`, limited to +/-45 degrees.
///
/// Negative angles lean the top of the image to the right, which is how
/// software italics are produced (see `SOFTWARE_ITALIC_ANGLE`).
pub fn horizontal_shear(
    pixels: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    pixel_size: u32,
    radians: f32,
) -> EngineResult<RotatedPixels> {
    let source = Plane::new(pixels, width, height, stride, pixel_size)?;
    if !radians.is_finite() || radians.abs() > FRAC_PI_4 {
        return Err(BitmapOpsError::invalid_shear_angle(radians));
    }
    if width == 0 || height == 0 {
        return Err(BitmapOpsError::invalid_dimensions(width, height));
    }
    if radians.abs() < MACHINE_EPSILON_10 {
        return copy_packed(&source);
    }

    let tan = radians.tan();
    let source_height = source.height as f32;
    let out_width = source.width + (tan.abs() * source_height) as usize;
    let sheared = skew_rows(&source, out_width, |row| row_shear(tan, row, source_height))?;
    debug!(
        target: "bitmap_ops::rotation",
        radians,
        width = sheared.width,
        height = sheared.height,
        "horizontal shear"
    );
    Ok(sheared)
}

// ============================================================================
// PixelBuffer conveniences
// ============================================================================

impl PixelBuffer {
    fn transformed(
        &self,
        op: impl FnOnce(&[u8], u32, u32, u32, u32) -> EngineResult<RotatedPixels>,
    ) -> EngineResult<PixelBuffer> {
        let rotated = op(
            self.pixels(),
            self.width(),
            self.height(),
            self.stride(),
            self.bytes_per_pixel() as u32,
        )?;
        PixelBuffer::from_raw(rotated.width, rotated.height, self.format(), rotated.pixels)
    }

    pub fn rotated_90(&self) -> EngineResult<PixelBuffer> {
        self.transformed(rotate_90)
    }

    pub fn rotated_180(&self) -> EngineResult<PixelBuffer> {
        self.transformed(rotate_180)
    }

    pub fn rotated_270(&self) -> EngineResult<PixelBuffer> {
        self.transformed(rotate_270)
    }

    /// Rotate counter-clockwise by any angle. See [`rotate_by_shear`].
    pub fn rotated_by_shear(&self, radians: f32) -> EngineResult<PixelBuffer> {
        self.transformed(|pixels, width, height, stride, pixel_size| {
            rotate_by_shear(pixels, width, height, stride, pixel_size, radians)
        })
    }

    /// Shear horizontally by up to 45 degrees. See [`horizontal_shear`].
    pub fn horizontally_sheared(&self, radians: f32) -> EngineResult<PixelBuffer> {
        self.transformed(|pixels, width, height, stride, pixel_size| {
            horizontal_shear(pixels, width, height, stride, pixel_size, radians)
        })
    }
}
