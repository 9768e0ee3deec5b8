// src/engine/kernels.rs
//
// Per-format pixel kernels: averaging two pixels, halving a scanline in place,
// averaging two scanlines, and blending four pixels bilinearly.
//
// Every scaler reaches these through one table (`PixelKernels`) looked up from
// the pixel format, so format dispatch happens exactly once per operation.
//
// All kernels work on byte slices. Multi-byte pixels are loaded with native
// endianness; the averaging tricks operate lane-wise so byte order is irrelevant.
// Slices shorter than the stated width are a caller bug and panic on indexing.

use crate::engine::buffer::PixelFormat;

/// Upper bound on scanline widths the kernels are expected to see.
const MAX_SCANLINE_WIDTH: u32 = 131_072;

/// Kernel table for one pixel layout.
#[derive(Debug)]
pub struct PixelKernels {
    pub bytes_per_pixel: usize,
    /// Halve a scanline of `width` pixels in place, leaving `width / 2` pixels at its start.
    pub halve_scanline: fn(&mut [u8], u32),
    /// Average two scanlines of `width` pixels into `out`.
    pub average_scanlines: fn(&[u8], &[u8], &mut [u8], u32),
    /// Blend four pixels (tl, tr, bl, br) with 0.16 fixed-point weights into `out`.
    pub bilinear: fn(&[u8], &[u8], &[u8], &[u8], u32, u32, &mut [u8]),
}

static SINGLE_BYTE_KERNELS: PixelKernels = PixelKernels {
    bytes_per_pixel: 1,
    halve_scanline: halve_scanline_in_place_1_byte,
    average_scanlines: average_scanlines_1,
    bilinear: bilinear_filter_bytes::<1>,
};

static COMPONENT_PAIR_KERNELS: PixelKernels = PixelKernels {
    bytes_per_pixel: 2,
    halve_scanline: halve_scanline_in_place_2_bytes,
    average_scanlines: average_scanlines_2,
    bilinear: bilinear_filter_bytes::<2>,
};

static RGB565_KERNELS: PixelKernels = PixelKernels {
    bytes_per_pixel: 2,
    halve_scanline: halve_scanline_in_place_rgb565,
    average_scanlines: average_scanlines_rgb565,
    bilinear: bilinear_filter_rgb565_bytes,
};

static RGB888_KERNELS: PixelKernels = PixelKernels {
    bytes_per_pixel: 3,
    halve_scanline: halve_scanline_in_place_rgb888,
    average_scanlines: average_scanlines_3,
    bilinear: bilinear_filter_bytes::<3>,
};

static FOUR_BYTE_KERNELS: PixelKernels = PixelKernels {
    bytes_per_pixel: 4,
    halve_scanline: halve_scanline_in_place_rgba8888,
    average_scanlines: average_scanlines_rgba8888,
    bilinear: bilinear_filter_bytes::<4>,
};

/// The dispatch table. `None` means no scaler handles the format.
pub(crate) fn kernels_for(format: PixelFormat) -> Option<&'static PixelKernels> {
    match format {
        PixelFormat::L8 | PixelFormat::A8 => Some(&SINGLE_BYTE_KERNELS),
        PixelFormat::LA88 => Some(&COMPONENT_PAIR_KERNELS),
        PixelFormat::RGB565 => Some(&RGB565_KERNELS),
        PixelFormat::RGB888 => Some(&RGB888_KERNELS),
        // Channel order does not matter to lane-wise kernels.
        PixelFormat::RGBA8888 | PixelFormat::BGRA8888 => Some(&FOUR_BYTE_KERNELS),
        PixelFormat::RGBA4444 | PixelFormat::RGBA5551 => None,
    }
}

// =============================================================================
// PIXEL AVERAGING
// =============================================================================

/// Average of two components, rounding down.
#[inline]
pub fn average_component(a: u32, b: u32) -> u32 {
    (a + b) >> 1
}

/// Lane-wise average of two packed 8888 pixels without overflowing a lane.
#[inline]
pub fn average_pixel_rgba8888(a: u32, b: u32) -> u32 {
    (((a ^ b) & 0xfefe_fefe) >> 1).wrapping_add(a & b)
}

/// Field-wise average of two packed 565 pixels.
#[inline]
pub fn average_pixel_rgb565(a: u16, b: u16) -> u16 {
    (((a ^ b) & 0xf7de) >> 1).wrapping_add(a & b)
}

/// Fast `x * y / 255`, rounding down.
#[inline]
pub fn multiply_and_normalize_color(x: u8, y: u8) -> u8 {
    let xy = x as u32 * y as u32;
    (((xy << 15) + (xy << 7) + xy) >> 23) as u8
}

/// Rounded division by 17, compressing an 8-bit value to 4 bits.
#[inline]
pub fn compress_bit_per_pixel_8_to_4(x: u8) -> u8 {
    let x = x as u16;
    (((((x << 4) - x + (x >> 4)) >> 7) + 1) >> 1) as u8
}

#[inline]
fn load_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_ne_bytes([bytes[at], bytes[at + 1]])
}

#[inline]
fn store_u16(bytes: &mut [u8], at: usize, value: u16) {
    bytes[at..at + 2].copy_from_slice(&value.to_ne_bytes());
}

#[inline]
fn load_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_ne_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[inline]
fn store_u32(bytes: &mut [u8], at: usize, value: u32) {
    bytes[at..at + 4].copy_from_slice(&value.to_ne_bytes());
}

#[inline]
fn debug_assert_scanline(pixels: &[u8], width: u32, bytes_per_pixel: usize) {
    debug_assert!(width < MAX_SCANLINE_WIDTH, "scanline width {width} is implausibly wide");
    debug_assert!(
        pixels.len() >= width as usize * bytes_per_pixel,
        "scanline shorter than its width"
    );
}

// =============================================================================
// SCANLINE HALVING
// =============================================================================

/// Output pixel `i` is written at or before input pixel `2i`, so reading ahead
/// of the write cursor is always safe in place.
#[inline]
fn halve_components<const N: usize>(pixels: &mut [u8], width: u32) {
    debug_assert_scanline(pixels, width, N);
    if width < 2 {
        return;
    }
    for out in 0..(width / 2) as usize {
        let first = out * 2 * N;
        let second = first + N;
        for c in 0..N {
            pixels[out * N + c] =
                average_component(pixels[first + c] as u32, pixels[second + c] as u32) as u8;
        }
    }
}

pub fn halve_scanline_in_place_rgb888(pixels: &mut [u8], width: u32) {
    halve_components::<3>(pixels, width);
}

pub fn halve_scanline_in_place_rgba8888(pixels: &mut [u8], width: u32) {
    debug_assert_scanline(pixels, width, 4);
    if width < 2 {
        return;
    }
    for out in 0..(width / 2) as usize {
        let a = load_u32(pixels, out * 8);
        let b = load_u32(pixels, out * 8 + 4);
        store_u32(pixels, out * 4, average_pixel_rgba8888(a, b));
    }
}

pub fn halve_scanline_in_place_rgb565(pixels: &mut [u8], width: u32) {
    debug_assert_scanline(pixels, width, 2);
    if width < 2 {
        return;
    }
    for out in 0..(width / 2) as usize {
        let a = load_u16(pixels, out * 4);
        let b = load_u16(pixels, out * 4 + 2);
        store_u16(pixels, out * 2, average_pixel_rgb565(a, b));
    }
}

pub fn halve_scanline_in_place_2_bytes(pixels: &mut [u8], width: u32) {
    halve_components::<2>(pixels, width);
}

pub fn halve_scanline_in_place_1_byte(pixels: &mut [u8], width: u32) {
    halve_components::<1>(pixels, width);
}

// =============================================================================
// SCANLINE AVERAGING
// =============================================================================

#[inline]
fn average_components(scanline1: &[u8], scanline2: &[u8], out: &mut [u8], components: usize) {
    for ((o, &a), &b) in out[..components]
        .iter_mut()
        .zip(&scanline1[..components])
        .zip(&scanline2[..components])
    {
        *o = average_component(a as u32, b as u32) as u8;
    }
}

/// Average `width` single-byte pixels.
pub fn average_scanlines_1(scanline1: &[u8], scanline2: &[u8], out: &mut [u8], width: u32) {
    average_components(scanline1, scanline2, out, width as usize);
}

/// Average `width` two-byte pixels component-wise.
pub fn average_scanlines_2(scanline1: &[u8], scanline2: &[u8], out: &mut [u8], width: u32) {
    average_components(scanline1, scanline2, out, width as usize * 2);
}

/// Average `width` three-byte pixels component-wise.
pub fn average_scanlines_3(scanline1: &[u8], scanline2: &[u8], out: &mut [u8], width: u32) {
    average_components(scanline1, scanline2, out, width as usize * 3);
}

pub fn average_scanlines_rgba8888(scanline1: &[u8], scanline2: &[u8], out: &mut [u8], width: u32) {
    for i in 0..width as usize {
        let at = i * 4;
        let avg = average_pixel_rgba8888(load_u32(scanline1, at), load_u32(scanline2, at));
        store_u32(out, at, avg);
    }
}

pub fn average_scanlines_rgb565(scanline1: &[u8], scanline2: &[u8], out: &mut [u8], width: u32) {
    for i in 0..width as usize {
        let at = i * 2;
        let avg = average_pixel_rgb565(load_u16(scanline1, at), load_u16(scanline2, at));
        store_u16(out, at, avg);
    }
}

// =============================================================================
// BILINEAR BLENDING
// =============================================================================

/// Blend four taps with 0.16 fixed-point weights.
///
/// Rows are blended horizontally to 16.16, then vertically to 16.32, then
/// rounded back to an integer.
#[inline]
pub fn bilinear_filter_1_component(
    tl: u32,
    tr: u32,
    bl: u32,
    br: u32,
    fract_horizontal: u32,
    fract_vertical: u32,
) -> u32 {
    debug_assert!(fract_horizontal <= 65535, "factor should be in 0.16 fixed point");
    debug_assert!(fract_vertical <= 65535, "factor should be in 0.16 fixed point");
    let fx = fract_horizontal as u64;
    let fy = fract_vertical as u64;
    let top = tl as u64 * (65535 - fx) + tr as u64 * fx;
    let bottom = bl as u64 * (65535 - fx) + br as u64 * fx;
    let blended = top * (65535 - fy) + bottom * fy;
    ((blended + (1 << 31)) >> 32) as u32
}

/// Field-wise blend of four packed 565 pixels.
#[inline]
pub fn bilinear_filter_rgb565(tl: u16, tr: u16, bl: u16, br: u16, fx: u32, fy: u32) -> u16 {
    let field = |shift: u32, mask: u16| {
        bilinear_filter_1_component(
            ((tl >> shift) & mask) as u32,
            ((tr >> shift) & mask) as u32,
            ((bl >> shift) & mask) as u32,
            ((br >> shift) & mask) as u32,
            fx,
            fy,
        ) as u16
    };
    (field(11, 31) << 11) | (field(5, 63) << 5) | field(0, 31)
}

fn bilinear_filter_bytes<const N: usize>(
    tl: &[u8],
    tr: &[u8],
    bl: &[u8],
    br: &[u8],
    fx: u32,
    fy: u32,
    out: &mut [u8],
) {
    for c in 0..N {
        out[c] = bilinear_filter_1_component(
            tl[c] as u32,
            tr[c] as u32,
            bl[c] as u32,
            br[c] as u32,
            fx,
            fy,
        ) as u8;
    }
}

fn bilinear_filter_rgb565_bytes(
    tl: &[u8],
    tr: &[u8],
    bl: &[u8],
    br: &[u8],
    fx: u32,
    fy: u32,
    out: &mut [u8],
) {
    let blended = bilinear_filter_rgb565(
        load_u16(tl, 0),
        load_u16(tr, 0),
        load_u16(bl, 0),
        load_u16(br, 0),
        fx,
        fy,
    );
    store_u16(out, 0, blended);
}
