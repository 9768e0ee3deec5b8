// src/engine/common.rs
//
// Common utilities shared across engine modules.
// Checked buffer arithmetic and fallible allocation live here so every stage
// reports overflow and out-of-memory the same way.

use crate::error::BitmapOpsError;

/// Result type used by every engine stage.
pub type EngineResult<T> = std::result::Result<T, BitmapOpsError>;

/// Bytes needed to hold `height` rows of `stride` pixels, where the last row
/// only needs `width` pixels.
pub(crate) fn required_len(
    width: u32,
    height: u32,
    stride: u32,
    bytes_per_pixel: usize,
) -> EngineResult<usize> {
    if width == 0 || height == 0 {
        return Ok(0);
    }
    let overflow = || BitmapOpsError::dimension_exceeds_limit(width.max(height), u32::MAX);
    let full_rows = (stride as usize)
        .checked_mul(height as usize - 1)
        .ok_or_else(overflow)?;
    full_rows
        .checked_add(width as usize)
        .and_then(|pixels| pixels.checked_mul(bytes_per_pixel))
        .ok_or_else(overflow)
}

/// Bytes for a fully packed `width x height` image.
pub(crate) fn packed_len(width: u32, height: u32, bytes_per_pixel: usize) -> EngineResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(bytes_per_pixel))
        .ok_or_else(|| BitmapOpsError::dimension_exceeds_limit(width.max(height), u32::MAX))
}

/// Zero-filled allocation that reports failure instead of aborting.
pub(crate) fn try_alloc_zeroed(len: usize) -> EngineResult<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| BitmapOpsError::allocation_failed(len))?;
    buffer.resize(len, 0);
    Ok(buffer)
}

/// Check that a caller-provided slice can hold `expected` bytes.
#[inline]
pub(crate) fn ensure_len(actual: usize, expected: usize) -> EngineResult<()> {
    if actual < expected {
        return Err(BitmapOpsError::buffer_too_small(expected, actual));
    }
    Ok(())
}
