// src/error.rs
//
// Unified error handling for bitmap-ops
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: Invalid input, recoverable
// - FormatError: Pixel format / resampling issues
// - ResourceLimit: Memory/dimension limits
// - InternalBug: Library bugs (should not happen)
//
// Degenerate input and unsupported formats are not errors at the pipeline level:
// those stages log and pass the bitmap through unchanged. Errors are reserved for
// broken buffer contracts and allocation failure.

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy for callers deciding whether to fall back to the unscaled bitmap
///
/// - UserError: Invalid input, recoverable by the caller
/// - FormatError: Pixel format / resampling issues
/// - ResourceLimit: Memory/dimension limits
/// - InternalBug: Library bugs (should not happen)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Invalid input, recoverable by the caller
    UserError,
    /// Pixel format / resampling issues
    FormatError,
    /// Memory/dimension limits
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

impl ErrorCategory {
    /// Get string representation of error category
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::FormatError => "FormatError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }

    /// Get the BITMAP_OPS_* error code string for this category
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "BITMAP_OPS_USER_ERROR",
            ErrorCategory::FormatError => "BITMAP_OPS_FORMAT_ERROR",
            ErrorCategory::ResourceLimit => "BITMAP_OPS_RESOURCE_LIMIT",
            ErrorCategory::InternalBug => "BITMAP_OPS_INTERNAL_BUG",
        }
    }
}

/// bitmap-ops error types
#[derive(Debug, Clone, Error)]
pub enum BitmapOpsError {
    // Geometry Errors
    #[error("Invalid bitmap dimensions: width={width}, height={height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid stride {stride} for width {width}: stride must be >= width")]
    InvalidStride { width: u32, stride: u32 },

    #[error("Pixel buffer too small: expected at least {expected} bytes, got {actual} bytes")]
    BufferTooSmall { expected: usize, actual: usize },

    // Size Limit Errors
    #[error("Bitmap dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Failed to allocate {bytes} bytes for pixel data")]
    AllocationFailed { bytes: usize },

    // Format Errors
    #[error("Pixel format {format} is not supported by {operation}")]
    UnsupportedPixelFormat {
        format: Cow<'static, str>,
        operation: Cow<'static, str>,
    },

    #[error(
        "Resize failed ({source_width}x{source_height} -> {target_width}x{target_height}): \
         {message}"
    )]
    ResizeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    // Operation Errors
    #[error("Shear angle {radians} rad is outside the supported range of +/-PI/4")]
    InvalidShearAngle { radians: f32 },

    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

// Constructor Helpers
impl BitmapOpsError {
    pub fn invalid_dimensions(width: u32, height: u32) -> Self {
        Self::InvalidDimensions { width, height }
    }

    pub fn invalid_stride(width: u32, stride: u32) -> Self {
        Self::InvalidStride { width, stride }
    }

    pub fn buffer_too_small(expected: usize, actual: usize) -> Self {
        Self::BufferTooSmall { expected, actual }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn allocation_failed(bytes: usize) -> Self {
        Self::AllocationFailed { bytes }
    }

    pub fn unsupported_pixel_format(
        format: impl Into<Cow<'static, str>>,
        operation: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::UnsupportedPixelFormat {
            format: format.into(),
            operation: operation.into(),
        }
    }

    pub fn resize_failed(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ResizeFailed {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
            message: message.into(),
        }
    }

    pub fn invalid_shear_angle(radians: f32) -> Self {
        Self::InvalidShearAngle { radians }
    }

    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (caller can fix it or fall back)
    ///
    /// Consistent with category():
    /// - UserError and ResourceLimit errors are recoverable
    /// - FormatError and InternalBug errors are not
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::FormatError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidDimensions { .. }
            | Self::InvalidStride { .. }
            | Self::BufferTooSmall { .. }
            | Self::InvalidShearAngle { .. }
            | Self::InvalidArgument { .. } => ErrorCategory::UserError,

            // ResizeFailed is a processing failure inside the resampler, grouped
            // with format problems since both come from the pixel layout.
            Self::UnsupportedPixelFormat { .. } | Self::ResizeFailed { .. } => {
                ErrorCategory::FormatError
            }

            Self::DimensionExceedsLimit { .. } | Self::AllocationFailed { .. } => {
                ErrorCategory::ResourceLimit
            }

            Self::InternalPanic { .. } => ErrorCategory::InternalBug,
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, BitmapOpsError>;
