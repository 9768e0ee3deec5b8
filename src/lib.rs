// lib.rs
//
// bitmap-ops: load-time bitmap scaling and rotation
//
// Design goals:
// - Shrink decoded bitmaps cheaply with an in-place power-of-two box filter
// - Close the remaining gap with point, bilinear or Lanczos sampling
// - Honour the caller's fitting mode by cropping or padding
// - Rotate by quarter turns exactly and by any other angle via shears
// - Never touch a borrowed input; unchanged bitmaps come back borrowed

pub mod engine;
pub mod error;
pub mod ops;

pub use engine::{
    apply_attributes_to_bitmap, apply_attributes_to_bitmap_with_config,
    calculate_desired_dimensions, crop_and_pad_for_fitting_mode, downscale_bitmap,
    horizontal_shear, lanczos_sample, linear_sample, point_sample, rotate_180, rotate_270,
    rotate_90, rotate_by_shear, PixelBuffer, PixelFormat, RotatedPixels, ScalingConfig,
};
pub use error::{BitmapOpsError, ErrorCategory, Result};
pub use ops::{
    BoxDimensionTest, FittingMode, ImageAttributes, ImageDimensions, SamplingMode,
    MAXIMUM_TARGET_BITMAP_SIZE,
};
