// src/engine.rs
//
// The core of bitmap-ops. Pixel buffers go through:
// 1. A power-of-two box filter that halves in place
// 2. An optional point or bilinear sampler to close the remaining gap
// 3. A crop/pad pass that centres the result in a buffer of the requested size
//
// Rotation and Lanczos resampling are standalone and do not touch the pipeline.
// This file is a facade over the modules in engine/.

// =============================================================================
// CONSTANTS
// =============================================================================

/// Byte written into every border pixel by the compositor.
pub const BORDER_FILL_VALUE: u8 = 0x00;

/// Exponent used to linearise colour channels before Lanczos resampling.
pub const DEFAULT_SOURCE_GAMMA: f32 = 1.75;

pub use crate::ops::MAXIMUM_TARGET_BITMAP_SIZE;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

pub mod box_filter;
pub mod buffer;
mod common;
pub mod compositor;
pub mod config;
pub mod fitting;
pub mod kernels;
pub mod lanczos;
mod pipeline;
pub mod rotation;
pub mod sampling;

// Re-export the entry points most callers need
pub use box_filter::{continue_scaling, downscale_in_place_pow2, BoxFilterResult};
pub use buffer::{PixelBuffer, PixelFormat};
pub use common::EngineResult;
pub use compositor::{add_borders, crop_and_pad_for_fitting_mode};
pub use config::ScalingConfig;
pub use fitting::{
    calculate_borders_for_desired_size, calculate_borders_from_fitting_mode,
    calculate_desired_dimensions, calculate_desired_dimensions_with_config, fit_to_scaling_mode,
    BorderPlan,
};
pub use kernels::PixelKernels;
pub use lanczos::{lanczos_downscale, lanczos_sample, ResizeError};
pub use pipeline::{
    apply_attributes_to_bitmap, apply_attributes_to_bitmap_with_config, downscale_bitmap,
    DEBUG_COW_ENV,
};
pub use rotation::{
    horizontal_shear, rotate_180, rotate_270, rotate_90, rotate_by_shear, RotatedPixels,
    SOFTWARE_ITALIC_ANGLE,
};
pub use sampling::{linear_sample, point_sample};
