// src/engine/fitting.rs
//
// Geometry only: no pixels are touched here.
//
// - desired dimensions: fill in zero request components and clamp to the
//   maximum texture size
// - fitting modes: the box a uniform downscale should land in
// - border plans: how many rows/columns to crop (positive) or pad (negative)
//   to give the output the requested aspect ratio

use crate::engine::config::ScalingConfig;
use crate::ops::{BoxDimensionTest, FittingMode, ImageDimensions, MAXIMUM_TARGET_BITMAP_SIZE};
use tracing::{debug, warn};

// =============================================================================
// DESIRED DIMENSIONS
// =============================================================================

/// Work out the box to scale a `raw` sized bitmap into, using the process-wide
/// maximum texture size.
pub fn calculate_desired_dimensions(
    raw: ImageDimensions,
    requested: ImageDimensions,
) -> ImageDimensions {
    calculate_desired_dimensions_with_config(raw, requested, ScalingConfig::global())
}

pub fn calculate_desired_dimensions_with_config(
    raw: ImageDimensions,
    requested: ImageDimensions,
    config: &ScalingConfig,
) -> ImageDimensions {
    calculate_desired_dimensions_with_limit(
        raw.width_u32(),
        raw.height_u32(),
        requested.width_u32(),
        requested.height_u32(),
        config.effective_max_texture_size(),
    )
}

/// Desired-dimension rules:
///
/// * nothing requested: the source size, scaled down to fit `max_size`
/// * both requested: the request, scaled down to fit `max_size`
/// * one requested: that component (capped at `max_size`), the other derived
///   from the source aspect ratio
///
/// A zero-area source yields (0, 0), which every later stage treats as a no-op.
pub fn calculate_desired_dimensions_with_limit(
    bitmap_width: u32,
    bitmap_height: u32,
    requested_width: u32,
    requested_height: u32,
    max_size: u32,
) -> ImageDimensions {
    let max_size = max_size.min(MAXIMUM_TARGET_BITMAP_SIZE);
    if bitmap_width == 0 || bitmap_height == 0 {
        warn!(
            target: "bitmap_ops::fitting",
            bitmap_width, bitmap_height,
            "zero-area image cannot be scaled"
        );
        return ImageDimensions::default();
    }

    if requested_width == 0 && requested_height == 0 {
        return clamp_to_max_size(bitmap_width, bitmap_height, max_size);
    }
    if requested_width != 0 && requested_height != 0 {
        return clamp_to_max_size(requested_width, requested_height, max_size);
    }

    if requested_width != 0 {
        let width = requested_width.min(max_size);
        let height = bitmap_height as f32 / bitmap_width as f32 * width as f32 + 0.5;
        return ImageDimensions::from_f32(width as f32, height);
    }
    let height = requested_height.min(max_size);
    let width = bitmap_width as f32 / bitmap_height as f32 * height as f32 + 0.5;
    ImageDimensions::from_f32(width, height as f32)
}

fn clamp_to_max_size(width: u32, height: u32, max_size: u32) -> ImageDimensions {
    if width <= max_size && height <= max_size {
        return ImageDimensions::from_u32(width, height);
    }
    let max = max_size as f32;
    if width > height {
        ImageDimensions::from_f32(max, height as f32 * max / width as f32 + 0.5)
    } else {
        ImageDimensions::from_f32(width as f32 * max / height as f32 + 0.5, max)
    }
}

// =============================================================================
// FITTING MODES
// =============================================================================

/// Which dimensions must stay at least as large as desired while box filtering.
pub fn dimension_test_for_fitting_mode(fitting_mode: FittingMode) -> BoxDimensionTest {
    match fitting_mode {
        // One dimension may end up smaller than desired.
        FittingMode::ShrinkToFit => BoxDimensionTest::Either,
        FittingMode::ScaleToFill => BoxDimensionTest::Both,
        FittingMode::FitWidth => BoxDimensionTest::X,
        FittingMode::FitHeight => BoxDimensionTest::Y,
    }
}

#[inline]
fn scale_ratios(target: ImageDimensions, source: ImageDimensions) -> (f32, f32) {
    (
        target.width() as f32 / source.width() as f32,
        target.height() as f32 / source.height() as f32,
    )
}

/// Uniformly scale `source` by `scale`, never enlarging it.
#[inline]
fn scale_uniformly(source: ImageDimensions, scale: f32) -> ImageDimensions {
    // NaN comes from a zero-area source.
    if scale >= 1.0 || scale.is_nan() {
        return source;
    }
    ImageDimensions::from_f32(
        source.width() as f32 * scale + 0.5,
        source.height() as f32 * scale + 0.5,
    )
}

/// Scale by the smaller ratio so the result fits inside the target.
pub fn fit_for_shrink_to_fit(target: ImageDimensions, source: ImageDimensions) -> ImageDimensions {
    let (width_scale, height_scale) = scale_ratios(target, source);
    scale_uniformly(source, width_scale.min(height_scale))
}

/// Scale by the larger ratio so the result covers the target.
pub fn fit_for_scale_to_fill(target: ImageDimensions, source: ImageDimensions) -> ImageDimensions {
    debug_assert!(!source.is_zero_area(), "zero-area rectangles should not be fitted");
    let (width_scale, height_scale) = scale_ratios(target, source);
    scale_uniformly(source, width_scale.max(height_scale))
}

pub fn fit_for_fit_width(target: ImageDimensions, source: ImageDimensions) -> ImageDimensions {
    debug_assert!(source.width() > 0, "cannot fit a zero-width rectangle");
    scale_uniformly(source, scale_ratios(target, source).0)
}

pub fn fit_for_fit_height(target: ImageDimensions, source: ImageDimensions) -> ImageDimensions {
    debug_assert!(source.height() > 0, "cannot fit a zero-height rectangle");
    scale_uniformly(source, scale_ratios(target, source).1)
}

/// Target of the secondary sampling pass for a given fitting mode.
pub fn fit_to_scaling_mode(
    requested: ImageDimensions,
    source: ImageDimensions,
    fitting_mode: FittingMode,
) -> ImageDimensions {
    match fitting_mode {
        FittingMode::ShrinkToFit => fit_for_shrink_to_fit(requested, source),
        FittingMode::ScaleToFill => fit_for_scale_to_fill(requested, source),
        FittingMode::FitWidth => fit_for_fit_width(requested, source),
        FittingMode::FitHeight => fit_for_fit_height(requested, source),
    }
}

// =============================================================================
// BORDER PLANS
// =============================================================================

/// Output size plus the rows and columns to remove from (positive) or add
/// around (negative) the source to reach it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BorderPlan {
    pub final_width: u32,
    pub final_height: u32,
    pub scanlines_to_crop: i64,
    pub columns_to_crop: i64,
}

impl BorderPlan {
    /// Keep the source width; derive the height from the target aspect.
    fn fit_width(source_width: u32, source_height: u32, requested: ImageDimensions) -> Self {
        let final_height = scale_by_ratio(source_width, requested.height(), requested.width());
        Self {
            final_width: source_width,
            final_height,
            scanlines_to_crop: source_height as i64 - final_height as i64,
            columns_to_crop: 0,
        }
    }

    /// Keep the source height; derive the width from the target aspect.
    fn fit_height(source_width: u32, source_height: u32, requested: ImageDimensions) -> Self {
        let final_width = scale_by_ratio(source_height, requested.width(), requested.height());
        Self {
            final_width,
            final_height: source_height,
            scanlines_to_crop: 0,
            columns_to_crop: source_width as i64 - final_width as i64,
        }
    }

    fn identity(source_width: u32, source_height: u32) -> Self {
        Self {
            final_width: source_width,
            final_height: source_height,
            scanlines_to_crop: 0,
            columns_to_crop: 0,
        }
    }

    /// Final size clamped into the 16-bit dimension range.
    pub fn final_dimensions(&self) -> ImageDimensions {
        ImageDimensions::from_u32(self.final_width, self.final_height)
    }

    pub fn is_identity(&self) -> bool {
        self.scanlines_to_crop == 0 && self.columns_to_crop == 0
    }

    /// Rows to add as letterbox borders.
    pub fn scanlines_to_pad(&self) -> u64 {
        (-self.scanlines_to_crop).max(0) as u64
    }

    /// Columns to add as pillarbox borders.
    pub fn columns_to_pad(&self) -> u64 {
        (-self.columns_to_crop).max(0) as u64
    }
}

/// `value * numerator / denominator`, floored and saturated to `u32`.
fn scale_by_ratio(value: u32, numerator: u16, denominator: u16) -> u32 {
    let scaled = value as u64 * numerator as u64 / denominator.max(1) as u64;
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

/// Plan the crop or pad that gives a `source_width x source_height` image the
/// aspect ratio of `requested`.
///
/// When the source is smaller than the request, the final box shrinks with it
/// instead of scaling up. Exactly one of the two crop amounts is always zero.
/// The aspect comparison and the derived side use exact integer arithmetic,
/// so a source that already matches the request along the governing axis
/// lands on the requested size exactly. A zero-area request plans nothing.
pub fn calculate_borders_from_fitting_mode(
    source_width: u32,
    source_height: u32,
    fitting_mode: FittingMode,
    requested: ImageDimensions,
) -> BorderPlan {
    if requested.is_zero_area() {
        return BorderPlan::identity(source_width, source_height);
    }
    // source_width / source_height > requested width / height, cross-multiplied
    let source_is_wider = source_width as u64 * requested.height() as u64
        > requested.width() as u64 * source_height as u64;
    let plan = match fitting_mode {
        FittingMode::FitWidth => BorderPlan::fit_width(source_width, source_height, requested),
        FittingMode::FitHeight => BorderPlan::fit_height(source_width, source_height, requested),
        FittingMode::ShrinkToFit if source_is_wider => {
            BorderPlan::fit_width(source_width, source_height, requested)
        }
        FittingMode::ShrinkToFit => BorderPlan::fit_height(source_width, source_height, requested),
        FittingMode::ScaleToFill if source_is_wider => {
            BorderPlan::fit_height(source_width, source_height, requested)
        }
        FittingMode::ScaleToFill => BorderPlan::fit_width(source_width, source_height, requested),
    };
    debug!(
        target: "bitmap_ops::fitting",
        mode = fitting_mode.as_str(),
        final_width = plan.final_width,
        final_height = plan.final_height,
        scanlines_to_crop = plan.scanlines_to_crop,
        columns_to_crop = plan.columns_to_crop,
        "border plan"
    );
    plan
}

/// Plan the crop or pad that turns a `source_width x source_height` image into
/// exactly `desired`, centring it on each axis independently.
///
/// Unlike [`calculate_borders_from_fitting_mode`], both axes may need work at
/// once, and a source smaller than `desired` is padded rather than shrinking
/// the output box.
pub fn calculate_borders_for_desired_size(
    source_width: u32,
    source_height: u32,
    desired: ImageDimensions,
) -> BorderPlan {
    BorderPlan {
        final_width: desired.width_u32(),
        final_height: desired.height_u32(),
        scanlines_to_crop: source_height as i64 - desired.height() as i64,
        columns_to_crop: source_width as i64 - desired.width() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u16, height: u16) -> ImageDimensions {
        ImageDimensions::new(width, height)
    }

    mod desired_dimension_tests {
        use super::*;

        fn desired(bw: u32, bh: u32, rw: u32, rh: u32) -> (u16, u16) {
            let d = calculate_desired_dimensions_with_limit(bw, bh, rw, rh, 4096);
            (d.width(), d.height())
        }

        #[test]
        fn nothing_requested_keeps_source_size() {
            assert_eq!(desired(10, 10, 0, 0), (10, 10));
            assert_eq!(desired(4096, 17, 0, 0), (4096, 17));
        }

        #[test]
        fn oversized_source_is_capped() {
            assert_eq!(desired(8192, 4096, 0, 0), (4096, 2048));
            assert_eq!(desired(1000, 10000, 0, 0), (410, 4096));
        }

        #[test]
        fn both_requested_is_used_as_is() {
            assert_eq!(desired(100, 50, 30, 70), (30, 70));
            assert_eq!(desired(100, 50, 9000, 4500), (4096, 2048));
        }

        #[test]
        fn one_component_follows_source_aspect() {
            assert_eq!(desired(100, 50, 50, 0), (50, 25));
            assert_eq!(desired(100, 50, 0, 10), (20, 10));
            assert_eq!(desired(3, 1, 0, 2), (6, 2));
            assert_eq!(desired(100, 50, 10000, 0), (4096, 2048));
        }

        #[test]
        fn zero_area_source_yields_zero() {
            assert_eq!(desired(0, 50, 10, 10), (0, 0));
            assert_eq!(desired(50, 0, 0, 0), (0, 0));
        }

        #[test]
        fn limit_is_capped_at_sixteen_bits() {
            let d = calculate_desired_dimensions_with_limit(70_000, 10, 0, 0, u32::MAX);
            assert_eq!(d.width(), 65535);
        }

        #[test]
        fn config_limit_is_honoured() {
            let config = ScalingConfig::with_max_texture_size(64);
            let d = calculate_desired_dimensions_with_config(dims(256, 128), dims(0, 0), &config);
            assert_eq!(d, dims(64, 32));
        }

        #[test]
        fn applying_twice_is_stable() {
            let raw = dims(640, 480);
            for requested in [dims(0, 0), dims(100, 0), dims(0, 33), dims(123, 45)] {
                let once = calculate_desired_dimensions_with_config(
                    raw,
                    requested,
                    &ScalingConfig::default(),
                );
                let twice =
                    calculate_desired_dimensions_with_config(raw, once, &ScalingConfig::default());
                assert_eq!(once, twice);
            }
        }
    }

    mod fitting_mode_tests {
        use super::*;

        #[test]
        fn dimension_tests_per_mode() {
            let test = dimension_test_for_fitting_mode;
            assert_eq!(test(FittingMode::ShrinkToFit), BoxDimensionTest::Either);
            assert_eq!(test(FittingMode::ScaleToFill), BoxDimensionTest::Both);
            assert_eq!(test(FittingMode::FitWidth), BoxDimensionTest::X);
            assert_eq!(test(FittingMode::FitHeight), BoxDimensionTest::Y);
        }

        #[test]
        fn shrink_to_fit_uses_smaller_ratio() {
            assert_eq!(fit_for_shrink_to_fit(dims(50, 50), dims(200, 100)), dims(50, 25));
        }

        #[test]
        fn scale_to_fill_uses_larger_ratio() {
            assert_eq!(fit_for_scale_to_fill(dims(50, 50), dims(200, 100)), dims(100, 50));
            assert_eq!(fit_for_scale_to_fill(dims(100, 100), dims(300, 100)), dims(300, 100));
        }

        #[test]
        fn single_axis_modes() {
            assert_eq!(fit_for_fit_width(dims(20, 1), dims(200, 100)), dims(20, 10));
            assert_eq!(fit_for_fit_height(dims(1, 20), dims(200, 100)), dims(40, 20));
        }

        #[test]
        fn never_upscales() {
            let source = dims(40, 30);
            for mode in [
                FittingMode::ShrinkToFit,
                FittingMode::ScaleToFill,
                FittingMode::FitWidth,
                FittingMode::FitHeight,
            ] {
                assert_eq!(fit_to_scaling_mode(dims(400, 300), source, mode), source);
                assert_eq!(fit_to_scaling_mode(source, source, mode), source);
            }
        }
    }

    mod border_plan_tests {
        use super::*;

        fn borders(
            width: u32,
            height: u32,
            mode: FittingMode,
            requested: ImageDimensions,
        ) -> BorderPlan {
            calculate_borders_from_fitting_mode(width, height, mode, requested)
        }

        #[test]
        fn scale_to_fill_crops_wide_source_columns() {
            let plan = borders(300, 100, FittingMode::ScaleToFill, dims(100, 100));
            assert_eq!(plan.final_dimensions(), dims(100, 100));
            assert_eq!(plan.columns_to_crop, 200);
            assert_eq!(plan.scanlines_to_crop, 0);
        }

        #[test]
        fn shrink_to_fit_letterboxes_wide_source() {
            let plan = borders(200, 50, FittingMode::ShrinkToFit, dims(100, 100));
            assert_eq!(plan.final_dimensions(), dims(200, 200));
            assert_eq!(plan.scanlines_to_crop, -150);
            assert_eq!(plan.scanlines_to_pad(), 150);
            assert_eq!(plan.columns_to_crop, 0);
        }

        #[test]
        fn shrink_to_fit_pillarboxes_tall_source() {
            let plan = borders(50, 100, FittingMode::ShrinkToFit, dims(100, 100));
            assert_eq!(plan.final_dimensions(), dims(100, 100));
            assert_eq!(plan.columns_to_pad(), 50);
            assert_eq!(plan.scanlines_to_pad(), 0);
        }

        #[test]
        fn fit_width_and_fit_height_fix_one_axis() {
            let plan = borders(100, 100, FittingMode::FitWidth, dims(50, 25));
            assert_eq!(plan.final_dimensions(), dims(100, 50));
            assert_eq!(plan.scanlines_to_crop, 50);

            let plan = borders(100, 100, FittingMode::FitHeight, dims(50, 25));
            assert_eq!(plan.final_dimensions(), dims(200, 100));
            assert_eq!(plan.columns_to_crop, -100);
        }

        #[test]
        fn matching_aspect_is_identity() {
            let plan = borders(64, 32, FittingMode::ScaleToFill, dims(128, 64));
            assert!(plan.is_identity());
            assert_eq!(plan.final_dimensions(), dims(64, 32));
        }

        #[test]
        fn final_dimensions_are_clamped() {
            let plan = borders(60000, 60000, FittingMode::FitWidth, dims(1, 2));
            assert_eq!(plan.final_height, 120000);
            assert_eq!(plan.final_dimensions().height(), 65535);
        }

        #[test]
        fn derived_side_is_exact_for_awkward_ratios() {
            // 30 / (30 / 70) is not exactly 70 in single precision
            let plan = borders(30, 15, FittingMode::ShrinkToFit, dims(30, 70));
            assert_eq!(plan.final_dimensions(), dims(30, 70));
            assert_eq!(plan.scanlines_to_pad(), 55);
        }

        #[test]
        fn zero_area_request_plans_nothing() {
            let plan = borders(40, 20, FittingMode::ScaleToFill, dims(0, 10));
            assert!(plan.is_identity());
            assert_eq!(plan.final_dimensions(), dims(40, 20));
        }

        #[test]
        fn desired_size_plan_handles_each_axis() {
            let plan = calculate_borders_for_desired_size(10, 10, dims(40, 20));
            assert_eq!(plan.final_dimensions(), dims(40, 20));
            assert_eq!(plan.columns_to_pad(), 30);
            assert_eq!(plan.scanlines_to_pad(), 10);

            let plan = calculate_borders_for_desired_size(100, 50, dims(30, 30));
            assert_eq!(plan.columns_to_crop, 70);
            assert_eq!(plan.scanlines_to_crop, 20);

            assert!(calculate_borders_for_desired_size(8, 4, dims(8, 4)).is_identity());
        }
    }
}
