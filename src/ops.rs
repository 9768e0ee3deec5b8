// src/ops.rs
//
// Request-side value types: what size the caller wants and how to get there.
// These are cheap to create and copy - the pixel work happens in engine/.

use crate::error::{BitmapOpsError, Result};
use std::str::FromStr;

/// Hard ceiling on any dimension that can be requested or produced.
pub const MAXIMUM_TARGET_BITMAP_SIZE: u32 = (1 << 16) - 1;

/// A (width, height) pair in 16-bit unsigned pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ImageDimensions {
    width: u16,
    height: u16,
}

impl ImageDimensions {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Build from 32-bit values, saturating at `MAXIMUM_TARGET_BITMAP_SIZE`.
    pub fn from_u32(width: u32, height: u32) -> Self {
        Self {
            width: width.min(MAXIMUM_TARGET_BITMAP_SIZE) as u16,
            height: height.min(MAXIMUM_TARGET_BITMAP_SIZE) as u16,
        }
    }

    /// Build from already-rounded float values. `as` saturates, so negative
    /// and NaN inputs become 0 and huge ones become 65535.
    pub(crate) fn from_f32(width: f32, height: f32) -> Self {
        Self {
            width: width as u16,
            height: height as u16,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub(crate) fn width_u32(&self) -> u32 {
        self.width as u32
    }

    pub(crate) fn height_u32(&self) -> u32 {
        self.height as u32
    }

    pub fn area(&self) -> u32 {
        self.width as u32 * self.height as u32
    }

    pub fn is_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<(u16, u16)> for ImageDimensions {
    fn from((width, height): (u16, u16)) -> Self {
        Self::new(width, height)
    }
}

/// Policy for preserving aspect ratio when fitting an image to a target box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FittingMode {
    /// Fit entirely inside the box; may leave borders
    #[default]
    ShrinkToFit,
    /// Cover the whole box; may crop
    ScaleToFill,
    /// Match the box width exactly
    FitWidth,
    /// Match the box height exactly
    FitHeight,
}

impl FromStr for FittingMode {
    type Err = BitmapOpsError;

    fn from_str(mode: &str) -> Result<Self> {
        match mode.to_ascii_lowercase().replace('-', "_").as_str() {
            "shrink_to_fit" => Ok(Self::ShrinkToFit),
            "scale_to_fill" => Ok(Self::ScaleToFill),
            "fit_width" => Ok(Self::FitWidth),
            "fit_height" => Ok(Self::FitHeight),
            _ => Err(BitmapOpsError::invalid_argument(
                "fitting_mode",
                mode.to_string(),
                "Expected shrink_to_fit, scale_to_fill, fit_width or fit_height",
            )),
        }
    }
}

impl FittingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShrinkToFit => "SHRINK_TO_FIT",
            Self::ScaleToFill => "SCALE_TO_FILL",
            Self::FitWidth => "FIT_WIDTH",
            Self::FitHeight => "FIT_HEIGHT",
        }
    }
}

/// Secondary resampling applied after (or instead of) box filtering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SamplingMode {
    /// Power-of-two box filter only
    #[default]
    Box,
    /// Point sampling only
    Nearest,
    /// Bilinear sampling only
    Linear,
    BoxThenNearest,
    BoxThenLinear,
    /// No filtering at all
    NoFilter,
    /// Windowed-sinc resampling; reached through the Lanczos sampler directly,
    /// never through the general pipeline
    Lanczos,
}

impl FromStr for SamplingMode {
    type Err = BitmapOpsError;

    fn from_str(mode: &str) -> Result<Self> {
        match mode.to_ascii_lowercase().replace('-', "_").as_str() {
            "box" => Ok(Self::Box),
            "nearest" => Ok(Self::Nearest),
            "linear" => Ok(Self::Linear),
            "box_then_nearest" => Ok(Self::BoxThenNearest),
            "box_then_linear" => Ok(Self::BoxThenLinear),
            "no_filter" => Ok(Self::NoFilter),
            "lanczos" => Ok(Self::Lanczos),
            _ => Err(BitmapOpsError::invalid_argument(
                "sampling_mode",
                mode.to_string(),
                "Expected box, nearest, linear, box_then_nearest, box_then_linear, no_filter \
                 or lanczos",
            )),
        }
    }
}

impl SamplingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Box => "BOX",
            Self::Nearest => "NEAREST",
            Self::Linear => "LINEAR",
            Self::BoxThenNearest => "BOX_THEN_NEAREST",
            Self::BoxThenLinear => "BOX_THEN_LINEAR",
            Self::NoFilter => "NO_FILTER",
            Self::Lanczos => "LANCZOS",
        }
    }

    /// Whether the power-of-two box filter runs first.
    pub fn uses_box_filter(&self) -> bool {
        matches!(self, Self::Box | Self::BoxThenNearest | Self::BoxThenLinear)
    }

    /// The point/bilinear sampler that closes the gap after box filtering, if any.
    pub fn secondary_filter(&self) -> Option<SamplingMode> {
        match self {
            Self::Nearest | Self::BoxThenNearest => Some(Self::Nearest),
            Self::Linear | Self::BoxThenLinear => Some(Self::Linear),
            Self::Box | Self::NoFilter | Self::Lanczos => None,
        }
    }
}

/// Which dimension(s) must stay at or above the desired size while halving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoxDimensionTest {
    Either,
    Both,
    X,
    Y,
}

/// A complete scaling request, as carried by a load request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageAttributes {
    pub dimensions: ImageDimensions,
    pub fitting_mode: FittingMode,
    pub sampling_mode: SamplingMode,
}

impl ImageAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, width: u16, height: u16) -> Self {
        self.dimensions = ImageDimensions::new(width, height);
        self
    }

    pub fn with_fitting_mode(mut self, fitting_mode: FittingMode) -> Self {
        self.fitting_mode = fitting_mode;
        self
    }

    pub fn with_sampling_mode(mut self, sampling_mode: SamplingMode) -> Self {
        self.sampling_mode = sampling_mode;
        self
    }
}
