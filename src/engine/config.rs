// src/engine/config.rs
//
// Scaling limits.
//
// The only tunable is the maximum texture size a decoded bitmap is clamped to
// when the caller does not ask for a specific size. The process-wide default is
// read once from BITMAP_OPS_MAX_TEXTURE_SIZE; changes after first use have no effect.

use crate::error::BitmapOpsError;
use crate::ops::MAXIMUM_TARGET_BITMAP_SIZE;
use once_cell::sync::Lazy;
use tracing::warn;

/// Default maximum texture size (GL_MAX_TEXTURE_SIZE of common GPUs).
pub const DEFAULT_MAX_TEXTURE_SIZE: u32 = 4096;

/// Environment variable overriding the global maximum texture size.
pub const MAX_TEXTURE_SIZE_ENV: &str = "BITMAP_OPS_MAX_TEXTURE_SIZE";

static GLOBAL_CONFIG: Lazy<ScalingConfig> = Lazy::new(ScalingConfig::from_env);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScalingConfig {
    pub max_texture_size: u32,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            max_texture_size: DEFAULT_MAX_TEXTURE_SIZE,
        }
    }
}

impl ScalingConfig {
    /// No clamp beyond the hard 16-bit ceiling.
    pub fn unlimited() -> Self {
        Self {
            max_texture_size: MAXIMUM_TARGET_BITMAP_SIZE,
        }
    }

    pub fn with_max_texture_size(max_texture_size: u32) -> Self {
        Self { max_texture_size }
    }

    /// Process-wide configuration, initialized from the environment on first use.
    pub fn global() -> &'static ScalingConfig {
        &GLOBAL_CONFIG
    }

    pub fn from_env() -> Self {
        let raw = match std::env::var(MAX_TEXTURE_SIZE_ENV) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        let config = raw
            .trim()
            .parse::<u32>()
            .ok()
            .map(Self::with_max_texture_size)
            .filter(|config| config.validate().is_ok());
        match config {
            Some(config) => config,
            None => {
                warn!(
                    target: "bitmap_ops::config",
                    value = %raw,
                    default = DEFAULT_MAX_TEXTURE_SIZE,
                    "ignoring invalid {MAX_TEXTURE_SIZE_ENV}"
                );
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), BitmapOpsError> {
        if self.max_texture_size == 0 || self.max_texture_size > MAXIMUM_TARGET_BITMAP_SIZE {
            return Err(BitmapOpsError::invalid_argument(
                "max_texture_size",
                self.max_texture_size.to_string(),
                format!("Must be between 1 and {MAXIMUM_TARGET_BITMAP_SIZE}"),
            ));
        }
        Ok(())
    }

    /// Texture size actually applied, clamped into the valid range.
    pub(crate) fn effective_max_texture_size(&self) -> u32 {
        self.max_texture_size.clamp(1, MAXIMUM_TARGET_BITMAP_SIZE)
    }
}
