//! Explicit session context: the visual used for native buffers and the library defaults.

use core::fmt;

use crate::color::{Argb32, GammaTable};
use crate::native::{SoftwareVisual, Visual};

/// Quantization tier used when encoding scanlines that carry extra precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Quality {
    /// Truncation only.
    Poor,
    /// Truncation only.
    Fast,
    /// Half of the quantization error is carried to the next sample.
    #[default]
    Good,
    /// Error diffusion over two rows.
    Top,
}

impl Quality {
    /// Maps a numeric level (0 = poor to 3 = top) to a tier, using `default` when out of range.
    pub fn from_level(level: i32, default: Quality) -> Self {
        match level {
            0 => Quality::Poor,
            1 => Quality::Fast,
            2 => Quality::Good,
            3 => Quality::Top,
            _ => default,
        }
    }

    pub fn level(self) -> i32 {
        match self {
            Quality::Poor => 0,
            Quality::Fast => 1,
            Quality::Good => 2,
            Quality::Top => 3,
        }
    }
}

/// Library-wide defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub quality: Quality,
    /// Percentage of each row scanned for runs, 0 to 100.
    pub compression: u32,
    pub back_color: Argb32,
    pub gamma: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quality: Quality::Good,
            compression: 100,
            back_color: Argb32::DEFAULT_BACK,
            gamma: 1.0,
        }
    }
}

impl Config {
    #[must_use]
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compression: u32) -> Self {
        self.compression = compression.min(100);
        self
    }

    #[must_use]
    pub fn with_back_color(mut self, back_color: Argb32) -> Self {
        self.back_color = back_color;
        self
    }

    #[must_use]
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn gamma_table(&self) -> GammaTable {
        GammaTable::new(self.gamma)
    }
}

/// Everything a decoding or encoding session needs besides the images themselves.
pub struct Context {
    visual: Box<dyn Visual>,
    config: Config,
}

impl Context {
    pub fn new(visual: Box<dyn Visual>, config: Config) -> Self {
        Self { visual, config }
    }

    pub fn visual(&self) -> &dyn Visual {
        self.visual.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Resolves an optional quality against the configured default.
    pub fn quality(&self, quality: Option<Quality>) -> Quality {
        quality.unwrap_or(self.config.quality)
    }

    /// Resolves an optional compression against the configured default.
    pub fn compression(&self, compression: Option<u32>) -> u32 {
        compression.unwrap_or(self.config.compression).min(100)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Box::new(SoftwareVisual::default()), Config::default())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("visual", &self.visual)
            .field("config", &self.config)
            .finish()
    }
}
