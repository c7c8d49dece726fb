//! Scalar construction parameters of a [`crate::Rescale`].

use serde::{Deserialize, Serialize};

use crate::field::FieldBased;
use crate::kernel::BorderHandling;
use crate::scaling_args::{Crop, Dimension};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RescaleOptions {
    /// Descale height. `Fractional` forces a sub-pixel descale.
    pub height: Dimension,
    /// Descale width, derived from the height and aspect ratio when unset.
    #[serde(default)]
    pub width: Option<Dimension>,
    /// Integer height the descaled picture is contained in.
    #[serde(default)]
    pub base_height: Option<u32>,
    #[serde(default)]
    pub base_width: Option<u32>,
    /// Cropped before descaling and restored from the source after upscaling.
    #[serde(default)]
    pub crop: Crop,
    /// (top, left) shift applied to the source window.
    #[serde(default)]
    pub shift: (f64, f64),
    #[serde(default)]
    pub field_based: Option<FieldBased>,
    #[serde(default)]
    pub border_handling: BorderHandling,
}

impl RescaleOptions {
    pub fn new(height: impl Into<Dimension>) -> Self {
        Self {
            height: height.into(),
            width: None,
            base_height: None,
            base_width: None,
            crop: Crop::default(),
            shift: (0.0, 0.0),
            field_based: None,
            border_handling: BorderHandling::Mirror,
        }
    }

    pub fn with_width(mut self, width: impl Into<Dimension>) -> Self {
        self.width = Some(width.into());
        self
    }

    pub fn with_base_size(mut self, base_width: Option<u32>, base_height: Option<u32>) -> Self {
        self.base_width = base_width;
        self.base_height = base_height;
        self
    }

    pub fn with_crop(mut self, crop: Crop) -> Self {
        self.crop = crop;
        self
    }

    pub fn with_shift(mut self, top: f64, left: f64) -> Self {
        self.shift = (top, left);
        self
    }

    pub fn with_field_based(mut self, field_based: FieldBased) -> Self {
        self.field_based = Some(field_based);
        self
    }

    pub fn with_border_handling(mut self, border_handling: BorderHandling) -> Self {
        self.border_handling = border_handling;
        self
    }
}

/// 720p, the most common native resolution of upscaled sources.
impl Default for RescaleOptions {
    fn default() -> Self {
        Self::new(720u32)
    }
}
