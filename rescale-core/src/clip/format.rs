//! Pixel formats understood by the graph builder.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorFamily {
    Gray,
    Yuv,
    Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleType {
    Integer,
    Float,
}

/// Constant pixel format of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoFormat {
    pub family: ColorFamily,
    pub sample_type: SampleType,
    pub bits: u8,
    /// log2 of the horizontal chroma subsampling factor
    pub subsampling_w: u8,
    /// log2 of the vertical chroma subsampling factor
    pub subsampling_h: u8,
}

impl VideoFormat {
    pub const GRAY8: Self = Self::gray(SampleType::Integer, 8);
    pub const GRAY10: Self = Self::gray(SampleType::Integer, 10);
    pub const GRAY16: Self = Self::gray(SampleType::Integer, 16);
    pub const GRAYS: Self = Self::gray(SampleType::Float, 32);
    pub const YUV420P8: Self = Self::yuv(SampleType::Integer, 8, 1, 1);
    pub const YUV420P10: Self = Self::yuv(SampleType::Integer, 10, 1, 1);
    pub const YUV420P16: Self = Self::yuv(SampleType::Integer, 16, 1, 1);
    pub const YUV444P16: Self = Self::yuv(SampleType::Integer, 16, 0, 0);
    pub const YUV444PS: Self = Self::yuv(SampleType::Float, 32, 0, 0);
    pub const RGB24: Self = Self {
        family: ColorFamily::Rgb,
        sample_type: SampleType::Integer,
        bits: 8,
        subsampling_w: 0,
        subsampling_h: 0,
    };

    pub const fn gray(sample_type: SampleType, bits: u8) -> Self {
        Self {
            family: ColorFamily::Gray,
            sample_type,
            bits,
            subsampling_w: 0,
            subsampling_h: 0,
        }
    }

    pub const fn yuv(
        sample_type: SampleType,
        bits: u8,
        subsampling_w: u8,
        subsampling_h: u8,
    ) -> Self {
        Self {
            family: ColorFamily::Yuv,
            sample_type,
            bits,
            subsampling_w,
            subsampling_h,
        }
    }

    /// Validate the combination of sample type and bit depth.
    pub fn checked(self) -> Result<Self> {
        let valid = match self.sample_type {
            SampleType::Integer => (8..=16).contains(&self.bits),
            SampleType::Float => self.bits == 16 || self.bits == 32,
        };
        let subsampled = self.subsampling_w > 0 || self.subsampling_h > 0;
        let layout_ok = !(subsampled && self.family != ColorFamily::Yuv)
            && self.subsampling_w <= 2
            && self.subsampling_h <= 2;
        if !valid || !layout_ok {
            return Err(Error::UnsupportedFormat {
                func: "VideoFormat",
                format: self.to_string(),
            });
        }
        Ok(self)
    }

    pub fn num_planes(&self) -> usize {
        match self.family {
            ColorFamily::Gray => 1,
            ColorFamily::Yuv | ColorFamily::Rgb => 3,
        }
    }

    pub fn is_float(&self) -> bool {
        self.sample_type == SampleType::Float
    }

    /// Single-plane format with the same sample type and depth.
    pub fn plane_format(&self) -> Self {
        Self::gray(self.sample_type, self.bits)
    }

    /// Same family and subsampling at another depth.
    pub fn with_depth(&self, sample_type: SampleType, bits: u8) -> Self {
        Self {
            sample_type,
            bits,
            ..*self
        }
    }

    /// Full-range peak value of a plane.
    pub fn peak_value(&self, chroma: bool) -> f64 {
        match self.sample_type {
            SampleType::Integer => ((1u32 << self.bits) - 1) as f64,
            SampleType::Float if chroma => 0.5,
            SampleType::Float => 1.0,
        }
    }

    pub fn lowest_value(&self, chroma: bool) -> f64 {
        match self.sample_type {
            SampleType::Integer => 0.0,
            SampleType::Float if chroma => -0.5,
            SampleType::Float => 0.0,
        }
    }

    pub fn neutral_value(&self) -> f64 {
        match self.sample_type {
            SampleType::Integer => (1u32 << (self.bits - 1)) as f64,
            SampleType::Float => 0.0,
        }
    }

    /// Scale a value expressed at `input_bits` (32 meaning normalized float) to this format.
    pub fn scale_value(&self, value: f64, input_bits: u8) -> f64 {
        let input_peak = if input_bits >= 32 {
            1.0
        } else {
            ((1u32 << input_bits) - 1) as f64
        };
        value / input_peak * self.peak_value(false)
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.sample_type {
            SampleType::Float if self.bits == 16 => "H".to_string(),
            SampleType::Float => "S".to_string(),
            SampleType::Integer => self.bits.to_string(),
        };
        match self.family {
            ColorFamily::Gray => write!(f, "GRAY{}", suffix),
            ColorFamily::Rgb => write!(f, "RGBP{}", suffix),
            ColorFamily::Yuv => {
                let layout = match (self.subsampling_w, self.subsampling_h) {
                    (1, 1) => "420",
                    (1, 0) => "422",
                    (0, 0) => "444",
                    (2, 0) => "411",
                    (2, 2) => "410",
                    (0, 1) => "440",
                    _ => "4xx",
                };
                write!(f, "YUV{}P{}", layout, suffix)
            }
        }
    }
}
