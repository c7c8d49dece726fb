//! # Resampling Kernels
//!
//! A [`Kernel`] knows how to undo an upscale (`descale`) and how to redo it
//! (`scale`). The shipped [`ResampleKernel`] emits `descale.*` and `resize.*`
//! nodes; the filter math itself lives in the engine plugins.
//!
//! Field-based clips are handled per field: the clip (and its ignore mask)
//! is split into fields, the operation runs at half height and the fields
//! are woven back.

use serde::{Deserialize, Serialize};

use crate::clip::ops::{self, DitherType};
use crate::clip::{Arg, Clip, ColorFamily, SampleType, VideoFormat};
use crate::error::{Error, Result};
use crate::field::FieldBased;

// ============================================================================
// Parameters
// ============================================================================

/// How the source was padded when it was originally upscaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BorderHandling {
    #[default]
    Mirror = 0,
    Zero = 1,
    Extend = 2,
}

impl BorderHandling {
    pub fn is_mirror(&self) -> bool {
        matches!(self, BorderHandling::Mirror)
    }
}

impl TryFrom<u8> for BorderHandling {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(BorderHandling::Mirror),
            1 => Ok(BorderHandling::Zero),
            2 => Ok(BorderHandling::Extend),
            other => Err(Error::invalid_argument(
                "BorderHandling",
                format!("expected 0, 1 or 2, got {}", other),
            )),
        }
    }
}

/// Source window handed to kernel calls. Unset fields use the whole input.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SampleWindow {
    pub src_top: Option<f64>,
    pub src_left: Option<f64>,
    pub src_width: Option<f64>,
    pub src_height: Option<f64>,
}

impl SampleWindow {
    pub fn is_empty(&self) -> bool {
        self.src_top.is_none()
            && self.src_left.is_none()
            && self.src_width.is_none()
            && self.src_height.is_none()
    }

    fn to_args(self) -> Vec<(String, Arg)> {
        [
            ("src_top", self.src_top),
            ("src_left", self.src_left),
            ("src_width", self.src_width),
            ("src_height", self.src_height),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), Arg::Float(v))))
        .collect()
    }

    /// Window of one field of a field-based clip.
    fn per_field(self) -> Self {
        Self {
            src_top: self.src_top.map(|v| v / 2.0),
            src_height: self.src_height.map(|v| v / 2.0),
            ..self
        }
    }
}

// ============================================================================
// Kernel trait
// ============================================================================

pub trait Kernel: Send + Sync {
    /// Name recorded in frame properties.
    fn name(&self) -> &str;

    /// Pixels at each edge that are unreliable after non-mirror padding.
    fn kernel_radius(&self) -> u32;

    /// Undo a resize to the current size from `width`x`height`. `None` keeps
    /// that axis untouched.
    fn descale(
        &self,
        clip: &Clip,
        width: Option<u32>,
        height: Option<u32>,
        window: &SampleWindow,
        border_handling: BorderHandling,
        ignore_mask: Option<&Clip>,
    ) -> Result<Clip>;

    /// Resize to `width`x`height` reading `window` from the input.
    fn scale(
        &self,
        clip: &Clip,
        width: u32,
        height: u32,
        window: &SampleWindow,
        border_handling: BorderHandling,
    ) -> Result<Clip>;
}

// ============================================================================
// Resample kernels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    Point,
    Bilinear,
    Bicubic { b: f64, c: f64 },
    Lanczos { taps: u32 },
    Spline36,
}

impl Filter {
    fn plugin_suffix(&self) -> &'static str {
        match self {
            Filter::Point => "Point",
            Filter::Bilinear => "Bilinear",
            Filter::Bicubic { .. } => "Bicubic",
            Filter::Lanczos { .. } => "Lanczos",
            Filter::Spline36 => "Spline36",
        }
    }

    fn params(&self, descale: bool) -> Vec<(String, Arg)> {
        match *self {
            Filter::Bicubic { b, c } if descale => vec![
                ("b".to_string(), Arg::Float(b)),
                ("c".to_string(), Arg::Float(c)),
            ],
            Filter::Bicubic { b, c } => vec![
                ("filter_param_a".to_string(), Arg::Float(b)),
                ("filter_param_b".to_string(), Arg::Float(c)),
            ],
            Filter::Lanczos { taps } if descale => {
                vec![("taps".to_string(), Arg::from(taps))]
            }
            Filter::Lanczos { taps } => {
                vec![("filter_param_a".to_string(), Arg::from(taps))]
            }
            _ => Vec::new(),
        }
    }

    fn radius(&self) -> u32 {
        match *self {
            Filter::Point | Filter::Bilinear => 1,
            Filter::Bicubic { b, c } if b == 0.0 && c == 0.0 => 1,
            Filter::Bicubic { .. } => 2,
            Filter::Lanczos { taps } => taps,
            Filter::Spline36 => 3,
        }
    }
}

/// Kernel backed by the engine's `descale` and `resize` plugins.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampleKernel {
    name: String,
    filter: Filter,
    linear: bool,
}

impl ResampleKernel {
    pub fn new(name: impl Into<String>, filter: Filter) -> Self {
        Self {
            name: name.into(),
            filter,
            linear: false,
        }
    }

    pub fn point() -> Self {
        Self::new("Point", Filter::Point)
    }

    pub fn bilinear() -> Self {
        Self::new("Bilinear", Filter::Bilinear)
    }

    pub fn bicubic(b: f64, c: f64) -> Self {
        Self::new("Bicubic", Filter::Bicubic { b, c })
    }

    pub fn catrom() -> Self {
        Self::new("Catrom", Filter::Bicubic { b: 0.0, c: 0.5 })
    }

    pub fn mitchell() -> Self {
        Self::new("Mitchell", Filter::Bicubic { b: 1.0 / 3.0, c: 1.0 / 3.0 })
    }

    pub fn hermite() -> Self {
        Self::new("Hermite", Filter::Bicubic { b: 0.0, c: 0.0 })
    }

    pub fn lanczos(taps: u32) -> Self {
        Self::new("Lanczos", Filter::Lanczos { taps })
    }

    pub fn spline36() -> Self {
        Self::new("Spline36", Filter::Spline36)
    }

    /// Resize in linear light when used as a scaler.
    pub fn linear(mut self) -> Self {
        self.linear = true;
        self
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn is_linear(&self) -> bool {
        self.linear
    }

    fn descale_plane(
        &self,
        clip: &Clip,
        width: u32,
        height: u32,
        window: &SampleWindow,
        border_handling: BorderHandling,
        ignore_mask: Option<&Clip>,
    ) -> Result<Clip> {
        let function = format!("descale.De{}", self.filter.plugin_suffix().to_lowercase());
        let mut args = vec![
            ("width".to_string(), Arg::from(width)),
            ("height".to_string(), Arg::from(height)),
        ];
        args.extend(self.filter.params(true));
        args.extend(window.to_args());
        args.push((
            "border_handling".to_string(),
            Arg::Int(border_handling as i64),
        ));

        let mut inputs = vec![clip.clone()];
        if let Some(mask) = ignore_mask {
            inputs.push(mask.clone());
        }
        let info = clip.info().resized(width, height);
        Ok(Clip::derive(function, inputs, args, info))
    }

    fn scale_plane(
        &self,
        clip: &Clip,
        width: u32,
        height: u32,
        window: &SampleWindow,
        border_handling: BorderHandling,
    ) -> Result<Clip> {
        // resize.* cannot pad with zeros or edges, the descale plugin's forward scalers can.
        let namespace = if border_handling.is_mirror() { "resize" } else { "descale" };
        let function = format!("{}.{}", namespace, self.filter.plugin_suffix());
        let mut args = vec![
            ("width".to_string(), Arg::from(width)),
            ("height".to_string(), Arg::from(height)),
        ];
        args.extend(self.filter.params(false));
        args.extend(window.to_args());
        if !border_handling.is_mirror() {
            args.push((
                "border_handling".to_string(),
                Arg::Int(border_handling as i64),
            ));
        }
        let info = clip.info().resized(width, height);
        Ok(Clip::derive(function, vec![clip.clone()], args, info))
    }
}

/// Weave processed fields back into frames.
fn weave_fields(fields: &Clip, tff: bool) -> Result<Clip> {
    let woven = ops::double_weave(fields, tff)?;
    ops::select_every(&woven, 2, &[0])
}

fn check_field_height(height: u32) -> Result<()> {
    if !height.is_multiple_of(2) {
        return Err(Error::invalid_argument(
            "field-based",
            format!("target height {} must be even", height),
        ));
    }
    Ok(())
}

fn check_target(func: &'static str, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions {
            func,
            width: width as i64,
            height: height as i64,
        });
    }
    Ok(())
}

impl Kernel for ResampleKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kernel_radius(&self) -> u32 {
        self.filter.radius()
    }

    fn descale(
        &self,
        clip: &Clip,
        width: Option<u32>,
        height: Option<u32>,
        window: &SampleWindow,
        border_handling: BorderHandling,
        ignore_mask: Option<&Clip>,
    ) -> Result<Clip> {
        let format = clip.require_constant("descale")?;
        if format.family != ColorFamily::Gray {
            return Err(Error::UnsupportedFormat {
                func: "descale",
                format: format.to_string(),
            });
        }
        let width = width.unwrap_or(clip.width());
        let height = height.unwrap_or(clip.height());
        check_target("descale", width, height)?;
        if width > clip.width() || height > clip.height() {
            return Err(Error::InvalidDimensions {
                func: "descale",
                width: width as i64,
                height: height as i64,
            });
        }
        if let Some(mask) = ignore_mask {
            let mask_format = mask.require_constant("descale")?;
            if mask_format != VideoFormat::GRAY8 {
                return Err(Error::UnsupportedFormat {
                    func: "descale",
                    format: mask_format.to_string(),
                });
            }
            if mask.width() != clip.width() || mask.height() != clip.height() {
                return Err(Error::mismatched(
                    "descale",
                    format!(
                        "ignore mask {}x{} vs clip {}x{}",
                        mask.width(),
                        mask.height(),
                        clip.width(),
                        clip.height()
                    ),
                ));
            }
        }

        let field_based = FieldBased::from_clip(clip);
        if !field_based.is_inter() {
            return self.descale_plane(clip, width, height, window, border_handling, ignore_mask);
        }
        check_field_height(height)?;
        let tff = field_based.is_tff();
        let fields = ops::separate_fields(clip, tff)?;
        let mask_fields = ignore_mask
            .map(|mask| ops::separate_fields(mask, tff))
            .transpose()?;
        let descaled = self.descale_plane(
            &fields,
            width,
            height / 2,
            &window.per_field(),
            border_handling,
            mask_fields.as_ref(),
        )?;
        weave_fields(&descaled, tff)
    }

    fn scale(
        &self,
        clip: &Clip,
        width: u32,
        height: u32,
        window: &SampleWindow,
        border_handling: BorderHandling,
    ) -> Result<Clip> {
        clip.require_constant("scale")?;
        check_target("scale", width, height)?;
        let field_based = FieldBased::from_clip(clip);
        if !field_based.is_inter() {
            return self.scale_plane(clip, width, height, window, border_handling);
        }
        check_field_height(height)?;
        let tff = field_based.is_tff();
        let fields = ops::separate_fields(clip, tff)?;
        let scaled = self.scale_plane(
            &fields,
            width,
            height / 2,
            &window.per_field(),
            border_handling,
        )?;
        weave_fields(&scaled, tff)
    }
}

/// Convert to and from linear light around `op`.
pub(crate) fn in_linear_light(clip: &Clip, op: impl FnOnce(&Clip) -> Result<Clip>) -> Result<Clip> {
    let format = clip.require_format("linear")?;
    let linear = Clip::derive(
        "resize.Point",
        vec![clip.clone()],
        vec![
            (
                "format".to_string(),
                Arg::from(format.with_depth(SampleType::Float, 32).to_string()),
            ),
            ("transfer_in_s".to_string(), Arg::from("709")),
            ("transfer_s".to_string(), Arg::from("linear")),
        ],
        clip.info().reformatted(format.with_depth(SampleType::Float, 32)),
    );
    let processed = op(&linear)?;
    let back = Clip::derive(
        "resize.Point",
        vec![processed.clone()],
        vec![
            ("transfer_in_s".to_string(), Arg::from("linear")),
            ("transfer_s".to_string(), Arg::from("709")),
        ],
        *processed.info(),
    );
    ops::depth(&back, format.sample_type, format.bits, DitherType::None)
}
