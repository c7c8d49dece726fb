//! # Scaling Arguments
//!
//! Turns a requested descale size (integer or sub-pixel), optional base
//! containment size and crop into the exact kernel parameters: output size,
//! fractional source extent and source shift per axis.

use serde::{Deserialize, Serialize};

use crate::clip::Clip;
use crate::error::{Error, Result};
use crate::kernel::SampleWindow;

// ============================================================================
// Inputs
// ============================================================================

/// Axes a set of kernel parameters applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScaleMode {
    HeightOnly,
    WidthOnly,
    #[default]
    Both,
}

impl ScaleMode {
    pub fn has_height(&self) -> bool {
        !matches!(self, ScaleMode::WidthOnly)
    }

    pub fn has_width(&self) -> bool {
        !matches!(self, ScaleMode::HeightOnly)
    }
}

/// Requested descale size along one axis. `Fractional` forces a sub-pixel descale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Dimension {
    Exact(u32),
    Fractional(f64),
}

impl Dimension {
    pub fn value(&self) -> f64 {
        match *self {
            Dimension::Exact(v) => v as f64,
            Dimension::Fractional(v) => v,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Dimension::Exact(_))
    }
}

impl From<u32> for Dimension {
    fn from(value: u32) -> Self {
        Dimension::Exact(value)
    }
}

impl From<f64> for Dimension {
    fn from(value: f64) -> Self {
        Dimension::Fractional(value)
    }
}

/// Pixels removed from each side of the source before descaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Crop {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl Crop {
    pub fn new(left: u32, right: u32, top: u32, bottom: u32) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left == 0 && self.right == 0 && self.top == 0 && self.bottom == 0
    }
}

/// `x * round(value / x)` with ties to even, never below `x * x`.
fn mod_x(value: f64, x: u32) -> u32 {
    let x_f = x as f64;
    let rounded = (value / x_f).round_ties_even() * x_f;
    (rounded.max(0.0) as u32).max(x * x)
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn mod2(value: f64) -> u32 {
    mod_x(value, 2)
}

/// Width matching `height` at the aspect ratio of `clip`.
pub fn get_w(height: f64, clip: &Clip) -> u32 {
    mod2(height * clip.width() as f64 / clip.height() as f64)
}

// ============================================================================
// ScalingArgs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingArgs {
    pub width: u32,
    pub height: u32,
    pub src_width: f64,
    pub src_height: f64,
    pub src_top: f64,
    pub src_left: f64,
    pub mode: ScaleMode,
}

/// Per-axis solution: output size, source extent, source shift.
struct Axis {
    size: u32,
    src_size: f64,
    src_shift: f64,
}

fn solve_axis(
    func: &'static str,
    requested: Dimension,
    base: Option<u32>,
    source: u32,
    crop_a: u32,
    crop_b: u32,
    shift: f64,
) -> Result<Axis> {
    let dim = requested.value();
    let remaining = crop_a
        .checked_add(crop_b)
        .and_then(|crops| source.checked_sub(crops))
        .filter(|&remaining| remaining > 0);
    let Some(remaining) = remaining else {
        return Err(Error::invalid_argument(
            func,
            format!("crop {}+{} leaves nothing of {}", crop_a, crop_b, source),
        ));
    };
    let base = base.unwrap_or_else(|| mod2(dim.ceil())) as f64;
    let source_f = source as f64;

    let margin_a = (base - dim) / 2.0 + dim * crop_a as f64 / source_f;
    let margin_b = (base - dim) / 2.0 + dim * crop_b as f64 / source_f;
    let size = base - margin_a.floor() - margin_b.floor();
    if size < 1.0 {
        return Err(Error::invalid_argument(
            func,
            format!(
                "base size {} is smaller than the descale size {}",
                base, dim
            ),
        ));
    }

    let src_size = if requested.is_exact() && crop_a == 0 && crop_b == 0 {
        size
    } else {
        dim * remaining as f64 / source_f
    };

    Ok(Axis {
        size: size as u32,
        src_size,
        src_shift: margin_a - margin_a.floor() + shift,
    })
}

impl ScalingArgs {
    /// Solve the descale parameters for `base_clip`.
    ///
    /// A missing `width` follows the clip's aspect ratio. Exact sizes without
    /// base sizes or crop map the whole frame; everything else carries the
    /// fractional margins into the source window.
    #[allow(clippy::too_many_arguments)]
    pub fn from_args(
        base_clip: &Clip,
        height: Dimension,
        width: Option<Dimension>,
        base_height: Option<u32>,
        base_width: Option<u32>,
        src_top: f64,
        src_left: f64,
        crop: Crop,
        mode: ScaleMode,
    ) -> Result<Self> {
        base_clip.require_constant("ScalingArgs")?;
        if !is_positive(height.value()) {
            return Err(Error::invalid_argument(
                "ScalingArgs",
                format!("height must be positive, got {}", height.value()),
            ));
        }

        let width = match width {
            Some(width) => width,
            None => match height {
                Dimension::Exact(h) => Dimension::Exact(get_w(h as f64, base_clip)),
                Dimension::Fractional(h) => Dimension::Fractional(
                    h * base_clip.width() as f64 / base_clip.height() as f64,
                ),
            },
        };
        if !is_positive(width.value()) {
            return Err(Error::invalid_argument(
                "ScalingArgs",
                format!("width must be positive, got {}", width.value()),
            ));
        }

        if let (Dimension::Exact(w), Dimension::Exact(h)) = (width, height) {
            if base_height.is_none() && base_width.is_none() && crop.is_empty() {
                return Ok(Self {
                    width: w,
                    height: h,
                    src_width: w as f64,
                    src_height: h as f64,
                    src_top,
                    src_left,
                    mode,
                });
            }
        }

        let vertical = solve_axis(
            "ScalingArgs",
            height,
            base_height,
            base_clip.height(),
            crop.top,
            crop.bottom,
            src_top,
        )?;
        let horizontal = solve_axis(
            "ScalingArgs",
            width,
            base_width,
            base_clip.width(),
            crop.left,
            crop.right,
            src_left,
        )?;

        Ok(Self {
            width: horizontal.size,
            height: vertical.size,
            src_width: horizontal.src_size,
            src_height: vertical.src_size,
            src_top: vertical.src_shift,
            src_left: horizontal.src_shift,
            mode,
        })
    }

    /// Sample window for the axes in `mode`.
    ///
    /// With a `reference` clip the window is expressed in the reference's
    /// pixel grid, e.g. the doubled clip when downscaling back.
    pub fn window(&self, mode: ScaleMode, reference: Option<&Clip>) -> SampleWindow {
        let mut window = SampleWindow::default();
        if mode.has_height() {
            let rate = reference
                .map(|clip| clip.height() as f64 / self.height as f64)
                .unwrap_or(1.0);
            window.src_height = Some(self.src_height * rate);
            window.src_top = Some(self.src_top * rate);
        }
        if mode.has_width() {
            let rate = reference
                .map(|clip| clip.width() as f64 / self.width as f64)
                .unwrap_or(1.0);
            window.src_width = Some(self.src_width * rate);
            window.src_left = Some(self.src_left * rate);
        }
        window
    }

    /// Window for the stored mode.
    pub fn kwargs(&self, reference: Option<&Clip>) -> SampleWindow {
        self.window(self.mode, reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::testing::gray_source;

    fn solve(clip: &Clip, height: Dimension, crop: Crop) -> ScalingArgs {
        ScalingArgs::from_args(clip, height, None, None, None, 0.0, 0.0, crop, ScaleMode::Both)
            .expect("scaling args")
    }

    #[test]
    fn exact_height_keeps_aspect() {
        let src = gray_source(1920, 1080);
        let args = solve(&src, Dimension::Exact(720), Crop::default());
        assert_eq!((args.width, args.height), (1280, 720));
        assert_eq!((args.src_width, args.src_height), (1280.0, 720.0));
        assert_eq!((args.src_top, args.src_left), (0.0, 0.0));
    }

    #[test]
    fn get_w_rounds_to_even() {
        let src = gray_source(1920, 1080);
        assert_eq!(get_w(720.0, &src), 1280);
        assert_eq!(get_w(873.0, &src), 1552);
        assert_eq!(get_w(1.0, &src), 4);
    }

    #[test]
    fn fractional_height_carries_margin_into_shift() {
        let src = gray_source(1920, 1080);
        let args = solve(&src, Dimension::Fractional(715.5), Crop::default());
        assert_eq!(args.height, 716);
        assert_eq!(args.src_height, 715.5);
        assert_eq!(args.src_top, 0.25);
        assert_eq!(args.width, 1272);
        assert_eq!(args.src_width, 1272.0);
        assert_eq!(args.src_left, 0.0);
    }

    #[test]
    fn crop_scales_margins_by_descale_ratio() {
        let src = gray_source(1920, 1080);
        let args = solve(&src, Dimension::Exact(720), Crop::new(0, 0, 8, 8));
        assert_eq!(args.height, 710);
        assert!((args.src_height - 720.0 * 1064.0 / 1080.0).abs() < 1e-9);
        assert!((args.src_top - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!((args.width, args.src_width), (1280, 1280.0));
    }

    #[test]
    fn base_size_centres_the_descale() {
        let src = gray_source(1920, 1080);
        let args = ScalingArgs::from_args(
            &src,
            Dimension::Fractional(719.5),
            Some(Dimension::Exact(1280)),
            Some(724),
            None,
            0.0,
            0.0,
            Crop::default(),
            ScaleMode::Both,
        )
        .expect("scaling args");
        assert_eq!(args.height, 720);
        assert_eq!(args.src_height, 719.5);
        assert_eq!(args.src_top, 0.25);
        assert_eq!((args.width, args.src_width), (1280, 1280.0));
    }

    #[test]
    fn window_respects_mode_and_reference() {
        let src = gray_source(1920, 1080);
        let args = solve(&src, Dimension::Fractional(715.5), Crop::default());

        let height_only = args.window(ScaleMode::HeightOnly, None);
        assert_eq!(height_only.src_height, Some(715.5));
        assert!(height_only.src_width.is_none());

        let width_only = args.window(ScaleMode::WidthOnly, None);
        assert!(width_only.src_height.is_none());
        assert_eq!(width_only.src_width, Some(1272.0));

        let doubled = gray_source(args.width * 2, args.height * 2);
        let up = args.window(ScaleMode::Both, Some(&doubled));
        assert_eq!(up.src_height, Some(1431.0));
        assert_eq!(up.src_top, Some(0.5));
        assert_eq!(args.mode, ScaleMode::Both);
    }

    #[test]
    fn rejects_impossible_requests() {
        let src = gray_source(1920, 1080);
        assert!(ScalingArgs::from_args(
            &src,
            Dimension::Fractional(-1.0),
            None,
            None,
            None,
            0.0,
            0.0,
            Crop::default(),
            ScaleMode::Both,
        )
        .is_err());
        assert!(ScalingArgs::from_args(
            &src,
            Dimension::Exact(720),
            None,
            None,
            None,
            0.0,
            0.0,
            Crop::new(1000, 1000, 0, 0),
            ScaleMode::Both,
        )
        .is_err());
        let overflow = ScalingArgs::from_args(
            &src,
            Dimension::Exact(720),
            None,
            None,
            None,
            0.0,
            0.0,
            Crop::new(0, 0, u32::MAX, 1),
            ScaleMode::Both,
        );
        assert!(matches!(overflow, Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn shift_is_added_to_the_margin() {
        let src = gray_source(1920, 1080);
        let shifted = |crop: Crop| {
            ScalingArgs::from_args(
                &src,
                Dimension::Exact(720),
                None,
                None,
                None,
                0.5,
                0.25,
                crop,
                ScaleMode::Both,
            )
            .expect("scaling args")
        };
        let whole = shifted(Crop::default());
        assert_eq!((whole.src_top, whole.src_left), (0.5, 0.25));
        assert_eq!((whole.src_width, whole.src_height), (1280.0, 720.0));

        let cropped = shifted(Crop::new(2, 0, 0, 6));
        assert_eq!((cropped.width, cropped.height), (1279, 716));
        assert_eq!(cropped.src_top, 0.5);
        assert!((cropped.src_left - (1.0 / 3.0 + 0.25)).abs() < 1e-9);
    }
}
