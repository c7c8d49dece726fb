//! # Masks
//!
//! Edge and difference mask seams used by the default mask builders, plus
//! standalone masks: where a descale failed to reproduce the source, where
//! fine detail lives, and where credits were overlaid.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clip::ops::{self, ExpandMode};
use crate::clip::{Clip, ColorFamily, VideoFormat};
use crate::error::{Error, Result};
use crate::kernel::{ResampleKernel, SampleWindow};
use crate::scaler::Scaler;

// ============================================================================
// Edge detection
// ============================================================================

pub trait EdgeDetector: Send + Sync {
    fn name(&self) -> &str;

    /// Edge strength of the luma plane of `clip`.
    fn edgemask(&self, clip: &Clip) -> Result<Clip>;
}

const KIRSCH: [[i64; 9]; 8] = [
    [5, 5, 5, -3, 0, -3, -3, -3, -3],
    [5, 5, -3, 5, 0, -3, -3, -3, -3],
    [5, -3, -3, 5, 0, -3, 5, -3, -3],
    [-3, -3, -3, 5, 0, -3, 5, 5, -3],
    [-3, -3, -3, -3, 0, -3, 5, 5, 5],
    [-3, -3, -3, -3, 0, 5, -3, 5, 5],
    [-3, -3, 5, -3, 0, 5, -3, -3, 5],
    [-3, 5, 5, -3, 0, 5, -3, -3, -3],
];

/// Maximum of the eight Kirsch compass gradients.
///
/// With `hthr` set the magnitude is thresholded TCanny style: pixels above
/// `hthr` seed the mask, which then grows through pixels above `lthr`.
/// Thresholds are normalized to the clip's peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kirsch {
    pub lthr: f64,
    pub hthr: Option<f64>,
}

impl Default for Kirsch {
    fn default() -> Self {
        Self {
            lthr: 0.0,
            hthr: None,
        }
    }
}

impl EdgeDetector for Kirsch {
    fn name(&self) -> &str {
        "KirschTCanny"
    }

    fn edgemask(&self, clip: &Clip) -> Result<Clip> {
        let luma = ops::get_y(clip)?;
        let format = luma.require_constant("Kirsch")?;
        let gradients = KIRSCH
            .iter()
            .map(|matrix| ops::convolution(&luma, matrix, 1.0, false))
            .collect::<Result<Vec<_>>>()?;
        let magnitude = ops::combine(&gradients, "max")?;

        let Some(hthr) = self.hthr else {
            return Ok(magnitude);
        };
        if hthr < self.lthr {
            return Err(Error::invalid_argument(
                "Kirsch",
                format!("hthr {} is below lthr {}", hthr, self.lthr),
            ));
        }
        let strong = ops::binarize(&magnitude, format.scale_value(hthr, 32))?;
        let weak = ops::binarize(&magnitude, format.scale_value(self.lthr, 32))?;
        ops::hysteresis(&strong, &weak)
    }
}

const PREWITT_X: [i64; 9] = [1, 0, -1, 1, 0, -1, 1, 0, -1];
const PREWITT_Y: [i64; 9] = [1, 1, 1, 0, 0, 0, -1, -1, -1];

/// Prewitt gradient magnitude.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prewitt;

impl EdgeDetector for Prewitt {
    fn name(&self) -> &str {
        "Prewitt"
    }

    fn edgemask(&self, clip: &Clip) -> Result<Clip> {
        let luma = ops::get_y(clip)?;
        let gx = ops::convolution(&luma, &PREWITT_X, 1.0, false)?;
        let gy = ops::convolution(&luma, &PREWITT_Y, 1.0, false)?;
        ops::expr(&[gx, gy], "x x * y y * + sqrt", None)
    }
}

// ============================================================================
// Difference masks
// ============================================================================

pub trait DiffMask: Send + Sync {
    /// Mask of the pixels where `reference` departs from `src`.
    fn diff_mask(&self, src: &Clip, reference: &Clip) -> Result<Clip>;
}

/// Thresholded absolute difference grown by an elliptic expand.
///
/// `thr` applies to the difference amplified by 16 and normalized to peak,
/// so the default 0.216 flags differences above ~1.35% of the range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasedDiffMask {
    pub thr: f64,
    pub expand: u32,
}

impl BasedDiffMask {
    pub fn new(thr: f64, expand: u32) -> Self {
        Self { thr, expand }
    }
}

impl Default for BasedDiffMask {
    fn default() -> Self {
        Self::new(0.216, 4)
    }
}

impl DiffMask for BasedDiffMask {
    fn diff_mask(&self, src: &Clip, reference: &Clip) -> Result<Clip> {
        let src = ops::get_y(src)?;
        let reference = ops::depth_like(&ops::get_y(reference)?, &src, ops::DitherType::None)?;
        let format = src.require_constant("based_diff_mask")?;
        let peak = format.peak_value(false);

        let diff = ops::expr(&[src, reference], "x y - abs", None)?;
        let amplified = ops::expr(
            &[diff],
            &format!("x {} / 2 4 pow * {} < 0 {} ?", peak, self.thr, peak),
            None,
        )?;
        let expanded = ops::expand(&amplified, self.expand, ExpandMode::Ellipse)?;
        ops::inflate(&expanded)
    }
}

// ============================================================================
// Descale masks
// ============================================================================

/// Areas where `rescaled` differs from `clip` by more than `threshold`
/// (normalized), grown to cover the surrounding detail.
pub fn descale_detail_mask(clip: &Clip, rescaled: &Clip, threshold: f64) -> Result<Clip> {
    let luma = ops::get_y(clip)?;
    let format = luma.require_constant("descale_detail_mask")?;
    let diff = ops::expr(&[luma, ops::get_y(rescaled)?], "x y - abs", None)?;
    let mask = ops::binarize(&diff, format.scale_value(threshold, 32))?;
    let mask = ops::iterate(&mask, 4, ops::maximum)?;
    let mask = ops::iterate(&mask, 2, ops::inflate)?;
    ops::limiter(&mask)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Blur {
    Box(u32),
    Gauss(f64),
}

/// Settings of [`descale_error_mask`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorMaskOptions {
    /// Normalized thresholds, divided by ten. Extra entries refine the first
    /// through hysteresis.
    pub thr: Vec<f64>,
    /// Rectangle, ellipse and post-threshold ellipse expand radii.
    pub expands: (u32, u32, u32),
    pub blur: Blur,
    /// Weight applied to errors in near-black or near-white achromatic areas.
    pub bwbias: u32,
    /// Temporal radius used to stabilise the mask.
    pub tr: u32,
}

impl Default for ErrorMaskOptions {
    fn default() -> Self {
        Self {
            thr: vec![0.38],
            expands: (2, 2, 3),
            blur: Blur::Box(3),
            bwbias: 1,
            tr: 1,
        }
    }
}

/// Binary mask of the regions the descale could not reproduce.
pub fn descale_error_mask(
    clip: &Clip,
    rescaled: &Clip,
    options: &ErrorMaskOptions,
) -> Result<Clip> {
    let format = clip.require_constant("descale_error_mask")?;
    let Some((&first_thr, extra_thrs)) = options.thr.split_first() else {
        return Err(Error::invalid_argument(
            "descale_error_mask",
            "at least one threshold is required",
        ));
    };
    let (exp1, exp2, exp3) = options.expands;
    if exp1 == 0 {
        return Err(Error::invalid_argument(
            "descale_error_mask",
            "the first expand must be positive",
        ));
    }
    if options.tr > 12 {
        return Err(Error::invalid_argument(
            "descale_error_mask",
            format!("temporal radius {} is above 12", options.tr),
        ));
    }

    let chroma: Vec<Clip> = ops::split(clip)?.into_iter().skip(1).collect();
    let luma = ops::get_y(clip)?;
    let luma_format = luma.require_constant("descale_error_mask")?;
    let mut error = ops::expr(&[luma.clone(), ops::get_y(rescaled)?], "x y - abs", None)?;

    if options.bwbias > 1 && format.family == ColorFamily::Yuv && chroma.len() == 2 {
        debug!(
            bwbias = options.bwbias,
            "biasing error mask towards black and white"
        );
        let neutral = format.neutral_value();
        let chroma_abs = ops::expr(
            &chroma,
            &format!("x {n} - abs y {n} - abs max", n = neutral),
            None,
        )?;
        let chroma_abs = Scaler::scale(
            &ResampleKernel::catrom(),
            &chroma_abs,
            luma.width(),
            luma.height(),
            &SampleWindow::default(),
        )?;
        let tv_low = luma_format.scale_value(16.0, 8);
        let tv_high = luma_format.scale_value(235.0, 8);
        let bias = ops::expr(
            &[luma, chroma_abs],
            &format!(
                "x {} >= x {} <= or y 0 = and {} 1 ?",
                tv_high, tv_low, options.bwbias
            ),
            None,
        )?;
        let bias = ops::expand(&bias, 2, ExpandMode::Rectangle)?;
        error = ops::expr(&[error, bias], "x y *", None)?;
    }

    error = ops::expand(&error, exp1, ExpandMode::Rectangle)?;
    if exp2 > 0 {
        error = ops::expand(&error, exp2, ExpandMode::Ellipse)?;
    }

    error = ops::binarize(&error, luma_format.scale_value(first_thr / 10.0, 32))?;
    for &thr in extra_thrs {
        let refined = ops::binarize(&error, luma_format.scale_value(thr / 10.0, 32))?;
        error = ops::hysteresis(&refined, &error)?;
    }

    if exp3 > 0 {
        error = ops::expand(&error, exp3, ExpandMode::Ellipse)?;
    }

    if options.tr > 1 {
        let tr = options.tr as i32;
        let weights = vec![1.0; (tr * 2 + 1) as usize];
        let average = ops::binarize(
            &ops::average_frames(&error, &weights)?,
            luma_format.neutral_value(),
        )?;
        let stable = ops::combine(&[error.clone(), average], "min")?;
        let shifted = (-tr..=tr)
            .map(|offset| ops::shift_frames(&stable, offset))
            .collect::<Result<Vec<_>>>()?;
        let stable = ops::combine(&shifted, "max")?;
        error = ops::combine(&[error, stable], "min")?;
    }

    error = match options.blur {
        Blur::Box(radius) => ops::box_blur(&error, radius)?,
        Blur::Gauss(sigma) => ops::gauss_blur(&error, sigma)?,
    };
    ops::limiter(&error)
}

// ============================================================================
// Detail masks
// ============================================================================

/// Thresholds below 1 are normalized, anything else is an 8-bit value.
fn scale_thresh(format: &VideoFormat, thr: f64) -> f64 {
    if thr < 1.0 {
        format.scale_value(thr, 32)
    } else {
        format.scale_value(thr, 8)
    }
}

/// Settings of [`simple_detail_mask`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailMaskOptions {
    /// Gaussian prefilter strength, skipped when unset.
    pub sigma: Option<f64>,
    /// Radius of the range mask.
    pub rad: u32,
    /// Range mask threshold.
    pub brz_a: f64,
    /// Edge mask threshold.
    pub brz_b: f64,
}

impl Default for DetailMaskOptions {
    fn default() -> Self {
        Self {
            sigma: None,
            rad: 3,
            brz_a: 0.025,
            brz_b: 0.045,
        }
    }
}

/// Union of a thresholded range mask and a thresholded Prewitt mask,
/// cleaned up with two RemoveGrain passes.
pub fn simple_detail_mask(clip: &Clip, options: &DetailMaskOptions) -> Result<Clip> {
    let luma = ops::get_y(clip)?;
    let format = luma.require_constant("simple_detail_mask")?;
    let blurred = match options.sigma {
        Some(sigma) => ops::gauss_blur(&luma, sigma)?,
        None => luma,
    };

    let range = ops::range_mask(&blurred, options.rad)?;
    let range = ops::binarize(&range, scale_thresh(&format, options.brz_a))?;
    let edges = Prewitt.edgemask(&blurred)?;
    let edges = ops::binarize(&edges, scale_thresh(&format, options.brz_b))?;

    let mask = ops::combine(&[range, edges], "max")?;
    let mask = ops::removegrain(&ops::removegrain(&mask, 22)?, 11)?;
    ops::limiter(&mask)
}

/// Detail mask that keeps fine detail only where it sits next to
/// broader detail.
pub fn multi_detail_mask(clip: &Clip, thr: f64) -> Result<Clip> {
    let general = simple_detail_mask(
        clip,
        &DetailMaskOptions {
            rad: 1,
            brz_a: 1.0,
            brz_b: 24.3 * thr,
            ..Default::default()
        },
    )?;
    let fine = simple_detail_mask(
        clip,
        &DetailMaskOptions {
            brz_a: 1.0,
            brz_b: 2.0 * thr,
            ..Default::default()
        },
    )?;

    let grown = ops::inflate(&ops::iterate(&general, 4, ops::maximum)?)?;
    let fine = ops::combine(&[fine, grown], "min")?;
    ops::combine(&[fine, ops::maximum(&general)?], "min")
}

// ============================================================================
// Credit masks
// ============================================================================

/// Settings of [`credit_mask`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditMaskOptions {
    /// Gaussian prefilter strength, skipped when unset.
    pub blur: Option<f64>,
    /// Median filter both clips before diffing.
    pub prefilter: bool,
    /// Final growth radius.
    pub expand: u32,
}

impl Default for CreditMaskOptions {
    fn default() -> Self {
        Self {
            blur: Some(1.65),
            prefilter: true,
            expand: 8,
        }
    }
}

/// Mask of the credits present in `clip` but not in the creditless `reference`.
///
/// `thr` is an 8-bit difference threshold. Isolated specks are opened away
/// before the mask is grown and softened.
pub fn credit_mask(
    clip: &Clip,
    reference: &Clip,
    thr: f64,
    options: &CreditMaskOptions,
) -> Result<Clip> {
    let src = ops::get_y(clip)?;
    let reference = ops::get_y(reference)?;
    let format = src.require_constant("credit_mask")?;
    if reference.format() != Some(format) {
        return Err(Error::mismatched(
            "credit_mask",
            "clip and reference must share a format",
        ));
    }
    if reference.num_frames() != src.num_frames() {
        return Err(Error::mismatched(
            "credit_mask",
            format!("{} vs {} frames", src.num_frames(), reference.num_frames()),
        ));
    }

    let (mut src, mut reference) = match options.blur {
        Some(sigma) if sigma > 0.0 => (
            ops::gauss_blur(&src, sigma)?,
            ops::gauss_blur(&reference, sigma)?,
        ),
        _ => (src, reference),
    };
    if options.prefilter {
        src = ops::removegrain(&src, 4)?;
        reference = ops::removegrain(&reference, 4)?;
    }

    let work = VideoFormat::GRAY16;
    let diff = ops::expr(&[src, reference], "x y - abs", Some(work))?;
    let mask = ops::binarize(&diff, work.scale_value(thr, 8))?;
    let mask = ops::iterate(&mask, 2, ops::maximum)?;

    let mask = ops::iterate(&mask, 6, ops::minimum)?;
    let mask = ops::iterate(&mask, 8, |c| ops::maximum(&ops::minimum(c)?))?;
    let mask = ops::iterate(&mask, options.expand as usize, ops::maximum)?;
    let mask = ops::iterate(&mask, 3, ops::inflate)?;
    debug!(thr, expand = options.expand, "built credit mask");

    ops::depth(
        &mask,
        format.sample_type,
        format.bits,
        ops::DitherType::None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::testing::{gray_source, yuv_source};
    use crate::clip::Arg;

    #[test]
    fn kirsch_combines_eight_directions() {
        let src = yuv_source(640, 360);
        let mask = Kirsch::default().edgemask(&src).expect("edges");
        assert_eq!(mask.function(), "std.Expr");
        assert_eq!(mask.inputs().len(), 8);
        assert_eq!(mask.format(), Some(VideoFormat::GRAY16));
    }

    #[test]
    fn kirsch_thresholds_use_hysteresis() {
        let src = gray_source(640, 360);
        let detector = Kirsch {
            lthr: 0.1,
            hthr: Some(0.3),
        };
        let mask = detector.edgemask(&src).expect("edges");
        assert_eq!(mask.function(), "misc.Hysteresis");

        let inverted = Kirsch {
            lthr: 0.5,
            hthr: Some(0.3),
        };
        assert!(inverted.edgemask(&src).is_err());
    }

    #[test]
    fn based_diff_mask_expands_by_radius() {
        let src = gray_source(640, 360);
        let reference = gray_source(640, 360);
        let mask = BasedDiffMask::default().diff_mask(&src, &reference).expect("mask");
        assert_eq!(mask.function(), "std.Inflate");
        let mut node = mask.inputs()[0].clone();
        let mut expands = 0;
        while node.function() == "std.Maximum" {
            expands += 1;
            node = node.inputs()[0].clone();
        }
        assert_eq!(expands, 4);
        let threshold = node.arg("expr").and_then(Arg::as_str).expect("expr");
        assert!(threshold.contains("0.216"));
    }

    #[test]
    fn detail_mask_scales_threshold_to_depth() {
        let src = gray_source(1920, 1080);
        let rescaled = gray_source(1920, 1080);
        let mask = descale_detail_mask(&src, &rescaled, 0.05).expect("mask");
        assert_eq!(mask.function(), "std.Limiter");
        let binarized = mask.find_upstream("std.Binarize").expect("binarize");
        let threshold = binarized.arg("threshold").and_then(Arg::as_float).expect("threshold");
        assert!((threshold - 65535.0 * 0.05).abs() < 1e-6);
    }

    #[test]
    fn error_mask_defaults_build() {
        let src = yuv_source(1920, 1080);
        let rescaled = gray_source(1920, 1080);
        let mask = descale_error_mask(&src, &rescaled, &ErrorMaskOptions::default()).expect("mask");
        assert_eq!(mask.function(), "std.Limiter");
        assert_eq!(mask.inputs()[0].function(), "std.BoxBlur");
        assert!(mask.find_upstream("misc.AverageFrames").is_none());
    }

    #[test]
    fn error_mask_optional_stages() {
        let src = yuv_source(1920, 1080);
        let rescaled = gray_source(1920, 1080);
        let options = ErrorMaskOptions {
            thr: vec![0.38, 0.2],
            bwbias: 2,
            tr: 2,
            blur: Blur::Gauss(1.5),
            ..Default::default()
        };
        let mask = descale_error_mask(&src, &rescaled, &options).expect("mask");
        assert!(mask.find_upstream("misc.Hysteresis").is_some());
        assert!(mask.find_upstream("misc.AverageFrames").is_some());
        assert!(mask.find_upstream("resize.Bicubic").is_some());
        assert_eq!(mask.inputs()[0].function(), "std.Convolution");
        assert_eq!(mask.num_frames(), src.num_frames());
    }

    #[test]
    fn error_mask_rejects_bad_options() {
        let src = gray_source(64, 64);
        let empty = ErrorMaskOptions {
            thr: Vec::new(),
            ..Default::default()
        };
        assert!(descale_error_mask(&src, &src, &empty).is_err());
        let no_expand = ErrorMaskOptions {
            expands: (0, 2, 3),
            ..Default::default()
        };
        assert!(descale_error_mask(&src, &src, &no_expand).is_err());
    }

    #[test]
    fn prewitt_combines_both_gradients() {
        let src = yuv_source(640, 360);
        let mask = Prewitt.edgemask(&src).expect("edges");
        assert_eq!(mask.inputs().len(), 2);
        assert_eq!(
            mask.inputs()[1].arg("matrix"),
            Some(&Arg::from(PREWITT_Y.to_vec()))
        );
    }

    #[test]
    fn simple_detail_mask_scales_thresholds() {
        let src = yuv_source(1920, 1080);
        let mask = simple_detail_mask(&src, &DetailMaskOptions::default()).expect("mask");
        assert_eq!(mask.function(), "std.Limiter");
        let outer = &mask.inputs()[0];
        assert_eq!(outer.arg("mode").and_then(Arg::as_int), Some(11));
        let inner = &outer.inputs()[0];
        assert_eq!(inner.arg("mode").and_then(Arg::as_int), Some(22));

        let union = &inner.inputs()[0];
        assert_eq!(union.arg("expr").and_then(Arg::as_str), Some("x y max"));
        let range_thr = union.inputs()[0].arg("threshold").and_then(Arg::as_float);
        let edge_thr = union.inputs()[1].arg("threshold").and_then(Arg::as_float);
        assert!((range_thr.expect("range") - 65535.0 * 0.025).abs() < 1e-6);
        assert!((edge_thr.expect("edge") - 65535.0 * 0.045).abs() < 1e-6);
        assert!(mask.find_upstream("std.Convolution").is_some());
    }

    #[test]
    fn simple_detail_mask_blurs_when_sigma_is_set() {
        let src = gray_source(640, 360);
        let edge_input = |options: &DetailMaskOptions| {
            let mask = simple_detail_mask(&src, options).expect("mask");
            let union = mask.inputs()[0].inputs()[0].inputs()[0].clone();
            let magnitude = union.inputs()[1].inputs()[0].clone();
            magnitude.inputs()[0].inputs()[0].clone()
        };
        assert!(Clip::ptr_eq(&edge_input(&DetailMaskOptions::default()), &src));
        let blurred = edge_input(&DetailMaskOptions {
            sigma: Some(1.0),
            ..Default::default()
        });
        assert_eq!(blurred.function(), "std.Convolution");
        assert_eq!(blurred.arg("mode").and_then(Arg::as_str), Some("hv"));
    }

    #[test]
    fn integer_thresholds_are_eight_bit_values() {
        assert!((scale_thresh(&VideoFormat::GRAY16, 1.0) - 257.0).abs() < 1e-9);
        assert!((scale_thresh(&VideoFormat::GRAY16, 0.5) - 32767.5).abs() < 1e-9);
    }

    #[test]
    fn multi_detail_mask_intersects_fine_and_general() {
        let src = gray_source(1280, 720);
        let mask = multi_detail_mask(&src, 0.015).expect("mask");
        assert_eq!(mask.arg("expr").and_then(Arg::as_str), Some("x y min"));
        assert_eq!(mask.inputs()[1].function(), "std.Maximum");
        let fine = &mask.inputs()[0];
        assert_eq!(fine.arg("expr").and_then(Arg::as_str), Some("x y min"));
        assert_eq!(fine.inputs()[1].function(), "std.Inflate");
    }

    #[test]
    fn credit_mask_grows_and_restores_depth() {
        let src = yuv_source(1920, 1080);
        let ncop = yuv_source(1920, 1080);
        let mask = credit_mask(&src, &ncop, 25.0, &CreditMaskOptions::default()).expect("mask");
        assert_eq!(mask.format(), Some(VideoFormat::GRAY16));
        assert_eq!(mask.function(), "std.Inflate");
        let binarized = mask.find_upstream("std.Binarize").expect("binarize");
        let threshold = binarized.arg("threshold").and_then(Arg::as_float).expect("threshold");
        assert!((threshold - 25.0 * 257.0).abs() < 1e-6);
        assert!(mask.find_upstream("rgvs.RemoveGrain").is_some());
    }

    #[test]
    fn credit_mask_skips_disabled_prefilters() {
        let src = gray_source(640, 360);
        let options = CreditMaskOptions {
            blur: None,
            prefilter: false,
            expand: 0,
        };
        let mask = credit_mask(&src, &src, 25.0, &options).expect("mask");
        assert!(mask.find_upstream("std.Convolution").is_none());
        assert!(mask.find_upstream("rgvs.RemoveGrain").is_none());

        let eight = ops::depth(
            &src,
            crate::clip::SampleType::Integer,
            8,
            ops::DitherType::None,
        )
        .expect("depth");
        let restored = credit_mask(&eight, &eight, 25.0, &options).expect("mask");
        assert_eq!(restored.format(), Some(VideoFormat::GRAY8));
    }

    #[test]
    fn credit_mask_rejects_mismatched_reference() {
        let src = gray_source(640, 360);
        let shorter = ops::trim(&src, 0, 5).expect("trim");
        assert!(credit_mask(&src, &shorter, 25.0, &CreditMaskOptions::default()).is_err());
    }
}
