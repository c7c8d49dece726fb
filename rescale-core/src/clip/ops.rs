//! Engine primitives.
//!
//! Every function validates its inputs and returns a new node; the engine
//! that later evaluates the graph owns the pixel math.

use serde::{Deserialize, Serialize};

use super::{Arg, Clip, ColorFamily, FrameProps, PropValue, SampleType, VideoFormat};
use crate::error::{Error, Result};

/// Variables available to `std.Expr`, in input order.
const EXPR_VARS: &[&str] = &[
    "x", "y", "z", "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o",
    "p", "q", "r", "s", "t", "u", "v", "w",
];

fn args<const N: usize>(pairs: [(&str, Arg); N]) -> Vec<(String, Arg)> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn same_size(func: &'static str, a: &Clip, b: &Clip) -> Result<()> {
    if a.width() != b.width() || a.height() != b.height() {
        return Err(Error::mismatched(
            func,
            format!(
                "{}x{} vs {}x{}",
                a.width(),
                a.height(),
                b.width(),
                b.height()
            ),
        ));
    }
    Ok(())
}

fn single_plane(func: &'static str, clip: &Clip) -> Result<VideoFormat> {
    let format = clip.require_constant(func)?;
    if format.family != ColorFamily::Gray {
        return Err(Error::UnsupportedFormat {
            func,
            format: format.to_string(),
        });
    }
    Ok(format)
}

// ============================================================================
// Planes
// ============================================================================

/// Split a clip into its planes. Single-plane clips are returned as is.
pub fn split(clip: &Clip) -> Result<Vec<Clip>> {
    let format = clip.require_constant("split")?;
    if format.num_planes() == 1 {
        return Ok(vec![clip.clone()]);
    }

    let plane_format = format.plane_format();
    (0..format.num_planes())
        .map(|plane| {
            let (width, height) = if plane > 0 && format.family == ColorFamily::Yuv {
                (
                    clip.width() >> format.subsampling_w,
                    clip.height() >> format.subsampling_h,
                )
            } else {
                (clip.width(), clip.height())
            };
            Ok(Clip::derive(
                "std.ShufflePlanes",
                vec![clip.clone()],
                args([
                    ("planes", Arg::from(plane as i64)),
                    ("colorfamily", Arg::from("GRAY")),
                ]),
                clip.info().resized(width, height).reformatted(plane_format),
            ))
        })
        .collect()
}

/// Luma (first) plane of a YUV or gray clip.
pub fn get_y(clip: &Clip) -> Result<Clip> {
    let format = clip.require_constant("get_y")?;
    match format.family {
        ColorFamily::Gray => Ok(clip.clone()),
        ColorFamily::Yuv => Ok(Clip::derive(
            "std.ShufflePlanes",
            vec![clip.clone()],
            args([
                ("planes", Arg::from(0i64)),
                ("colorfamily", Arg::from("GRAY")),
            ]),
            clip.info().reformatted(format.plane_format()),
        )),
        ColorFamily::Rgb => Err(Error::UnsupportedFormat {
            func: "get_y",
            format: format.to_string(),
        }),
    }
}

fn subsampling_of(luma: u32, chroma: u32) -> Option<u8> {
    (0u8..=2).find(|shift| luma >> shift == chroma && luma.is_multiple_of(1 << shift))
}

/// Rebuild a YUV clip from a luma plane and two chroma planes.
pub fn join(planes: &[Clip]) -> Result<Clip> {
    match planes {
        [single] => {
            single_plane("join", single)?;
            Ok(single.clone())
        }
        [y, u, v] => {
            let y_format = single_plane("join", y)?;
            for chroma in [u, v] {
                let c_format = single_plane("join", chroma)?;
                if c_format != y_format {
                    return Err(Error::mismatched(
                        "join",
                        format!("plane formats {} and {}", y_format, c_format),
                    ));
                }
            }
            same_size("join", u, v)?;
            let ssw = subsampling_of(y.width(), u.width());
            let ssh = subsampling_of(y.height(), u.height());
            let (Some(ssw), Some(ssh)) = (ssw, ssh) else {
                return Err(Error::mismatched(
                    "join",
                    format!(
                        "chroma {}x{} does not subsample luma {}x{}",
                        u.width(),
                        u.height(),
                        y.width(),
                        y.height()
                    ),
                ));
            };
            let format = VideoFormat::yuv(y_format.sample_type, y_format.bits, ssw, ssh).checked()?;
            Ok(Clip::derive(
                "std.ShufflePlanes",
                vec![y.clone(), u.clone(), v.clone()],
                args([
                    ("planes", Arg::from(vec![0i64, 0, 0])),
                    ("colorfamily", Arg::from("YUV")),
                ]),
                y.info().reformatted(format),
            ))
        }
        _ => Err(Error::invalid_argument(
            "join",
            format!("expected 1 or 3 planes, got {}", planes.len()),
        )),
    }
}

// ============================================================================
// Geometry
// ============================================================================

fn check_mod(
    func: &'static str,
    format: &VideoFormat,
    horizontal: u32,
    vertical: u32,
) -> Result<()> {
    let mod_w = 1u32 << format.subsampling_w;
    let mod_h = 1u32 << format.subsampling_h;
    if !horizontal.is_multiple_of(mod_w) || !vertical.is_multiple_of(mod_h) {
        return Err(Error::invalid_argument(
            func,
            format!("values must respect {} subsampling", format),
        ));
    }
    Ok(())
}

pub fn crop(clip: &Clip, left: u32, right: u32, top: u32, bottom: u32) -> Result<Clip> {
    let format = clip.require_constant("std.Crop")?;
    let width = clip.width() as i64 - left as i64 - right as i64;
    let height = clip.height() as i64 - top as i64 - bottom as i64;
    if width <= 0 || height <= 0 {
        return Err(Error::InvalidDimensions {
            func: "std.Crop",
            width,
            height,
        });
    }
    check_mod("std.Crop", &format, left | right, top | bottom)?;
    Ok(Clip::derive(
        "std.Crop",
        vec![clip.clone()],
        args([
            ("left", Arg::from(left)),
            ("right", Arg::from(right)),
            ("top", Arg::from(top)),
            ("bottom", Arg::from(bottom)),
        ]),
        clip.info().resized(width as u32, height as u32),
    ))
}

pub fn add_borders(clip: &Clip, left: u32, right: u32, top: u32, bottom: u32) -> Result<Clip> {
    let format = clip.require_constant("std.AddBorders")?;
    check_mod("std.AddBorders", &format, left | right, top | bottom)?;
    let width = clip
        .width()
        .checked_add(left)
        .and_then(|w| w.checked_add(right));
    let height = clip
        .height()
        .checked_add(top)
        .and_then(|h| h.checked_add(bottom));
    let (Some(width), Some(height)) = (width, height) else {
        return Err(Error::InvalidDimensions {
            func: "std.AddBorders",
            width: clip.width() as i64 + left as i64 + right as i64,
            height: clip.height() as i64 + top as i64 + bottom as i64,
        });
    };
    Ok(Clip::derive(
        "std.AddBorders",
        vec![clip.clone()],
        args([
            ("left", Arg::from(left)),
            ("right", Arg::from(right)),
            ("top", Arg::from(top)),
            ("bottom", Arg::from(bottom)),
        ]),
        clip.info().resized(width, height),
    ))
}

/// Constant clip shaped like `template`, optionally in another format.
pub fn blank_clip(template: &Clip, format: Option<VideoFormat>, color: f64) -> Result<Clip> {
    let template_format = template.require_constant("std.BlankClip")?;
    let format = format.unwrap_or(template_format).checked()?;
    Ok(Clip::from_parts(
        "std.BlankClip",
        Vec::new(),
        args([
            ("width", Arg::from(template.width())),
            ("height", Arg::from(template.height())),
            ("format", Arg::from(format.to_string())),
            ("length", Arg::from(template.num_frames())),
            ("color", Arg::from(color)),
        ]),
        template.info().reformatted(format),
        FrameProps::new(),
    ))
}

// ============================================================================
// Merging & Properties
// ============================================================================

/// `clipa` where the mask is 0, `clipb` where it is at peak. Props come from `clipa`.
pub fn masked_merge(clipa: &Clip, clipb: &Clip, mask: &Clip) -> Result<Clip> {
    let format_a = clipa.require_constant("std.MaskedMerge")?;
    let format_b = clipb.require_constant("std.MaskedMerge")?;
    let mask_format = single_plane("std.MaskedMerge", mask)?;
    if format_a != format_b {
        return Err(Error::mismatched(
            "std.MaskedMerge",
            format!("formats {} and {}", format_a, format_b),
        ));
    }
    same_size("std.MaskedMerge", clipa, clipb)?;
    same_size("std.MaskedMerge", clipa, mask)?;
    if mask_format.sample_type != format_a.sample_type || mask_format.bits != format_a.bits {
        return Err(Error::mismatched(
            "std.MaskedMerge",
            format!("mask {} does not match {}", mask_format, format_a),
        ));
    }
    Ok(Clip::derive(
        "std.MaskedMerge",
        vec![clipa.clone(), clipb.clone(), mask.clone()],
        Vec::new(),
        *clipa.info(),
    ))
}

/// Replace every frame property of `clip` with those of `src`.
pub fn copy_frame_props(clip: &Clip, src: &Clip) -> Clip {
    Clip::from_parts(
        "std.CopyFrameProps",
        vec![clip.clone(), src.clone()],
        Vec::new(),
        *clip.info(),
        src.props().clone(),
    )
}

pub fn set_frame_prop(clip: &Clip, key: &str, value: PropValue) -> Clip {
    let mut props = clip.props().clone();
    let arg = match &value {
        PropValue::Int(v) => Arg::Int(*v),
        PropValue::Float(v) => Arg::Float(*v),
        PropValue::Data(v) => Arg::Str(v.clone()),
    };
    props.insert(key.to_string(), value);
    Clip::from_parts(
        "std.SetFrameProp",
        vec![clip.clone()],
        args([("prop", Arg::from(key)), ("value", arg)]),
        *clip.info(),
        props,
    )
}

// ============================================================================
// Expressions
// ============================================================================

/// Per-pixel RPN expression over same-sized clips.
pub fn expr(clips: &[Clip], expression: &str, format: Option<VideoFormat>) -> Result<Clip> {
    let Some(first) = clips.first() else {
        return Err(Error::invalid_argument("std.Expr", "no input clips"));
    };
    if clips.len() > EXPR_VARS.len() {
        return Err(Error::invalid_argument(
            "std.Expr",
            format!("at most {} inputs are supported", EXPR_VARS.len()),
        ));
    }
    let first_format = first.require_constant("std.Expr")?;
    for clip in &clips[1..] {
        clip.require_constant("std.Expr")?;
        same_size("std.Expr", first, clip)?;
    }
    let format = format.unwrap_or(first_format).checked()?;
    Ok(Clip::derive(
        "std.Expr",
        clips.to_vec(),
        args([
            ("expr", Arg::from(expression)),
            ("format", Arg::from(format.to_string())),
        ]),
        first.info().reformatted(format),
    ))
}

/// Expression selecting `replace` (an RPN pair "a b") inside the border
/// region of the given widths, the second operand elsewhere.
pub fn region_expr(
    width: u32,
    height: u32,
    left: u32,
    right: u32,
    top: u32,
    bottom: u32,
    replace: &str,
) -> String {
    let last_x = width as i64 - right as i64 - 1;
    let last_y = height as i64 - bottom as i64 - 1;
    format!(
        "X {} < X {} > or Y {} < Y {} > or or {} ?",
        left, last_x, top, last_y, replace
    )
}

/// Paint the border region of a single-plane clip with `value`.
pub fn paint_borders(
    clip: &Clip,
    left: u32,
    right: u32,
    top: u32,
    bottom: u32,
    value: f64,
) -> Result<Clip> {
    single_plane("paint_borders", clip)?;
    let expression = region_expr(
        clip.width(),
        clip.height(),
        left,
        right,
        top,
        bottom,
        &format!("{} x", value),
    );
    expr(std::slice::from_ref(clip), &expression, None)
}

/// Reduce clips with a binary RPN operator (`min`, `max`, `+` ...).
pub fn combine(clips: &[Clip], operator: &str) -> Result<Clip> {
    if clips.len() < 2 {
        return Err(Error::invalid_argument("combine", "needs at least two clips"));
    }
    let mut expression = EXPR_VARS[..clips.len().min(EXPR_VARS.len())].join(" ");
    for _ in 1..clips.len() {
        expression.push(' ');
        expression.push_str(operator);
    }
    expr(clips, &expression, None)
}

// ============================================================================
// Morphology & Thresholds
// ============================================================================

fn plane_filter(function: &'static str, clip: &Clip, extra: Vec<(String, Arg)>) -> Result<Clip> {
    clip.require_constant(function)?;
    Ok(Clip::derive(function, vec![clip.clone()], extra, *clip.info()))
}

pub fn maximum(clip: &Clip) -> Result<Clip> {
    plane_filter("std.Maximum", clip, Vec::new())
}

pub fn minimum(clip: &Clip) -> Result<Clip> {
    plane_filter("std.Minimum", clip, Vec::new())
}

pub fn inflate(clip: &Clip) -> Result<Clip> {
    plane_filter("std.Inflate", clip, Vec::new())
}

pub fn limiter(clip: &Clip) -> Result<Clip> {
    plane_filter("std.Limiter", clip, Vec::new())
}

pub fn binarize(clip: &Clip, threshold: f64) -> Result<Clip> {
    plane_filter(
        "std.Binarize",
        clip,
        args([("threshold", Arg::from(threshold))]),
    )
}

/// Apply `filter` `times` times.
pub fn iterate(clip: &Clip, times: usize, filter: impl Fn(&Clip) -> Result<Clip>) -> Result<Clip> {
    let mut out = clip.clone();
    for _ in 0..times {
        out = filter(&out)?;
    }
    Ok(out)
}

/// Shape grown by [`expand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpandMode {
    Rectangle,
    Ellipse,
    Losange,
}

const SQUARE: [i64; 8] = [1, 1, 1, 1, 1, 1, 1, 1];
const PLUS: [i64; 8] = [0, 1, 0, 1, 1, 0, 1, 0];

fn morph(function: &'static str, clip: &Clip, radius: u32, mode: ExpandMode) -> Result<Clip> {
    let mut out = clip.clone();
    for step in 0..radius {
        let coordinates = match mode {
            ExpandMode::Rectangle => SQUARE,
            ExpandMode::Losange => PLUS,
            ExpandMode::Ellipse if step % 3 != 1 => SQUARE,
            ExpandMode::Ellipse => PLUS,
        };
        out = plane_filter(
            function,
            &out,
            args([("coordinates", Arg::from(coordinates.to_vec()))]),
        )?;
    }
    Ok(out)
}

/// Grow bright regions by `radius` pixels.
pub fn expand(clip: &Clip, radius: u32, mode: ExpandMode) -> Result<Clip> {
    morph("std.Maximum", clip, radius, mode)
}

/// Shrink bright regions by `radius` pixels.
pub fn inpand(clip: &Clip, radius: u32, mode: ExpandMode) -> Result<Clip> {
    morph("std.Minimum", clip, radius, mode)
}

/// Local contrast: elliptic maximum minus elliptic minimum over `radius`.
pub fn range_mask(clip: &Clip, radius: u32) -> Result<Clip> {
    if radius == 0 {
        return Err(Error::invalid_argument("range_mask", "radius must be positive"));
    }
    let bright = expand(clip, radius, ExpandMode::Ellipse)?;
    let dark = inpand(clip, radius, ExpandMode::Ellipse)?;
    expr(&[bright, dark], "x y -", None)
}

/// `rgvs.RemoveGrain` spatial denoiser; `mode` selects the kernel (1..=24).
pub fn removegrain(clip: &Clip, mode: u32) -> Result<Clip> {
    if !(1..=24).contains(&mode) {
        return Err(Error::invalid_argument(
            "rgvs.RemoveGrain",
            format!("mode {} is outside 1..=24", mode),
        ));
    }
    plane_filter("rgvs.RemoveGrain", clip, args([("mode", Arg::from(mode))]))
}

/// Keep regions of `alt` connected to pixels set in `base`.
pub fn hysteresis(base: &Clip, alt: &Clip) -> Result<Clip> {
    base.require_constant("misc.Hysteresis")?;
    alt.require_constant("misc.Hysteresis")?;
    same_size("misc.Hysteresis", base, alt)?;
    Ok(Clip::derive(
        "misc.Hysteresis",
        vec![base.clone(), alt.clone()],
        Vec::new(),
        *base.info(),
    ))
}

pub fn box_blur(clip: &Clip, radius: u32) -> Result<Clip> {
    plane_filter(
        "std.BoxBlur",
        clip,
        args([
            ("hradius", Arg::from(radius)),
            ("vradius", Arg::from(radius)),
        ]),
    )
}

/// Square spatial convolution. Without `saturate` negative results are mirrored.
pub fn convolution(clip: &Clip, matrix: &[i64], divisor: f64, saturate: bool) -> Result<Clip> {
    if !matches!(matrix.len(), 9 | 25) {
        return Err(Error::invalid_argument(
            "std.Convolution",
            format!("matrix must be 3x3 or 5x5, got {} values", matrix.len()),
        ));
    }
    plane_filter(
        "std.Convolution",
        clip,
        args([
            ("matrix", Arg::from(matrix.to_vec())),
            ("divisor", Arg::from(divisor)),
            ("saturate", Arg::from(saturate)),
        ]),
    )
}

/// Separable gaussian blur through `std.Convolution`.
pub fn gauss_blur(clip: &Clip, sigma: f64) -> Result<Clip> {
    if sigma.is_nan() || sigma <= 0.0 {
        return Err(Error::invalid_argument("gauss_blur", "sigma must be positive"));
    }
    let radius = ((sigma * 3.0).ceil() as i64).clamp(1, 12);
    let weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-(x * x) as f64 / (2.0 * sigma * sigma)).exp())
        .collect();
    let center = weights[radius as usize];
    let matrix: Vec<i64> = weights
        .iter()
        .map(|w| ((w / center) * 1023.0).round() as i64)
        .collect();
    plane_filter(
        "std.Convolution",
        clip,
        args([("matrix", Arg::from(matrix)), ("mode", Arg::from("hv"))]),
    )
}

// ============================================================================
// Depth
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DitherType {
    #[default]
    None,
    Ordered,
    Random,
    ErrorDiffusion,
}

impl DitherType {
    pub fn name(&self) -> &'static str {
        match self {
            DitherType::None => "none",
            DitherType::Ordered => "ordered",
            DitherType::Random => "random",
            DitherType::ErrorDiffusion => "error_diffusion",
        }
    }
}

/// Convert to another sample type / bit depth, keeping family and subsampling.
pub fn depth(clip: &Clip, sample_type: SampleType, bits: u8, dither: DitherType) -> Result<Clip> {
    let format = clip.require_format("depth")?;
    let target = format.with_depth(sample_type, bits).checked()?;
    if target == format {
        return Ok(clip.clone());
    }
    Ok(Clip::derive(
        "resize.Point",
        vec![clip.clone()],
        args([
            ("format", Arg::from(target.to_string())),
            ("dither_type", Arg::from(dither.name())),
        ]),
        clip.info().reformatted(target),
    ))
}

/// Convert to the sample type and depth of `reference`.
pub fn depth_like(clip: &Clip, reference: &Clip, dither: DitherType) -> Result<Clip> {
    let target = reference.require_format("depth")?;
    depth(clip, target.sample_type, target.bits, dither)
}

// ============================================================================
// Fields & Frames
// ============================================================================

pub fn separate_fields(clip: &Clip, tff: bool) -> Result<Clip> {
    clip.require_constant("std.SeparateFields")?;
    if !clip.height().is_multiple_of(2) {
        return Err(Error::InvalidDimensions {
            func: "std.SeparateFields",
            width: clip.width() as i64,
            height: clip.height() as i64,
        });
    }
    let mut info = clip.info().resized(clip.width(), clip.height() / 2);
    info.num_frames = clip.num_frames() * 2;
    info.fps_num *= 2;
    Ok(Clip::derive(
        "std.SeparateFields",
        vec![clip.clone()],
        args([("tff", Arg::from(tff))]),
        info,
    ))
}

/// Weave every pair of fields; the output has one frame per input field.
pub fn double_weave(clip: &Clip, tff: bool) -> Result<Clip> {
    clip.require_constant("std.DoubleWeave")?;
    Ok(Clip::derive(
        "std.DoubleWeave",
        vec![clip.clone()],
        args([("tff", Arg::from(tff))]),
        clip.info().resized(clip.width(), clip.height() * 2),
    ))
}

pub fn select_every(clip: &Clip, cycle: u32, offsets: &[u32]) -> Result<Clip> {
    if cycle == 0 || offsets.is_empty() || offsets.iter().any(|&o| o >= cycle) {
        return Err(Error::invalid_argument("std.SelectEvery", "invalid cycle or offsets"));
    }
    let full = clip.num_frames() / cycle;
    let rest = clip.num_frames() % cycle;
    let mut info = *clip.info();
    let partial = offsets.iter().filter(|&&o| o < rest).count() as u32;
    info.num_frames = full * offsets.len() as u32 + partial;
    info.fps_num *= offsets.len() as u64;
    info.fps_den *= cycle as u64;
    let offsets: Vec<i64> = offsets.iter().map(|&o| o as i64).collect();
    Ok(Clip::derive(
        "std.SelectEvery",
        vec![clip.clone()],
        args([
            ("cycle", Arg::from(cycle)),
            ("offsets", Arg::from(offsets)),
        ]),
        info,
    ))
}

pub fn average_frames(clip: &Clip, weights: &[f64]) -> Result<Clip> {
    if weights.len().is_multiple_of(2) || weights.len() > 31 {
        return Err(Error::invalid_argument(
            "misc.AverageFrames",
            "weights must have an odd length up to 31",
        ));
    }
    plane_filter(
        "misc.AverageFrames",
        clip,
        args([("weights", Arg::from(weights.to_vec()))]),
    )
}

pub fn trim(clip: &Clip, first: u32, last: u32) -> Result<Clip> {
    if first > last || last >= clip.num_frames() {
        return Err(Error::invalid_argument(
            "std.Trim",
            format!(
                "range {}..={} outside of {} frames",
                first,
                last,
                clip.num_frames()
            ),
        ));
    }
    let mut info = *clip.info();
    info.num_frames = last - first + 1;
    Ok(Clip::derive(
        "std.Trim",
        vec![clip.clone()],
        args([("first", Arg::from(first)), ("last", Arg::from(last))]),
        info,
    ))
}

pub fn splice(clips: &[Clip]) -> Result<Clip> {
    let Some(first) = clips.first() else {
        return Err(Error::invalid_argument("std.Splice", "no input clips"));
    };
    let mut info = *first.info();
    for clip in &clips[1..] {
        same_size("std.Splice", first, clip)?;
        if clip.format() != first.format() {
            return Err(Error::mismatched("std.Splice", "formats differ"));
        }
        info.num_frames += clip.num_frames();
    }
    Ok(Clip::derive("std.Splice", clips.to_vec(), Vec::new(), info))
}

/// Shift frames by `offset`, repeating the edge frame to keep the length.
pub fn shift_frames(clip: &Clip, offset: i32) -> Result<Clip> {
    let count = clip.num_frames();
    let amount = offset.unsigned_abs();
    if offset == 0 {
        return Ok(clip.clone());
    }
    if amount >= count {
        return Err(Error::invalid_argument("shift_frames", "offset exceeds clip length"));
    }
    let repeat = |frame: u32| -> Result<Clip> {
        let single = trim(clip, frame, frame)?;
        let mut info = *single.info();
        info.num_frames = amount;
        Ok(Clip::derive(
            "std.Loop",
            vec![single],
            args([("times", Arg::from(amount))]),
            info,
        ))
    };
    if offset > 0 {
        splice(&[repeat(0)?, trim(clip, 0, count - 1 - amount)?])
    } else {
        splice(&[trim(clip, amount, count - 1)?, repeat(count - 1)?])
    }
}
