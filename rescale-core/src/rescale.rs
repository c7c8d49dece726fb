//! # Rescale
//!
//! The full descale / rescale / upscale workflow on top of [`RescaleBase`]:
//!
//! - optional crop before descaling, restored from the source afterwards
//! - an ignore mask, which switches the descale to two single-axis passes
//! - line and credit masks merged into the upscaled luma
//!
//! Mask accessors create a default mask on first use. Changing a line or
//! credit mask drops the cached upscale; changing the ignore mask drops the
//! descale and everything computed from it.

use tracing::{debug, warn};

use crate::base::{RescaleBase, Rescaler};
use crate::cache::Derived;
use crate::clip::ops::{self, DitherType};
use crate::clip::{Clip, SampleType, VideoFormat};
use crate::error::Result;
use crate::kernel::{Kernel, ResampleKernel, SampleWindow};
use crate::masks::{BasedDiffMask, DiffMask, EdgeDetector};
use crate::options::RescaleOptions;
use crate::scaler::Scaler;
use crate::scaling_args::{Crop, Dimension, ScaleMode, ScalingArgs};

pub struct Rescale {
    base: RescaleBase,
    pre: Clip,
    crop: Crop,
    line_mask: Option<Clip>,
    credit_mask: Option<Clip>,
    ignore_mask: Option<Clip>,
}

impl Rescale {
    /// Rescale `clip` from `height` with the default linear Hermite downscaler.
    pub fn new(
        clip: &Clip,
        height: impl Into<Dimension>,
        kernel: impl Kernel + 'static,
        upscaler: impl Scaler + 'static,
    ) -> Result<Self> {
        Self::with_options(
            clip,
            kernel,
            upscaler,
            ResampleKernel::hermite().linear(),
            RescaleOptions::new(height),
        )
    }

    pub fn with_options(
        clip: &Clip,
        kernel: impl Kernel + 'static,
        upscaler: impl Scaler + 'static,
        downscaler: impl Scaler + 'static,
        options: RescaleOptions,
    ) -> Result<Self> {
        clip.require_constant("Rescale")?;
        let descale_args = ScalingArgs::from_args(
            clip,
            options.height,
            options.width,
            options.base_height,
            options.base_width,
            options.shift.0,
            options.shift.1,
            options.crop,
            ScaleMode::Both,
        )?;
        let mut base = RescaleBase::new(
            clip,
            descale_args,
            Box::new(kernel),
            Box::new(upscaler),
            Box::new(downscaler),
            options.field_based,
            options.border_handling,
        )?;

        let crop = options.crop;
        if !crop.is_empty() {
            let cropped = ops::crop(base.clipy(), crop.left, crop.right, crop.top, crop.bottom)?;
            base.replace_clipy(cropped);
        }
        debug!(
            kernel = base.kernel().name(),
            width = descale_args.width,
            height = descale_args.height,
            src_width = descale_args.src_width,
            src_height = descale_args.src_height,
            "rescale configured"
        );

        Ok(Self {
            base,
            pre: clip.clone(),
            crop,
            line_mask: None,
            credit_mask: None,
            ignore_mask: None,
        })
    }

    /// Source clip as passed in, before any crop.
    pub fn pre(&self) -> &Clip {
        &self.pre
    }

    pub fn crop(&self) -> Crop {
        self.crop
    }

    fn luma_format(&self) -> Result<VideoFormat> {
        self.base.clipy().require_constant("Rescale")
    }

    fn blank_line_mask(&self) -> Result<Clip> {
        let peak = self.luma_format()?.peak_value(false);
        ops::blank_clip(self.base.clipy(), None, peak)
    }

    /// Line mask used for merging: the stored mask, or a fully set one, with
    /// the kernel radius forced on at the edges when borders are not mirrored.
    fn effective_line_mask(&self) -> Result<Clip> {
        let mask = match &self.line_mask {
            Some(mask) => mask.clone(),
            None => self.blank_line_mask()?,
        };
        let border_handling = self.base.border_handling();
        if border_handling.is_mirror() {
            return Ok(mask);
        }
        let radius = self.base.kernel().kernel_radius();
        let peak = mask.require_constant("line_mask")?.peak_value(false);
        ops::paint_borders(&mask, radius, radius, radius, radius, peak)
    }

    // ------------------------------------------------------------------------
    // Line mask
    // ------------------------------------------------------------------------

    /// Current line mask, creating a fully set one if none is stored.
    pub fn line_mask(&mut self) -> Result<Clip> {
        if self.line_mask.is_none() {
            let blank = self.blank_line_mask()?;
            self.line_mask = Some(blank);
            self.invalidate(Derived::Upscale);
        }
        self.effective_line_mask()
    }

    /// Store `mask` at luma depth. `None` clears it.
    pub fn set_line_mask(&mut self, mask: Option<&Clip>) -> Result<()> {
        let converted = mask
            .map(|mask| ops::depth_like(mask, self.base.clipy(), DitherType::None))
            .transpose()?;
        self.line_mask = converted;
        self.invalidate(Derived::Upscale);
        Ok(())
    }

    pub fn clear_line_mask(&mut self) {
        self.line_mask = None;
        self.invalidate(Derived::Upscale);
    }

    // ------------------------------------------------------------------------
    // Credit mask
    // ------------------------------------------------------------------------

    /// Current credit mask, creating an empty one if none is stored.
    pub fn credit_mask(&mut self) -> Result<Clip> {
        if let Some(mask) = &self.credit_mask {
            return Ok(mask.clone());
        }
        let blank = ops::blank_clip(self.base.clipy(), None, 0.0)?;
        self.credit_mask = Some(blank.clone());
        self.invalidate(Derived::Upscale);
        Ok(blank)
    }

    /// Store `mask` at luma depth. `None` clears it.
    pub fn set_credit_mask(&mut self, mask: Option<&Clip>) -> Result<()> {
        let converted = mask
            .map(|mask| ops::depth_like(mask, self.base.clipy(), DitherType::None))
            .transpose()?;
        self.credit_mask = converted;
        self.invalidate(Derived::Upscale);
        Ok(())
    }

    pub fn clear_credit_mask(&mut self) {
        self.credit_mask = None;
        self.invalidate(Derived::Upscale);
    }

    // ------------------------------------------------------------------------
    // Ignore mask
    // ------------------------------------------------------------------------

    /// Current ignore mask, creating an empty 8-bit one if none is stored.
    pub fn ignore_mask(&mut self) -> Result<Clip> {
        if let Some(mask) = &self.ignore_mask {
            return Ok(mask.clone());
        }
        let blank = ops::blank_clip(self.base.clipy(), Some(VideoFormat::GRAY8), 0.0)?;
        self.ignore_mask = Some(blank.clone());
        self.invalidate(Derived::Descale);
        Ok(blank)
    }

    /// Store `mask` as 8-bit integer. `None` clears it.
    pub fn set_ignore_mask(&mut self, mask: Option<&Clip>) -> Result<()> {
        let converted = mask
            .map(|mask| ops::depth(mask, SampleType::Integer, 8, DitherType::None))
            .transpose()?;
        self.ignore_mask = converted;
        self.invalidate(Derived::Descale);
        Ok(())
    }

    pub fn clear_ignore_mask(&mut self) {
        self.ignore_mask = None;
        self.invalidate(Derived::Descale);
    }

    // ------------------------------------------------------------------------
    // Default masks
    // ------------------------------------------------------------------------

    /// Edge mask of `clip` (the luma by default), cleaned with a
    /// maximum/minimum pass and resized to the luma with `scaler`
    /// (bilinear by default). Stored as the line mask and returned.
    pub fn default_line_mask(
        &mut self,
        clip: Option<&Clip>,
        scaler: Option<&dyn Scaler>,
        detector: &dyn EdgeDetector,
    ) -> Result<Clip> {
        let clipy = self.base.clipy().clone();
        let reference = clip.unwrap_or(&clipy);
        let edges = detector.edgemask(reference)?;
        let edges = ops::minimum(&ops::maximum(&edges)?)?;

        let bilinear = ResampleKernel::bilinear();
        let scaler = scaler.unwrap_or(&bilinear);
        let window = SampleWindow::default();
        let scaled = scaler.scale(&edges, clipy.width(), clipy.height(), &window)?;
        debug!(
            detector = detector.name(),
            scaler = scaler.name(),
            "built default line mask"
        );

        self.set_line_mask(Some(&scaled))?;
        self.line_mask()
    }

    /// Difference between `src` (the luma by default) and `rescale` (the
    /// cached rescale by default), thresholded at `thr` and grown by `expand`.
    /// Stored as the credit mask and returned.
    pub fn default_credit_mask(
        &mut self,
        rescale: Option<&Clip>,
        src: Option<&Clip>,
        thr: f64,
        expand: u32,
    ) -> Result<Clip> {
        self.credit_mask_from(rescale, src, &BasedDiffMask::new(thr, expand))
    }

    /// [`Rescale::default_credit_mask`] with any difference mask.
    pub fn credit_mask_from(
        &mut self,
        rescale: Option<&Clip>,
        src: Option<&Clip>,
        diff: &dyn DiffMask,
    ) -> Result<Clip> {
        let src = match src {
            Some(src) => ops::get_y(src)?,
            None => self.base.clipy().clone(),
        };
        let rescaled = match rescale {
            Some(rescale) => ops::get_y(rescale)?,
            None => self.rescale()?,
        };
        let mask = diff.diff_mask(&src, &rescaled)?;
        self.set_credit_mask(Some(&mask))?;
        self.credit_mask()
    }
}

impl Rescaler for Rescale {
    fn base(&self) -> &RescaleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RescaleBase {
        &mut self.base
    }

    /// Single pass, or height then width when an ignore mask is set. The
    /// field-based policy and tag wrap both passes together.
    fn generate_descale(&self, clip: &Clip) -> Result<Clip> {
        let Some(ignore_mask) = &self.ignore_mask else {
            return self.base.generate_descale(clip);
        };

        let base = &self.base;
        let args = base.descale_args();
        let height_window = args.window(ScaleMode::HeightOnly, None);
        let width_window = args.window(ScaleMode::WidthOnly, None);
        debug!(
            width = args.width,
            height = args.height,
            "two-pass descale with ignore mask"
        );

        base.generate_with_wrapping(clip, true, Derived::Descale, |clip| {
            let descale_h = base.kernel().descale(
                clip,
                None,
                Some(args.height),
                &height_window,
                base.border_handling(),
                Some(ignore_mask),
            )?;
            let mask_h = Scaler::scale(
                &ResampleKernel::point(),
                ignore_mask,
                ignore_mask.width(),
                descale_h.height(),
                &SampleWindow::default(),
            )?;
            base.kernel().descale(
                &descale_h,
                Some(args.width),
                None,
                &width_window,
                base.border_handling(),
                Some(&mask_h),
            )
        })
    }

    /// Upscaled luma with the line mask, credit mask and crop borders applied.
    fn generate_upscale(&self, clip: &Clip) -> Result<Clip> {
        let base = &self.base;
        let clipy = base.clipy();
        let mut upscale = base.generate_upscale(clip)?;

        if self.line_mask.is_some() || !base.border_handling().is_mirror() {
            if self.line_mask.is_none() {
                warn!(
                    border_handling = ?base.border_handling(),
                    radius = base.kernel().kernel_radius(),
                    "no line mask set, border handling forces one"
                );
            }
            let mask = self.effective_line_mask()?;
            let merged = ops::masked_merge(clipy, &upscale, &mask)?;
            upscale = ops::copy_frame_props(&merged, &upscale);
        }

        if let Some(credit_mask) = &self.credit_mask {
            upscale = ops::masked_merge(&upscale, clipy, credit_mask)?;
        }

        let crop = self.crop;
        if !crop.is_empty() {
            let pre_y = ops::get_y(&self.pre)?;
            let peak = pre_y.require_constant("Rescale")?.peak_value(false);
            let black = ops::blank_clip(&pre_y, None, 0.0)?;
            let Crop {
                left,
                right,
                top,
                bottom,
            } = crop;
            let border = ops::paint_borders(&black, left, right, top, bottom, peak)?;
            let padded = ops::add_borders(&upscale, left, right, top, bottom)?;
            upscale = ops::masked_merge(&padded, &pre_y, &border)?;
        }

        Ok(upscale)
    }
}

impl std::fmt::Debug for Rescale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rescale")
            .field("base", &self.base)
            .field("crop", &self.crop)
            .field("line_mask", &self.line_mask.is_some())
            .field("credit_mask", &self.credit_mask.is_some())
            .field("ignore_mask", &self.ignore_mask.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::testing::{gray_source, init_tracing, yuv_source};
    use crate::clip::{Arg, ClipInfo, PropValue};
    use crate::error::Error;
    use crate::field::FieldBased;
    use crate::kernel::BorderHandling;
    use crate::masks::Kirsch;
    use crate::scaler::ModelDoubler;

    fn rescale_1080p() -> Rescale {
        Rescale::new(
            &yuv_source(1920, 1080),
            720u32,
            ResampleKernel::catrom(),
            ModelDoubler::artcnn(),
        )
        .expect("rescale")
    }

    fn with_options(options: RescaleOptions) -> Rescale {
        Rescale::with_options(
            &yuv_source(1920, 1080),
            ResampleKernel::catrom(),
            ModelDoubler::artcnn(),
            ResampleKernel::hermite().linear(),
            options,
        )
        .expect("rescale")
    }

    /// Luma plane of a joined upscale.
    fn upscale_luma(rescale: &mut Rescale) -> Clip {
        let upscale = rescale.upscale().expect("upscale");
        upscale.inputs()[0].clone()
    }

    #[test]
    fn end_to_end_1080p_from_720p() {
        init_tracing();
        let mut rescale = rescale_1080p();
        assert_eq!(ResampleKernel::catrom().kernel_radius(), 2);

        let descale = rescale.descale().expect("descale");
        assert_eq!((descale.width(), descale.height()), (1280, 720));
        let rescaled = rescale.rescale().expect("rescale");
        assert_eq!((rescaled.width(), rescaled.height()), (1920, 1080));
        let doubled = rescale.doubled().expect("doubled");
        assert_eq!((doubled.width(), doubled.height()), (2560, 1440));

        let upscale = rescale.upscale().expect("upscale");
        assert_eq!((upscale.width(), upscale.height()), (1920, 1080));
        assert_eq!(upscale.format(), Some(VideoFormat::YUV420P16));
        assert!(Clip::ptr_eq(&upscale.inputs()[1], &rescale.base().chroma()[0]));
        assert!(Clip::ptr_eq(&upscale.inputs()[2], &rescale.base().chroma()[1]));
    }

    #[test]
    fn reads_are_memoized() {
        let mut rescale = rescale_1080p();
        let first = rescale.descale().expect("descale");
        assert!(Clip::ptr_eq(&first, &rescale.descale().expect("descale")));
        let upscale = rescale.upscale().expect("upscale");
        assert!(Clip::ptr_eq(&upscale, &rescale.upscale().expect("upscale")));
    }

    #[test]
    fn tags_record_source_window() {
        let mut exact = rescale_1080p();
        let tag = exact.descale().expect("descale");
        assert_eq!(
            tag.prop("RescaleDescaleFrom").and_then(PropValue::as_data),
            Some("Catrom - 1280 x 720")
        );

        let mut fractional = with_options(RescaleOptions::new(715.5));
        let descale = fractional.descale().expect("descale");
        assert_eq!(
            descale.prop("RescaleDescaleFrom").and_then(PropValue::as_data),
            Some("Catrom - 1272 x 715.50")
        );
        assert_eq!((descale.width(), descale.height()), (1272, 716));
        let upscale = fractional.upscale().expect("upscale");
        assert_eq!(upscale.width(), 1920);
    }

    #[test]
    fn variable_clips_are_rejected_at_construction() {
        let variable =
            Clip::source("vfr", ClipInfo::new(VideoFormat::GRAY16, 0, 0)).expect("source");
        let rescale = Rescale::new(
            &variable,
            720u32,
            ResampleKernel::catrom(),
            ModelDoubler::artcnn(),
        );
        assert!(rescale.is_err());
    }

    #[test]
    fn shift_moves_the_source_window() {
        let options = RescaleOptions::new(720u32)
            .with_crop(Crop::new(2, 0, 0, 6))
            .with_shift(0.5, 0.25);
        let mut rescale = with_options(options);
        let descale = rescale.descale().expect("descale");
        assert_eq!((descale.width(), descale.height()), (1279, 716));

        let node = &descale.inputs()[0];
        assert_eq!(node.function(), "descale.Debicubic");
        let arg = |key: &str| node.arg(key).and_then(Arg::as_float).expect("window arg");
        assert_eq!(arg("src_top"), 0.5);
        assert!((arg("src_left") - (1.0 / 3.0 + 0.25)).abs() < 1e-9);
        assert!((arg("src_height") - 716.0).abs() < 1e-9);
        assert!((arg("src_width") - 1280.0 * 1918.0 / 1920.0).abs() < 1e-9);
    }

    #[test]
    fn explicit_width_and_base_size_shape_the_descale() {
        let mut wide = with_options(RescaleOptions::new(720u32).with_width(1440u32));
        let descale = wide.descale().expect("descale");
        assert_eq!((descale.width(), descale.height()), (1440, 720));
        let node = &descale.inputs()[0];
        assert_eq!(node.arg("src_width").and_then(Arg::as_float), Some(1440.0));

        let options = RescaleOptions::new(719.5)
            .with_width(1279.5)
            .with_base_size(Some(1282), Some(724));
        let mut based = with_options(options);
        let descale = based.descale().expect("descale");
        assert_eq!((descale.width(), descale.height()), (1280, 720));

        let node = &descale.inputs()[0];
        let arg = |key: &str| node.arg(key).and_then(Arg::as_float);
        assert_eq!(arg("src_width"), Some(1279.5));
        assert_eq!(arg("src_height"), Some(719.5));
        assert_eq!(arg("src_left"), Some(0.25));
        assert_eq!(arg("src_top"), Some(0.25));
    }

    #[test]
    fn oversized_crop_is_an_error() {
        let src = yuv_source(1920, 1080);
        let build = |crop: Crop| {
            Rescale::with_options(
                &src,
                ResampleKernel::catrom(),
                ModelDoubler::artcnn(),
                ResampleKernel::hermite().linear(),
                RescaleOptions::new(720u32).with_crop(crop),
            )
        };
        assert!(matches!(
            build(Crop::new(u32::MAX, 1, 0, 0)),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            build(Crop::new(0, 0, 540, 540)),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn ignore_mask_descales_height_then_width() {
        let mut rescale = rescale_1080p();
        let mask = rescale.ignore_mask().expect("ignore mask");
        assert_eq!(mask.format(), Some(VideoFormat::GRAY8));

        let descale = rescale.descale().expect("descale");
        assert_eq!((descale.width(), descale.height()), (1280, 720));

        let width_pass = &descale.inputs()[0];
        assert_eq!(width_pass.function(), "descale.Debicubic");
        assert!(width_pass.arg("src_width").is_some());
        assert!(width_pass.arg("src_height").is_none());
        assert_eq!(width_pass.inputs()[1].function(), "resize.Point");
        assert_eq!(width_pass.inputs()[1].height(), 720);

        let height_pass = &width_pass.inputs()[0];
        assert_eq!(height_pass.function(), "descale.Debicubic");
        assert_eq!((height_pass.width(), height_pass.height()), (1920, 720));
        assert!(height_pass.arg("src_width").is_none());
        assert!(Clip::ptr_eq(&height_pass.inputs()[1], &mask));

        assert_eq!(rescale.base().descale_args().mode, ScaleMode::Both);
    }

    #[test]
    fn ignore_mask_changes_invalidate_descale() {
        let mut rescale = rescale_1080p();
        rescale.upscale().expect("upscale");
        rescale.rescale().expect("rescale");

        let source = gray_source(1920, 1080);
        rescale.set_ignore_mask(Some(&source)).expect("set");
        for node in Derived::ALL {
            let cached = rescale.base().cache().is_cached(node);
            assert!(!cached, "{:?} survived", node);
        }
        let ignore = rescale.ignore_mask().expect("mask");
        assert_eq!(ignore.format(), Some(VideoFormat::GRAY8));

        rescale.descale().expect("descale");
        rescale.clear_ignore_mask();
        let single_pass = rescale.descale().expect("descale");
        assert_eq!(single_pass.inputs()[0].inputs().len(), 1);
    }

    #[test]
    fn line_mask_changes_invalidate_upscale_only() {
        let mut rescale = rescale_1080p();
        let descale = rescale.descale().expect("descale");
        rescale.rescale().expect("rescale");
        let upscale = rescale.upscale().expect("upscale");

        rescale.set_line_mask(Some(&gray_source(1920, 1080))).expect("set");
        assert!(rescale.base().cache().is_cached(Derived::Descale));
        assert!(rescale.base().cache().is_cached(Derived::Rescale));
        assert!(rescale.base().cache().is_cached(Derived::Doubled));
        assert!(!rescale.base().cache().is_cached(Derived::Upscale));

        assert!(Clip::ptr_eq(&descale, &rescale.descale().expect("descale")));
        assert!(!Clip::ptr_eq(&upscale, &rescale.upscale().expect("upscale")));

        rescale.clear_line_mask();
        assert!(!rescale.base().cache().is_cached(Derived::Upscale));
        let luma = upscale_luma(&mut rescale);
        assert!(luma.find_upstream("std.MaskedMerge").is_none());
    }

    #[test]
    fn line_mask_keeps_source_where_unset() {
        let mut rescale = rescale_1080p();
        let src = gray_source(1920, 1080);
        let mask = ops::depth(&src, SampleType::Integer, 8, DitherType::None).expect("mask");
        rescale.set_line_mask(Some(&mask)).expect("set");
        let stored = rescale.line_mask().expect("mask");
        assert_eq!(stored.format(), Some(VideoFormat::GRAY16));

        let luma = upscale_luma(&mut rescale);
        assert_eq!(luma.function(), "std.CopyFrameProps");
        let merge = &luma.inputs()[0];
        assert_eq!(merge.function(), "std.MaskedMerge");
        assert!(Clip::ptr_eq(&merge.inputs()[0], rescale.base().clipy()));
        assert!(luma.prop("RescaleUpscaleFrom").is_some());
    }

    #[test]
    fn credit_mask_restores_source() {
        let mut rescale = rescale_1080p();
        let blank = rescale.credit_mask().expect("credit mask");
        assert_eq!(blank.format(), Some(VideoFormat::GRAY16));

        let luma = upscale_luma(&mut rescale);
        assert_eq!(luma.function(), "std.MaskedMerge");
        assert!(Clip::ptr_eq(&luma.inputs()[1], rescale.base().clipy()));
        assert!(Clip::ptr_eq(&luma.inputs()[2], &blank));
        assert!(luma.prop("RescaleUpscaleFrom").is_some());
    }

    #[test]
    fn non_mirror_borders_force_a_line_mask() {
        init_tracing();
        let options = RescaleOptions::new(720u32)
            .with_border_handling(BorderHandling::Zero);
        let mut rescale = with_options(options);
        let luma = upscale_luma(&mut rescale);
        let merge = luma.find_upstream("std.MaskedMerge").expect("merge");
        let mask = &merge.inputs()[2];
        let expression = mask.arg("expr").and_then(Arg::as_str).expect("expr");
        assert_eq!(
            expression,
            "X 2 < X 1917 > or Y 2 < Y 1077 > or or 65535 x ?"
        );

        let rescaled = rescale.rescale().expect("rescale");
        let scale = &rescaled.inputs()[0];
        assert_eq!(scale.function(), "descale.Bicubic");
        assert_eq!(scale.arg("border_handling").and_then(Arg::as_int), Some(1));
    }

    #[test]
    fn crop_is_restored_from_the_source() {
        let src = yuv_source(1920, 1080);
        let mut rescale = Rescale::with_options(
            &src,
            ResampleKernel::catrom(),
            ModelDoubler::artcnn(),
            ResampleKernel::hermite().linear(),
            RescaleOptions::new(720u32).with_crop(Crop::new(8, 8, 8, 8)),
        )
        .expect("rescale");
        let clipy = rescale.base().clipy();
        assert_eq!((clipy.width(), clipy.height()), (1904, 1064));

        let descale = rescale.descale().expect("descale");
        assert_eq!((descale.width(), descale.height()), (1270, 710));
        let rescaled = rescale.rescale().expect("rescale");
        assert_eq!((rescaled.width(), rescaled.height()), (1904, 1064));

        let upscale = rescale.upscale().expect("upscale");
        assert_eq!((upscale.width(), upscale.height()), (1920, 1080));
        assert_eq!(upscale.format(), Some(VideoFormat::YUV420P16));

        let merge = &upscale.inputs()[0];
        assert_eq!(merge.function(), "std.MaskedMerge");
        assert_eq!(merge.inputs()[0].function(), "std.AddBorders");
        assert!(Clip::ptr_eq(&merge.inputs()[1].inputs()[0], &src));
        let expression = merge.inputs()[2].arg("expr").and_then(Arg::as_str).expect("expr");
        assert_eq!(
            expression,
            "X 8 < X 1911 > or Y 8 < Y 1071 > or or 65535 x ?"
        );
        assert_eq!(rescale.crop(), Crop::new(8, 8, 8, 8));
    }

    #[test]
    fn default_line_mask_is_stored_at_luma_size() {
        let mut rescale = rescale_1080p();
        let half = gray_source(960, 540);
        let mask = rescale
            .default_line_mask(Some(&half), None, &Kirsch::default())
            .expect("line mask");
        assert_eq!((mask.width(), mask.height()), (1920, 1080));
        assert_eq!(mask.format(), Some(VideoFormat::GRAY16));
        assert_eq!(mask.function(), "resize.Bilinear");
        assert!(mask.find_upstream("std.Minimum").is_some());
        assert!(Clip::ptr_eq(&mask, &rescale.line_mask().expect("line mask")));
    }

    #[test]
    fn default_credit_mask_diffs_against_rescale() {
        let mut rescale = rescale_1080p();
        let mask = rescale
            .default_credit_mask(None, None, 0.216, 4)
            .expect("credit mask");
        assert_eq!(mask.function(), "std.Inflate");
        assert!(mask.find_upstream("resize.Bicubic").is_some());
        assert!(rescale.base().cache().is_cached(Derived::Rescale));
        assert!(Clip::ptr_eq(&mask, &rescale.credit_mask().expect("credit mask")));
    }

    #[test]
    fn field_based_sources_descale_per_field() {
        let options = RescaleOptions::new(720u32)
            .with_field_based(FieldBased::Tff);
        let mut rescale = with_options(options);
        rescale.ignore_mask().expect("ignore mask");
        let descale = rescale.descale().expect("descale");
        assert_eq!((descale.width(), descale.height()), (1280, 720));
        assert_eq!(FieldBased::from_clip(&descale), FieldBased::Progressive);
        assert!(descale.find_upstream("std.DoubleWeave").is_some());

        let upscale = rescale.upscale().expect("upscale");
        assert_eq!((upscale.width(), upscale.height()), (1920, 1080));
    }
}
