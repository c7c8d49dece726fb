//! # Rescale Base
//!
//! Owns the derived-clip graph `descale -> {rescale, doubled -> upscale}`.
//! Each node is generated on first access, memoized in a [`DerivedCache`]
//! and dropped together with its descendants on [`Rescaler::invalidate`].
//!
//! Generation goes through [`RescaleBase::generate_with_wrapping`], which
//! applies the field-based policy around the resample operation and tags the
//! result with the kernel and source window that produced it.

use tracing::debug;

use crate::cache::{Derived, DerivedCache};
use crate::clip::ops::{self, set_frame_prop};
use crate::clip::{Clip, PropValue};
use crate::error::Result;
use crate::field::FieldBased;
use crate::kernel::{BorderHandling, Kernel};
use crate::scaler::Scaler;
use crate::scaling_args::ScalingArgs;

/// Whole numbers without decimals, anything else with two.
pub fn format_dimension(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

// ============================================================================
// RescaleBase
// ============================================================================

pub struct RescaleBase {
    clipy: Clip,
    chroma: Vec<Clip>,
    kernel: Box<dyn Kernel>,
    upscaler: Box<dyn Scaler>,
    downscaler: Box<dyn Scaler>,
    field_based: Option<FieldBased>,
    border_handling: BorderHandling,
    descale_args: ScalingArgs,
    cache: DerivedCache,
}

impl RescaleBase {
    /// Split `clip` into luma and chroma. Variable clips are rejected here,
    /// everything else fails lazily when a derived clip is first read.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clip: &Clip,
        descale_args: ScalingArgs,
        kernel: Box<dyn Kernel>,
        upscaler: Box<dyn Scaler>,
        downscaler: Box<dyn Scaler>,
        field_based: Option<FieldBased>,
        border_handling: BorderHandling,
    ) -> Result<Self> {
        clip.require_constant("RescaleBase")?;
        let clipy = ops::get_y(clip)?;
        let chroma = ops::split(clip)?.into_iter().skip(1).collect();

        Ok(Self {
            clipy,
            chroma,
            kernel,
            upscaler,
            downscaler,
            field_based,
            border_handling,
            descale_args,
            cache: DerivedCache::default(),
        })
    }

    pub fn clipy(&self) -> &Clip {
        &self.clipy
    }

    /// Swap the luma plane, dropping every derived clip.
    pub(crate) fn replace_clipy(&mut self, clipy: Clip) {
        self.clipy = clipy;
        self.cache.clear();
    }

    pub fn chroma(&self) -> &[Clip] {
        &self.chroma
    }

    pub fn kernel(&self) -> &dyn Kernel {
        self.kernel.as_ref()
    }

    pub fn upscaler(&self) -> &dyn Scaler {
        self.upscaler.as_ref()
    }

    pub fn downscaler(&self) -> &dyn Scaler {
        self.downscaler.as_ref()
    }

    pub fn field_based(&self) -> Option<FieldBased> {
        self.field_based
    }

    pub fn border_handling(&self) -> BorderHandling {
        self.border_handling
    }

    pub fn descale_args(&self) -> &ScalingArgs {
        &self.descale_args
    }

    pub fn cache(&self) -> &DerivedCache {
        &self.cache
    }

    /// String recorded under [`Derived::prop_key`].
    pub fn tag(&self) -> String {
        format!(
            "{} - {} x {}",
            self.kernel.name(),
            format_dimension(self.descale_args.src_width),
            format_dimension(self.descale_args.src_height)
        )
    }

    /// Run `op` on `clip`, inside the field-based policy when
    /// `wrap_field_based` is set, and tag the result for `node`.
    pub fn generate_with_wrapping(
        &self,
        clip: &Clip,
        wrap_field_based: bool,
        node: Derived,
        op: impl FnOnce(&Clip) -> Result<Clip>,
    ) -> Result<Clip> {
        let out = match self.field_based {
            Some(field_based) if wrap_field_based && field_based.is_inter() => {
                let fields = field_based.apply(clip);
                FieldBased::Progressive.apply(&op(&fields)?)
            }
            _ => op(clip)?,
        };
        Ok(set_frame_prop(
            &out,
            &node.prop_key(),
            PropValue::Data(self.tag()),
        ))
    }

    pub fn generate_descale(&self, clip: &Clip) -> Result<Clip> {
        let args = &self.descale_args;
        let window = args.kwargs(None);
        self.generate_with_wrapping(clip, true, Derived::Descale, |clip| {
            self.kernel.descale(
                clip,
                Some(args.width),
                Some(args.height),
                &window,
                self.border_handling,
                None,
            )
        })
    }

    pub fn generate_rescale(&self, clip: &Clip) -> Result<Clip> {
        let window = self.descale_args.kwargs(None);
        self.generate_with_wrapping(clip, true, Derived::Rescale, |clip| {
            self.kernel.scale(
                clip,
                self.clipy.width(),
                self.clipy.height(),
                &window,
                self.border_handling,
            )
        })
    }

    pub fn generate_doubled(&self, clip: &Clip) -> Result<Clip> {
        self.generate_with_wrapping(clip, false, Derived::Doubled, |clip| {
            self.upscaler.multi(clip, 2)
        })
    }

    pub fn generate_upscale(&self, clip: &Clip) -> Result<Clip> {
        self.generate_with_wrapping(clip, false, Derived::Upscale, |clip| {
            let window = self.descale_args.kwargs(Some(clip));
            self.downscaler
                .scale(clip, self.clipy.width(), self.clipy.height(), &window)
        })
    }
}

impl std::fmt::Debug for RescaleBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RescaleBase")
            .field("clipy", &self.clipy)
            .field("kernel", &self.kernel.name())
            .field("upscaler", &self.upscaler.name())
            .field("downscaler", &self.downscaler.name())
            .field("field_based", &self.field_based)
            .field("border_handling", &self.border_handling)
            .field("descale_args", &self.descale_args)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Rescaler
// ============================================================================

/// Memoized access to the derived clips.
///
/// Implementors provide the shared [`RescaleBase`] and may override any
/// `generate_*` step; the cached getters and invalidation stay the same.
pub trait Rescaler {
    fn base(&self) -> &RescaleBase;

    fn base_mut(&mut self) -> &mut RescaleBase;

    fn generate_descale(&self, clip: &Clip) -> Result<Clip> {
        self.base().generate_descale(clip)
    }

    fn generate_rescale(&self, clip: &Clip) -> Result<Clip> {
        self.base().generate_rescale(clip)
    }

    fn generate_doubled(&self, clip: &Clip) -> Result<Clip> {
        self.base().generate_doubled(clip)
    }

    fn generate_upscale(&self, clip: &Clip) -> Result<Clip> {
        self.base().generate_upscale(clip)
    }

    fn descale(&mut self) -> Result<Clip> {
        memoized(self, Derived::Descale, |this| {
            let clipy = this.base().clipy().clone();
            this.generate_descale(&clipy)
        })
    }

    fn rescale(&mut self) -> Result<Clip> {
        memoized(self, Derived::Rescale, |this| {
            let descale = this.descale()?;
            this.generate_rescale(&descale)
        })
    }

    fn doubled(&mut self) -> Result<Clip> {
        memoized(self, Derived::Doubled, |this| {
            let descale = this.descale()?;
            this.generate_doubled(&descale)
        })
    }

    /// Upscaled luma joined with the untouched chroma planes.
    fn upscale(&mut self) -> Result<Clip> {
        memoized(self, Derived::Upscale, |this| {
            let doubled = this.doubled()?;
            let luma = this.generate_upscale(&doubled)?;
            let mut planes = Vec::with_capacity(1 + this.base().chroma().len());
            planes.push(luma);
            planes.extend(this.base().chroma().iter().cloned());
            ops::join(&planes)
        })
    }

    /// Drop `node` and everything computed from it.
    fn invalidate(&mut self, node: Derived) {
        self.base_mut().cache.invalidate(node);
    }
}

fn memoized<R: Rescaler + ?Sized>(
    this: &mut R,
    node: Derived,
    generate: impl FnOnce(&mut R) -> Result<Clip>,
) -> Result<Clip> {
    if let Some(clip) = this.base().cache.get(node) {
        return Ok(clip.clone());
    }
    debug!(node = node.label(), "generating derived clip");
    let clip = generate(this)?;
    this.base_mut().cache.store(node, clip.clone());
    Ok(clip)
}

impl Rescaler for RescaleBase {
    fn base(&self) -> &RescaleBase {
        self
    }

    fn base_mut(&mut self) -> &mut RescaleBase {
        self
    }
}
