//! # rescale-core
//!
//! Descale / rescale / upscale graphs for upscaled video sources.
//!
//! A [`Rescale`] takes a clip believed to be upscaled from a lower resolution
//! with a known kernel and lazily builds:
//!
//! - `descale`: the reconstructed low resolution luma
//! - `rescale`: the descale scaled back with the same kernel, for diffing
//! - `doubled`: the descale doubled by a model based upscaler
//! - `upscale`: the doubled clip downscaled to the source size, masked and
//!   joined with the original chroma
//!
//! Everything is expressed as nodes of a lazy filter graph ([`Clip`]); the
//! pixel work belongs to the engine that evaluates it.

// ============================================================================
// Foundation
// ============================================================================
pub mod clip;
pub mod error;
pub mod field;

// ============================================================================
// Collaborators
// ============================================================================
pub mod kernel;
pub mod masks;
pub mod scaler;

// ============================================================================
// Rescaling
// ============================================================================
pub mod base;
pub mod cache;
pub mod options;
pub mod rescale;
pub mod scaling_args;
pub mod shared;

pub use base::{RescaleBase, Rescaler};
pub use cache::Derived;
pub use clip::{Clip, ClipInfo, VideoFormat};
pub use error::{Error, Result};
pub use field::FieldBased;
pub use kernel::{BorderHandling, Kernel, ResampleKernel, SampleWindow};
pub use masks::{BasedDiffMask, DiffMask, EdgeDetector, Kirsch, Prewitt};
pub use options::RescaleOptions;
pub use rescale::Rescale;
pub use scaler::{ModelDoubler, Scaler};
pub use scaling_args::{Crop, Dimension, ScaleMode, ScalingArgs};
pub use shared::SharedRescale;

// ============================================================================
// Version
// ============================================================================
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
