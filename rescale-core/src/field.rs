//! Field order handling for interlaced or cross-converted sources.

use serde::{Deserialize, Serialize};

use crate::clip::ops::set_frame_prop;
use crate::clip::{Clip, PropValue};

/// Frame property carrying the field order.
pub const FIELD_BASED_PROP: &str = "_FieldBased";

/// Field order of a clip, stored as the `_FieldBased` frame property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FieldBased {
    #[default]
    Progressive,
    /// Bottom field first
    Bff,
    /// Top field first
    Tff,
}

impl FieldBased {
    pub fn as_prop(&self) -> i64 {
        match self {
            FieldBased::Progressive => 0,
            FieldBased::Bff => 1,
            FieldBased::Tff => 2,
        }
    }

    pub fn from_prop(value: i64) -> Option<Self> {
        match value {
            0 => Some(FieldBased::Progressive),
            1 => Some(FieldBased::Bff),
            2 => Some(FieldBased::Tff),
            _ => None,
        }
    }

    /// Field order tagged on `clip`, progressive when untagged.
    pub fn from_clip(clip: &Clip) -> Self {
        clip.prop(FIELD_BASED_PROP)
            .and_then(PropValue::as_int)
            .and_then(Self::from_prop)
            .unwrap_or_default()
    }

    pub fn is_inter(&self) -> bool {
        !matches!(self, FieldBased::Progressive)
    }

    pub fn is_tff(&self) -> bool {
        matches!(self, FieldBased::Tff)
    }

    /// Tag every frame of `clip` with this field order.
    pub fn apply(&self, clip: &Clip) -> Clip {
        set_frame_prop(clip, FIELD_BASED_PROP, PropValue::Int(self.as_prop()))
    }
}
