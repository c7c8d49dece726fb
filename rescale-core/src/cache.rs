//! Memo slots for the derived clips and their invalidation graph.
//!
//! `descale` feeds `rescale` and `doubled`; `doubled` feeds `upscale`.
//! Invalidating a node clears it and everything downstream, never upstream
//! or siblings.

use tracing::debug;

use crate::clip::Clip;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Derived {
    Descale,
    Rescale,
    Doubled,
    Upscale,
}

impl Derived {
    pub const ALL: [Derived; 4] = [
        Derived::Descale,
        Derived::Rescale,
        Derived::Doubled,
        Derived::Upscale,
    ];

    /// Nodes computed directly from this one.
    pub fn children(self) -> &'static [Derived] {
        match self {
            Derived::Descale => &[Derived::Rescale, Derived::Doubled],
            Derived::Doubled => &[Derived::Upscale],
            Derived::Rescale | Derived::Upscale => &[],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Derived::Descale => "Descale",
            Derived::Rescale => "Rescale",
            Derived::Doubled => "Doubled",
            Derived::Upscale => "Upscale",
        }
    }

    /// Frame property recording how the node was produced.
    pub fn prop_key(self) -> String {
        format!("Rescale{}From", self.label())
    }

    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Default)]
pub struct DerivedCache {
    slots: [Option<Clip>; 4],
}

impl DerivedCache {
    pub fn get(&self, node: Derived) -> Option<&Clip> {
        self.slots[node.slot()].as_ref()
    }

    pub fn is_cached(&self, node: Derived) -> bool {
        self.slots[node.slot()].is_some()
    }

    pub fn store(&mut self, node: Derived, clip: Clip) {
        debug!(node = node.label(), id = clip.id(), "cached derived clip");
        self.slots[node.slot()] = Some(clip);
    }

    /// Drop `node` and its descendants. Empty slots are skipped.
    pub fn invalidate(&mut self, node: Derived) {
        if self.slots[node.slot()].take().is_some() {
            debug!(node = node.label(), "invalidated derived clip");
        }
        for &child in node.children() {
            self.invalidate(child);
        }
    }

    pub fn clear(&mut self) {
        for node in Derived::ALL {
            self.slots[node.slot()] = None;
        }
    }
}
