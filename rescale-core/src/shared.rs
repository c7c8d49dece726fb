//! Cross-thread handle to a rescaler.
//!
//! Graph construction is cheap and synchronous, so a single mutex around the
//! whole rescaler is enough: readers of cached clips only hold it for a clone.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::base::Rescaler;
use crate::cache::Derived;
use crate::clip::Clip;
use crate::error::Result;

pub struct SharedRescale<R> {
    inner: Arc<Mutex<R>>,
}

impl<R: Rescaler> SharedRescale<R> {
    pub fn new(rescaler: R) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rescaler)),
        }
    }

    pub fn descale(&self) -> Result<Clip> {
        self.inner.lock().descale()
    }

    pub fn rescale(&self) -> Result<Clip> {
        self.inner.lock().rescale()
    }

    pub fn doubled(&self) -> Result<Clip> {
        self.inner.lock().doubled()
    }

    pub fn upscale(&self) -> Result<Clip> {
        self.inner.lock().upscale()
    }

    pub fn invalidate(&self, node: Derived) {
        self.inner.lock().invalidate(node);
    }

    /// Run `f` with exclusive access, e.g. to change masks.
    pub fn with<T>(&self, f: impl FnOnce(&mut R) -> T) -> T {
        f(&mut self.inner.lock())
    }
}

impl<R> Clone for SharedRescale<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::testing::yuv_source;
    use crate::kernel::ResampleKernel;
    use crate::rescale::Rescale;
    use crate::scaler::ModelDoubler;
    use std::thread;

    #[test]
    fn threads_share_one_cache() {
        let rescale = Rescale::new(
            &yuv_source(1920, 1080),
            720u32,
            ResampleKernel::catrom(),
            ModelDoubler::artcnn(),
        )
        .expect("rescale");
        let shared = SharedRescale::new(rescale);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || shared.upscale().expect("upscale"))
            })
            .collect();
        let clips: Vec<Clip> = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .collect();
        assert!(clips.windows(2).all(|pair| Clip::ptr_eq(&pair[0], &pair[1])));

        let descale = shared.descale().expect("descale");
        shared
            .with(|rescale| {
                let clipy = rescale.base().clipy().clone();
                rescale.set_line_mask(Some(&clipy))
            })
            .expect("line mask");
        assert!(Clip::ptr_eq(&descale, &shared.descale().expect("descale")));
        assert!(!Clip::ptr_eq(&clips[0], &shared.upscale().expect("upscale")));
    }
}
