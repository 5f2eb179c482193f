use crate::{AsRaw, Device, bindings::CUcontext};
use std::ptr::null_mut;

/// The retained primary context of a device.
#[derive(PartialEq, Eq, Hash, Debug)]
pub struct Context {
    ctx: CUcontext,
    dev: Device,
}

impl Device {
    #[inline]
    pub fn retain_primary(&self) -> Context {
        let mut ctx = null_mut();
        driver!(cuDevicePrimaryCtxRetain(&mut ctx, self.as_raw()));
        Context { ctx, dev: *self }
    }
}

impl Drop for Context {
    #[inline]
    fn drop(&mut self) {
        driver!(cuDevicePrimaryCtxRelease_v2(self.dev.as_raw()));
    }
}

unsafe impl Send for Context {}
unsafe impl Sync for Context {}

impl AsRaw for Context {
    type Raw = CUcontext;
    #[inline]
    unsafe fn as_raw(&self) -> Self::Raw {
        self.ctx
    }
}

impl Context {
    #[inline]
    pub fn device(&self) -> Device {
        self.dev
    }

    /// Makes this context current on the calling thread for the duration of `f`.
    #[inline]
    pub fn apply<T>(&self, f: impl FnOnce(&CurrentCtx) -> T) -> T {
        driver!(cuCtxPushCurrent_v2(self.ctx));
        let guard = PopOnDrop::from(self.ctx);
        f(&guard.0)
    }
}

/// A context known to be current on this thread.
///
/// Resources created through it borrow it, so they cannot outlive the push.
#[derive(Debug)]
#[repr(transparent)]
pub struct CurrentCtx(CUcontext);

struct PopOnDrop(CurrentCtx);

impl Drop for PopOnDrop {
    #[inline]
    fn drop(&mut self) {
        let mut top = null_mut();
        driver!(cuCtxPopCurrent_v2(&mut top));
        assert_eq!(top, self.0.0)
    }
}

impl From<CUcontext> for PopOnDrop {
    #[inline]
    fn from(ctx: CUcontext) -> Self {
        Self(CurrentCtx(ctx))
    }
}

impl AsRaw for CurrentCtx {
    type Raw = CUcontext;
    #[inline]
    unsafe fn as_raw(&self) -> Self::Raw {
        self.0
    }
}

impl CurrentCtx {
    #[inline]
    pub fn dev(&self) -> Device {
        let mut dev = 0;
        driver!(cuCtxGetDevice(&mut dev));
        Device::new(dev)
    }

    /// Blocks until every stream of this context is idle.
    #[inline]
    pub fn synchronize(&self) -> Result<(), crate::DriverError> {
        try_driver!(cuCtxSynchronize())
    }
}

#[test]
fn test_apply() {
    if let Err(crate::NoDevice) = crate::init() {
        return;
    }
    let dev = Device::new(0);
    let ctx = dev.retain_primary();
    let same = ctx.apply(|current| {
        assert_eq!(current.dev(), dev);
        current.synchronize().unwrap();
        unsafe { current.as_raw() == ctx.as_raw() }
    });
    assert!(same);

    let mut top = null_mut();
    driver!(cuCtxGetCurrent(&mut top));
    assert!(top.is_null());
}
