use crate::{AsRaw, CurrentCtx, DriverError, bindings as cuda};
use std::ptr::null_mut;

pub struct Stream<'ctx>(cuda::CUstream, &'ctx CurrentCtx);

impl CurrentCtx {
    #[inline]
    pub fn stream(&self) -> Stream<'_> {
        let mut stream = null_mut();
        driver!(cuStreamCreate(&mut stream, 0));
        Stream(stream, self)
    }
}

impl Drop for Stream<'_> {
    #[inline]
    fn drop(&mut self) {
        if let Err(e) = self.synchronize() {
            log::warn!("stream destroyed with pending error: {e}")
        }
        driver!(cuStreamDestroy_v2(self.0));
    }
}

impl AsRaw for Stream<'_> {
    type Raw = cuda::CUstream;
    #[inline]
    unsafe fn as_raw(&self) -> Self::Raw {
        self.0
    }
}

impl<'ctx> Stream<'ctx> {
    /// Blocks until all work on the stream is done,
    /// reporting errors raised asynchronously by that work.
    #[inline]
    pub fn synchronize(&self) -> Result<(), DriverError> {
        try_driver!(cuStreamSynchronize(self.0))
    }

    #[inline]
    pub fn ctx(&self) -> &'ctx CurrentCtx {
        self.1
    }
}
