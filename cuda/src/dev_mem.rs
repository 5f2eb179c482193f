use crate::{AsRaw, CurrentCtx, DevByte, DriverError, Stream, bindings as cuda};
use std::{alloc::Layout, marker::PhantomData};

/// Device-only memory, freed when dropped.
#[derive(PartialEq, Eq, Hash, Debug)]
pub struct DevMem<'ctx> {
    ptr: cuda::CUdeviceptr,
    len: usize,
    _ctx: PhantomData<&'ctx CurrentCtx>,
}

impl<'ctx> Stream<'ctx> {
    /// Allocates `len` elements of `T` in stream order.
    pub fn malloc<T: Copy>(&self, len: usize) -> Result<DevMem<'ctx>, DriverError> {
        let len = bytes_of::<T>(len)?;
        let mut ptr = 0;
        if len != 0 {
            try_driver!(cuMemAllocAsync(&mut ptr, len, self.as_raw()))?
        }
        Ok(DevMem {
            ptr,
            len,
            _ctx: PhantomData,
        })
    }

    /// Allocates device memory and copies `slice` into it, both in stream order.
    pub fn from_host<T: Copy>(&self, slice: &[T]) -> Result<DevMem<'ctx>, DriverError> {
        let mut mem = self.malloc::<T>(slice.len())?;
        mem.copy_in_async(slice, self)?;
        Ok(mem)
    }
}

pub(crate) fn bytes_of<T>(len: usize) -> Result<usize, DriverError> {
    Layout::array::<T>(len)
        .map(|layout| layout.size())
        .map_err(|_| DriverError(cuda::CUresult::CUDA_ERROR_OUT_OF_MEMORY))
}

impl Drop for DevMem<'_> {
    #[inline]
    fn drop(&mut self) {
        if self.ptr != 0 {
            driver!(cuMemFree_v2(self.ptr))
        }
    }
}

impl AsRaw for DevMem<'_> {
    type Raw = cuda::CUdeviceptr;

    #[inline]
    unsafe fn as_raw(&self) -> Self::Raw {
        self.ptr
    }
}

impl DevMem<'_> {
    /// Size in bytes.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_ptr(&self) -> *const DevByte {
        self.ptr as _
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut DevByte {
        self.ptr as _
    }

    pub fn copy_in_async<T: Copy>(
        &mut self,
        slice: &[T],
        stream: &Stream,
    ) -> Result<(), DriverError> {
        let len = size_of_val(slice);
        assert_eq!(len, self.len);
        if len == 0 {
            return Ok(());
        }
        let src = slice.as_ptr().cast();
        try_driver!(cuMemcpyHtoDAsync_v2(self.ptr, src, len, stream.as_raw()))
    }

    /// Copies the whole memory back to host, waiting for previous work on the context.
    pub fn copy_out<T: Copy>(&self, slice: &mut [T]) -> Result<(), DriverError> {
        let len = size_of_val(slice);
        assert_eq!(len, self.len);
        if len == 0 {
            return Ok(());
        }
        let dst = slice.as_mut_ptr().cast();
        try_driver!(cuMemcpyDtoH_v2(dst, self.ptr, len))
    }
}

#[test]
fn test_round_trip() {
    use rand::Rng;

    if let Err(crate::NoDevice) = crate::init() {
        return;
    }
    crate::Device::new(0).retain_primary().apply(|ctx| {
        let mut host = vec![0.0f32; 64 << 10];
        rand::rng().fill(&mut host[..]);

        let stream = ctx.stream();
        let mem = stream.from_host(&host).unwrap();
        assert_eq!(mem.len(), size_of_val(&*host));
        stream.synchronize().unwrap();

        let mut back = vec![0.0f32; host.len()];
        mem.copy_out(&mut back).unwrap();
        assert_eq!(host, back);

        let empty = stream.malloc::<f64>(0).unwrap();
        assert!(empty.is_empty());
    })
}
