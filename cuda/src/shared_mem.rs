use crate::{
    AsRaw, CurrentCtx, DevByte, DriverError, bindings as cuda, dev_mem::bytes_of,
};
use std::{
    marker::PhantomData,
    ops::{Deref, DerefMut},
    ptr::NonNull,
    slice::{from_raw_parts, from_raw_parts_mut},
};

/// Managed memory, addressable from both host and device.
///
/// The allocation has exactly one owner and is released exactly once, on drop.
/// Host access through `Deref` is only sound while no device work touches it,
/// so synchronize the streams using it first.
pub struct SharedMem<'ctx, T> {
    ptr: cuda::CUdeviceptr,
    count: usize,
    _phantom: PhantomData<(&'ctx CurrentCtx, T)>,
}

impl CurrentCtx {
    /// Allocates `count` zeroed elements of `T` attached globally,
    /// so any stream on any device may access them.
    pub fn malloc_shared<T: Copy>(&self, count: usize) -> Result<SharedMem<'_, T>, DriverError> {
        let len = bytes_of::<T>(count)?;
        let mut mem = SharedMem {
            ptr: 0,
            count,
            _phantom: PhantomData,
        };
        if len != 0 {
            try_driver!(cuMemAllocManaged(
                &mut mem.ptr,
                len,
                CUmemAttach_flags::CU_MEM_ATTACH_GLOBAL as _
            ))?;
            try_driver!(cuMemsetD8_v2(mem.ptr, 0, len))?;
            log::debug!("managed {len} bytes at {:#x}", mem.ptr)
        }
        Ok(mem)
    }
}

impl<T> SharedMem<'_, T> {
    /// Number of elements.
    #[inline]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Size in bytes.
    #[inline]
    pub const fn size(&self) -> usize {
        self.count * size_of::<T>()
    }

    #[inline]
    pub fn as_dev_ptr(&self) -> *const DevByte {
        self.ptr as _
    }

    #[inline]
    pub fn as_dev_mut_ptr(&mut self) -> *mut DevByte {
        self.ptr as _
    }

    fn host_ptr(&self) -> *mut T {
        if self.ptr == 0 {
            NonNull::dangling().as_ptr()
        } else {
            self.ptr as _
        }
    }
}

impl<T> Drop for SharedMem<'_, T> {
    #[inline]
    fn drop(&mut self) {
        if self.ptr != 0 {
            driver!(cuMemFree_v2(self.ptr))
        }
    }
}

impl<T> AsRaw for SharedMem<'_, T> {
    type Raw = cuda::CUdeviceptr;

    #[inline]
    unsafe fn as_raw(&self) -> Self::Raw {
        self.ptr
    }
}

impl<T> Deref for SharedMem<'_, T> {
    type Target = [T];
    #[inline]
    fn deref(&self) -> &Self::Target {
        unsafe { from_raw_parts(self.host_ptr(), self.count) }
    }
}

impl<T> DerefMut for SharedMem<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { from_raw_parts_mut(self.host_ptr(), self.count) }
    }
}

#[test]
fn test_host_access() {
    use rand::Rng;

    if let Err(crate::NoDevice) = crate::init() {
        return;
    }
    let dev = crate::Device::new(0);
    if !dev.supports_managed_memory() {
        return;
    }
    dev.retain_primary().apply(|ctx| {
        let mut shared = ctx.malloc_shared::<f32>(256 << 10).unwrap();
        assert_eq!(shared.count(), 256 << 10);
        assert_eq!(shared.size(), 1 << 20);
        assert!(shared.iter().all(|&x| x == 0.));

        rand::rng().fill(&mut shared[..]);
        let stream = ctx.stream();
        let copy = stream.from_host(&shared[..]).unwrap();
        stream.synchronize().unwrap();

        let mut back = vec![0.0f32; shared.count()];
        copy.copy_out(&mut back).unwrap();
        assert_eq!(&*shared, &*back);

        let empty = ctx.malloc_shared::<f64>(0).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.size(), 0);
    })
}
