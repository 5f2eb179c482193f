#![cfg(nvidia)]
#![deny(warnings)]

#[macro_use]
#[allow(unused, non_upper_case_globals, non_camel_case_types, non_snake_case)]
pub mod bindings {
    include!(concat!(env!("OUT_DIR"), "/bindings.rs"));

    /// Calls a driver function which is not expected to fail, panics otherwise.
    #[macro_export]
    macro_rules! driver {
        ($f:expr) => {{
            #[allow(unused_imports)]
            use $crate::bindings::*;
            #[allow(unused_unsafe, clippy::macro_metavars_in_unsafe)]
            let err = unsafe { $f };
            assert_eq!(err, CUresult::CUDA_SUCCESS)
        }};
    }

    /// Calls a driver function and converts its status into a `Result`.
    #[macro_export]
    macro_rules! try_driver {
        ($f:expr) => {{
            #[allow(unused_imports)]
            use $crate::bindings::*;
            #[allow(unused_unsafe, clippy::macro_metavars_in_unsafe)]
            let err = unsafe { $f };
            $crate::DriverError::check(err)
        }};
    }
}

mod context;
mod dev_mem;
mod device;
mod error;
mod event;
mod shared_mem;
mod stream;

pub trait AsRaw {
    type Raw;

    /// # Safety
    ///
    /// The caller must ensure that the returned item is dropped before the original item.
    unsafe fn as_raw(&self) -> Self::Raw;
}

/// A byte living in memory the device can address.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
#[repr(transparent)]
pub struct DevByte(#[allow(unused)] u8);

/// Initializes the driver api.
///
/// Any failure is reported as [`NoDevice`], since no device is usable afterwards.
pub fn init() -> Result<(), NoDevice> {
    use bindings::CUresult::*;
    match unsafe { bindings::cuInit(0) } {
        CUDA_SUCCESS if Device::count() > 0 => Ok(()),
        CUDA_SUCCESS | CUDA_ERROR_NO_DEVICE => Err(NoDevice),
        e => {
            log::warn!("cuInit failed: {}", DriverError(e));
            Err(NoDevice)
        }
    }
}

pub use context::{Context, CurrentCtx};
pub use dev_mem::DevMem;
pub use device::{ComputeCapability, Device};
pub use error::{DriverError, NoDevice};
pub use event::Event;
pub use shared_mem::SharedMem;
pub use stream::Stream;
