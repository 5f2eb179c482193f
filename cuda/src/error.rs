use crate::bindings::{CUresult, cuGetErrorName, cuGetErrorString};
use std::{
    error::Error,
    ffi::{CStr, c_char},
    fmt,
    ptr::null,
};

/// A failed driver call.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DriverError(pub CUresult);

impl DriverError {
    #[inline]
    pub fn check(result: CUresult) -> Result<(), Self> {
        if result == CUresult::CUDA_SUCCESS {
            Ok(())
        } else {
            Err(Self(result))
        }
    }

    #[inline]
    pub fn code(&self) -> CUresult {
        self.0
    }

    /// Symbolic name of the status, e.g. `CUDA_ERROR_OUT_OF_MEMORY`.
    pub fn name(&self) -> &'static str {
        let mut ptr: *const c_char = null();
        match unsafe { cuGetErrorName(self.0, &mut ptr) } {
            CUresult::CUDA_SUCCESS if !ptr.is_null() => unsafe { static_str(ptr) },
            _ => "CUDA_ERROR_UNKNOWN",
        }
    }

    fn description(&self) -> &'static str {
        let mut ptr: *const c_char = null();
        match unsafe { cuGetErrorString(self.0, &mut ptr) } {
            CUresult::CUDA_SUCCESS if !ptr.is_null() => unsafe { static_str(ptr) },
            _ => "unrecognized error code",
        }
    }
}

/// # Safety
///
/// `ptr` must point to a nul-terminated string owned by the driver for the whole process.
unsafe fn static_str(ptr: *const c_char) -> &'static str {
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .unwrap_or("non-utf8 error message")
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.description())
    }
}

impl Error for DriverError {}

/// There is no device the driver can work with.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NoDevice;

impl fmt::Display for NoDevice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("no cuda device available")
    }
}

impl Error for NoDevice {}

#[test]
fn test_display() {
    let err = DriverError(CUresult::CUDA_ERROR_OUT_OF_MEMORY);
    assert_eq!(err.name(), "CUDA_ERROR_OUT_OF_MEMORY");
    assert!(err.to_string().starts_with("CUDA_ERROR_OUT_OF_MEMORY: "));
    assert_eq!(DriverError::check(CUresult::CUDA_SUCCESS), Ok(()));
}
