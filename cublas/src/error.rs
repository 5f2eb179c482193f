use crate::bindings::{cublasGetStatusName, cublasGetStatusString, cublasStatus_t};
use std::{error::Error, ffi::CStr, fmt};

/// A failed cublas call.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CublasError(pub cublasStatus_t);

impl CublasError {
    #[inline]
    pub fn check(status: cublasStatus_t) -> Result<(), Self> {
        if status == cublasStatus_t::CUBLAS_STATUS_SUCCESS {
            Ok(())
        } else {
            Err(Self(status))
        }
    }

    #[inline]
    pub fn status(&self) -> cublasStatus_t {
        self.0
    }
}

impl fmt::Display for CublasError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Both strings are static and owned by the library.
        let name = unsafe { CStr::from_ptr(cublasGetStatusName(self.0)) };
        let desc = unsafe { CStr::from_ptr(cublasGetStatusString(self.0)) };
        write!(
            f,
            "{}: {}",
            name.to_string_lossy(),
            desc.to_string_lossy()
        )
    }
}

impl Error for CublasError {}
