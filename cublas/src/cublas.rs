use crate::{
    CublasError, Computation,
    bindings::{cublasHandle_t, cublasOperation_t, cublasStatus_t},
};
use cuda::{AsRaw, CurrentCtx, DevByte, Stream};
use std::{ffi::c_int, marker::PhantomData, ptr::null_mut};

/// A cublas handle created in a context, usable while that context is current.
pub struct Cublas<'ctx>(cublasHandle_t, PhantomData<&'ctx CurrentCtx>);

impl Drop for Cublas<'_> {
    #[inline]
    fn drop(&mut self) {
        cublas!(cublasDestroy_v2(self.0));
    }
}

impl AsRaw for Cublas<'_> {
    type Raw = cublasHandle_t;
    #[inline]
    unsafe fn as_raw(&self) -> Self::Raw {
        self.0
    }
}

impl<'ctx> Cublas<'ctx> {
    #[inline]
    pub fn new(_ctx: &'ctx CurrentCtx) -> Self {
        let mut handle = null_mut();
        cublas!(cublasCreate_v2(&mut handle));
        Self(handle, PhantomData)
    }

    /// Creates a handle which enqueues all its work on `stream`.
    #[inline]
    pub fn bind(stream: &Stream<'ctx>) -> Self {
        let mut ans = Self::new(stream.ctx());
        ans.set_stream(stream);
        ans
    }

    #[inline]
    pub fn set_stream(&mut self, stream: &Stream) {
        cublas!(cublasSetStream_v2(self.0, stream.as_raw().cast()));
    }

    /// `c <- alpha * op(a) * op(b) + beta * c` in column-major order.
    ///
    /// Arguments are checked by the library; an invalid combination, or a
    /// dimension out of `c_int` range, is reported as an error without touching `c`.
    ///
    /// # Safety
    ///
    /// The pointers must address device-accessible memory large enough for
    /// the given shape and leading dimensions, and stay alive until the
    /// enqueued work completes.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn gemm(
        &self,
        m: usize,
        n: usize,
        k: usize,
        scalar: impl Computation,
        a: *const DevByte,
        trans_a: bool,
        lda: usize,
        b: *const DevByte,
        trans_b: bool,
        ldb: usize,
        c: *mut DevByte,
        ldc: usize,
    ) -> Result<(), CublasError> {
        let int = |x: usize| {
            c_int::try_from(x)
                .map_err(|_| CublasError(cublasStatus_t::CUBLAS_STATUS_INVALID_VALUE))
        };
        let (m, n, k) = (int(m)?, int(n)?, int(k)?);
        let (lda, ldb, ldc) = (int(lda)?, int(ldb)?, int(ldc)?);
        let status = unsafe {
            crate::bindings::cublasGemmEx(
                self.0,
                op(trans_a),
                op(trans_b),
                m,
                n,
                k,
                scalar.alpha(),
                a.cast(),
                scalar.a_type(),
                lda,
                b.cast(),
                scalar.b_type(),
                ldb,
                scalar.beta(),
                c.cast(),
                scalar.c_type(),
                ldc,
                scalar.compute_type(),
                crate::bindings::cublasGemmAlgo_t::CUBLAS_GEMM_DEFAULT,
            )
        };
        CublasError::check(status)
    }
}

fn op(trans: bool) -> cublasOperation_t {
    if trans {
        cublasOperation_t::CUBLAS_OP_T
    } else {
        cublasOperation_t::CUBLAS_OP_N
    }
}
