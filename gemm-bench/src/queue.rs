use crate::Element;
use std::{ops::DerefMut, time::Duration};
use thiserror::Error;

/// Matrix memory a queue can hand to its gemm.
pub trait Operand<T> {
    /// Number of elements.
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn as_ptr(&self) -> *const T;
    fn as_mut_ptr(&mut self) -> *mut T;
}

/// Receives the errors raised asynchronously by enqueued work.
pub type AsyncHandler = Box<dyn Fn(&[QueueError]) + Send + Sync>;

/// Logs every asynchronous error and carries on.
pub fn default_async_handler() -> AsyncHandler {
    Box::new(|errors: &[QueueError]| {
        for e in errors {
            log::warn!("Caught asynchronous {} error: {e}", e.kind())
        }
    })
}

/// An execution queue on one device, with the vendor blas bound to it.
pub trait Queue {
    /// Device memory filled from, and read back into, host memory.
    type Buffer<T: Element>: Operand<T>;
    /// Memory both host and device address directly.
    type Shared<T: Element>: Operand<T> + DerefMut<Target = [T]>;

    fn name(&self) -> String;
    fn async_handler(&self) -> &AsyncHandler;

    fn upload<T: Element>(&self, host: &[T]) -> Result<Self::Buffer<T>, QueueError>;
    fn download<T: Element>(
        &self,
        buffer: &Self::Buffer<T>,
        host: &mut [T],
    ) -> Result<(), QueueError>;
    /// Zero-initialized shared memory of `count` elements.
    fn malloc_shared<T: Element>(&self, count: usize) -> Result<Self::Shared<T>, QueueError>;

    /// Enqueues `c <- alpha * op(a) * op(b) + beta * c` in column-major order.
    ///
    /// # Safety
    ///
    /// The pointers must come from memory of this queue holding at least as
    /// many elements as `shape` requires, and stay valid until the work completes.
    unsafe fn gemm_unchecked<T: Element>(
        &self,
        shape: &GemmShape,
        alpha: f64,
        beta: f64,
        a: *const T,
        b: *const T,
        c: *mut T,
    ) -> Result<(), QueueError>;

    /// Blocks until all enqueued work is done.
    fn wait(&self) -> Result<(), QueueError>;

    /// Runs `f` and measures it on the device clock, if the device has one.
    fn device_span<R>(&self, f: impl FnOnce() -> R) -> (R, Option<Duration>) {
        (f(), None)
    }

    /// Checked [`Queue::gemm_unchecked`].
    fn gemm<T: Element>(
        &self,
        shape: &GemmShape,
        alpha: f64,
        beta: f64,
        a: &Self::Shared<T>,
        b: &Self::Shared<T>,
        c: &mut Self::Shared<T>,
    ) -> Result<(), QueueError> {
        gemm_checked(self, shape, alpha, beta, a, b, c)
    }

    /// Checked [`Queue::gemm_unchecked`] on buffers.
    fn gemm_buffer<T: Element>(
        &self,
        shape: &GemmShape,
        alpha: f64,
        beta: f64,
        a: &Self::Buffer<T>,
        b: &Self::Buffer<T>,
        c: &mut Self::Buffer<T>,
    ) -> Result<(), QueueError> {
        gemm_checked(self, shape, alpha, beta, a, b, c)
    }

    /// Waits and hands any error to the async handler.
    ///
    /// Returns the number of errors handled.
    fn wait_and_throw(&self) -> usize {
        match self.wait() {
            Ok(()) => 0,
            Err(e) => {
                (self.async_handler())(std::slice::from_ref(&e));
                1
            }
        }
    }
}

fn gemm_checked<Q: Queue + ?Sized, T: Element>(
    queue: &Q,
    shape: &GemmShape,
    alpha: f64,
    beta: f64,
    a: &impl Operand<T>,
    b: &impl Operand<T>,
    c: &mut impl Operand<T>,
) -> Result<(), QueueError> {
    shape.check(a.len(), b.len(), c.len())?;
    unsafe { queue.gemm_unchecked(shape, alpha, beta, a.as_ptr(), b.as_ptr(), c.as_mut_ptr()) }
}

/// Dimensions and layout of `c <- alpha * op(a) * op(b) + beta * c`,
/// column-major, with `op(a)` of `m x k` and `op(b)` of `k x n`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GemmShape {
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub trans_a: bool,
    pub trans_b: bool,
    pub lda: usize,
    pub ldb: usize,
    pub ldc: usize,
}

impl GemmShape {
    /// Square `size x size` operands, none transposed, densely packed.
    pub const fn square(size: usize) -> Self {
        Self {
            m: size,
            n: size,
            k: size,
            trans_a: false,
            trans_b: false,
            lda: size,
            ldb: size,
            ldc: size,
        }
    }

    /// Rows and columns of `a` as stored.
    pub const fn a_stored(&self) -> (usize, usize) {
        if self.trans_a {
            (self.k, self.m)
        } else {
            (self.m, self.k)
        }
    }

    /// Rows and columns of `b` as stored.
    pub const fn b_stored(&self) -> (usize, usize) {
        if self.trans_b {
            (self.n, self.k)
        } else {
            (self.k, self.n)
        }
    }

    /// Floating-point operations of one gemm: `k` products and `k - 1` sums per element of `c`.
    pub fn operations(&self) -> Option<u64> {
        let per_element = (self.k as u64).checked_mul(2)?.saturating_sub(1);
        (self.m as u64)
            .checked_mul(self.n as u64)?
            .checked_mul(per_element)
    }

    /// Validates dimensions, leading dimensions and operand lengths.
    ///
    /// Every dimension must fit the 32-bit integers blas takes.
    pub fn check(&self, a_len: usize, b_len: usize, c_len: usize) -> Result<(), ShapeError> {
        let dims = [
            ("m", self.m),
            ("n", self.n),
            ("k", self.k),
            ("lda", self.lda),
            ("ldb", self.ldb),
            ("ldc", self.ldc),
        ];
        for (name, value) in dims {
            if i32::try_from(value).is_err() {
                return Err(ShapeError::DimensionTooLarge { name, value });
            }
        }
        let operands = [
            ('A', self.a_stored(), self.lda, a_len),
            ('B', self.b_stored(), self.ldb, b_len),
            ('C', (self.m, self.n), self.ldc, c_len),
        ];
        for (operand, (rows, cols), ld, len) in operands {
            if ld < rows.max(1) {
                return Err(ShapeError::LeadingDimension {
                    operand,
                    ld,
                    min: rows.max(1),
                });
            }
            let required = footprint(rows, cols, ld).ok_or(ShapeError::Overflow)?;
            if len < required {
                return Err(ShapeError::OperandTooSmall {
                    operand,
                    len,
                    required,
                });
            }
        }
        Ok(())
    }
}

/// Elements spanned by a column-major `rows x cols` matrix with leading dimension `ld`.
fn footprint(rows: usize, cols: usize, ld: usize) -> Option<usize> {
    if rows == 0 || cols == 0 {
        Some(0)
    } else {
        ld.checked_mul(cols - 1)?.checked_add(rows)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum ShapeError {
    #[error("leading dimension of {operand} is {ld}, must be at least {min}")]
    LeadingDimension { operand: char, ld: usize, min: usize },
    #[error("{operand} holds {len} elements, the shape requires {required}")]
    OperandTooSmall {
        operand: char,
        len: usize,
        required: usize,
    },
    #[error("matrix footprint overflows usize")]
    Overflow,
    #[error("{name} = {value} does not fit in a 32-bit blas integer")]
    DimensionTooLarge { name: &'static str, value: usize },
    #[error("host slice holds {len} elements, the buffer {expected}")]
    LengthMismatch { len: usize, expected: usize },
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[cfg(nvidia)]
    #[error(transparent)]
    Driver(#[from] cuda::DriverError),
    #[cfg(nvidia)]
    #[error(transparent)]
    Blas(#[from] cublas::CublasError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error("failed to allocate {0} elements on host")]
    HostAlloc(usize),
}

impl QueueError {
    /// Class of the failure, for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            #[cfg(nvidia)]
            Self::Driver(_) => "runtime",
            #[cfg(nvidia)]
            Self::Blas(_) => "blas",
            Self::Shape(_) => "argument",
            Self::HostAlloc(_) => "allocation",
        }
    }
}
