use crate::{
    AsyncHandler, Element, GemmShape, Operand, Queue, QueueError, ShapeError,
    default_async_handler,
};
use gemm::{Parallelism, gemm};
use std::{
    num::NonZeroUsize,
    ops::{Deref, DerefMut},
    thread::available_parallelism,
};

/// Hardware threads the host queue uses by default.
pub fn host_threads() -> usize {
    available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Device name of a host queue running on `threads` threads.
pub fn host_name(threads: usize) -> String {
    format!("host cpu ({threads} threads)")
}

/// Runs gemm on the host cpu, synchronously.
pub struct HostQueue {
    threads: usize,
    handler: AsyncHandler,
}

impl Default for HostQueue {
    fn default() -> Self {
        Self::new(default_async_handler())
    }
}

impl HostQueue {
    /// A queue using every available hardware thread.
    pub fn new(handler: AsyncHandler) -> Self {
        Self::with_threads(host_threads(), handler)
    }

    pub fn with_threads(threads: usize, handler: AsyncHandler) -> Self {
        Self {
            threads: threads.max(1),
            handler,
        }
    }

    #[inline]
    pub fn threads(&self) -> usize {
        self.threads
    }

    fn parallelism(&self) -> Parallelism {
        if self.threads > 1 {
            Parallelism::Rayon(self.threads)
        } else {
            Parallelism::None
        }
    }
}

/// Host memory standing for a device buffer.
#[derive(Clone, PartialEq, Debug)]
pub struct HostBuffer<T>(Vec<T>);

/// Host memory standing for shared memory, owned exactly once and freed on drop.
#[derive(PartialEq, Debug)]
pub struct HostShared<T>(Box<[T]>);

impl<T> HostShared<T> {
    #[inline]
    pub fn count(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn size(&self) -> usize {
        size_of_val(&*self.0)
    }
}

impl<T> Deref for HostShared<T> {
    type Target = [T];
    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for HostShared<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

macro_rules! impl_operand {
    ($ty:ident) => {
        impl<T> Operand<T> for $ty<T> {
            #[inline]
            fn len(&self) -> usize {
                self.0.len()
            }
            #[inline]
            fn as_ptr(&self) -> *const T {
                self.0.as_ptr()
            }
            #[inline]
            fn as_mut_ptr(&mut self) -> *mut T {
                self.0.as_mut_ptr()
            }
        }
    };
}

impl_operand!(HostBuffer);
impl_operand!(HostShared);

fn try_zeroed<T: Element>(count: usize) -> Result<Vec<T>, QueueError> {
    let mut vec = Vec::new();
    vec.try_reserve_exact(count)
        .map_err(|_| QueueError::HostAlloc(count))?;
    vec.resize(count, T::zero());
    Ok(vec)
}

impl Queue for HostQueue {
    type Buffer<T: Element> = HostBuffer<T>;
    type Shared<T: Element> = HostShared<T>;

    fn name(&self) -> String {
        host_name(self.threads)
    }

    fn async_handler(&self) -> &AsyncHandler {
        &self.handler
    }

    fn upload<T: Element>(&self, host: &[T]) -> Result<Self::Buffer<T>, QueueError> {
        let mut vec = try_zeroed(host.len())?;
        vec.copy_from_slice(host);
        Ok(HostBuffer(vec))
    }

    fn download<T: Element>(
        &self,
        buffer: &Self::Buffer<T>,
        host: &mut [T],
    ) -> Result<(), QueueError> {
        if host.len() != buffer.0.len() {
            return Err(ShapeError::LengthMismatch {
                len: host.len(),
                expected: buffer.0.len(),
            }
            .into());
        }
        host.copy_from_slice(&buffer.0);
        Ok(())
    }

    fn malloc_shared<T: Element>(&self, count: usize) -> Result<Self::Shared<T>, QueueError> {
        try_zeroed(count).map(|vec| HostShared(vec.into_boxed_slice()))
    }

    unsafe fn gemm_unchecked<T: Element>(
        &self,
        shape: &GemmShape,
        alpha: f64,
        beta: f64,
        a: *const T,
        b: *const T,
        c: *mut T,
    ) -> Result<(), QueueError> {
        let &GemmShape {
            m,
            n,
            k,
            trans_a,
            trans_b,
            lda,
            ldb,
            ldc,
        } = shape;
        if m == 0 || n == 0 {
            return Ok(());
        }
        if k == 0 {
            // op(a) * op(b) is all zeros, only the scaling of c is left
            for j in 0..n {
                for i in 0..m {
                    let x = unsafe { &mut *c.add(i + j * ldc) };
                    *x = if beta == 0. {
                        T::zero()
                    } else {
                        T::from_f64(beta * x.to_f64())
                    };
                }
            }
            return Ok(());
        }

        // (column stride, row stride) of a column-major operand
        let strides = |ld: usize, trans: bool| {
            if trans { (1, ld as isize) } else { (ld as isize, 1) }
        };
        let (lhs_cs, lhs_rs) = strides(lda, trans_a);
        let (rhs_cs, rhs_rs) = strides(ldb, trans_b);

        // gemm computes dst <- alpha * dst + beta * lhs * rhs
        unsafe {
            gemm(
                m,
                n,
                k,
                c,
                ldc as isize,
                1,
                beta != 0.,
                a,
                lhs_cs,
                lhs_rs,
                b,
                rhs_cs,
                rhs_rs,
                T::from_f64(beta),
                T::from_f64(alpha),
                false,
                false,
                false,
                self.parallelism(),
            )
        }
        Ok(())
    }

    fn wait(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{HostQueue, default_async_handler, host_name, host_threads};
    use crate::{Element, GemmShape, Operand, Queue, QueueError, ShapeError, fill_rand};
    use half::f16;
    use rand::{SeedableRng, rngs::StdRng};

    /// Straightforward column-major gemm to compare with.
    fn reference(shape: &GemmShape, alpha: f64, beta: f64, a: &[f64], b: &[f64], c: &mut [f64]) {
        let at = |i: usize, l: usize| {
            if shape.trans_a {
                a[l + i * shape.lda]
            } else {
                a[i + l * shape.lda]
            }
        };
        let bt = |l: usize, j: usize| {
            if shape.trans_b {
                b[j + l * shape.ldb]
            } else {
                b[l + j * shape.ldb]
            }
        };
        for j in 0..shape.n {
            for i in 0..shape.m {
                let sum = (0..shape.k).map(|l| at(i, l) * bt(l, j)).sum::<f64>();
                let c = &mut c[i + j * shape.ldc];
                *c = alpha * sum + if beta == 0. { 0. } else { beta * *c };
            }
        }
    }

    fn check<T: Element>(shape: GemmShape, alpha: f64, beta: f64, tolerance: f64) {
        let queue = HostQueue::with_threads(2, default_async_handler());
        let mut rng = StdRng::seed_from_u64(7);
        let (_, a_cols) = shape.a_stored();
        let (_, b_cols) = shape.b_stored();

        let mut a = queue.malloc_shared::<T>(shape.lda * a_cols).unwrap();
        let mut b = queue.malloc_shared::<T>(shape.ldb * b_cols).unwrap();
        let mut c = queue.malloc_shared::<T>(shape.ldc * shape.n).unwrap();
        fill_rand(&mut a, &mut rng);
        fill_rand(&mut b, &mut rng);
        fill_rand(&mut c, &mut rng);

        let to_f64 = |x: &[T]| x.iter().map(|x| x.to_f64()).collect::<Vec<_>>();
        let mut expected = to_f64(&c[..]);
        reference(&shape, alpha, beta, &to_f64(&a[..]), &to_f64(&b[..]), &mut expected);

        queue.gemm(&shape, alpha, beta, &a, &b, &mut c).unwrap();
        assert_eq!(queue.wait_and_throw(), 0);

        for (i, (x, y)) in c.iter().zip(&expected).enumerate() {
            let x = x.to_f64();
            assert!(
                (x - y).abs() <= tolerance * y.abs().max(1.),
                "{} mismatch at {i}: {x} vs {y}",
                T::NAME,
            );
        }
    }

    #[test]
    fn test_square() {
        check::<f64>(GemmShape::square(17), 1., 0., 1e-12);
        check::<f32>(GemmShape::square(33), 1., 0., 1e-5);
        check::<f16>(GemmShape::square(8), 1., 0., 1e-2);
    }

    #[test]
    fn test_scaled_accumulate() {
        check::<f64>(GemmShape::square(9), 0.5, 2., 1e-12);
        check::<f32>(GemmShape::square(12), -1., 1., 1e-5);
    }

    #[test]
    fn test_transposed_padded() {
        let shape = GemmShape {
            m: 5,
            n: 3,
            k: 4,
            trans_a: true,
            trans_b: true,
            lda: 6,
            ldb: 4,
            ldc: 7,
        };
        check::<f64>(shape, 1.5, 0.25, 1e-12);
        let shape = GemmShape {
            trans_a: false,
            lda: 5,
            ..shape
        };
        check::<f32>(shape, 1., 0., 1e-5);
    }

    #[test]
    fn test_beta_zero_ignores_c() {
        let queue = HostQueue::with_threads(1, default_async_handler());
        let shape = GemmShape::square(2);
        let a = queue.upload(&[1.0f32, 2., 3., 4.]).unwrap();
        let b = queue.upload(&[1.0f32, 0., 0., 1.]).unwrap();
        let mut c = queue.upload(&[f32::NAN; 4]).unwrap();
        queue.gemm_buffer(&shape, 1., 0., &a, &b, &mut c).unwrap();

        let mut host = [0.0f32; 4];
        queue.download(&c, &mut host).unwrap();
        assert_eq!(host, [1., 2., 3., 4.]);
    }

    #[test]
    fn test_empty_inner_dimension() {
        let queue = HostQueue::default();
        let shape = GemmShape {
            k: 0,
            ..GemmShape::square(2)
        };
        let a = queue.upload::<f64>(&[]).unwrap();
        let b = queue.upload::<f64>(&[]).unwrap();
        let mut c = queue.upload(&[1., 2., 3., 4.]).unwrap();
        queue.gemm_buffer(&shape, 1., 3., &a, &b, &mut c).unwrap();

        let mut host = [0.; 4];
        queue.download(&c, &mut host).unwrap();
        assert_eq!(host, [3., 6., 9., 12.]);
    }

    #[test]
    fn test_rejects_small_operand() {
        let queue = HostQueue::default();
        let a = queue.malloc_shared::<f32>(16).unwrap();
        let b = queue.malloc_shared::<f32>(15).unwrap();
        let mut c = queue.malloc_shared::<f32>(16).unwrap();
        let err = queue
            .gemm(&GemmShape::square(4), 1., 0., &a, &b, &mut c)
            .unwrap_err();
        assert!(matches!(err, QueueError::Shape(_)));
        assert!(c.iter().all(|&x| x == 0.));
    }

    #[test]
    fn test_download_length_mismatch() {
        let queue = HostQueue::default();
        let buffer = queue.upload(&[1.0f32; 4]).unwrap();

        let mut short = [0.0f32; 3];
        let err = queue.download(&buffer, &mut short).unwrap_err();
        assert!(matches!(
            err,
            QueueError::Shape(ShapeError::LengthMismatch {
                len: 3,
                expected: 4
            })
        ));
        assert_eq!(short, [0.; 3]);

        let mut long = [0.0f32; 5];
        assert!(queue.download(&buffer, &mut long).is_err());

        let mut exact = [0.0f32; 4];
        queue.download(&buffer, &mut exact).unwrap();
        assert_eq!(exact, [1.; 4]);
    }

    #[test]
    fn test_name() {
        assert_eq!(HostQueue::default().name(), host_name(host_threads()));
        assert_eq!(host_name(3), "host cpu (3 threads)");
    }

    #[test]
    fn test_shared_memory() {
        let queue = HostQueue::with_threads(0, default_async_handler());
        assert_eq!(queue.threads(), 1);
        assert!(queue.name().starts_with("host"));

        let mut shared = queue.malloc_shared::<f64>(10).unwrap();
        assert_eq!(shared.count(), 10);
        assert_eq!(shared.size(), 80);
        assert_eq!(shared.len(), 10);
        assert!(shared.iter().all(|&x| x == 0.));
        shared[3] = 1.;
        assert_eq!(Operand::len(&shared), 10);
        assert_eq!(unsafe { *shared.as_ptr().add(3) }, 1.);

        let empty = queue.malloc_shared::<f32>(0).unwrap();
        assert!(Operand::is_empty(&empty));
    }
}
