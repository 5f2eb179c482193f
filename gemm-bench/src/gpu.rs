use crate::{AsyncHandler, Element, GemmShape, Operand, Queue, QueueError, ShapeError};
use cublas::{Cublas, GemmScheme};
use cuda::{CurrentCtx, DevMem, SharedMem, Stream};
use std::{marker::PhantomData, time::Duration};

/// A stream on a cuda device with a cublas handle bound to it.
pub struct CudaQueue<'ctx> {
    // destroyed before the stream it enqueues on
    blas: Cublas<'ctx>,
    stream: Stream<'ctx>,
    handler: AsyncHandler,
}

impl<'ctx> CudaQueue<'ctx> {
    pub fn new(ctx: &'ctx CurrentCtx, handler: AsyncHandler) -> Self {
        let stream = ctx.stream();
        Self {
            blas: Cublas::bind(&stream),
            stream,
            handler,
        }
    }
}

/// Typed device memory.
pub struct GpuBuffer<'ctx, T> {
    mem: DevMem<'ctx>,
    len: usize,
    _phantom: PhantomData<T>,
}

impl<T> Operand<T> for GpuBuffer<'_, T> {
    #[inline]
    fn len(&self) -> usize {
        self.len
    }
    #[inline]
    fn as_ptr(&self) -> *const T {
        self.mem.as_ptr().cast()
    }
    #[inline]
    fn as_mut_ptr(&mut self) -> *mut T {
        self.mem.as_mut_ptr().cast()
    }
}

impl<T> Operand<T> for SharedMem<'_, T> {
    #[inline]
    fn len(&self) -> usize {
        self.count()
    }
    #[inline]
    fn as_ptr(&self) -> *const T {
        self.as_dev_ptr().cast()
    }
    #[inline]
    fn as_mut_ptr(&mut self) -> *mut T {
        self.as_dev_mut_ptr().cast()
    }
}

impl<'ctx> Queue for CudaQueue<'ctx> {
    type Buffer<T: Element> = GpuBuffer<'ctx, T>;
    type Shared<T: Element> = SharedMem<'ctx, T>;

    fn name(&self) -> String {
        self.stream.ctx().dev().name()
    }

    fn async_handler(&self) -> &AsyncHandler {
        &self.handler
    }

    fn upload<T: Element>(&self, host: &[T]) -> Result<Self::Buffer<T>, QueueError> {
        Ok(GpuBuffer {
            mem: self.stream.from_host(host)?,
            len: host.len(),
            _phantom: PhantomData,
        })
    }

    fn download<T: Element>(
        &self,
        buffer: &Self::Buffer<T>,
        host: &mut [T],
    ) -> Result<(), QueueError> {
        if host.len() != buffer.len {
            return Err(ShapeError::LengthMismatch {
                len: host.len(),
                expected: buffer.len,
            }
            .into());
        }
        self.stream.synchronize()?;
        buffer.mem.copy_out(host)?;
        Ok(())
    }

    fn malloc_shared<T: Element>(&self, count: usize) -> Result<Self::Shared<T>, QueueError> {
        Ok(self.stream.ctx().malloc_shared(count)?)
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
        unsafe {
            self.blas.gemm(
                m,
                n,
                k,
                GemmScheme::<T>::new(alpha, beta),
                a.cast(),
                trans_a,
                lda,
                b.cast(),
                trans_b,
                ldb,
                c.cast(),
                ldc,
            )
        }?;
        Ok(())
    }

    fn wait(&self) -> Result<(), QueueError> {
        Ok(self.stream.synchronize()?)
    }

    fn device_span<R>(&self, f: impl FnOnce() -> R) -> (R, Option<Duration>) {
        let start = self.stream.record();
        let ans = f();
        let end = self.stream.record();
        let elapsed = end
            .synchronize()
            .and_then(|()| end.elapse_from(&start))
            .inspect_err(|e| log::warn!("device timing unavailable: {e}"))
            .ok();
        (ans, elapsed)
    }
}

#[cfg(test)]
mod test {
    use super::CudaQueue;
    use crate::{GemmShape, Operand, Queue, QueueError, ShapeError, default_async_handler};

    fn with_queue(f: impl FnOnce(&CudaQueue)) {
        if let Err(cuda::NoDevice) = cuda::init() {
            return;
        }
        cuda::Device::new(0)
            .retain_primary()
            .apply(|ctx| f(&CudaQueue::new(ctx, default_async_handler())))
    }

    // |10 10|    |1 1 1 1|   |1 1|
    // |20 20| <- |2 2 2 2| · |2 2|
    // |30 30|    |3 3 3 3|   |3 3|
    //                        |4 4|
    const SHAPE: GemmShape = GemmShape {
        m: 3,
        n: 2,
        k: 4,
        trans_a: false,
        trans_b: false,
        lda: 3,
        ldb: 4,
        ldc: 3,
    };

    fn lhs() -> [f32; 12] {
        std::array::from_fn(|i| (i % 3 + 1) as _)
    }

    fn rhs() -> [f32; 8] {
        std::array::from_fn(|i| (i % 4 + 1) as _)
    }

    #[test]
    fn test_buffer_gemm() {
        with_queue(|queue| {
            let a = queue.upload(&lhs()).unwrap();
            let b = queue.upload(&rhs()).unwrap();
            let mut c = queue.upload(&[1.0f32; 6]).unwrap();
            queue.gemm_buffer(&SHAPE, 1., 0., &a, &b, &mut c).unwrap();
            queue.gemm_buffer(&SHAPE, 1., 1., &a, &b, &mut c).unwrap();
            assert_eq!(queue.wait_and_throw(), 0);

            let mut host = [0.0f32; 6];
            queue.download(&c, &mut host).unwrap();
            assert_eq!(host, [20., 40., 60., 20., 40., 60.]);

            let mut short = [0.0f32; 5];
            assert!(matches!(
                queue.download(&c, &mut short),
                Err(QueueError::Shape(ShapeError::LengthMismatch {
                    len: 5,
                    expected: 6
                }))
            ));
        })
    }

    #[test]
    fn test_shared_gemm() {
        with_queue(|queue| {
            if !queue.stream.ctx().dev().supports_managed_memory() {
                return;
            }
            let mut a = queue.malloc_shared::<f32>(12).unwrap();
            let mut b = queue.malloc_shared::<f32>(8).unwrap();
            let mut c = queue.malloc_shared::<f32>(6).unwrap();
            a.copy_from_slice(&lhs());
            b.copy_from_slice(&rhs());
            assert_eq!(Operand::len(&c), 6);

            let (result, span) =
                queue.device_span(|| queue.gemm(&SHAPE, 2., 0., &a, &b, &mut c));
            result.unwrap();
            assert!(span.is_some());
            assert_eq!(queue.wait_and_throw(), 0);
            assert_eq!(&c[..], [20., 40., 60., 20., 40., 60.]);
        })
    }

    #[test]
    fn test_rejects_small_operand() {
        with_queue(|queue| {
            let a = queue.upload(&lhs()).unwrap();
            let b = queue.upload(&rhs()[..7]).unwrap();
            let mut c = queue.upload(&[0.0f32; 6]).unwrap();
            let err = queue
                .gemm_buffer(&SHAPE, 1., 0., &a, &b, &mut c)
                .unwrap_err();
            assert!(matches!(
                err,
                QueueError::Shape(ShapeError::OperandTooSmall { operand: 'B', .. })
            ));
            assert_eq!(err.kind(), "argument");
            assert_eq!(queue.wait_and_throw(), 0);
        })
    }
}
