use crate::{Cublas, CublasError, GemmScheme, bindings::cublasStatus_t};
use cuda::Device;
use half::f16;

#[test]
fn test_compute() {
    if let Err(cuda::NoDevice) = cuda::init() {
        return;
    }

    Device::new(0).retain_primary().apply(|ctx| {
        // |10 10|    |1 1 1 1|   |1 1|
        // |20 20| <- |2 2 2 2| · |2 2|
        // |30 30|    |3 3 3 3|   |3 3|
        //                        |4 4|
        let a: [f32; 12] = std::array::from_fn(|i| (i % 3 + 1) as _);
        let b: [f32; 8] = std::array::from_fn(|i| (i % 4 + 1) as _);

        let stream = ctx.stream();
        let a = stream.from_host(&a).unwrap();
        let b = stream.from_host(&b).unwrap();
        let mut c = stream.from_host(&[0.0f32; 6]).unwrap();
        let blas = Cublas::bind(&stream);

        let mut run = |beta| unsafe {
            blas.gemm(
                3,
                2,
                4,
                GemmScheme::<f32>::new(1., beta),
                a.as_ptr(),
                false,
                3,
                b.as_ptr(),
                false,
                4,
                c.as_mut_ptr(),
                3,
            )
        };
        run(0.).unwrap();
        run(1.).unwrap();
        stream.synchronize().unwrap();

        let mut host = [0.0f32; 6];
        c.copy_out(&mut host).unwrap();
        assert_eq!(host, [20., 40., 60., 20., 40., 60.]);
    })
}

#[test]
fn test_half() {
    if let Err(cuda::NoDevice) = cuda::init() {
        return;
    }

    Device::new(0).retain_primary().apply(|ctx| {
        let a = [f16::ONE; 4];
        let b = [f16::from_f32(2.); 4];

        let stream = ctx.stream();
        let a = stream.from_host(&a).unwrap();
        let b = stream.from_host(&b).unwrap();
        let mut c = stream.malloc::<f16>(4).unwrap();
        let blas = Cublas::bind(&stream);
        unsafe {
            blas.gemm(
                2,
                2,
                2,
                GemmScheme::<f16>::new(1., 0.),
                a.as_ptr(),
                false,
                2,
                b.as_ptr(),
                true,
                2,
                c.as_mut_ptr(),
                2,
            )
        }
        .unwrap();
        stream.synchronize().unwrap();

        let mut host = [f16::ZERO; 4];
        c.copy_out(&mut host).unwrap();
        assert!(host.iter().all(|x| x.to_f32() == 4.));
    })
}

#[test]
fn test_invalid_leading_dimension() {
    if let Err(cuda::NoDevice) = cuda::init() {
        return;
    }

    Device::new(0).retain_primary().apply(|ctx| {
        let stream = ctx.stream();
        let a = stream.malloc::<f64>(16).unwrap();
        let b = stream.malloc::<f64>(16).unwrap();
        let mut c = stream.malloc::<f64>(16).unwrap();
        let blas = Cublas::bind(&stream);
        // lda < m
        let err = unsafe {
            blas.gemm(
                4,
                4,
                4,
                GemmScheme::<f64>::new(1., 0.),
                a.as_ptr(),
                false,
                2,
                b.as_ptr(),
                false,
                4,
                c.as_mut_ptr(),
                4,
            )
        }
        .unwrap_err();
        assert_eq!(
            err,
            CublasError(cublasStatus_t::CUBLAS_STATUS_INVALID_VALUE)
        );
        assert!(err.to_string().contains("CUBLAS_STATUS_INVALID_VALUE"));
    })
}

#[test]
fn test_dimension_out_of_range() {
    if let Err(cuda::NoDevice) = cuda::init() {
        return;
    }

    Device::new(0).retain_primary().apply(|ctx| {
        let stream = ctx.stream();
        let a = stream.malloc::<f32>(4).unwrap();
        let b = stream.malloc::<f32>(4).unwrap();
        let mut c = stream.malloc::<f32>(4).unwrap();
        let blas = Cublas::bind(&stream);
        // would wrap to m = 1 if narrowed
        let m = (1usize << 32) + 1;
        let err = unsafe {
            blas.gemm(
                m,
                1,
                1,
                GemmScheme::<f32>::new(1., 0.),
                a.as_ptr(),
                false,
                m,
                b.as_ptr(),
                false,
                1,
                c.as_mut_ptr(),
                m,
            )
        }
        .unwrap_err();
        assert_eq!(
            err,
            CublasError(cublasStatus_t::CUBLAS_STATUS_INVALID_VALUE)
        );
        stream.synchronize().unwrap();
    })
}
