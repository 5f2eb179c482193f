use crate::bindings::{cublasComputeType_t, cudaDataType};
use half::f16;
use std::{ffi::c_void, marker::PhantomData};

/// Element types cublas multiplies, with the scalar type alpha and beta are given in.
pub trait GemmType: Copy + 'static {
    type Scalar: Copy;
    const DATA_TYPE: cudaDataType;
    const COMPUTE_TYPE: cublasComputeType_t;

    fn scalar(x: f64) -> Self::Scalar;
}

macro_rules! impl_gemm_type {
    ($ty:ty => $data:ident; $scalar:ty => $compute:ident) => {
        impl GemmType for $ty {
            type Scalar = $scalar;
            const DATA_TYPE: cudaDataType = cudaDataType::$data;
            const COMPUTE_TYPE: cublasComputeType_t = cublasComputeType_t::$compute;

            #[inline]
            fn scalar(x: f64) -> Self::Scalar {
                x as _
            }
        }
    };
}

impl_gemm_type!(f16 => CUDA_R_16F; f32 => CUBLAS_COMPUTE_32F);
impl_gemm_type!(f32 => CUDA_R_32F; f32 => CUBLAS_COMPUTE_32F);
impl_gemm_type!(f64 => CUDA_R_64F; f64 => CUBLAS_COMPUTE_64F);

pub trait Computation {
    fn a_type(&self) -> cudaDataType;
    fn b_type(&self) -> cudaDataType;
    fn c_type(&self) -> cudaDataType;
    fn compute_type(&self) -> cublasComputeType_t;
    fn alpha(&self) -> &c_void;
    fn beta(&self) -> &c_void;
}

/// Scale factors of a gemm on `T` elements.
#[derive(Clone, Copy)]
pub struct GemmScheme<T: GemmType> {
    alpha: T::Scalar,
    beta: T::Scalar,
    _phantom: PhantomData<T>,
}

impl<T: GemmType> GemmScheme<T> {
    #[inline]
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self {
            alpha: T::scalar(alpha),
            beta: T::scalar(beta),
            _phantom: PhantomData,
        }
    }
}

impl<T: GemmType> Computation for GemmScheme<T> {
    #[inline]
    fn a_type(&self) -> cudaDataType {
        T::DATA_TYPE
    }
    #[inline]
    fn b_type(&self) -> cudaDataType {
        T::DATA_TYPE
    }
    #[inline]
    fn c_type(&self) -> cudaDataType {
        T::DATA_TYPE
    }
    #[inline]
    fn compute_type(&self) -> cublasComputeType_t {
        T::COMPUTE_TYPE
    }
    #[inline]
    fn alpha(&self) -> &c_void {
        unsafe { &*(&raw const self.alpha).cast() }
    }
    #[inline]
    fn beta(&self) -> &c_void {
        unsafe { &*(&raw const self.beta).cast() }
    }
}
