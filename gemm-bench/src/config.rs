use crate::GemmShape;
use clap::{Parser, ValueEnum};
use std::fmt;
use thiserror::Error;

/// Where the matrices live while they are multiplied.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MemoryMode {
    /// Filled on host, copied to device memory before timing and back after it.
    Buffer,
    /// Allocated as shared memory, filled in place.
    Shared,
}

impl fmt::Display for MemoryMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Buffer => "buffer",
            Self::Shared => "shared",
        })
    }
}

#[derive(ValueEnum, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DType {
    F16,
    F32,
    F64,
}

/// Times repeated calls to the vendor blas gemm on square matrices and reports GFLOPS.
#[derive(Parser, Clone, PartialEq, Debug)]
#[clap(version)]
pub struct Args {
    /// Rows and columns of A, B and C; bound by the device memory
    #[clap(default_value_t = 16384)]
    pub size: usize,
    /// Number of timed gemm calls
    #[clap(short, long, default_value_t = 30)]
    pub laps: usize,
    /// Untimed gemm calls before the timed ones
    #[clap(long, default_value_t = 0)]
    pub warm_up: usize,
    #[clap(long, default_value_t = 1.)]
    pub alpha: f64,
    #[clap(long, default_value_t = 0.)]
    pub beta: f64,
    /// Element type
    #[clap(long, value_enum, default_value = "f32")]
    pub dtype: DType,
    /// Ordinal of the cuda device to use instead of the selected one
    #[clap(short, long)]
    pub device: Option<usize>,
    /// Run on the host even when a cuda device is available
    #[clap(long, conflicts_with = "device")]
    pub host: bool,
    /// Seed for reproducible matrix contents
    #[clap(long)]
    pub seed: Option<u64>,
}

/// Validated benchmark parameters.
#[derive(Clone, PartialEq, Debug)]
pub struct Config {
    pub shape: GemmShape,
    pub laps: usize,
    pub warm_up: usize,
    pub alpha: f64,
    pub beta: f64,
    pub dtype: DType,
    pub memory: MemoryMode,
    pub device: Option<usize>,
    pub host_only: bool,
    pub seed: Option<u64>,
}

#[derive(Clone, PartialEq, Debug, Error)]
pub enum ConfigError {
    #[error("matrix size must be positive")]
    EmptyMatrix,
    #[error("{size} x {size} elements do not fit in memory")]
    MatrixTooLarge { size: usize },
    #[error("{laps} laps of {size} x {size} gemm overflow the operation counter")]
    TooManyOperations { size: usize, laps: usize },
    #[error("{name} must be finite, got {value}")]
    NonFiniteScalar { name: &'static str, value: f64 },
    #[error("no cuda device with ordinal {0}")]
    NoSuchDevice(usize),
    #[error("no device to run on")]
    NoDevice,
}

impl Args {
    pub fn into_config(self, memory: MemoryMode) -> Result<Config, ConfigError> {
        let Self {
            size,
            laps,
            warm_up,
            alpha,
            beta,
            dtype,
            device,
            host,
            seed,
        } = self;

        if size == 0 {
            return Err(ConfigError::EmptyMatrix);
        }
        if size.checked_mul(size).is_none() {
            return Err(ConfigError::MatrixTooLarge { size });
        }
        let shape = GemmShape::square(size);
        if shape
            .operations()
            .and_then(|ops| ops.checked_mul(laps as u64))
            .is_none()
        {
            return Err(ConfigError::TooManyOperations { size, laps });
        }
        for (name, value) in [("alpha", alpha), ("beta", beta)] {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteScalar { name, value });
            }
        }

        Ok(Config {
            shape,
            laps,
            warm_up,
            alpha,
            beta,
            dtype,
            memory,
            device,
            host_only: host,
            seed,
        })
    }
}

impl Config {
    /// Total floating-point operations of the timed laps, saturating at `u64::MAX`.
    pub fn operations(&self) -> u64 {
        self.shape
            .operations()
            .map_or(u64::MAX, |ops| ops.saturating_mul(self.laps as u64))
    }
}
