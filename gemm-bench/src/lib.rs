#![deny(warnings)]

mod chrono;
mod config;
mod driver;
mod element;
mod host;
mod queue;
mod selector;

#[cfg(nvidia)]
mod gpu;

pub use chrono::Chrono;
pub use config::{Args, Config, ConfigError, DType, MemoryMode};
pub use driver::{Report, gflops};
pub use element::{DeviceType, Element, fill_rand};
pub use host::{HostBuffer, HostQueue, HostShared, host_name, host_threads};
pub use queue::{
    AsyncHandler, GemmShape, Operand, Queue, QueueError, ShapeError, default_async_handler,
};
pub use selector::{Backend, Candidate, candidates, cuda_selector, select, select_device};

#[cfg(nvidia)]
pub use gpu::{CudaQueue, GpuBuffer};

use rand::{SeedableRng, rngs::StdRng};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Logs to stderr, `info` and above unless `RUST_LOG` says otherwise.
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init()
}

/// Picks the device, then runs the benchmark on it with the configured element type.
pub fn run(config: &Config) -> Result<Report, BenchError> {
    let candidates = candidates(config.host_only);
    let chosen = select_device(&candidates, config.device)?;
    log::info!(
        "selected {:?} device {}: {}",
        chosen.backend,
        chosen.ordinal,
        chosen.name
    );

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    match chosen.backend {
        Backend::Host => on_queue(&HostQueue::default(), config, &mut rng),
        #[cfg(nvidia)]
        Backend::Cuda => {
            let dev = cuda::Device::new(chosen.ordinal as _);
            if config.memory == MemoryMode::Shared && !dev.supports_managed_memory() {
                log::warn!("{} does not report managed memory support", chosen.name)
            }
            dev.retain_primary().apply(|ctx| {
                let queue = CudaQueue::new(ctx, default_async_handler());
                on_queue(&queue, config, &mut rng)
            })
        }
        #[cfg(not(nvidia))]
        Backend::Cuda => unreachable!("cuda devices are not listed without cuda"),
    }
}

fn on_queue<Q: Queue>(queue: &Q, config: &Config, rng: &mut StdRng) -> Result<Report, BenchError> {
    let report = match config.dtype {
        DType::F16 => driver::run::<Q, half::f16>(queue, config, rng),
        DType::F32 => driver::run::<Q, f32>(queue, config, rng),
        DType::F64 => driver::run::<Q, f64>(queue, config, rng),
    }?;
    log::info!("{report}");
    Ok(report)
}
