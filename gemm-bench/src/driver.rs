use crate::{Chrono, Config, Element, GemmShape, MemoryMode, Queue, QueueError, fill_rand};
use rand::Rng;
use std::{fmt, time::Duration};

/// Outcome of one benchmark run.
#[derive(Clone, PartialEq, Debug)]
pub struct Report {
    pub device: String,
    pub dtype: &'static str,
    pub memory: MemoryMode,
    pub shape: GemmShape,
    pub laps: usize,
    /// Wall-clock seconds of the timed laps, error handling included.
    pub elapsed: f64,
    pub device_elapsed: Option<Duration>,
    pub operations: u64,
    pub gflops: f64,
    /// Gemm calls rejected before reaching the device.
    pub sync_failures: usize,
    /// Errors reported while waiting for the device.
    pub async_failures: usize,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let GemmShape { m, n, k, .. } = self.shape;
        write!(
            f,
            "{} {}x{}x{} {} {} laps on {}: {:.3}s, {:.2} GFLOPS",
            self.dtype, m, n, k, self.memory, self.laps, self.device, self.elapsed, self.gflops
        )?;
        if let Some(device) = self.device_elapsed {
            write!(f, " (device {:.3}s)", device.as_secs_f64())?
        }
        if self.sync_failures + self.async_failures > 0 {
            write!(
                f,
                ", {} sync and {} async failures",
                self.sync_failures, self.async_failures
            )?
        }
        Ok(())
    }
}

/// `operations / 1e9 / seconds`, zero when nothing was computed.
pub fn gflops(operations: u64, seconds: f64) -> f64 {
    if operations == 0 {
        0.
    } else {
        operations as f64 / 1e9 / seconds
    }
}

/// Allocates and fills the matrices the way `config.memory` asks, then times the laps.
pub fn run<Q: Queue, T: Element>(
    queue: &Q,
    config: &Config,
    rng: &mut impl Rng,
) -> Result<Report, QueueError> {
    println!("Initializing the matrices...");
    let shape = &config.shape;
    let (a_len, b_len, c_len) = (
        shape.lda * shape.a_stored().1,
        shape.ldb * shape.b_stored().1,
        shape.ldc * shape.n,
    );
    log::debug!("{c_len} elements of {} per matrix", T::NAME);

    let timing = match config.memory {
        MemoryMode::Buffer => {
            let mut a = vec![T::zero(); a_len];
            let mut b = vec![T::zero(); b_len];
            let mut c = vec![T::zero(); c_len];
            fill_rand(&mut a, rng);
            fill_rand(&mut b, rng);

            let a_buf = queue.upload(&a)?;
            let b_buf = queue.upload(&b)?;
            let mut c_buf = queue.upload(&c)?;
            let timing = time_laps(queue, config, |queue| {
                queue.gemm_buffer(shape, config.alpha, config.beta, &a_buf, &b_buf, &mut c_buf)
            });
            queue.download(&c_buf, &mut c)?;
            timing
        }
        MemoryMode::Shared => {
            let mut a = queue.malloc_shared::<T>(a_len)?;
            let mut b = queue.malloc_shared::<T>(b_len)?;
            let mut c = queue.malloc_shared::<T>(c_len)?;
            fill_rand(&mut a, rng);
            fill_rand(&mut b, rng);

            time_laps(queue, config, |queue| {
                queue.gemm(shape, config.alpha, config.beta, &a, &b, &mut c)
            })
        }
    };

    Ok(Report {
        device: queue.name(),
        dtype: T::NAME,
        memory: config.memory,
        shape: *shape,
        laps: config.laps,
        elapsed: timing.elapsed,
        device_elapsed: timing.device_elapsed,
        operations: timing.operations,
        gflops: timing.gflops,
        sync_failures: timing.sync_failures,
        async_failures: timing.async_failures,
    })
}

#[derive(Clone, Copy, PartialEq, Debug)]
struct Timing {
    elapsed: f64,
    device_elapsed: Option<Duration>,
    operations: u64,
    gflops: f64,
    sync_failures: usize,
    async_failures: usize,
}

/// Calls `gemm` for every warm-up and timed lap, reporting errors and carrying on.
fn time_laps<Q: Queue>(
    queue: &Q,
    config: &Config,
    mut gemm: impl FnMut(&Q) -> Result<(), QueueError>,
) -> Timing {
    println!("Running on: {}", queue.name());

    for _ in 0..config.warm_up {
        if let Err(e) = gemm(queue) {
            log::warn!("warm-up gemm failed: {e}")
        }
        queue.wait_and_throw();
    }

    let laps = config.laps;
    let chrono = Chrono::with_caller("computing + error handling");
    let ((sync_failures, async_failures), device_elapsed) = queue.device_span(|| {
        let mut sync_failures = 0;
        let mut async_failures = 0;
        for i in 0..laps {
            println!("{i}/{laps}");
            if let Err(e) = gemm(queue) {
                log::warn!("Caught synchronous {} error during GEMM: {e}", e.kind());
                sync_failures += 1
            }
            async_failures += queue.wait_and_throw()
        }
        (sync_failures, async_failures)
    });
    let elapsed = chrono.stop();

    let operations = config.operations();
    let gflops = gflops(operations, elapsed);
    println!("Gflops : {gflops}");
    if let Some(device) = device_elapsed {
        log::info!(
            "device time {:.6}s, {} GFLOPS",
            device.as_secs_f64(),
            self::gflops(operations, device.as_secs_f64())
        )
    }

    Timing {
        elapsed,
        device_elapsed,
        operations,
        gflops,
        sync_failures,
        async_failures,
    }
}
