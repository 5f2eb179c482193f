//! Gemm GFLOPS on shared memory filled in place.

use clap::Parser;
use gemm_bench::{Args, MemoryMode};

fn main() -> anyhow::Result<()> {
    gemm_bench::init_logger();
    let config = Args::parse().into_config(MemoryMode::Shared)?;
    gemm_bench::run(&config)?;
    Ok(())
}
