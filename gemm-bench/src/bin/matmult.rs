//! Gemm GFLOPS on device buffers copied from host before timing.

use clap::Parser;
use gemm_bench::{Args, MemoryMode};

fn main() -> anyhow::Result<()> {
    gemm_bench::init_logger();
    let config = Args::parse().into_config(MemoryMode::Buffer)?;
    gemm_bench::run(&config)?;
    Ok(())
}
