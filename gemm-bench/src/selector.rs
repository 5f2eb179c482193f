use crate::{ConfigError, host};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Backend {
    Cuda,
    Host,
}

/// A device the benchmark may run on.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Candidate {
    pub backend: Backend,
    pub ordinal: usize,
    pub name: String,
}

impl Candidate {
    pub fn host() -> Self {
        Self {
            backend: Backend::Host,
            ordinal: 0,
            name: host::host_name(host::host_threads()),
        }
    }
}

/// Accepts cuda devices only.
pub fn cuda_selector(candidate: &Candidate) -> i32 {
    if candidate.backend == Backend::Cuda {
        1
    } else {
        -1
    }
}

/// The candidate with the highest non-negative score, the first one on ties.
pub fn select<'a>(
    candidates: &'a [Candidate],
    score: impl Fn(&Candidate) -> i32,
) -> Option<&'a Candidate> {
    let mut best = None;
    for candidate in candidates {
        let s = score(candidate);
        if s >= 0 && best.is_none_or(|(top, _)| s > top) {
            best = Some((s, candidate))
        }
    }
    best.map(|(_, candidate)| candidate)
}

/// The device to run on: the requested cuda ordinal if any,
/// otherwise the best cuda device, otherwise the host.
pub fn select_device(
    candidates: &[Candidate],
    ordinal: Option<usize>,
) -> Result<&Candidate, ConfigError> {
    if let Some(ordinal) = ordinal {
        return candidates
            .iter()
            .find(|c| c.backend == Backend::Cuda && c.ordinal == ordinal)
            .ok_or(ConfigError::NoSuchDevice(ordinal));
    }
    if let Some(chosen) = select(candidates, cuda_selector) {
        return Ok(chosen);
    }
    let host = candidates
        .iter()
        .find(|c| c.backend == Backend::Host)
        .ok_or(ConfigError::NoDevice)?;
    log::warn!("GPU device not found! Fall back on: {}", host.name);
    Ok(host)
}

/// Every device visible to this build, host last.
///
/// Cuda devices are skipped entirely when `host_only` is set.
pub fn candidates(host_only: bool) -> Vec<Candidate> {
    let mut ans = Vec::new();
    #[cfg(nvidia)]
    if !host_only {
        match cuda::init() {
            Ok(()) => ans.extend(cuda::Device::all().enumerate().map(|(ordinal, dev)| {
                let name = dev.name();
                log::debug!(
                    "gpu{ordinal}: {name}, compute {}, {} SMs, {} MiB",
                    dev.compute_capability(),
                    dev.multiprocessors(),
                    dev.total_memory() >> 20,
                );
                Candidate {
                    backend: Backend::Cuda,
                    ordinal,
                    name,
                }
            })),
            Err(e) => log::info!("{e}"),
        }
    }
    #[cfg(not(nvidia))]
    if !host_only {
        log::info!("built without cuda")
    }
    ans.push(Candidate::host());
    ans
}
