use std::time::Instant;

/// Wall-clock stopwatch reporting to stderr when it goes out of scope.
#[derive(Debug)]
pub struct Chrono {
    caller: Option<String>,
    start: Instant,
}

impl Default for Chrono {
    fn default() -> Self {
        Self::new()
    }
}

impl Chrono {
    #[inline]
    pub fn new() -> Self {
        Self {
            caller: None,
            start: Instant::now(),
        }
    }

    /// A stopwatch whose report names what it measured.
    #[inline]
    pub fn with_caller(caller: impl Into<String>) -> Self {
        Self {
            caller: Some(caller.into()),
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn caller(&self) -> Option<&str> {
        self.caller.as_deref()
    }

    /// Seconds elapsed since creation, at microsecond resolution.
    ///
    /// The clock keeps running.
    #[inline]
    pub fn stop(&self) -> f64 {
        self.start.elapsed().as_micros() as f64 / 1e6
    }

    fn report(&self) -> String {
        let secs = self.stop();
        match &self.caller {
            Some(caller) => format!("time in {caller} : {secs}s"),
            None => format!("time {secs}s"),
        }
    }
}

impl Drop for Chrono {
    fn drop(&mut self) {
        eprintln!("{}", self.report())
    }
}
