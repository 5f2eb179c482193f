use crate::{AsRaw, DriverError, Stream, bindings as cuda};
use std::{ptr::null_mut, time::Duration};

#[repr(transparent)]
pub struct Event(cuda::CUevent);

impl Drop for Event {
    fn drop(&mut self) {
        driver!(cuEventDestroy_v2(self.0));
    }
}

impl Stream<'_> {
    /// Records an event marking the current tail of the stream.
    pub fn record(&self) -> Event {
        let mut event = null_mut();
        driver!(cuEventCreate(
            &mut event,
            CUevent_flags::CU_EVENT_DEFAULT as _
        ));
        driver!(cuEventRecord(event, self.as_raw()));
        Event(event)
    }
}

impl Event {
    pub fn synchronize(&self) -> Result<(), DriverError> {
        try_driver!(cuEventSynchronize(self.0))
    }

    /// Device time between `start` and this event, both of which must have completed.
    pub fn elapse_from(&self, start: &Self) -> Result<Duration, DriverError> {
        let mut ms = 0.0f32;
        try_driver!(cuEventElapsedTime(&mut ms, start.0, self.0))?;
        Ok(Duration::from_secs_f64(ms as f64 / 1000.))
    }
}

#[test]
fn test_elapse() {
    if let Err(crate::NoDevice) = crate::init() {
        return;
    }
    crate::Device::new(0).retain_primary().apply(|ctx| {
        let stream = ctx.stream();
        let start = stream.record();
        let mem = stream.malloc::<f32>(1 << 20).unwrap();
        let end = stream.record();
        end.synchronize().unwrap();
        assert!(end.elapse_from(&start).is_ok());
        drop(mem);
    })
}
