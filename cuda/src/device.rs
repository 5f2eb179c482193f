use crate::{AsRaw, bindings as cuda};
use std::{
    cmp::Ordering,
    ffi::{CStr, c_char, c_int},
    fmt,
};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct Device(cuda::CUdevice);

impl AsRaw for Device {
    type Raw = cuda::CUdevice;
    #[inline]
    unsafe fn as_raw(&self) -> Self::Raw {
        self.0
    }
}

impl Device {
    #[inline]
    pub fn new(index: c_int) -> Self {
        let mut device = 0;
        driver!(cuDeviceGet(&mut device, index));
        Self(device)
    }

    #[inline]
    pub fn count() -> usize {
        let mut count = 0;
        driver!(cuDeviceGetCount(&mut count));
        count as _
    }

    /// Every device visible to the driver, in ordinal order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::count() as c_int).map(Self::new)
    }

    pub fn name(&self) -> String {
        let mut buf = [0 as c_char; 256];
        driver!(cuDeviceGetName(buf.as_mut_ptr(), buf.len() as _, self.0));
        unsafe { CStr::from_ptr(buf.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }

    #[inline]
    pub fn compute_capability(&self) -> ComputeCapability {
        use cuda::CUdevice_attribute::*;
        ComputeCapability {
            major: self.get_attribute(CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR),
            minor: self.get_attribute(CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR),
        }
    }

    #[inline]
    pub fn total_memory(&self) -> usize {
        let mut bytes = 0;
        driver!(cuDeviceTotalMem_v2(&mut bytes, self.0));
        bytes as _
    }

    #[inline]
    pub fn multiprocessors(&self) -> usize {
        self.get_attribute(cuda::CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MULTIPROCESSOR_COUNT) as _
    }

    /// Whether the device can address managed (unified shared) memory.
    #[inline]
    pub fn supports_managed_memory(&self) -> bool {
        self.get_attribute(cuda::CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MANAGED_MEMORY) != 0
    }

    #[inline]
    fn get_attribute(&self, attr: cuda::CUdevice_attribute) -> i32 {
        let mut value = 0;
        driver!(cuDeviceGetAttribute(&mut value, attr, self.0));
        value
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ComputeCapability {
    pub major: i32,
    pub minor: i32,
}

impl PartialOrd for ComputeCapability {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComputeCapability {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
    }
}

impl fmt::Display for ComputeCapability {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[test]
fn test_compute_capability_order() {
    let volta = ComputeCapability { major: 7, minor: 0 };
    let turing = ComputeCapability { major: 7, minor: 5 };
    let ampere = ComputeCapability { major: 8, minor: 0 };
    assert!(volta < turing);
    assert!(turing < ampere);
    assert_eq!(turing.to_string(), "7.5");
    assert_eq!(ampere.to_string(), "8.0");
}

#[test]
fn test() {
    if let Err(crate::NoDevice) = crate::init() {
        return;
    }
    for dev in Device::all() {
        println!(
            "gpu{}: {} compute {} mem={} sms={} managed={}",
            unsafe { dev.as_raw() },
            dev.name(),
            dev.compute_capability(),
            dev.total_memory(),
            dev.multiprocessors(),
            dev.supports_managed_memory(),
        );
    }
}
