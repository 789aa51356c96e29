use super::optics::WavelengthSnapshot;
use super::traits::SystemAssembler;
use crate::domain::{DotError, DotResult};
use crate::numerics::{CooMatrix, CsrMatrix};
use num_complex::Complex64;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeviceError {
    #[error("device kernel failed: {0}")]
    Kernel(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub name: String,
    pub compute_capability: (u32, u32),
}

pub trait ComputeDevice: Send + Sync {
    fn descriptor(&self) -> &DeviceDescriptor;

    fn spmv(
        &self,
        matrix: &CsrMatrix,
        x: &[Complex64],
        y: &mut [Complex64],
    ) -> Result<(), DeviceError>;

    /// Device-side assembly entry point; devices without an assembly kernel
    /// run the host assembler.
    fn assemble(
        &self,
        assembler: &dyn SystemAssembler,
        snapshot: &WavelengthSnapshot<'_>,
        frequency: f64,
    ) -> DotResult<CooMatrix> {
        assembler.assemble(snapshot, frequency)
    }
}

/// Device emulated on the host; used when no accelerator runtime is linked.
#[derive(Debug)]
pub struct HostDevice {
    descriptor: DeviceDescriptor,
    spmv_calls: AtomicUsize,
}

impl HostDevice {
    pub fn new(name: impl Into<String>, compute_capability: (u32, u32)) -> Self {
        Self {
            descriptor: DeviceDescriptor {
                name: name.into(),
                compute_capability,
            },
            spmv_calls: AtomicUsize::new(0),
        }
    }

    pub fn spmv_calls(&self) -> usize {
        self.spmv_calls.load(Ordering::Relaxed)
    }
}

impl ComputeDevice for HostDevice {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn spmv(
        &self,
        matrix: &CsrMatrix,
        x: &[Complex64],
        y: &mut [Complex64],
    ) -> Result<(), DeviceError> {
        self.spmv_calls.fetch_add(1, Ordering::Relaxed);
        matrix
            .matvec_into(x, y)
            .map_err(|error| DeviceError::Kernel(error.to_string()))
    }
}

/// A registered device plus the lock that serializes assembly and solves on it.
#[derive(Clone)]
pub struct DeviceSlot {
    index: usize,
    device: Arc<dyn ComputeDevice>,
    lock: Arc<Mutex<()>>,
}

impl DeviceSlot {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn device(&self) -> &dyn ComputeDevice {
        self.device.as_ref()
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        self.device.descriptor()
    }

    pub fn lock(&self) -> DotResult<MutexGuard<'_, ()>> {
        self.lock.lock().map_err(|_| {
            DotError::device_unavailable(
                "DEVICE.POISONED",
                format!(
                    "device {} ('{}') lock is poisoned by an earlier failed solve",
                    self.index,
                    self.descriptor().name
                ),
            )
        })
    }
}

impl std::fmt::Debug for DeviceSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSlot")
            .field("index", &self.index)
            .field("descriptor", self.descriptor())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    slots: Vec<DeviceSlot>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, device: Arc<dyn ComputeDevice>) -> usize {
        let index = self.slots.len();
        debug!(
            index,
            name = %device.descriptor().name,
            "registered compute device"
        );
        self.slots.push(DeviceSlot {
            index,
            device,
            lock: Arc::new(Mutex::new(())),
        });
        index
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// An explicit index must exist; otherwise the device with the highest
    /// compute capability wins, ties going to the lowest index.
    pub fn select(&self, index: Option<usize>) -> DotResult<DeviceSlot> {
        if self.slots.is_empty() {
            return Err(DotError::device_unavailable(
                "DEVICE.NONE",
                "no compute device is registered",
            ));
        }
        match index {
            Some(index) => self.slots.get(index).cloned().ok_or_else(|| {
                DotError::device_unavailable(
                    "DEVICE.INDEX",
                    format!(
                        "device index {} is out of range; {} device(s) registered",
                        index,
                        self.slots.len()
                    ),
                )
            }),
            None => {
                let mut best = &self.slots[0];
                for slot in &self.slots[1..] {
                    let capability = slot.descriptor().compute_capability;
                    if capability > best.descriptor().compute_capability {
                        best = slot;
                    }
                }
                Ok(best.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ComputeDevice, DeviceRegistry, HostDevice};
    use crate::domain::DotErrorCategory;
    use crate::numerics::CooMatrix;
    use num_complex::Complex64;
    use std::sync::Arc;

    fn registry() -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        registry.register(Arc::new(HostDevice::new("sm75", (7, 5))));
        registry.register(Arc::new(HostDevice::new("sm86-a", (8, 6))));
        registry.register(Arc::new(HostDevice::new("sm86-b", (8, 6))));
        registry
    }

    #[test]
    fn default_selection_prefers_highest_capability_then_lowest_index() {
        let slot = registry().select(None).expect("device");
        assert_eq!(slot.index(), 1);
        assert_eq!(slot.descriptor().name, "sm86-a");
    }

    #[test]
    fn explicit_index_must_exist() {
        let registry = registry();
        assert_eq!(registry.select(Some(0)).expect("device").index(), 0);
        let error = registry.select(Some(3)).expect_err("out of range");
        assert_eq!(error.category(), DotErrorCategory::DeviceUnavailable);
        assert_eq!(error.placeholder(), "DEVICE.INDEX");
    }

    #[test]
    fn empty_registry_has_no_device() {
        let error = DeviceRegistry::new().select(None).expect_err("empty");
        assert_eq!(error.placeholder(), "DEVICE.NONE");
    }

    #[test]
    fn host_device_counts_products() {
        let device = HostDevice::new("host", (1, 0));
        let mut coo = CooMatrix::new(2);
        coo.push(0, 0, Complex64::new(2.0, 0.0)).expect("entry");
        coo.push(1, 1, Complex64::new(0.0, 1.0)).expect("entry");
        let csr = coo.to_csr();
        let mut y = vec![Complex64::new(0.0, 0.0); 2];
        device
            .spmv(&csr, &[Complex64::new(1.0, 0.0); 2], &mut y)
            .expect("spmv");
        assert_eq!(y, vec![Complex64::new(2.0, 0.0), Complex64::new(0.0, 1.0)]);
        assert_eq!(device.spmv_calls(), 1);
    }
}
