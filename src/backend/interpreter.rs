use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::descriptor::TensorDescriptor;

use super::cpu::checked_range;
use super::{Backend, DeviceError, DeviceTensor};

/// Reference backend with an allocation budget.
///
/// Storage is plain host memory, like [`CpuBackend`](super::CpuBackend), but
/// allocations are counted against a configurable byte limit and fail with
/// [`DeviceError::AllocationFailure`] once it is exhausted. Dropping a tensor
/// returns its bytes to the budget. This makes device-memory exhaustion
/// reproducible in tests without real device hardware.
#[derive(Debug)]
pub struct InterpreterBackend {
    limit: usize,
    allocated: Arc<AtomicUsize>,
}

impl InterpreterBackend {
    pub fn new() -> InterpreterBackend {
        Self::with_allocation_limit(usize::MAX)
    }

    /// Create a backend that can hold at most `limit` bytes of live tensors.
    pub fn with_allocation_limit(limit: usize) -> InterpreterBackend {
        InterpreterBackend {
            limit,
            allocated: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bytes currently held by live tensors from this backend.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }
}

impl Default for InterpreterBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for InterpreterBackend {
    fn name(&self) -> &str {
        "interpreter"
    }

    fn create_tensor(&self, desc: &TensorDescriptor) -> Result<Box<dyn DeviceTensor>, DeviceError> {
        let requested = desc.size_in_bytes();

        // Reserve with a CAS loop so concurrent allocations cannot
        // collectively overshoot the limit.
        let mut current = self.allocated.load(Ordering::Acquire);
        loop {
            let available = self.limit - current;
            if requested > available {
                return Err(DeviceError::AllocationFailure {
                    requested,
                    available,
                });
            }
            match self.allocated.compare_exchange_weak(
                current,
                current + requested,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }

        Ok(Box::new(InterpreterTensor {
            desc: desc.clone(),
            data: vec![0; requested],
            allocated: Arc::clone(&self.allocated),
        }))
    }
}

#[derive(Debug)]
struct InterpreterTensor {
    desc: TensorDescriptor,
    data: Vec<u8>,
    allocated: Arc<AtomicUsize>,
}

impl Drop for InterpreterTensor {
    fn drop(&mut self) {
        self.allocated.fetch_sub(self.data.len(), Ordering::AcqRel);
    }
}

impl DeviceTensor for InterpreterTensor {
    fn descriptor(&self) -> &TensorDescriptor {
        &self.desc
    }

    fn backend_name(&self) -> &str {
        "interpreter"
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), DeviceError> {
        let dest = checked_range(&mut self.data, offset, data.len())?;
        dest.copy_from_slice(data);
        Ok(())
    }

    fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>, DeviceError> {
        let size = self.data.len();
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= size)
            .ok_or(DeviceError::OutOfBounds { offset, len, size })?;
        Ok(self.data[offset..end].to_vec())
    }
}
