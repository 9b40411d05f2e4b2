use crate::descriptor::TensorDescriptor;

use super::{Backend, DeviceError, DeviceTensor};

/// Backend storing tensors in host memory.
#[derive(Debug)]
pub struct CpuBackend {}

impl CpuBackend {
    pub fn new() -> CpuBackend {
        CpuBackend {}
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn create_tensor(&self, desc: &TensorDescriptor) -> Result<Box<dyn DeviceTensor>, DeviceError> {
        Ok(Box::new(CpuTensor {
            desc: desc.clone(),
            data: vec![0; desc.size_in_bytes()],
        }))
    }
}

#[derive(Debug)]
struct CpuTensor {
    desc: TensorDescriptor,
    data: Vec<u8>,
}

impl DeviceTensor for CpuTensor {
    fn descriptor(&self) -> &TensorDescriptor {
        &self.desc
    }

    fn backend_name(&self) -> &str {
        "cpu"
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

/// Bounds-checked mutable byte range of `data`.
pub(super) fn checked_range(
    data: &mut [u8],
    offset: usize,
    len: usize,
) -> Result<&mut [u8], DeviceError> {
    let size = data.len();
    let end = offset
        .checked_add(len)
        .filter(|&end| end <= size)
        .ok_or(DeviceError::OutOfBounds { offset, len, size })?;
    Ok(&mut data[offset..end])
}
