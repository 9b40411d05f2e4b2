//! Device abstraction: backends that allocate tensors and move bytes
//! between host and device memory.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::descriptor::TensorDescriptor;

mod cpu;
mod interpreter;
mod pool;

pub use cpu::CpuBackend;
pub use interpreter::InterpreterBackend;
pub use pool::DevicePool;

/// Errors reported by backends and device tensors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DeviceError {
    /// No backend is registered under the requested name.
    UnknownBackend(String),

    /// The backend could not provide memory for a tensor.
    AllocationFailure { requested: usize, available: usize },

    /// A read or write touched bytes outside the tensor's buffer.
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    /// A transfer was requested between tensors that no backend can bridge.
    BackendMismatch { src: String, dest: String },
}

impl Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::UnknownBackend(name) => write!(f, "unknown backend \"{}\"", name),
            DeviceError::AllocationFailure {
                requested,
                available,
            } => write!(
                f,
                "allocation of {} bytes failed ({} available)",
                requested, available
            ),
            DeviceError::OutOfBounds { offset, len, size } => write!(
                f,
                "access of {} bytes at offset {} is out of bounds for {} byte buffer",
                len, offset, size
            ),
            DeviceError::BackendMismatch { src, dest } => write!(
                f,
                "cannot transfer between \"{}\" and \"{}\" tensors",
                src, dest
            ),
        }
    }
}

impl Error for DeviceError {}

/// A tensor whose storage lives on one backend's device.
///
/// Storage is byte addressable: `read` and `write` move raw bytes at byte
/// offsets, and interpreting them is up to the caller via the tensor's
/// descriptor. Both operations are bounds checked against the buffer size
/// derived from the descriptor.
pub trait DeviceTensor: fmt::Debug {
    /// Describe the element type and shape this tensor was allocated for.
    fn descriptor(&self) -> &TensorDescriptor;

    /// Name of the backend that owns this tensor's storage.
    fn backend_name(&self) -> &str;

    /// Size of the backing buffer in bytes.
    fn size_in_bytes(&self) -> usize {
        self.descriptor().size_in_bytes()
    }

    /// Copy `data` into the buffer starting at byte `offset`.
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), DeviceError>;

    /// Copy `len` bytes out of the buffer starting at byte `offset`.
    fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>, DeviceError>;

    /// True if this tensor's bytes can be staged through host memory.
    ///
    /// Tensors in device-private memory that `read`/`write` cannot reach
    /// return false, which excludes them from [`copy_to`].
    fn supports_host_transfer(&self) -> bool {
        true
    }
}

/// Copy `len` bytes at byte `offset` from `src` into the same range of
/// `dest`.
///
/// Works across backends by staging through host memory. The range is
/// bounds checked against both tensors, so copying between tensors of
/// different sizes fails with `OutOfBounds` on whichever end is too small.
pub fn copy_to(
    src: &dyn DeviceTensor,
    dest: &mut dyn DeviceTensor,
    offset: usize,
    len: usize,
) -> Result<(), DeviceError> {
    if !src.supports_host_transfer() || !dest.supports_host_transfer() {
        return Err(DeviceError::BackendMismatch {
            src: src.backend_name().to_string(),
            dest: dest.backend_name().to_string(),
        });
    }
    let staged = src.read(offset, len)?;
    dest.write(offset, &staged)
}

/// A device that can allocate tensors.
pub trait Backend: fmt::Debug {
    /// Name under which this backend registers, eg. "cpu".
    fn name(&self) -> &str;

    /// Allocate a zero-initialized tensor sized for `desc`.
    fn create_tensor(&self, desc: &TensorDescriptor) -> Result<Box<dyn DeviceTensor>, DeviceError>;
}

/// Construct a backend by registered name.
///
/// Two backends are built in: "cpu", which stores tensors in host memory,
/// and "interpreter", a reference backend with an allocation budget used to
/// exercise failure paths.
pub fn create(name: &str) -> Result<Box<dyn Backend>, DeviceError> {
    match name {
        "cpu" => Ok(Box::new(CpuBackend::new())),
        "interpreter" => Ok(Box::new(InterpreterBackend::new())),
        _ => Err(DeviceError::UnknownBackend(name.to_string())),
    }
}
