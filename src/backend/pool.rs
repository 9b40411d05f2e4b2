use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::descriptor::TensorDescriptor;

use super::{Backend, DeviceError, DeviceTensor};

/// A pool which enables reuse of device tensors across evaluation steps.
///
/// Allocating and freeing device buffers for every intermediate tensor is
/// wasteful; once liveness analysis says a buffer is dead, its storage can
/// back a later tensor of the same byte size instead. Released tensors are
/// keyed by size and handed back to satisfy future allocations, with their
/// contents treated as unspecified.
///
/// The pool assumes it manages a small number of tensors at a time and
/// searches its free list linearly.
pub struct DevicePool<'a> {
    backend: &'a dyn Backend,

    /// Tensors released back to the pool, available for reuse.
    free: Mutex<Vec<Box<dyn DeviceTensor>>>,

    /// Number of allocation requests received.
    alloc_count: AtomicUsize,

    /// Number of allocation requests fulfilled from the free list.
    hit_count: AtomicUsize,
}

impl<'a> DevicePool<'a> {
    /// Return a new, empty pool that allocates from `backend`.
    pub fn new(backend: &'a dyn Backend) -> DevicePool<'a> {
        DevicePool {
            backend,
            free: Mutex::new(Vec::new()),
            alloc_count: AtomicUsize::new(0),
            hit_count: AtomicUsize::new(0),
        }
    }

    /// Allocate a tensor for `desc`, reusing a released tensor when one of
    /// the same byte size is available.
    ///
    /// Contents are unspecified either way, matching
    /// [`Backend::create_tensor`].
    pub fn alloc(&self, desc: &TensorDescriptor) -> Result<Box<dyn DeviceTensor>, DeviceError> {
        self.alloc_count.fetch_add(1, Ordering::AcqRel);

        let mut free = self.free.lock().unwrap();
        let fit = free
            .iter()
            .position(|t| t.size_in_bytes() == desc.size_in_bytes());
        if let Some(idx) = fit {
            self.hit_count.fetch_add(1, Ordering::AcqRel);
            return Ok(free.remove(idx));
        }
        drop(free);

        self.backend.create_tensor(desc)
    }

    /// Return `tensor` to the pool for reuse by future allocations.
    pub fn release(&self, tensor: Box<dyn DeviceTensor>) {
        self.free.lock().unwrap().push(tensor);
    }

    /// Total number of allocation requests.
    pub fn alloc_count(&self) -> usize {
        self.alloc_count.load(Ordering::Acquire)
    }

    /// Number of allocation requests fulfilled from the free list.
    pub fn hit_count(&self) -> usize {
        self.hit_count.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::DevicePool;
    use crate::backend::create;
    use crate::descriptor::{DataType, TensorDescriptor};

    fn f32_desc(shape: &[usize]) -> TensorDescriptor {
        TensorDescriptor::new(DataType::Float, shape)
    }

    #[test]
    fn test_released_tensor_is_reused() {
        let backend = create("cpu").unwrap();
        let pool = DevicePool::new(backend.as_ref());

        let t = pool.alloc(&f32_desc(&[4])).unwrap();
        assert_eq!(pool.alloc_count(), 1);
        assert_eq!(pool.hit_count(), 0);

        pool.release(t);

        // Same byte size, different shape: still a hit.
        let t2 = pool.alloc(&f32_desc(&[2, 2])).unwrap();
        assert_eq!(t2.size_in_bytes(), 16);
        assert_eq!(pool.alloc_count(), 2);
        assert_eq!(pool.hit_count(), 1);
    }

    #[test]
    fn test_size_mismatch_allocates_fresh() {
        let backend = create("cpu").unwrap();
        let pool = DevicePool::new(backend.as_ref());

        let t = pool.alloc(&f32_desc(&[4])).unwrap();
        pool.release(t);

        let _t2 = pool.alloc(&f32_desc(&[8])).unwrap();
        assert_eq!(pool.alloc_count(), 2);
        assert_eq!(pool.hit_count(), 0);
    }

    #[test]
    fn test_pool_respects_backend_budget() {
        use crate::backend::{Backend, DeviceError, InterpreterBackend};

        let backend = InterpreterBackend::with_allocation_limit(16);
        let pool = DevicePool::new(&backend as &dyn Backend);

        let t = pool.alloc(&f32_desc(&[4])).unwrap();
        let err = pool.alloc(&f32_desc(&[4])).unwrap_err();
        assert_eq!(
            err,
            DeviceError::AllocationFailure {
                requested: 16,
                available: 0
            }
        );

        // Reuse does not need new device memory.
        pool.release(t);
        pool.alloc(&f32_desc(&[4])).unwrap();
        assert_eq!(pool.hit_count(), 1);
    }
}
