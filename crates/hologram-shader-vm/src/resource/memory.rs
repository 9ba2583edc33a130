//! Byte-addressed memory for shader buffers and work-group shared memory
//!
//! A [`MemoryRegion`] is a growable byte vector behind an `RwLock`. Cloning a
//! region shares it, which is how machines running one work group see the
//! same shared memory and how a [`BufferPool`] hands the same buffer to every
//! machine that binds it.
//!
//! Plain loads and stores take the lock once per quad; atomics hold the write
//! lock across every lane's read-modify-write, so they are atomic with respect
//! to every other machine using the same region.

use super::AtomicOp;
use crate::sync::{read_lock, write_lock, RwLock};
use dashmap::DashMap;
use std::sync::Arc;

/// Shared byte storage
#[derive(Debug, Clone, Default)]
pub struct MemoryRegion {
    bytes: Arc<RwLock<Vec<u8>>>,
}

impl MemoryRegion {
    /// Zero-filled region of `size` bytes
    pub fn new(size: usize) -> Self {
        Self::from_bytes(vec![0u8; size])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(RwLock::new(bytes)),
        }
    }

    pub fn from_words(words: &[u32]) -> Self {
        Self::from_bytes(bytemuck::cast_slice(words).to_vec())
    }

    pub fn len(&self) -> usize {
        read_lock(&self.bytes).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current contents
    pub fn to_vec(&self) -> Vec<u8> {
        read_lock(&self.bytes).clone()
    }

    /// Current contents as 32-bit words (trailing partial word dropped)
    pub fn to_words(&self) -> Vec<u32> {
        let guard = read_lock(&self.bytes);
        guard
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned::<u32>)
            .collect()
    }

    /// Do two handles refer to the same storage?
    pub fn same_region(&self, other: &MemoryRegion) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }

    pub(crate) fn with_read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let guard = read_lock(&self.bytes);
        f(&guard)
    }

    pub(crate) fn with_write<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut guard = write_lock(&self.bytes);
        f(&mut guard)
    }
}

/// Read the word at `offset`, or `None` if it does not fit
#[inline]
pub(crate) fn read_word(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    bytes.get(offset..end).map(bytemuck::pod_read_unaligned::<u32>)
}

#[inline]
pub(crate) fn write_word(bytes: &mut [u8], offset: usize, value: u32) -> bool {
    let Some(end) = offset.checked_add(4) else {
        return false;
    };
    match bytes.get_mut(offset..end) {
        Some(slot) => {
            slot.copy_from_slice(&value.to_ne_bytes());
            true
        }
        None => false,
    }
}

/// Atomically apply `op` at `offset`; returns the previous word
pub(crate) fn atomic_word(bytes: &mut [u8], offset: usize, op: AtomicOp, value: u32, value2: u32) -> Option<u32> {
    let old = read_word(bytes, offset)?;
    write_word(bytes, offset, op.apply(old, value, value2));
    Some(old)
}

/// Resolves a shader-buffer unit to its backing memory
pub trait ShaderBuffers: Send + Sync {
    fn lookup(&self, unit: u32) -> Option<MemoryRegion>;
}

/// Shader buffers keyed by unit
///
/// Uses DashMap so machines on different threads can resolve units without
/// contending on one lock; each buffer carries its own lock.
#[derive(Debug, Default)]
pub struct BufferPool {
    buffers: DashMap<u32, MemoryRegion>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `region` at `unit`, returning the region it replaced
    pub fn bind(&self, unit: u32, region: MemoryRegion) -> Option<MemoryRegion> {
        tracing::debug!(unit, size = region.len(), "shader buffer bound");
        self.buffers.insert(unit, region)
    }

    /// Allocate and bind a zeroed buffer
    pub fn allocate(&self, unit: u32, size: usize) -> MemoryRegion {
        let region = MemoryRegion::new(size);
        self.bind(unit, region.clone());
        region
    }

    pub fn unbind(&self, unit: u32) -> Option<MemoryRegion> {
        self.buffers.remove(&unit).map(|(_, region)| region)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl ShaderBuffers for BufferPool {
    fn lookup(&self, unit: u32) -> Option<MemoryRegion> {
        self.buffers.get(&unit).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_access_bounds() {
        let mut bytes = vec![0u8; 8];
        assert!(write_word(&mut bytes, 4, 0xdead_beef));
        assert!(!write_word(&mut bytes, 5, 1));
        assert!(!write_word(&mut bytes, usize::MAX - 1, 1));
        assert_eq!(read_word(&bytes, 4), Some(0xdead_beef));
        assert_eq!(read_word(&bytes, 6), None);
    }

    #[test]
    fn test_atomic_word_returns_previous() {
        let mut bytes = 5u32.to_ne_bytes().to_vec();
        assert_eq!(atomic_word(&mut bytes, 0, AtomicOp::Uadd, 3, 0), Some(5));
        assert_eq!(read_word(&bytes, 0), Some(8));
        assert_eq!(atomic_word(&mut bytes, 0, AtomicOp::Cas, 8, 1), Some(8));
        assert_eq!(read_word(&bytes, 0), Some(1));
        assert_eq!(atomic_word(&mut bytes, 2, AtomicOp::Xchg, 0, 0), None);
    }

    #[test]
    fn test_pool_shares_regions() {
        let pool = BufferPool::new();
        let region = pool.allocate(3, 16);
        let looked_up = pool.lookup(3).unwrap();
        assert!(region.same_region(&looked_up));
        looked_up.with_write(|bytes| write_word(bytes, 0, 42));
        assert_eq!(region.to_words()[0], 42);
        assert!(pool.lookup(4).is_none());
        assert!(pool.unbind(3).is_some());
        assert!(pool.is_empty());
    }
}
