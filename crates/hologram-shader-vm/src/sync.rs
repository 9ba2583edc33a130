//! Lock primitives for memory shared between machines
//!
//! Buffer and shared-memory regions are the only state a machine shares
//! mutably with other machines. They sit behind an `RwLock` that switches
//! implementation on the `threading` feature flag:
//!
//! - With `threading` feature: parking_lot (no poisoning)
//! - Without `threading` feature: std::sync, recovering from poisoning

#[cfg(feature = "threading")]
pub use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(not(feature = "threading"))]
pub use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Read lock an RwLock
#[cfg(feature = "threading")]
#[inline]
pub fn read_lock<T>(rwlock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rwlock.read()
}

/// Read lock an RwLock; a writer that panicked leaves the bytes as they were
#[cfg(not(feature = "threading"))]
#[inline]
pub fn read_lock<T>(rwlock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rwlock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Write lock an RwLock
#[cfg(feature = "threading")]
#[inline]
pub fn write_lock<T>(rwlock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rwlock.write()
}

#[cfg(not(feature = "threading"))]
#[inline]
pub fn write_lock<T>(rwlock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rwlock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}
