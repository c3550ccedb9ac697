use crate::core::locks::NEXT_LOCK_ID;
use crate::core::registry::global_registry;
use crate::core::types::{LockId, ThreadId, get_current_thread_id};
use parking_lot::{Mutex as ParkingLotMutex, MutexGuard as ParkingLotMutexGuard};
use std::ops::{Deref, DerefMut};
use std::panic::Location;
use std::sync::atomic::Ordering;

/// A mutex whose wait and ownership state is visible to the monitor
///
/// `TrackedMutex` behaves like a regular mutex but records in the global
/// lock registry which thread waits for it and which thread holds it, so a
/// [`RegistrySource`](crate::RegistrySource) can capture that state.
///
/// # Example
///
/// ```rust
/// use deadwatch::TrackedMutex;
/// use std::sync::Arc;
/// use std::thread;
///
/// let mutex = Arc::new(TrackedMutex::new(42));
/// let mutex_clone = Arc::clone(&mutex);
///
/// thread::spawn(move || {
///     let mut data = mutex_clone.lock();
///     *data += 1;
/// })
/// .join()
/// .unwrap();
///
/// assert_eq!(*mutex.lock(), 43);
/// ```
pub struct TrackedMutex<T> {
    /// Unique identifier for this mutex
    id: LockId,
    /// The wrapped mutex
    inner: ParkingLotMutex<T>,
}

/// Guard for a TrackedMutex, reports the release when dropped
pub struct TrackedMutexGuard<'a, T> {
    /// Thread that owns this guard
    thread_id: ThreadId,
    /// Lock that this guard is for
    lock_id: LockId,
    /// The inner MutexGuard
    guard: ParkingLotMutexGuard<'a, T>,
}

impl<T> TrackedMutex<T> {
    /// Create a new TrackedMutex with an automatically assigned ID
    pub fn new(value: T) -> Self {
        TrackedMutex {
            id: NEXT_LOCK_ID.fetch_add(1, Ordering::SeqCst),
            inner: ParkingLotMutex::new(value),
        }
    }

    /// Get the ID of this mutex
    pub fn id(&self) -> LockId {
        self.id
    }

    /// Acquire the lock, blocking the current thread until it is available
    ///
    /// While blocked, the thread is recorded as waiting for this lock at the
    /// caller's source location. The mutex is not reentrant: locking it again
    /// from the thread that holds it blocks forever, and shows up as a
    /// thread waiting on itself.
    #[track_caller]
    pub fn lock(&self) -> TrackedMutexGuard<'_, T> {
        let thread_id = get_current_thread_id();
        let site = Location::caller();
        let registry = global_registry();

        // Uncontended acquisitions never show up as waits
        let guard = match self.inner.try_lock() {
            Some(guard) => guard,
            None => {
                registry.on_lock_attempt(thread_id, self.id, site);
                self.inner.lock()
            }
        };

        registry.on_lock_acquired(thread_id, self.id, site);
        TrackedMutexGuard {
            thread_id,
            lock_id: self.id,
            guard,
        }
    }

    /// Try to acquire the lock without blocking
    ///
    /// A failed attempt is never recorded as a wait.
    #[track_caller]
    pub fn try_lock(&self) -> Option<TrackedMutexGuard<'_, T>> {
        let guard = self.inner.try_lock()?;
        let thread_id = get_current_thread_id();
        global_registry().on_lock_acquired(thread_id, self.id, Location::caller());
        Some(TrackedMutexGuard {
            thread_id,
            lock_id: self.id,
            guard,
        })
    }

    /// Consumes this mutex, returning the underlying data
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    /// Returns a mutable reference to the underlying data
    ///
    /// Since this call borrows the mutex mutably, no locking takes place.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

impl<T> Deref for TrackedMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.guard.deref()
    }
}

impl<T> DerefMut for TrackedMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard.deref_mut()
    }
}

impl<T> Drop for TrackedMutexGuard<'_, T> {
    fn drop(&mut self) {
        global_registry().on_lock_release(self.thread_id, self.lock_id);
    }
}

impl<T: Default> Default for TrackedMutex<T> {
    fn default() -> TrackedMutex<T> {
        TrackedMutex::new(Default::default())
    }
}

impl<T> From<T> for TrackedMutex<T> {
    fn from(t: T) -> Self {
        TrackedMutex::new(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = TrackedMutex::new(());
        let b = TrackedMutex::new(());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_guard_registers_hold_and_release() {
        let mutex = TrackedMutex::new(1);
        let me = get_current_thread_id();

        {
            let mut guard = mutex.lock();
            *guard += 1;
            let snapshot = global_registry().capture();
            let record = snapshot.thread(me).unwrap();
            assert!(record.held.contains(&mutex.id()));
            assert_eq!(record.waiting_for, None);
            assert!(record.stack[0].contains("mutex.rs"));
        }

        let snapshot = global_registry().capture();
        assert!(
            snapshot
                .thread(me)
                .is_none_or(|record| !record.held.contains(&mutex.id()))
        );
        assert_eq!(mutex.into_inner(), 2);
    }

    #[test]
    fn test_try_lock_on_held_mutex() {
        let mutex = TrackedMutex::new(());
        let _guard = mutex.lock();
        assert!(mutex.try_lock().is_none());

        let snapshot = global_registry().capture();
        assert_eq!(
            snapshot.thread(get_current_thread_id()).unwrap().waiting_for,
            None
        );
    }
}
