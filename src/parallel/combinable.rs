//! Per-thread lazily initialized accumulators.
//!
//! Slots are keyed by `ThreadId` in a map behind a reader/writer lock. Each
//! slot keeps its value in its own `Arc<Mutex<_>>`, so a thread that already
//! owns a slot only takes the shared map lock to find it and then locks a
//! mutex nobody else contends for. Creating a slot for a new thread takes the
//! exclusive map lock.
//!
//! The slot mutex is not reentrant. A slot also records whether its owning
//! thread currently holds a [`LocalGuard`], and any access from that thread
//! that would block on its own guard panics instead of deadlocking.

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, MutexGuard, RawMutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

const REENTRANT_LOCAL: &str =
    "Combinable::local called again while this thread still holds its value";
const READ_WHILE_HELD: &str =
    "Combinable read on a thread that still holds its local value guard";

struct Slot<T> {
    held: Arc<AtomicBool>,
    value: Arc<Mutex<T>>,
}

impl<T> Slot<T> {
    fn new(value: T) -> Self {
        Self {
            held: Arc::new(AtomicBool::new(false)),
            value: Arc::new(Mutex::new(value)),
        }
    }

    /// Locks the value, panicking if `owner` is the calling thread and it
    /// already holds the guard.
    fn lock(&self, owner: &ThreadId, current: &ThreadId) -> MutexGuard<'_, T> {
        if owner == current && self.held.load(Ordering::Acquire) {
            panic!("{READ_WHILE_HELD}");
        }
        self.value.lock()
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            held: Arc::clone(&self.held),
            value: Arc::clone(&self.value),
        }
    }
}

/// Exclusive access to the calling thread's value, returned by
/// [`Combinable::local`].
pub struct LocalGuard<'a, T> {
    guard: ArcMutexGuard<RawMutex, T>,
    held: Arc<AtomicBool>,
    _owner: PhantomData<&'a Combinable<T>>,
}

impl<T> Deref for LocalGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for LocalGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for LocalGuard<'_, T> {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

/// Thread-local accumulator with merge operations.
pub struct Combinable<T> {
    init: Arc<dyn Fn() -> T + Send + Sync>,
    slots: RwLock<HashMap<ThreadId, Slot<T>>>,
}

impl<T: Default + 'static> Default for Combinable<T> {
    fn default() -> Self {
        Self::new(T::default)
    }
}

impl<T> Combinable<T> {
    /// Creates an empty accumulator whose per-thread values start as `init()`.
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let capacity = thread::available_parallelism().map_or(1, |n| n.get());
        Self {
            init: Arc::new(init),
            slots: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Returns the calling thread's value, creating it on first access.
    ///
    /// Later calls from the same thread reach the same value once the
    /// previous guard is dropped.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread still holds a guard from an earlier
    /// call.
    pub fn local(&self) -> LocalGuard<'_, T> {
        let id = thread::current().id();
        let existing = self.slots.read().get(&id).cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => self
                .slots
                .write()
                .entry(id)
                .or_insert_with(|| Slot::new((self.init)()))
                .clone(),
        };
        if slot.held.swap(true, Ordering::Acquire) {
            panic!("{REENTRANT_LOCAL}");
        }
        LocalGuard {
            guard: Mutex::lock_arc(&slot.value),
            held: slot.held,
            _owner: PhantomData,
        }
    }

    /// Number of threads that have created a value.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Returns true when no thread has called [`local`](Self::local).
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Applies `f` to every per-thread value, in unspecified order.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread holds its own [`LocalGuard`].
    pub fn combine_each<F>(&self, mut f: F)
    where
        F: FnMut(&T),
    {
        let current = thread::current().id();
        let slots = self.slots.read();
        for (id, slot) in slots.iter() {
            f(&slot.lock(id, &current));
        }
    }

    /// Applies `f` to every per-thread value mutably, in unspecified order.
    pub fn combine_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut T),
    {
        for slot in self.slots.get_mut().values() {
            f(&mut slot.value.lock());
        }
    }

    /// Discards every per-thread value.
    pub fn clear(&self) {
        self.slots.write().clear();
    }

    /// Moves all per-thread values into a new accumulator, leaving this one
    /// empty.
    pub fn take(&mut self) -> Self {
        Self {
            init: Arc::clone(&self.init),
            slots: RwLock::new(std::mem::take(self.slots.get_mut())),
        }
    }

    /// Consumes the accumulator and returns the per-thread values, in
    /// unspecified order.
    pub fn into_values(self) -> Vec<T> {
        self.slots
            .into_inner()
            .into_values()
            .filter_map(|slot| Arc::try_unwrap(slot.value).ok())
            .map(Mutex::into_inner)
            .collect()
    }
}

impl<T: Clone> Combinable<T> {
    /// Folds all per-thread values with `f`.
    ///
    /// Returns `init()` when no thread has a value and the single value
    /// itself when exactly one thread has. The fold order is unspecified, so
    /// `f` should be associative and commutative.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread holds its own [`LocalGuard`].
    pub fn combine<F>(&self, mut f: F) -> T
    where
        F: FnMut(T, &T) -> T,
    {
        let current = thread::current().id();
        let slots = self.slots.read();
        let mut values = slots.iter();
        let Some((id, first)) = values.next() else {
            return (self.init)();
        };
        let acc = first.lock(id, &current).clone();
        values.fold(acc, |acc, (id, slot)| f(acc, &slot.lock(id, &current)))
    }
}

impl<T: Clone> Clone for Combinable<T> {
    /// Snapshots every per-thread value under the shared lock.
    fn clone(&self) -> Self {
        let current = thread::current().id();
        let slots = self.slots.read();
        let copied = slots
            .iter()
            .map(|(id, slot)| (*id, Slot::new(slot.lock(id, &current).clone())))
            .collect();
        Self {
            init: Arc::clone(&self.init),
            slots: RwLock::new(copied),
        }
    }
}

impl<T> fmt::Debug for Combinable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Combinable")
            .field("threads", &self.len())
            .finish()
    }
}
