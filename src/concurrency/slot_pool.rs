use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::{Error, Result};

/// A fixed set of reusable slots leased to callers one at a time.
///
/// Free slot indices travel through a channel; a caller blocks until one is free.
/// A leased slot is returned when its [`SlotGuard`] drops. After [`SlotPool::close`]
/// every acquisition fails with [`Error::BuilderClosed`].
pub struct SlotPool<T> {
    slots: Box<[Mutex<T>]>,
    free_tx: Sender<usize>,
    free_rx: Receiver<usize>,
    closed: AtomicBool,
}

impl<T> SlotPool<T>
where
    T: Send,
{
    pub fn new(slots: Vec<T>) -> Self {
        let (free_tx, free_rx) = unbounded();
        for index in 0..slots.len() {
            // The receiver lives in `self`, so sending cannot fail here.
            let _ = free_tx.send(index);
        }
        Self {
            slots: slots.into_iter().map(Mutex::new).collect(),
            free_tx,
            free_rx,
            closed: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Leases a free slot, blocking while all slots are in use.
    ///
    /// # Returns
    /// * `Ok(SlotGuard)` - Exclusive access to one slot until the guard drops
    /// * `Err(Error::BuilderClosed)` - The pool was closed before or while waiting
    pub fn acquire(&self) -> Result<SlotGuard<'_, T>> {
        if self.is_closed() {
            return Err(Error::BuilderClosed);
        }
        let index = self.free_rx.recv().map_err(|_| Error::BuilderClosed)?;
        if self.is_closed() {
            self.release(index);
            return Err(Error::BuilderClosed);
        }
        Ok(SlotGuard {
            slot: lock(&self.slots[index]),
            _lease: Lease { pool: self, index },
        })
    }

    /// Closes the pool and hands every slot to `drain` once its lease has ended.
    ///
    /// Blocks until all outstanding guards are dropped. Callers waiting in
    /// [`SlotPool::acquire`] are woken and fail with [`Error::BuilderClosed`].
    pub fn close<F>(&self, mut drain: F) -> Result<()>
    where
        F: FnMut(&mut T),
    {
        self.closed.store(true, Ordering::Release);
        let mut indices = Vec::with_capacity(self.slots.len());
        while indices.len() < self.slots.len() {
            indices.push(self.free_rx.recv().map_err(|_| Error::BuilderClosed)?);
        }

        for &index in &indices {
            drain(&mut lock(&self.slots[index]));
        }
        for index in indices {
            self.release(index);
        }
        Ok(())
    }

    fn release(&self, index: usize) {
        let _ = self.free_tx.send(index);
    }
}

fn lock<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Exclusive lease on one slot of a [`SlotPool`].
///
/// Fields drop in declaration order: the slot is unlocked before its index is
/// handed back to the pool.
pub struct SlotGuard<'a, T>
where
    T: Send,
{
    slot: MutexGuard<'a, T>,
    _lease: Lease<'a, T>,
}

struct Lease<'a, T>
where
    T: Send,
{
    pool: &'a SlotPool<T>,
    index: usize,
}

impl<T> Drop for Lease<'_, T>
where
    T: Send,
{
    fn drop(&mut self) {
        self.pool.release(self.index);
    }
}

impl<T> Deref for SlotGuard<'_, T>
where
    T: Send,
{
    type Target = T;

    fn deref(&self) -> &T {
        &self.slot
    }
}

impl<T> DerefMut for SlotGuard<'_, T>
where
    T: Send,
{
    fn deref_mut(&mut self) -> &mut T {
        &mut self.slot
    }
}
