//! Fixed pool of fixed-size buffers used to stage request headers.
//!
//! Headers copied from a begin frame must outlive that frame: the reply that
//! consumes them arrives later, on a different stream. A [`Slab`] hands out
//! [`SlabSlot`]s, each owning one buffer exclusively until it is dropped.
//! Dropping a slot returns its buffer to the pool, so every exit path of the
//! owner releases it exactly once.

mod error;

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

pub use error::SlabError;
use log::warn;

enum SlotState {
    /// Available; the buffer is allocated on first use and kept afterwards.
    Free(Option<Box<[u8]>>),
    /// Owned by a live [`SlabSlot`].
    Taken,
}

struct SlabInner {
    slots: Vec<SlotState>,
    free: Vec<usize>,
}

/// Shared handle to a buffer pool.
///
/// Cloning the handle is cheap; clones address the same pool.
///
/// # Examples
///
/// ```
/// use http_push::Slab;
///
/// let slab = Slab::new(2, 64).expect("valid pool size");
/// let mut slot = slab.acquire(7).expect("free slot");
/// slot.write(b"headers").expect("fits in slot");
/// assert_eq!(slab.free_slots(), 1);
/// drop(slot);
/// assert_eq!(slab.free_slots(), 2);
/// ```
#[derive(Clone)]
pub struct Slab {
    inner: Arc<Mutex<SlabInner>>,
    slot_count: usize,
    slot_capacity: usize,
}

impl Slab {
    /// Create a pool of `slot_count` slots, each `slot_capacity` bytes long.
    ///
    /// # Errors
    ///
    /// Returns [`SlabError::InvalidSize`] if either dimension is zero.
    pub fn new(slot_count: usize, slot_capacity: usize) -> Result<Self, SlabError> {
        if slot_count == 0 || slot_capacity == 0 {
            return Err(SlabError::InvalidSize {
                slots: slot_count,
                capacity: slot_capacity,
            });
        }
        let slots = (0..slot_count).map(|_| SlotState::Free(None)).collect();
        // Reversed so that `pop` hands out low indices first.
        let free = (0..slot_count).rev().collect();
        Ok(Self {
            inner: Arc::new(Mutex::new(SlabInner { slots, free })),
            slot_count,
            slot_capacity,
        })
    }

    /// Take ownership of a free slot.
    ///
    /// The slot at `hint % slot_count` is preferred when free, which keeps a
    /// stream's staging slot stable across reuse.
    ///
    /// # Errors
    ///
    /// Returns [`SlabError::Exhausted`] when every slot is owned.
    pub fn acquire(&self, hint: u64) -> Result<SlabSlot, SlabError> {
        let mut inner = self.lock();
        let preferred = usize::try_from(hint % self.slot_count as u64).unwrap_or(0);
        let index = match inner.free.iter().position(|&index| index == preferred) {
            Some(position) => inner.free.swap_remove(position),
            None => inner.free.pop().ok_or(SlabError::Exhausted {
                slots: self.slot_count,
            })?,
        };
        let state = std::mem::replace(&mut inner.slots[index], SlotState::Taken);
        let buffer = match state {
            SlotState::Free(Some(buffer)) => buffer,
            SlotState::Free(None) | SlotState::Taken => vec![0; self.slot_capacity].into_boxed_slice(),
        };
        crate::metrics::set_slots_in_use(self.slot_count - inner.free.len());
        drop(inner);
        Ok(SlabSlot {
            slab: self.clone(),
            index,
            len: 0,
            buffer: Some(buffer),
        })
    }

    /// Number of slots not currently owned.
    #[must_use]
    pub fn free_slots(&self) -> usize { self.lock().free.len() }

    #[must_use]
    pub fn slot_count(&self) -> usize { self.slot_count }

    #[must_use]
    pub fn slot_capacity(&self) -> usize { self.slot_capacity }

    fn release_slot(&self, index: usize, buffer: Box<[u8]>) -> Result<(), SlabError> {
        let mut inner = self.lock();
        let state = inner.slots.get_mut(index).ok_or(SlabError::UnknownSlot(index))?;
        if matches!(state, SlotState::Free(_)) {
            return Err(SlabError::DoubleRelease(index));
        }
        *state = SlotState::Free(Some(buffer));
        inner.free.push(index);
        crate::metrics::set_slots_in_use(self.slot_count - inner.free.len());
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, SlabInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Slab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slab")
            .field("slot_count", &self.slot_count)
            .field("slot_capacity", &self.slot_capacity)
            .field("free_slots", &self.free_slots())
            .finish()
    }
}

/// Exclusive ownership of one slab buffer.
///
/// The slot tracks how many leading bytes of its buffer hold staged data.
#[must_use = "dropping a slot immediately returns it to the pool"]
pub struct SlabSlot {
    slab: Slab,
    index: usize,
    len: usize,
    // `None` only while the slot is being returned in `drop`.
    buffer: Option<Box<[u8]>>,
}

impl SlabSlot {
    /// Position of this slot within its pool.
    #[must_use]
    pub fn index(&self) -> usize { self.index }

    /// Number of staged bytes.
    #[must_use]
    pub fn len(&self) -> usize { self.len }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len == 0 }

    #[must_use]
    pub fn capacity(&self) -> usize { self.slab.slot_capacity }

    /// The staged bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_deref().map_or(&[], |buffer| &buffer[..self.len])
    }

    /// The whole fixed-size buffer, for callers that encode in place.
    /// Follow up with [`set_len`](Self::set_len).
    pub fn buffer_mut(&mut self) -> &mut [u8] { self.buffer.as_deref_mut().unwrap_or_default() }

    /// Mark the first `len` bytes of the buffer as staged.
    ///
    /// # Errors
    ///
    /// Returns [`SlabError::SlotOverflow`] if `len` exceeds the slot capacity.
    pub fn set_len(&mut self, len: usize) -> Result<(), SlabError> {
        if len > self.capacity() {
            return Err(SlabError::SlotOverflow {
                needed: len,
                capacity: self.capacity(),
            });
        }
        self.len = len;
        Ok(())
    }

    /// Replace the staged bytes with `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`SlabError::SlotOverflow`] if `bytes` does not fit; the slot
    /// is left unchanged.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), SlabError> {
        let capacity = self.capacity();
        let buffer = self.buffer_mut();
        let Some(target) = buffer.get_mut(..bytes.len()) else {
            return Err(SlabError::SlotOverflow {
                needed: bytes.len(),
                capacity,
            });
        };
        target.copy_from_slice(bytes);
        self.len = bytes.len();
        Ok(())
    }

    /// Return the slot to its pool now rather than at end of scope.
    pub fn release(self) { drop(self); }
}

impl Drop for SlabSlot {
    fn drop(&mut self) {
        let Some(buffer) = self.buffer.take() else {
            return;
        };
        if let Err(error) = self.slab.release_slot(self.index, buffer) {
            warn!("failed to return slab slot: index={}, error={error}", self.index);
            debug_assert!(false, "slab slot {} returned inconsistently: {error}", self.index);
        }
    }
}

impl fmt::Debug for SlabSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlabSlot")
            .field("index", &self.index)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}
