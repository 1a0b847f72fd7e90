//! Errors produced by the header staging pool.

use thiserror::Error;

/// Errors returned by [`Slab`](super::Slab) and [`SlabSlot`](super::SlabSlot).
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SlabError {
    /// The pool was configured with no slots or zero-sized slots.
    #[error("invalid slab size; slots={slots}, capacity={capacity}; each must be >= 1")]
    InvalidSize { slots: usize, capacity: usize },
    /// Every slot is currently owned.
    #[error("all {slots} slab slots are in use")]
    Exhausted { slots: usize },
    /// The bytes to stage do not fit in one slot.
    #[error("{needed} bytes exceed the {capacity}-byte slab slot")]
    SlotOverflow { needed: usize, capacity: usize },
    /// A slot was returned to the pool while already free.
    #[error("slab slot {0} was released twice")]
    DoubleRelease(usize),
    /// A slot index outside the pool was returned.
    #[error("slab slot {0} does not exist")]
    UnknownSlot(usize),
}
