//! Links between request streams and the reply streams they cause.
//!
//! The inbound side creates a [`Correlation`] when it issues a
//! destination-facing begin; the established side takes it back when the
//! destination's reply begins. The store is keyed by the destination-facing
//! stream id, which doubles as the correlation id the destination echoes.
//! Taking a correlation removes it, and dropping it releases its staged slot.

use std::collections::{HashMap, hash_map::Entry};

use thiserror::Error;

use crate::{
    header::{HeaderError, HeaderList},
    route::RouteKind,
    slab::SlabSlot,
};

/// Errors returned by [`CorrelationStore`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum CorrelationError {
    /// A live correlation already uses the key.
    #[error("correlation {0} is already registered")]
    Duplicate(u64),
}

/// State carried from a request to its eventual reply.
#[derive(Debug)]
pub struct Correlation {
    id: u64,
    source: String,
    kind: RouteKind,
    slot: Option<SlabSlot>,
    expires_at: u64,
}

impl Correlation {
    /// Create a correlation.
    ///
    /// `id` is the requester's own correlation id, restored on the reply;
    /// `source` names the requesting partner; `slot` holds the request's
    /// staged headers, if any.
    #[must_use]
    pub fn new(
        id: u64,
        source: impl Into<String>,
        kind: RouteKind,
        slot: Option<SlabSlot>,
        expires_at: u64,
    ) -> Self {
        Self {
            id,
            source: source.into(),
            kind,
            slot,
            expires_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 { self.id }

    #[must_use]
    pub fn source(&self) -> &str { &self.source }

    #[must_use]
    pub fn kind(&self) -> RouteKind { self.kind }

    #[must_use]
    pub fn slot(&self) -> Option<&SlabSlot> { self.slot.as_ref() }

    /// Number of staged header bytes; zero when no slot is held.
    #[must_use]
    pub fn stored_len(&self) -> usize { self.slot.as_ref().map_or(0, SlabSlot::len) }

    #[must_use]
    pub fn expires_at(&self) -> u64 { self.expires_at }

    /// Decode the staged request headers.
    ///
    /// Returns `Ok(None)` when no slot is held or the slot is empty.
    ///
    /// # Errors
    ///
    /// Returns a [`HeaderError`] if the staged bytes do not decode.
    pub fn staged_headers(&self) -> Result<Option<HeaderList>, HeaderError> {
        match self.slot.as_ref() {
            Some(slot) if !slot.is_empty() => HeaderList::decode(slot.as_bytes()).map(Some),
            _ => Ok(None),
        }
    }
}

/// Live correlations of one processing context.
#[derive(Debug, Default)]
pub struct CorrelationStore {
    entries: HashMap<u64, Correlation>,
}

impl CorrelationStore {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Publish `correlation` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CorrelationError::Duplicate`] if `key` is already live; the
    /// rejected correlation is dropped, releasing its slot.
    pub fn insert(&mut self, key: u64, correlation: Correlation) -> Result<(), CorrelationError> {
        match self.entries.entry(key) {
            Entry::Occupied(_) => Err(CorrelationError::Duplicate(key)),
            Entry::Vacant(entry) => {
                entry.insert(correlation);
                Ok(())
            }
        }
    }

    /// Remove and return the correlation for `key`.
    pub fn take(&mut self, key: u64) -> Option<Correlation> { self.entries.remove(&key) }

    /// Drop the correlation for `key`, releasing its slot. Returns whether
    /// one was live.
    pub fn remove(&mut self, key: u64) -> bool { self.entries.remove(&key).is_some() }

    #[must_use]
    pub fn contains(&self, key: u64) -> bool { self.entries.contains_key(&key) }

    /// Drop every correlation expiring at or before `now`, returning how many.
    pub fn purge_expired(&mut self, now: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, correlation| correlation.expires_at > now);
        before - self.entries.len()
    }

    /// Earliest expiry among live correlations, in epoch milliseconds.
    #[must_use]
    pub fn next_expiry(&self) -> Option<u64> {
        self.entries.values().map(Correlation::expires_at).min()
    }

    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}
