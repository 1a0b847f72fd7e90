//! Write-side handles to partner streams.
//!
//! A [`FrameSink`] is the engine's view of one named partner: it can open,
//! feed and close streams towards that partner and send credit or resets back
//! along streams the partner writes. Encoding and delivery belong to the
//! transport behind the sink.

use std::collections::{HashMap, hash_map::Entry};

use bytes::Bytes;
use log::debug;

use crate::{error::PushError, header::HeaderList};

/// Emits frames to one named partner.
pub trait FrameSink: Send {
    /// Name under which routes and correlations refer to this partner.
    fn name(&self) -> &str;

    fn begin(&mut self, stream_id: u64, reference_id: u64, correlation_id: u64, extension: Bytes);

    fn data(&mut self, stream_id: u64, payload: Bytes);

    fn end(&mut self, stream_id: u64);

    /// Grant `update` bytes of credit on a stream the partner writes.
    fn window(&mut self, stream_id: u64, update: u32);

    /// Abort a stream the partner writes.
    fn reset(&mut self, stream_id: u64);

    /// Emit an unsolicited push frame carrying `headers` on `stream_id`,
    /// returning the bytes of the partner's window it consumed.
    fn push_promise(&mut self, stream_id: u64, headers: &HeaderList) -> u32;
}

/// Registered sinks, looked up by partner name.
#[derive(Default)]
pub struct SinkDirectory {
    sinks: HashMap<String, Box<dyn FrameSink>>,
}

impl SinkDirectory {
    /// Register `sink` under its own name.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::DuplicateSink`] if the name is already taken.
    pub fn register(&mut self, sink: Box<dyn FrameSink>) -> Result<(), PushError> {
        match self.sinks.entry(sink.name().to_owned()) {
            Entry::Occupied(entry) => Err(PushError::DuplicateSink(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(sink);
                Ok(())
            }
        }
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn FrameSink + 'static)> {
        self.sinks.get_mut(name).map(|sink| &mut **sink)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool { self.sinks.contains_key(name) }

    /// Send a reset to `name`, if registered.
    pub fn reset(&mut self, name: &str, stream_id: u64) {
        match self.get_mut(name) {
            Some(sink) => sink.reset(stream_id),
            None => debug!("dropping reset for unregistered sink: sink={name}, stream_id={stream_id}"),
        }
    }

    /// Send credit to `name`, if registered.
    pub fn window(&mut self, name: &str, stream_id: u64, update: u32) {
        match self.get_mut(name) {
            Some(sink) => sink.window(stream_id, update),
            None => debug!("dropping window for unregistered sink: sink={name}, stream_id={stream_id}"),
        }
    }

    /// Close a stream towards `name`, if registered.
    pub fn end(&mut self, name: &str, stream_id: u64) {
        match self.get_mut(name) {
            Some(sink) => sink.end(stream_id),
            None => debug!("dropping end for unregistered sink: sink={name}, stream_id={stream_id}"),
        }
    }
}

impl std::fmt::Debug for SinkDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.sinks.keys()).finish()
    }
}
