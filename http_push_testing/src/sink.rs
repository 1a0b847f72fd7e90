//! Frame sink that records everything the engine emits.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use http_push::{FrameSink, HeaderList};

/// A frame emitted to a [`RecordingSink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkEvent {
    Begin {
        stream_id: u64,
        reference_id: u64,
        correlation_id: u64,
        extension: Bytes,
    },
    Data {
        stream_id: u64,
        payload: Bytes,
    },
    End {
        stream_id: u64,
    },
    Window {
        stream_id: u64,
        update: u32,
    },
    Reset {
        stream_id: u64,
    },
    PushPromise {
        stream_id: u64,
        headers: HeaderList,
    },
}

/// Shared view of the events recorded by one sink.
#[derive(Clone, Debug, Default)]
pub struct SinkLog {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl SinkLog {
    fn lock(&self) -> MutexGuard<'_, Vec<SinkEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: SinkEvent) { self.lock().push(event); }

    /// Snapshot of every recorded event, oldest first.
    pub fn events(&self) -> Vec<SinkEvent> { self.lock().clone() }

    /// Remove and return every recorded event.
    pub fn take(&self) -> Vec<SinkEvent> { std::mem::take(&mut *self.lock()) }

    pub fn is_empty(&self) -> bool { self.lock().is_empty() }

    pub fn begins(&self) -> Vec<SinkEvent> {
        self.filtered(|event| matches!(event, SinkEvent::Begin { .. }))
    }

    pub fn push_promises(&self) -> Vec<SinkEvent> {
        self.filtered(|event| matches!(event, SinkEvent::PushPromise { .. }))
    }

    /// Stream ids reset, in order.
    pub fn resets(&self) -> Vec<u64> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Reset { stream_id } => Some(*stream_id),
                _ => None,
            })
            .collect()
    }

    /// Stream ids ended, in order.
    pub fn ends(&self) -> Vec<u64> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::End { stream_id } => Some(*stream_id),
                _ => None,
            })
            .collect()
    }

    /// Window updates granted on `stream_id`, in order.
    pub fn windows(&self, stream_id: u64) -> Vec<u32> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Window {
                    stream_id: id,
                    update,
                } if *id == stream_id => Some(*update),
                _ => None,
            })
            .collect()
    }

    /// Total credit granted on `stream_id`.
    pub fn window_total(&self, stream_id: u64) -> u64 {
        self.windows(stream_id).into_iter().map(u64::from).sum()
    }

    /// Payloads forwarded on `stream_id`, in order.
    pub fn payloads(&self, stream_id: u64) -> Vec<Bytes> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Data {
                    stream_id: id,
                    payload,
                } if *id == stream_id => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    fn filtered(&self, keep: impl Fn(&SinkEvent) -> bool) -> Vec<SinkEvent> {
        self.lock().iter().filter(|event| keep(event)).cloned().collect()
    }
}

/// [`FrameSink`] that appends every emitted frame to a [`SinkLog`].
#[derive(Debug)]
pub struct RecordingSink {
    name: String,
    log: SinkLog,
    push_cost: Option<u32>,
}

impl RecordingSink {
    /// Create a sink and the log it records into.
    pub fn new(name: impl Into<String>) -> (Self, SinkLog) {
        let log = SinkLog::default();
        (
            Self {
                name: name.into(),
                log: log.clone(),
                push_cost: None,
            },
            log,
        )
    }

    /// Report `cost` bytes consumed by every push frame instead of the
    /// encoded size of its headers.
    #[must_use]
    pub fn with_push_cost(mut self, cost: u32) -> Self {
        self.push_cost = Some(cost);
        self
    }
}

impl FrameSink for RecordingSink {
    fn name(&self) -> &str { &self.name }

    fn begin(&mut self, stream_id: u64, reference_id: u64, correlation_id: u64, extension: Bytes) {
        self.log.record(SinkEvent::Begin {
            stream_id,
            reference_id,
            correlation_id,
            extension,
        });
    }

    fn data(&mut self, stream_id: u64, payload: Bytes) {
        self.log.record(SinkEvent::Data { stream_id, payload });
    }

    fn end(&mut self, stream_id: u64) { self.log.record(SinkEvent::End { stream_id }); }

    fn window(&mut self, stream_id: u64, update: u32) {
        self.log.record(SinkEvent::Window { stream_id, update });
    }

    fn reset(&mut self, stream_id: u64) { self.log.record(SinkEvent::Reset { stream_id }); }

    fn push_promise(&mut self, stream_id: u64, headers: &HeaderList) -> u32 {
        let cost = self.push_cost.unwrap_or_else(|| {
            headers
                .encode()
                .map_or(0, |bytes| u32::try_from(bytes.len()).unwrap_or(u32::MAX))
        });
        self.log.record(SinkEvent::PushPromise {
            stream_id,
            headers: headers.clone(),
        });
        cost
    }
}
