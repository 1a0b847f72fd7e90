//! Per-stream state machines and the context they share.
//!
//! [`InboundStream`] handles request streams arriving from a source partner;
//! [`EstablishedStream`] handles the reply streams a destination opens in
//! response. The two never reference each other: the inbound side publishes a
//! [`Correlation`](crate::Correlation) and the established side takes it, both
//! through the shared [`Context`].

mod deferred;
mod established;
mod inbound;

use std::fmt;

pub(crate) use deferred::DeferredBegin;
pub(crate) use established::EstablishedStream;
pub(crate) use inbound::InboundStream;

use crate::{
    config::EngineConfig,
    correlation::CorrelationStore,
    route::RouteResolver,
    scheduler::{Clock, Scheduler},
    sink::SinkDirectory,
    slab::Slab,
    throttle::ThrottleTable,
};

/// Identifies a stream by the partner on the other end and its stream id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StreamKey {
    partner: String,
    stream_id: u64,
}

impl StreamKey {
    #[must_use]
    pub fn new(partner: impl Into<String>, stream_id: u64) -> Self {
        Self {
            partner: partner.into(),
            stream_id,
        }
    }

    #[must_use]
    pub fn partner(&self) -> &str { &self.partner }

    #[must_use]
    pub fn stream_id(&self) -> u64 { self.stream_id }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.partner, self.stream_id)
    }
}

/// Whether the engine keeps a state machine registered after a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Disposition {
    Retain,
    Remove,
}

/// Allocates ids for streams the engine opens.
#[derive(Debug)]
pub(crate) struct StreamIds {
    next: u64,
}

impl Default for StreamIds {
    fn default() -> Self { Self { next: 1 } }
}

impl StreamIds {
    pub(crate) fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Resources shared by every stream of one processing context.
pub(crate) struct Context {
    pub(crate) config: EngineConfig,
    pub(crate) routes: Box<dyn RouteResolver>,
    pub(crate) sinks: SinkDirectory,
    pub(crate) slab: Slab,
    pub(crate) correlations: CorrelationStore,
    pub(crate) scheduler: Scheduler<StreamKey, DeferredBegin>,
    pub(crate) throttles: ThrottleTable,
    pub(crate) stream_ids: StreamIds,
    pub(crate) clock: Box<dyn Clock>,
}

impl Context {
    /// Expiry for a correlation whose reply can be expected from `from` on.
    pub(crate) fn correlation_expiry(&self, from: u64) -> u64 {
        from.saturating_add(self.config.correlation_timeout_millis())
    }

    /// Cancel the deferred begins scheduled by `owner`, dropping the
    /// correlations they would have served. Returns how many were cancelled.
    pub(crate) fn cancel_deferred(&mut self, owner: &StreamKey) -> usize {
        let cancelled = self.scheduler.cancel(owner);
        for deferred in &cancelled {
            self.correlations.remove(deferred.correlation_id());
        }
        cancelled.len()
    }
}
