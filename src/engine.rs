//! Frame dispatch for one processing context.
//!
//! The [`Engine`] owns every stream state machine of its partition together
//! with the resources they share. It is driven purely by frame arrival and
//! timer polling; it never blocks and performs no I/O itself. Frames for an
//! unknown stream id create a fresh state machine, so a first frame that is
//! not a Begin resets the stream.

use std::{collections::HashMap, fmt, time::Duration};

use log::debug;

use crate::{
    config::EngineConfig,
    correlation::CorrelationStore,
    error::Result,
    frame::Frame,
    metrics::{self, Role},
    route::RouteResolver,
    scheduler::{Clock, Scheduler},
    sink::{FrameSink, SinkDirectory},
    slab::Slab,
    stream::{Context, Disposition, EstablishedStream, InboundStream, StreamIds, StreamKey},
    throttle::{ThrottleOwner, ThrottleTable},
};

/// Correlates request streams with reply streams and injects push frames.
///
/// # Examples
///
/// ```
/// use http_push::{Engine, EngineConfig, RouteTable, SystemClock};
///
/// let engine = Engine::new(EngineConfig::default(), RouteTable::new(), SystemClock)
///     .expect("default configuration is valid");
/// assert_eq!(engine.open_streams(), 0);
/// assert_eq!(engine.slab().free_slots(), 128);
/// ```
pub struct Engine {
    ctx: Context,
    inbound: HashMap<StreamKey, InboundStream>,
    established: HashMap<StreamKey, EstablishedStream>,
}

impl Engine {
    /// Create an engine with a freshly allocated buffer pool.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Config`](crate::PushError::Config) if `config`
    /// fails validation.
    pub fn new(
        config: EngineConfig,
        routes: impl RouteResolver + 'static,
        clock: impl Clock + 'static,
    ) -> Result<Self> {
        config.validate()?;
        let slab = Slab::new(config.slab_slot_count, config.slab_slot_capacity)?;
        Ok(Self {
            ctx: Context {
                config,
                routes: Box::new(routes),
                sinks: SinkDirectory::default(),
                slab,
                correlations: CorrelationStore::new(),
                scheduler: Scheduler::new(),
                throttles: ThrottleTable::default(),
                stream_ids: StreamIds::default(),
                clock: Box::new(clock),
            },
            inbound: HashMap::new(),
            established: HashMap::new(),
        })
    }

    /// Register the write-side handle of a partner.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::DuplicateSink`](crate::PushError::DuplicateSink)
    /// if a sink with the same name is already registered.
    pub fn register_sink(&mut self, sink: impl FrameSink + 'static) -> Result<()> {
        self.ctx.sinks.register(Box::new(sink))
    }

    /// Handle a frame on a request stream written by `partner`.
    pub fn on_request_frame(&mut self, partner: &str, frame: Frame) {
        metrics::inc_frames(Role::Request);
        let key = StreamKey::new(partner, frame.stream_id());
        let stream = self
            .inbound
            .entry(key.clone())
            .or_insert_with(|| InboundStream::new(key.clone()));
        if stream.on_frame(&mut self.ctx, frame) == Disposition::Remove {
            self.inbound.remove(&key);
        }
    }

    /// Handle a frame on a reply stream written by `partner`.
    pub fn on_reply_frame(&mut self, partner: &str, frame: Frame) {
        metrics::inc_frames(Role::Reply);
        let key = StreamKey::new(partner, frame.stream_id());
        let stream = self
            .established
            .entry(key.clone())
            .or_insert_with(|| EstablishedStream::new(key.clone()));
        if stream.on_frame(&mut self.ctx, frame) == Disposition::Remove {
            self.established.remove(&key);
        }
    }

    /// Handle a Window or Reset frame `partner` sent against a stream the
    /// engine writes to it.
    pub fn on_throttle_frame(&mut self, partner: &str, frame: Frame) {
        metrics::inc_frames(Role::Throttle);
        let key = StreamKey::new(partner, frame.stream_id());
        match self.ctx.throttles.owner(&key).cloned() {
            Some(ThrottleOwner::Inbound(owner)) => match self.inbound.get_mut(&owner) {
                Some(stream) => stream.on_throttle(&mut self.ctx, frame),
                None => debug!("ignoring throttle for closed request: stream={key}, owner={owner}"),
            },
            Some(ThrottleOwner::Established(owner)) => match self.established.get_mut(&owner) {
                Some(stream) => stream.on_throttle(&mut self.ctx, frame),
                None => debug!("ignoring throttle for closed reply: stream={key}, owner={owner}"),
            },
            None => debug!(
                "ignoring {} frame for unthrottled stream: stream={key}",
                frame.kind()
            ),
        }
    }

    /// Tear down the stream `partner` writes as `stream_id` without emitting
    /// frames, for use when the transport loses the stream.
    ///
    /// Deferred begins the stream scheduled are cancelled even when the
    /// stream itself already ended. Returns `true` if anything was released.
    pub fn abort_stream(&mut self, partner: &str, stream_id: u64) -> bool {
        let key = StreamKey::new(partner, stream_id);
        let mut released = false;
        if let Some(mut stream) = self.inbound.remove(&key) {
            stream.abandon(&mut self.ctx);
            released = true;
        }
        if let Some(mut stream) = self.established.remove(&key) {
            stream.abandon(&mut self.ctx);
            released = true;
        }
        let cancelled = self.ctx.cancel_deferred(&key);
        if released || cancelled > 0 {
            debug!("stream aborted: stream={key}, cancelled_begins={cancelled}");
        }
        released || cancelled > 0
    }

    /// Fire due deferred begins and drop expired correlations.
    ///
    /// Returns the number of deferred begins fired.
    pub fn poll_timers(&mut self) -> usize {
        let now = self.ctx.clock.now_millis();
        let due = self.ctx.scheduler.pop_expired(now);
        let fired = due.len();
        for task in due {
            let owner = task.owner().clone();
            let stream_id = task.stream_id();
            let owner_open = self
                .inbound
                .get(&owner)
                .is_some_and(|stream| stream.awaits_deferred_begin(stream_id));
            let issued = task.fire(&mut self.ctx, owner_open);
            if owner_open {
                if let Some(stream) = self.inbound.get_mut(&owner) {
                    stream.on_deferred_begin(&mut self.ctx, issued);
                }
            }
        }
        let purged = self.ctx.correlations.purge_expired(now);
        if purged > 0 {
            debug!("purged expired correlations: count={purged}, now={now}");
        }
        fired
    }

    /// Earliest instant [`poll_timers`](Self::poll_timers) has work to do,
    /// in epoch milliseconds: a deferred begin falling due or a correlation
    /// expiring.
    pub fn next_deadline(&mut self) -> Option<u64> {
        let deferred = self.ctx.scheduler.next_deadline();
        let expiry = self.ctx.correlations.next_expiry();
        match (deferred, expiry) {
            (Some(deferred), Some(expiry)) => Some(deferred.min(expiry)),
            (deferred, expiry) => deferred.or(expiry),
        }
    }

    /// Time left until [`next_deadline`](Self::next_deadline) by the
    /// engine's clock; zero once it has passed.
    pub fn time_to_next_deadline(&mut self) -> Option<Duration> {
        let deadline = self.next_deadline()?;
        let now = self.ctx.clock.now_millis();
        Some(Duration::from_millis(deadline.saturating_sub(now)))
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig { &self.ctx.config }

    /// The buffer pool shared by this engine's streams.
    #[must_use]
    pub fn slab(&self) -> &Slab { &self.ctx.slab }

    #[must_use]
    pub fn correlation_count(&self) -> usize { self.ctx.correlations.len() }

    #[must_use]
    pub fn pending_timers(&self) -> usize { self.ctx.scheduler.len() }

    /// Number of registered request and reply state machines.
    #[must_use]
    pub fn open_streams(&self) -> usize { self.inbound.len() + self.established.len() }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("sinks", &self.ctx.sinks)
            .field("slab", &self.ctx.slab)
            .field("inbound", &self.inbound.len())
            .field("established", &self.established.len())
            .field("correlations", &self.ctx.correlations.len())
            .field("pending_timers", &self.ctx.scheduler.len())
            .finish_non_exhaustive()
    }
}
