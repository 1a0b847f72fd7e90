//! Tokio driver for an [`Engine`].
//!
//! [`spawn`] moves the engine onto its own task and returns an
//! [`EngineHandle`] for feeding it frames. The task waits on a
//! `tokio::select!` loop over the shutdown token, the next timer deadline
//! (a deferred begin or a correlation expiry) and the event channel. Due timers are fired before each event is
//! applied so a deferred begin never trails a frame that arrived after its
//! deadline.

use std::time::Duration;

use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{Instant, sleep},
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span};

use crate::{
    engine::Engine,
    frame::Frame,
    scheduler::{Clock, SystemClock},
};

/// Work delivered to the engine task.
#[derive(Debug)]
pub enum Event {
    /// A frame on a request stream written by `partner`.
    Request { partner: String, frame: Frame },
    /// A frame on a reply stream written by `partner`.
    Reply { partner: String, frame: Frame },
    /// A Window or Reset frame `partner` sent against a stream the engine
    /// writes.
    Throttle { partner: String, frame: Frame },
    /// The transport lost a stream written by `partner`.
    Abort { partner: String, stream_id: u64 },
    /// Acknowledged once every earlier event has been applied.
    Flush(oneshot::Sender<()>),
}

/// Error returned when the engine task is no longer running.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("engine task has stopped")]
    Closed,
}

/// Sending side of a spawned engine.
#[derive(Clone, Debug)]
pub struct EngineHandle {
    tx: mpsc::Sender<Event>,
}

impl EngineHandle {
    /// Queue `event`, waiting for channel capacity.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Closed`] if the engine task has stopped.
    pub async fn send(&self, event: Event) -> Result<(), RuntimeError> {
        self.tx.send(event).await.map_err(|_| RuntimeError::Closed)
    }

    /// Queue a request-stream frame.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Closed`] if the engine task has stopped.
    pub async fn request(
        &self,
        partner: impl Into<String>,
        frame: impl Into<Frame>,
    ) -> Result<(), RuntimeError> {
        self.send(Event::Request {
            partner: partner.into(),
            frame: frame.into(),
        })
        .await
    }

    /// Queue a reply-stream frame.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Closed`] if the engine task has stopped.
    pub async fn reply(
        &self,
        partner: impl Into<String>,
        frame: impl Into<Frame>,
    ) -> Result<(), RuntimeError> {
        self.send(Event::Reply {
            partner: partner.into(),
            frame: frame.into(),
        })
        .await
    }

    /// Queue a throttle frame.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Closed`] if the engine task has stopped.
    pub async fn throttle(
        &self,
        partner: impl Into<String>,
        frame: impl Into<Frame>,
    ) -> Result<(), RuntimeError> {
        self.send(Event::Throttle {
            partner: partner.into(),
            frame: frame.into(),
        })
        .await
    }

    /// Queue the abort of a stream.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Closed`] if the engine task has stopped.
    pub async fn abort(&self, partner: impl Into<String>, stream_id: u64) -> Result<(), RuntimeError> {
        self.send(Event::Abort {
            partner: partner.into(),
            stream_id,
        })
        .await
    }

    /// Wait until every previously queued event has been applied.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Closed`] if the engine task stopped before
    /// acknowledging.
    pub async fn flush(&self) -> Result<(), RuntimeError> {
        let (ack, done) = oneshot::channel();
        self.send(Event::Flush(ack)).await?;
        done.await.map_err(|_| RuntimeError::Closed)
    }
}

/// Clock following tokio's time source, anchored to the wall clock when
/// created.
///
/// Under a paused tokio runtime it advances only with `tokio::time::advance`
/// or auto-advance, which lets tests drive deferred begins deterministically.
#[derive(Clone, Copy, Debug)]
pub struct TokioClock {
    origin: Instant,
    origin_millis: u64,
}

impl TokioClock {
    #[must_use]
    pub fn new() -> Self { Self::anchored_at(SystemClock.now_millis()) }

    /// A clock reading `epoch_millis` now.
    #[must_use]
    pub fn anchored_at(epoch_millis: u64) -> Self {
        Self {
            origin: Instant::now(),
            origin_millis: epoch_millis,
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self { Self::new() }
}

impl Clock for TokioClock {
    fn now_millis(&self) -> u64 {
        let elapsed = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.origin_millis.saturating_add(elapsed)
    }
}

/// Run `engine` on a new tokio task.
///
/// The task stops when `shutdown` is cancelled or every [`EngineHandle`] is
/// dropped, and yields the engine back through the join handle. `capacity`
/// bounds the event channel; zero is treated as one.
///
/// # Examples
///
/// ```
/// use http_push::{
///     Engine,
///     EngineConfig,
///     RouteTable,
///     runtime::{self, TokioClock},
/// };
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let engine = Engine::new(EngineConfig::default(), RouteTable::new(), TokioClock::new())
///     .expect("default configuration is valid");
/// let shutdown = CancellationToken::new();
/// let (handle, task) = runtime::spawn(engine, 16, shutdown.clone());
/// handle.flush().await.expect("engine running");
/// shutdown.cancel();
/// let engine = task.await.expect("engine task");
/// assert_eq!(engine.open_streams(), 0);
/// # }
/// ```
#[must_use]
pub fn spawn(
    engine: Engine,
    capacity: usize,
    shutdown: CancellationToken,
) -> (EngineHandle, JoinHandle<Engine>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(run(engine, rx, shutdown).instrument(info_span!("http_push_engine")));
    (EngineHandle { tx }, task)
}

async fn run(
    mut engine: Engine,
    mut rx: mpsc::Receiver<Event>,
    shutdown: CancellationToken,
) -> Engine {
    info!("engine started");
    loop {
        let wait = engine.time_to_next_deadline();
        tokio::select! {
            biased;

            () = shutdown.cancelled() => {
                info!("engine shutting down");
                break;
            }
            () = sleep(wait.unwrap_or(Duration::ZERO)), if wait.is_some() => {
                fire_timers(&mut engine);
            }
            event = rx.recv() => {
                let Some(event) = event else {
                    info!("engine channel closed");
                    break;
                };
                fire_timers(&mut engine);
                apply(&mut engine, event);
            }
        }
    }
    engine
}

fn fire_timers(engine: &mut Engine) {
    let fired = engine.poll_timers();
    if fired > 0 {
        debug!(fired, "deferred begins fired");
    }
}

fn apply(engine: &mut Engine, event: Event) {
    match event {
        Event::Request { partner, frame } => engine.on_request_frame(&partner, frame),
        Event::Reply { partner, frame } => engine.on_reply_frame(&partner, frame),
        Event::Throttle { partner, frame } => engine.on_throttle_frame(&partner, frame),
        Event::Abort { partner, stream_id } => {
            let released = engine.abort_stream(&partner, stream_id);
            debug!(%partner, stream_id, released, "stream abort applied");
        }
        Event::Flush(ack) => {
            // The requester may have given up waiting.
            let _ = ack.send(());
        }
    }
}
