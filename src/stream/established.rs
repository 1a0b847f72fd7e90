//! State machine for reply streams a destination opens towards the engine.
//!
//! A reply begin is matched to its request through the correlation store,
//! relayed to the requester under the requester's own correlation id and,
//! when the request was a poll subscription, preceded by a synthetic push
//! frame replaying the request headers. The push consumes requester credit
//! nobody granted on this stream, so the reply's throttle carries that debt
//! until the requester's window updates have paid it off.

use bytes::Bytes;
use log::{debug, warn};

use super::{Context, Disposition, StreamKey};
use crate::{
    correlation::Correlation,
    frame::{BeginFrame, Frame, FrameKind},
    header::PUSH_REPRESENTATION,
    metrics::{self, Role},
    route::RouteKind,
    throttle::{ThrottleDebt, ThrottleOwner},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EstablishedState {
    BeforeBegin,
    AfterBeginOrData,
    AfterEnd,
    AfterRejectOrReset,
}

/// The requester-facing stream a reply is relayed on.
#[derive(Debug)]
struct Requester {
    sink: String,
    stream_id: u64,
}

impl Requester {
    fn key(&self) -> StreamKey { StreamKey::new(self.sink.as_str(), self.stream_id) }
}

pub(crate) struct EstablishedStream {
    key: StreamKey,
    state: EstablishedState,
    requester: Option<Requester>,
    debt: ThrottleDebt,
}

impl EstablishedStream {
    pub(crate) fn new(key: StreamKey) -> Self {
        Self {
            key,
            state: EstablishedState::BeforeBegin,
            requester: None,
            debt: ThrottleDebt::default(),
        }
    }

    pub(crate) fn on_frame(&mut self, ctx: &mut Context, frame: Frame) -> Disposition {
        match (self.state, frame) {
            (EstablishedState::BeforeBegin, Frame::Begin(begin)) => self.on_begin(ctx, begin),
            (EstablishedState::AfterBeginOrData, Frame::Data(data)) => {
                self.on_data(ctx, data.payload);
            }
            (EstablishedState::AfterBeginOrData, Frame::End(_)) => return self.on_end(ctx),
            (EstablishedState::AfterRejectOrReset, Frame::Data(data)) => {
                let refund = u32::try_from(data.payload.len()).unwrap_or(u32::MAX);
                ctx.sinks
                    .window(self.key.partner(), self.key.stream_id(), refund);
            }
            (EstablishedState::AfterRejectOrReset, Frame::End(_)) => {
                self.state = EstablishedState::AfterEnd;
                return Disposition::Remove;
            }
            (EstablishedState::AfterRejectOrReset, frame) => {
                debug!(
                    "ignoring {} frame on drained reply stream: stream={}",
                    frame.kind(),
                    self.key
                );
            }
            (_, frame) => self.reject(ctx, frame.kind()),
        }
        Disposition::Retain
    }

    /// Handle Window and Reset frames the requester sends back on the reply.
    pub(crate) fn on_throttle(&mut self, ctx: &mut Context, frame: Frame) {
        match frame {
            Frame::Window(window) => match self.debt.on_window(window.update) {
                Some(credit) => {
                    ctx.sinks
                        .window(self.key.partner(), self.key.stream_id(), credit);
                }
                None => debug!(
                    "withholding reply credit: stream={}, update={}, debt={}",
                    self.key,
                    window.update,
                    self.debt.outstanding()
                ),
            },
            Frame::Reset(_) => {
                debug!("requester reset reply stream: stream={}", self.key);
                if let Some(requester) = self.requester.take() {
                    ctx.throttles.remove(&requester.key());
                }
                ctx.sinks.reset(self.key.partner(), self.key.stream_id());
                metrics::inc_resets(Role::Reply);
                self.state = EstablishedState::AfterRejectOrReset;
            }
            other => debug!(
                "ignoring {} frame on reply throttle: stream={}",
                other.kind(),
                self.key
            ),
        }
    }

    /// Drop the reply's throttle registration.
    pub(crate) fn abandon(&mut self, ctx: &mut Context) {
        if let Some(requester) = self.requester.take() {
            ctx.throttles.remove(&requester.key());
        }
    }

    fn on_begin(&mut self, ctx: &mut Context, begin: BeginFrame) {
        if begin.reference_id != 0 {
            warn!(
                "reply begin carries a reference: stream={}, reference_id={}",
                self.key, begin.reference_id
            );
            self.reject(ctx, FrameKind::Begin);
            return;
        }
        let Some(correlation) = ctx.correlations.take(begin.correlation_id) else {
            warn!(
                "reply begin has no correlation: stream={}, correlation_id={}",
                self.key, begin.correlation_id
            );
            self.reject(ctx, FrameKind::Begin);
            return;
        };
        if correlation.kind() != RouteKind::OutputEstablished
            || !ctx.sinks.contains(correlation.source())
        {
            warn!(
                "reply begin cannot reach requester: stream={}, source={}, kind={:?}",
                self.key,
                correlation.source(),
                correlation.kind()
            );
            self.reject(ctx, FrameKind::Begin);
            return;
        }

        let reply_id = ctx.stream_ids.next_id();
        self.relay_begin(ctx, &correlation, reply_id, begin.extension);
        ctx.throttles.add(
            StreamKey::new(correlation.source(), reply_id),
            ThrottleOwner::Established(self.key.clone()),
        );
        self.requester = Some(Requester {
            sink: correlation.source().to_owned(),
            stream_id: reply_id,
        });
        self.state = EstablishedState::AfterBeginOrData;
    }

    /// Forward the reply begin, preceded by a push frame for poll requests.
    fn relay_begin(
        &mut self,
        ctx: &mut Context,
        correlation: &Correlation,
        reply_id: u64,
        extension: Bytes,
    ) {
        let staged = match correlation.staged_headers() {
            Ok(staged) => staged.filter(|headers| headers.contains(&ctx.config.poll_header)),
            Err(error) => {
                warn!(
                    "staged request headers are unreadable, replying without push: stream={}, error={error}",
                    self.key
                );
                None
            }
        };
        let Some(sink) = ctx.sinks.get_mut(correlation.source()) else {
            return;
        };
        sink.begin(reply_id, 0, correlation.id(), extension);

        if let Some(headers) = staged {
            self.debt.lock();
            let consumed = sink.push_promise(reply_id, &headers.tagged(PUSH_REPRESENTATION));
            self.debt.charge(consumed);
            metrics::inc_push_promises();
            debug!(
                "push frame emitted: stream={}, requester={}#{reply_id}, consumed={consumed}",
                self.key,
                correlation.source()
            );
            if let Some(credit) = self.debt.unlock() {
                ctx.sinks
                    .window(self.key.partner(), self.key.stream_id(), credit);
            }
        }
    }

    fn on_data(&mut self, ctx: &mut Context, payload: Bytes) {
        let Some(requester) = self.requester.as_ref() else {
            return;
        };
        match ctx.sinks.get_mut(&requester.sink) {
            Some(sink) => sink.data(requester.stream_id, payload),
            None => debug!(
                "dropping reply data for unregistered sink: sink={}",
                requester.sink
            ),
        }
    }

    fn on_end(&mut self, ctx: &mut Context) -> Disposition {
        self.state = EstablishedState::AfterEnd;
        if let Some(requester) = self.requester.take() {
            ctx.sinks.end(&requester.sink, requester.stream_id);
            ctx.throttles.remove(&requester.key());
        }
        Disposition::Remove
    }

    fn reject(&mut self, ctx: &mut Context, kind: FrameKind) {
        warn!(
            "resetting reply stream: stream={}, frame={kind}, state={:?}",
            self.key, self.state
        );
        ctx.sinks.reset(self.key.partner(), self.key.stream_id());
        metrics::inc_resets(Role::Reply);
        if let Some(requester) = self.requester.as_ref() {
            ctx.sinks.end(&requester.sink, requester.stream_id);
        }
        self.abandon(ctx);
        self.state = EstablishedState::AfterRejectOrReset;
    }
}
