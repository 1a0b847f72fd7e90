//! State machine for request streams arriving from a source partner.
//!
//! On Begin the request is routed, its headers are staged for the reply side,
//! and the destination-facing begin is issued either at once or, for poll
//! subscriptions, when the poll interval elapses. Credit granted by the
//! destination is relayed to the source and bounds the data forwarded.

use bytes::Bytes;
use log::{debug, warn};

use super::{Context, DeferredBegin, Disposition, StreamKey};
use crate::{
    correlation::Correlation,
    error::PushError,
    frame::{BeginFrame, Frame, FrameKind},
    header::{HttpBeginEx, poll_interval, strip_injected},
    metrics::{self, Role},
    route::{Route, RouteKind},
    throttle::ThrottleOwner,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InboundState {
    BeforeBegin,
    AfterBeginOrData,
    AfterEnd,
    /// Rejected or answered locally; only Data refunds and End are honoured.
    AfterReplyOrReset,
}

/// The destination-facing stream a request is relayed to.
#[derive(Debug)]
struct TargetBinding {
    sink: String,
    stream_id: u64,
    /// `false` while the begin is deferred.
    opened: bool,
    /// Credit granted by the destination and not yet used by forwarded data.
    credit: u32,
}

impl TargetBinding {
    fn key(&self) -> StreamKey { StreamKey::new(self.sink.as_str(), self.stream_id) }
}

pub(crate) struct InboundStream {
    key: StreamKey,
    state: InboundState,
    target: Option<TargetBinding>,
}

impl InboundStream {
    pub(crate) fn new(key: StreamKey) -> Self {
        Self {
            key,
            state: InboundState::BeforeBegin,
            target: None,
        }
    }

    pub(crate) fn on_frame(&mut self, ctx: &mut Context, frame: Frame) -> Disposition {
        match (self.state, frame) {
            (InboundState::BeforeBegin, Frame::Begin(begin)) => self.on_begin(ctx, &begin),
            (InboundState::AfterBeginOrData, Frame::Data(data)) => self.on_data(ctx, data.payload),
            (InboundState::AfterBeginOrData, Frame::End(_)) => return self.on_end(ctx),
            (InboundState::AfterReplyOrReset, Frame::Data(data)) => {
                // Hand back the credit the discarded payload consumed.
                let refund = u32::try_from(data.payload.len()).unwrap_or(u32::MAX);
                ctx.sinks
                    .window(self.key.partner(), self.key.stream_id(), refund);
            }
            (InboundState::AfterReplyOrReset, Frame::End(_)) => {
                self.state = InboundState::AfterEnd;
                return Disposition::Remove;
            }
            (InboundState::AfterReplyOrReset, frame) => {
                debug!(
                    "ignoring {} frame on drained request stream: stream={}",
                    frame.kind(),
                    self.key
                );
            }
            (_, frame) => self.reject(ctx, frame.kind()),
        }
        Disposition::Retain
    }

    /// Handle Window and Reset frames sent back by the destination.
    pub(crate) fn on_throttle(&mut self, ctx: &mut Context, frame: Frame) {
        match frame {
            Frame::Window(window) => {
                if let Some(target) = self.target.as_mut() {
                    target.credit = target.credit.saturating_add(window.update);
                }
                ctx.sinks
                    .window(self.key.partner(), self.key.stream_id(), window.update);
            }
            Frame::Reset(_) => {
                debug!("destination reset request stream: stream={}", self.key);
                if let Some(target) = self.target.take() {
                    ctx.throttles.remove(&target.key());
                    ctx.correlations.remove(target.stream_id);
                }
                ctx.sinks.reset(self.key.partner(), self.key.stream_id());
                metrics::inc_resets(Role::Request);
                self.state = InboundState::AfterReplyOrReset;
            }
            other => debug!(
                "ignoring {} frame on request throttle: stream={}",
                other.kind(),
                self.key
            ),
        }
    }

    /// Whether the deferred begin opening `stream_id` belongs to this stream
    /// and should stay attached to it.
    pub(crate) fn awaits_deferred_begin(&self, stream_id: u64) -> bool {
        self.state == InboundState::AfterBeginOrData
            && self
                .target
                .as_ref()
                .is_some_and(|target| !target.opened && target.stream_id == stream_id)
    }

    /// Record the outcome of the deferred destination-facing begin.
    pub(crate) fn on_deferred_begin(&mut self, ctx: &mut Context, issued: bool) {
        match self.target.as_mut() {
            Some(target) if issued => target.opened = true,
            _ => self.reject(ctx, FrameKind::Begin),
        }
    }

    /// Withdraw everything this stream left pending in the shared context.
    ///
    /// A correlation already taken by the destination's reply is unaffected.
    pub(crate) fn abandon(&mut self, ctx: &mut Context) {
        ctx.cancel_deferred(&self.key);
        if let Some(target) = self.target.take() {
            ctx.throttles.remove(&target.key());
            ctx.correlations.remove(target.stream_id);
        }
    }

    fn on_begin(&mut self, ctx: &mut Context, begin: &BeginFrame) {
        let Some(route) = ctx.routes.resolve(begin.reference_id).into_iter().next() else {
            self.reply_unroutable(ctx, begin);
            return;
        };
        match self.relay_begin(ctx, begin, &route) {
            Ok(target) => {
                self.target = Some(target);
                self.state = InboundState::AfterBeginOrData;
            }
            Err(error) => {
                warn!(
                    "failed to relay request begin: stream={}, target={}, error={error}",
                    self.key, route.target
                );
                self.reject(ctx, FrameKind::Begin);
            }
        }
    }

    /// Stage the request, publish its correlation, then issue or defer the
    /// destination-facing begin. Every fallible step runs before any frame is
    /// emitted.
    fn relay_begin(
        &self,
        ctx: &mut Context,
        begin: &BeginFrame,
        route: &Route,
    ) -> Result<TargetBinding, PushError> {
        if !ctx.sinks.contains(&route.target) {
            return Err(PushError::UnknownSink(route.target.clone()));
        }
        let extension = HttpBeginEx::decode(&begin.extension)?;
        let headers = extension.headers();

        let mut staged = ctx.slab.acquire(begin.stream_id)?;
        staged.write(&headers.encode()?)?;

        let now = ctx.clock.now_millis();
        let poll = if headers.contains(&ctx.config.poll_header)
            && headers.contains(&ctx.config.injected_header)
        {
            let interval = poll_interval(headers, &ctx.config.poll_header)?.unwrap_or_default();
            let stripped = strip_injected(headers, &ctx.config.injected_header)?;
            let mut slot = ctx.slab.acquire(begin.stream_id.wrapping_add(1))?;
            slot.write(&HttpBeginEx::new(stripped).encode()?)?;
            let deadline = now.saturating_add(u64::from(interval) * 1000);
            Some((deadline, slot))
        } else {
            None
        };

        let target_id = ctx.stream_ids.next_id();
        let expiry = ctx.correlation_expiry(poll.as_ref().map_or(now, |(deadline, _)| *deadline));
        ctx.correlations.insert(
            target_id,
            Correlation::new(
                begin.correlation_id,
                self.key.partner(),
                RouteKind::OutputEstablished,
                Some(staged),
                expiry,
            ),
        )?;

        let opened = match poll {
            Some((deadline, slot)) => {
                debug!(
                    "deferring poll begin: stream={}, target={}#{target_id}, deadline={deadline}",
                    self.key, route.target
                );
                ctx.scheduler.schedule(
                    deadline,
                    self.key.clone(),
                    DeferredBegin::new(route, target_id, self.key.clone(), slot),
                );
                false
            }
            None => {
                if let Some(sink) = ctx.sinks.get_mut(&route.target) {
                    sink.begin(target_id, route.target_ref, target_id, begin.extension.clone());
                }
                ctx.throttles.add(
                    StreamKey::new(route.target.as_str(), target_id),
                    ThrottleOwner::Inbound(self.key.clone()),
                );
                true
            }
        };

        Ok(TargetBinding {
            sink: route.target.clone(),
            stream_id: target_id,
            opened,
            credit: 0,
        })
    }

    /// Answer a request with no destination on its reply route, if one exists.
    fn reply_unroutable(&mut self, ctx: &mut Context, begin: &BeginFrame) {
        match ctx.routes.resolve_reply(begin.reference_id, self.key.partner()) {
            Some(route) => {
                let reply_id = ctx.stream_ids.next_id();
                debug!(
                    "no destination for request, ending reply path: stream={}, reference_id={}, reply={}#{reply_id}",
                    self.key, begin.reference_id, route.target
                );
                ctx.sinks.end(&route.target, reply_id);
                self.state = InboundState::AfterReplyOrReset;
            }
            None => {
                warn!(
                    "no route for request: stream={}, reference_id={}",
                    self.key, begin.reference_id
                );
                self.reject(ctx, FrameKind::Begin);
            }
        }
    }

    fn on_data(&mut self, ctx: &mut Context, payload: Bytes) {
        let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        let forward = match self.target.as_mut() {
            Some(target) if target.opened && len <= target.credit => {
                target.credit -= len;
                Some((target.sink.clone(), target.stream_id))
            }
            Some(target) if !target.opened && payload.is_empty() => return,
            _ => None,
        };
        match forward {
            Some((sink, stream_id)) => match ctx.sinks.get_mut(&sink) {
                Some(sink) => sink.data(stream_id, payload),
                None => debug!("dropping request data for unregistered sink: sink={sink}"),
            },
            None => {
                warn!(
                    "request data exceeds destination credit: stream={}, len={len}",
                    self.key
                );
                self.reject(ctx, FrameKind::Data);
            }
        }
    }

    fn on_end(&mut self, ctx: &mut Context) -> Disposition {
        self.state = InboundState::AfterEnd;
        // A still-deferred begin is followed by End when it fires.
        if let Some(target) = self.target.take().filter(|target| target.opened) {
            ctx.sinks.end(&target.sink, target.stream_id);
            ctx.throttles.remove(&target.key());
        }
        Disposition::Remove
    }

    fn reject(&mut self, ctx: &mut Context, kind: FrameKind) {
        warn!(
            "resetting request stream: stream={}, frame={kind}, state={:?}",
            self.key, self.state
        );
        ctx.sinks.reset(self.key.partner(), self.key.stream_id());
        metrics::inc_resets(Role::Request);
        if let Some(target) = self.target.as_ref().filter(|target| target.opened) {
            ctx.sinks.end(&target.sink, target.stream_id);
        }
        self.abandon(ctx);
        self.state = InboundState::AfterReplyOrReset;
    }
}
