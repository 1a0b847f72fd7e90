//! Destination-facing begins postponed until a poll interval elapses.

use bytes::Bytes;
use log::{debug, warn};

use super::{Context, StreamKey};
use crate::{
    metrics,
    route::Route,
    slab::SlabSlot,
    throttle::ThrottleOwner,
};

/// A begin scheduled on behalf of an inbound poll request.
///
/// The slot holds the encoded extension with the injected headers stripped.
/// It is released when the task fires or is cancelled.
#[derive(Debug)]
pub(crate) struct DeferredBegin {
    target: String,
    target_ref: u64,
    stream_id: u64,
    owner: StreamKey,
    extension: SlabSlot,
}

impl DeferredBegin {
    pub(crate) fn new(route: &Route, stream_id: u64, owner: StreamKey, extension: SlabSlot) -> Self {
        Self {
            target: route.target.clone(),
            target_ref: route.target_ref,
            stream_id,
            owner,
            extension,
        }
    }

    /// The destination-facing correlation id, equal to the stream id it opens.
    pub(crate) fn correlation_id(&self) -> u64 { self.stream_id }

    pub(crate) fn stream_id(&self) -> u64 { self.stream_id }

    pub(crate) fn owner(&self) -> &StreamKey { &self.owner }

    /// Issue the begin.
    ///
    /// When the owning request is still open the throttle is attached so its
    /// credit flows back; otherwise the request already ended and the begin
    /// is closed straight away. Returns `false` if the destination is no
    /// longer registered and nothing was emitted.
    pub(crate) fn fire(self, ctx: &mut Context, owner_open: bool) -> bool {
        let Self {
            target,
            target_ref,
            stream_id,
            owner,
            extension,
        } = self;
        let payload = Bytes::copy_from_slice(extension.as_bytes());
        extension.release();

        let Some(sink) = ctx.sinks.get_mut(&target) else {
            warn!("dropping deferred begin for unregistered sink: sink={target}, owner={owner}");
            ctx.correlations.remove(stream_id);
            return false;
        };
        sink.begin(stream_id, target_ref, stream_id, payload);
        metrics::inc_deferred_begins();
        debug!("deferred begin fired: owner={owner}, target={target}#{stream_id}, open={owner_open}");

        if owner_open {
            ctx.throttles
                .add(StreamKey::new(target, stream_id), ThrottleOwner::Inbound(owner));
        } else {
            sink.end(stream_id);
        }
        true
    }
}
