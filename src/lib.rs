#![doc(html_root_url = "https://docs.rs/http_push/latest")]
//! Public API for the `http_push` library.
//!
//! This crate terminates request streams, correlates them with the reply
//! streams their destinations open, and replays the headers of poll
//! subscriptions to the requester as unsolicited push frames while keeping
//! flow-control credit consistent.

pub mod config;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod frame;
pub mod header;
pub mod metrics;
pub mod route;
pub mod runtime;
pub mod scheduler;
pub mod sink;
pub mod slab;
mod stream;
pub mod throttle;

pub use config::EngineConfig;
pub use correlation::{Correlation, CorrelationStore};
pub use engine::Engine;
pub use error::{PushError, Result};
pub use frame::{BeginFrame, DataFrame, EndFrame, Frame, FrameKind, ResetFrame, WindowFrame};
pub use header::{HeaderList, HttpBeginEx, HttpHeader};
pub use metrics::Role;
pub use route::{Route, RouteKind, RouteResolver, RouteTable};
pub use runtime::{EngineHandle, Event, RuntimeError, TokioClock};
pub use scheduler::{Clock, Scheduler, SystemClock};
pub use sink::{FrameSink, SinkDirectory};
pub use slab::{Slab, SlabSlot};
pub use stream::StreamKey;
pub use throttle::{ThrottleDebt, ThrottleOwner, ThrottleTable};
