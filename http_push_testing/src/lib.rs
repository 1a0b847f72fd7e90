//! Utilities for driving an [`Engine`](http_push::Engine) in tests.
//!
//! [`RecordingSink`] captures every frame the engine emits to a partner,
//! [`ManualClock`] lets deferred begins fire on demand, and
//! [`EngineFixture`] wires both around a single source/target route.
//!
//! ```rust
//! use http_push_testing::{EngineFixture, frames};
//!
//! let mut fixture = EngineFixture::new();
//! fixture.request(frames::begin(1, EngineFixture::SOURCE_REF, 7, &[(":path", "/")]));
//! assert_eq!(fixture.target.begins().len(), 1);
//! ```

pub mod clock;
pub mod fixture;
pub mod frames;
pub mod logging;
pub mod sink;

pub use clock::ManualClock;
pub use fixture::{EngineFixture, engine_fixture};
pub use logging::{LoggerHandle, logger};
pub use sink::{RecordingSink, SinkEvent, SinkLog};
