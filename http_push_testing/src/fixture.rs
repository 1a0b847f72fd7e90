//! Engine wired to a recording source and target.

use http_push::{Engine, EngineConfig, Frame, Route, RouteTable};
use rstest::fixture;

use crate::{ManualClock, RecordingSink, SinkLog};

/// An [`Engine`] with one input route from [`SOURCE`](Self::SOURCE) to
/// [`TARGET`](Self::TARGET), driven by a [`ManualClock`].
pub struct EngineFixture {
    pub engine: Engine,
    pub clock: ManualClock,
    /// Frames the engine wrote to the requesting partner.
    pub source: SinkLog,
    /// Frames the engine wrote to the destination partner.
    pub target: SinkLog,
}

impl EngineFixture {
    pub const SOURCE: &'static str = "source";
    pub const TARGET: &'static str = "target";
    pub const SOURCE_REF: u64 = 1;
    pub const TARGET_REF: u64 = 2;
    /// Clock reading when the fixture is created.
    pub const START_MILLIS: u64 = 1_000_000;

    pub fn new() -> Self { Self::with_config(EngineConfig::default()) }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut routes = RouteTable::new();
        routes
            .add(Route::input(
                Self::SOURCE,
                Self::SOURCE_REF,
                Self::TARGET,
                Self::TARGET_REF,
            ))
            .expect("add input route");
        let (source, source_log) = RecordingSink::new(Self::SOURCE);
        let (target, target_log) = RecordingSink::new(Self::TARGET);
        Self::build(config, routes, source, target, source_log, target_log)
    }

    /// Assemble a fixture from explicit parts.
    pub fn build(
        config: EngineConfig,
        routes: RouteTable,
        source: RecordingSink,
        target: RecordingSink,
        source_log: SinkLog,
        target_log: SinkLog,
    ) -> Self {
        let clock = ManualClock::new(Self::START_MILLIS);
        let mut engine = Engine::new(config, routes, clock.clone()).expect("valid engine config");
        engine.register_sink(source).expect("register source sink");
        engine.register_sink(target).expect("register target sink");
        Self {
            engine,
            clock,
            source: source_log,
            target: target_log,
        }
    }

    /// Deliver a frame on a request stream written by the source.
    pub fn request(&mut self, frame: Frame) { self.engine.on_request_frame(Self::SOURCE, frame); }

    /// Deliver a frame on a reply stream written by the target.
    pub fn reply(&mut self, frame: Frame) { self.engine.on_reply_frame(Self::TARGET, frame); }

    /// Deliver a throttle frame from the source, against a stream the
    /// engine writes to it.
    pub fn source_throttle(&mut self, frame: Frame) {
        self.engine.on_throttle_frame(Self::SOURCE, frame);
    }

    /// Deliver a throttle frame from the target, against a stream the
    /// engine writes to it.
    pub fn target_throttle(&mut self, frame: Frame) {
        self.engine.on_throttle_frame(Self::TARGET, frame);
    }

    /// Advance the clock by `millis` and fire due timers, returning how many
    /// deferred begins fired.
    pub fn advance(&mut self, millis: u64) -> usize {
        self.clock.advance(millis);
        self.engine.poll_timers()
    }
}

impl Default for EngineFixture {
    fn default() -> Self { Self::new() }
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn engine_fixture() -> EngineFixture { EngineFixture::new() }
