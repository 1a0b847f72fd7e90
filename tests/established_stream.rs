//! Tests for reply streams and the push frames injected ahead of them.

use http_push::{EngineConfig, Route, RouteTable, header::PUSH_REPRESENTATION};
use http_push_testing::{
    EngineFixture,
    RecordingSink,
    SinkEvent,
    engine_fixture,
    frames::{begin, data, end, extension, headers, reply_begin, reset, window},
};
use proptest::prelude::*;
use rstest::rstest;

const PLAIN: &[(&str, &str)] = &[(":path", "/items")];
const SUBSCRIPTION: &[(&str, &str)] = &[(":path", "/feed"), ("x-retry-after", "30")];
const RESPONSE: &[(&str, &str)] = &[(":status", "200")];
const PUSH_COST: u32 = 100;

/// Fixture whose source sink reports a fixed cost for every push frame.
fn fixture_with_push_cost(cost: u32) -> EngineFixture {
    let mut routes = RouteTable::new();
    routes
        .add(Route::input(
            EngineFixture::SOURCE,
            EngineFixture::SOURCE_REF,
            EngineFixture::TARGET,
            EngineFixture::TARGET_REF,
        ))
        .expect("add input route");
    let (source, source_log) = RecordingSink::new(EngineFixture::SOURCE);
    let (target, target_log) = RecordingSink::new(EngineFixture::TARGET);
    EngineFixture::build(
        EngineConfig::default(),
        routes,
        source.with_push_cost(cost),
        target,
        source_log,
        target_log,
    )
}

/// Open a request with `pairs` and answer it on reply stream 10.
fn request_and_reply(fixture: &mut EngineFixture, pairs: &[(&str, &str)]) {
    fixture.request(begin(1, EngineFixture::SOURCE_REF, 7, pairs));
    fixture.reply(reply_begin(10, 1, RESPONSE));
}

#[rstest]
fn reply_is_relayed_under_requester_correlation(mut engine_fixture: EngineFixture) {
    request_and_reply(&mut engine_fixture, PLAIN);

    assert_eq!(
        engine_fixture.source.events(),
        vec![SinkEvent::Begin {
            stream_id: 2,
            reference_id: 0,
            correlation_id: 7,
            extension: extension(RESPONSE),
        }]
    );
    assert_eq!(engine_fixture.engine.correlation_count(), 0, "correlation consumed");
    assert_eq!(engine_fixture.engine.slab().free_slots(), 128, "staged slot released");
}

#[rstest]
fn reply_data_and_end_reach_the_requester(mut engine_fixture: EngineFixture) {
    request_and_reply(&mut engine_fixture, PLAIN);
    engine_fixture.reply(data(10, b"payload"));
    engine_fixture.reply(end(10));

    assert_eq!(engine_fixture.source.payloads(2), [&b"payload"[..]]);
    assert_eq!(engine_fixture.source.ends(), [2]);

    engine_fixture.source_throttle(window(2, 10));
    assert!(
        engine_fixture.target.windows(10).is_empty(),
        "throttle removed on end"
    );
}

#[rstest]
fn requester_credit_flows_to_destination(mut engine_fixture: EngineFixture) {
    request_and_reply(&mut engine_fixture, PLAIN);
    engine_fixture.source_throttle(window(2, 64));
    engine_fixture.source_throttle(window(2, 0));

    assert_eq!(engine_fixture.target.windows(10), [64], "zero credit is not relayed");
}

#[rstest]
fn requester_reset_reaches_destination(mut engine_fixture: EngineFixture) {
    request_and_reply(&mut engine_fixture, PLAIN);
    engine_fixture.source_throttle(reset(2));

    assert_eq!(engine_fixture.target.resets(), [10]);
    engine_fixture.reply(data(10, b"late"));
    assert!(engine_fixture.source.payloads(2).is_empty());
    assert_eq!(engine_fixture.target.windows(10), [4]);
}

#[rstest]
fn violation_after_reply_begin_ends_requester_stream(mut engine_fixture: EngineFixture) {
    request_and_reply(&mut engine_fixture, PLAIN);
    engine_fixture.reply(reply_begin(10, 1, RESPONSE));

    assert_eq!(engine_fixture.target.resets(), [10]);
    assert_eq!(engine_fixture.source.ends(), [2]);

    engine_fixture.source_throttle(window(2, 16));
    assert!(engine_fixture.target.windows(10).is_empty(), "throttle removed on reset");
    engine_fixture.reply(end(10));
    assert_eq!(engine_fixture.source.ends(), [2], "drained end is not relayed");
}

#[rstest]
fn reply_with_reference_is_rejected(mut engine_fixture: EngineFixture) {
    engine_fixture.request(begin(1, EngineFixture::SOURCE_REF, 7, PLAIN));
    engine_fixture.reply(begin(10, 5, 1, RESPONSE));

    assert_eq!(engine_fixture.target.resets(), [10]);
    assert!(engine_fixture.source.begins().is_empty());
    assert_eq!(engine_fixture.engine.correlation_count(), 1, "correlation untouched");
}

#[rstest]
fn reply_without_correlation_is_rejected(mut engine_fixture: EngineFixture) {
    engine_fixture.reply(reply_begin(10, 42, RESPONSE));

    assert_eq!(engine_fixture.target.resets(), [10]);
    assert!(engine_fixture.source.is_empty());

    engine_fixture.reply(reply_begin(10, 42, RESPONSE));
    assert_eq!(engine_fixture.target.resets(), [10], "drain ignores further begins");
    engine_fixture.reply(end(10));
    assert_eq!(engine_fixture.engine.open_streams(), 0);
}

#[rstest]
fn correlation_is_consumed_once(mut engine_fixture: EngineFixture) {
    request_and_reply(&mut engine_fixture, PLAIN);
    engine_fixture.reply(reply_begin(11, 1, RESPONSE));

    assert_eq!(engine_fixture.target.resets(), [11]);
    assert_eq!(engine_fixture.source.begins().len(), 1);
}

#[rstest]
fn plain_request_gets_no_push(mut engine_fixture: EngineFixture) {
    request_and_reply(&mut engine_fixture, PLAIN);
    assert!(engine_fixture.source.push_promises().is_empty());
}

#[test]
fn subscription_reply_is_preceded_by_push_frame() {
    let mut fixture = fixture_with_push_cost(PUSH_COST);
    request_and_reply(&mut fixture, SUBSCRIPTION);

    let events = fixture.source.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], SinkEvent::Begin { stream_id: 2, correlation_id: 7, .. }));
    assert_eq!(
        events[1],
        SinkEvent::PushPromise {
            stream_id: 2,
            headers: headers(SUBSCRIPTION).tagged(PUSH_REPRESENTATION),
        }
    );
    let SinkEvent::PushPromise { headers, .. } = &events[1] else {
        panic!("expected a push frame");
    };
    assert!(
        headers
            .iter()
            .all(|header| header.representation() == Some(PUSH_REPRESENTATION))
    );
}

#[test]
fn push_debt_absorbs_requester_credit() {
    let mut fixture = fixture_with_push_cost(PUSH_COST);
    request_and_reply(&mut fixture, SUBSCRIPTION);

    fixture.source_throttle(window(2, 60));
    assert!(fixture.target.windows(10).is_empty());
    fixture.source_throttle(window(2, 60));
    assert_eq!(fixture.target.windows(10), [20]);
    fixture.source_throttle(window(2, 8));
    assert_eq!(fixture.target.windows(10), [20, 8]);
}

#[test]
fn free_push_leaves_credit_untouched() {
    let mut fixture = fixture_with_push_cost(0);
    request_and_reply(&mut fixture, SUBSCRIPTION);
    fixture.source_throttle(window(2, 16));

    assert_eq!(fixture.source.push_promises().len(), 1);
    assert_eq!(fixture.target.windows(10), [16]);
}

#[test]
fn reply_for_departed_requester_is_rejected() {
    let mut routes = RouteTable::new();
    routes
        .add(Route::input("elsewhere", 1, EngineFixture::TARGET, 2))
        .expect("add input route");
    let (target, target_log) = RecordingSink::new(EngineFixture::TARGET);
    let clock = http_push_testing::ManualClock::new(0);
    let mut engine =
        http_push::Engine::new(EngineConfig::default(), routes, clock).expect("valid config");
    engine.register_sink(target).expect("register target");

    // "elsewhere" has no sink, so the reply has nowhere to go.
    engine.on_request_frame("elsewhere", begin(1, 1, 7, PLAIN));
    assert_eq!(target_log.begins().len(), 1);
    engine.on_reply_frame(EngineFixture::TARGET, reply_begin(10, 1, RESPONSE));

    assert_eq!(target_log.resets(), [10]);
    assert_eq!(engine.correlation_count(), 0);
}

proptest! {
    #[test]
    fn relayed_credit_is_bounded_by_push_debt(
        cost in 0u32..512,
        updates in prop::collection::vec(0u32..256, 0..24),
    ) {
        let mut fixture = fixture_with_push_cost(cost);
        request_and_reply(&mut fixture, SUBSCRIPTION);

        let mut received = 0u64;
        for update in updates {
            fixture.source_throttle(window(2, update));
            received += u64::from(update);
            let relayed = fixture.target.window_total(10);
            prop_assert!(relayed <= received.saturating_sub(u64::from(cost)));
            if received >= u64::from(cost) {
                prop_assert_eq!(relayed, received - u64::from(cost));
            }
        }
    }
}
