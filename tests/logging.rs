//! Tests for the diagnostics emitted by the stream state machines.

use http_push_testing::{
    EngineFixture,
    LoggerHandle,
    frames::{begin, data, reply_begin},
    logger,
};
use rstest::rstest;
use serial_test::serial;

#[rstest]
#[serial]
fn protocol_violation_is_logged_at_warn(mut logger: LoggerHandle) {
    let mut fixture = EngineFixture::new();
    fixture.request(data(1, b"no begin"));

    let warnings = logger.messages_at(log::Level::Warn);
    assert!(
        warnings
            .iter()
            .any(|msg| msg.contains("resetting request stream") && msg.contains("source#1")),
        "missing reset warning: {warnings:?}"
    );
}

#[rstest]
#[serial]
fn uncorrelated_reply_is_logged(mut logger: LoggerHandle) {
    let mut fixture = EngineFixture::new();
    fixture.reply(reply_begin(10, 42, &[]));

    let warnings = logger.messages_at(log::Level::Warn);
    assert!(
        warnings
            .iter()
            .any(|msg| msg.contains("no correlation") && msg.contains("correlation_id=42")),
        "missing correlation warning: {warnings:?}"
    );
}

#[rstest]
#[serial]
fn invalid_poll_interval_names_the_value(mut logger: LoggerHandle) {
    let mut fixture = EngineFixture::new();
    fixture.request(begin(
        1,
        EngineFixture::SOURCE_REF,
        7,
        &[("x-retry-after", "soon"), ("x-poll-injected", "no-cache")],
    ));

    let warnings = logger.messages_at(log::Level::Warn);
    assert!(
        warnings.iter().any(|msg| msg.contains("failed to relay request begin")
            && msg.contains("soon")),
        "missing relay failure warning: {warnings:?}"
    );
}

#[rstest]
#[serial]
fn deferral_is_logged_at_debug(mut logger: LoggerHandle) {
    let mut fixture = EngineFixture::new();
    fixture.request(begin(
        1,
        EngineFixture::SOURCE_REF,
        7,
        &[("x-retry-after", "2"), ("x-poll-injected", "no-cache")],
    ));
    fixture.advance(2_000);

    let debug = logger.messages_at(log::Level::Debug);
    assert!(debug.iter().any(|msg| msg.contains("deferring poll begin")));
    assert!(debug.iter().any(|msg| msg.contains("deferred begin fired")));
}
