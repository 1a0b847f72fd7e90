//! Unit tests for header lists, the extension codec and poll stripping.

use rstest::rstest;

use super::*;

fn list(pairs: &[(&str, &str)]) -> HeaderList {
    pairs
        .iter()
        .map(|(name, value)| HttpHeader::new(*name, *value))
        .collect()
}

#[test]
fn extension_survives_encoding() {
    let ex = HttpBeginEx::new(list(&[(":method", "GET"), (":path", "/items")]));
    let bytes = ex.encode().expect("encode extension");
    let decoded = HttpBeginEx::decode(&bytes).expect("decode extension");
    assert_eq!(decoded, ex);
}

#[test]
fn decode_rejects_trailing_bytes() {
    let mut bytes = list(&[("a", "b")]).encode().expect("encode list");
    bytes.push(0xff);
    let err = HeaderList::decode(&bytes).expect_err("trailing byte should be rejected");
    assert!(matches!(err, HeaderError::TrailingBytes { len, .. } if len == bytes.len()));
}

#[test]
fn decode_rejects_truncated_input() {
    let bytes = list(&[("name", "value")]).encode().expect("encode list");
    let err = HeaderList::decode(&bytes[..bytes.len() - 1]).expect_err("truncated list");
    assert!(matches!(err, HeaderError::Decode(_)));
}

#[test]
fn lookups_ignore_ascii_case() {
    let headers = list(&[("Cache-Control", "no-cache"), ("X-Retry-After", "5")]);
    assert!(headers.contains("cache-control"));
    assert_eq!(headers.get(POLL_HEADER_NAME).map(HttpHeader::value), Some("5"));
}

#[test]
fn tagging_marks_every_header() {
    let tagged = list(&[("a", "1"), ("b", "2")]).tagged(PUSH_REPRESENTATION);
    assert!(tagged.iter().all(|h| h.representation() == Some(PUSH_REPRESENTATION)));
}

#[rstest]
#[case::absent(&[], Ok(None))]
#[case::seconds(&[("x-retry-after", "30")], Ok(Some(30)))]
#[case::padded(&[("x-retry-after", " 7 ")], Ok(Some(7)))]
fn parses_poll_interval(#[case] pairs: &[(&str, &str)], #[case] expected: Result<Option<u32>, ()>) {
    let parsed = poll_interval(&list(pairs), POLL_HEADER_NAME).map_err(|_| ());
    assert_eq!(parsed, expected);
}

#[rstest]
#[case::negative("-1")]
#[case::fraction("1.5")]
#[case::word("soon")]
fn rejects_invalid_poll_interval(#[case] value: &str) {
    let err = poll_interval(&list(&[(POLL_HEADER_NAME, value)]), POLL_HEADER_NAME)
        .expect_err("interval should be rejected");
    assert!(matches!(err, HeaderError::InvalidPollInterval(v) if v == value));
}

#[rstest]
#[case::exact_no_cache(
    &[(":path", "/"), ("x-poll-injected", "no-cache"), ("cache-control", "no-cache")],
    &[(":path", "/")]
)]
#[case::mixed_directives(
    &[("cache-control", "max-age=0, no-cache"), ("x-poll-injected", "no-cache")],
    &[("cache-control", "max-age=0")]
)]
#[case::no_cache_absent(
    &[("cache-control", "max-age=10"), ("x-poll-injected", "no-cache")],
    &[("cache-control", "max-age=10")]
)]
#[case::order_preserved(
    &[("a", "1"), ("cache-control", "no-store, no-cache"), ("x-poll-injected", "no-cache"), ("b", "2")],
    &[("a", "1"), ("cache-control", "no-store"), ("b", "2")]
)]
#[case::client_no_cache_kept(
    &[("x-poll-injected", "etag"), ("cache-control", "no-cache")],
    &[("cache-control", "no-cache")]
)]
#[case::empty_marker_keeps_directives(
    &[("cache-control", "no-store, no-cache"), ("x-poll-injected", "")],
    &[("cache-control", "no-store, no-cache")]
)]
#[case::marker_without_cache_control(
    &[(":path", "/"), ("X-Poll-Injected", "max-age=0, no-cache")],
    &[(":path", "/")]
)]
fn strips_injected_directives(#[case] input: &[(&str, &str)], #[case] expected: &[(&str, &str)]) {
    let stripped = strip_injected(&list(input), INJECTED_HEADER_NAME).expect("strip headers");
    assert_eq!(stripped, list(expected));
}

#[test]
fn stripping_reports_malformed_cache_control() {
    let headers = list(&[("x-poll-injected", "no-cache"), ("cache-control", "private=\"open")]);
    let err = strip_injected(&headers, INJECTED_HEADER_NAME).expect_err("malformed value");
    assert!(matches!(err, HeaderError::MalformedCacheControl { .. }));
}

#[test]
fn untouched_cache_control_is_not_parsed() {
    let headers = list(&[("x-poll-injected", "etag"), ("cache-control", "private=\"open")]);
    let stripped = strip_injected(&headers, INJECTED_HEADER_NAME).expect("left verbatim");
    assert_eq!(stripped, list(&[("cache-control", "private=\"open")]));
}
