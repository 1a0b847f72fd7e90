//! Frame and header builders.

use bytes::Bytes;
use http_push::{
    BeginFrame,
    DataFrame,
    EndFrame,
    Frame,
    HeaderList,
    HttpBeginEx,
    HttpHeader,
    ResetFrame,
    WindowFrame,
};

/// Build a header list from `(name, value)` pairs.
pub fn headers(pairs: &[(&str, &str)]) -> HeaderList {
    pairs
        .iter()
        .map(|(name, value)| HttpHeader::new(*name, *value))
        .collect()
}

/// Encode `(name, value)` pairs as a begin extension.
pub fn extension(pairs: &[(&str, &str)]) -> Bytes {
    HttpBeginEx::new(headers(pairs))
        .encode()
        .expect("encode begin extension")
}

/// Decode the headers of a begin extension.
pub fn decode_extension(extension: &[u8]) -> HeaderList {
    HttpBeginEx::decode(extension)
        .expect("decode begin extension")
        .into_headers()
}

/// A request begin carrying `pairs` as its headers.
pub fn begin(stream_id: u64, reference_id: u64, correlation_id: u64, pairs: &[(&str, &str)]) -> Frame {
    begin_with_extension(stream_id, reference_id, correlation_id, extension(pairs))
}

pub fn begin_with_extension(
    stream_id: u64,
    reference_id: u64,
    correlation_id: u64,
    extension: Bytes,
) -> Frame {
    Frame::Begin(BeginFrame {
        stream_id,
        reference_id,
        correlation_id,
        extension,
    })
}

/// A reply begin: zero reference, echoing the destination-facing correlation id.
pub fn reply_begin(stream_id: u64, correlation_id: u64, pairs: &[(&str, &str)]) -> Frame {
    begin(stream_id, 0, correlation_id, pairs)
}

pub fn data(stream_id: u64, payload: &[u8]) -> Frame {
    Frame::Data(DataFrame {
        stream_id,
        payload: Bytes::copy_from_slice(payload),
    })
}

pub fn end(stream_id: u64) -> Frame { Frame::End(EndFrame { stream_id }) }

pub fn window(stream_id: u64, update: u32) -> Frame { Frame::Window(WindowFrame { stream_id, update }) }

pub fn reset(stream_id: u64) -> Frame { Frame::Reset(ResetFrame { stream_id }) }
