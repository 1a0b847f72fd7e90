//! HTTP header lists carried in begin extensions.
//!
//! Requests and replies carry their headers as an [`HttpBeginEx`] encoded with
//! bincode's standard configuration. The same encoding is used when a header
//! list is staged in a [`SlabSlot`](crate::SlabSlot), so a staged slot can be
//! decoded back into a [`HeaderList`] by an unrelated stream later on.

pub mod cache_control;
mod error;

use bincode::{Decode, Encode, config, decode_from_slice, encode_to_vec};
use bytes::Bytes;
pub use cache_control::CacheControl;
pub use error::HeaderError;

/// Default name of the header marking directives injected upstream.
pub const INJECTED_HEADER_NAME: &str = "x-poll-injected";
/// Default name of the header carrying a subscription's poll interval.
pub const POLL_HEADER_NAME: &str = "x-retry-after";
/// Name of the cache directives header.
pub const CACHE_CONTROL: &str = "cache-control";
/// Directive removed from deferred poll requests.
pub const NO_CACHE: &str = "no-cache";
/// Representation tag applied to every header of a synthetic push frame.
pub const PUSH_REPRESENTATION: u8 = 0;

/// A single header pair.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct HttpHeader {
    representation: Option<u8>,
    name: String,
    value: String,
}

impl HttpHeader {
    /// Create an untagged header.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            representation: None,
            name: name.into(),
            value: value.into(),
        }
    }

    /// Tag the header with a representation flag.
    #[must_use]
    pub fn with_representation(mut self, representation: u8) -> Self {
        self.representation = Some(representation);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    #[must_use]
    pub fn value(&self) -> &str { &self.value }

    #[must_use]
    pub fn representation(&self) -> Option<u8> { self.representation }

    /// Returns `true` if the header name matches `name`, ignoring ASCII case.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool { self.name.eq_ignore_ascii_case(name) }
}

/// Ordered list of headers. Duplicate names are preserved.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct HeaderList(Vec<HttpHeader>);

impl HeaderList {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self { Self(Vec::with_capacity(capacity)) }

    pub fn push(&mut self, header: HttpHeader) { self.0.push(header); }

    pub fn iter(&self) -> std::slice::Iter<'_, HttpHeader> { self.0.iter() }

    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Returns `true` if any header is named `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool { self.0.iter().any(|h| h.is_named(name)) }

    /// First header named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&HttpHeader> { self.0.iter().find(|h| h.is_named(name)) }

    /// Copy of the list with every header tagged with `representation`.
    #[must_use]
    pub fn tagged(&self, representation: u8) -> Self {
        self.0
            .iter()
            .cloned()
            .map(|h| h.with_representation(representation))
            .collect()
    }

    /// Serialise the list for staging.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::Encode`] if bincode rejects the list.
    pub fn encode(&self) -> Result<Vec<u8>, HeaderError> {
        Ok(encode_to_vec(self, config::standard())?)
    }

    /// Decode a list staged with [`HeaderList::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::Decode`] for malformed input and
    /// [`HeaderError::TrailingBytes`] when bytes remain after the list.
    pub fn decode(bytes: &[u8]) -> Result<Self, HeaderError> { decode_exact(bytes) }
}

impl FromIterator<HttpHeader> for HeaderList {
    fn from_iter<I: IntoIterator<Item = HttpHeader>>(iter: I) -> Self { Self(iter.into_iter().collect()) }
}

impl<'a> IntoIterator for &'a HeaderList {
    type Item = &'a HttpHeader;
    type IntoIter = std::slice::Iter<'a, HttpHeader>;

    fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}

/// Begin extension of an HTTP stream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct HttpBeginEx {
    headers: HeaderList,
}

impl HttpBeginEx {
    #[must_use]
    pub fn new(headers: HeaderList) -> Self { Self { headers } }

    #[must_use]
    pub fn headers(&self) -> &HeaderList { &self.headers }

    #[must_use]
    pub fn into_headers(self) -> HeaderList { self.headers }

    /// Encode into extension bytes for a [`BeginFrame`](crate::BeginFrame).
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::Encode`] if bincode rejects the extension.
    pub fn encode(&self) -> Result<Bytes, HeaderError> {
        Ok(Bytes::from(encode_to_vec(self, config::standard())?))
    }

    /// Decode extension bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::Decode`] for malformed input and
    /// [`HeaderError::TrailingBytes`] when bytes remain after the extension.
    pub fn decode(bytes: &[u8]) -> Result<Self, HeaderError> { decode_exact(bytes) }
}

fn decode_exact<T: Decode<()>>(bytes: &[u8]) -> Result<T, HeaderError> {
    let (value, consumed) = decode_from_slice(bytes, config::standard())?;
    if consumed != bytes.len() {
        return Err(HeaderError::TrailingBytes {
            consumed,
            len: bytes.len(),
        });
    }
    Ok(value)
}

/// Parse the poll interval, in seconds, from the first header named `poll_header`.
///
/// Returns `Ok(None)` when the header is absent.
///
/// # Errors
///
/// Returns [`HeaderError::InvalidPollInterval`] when the value is not a
/// non-negative whole number.
pub fn poll_interval(headers: &HeaderList, poll_header: &str) -> Result<Option<u32>, HeaderError> {
    headers
        .get(poll_header)
        .map(|header| {
            header
                .value()
                .trim()
                .parse::<u32>()
                .map_err(|_| HeaderError::InvalidPollInterval(header.value().to_owned()))
        })
        .transpose()
}

/// Build the header list sent when a deferred poll fires.
///
/// Every `injected` header is dropped. When an `injected` header lists the
/// `no-cache` directive, that directive is also removed from each
/// `cache-control` header, and a header left without directives is dropped
/// altogether. Otherwise `cache-control` is the client's own and passes
/// through verbatim, as do all other headers.
///
/// # Errors
///
/// Returns [`HeaderError::MalformedCacheControl`] if an `injected` value, or
/// a `cache-control` value that has to be rewritten, cannot be parsed.
///
/// # Examples
///
/// ```
/// use http_push::header::{HeaderList, HttpHeader, strip_injected};
///
/// let headers: HeaderList = [
///     HttpHeader::new(":path", "/feed"),
///     HttpHeader::new("x-poll-injected", "no-cache"),
///     HttpHeader::new("cache-control", "max-age=0, no-cache"),
/// ]
/// .into_iter()
/// .collect();
///
/// let stripped = strip_injected(&headers, "x-poll-injected").expect("well-formed headers");
/// assert_eq!(stripped.len(), 2);
/// assert_eq!(stripped.get("cache-control").map(HttpHeader::value), Some("max-age=0"));
/// ```
pub fn strip_injected(headers: &HeaderList, injected: &str) -> Result<HeaderList, HeaderError> {
    let mut injected_no_cache = false;
    for header in headers.iter().filter(|header| header.is_named(injected)) {
        injected_no_cache |= CacheControl::parse(header.value())?.contains(NO_CACHE);
    }
    let mut stripped = HeaderList::with_capacity(headers.len());
    for header in headers {
        if header.is_named(injected) {
            continue;
        }
        if injected_no_cache && header.is_named(CACHE_CONTROL) {
            let mut directives = CacheControl::parse(header.value())?;
            if directives.remove(NO_CACHE) {
                if !directives.is_empty() {
                    stripped.push(HttpHeader::new(header.name(), directives.to_string()));
                }
                continue;
            }
        }
        stripped.push(header.clone());
    }
    Ok(stripped)
}

#[cfg(test)]
mod tests;
