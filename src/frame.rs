//! Logical stream frames.
//!
//! Binary layouts belong to the transport's codec; the engine only sees the
//! logical fields decoded from them. Begin, Data and End travel along a
//! stream; Window and Reset travel against it, on the throttle path.

use std::fmt;

use bytes::Bytes;

/// Opens a stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BeginFrame {
    /// Identifier of the stream being opened.
    pub stream_id: u64,
    /// Routing reference; zero marks a reply rather than a fresh request.
    pub reference_id: u64,
    /// Identifier linking a reply to the request that caused it.
    pub correlation_id: u64,
    /// Protocol extension; an encoded [`HttpBeginEx`](crate::HttpBeginEx) for HTTP streams.
    pub extension: Bytes,
}

/// Carries payload bytes along a stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataFrame {
    pub stream_id: u64,
    pub payload: Bytes,
}

/// Closes a stream normally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EndFrame {
    pub stream_id: u64,
}

/// Grants additional credit on a stream. Updates are additive deltas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowFrame {
    pub stream_id: u64,
    pub update: u32,
}

/// Aborts a stream from the receiving side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetFrame {
    pub stream_id: u64,
}

/// Any frame the engine consumes or produces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Begin(BeginFrame),
    Data(DataFrame),
    End(EndFrame),
    Window(WindowFrame),
    Reset(ResetFrame),
}

/// Discriminant of a [`Frame`], used in diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Begin,
    Data,
    End,
    Window,
    Reset,
}

impl Frame {
    /// Identifier of the stream this frame belongs to.
    #[must_use]
    pub fn stream_id(&self) -> u64 {
        match self {
            Self::Begin(frame) => frame.stream_id,
            Self::Data(frame) => frame.stream_id,
            Self::End(frame) => frame.stream_id,
            Self::Window(frame) => frame.stream_id,
            Self::Reset(frame) => frame.stream_id,
        }
    }

    /// Kind of this frame.
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Begin(_) => FrameKind::Begin,
            Self::Data(_) => FrameKind::Data,
            Self::End(_) => FrameKind::End,
            Self::Window(_) => FrameKind::Window,
            Self::Reset(_) => FrameKind::Reset,
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Begin => "begin",
            Self::Data => "data",
            Self::End => "end",
            Self::Window => "window",
            Self::Reset => "reset",
        };
        f.write_str(name)
    }
}

impl From<BeginFrame> for Frame {
    fn from(frame: BeginFrame) -> Self { Self::Begin(frame) }
}

impl From<DataFrame> for Frame {
    fn from(frame: DataFrame) -> Self { Self::Data(frame) }
}

impl From<EndFrame> for Frame {
    fn from(frame: EndFrame) -> Self { Self::End(frame) }
}

impl From<WindowFrame> for Frame {
    fn from(frame: WindowFrame) -> Self { Self::Window(frame) }
}

impl From<ResetFrame> for Frame {
    fn from(frame: ResetFrame) -> Self { Self::Reset(frame) }
}
