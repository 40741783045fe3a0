/// Frame header parsing and sync search for MPEG audio streams.
pub mod extract;

/// Container detection and header validation.
///
/// Provides the [`Parser`](parse::Parser), which turns container headers into
/// [`SourceDescriptor`](crate::structs::source::SourceDescriptor) values or
/// rejects them with a [`FormatError`](crate::utils::errors::FormatError).
pub mod parse;

/// Frame-stream decoding through a pluggable [`FrameCodec`](decode::FrameCodec).
pub mod decode;

/// MPEG audio codec backed by symphonia.
#[cfg(feature = "symphonia")]
pub mod codec;
