/// Container and stream-format rejections raised while validating a track.
///
/// All of these are configuration errors from the controller's point of view:
/// the track cannot be played with the configured output clock.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Container signature not recognized")]
    NotRecognizedContainer,

    #[error("Unsupported channel layout: {found} channels, output is configured for {expected}")]
    UnsupportedChannelLayout { found: u16, expected: u16 },

    #[error("Unsupported sample rate: {found} Hz, output clock is configured for {expected} Hz")]
    UnsupportedSampleRate { found: u32, expected: u32 },

    #[error("Unsupported bit depth: {0} bits per sample (16 required)")]
    UnsupportedBitDepth(u16),

    #[error("Header truncated: {found} of {expected} bytes available")]
    TruncatedHeader { found: usize, expected: usize },

    #[error("No frame codec installed for compressed stream")]
    CodecUnavailable,

    #[error("Frame of {needed} samples does not fit a {capacity}-sample stream buffer")]
    BufferTooSmall { needed: usize, capacity: usize },
}

/// Outcome of a single frame decode that produced no samples.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("Insufficient bytes buffered to decode frame")]
    Underflow,

    #[error("Corrupt frame")]
    Corrupt,
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Track not found: {0}")]
    NotFound(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Sample rate must be non-zero")]
    ZeroSampleRate,

    #[error("Channel count must be 1 or 2, got {0}")]
    InvalidChannels(u16),

    #[error("DAC resolution must be between 1 and 16 bits, got {0}")]
    InvalidDacBits(u8),

    #[error("Stream buffer of {capacity} samples cannot hold one {channels}-channel frame")]
    BufferTooSmall { capacity: usize, channels: u16 },

    #[error("Volume must be within 0-100, got {0}")]
    InvalidVolume(u8),
}

/// Errors surfaced by the playback controller.
///
/// Only track-start failures reach the caller; decode errors and underruns
/// are absorbed where they are detected.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Track rejected: {0}")]
    Configuration(#[from] FormatError),

    #[error("Invalid engine configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] StorageError),

    #[error("Track catalog is empty")]
    EmptyCatalog,

    #[error("Track index {index} out of range (catalog holds {count})")]
    InvalidTrack { index: usize, count: usize },

    #[error("Failed to start sample clock: {0}")]
    ClockStart(#[from] std::io::Error),
}

impl EngineError {
    /// True for rejections caused by the track's format or the engine setup
    /// rather than by storage.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, EngineError::Io(_) | EngineError::ClockStart(_))
    }
}
