//! Double-buffered audio streaming engine for a fixed-rate sample output.
//!
//! ## Technical Overview
//!
//! Tracks are read from a block-oriented [`io::Storage`] and played out one
//! sample per tick of a periodic clock into an [`io::OutputSink`], typically a
//! DAC register.
//!
//! ### Pipeline
//!
//! Track catalog → storage reader → format parser → stream buffers → sample
//! clock → output sink.
//!
//! - **Raw PCM**: fixed 44-byte RIFF/WAVE header, 16-bit little-endian samples
//! - **Compressed**: MPEG audio frame streams, decoded frame by frame through a
//!   pluggable [`process::decode::FrameCodec`]
//!
//! Only the sample rate and channel layout the clock is configured for are
//! accepted; nothing is resampled or remixed.
//!
//! ### Execution Contexts
//!
//! The foreground loop reads storage, decodes and handles commands. The
//! sample clock preempts it at the sample rate and never blocks: when no data
//! is ready it emits mid-scale silence. The two share only atomics.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dacplay::config::EngineConfig;
//! use dacplay::engine::catalog::TrackList;
//! use dacplay::engine::clock::ManualClock;
//! use dacplay::engine::controller::{PlaybackController, PollOutcome};
//! use dacplay::io::MemoryStorage;
//!
//! let mut storage = MemoryStorage::new();
//! storage.insert("tone.wav", std::fs::read("tone.wav")?);
//!
//! let tracks: TrackList = ["tone.wav"].into_iter().collect();
//! let mut player = PlaybackController::new(EngineConfig::default(), tracks, storage, |clock| {
//!     Ok(ManualClock::new(clock, Vec::<u16>::new()))
//! })?;
//!
//! player.play(0)?;
//! loop {
//!     // Foreground work, then one tick of the sample clock
//!     if let PollOutcome::Finished { .. } = player.poll()? {
//!         break;
//!     }
//!     player.clock_mut().tick();
//! }
//! let dac_samples = player.clock().sink();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Engine configuration.
pub mod config;

/// The streaming engine.
///
/// - **Buffers** ([`engine::buffer`]): ping-pong stream buffers
/// - **Session** ([`engine::session`]): state shared with the clock
/// - **Clock** ([`engine::clock`]): the periodic consumer and its drivers
/// - **Catalog** ([`engine::catalog`]): ordered track list
/// - **Controller** ([`engine::controller`]): transport state machine
pub mod engine;

/// Storage and output sink contracts.
pub mod io;

/// Container parsing and frame decoding.
///
/// 1. **Frame Extraction** ([`process::extract`]): MPEG frame headers and sync search
/// 2. **Parsing** ([`process::parse`]): container detection and header validation
/// 3. **Decoding** ([`process::decode`]): read-ahead window and codec adapter
pub mod process;

/// Open-track structures.
pub mod structs;

/// Bitstream reading and error types.
pub mod utils;

/// Segments of an 8-LED volume bar: bit `i` is lit when
/// `volume >= (i + 1) * 100 / 8`.
pub fn volume_bar(volume: u8) -> u8 {
    (0..8u32)
        .filter(|&i| volume as u32 >= (i + 1) * 100 / 8)
        .fold(0, |bar, i| bar | (1 << i))
}

#[test]
fn test_volume_bar() {
    assert_eq!(volume_bar(0), 0);
    assert_eq!(volume_bar(11), 0);
    assert_eq!(volume_bar(12), 0b0000_0001);
    assert_eq!(volume_bar(50), 0b0000_1111);
    assert_eq!(volume_bar(99), 0b0111_1111);
    assert_eq!(volume_bar(100), 0xFF);
}
