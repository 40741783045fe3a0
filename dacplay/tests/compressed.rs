mod common;

use std::sync::{Arc, Mutex};

use anyhow::Result;
use common::*;
use dacplay::config::{EndOfTrackPolicy, EngineConfig};
use dacplay::engine::controller::{PlayerState, PollOutcome};
use dacplay::process::decode::{CodecFactory, FrameCodec, WINDOW_CAPACITY};
use dacplay::structs::source::ContainerKind;
use dacplay::utils::errors::{EngineError, FormatError, FrameError};

// MPEG-2.5 Layer III, 8 kbit/s, 8 kHz, mono: 72-byte frames of 576 samples
const HEADER: [u8; 4] = [0xFF, 0xE3, 0x18, 0xC4];
const FRAME_LEN: usize = 72;
const FRAME_SAMPLES: usize = 576;

const CORRUPT: u8 = 0xEE;

/// Fills every sample of a frame with the frame's marker byte.
struct MarkerCodec;

impl FrameCodec for MarkerCodec {
    fn decode_frame(&mut self, frame: &[u8], out: &mut [i16]) -> Result<usize, FrameError> {
        match frame[4] {
            CORRUPT => Err(FrameError::Corrupt),
            marker => {
                out[..FRAME_SAMPLES].fill(marker as i16 * 100);
                Ok(FRAME_SAMPLES)
            }
        }
    }
}

const STUCK: u8 = 0xDD;

/// Reports `Underflow` `stalls` times for every frame before decoding it, and
/// for a `STUCK` frame on every attempt. Records the marker of each attempt.
struct StallingCodec {
    stalls: usize,
    pending: usize,
    attempts: Arc<Mutex<Vec<u8>>>,
}

impl FrameCodec for StallingCodec {
    fn decode_frame(&mut self, window: &[u8], out: &mut [i16]) -> Result<usize, FrameError> {
        let marker = window[4];
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(marker);
        }
        if marker == STUCK || self.pending < self.stalls {
            self.pending += 1;
            return Err(FrameError::Underflow);
        }
        self.pending = 0;
        out[..FRAME_SAMPLES].fill(marker as i16 * 1000);
        Ok(FRAME_SAMPLES)
    }
}

fn stalling(stalls: usize) -> (Arc<Mutex<Vec<u8>>>, CodecFactory) {
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let shared = Arc::clone(&attempts);
    let factory: CodecFactory = Box::new(move || {
        Some(Box::new(StallingCodec {
            stalls,
            pending: 0,
            attempts: Arc::clone(&shared),
        }) as Box<dyn FrameCodec>)
    });
    (attempts, factory)
}

/// Distinct non-silence output levels in playback order.
fn levels(out: &[u16]) -> Vec<u16> {
    let mut levels: Vec<u16> = out.iter().copied().filter(|&v| v != 512).collect();
    levels.dedup();
    levels
}

fn frame(marker: u8) -> Vec<u8> {
    let mut frame = vec![0u8; FRAME_LEN];
    frame[..4].copy_from_slice(&HEADER);
    frame[4] = marker;
    frame
}

fn stream(markers: &[u8]) -> Vec<u8> {
    // ID3v2.4 tag with a 200-byte body
    let mut bytes = vec![b'I', b'D', b'3', 4, 0, 0, 0, 0, 0x01, 0x48];
    bytes.extend([0u8; 200]);
    bytes.extend(markers.iter().flat_map(|&m| frame(m)));
    bytes
}

fn stop_at_end() -> EngineConfig {
    EngineConfig {
        end_of_track: EndOfTrackPolicy::Stop,
        ..Default::default()
    }
}

#[test]
fn frame_stream_plays_to_end() -> Result<()> {
    let storage = memory_storage(&[("a.mp3", stream(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]))]);
    let mut player = player(&["a.mp3"], storage, stop_at_end())
        .with_codec(Box::new(|| Some(Box::new(MarkerCodec) as Box<dyn FrameCodec>)));

    player.play(0)?;
    let descriptor = player.descriptor().copied();
    assert_eq!(descriptor.map(|d| d.kind), Some(ContainerKind::Compressed));
    assert_eq!(descriptor.and_then(|d| d.payload_bytes), None);

    assert_eq!(run_to_finish(&mut player, 20_000), Some(10 * FRAME_SAMPLES));
    assert_eq!(player.stats().consumed, (10 * FRAME_SAMPLES) as u64);
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.storage().open_handles(), 0);
    Ok(())
}

#[test]
fn corrupt_frames_are_skipped() -> Result<()> {
    let storage = memory_storage(&[("a.mp3", stream(&[1, CORRUPT, 2, CORRUPT, CORRUPT, 3]))]);
    let mut player = player(&["a.mp3"], storage, stop_at_end())
        .with_codec(Box::new(|| Some(Box::new(MarkerCodec) as Box<dyn FrameCodec>)));

    player.play(0)?;
    run_to_finish(&mut player, 10_000);
    assert_eq!(player.stats().consumed, (3 * FRAME_SAMPLES) as u64);

    let out = player.clock().sink();
    let first = out[0];
    let second = out[FRAME_SAMPLES];
    let third = out[2 * FRAME_SAMPLES];
    assert!(first < second && second < third);
    Ok(())
}

#[test]
fn truncated_stream_ends_after_retries() -> Result<()> {
    let bytes = stream(&[1, 2, 3, 4]);
    let mut storage = ScriptedStorage::new(memory_storage(&[("a.mp3", bytes)]));
    // cut in the middle of the third frame
    storage.cut_at = Some(210 + 2 * FRAME_LEN + 30);
    let mut player = player(&["a.mp3"], storage, stop_at_end())
        .with_codec(Box::new(|| Some(Box::new(MarkerCodec) as Box<dyn FrameCodec>)));

    player.play(0)?;
    assert!(run_to_finish(&mut player, 10_000).is_some());
    assert_eq!(player.stats().consumed, (2 * FRAME_SAMPLES) as u64);
    // default eof_retry_limit
    assert_eq!(player.storage().reads_past_cut, 3);
    Ok(())
}

#[test]
fn mismatched_frame_rate_is_rejected() {
    // MPEG-1 Layer III at 44.1 kHz, mono
    let mut bytes = vec![0xFF, 0xFB, 0x90, 0xC4];
    bytes.resize(417, 0);
    let storage = memory_storage(&[("a.mp3", bytes)]);
    let mut player = player(&["a.mp3"], storage, stop_at_end())
        .with_codec(Box::new(|| Some(Box::new(MarkerCodec) as Box<dyn FrameCodec>)));

    assert!(matches!(
        player.play(0),
        Err(EngineError::Configuration(
            FormatError::UnsupportedSampleRate { found: 44100, .. }
        ))
    ));
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.storage().open_handles(), 0);
}

#[test]
fn tag_without_frames_is_not_recognized() {
    let storage = memory_storage(&[("a.mp3", stream(&[]))]);
    let mut player = player(&["a.mp3"], storage, stop_at_end())
        .with_codec(Box::new(|| Some(Box::new(MarkerCodec) as Box<dyn FrameCodec>)));

    assert!(matches!(
        player.play(0),
        Err(EngineError::Configuration(FormatError::NotRecognizedContainer))
    ));
    assert_eq!(player.poll().ok(), Some(PollOutcome::Idle));
}

fn stream_with_stereo_frame() -> Vec<u8> {
    let mut bytes = stream(&[1]);
    let mut stereo = frame(3);
    // channel mode 00: stereo, 1152 samples per frame
    stereo[3] = 0x04;
    bytes.extend(stereo);
    bytes.extend(frame(2));
    bytes
}

#[test]
fn oversized_frame_is_skipped() -> Result<()> {
    let storage = memory_storage(&[("a.mp3", stream_with_stereo_frame())]);
    let config = EngineConfig {
        buffer_samples: FRAME_SAMPLES,
        ..stop_at_end()
    };
    let (attempts, codec) = stalling(0);
    let mut player = player(&["a.mp3"], storage, config).with_codec(codec);

    player.play(0)?;
    assert!(run_to_finish(&mut player, 100_000).is_some());
    assert_eq!(player.stats().consumed, (2 * FRAME_SAMPLES) as u64);
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(*attempts.lock().unwrap(), [1, 2]);
    Ok(())
}

#[test]
fn frame_with_other_channel_count_is_skipped() -> Result<()> {
    let storage = memory_storage(&[("a.mp3", stream_with_stereo_frame())]);
    let (attempts, codec) = stalling(0);
    let mut player = player(&["a.mp3"], storage, stop_at_end()).with_codec(codec);

    player.play(0)?;
    assert!(run_to_finish(&mut player, 20_000).is_some());
    assert_eq!(player.stats().consumed, (2 * FRAME_SAMPLES) as u64);
    assert_eq!(*attempts.lock().unwrap(), [1, 2]);
    assert_eq!(levels(player.clock().sink()).len(), 2);
    Ok(())
}

#[test]
fn underflow_retries_the_same_frame() -> Result<()> {
    let markers: Vec<u8> = (1..=10).collect();
    let mut storage = ScriptedStorage::new(memory_storage(&[("a.mp3", stream(&markers))]));
    storage.chunk = Some(50);
    let (attempts, codec) = stalling(2);
    let mut player = player(&["a.mp3"], storage, stop_at_end()).with_codec(codec);

    player.play(0)?;
    assert!(run_to_finish(&mut player, 50_000).is_some());
    assert_eq!(player.stats().consumed, (10 * FRAME_SAMPLES) as u64);

    let expected: Vec<u8> = markers.iter().flat_map(|&m| [m; 3]).collect();
    assert_eq!(*attempts.lock().unwrap(), expected);

    let levels = levels(player.clock().sink());
    assert_eq!(levels.len(), 10);
    assert!(levels.windows(2).all(|pair| pair[0] < pair[1]));
    Ok(())
}

#[test]
fn underflow_with_full_window_skips_frame() -> Result<()> {
    let mut markers = vec![STUCK];
    markers.extend([1u8; 150]);
    // more than a window of frames behind the stuck one
    assert!(markers.len() * FRAME_LEN > WINDOW_CAPACITY);
    let storage = memory_storage(&[("a.mp3", stream(&markers))]);
    let (attempts, codec) = stalling(0);
    let mut player = player(&["a.mp3"], storage, stop_at_end()).with_codec(codec);

    player.play(0)?;
    assert!(run_to_finish(&mut player, 200_000).is_some());
    assert_eq!(player.stats().consumed, (150 * FRAME_SAMPLES) as u64);

    let attempts = attempts.lock().unwrap();
    assert_eq!(attempts.iter().filter(|&&m| m == STUCK).count(), 1);
    assert_eq!(attempts.len(), 151);
    Ok(())
}
