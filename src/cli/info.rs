use std::fs;

use anyhow::Result;
use dacplay::config::EngineConfig;
use dacplay::process::extract::{FRAME_HEADER_LEN, FrameHeader, find_frame_sync, id3v2_len};
use dacplay::process::parse::{PCM_HEADER_LEN, Parser};
use dacplay::structs::source::ContainerKind;
use indicatif::MultiProgress;
use serde::Serialize;

use super::command::{Cli, InfoArgs};
use super::progress::create_scan_bar;
use crate::config::load_engine_config;
use crate::input::scan_tracks;
use crate::timestamp::clock_str;

#[derive(Debug, Default, Serialize)]
struct TrackReport {
    index: usize,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    container: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channels: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bitrate_kbps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    samples: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<String>,
    playable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    problem: Option<String>,
}

/// Frame walk over a whole compressed stream.
#[derive(Debug, Default, PartialEq, Eq)]
struct FrameScan {
    first: Option<FrameHeader>,
    frames: u64,
    samples: u64,
    resyncs: u64,
}

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let config = load_engine_config(cli.config.as_deref(), &args.engine)?;
    let (root, tracks) = scan_tracks(&args.input, args.max_tracks)?;
    log::info!(
        "Checking {} tracks in {} against {} Hz, {} ch",
        tracks.len(),
        root.display(),
        config.sample_rate,
        config.channels
    );

    let bar = multi
        .map(|multi| create_scan_bar(multi, tracks.len()))
        .transpose()?;

    let mut reports = Vec::with_capacity(tracks.len());
    for (index, name) in tracks.iter().enumerate() {
        if let Some(bar) = &bar {
            bar.set_message(name.clone());
        }
        let report = match fs::read(root.join(name)) {
            Ok(bytes) => analyze_track(index, name, &bytes, &config),
            Err(e) => TrackReport {
                index,
                name: name.clone(),
                problem: Some(e.to_string()),
                ..Default::default()
            },
        };
        if !report.playable {
            log::warn!(
                "[{index}] {name}: {}",
                report.problem.as_deref().unwrap_or("not playable")
            );
        }
        reports.push(report);
        if let Some(bar) = &bar {
            bar.inc(1);
        }
    }
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let playable = reports.iter().filter(|r| r.playable).count();
    print!("{}", serde_yaml_ng::to_string(&reports)?);
    log::info!("{playable} of {} tracks playable", reports.len());
    Ok(())
}

fn analyze_track(index: usize, name: &str, bytes: &[u8], config: &EngineConfig) -> TrackReport {
    let mut report = TrackReport {
        index,
        name: name.to_string(),
        ..Default::default()
    };
    let parser = Parser::from(config);

    let head = &bytes[..bytes.len().min(PCM_HEADER_LEN)];
    let kind = match Parser::detect(head) {
        Ok(kind) => kind,
        Err(e) => {
            report.problem = Some(e.to_string());
            return report;
        }
    };

    match kind {
        ContainerKind::RawPcm => {
            report.container = Some("pcm");
            match parser.parse_header(head) {
                Ok(descriptor) => {
                    report.sample_rate = Some(descriptor.sample_rate);
                    report.channels = Some(descriptor.channels);
                    report.samples = descriptor.total_frames();
                    report.duration = descriptor
                        .total_frames()
                        .map(|frames| clock_str(frames, descriptor.sample_rate));
                    report.playable = true;

                    let available = bytes.len().saturating_sub(PCM_HEADER_LEN) as u64;
                    if let Some(declared) = descriptor.payload_bytes.filter(|&n| n > available) {
                        log::warn!(
                            "{name}: header declares {declared} payload bytes, file holds {available}"
                        );
                    }
                }
                Err(e) => report.problem = Some(e.to_string()),
            }
        }
        ContainerKind::Compressed => {
            report.container = Some("mpeg");
            let scan = scan_frames(bytes);
            let Some(first) = scan.first else {
                report.problem = Some("No frame sync found".into());
                return report;
            };
            if scan.resyncs > 0 {
                log::debug!("{name}: resynchronized {} times", scan.resyncs);
            }
            report.sample_rate = Some(first.sample_rate);
            report.channels = Some(first.channels());
            report.bitrate_kbps = Some(first.bitrate_kbps);
            report.frames = Some(scan.frames);
            report.samples = Some(scan.samples);
            report.duration = Some(clock_str(scan.samples, first.sample_rate));

            match parser.parse_frame_descriptor(&first) {
                Ok(_) if cfg!(feature = "mp3") => report.playable = true,
                Ok(_) => report.problem = Some("Built without MPEG decoding".into()),
                Err(e) => report.problem = Some(e.to_string()),
            }
        }
    }
    report
}

/// Walks frame headers after any ID3v2 tag, resynchronizing on garbage.
fn scan_frames(bytes: &[u8]) -> FrameScan {
    let mut scan = FrameScan::default();
    let mut pos = id3v2_len(bytes).unwrap_or(0).min(bytes.len());

    while pos + FRAME_HEADER_LEN <= bytes.len() {
        match FrameHeader::parse(&bytes[pos..]) {
            Some(header) if pos + header.frame_len() <= bytes.len() => {
                scan.first.get_or_insert(header);
                scan.frames += 1;
                scan.samples += header.samples_per_frame() as u64;
                pos += header.frame_len().max(FRAME_HEADER_LEN);
            }
            Some(_) => break,
            None => match find_frame_sync(&bytes[pos + 1..]) {
                Some(offset) => {
                    scan.resyncs += 1;
                    pos += 1 + offset;
                }
                None => break,
            },
        }
    }
    scan
}
