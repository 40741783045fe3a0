use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};
use dacplay::config::EndOfTrackPolicy;

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (dacplay ", env!("DACPLAY_VERSION"),
        ", built ", env!("BUILD_TIMESTAMP"), ")"
    ),
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Plays PCM and MPEG tracks through a fixed-rate DAC streaming engine",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// YAML file with engine settings; command-line options take precedence.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Play a track directory (or a single file) through the engine.
    Play(PlayArgs),

    /// Print track information and check it against the engine settings.
    Info(InfoArgs),
}

#[derive(Debug, Args)]
pub struct PlayArgs {
    /// Track directory or single track file.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Record the DAC output to a 16-bit WAV file.
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Pace the sample clock in real time and read commands from stdin.
    #[arg(long)]
    pub realtime: bool,

    /// Maximum number of tracks taken from the directory.
    #[arg(long, value_name = "COUNT", default_value_t = 9)]
    pub max_tracks: usize,

    /// Catalog index to start with.
    #[arg(long, value_name = "INDEX", default_value_t = 0)]
    pub track: usize,

    #[command(flatten)]
    pub engine: EngineOverrides,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Track directory or single track file.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Maximum number of tracks taken from the directory.
    #[arg(long, value_name = "COUNT", default_value_t = 9)]
    pub max_tracks: usize,

    #[command(flatten)]
    pub engine: EngineOverrides,
}

/// Engine settings that can be overridden from the command line.
#[derive(Debug, Default, Args)]
pub struct EngineOverrides {
    /// Initial volume in percent (0-100).
    #[arg(long, value_name = "PERCENT", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub volume: Option<u8>,

    /// Output sample rate in Hz.
    #[arg(long, value_name = "HZ")]
    pub sample_rate: Option<u32>,

    /// Channel count accepted from tracks (1 or 2).
    #[arg(long, value_name = "COUNT", value_parser = clap::value_parser!(u16).range(1..=2))]
    pub channels: Option<u16>,

    /// Capacity of each stream buffer, in samples.
    #[arg(long, value_name = "SAMPLES")]
    pub buffer_samples: Option<usize>,

    /// DAC resolution in bits.
    #[arg(long, value_name = "BITS", value_parser = clap::value_parser!(u8).range(1..=16))]
    pub dac_bits: Option<u8>,

    /// What to do when a track ends.
    #[arg(long, value_enum)]
    pub end_of_track: Option<EndOfTrack>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum EndOfTrack {
    /// Stop playback.
    Stop,
    /// Continue with the next track, wrapping around.
    Advance,
}

impl From<EndOfTrack> for EndOfTrackPolicy {
    fn from(value: EndOfTrack) -> Self {
        match value {
            EndOfTrack::Stop => EndOfTrackPolicy::Stop,
            EndOfTrack::Advance => EndOfTrackPolicy::Advance,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}
