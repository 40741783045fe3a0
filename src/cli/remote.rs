use std::io::BufRead;
use std::str::FromStr;
use std::sync::mpsc::Sender;

use dacplay::engine::controller::Command;

/// A line of operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remote {
    Engine(Command),
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("invalid argument '{0}'")]
    InvalidArgument(String),
}

impl FromStr for Remote {
    type Err = RemoteError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(RemoteError::Empty)?.to_ascii_lowercase();
        let arg = words.next();

        let command = match (verb.as_str(), arg) {
            ("q" | "quit" | "exit", _) => return Ok(Remote::Quit),
            ("play", None) => Command::Play,
            ("play", Some(index)) => Command::PlayTrack(parse_arg(index)?),
            ("pause", _) => Command::Pause,
            ("resume", _) => Command::Resume,
            ("p" | "toggle", _) => Command::TogglePause,
            ("s" | "stop", _) => Command::Stop,
            ("n" | "next", _) => Command::Next,
            ("prev" | "previous", _) => Command::Previous,
            ("+" | "up", _) => Command::VolumeUp,
            ("-" | "down", _) => Command::VolumeDown,
            ("vol" | "volume", Some(volume)) => Command::SetVolume(parse_arg(volume)?),
            ("vol" | "volume", None) => {
                return Err(RemoteError::InvalidArgument(String::new()));
            }
            _ => return Err(RemoteError::Unknown(verb)),
        };
        Ok(Remote::Engine(command))
    }
}

fn parse_arg<T: FromStr>(word: &str) -> Result<T, RemoteError> {
    word.parse()
        .map_err(|_| RemoteError::InvalidArgument(word.to_string()))
}

/// Forwards parsed lines from `input` until quit, end of input or a closed
/// receiver. Unparseable lines are logged and skipped. End of input sends
/// nothing; the receiver sees the channel disconnect once `tx` is dropped.
pub fn forward_commands<R: BufRead>(input: R, tx: &Sender<Remote>) {
    for line in input.lines() {
        let Ok(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Remote>() {
            Ok(remote) => {
                if tx.send(remote).is_err() || remote == Remote::Quit {
                    return;
                }
            }
            Err(e) => log::warn!("{e}"),
        }
    }
}
