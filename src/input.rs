use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dacplay::io::Storage;
use dacplay::utils::errors::StorageError;

/// Track extensions picked up by the directory scan.
const TRACK_EXTENSIONS: [&str; 2] = ["wav", "mp3"];

/// Filesystem-backed storage reader; track names are paths relative to `root`.
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Storage for FsStorage {
    type Handle = BufReader<File>;

    fn open(&mut self, name: &str) -> Result<Self::Handle, StorageError> {
        let path = self.path_of(name);
        match File::open(&path) {
            Ok(file) => Ok(BufReader::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read(&mut self, handle: &mut Self::Handle, buf: &mut [u8]) -> Result<usize, StorageError> {
        loop {
            match handle.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                result => return result.map_err(StorageError::from),
            }
        }
    }

    fn close(&mut self, handle: Self::Handle) {
        drop(handle);
    }
}

/// Resolves the play/info input into a storage root and an ordered track list.
///
/// A directory is scanned for `.wav`/`.mp3` files, skipping subdirectories and
/// names starting with `_`, sorted by name and capped at `max_tracks`. A
/// single file becomes a one-track catalog.
pub fn scan_tracks<P: AsRef<Path>>(input: P, max_tracks: usize) -> Result<(PathBuf, Vec<String>)> {
    let input = input.as_ref();
    if input.is_file() {
        let root = input.parent().unwrap_or(Path::new(".")).to_path_buf();
        let name = input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .context("Input file has no name")?;
        return Ok((root, vec![name]));
    }

    let mut tracks = Vec::new();
    for entry in fs::read_dir(input)
        .with_context(|| format!("Cannot read directory {}", input.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('_') || !has_track_extension(&name) {
            log::debug!("Skipping {name}");
            continue;
        }
        tracks.push(name);
    }

    tracks.sort();
    if tracks.len() > max_tracks {
        log::warn!(
            "Found {} tracks, keeping the first {max_tracks}",
            tracks.len()
        );
        tracks.truncate(max_tracks);
    }
    Ok((input.to_path_buf(), tracks))
}

fn has_track_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            TRACK_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> Result<PathBuf> {
        let dir = std::env::temp_dir().join(format!("dacplayd-{name}-{}", std::process::id()));
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    #[test]
    fn scan_filters_and_sorts() -> Result<()> {
        let dir = scratch_dir("scan")?;
        for name in ["b.WAV", "a.wav", "_hidden.wav", "notes.txt", "c.mp3"] {
            fs::write(dir.join(name), b"")?;
        }
        fs::create_dir(dir.join("d.wav"))?;

        let (root, tracks) = scan_tracks(&dir, 9)?;
        assert_eq!(root, dir);
        assert_eq!(tracks, ["a.wav", "b.WAV", "c.mp3"]);

        let (_, capped) = scan_tracks(&dir, 2)?;
        assert_eq!(capped, ["a.wav", "b.WAV"]);

        let (root, single) = scan_tracks(dir.join("c.mp3"), 9)?;
        assert_eq!(root, dir);
        assert_eq!(single, ["c.mp3"]);

        fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn storage_reads_files_by_name() -> Result<()> {
        let dir = scratch_dir("storage")?;
        fs::write(dir.join("t.wav"), [1u8, 2, 3])?;

        let mut storage = FsStorage::new(&dir);
        let mut handle = storage.open("t.wav")?;
        let mut buf = [0u8; 8];
        assert_eq!(storage.read_full(&mut handle, &mut buf)?, 3);
        assert_eq!(buf[..3], [1, 2, 3]);
        storage.close(handle);

        assert!(matches!(
            storage.open("missing.wav"),
            Err(StorageError::NotFound(_))
        ));

        fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
