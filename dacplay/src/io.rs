//! Collaborator contracts: block storage and the sample output sink.

use std::collections::HashMap;
use std::sync::Arc;

use crate::utils::errors::StorageError;

/// Byte-stream access to stored tracks.
///
/// `read` may return fewer bytes than requested; `Ok(0)` marks the end of
/// the stream.
pub trait Storage {
    type Handle;

    fn open(&mut self, name: &str) -> Result<Self::Handle, StorageError>;

    fn read(&mut self, handle: &mut Self::Handle, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn close(&mut self, handle: Self::Handle);

    /// Reads until `buf` is full or the stream ends, returning the byte count.
    fn read_full(
        &mut self,
        handle: &mut Self::Handle,
        buf: &mut [u8],
    ) -> Result<usize, StorageError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(handle, &mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

/// Fixed-rate sample output, e.g. a DAC register.
pub trait OutputSink {
    /// Writes one unsigned sample in `0..=max` for the sink's resolution.
    fn write_sample(&mut self, value: u16);
}

impl OutputSink for Vec<u16> {
    fn write_sample(&mut self, value: u16) {
        self.push(value);
    }
}

impl<K: OutputSink + ?Sized> OutputSink for &mut K {
    fn write_sample(&mut self, value: u16) {
        (**self).write_sample(value);
    }
}

/// In-memory storage keyed by track name.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    files: HashMap<String, Arc<[u8]>>,
    open_handles: usize,
}

#[derive(Debug)]
pub struct MemoryHandle {
    data: Arc<[u8]>,
    pos: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.files.insert(name.into(), bytes.into());
    }

    /// Handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.open_handles
    }
}

impl Storage for MemoryStorage {
    type Handle = MemoryHandle;

    fn open(&mut self, name: &str) -> Result<MemoryHandle, StorageError> {
        let data = self
            .files
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        self.open_handles += 1;
        Ok(MemoryHandle { data, pos: 0 })
    }

    fn read(&mut self, handle: &mut MemoryHandle, buf: &mut [u8]) -> Result<usize, StorageError> {
        let rest = &handle.data[handle.pos.min(handle.data.len())..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        handle.pos += n;
        Ok(n)
    }

    fn close(&mut self, _handle: MemoryHandle) {
        self.open_handles = self.open_handles.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_reads_to_end() -> Result<(), StorageError> {
        let mut storage = MemoryStorage::new();
        storage.insert("a.wav", vec![1u8, 2, 3, 4, 5]);

        let mut handle = storage.open("a.wav")?;
        let mut buf = [0u8; 3];
        assert_eq!(storage.read_full(&mut handle, &mut buf)?, 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(storage.read_full(&mut handle, &mut buf)?, 2);
        assert_eq!(storage.read(&mut handle, &mut buf)?, 0);
        assert_eq!(storage.open_handles(), 1);
        storage.close(handle);
        assert_eq!(storage.open_handles(), 0);
        Ok(())
    }

    #[test]
    fn missing_track_is_not_found() {
        let mut storage = MemoryStorage::new();
        assert!(matches!(
            storage.open("missing.wav"),
            Err(StorageError::NotFound(name)) if name == "missing.wav"
        ));
    }
}
