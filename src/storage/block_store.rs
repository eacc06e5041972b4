use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::layout::StorageLayout;
use crate::storage::object_store::{ObjectStore, ReadAt, SealingWrite};

/// Where one fragment of a logical write starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLocation {
    pub file_seq: u32,  // Physical file number within the stream
    pub offset: u64,    // Byte offset inside that file
}

/// Sequential writer over a logical stream split into files of at most
/// `block_size` bytes: `<stream>_000.bin`, `<stream>_001.bin`, ...
///
/// Holds exactly one open file. A file is sealed when it fills up and is
/// never reopened for writing.
pub struct BlockWriter {
    store: Arc<dyn ObjectStore>,
    stream: String,
    block_size: u64,
    next_seq: u32,
    current: Option<OpenBlock>,
    bytes_written: u64,
}

struct OpenBlock {
    seq: u32,
    writer: Box<dyn SealingWrite>,
    position: u64,
}

impl BlockWriter {
    pub fn new(store: Arc<dyn ObjectStore>, stream: String, block_size: u64) -> Self {
        BlockWriter {
            store,
            stream,
            block_size,
            next_seq: 0,
            current: None,
            bytes_written: 0,
        }
    }

    /// Appends `data`, splitting it wherever the current file fills up.
    /// Returns one location per physical fragment, in write order.
    pub fn write(&mut self, mut data: &[u8]) -> Result<Vec<BlockLocation>> {
        let mut locations = Vec::new();

        while !data.is_empty() {
            let block_size = self.block_size;
            let block = self.writable_block()?;

            let room = block_size - block.position;
            let take = room.min(data.len() as u64) as usize;

            block.writer.write_all(&data[..take])?;
            locations.push(BlockLocation {
                file_seq: block.seq,
                offset: block.position,
            });
            block.position += take as u64;

            self.bytes_written += take as u64;
            data = &data[take..];
        }

        Ok(locations)
    }

    /// Seals the open file. Returns how many physical files the stream used.
    pub fn finish(mut self) -> Result<u32> {
        if let Some(mut block) = self.current.take() {
            block.writer.seal()?;
        }
        Ok(self.next_seq)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    // Rotates to a fresh file when the current one is full (or none is open yet)
    fn writable_block(&mut self) -> Result<&mut OpenBlock> {
        let full = matches!(&self.current, Some(block) if block.position >= self.block_size);
        if full {
            if let Some(mut block) = self.current.take() {
                block.writer.seal()?;
            }
        }

        if self.current.is_none() {
            let seq = self.next_seq;
            let name = StorageLayout::block_file(&self.stream, seq);
            let writer = self.store.create(&name)?;
            self.next_seq += 1;
            self.current = Some(OpenBlock {
                seq,
                writer,
                position: 0,
            });
        }

        self.current
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::Internal, "no open block file".to_string()))
    }
}

/// Random-access reader for block streams. Opened files are cached for the
/// reader's lifetime and shared across threads; reads are positional.
pub struct BlockReader {
    store: Arc<dyn ObjectStore>,
    block_size: u64,
    open_files: RwLock<HashMap<String, Arc<dyn ReadAt>>>,
}

impl BlockReader {
    pub fn new(store: Arc<dyn ObjectStore>, block_size: u64) -> Self {
        BlockReader {
            store,
            block_size,
            open_files: RwLock::new(HashMap::new()),
        }
    }

    /// Reassembles `total_length` bytes from `locations`, reading
    /// `min(remaining, block_size - offset)` bytes at each one.
    pub fn read(&self, stream: &str, locations: &[BlockLocation], total_length: u64) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(total_length as usize);
        let mut remaining = total_length;

        for location in locations {
            if remaining == 0 {
                break;
            }
            if location.offset >= self.block_size {
                return Err(Error::corrupt(format!(
                    "offset {} outside block of {} bytes in {}",
                    location.offset, self.block_size, stream
                )));
            }

            let n = remaining.min(self.block_size - location.offset);
            let file = self.file(stream, location.file_seq)?;
            let bytes = file.read_at(location.offset..location.offset + n)?;
            if (bytes.len() as u64) < n {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "{} truncated: wanted {} bytes at offset {}, got {}",
                        StorageLayout::block_file(stream, location.file_seq),
                        n,
                        location.offset,
                        bytes.len()
                    ),
                ).into());
            }

            out.extend_from_slice(&bytes);
            remaining -= n;
        }

        if out.len() as u64 != total_length {
            return Err(Error::corrupt(format!(
                "read {} bytes from {}, expected {}",
                out.len(),
                stream,
                total_length
            )));
        }

        Ok(out)
    }

    pub fn cached_files(&self) -> usize {
        self.open_files.read().len()
    }

    fn file(&self, stream: &str, seq: u32) -> Result<Arc<dyn ReadAt>> {
        let name = StorageLayout::block_file(stream, seq);
        if let Some(file) = self.open_files.read().get(&name) {
            return Ok(file.clone());
        }

        let file = self.store.open(&name)?;
        let mut open_files = self.open_files.write();
        Ok(open_files.entry(name).or_insert(file).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::object_store::MemoryObjectStore;

    fn memory_store() -> Arc<dyn ObjectStore> {
        Arc::new(MemoryObjectStore::new())
    }

    #[test]
    fn write_spanning_three_files() {
        let store = memory_store();
        let mut writer = BlockWriter::new(store.clone(), "s".to_string(), 16);

        let first = writer.write(&[1u8; 10]).unwrap();
        assert_eq!(first, vec![BlockLocation { file_seq: 0, offset: 0 }]);

        // 6 bytes fill file 0, 16 fill file 1, 8 land in file 2
        let second = writer.write(&[2u8; 30]).unwrap();
        assert_eq!(
            second,
            vec![
                BlockLocation { file_seq: 0, offset: 10 },
                BlockLocation { file_seq: 1, offset: 0 },
                BlockLocation { file_seq: 2, offset: 0 },
            ]
        );
        assert_eq!(writer.finish().unwrap(), 3);

        let reader = BlockReader::new(store, 16);
        assert_eq!(reader.read("s", &first, 10).unwrap(), vec![1u8; 10]);
        assert_eq!(reader.read("s", &second, 30).unwrap(), vec![2u8; 30]);
        assert_eq!(reader.cached_files(), 3);
    }

    #[test]
    fn exact_fill_defers_rotation() {
        let store = memory_store();
        let mut writer = BlockWriter::new(store.clone(), "s".to_string(), 8);
        writer.write(&[0u8; 8]).unwrap();
        assert_eq!(writer.finish().unwrap(), 1);
        assert!(!store.exists("s_001.bin"));
    }

    #[test]
    fn empty_write_has_no_locations() {
        let store = memory_store();
        let mut writer = BlockWriter::new(store, "s".to_string(), 8);
        assert!(writer.write(&[]).unwrap().is_empty());
        assert_eq!(writer.finish().unwrap(), 0);
    }

    #[test]
    fn missing_locations_are_corrupt() {
        let store = memory_store();
        let mut writer = BlockWriter::new(store.clone(), "s".to_string(), 4);
        let locations = writer.write(&[7u8; 12]).unwrap();
        writer.finish().unwrap();

        let reader = BlockReader::new(store, 4);
        let err = reader.read("s", &locations[..2], 12).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn missing_file_is_io_error() {
        let reader = BlockReader::new(memory_store(), 16);
        let err = reader
            .read("s", &[BlockLocation { file_seq: 0, offset: 0 }], 4)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
    }

    #[test]
    fn truncated_file_is_io_error() {
        let memory = MemoryObjectStore::new();
        let store: Arc<dyn ObjectStore> = Arc::new(memory.clone());
        let mut writer = BlockWriter::new(store.clone(), "s".to_string(), 16);
        let locations = writer.write(&[3u8; 12]).unwrap();
        writer.finish().unwrap();

        memory.overwrite("s_000.bin", vec![3u8; 5]);
        let reader = BlockReader::new(store, 16);
        assert_eq!(reader.read("s", &locations, 12).unwrap_err().kind, ErrorKind::Io);
    }
}
