//! Named byte store abstraction: the index never touches a filesystem path
//! directly, it asks an `ObjectStore` for readers and sealing writers.
//!
//! - `ReadAt`: positional reads, safe to share across query threads.
//! - `SealingWrite`: sequential writes that only become visible on `seal()`.

use std::collections::HashMap;
use std::io;
use std::ops::Range;
use std::sync::Arc;
use bytes::Bytes;
use parking_lot::RwLock;
use crate::core::config::{Config, StorageBackend};
use crate::core::error::Result;
use crate::storage::local_store::LocalFsStore;

/// Positional reader over an immutable object.
pub trait ReadAt: Send + Sync + 'static {
    fn size(&self) -> io::Result<u64>;

    /// Reads `range`. Returns fewer bytes than requested only when the range
    /// runs past the end of the object.
    fn read_at(&self, range: Range<u64>) -> io::Result<Bytes>;
}

/// Sequential writer whose output is published atomically by `seal()`.
/// Dropping an unsealed writer discards everything written to it.
pub trait SealingWrite: Send {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    fn seal(&mut self) -> io::Result<()>;
}

pub trait ObjectStore: Send + Sync + 'static {
    fn open(&self, name: &str) -> io::Result<Arc<dyn ReadAt>>;

    /// Creates (or replaces, once sealed) the object called `name`.
    fn create(&self, name: &str) -> io::Result<Box<dyn SealingWrite>>;

    fn exists(&self, name: &str) -> bool;

    fn delete(&self, name: &str) -> io::Result<()>;
}

/// Builds the store selected by `config.backend`.
pub fn open_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.backend {
        StorageBackend::LocalFs => Arc::new(LocalFsStore::new(&config.storage_path)?),
        StorageBackend::Memory => Arc::new(MemoryObjectStore::new()),
    };
    Ok(store)
}

/// Reads a whole object into memory.
pub fn read_object(store: &dyn ObjectStore, name: &str) -> Result<Bytes> {
    let reader = store.open(name)?;
    let size = reader.size()?;
    let data = reader.read_at(0..size)?;
    if (data.len() as u64) < size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("object '{}' is truncated", name),
        ).into());
    }
    Ok(data)
}

/// Writes and seals a whole object.
pub fn write_object(store: &dyn ObjectStore, name: &str, data: &[u8]) -> Result<()> {
    let mut writer = store.create(name)?;
    writer.write_all(data)?;
    writer.seal()?;
    Ok(())
}

impl ReadAt for Bytes {
    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> io::Result<Bytes> {
        if range.end < range.start {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "inverted range"));
        }
        let start = range.start as usize;
        if start > self.len() {
            return Ok(Bytes::new());
        }
        let end = (range.end as usize).min(self.len());
        Ok(self.slice(start..end))
    }
}

/// In-process object store. Objects are immutable byte buffers that appear
/// only when their writer is sealed, the same visibility rule a blob store
/// gives a finished upload.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        MemoryObjectStore::default()
    }

    pub fn object_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Replaces an object's bytes in place. Only used to simulate damage in tests.
    pub fn overwrite(&self, name: &str, data: Vec<u8>) {
        self.objects.write().insert(name.to_string(), Bytes::from(data));
    }
}

impl ObjectStore for MemoryObjectStore {
    fn open(&self, name: &str) -> io::Result<Arc<dyn ReadAt>> {
        match self.objects.read().get(name) {
            Some(data) => Ok(Arc::new(data.clone())),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("object '{}' not found", name),
            )),
        }
    }

    fn create(&self, name: &str) -> io::Result<Box<dyn SealingWrite>> {
        Ok(Box::new(MemoryWriter {
            name: name.to_string(),
            buffer: Vec::new(),
            objects: self.objects.clone(),
            sealed: false,
        }))
    }

    fn exists(&self, name: &str) -> bool {
        self.objects.read().contains_key(name)
    }

    fn delete(&self, name: &str) -> io::Result<()> {
        self.objects.write().remove(name);
        Ok(())
    }
}

struct MemoryWriter {
    name: String,
    buffer: Vec<u8>,
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
    sealed: bool,
}

impl SealingWrite for MemoryWriter {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.sealed {
            return Err(io::Error::other(format!("'{}' already sealed", self.name)));
        }
        self.buffer.extend_from_slice(buf);
        Ok(())
    }

    fn seal(&mut self) -> io::Result<()> {
        if self.sealed {
            return Err(io::Error::other(format!("'{}' already sealed", self.name)));
        }
        let data = Bytes::from(std::mem::take(&mut self.buffer));
        self.objects.write().insert(self.name.clone(), data);
        self.sealed = true;
        Ok(())
    }
}
