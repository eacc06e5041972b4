use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use bytes::Bytes;
use memmap2::{Mmap, MmapOptions};
use crate::core::error::Result;
use crate::storage::object_store::{ObjectStore, ReadAt, SealingWrite};

/// `ObjectStore` rooted at a local directory. Object names are relative
/// paths below `root`.
pub struct LocalFsStore {
    root: PathBuf,
}

impl LocalFsStore {
    pub fn new(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(LocalFsStore {
            root: root.to_path_buf(),
        })
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl ObjectStore for LocalFsStore {
    fn open(&self, name: &str) -> io::Result<Arc<dyn ReadAt>> {
        let file = File::open(self.path_of(name))?;
        let len = file.metadata()?.len() as usize;

        // Zero-length files can't be mapped on every platform
        if len == 0 {
            return Ok(Arc::new(Bytes::new()));
        }

        // Committed files are never modified in place, so the mapping stays valid
        let mmap = unsafe { MmapOptions::new().len(len).map(&file)? };
        Ok(Arc::new(MmapReader { mmap }))
    }

    fn create(&self, name: &str) -> io::Result<Box<dyn SealingWrite>> {
        let path = self.path_of(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut partial = path.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        let file = File::create(&partial)?;
        Ok(Box::new(LocalWriter {
            writer: Some(BufWriter::with_capacity(1024 * 1024, file)), // 1MB buffer
            partial,
            path,
        }))
    }

    fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_file()
    }

    fn delete(&self, name: &str) -> io::Result<()> {
        match fs::remove_file(self.path_of(name)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Memory-mapped read-only view of a committed file
struct MmapReader {
    mmap: Mmap,
}

impl ReadAt for MmapReader {
    fn size(&self) -> io::Result<u64> {
        Ok(self.mmap.len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> io::Result<Bytes> {
        let len = self.mmap.len();
        let start = (range.start as usize).min(len);
        let end = (range.end as usize).clamp(start, len);
        Ok(Bytes::copy_from_slice(&self.mmap[start..end]))
    }
}

/// Writes to `<name>.partial` and renames onto `<name>` when sealed
struct LocalWriter {
    writer: Option<BufWriter<File>>,
    partial: PathBuf,
    path: PathBuf,
}

impl SealingWrite for LocalWriter {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.write_all(buf),
            None => Err(io::Error::other(format!("{:?} already sealed", self.path))),
        }
    }

    fn seal(&mut self) -> io::Result<()> {
        let writer = self.writer.take()
            .ok_or_else(|| io::Error::other(format!("{:?} already sealed", self.path)))?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&self.partial, &self.path)
    }
}

impl Drop for LocalWriter {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            let _ = fs::remove_file(&self.partial);
        }
    }
}
