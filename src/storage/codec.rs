use bytes::{Buf, BufMut, BytesMut};
use crc32fast::Hasher;
use crate::core::error::{Error, Result};

/// Current on-disk version of every table file
pub const FORMAT_VERSION: u16 = 1;

// [ magic: 4 ][ version: u16 BE ][ record_count: u64 BE ] <- byte 0
// [ body ... ]
// [ crc32 of everything above: u32 BE ]
pub const HEADER_SIZE: usize = 4 + 2 + 8;
pub const TRAILER_SIZE: usize = 4;

/// Builds one table file. Records are appended to `body()`.
pub struct TableWriter {
    buf: BytesMut,
}

impl TableWriter {
    pub fn new(magic: &[u8; 4], record_count: u64) -> Self {
        let mut buf = BytesMut::with_capacity(64 * 1024);
        buf.put_slice(magic);
        buf.put_u16(FORMAT_VERSION);
        buf.put_u64(record_count);
        TableWriter { buf }
    }

    pub fn body(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    pub fn finish(mut self) -> Vec<u8> {
        let mut hasher = Hasher::new();
        hasher.update(&self.buf);
        let checksum = hasher.finalize();
        self.buf.put_u32(checksum);
        self.buf.to_vec()
    }
}

/// Validates magic, version and checksum; returns the record count and body.
pub fn open_table<'a>(magic: &[u8; 4], data: &'a [u8]) -> Result<(u64, &'a [u8])> {
    if data.len() < HEADER_SIZE + TRAILER_SIZE {
        return Err(Error::corrupt(format!(
            "table too short: {} bytes",
            data.len()
        )));
    }

    let (content, mut trailer) = data.split_at(data.len() - TRAILER_SIZE);
    let mut hasher = Hasher::new();
    hasher.update(content);
    if hasher.finalize() != trailer.get_u32() {
        return Err(Error::corrupt("table checksum mismatch"));
    }

    let mut header = &content[..HEADER_SIZE];
    if &header[..4] != magic {
        return Err(Error::corrupt(format!(
            "bad magic {:?}, expected {:?}",
            &header[..4],
            magic
        )));
    }
    header.advance(4);
    let version = header.get_u16();
    if version != FORMAT_VERSION {
        return Err(Error::corrupt(format!(
            "unsupported table version {}",
            version
        )));
    }
    let count = header.get_u64();

    Ok((count, &content[HEADER_SIZE..]))
}

/// Fails with `Corrupt` unless `buf` holds at least `n` more bytes
pub fn ensure_remaining(buf: &impl Buf, n: usize, what: &str) -> Result<()> {
    if buf.remaining() < n {
        return Err(Error::corrupt(format!(
            "truncated {}: need {} bytes, {} left",
            what,
            n,
            buf.remaining()
        )));
    }
    Ok(())
}

pub fn put_str(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

pub fn get_str(buf: &mut &[u8], what: &str) -> Result<String> {
    ensure_remaining(&*buf, 4, what)?;
    let len = buf.get_u32() as usize;
    ensure_remaining(&*buf, len, what)?;
    let text = std::str::from_utf8(&buf[..len])
        .map_err(|_| Error::corrupt(format!("invalid UTF-8 in {}", what)))?
        .to_string();
    buf.advance(len);
    Ok(text)
}
