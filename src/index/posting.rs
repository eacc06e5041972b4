use bytes::{Buf, BufMut};
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, TermId};

/// Size of one posting record on disk
pub const POSTING_SIZE: usize = 8;

/// Size of one staged (term, doc, weight) triple
pub const TRIPLE_SIZE: usize = 12;

/// One document's TF-IDF weight for a term.
///
/// On disk: `[ doc_id: u32 BE ][ weight: f32 BE ]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f32,
}

impl Posting {
    pub fn new(doc_id: DocId, weight: f32) -> Self {
        Posting { doc_id, weight }
    }
}

pub fn encode_postings(postings: &[Posting]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(postings.len() * POSTING_SIZE);
    for posting in postings {
        buf.put_u32(posting.doc_id.0);
        buf.put_f32(posting.weight);
    }
    buf
}

/// Decodes exactly `count` records; any other byte length is corrupt
pub fn decode_postings(data: &[u8], count: u32) -> Result<Vec<Posting>> {
    let expected = count as usize * POSTING_SIZE;
    if data.len() != expected {
        return Err(Error::corrupt(format!(
            "posting list of {} records needs {} bytes, got {}",
            count,
            expected,
            data.len()
        )));
    }

    let mut buf = data;
    let mut postings = Vec::with_capacity(count as usize);
    while buf.has_remaining() {
        let doc_id = DocId(buf.get_u32());
        let weight = buf.get_f32();
        postings.push(Posting { doc_id, weight });
    }
    Ok(postings)
}

/// Pass-2 output waiting in a shard's staging file.
///
/// On disk: `[ term_id: u32 BE ][ doc_id: u32 BE ][ weight: f32 BE ]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagedTriple {
    pub term_id: TermId,
    pub doc_id: DocId,
    pub weight: f32,
}

impl StagedTriple {
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.put_u32(self.term_id.0);
        buf.put_u32(self.doc_id.0);
        buf.put_f32(self.weight);
    }
}

pub fn decode_triples(data: &[u8]) -> Result<Vec<StagedTriple>> {
    if data.len() % TRIPLE_SIZE != 0 {
        return Err(Error::corrupt(format!(
            "staging data of {} bytes is not a whole number of {}-byte triples",
            data.len(),
            TRIPLE_SIZE
        )));
    }

    let mut buf = data;
    let mut triples = Vec::with_capacity(data.len() / TRIPLE_SIZE);
    while buf.has_remaining() {
        triples.push(StagedTriple {
            term_id: TermId(buf.get_u32()),
            doc_id: DocId(buf.get_u32()),
            weight: buf.get_f32(),
        });
    }
    Ok(triples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_layout_is_big_endian() {
        let bytes = encode_postings(&[Posting::new(DocId(0x01020304), 1.0)]);
        assert_eq!(bytes, vec![0x01, 0x02, 0x03, 0x04, 0x3F, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn count_mismatch_is_corrupt() {
        let bytes = encode_postings(&[Posting::new(DocId(1), 0.5), Posting::new(DocId(2), 0.25)]);
        assert_eq!(decode_postings(&bytes, 2).unwrap()[1], Posting::new(DocId(2), 0.25));
        assert!(decode_postings(&bytes, 3).unwrap_err().is_corrupt());
        assert!(decode_postings(&bytes[..12], 2).unwrap_err().is_corrupt());
    }

    #[test]
    fn ragged_staging_is_corrupt() {
        let mut buf = Vec::new();
        StagedTriple { term_id: TermId(9), doc_id: DocId(4), weight: 2.5 }.encode_into(&mut buf);
        assert_eq!(decode_triples(&buf).unwrap()[0].term_id, TermId(9));
        buf.push(0);
        assert!(decode_triples(&buf).unwrap_err().is_corrupt());
    }
}
