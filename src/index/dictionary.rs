use std::collections::{HashMap, HashSet};
use bytes::{Buf, BufMut};
use crate::core::error::{Error, Result};
use crate::core::types::TermId;
use crate::storage::codec::{self, TableWriter};
use crate::storage::layout::StorageLayout;
use crate::storage::object_store::{read_object, write_object, ObjectStore};

const DICTIONARY_MAGIC: &[u8; 4] = b"QDXD";

/// Pass-1 accumulator: how many documents each term occurs in
#[derive(Debug, Default)]
pub struct DictionaryBuilder {
    doc_counts: HashMap<String, u32>,
    documents_observed: usize,
}

impl DictionaryBuilder {
    pub fn new() -> Self {
        DictionaryBuilder::default()
    }

    /// Counts one more document containing `term`
    pub fn observe(&mut self, term: &str) {
        match self.doc_counts.get_mut(term) {
            Some(count) => *count += 1,
            None => {
                self.doc_counts.insert(term.to_string(), 1);
            }
        }
    }

    /// Observes each distinct term of one document once
    pub fn observe_document<S: AsRef<str>>(&mut self, terms: &[S]) {
        let distinct: HashSet<&str> = terms.iter().map(|t| t.as_ref()).collect();
        for term in distinct {
            self.observe(term);
        }
        self.documents_observed += 1;
    }

    pub fn len(&self) -> usize {
        self.doc_counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_counts.is_empty()
    }

    pub fn documents_observed(&self) -> usize {
        self.documents_observed
    }

    /// Freezes the dictionary. Keeps terms seen in more than
    /// `min_doc_frequency` documents; ids follow byte order of the term.
    pub fn commit(self, min_doc_frequency: u32) -> TermDictionary {
        let mut retained: Vec<(String, u32)> = self.doc_counts
            .into_iter()
            .filter(|(_, doc_freq)| *doc_freq > min_doc_frequency)
            .collect();
        retained.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let term_infos = retained
            .into_iter()
            .map(|(term, doc_freq)| TermInfo { term, doc_freq })
            .collect();

        TermDictionary::from_infos(term_infos)
    }
}

/// Term statistics
#[derive(Debug, Clone, PartialEq)]
pub struct TermInfo {
    pub term: String,
    pub doc_freq: u32,      // Number of documents containing term
}

/// Frozen term <-> id mapping with document frequencies
#[derive(Debug, Clone)]
pub struct TermDictionary {
    term_infos: Vec<TermInfo>,          // Indexed by TermId
    term_map: HashMap<String, TermId>,
    total_documents: u64,
}

impl TermDictionary {
    fn from_infos(term_infos: Vec<TermInfo>) -> Self {
        let term_map = term_infos
            .iter()
            .enumerate()
            .map(|(idx, info)| (info.term.clone(), TermId(idx as u32)))
            .collect();

        // Sum of retained frequencies stands in for the corpus size in IDF
        let total_documents = term_infos.iter().map(|info| info.doc_freq as u64).sum();

        TermDictionary {
            term_infos,
            term_map,
            total_documents,
        }
    }

    pub fn id_of(&self, term: &str) -> Option<TermId> {
        self.term_map.get(term).copied()
    }

    pub fn term_of(&self, id: TermId) -> Option<&str> {
        self.term_infos.get(id.index()).map(|info| info.term.as_str())
    }

    pub fn doc_frequency_of(&self, id: TermId) -> Option<u32> {
        self.term_infos.get(id.index()).map(|info| info.doc_freq)
    }

    pub fn total_documents(&self) -> u64 {
        self.total_documents
    }

    /// `ln((total_documents + 1) / (doc_frequency + 1))`; an unknown id
    /// counts as doc frequency 0
    pub fn idf(&self, id: TermId) -> f64 {
        let doc_freq = self.doc_frequency_of(id).unwrap_or(0) as f64;
        ((self.total_documents as f64 + 1.0) / (doc_freq + 1.0)).ln()
    }

    pub fn len(&self) -> usize {
        self.term_infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.term_infos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TermId, &TermInfo)> {
        self.term_infos
            .iter()
            .enumerate()
            .map(|(idx, info)| (TermId(idx as u32), info))
    }

    // [ id: u32 ][ doc_freq: u32 ][ term_len: u32 ][ term bytes ] per term, in id order
    pub fn save(&self, store: &dyn ObjectStore, layout: &StorageLayout) -> Result<()> {
        let mut table = TableWriter::new(DICTIONARY_MAGIC, self.term_infos.len() as u64);
        for (id, info) in self.iter() {
            let body = table.body();
            body.put_u32(id.0);
            body.put_u32(info.doc_freq);
            codec::put_str(body, &info.term);
        }
        write_object(store, &layout.dictionary(), &table.finish())
    }

    pub fn load(store: &dyn ObjectStore, layout: &StorageLayout) -> Result<Self> {
        let data = read_object(store, &layout.dictionary())?;
        let (count, mut body) = codec::open_table(DICTIONARY_MAGIC, &data)?;

        let mut term_infos = Vec::with_capacity(count as usize);
        for expected_id in 0..count {
            codec::ensure_remaining(&body, 8, "dictionary record")?;
            let id = body.get_u32();
            if id as u64 != expected_id {
                return Err(Error::corrupt(format!(
                    "dictionary ids not dense: found {} at position {}",
                    id, expected_id
                )));
            }
            let doc_freq = body.get_u32();
            let term = codec::get_str(&mut body, "dictionary term")?;
            term_infos.push(TermInfo { term, doc_freq });
        }
        if body.has_remaining() {
            return Err(Error::corrupt("trailing bytes after dictionary records"));
        }

        Ok(TermDictionary::from_infos(term_infos))
    }
}
