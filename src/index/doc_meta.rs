use std::collections::HashMap;
use bytes::{Buf, BufMut};
use crate::core::error::{Error, Result};
use crate::core::types::DocId;
use crate::storage::codec::{self, TableWriter};
use crate::storage::layout::StorageLayout;
use crate::storage::object_store::{read_object, write_object, ObjectStore};

const DOC_META_MAGIC: &[u8; 4] = b"QDXM";

#[derive(Debug, Clone, PartialEq)]
pub struct DocMeta {
    pub title: String,
    pub length: u32,    // Whitespace word count of the text
}

/// Document id -> (title, length), held wholly in memory
#[derive(Debug, Clone, Default)]
pub struct DocumentMetadataStore {
    docs: HashMap<DocId, DocMeta>,
}

impl DocumentMetadataStore {
    pub fn new() -> Self {
        DocumentMetadataStore::default()
    }

    /// Inserts or replaces the entry for `id`
    pub fn put(&mut self, id: DocId, title: String, length: u32) {
        self.docs.insert(id, DocMeta { title, length });
    }

    pub fn get(&self, id: DocId) -> Option<&DocMeta> {
        self.docs.get(&id)
    }

    pub fn title_of(&self, id: DocId) -> Option<&str> {
        self.docs.get(&id).map(|meta| meta.title.as_str())
    }

    pub fn length_of(&self, id: DocId) -> Option<u32> {
        self.docs.get(&id).map(|meta| meta.length)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    // [ doc_id: u32 ][ length: u32 ][ title_len: u32 ][ title bytes ], ascending doc id
    pub fn save(&self, store: &dyn ObjectStore, layout: &StorageLayout) -> Result<()> {
        let mut ids: Vec<&DocId> = self.docs.keys().collect();
        ids.sort();

        let mut table = TableWriter::new(DOC_META_MAGIC, ids.len() as u64);
        for id in ids {
            let meta = &self.docs[id];
            let body = table.body();
            body.put_u32(id.0);
            body.put_u32(meta.length);
            codec::put_str(body, &meta.title);
        }
        write_object(store, &layout.doc_meta(), &table.finish())
    }

    pub fn load(store: &dyn ObjectStore, layout: &StorageLayout) -> Result<Self> {
        let data = read_object(store, &layout.doc_meta())?;
        let (count, mut body) = codec::open_table(DOC_META_MAGIC, &data)?;

        let mut docs = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            codec::ensure_remaining(&body, 8, "document record")?;
            let id = DocId(body.get_u32());
            let length = body.get_u32();
            let title = codec::get_str(&mut body, "document title")?;
            docs.insert(id, DocMeta { title, length });
        }
        if body.has_remaining() {
            return Err(Error::corrupt("trailing bytes after document records"));
        }

        Ok(DocumentMetadataStore { docs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::storage::object_store::MemoryObjectStore;

    #[test]
    fn unknown_document_is_absent() {
        let mut meta = DocumentMetadataStore::new();
        meta.put(DocId(7), "Château de Chillon".to_string(), 420);
        assert_eq!(meta.title_of(DocId(7)), Some("Château de Chillon"));
        assert_eq!(meta.length_of(DocId(7)), Some(420));
        assert_eq!(meta.length_of(DocId(8)), None);
        assert_eq!(meta.title_of(DocId(8)), None);
    }

    #[test]
    fn persists_through_store() {
        let store = MemoryObjectStore::new();
        let layout = StorageLayout::new(&Config::default());

        let mut meta = DocumentMetadataStore::new();
        meta.put(DocId(3), "Bran Castle".to_string(), 150);
        meta.put(DocId(1), String::new(), 0);
        meta.save(&store, &layout).unwrap();

        let loaded = DocumentMetadataStore::load(&store, &layout).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(DocId(3)), meta.get(DocId(3)));
        assert_eq!(loaded.title_of(DocId(1)), Some(""));
    }
}
