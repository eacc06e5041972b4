use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u32);

/// Dense term identifier, assigned once at dictionary commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TermId(pub u32);

impl TermId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// One record pulled from the corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocId,
    #[serde(default)]
    pub title: String,
    pub text: String,
}

impl DocumentRecord {
    pub fn new(id: u32, title: &str, text: &str) -> Self {
        DocumentRecord {
            id: DocId(id),
            title: title.to_string(),
            text: text.to_string(),
        }
    }

    /// Whitespace word count of the raw text
    pub fn word_count(&self) -> u32 {
        self.text.split_whitespace().count() as u32
    }
}
