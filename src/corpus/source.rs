use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DocumentRecord;

pub type DocumentIter<'a> = Box<dyn Iterator<Item = Result<DocumentRecord>> + 'a>;

/// Pull-based document source. Must be re-iterable: the build reads it
/// once per pass.
pub trait Corpus {
    fn documents(&self) -> Result<DocumentIter<'_>>;

    fn name(&self) -> &str;
}

/// Corpus held in memory
pub struct VecCorpus {
    pub docs: Vec<DocumentRecord>,
}

impl VecCorpus {
    pub fn new(docs: Vec<DocumentRecord>) -> Self {
        VecCorpus { docs }
    }
}

impl Corpus for VecCorpus {
    fn documents(&self) -> Result<DocumentIter<'_>> {
        Ok(Box::new(self.docs.iter().cloned().map(Ok)))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// One JSON object `{"id": .., "title": .., "text": ..}` per line. Accepts a
/// single file or a directory of `*.jsonl` files, read in name order.
pub struct JsonLinesCorpus {
    pub files: Vec<PathBuf>,
    name: String,
}

impl JsonLinesCorpus {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let files = if path.is_dir() {
            let mut files = Vec::new();
            for entry in fs::read_dir(path)? {
                let file = entry?.path();
                if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                    files.push(file);
                }
            }
            files.sort();
            files
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("corpus path {:?} does not exist", path),
            ));
        };

        Ok(JsonLinesCorpus {
            files,
            name: path.display().to_string(),
        })
    }
}

impl Corpus for JsonLinesCorpus {
    fn documents(&self) -> Result<DocumentIter<'_>> {
        let iter = self.files.iter().flat_map(|path| {
            let lines: Box<dyn Iterator<Item = Result<DocumentRecord>>> = match File::open(path) {
                Ok(file) => Box::new(parse_lines(path.clone(), BufReader::new(file))),
                Err(e) => Box::new(std::iter::once(Err(Error::from(e)))),
            };
            lines
        });
        Ok(Box::new(iter))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn parse_lines(path: PathBuf, reader: BufReader<File>) -> impl Iterator<Item = Result<DocumentRecord>> {
    reader
        .lines()
        .enumerate()
        .filter(|(_, line)| !matches!(line, Ok(l) if l.trim().is_empty()))
        .map(move |(idx, line)| {
            let line = line?;
            serde_json::from_str::<DocumentRecord>(&line).map_err(|e| {
                Error::new(
                    ErrorKind::Parse,
                    format!("{}:{}: {}", path.display(), idx + 1, e),
                )
            })
        })
}

/// Groups a document stream into fixed-size batches. An error ends the
/// batch it occurs in; documents already gathered for that batch are dropped.
pub struct Batches<I> {
    inner: I,
    batch_size: usize,
}

impl<I> Batches<I> {
    pub fn new(inner: I, batch_size: usize) -> Self {
        Batches {
            inner,
            batch_size: batch_size.max(1),
        }
    }
}

impl<I: Iterator<Item = Result<DocumentRecord>>> Iterator for Batches<I> {
    type Item = Result<Vec<DocumentRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match self.inner.next() {
                Some(Ok(doc)) => batch.push(doc),
                Some(Err(e)) => return Some(Err(e)),
                None => break,
            }
        }

        if batch.is_empty() {
            None
        } else {
            Some(Ok(batch))
        }
    }
}
