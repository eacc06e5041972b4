use std::collections::BinaryHeap;
use std::cmp::Ordering;
use serde::{Serialize, Deserialize};
use crate::core::types::DocId;

const DOCUMENT_URL_PREFIX: &str = "https://en.wikipedia.org/?curid=";

/// One ranked query result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub title: Option<String>,
    pub score: f64,
}

impl SearchHit {
    pub fn document_url(&self) -> String {
        format!("{}{}", DOCUMENT_URL_PREFIX, self.doc_id.0)
    }
}

/// Document with its accumulated score, ordered so that the heap's top is
/// the weakest candidate: lower score first, then higher doc id
#[derive(Debug, Clone, Copy)]
pub struct ScoredDocument {
    pub doc_id: DocId,
    pub score: f64,
}

impl PartialEq for ScoredDocument {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredDocument {}

impl PartialOrd for ScoredDocument {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredDocument {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse on score so the max-heap pops the lowest score
        other.score
            .total_cmp(&self.score)
            .then_with(|| self.doc_id.cmp(&other.doc_id))
    }
}

/// Keeps the best `k` documents: highest score, ties to the lower doc id
pub struct TopKCollector {
    pub heap: BinaryHeap<ScoredDocument>,
    pub k: usize,
    pub total_collected: usize,
}

impl TopKCollector {
    pub fn new(k: usize) -> Self {
        TopKCollector {
            heap: BinaryHeap::with_capacity(k + 1),
            k,
            total_collected: 0,
        }
    }

    pub fn collect(&mut self, scored_doc: ScoredDocument) {
        self.total_collected += 1;
        if self.k == 0 {
            return;
        }

        if self.heap.len() < self.k {
            self.heap.push(scored_doc);
        } else if let Some(weakest) = self.heap.peek() {
            if scored_doc < *weakest {
                self.heap.pop();
                self.heap.push(scored_doc);
            }
        }
    }

    /// Best first
    pub fn get_results(self) -> Vec<ScoredDocument> {
        self.heap.into_sorted_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(doc: u32, score: f64) -> ScoredDocument {
        ScoredDocument { doc_id: DocId(doc), score }
    }

    #[test]
    fn keeps_best_k_in_order() {
        let mut collector = TopKCollector::new(3);
        for (doc, score) in [(1, 0.5), (2, 2.0), (3, 0.1), (4, 1.0), (5, 3.0)] {
            collector.collect(scored(doc, score));
        }
        assert_eq!(collector.total_collected, 5);

        let docs: Vec<u32> = collector.get_results().iter().map(|d| d.doc_id.0).collect();
        assert_eq!(docs, vec![5, 2, 4]);
    }

    #[test]
    fn ties_prefer_lower_doc_id() {
        let mut collector = TopKCollector::new(2);
        for doc in [9, 3, 7, 1] {
            collector.collect(scored(doc, 1.0));
        }
        let docs: Vec<u32> = collector.get_results().iter().map(|d| d.doc_id.0).collect();
        assert_eq!(docs, vec![1, 3]);
    }

    #[test]
    fn hit_links_to_article() {
        let hit = SearchHit { doc_id: DocId(4321), title: None, score: 0.0 };
        assert_eq!(hit.document_url(), "https://en.wikipedia.org/?curid=4321");
    }
}
