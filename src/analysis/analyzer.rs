use rust_stemmers::Algorithm;
use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::{LowercaseFilter, StemmerFilter, StopWordFilter};
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{RegexTokenizer, StandardTokenizer, Tokenizer};
use crate::core::config::AnalyzerKind;
use crate::core::error::Result;

/// Text analysis pipeline. The index only ever sees its output: an ordered
/// sequence of normalized terms, duplicates kept.
pub struct Analyzer {
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    pub name: String,
}

impl Analyzer {
    pub fn new(name: String, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            tokenizer,
            filters: Vec::new(),
            name,
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);

        for filter in &self.filters {
            tokens = filter.filter(tokens);
        }

        tokens
    }

    /// Term strings in text order
    pub fn terms(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|t| t.text).collect()
    }

    pub fn from_kind(kind: AnalyzerKind) -> Result<Self> {
        match kind {
            AnalyzerKind::Wikipedia => Self::wikipedia(),
            AnalyzerKind::StandardEnglish => Ok(Self::standard_english()),
        }
    }

    /// Regex word splitting over lowercased text, English and wiki stopwords
    pub fn wikipedia() -> Result<Self> {
        Ok(Analyzer::new("wikipedia".to_string(),
                         Box::new(RegexTokenizer::wiki()?))
            .add_filter(Box::new(StopWordFilter::wikipedia())))
    }

    /// Unicode word splitting, then lowercase, English stopwords and stemming
    pub fn standard_english() -> Self {
        let tokenizer = StandardTokenizer {
            lowercase: false,
            ..StandardTokenizer::default()
        };
        Analyzer::new("standard_english".to_string(), Box::new(tokenizer))
            .add_filter(Box::new(LowercaseFilter))
            .add_filter(Box::new(StopWordFilter::english()))
            .add_filter(Box::new(StemmerFilter::new(Algorithm::English)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wikipedia_drops_stopwords_keeps_duplicates() {
        let analyzer = Analyzer::wikipedia().unwrap();
        let terms = analyzer.terms("The castle and the Castle; see also Category:Castles");
        assert_eq!(terms, vec!["castle", "castle", "castles"]);
    }

    #[test]
    fn standard_english_stems() {
        let analyzer = Analyzer::standard_english();
        assert_eq!(analyzer.terms("Running connections"), vec!["run", "connect"]);
        assert_eq!(analyzer.terms("The TOWERS"), vec!["tower"]);
    }

    #[test]
    fn only_stopwords_yields_nothing() {
        let analyzer = Analyzer::wikipedia().unwrap();
        assert!(analyzer.terms("the and of which").is_empty());
    }
}
