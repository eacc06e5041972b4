use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;
use crate::analysis::token::Token;
use crate::core::error::Result;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;

    fn name(&self) -> &str;
}

/// Standard Unicode tokenizer
#[derive(Clone)]
pub struct StandardTokenizer {
    pub lowercase: bool,
    pub max_token_length: usize,
}

impl Default for StandardTokenizer {
    fn default() -> Self {
        StandardTokenizer {
            lowercase: true,
            max_token_length: 255,
        }
    }
}

impl Tokenizer for StandardTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;

        for (offset, word) in text.unicode_word_indices() {
            if word.len() <= self.max_token_length {
                let token_text = if self.lowercase {
                    word.to_lowercase()
                } else {
                    word.to_string()
                };

                tokens.push(Token::new(token_text, position, offset));
                position += 1;
            }
        }

        tokens
    }

    fn name(&self) -> &str {
        "standard"
    }
}

/// Word pattern for wiki markup: 3 to 26 word characters, optionally led by
/// `#`/`@`, allowing single inner apostrophes or hyphens.
pub const WIKI_WORD_PATTERN: &str = r"[#@\w](['\-]?\w){2,24}";

/// Lowercases the whole text, then emits every non-overlapping match of a
/// word pattern.
pub struct RegexTokenizer {
    pub pattern: Regex,
}

impl RegexTokenizer {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(RegexTokenizer {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn wiki() -> Result<Self> {
        Self::new(WIKI_WORD_PATTERN)
    }
}

impl Tokenizer for RegexTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let lowered = text.to_lowercase();

        self.pattern
            .find_iter(&lowered)
            .enumerate()
            .map(|(position, m)| Token::new(m.as_str().to_string(), position as u32, m.start()))
            .collect()
    }

    fn name(&self) -> &str {
        "regex"
    }
}
