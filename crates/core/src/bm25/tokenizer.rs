//! Lowercasing tokenizer with English stop word removal.
//!
//! Text is split on every non-alphanumeric character. Stop words and
//! single-character tokens are dropped. Tokens borrow from one lowercased
//! buffer, so tokenizing allocates once per input rather than once per term.

/// Sorted for binary search.
const STOP_WORDS: &[&str] = &[
    "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.binary_search(&token).is_ok()
}

/// Lowercased text plus the byte spans of its indexable terms.
pub struct Tokens {
    buffer: String,
    spans: Vec<(usize, usize)>,
}

impl Tokens {
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.spans.iter().map(|&(s, e)| &self.buffer[s..e])
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

pub fn tokenize(text: &str) -> Tokens {
    let buffer = text.to_lowercase();
    let mut spans = Vec::new();
    let mut push = |s: usize, e: usize, buf: &str| {
        let token = &buf[s..e];
        if token.chars().nth(1).is_some() && !is_stop_word(token) {
            spans.push((s, e));
        }
    };

    let mut start = None;
    for (i, c) in buffer.char_indices() {
        match (c.is_alphanumeric(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                push(s, i, &buffer);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        push(s, buffer.len(), &buffer);
    }

    Tokens { buffer, spans }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_words_sorted() {
        assert!(STOP_WORDS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_punctuation() {
        let tokens = tokenize("The quick, brown fox -- jumps over THE lazy dog!");
        let words: Vec<&str> = tokens.iter().collect();
        assert_eq!(words, vec!["quick", "brown", "fox", "jumps", "over", "lazy", "dog"]);
    }

    #[test]
    fn test_single_characters_dropped() {
        let tokens = tokenize("a b c rust 9 42");
        let words: Vec<&str> = tokens.iter().collect();
        assert_eq!(words, vec!["rust", "42"]);
    }

    #[test]
    fn test_unicode_lowercasing() {
        let tokens = tokenize("Café ÜBER");
        let words: Vec<&str> = tokens.iter().collect();
        assert_eq!(words, vec!["café", "über"]);
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_empty() {
        assert!(tokenize("  ,; ").is_empty());
    }
}
