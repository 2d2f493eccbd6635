//! Inverted index over one searchable field.
//!
//! Maps terms to postings (document slot → term frequency). Documents are
//! identified by the owning index's `u32` slots. Each document remembers its
//! distinct terms so removal touches only its own postings.

use crate::bm25::tokenizer::tokenize;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct InvertedIndex {
    /// term → (slot → term frequency)
    pub(crate) postings: HashMap<String, HashMap<u32, u32>>,
    /// slot → (token count, distinct terms)
    docs: HashMap<u32, (u32, Vec<String>)>,
    total_doc_length: u64,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `text` under `slot`, replacing whatever the slot held before.
    pub fn add_document(&mut self, slot: u32, text: &str) {
        self.remove_document(slot);
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return;
        }

        let mut tf: HashMap<&str, u32> = HashMap::new();
        for token in tokens.iter() {
            *tf.entry(token).or_insert(0) += 1;
        }
        let mut terms = Vec::with_capacity(tf.len());
        for (term, count) in tf {
            self.postings
                .entry(term.to_string())
                .or_default()
                .insert(slot, count);
            terms.push(term.to_string());
        }
        let len = tokens.len() as u32;
        self.total_doc_length += len as u64;
        self.docs.insert(slot, (len, terms));
    }

    pub fn remove_document(&mut self, slot: u32) {
        let Some((len, terms)) = self.docs.remove(&slot) else {
            return;
        };
        self.total_doc_length -= len as u64;
        for term in terms {
            if let Some(list) = self.postings.get_mut(&term) {
                list.remove(&slot);
                if list.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }
    }

    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    pub fn doc_length(&self, slot: u32) -> u32 {
        self.docs.get(&slot).map_or(0, |(len, _)| *len)
    }

    pub fn average_doc_length(&self) -> f32 {
        if self.docs.is_empty() {
            0.0
        } else {
            self.total_doc_length as f32 / self.docs.len() as f32
        }
    }
}
