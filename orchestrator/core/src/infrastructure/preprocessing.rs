// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Content Preprocessing
//!
//! Turns raw scraped text into prompt-ready text: chunk, summarize, filter,
//! truncate. Summarizer and filter are pluggable; the defaults keep chunks
//! as they are and drop fragments below the minimum length.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::domain::engine_config::ContentConfig;
use crate::domain::website::ProcessedContent;

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, chunk: String) -> String;
}

pub trait ContentFilter: Send + Sync {
    fn keep(&self, chunk: &str) -> bool;
}

/// Returns chunks unchanged
pub struct IdentitySummarizer;

#[async_trait]
impl Summarizer for IdentitySummarizer {
    async fn summarize(&self, chunk: String) -> String {
        chunk
    }
}

/// Drops chunks shorter than `min_chars` characters
pub struct MinLengthFilter {
    pub min_chars: usize,
}

impl ContentFilter for MinLengthFilter {
    fn keep(&self, chunk: &str) -> bool {
        chunk.trim().chars().count() >= self.min_chars
    }
}

pub struct ContentPreprocessor {
    chunk_size: usize,
    max_length: usize,
    summarizer: Arc<dyn Summarizer>,
    filter: Arc<dyn ContentFilter>,
}

impl ContentPreprocessor {
    pub fn new(config: &ContentConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
            max_length: config.max_content_length,
            summarizer: Arc::new(IdentitySummarizer),
            filter: Arc::new(MinLengthFilter {
                min_chars: config.min_content_length,
            }),
        }
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn ContentFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Split on blank lines, packing paragraphs into chunks of at most
    /// `chunk_size` characters. Oversized paragraphs are split on whitespace.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        let paragraphs = text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty());

        for paragraph in paragraphs {
            for piece in split_long(paragraph, self.chunk_size) {
                let needed = if current.is_empty() {
                    piece.chars().count()
                } else {
                    current.chars().count() + 2 + piece.chars().count()
                };
                if needed > self.chunk_size && !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                if !current.is_empty() {
                    current.push_str("\n\n");
                }
                current.push_str(&piece);
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }

    pub async fn process(&self, url: &str, text: &str) -> ProcessedContent {
        let raw_chunks = self.chunk(text);

        let mut summarized = Vec::with_capacity(raw_chunks.len());
        for chunk in raw_chunks {
            summarized.push(self.summarizer.summarize(chunk).await);
        }

        let kept: Vec<String> = summarized
            .iter()
            .filter(|chunk| self.filter.keep(chunk))
            .cloned()
            .collect();

        // A short page is still better than nothing
        let chunks = if kept.is_empty() {
            debug!(url = %url, "Content filter removed every chunk, keeping unfiltered text");
            summarized
        } else {
            kept
        };

        let text = truncate_chars(&chunks.join("\n\n"), self.max_length);
        ProcessedContent {
            url: url.to_string(),
            chunks,
            text,
            crawl: false,
            from_cache: false,
        }
    }
}

fn split_long(paragraph: &str, max_chars: usize) -> Vec<String> {
    if paragraph.chars().count() <= max_chars {
        return vec![paragraph.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in paragraph.split_whitespace() {
        let word_len = word.chars().count();
        let current_len = current.chars().count();
        if !current.is_empty() && current_len + 1 + word_len > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        if word_len > max_chars {
            // A single token longer than a chunk is cut hard
            let chars: Vec<char> = word.chars().collect();
            for slice in chars.chunks(max_chars) {
                pieces.push(slice.iter().collect());
            }
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preprocessor(chunk_size: usize, min: usize, max: usize) -> ContentPreprocessor {
        ContentPreprocessor::new(&ContentConfig {
            min_content_length: min,
            max_content_length: max,
            chunk_size,
        })
    }

    #[test]
    fn test_chunks_respect_paragraphs_and_size() {
        let p = preprocessor(30, 0, 1000);
        let chunks = p.chunk("First paragraph.\n\nSecond one.\n\n\n\nThird paragraph here.");
        assert_eq!(chunks, vec!["First paragraph.\n\nSecond one.", "Third paragraph here."]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 30));
    }

    #[test]
    fn test_long_paragraph_is_split() {
        let p = preprocessor(10, 0, 1000);
        let chunks = p.chunk("alpha beta gamma delta epsilon");
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));

        let chunks = p.chunk("abcdefghijklmnopqrstuvwxyz");
        assert_eq!(chunks, vec!["abcdefghij", "klmnopqrst", "uvwxyz"]);
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
        assert_eq!(truncate_chars("short", 50), "short");
    }

    #[tokio::test]
    async fn test_process_filters_short_chunks() {
        let p = preprocessor(40, 10, 1000);
        let processed = p
            .process("https://a.test", "Menu\n\nWe build reliable rockets for everyone.\n\nOk")
            .await;
        assert_eq!(processed.chunks.len(), 1);
        assert!(processed.text.contains("reliable rockets"));
        assert!(!processed.text.contains("Menu"));
    }

    #[tokio::test]
    async fn test_process_keeps_short_page_and_truncates() {
        let p = preprocessor(100, 500, 12);
        let processed = p.process("https://a.test", "Tiny page with little text").await;
        assert_eq!(processed.text, "Tiny page wi");
        assert!(!processed.from_cache);
    }

    struct Shouting;

    #[async_trait]
    impl Summarizer for Shouting {
        async fn summarize(&self, chunk: String) -> String {
            chunk.to_uppercase()
        }
    }

    #[tokio::test]
    async fn test_custom_summarizer() {
        let p = preprocessor(100, 0, 100).with_summarizer(Arc::new(Shouting));
        let processed = p.process("https://a.test", "quiet words").await;
        assert_eq!(processed.text, "QUIET WORDS");
    }
}
