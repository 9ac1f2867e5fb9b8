//! Splitting recognized page text into overlapping chunks.
//!
//! Sizes are measured either in characters or in cl100k tokens. `semchunk-rs` produces base
//! chunks bounded by `chunk_size - overlap - separator`, then each chunk after the first is
//! prefixed with the tail of its predecessor and a joining space. The budget reserves room for
//! both, so the carried tail is never cut and the final string never exceeds `chunk_size`.

use crate::config::ChunkUnit;
use semchunk_rs::Chunker;
use std::sync::Arc;
use tiktoken_rs::cl100k_base;

use super::types::ChunkingError;

type SizeCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

const TOKEN_ENCODING: &str = "cl100k_base";
const SEPARATOR: &str = " ";

/// Reusable splitter configured with a size budget and overlap.
#[derive(Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
    base_budget: usize,
    counter: SizeCounter,
}

impl std::fmt::Debug for TextChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextChunker")
            .field("chunk_size", &self.chunk_size)
            .field("overlap", &self.overlap)
            .finish_non_exhaustive()
    }
}

impl TextChunker {
    /// Build a chunker measuring sizes in `unit`.
    ///
    /// Fails when `chunk_size` is zero, when the overlap and its separator leave no room for new
    /// content, or when the token encoding cannot be loaded.
    pub fn new(unit: ChunkUnit, chunk_size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        let counter = match unit {
            ChunkUnit::Chars => char_counter(),
            ChunkUnit::Tokens => token_counter()?,
        };
        Self::with_counter(chunk_size, overlap, counter)
    }

    fn with_counter(
        chunk_size: usize,
        overlap: usize,
        counter: SizeCounter,
    ) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        let separator = if overlap > 0 {
            counter.as_ref()(SEPARATOR)
        } else {
            0
        };
        let base_budget = chunk_size
            .checked_sub(overlap + separator)
            .filter(|budget| *budget > 0)
            .ok_or(ChunkingError::InvalidOverlap {
                overlap,
                chunk_size,
            })?;
        Ok(Self {
            chunk_size,
            overlap,
            base_budget,
            counter,
        })
    }

    /// Split `text` into non-empty chunks in reading order.
    ///
    /// Returns an empty vector when the input is blank.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let counter = self.counter.clone();
        let chunker = Chunker::new(
            self.base_budget,
            Box::new(move |segment: &str| counter.as_ref()(segment)),
        );
        let base_chunks: Vec<String> = chunker
            .chunk(text)
            .into_iter()
            .filter(|chunk| !chunk.trim().is_empty())
            .collect();

        apply_overlap(base_chunks, self.chunk_size, self.overlap, &self.counter)
    }
}

fn char_counter() -> SizeCounter {
    Arc::new(|segment: &str| segment.chars().count())
}

fn token_counter() -> Result<SizeCounter, ChunkingError> {
    let encoding = cl100k_base().map_err(|source| ChunkingError::Tokenizer {
        encoding: TOKEN_ENCODING.to_string(),
        source,
    })?;
    let encoding = Arc::new(encoding);
    Ok(Arc::new(move |segment: &str| {
        encoding.encode_ordinary(segment).len()
    }))
}

fn apply_overlap(
    chunks: Vec<String>,
    chunk_size: usize,
    overlap: usize,
    counter: &SizeCounter,
) -> Vec<String> {
    if overlap == 0 || chunks.len() < 2 {
        return chunks;
    }

    let mut overlapped = Vec::with_capacity(chunks.len());
    let mut previous: Option<String> = None;
    for current in chunks {
        let chunk = match previous.as_deref() {
            Some(prev) => build_overlapped_chunk(prev, &current, overlap, chunk_size, counter),
            None => current.clone(),
        };
        overlapped.push(chunk);
        previous = Some(current);
    }
    overlapped
}

fn build_overlapped_chunk(
    previous: &str,
    current: &str,
    overlap: usize,
    chunk_size: usize,
    counter: &SizeCounter,
) -> String {
    let tail = tail_within_budget(previous, overlap, counter);
    let mut combined = String::with_capacity(tail.len() + current.len() + 1);

    if !tail.is_empty() {
        combined.push_str(tail);
        if !ends_with_whitespace(tail) && !starts_with_whitespace(current) {
            combined.push_str(SEPARATOR);
        }
    }

    combined.push_str(current);
    trim_to_budget(&combined, chunk_size, counter)
}

/// Longest suffix of `text` (left-trimmed) whose size fits in `limit`.
fn tail_within_budget<'a>(text: &'a str, limit: usize, counter: &SizeCounter) -> &'a str {
    let mut offsets = text.char_indices().map(|(offset, _)| offset);
    loop {
        let Some(start) = offsets.next() else {
            return "";
        };
        let candidate = text[start..].trim_start();
        if counter.as_ref()(candidate) <= limit {
            return candidate;
        }
    }
}

fn trim_to_budget(text: &str, budget: usize, counter: &SizeCounter) -> String {
    if counter.as_ref()(text) <= budget {
        return text.to_string();
    }
    tail_within_budget(text, budget, counter).to_string()
}

fn starts_with_whitespace(text: &str) -> bool {
    text.chars().next().is_some_and(char::is_whitespace)
}

fn ends_with_whitespace(text: &str) -> bool {
    text.chars().next_back().is_some_and(char::is_whitespace)
}
