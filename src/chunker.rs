//! Fixed-width sliding-window passage splitter.
//!
//! Window sizes are configured in approximate tokens and converted to characters with a
//! fixed ratio; there is no real tokenizer behind the conversion. Offsets and widths are
//! counted in Unicode scalar values so windows never split a UTF-8 sequence.

use serde::Serialize;

use crate::error::{Result, RetrievalError};

/// Contiguous window of page text emitted for embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Window text, at most `size` characters.
    pub text: String,
    /// Position of the window in the emitted sequence.
    pub index: usize,
    /// Character offset of the window start within the source text.
    pub start_offset: usize,
}

/// Passage sizing knobs, expressed in approximate tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Tokens per passage.
    pub passage_tokens: usize,
    /// Tokens shared between adjacent passages.
    pub overlap_tokens: usize,
    /// Characters assumed per token.
    pub chars_per_token: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            passage_tokens: 400,
            overlap_tokens: 50,
            chars_per_token: 4,
        }
    }
}

impl ChunkingConfig {
    /// Converts the token sizes into a validated character window.
    pub fn chunker(&self) -> Result<TextChunker> {
        if self.chars_per_token == 0 {
            return Err(RetrievalError::Configuration(
                "chars_per_token must be greater than zero".into(),
            ));
        }
        TextChunker::new(
            self.passage_tokens.saturating_mul(self.chars_per_token),
            self.overlap_tokens.saturating_mul(self.chars_per_token),
        )
    }
}

/// Validated window geometry (in characters).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Builds a chunker, rejecting geometries that could never advance.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(RetrievalError::Configuration(
                "passage size must be greater than zero".into(),
            ));
        }
        if overlap >= size {
            return Err(RetrievalError::Configuration(format!(
                "overlap ({overlap}) must be smaller than passage size ({size})"
            )));
        }
        Ok(Self { size, overlap })
    }

    /// Window width in characters.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Characters shared by adjacent windows.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn stride(&self) -> usize {
        self.size - self.overlap
    }

    /// Number of windows produced for a text of `len` characters.
    pub fn expected_count(&self, len: usize) -> usize {
        len.saturating_sub(self.overlap).div_ceil(self.stride())
    }

    /// Lazily walks `text`, yielding one chunk per window position.
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            text,
            total_chars: text.chars().count(),
            size: self.size,
            overlap: self.overlap,
            stride: self.stride(),
            start_char: 0,
            start_byte: 0,
            index: 0,
        }
    }
}

/// Convenience wrapper: validates the geometry and collects every window of `text`.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    let chunker = TextChunker::new(size, overlap)?;
    Ok(chunker.chunks(text).collect())
}

/// Iterator returned by [`TextChunker::chunks`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    total_chars: usize,
    size: usize,
    overlap: usize,
    stride: usize,
    start_char: usize,
    start_byte: usize,
    index: usize,
}

impl Chunks<'_> {
    fn byte_after(&self, chars: usize) -> usize {
        self.text[self.start_byte..]
            .char_indices()
            .nth(chars)
            .map(|(offset, _)| self.start_byte + offset)
            .unwrap_or(self.text.len())
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        // A window whose only new content would lie inside the previous overlap is not emitted.
        if self.start_char + self.overlap >= self.total_chars {
            return None;
        }
        let end_byte = self.byte_after(self.size);
        let chunk = Chunk {
            text: self.text[self.start_byte..end_byte].to_string(),
            index: self.index,
            start_offset: self.start_char,
        };
        self.start_byte = self.byte_after(self.stride);
        self.start_char += self.stride;
        self.index += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .total_chars
            .saturating_sub(self.start_char)
            .saturating_sub(self.overlap)
            .div_ceil(self.stride);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks<'_> {}
