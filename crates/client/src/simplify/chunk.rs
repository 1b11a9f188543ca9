//! Fixed-size chunking of simplified documents.
//!
//! Slices are cut every `max_chars` characters with no overlap and no regard
//! for markup, so a tag can straddle two chunks. The model is expected to
//! cope with the fragments.

/// Default maximum characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 30_000;

/// A contiguous slice of a document, addressable as part `index + 1` of `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Zero-based position in document order.
    pub index: usize,
    pub total: usize,
    pub text: &'a str,
}

impl Chunk<'_> {
    /// One-based `"i/n"` label used in prompts.
    pub fn label(&self) -> String {
        format!("{}/{}", self.index + 1, self.total)
    }
}

/// Split `document` into slices of at most `max_chars` characters.
///
/// A document that fits is returned as a single chunk; an empty document
/// yields no chunks. `max_chars` of 0 is treated as 1.
pub fn chunk(document: &str, max_chars: usize) -> Vec<Chunk<'_>> {
    let max_chars = max_chars.max(1);

    let mut bounds: Vec<usize> = document
        .char_indices()
        .map(|(offset, _)| offset)
        .step_by(max_chars)
        .collect();
    bounds.push(document.len());

    let total = bounds.len() - 1;
    bounds
        .windows(2)
        .enumerate()
        .map(|(index, w)| Chunk { index, total, text: &document[w[0]..w[1]] })
        .collect()
}
