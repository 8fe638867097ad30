//! Fixed-length text segmentation with overlap.
//!
//! Lengths and offsets are counted in Unicode scalar values, so a window never
//! splits a multi-byte character.

use docqa_core::{AppError, AppResult};

/// Validated window configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segmenter {
    size: usize,
    overlap: usize,
}

impl Segmenter {
    /// Create a segmenter producing windows of `size` characters that overlap
    /// by `overlap` characters.
    ///
    /// Fails with `InvalidArgument` unless `0 <= overlap < size`; any other
    /// combination would never advance.
    pub fn new(size: usize, overlap: usize) -> AppResult<Self> {
        if size == 0 {
            return Err(AppError::InvalidArgument(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if overlap >= size {
            return Err(AppError::InvalidArgument(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Lazily split `text` into overlapping windows.
    pub fn split<'a>(&self, text: &'a str) -> Segments<'a> {
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());

        Segments {
            text,
            offsets,
            start: 0,
            size: self.size,
            overlap: self.overlap,
            done: text.is_empty(),
        }
    }
}

/// Iterator over the windows of one text. See [`Segmenter::split`].
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    text: &'a str,
    /// Byte offset of every char, plus `text.len()` as the final entry.
    offsets: Vec<usize>,
    start: usize,
    size: usize,
    overlap: usize,
    done: bool,
}

impl<'a> Iterator for Segments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let char_len = self.offsets.len() - 1;
        let end = (self.start + self.size).min(char_len);
        let window = &self.text[self.offsets[self.start]..self.offsets[end]];

        if end == char_len {
            self.done = true;
        } else {
            self.start = end - self.overlap;
        }

        Some(window)
    }
}

/// Split `text` into windows of `size` characters overlapping by `overlap`.
///
/// Convenience wrapper over [`Segmenter`]; whitespace-only windows are kept.
pub fn split(text: &str, size: usize, overlap: usize) -> AppResult<Vec<&str>> {
    let segmenter = Segmenter::new(size, overlap)?;
    let windows: Vec<&str> = segmenter.split(text).collect();

    tracing::trace!(
        "Split {} chars into {} windows (size: {}, overlap: {})",
        text.chars().count(),
        windows.len(),
        size,
        overlap
    );

    Ok(windows)
}
