//! Line index over a text buffer, 0-based.
//!
//! - One memchr pass records every '\n'.
//! - A trailing '\n' terminates the last line; it does not open a new one,
//!   so `"a\nb\n"` has two lines (what an editor shows as content lines).
//! - Byte ranges are half-open and include the line terminators, which makes
//!   `&text[lo..hi]` a verbatim slice of whole lines.

#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset where each line starts
    starts: Vec<usize>,
    /// Total byte length of the buffer
    len: usize,
}

impl LineIndex {
    pub fn build(bytes: &[u8]) -> Self {
        let mut starts = Vec::with_capacity(bytes.len() / 48 + 1);
        if !bytes.is_empty() {
            starts.push(0);
        }
        for nl in memchr::memchr_iter(b'\n', bytes) {
            if nl + 1 < bytes.len() {
                starts.push(nl + 1);
            }
        }
        Self {
            starts,
            len: bytes.len(),
        }
    }

    /// Number of lines; 0 for an empty buffer.
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Half-open byte span covering lines `[first, end)`.
    /// `end` is clamped to the line count; `None` when `first` is out of range.
    pub fn byte_range(&self, first: usize, end: usize) -> Option<(usize, usize)> {
        if first >= self.line_count() || end <= first {
            return None;
        }
        let lo = self.starts[first];
        let hi = self
            .starts
            .get(end)
            .copied()
            .unwrap_or(self.len);
        Some((lo, hi))
    }

    /// 0-based line containing `byte` (bytes past the end map to the last line).
    pub fn line_of_byte(&self, byte: usize) -> usize {
        match self.starts.binary_search(&byte) {
            Ok(line) => line,
            Err(insert) => insert.saturating_sub(1),
        }
    }

    /// Slice `count` lines starting at `first` out of `text`.
    pub fn window<'a>(&self, text: &'a str, first: usize, count: usize) -> &'a str {
        match self.byte_range(first, first.saturating_add(count)) {
            Some((lo, hi)) => &text[lo..hi],
            None => "",
        }
    }
}

/// Count lines the same way `LineIndex` does, without allocating.
pub fn count_lines(bytes: &[u8]) -> usize {
    if bytes.is_empty() {
        return 0;
    }
    let newlines = bytecount::count(bytes, b'\n');
    if bytes.ends_with(b"\n") { newlines } else { newlines + 1 }
}
