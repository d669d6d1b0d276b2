//! Output buffer with tail-search prompt detection.
//!
//! Only the last `search_depth` bytes are searched for the end-of-response
//! pattern, so long transaction listings don't make every poll re-scan the
//! whole response.

use regex::bytes::Regex;

use super::sanitize::Sanitizer;

/// Accumulates stripped console output for one read.
#[derive(Debug)]
pub struct OutputBuffer {
    /// Stripped output accumulated so far.
    buffer: Vec<u8>,

    /// How many bytes from the end to search for patterns.
    search_depth: usize,

    /// Escape-sequence stripper, stateful across chunks.
    sanitizer: Sanitizer,
}

impl OutputBuffer {
    /// Create a new buffer searching the last `search_depth` bytes.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
            sanitizer: Sanitizer::new(),
        }
    }

    /// Extend the buffer with raw output, stripping control sequences.
    pub fn extend(&mut self, data: &[u8]) {
        let cleaned = self.sanitizer.feed(data);
        self.buffer.extend_from_slice(cleaned.as_bytes());
    }

    /// Search only the tail of the buffer for the pattern.
    pub fn search_tail(&self, pattern: &Regex) -> Option<regex::bytes::Match<'_>> {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        pattern.find(&self.buffer[start..])
    }

    /// Check if the tail contains a pattern match.
    pub fn tail_contains(&self, pattern: &Regex) -> bool {
        self.search_tail(pattern).is_some()
    }

    /// Take the buffer contents as text and reset.
    pub fn take_text(&mut self) -> String {
        let bytes = std::mem::take(&mut self.buffer);
        match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}
