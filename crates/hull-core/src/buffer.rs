//! Per-connection receive buffering.

/// Bytes received from one connection that do not yet form a full line.
///
/// Input is split on `\n`; the returned line excludes the terminator but may
/// still carry a trailing `\r`, which the engine trims with the rest of the
/// surrounding whitespace. Invalid UTF-8 is replaced rather than rejected so
/// the line still reaches the parser and earns an `ERROR` response.
///
/// An optional cap bounds the unterminated tail; callers check
/// [`is_overflowing`](Self::is_overflowing) after draining complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_line_length: Option<usize>,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer that reports overflow once an unterminated line exceeds
    /// `max_line_length` bytes.
    #[must_use]
    pub fn with_limit(max_line_length: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line_length: Some(max_line_length),
        }
    }

    /// Appends freshly received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Removes and returns the next complete line, if any.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line[..end]).into_owned())
    }

    /// Bytes waiting for a terminator.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the bytes after the last terminator exceed the cap.
    ///
    /// Only meaningful once [`next_line`](Self::next_line) has returned
    /// `None`; before that, complete lines still count toward the length.
    #[must_use]
    pub fn is_overflowing(&self) -> bool {
        self.max_line_length.is_some_and(|max| self.pending.len() > max)
    }
}
