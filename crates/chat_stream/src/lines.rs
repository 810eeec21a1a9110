use crate::error::{Result, StreamError};

/// Longest partial line kept while waiting for its `\n` (1 MiB).
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Carry-over buffer that splits decoded text into complete lines.
///
/// Text after the last `\n` stays buffered until more text or the end of
/// the stream arrives.
#[derive(Debug)]
pub struct LineBuffer {
    buffer: String,
    max_line_bytes: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }

    pub fn with_limit(max_line_bytes: usize) -> Self {
        Self {
            buffer: String::new(),
            max_line_bytes,
        }
    }

    /// Append `text` and return every line it completed, in order.
    ///
    /// Fails once the unterminated tail outgrows the limit.
    pub fn push(&mut self, text: &str) -> Result<Vec<String>> {
        let Some(offset) = text.rfind('\n') else {
            if self.buffer.len() + text.len() > self.max_line_bytes {
                return Err(StreamError::LineTooLong {
                    limit: self.max_line_bytes,
                });
            }
            self.buffer.push_str(text);
            return Ok(Vec::new());
        };

        let (complete, rest) = text.split_at(offset);
        self.buffer.push_str(complete);
        let lines = self.buffer.split('\n').map(str::to_owned).collect();

        self.buffer.clear();
        let rest = &rest[1..];
        if rest.len() > self.max_line_bytes {
            return Err(StreamError::LineTooLong {
                limit: self.max_line_bytes,
            });
        }
        self.buffer.push_str(rest);
        Ok(lines)
    }

    /// Take whatever is left once the input has ended.
    pub fn take_rest(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_incomplete_tail() {
        let mut lines = LineBuffer::new();

        assert!(lines.push("data: {\"con").unwrap().is_empty());
        assert_eq!(lines.pending(), "data: {\"con");

        let complete = lines.push("tent\":\"A\"}\ndata: ").unwrap();
        assert_eq!(complete, vec!["data: {\"content\":\"A\"}"]);
        assert_eq!(lines.pending(), "data: ");
    }

    #[test]
    fn preserves_empty_lines_between_newlines() {
        let mut lines = LineBuffer::new();
        assert_eq!(lines.push("a\n\nb\n").unwrap(), vec!["a", "", "b"]);
        assert_eq!(lines.take_rest(), None);
    }

    #[test]
    fn take_rest_drains_buffer() {
        let mut lines = LineBuffer::new();
        lines.push("tail").unwrap();
        assert_eq!(lines.take_rest().as_deref(), Some("tail"));
        assert_eq!(lines.take_rest(), None);
    }

    #[test]
    fn long_line_in_small_pieces_is_reassembled() {
        let mut lines = LineBuffer::new();
        let piece = "x".repeat(64);
        for _ in 0..1000 {
            assert!(lines.push(&piece).unwrap().is_empty());
        }

        let complete = lines.push("\n").unwrap();
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].len(), 64_000);
        assert_eq!(lines.pending(), "");
    }

    #[test]
    fn unterminated_line_over_limit_fails() {
        let mut lines = LineBuffer::with_limit(8);
        lines.push("12345").unwrap();

        assert!(matches!(
            lines.push("6789"),
            Err(StreamError::LineTooLong { limit: 8 })
        ));
        // Completed lines may be longer; only the waiting tail is bounded.
        let mut lines = LineBuffer::with_limit(8);
        assert_eq!(lines.push("0123456789\nab").unwrap(), vec!["0123456789"]);
        assert!(matches!(
            lines.push("\n0123456789"),
            Err(StreamError::LineTooLong { limit: 8 })
        ));
    }
}
