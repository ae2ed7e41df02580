//! Line buffering shared by every stream decoder.
//!
//! The body of a streaming response arrives in arbitrary byte chunks: a chunk
//! may hold zero, one, or several complete lines plus a trailing partial
//! line. [`LineScanner`] accumulates chunks and yields complete lines only,
//! holding the remainder until the next push, so decoders behave identically
//! no matter where the transport splits the stream.

use memchr::memchr;

#[derive(Debug, Default)]
pub struct LineScanner {
    buf: Vec<u8>,
}

impl LineScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete line, without its terminator. Returns `None` until a
    /// newline arrives; invalid UTF-8 lines are dropped (a corrupt line must
    /// not abort the stream).
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let newline = memchr(b'\n', &self.buf)?;
            let line = match std::str::from_utf8(&self.buf[..newline]) {
                Ok(s) => Some(s.trim_end_matches('\r').to_string()),
                Err(err) => {
                    tracing::debug!("dropping invalid UTF-8 stream line: {err}");
                    None
                }
            };
            self.buf.drain(..=newline);
            if let Some(line) = line {
                return Some(line);
            }
        }
    }
}

/// Extracts the payload of a `data: `-prefixed event line. Lines without the
/// marker (blank keep-alives, `event:` headers, comments) yield `None` and
/// are ignored by the decoders.
pub fn event_data(line: &str) -> Option<&str> {
    line.strip_prefix("data: ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(scanner: &mut LineScanner) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = scanner.next_line() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn yields_complete_lines_only() {
        let mut scanner = LineScanner::new();
        scanner.push(b"data: one\ndata: tw");
        assert_eq!(drain(&mut scanner), vec!["data: one"]);

        scanner.push(b"o\n");
        assert_eq!(drain(&mut scanner), vec!["data: two"]);
    }

    #[test]
    fn partial_line_survives_many_pushes() {
        let mut scanner = LineScanner::new();
        for b in b"data: hello" {
            scanner.push(&[*b]);
            assert_eq!(scanner.next_line(), None);
        }
        scanner.push(b"\n");
        assert_eq!(scanner.next_line(), Some("data: hello".to_string()));
    }

    #[test]
    fn multiple_lines_in_one_chunk() {
        let mut scanner = LineScanner::new();
        scanner.push(b"a\nb\n\nc\n");
        assert_eq!(drain(&mut scanner), vec!["a", "b", "", "c"]);
    }

    #[test]
    fn strips_carriage_returns() {
        let mut scanner = LineScanner::new();
        scanner.push(b"data: x\r\n");
        assert_eq!(scanner.next_line(), Some("data: x".to_string()));
    }

    #[test]
    fn invalid_utf8_line_is_dropped_not_fatal() {
        let mut scanner = LineScanner::new();
        scanner.push(&[0xff, 0xfe, b'\n']);
        scanner.push(b"data: ok\n");
        assert_eq!(drain(&mut scanner), vec!["data: ok"]);
    }

    #[test]
    fn event_data_marker() {
        assert_eq!(event_data("data: {\"x\":1}"), Some("{\"x\":1}"));
        assert_eq!(event_data("event: ping"), None);
        assert_eq!(event_data(""), None);
    }
}
