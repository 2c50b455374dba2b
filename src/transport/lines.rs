use crate::error::ProtocolError;

/// Longest wire line accepted, in bytes, excluding the line terminator.
pub const MAX_LINE_LEN: usize = 8191;

/// Reassembles transport frames into wire lines.
///
/// Lines end at `\n`; a trailing `\r` is stripped and empty lines are
/// dropped. Text after the last `\n` of a frame is kept until a later frame
/// completes it.
#[derive(Debug, Default)]
pub struct LineBuffer {
    partial: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame and return every line it completes, in order.
    ///
    /// A line longer than [`MAX_LINE_LEN`] yields
    /// [`ProtocolError::MessageTooLong`] in its place. An unterminated
    /// remainder that grows past the limit is discarded the same way.
    pub fn push(&mut self, frame: &str) -> Vec<Result<String, ProtocolError>> {
        self.partial.push_str(frame);

        let mut lines = Vec::new();
        while let Some(end) = self.partial.find('\n') {
            let mut line: String = self.partial.drain(..=end).collect();
            while line.ends_with(['\r', '\n']) {
                line.pop();
            }

            if line.is_empty() {
                continue;
            }
            if line.len() > MAX_LINE_LEN {
                lines.push(Err(ProtocolError::MessageTooLong(line.len())));
                continue;
            }
            lines.push(Ok(line));
        }

        if self.partial.len() > MAX_LINE_LEN {
            lines.push(Err(ProtocolError::MessageTooLong(self.partial.len())));
            self.partial.clear();
        }

        lines
    }

    /// Text received after the last complete line.
    pub fn pending(&self) -> &str {
        &self.partial
    }

    /// Drop any partial line, e.g. when the connection is replaced.
    pub fn clear(&mut self) {
        self.partial.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_lines(results: Vec<Result<String, ProtocolError>>) -> Vec<String> {
        results.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_splits_multiple_lines_in_order() {
        let mut buf = LineBuffer::new();
        let lines = ok_lines(buf.push(
            ":tmi.twitch.tv 001 bot :Welcome, GLHF!\r\n:tmi.twitch.tv 002 bot :Your host is tmi.twitch.tv\r\n",
        ));
        assert_eq!(
            lines,
            vec![
                ":tmi.twitch.tv 001 bot :Welcome, GLHF!",
                ":tmi.twitch.tv 002 bot :Your host is tmi.twitch.tv",
            ]
        );
        assert_eq!(buf.pending(), "");
    }

    #[test]
    fn test_carries_partial_line() {
        let mut buf = LineBuffer::new();
        assert!(buf.push("PING :tmi.tw").is_empty());
        assert_eq!(buf.pending(), "PING :tmi.tw");
        assert_eq!(ok_lines(buf.push("itch.tv\r\n")), vec!["PING :tmi.twitch.tv"]);
    }

    #[test]
    fn test_drops_empty_lines() {
        let mut buf = LineBuffer::new();
        assert_eq!(ok_lines(buf.push("\r\n\nRECONNECT\n\r\n")), vec!["RECONNECT"]);
    }

    #[test]
    fn test_rejects_long_line_and_continues() {
        let mut buf = LineBuffer::new();
        let long = "a".repeat(MAX_LINE_LEN + 1);
        let results = buf.push(&format!("{}\r\nPING :x\r\n", long));
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0],
            Err(ProtocolError::MessageTooLong(n)) if n == MAX_LINE_LEN + 1
        ));
        assert_eq!(results[1].as_deref().unwrap(), "PING :x");
    }

    #[test]
    fn test_discards_oversized_partial() {
        let mut buf = LineBuffer::new();
        let results = buf.push(&"b".repeat(MAX_LINE_LEN + 10));
        assert_eq!(results.len(), 1);
        assert_eq!(buf.pending(), "");
    }
}
