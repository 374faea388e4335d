//! Line framing
//!
//! Reassembles the board's `\r\n`-terminated output lines from arbitrarily
//! fragmented reads. The board emits short ASCII lines; anything that grows
//! past [`MAX_LINE_LENGTH`] without a terminator is treated as line noise
//! and discarded rather than buffered forever.

use super::{LINE_TERMINATOR, MAX_LINE_LENGTH};

/// Accumulates raw bytes and yields complete lines
///
/// Bytes pushed in are either returned as part of a complete line by
/// [`LineFramer::drain_lines`], retained as the partial tail of the next
/// line, or counted as an overflow drop. No bytes are lost or duplicated
/// across call boundaries.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
    overflows: u64,
}

impl LineFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest a chunk of raw input (zero-length chunks are fine)
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Extract every complete line accumulated so far
    ///
    /// Lines are returned without their terminator. A trailing partial line
    /// stays buffered for the next call. Overlong lines and an overlong
    /// unterminated tail are dropped whole and counted in
    /// [`LineFramer::overflows`].
    pub fn drain_lines(&mut self) -> Vec<String> {
        let term = LINE_TERMINATOR.as_bytes();
        let mut lines = Vec::new();
        let mut start = 0;

        while let Some(pos) = find_terminator(&self.buffer[start..]) {
            let raw = &self.buffer[start..start + pos];
            if raw.len() > MAX_LINE_LENGTH {
                self.overflows += 1;
                tracing::warn!(len = raw.len(), "dropping overlong line");
            } else {
                lines.push(String::from_utf8_lossy(raw).into_owned());
            }
            start += pos + term.len();
        }
        self.buffer.drain(..start);

        // An unterminated tail past the limit will never become a valid
        // line; fail closed instead of growing without bound.
        if self.buffer.len() > MAX_LINE_LENGTH {
            self.overflows += 1;
            tracing::warn!(len = self.buffer.len(), "dropping overlong partial line");
            self.buffer.clear();
        }

        lines
    }

    /// Number of bytes currently buffered as a partial line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Number of overlong lines/tails dropped so far
    pub fn overflows(&self) -> u64 {
        self.overflows
    }
}

/// Find the first `\r\n` in `bytes`, returning the offset of the `\r`
fn find_terminator(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|w| w == LINE_TERMINATOR.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_line() {
        let mut framer = LineFramer::new();
        framer.push(b"* STATUS: WORD=0185\r\n");
        assert_eq!(framer.drain_lines(), vec!["* STATUS: WORD=0185"]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_partial_line_retained() {
        let mut framer = LineFramer::new();
        framer.push(b"* BME280: T=25.00");
        assert!(framer.drain_lines().is_empty());
        assert_eq!(framer.pending(), 17);

        framer.push(b" P=101300.00 H=40.00\r\n");
        assert_eq!(
            framer.drain_lines(),
            vec!["* BME280: T=25.00 P=101300.00 H=40.00"]
        );
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut framer = LineFramer::new();
        framer.push(b"one\r\ntwo\r\nthr");
        assert_eq!(framer.drain_lines(), vec!["one", "two"]);
        framer.push(b"ee\r\n");
        assert_eq!(framer.drain_lines(), vec!["three"]);
    }

    #[test]
    fn test_byte_conservation_across_arbitrary_chunks() {
        // Same input split every possible way must yield the same lines
        let input = b"* ADC: VIN_MON=12.10 5V_MON=5.02\r\n* STATUS: WORD=01A5\r\ntail";
        for split in 0..input.len() {
            let mut framer = LineFramer::new();
            framer.push(&input[..split]);
            let mut lines = framer.drain_lines();
            framer.push(&input[split..]);
            lines.extend(framer.drain_lines());

            assert_eq!(
                lines,
                vec![
                    "* ADC: VIN_MON=12.10 5V_MON=5.02",
                    "* STATUS: WORD=01A5"
                ],
                "split at {}",
                split
            );
            assert_eq!(framer.pending(), 4, "split at {}", split);
        }
    }

    #[test]
    fn test_empty_push_is_harmless() {
        let mut framer = LineFramer::new();
        framer.push(b"");
        assert!(framer.drain_lines().is_empty());
        framer.push(b"x\r\n");
        framer.push(b"");
        assert_eq!(framer.drain_lines(), vec!["x"]);
    }

    #[test]
    fn test_bare_newline_is_not_a_terminator() {
        let mut framer = LineFramer::new();
        framer.push(b"a\nb\r\n");
        assert_eq!(framer.drain_lines(), vec!["a\nb"]);
    }

    #[test]
    fn test_overlong_tail_dropped() {
        let mut framer = LineFramer::new();
        framer.push(&vec![b'x'; MAX_LINE_LENGTH + 1]);
        assert!(framer.drain_lines().is_empty());
        assert_eq!(framer.pending(), 0);
        assert_eq!(framer.overflows(), 1);

        // Framer keeps working after an overflow
        framer.push(b"ok\r\n");
        assert_eq!(framer.drain_lines(), vec!["ok"]);
    }

    #[test]
    fn test_overlong_complete_line_dropped() {
        let mut framer = LineFramer::new();
        let mut garbage = vec![b'g'; MAX_LINE_LENGTH + 10];
        garbage.extend_from_slice(b"\r\nok\r\n");
        framer.push(&garbage);
        assert_eq!(framer.drain_lines(), vec!["ok"]);
        assert_eq!(framer.overflows(), 1);
    }
}
