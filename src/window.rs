//! Sliding comparison window for multi-byte pattern detection.
//!
//! Byte-stream filters keep the most recent `pattern.len()` bytes and compare them with
//! the pattern after every byte. The window is a ring, so each step is constant time
//! regardless of pattern length.

use std::collections::VecDeque;

/// Most recent bytes of a stream, compared against a fixed pattern.
#[derive(Debug, Clone, Default)]
pub struct PatternWindow {
    pattern: Vec<u8>,
    window: VecDeque<u8>,
}

impl PatternWindow {
    /// A window watching for `pattern`. An empty pattern never matches.
    pub fn new(pattern: impl Into<Vec<u8>>) -> Self {
        let pattern = pattern.into();
        let window = VecDeque::with_capacity(pattern.len());
        PatternWindow { pattern, window }
    }

    /// Whether a non-empty pattern is configured.
    pub fn is_enabled(&self) -> bool {
        !self.pattern.is_empty()
    }

    /// Pattern length.
    pub fn len(&self) -> usize {
        self.pattern.len()
    }

    /// Whether the pattern is empty.
    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    /// The configured pattern.
    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    /// Shift `byte` in. Returns true when the window now equals the pattern.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.pattern.is_empty() {
            return false;
        }
        if self.window.len() == self.pattern.len() {
            self.window.pop_front();
        }
        self.window.push_back(byte);
        self.window.len() == self.pattern.len() && self.window.iter().eq(self.pattern.iter())
    }

    /// Forget the bytes seen so far.
    pub fn reset(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches_at(pattern: &[u8], input: &[u8]) -> Vec<usize> {
        let mut window = PatternWindow::new(pattern);
        input
            .iter()
            .enumerate()
            .filter_map(|(i, b)| window.push(*b).then_some(i))
            .collect()
    }

    #[test]
    fn detects_every_occurrence() {
        assert_eq!(matches_at(b"\r\n", b"a\r\nb\r\n"), vec![2, 5]);
        assert_eq!(matches_at(b"aa", b"aaaa"), vec![1, 2, 3]);
    }

    #[test]
    fn empty_pattern_never_matches() {
        assert!(matches_at(b"", b"anything").is_empty());
        assert!(!PatternWindow::default().is_enabled());
    }

    #[test]
    fn reset_forgets_partial_match() {
        let mut window = PatternWindow::new(*b"ab");
        assert!(!window.push(b'a'));
        window.reset();
        assert!(!window.push(b'b'));
        assert!(!window.push(b'a'));
        assert!(window.push(b'b'));
    }
}
