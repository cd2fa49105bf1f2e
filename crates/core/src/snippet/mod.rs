//! Snippet Buffers
//!
//! A snippet is the ordered set of mission lines uploaded into one execution
//! slot for one motion segment.
//!
//! # Capacity
//!
//! - A buffer's capacity is fixed at construction (at most [`SNIPPET_MAX_LINES`])
//! - The slot executor has its own, usually smaller, line capacity and
//!   truncates longer buffers
//! - An empty buffer is valid and uploads nothing

pub mod line;

use core::fmt;

use heapless::Vec;

pub use line::{LineBuilder, LineError, MissionLine, Sensor, MISSION_LINE_LEN};

/// Hard upper bound on lines in one buffer.
pub const SNIPPET_MAX_LINES: usize = 32;

/// Errors from filling a snippet buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetError {
    /// Buffer already holds `capacity` lines
    Full { capacity: usize },
    /// A line could not be composed
    Line(LineError),
}

impl fmt::Display for SnippetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnippetError::Full { capacity } => {
                write!(f, "snippet buffer full ({} lines)", capacity)
            }
            SnippetError::Line(e) => write!(f, "invalid mission line: {}", e),
        }
    }
}

impl From<LineError> for SnippetError {
    fn from(e: LineError) -> Self {
        SnippetError::Line(e)
    }
}

/// Fixed-capacity, ordered collection of mission lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetBuffer {
    lines: Vec<MissionLine, SNIPPET_MAX_LINES>,
    capacity: usize,
}

impl Default for SnippetBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SnippetBuffer {
    /// Buffer holding up to [`SNIPPET_MAX_LINES`] lines.
    pub fn new() -> Self {
        Self::with_capacity(SNIPPET_MAX_LINES)
    }

    /// Buffer holding up to `capacity` lines (clamped to [`SNIPPET_MAX_LINES`]).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Vec::new(),
            capacity: capacity.min(SNIPPET_MAX_LINES),
        }
    }

    /// Append a line.
    pub fn push(&mut self, line: MissionLine) -> Result<(), SnippetError> {
        if self.lines.len() >= self.capacity {
            return Err(SnippetError::Full {
                capacity: self.capacity,
            });
        }
        self.lines
            .push(line)
            .map_err(|_| SnippetError::Full {
                capacity: self.capacity,
            })
    }

    /// Build and append a line.
    pub fn push_line(&mut self, builder: LineBuilder) -> Result<(), SnippetError> {
        let line = builder.build()?;
        self.push(line)
    }

    /// Number of lines in use.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn lines(&self) -> &[MissionLine] {
        &self.lines
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl<'a> IntoIterator for &'a SnippetBuffer {
    type Item = &'a MissionLine;
    type IntoIter = core::slice::Iter<'a, MissionLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> MissionLine {
        MissionLine::new(text).unwrap()
    }

    #[test]
    fn test_new_buffer_is_empty() {
        let buf = SnippetBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.capacity(), SNIPPET_MAX_LINES);
    }

    #[test]
    fn test_push_preserves_order() {
        let mut buf = SnippetBuffer::with_capacity(4);
        buf.push(line("vel=0.2: dist=1")).unwrap();
        buf.push(line("vel=0: time=1")).unwrap();

        let texts: std::vec::Vec<&str> = buf.lines().iter().map(|l| l.as_str()).collect();
        assert_eq!(texts, ["vel=0.2: dist=1", "vel=0: time=1"]);
    }

    #[test]
    fn test_push_beyond_capacity_fails() {
        let mut buf = SnippetBuffer::with_capacity(2);
        buf.push(line("a")).unwrap();
        buf.push(line("b")).unwrap();

        assert_eq!(
            buf.push(line("c")),
            Err(SnippetError::Full { capacity: 2 })
        );
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_capacity_is_clamped() {
        let buf = SnippetBuffer::with_capacity(1000);
        assert_eq!(buf.capacity(), SNIPPET_MAX_LINES);
    }

    #[test]
    fn test_push_line_propagates_line_error() {
        let mut buf = SnippetBuffer::new();
        assert_eq!(
            buf.push_line(LineBuilder::new()),
            Err(SnippetError::Line(LineError::Empty))
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_clear_resets_used_count() {
        let mut buf = SnippetBuffer::with_capacity(3);
        buf.push(line("a")).unwrap();
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 3);
    }
}
