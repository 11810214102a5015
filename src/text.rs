//! Source text slices and the line table used to render diagnostics.

use std::fmt;
use std::rc::Rc;

/// A `[start, start + length)` window into some shared source buffer.
///
/// Unlike the C original, `Text` does not point at raw bytes through a naked
/// pointer; it shares ownership of the backing buffer via `Rc<str>` so a
/// `Text` can freely outlive the `Input` that produced it (cloning an `Rc` is
/// the cost of a refcount bump, not a copy). Two `Text`s comparing equal
/// bytes are not required to share a buffer; use [`Text::as_str`] to compare.
#[derive(Clone, Debug)]
pub struct Text {
    buffer: Rc<str>,
    start: u32,
    length: u32,
}

impl Text {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        Text { buffer: Rc::from(s), start: 0, length: s.len() as u32 }
    }

    #[must_use]
    pub fn from_static(s: &'static str) -> Self {
        Self::from_str(s)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.length as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.buffer[self.start as usize..(self.start + self.length) as usize]
    }
}

impl PartialEq for Text {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}
impl Eq for Text {}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Text {
    fn default() -> Self {
        Self::from_static("")
    }
}

/// A source document: its raw bytes, a display name for diagnostics, and a
/// lazily-built table of line-start byte offsets.
#[derive(Debug)]
pub struct Input {
    name: Rc<str>,
    bytes: Rc<str>,
    line_starts: Vec<u32>,
}

impl Input {
    #[must_use]
    pub fn new(name: impl Into<Rc<str>>, source: impl Into<String>) -> Self {
        let source = source.into();
        let line_starts = Self::scan_line_starts(source.as_bytes());
        Input { name: name.into(), bytes: Rc::from(source), line_starts }
    }

    fn scan_line_starts(bytes: &[u8]) -> Vec<u32> {
        let mut starts = vec![0u32];
        for (i, &b) in bytes.iter().enumerate() {
            if b == b'\n' {
                starts.push((i + 1) as u32);
            }
        }
        starts
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.bytes
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.bytes.as_bytes()
    }

    #[must_use]
    pub fn text_slice(&self, offset: u32, length: u32) -> Text {
        debug_assert!((offset as usize + length as usize) <= self.bytes.len());
        Text { buffer: Rc::clone(&self.bytes), start: offset, length }
    }

    /// 1-based line number containing byte `offset`.
    #[must_use]
    pub fn line_of(&self, offset: u32) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }

    /// 0-based column (byte offset within its line) of `offset`.
    #[must_use]
    pub fn column_of(&self, offset: u32) -> usize {
        let line = self.line_of(offset);
        let line_start = self.line_starts[line - 1];
        (offset - line_start) as usize
    }

    /// Render `file:line:column` followed by the source line and a caret
    /// under `offset`, mirroring the original's diagnostic printer.
    #[must_use]
    pub fn render_caret(&self, offset: u32) -> String {
        let line = self.line_of(offset);
        let column = self.column_of(offset);
        let line_start = self.line_starts[line - 1] as usize;
        let line_end = self
            .line_starts
            .get(line)
            .map(|&n| n as usize)
            .unwrap_or_else(|| self.bytes.len())
            .saturating_sub(1)
            .max(line_start);
        let line_text = &self.bytes[line_start..line_end.min(self.bytes.len())];
        format!(
            "{}:{}:{}\n{}\n{}^",
            self.name,
            line,
            column + 1,
            line_text,
            " ".repeat(column)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_table_tracks_newlines() {
        let input = Input::new("test.js", "a\nbb\nccc");
        assert_eq!(input.line_of(0), 1);
        assert_eq!(input.line_of(2), 2);
        assert_eq!(input.line_of(5), 3);
    }

    #[test]
    fn text_slice_roundtrips_bytes() {
        let input = Input::new("test.js", "hello world");
        let slice = input.text_slice(6, 5);
        assert_eq!(slice.as_str(), "world");
    }
}
