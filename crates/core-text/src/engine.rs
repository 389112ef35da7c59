//! Rope-backed reference implementation of the [`Engine`] contract.
//!
//! The dispatch core treats the buffer engine as an external collaborator;
//! `TextEngine` is the implementation the workspace ships for tests and for
//! hosts that do not bring their own. Offsets are validated against code point
//! boundaries before any mutation, so the offsets-stay-on-rune-boundaries
//! invariant holds by construction.

use ropey::Rope;
use tracing::trace;

use crate::{ByteOffset, EditTransaction, Engine, EngineError, EngineSnapshot, Point, Range};

/// A text buffer engine backed by a `ropey::Rope`.
#[derive(Clone)]
pub struct TextEngine {
    rope: Rope,
    revision: u64,
}

impl Default for TextEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextEngine {
    pub fn new() -> Self {
        Self {
            rope: Rope::new(),
            revision: 0,
        }
    }

    pub fn from_str(content: &str) -> Self {
        Self {
            rope: Rope::from_str(content),
            revision: 0,
        }
    }

    fn byte_to_char(&self, offset: ByteOffset) -> usize {
        self.rope.byte_to_char(offset)
    }

    /// Validate that `offset` is in-bounds and on a code point boundary.
    fn check_boundary(&self, offset: ByteOffset) -> Result<(), EngineError> {
        let len = self.rope.len_bytes();
        if offset > len {
            return Err(EngineError::OutOfBounds { offset, len });
        }
        if offset < len {
            let char_idx = self.rope.byte_to_char(offset);
            if self.rope.char_to_byte(char_idx) != offset {
                return Err(EngineError::NotOnBoundary(offset));
            }
        }
        Ok(())
    }

    fn check_range(&self, start: ByteOffset, end: ByteOffset) -> Result<(), EngineError> {
        if start > end {
            return Err(EngineError::InvalidRange { start, end });
        }
        self.check_boundary(start)?;
        self.check_boundary(end)
    }

    fn slice_bytes(&self, start: ByteOffset, end: ByteOffset) -> String {
        let cs = self.byte_to_char(start);
        let ce = self.byte_to_char(end);
        self.rope.slice(cs..ce).to_string()
    }

    fn line_start_byte(&self, line: usize) -> ByteOffset {
        let char_idx = self.rope.line_to_char(line);
        self.rope.char_to_byte(char_idx)
    }

    /// Content length of `line` excluding the trailing newline, in bytes.
    fn line_content_len(&self, line: usize) -> usize {
        let slice = self.rope.line(line);
        let mut len = slice.len_bytes();
        // ropey lines carry the newline except possibly the last line.
        if len > 0 && slice.char(slice.len_chars() - 1) == '\n' {
            len -= 1;
        }
        len
    }
}

impl Engine for TextEngine {
    fn text(&self) -> String {
        self.rope.to_string()
    }

    fn text_range(&self, start: ByteOffset, end: ByteOffset) -> String {
        let len = self.rope.len_bytes();
        let s = start.min(len);
        let e = end.min(len).max(s);
        // Clamp interior offsets down to the containing code point boundary.
        let cs = self.byte_to_char(s);
        let ce = self.byte_to_char(e);
        self.rope.slice(cs..ce).to_string()
    }

    fn line_text(&self, line: u32) -> String {
        let line = line as usize;
        if line >= self.rope.len_lines() {
            return String::new();
        }
        let mut s = self.rope.line(line).to_string();
        if s.ends_with('\n') {
            s.pop();
        }
        s
    }

    fn line_count(&self) -> u32 {
        self.rope.len_lines() as u32
    }

    fn line_start_offset(&self, line: u32) -> ByteOffset {
        let last = self.rope.len_lines().saturating_sub(1);
        self.line_start_byte((line as usize).min(last))
    }

    fn line_end_offset(&self, line: u32) -> ByteOffset {
        let last = self.rope.len_lines().saturating_sub(1);
        let line = (line as usize).min(last);
        self.line_start_byte(line) + self.line_content_len(line)
    }

    fn line_len(&self, line: u32) -> usize {
        let line = line as usize;
        if line >= self.rope.len_lines() {
            return 0;
        }
        self.line_content_len(line)
    }

    fn len(&self) -> ByteOffset {
        self.rope.len_bytes()
    }

    fn offset_to_point(&self, offset: ByteOffset) -> Point {
        let len = self.rope.len_bytes();
        let offset = offset.min(len);
        // Floor to the containing code point so interior offsets stay stable.
        let char_idx = self.rope.byte_to_char(offset);
        let offset = self.rope.char_to_byte(char_idx);
        let line = self.rope.byte_to_line(offset);
        let column = offset - self.line_start_byte(line);
        Point::new(line as u32, column as u32)
    }

    fn point_to_offset(&self, point: Point) -> ByteOffset {
        if self.rope.len_lines() == 0 {
            return 0;
        }
        let last = self.rope.len_lines() - 1;
        let line = (point.line as usize).min(last);
        let column = (point.column as usize).min(self.line_content_len(line));
        let start = self.line_start_byte(line);
        // Column may target the middle of a multi-byte rune; floor it.
        let text = self.line_text(line as u32);
        start + crate::rune::floor_boundary(&text, column)
    }

    fn insert(&mut self, offset: ByteOffset, text: &str) -> Result<EditTransaction, EngineError> {
        self.check_boundary(offset)?;
        let char_idx = self.byte_to_char(offset);
        self.rope.insert(char_idx, text);
        self.revision += 1;
        trace!(target: "text.engine", offset, bytes = text.len(), revision = self.revision, "insert");
        Ok(EditTransaction {
            old_range: Range::empty(offset),
            new_range: Range::new(offset, offset + text.len()),
            old_text: String::new(),
            delta: text.len() as i64,
            revision: self.revision,
        })
    }

    fn delete(
        &mut self,
        start: ByteOffset,
        end: ByteOffset,
    ) -> Result<EditTransaction, EngineError> {
        self.check_range(start, end)?;
        let old_text = self.slice_bytes(start, end);
        let cs = self.byte_to_char(start);
        let ce = self.byte_to_char(end);
        self.rope.remove(cs..ce);
        self.revision += 1;
        trace!(target: "text.engine", start, end, revision = self.revision, "delete");
        Ok(EditTransaction {
            old_range: Range::new(start, end),
            new_range: Range::empty(start),
            delta: -(old_text.len() as i64),
            old_text,
            revision: self.revision,
        })
    }

    fn replace(
        &mut self,
        start: ByteOffset,
        end: ByteOffset,
        text: &str,
    ) -> Result<EditTransaction, EngineError> {
        self.check_range(start, end)?;
        let old_text = self.slice_bytes(start, end);
        let cs = self.byte_to_char(start);
        let ce = self.byte_to_char(end);
        self.rope.remove(cs..ce);
        self.rope.insert(cs, text);
        self.revision += 1;
        trace!(target: "text.engine", start, end, bytes = text.len(), revision = self.revision, "replace");
        Ok(EditTransaction {
            old_range: Range::new(start, end),
            new_range: Range::new(start, start + text.len()),
            delta: text.len() as i64 - old_text.len() as i64,
            old_text,
            revision: self.revision,
        })
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot::new(self.rope.to_string(), self.revision)
    }

    fn revision_id(&self) -> u64 {
        self.revision
    }
}
