// Copyright 2026 the tsls authors. MIT license.

use tower_lsp::lsp_types as lsp;

/// Maps between LSP positions (0-based line / UTF-16 character), UTF-16
/// code-unit offsets, and UTF-8 byte offsets for one text snapshot.
///
/// A line break is any of `\n`, `\r\n`, `\r`; the break's code units belong
/// to the line they terminate. Text ending in a break has a trailing empty
/// line.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct LineIndex {
  /// Byte offset of each line start.
  utf8_starts: Vec<usize>,
  /// UTF-16 code-unit offset of each line start.
  utf16_starts: Vec<u32>,
  utf8_len: usize,
  utf16_len: u32,
}

impl LineIndex {
  pub fn new(text: &str) -> LineIndex {
    let mut utf8_starts = vec![0];
    let mut utf16_starts = vec![0];
    let mut utf8_offset = 0usize;
    let mut utf16_offset = 0u32;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
      utf8_offset += c.len_utf8();
      utf16_offset += c.len_utf16() as u32;
      let is_break = match c {
        '\n' => true,
        // A lone `\r` terminates a line; `\r\n` terminates it at the `\n`.
        '\r' => chars.peek() != Some(&'\n'),
        _ => false,
      };
      if is_break {
        utf8_starts.push(utf8_offset);
        utf16_starts.push(utf16_offset);
      }
    }
    LineIndex {
      utf8_starts,
      utf16_starts,
      utf8_len: utf8_offset,
      utf16_len: utf16_offset,
    }
  }

  pub fn line_count(&self) -> u32 {
    self.utf16_starts.len() as u32
  }

  pub fn utf16_len(&self) -> u32 {
    self.utf16_len
  }

  /// The UTF-16 offset for an LSP position. Characters past the end of a
  /// line clamp to the start of the next line, and lines past the end of
  /// the text clamp to the end of the text, so the conversion is total.
  pub fn offset(&self, position: lsp::Position) -> u32 {
    let line = position.line as usize;
    if line >= self.utf16_starts.len() {
      return self.utf16_len;
    }
    let start = self.utf16_starts[line];
    let end = self
      .utf16_starts
      .get(line + 1)
      .copied()
      .unwrap_or(self.utf16_len);
    (start + position.character).min(end)
  }

  /// The LSP position for a UTF-16 offset. Total on `[0, utf16_len]`.
  pub fn position(&self, offset: u32) -> lsp::Position {
    let offset = offset.min(self.utf16_len);
    let line = self.utf16_starts.partition_point(|s| *s <= offset) - 1;
    lsp::Position {
      line: line as u32,
      character: offset - self.utf16_starts[line],
    }
  }

  /// The UTF-8 byte offset into `text` for an LSP position. `text` must be
  /// the string this index was built from.
  pub fn byte_offset(&self, position: lsp::Position, text: &str) -> usize {
    let line = position.line as usize;
    if line >= self.utf8_starts.len() {
      return self.utf8_len;
    }
    let line_start = self.utf8_starts[line];
    let line_end = self
      .utf8_starts
      .get(line + 1)
      .copied()
      .unwrap_or(self.utf8_len);
    let mut remaining = position.character;
    let mut byte = line_start;
    for c in text[line_start..line_end].chars() {
      let units = c.len_utf16() as u32;
      if remaining < units {
        break;
      }
      remaining -= units;
      byte += c.len_utf8();
    }
    byte
  }

  /// UTF-16 offsets of a line's start and of the last code unit before the
  /// next line's start. For the final line the end is the end of the text.
  pub fn line_range(&self, line: u32) -> (u32, u32) {
    let line = line as usize;
    if line >= self.utf16_starts.len() {
      return (self.utf16_len, self.utf16_len);
    }
    let start = self.utf16_starts[line];
    let end = match self.utf16_starts.get(line + 1) {
      Some(next_start) => next_start - 1,
      None => self.utf16_len,
    };
    (start, end)
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn pos(line: u32, character: u32) -> lsp::Position {
    lsp::Position { line, character }
  }

  #[test]
  fn line_starts() {
    let index = LineIndex::new("a\nb\r\nc\rd\n");
    assert_eq!(index.line_count(), 5);
    assert_eq!(index.position(0), pos(0, 0));
    assert_eq!(index.position(2), pos(1, 0));
    assert_eq!(index.position(5), pos(2, 0));
    assert_eq!(index.position(7), pos(3, 0));
    // Trailing break yields an empty final line.
    assert_eq!(index.position(9), pos(4, 0));
  }

  #[test]
  fn offset_position_round_trip() {
    let texts = [
      "",
      "let x = 1;\n",
      "a\r\nb\r\n",
      "no trailing newline",
      "const bar = \"👍🇺🇸😃\";\nconsole.log('hi')\n",
      "\r\r\n\n",
    ];
    for text in texts {
      let index = LineIndex::new(text);
      let len = text.encode_utf16().count() as u32;
      assert_eq!(index.utf16_len(), len);
      for offset in 0..=len {
        let round_tripped = index.offset(index.position(offset));
        assert_eq!(round_tripped, offset, "text {text:?} offset {offset}");
      }
    }
  }

  #[test]
  fn offset_clamps_past_line_end() {
    let index = LineIndex::new("ab\ncd\n");
    // Past the content of line 0, but before line 1 starts.
    assert_eq!(index.offset(pos(0, 99)), 3);
    // Past the last line.
    assert_eq!(index.offset(pos(9, 0)), 6);
  }

  #[test]
  fn byte_offset_multibyte() {
    let text = "let a = \"😃\";\nlet b = 1;\n";
    let index = LineIndex::new(text);
    // The emoji is 2 UTF-16 units and 4 UTF-8 bytes.
    assert_eq!(index.byte_offset(pos(0, 9), text), 9);
    assert_eq!(index.byte_offset(pos(0, 11), text), 13);
    assert_eq!(index.byte_offset(pos(1, 0), text), 16);
    // A character that lands inside the surrogate pair stays before it.
    assert_eq!(index.byte_offset(pos(0, 10), text), 9);
  }

  #[test]
  fn line_range_excludes_break() {
    let index = LineIndex::new("ab\r\ncd\n");
    assert_eq!(index.line_range(0), (0, 3));
    assert_eq!(index.line_range(1), (4, 6));
    assert_eq!(index.line_range(2), (7, 7));
  }
}
