// Copyright 2026 the tsls authors. MIT license.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use anyhow::anyhow;
use anyhow::Error as AnyError;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tower_lsp::lsp_types as lsp;
use url::Url;

use super::text::LineIndex;
use super::urls::uri_to_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageId {
  TypeScript,
  Tsx,
  JavaScript,
  Jsx,
  Unknown,
}

impl LanguageId {
  /// The analyzer's script-kind name for this dialect, or `None` for files
  /// the analyzer should infer from the extension.
  pub fn as_script_kind_name(&self) -> Option<&'static str> {
    match self {
      Self::TypeScript => Some("TS"),
      Self::Tsx => Some("TSX"),
      Self::JavaScript => Some("JS"),
      Self::Jsx => Some("JSX"),
      Self::Unknown => None,
    }
  }
}

impl FromStr for LanguageId {
  type Err = AnyError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "typescript" => Ok(Self::TypeScript),
      "typescriptreact" => Ok(Self::Tsx),
      "javascript" => Ok(Self::JavaScript),
      "javascriptreact" => Ok(Self::Jsx),
      _ => Ok(Self::Unknown),
    }
  }
}

/// The authoritative snapshot of one open buffer.
#[derive(Debug)]
pub struct Document {
  uri: Url,
  language_id: LanguageId,
  version: i32,
  text: String,
  line_index: OnceCell<LineIndex>,
  // Bumped by read-only queries too, so it sits behind its own lock rather
  // than requiring exclusive access to the whole document.
  last_accessed: Mutex<Instant>,
}

impl Document {
  pub fn new(
    uri: Url,
    language_id: LanguageId,
    version: i32,
    text: String,
  ) -> Self {
    Self {
      uri,
      language_id,
      version,
      text,
      line_index: OnceCell::new(),
      last_accessed: Mutex::new(Instant::now()),
    }
  }

  pub fn uri(&self) -> &Url {
    &self.uri
  }

  pub fn language_id(&self) -> LanguageId {
    self.language_id
  }

  pub fn version(&self) -> i32 {
    self.version
  }

  pub fn text(&self) -> &str {
    &self.text
  }

  pub fn last_accessed(&self) -> Instant {
    *self.last_accessed.lock()
  }

  pub fn line_index(&self) -> &LineIndex {
    self.line_index.get_or_init(|| LineIndex::new(&self.text))
  }

  pub fn mark_accessed(&self) {
    *self.last_accessed.lock() = Instant::now();
  }

  /// Replace `[range.start, range.end)` with `text`, or the whole document
  /// when `range` is absent. Invalidates the cached line index.
  pub fn apply_change(&mut self, range: Option<lsp::Range>, text: &str) {
    match range {
      Some(range) => {
        let index = self.line_index();
        let start = index.byte_offset(range.start, &self.text);
        let end = index.byte_offset(range.end, &self.text);
        self.text.replace_range(start..end, text);
      }
      None => {
        self.text = text.to_string();
      }
    }
    self.line_index = OnceCell::new();
    self.mark_accessed();
  }

  pub fn set_version(&mut self, version: i32) {
    // Versions never move backwards, even if the editor resends one.
    if version > self.version {
      self.version = version;
    }
  }

  pub fn position_at(&self, offset: u32) -> lsp::Position {
    self.line_index().position(offset)
  }

  pub fn offset_at(&self, position: lsp::Position) -> u32 {
    self.line_index().offset(position)
  }

  pub fn line_count(&self) -> u32 {
    self.line_index().line_count()
  }

  pub fn line_text(&self, line: u32) -> &str {
    let index = self.line_index();
    let (start, end) = index.line_range(line);
    let start = index.byte_offset(index.position(start), &self.text);
    let end = index.byte_offset(index.position(end), &self.text);
    &self.text[start..end]
  }

  /// The code unit immediately before `position`, if any.
  pub fn char_before(&self, position: lsp::Position) -> Option<char> {
    let byte = self.line_index().byte_offset(position, &self.text);
    self.text[..byte].chars().next_back()
  }
}

/// The open-document map. Membership here is the sole ground truth for
/// whether a file is open; no analyzer state is consulted.
#[derive(Debug, Default)]
pub struct Documents {
  open: HashMap<Url, Document>,
}

impl Documents {
  pub fn contains(&self, uri: &Url) -> bool {
    self.open.contains_key(uri)
  }

  pub fn insert(&mut self, document: Document) {
    self.open.insert(document.uri().clone(), document);
  }

  pub fn get(&self, uri: &Url) -> Option<&Document> {
    self.open.get(uri)
  }

  pub fn get_mut(&mut self, uri: &Url) -> Option<&mut Document> {
    self.open.get_mut(uri)
  }

  /// Look up a document for an editor query, bumping its access time.
  pub fn access(&self, uri: &Url) -> Result<&Document, AnyError> {
    let document = self
      .open
      .get(uri)
      .ok_or_else(|| anyhow!("document \"{uri}\" is not open"))?;
    document.mark_accessed();
    Ok(document)
  }

  pub fn close(&mut self, uri: &Url) -> Option<Document> {
    self.open.remove(uri)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Document> {
    self.open.values()
  }

  /// Open file paths ordered least-recently-accessed first. The analyzer
  /// processes a diagnostics batch serially, so the most recently touched
  /// file goes last and stays freshest.
  pub fn paths_by_last_access(&self) -> Vec<PathBuf> {
    let mut docs: Vec<&Document> = self
      .open
      .values()
      .filter(|d| uri_to_path(d.uri()).is_some())
      .collect();
    docs.sort_by_key(|d| d.last_accessed());
    docs
      .into_iter()
      .filter_map(|d| uri_to_path(d.uri()))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn doc(text: &str) -> Document {
    Document::new(
      Url::parse("file:///a/b.ts").unwrap(),
      LanguageId::TypeScript,
      1,
      text.to_string(),
    )
  }

  fn range(
    start_line: u32,
    start_character: u32,
    end_line: u32,
    end_character: u32,
  ) -> lsp::Range {
    lsp::Range {
      start: lsp::Position {
        line: start_line,
        character: start_character,
      },
      end: lsp::Position {
        line: end_line,
        character: end_character,
      },
    }
  }

  #[test]
  fn language_id_parsing() {
    assert_eq!(
      LanguageId::from_str("typescript").unwrap(),
      LanguageId::TypeScript
    );
    assert_eq!(
      LanguageId::from_str("typescriptreact").unwrap(),
      LanguageId::Tsx
    );
    assert_eq!(
      LanguageId::from_str("javascript").unwrap(),
      LanguageId::JavaScript
    );
    assert_eq!(
      LanguageId::from_str("javascriptreact").unwrap(),
      LanguageId::Jsx
    );
    assert_eq!(LanguageId::from_str("rust").unwrap(), LanguageId::Unknown);
    assert_eq!(LanguageId::Tsx.as_script_kind_name(), Some("TSX"));
    assert_eq!(LanguageId::Unknown.as_script_kind_name(), None);
  }

  #[test]
  fn apply_incremental_changes() {
    let mut d = doc("function foo(){}\nfoo();\n");
    d.apply_change(Some(range(1, 0, 1, 3)), "bar");
    assert_eq!(d.text(), "function foo(){}\nbar();\n");
    d.apply_change(Some(range(0, 9, 0, 12)), "bar");
    assert_eq!(d.text(), "function bar(){}\nbar();\n");
  }

  #[test]
  fn apply_change_matches_reference_buffer() {
    // The same edit sequence applied through the document and through
    // straight string surgery must agree.
    let mut d = doc("let x = 1;\n");
    d.apply_change(Some(range(0, 8, 0, 9)), "42");
    d.apply_change(Some(range(0, 4, 0, 5)), "answer");
    d.apply_change(Some(range(1, 0, 1, 0)), "x;\n");
    assert_eq!(d.text(), "let answer = 42;\nx;\n");
  }

  #[test]
  fn apply_full_replacement() {
    let mut d = doc("old\n");
    d.apply_change(None, "entirely new\n");
    assert_eq!(d.text(), "entirely new\n");
    assert_eq!(d.line_count(), 2);
  }

  #[test]
  fn apply_change_multibyte() {
    let mut d = doc("let s = \"😃😃\";\n");
    // Replace the second emoji (2 UTF-16 units at character 11).
    d.apply_change(Some(range(0, 11, 0, 13)), "x");
    assert_eq!(d.text(), "let s = \"😃x\";\n");
  }

  #[test]
  fn offset_position_round_trip() {
    let d = doc("function foo(){}\r\nconst s = \"👍🇺🇸😃\";\nfoo();\r");
    let len = d.text().encode_utf16().count() as u32;
    for offset in 0..=len {
      assert_eq!(d.offset_at(d.position_at(offset)), offset);
    }
  }

  #[test]
  fn version_never_decreases() {
    let mut d = doc("a");
    d.set_version(5);
    assert_eq!(d.version(), 5);
    d.set_version(3);
    assert_eq!(d.version(), 5);
  }

  #[test]
  fn lru_ordering() {
    let mut documents = Documents::default();
    for name in ["a", "b", "c"] {
      documents.insert(Document::new(
        Url::parse(&format!("file:///{name}.ts")).unwrap(),
        LanguageId::TypeScript,
        1,
        String::new(),
      ));
    }
    let a = Url::parse("file:///a.ts").unwrap();
    documents.access(&a).unwrap();
    let paths = documents.paths_by_last_access();
    assert_eq!(
      paths,
      vec![
        PathBuf::from("/b.ts"),
        PathBuf::from("/c.ts"),
        PathBuf::from("/a.ts"),
      ]
    );
  }

  #[test]
  fn close_removes() {
    let mut documents = Documents::default();
    let uri = Url::parse("file:///a/b.ts").unwrap();
    documents.insert(Document::new(
      uri.clone(),
      LanguageId::TypeScript,
      1,
      "text".to_string(),
    ));
    assert!(documents.contains(&uri));
    let removed = documents.close(&uri).unwrap();
    assert_eq!(removed.text(), "text");
    assert!(!documents.contains(&uri));
    assert!(documents.access(&uri).is_err());
  }

  #[test]
  fn line_text_and_char_before() {
    let d = doc("function foo() {\n  return 1;\n}\n");
    assert_eq!(d.line_text(0), "function foo() {");
    assert_eq!(d.line_text(2), "}");
    assert_eq!(
      d.char_before(lsp::Position {
        line: 2,
        character: 1
      }),
      Some('}')
    );
    assert_eq!(
      d.char_before(lsp::Position {
        line: 0,
        character: 0
      }),
      None
    );
  }
}
