// Copyright 2026 the tsls authors. MIT license.

use std::collections::HashMap;

use parking_lot::Mutex;
use tower_lsp::lsp_types as lsp;
use url::Url;

use super::client::Client;
use super::tsc;
use super::tsc::TsDiagnostic;

/// The analyzer reports each kind independently after a `geterr` round; the
/// published set for a file is the union across kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
  Syntax,
  Semantic,
  Suggestion,
}

impl DiagnosticKind {
  pub const ALL: [DiagnosticKind; 3] =
    [Self::Syntax, Self::Semantic, Self::Suggestion];

  pub fn from_event_name(name: &str) -> Option<Self> {
    match name {
      "syntaxDiag" => Some(Self::Syntax),
      "semanticDiag" => Some(Self::Semantic),
      "suggestionDiag" => Some(Self::Suggestion),
      _ => None,
    }
  }
}

fn to_lsp_severity(category: &str) -> lsp::DiagnosticSeverity {
  match category {
    "error" => lsp::DiagnosticSeverity::ERROR,
    "warning" => lsp::DiagnosticSeverity::WARNING,
    "suggestion" => lsp::DiagnosticSeverity::HINT,
    _ => lsp::DiagnosticSeverity::INFORMATION,
  }
}

pub fn to_lsp_diagnostic(diagnostic: &TsDiagnostic) -> lsp::Diagnostic {
  lsp::Diagnostic {
    range: tsc::to_range(diagnostic.start, diagnostic.end),
    severity: Some(to_lsp_severity(&diagnostic.category)),
    code: diagnostic.code.map(|c| lsp::NumberOrString::Number(c as i32)),
    source: Some("typescript".to_string()),
    message: diagnostic.text.clone(),
    ..Default::default()
  }
}

/// The most recent per-kind diagnostic lists, per file.
#[derive(Debug, Default)]
pub struct DiagnosticCollection {
  map: HashMap<(Url, DiagnosticKind), Vec<lsp::Diagnostic>>,
}

impl DiagnosticCollection {
  /// Replace the per-kind list for a file; other kinds keep their latest
  /// snapshot.
  pub fn set(
    &mut self,
    uri: Url,
    kind: DiagnosticKind,
    diagnostics: Vec<lsp::Diagnostic>,
  ) {
    self.map.insert((uri, kind), diagnostics);
  }

  pub fn union(&self, uri: &Url) -> Vec<lsp::Diagnostic> {
    DiagnosticKind::ALL
      .iter()
      .filter_map(|kind| self.map.get(&(uri.clone(), *kind)))
      .flatten()
      .cloned()
      .collect()
  }

  pub fn clear(&mut self, uri: &Url) {
    for kind in DiagnosticKind::ALL {
      self.map.remove(&(uri.clone(), kind));
    }
  }
}

/// Joins analyzer diagnostic events and publishes the merged view through
/// the editor capability.
#[derive(Debug)]
pub struct DiagnosticsPublisher {
  client: Client,
  collection: Mutex<DiagnosticCollection>,
}

impl DiagnosticsPublisher {
  pub fn new(client: Client) -> Self {
    Self {
      client,
      collection: Mutex::new(DiagnosticCollection::default()),
    }
  }

  pub async fn publish(
    &self,
    uri: Url,
    kind: DiagnosticKind,
    diagnostics: Vec<TsDiagnostic>,
  ) {
    let union = {
      let mut collection = self.collection.lock();
      collection.set(
        uri.clone(),
        kind,
        diagnostics.iter().map(to_lsp_diagnostic).collect(),
      );
      collection.union(&uri)
    };
    self.client.publish_diagnostics(uri, union, None).await;
  }

  /// Drop all state for a closed file and clear the editor's gutter.
  pub async fn clear(&self, uri: Url) {
    self.collection.lock().clear(&uri);
    self.client.publish_diagnostics(uri, Vec::new(), None).await;
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::lsp::tsc::Location;

  fn ts_diagnostic(text: &str, category: &str) -> TsDiagnostic {
    TsDiagnostic {
      start: Location { line: 1, offset: 1 },
      end: Location { line: 1, offset: 2 },
      text: text.to_string(),
      code: Some(2304),
      category: category.to_string(),
    }
  }

  #[test]
  fn event_name_mapping() {
    assert_eq!(
      DiagnosticKind::from_event_name("syntaxDiag"),
      Some(DiagnosticKind::Syntax)
    );
    assert_eq!(
      DiagnosticKind::from_event_name("semanticDiag"),
      Some(DiagnosticKind::Semantic)
    );
    assert_eq!(
      DiagnosticKind::from_event_name("suggestionDiag"),
      Some(DiagnosticKind::Suggestion)
    );
    assert_eq!(DiagnosticKind::from_event_name("telemetry"), None);
  }

  #[test]
  fn severity_mapping() {
    let diagnostic = to_lsp_diagnostic(&ts_diagnostic("boom", "error"));
    assert_eq!(diagnostic.severity, Some(lsp::DiagnosticSeverity::ERROR));
    assert_eq!(diagnostic.source.as_deref(), Some("typescript"));
    assert_eq!(
      diagnostic.code,
      Some(lsp::NumberOrString::Number(2304))
    );
    assert_eq!(
      to_lsp_diagnostic(&ts_diagnostic("hm", "suggestion")).severity,
      Some(lsp::DiagnosticSeverity::HINT)
    );
    assert_eq!(
      to_lsp_diagnostic(&ts_diagnostic("fyi", "message")).severity,
      Some(lsp::DiagnosticSeverity::INFORMATION)
    );
  }

  #[test]
  fn union_joins_kinds_and_replaces_per_kind() {
    let uri = Url::parse("file:///a.ts").unwrap();
    let mut collection = DiagnosticCollection::default();
    collection.set(
      uri.clone(),
      DiagnosticKind::Syntax,
      vec![to_lsp_diagnostic(&ts_diagnostic("syntax", "error"))],
    );
    collection.set(
      uri.clone(),
      DiagnosticKind::Semantic,
      vec![to_lsp_diagnostic(&ts_diagnostic("semantic", "error"))],
    );
    let union = collection.union(&uri);
    assert_eq!(union.len(), 2);
    assert_eq!(union[0].message, "syntax");
    assert_eq!(union[1].message, "semantic");

    // A later syntax snapshot replaces only the syntax list.
    collection.set(uri.clone(), DiagnosticKind::Syntax, Vec::new());
    let union = collection.union(&uri);
    assert_eq!(union.len(), 1);
    assert_eq!(union[0].message, "semantic");
  }

  #[test]
  fn clear_removes_all_kinds() {
    let uri = Url::parse("file:///a.ts").unwrap();
    let mut collection = DiagnosticCollection::default();
    collection.set(
      uri.clone(),
      DiagnosticKind::Suggestion,
      vec![to_lsp_diagnostic(&ts_diagnostic("hm", "suggestion"))],
    );
    collection.clear(&uri);
    assert!(collection.union(&uri).is_empty());
  }
}
