// Copyright 2026 the tsls authors. MIT license.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use serde::Deserialize;
use serde::Serialize;
use tower_lsp::lsp_types as lsp;

use super::tsc::Location;

/// The payload of an `_typescript.applyRefactoring` command: enough to ask
/// the analyzer for the refactor's edits later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefactorActionData {
  pub file: PathBuf,
  pub start: Location,
  pub end: Location,
  pub refactor: String,
  pub action: String,
}

pub struct RefactorCodeActionKind {
  pub kind: lsp::CodeActionKind,
  matches_callback: Box<dyn Fn(&str) -> bool + Send + Sync>,
}

impl RefactorCodeActionKind {
  pub fn matches(&self, tag: &str) -> bool {
    (self.matches_callback)(tag)
  }
}

pub static EXTRACT_FUNCTION: Lazy<RefactorCodeActionKind> =
  Lazy::new(|| RefactorCodeActionKind {
    kind: [lsp::CodeActionKind::REFACTOR_EXTRACT.as_str(), "function"]
      .join(".")
      .into(),
    matches_callback: Box::new(|tag: &str| tag.starts_with("function_")),
  });

pub static EXTRACT_CONSTANT: Lazy<RefactorCodeActionKind> =
  Lazy::new(|| RefactorCodeActionKind {
    kind: [lsp::CodeActionKind::REFACTOR_EXTRACT.as_str(), "constant"]
      .join(".")
      .into(),
    matches_callback: Box::new(|tag: &str| tag.starts_with("constant_")),
  });

pub static EXTRACT_TYPE: Lazy<RefactorCodeActionKind> =
  Lazy::new(|| RefactorCodeActionKind {
    kind: [lsp::CodeActionKind::REFACTOR_EXTRACT.as_str(), "type"]
      .join(".")
      .into(),
    matches_callback: Box::new(|tag: &str| {
      tag.starts_with("Extract to type alias")
    }),
  });

pub static EXTRACT_INTERFACE: Lazy<RefactorCodeActionKind> =
  Lazy::new(|| RefactorCodeActionKind {
    kind: [lsp::CodeActionKind::REFACTOR_EXTRACT.as_str(), "interface"]
      .join(".")
      .into(),
    matches_callback: Box::new(|tag: &str| {
      tag.starts_with("Extract to interface")
    }),
  });

pub static MOVE_NEWFILE: Lazy<RefactorCodeActionKind> =
  Lazy::new(|| RefactorCodeActionKind {
    kind: [lsp::CodeActionKind::REFACTOR.as_str(), "move", "newFile"]
      .join(".")
      .into(),
    matches_callback: Box::new(|tag: &str| {
      tag.starts_with("Move to a new file")
    }),
  });

pub static REWRITE_IMPORT: Lazy<RefactorCodeActionKind> =
  Lazy::new(|| RefactorCodeActionKind {
    kind: [lsp::CodeActionKind::REFACTOR_REWRITE.as_str(), "import"]
      .join(".")
      .into(),
    matches_callback: Box::new(|tag: &str| {
      tag.starts_with("Convert namespace import")
        || tag.starts_with("Convert named imports")
    }),
  });

pub static REWRITE_EXPORT: Lazy<RefactorCodeActionKind> =
  Lazy::new(|| RefactorCodeActionKind {
    kind: [lsp::CodeActionKind::REFACTOR_REWRITE.as_str(), "export"]
      .join(".")
      .into(),
    matches_callback: Box::new(|tag: &str| {
      tag.starts_with("Convert default export")
        || tag.starts_with("Convert named export")
    }),
  });

pub static REWRITE_ARROW_BRACES: Lazy<RefactorCodeActionKind> =
  Lazy::new(|| RefactorCodeActionKind {
    kind: [lsp::CodeActionKind::REFACTOR_REWRITE.as_str(), "arrow", "braces"]
      .join(".")
      .into(),
    matches_callback: Box::new(|tag: &str| {
      tag.starts_with("Add or remove braces in an arrow function")
    }),
  });

pub static REWRITE_PARAMETERS_TODESTRUCTURED: Lazy<RefactorCodeActionKind> =
  Lazy::new(|| RefactorCodeActionKind {
    kind: [
      lsp::CodeActionKind::REFACTOR_REWRITE.as_str(),
      "parameters",
      "toDestructured",
    ]
    .join(".")
    .into(),
    matches_callback: Box::new(|tag: &str| {
      tag.starts_with("Convert parameters to destructured object")
    }),
  });

pub static REWRITE_PROPERTY_GENERATEACCESSORS: Lazy<RefactorCodeActionKind> =
  Lazy::new(|| RefactorCodeActionKind {
    kind: [
      lsp::CodeActionKind::REFACTOR_REWRITE.as_str(),
      "property",
      "generateAccessors",
    ]
    .join(".")
    .into(),
    matches_callback: Box::new(|tag: &str| {
      tag.starts_with("Generate 'get' and 'set' accessors")
    }),
  });

static ALL_KNOWN_REFACTOR_ACTION_KINDS: Lazy<
  Vec<&'static Lazy<RefactorCodeActionKind>>,
> = Lazy::new(|| {
  vec![
    &EXTRACT_FUNCTION,
    &EXTRACT_CONSTANT,
    &EXTRACT_TYPE,
    &EXTRACT_INTERFACE,
    &MOVE_NEWFILE,
    &REWRITE_IMPORT,
    &REWRITE_EXPORT,
    &REWRITE_ARROW_BRACES,
    &REWRITE_PARAMETERS_TODESTRUCTURED,
    &REWRITE_PROPERTY_GENERATEACCESSORS,
  ]
});

/// Classify an analyzer refactor action name into an LSP code-action kind;
/// unrecognized actions fall back to the generic refactor kind.
pub fn refactor_action_kind(action_name: &str) -> lsp::CodeActionKind {
  ALL_KNOWN_REFACTOR_ACTION_KINDS
    .iter()
    .find(|registration| registration.matches(action_name))
    .map(|registration| registration.kind.clone())
    .unwrap_or(lsp::CodeActionKind::REFACTOR)
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn classifies_known_actions() {
    assert_eq!(
      refactor_action_kind("function_scope_0").as_str(),
      "refactor.extract.function"
    );
    assert_eq!(
      refactor_action_kind("constant_scope_1").as_str(),
      "refactor.extract.constant"
    );
    assert_eq!(
      refactor_action_kind("Move to a new file").as_str(),
      "refactor.move.newFile"
    );
    assert_eq!(
      refactor_action_kind("Add or remove braces in an arrow function")
        .as_str(),
      "refactor.rewrite.arrow.braces"
    );
    assert_eq!(
      refactor_action_kind("Convert parameters to destructured object")
        .as_str(),
      "refactor.rewrite.parameters.toDestructured"
    );
    assert_eq!(
      refactor_action_kind("Generate 'get' and 'set' accessors").as_str(),
      "refactor.rewrite.property.generateAccessors"
    );
  }

  #[test]
  fn unknown_actions_fall_back() {
    assert_eq!(
      refactor_action_kind("Some future refactor").as_str(),
      "refactor"
    );
  }
}
