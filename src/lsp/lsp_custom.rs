// Copyright 2026 the tsls authors. MIT license.

//! The custom protocol surface between this server and its editor clients.

use tower_lsp::lsp_types as lsp;

/// Server-side commands, advertised through the execute-command capability.
pub const APPLY_WORKSPACE_EDIT_COMMAND: &str = "_typescript.applyWorkspaceEdit";
pub const APPLY_CODE_ACTION_COMMAND: &str = "_typescript.applyCodeAction";
pub const APPLY_REFACTORING_COMMAND: &str = "_typescript.applyRefactoring";
pub const ORGANIZE_IMPORTS_COMMAND: &str = "_typescript.organizeImports";

/// Client-side commands: emitted in responses, executed by the editor.
pub const APPLY_COMPLETION_CODE_ACTION_COMMAND: &str =
  "_typescript.applyCompletionCodeAction";
pub const SELECT_REFACTORING_COMMAND: &str = "_typescript.selectRefactoring";

pub const RENAME_REQUEST: &str = "_typescript.rename";

/// Server-initiated rename, used after a refactor reports a
/// `renameLocation`. Same shape as `textDocument/rename`, driven from our
/// side.
pub enum RenameRequest {}

impl lsp::request::Request for RenameRequest {
  type Params = lsp::TextDocumentPositionParams;
  type Result = Option<serde_json::Value>;
  const METHOD: &'static str = RENAME_REQUEST;
}
