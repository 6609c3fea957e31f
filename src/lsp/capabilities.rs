// Copyright 2026 the tsls authors. MIT license.

//! The capabilities advertised to the editor on initialize.

use tower_lsp::lsp_types::CodeActionProviderCapability;
use tower_lsp::lsp_types::CompletionOptions;
use tower_lsp::lsp_types::ExecuteCommandOptions;
use tower_lsp::lsp_types::FoldingRangeProviderCapability;
use tower_lsp::lsp_types::HoverProviderCapability;
use tower_lsp::lsp_types::ImplementationProviderCapability;
use tower_lsp::lsp_types::OneOf;
use tower_lsp::lsp_types::ServerCapabilities;
use tower_lsp::lsp_types::SignatureHelpOptions;
use tower_lsp::lsp_types::TextDocumentSyncCapability;
use tower_lsp::lsp_types::TextDocumentSyncKind;
use tower_lsp::lsp_types::TypeDefinitionProviderCapability;

use super::lsp_custom;

pub fn server_capabilities() -> ServerCapabilities {
  ServerCapabilities {
    text_document_sync: Some(TextDocumentSyncCapability::Kind(
      TextDocumentSyncKind::INCREMENTAL,
    )),
    completion_provider: Some(CompletionOptions {
      resolve_provider: Some(true),
      trigger_characters: Some(
        [".", "\"", "'", "/", "@", "<"]
          .into_iter()
          .map(String::from)
          .collect(),
      ),
      ..Default::default()
    }),
    signature_help_provider: Some(SignatureHelpOptions {
      trigger_characters: Some(
        ["(", ",", "<"].into_iter().map(String::from).collect(),
      ),
      retrigger_characters: None,
      work_done_progress_options: Default::default(),
    }),
    code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
    definition_provider: Some(OneOf::Left(true)),
    document_formatting_provider: Some(OneOf::Left(true)),
    document_highlight_provider: Some(OneOf::Left(true)),
    document_symbol_provider: Some(OneOf::Left(true)),
    hover_provider: Some(HoverProviderCapability::Simple(true)),
    references_provider: Some(OneOf::Left(true)),
    rename_provider: Some(OneOf::Left(true)),
    workspace_symbol_provider: Some(OneOf::Left(true)),
    implementation_provider: Some(ImplementationProviderCapability::Simple(
      true,
    )),
    type_definition_provider: Some(TypeDefinitionProviderCapability::Simple(
      true,
    )),
    folding_range_provider: Some(FoldingRangeProviderCapability::Simple(true)),
    execute_command_provider: Some(ExecuteCommandOptions {
      commands: vec![
        lsp_custom::APPLY_WORKSPACE_EDIT_COMMAND.to_string(),
        lsp_custom::APPLY_CODE_ACTION_COMMAND.to_string(),
        lsp_custom::APPLY_REFACTORING_COMMAND.to_string(),
        lsp_custom::ORGANIZE_IMPORTS_COMMAND.to_string(),
      ],
      work_done_progress_options: Default::default(),
    }),
    ..Default::default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn advertises_the_command_surface() {
    let capabilities = server_capabilities();
    let commands = capabilities.execute_command_provider.unwrap().commands;
    assert_eq!(
      commands,
      vec![
        "_typescript.applyWorkspaceEdit",
        "_typescript.applyCodeAction",
        "_typescript.applyRefactoring",
        "_typescript.organizeImports",
      ]
    );
    assert!(capabilities.completion_provider.is_some());
    assert!(capabilities.folding_range_provider.is_some());
  }
}
