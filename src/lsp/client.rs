// Copyright 2026 the tsls authors. MIT license.

use anyhow::anyhow;
use anyhow::Error as AnyError;
use tower_lsp::lsp_types as lsp;
use url::Url;

use super::lsp_custom;

/// The outbound editor capability held by the server core and the
/// diagnostics publisher.
#[derive(Clone)]
pub struct Client(tower_lsp::Client);

impl std::fmt::Debug for Client {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_tuple("Client").finish()
  }
}

impl Client {
  pub fn new(client: tower_lsp::Client) -> Self {
    Self(client)
  }

  pub async fn publish_diagnostics(
    &self,
    uri: Url,
    diagnostics: Vec<lsp::Diagnostic>,
    version: Option<i32>,
  ) {
    self.0.publish_diagnostics(uri, diagnostics, version).await;
  }

  pub async fn show_message(
    &self,
    message_type: lsp::MessageType,
    message: impl std::fmt::Display,
  ) {
    self.0.show_message(message_type, message.to_string()).await;
  }

  /// Ask the editor to apply a workspace edit; returns whether it did.
  pub async fn apply_edit(
    &self,
    edit: lsp::WorkspaceEdit,
  ) -> Result<bool, AnyError> {
    let response = self
      .0
      .apply_edit(edit)
      .await
      .map_err(|err| anyhow!("applyEdit failed: {err}"))?;
    Ok(response.applied)
  }

  /// Ask the editor to start a rename flow at a position.
  pub async fn rename(
    &self,
    uri: Url,
    position: lsp::Position,
  ) -> Result<(), AnyError> {
    self
      .0
      .send_request::<lsp_custom::RenameRequest>(
        lsp::TextDocumentPositionParams {
          text_document: lsp::TextDocumentIdentifier { uri },
          position,
        },
      )
      .await
      .map_err(|err| anyhow!("{} failed: {err}", lsp_custom::RENAME_REQUEST))?;
    Ok(())
  }
}
