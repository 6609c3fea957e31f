// Copyright 2026 the tsls authors. MIT license.

use anyhow::Error as AnyError;
use tower_lsp::LspService;
use tower_lsp::Server;

use crate::flags::Flags;

mod capabilities;
mod client;
mod config;
mod diagnostics;
mod documents;
pub mod language_server;
mod logging;
mod lsp_custom;
mod refactor;
mod text;
mod tsc;
mod urls;

/// Serve LSP over stdio until the editor disconnects.
pub async fn start(flags: Flags) -> Result<(), AnyError> {
  let stdin = tokio::io::stdin();
  let stdout = tokio::io::stdout();

  let (service, socket) = LspService::new(move |client| {
    language_server::LanguageServer::new(client, flags.clone())
  });
  Server::new(stdin, stdout, socket).serve(service).await;

  Ok(())
}
