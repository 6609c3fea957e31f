// Copyright 2026 the tsls authors. MIT license.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Error as AnyError;
use log::error;
use serde::de::DeserializeOwned;
use serde_json::json;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_lsp::jsonrpc::Error as LspError;
use tower_lsp::jsonrpc::Result as LspResult;
use tower_lsp::lsp_types as lsp;
use tower_lsp::lsp_types::request::GotoImplementationParams;
use tower_lsp::lsp_types::request::GotoImplementationResponse;
use tower_lsp::lsp_types::request::GotoTypeDefinitionParams;
use tower_lsp::lsp_types::request::GotoTypeDefinitionResponse;
use tower_lsp::lsp_types::*;
use url::Url;

use super::capabilities::server_capabilities;
use super::client::Client;
use super::config::Config;
use super::diagnostics::DiagnosticKind;
use super::diagnostics::DiagnosticsPublisher;
use super::documents::Document;
use super::documents::Documents;
use super::documents::LanguageId;
use super::logging::lsp_log;
use super::logging::lsp_warn;
use super::lsp_custom;
use super::refactor;
use super::refactor::RefactorActionData;
use super::tsc;
use super::tsc::find_tsserver;
use super::tsc::Location;
use super::tsc::TsEvent;
use super::tsc::TsNotification;
use super::tsc::TsRequest;
use super::tsc::TsServer;
use super::urls::path_to_uri;
use super::urls::uri_to_path;
use crate::flags::Flags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerState {
  Uninitialized,
  Initialized,
  ShuttingDown,
  Dead,
}

/// One in-flight `geterr` round. The id makes the clear-on-completion check
/// safe against a newer round having replaced this one while its task was
/// suspended.
#[derive(Debug)]
struct DiagnosticsRound {
  id: u64,
  token: CancellationToken,
}

#[derive(Debug, Default)]
struct DiagnosticsState {
  next_round_id: u64,
  round: Option<DiagnosticsRound>,
}

/// Read-only query handlers share the lock so analyzer round-trips can
/// overlap; only the handlers that mutate server state take it exclusively.
pub struct LanguageServer(Arc<tokio::sync::RwLock<Inner>>);

impl LanguageServer {
  pub fn new(client: tower_lsp::Client, flags: Flags) -> Self {
    Self(Arc::new(tokio::sync::RwLock::new(Inner::new(
      Client::new(client),
      flags,
    ))))
  }
}

struct Inner {
  client: Client,
  flags: Flags,
  config: Config,
  documents: Documents,
  ts_server: Option<Arc<TsServer>>,
  diagnostics: Arc<DiagnosticsPublisher>,
  diagnostics_state: Arc<parking_lot::Mutex<DiagnosticsState>>,
  state: Arc<parking_lot::Mutex<ServerState>>,
}

impl Inner {
  fn new(client: Client, flags: Flags) -> Self {
    Self {
      diagnostics: Arc::new(DiagnosticsPublisher::new(client.clone())),
      client,
      flags,
      config: Config::default(),
      documents: Documents::default(),
      ts_server: None,
      diagnostics_state: Arc::default(),
      state: Arc::new(parking_lot::Mutex::new(ServerState::Uninitialized)),
    }
  }

  fn ts_server(&self) -> LspResult<&Arc<TsServer>> {
    self.ts_server.as_ref().ok_or_else(|| {
      let mut err = LspError::internal_error();
      err.message = "the analyzer has not been started".into();
      err
    })
  }

  /// Look up the file path and analyzer location for a positional request.
  /// `Ok(None)` short-circuits non-file URIs; an unknown document is a
  /// precondition failure.
  fn document_location(
    &self,
    uri: &Url,
    position: Position,
  ) -> LspResult<Option<(PathBuf, Location)>> {
    let Some(path) = uri_to_path(uri) else {
      return Ok(None);
    };
    self
      .documents
      .access(uri)
      .map_err(|err| LspError::invalid_params(err.to_string()))?;
    Ok(Some((path, Location::from_position(position))))
  }

  /// Drain the events coming off the analyzer transport. The channel closes
  /// when the transport dies; outside of shutdown that is fatal.
  fn spawn_event_consumer(
    &self,
    mut event_rx: mpsc::UnboundedReceiver<TsEvent>,
  ) {
    let diagnostics = self.diagnostics.clone();
    let client = self.client.clone();
    let state = self.state.clone();
    tokio::spawn(async move {
      while let Some(event) = event_rx.recv().await {
        let Some(kind) = DiagnosticKind::from_event_name(&event.name) else {
          continue;
        };
        let body = match serde_json::from_value::<tsc::DiagnosticEventBody>(
          event.body,
        ) {
          Ok(body) => body,
          Err(err) => {
            lsp_warn!("malformed \"{}\" event: {:#}", event.name, err);
            continue;
          }
        };
        let Ok(uri) = path_to_uri(&body.file) else {
          continue;
        };
        diagnostics.publish(uri, kind, body.diagnostics).await;
      }
      let expected = {
        let mut state = state.lock();
        match *state {
          ServerState::ShuttingDown | ServerState::Dead => true,
          _ => {
            *state = ServerState::Dead;
            false
          }
        }
      };
      if !expected {
        error!("the analyzer process terminated unexpectedly");
        client
          .show_message(
            MessageType::ERROR,
            "The TypeScript analyzer terminated unexpectedly; restart the \
             language server.",
          )
          .await;
      }
    });
  }

  /// Cancel the in-flight `geterr` round, if any, releasing its waiter.
  fn cancel_diagnostics_round(&self) {
    if let Some(round) = self.diagnostics_state.lock().round.take() {
      round.token.cancel();
    }
  }

  /// Start a fresh `geterr` round over the open set, least recently
  /// accessed first. Any prior round is cancelled; the slot is cleared on
  /// completion only if this round still owns it.
  fn request_diagnostics(&self) {
    let Some(ts) = self.ts_server.clone() else {
      return;
    };
    let files = self.documents.paths_by_last_access();
    if files.is_empty() {
      self.cancel_diagnostics_round();
      return;
    }
    let token = CancellationToken::new();
    let id = {
      let mut state = self.diagnostics_state.lock();
      if let Some(previous) = state.round.take() {
        previous.token.cancel();
      }
      state.next_round_id += 1;
      let id = state.next_round_id;
      state.round = Some(DiagnosticsRound {
        id,
        token: token.clone(),
      });
      id
    };
    let slot = self.diagnostics_state.clone();
    tokio::spawn(async move {
      let result = ts
        .request::<Value>(TsRequest::Geterr { files, delay: 0 }, Some(&token))
        .await;
      if let Err(err) = result {
        // Interrupted rounds are routine; the analyzer's eventual events
        // for them are still published as they trickle in.
        log::debug!("diagnostics round ended early: {err:#}");
      }
      let mut state = slot.lock();
      if state.round.as_ref().is_some_and(|round| round.id == id) {
        state.round = None;
      }
    });
  }

  /// Run an interactive analyzer query with the diagnostics loop out of the
  /// way: cancel any in-flight round, issue the query, re-arm diagnostics
  /// as soon as the query has been issued, then await the answer.
  async fn interrupted_request<R>(
    &self,
    ts_server: &TsServer,
    request: TsRequest,
  ) -> Result<R, AnyError>
  where
    R: DeserializeOwned,
  {
    self.cancel_diagnostics_round();
    let pending = ts_server.send_request(request);
    self.request_diagnostics();
    pending?.wait().await
  }

  async fn apply_file_code_edits(&self, edits: &[tsc::FileCodeEdits]) {
    let Some(edit) = tsc::file_code_edits_to_workspace_edit(edits) else {
      return;
    };
    if let Err(err) = self.client.apply_edit(edit).await {
      lsp_warn!("workspace edit was not applied: {:#}", err);
    }
  }

  async fn initialize(
    &mut self,
    params: InitializeParams,
  ) -> LspResult<InitializeResult> {
    lsp_log!("initializing tsls v{}", env!("CARGO_PKG_VERSION"));
    self.config.set_root(&params);
    let Some(exe) = find_tsserver(
      self.config.root_path(),
      self.flags.tsserver_path.as_deref(),
    ) else {
      let mut err = LspError::internal_error();
      err.message =
        "could not find a tsserver executable; install typescript or pass \
         --tsserver-path"
          .into();
      return Err(err);
    };
    lsp_log!("using analyzer at \"{}\"", exe.display());
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let ts_server =
      TsServer::start(&exe, &self.flags.tsserver_args(), event_tx).map_err(
        |err| {
          let mut lsp_err = LspError::internal_error();
          lsp_err.message = format!("failed to start the analyzer: {err:#}")
            .into();
          lsp_err
        },
      )?;
    let ts_server = Arc::new(ts_server);
    self.spawn_event_consumer(event_rx);
    // Issued without awaiting the reply; a rejection degrades diagnostics
    // but never blocks initialization.
    let configure = ts_server.clone();
    tokio::spawn(async move {
      let request = TsRequest::Configure {
        preferences: json!({ "allowTextChangesInNewFiles": true }),
      };
      if let Err(err) = configure.request::<Value>(request, None).await {
        lsp_warn!("analyzer rejected configure: {:#}", err);
      }
    });
    self.ts_server = Some(ts_server);
    *self.state.lock() = ServerState::Initialized;
    Ok(InitializeResult {
      capabilities: server_capabilities(),
      server_info: Some(ServerInfo {
        name: "tsls".to_string(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
      }),
    })
  }

  async fn shutdown(&mut self) -> LspResult<()> {
    *self.state.lock() = ServerState::ShuttingDown;
    self.cancel_diagnostics_round();
    if let Some(ts_server) = self.ts_server.take() {
      for document in self.documents.iter() {
        if let Some(file) = uri_to_path(document.uri()) {
          if let Err(err) = ts_server.notify(TsNotification::Close { file }) {
            log::debug!("close notification failed: {err:#}");
          }
        }
      }
      ts_server.stop().await;
    }
    Ok(())
  }

  async fn did_open(&mut self, params: DidOpenTextDocumentParams) {
    let uri = params.text_document.uri;
    let Some(file) = uri_to_path(&uri) else {
      lsp_warn!("ignoring open of non-file URI \"{uri}\"");
      return;
    };
    let Some(ts_server) = self.ts_server.clone() else {
      return;
    };
    let language_id = params
      .text_document
      .language_id
      .parse()
      .unwrap_or(LanguageId::Unknown);
    if self.documents.contains(&uri) {
      // A duplicate open is a full-text change.
      self.apply_full_text_change(
        &uri,
        &file,
        params.text_document.version,
        params.text_document.text,
      );
    } else {
      let document = Document::new(
        uri.clone(),
        language_id,
        params.text_document.version,
        params.text_document.text.clone(),
      );
      self.documents.insert(document);
      let notification = TsNotification::Open {
        file,
        file_content: params.text_document.text,
        script_kind_name: language_id.as_script_kind_name(),
        project_root_path: self.config.root_path().map(PathBuf::from),
      };
      if let Err(err) = ts_server.notify(notification) {
        error!("open notification failed: {err:#}");
      }
    }
    self.request_diagnostics();
  }

  /// Replace a document's entire contents, addressing the analyzer change
  /// at the whole extent of the text it currently holds.
  fn apply_full_text_change(
    &mut self,
    uri: &Url,
    file: &std::path::Path,
    version: i32,
    text: String,
  ) {
    let Some(ts_server) = self.ts_server.clone() else {
      return;
    };
    let Some(document) = self.documents.get_mut(uri) else {
      return;
    };
    let end =
      Location::from_position(document.position_at(document.line_index().utf16_len()));
    document.apply_change(None, &text);
    document.set_version(version);
    let notification = TsNotification::Change {
      file: file.to_path_buf(),
      start: Location { line: 1, offset: 1 },
      end,
      insert_string: text,
    };
    if let Err(err) = ts_server.notify(notification) {
      error!("change notification failed: {err:#}");
    }
  }

  async fn did_change(&mut self, params: DidChangeTextDocumentParams) {
    let uri = params.text_document.uri;
    let Some(file) = uri_to_path(&uri) else {
      return;
    };
    let Some(ts_server) = self.ts_server.clone() else {
      return;
    };
    let Some(document) = self.documents.get_mut(&uri) else {
      error!("change for a document that is not open: \"{uri}\"");
      return;
    };
    for change in params.content_changes {
      // Coordinates are taken against the text as it stands before this
      // entry; the analyzer applied the earlier entries the same way.
      let (start, end) = match change.range {
        Some(range) => (
          Location::from_position(range.start),
          Location::from_position(range.end),
        ),
        None => (
          Location { line: 1, offset: 1 },
          Location::from_position(
            document.position_at(document.line_index().utf16_len()),
          ),
        ),
      };
      document.apply_change(change.range, &change.text);
      let notification = TsNotification::Change {
        file: file.clone(),
        start,
        end,
        insert_string: change.text,
      };
      if let Err(err) = ts_server.notify(notification) {
        error!("change notification failed: {err:#}");
      }
    }
    document.set_version(params.text_document.version);
    document.mark_accessed();
    self.request_diagnostics();
  }

  async fn did_close(&mut self, params: DidCloseTextDocumentParams) {
    let uri = params.text_document.uri;
    if self.documents.close(&uri).is_none() {
      return;
    }
    if let (Some(ts_server), Some(file)) =
      (self.ts_server.as_ref(), uri_to_path(&uri))
    {
      if let Err(err) = ts_server.notify(TsNotification::Close { file }) {
        error!("close notification failed: {err:#}");
      }
    }
    // The editor keeps stale squiggles otherwise.
    self.diagnostics.clear(uri).await;
  }

  async fn hover(&self, params: HoverParams) -> LspResult<Option<Hover>> {
    let position_params = params.text_document_position_params;
    let Some((file, location)) = self.document_location(
      &position_params.text_document.uri,
      position_params.position,
    )?
    else {
      return Ok(None);
    };
    let ts_server = self.ts_server()?.clone();
    let result = self
      .interrupted_request::<Option<tsc::QuickInfo>>(
        &ts_server,
        TsRequest::Quickinfo { file, location },
      )
      .await;
    match result {
      Ok(quick_info) => Ok(quick_info.map(|info| info.to_hover())),
      Err(err) => {
        lsp_warn!("quickinfo failed: {err:#}");
        Ok(None)
      }
    }
  }

  async fn completion(
    &self,
    params: CompletionParams,
  ) -> LspResult<Option<CompletionResponse>> {
    let position_params = params.text_document_position;
    let Some((file, location)) = self.document_location(
      &position_params.text_document.uri,
      position_params.position,
    )?
    else {
      return Ok(None);
    };
    let ts_server = self.ts_server()?.clone();
    let result = self
      .interrupted_request::<Option<Vec<tsc::CompletionEntry>>>(
        &ts_server,
        TsRequest::Completions {
          file: file.clone(),
          location,
        },
      )
      .await;
    match result {
      Ok(entries) => Ok(entries.map(|entries| {
        CompletionResponse::Array(
          entries
            .iter()
            .map(|entry| entry.to_completion_item(&file, location))
            .collect(),
        )
      })),
      Err(err) => {
        lsp_warn!("completions failed: {err:#}");
        Ok(None)
      }
    }
  }

  async fn completion_resolve(
    &self,
    mut item: CompletionItem,
  ) -> LspResult<CompletionItem> {
    let Some(data) = item
      .data
      .clone()
      .and_then(|data| {
        serde_json::from_value::<tsc::CompletionItemData>(data).ok()
      })
    else {
      return Ok(item);
    };
    let ts_server = self.ts_server()?.clone();
    let request = TsRequest::CompletionEntryDetails {
      file: data.file.clone(),
      location: Location {
        line: data.line,
        offset: data.offset,
      },
      name: data.name.clone(),
      source: data.source.clone(),
    };
    let result = self
      .interrupted_request::<Option<Vec<tsc::CompletionEntryDetails>>>(
        &ts_server, request,
      )
      .await;
    match result {
      Ok(details) => {
        if let Some(details) =
          details.and_then(|details| details.into_iter().next())
        {
          details.apply_to_item(&data, &mut item);
        }
        Ok(item)
      }
      Err(err) => {
        lsp_warn!("completionEntryDetails failed: {err:#}");
        Ok(item)
      }
    }
  }

  async fn signature_help(
    &self,
    params: SignatureHelpParams,
  ) -> LspResult<Option<SignatureHelp>> {
    let position_params = params.text_document_position_params;
    let Some((file, location)) = self.document_location(
      &position_params.text_document.uri,
      position_params.position,
    )?
    else {
      return Ok(None);
    };
    let ts_server = self.ts_server()?.clone();
    let result = self
      .interrupted_request::<Option<tsc::SignatureHelpItems>>(
        &ts_server,
        TsRequest::SignatureHelp { file, location },
      )
      .await;
    match result {
      Ok(items) => Ok(items.map(|items| items.to_signature_help())),
      Err(err) => {
        lsp_warn!("signatureHelp failed: {err:#}");
        Ok(None)
      }
    }
  }

  async fn definition_like(
    &self,
    uri: &Url,
    position: Position,
    request: fn(PathBuf, Location) -> TsRequest,
  ) -> LspResult<Option<Vec<lsp::Location>>> {
    let Some((file, location)) = self.document_location(uri, position)? else {
      return Ok(None);
    };
    let ts_server = self.ts_server()?;
    match ts_server
      .request::<Option<Vec<tsc::FileSpan>>>(request(file, location), None)
      .await
    {
      Ok(spans) => Ok(spans.map(|spans| {
        spans.iter().filter_map(tsc::FileSpan::to_location).collect()
      })),
      Err(err) => {
        lsp_warn!("definition query failed: {err:#}");
        Ok(None)
      }
    }
  }

  async fn references(
    &self,
    params: ReferenceParams,
  ) -> LspResult<Option<Vec<lsp::Location>>> {
    let position_params = params.text_document_position;
    let Some((file, location)) = self.document_location(
      &position_params.text_document.uri,
      position_params.position,
    )?
    else {
      return Ok(None);
    };
    let ts_server = self.ts_server()?;
    match ts_server
      .request::<Option<tsc::ReferencesResponseBody>>(
        TsRequest::References { file, location },
        None,
      )
      .await
    {
      Ok(body) => Ok(body.map(|body| {
        body
          .refs
          .iter()
          .filter(|entry| {
            params.context.include_declaration || !entry.is_definition
          })
          .filter_map(|entry| {
            let uri = path_to_uri(&entry.file).ok()?;
            Some(lsp::Location {
              uri,
              range: tsc::to_range(entry.start, entry.end),
            })
          })
          .collect()
      })),
      Err(err) => {
        lsp_warn!("references failed: {err:#}");
        Ok(None)
      }
    }
  }

  async fn document_highlight(
    &self,
    params: DocumentHighlightParams,
  ) -> LspResult<Option<Vec<DocumentHighlight>>> {
    let position_params = params.text_document_position_params;
    let Some((file, location)) = self.document_location(
      &position_params.text_document.uri,
      position_params.position,
    )?
    else {
      return Ok(None);
    };
    let ts_server = self.ts_server()?;
    let request_file = file.clone();
    match ts_server
      .request::<Option<Vec<tsc::DocumentHighlightsItem>>>(
        TsRequest::DocumentHighlights {
          file: request_file,
          location,
        },
        None,
      )
      .await
    {
      Ok(items) => Ok(items.map(|items| {
        items
          .iter()
          .filter(|item| item.file == file)
          .flat_map(|item| item.to_highlights())
          .collect()
      })),
      Err(err) => {
        lsp_warn!("documentHighlights failed: {err:#}");
        Ok(None)
      }
    }
  }

  async fn document_symbol(
    &self,
    params: DocumentSymbolParams,
  ) -> LspResult<Option<DocumentSymbolResponse>> {
    let uri = params.text_document.uri;
    let Some(file) = uri_to_path(&uri) else {
      return Ok(None);
    };
    self
      .documents
      .access(&uri)
      .map_err(|err| LspError::invalid_params(err.to_string()))?;
    let ts_server = self.ts_server()?;
    match ts_server
      .request::<Option<tsc::NavigationTree>>(
        TsRequest::Navtree { file },
        None,
      )
      .await
    {
      Ok(tree) => Ok(tree.map(|tree| {
        let mut symbols = Vec::new();
        flatten_navigation_tree(&tree, &uri, None, &mut symbols);
        DocumentSymbolResponse::Flat(symbols)
      })),
      Err(err) => {
        lsp_warn!("navtree failed: {err:#}");
        Ok(None)
      }
    }
  }

  async fn workspace_symbol(
    &self,
    params: WorkspaceSymbolParams,
  ) -> LspResult<Option<Vec<SymbolInformation>>> {
    // The analyzer needs some file for context; any open one will do, and
    // an unopened project file is a best-effort fallback.
    let context_file = self
      .documents
      .iter()
      .next()
      .and_then(|document| uri_to_path(document.uri()))
      .or_else(|| {
        self.config.root_path().map(|root| root.join("tsconfig.json"))
      });
    let Some(file) = context_file else {
      return Ok(None);
    };
    let ts_server = self.ts_server()?;
    match ts_server
      .request::<Option<Vec<tsc::NavtoItem>>>(
        TsRequest::Navto {
          search_value: params.query,
          file,
        },
        None,
      )
      .await
    {
      Ok(items) => Ok(items.map(|items| {
        items
          .iter()
          .filter_map(tsc::NavtoItem::to_symbol_information)
          .collect()
      })),
      Err(err) => {
        lsp_warn!("navto failed: {err:#}");
        Ok(None)
      }
    }
  }

  async fn formatting(
    &self,
    params: DocumentFormattingParams,
  ) -> LspResult<Option<Vec<TextEdit>>> {
    let uri = params.text_document.uri;
    let Some(file) = uri_to_path(&uri) else {
      return Ok(None);
    };
    self
      .documents
      .access(&uri)
      .map_err(|err| LspError::invalid_params(err.to_string()))?;
    let options = self.config.format_options(&params.options);
    let ts_server = self.ts_server()?;
    match ts_server
      .request::<Option<Vec<tsc::CodeEdit>>>(
        TsRequest::Format {
          file,
          start: Location { line: 1, offset: 1 },
          end: Location::MAX,
          options,
        },
        None,
      )
      .await
    {
      Ok(edits) => Ok(edits.map(|edits| {
        edits.iter().map(tsc::CodeEdit::to_text_edit).collect()
      })),
      Err(err) => {
        lsp_warn!("format failed: {err:#}");
        Ok(None)
      }
    }
  }

  async fn folding_range(
    &self,
    params: FoldingRangeParams,
  ) -> LspResult<Option<Vec<FoldingRange>>> {
    let uri = params.text_document.uri;
    let Some(file) = uri_to_path(&uri) else {
      return Ok(None);
    };
    self
      .documents
      .access(&uri)
      .map_err(|err| LspError::invalid_params(err.to_string()))?;
    let ts_server = self.ts_server()?;
    let spans = match ts_server
      .request::<Option<Vec<tsc::OutliningSpan>>>(
        TsRequest::GetOutliningSpans { file },
        None,
      )
      .await
    {
      Ok(spans) => spans,
      Err(err) => {
        lsp_warn!("getOutliningSpans failed: {err:#}");
        return Ok(None);
      }
    };
    let Some(document) = self.documents.get(&uri) else {
      return Ok(None);
    };
    Ok(spans.map(|spans| {
      spans
        .iter()
        .filter_map(|span| span.to_folding_range(document))
        .collect()
    }))
  }

  async fn rename(
    &self,
    params: RenameParams,
  ) -> LspResult<Option<WorkspaceEdit>> {
    let position_params = params.text_document_position;
    let Some((file, location)) = self.document_location(
      &position_params.text_document.uri,
      position_params.position,
    )?
    else {
      return Ok(None);
    };
    let ts_server = self.ts_server()?;
    match ts_server
      .request::<Option<tsc::RenameResponseBody>>(
        TsRequest::Rename { file, location },
        None,
      )
      .await
    {
      Ok(body) => Ok(
        body.and_then(|body| body.to_workspace_edit(&params.new_name)),
      ),
      Err(err) => {
        lsp_warn!("rename failed: {err:#}");
        Ok(None)
      }
    }
  }

  async fn code_action(
    &self,
    params: CodeActionParams,
  ) -> LspResult<Option<CodeActionResponse>> {
    let uri = params.text_document.uri;
    let Some(file) = uri_to_path(&uri) else {
      return Ok(None);
    };
    let language_id = {
      let document = self
        .documents
        .access(&uri)
        .map_err(|err| LspError::invalid_params(err.to_string()))?;
      document.language_id()
    };
    let start = Location::from_position(params.range.start);
    let end = Location::from_position(params.range.end);
    let error_codes: Vec<i64> = params
      .context
      .diagnostics
      .iter()
      .filter_map(|diagnostic| match &diagnostic.code {
        Some(NumberOrString::Number(code)) => Some(*code as i64),
        Some(NumberOrString::String(code)) => code.parse().ok(),
        None => None,
      })
      .collect();
    let ts_server = self.ts_server()?.clone();
    // Issue both queries before re-arming diagnostics so neither lands
    // behind a fresh `geterr` round.
    self.cancel_diagnostics_round();
    let pending_fixes = (!error_codes.is_empty()).then(|| {
      ts_server.send_request(TsRequest::GetCodeFixes {
        file: file.clone(),
        start,
        end,
        error_codes: error_codes.clone(),
      })
    });
    let pending_refactors =
      ts_server.send_request(TsRequest::GetApplicableRefactors {
        file: file.clone(),
        start,
        end,
      });
    self.request_diagnostics();
    let fixes: Vec<tsc::CodeAction> = match pending_fixes {
      Some(Ok(pending)) => match pending.wait().await {
        Ok(Some(fixes)) => fixes,
        Ok(None) => Vec::new(),
        Err(err) => {
          lsp_warn!("getCodeFixes failed: {err:#}");
          Vec::new()
        }
      },
      Some(Err(err)) => {
        lsp_warn!("getCodeFixes failed: {err:#}");
        Vec::new()
      }
      None => Vec::new(),
    };
    let refactors: Vec<tsc::ApplicableRefactorInfo> = match pending_refactors
    {
      Ok(pending) => match pending.wait().await {
        Ok(Some(refactors)) => refactors,
        Ok(None) => Vec::new(),
        Err(err) => {
          lsp_warn!("getApplicableRefactors failed: {err:#}");
          Vec::new()
        }
      },
      Err(err) => {
        lsp_warn!("getApplicableRefactors failed: {err:#}");
        Vec::new()
      }
    };

    let mut response = CodeActionResponse::new();
    for fix in fixes {
      response.push(CodeActionOrCommand::CodeAction(CodeAction {
        title: fix.description.clone(),
        kind: Some(CodeActionKind::QUICKFIX),
        command: Some(Command {
          title: fix.description.clone(),
          command: lsp_custom::APPLY_CODE_ACTION_COMMAND.to_string(),
          arguments: Some(vec![json!(fix)]),
        }),
        ..Default::default()
      }));
    }
    for refactor_info in refactors {
      if refactor_info.actions.len() > 1 {
        // The editor asks the user which action to take, then calls
        // `_typescript.applyRefactoring` itself.
        response.push(CodeActionOrCommand::Command(Command {
          title: refactor_info.description.clone(),
          command: lsp_custom::SELECT_REFACTORING_COMMAND.to_string(),
          arguments: Some(vec![json!({
            "file": file,
            "start": start,
            "end": end,
            "refactor": refactor_info.name,
            "actions": refactor_info.actions,
          })]),
        }));
      } else if let Some(action) = refactor_info.actions.first() {
        let data = RefactorActionData {
          file: file.clone(),
          start,
          end,
          refactor: refactor_info.name.clone(),
          action: action.name.clone(),
        };
        response.push(CodeActionOrCommand::CodeAction(CodeAction {
          title: action.description.clone(),
          kind: Some(refactor::refactor_action_kind(&action.name)),
          command: Some(Command {
            title: action.description.clone(),
            command: lsp_custom::APPLY_REFACTORING_COMMAND.to_string(),
            arguments: Some(vec![json!(data)]),
          }),
          ..Default::default()
        }));
      }
    }
    if language_id.as_script_kind_name().is_some() {
      response.push(CodeActionOrCommand::CodeAction(CodeAction {
        title: "Organize imports".to_string(),
        kind: Some(CodeActionKind::SOURCE_ORGANIZE_IMPORTS),
        command: Some(Command {
          title: "Organize imports".to_string(),
          command: lsp_custom::ORGANIZE_IMPORTS_COMMAND.to_string(),
          arguments: Some(vec![json!(file)]),
        }),
        ..Default::default()
      }));
    }
    Ok(Some(response))
  }

  async fn execute_command(
    &self,
    params: ExecuteCommandParams,
  ) -> LspResult<Option<Value>> {
    let mut arguments = params.arguments.into_iter();
    let mut first_argument = || {
      arguments.next().ok_or_else(|| {
        LspError::invalid_params("the command requires an argument")
      })
    };
    match params.command.as_str() {
      lsp_custom::APPLY_WORKSPACE_EDIT_COMMAND => {
        let edit: WorkspaceEdit = serde_json::from_value(first_argument()?)
          .map_err(|err| LspError::invalid_params(err.to_string()))?;
        if let Err(err) = self.client.apply_edit(edit).await {
          lsp_warn!("workspace edit was not applied: {:#}", err);
        }
        Ok(None)
      }
      lsp_custom::APPLY_CODE_ACTION_COMMAND => {
        let action: tsc::CodeAction =
          serde_json::from_value(first_argument()?)
            .map_err(|err| LspError::invalid_params(err.to_string()))?;
        self.apply_file_code_edits(&action.changes).await;
        if let Some(commands) = &action.commands {
          let ts_server = self.ts_server()?.clone();
          for command in commands {
            let request = TsRequest::ApplyCodeActionCommand {
              command: command.clone(),
            };
            if let Err(err) = ts_server.request::<Value>(request, None).await {
              lsp_warn!("applyCodeActionCommand failed: {err:#}");
            }
          }
        }
        Ok(None)
      }
      lsp_custom::APPLY_REFACTORING_COMMAND => {
        let data: RefactorActionData =
          serde_json::from_value(first_argument()?)
            .map_err(|err| LspError::invalid_params(err.to_string()))?;
        let ts_server = self.ts_server()?.clone();
        let request = TsRequest::GetEditsForRefactor {
          file: data.file.clone(),
          start: data.start,
          end: data.end,
          refactor: data.refactor,
          action: data.action,
        };
        let info = match ts_server
          .request::<Option<tsc::RefactorEditInfo>>(request, None)
          .await
        {
          Ok(Some(info)) => info,
          Ok(None) => return Ok(None),
          Err(err) => {
            lsp_warn!("getEditsForRefactor failed: {err:#}");
            return Ok(None);
          }
        };
        // A move-to-new-file refactor edits files that do not exist yet;
        // the editor cannot apply edits to a missing file.
        for edit in &info.edits {
          ensure_file_exists(&edit.file_name);
        }
        self.apply_file_code_edits(&info.edits).await;
        if let Some(location) = info.rename_location {
          let file = info.rename_filename.unwrap_or(data.file);
          if let Ok(uri) = path_to_uri(&file) {
            if let Err(err) =
              self.client.rename(uri, location.to_position()).await
            {
              lsp_warn!("rename request failed: {:#}", err);
            }
          }
        }
        Ok(None)
      }
      lsp_custom::ORGANIZE_IMPORTS_COMMAND => {
        let file: PathBuf = serde_json::from_value(first_argument()?)
          .map_err(|err| LspError::invalid_params(err.to_string()))?;
        let ts_server = self.ts_server()?.clone();
        match ts_server
          .request::<Option<Vec<tsc::FileCodeEdits>>>(
            TsRequest::OrganizeImports { file },
            None,
          )
          .await
        {
          Ok(Some(edits)) => self.apply_file_code_edits(&edits).await,
          Ok(None) => {}
          Err(err) => lsp_warn!("organizeImports failed: {err:#}"),
        }
        Ok(None)
      }
      _ => {
        lsp_warn!("unknown command \"{}\"", params.command);
        Ok(None)
      }
    }
  }
}

fn ensure_file_exists(path: &std::path::Path) {
  if path.exists() {
    return;
  }
  if let Some(parent) = path.parent() {
    if let Err(err) = std::fs::create_dir_all(parent) {
      lsp_warn!("could not create \"{}\": {:#}", parent.display(), err);
      return;
    }
  }
  if let Err(err) = std::fs::write(path, "") {
    lsp_warn!("could not create \"{}\": {:#}", path.display(), err);
  }
}

fn flatten_navigation_tree(
  tree: &tsc::NavigationTree,
  uri: &Url,
  container_name: Option<&str>,
  output: &mut Vec<SymbolInformation>,
) {
  if let Some(span) = tree.spans.first() {
    #[allow(deprecated)]
    output.push(SymbolInformation {
      name: tree.text.clone(),
      kind: tsc::script_element_kind_to_symbol_kind(&tree.kind),
      tags: None,
      deprecated: None,
      location: lsp::Location {
        uri: uri.clone(),
        range: tsc::to_range(span.start, span.end),
      },
      container_name: container_name.map(str::to_string),
    });
  }
  for child in &tree.child_items {
    flatten_navigation_tree(child, uri, Some(&tree.text), output);
  }
}

#[tower_lsp::async_trait]
impl tower_lsp::LanguageServer for LanguageServer {
  async fn initialize(
    &self,
    params: InitializeParams,
  ) -> LspResult<InitializeResult> {
    self.0.write().await.initialize(params).await
  }

  async fn initialized(&self, _: InitializedParams) {
    lsp_log!("server ready");
  }

  async fn shutdown(&self) -> LspResult<()> {
    self.0.write().await.shutdown().await
  }

  async fn did_open(&self, params: DidOpenTextDocumentParams) {
    self.0.write().await.did_open(params).await
  }

  async fn did_change(&self, params: DidChangeTextDocumentParams) {
    self.0.write().await.did_change(params).await
  }

  async fn did_close(&self, params: DidCloseTextDocumentParams) {
    self.0.write().await.did_close(params).await
  }

  async fn hover(&self, params: HoverParams) -> LspResult<Option<Hover>> {
    self.0.read().await.hover(params).await
  }

  async fn completion(
    &self,
    params: CompletionParams,
  ) -> LspResult<Option<CompletionResponse>> {
    self.0.read().await.completion(params).await
  }

  async fn completion_resolve(
    &self,
    params: CompletionItem,
  ) -> LspResult<CompletionItem> {
    self.0.read().await.completion_resolve(params).await
  }

  async fn signature_help(
    &self,
    params: SignatureHelpParams,
  ) -> LspResult<Option<SignatureHelp>> {
    self.0.read().await.signature_help(params).await
  }

  async fn goto_definition(
    &self,
    params: GotoDefinitionParams,
  ) -> LspResult<Option<GotoDefinitionResponse>> {
    let position_params = params.text_document_position_params;
    self
      .0
      .read()
      .await
      .definition_like(
        &position_params.text_document.uri,
        position_params.position,
        |file, location| TsRequest::Definition { file, location },
      )
      .await
      .map(|locations| locations.map(GotoDefinitionResponse::Array))
  }

  async fn goto_implementation(
    &self,
    params: GotoImplementationParams,
  ) -> LspResult<Option<GotoImplementationResponse>> {
    let position_params = params.text_document_position_params;
    self
      .0
      .read()
      .await
      .definition_like(
        &position_params.text_document.uri,
        position_params.position,
        |file, location| TsRequest::Implementation { file, location },
      )
      .await
      .map(|locations| locations.map(GotoImplementationResponse::Array))
  }

  async fn goto_type_definition(
    &self,
    params: GotoTypeDefinitionParams,
  ) -> LspResult<Option<GotoTypeDefinitionResponse>> {
    let position_params = params.text_document_position_params;
    self
      .0
      .read()
      .await
      .definition_like(
        &position_params.text_document.uri,
        position_params.position,
        |file, location| TsRequest::TypeDefinition { file, location },
      )
      .await
      .map(|locations| locations.map(GotoTypeDefinitionResponse::Array))
  }

  async fn references(
    &self,
    params: ReferenceParams,
  ) -> LspResult<Option<Vec<lsp::Location>>> {
    self.0.read().await.references(params).await
  }

  async fn document_highlight(
    &self,
    params: DocumentHighlightParams,
  ) -> LspResult<Option<Vec<DocumentHighlight>>> {
    self.0.read().await.document_highlight(params).await
  }

  async fn document_symbol(
    &self,
    params: DocumentSymbolParams,
  ) -> LspResult<Option<DocumentSymbolResponse>> {
    self.0.read().await.document_symbol(params).await
  }

  async fn symbol(
    &self,
    params: WorkspaceSymbolParams,
  ) -> LspResult<Option<Vec<SymbolInformation>>> {
    self.0.read().await.workspace_symbol(params).await
  }

  async fn formatting(
    &self,
    params: DocumentFormattingParams,
  ) -> LspResult<Option<Vec<TextEdit>>> {
    self.0.read().await.formatting(params).await
  }

  async fn folding_range(
    &self,
    params: FoldingRangeParams,
  ) -> LspResult<Option<Vec<FoldingRange>>> {
    self.0.read().await.folding_range(params).await
  }

  async fn rename(
    &self,
    params: RenameParams,
  ) -> LspResult<Option<WorkspaceEdit>> {
    self.0.read().await.rename(params).await
  }

  async fn code_action(
    &self,
    params: CodeActionParams,
  ) -> LspResult<Option<CodeActionResponse>> {
    self.0.read().await.code_action(params).await
  }

  async fn execute_command(
    &self,
    params: ExecuteCommandParams,
  ) -> LspResult<Option<Value>> {
    self.0.read().await.execute_command(params).await
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn navigation_tree() -> tsc::NavigationTree {
    serde_json::from_value(json!({
      "text": "\"b\"",
      "kind": "module",
      "spans": [
        { "start": { "line": 1, "offset": 1 }, "end": { "line": 4, "offset": 2 } }
      ],
      "childItems": [
        {
          "text": "A",
          "kind": "class",
          "spans": [
            { "start": { "line": 1, "offset": 1 }, "end": { "line": 3, "offset": 2 } }
          ],
          "childItems": [
            {
              "text": "m",
              "kind": "method",
              "spans": [
                { "start": { "line": 2, "offset": 3 }, "end": { "line": 2, "offset": 10 } }
              ]
            }
          ]
        }
      ]
    }))
    .unwrap()
  }

  #[test]
  fn navigation_tree_flattens_with_container_names() {
    let uri = Url::parse("file:///a/b.ts").unwrap();
    let mut symbols = Vec::new();
    flatten_navigation_tree(&navigation_tree(), &uri, None, &mut symbols);
    let summary: Vec<(&str, Option<&str>)> = symbols
      .iter()
      .map(|s| (s.name.as_str(), s.container_name.as_deref()))
      .collect();
    assert_eq!(
      summary,
      vec![
        ("\"b\"", None),
        ("A", Some("\"b\"")),
        ("m", Some("A")),
      ]
    );
    assert_eq!(symbols[1].kind, SymbolKind::CLASS);
    assert_eq!(
      symbols[2].location.range,
      Range {
        start: Position {
          line: 1,
          character: 2
        },
        end: Position {
          line: 1,
          character: 9
        },
      }
    );
  }
}
