// Copyright 2026 the tsls authors. MIT license.

//! Client for the tsserver subprocess.
//!
//! Outgoing messages are single lines of minified JSON. Incoming messages
//! are framed with a `Content-Length: N\r\n\r\n` header. Responses are
//! correlated to requests by `request_seq`; everything else is an event and
//! fans out through the channel supplied at [`TsServer::start`].

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Error as AnyError;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::process::Child;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types as lsp;

use super::documents::Document;
use super::logging::lsp_warn;
use super::urls::path_to_uri;

/// `Number.MAX_SAFE_INTEGER`.
pub const MAX_SAFE_INTEGER: u64 = 9007199254740991;

/// Cap on a single incoming frame.
const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// How long `stop()` waits for a clean exit before killing the subprocess.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Locate the tsserver executable: explicit path, workspace-local install,
/// `PATH`, then an install bundled next to this binary.
pub fn find_tsserver(
  root_path: Option<&Path>,
  explicit: Option<&Path>,
) -> Option<PathBuf> {
  if let Some(path) = explicit {
    return Some(path.to_path_buf());
  }
  let exe_name = if cfg!(windows) {
    "tsserver.cmd"
  } else {
    "tsserver"
  };
  if let Some(root) = root_path {
    let candidate = root.join("node_modules").join(".bin").join(exe_name);
    if candidate.is_file() {
      return Some(candidate);
    }
  }
  if let Some(paths) = std::env::var_os("PATH") {
    for dir in std::env::split_paths(&paths) {
      let candidate = dir.join(exe_name);
      if candidate.is_file() {
        return Some(candidate);
      }
    }
  }
  let bundled = std::env::current_exe()
    .ok()?
    .parent()?
    .join("node_modules")
    .join(".bin")
    .join(exe_name);
  bundled.is_file().then_some(bundled)
}

/// An analyzer event the client does not interpret; names are an external
/// contract consumed downstream.
#[derive(Debug)]
pub struct TsEvent {
  pub name: String,
  pub body: Value,
}

/// A command that expects a correlated completion.
#[derive(Debug)]
pub enum TsRequest {
  Configure {
    preferences: Value,
  },
  Geterr {
    files: Vec<PathBuf>,
    delay: u64,
  },
  Quickinfo {
    file: PathBuf,
    location: Location,
  },
  Completions {
    file: PathBuf,
    location: Location,
  },
  CompletionEntryDetails {
    file: PathBuf,
    location: Location,
    name: String,
    source: Option<String>,
  },
  Definition {
    file: PathBuf,
    location: Location,
  },
  Implementation {
    file: PathBuf,
    location: Location,
  },
  TypeDefinition {
    file: PathBuf,
    location: Location,
  },
  References {
    file: PathBuf,
    location: Location,
  },
  DocumentHighlights {
    file: PathBuf,
    location: Location,
  },
  Navtree {
    file: PathBuf,
  },
  Navto {
    search_value: String,
    file: PathBuf,
  },
  SignatureHelp {
    file: PathBuf,
    location: Location,
  },
  Rename {
    file: PathBuf,
    location: Location,
  },
  Format {
    file: PathBuf,
    start: Location,
    end: Location,
    options: Value,
  },
  GetOutliningSpans {
    file: PathBuf,
  },
  GetCodeFixes {
    file: PathBuf,
    start: Location,
    end: Location,
    error_codes: Vec<i64>,
  },
  GetApplicableRefactors {
    file: PathBuf,
    start: Location,
    end: Location,
  },
  GetEditsForRefactor {
    file: PathBuf,
    start: Location,
    end: Location,
    refactor: String,
    action: String,
  },
  OrganizeImports {
    file: PathBuf,
  },
  ApplyCodeActionCommand {
    command: Value,
  },
}

impl TsRequest {
  pub fn command(&self) -> &'static str {
    match self {
      Self::Configure { .. } => "configure",
      Self::Geterr { .. } => "geterr",
      Self::Quickinfo { .. } => "quickinfo",
      Self::Completions { .. } => "completions",
      Self::CompletionEntryDetails { .. } => "completionEntryDetails",
      Self::Definition { .. } => "definition",
      Self::Implementation { .. } => "implementation",
      Self::TypeDefinition { .. } => "typeDefinition",
      Self::References { .. } => "references",
      Self::DocumentHighlights { .. } => "documentHighlights",
      Self::Navtree { .. } => "navtree",
      Self::Navto { .. } => "navto",
      Self::SignatureHelp { .. } => "signatureHelp",
      Self::Rename { .. } => "rename",
      Self::Format { .. } => "format",
      Self::GetOutliningSpans { .. } => "getOutliningSpans",
      Self::GetCodeFixes { .. } => "getCodeFixes",
      Self::GetApplicableRefactors { .. } => "getApplicableRefactors",
      Self::GetEditsForRefactor { .. } => "getEditsForRefactor",
      Self::OrganizeImports { .. } => "organizeImports",
      Self::ApplyCodeActionCommand { .. } => "applyCodeActionCommand",
    }
  }

  pub fn arguments(&self) -> Value {
    match self {
      Self::Configure { preferences } => json!({
        "hostInfo": "tsls",
        "preferences": preferences,
      }),
      Self::Geterr { files, delay } => json!({
        "delay": delay,
        "files": files,
      }),
      Self::Quickinfo { file, location }
      | Self::Completions { file, location }
      | Self::Definition { file, location }
      | Self::Implementation { file, location }
      | Self::TypeDefinition { file, location }
      | Self::References { file, location }
      | Self::SignatureHelp { file, location } => json!({
        "file": file,
        "line": location.line,
        "offset": location.offset,
      }),
      Self::CompletionEntryDetails {
        file,
        location,
        name,
        source,
      } => json!({
        "file": file,
        "line": location.line,
        "offset": location.offset,
        "entryNames": [{ "name": name, "source": source }],
      }),
      Self::DocumentHighlights { file, location } => json!({
        "file": file,
        "line": location.line,
        "offset": location.offset,
        "filesToSearch": [file],
      }),
      Self::Navtree { file } => json!({ "file": file }),
      Self::Navto { search_value, file } => json!({
        "searchValue": search_value,
        "file": file,
      }),
      Self::Rename { file, location } => json!({
        "file": file,
        "line": location.line,
        "offset": location.offset,
        "findInStrings": false,
        "findInComments": false,
      }),
      Self::Format {
        file,
        start,
        end,
        options,
      } => json!({
        "file": file,
        "line": start.line,
        "offset": start.offset,
        "endLine": end.line,
        "endOffset": end.offset,
        "options": options,
      }),
      Self::GetOutliningSpans { file } => json!({ "file": file }),
      Self::GetCodeFixes {
        file,
        start,
        end,
        error_codes,
      } => json!({
        "file": file,
        "startLine": start.line,
        "startOffset": start.offset,
        "endLine": end.line,
        "endOffset": end.offset,
        "errorCodes": error_codes,
      }),
      Self::GetApplicableRefactors { file, start, end } => json!({
        "file": file,
        "startLine": start.line,
        "startOffset": start.offset,
        "endLine": end.line,
        "endOffset": end.offset,
      }),
      Self::GetEditsForRefactor {
        file,
        start,
        end,
        refactor,
        action,
      } => json!({
        "file": file,
        "startLine": start.line,
        "startOffset": start.offset,
        "endLine": end.line,
        "endOffset": end.offset,
        "refactor": refactor,
        "action": action,
      }),
      Self::OrganizeImports { file } => json!({
        "scope": { "type": "file", "args": { "file": file } },
      }),
      Self::ApplyCodeActionCommand { command } => json!({
        "command": command,
      }),
    }
  }
}

/// A fire-and-forget command; the analyzer never answers these.
#[derive(Debug)]
pub enum TsNotification {
  Open {
    file: PathBuf,
    file_content: String,
    script_kind_name: Option<&'static str>,
    project_root_path: Option<PathBuf>,
  },
  Change {
    file: PathBuf,
    start: Location,
    end: Location,
    insert_string: String,
  },
  Close {
    file: PathBuf,
  },
}

impl TsNotification {
  pub fn command(&self) -> &'static str {
    match self {
      Self::Open { .. } => "open",
      Self::Change { .. } => "change",
      Self::Close { .. } => "close",
    }
  }

  pub fn arguments(&self) -> Value {
    match self {
      Self::Open {
        file,
        file_content,
        script_kind_name,
        project_root_path,
      } => json!({
        "file": file,
        "fileContent": file_content,
        "scriptKindName": script_kind_name,
        "projectRootPath": project_root_path,
      }),
      Self::Change {
        file,
        start,
        end,
        insert_string,
      } => json!({
        "file": file,
        "line": start.line,
        "offset": start.offset,
        "endLine": end.line,
        "endOffset": end.offset,
        "insertString": insert_string,
      }),
      Self::Close { file } => json!({ "file": file }),
    }
  }
}

type PendingMap = HashMap<u64, oneshot::Sender<Result<Value, AnyError>>>;

/// Handle to a running analyzer subprocess.
#[derive(Debug)]
pub struct TsServer {
  seq: AtomicU64,
  sender: Mutex<Option<mpsc::UnboundedSender<String>>>,
  pending: Arc<Mutex<PendingMap>>,
  child: Mutex<Option<Child>>,
}

impl TsServer {
  /// Spawn the analyzer and start the reader and writer tasks. Events are
  /// delivered through `event_tx`; the channel closes when the transport
  /// dies.
  pub fn start(
    exe: &Path,
    extra_args: &[String],
    event_tx: mpsc::UnboundedSender<TsEvent>,
  ) -> Result<Self, AnyError> {
    let mut child = Command::new(exe)
      .args(extra_args)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::null())
      .kill_on_drop(true)
      .spawn()
      .with_context(|| format!("spawning \"{}\"", exe.display()))?;
    let stdin = child.stdin.take().context("no stdin handle")?;
    let stdout = child.stdout.take().context("no stdout handle")?;

    let (sender, mut receiver) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
      let mut stdin = stdin;
      while let Some(line) = receiver.recv().await {
        if let Err(err) = stdin.write_all(line.as_bytes()).await {
          lsp_warn!("analyzer write failed: {:#}", err);
          break;
        }
        if let Err(err) = stdin.flush().await {
          lsp_warn!("analyzer flush failed: {:#}", err);
          break;
        }
      }
    });

    let pending: Arc<Mutex<PendingMap>> = Arc::default();
    let reader_pending = pending.clone();
    tokio::spawn(async move {
      let mut reader = BufReader::new(stdout);
      loop {
        match read_message(&mut reader).await {
          Ok(Some(message)) => {
            route_message(message, &reader_pending, &event_tx);
          }
          Ok(None) => break,
          Err(err) => {
            lsp_warn!("analyzer read failed: {:#}", err);
            break;
          }
        }
      }
      // Transport is gone. Fail every waiter; dropping `event_tx` closes
      // the event channel so the consumer can observe the death.
      let mut pending = reader_pending.lock();
      for (_, tx) in pending.drain() {
        let _ = tx.send(Err(anyhow!("the analyzer process terminated")));
      }
    });

    Ok(Self {
      seq: AtomicU64::new(0),
      sender: Mutex::new(Some(sender)),
      pending,
      child: Mutex::new(Some(child)),
    })
  }

  fn enqueue(
    &self,
    command: &'static str,
    arguments: Value,
    completion: Option<oneshot::Sender<Result<Value, AnyError>>>,
  ) -> Result<u64, AnyError> {
    let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
    if let Some(tx) = completion {
      self.pending.lock().insert(seq, tx);
    }
    let line = encode_message(seq, command, arguments);
    let sent = self
      .sender
      .lock()
      .as_ref()
      .map(|sender| sender.send(line).is_ok())
      .unwrap_or(false);
    if !sent {
      self.pending.lock().remove(&seq);
      return Err(anyhow!("the analyzer is not running"));
    }
    Ok(seq)
  }

  /// Write a request to the analyzer right away and hand back the slot to
  /// await its completion on. Splitting issue from wait lets the caller do
  /// bookkeeping between the two (the diagnostics interrupt protocol
  /// re-arms as soon as the interactive request has been issued).
  pub fn send_request(
    &self,
    request: TsRequest,
  ) -> Result<PendingResponse, AnyError> {
    let command = request.command();
    let (tx, rx) = oneshot::channel();
    let seq = self.enqueue(command, request.arguments(), Some(tx))?;
    Ok(PendingResponse {
      command,
      seq,
      rx,
      pending: self.pending.clone(),
    })
  }

  /// Issue a request and await its correlated completion. A fired token
  /// resolves the wait with an error; the analyzer keeps working and its
  /// eventual answer is discarded.
  pub async fn request<R>(
    &self,
    request: TsRequest,
    token: Option<&CancellationToken>,
  ) -> Result<R, AnyError>
  where
    R: DeserializeOwned,
  {
    let pending = self.send_request(request)?;
    match token {
      Some(token) => pending.wait_with_token(token).await,
      None => pending.wait().await,
    }
  }

  /// Fire-and-forget.
  pub fn notify(&self, notification: TsNotification) -> Result<(), AnyError> {
    self
      .enqueue(notification.command(), notification.arguments(), None)
      .map(|_| ())
  }

  /// Close the writer (EOF lets the analyzer exit on its own), give it a
  /// grace window, then kill. Fails any stragglers in the pending table.
  pub async fn stop(&self) {
    self.sender.lock().take();
    let child = self.child.lock().take();
    if let Some(mut child) = child {
      match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
        Ok(Ok(_)) => {}
        Ok(Err(err)) => lsp_warn!("analyzer wait failed: {:#}", err),
        Err(_) => {
          lsp_warn!("analyzer did not exit in time; killing");
          if let Err(err) = child.kill().await {
            lsp_warn!("analyzer kill failed: {:#}", err);
          }
        }
      }
    }
    let mut pending = self.pending.lock();
    for (_, tx) in pending.drain() {
      let _ = tx.send(Err(anyhow!("the analyzer was stopped")));
    }
  }
}

/// The completion slot for one issued request.
#[derive(Debug)]
pub struct PendingResponse {
  command: &'static str,
  seq: u64,
  rx: oneshot::Receiver<Result<Value, AnyError>>,
  pending: Arc<Mutex<PendingMap>>,
}

impl PendingResponse {
  pub async fn wait<R>(self) -> Result<R, AnyError>
  where
    R: DeserializeOwned,
  {
    let command = self.command;
    let body = self
      .rx
      .await
      .map_err(|_| anyhow!("the analyzer process terminated"))?
      .map_err(|err| anyhow!("request \"{command}\" failed: {err:#}"))?;
    serde_json::from_value(body)
      .with_context(|| format!("malformed \"{command}\" response body"))
  }

  pub async fn wait_with_token<R>(
    mut self,
    token: &CancellationToken,
  ) -> Result<R, AnyError>
  where
    R: DeserializeOwned,
  {
    tokio::select! {
      _ = token.cancelled() => {
        // Forget the slot; the analyzer's eventual answer is discarded.
        self.pending.lock().remove(&self.seq);
        Err(anyhow!("request \"{}\" was cancelled", self.command))
      }
      result = &mut self.rx => {
        let command = self.command;
        let body = result
          .map_err(|_| anyhow!("the analyzer process terminated"))?
          .map_err(|err| anyhow!("request \"{command}\" failed: {err:#}"))?;
        serde_json::from_value(body)
          .with_context(|| format!("malformed \"{command}\" response body"))
      }
    }
  }
}

fn encode_message(seq: u64, command: &str, arguments: Value) -> String {
  let mut line = json!({
    "seq": seq,
    "type": "request",
    "command": command,
    "arguments": arguments,
  })
  .to_string();
  line.push('\n');
  line
}

/// Read one `Content-Length`-framed message. `Ok(None)` is a clean EOF at a
/// message boundary; EOF anywhere else is an error.
async fn read_message<R>(
  reader: &mut BufReader<R>,
) -> Result<Option<Value>, AnyError>
where
  R: AsyncRead + Unpin,
{
  let mut content_length = None;
  let mut line = String::new();
  let mut saw_header_bytes = false;
  loop {
    line.clear();
    let read = reader
      .read_line(&mut line)
      .await
      .context("reading message header")?;
    if read == 0 {
      if !saw_header_bytes {
        return Ok(None);
      }
      return Err(anyhow!("unexpected EOF inside a message header"));
    }
    saw_header_bytes = true;
    let trimmed = line.trim();
    if trimmed.is_empty() {
      break;
    }
    if let Some((name, value)) = trimmed.split_once(':') {
      if name.eq_ignore_ascii_case("Content-Length") {
        let length = value
          .trim()
          .parse::<usize>()
          .context("invalid Content-Length value")?;
        if length > MAX_MESSAGE_BYTES {
          return Err(anyhow!("message of {length} bytes exceeds the cap"));
        }
        content_length = Some(length);
      }
    }
  }
  let content_length =
    content_length.ok_or_else(|| anyhow!("missing Content-Length header"))?;
  let mut body = vec![0; content_length];
  reader
    .read_exact(&mut body)
    .await
    .context("reading message body")?;
  serde_json::from_slice(&body)
    .context("parsing message body")
    .map(Some)
}

/// Route one incoming message: responses and `requestCompleted` events
/// complete pending entries; everything else fans out as an event.
fn route_message(
  message: Value,
  pending: &Mutex<PendingMap>,
  event_tx: &mpsc::UnboundedSender<TsEvent>,
) {
  match message.get("type").and_then(Value::as_str) {
    Some("response") => {
      let Some(request_seq) =
        message.get("request_seq").and_then(Value::as_u64)
      else {
        return;
      };
      let Some(tx) = pending.lock().remove(&request_seq) else {
        // Cancelled or unknown; the body is discarded.
        return;
      };
      let success = message
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);
      let result = if success {
        Ok(message.get("body").cloned().unwrap_or(Value::Null))
      } else {
        let reason = message
          .get("message")
          .and_then(Value::as_str)
          .unwrap_or("unknown analyzer error");
        Err(anyhow!("{reason}"))
      };
      let _ = tx.send(result);
    }
    Some("event") => {
      let Some(name) = message.get("event").and_then(Value::as_str) else {
        return;
      };
      let body = message.get("body").cloned().unwrap_or(Value::Null);
      // `geterr` has no response; its round completes through this event.
      if name == "requestCompleted" {
        if let Some(request_seq) =
          body.get("request_seq").and_then(Value::as_u64)
        {
          if let Some(tx) = pending.lock().remove(&request_seq) {
            let _ = tx.send(Ok(Value::Null));
          }
        }
        return;
      }
      let _ = event_tx.send(TsEvent {
        name: name.to_string(),
        body,
      });
    }
    _ => {}
  }
}

/// A 1-based analyzer position.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default,
)]
pub struct Location {
  pub line: u64,
  pub offset: u64,
}

impl Location {
  /// The analyzer-side "to the end of the file" sentinel.
  pub const MAX: Location = Location {
    line: MAX_SAFE_INTEGER,
    offset: MAX_SAFE_INTEGER,
  };

  pub fn from_position(position: lsp::Position) -> Self {
    Self {
      line: position.line as u64 + 1,
      offset: position.character as u64 + 1,
    }
  }

  pub fn to_position(self) -> lsp::Position {
    lsp::Position {
      line: self.line.saturating_sub(1).try_into().unwrap_or(u32::MAX),
      character: self.offset.saturating_sub(1).try_into().unwrap_or(u32::MAX),
    }
  }
}

pub fn to_range(start: Location, end: Location) -> lsp::Range {
  lsp::Range {
    start: start.to_position(),
    end: end.to_position(),
  }
}

/// A span in some file, as the analyzer reports definitions and references.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSpan {
  pub file: PathBuf,
  pub start: Location,
  pub end: Location,
}

impl FileSpan {
  pub fn to_location(&self) -> Option<lsp::Location> {
    let uri = path_to_uri(&self.file).ok()?;
    Some(lsp::Location {
      uri,
      range: to_range(self.start, self.end),
    })
  }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SymbolDisplayPart {
  pub text: String,
  pub kind: String,
}

pub fn display_parts_to_string(parts: &[SymbolDisplayPart]) -> String {
  parts.iter().map(|p| p.text.as_str()).collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagText {
  Plain(String),
  Parts(Vec<SymbolDisplayPart>),
}

impl TagText {
  fn as_string(&self) -> String {
    match self {
      Self::Plain(text) => text.clone(),
      Self::Parts(parts) => display_parts_to_string(parts),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsDocTag {
  pub name: String,
  #[serde(default)]
  pub text: Option<TagText>,
}

/// Render JSDoc tags as GitHub-flavored Markdown, one `*@name* text` line
/// per tag.
pub fn tags_to_markdown(tags: &[JsDocTag]) -> String {
  tags
    .iter()
    .map(|tag| match &tag.text {
      Some(text) => format!("*@{}* {}", tag.name, text.as_string()),
      None => format!("*@{}*", tag.name),
    })
    .collect::<Vec<_>>()
    .join("\n")
}

/// Total mapping from the analyzer's script-element kinds to LSP symbol
/// kinds; anything unrecognized is a variable.
pub fn script_element_kind_to_symbol_kind(kind: &str) -> lsp::SymbolKind {
  match kind {
    "module" => lsp::SymbolKind::MODULE,
    "class" | "local class" | "type" => lsp::SymbolKind::CLASS,
    "interface" => lsp::SymbolKind::INTERFACE,
    "enum" => lsp::SymbolKind::ENUM,
    "method" => lsp::SymbolKind::METHOD,
    "property" | "getter" | "setter" => lsp::SymbolKind::PROPERTY,
    "function" | "local function" => lsp::SymbolKind::FUNCTION,
    "constructor" => lsp::SymbolKind::CONSTRUCTOR,
    _ => lsp::SymbolKind::VARIABLE,
  }
}

pub fn script_element_kind_to_completion_kind(
  kind: &str,
) -> lsp::CompletionItemKind {
  match kind {
    "method" | "constructor" => lsp::CompletionItemKind::METHOD,
    "function" | "local function" => lsp::CompletionItemKind::FUNCTION,
    "property" | "getter" | "setter" => lsp::CompletionItemKind::FIELD,
    "class" | "local class" => lsp::CompletionItemKind::CLASS,
    "interface" => lsp::CompletionItemKind::INTERFACE,
    "enum" => lsp::CompletionItemKind::ENUM,
    "module" | "external module name" => lsp::CompletionItemKind::MODULE,
    "keyword" => lsp::CompletionItemKind::KEYWORD,
    "directory" | "script" => lsp::CompletionItemKind::FILE,
    _ => lsp::CompletionItemKind::VARIABLE,
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickInfo {
  pub start: Location,
  pub end: Location,
  #[serde(default)]
  pub display_string: String,
  #[serde(default)]
  pub documentation: String,
  #[serde(default)]
  pub tags: Vec<JsDocTag>,
}

impl QuickInfo {
  pub fn to_hover(&self) -> lsp::Hover {
    let mut value =
      format!("```typescript\n{}\n```", self.display_string.trim_end());
    if !self.documentation.is_empty() {
      value.push('\n');
      value.push_str(&self.documentation);
    }
    if !self.tags.is_empty() {
      value.push_str("\n\n");
      value.push_str(&tags_to_markdown(&self.tags));
    }
    lsp::Hover {
      contents: lsp::HoverContents::Markup(lsp::MarkupContent {
        kind: lsp::MarkupKind::Markdown,
        value,
      }),
      range: Some(to_range(self.start, self.end)),
    }
  }
}

/// The originating tuple a completion item carries through resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionItemData {
  pub file: PathBuf,
  pub line: u64,
  pub offset: u64,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEntry {
  pub name: String,
  #[serde(default)]
  pub kind: String,
  #[serde(default)]
  pub sort_text: Option<String>,
  #[serde(default)]
  pub insert_text: Option<String>,
  #[serde(default)]
  pub source: Option<String>,
}

impl CompletionEntry {
  pub fn to_completion_item(
    &self,
    file: &Path,
    location: Location,
  ) -> lsp::CompletionItem {
    let data = CompletionItemData {
      file: file.to_path_buf(),
      line: location.line,
      offset: location.offset,
      name: self.name.clone(),
      source: self.source.clone(),
    };
    lsp::CompletionItem {
      label: self.name.clone(),
      kind: Some(script_element_kind_to_completion_kind(&self.kind)),
      sort_text: self.sort_text.clone(),
      insert_text: self.insert_text.clone(),
      data: Some(json!(data)),
      ..Default::default()
    }
  }
}

/// One workspace file's worth of analyzer text edits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeEdit {
  pub start: Location,
  pub end: Location,
  pub new_text: String,
}

impl CodeEdit {
  pub fn to_text_edit(&self) -> lsp::TextEdit {
    lsp::TextEdit {
      range: to_range(self.start, self.end),
      new_text: self.new_text.clone(),
    }
  }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCodeEdits {
  pub file_name: PathBuf,
  pub text_changes: Vec<CodeEdit>,
}

/// A code action attached to a completion detail or quick fix.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeAction {
  pub description: String,
  #[serde(default)]
  pub changes: Vec<FileCodeEdits>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub commands: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEntryDetails {
  pub name: String,
  #[serde(default)]
  pub display_parts: Vec<SymbolDisplayPart>,
  #[serde(default)]
  pub documentation: Vec<SymbolDisplayPart>,
  #[serde(default)]
  pub tags: Vec<JsDocTag>,
  #[serde(default)]
  pub code_actions: Option<Vec<CodeAction>>,
}

impl CompletionEntryDetails {
  /// Fill in the detail, documentation, and any attached code-action edits
  /// on a previously returned completion item.
  pub fn apply_to_item(
    &self,
    data: &CompletionItemData,
    item: &mut lsp::CompletionItem,
  ) {
    let detail = display_parts_to_string(&self.display_parts);
    if !detail.is_empty() {
      item.detail = Some(detail);
    }
    let mut documentation = display_parts_to_string(&self.documentation);
    if !self.tags.is_empty() {
      if !documentation.is_empty() {
        documentation.push_str("\n\n");
      }
      documentation.push_str(&tags_to_markdown(&self.tags));
    }
    if !documentation.is_empty() {
      item.documentation = Some(lsp::Documentation::MarkupContent(
        lsp::MarkupContent {
          kind: lsp::MarkupKind::Markdown,
          value: documentation,
        },
      ));
    }
    let Some(actions) = self.code_actions.as_deref().filter(|a| !a.is_empty())
    else {
      return;
    };
    // Edits to the completing file apply directly; everything else rides
    // along in the follow-up command the editor executes.
    let edits: Vec<lsp::TextEdit> = actions
      .iter()
      .flat_map(|action| &action.changes)
      .filter(|change| change.file_name == data.file)
      .flat_map(|change| &change.text_changes)
      .map(CodeEdit::to_text_edit)
      .collect();
    if !edits.is_empty() {
      item.additional_text_edits = Some(edits);
    }
    let title = actions
      .iter()
      .map(|action| action.description.as_str())
      .collect::<Vec<_>>()
      .join("; ");
    item.command = Some(lsp::Command {
      title,
      command: super::lsp_custom::APPLY_COMPLETION_CODE_ACTION_COMMAND
        .to_string(),
      arguments: Some(vec![json!(data.file), json!(actions)]),
    });
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationTree {
  pub text: String,
  pub kind: String,
  #[serde(default)]
  pub spans: Vec<Span>,
  #[serde(default)]
  pub child_items: Vec<NavigationTree>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Span {
  pub start: Location,
  pub end: Location,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavtoItem {
  pub name: String,
  #[serde(default)]
  pub kind: String,
  pub file: PathBuf,
  pub start: Location,
  pub end: Location,
  #[serde(default)]
  pub container_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightSpan {
  pub start: Location,
  pub end: Location,
  #[serde(default)]
  pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentHighlightsItem {
  pub file: PathBuf,
  #[serde(default)]
  pub highlight_spans: Vec<HighlightSpan>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureHelpParameter {
  #[serde(default)]
  pub display_parts: Vec<SymbolDisplayPart>,
  #[serde(default)]
  pub documentation: Vec<SymbolDisplayPart>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureHelpItem {
  #[serde(default)]
  pub prefix_display_parts: Vec<SymbolDisplayPart>,
  #[serde(default)]
  pub suffix_display_parts: Vec<SymbolDisplayPart>,
  #[serde(default)]
  pub separator_display_parts: Vec<SymbolDisplayPart>,
  #[serde(default)]
  pub parameters: Vec<SignatureHelpParameter>,
  #[serde(default)]
  pub documentation: Vec<SymbolDisplayPart>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureHelpItems {
  pub items: Vec<SignatureHelpItem>,
  #[serde(default)]
  pub selected_item_index: u32,
  #[serde(default)]
  pub argument_index: u32,
}

impl SignatureHelpItems {
  pub fn to_signature_help(&self) -> lsp::SignatureHelp {
    lsp::SignatureHelp {
      signatures: self
        .items
        .iter()
        .map(|item| {
          let prefix = display_parts_to_string(&item.prefix_display_parts);
          let separator =
            display_parts_to_string(&item.separator_display_parts);
          let suffix = display_parts_to_string(&item.suffix_display_parts);
          let parameters: Vec<String> = item
            .parameters
            .iter()
            .map(|p| display_parts_to_string(&p.display_parts))
            .collect();
          let label =
            format!("{}{}{}", prefix, parameters.join(&separator), suffix);
          lsp::SignatureInformation {
            label,
            documentation: documentation_value(&item.documentation),
            parameters: Some(
              item
                .parameters
                .iter()
                .zip(parameters)
                .map(|(parameter, label)| lsp::ParameterInformation {
                  label: lsp::ParameterLabel::Simple(label),
                  documentation: documentation_value(&parameter.documentation),
                })
                .collect(),
            ),
            active_parameter: None,
          }
        })
        .collect(),
      active_signature: Some(self.selected_item_index),
      active_parameter: Some(self.argument_index),
    }
  }
}

fn documentation_value(
  parts: &[SymbolDisplayPart],
) -> Option<lsp::Documentation> {
  let text = display_parts_to_string(parts);
  if text.is_empty() {
    return None;
  }
  Some(lsp::Documentation::MarkupContent(lsp::MarkupContent {
    kind: lsp::MarkupKind::Markdown,
    value: text,
  }))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameInfo {
  pub can_rename: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameLocationSpan {
  pub start: Location,
  pub end: Location,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanGroup {
  pub file: PathBuf,
  #[serde(default)]
  pub locs: Vec<RenameLocationSpan>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameResponseBody {
  pub info: RenameInfo,
  #[serde(default)]
  pub locs: Vec<SpanGroup>,
}

impl RenameResponseBody {
  /// Group the rename spans per file into one LSP workspace edit. `None`
  /// when the symbol cannot be renamed or nothing would change.
  pub fn to_workspace_edit(&self, new_name: &str) -> Option<lsp::WorkspaceEdit> {
    if !self.info.can_rename || self.locs.is_empty() {
      return None;
    }
    let mut changes = HashMap::<lsp::Url, Vec<lsp::TextEdit>>::new();
    for group in &self.locs {
      let Ok(uri) = path_to_uri(&group.file) else {
        continue;
      };
      let edits = changes.entry(uri).or_default();
      for loc in &group.locs {
        edits.push(lsp::TextEdit {
          range: to_range(loc.start, loc.end),
          new_text: new_name.to_string(),
        });
      }
    }
    Some(lsp::WorkspaceEdit {
      changes: Some(changes),
      ..Default::default()
    })
  }
}

/// Collect per-file analyzer edits into one workspace edit; files whose
/// paths cannot become URIs are skipped.
pub fn file_code_edits_to_workspace_edit(
  edits: &[FileCodeEdits],
) -> Option<lsp::WorkspaceEdit> {
  let mut changes = HashMap::<lsp::Url, Vec<lsp::TextEdit>>::new();
  for file_edit in edits {
    let Ok(uri) = path_to_uri(&file_edit.file_name) else {
      lsp_warn!(
        "dropping edits for unaddressable file \"{}\"",
        file_edit.file_name.display()
      );
      continue;
    };
    changes
      .entry(uri)
      .or_default()
      .extend(file_edit.text_changes.iter().map(CodeEdit::to_text_edit));
  }
  if changes.is_empty() {
    return None;
  }
  Some(lsp::WorkspaceEdit {
    changes: Some(changes),
    ..Default::default()
  })
}

impl DocumentHighlightsItem {
  pub fn to_highlights(&self) -> Vec<lsp::DocumentHighlight> {
    self
      .highlight_spans
      .iter()
      .map(|span| lsp::DocumentHighlight {
        range: to_range(span.start, span.end),
        kind: Some(match span.kind.as_str() {
          "writtenReference" => lsp::DocumentHighlightKind::WRITE,
          _ => lsp::DocumentHighlightKind::READ,
        }),
      })
      .collect()
  }
}

impl NavtoItem {
  pub fn to_symbol_information(&self) -> Option<lsp::SymbolInformation> {
    let uri = path_to_uri(&self.file).ok()?;
    #[allow(deprecated)]
    Some(lsp::SymbolInformation {
      name: self.name.clone(),
      kind: script_element_kind_to_symbol_kind(&self.kind),
      tags: None,
      deprecated: None,
      location: lsp::Location {
        uri,
        range: to_range(self.start, self.end),
      },
      container_name: self.container_name.clone(),
    })
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceEntry {
  pub file: PathBuf,
  pub start: Location,
  pub end: Location,
  #[serde(default)]
  pub is_definition: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencesResponseBody {
  #[serde(default)]
  pub refs: Vec<ReferenceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicableRefactorAction {
  pub name: String,
  pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicableRefactorInfo {
  pub name: String,
  pub description: String,
  #[serde(default)]
  pub actions: Vec<ApplicableRefactorAction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefactorEditInfo {
  #[serde(default)]
  pub edits: Vec<FileCodeEdits>,
  #[serde(default)]
  pub rename_location: Option<Location>,
  #[serde(default)]
  pub rename_filename: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutliningSpan {
  pub text_span: Span,
  #[serde(default)]
  pub kind: String,
}

static ENDREGION_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)^\s*//\s*#endregion").unwrap());

impl OutliningSpan {
  /// Convert to an LSP folding range, with two corrections: a comment span
  /// sitting on an `// #endregion` line is dropped, and a span that ends
  /// right after a `}` is shortened one line so the brace stays visible
  /// when folded.
  pub fn to_folding_range(
    &self,
    document: &Document,
  ) -> Option<lsp::FoldingRange> {
    let range = to_range(self.text_span.start, self.text_span.end);
    let kind = self.folding_range_kind();
    if kind == Some(lsp::FoldingRangeKind::Comment)
      && ENDREGION_RE.is_match(document.line_text(range.start.line))
    {
      return None;
    }
    let mut end_line = range.end.line;
    if document.char_before(range.end) == Some('}') {
      end_line = end_line.saturating_sub(1).max(range.start.line);
    }
    Some(lsp::FoldingRange {
      start_line: range.start.line,
      start_character: Some(range.start.character),
      end_line,
      end_character: None,
      kind,
      collapsed_text: None,
    })
  }

  fn folding_range_kind(&self) -> Option<lsp::FoldingRangeKind> {
    match self.kind.as_str() {
      "comment" => Some(lsp::FoldingRangeKind::Comment),
      "region" => Some(lsp::FoldingRangeKind::Region),
      "imports" => Some(lsp::FoldingRangeKind::Imports),
      _ => None,
    }
  }
}

/// One analyzer diagnostic as carried by the `syntaxDiag`, `semanticDiag`
/// and `suggestionDiag` events.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsDiagnostic {
  pub start: Location,
  pub end: Location,
  pub text: String,
  #[serde(default)]
  pub code: Option<i64>,
  #[serde(default)]
  pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticEventBody {
  pub file: PathBuf,
  #[serde(default)]
  pub diagnostics: Vec<TsDiagnostic>,
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::lsp::documents::LanguageId;
  use url::Url;

  fn document(text: &str) -> Document {
    Document::new(
      Url::parse("file:///a/b.ts").unwrap(),
      LanguageId::TypeScript,
      1,
      text.to_string(),
    )
  }

  #[test]
  fn outgoing_messages_are_single_lines() {
    let line = encode_message(
      7,
      "open",
      json!({ "file": "/a/b.ts", "fileContent": "let x;\n" }),
    );
    assert!(line.ends_with('\n'));
    assert_eq!(line.matches('\n').count(), 1);
    let value: Value = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(value["seq"], 7);
    assert_eq!(value["type"], "request");
    assert_eq!(value["command"], "open");
  }

  #[tokio::test]
  async fn read_framed_message() {
    let body = r#"{"seq":1,"type":"event","event":"typingsInstallerPid"}"#;
    let framed = format!("Content-Length: {}\r\n\r\n{body}", body.len());
    let mut reader = BufReader::new(framed.as_bytes());
    let message = read_message(&mut reader).await.unwrap().unwrap();
    assert_eq!(message["event"], "typingsInstallerPid");
    assert!(read_message(&mut reader).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn read_header_case_insensitive() {
    let body = r#"{"seq":1}"#;
    let framed = format!("content-length: {}\r\n\r\n{body}", body.len());
    let mut reader = BufReader::new(framed.as_bytes());
    assert!(read_message(&mut reader).await.unwrap().is_some());
  }

  #[tokio::test]
  async fn read_eof_inside_header_is_error() {
    let mut reader = BufReader::new(&b"Content-Length: 10\r\n"[..]);
    assert!(read_message(&mut reader).await.is_err());
  }

  #[tokio::test]
  async fn read_missing_content_length_is_error() {
    let mut reader =
      BufReader::new(&b"Content-Type: application/json\r\n\r\n{}"[..]);
    assert!(read_message(&mut reader).await.is_err());
  }

  #[test]
  fn route_response_completes_pending() {
    let pending: Mutex<PendingMap> = Mutex::default();
    let (event_tx, _event_rx) = mpsc::unbounded_channel();
    let (tx, mut rx) = oneshot::channel();
    pending.lock().insert(3, tx);
    route_message(
      json!({
        "type": "response",
        "request_seq": 3,
        "success": true,
        "body": { "answer": 42 },
      }),
      &pending,
      &event_tx,
    );
    let body = rx.try_recv().unwrap().unwrap();
    assert_eq!(body["answer"], 42);
    assert!(pending.lock().is_empty());
  }

  #[test]
  fn route_failure_carries_message() {
    let pending: Mutex<PendingMap> = Mutex::default();
    let (event_tx, _event_rx) = mpsc::unbounded_channel();
    let (tx, mut rx) = oneshot::channel();
    pending.lock().insert(3, tx);
    route_message(
      json!({
        "type": "response",
        "request_seq": 3,
        "success": false,
        "message": "No content available.",
      }),
      &pending,
      &event_tx,
    );
    let err = rx.try_recv().unwrap().unwrap_err();
    assert!(err.to_string().contains("No content available."));
  }

  #[test]
  fn route_request_completed_finishes_geterr() {
    let pending: Mutex<PendingMap> = Mutex::default();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (tx, mut rx) = oneshot::channel();
    pending.lock().insert(9, tx);
    route_message(
      json!({
        "type": "event",
        "event": "requestCompleted",
        "body": { "request_seq": 9 },
      }),
      &pending,
      &event_tx,
    );
    assert!(rx.try_recv().unwrap().is_ok());
    assert!(event_rx.try_recv().is_err());
  }

  #[test]
  fn route_event_fans_out() {
    let pending: Mutex<PendingMap> = Mutex::default();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    route_message(
      json!({
        "type": "event",
        "event": "semanticDiag",
        "body": { "file": "/a/b.ts", "diagnostics": [] },
      }),
      &pending,
      &event_tx,
    );
    let event = event_rx.try_recv().unwrap();
    assert_eq!(event.name, "semanticDiag");
    assert_eq!(event.body["file"], "/a/b.ts");
  }

  #[test]
  fn location_conversion() {
    let position = lsp::Position {
      line: 0,
      character: 4,
    };
    let location = Location::from_position(position);
    assert_eq!(location, Location { line: 1, offset: 5 });
    assert_eq!(location.to_position(), position);
  }

  #[test]
  fn geterr_arguments_keep_file_order() {
    let request = TsRequest::Geterr {
      files: vec![PathBuf::from("/b.ts"), PathBuf::from("/a.ts")],
      delay: 0,
    };
    assert_eq!(
      request.arguments(),
      json!({ "delay": 0, "files": ["/b.ts", "/a.ts"] })
    );
  }

  #[test]
  fn change_arguments_are_one_based() {
    let notification = TsNotification::Change {
      file: PathBuf::from("/a.ts"),
      start: Location { line: 2, offset: 1 },
      end: Location { line: 2, offset: 4 },
      insert_string: "foo".to_string(),
    };
    assert_eq!(
      notification.arguments(),
      json!({
        "file": "/a.ts",
        "line": 2,
        "offset": 1,
        "endLine": 2,
        "endOffset": 4,
        "insertString": "foo",
      })
    );
  }

  #[test]
  fn symbol_kind_mapping_is_total() {
    assert_eq!(
      script_element_kind_to_symbol_kind("class"),
      lsp::SymbolKind::CLASS
    );
    assert_eq!(
      script_element_kind_to_symbol_kind("constructor"),
      lsp::SymbolKind::CONSTRUCTOR
    );
    assert_eq!(
      script_element_kind_to_symbol_kind("some future kind"),
      lsp::SymbolKind::VARIABLE
    );
  }

  #[test]
  fn tags_render_one_per_line() {
    let tags = vec![
      JsDocTag {
        name: "param".to_string(),
        text: Some(TagText::Plain("x the input".to_string())),
      },
      JsDocTag {
        name: "deprecated".to_string(),
        text: None,
      },
    ];
    assert_eq!(
      tags_to_markdown(&tags),
      "*@param* x the input\n*@deprecated*"
    );
  }

  #[test]
  fn quick_info_to_hover() {
    let info = QuickInfo {
      start: Location { line: 1, offset: 5 },
      end: Location { line: 1, offset: 6 },
      display_string: "let x: number".to_string(),
      documentation: "A counter.".to_string(),
      tags: Vec::new(),
    };
    let hover = info.to_hover();
    let lsp::HoverContents::Markup(content) = hover.contents else {
      panic!("expected markup contents");
    };
    assert_eq!(content.value, "```typescript\nlet x: number\n```\nA counter.");
    assert_eq!(
      hover.range.unwrap(),
      lsp::Range {
        start: lsp::Position {
          line: 0,
          character: 4
        },
        end: lsp::Position {
          line: 0,
          character: 5
        },
      }
    );
  }

  #[test]
  fn completion_item_data_round_trip() {
    let entry = CompletionEntry {
      name: "concat".to_string(),
      kind: "method".to_string(),
      sort_text: Some("11".to_string()),
      insert_text: None,
      source: Some("./util".to_string()),
    };
    let item = entry
      .to_completion_item(Path::new("/a.ts"), Location { line: 3, offset: 7 });
    assert_eq!(item.label, "concat");
    assert_eq!(item.kind, Some(lsp::CompletionItemKind::METHOD));
    assert_eq!(item.sort_text.as_deref(), Some("11"));
    let data: CompletionItemData =
      serde_json::from_value(item.data.unwrap()).unwrap();
    assert_eq!(
      data,
      CompletionItemData {
        file: PathBuf::from("/a.ts"),
        line: 3,
        offset: 7,
        name: "concat".to_string(),
        source: Some("./util".to_string()),
      }
    );
  }

  #[test]
  fn folding_drops_endregion_comment() {
    let d = document("// #endregion\nlet x = 1;\n");
    let span = OutliningSpan {
      text_span: Span {
        start: Location { line: 1, offset: 1 },
        end: Location {
          line: 1,
          offset: 14,
        },
      },
      kind: "comment".to_string(),
    };
    assert!(span.to_folding_range(&d).is_none());
  }

  #[test]
  fn folding_keeps_closing_brace_visible() {
    let d = document("function f() {\n  return 1;\n}\n");
    let span = OutliningSpan {
      text_span: Span {
        start: Location {
          line: 1,
          offset: 14,
        },
        end: Location { line: 3, offset: 2 },
      },
      kind: "code".to_string(),
    };
    let range = span.to_folding_range(&d).unwrap();
    assert_eq!(range.start_line, 0);
    assert_eq!(range.end_line, 1);
    assert_eq!(range.kind, None);
  }

  #[test]
  fn folding_end_line_never_precedes_start() {
    let d = document("{}\n");
    let span = OutliningSpan {
      text_span: Span {
        start: Location { line: 1, offset: 1 },
        end: Location { line: 1, offset: 3 },
      },
      kind: "code".to_string(),
    };
    let range = span.to_folding_range(&d).unwrap();
    assert_eq!(range.start_line, 0);
    assert_eq!(range.end_line, 0);
  }

  #[test]
  fn find_tsserver_prefers_explicit_path() {
    let explicit = PathBuf::from("/opt/tsserver");
    assert_eq!(
      find_tsserver(None, Some(&explicit)),
      Some(PathBuf::from("/opt/tsserver"))
    );
  }

  #[test]
  fn find_tsserver_workspace_install() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("node_modules").join(".bin");
    std::fs::create_dir_all(&bin).unwrap();
    let exe_name = if cfg!(windows) {
      "tsserver.cmd"
    } else {
      "tsserver"
    };
    let exe = bin.join(exe_name);
    std::fs::write(&exe, "").unwrap();
    assert_eq!(find_tsserver(Some(dir.path()), None), Some(exe));
  }
}
