// Copyright 2026 the tsls authors. MIT license.

use std::path::Path;
use std::path::PathBuf;

use once_cell::sync::OnceCell;
use serde_json::json;
use serde_json::Value;
use tower_lsp::lsp_types as lsp;

use super::logging::lsp_warn;
use super::urls::uri_to_path;

const FMT_SETTINGS_FILE: &str = "tsfmt.json";

/// Workspace-level configuration resolved at initialize time, plus the
/// lazily loaded formatting-settings file.
#[derive(Debug, Default)]
pub struct Config {
  root_path: Option<PathBuf>,
  fmt_settings: OnceCell<Option<Value>>,
}

impl Config {
  pub fn set_root(&mut self, params: &lsp::InitializeParams) {
    #[allow(deprecated)]
    let root_uri = params.root_uri.clone();
    #[allow(deprecated)]
    let root_path = params.root_path.clone();
    self.root_path = root_uri
      .as_ref()
      .and_then(uri_to_path)
      .or(root_path.map(PathBuf::from));
  }

  pub fn root_path(&self) -> Option<&Path> {
    self.root_path.as_deref()
  }

  /// The analyzer format settings for a request. A parseable
  /// `<root>/tsfmt.json` replaces the client-provided options outright;
  /// this matches the long-standing behavior editors depend on, even
  /// though it discards `tabSize`/`insertSpaces` from the request.
  pub fn format_options(&self, options: &lsp::FormattingOptions) -> Value {
    let from_file = self
      .fmt_settings
      .get_or_init(|| self.root_path.as_deref().and_then(load_fmt_settings));
    if let Some(settings) = from_file {
      return settings.clone();
    }
    json!({
      "tabSize": options.tab_size,
      "indentSize": options.tab_size,
      "convertTabsToSpaces": options.insert_spaces,
      "newLineCharacter": "\n",
    })
  }
}

fn load_fmt_settings(root: &Path) -> Option<Value> {
  let path = root.join(FMT_SETTINGS_FILE);
  let contents = std::fs::read_to_string(&path).ok()?;
  match serde_json::from_str(&contents) {
    Ok(value) => Some(value),
    Err(err) => {
      lsp_warn!("ignoring malformed \"{}\": {:#}", path.display(), err);
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use url::Url;

  use super::*;

  fn formatting_options() -> lsp::FormattingOptions {
    lsp::FormattingOptions {
      tab_size: 4,
      insert_spaces: true,
      ..Default::default()
    }
  }

  #[allow(deprecated)]
  fn config_with_root(root: &Path) -> Config {
    let mut config = Config::default();
    config.set_root(&lsp::InitializeParams {
      root_uri: Some(Url::from_directory_path(root).unwrap()),
      ..Default::default()
    });
    config
  }

  #[test]
  fn options_from_request_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_root(dir.path());
    let options = config.format_options(&formatting_options());
    assert_eq!(options["tabSize"], 4);
    assert_eq!(options["convertTabsToSpaces"], true);
  }

  #[test]
  fn settings_file_replaces_request_options() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
      dir.path().join(FMT_SETTINGS_FILE),
      r#"{ "indentSize": 2, "convertTabsToSpaces": false }"#,
    )
    .unwrap();
    let config = config_with_root(dir.path());
    let options = config.format_options(&formatting_options());
    assert_eq!(options["indentSize"], 2);
    assert_eq!(options["convertTabsToSpaces"], false);
    assert_eq!(options.get("tabSize"), None);
  }

  #[test]
  fn malformed_settings_file_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(FMT_SETTINGS_FILE), "{ not json").unwrap();
    let config = config_with_root(dir.path());
    let options = config.format_options(&formatting_options());
    assert_eq!(options["tabSize"], 4);
  }

  #[test]
  #[allow(deprecated)]
  fn root_path_from_uri() {
    let mut config = Config::default();
    config.set_root(&lsp::InitializeParams {
      root_uri: Some(Url::parse("file:///work/project").unwrap()),
      ..Default::default()
    });
    assert_eq!(config.root_path(), Some(Path::new("/work/project")));
  }
}
