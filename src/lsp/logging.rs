// Copyright 2026 the tsls authors. MIT license.

macro_rules! lsp_log {
  ($($arg:tt)+) => (
    log::info!(target: "tsls::lsp", $($arg)+)
  );
}

macro_rules! lsp_warn {
  ($($arg:tt)+) => (
    log::warn!(target: "tsls::lsp", $($arg)+)
  );
}

pub(crate) use lsp_log;
pub(crate) use lsp_warn;
