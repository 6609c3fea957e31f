// Copyright 2026 the tsls authors. MIT license.

use std::env;

use anyhow::Error as AnyError;

use tsls::flags::flags_from_vec;
use tsls::flags::Flags;
use tsls::lsp;

fn init_logger(flags: &Flags) {
  let mut builder = env_logger::Builder::from_env(
    env_logger::Env::default().default_filter_or("info"),
  );
  if let Some(level) = flags.log_level {
    builder.filter_level(level);
  }
  // stdout carries the protocol; everything else goes to stderr.
  builder.target(env_logger::Target::Stderr).init();
}

fn main() -> Result<(), AnyError> {
  let flags = match flags_from_vec(env::args_os().collect()) {
    Ok(flags) => flags,
    Err(err) => err.exit(),
  };
  init_logger(&flags);

  let runtime = tokio::runtime::Builder::new_multi_thread()
    .enable_all()
    .build()?;
  runtime.block_on(lsp::start(flags))
}
