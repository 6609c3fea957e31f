// Copyright 2026 the tsls authors. MIT license.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::value_parser;
use clap::Arg;
use clap::ArgMatches;
use clap::Command;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
  /// Explicit analyzer executable; skips discovery when set.
  pub tsserver_path: Option<PathBuf>,
  pub tsserver_log_file: Option<PathBuf>,
  pub tsserver_log_verbosity: Option<String>,
  pub log_level: Option<log::LevelFilter>,
}

impl Flags {
  /// The pass-through arguments for the analyzer subprocess.
  pub fn tsserver_args(&self) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(file) = &self.tsserver_log_file {
      args.push("--logFile".to_string());
      args.push(file.display().to_string());
    }
    if let Some(verbosity) = &self.tsserver_log_verbosity {
      args.push("--logVerbosity".to_string());
      args.push(verbosity.clone());
    }
    args
  }
}

pub fn flags_from_vec(args: Vec<OsString>) -> Result<Flags, clap::Error> {
  let matches = clap_root().try_get_matches_from(args)?;
  Ok(flags_from_matches(&matches))
}

fn clap_root() -> Command {
  Command::new("tsls")
    .bin_name("tsls")
    .version(env!("CARGO_PKG_VERSION"))
    .about(
      "A Language Server Protocol front-end for TypeScript and JavaScript, \
       backed by tsserver. Speaks LSP over stdio.",
    )
    .arg(
      Arg::new("tsserver-path")
        .long("tsserver-path")
        .value_name("PATH")
        .value_parser(value_parser!(PathBuf))
        .help("Path to the tsserver executable"),
    )
    .arg(
      Arg::new("tsserver-log-file")
        .long("tsserver-log-file")
        .value_name("PATH")
        .value_parser(value_parser!(PathBuf))
        .help("Write the analyzer's own log to this file"),
    )
    .arg(
      Arg::new("tsserver-log-verbosity")
        .long("tsserver-log-verbosity")
        .value_name("LEVEL")
        .value_parser(["terse", "normal", "requestTime", "verbose"])
        .help("Analyzer log verbosity, passed through unchanged"),
    )
    .arg(
      Arg::new("log-level")
        .long("log-level")
        .value_name("LEVEL")
        .value_parser(["error", "warn", "info", "debug", "trace"])
        .help("Set the server log level"),
    )
}

fn flags_from_matches(matches: &ArgMatches) -> Flags {
  Flags {
    tsserver_path: matches.get_one::<PathBuf>("tsserver-path").cloned(),
    tsserver_log_file: matches.get_one::<PathBuf>("tsserver-log-file").cloned(),
    tsserver_log_verbosity: matches
      .get_one::<String>("tsserver-log-verbosity")
      .cloned(),
    log_level: matches.get_one::<String>("log-level").map(|level| {
      match level.as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
      }
    }),
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn parse(args: &[&str]) -> Flags {
    let args = std::iter::once("tsls")
      .chain(args.iter().copied())
      .map(OsString::from)
      .collect();
    flags_from_vec(args).unwrap()
  }

  #[test]
  fn defaults() {
    assert_eq!(parse(&[]), Flags::default());
  }

  #[test]
  fn tsserver_flags() {
    let flags = parse(&[
      "--tsserver-path",
      "/opt/bin/tsserver",
      "--tsserver-log-file",
      "/tmp/tsserver.log",
      "--tsserver-log-verbosity",
      "verbose",
    ]);
    assert_eq!(
      flags.tsserver_path,
      Some(PathBuf::from("/opt/bin/tsserver"))
    );
    assert_eq!(
      flags.tsserver_args(),
      vec![
        "--logFile",
        "/tmp/tsserver.log",
        "--logVerbosity",
        "verbose",
      ]
    );
  }

  #[test]
  fn log_level() {
    assert_eq!(
      parse(&["--log-level", "debug"]).log_level,
      Some(log::LevelFilter::Debug)
    );
  }

  #[test]
  fn rejects_unknown_verbosity() {
    let args = vec![
      OsString::from("tsls"),
      OsString::from("--tsserver-log-verbosity"),
      OsString::from("shouty"),
    ];
    assert!(flags_from_vec(args).is_err());
  }
}
