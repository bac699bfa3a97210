//! Terminal output for the trellis commands.
//!
//! Text output is colored when the stream supports it; `--format json` prints
//! the library's report types as pretty JSON instead.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use trellis_lib::Address;
use trellis_lib::project::TargetSummary;
use trellis_lib::tailor::AddedTarget;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const WRITTEN: &str = "✓";
  pub const PENDING: &str = "~";
  pub const ADD: &str = "+";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    format!("{}m {}s", secs / 60, secs % 60)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

/// One BUILD file that tailor created or updated, or would with `--check`.
pub fn print_build_file(verb: &str, path: &str, pending: bool) {
  let symbol = if pending {
    symbols::PENDING.if_supports_color(Stream::Stdout, |s| s.yellow()).to_string()
  } else {
    symbols::WRITTEN.if_supports_color(Stream::Stdout, |s| s.green()).to_string()
  };
  println!("{symbol} {verb} {}", path.if_supports_color(Stream::Stdout, |s| s.bold()));
}

pub fn print_added_target(added: &AddedTarget) {
  println!(
    "  {} {}(name=\"{}\")",
    symbols::ADD.if_supports_color(Stream::Stdout, |s| s.green()),
    added.type_alias,
    added.name
  );
}

/// Targets as an address column followed by the dimmed type alias.
pub fn print_targets(targets: &[TargetSummary]) {
  let width = targets.iter().map(|t| t.address.len()).max().unwrap_or(0);
  for target in targets {
    println!(
      "{:width$}  {}",
      target.address,
      target.type_alias.if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }
}

pub fn print_addresses(addresses: &[Address]) {
  for address in addresses {
    println!("{}", address.spec());
  }
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_duration(duration: Duration) {
  println!(
    "  {}: {}",
    "Duration".if_supports_color(Stream::Stdout, |s| s.dimmed()),
    format_duration(duration)
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{json}");
  Ok(())
}
