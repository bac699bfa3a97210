//! Implementation of the `trellis tailor` command.
//!
//! Proposes targets for unowned files and writes them into BUILD files, or with
//! `--check` only reports what would change.

use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Args;

use trellis_lib::project::Project;
use trellis_lib::tailor::{TailorOptions, TailorReport};

use crate::output::{
  OutputFormat, print_added_target, print_build_file, print_duration, print_info, print_json, print_warning,
};

#[derive(Debug, Args)]
pub struct TailorArgs {
  /// Directories to search (default: the whole repository)
  pub dirs: Vec<String>,

  /// Name of the BUILD files to create
  #[arg(long)]
  pub build_file_name: Option<String>,

  /// Header for newly created BUILD files
  #[arg(long)]
  pub build_file_header: Option<String>,

  /// Indentation inside generated targets
  #[arg(long)]
  pub build_file_indent: Option<String>,

  /// Write CUSTOM instead of the standard alias STD (repeatable)
  #[arg(long = "alias", value_name = "STD=CUSTOM")]
  pub aliases: Vec<String>,

  /// Only report what would change; exit 1 if anything would
  #[arg(long)]
  pub check: bool,

  /// Output format
  #[arg(long, value_enum, default_value_t)]
  pub format: OutputFormat,
}

impl TailorArgs {
  /// Configured options with command-line overrides applied.
  pub fn options(&self, configured: &TailorOptions) -> Result<TailorOptions> {
    let mut options = configured.clone();
    if let Some(name) = &self.build_file_name {
      options.build_file_name = name.clone();
    }
    if let Some(header) = &self.build_file_header {
      options.build_file_header = header.clone();
    }
    if let Some(indent) = &self.build_file_indent {
      options.build_file_indent = indent.clone();
    }
    for alias in &self.aliases {
      let Some((standard, custom)) = alias.split_once('=') else {
        bail!("Invalid --alias '{alias}', expected STD=CUSTOM");
      };
      options.alias_mapping.insert(standard.to_string(), custom.to_string());
    }
    options.validate().context("Invalid tailor options")?;
    Ok(options)
  }
}

pub fn cmd_tailor(project: &Project, args: TailorArgs) -> Result<ExitCode> {
  let start = Instant::now();
  let options = project.config().tailor.clone();

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt
    .block_on(project.tailor(&args.dirs, options, !args.check))
    .context("Tailor failed")?;

  if args.format.is_json() {
    print_json(&report)?;
  } else {
    print_report(&report, args.check);
    print_duration(start.elapsed());
  }

  if args.check && report.has_changes() {
    return Ok(ExitCode::FAILURE);
  }
  Ok(ExitCode::SUCCESS)
}

fn print_report(report: &TailorReport, check: bool) {
  if !report.has_changes() {
    print_info("No new targets to add");
    return;
  }

  let (created, updated) = if check {
    ("Would create", "Would update")
  } else {
    ("Created", "Updated")
  };
  for path in &report.created {
    print_build_file(created, path, check);
    print_added(report, path);
  }
  for path in &report.updated {
    print_build_file(updated, path, check);
    print_added(report, path);
  }
  if check {
    print_warning("BUILD files are missing targets; run `trellis tailor` to add them");
  }
}

fn print_added(report: &TailorReport, build_file: &str) {
  for added in report.added.iter().filter(|a| a.build_file == build_file) {
    print_added_target(added);
  }
}
