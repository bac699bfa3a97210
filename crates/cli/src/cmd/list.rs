use anyhow::{Context, Result};

use trellis_lib::project::Project;

use crate::output::{OutputFormat, print_info, print_json, print_targets};

pub fn cmd_list(project: &Project, dirs: &[String], format: OutputFormat) -> Result<()> {
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let targets = rt.block_on(project.list(dirs)).context("Failed to load targets")?;

  if format.is_json() {
    print_json(&targets)?;
  } else if targets.is_empty() {
    print_info("No targets found");
  } else {
    print_targets(&targets);
  }

  Ok(())
}
