use anyhow::{Context, Result};

use trellis_lib::project::Project;

use crate::output::{OutputFormat, print_addresses, print_info, print_json};

pub fn cmd_dependencies(project: &Project, address: &str, format: OutputFormat) -> Result<()> {
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let dependencies = rt
    .block_on(project.dependencies(address))
    .with_context(|| format!("Failed to resolve dependencies of {address}"))?;

  if format.is_json() {
    let specs: Vec<String> = dependencies.iter().map(|a| a.spec()).collect();
    print_json(&specs)?;
  } else if dependencies.is_empty() {
    print_info(&format!("{address} has no dependencies"));
  } else {
    print_addresses(&dependencies);
  }

  Ok(())
}
