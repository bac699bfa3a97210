//! Dockerfile scanning for references to packaged targets.
//!
//! Only `COPY` instructions are inspected. A source ending in `.pex` is the
//! output of a `pex_binary`, laid out as `dotted.dir/name.pex`, and maps back to
//! the address `dotted/dir:name`.

use serde::Serialize;
use tracing::debug;

use crate::engine::{Context, EngineError, Request};
use crate::store::PathGlobs;
use crate::store::rules::DigestContentsRequest;
use crate::target::SourcesField;
use crate::target::rules::SourcesPathsRequest;

/// Parse the Dockerfile owned by a sources field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DockerfileParseRequest(pub SourcesField);

impl Request for DockerfileParseRequest {
  type Output = DockerfileInfo;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DockerfileInfo {
  /// Path of the parsed Dockerfile, empty when the field matched no file.
  pub source: String,
  /// Address specs of targets the image copies in, in order of appearance.
  pub putative_target_addresses: Vec<String>,
}

pub(super) async fn parse_dockerfile(
  ctx: Context,
  DockerfileParseRequest(sources): DockerfileParseRequest,
) -> Result<DockerfileInfo, EngineError> {
  let paths = ctx.get(SourcesPathsRequest(sources.clone())).await?;
  let Some(source) = paths.files.first() else {
    return Ok(DockerfileInfo::default());
  };
  if paths.files.len() > 1 {
    debug!(address = %sources.address, files = paths.files.len(), "more than one Dockerfile, using the first");
  }

  let contents = ctx.get(DigestContentsRequest(PathGlobs::literal([source]))).await?;
  let Some(file) = contents.get(source) else {
    return Ok(DockerfileInfo::default());
  };
  Ok(DockerfileInfo {
    source: source.clone(),
    putative_target_addresses: putative_target_addresses(file.text()?),
  })
}

/// Address specs referenced by `COPY` instructions, deduplicated.
pub fn putative_target_addresses(dockerfile: &str) -> Vec<String> {
  let mut addresses = Vec::new();
  for instruction in instructions(dockerfile) {
    let Some((keyword, args)) = instruction.split_once(char::is_whitespace) else {
      continue;
    };
    if !keyword.eq_ignore_ascii_case("COPY") {
      continue;
    }
    for address in copy_sources(args).iter().filter_map(|s| pex_address(s)) {
      if !addresses.contains(&address) {
        addresses.push(address);
      }
    }
  }
  addresses
}

/// Logical instructions: comments dropped, `\` continuations joined.
fn instructions(dockerfile: &str) -> Vec<String> {
  let mut out = Vec::new();
  let mut current = String::new();
  for line in dockerfile.lines() {
    let trimmed = line.trim();
    if trimmed.starts_with('#') {
      continue;
    }
    match trimmed.strip_suffix('\\') {
      Some(continued) => {
        current.push_str(continued);
        current.push(' ');
      }
      None => {
        current.push_str(trimmed);
        if !current.trim().is_empty() {
          out.push(current.trim().to_string());
        }
        current.clear();
      }
    }
  }
  if !current.trim().is_empty() {
    out.push(current.trim().to_string());
  }
  out
}

/// Source operands of a `COPY`: flags skipped, destination dropped. Both the
/// shell form and the JSON exec form are understood.
fn copy_sources(args: &str) -> Vec<String> {
  let mut operands: Vec<String> = Vec::new();
  let mut rest = args.trim();
  while let Some(flagged) = rest.strip_prefix("--") {
    rest = flagged.split_once(char::is_whitespace).map_or("", |(_, r)| r).trim_start();
  }

  if rest.starts_with('[') {
    match serde_json::from_str::<Vec<String>>(rest) {
      Ok(parsed) => operands = parsed,
      Err(err) => debug!(error = %err, "ignoring malformed COPY exec form"),
    }
  } else {
    operands.extend(rest.split_whitespace().map(str::to_string));
  }

  operands.pop();
  operands
}

fn pex_address(source: &str) -> Option<String> {
  let stem = source.strip_suffix(".pex")?;
  let (dotted, name) = match stem.rsplit_once('/') {
    Some((dotted, name)) => (dotted.replace('.', "/"), name),
    None => (String::new(), stem),
  };
  if name.is_empty() || dotted.starts_with('/') {
    return None;
  }
  Some(format!("{dotted}:{name}"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn copy_of_pex_binaries() {
    let dockerfile = r#"
FROM python:3.9
COPY src.python.app/bin.pex /app/bin.pex
copy --chown=app:app src.tools/cli.pex other.txt /bin/
RUN echo done
"#;
    assert_eq!(
      putative_target_addresses(dockerfile),
      vec!["src/python/app:bin", "src/tools:cli"]
    );
  }

  #[test]
  fn continuations_and_comments() {
    let dockerfile = "# COPY ignored.pex /x\nCOPY \\\n  a.b/one.pex \\\n  two.pex \\\n  /dest/\n";
    assert_eq!(putative_target_addresses(dockerfile), vec!["a/b:one", ":two"]);
  }

  #[test]
  fn exec_form() {
    let dockerfile = r#"COPY ["src.app/main.pex", "/app/"]"#;
    assert_eq!(putative_target_addresses(dockerfile), vec!["src/app:main"]);
  }

  #[test]
  fn destination_is_never_a_source() {
    assert!(putative_target_addresses("COPY a.txt /app/bin.pex").is_empty());
    assert!(putative_target_addresses("ADD src/app.pex /app/").is_empty());
  }

  #[test]
  fn repeated_copies_are_deduplicated() {
    let dockerfile = "COPY x/y.pex /a\nCOPY x/y.pex /b\n";
    assert_eq!(putative_target_addresses(dockerfile), vec!["x:y"]);
  }
}
