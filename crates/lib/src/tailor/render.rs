//! Rendering putative targets as BUILD file stanzas.

use super::PutativeTarget;
use crate::target::FieldValue;

impl PutativeTarget {
  /// Render as a BUILD stanza: comments, then `alias(` with one kwarg per line.
  /// `name` comes first, the remaining kwargs in key order.
  pub fn generate_build_file_stanza(&self, indent: &str) -> String {
    let mut out = String::new();
    for comment in &self.comments {
      out.push_str(comment);
      out.push('\n');
    }

    out.push_str(&self.type_alias);
    out.push('(');
    if !self.kwargs.is_empty() {
      let ordered = self
        .kwargs
        .get_key_value("name")
        .into_iter()
        .chain(self.kwargs.iter().filter(|(key, _)| key.as_str() != "name"));
      let parts: Vec<String> = ordered
        .map(|(key, value)| format!("\n{indent}{key}={}", format_value(value, indent)))
        .collect();
      out.push_str(&parts.join(","));
      out.push_str(",\n");
    }
    out.push_str(")\n");
    out
  }
}

fn format_value(value: &FieldValue, indent: &str) -> String {
  match value {
    FieldValue::Str(s) => quote(s),
    FieldValue::Int(i) => i.to_string(),
    FieldValue::Bool(true) => "True".to_string(),
    FieldValue::Bool(false) => "False".to_string(),
    FieldValue::List(items) if items.is_empty() => "[]".to_string(),
    FieldValue::List(items) => {
      let mut out = String::from("[");
      for item in items {
        out.push_str(&format!("\n{indent}{indent}{},", quote(item)));
      }
      out.push_str(&format!("\n{indent}]"));
      out
    }
  }
}

fn quote(s: &str) -> String {
  let mut out = String::with_capacity(s.len() + 2);
  out.push('"');
  for c in s.chars() {
    match c {
      '\\' => out.push_str("\\\\"),
      '"' => out.push_str("\\\""),
      '\n' => out.push_str("\\n"),
      '\t' => out.push_str("\\t"),
      '\r' => out.push_str("\\r"),
      _ => out.push(c),
    }
  }
  out.push('"');
  out
}

/// New content for one BUILD file: the existing content (or the header for a
/// new file) followed by one stanza per target.
///
/// Whitespace-only prefixes are dropped, every block is right-trimmed, blocks
/// are separated by one blank line and the file ends with a single newline.
pub fn make_content_str(existing: &str, indent: &str, targets: &[PutativeTarget]) -> String {
  let stanzas = targets.iter().map(|pt| pt.generate_build_file_stanza(indent));
  let blocks: Vec<String> = std::iter::once(existing.to_string())
    .filter(|prefix| !prefix.trim().is_empty())
    .chain(stanzas)
    .map(|block| block.trim_end().to_string())
    .collect();
  format!("{}\n", blocks.join("\n\n"))
}
