//! Tokens of the BUILD file language.

use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"([ \t\r\n\f]+|#[^\n]*)")]
pub enum Token {
  #[token("(")]
  LParen,

  #[token(")")]
  RParen,

  #[token("[")]
  LBracket,

  #[token("]")]
  RBracket,

  #[token(",")]
  Comma,

  #[token("=")]
  Eq,

  #[token("True")]
  True,

  #[token("False")]
  False,

  #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
  Ident(String),

  #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
  Int(i64),

  #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unescape(lex.slice()))]
  #[regex(r#"'([^'\\\n]|\\.)*'"#, |lex| unescape(lex.slice()))]
  Str(String),
}

impl Token {
  pub fn describe(&self) -> String {
    match self {
      Token::LParen => "'('".to_string(),
      Token::RParen => "')'".to_string(),
      Token::LBracket => "'['".to_string(),
      Token::RBracket => "']'".to_string(),
      Token::Comma => "','".to_string(),
      Token::Eq => "'='".to_string(),
      Token::True => "True".to_string(),
      Token::False => "False".to_string(),
      Token::Ident(name) => format!("identifier '{name}'"),
      Token::Int(value) => format!("integer {value}"),
      Token::Str(value) => format!("string {value:?}"),
    }
  }
}

/// A token with the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
  pub token: Token,
  pub line: usize,
}

/// Tokenize a whole file. On failure returns the line of the first
/// unrecognized input.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, usize> {
  let mut lexer = Token::lexer(source);
  let mut tokens = Vec::new();
  let mut line = 1;
  let mut offset = 0;

  while let Some(token) = lexer.next() {
    let span = lexer.span();
    line += source[offset..span.start].matches('\n').count();
    offset = span.start;
    match token {
      Ok(token) => tokens.push(Spanned { token, line }),
      Err(()) => return Err(line),
    }
  }
  Ok(tokens)
}

/// Strip the quotes from a string literal and resolve escapes.
fn unescape(literal: &str) -> String {
  let inner = &literal[1..literal.len() - 1];
  let mut out = String::with_capacity(inner.len());
  let mut chars = inner.chars();
  while let Some(c) = chars.next() {
    if c != '\\' {
      out.push(c);
      continue;
    }
    match chars.next() {
      Some('n') => out.push('\n'),
      Some('t') => out.push('\t'),
      Some('r') => out.push('\r'),
      Some(other) => out.push(other),
      None => out.push('\\'),
    }
  }
  out
}
