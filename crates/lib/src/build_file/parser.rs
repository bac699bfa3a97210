//! Recursive-descent parser over [`lexer`](super::lexer) tokens.
//!
//! ```text
//! file  := call*
//! call  := IDENT "(" [kwarg ("," kwarg)* [","]] ")"
//! kwarg := IDENT "=" value
//! value := STR | INT | "True" | "False" | "[" [STR ("," STR)* [","]] "]"
//! ```

use std::collections::BTreeMap;

use super::lexer::{Spanned, Token, tokenize};
use super::{BuildFileError, Call};
use crate::target::FieldValue;

pub fn parse(path: &str, source: &str) -> Result<Vec<Call>, BuildFileError> {
  let tokens = tokenize(source).map_err(|line| BuildFileError::Lex {
    path: path.to_string(),
    line,
  })?;
  Parser { path, tokens, pos: 0 }.file()
}

struct Parser<'a> {
  path: &'a str,
  tokens: Vec<Spanned>,
  pos: usize,
}

impl Parser<'_> {
  fn file(mut self) -> Result<Vec<Call>, BuildFileError> {
    let mut calls = Vec::new();
    while self.pos < self.tokens.len() {
      calls.push(self.call()?);
    }
    Ok(calls)
  }

  fn call(&mut self) -> Result<Call, BuildFileError> {
    let line = self.line();
    let alias = self.ident("a target type")?;
    self.expect(&Token::LParen)?;

    let mut kwargs = BTreeMap::new();
    loop {
      if self.eat(&Token::RParen) {
        break;
      }
      let key_line = self.line();
      let key = self.ident("a keyword argument")?;
      self.expect(&Token::Eq)?;
      let value = self.value()?;
      if kwargs.insert(key.clone(), value).is_some() {
        return Err(self.syntax(key_line, format!("keyword argument '{key}' repeated")));
      }
      if !self.eat(&Token::Comma) {
        self.expect(&Token::RParen)?;
        break;
      }
    }

    Ok(Call { alias, kwargs, line })
  }

  fn value(&mut self) -> Result<FieldValue, BuildFileError> {
    let line = self.line();
    match self.advance() {
      Some(Token::Str(s)) => Ok(FieldValue::Str(s)),
      Some(Token::Int(i)) => Ok(FieldValue::Int(i)),
      Some(Token::True) => Ok(FieldValue::Bool(true)),
      Some(Token::False) => Ok(FieldValue::Bool(false)),
      Some(Token::LBracket) => {
        let mut items = Vec::new();
        loop {
          if self.eat(&Token::RBracket) {
            break;
          }
          let item_line = self.line();
          match self.advance() {
            Some(Token::Str(s)) => items.push(s),
            other => return Err(self.unexpected(item_line, other, "a string list element")),
          }
          if !self.eat(&Token::Comma) {
            self.expect(&Token::RBracket)?;
            break;
          }
        }
        Ok(FieldValue::List(items))
      }
      other => Err(self.unexpected(line, other, "a value")),
    }
  }

  fn ident(&mut self, what: &str) -> Result<String, BuildFileError> {
    let line = self.line();
    match self.advance() {
      Some(Token::Ident(name)) => Ok(name),
      other => Err(self.unexpected(line, other, what)),
    }
  }

  fn expect(&mut self, expected: &Token) -> Result<(), BuildFileError> {
    let line = self.line();
    match self.advance() {
      Some(ref token) if token == expected => Ok(()),
      other => Err(self.unexpected(line, other, &expected.describe())),
    }
  }

  fn eat(&mut self, expected: &Token) -> bool {
    let matches = self.tokens.get(self.pos).is_some_and(|s| &s.token == expected);
    if matches {
      self.pos += 1;
    }
    matches
  }

  fn advance(&mut self) -> Option<Token> {
    let token = self.tokens.get(self.pos).map(|s| s.token.clone());
    if token.is_some() {
      self.pos += 1;
    }
    token
  }

  /// Line of the next token, or of the last token at end of input.
  fn line(&self) -> usize {
    self
      .tokens
      .get(self.pos)
      .or_else(|| self.tokens.last())
      .map(|s| s.line)
      .unwrap_or(1)
  }

  fn unexpected(&self, line: usize, found: Option<Token>, expected: &str) -> BuildFileError {
    let found = found.map(|t| t.describe()).unwrap_or_else(|| "end of file".to_string());
    self.syntax(line, format!("expected {expected}, found {found}"))
  }

  fn syntax(&self, line: usize, message: String) -> BuildFileError {
    BuildFileError::Syntax {
      path: self.path.to_string(),
      line,
      message,
    }
  }
}
