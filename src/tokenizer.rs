//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer knows nothing about grammar. It recognises identifiers,
//! the `fn`/`call` keywords, decimal literals and single-character
//! punctuators, and records where each token started so later stages can
//! point back into the source.

use log::trace;

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Ident,
  Num,
  Assign,
  Plus,
  Semicolon,
  Fn,
  Call,
  LParen,
  RParen,
  Comma,
  LBrace,
  RBrace,
}

impl TokenKind {
  /// Punctuation carries no value of its own; the parser may skip it where
  /// it has no grammatical role.
  pub fn is_punctuation(self) -> bool {
    matches!(
      self,
      TokenKind::Semicolon
        | TokenKind::LParen
        | TokenKind::RParen
        | TokenKind::Comma
        | TokenKind::LBrace
        | TokenKind::RBrace
    )
  }

  fn punctuator(c: u8) -> Option<Self> {
    let kind = match c {
      b'=' => TokenKind::Assign,
      b'+' => TokenKind::Plus,
      b';' => TokenKind::Semicolon,
      b'(' => TokenKind::LParen,
      b')' => TokenKind::RParen,
      b',' => TokenKind::Comma,
      b'{' => TokenKind::LBrace,
      b'}' => TokenKind::RBrace,
      _ => return None,
    };
    Some(kind)
  }
}

/// A token with its literal text. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub text: String,
  pub loc: usize,
}

impl Token {
  pub fn new(kind: TokenKind, text: impl Into<String>, loc: usize) -> Self {
    Self {
      kind,
      text: text.into(),
      loc,
    }
  }

  /// Byte offset just past the token.
  pub fn end(&self) -> usize {
    self.loc + self.text.len()
  }
}

/// Lex the input into a flat vector of tokens.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;

  while i < bytes.len() {
    let c = bytes[i];
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      if i < bytes.len() && is_ident_byte(bytes[i]) {
        return Err(CompileError::at(input, i, "invalid digit in number"));
      }
      tokens.push(Token::new(TokenKind::Num, &input[start..i], start));
      continue;
    }

    if c.is_ascii_alphabetic() || c == b'_' {
      let start = i;
      while i < bytes.len() && is_ident_byte(bytes[i]) {
        i += 1;
      }
      let text = &input[start..i];
      let kind = match text {
        "fn" => TokenKind::Fn,
        "call" => TokenKind::Call,
        _ => TokenKind::Ident,
      };
      tokens.push(Token::new(kind, text, start));
      continue;
    }

    if let Some(kind) = TokenKind::punctuator(c) {
      tokens.push(Token::new(kind, &input[i..i + 1], i));
      i += 1;
      continue;
    }

    let invalid_char = input[i..].chars().next().unwrap_or('\0');
    return Err(CompileError::at(
      input,
      i,
      format!("invalid token: '{invalid_char}'"),
    ));
  }

  trace!("tokenized {} bytes into {} tokens", input.len(), tokens.len());
  Ok(tokens)
}

fn is_ident_byte(c: u8) -> bool {
  c.is_ascii_alphanumeric() || c == b'_'
}
