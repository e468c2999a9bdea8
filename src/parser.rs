//! Recursive-descent parser producing single-rooted expression trees.
//!
//! Every production takes the position it starts at and hands back the
//! subtree together with the first position it did not consume. Callers
//! advance only by what their callee reports, so no cursor is shared
//! between levels of the recursion.

use log::debug;

use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind};

/// Expression tree produced by the parser. Each composite node owns its
/// children outright and nothing is mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionNode {
  Literal {
    value: String,
  },
  Variable {
    name: String,
  },
  Assignment {
    target: Box<ExpressionNode>,
    value: Box<ExpressionNode>,
  },
  Addition {
    left: Box<ExpressionNode>,
    right: Box<ExpressionNode>,
  },
  FunctionDef {
    name: String,
    body: Vec<ExpressionNode>,
  },
  FunctionCall {
    name: String,
    args: Vec<ExpressionNode>,
  },
}

impl ExpressionNode {
  pub fn literal(value: impl Into<String>) -> Self {
    Self::Literal {
      value: value.into(),
    }
  }

  pub fn variable(name: impl Into<String>) -> Self {
    Self::Variable { name: name.into() }
  }

  pub fn assignment(target: ExpressionNode, value: ExpressionNode) -> Self {
    Self::Assignment {
      target: Box::new(target),
      value: Box::new(value),
    }
  }

  pub fn addition(left: ExpressionNode, right: ExpressionNode) -> Self {
    Self::Addition {
      left: Box::new(left),
      right: Box::new(right),
    }
  }

  pub fn function_def(name: impl Into<String>, body: Vec<ExpressionNode>) -> Self {
    Self::FunctionDef {
      name: name.into(),
      body,
    }
  }

  pub fn function_call(name: impl Into<String>, args: Vec<ExpressionNode>) -> Self {
    Self::FunctionCall {
      name: name.into(),
      args,
    }
  }

  /// Short description used in diagnostics.
  pub fn describe(&self) -> &'static str {
    match self {
      Self::Literal { .. } => "a literal",
      Self::Variable { .. } => "a variable",
      Self::Assignment { .. } => "an assignment",
      Self::Addition { .. } => "an addition",
      Self::FunctionDef { .. } => "a function definition",
      Self::FunctionCall { .. } => "a function call",
    }
  }
}

/// A subtree plus the first position it did not consume.
type Parsed<T> = CompileResult<(T, usize)>;

/// The construct an expression sits in. It decides which punctuation has a
/// grammatical role at the current position and which is stray.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
  TopLevel,
  Body,
  Args,
  /// Inside `(..)` or `{..}` used as brackets; holds the expected closer.
  Group(TokenKind),
}

impl Context {
  /// Openers always start a group, so they are never stray.
  fn is_stray(self, kind: TokenKind) -> bool {
    match kind {
      TokenKind::Comma => self != Context::Args,
      TokenKind::Semicolon => matches!(self, Context::Args | Context::Group(_)),
      TokenKind::RParen => !matches!(
        self,
        Context::Args | Context::Group(TokenKind::RParen)
      ),
      TokenKind::RBrace => !matches!(
        self,
        Context::Body | Context::Group(TokenKind::RBrace)
      ),
      _ => false,
    }
  }
}

/// Build the tree for a token sequence holding at most one expression.
///
/// Returns `Ok(None)` when the sequence contains no expression at all
/// (empty, or nothing but stray punctuation).
pub fn build_tree(tokens: &[Token]) -> CompileResult<Option<ExpressionNode>> {
  let stream = TokenStream::new(tokens);
  let pos = stream.skip_separators(0);
  if stream.peek(pos).is_none() {
    debug!("no expression in {} tokens", tokens.len());
    return Ok(None);
  }

  let (root, next) = parse_statement(&stream, pos)?;
  let rest = stream.skip_separators(next);
  if let Some(token) = stream.peek(rest) {
    return Err(stream.malformed(
      rest,
      format!("unexpected \"{}\" after the expression", token.text),
    ));
  }

  debug!("built {} from {} tokens", root.describe(), tokens.len());
  Ok(Some(root))
}

/// Parse a sequence of top-level expressions separated by punctuation
/// (normally `;`), each into its own tree.
pub fn build_program(tokens: &[Token]) -> CompileResult<Vec<ExpressionNode>> {
  let stream = TokenStream::new(tokens);
  let mut statements = Vec::new();
  let mut pos = stream.skip_separators(0);

  while stream.peek(pos).is_some() {
    let (statement, next) = parse_statement(&stream, pos)?;
    statements.push(statement);

    match stream.peek(next) {
      Some(token) if !is_separator(token.kind) => {
        return Err(stream.malformed(
          next,
          format!("expected \";\" between statements, but got \"{}\"", token.text),
        ));
      }
      _ => pos = stream.skip_separators(next),
    }
  }

  debug!(
    "built {} statements from {} tokens",
    statements.len(),
    tokens.len()
  );
  Ok(statements)
}

/// Between top-level statements any punctuation except an opener separates.
fn is_separator(kind: TokenKind) -> bool {
  kind.is_punctuation() && !matches!(kind, TokenKind::LParen | TokenKind::LBrace)
}

/// Function definitions only appear here, so every label the emitter
/// produces sits outside any other routine.
fn parse_statement(stream: &TokenStream, pos: usize) -> Parsed<ExpressionNode> {
  if stream.is(pos, TokenKind::Fn) {
    parse_function_def(stream, pos)
  } else {
    parse_expr(stream, pos, Context::TopLevel)
  }
}

fn parse_expr(stream: &TokenStream, pos: usize, ctx: Context) -> Parsed<ExpressionNode> {
  parse_assign(stream, pos, ctx)
}

fn parse_assign(stream: &TokenStream, pos: usize, ctx: Context) -> Parsed<ExpressionNode> {
  let (target, next) = parse_add(stream, pos, ctx)?;

  if !stream.is(next, TokenKind::Assign) {
    return Ok((target, next));
  }
  if !matches!(target, ExpressionNode::Variable { .. }) {
    return Err(stream.malformed(
      next,
      format!("cannot assign to {}", target.describe()),
    ));
  }
  if stream.peek(next + 1).is_none() {
    return Err(stream.out_of_range(next + 1, "a value after \"=\""));
  }

  // Right associative: `a = b = 1` stores into `b` first.
  let (value, after) = parse_assign(stream, next + 1, ctx)?;
  Ok((ExpressionNode::assignment(target, value), after))
}

fn parse_add(stream: &TokenStream, pos: usize, ctx: Context) -> Parsed<ExpressionNode> {
  let (mut node, mut pos) = parse_primary(stream, pos, ctx)?;

  while stream.is(pos, TokenKind::Plus) {
    if stream.peek(pos + 1).is_none() {
      return Err(stream.out_of_range(pos + 1, "an operand after \"+\""));
    }
    let (rhs, next) = parse_primary(stream, pos + 1, ctx)?;
    node = ExpressionNode::addition(node, rhs);
    pos = next;
  }

  Ok((node, pos))
}

fn parse_primary(stream: &TokenStream, pos: usize, ctx: Context) -> Parsed<ExpressionNode> {
  let pos = stream.skip_stray(pos, ctx);
  let Some(token) = stream.peek(pos) else {
    return Err(stream.out_of_range(pos, "an expression"));
  };

  match token.kind {
    TokenKind::Ident => Ok((ExpressionNode::variable(&token.text), pos + 1)),
    TokenKind::Num => Ok((ExpressionNode::literal(&token.text), pos + 1)),
    TokenKind::Call => parse_function_call(stream, pos),
    TokenKind::LParen => parse_group(stream, pos, TokenKind::RParen, "\")\""),
    TokenKind::LBrace => parse_group(stream, pos, TokenKind::RBrace, "\"}\""),
    TokenKind::Fn => Err(stream.malformed(
      pos,
      "function definitions are only allowed at the top level".to_string(),
    )),
    TokenKind::Assign
    | TokenKind::Plus
    | TokenKind::Semicolon
    | TokenKind::Comma
    | TokenKind::RParen
    | TokenKind::RBrace => Err(stream.malformed(
      pos,
      format!("expected an expression, but got \"{}\"", token.text),
    )),
  }
}

/// `( expr )` or `{ expr }`: brackets carry no node of their own.
fn parse_group(
  stream: &TokenStream,
  pos: usize,
  closer: TokenKind,
  closer_text: &str,
) -> Parsed<ExpressionNode> {
  let ctx = Context::Group(closer);
  let (inner, next) = parse_expr(stream, pos + 1, ctx)?;
  let next = stream.skip_stray(next, ctx);
  stream.expect(next, closer, &format!("{closer_text} to close the group"))?;
  Ok((inner, next + 1))
}

/// `fn name { stmt; stmt }`
fn parse_function_def(stream: &TokenStream, pos: usize) -> Parsed<ExpressionNode> {
  let (name, pos) = stream.expect_ident(pos + 1, "a function name after \"fn\"")?;
  stream.expect(pos, TokenKind::LBrace, "\"{\" to open the function body")?;
  let mut pos = pos + 1;
  let mut body = Vec::new();

  loop {
    let Some(token) = stream.peek(pos) else {
      return Err(stream.out_of_range(pos, "\"}\" to close the function body"));
    };
    match token.kind {
      TokenKind::RBrace => break,
      kind if kind == TokenKind::Semicolon || Context::Body.is_stray(kind) => pos += 1,
      _ => {
        let (statement, next) = parse_expr(stream, pos, Context::Body)?;
        body.push(statement);
        pos = match stream.peek(next) {
          Some(token) if token.kind == TokenKind::RBrace => next,
          Some(token)
            if token.kind == TokenKind::Semicolon || Context::Body.is_stray(token.kind) =>
          {
            next + 1
          }
          Some(token) => {
            return Err(stream.malformed(
              next,
              format!(
                "expected \";\" or \"}}\" after a statement, but got \"{}\"",
                token.text
              ),
            ));
          }
          None => return Err(stream.out_of_range(next, "\"}\" to close the function body")),
        };
      }
    }
  }

  Ok((ExpressionNode::function_def(name, body), pos + 1))
}

/// `call name(arg, arg)`
fn parse_function_call(stream: &TokenStream, pos: usize) -> Parsed<ExpressionNode> {
  let (name, pos) = stream.expect_ident(pos + 1, "a function name after \"call\"")?;
  stream.expect(pos, TokenKind::LParen, "\"(\" to open the argument list")?;
  let mut pos = pos + 1;
  let mut args = Vec::new();

  loop {
    let Some(token) = stream.peek(pos) else {
      return Err(stream.out_of_range(pos, "\")\" to close the argument list"));
    };
    if token.kind == TokenKind::RParen {
      break;
    }
    if Context::Args.is_stray(token.kind) {
      pos += 1;
      continue;
    }

    let (arg, next) = parse_expr(stream, pos, Context::Args)?;
    args.push(arg);
    pos = match stream.peek(next) {
      Some(token) if token.kind == TokenKind::RParen => next,
      Some(token) if token.kind == TokenKind::Comma || Context::Args.is_stray(token.kind) => {
        next + 1
      }
      Some(token) => {
        return Err(stream.malformed(
          next,
          format!(
            "expected \",\" or \")\" after an argument, but got \"{}\"",
            token.text
          ),
        ));
      }
      None => return Err(stream.out_of_range(next, "\")\" to close the argument list")),
    };
  }

  Ok((ExpressionNode::function_call(name, args), pos + 1))
}

/// Read-only view over the token slice. Positions are passed in and out
/// explicitly; the stream itself never moves.
struct TokenStream<'a> {
  tokens: &'a [Token],
}

impl<'a> TokenStream<'a> {
  fn new(tokens: &'a [Token]) -> Self {
    Self { tokens }
  }

  fn peek(&self, pos: usize) -> Option<&'a Token> {
    self.tokens.get(pos)
  }

  fn is(&self, pos: usize, kind: TokenKind) -> bool {
    self.peek(pos).is_some_and(|token| token.kind == kind)
  }

  /// Skip separators. Only valid between top-level statements.
  fn skip_separators(&self, mut pos: usize) -> usize {
    while self.peek(pos).is_some_and(|token| is_separator(token.kind)) {
      pos += 1;
    }
    pos
  }

  /// Skip punctuation that has no role in `ctx`.
  fn skip_stray(&self, mut pos: usize, ctx: Context) -> usize {
    while self.peek(pos).is_some_and(|token| ctx.is_stray(token.kind)) {
      pos += 1;
    }
    pos
  }

  fn expect(&self, pos: usize, kind: TokenKind, expected: &str) -> CompileResult<&'a Token> {
    match self.peek(pos) {
      Some(token) if token.kind == kind => Ok(token),
      Some(token) => Err(self.malformed(
        pos,
        format!("expected {expected}, but got \"{}\"", token.text),
      )),
      None => Err(self.out_of_range(pos, expected)),
    }
  }

  fn expect_ident(&self, pos: usize, expected: &str) -> CompileResult<(&'a str, usize)> {
    let token = self.expect(pos, TokenKind::Ident, expected)?;
    Ok((token.text.as_str(), pos + 1))
  }

  /// Byte offset for diagnostics: the token's start, or the end of the last
  /// token when `pos` is past the sequence.
  fn loc(&self, pos: usize) -> usize {
    match self.peek(pos) {
      Some(token) => token.loc,
      None => self.tokens.last().map_or(0, Token::end),
    }
  }

  fn malformed(&self, pos: usize, message: String) -> CompileError {
    CompileError::MalformedSequence {
      position: pos,
      loc: self.loc(pos),
      message,
      snippet: None,
    }
  }

  fn out_of_range(&self, pos: usize, expected: &str) -> CompileError {
    CompileError::OutOfRange {
      position: pos,
      loc: self.loc(pos),
      expected: expected.to_string(),
      snippet: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tokenizer::tokenize;
  use ExpressionNode as N;

  fn tok(kind: TokenKind, text: &str) -> Token {
    Token::new(kind, text, 0)
  }

  fn ident(name: &str) -> Token {
    tok(TokenKind::Ident, name)
  }

  fn int(value: &str) -> Token {
    tok(TokenKind::Num, value)
  }

  fn tree(source: &str) -> ExpressionNode {
    build_tree(&tokenize(source).unwrap()).unwrap().unwrap()
  }

  #[test]
  fn assignment_of_literal() {
    let tokens = [ident("x"), tok(TokenKind::Assign, "="), int("5")];
    assert_eq!(
      build_tree(&tokens).unwrap(),
      Some(N::assignment(N::variable("x"), N::literal("5")))
    );
  }

  #[test]
  fn addition_of_variables() {
    let tokens = [ident("x"), tok(TokenKind::Plus, "+"), ident("y")];
    assert_eq!(
      build_tree(&tokens).unwrap(),
      Some(N::addition(N::variable("x"), N::variable("y")))
    );
  }

  #[test]
  fn nested_additions_consume_their_own_tokens() {
    let stream_tokens = tokenize("x + y + z").unwrap();
    let stream = TokenStream::new(&stream_tokens);

    let (lhs, next) = parse_primary(&stream, 0, Context::TopLevel).unwrap();
    assert_eq!((lhs, next), (N::variable("x"), 1));

    let (sum, next) = parse_add(&stream, 0, Context::TopLevel).unwrap();
    assert_eq!(next, 5);
    assert_eq!(
      sum,
      N::addition(N::addition(N::variable("x"), N::variable("y")), N::variable("z"))
    );
  }

  #[test]
  fn assignment_of_sum() {
    assert_eq!(
      tree("total = a + 1"),
      N::assignment(
        N::variable("total"),
        N::addition(N::variable("a"), N::literal("1"))
      )
    );
  }

  #[test]
  fn chained_assignment_is_right_associative() {
    assert_eq!(
      tree("a = b = 1"),
      N::assignment(
        N::variable("a"),
        N::assignment(N::variable("b"), N::literal("1"))
      )
    );
  }

  #[test]
  fn function_definition_with_two_statements() {
    assert_eq!(
      tree("fn f { x + y; call foo() }"),
      N::function_def(
        "f",
        vec![
          N::addition(N::variable("x"), N::variable("y")),
          N::function_call("foo", vec![]),
        ]
      )
    );
  }

  #[test]
  fn function_body_tolerates_empty_statements() {
    assert_eq!(
      tree("fn f { ; x = 1;; }"),
      N::function_def("f", vec![N::assignment(N::variable("x"), N::literal("1"))])
    );
    assert_eq!(tree("fn nop {}"), N::function_def("nop", vec![]));
  }

  #[test]
  fn call_with_arguments() {
    assert_eq!(
      tree("call add(1, x + 2, call zero())"),
      N::function_call(
        "add",
        vec![
          N::literal("1"),
          N::addition(N::variable("x"), N::literal("2")),
          N::function_call("zero", vec![]),
        ]
      )
    );
  }

  #[test]
  fn call_allows_trailing_comma() {
    assert_eq!(
      tree("call f(1,)"),
      N::function_call("f", vec![N::literal("1")])
    );
  }

  #[test]
  fn stray_punctuation_is_skipped() {
    assert_eq!(
      tree("(x + y)"),
      N::addition(N::variable("x"), N::variable("y"))
    );
    assert_eq!(tree("; , x ;"), N::variable("x"));
  }

  #[test]
  fn brackets_group_at_any_depth() {
    let sum = N::addition(N::variable("x"), N::variable("y"));
    assert_eq!(tree("fn f { (x + y) }"), N::function_def("f", vec![sum.clone()]));
    assert_eq!(
      tree("call f((x), 1)"),
      N::function_call("f", vec![N::variable("x"), N::literal("1")])
    );
    assert_eq!(
      tree("fn f { call g((x)) }"),
      N::function_def("f", vec![N::function_call("g", vec![N::variable("x")])])
    );
    assert_eq!(
      tree("(x) + 1"),
      N::addition(N::variable("x"), N::literal("1"))
    );
    assert_eq!(
      tree("a = {b + (c)}"),
      N::assignment(
        N::variable("a"),
        N::addition(N::variable("b"), N::variable("c"))
      )
    );
  }

  #[test]
  fn punctuation_without_a_role_is_skipped_inside_bodies_and_args() {
    assert_eq!(
      tree("fn f { x, y }"),
      N::function_def("f", vec![N::variable("x"), N::variable("y")])
    );
    assert_eq!(tree("fn f { ) x }"), N::function_def("f", vec![N::variable("x")]));
    assert_eq!(
      tree("call g(1; } 2)"),
      N::function_call("g", vec![N::literal("1"), N::literal("2")])
    );
  }

  #[test]
  fn unbalanced_group_is_reported() {
    let err = build_tree(&tokenize("(x + y").unwrap()).unwrap_err();
    assert!(matches!(err, CompileError::OutOfRange { position: 4, .. }));
    let err = build_tree(&tokenize("(x }").unwrap()).unwrap_err();
    assert!(matches!(err, CompileError::OutOfRange { .. }), "{err:?}");
  }

  #[test]
  fn definitions_only_at_top_level() {
    for source in [
      "x = fn g { 1 }",
      "fn f { fn h { 2 } }",
      "call f(fn g {})",
      "1 + fn g {}",
      "(fn g {})",
    ] {
      let err = build_tree(&tokenize(source).unwrap()).unwrap_err();
      assert_eq!(
        err.to_string(),
        "function definitions are only allowed at the top level",
        "{source}"
      );
    }
  }

  #[test]
  fn empty_sequence_has_no_root() {
    assert_eq!(build_tree(&[]).unwrap(), None);
    assert_eq!(build_tree(&tokenize(";;").unwrap()).unwrap(), None);
  }

  #[test]
  fn assign_at_end_is_out_of_range() {
    let tokens = [ident("x"), tok(TokenKind::Assign, "=")];
    let err = build_tree(&tokens).unwrap_err();
    assert!(matches!(err, CompileError::OutOfRange { position: 2, .. }));
  }

  #[test]
  fn plus_at_end_is_out_of_range() {
    let err = build_tree(&tokenize("x +").unwrap()).unwrap_err();
    assert!(matches!(err, CompileError::OutOfRange { position: 2, .. }));
  }

  #[test]
  fn unclosed_constructs_are_out_of_range() {
    for source in ["fn", "fn f", "fn f {", "fn f { x", "call", "call g(", "call g(1,"] {
      let err = build_tree(&tokenize(source).unwrap()).unwrap_err();
      assert!(
        matches!(err, CompileError::OutOfRange { .. }),
        "{source}: {err:?}"
      );
    }
  }

  #[test]
  fn double_assign_is_malformed() {
    let err = build_tree(&tokenize("x = = 5").unwrap()).unwrap_err();
    assert!(matches!(
      err,
      CompileError::MalformedSequence {
        position: 2,
        loc: 4,
        ..
      }
    ));
  }

  #[test]
  fn leading_operator_is_malformed() {
    for source in ["= 5", "+ 1", "x + + y"] {
      let err = build_tree(&tokenize(source).unwrap()).unwrap_err();
      assert!(
        matches!(err, CompileError::MalformedSequence { .. }),
        "{source}: {err:?}"
      );
    }
  }

  #[test]
  fn non_variable_target_is_malformed() {
    let err = build_tree(&tokenize("5 = x").unwrap()).unwrap_err();
    assert_eq!(err.to_string(), "cannot assign to a literal");
    let err = build_tree(&tokenize("x + y = 1").unwrap()).unwrap_err();
    assert_eq!(err.to_string(), "cannot assign to an addition");
  }

  #[test]
  fn missing_delimiters_are_malformed() {
    for source in ["fn { x }", "fn f x", "call g 1", "call g(1 2)", "fn f { x y }"] {
      let err = build_tree(&tokenize(source).unwrap()).unwrap_err();
      assert!(
        matches!(err, CompileError::MalformedSequence { .. }),
        "{source}: {err:?}"
      );
    }
  }

  #[test]
  fn separators_inside_bodies_are_not_skipped() {
    let err = build_tree(&tokenize("fn f { x = ; }").unwrap()).unwrap_err();
    assert!(matches!(err, CompileError::MalformedSequence { .. }));
    let err = build_tree(&tokenize("call g(, 1)").unwrap()).unwrap_err();
    assert!(matches!(err, CompileError::MalformedSequence { .. }));
  }

  #[test]
  fn second_expression_is_rejected_by_build_tree() {
    let err = build_tree(&tokenize("x = 1; y = 2").unwrap()).unwrap_err();
    assert!(matches!(
      err,
      CompileError::MalformedSequence { position: 4, .. }
    ));
  }

  #[test]
  fn program_splits_on_semicolons() {
    let statements = build_program(&tokenize("fn f { x }; a = 1; call f()").unwrap()).unwrap();
    assert_eq!(
      statements,
      vec![
        N::function_def("f", vec![N::variable("x")]),
        N::assignment(N::variable("a"), N::literal("1")),
        N::function_call("f", vec![]),
      ]
    );
  }

  #[test]
  fn program_requires_separators() {
    let err = build_program(&tokenize("a = 1 b = 2").unwrap()).unwrap_err();
    assert_eq!(
      err.to_string(),
      "expected \";\" between statements, but got \"b\""
    );
  }

  #[test]
  fn empty_program() {
    assert!(build_program(&[]).unwrap().is_empty());
  }

  #[test]
  fn out_of_range_points_past_last_token() {
    let err = build_tree(&tokenize("x =").unwrap()).unwrap_err();
    assert!(matches!(err, CompileError::OutOfRange { loc: 3, .. }));
  }
}
