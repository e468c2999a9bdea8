//! Code generation: lower expression trees into ARM-flavoured assembly.
//!
//! Every expression stages its result in `r0`; combining instructions read
//! their second operand from `r1`. There is no register allocator, so the
//! right operand's load reuses `r0` as well. Locals are addressed through
//! literal-pool loads of their symbol.
//!
//! | node           | lines                                        |
//! |----------------|----------------------------------------------|
//! | literal `v`    | `mov r0, #v`                                 |
//! | variable `n`   | `ldr r0, =n`                                 |
//! | `t = v`        | *t*, *v*, `str r1, [r0]`                     |
//! | `l + r`        | *l*, *r*, `add r0, r0, r1`                   |
//! | `fn f { .. }`  | `f:`, `push {lr}`, *body*, `pop {pc}`        |
//! | `call f(..)`   | *args*, `bl f`                               |

use log::debug;

use crate::error::{CompileError, CompileResult};
use crate::parser::ExpressionNode;

/// Lower one tree into bare instruction lines, children first.
///
/// A function definition is only accepted as the root; one nested anywhere
/// else would put a label in the middle of the enclosing routine.
pub fn emit(node: &ExpressionNode) -> CompileResult<Vec<String>> {
  let mut lines = Vec::new();
  emit_statement(node, &mut lines)?;
  Ok(lines)
}

/// Emit a complete assembly file for a program.
///
/// Top-level function definitions are hoisted ahead of `main` in source
/// order; every other statement runs inside `main`, which returns 0.
pub fn render_program(program: &[ExpressionNode]) -> CompileResult<String> {
  let (functions, statements): (Vec<_>, Vec<_>) = program
    .iter()
    .partition(|node| matches!(node, ExpressionNode::FunctionDef { .. }));

  let mut lines = vec![".text".to_string()];
  for function in &functions {
    emit_statement(function, &mut lines)?;
  }

  lines.push(".global main".to_string());
  lines.push("main:".to_string());
  lines.push("push {lr}".to_string());
  for statement in &statements {
    emit_expr(statement, &mut lines)?;
  }
  lines.push("mov r0, #0".to_string());
  lines.push("pop {pc}".to_string());

  debug!(
    "rendered {} functions and {} statements into {} lines",
    functions.len(),
    statements.len(),
    lines.len()
  );

  let mut asm = String::new();
  for line in &lines {
    if !is_label_or_directive(line) {
      asm.push_str("    ");
    }
    asm.push_str(line);
    asm.push('\n');
  }
  Ok(asm)
}

fn is_label_or_directive(line: &str) -> bool {
  line.ends_with(':') || line.starts_with('.')
}

fn emit_statement(node: &ExpressionNode, out: &mut Vec<String>) -> CompileResult<()> {
  match node {
    ExpressionNode::FunctionDef { name, body } => {
      out.push(format!("{name}:"));
      out.push("push {lr}".to_string());
      for statement in body {
        emit_expr(statement, out)?;
      }
      out.push("pop {pc}".to_string());
      Ok(())
    }
    _ => emit_expr(node, out),
  }
}

fn emit_expr(node: &ExpressionNode, out: &mut Vec<String>) -> CompileResult<()> {
  match node {
    ExpressionNode::Literal { value } => out.push(format!("mov r0, #{value}")),
    ExpressionNode::Variable { name } => out.push(format!("ldr r0, ={name}")),
    ExpressionNode::Assignment { target, value } => {
      emit_addr(target, out)?;
      emit_expr(value, out)?;
      out.push("str r1, [r0]".to_string());
    }
    ExpressionNode::Addition { left, right } => {
      emit_expr(left, out)?;
      emit_expr(right, out)?;
      out.push("add r0, r0, r1".to_string());
    }
    ExpressionNode::FunctionDef { .. } => {
      return Err(CompileError::UnsupportedNodeShape {
        shape: "a nested function definition".to_string(),
      });
    }
    ExpressionNode::FunctionCall { name, args } => {
      for arg in args {
        emit_expr(arg, out)?;
      }
      out.push(format!("bl {name}"));
    }
  }
  Ok(())
}

fn emit_addr(node: &ExpressionNode, out: &mut Vec<String>) -> CompileResult<()> {
  match node {
    ExpressionNode::Variable { name } => {
      out.push(format!("ldr r0, ={name}"));
      Ok(())
    }
    other => Err(CompileError::UnsupportedNodeShape {
      shape: format!("assignment to {}", other.describe()),
    }),
  }
}
