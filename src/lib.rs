//! Crate root: wires together the compilation pipeline.
//!
//! The stages are small and composable:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and builds expression trees.
//! - `codegen` lowers trees into ARM-flavoured assembly lines.
//! - `error` centralises reporting utilities shared by the other modules.

pub mod codegen;
pub mod error;
pub mod parser;
pub mod tokenizer;

pub use codegen::emit;
pub use error::{CompileError, CompileResult};
pub use parser::{ExpressionNode, build_program, build_tree};
pub use tokenizer::{Token, TokenKind};

/// Compile a source string into assembly. Parse errors come back anchored
/// to the offending byte of `source`.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  let tokens = tokenizer::tokenize(source)?;
  let program = parser::build_program(&tokens).map_err(|err| err.locate(source))?;
  codegen::render_program(&program)
}
