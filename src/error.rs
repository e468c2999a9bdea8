//! Shared error utilities used across the compilation pipeline.
//!
//! Parse failures are reported against token positions; `locate` attaches a
//! caret snippet once the caller has the source text at hand.

use std::path::PathBuf;

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CompileError {
  /// A production needed a token past the end of the sequence.
  #[snafu(display(
    "{}expected {expected}, but reached end of input",
    snippet.as_deref().unwrap_or_default()
  ))]
  OutOfRange {
    position: usize,
    loc: usize,
    expected: String,
    snippet: Option<String>,
  },

  /// A token appeared where no production accepts it.
  #[snafu(display("{}{message}", snippet.as_deref().unwrap_or_default()))]
  MalformedSequence {
    position: usize,
    loc: usize,
    message: String,
    snippet: Option<String>,
  },

  /// The emitter was handed a tree the builder never produces.
  #[snafu(display("cannot lower {shape}"))]
  UnsupportedNodeShape { shape: String },

  #[snafu(display("{expr_line}\n{marker} {message}"))]
  WithLocation {
    expr_line: String,
    marker: String,
    message: String,
  },

  #[snafu(display("expected exactly one of a source argument or --file"))]
  MissingInput,

  #[snafu(display("failed to read {}: {source}", path.display()))]
  ReadSource {
    path: PathBuf,
    source: std::io::Error,
  },

  #[snafu(display("failed to write {}: {source}", path.display()))]
  WriteOutput {
    path: PathBuf,
    source: std::io::Error,
  },
}

impl CompileError {
  /// Construct an error anchored at a specific byte offset in the source.
  pub fn at(expr: &str, loc: usize, message: impl Into<String>) -> Self {
    let (expr_line, marker) = caret(expr, loc);
    Self::WithLocation {
      expr_line,
      marker,
      message: message.into(),
    }
  }

  /// Attach a caret snippet of `source` to a token-level error. The variant
  /// is kept so callers can still tell the failure kinds apart.
  pub fn locate(mut self, source: &str) -> Self {
    if let Self::OutOfRange { loc, snippet, .. } | Self::MalformedSequence { loc, snippet, .. } =
      &mut self
    {
      let (expr_line, marker) = caret(source, *loc);
      *snippet = Some(format!("{expr_line}\n{marker} "));
    }
    self
  }
}

fn caret(expr: &str, loc: usize) -> (String, String) {
  let expr_line = format!("'{expr}'");
  let safe_loc = loc.min(expr.len());
  let char_offset = expr[..safe_loc].chars().count() + 1; // account for opening quote
  (expr_line, format!("{}^", " ".repeat(char_offset)))
}
