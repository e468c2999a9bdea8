use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{ArgGroup, Parser, ValueEnum};
use log::{LevelFilter, debug};
use snafu::ResultExt;

use rlowc::error::{MissingInputSnafu, ReadSourceSnafu, WriteOutputSnafu};
use rlowc::{CompileResult, codegen, parser, tokenizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
  /// The scanned token stream
  Tokens,
  /// One expression tree per statement
  Tree,
  /// Assembly text
  Asm,
}

/// Lower a tiny assignment/addition/function language into assembly.
#[derive(Debug, Parser)]
#[command(name = "rlowc", version)]
#[command(group(ArgGroup::new("input").required(true).args(["source", "file"])))]
struct Cli {
  /// Program text, e.g. "x = 5; call f(x)"
  source: Option<String>,

  /// Read the program from a file instead
  #[arg(short, long)]
  file: Option<PathBuf>,

  /// Write the result here instead of stdout
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Stop after this stage and print its result
  #[arg(long, value_enum, default_value_t = Emit::Asm)]
  emit: Emit,

  /// Increase log verbosity (-v debug, -vv trace)
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,
}

fn main() {
  let cli = Cli::parse();

  let level = match cli.verbose {
    0 => LevelFilter::Warn,
    1 => LevelFilter::Debug,
    _ => LevelFilter::Trace,
  };
  env_logger::Builder::new()
    .filter_level(level)
    .parse_default_env()
    .init();

  if let Err(err) = run(&cli) {
    eprintln!("{err}");
    process::exit(1);
  }
}

fn run(cli: &Cli) -> CompileResult<()> {
  let source = read_source(cli)?;
  let text = compile(&source, cli.emit)?;

  match &cli.output {
    Some(path) => {
      fs::write(path, &text).context(WriteOutputSnafu { path })?;
      debug!("wrote {} bytes to {}", text.len(), path.display());
    }
    None => print!("{text}"),
  }
  Ok(())
}

/// Clap already enforces exactly one input; anything else is reported
/// rather than guessed.
fn read_source(cli: &Cli) -> CompileResult<String> {
  match (&cli.source, &cli.file) {
    (Some(source), None) => Ok(source.clone()),
    (None, Some(path)) => fs::read_to_string(path).context(ReadSourceSnafu { path }),
    _ => MissingInputSnafu.fail(),
  }
}

fn compile(source: &str, emit: Emit) -> CompileResult<String> {
  let tokens = tokenizer::tokenize(source)?;
  if emit == Emit::Tokens {
    let mut out = String::new();
    for token in &tokens {
      out.push_str(&format!("{:>4}  {:?} {:?}\n", token.loc, token.kind, token.text));
    }
    return Ok(out);
  }

  let program = parser::build_program(&tokens).map_err(|err| err.locate(source))?;
  match emit {
    Emit::Tree => Ok(format!("{program:#?}\n")),
    _ => codegen::render_program(&program),
  }
}
