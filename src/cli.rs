use std::path::PathBuf;

use clap::Parser;

/// Compile a tiny C-like program to x86-64 assembly.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
  /// The full program source, e.g. "a=3; b=a*2; return b+1;".
  #[arg(allow_hyphen_values = true)]
  pub input: String,

  /// The output file. If not specified, prints assembly to stdout.
  #[arg(short, long)]
  pub output: Option<PathBuf>,

  /// Print the token stream to stderr before compiling.
  #[arg(long)]
  pub dump_tokens: bool,

  /// Print the parsed statements and the local variable table to stderr.
  #[arg(long)]
  pub dump_ast: bool,
}
