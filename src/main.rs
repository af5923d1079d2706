mod cli;

use std::fs;
use std::process;

use clap::Parser as _;
use ncc::{CompileResult, codegen, parser, tokenizer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let asm = match compile(&cli) {
    Ok(asm) => asm,
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  };

  match &cli.output {
    Some(path) => {
      if let Err(err) = fs::write(path, &asm) {
        eprintln!("cannot write {}: {err}", path.display());
        process::exit(1);
      }
      info!(path = %path.display(), "wrote assembly");
    }
    None => print!("{asm}"),
  }
}

/// Run the pipeline stage by stage so the debug dumps can see in between.
fn compile(cli: &Cli) -> CompileResult<String> {
  let source = cli.input.as_str();

  let tokens = tokenizer::tokenize(source)?;
  if cli.dump_tokens {
    for token in &tokens {
      eprintln!(
        "{:?} {}..{} {:?}",
        token.kind,
        token.loc,
        token.loc + token.len,
        tokenizer::token_text(token, source)
      );
    }
  }

  let program = parser::parse(tokens, source)?;
  if cli.dump_ast {
    for local in program.locals().iter() {
      eprintln!("local {} at [rbp-{}]", local.name, local.offset);
    }
    for stmt in program.body() {
      eprintln!("{stmt:#?}");
    }
  }

  Ok(codegen::generate(&program))
}
