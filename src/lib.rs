//! Crate root: wires together the compilation pipeline.
//!
//! The stages are small and run strictly in order:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns the statement list,
//!   binding identifiers through `locals` as it goes.
//! - `codegen` lowers the parsed program into x86-64 Intel-syntax assembly.
//! - `error` centralises the diagnostics shared by the other modules.

pub mod codegen;
pub mod error;
pub mod locals;
pub mod parser;
pub mod tokenizer;

pub use error::{CompileError, CompileResult};
pub use parser::Program;

/// Tokenize and parse `source`, returning the program ready for code generation.
pub fn compile(source: &str) -> CompileResult<Program> {
  let tokens = tokenizer::tokenize(source)?;
  parser::parse(tokens, source)
}

/// Compile a source string into Intel-syntax assembly.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  let program = compile(source)?;
  Ok(codegen::generate(&program))
}
