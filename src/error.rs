//! Shared error utilities used across the compilation pipeline.
//!
//! Every stage reports the first problem it finds and stops. Diagnostics are
//! formatted in a style reminiscent of chibicc, printing the offending source
//! line and pointing at the failing byte with a caret.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  /// A character that no token rule accepts, or an unrepresentable literal.
  #[snafu(display("{expr_line}\n{marker} {message}"))]
  Lex {
    expr_line: String,
    marker: String,
    loc: usize,
    message: String,
  },

  /// The token stream does not fit the grammar.
  #[snafu(display("{expr_line}\n{marker} {message}"))]
  Parse {
    expr_line: String,
    marker: String,
    loc: usize,
    message: String,
  },

  #[snafu(display("{expr_line}\n{marker} nesting exceeds the limit of {limit}"))]
  NestingTooDeep {
    expr_line: String,
    marker: String,
    loc: usize,
    limit: usize,
  },
}

impl CompileError {
  /// Construct a lexical error anchored at a byte offset in the source.
  pub fn lex(expr: &str, loc: usize, message: impl Into<String>) -> Self {
    let (expr_line, marker, loc) = locate(expr, loc);
    Self::Lex {
      expr_line,
      marker,
      loc,
      message: message.into(),
    }
  }

  /// Construct a syntax error anchored at a byte offset in the source.
  pub fn parse(expr: &str, loc: usize, message: impl Into<String>) -> Self {
    let (expr_line, marker, loc) = locate(expr, loc);
    Self::Parse {
      expr_line,
      marker,
      loc,
      message: message.into(),
    }
  }

  pub fn nesting_too_deep(expr: &str, loc: usize, limit: usize) -> Self {
    let (expr_line, marker, loc) = locate(expr, loc);
    Self::NestingTooDeep {
      expr_line,
      marker,
      loc,
      limit,
    }
  }

  /// Byte offset into the whole source where the failure was detected.
  pub fn loc(&self) -> usize {
    match self {
      Self::Lex { loc, .. } | Self::Parse { loc, .. } | Self::NestingTooDeep { loc, .. } => *loc,
    }
  }

  /// The human-readable part of the diagnostic, without the caret display.
  pub fn message(&self) -> String {
    match self {
      Self::Lex { message, .. } | Self::Parse { message, .. } => message.clone(),
      Self::NestingTooDeep { limit, .. } => format!("nesting exceeds the limit of {limit}"),
    }
  }
}

/// Resolve `loc` to the source line containing it and a caret marker placed
/// under the failing byte. Offsets past the end are clamped to the input length.
fn locate(expr: &str, loc: usize) -> (String, String, usize) {
  let mut loc = loc.min(expr.len());
  while !expr.is_char_boundary(loc) {
    loc -= 1;
  }

  let line_start = expr[..loc].rfind('\n').map_or(0, |idx| idx + 1);
  let line_end = expr[loc..].find('\n').map_or(expr.len(), |idx| loc + idx);
  let expr_line = expr[line_start..line_end].to_string();
  let marker = format!("{}^", " ".repeat(loc - line_start));
  (expr_line, marker, loc)
}
