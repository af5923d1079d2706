//! Recursive-descent parser producing a statement list and expression AST.
//!
//! The parser mirrors the classic chibicc structure: one helper per
//! precedence level, with the binary levels built iteratively into a
//! left-leaning tree and assignment recursing into itself to associate to the
//! right. Identifiers are bound to frame slots as they are parsed.
//!
//! ```text
//! program    = statement*
//! statement  = expr ";" | "return" expr ";" | "if" "(" expr ")" statement
//! expr       = assign
//! assign     = equality ("=" assign)?
//! equality   = relational ("==" relational | "!=" relational)*
//! relational = add (">=" add | "<=" add | ">" add | "<" add)*
//! add        = mul ("+" mul | "-" mul)*
//! mul        = unary ("*" unary | "/" unary)*
//! unary      = ("+" | "-")? primary
//! primary    = num | ident | "(" expr ")"
//! ```

use tracing::debug;

use crate::error::{CompileError, CompileResult};
use crate::locals::LocalTable;
use crate::tokenizer::{Token, TokenKind, describe_token, token_text};

/// Deepest statement/expression nesting accepted before parsing gives up.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Tallest syntax tree accepted. Code generation recurses once per level, so
/// this also bounds flat operator chains such as `1+1+...+1`.
pub const MAX_TREE_HEIGHT: usize = 2048;

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

/// Syntax tree produced by the parser. Statements and expressions share one
/// node type; `Return` and `If` only ever appear in statement position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstNode {
  Num {
    value: i64,
  },
  /// A local variable, already resolved to its offset below `rbp`.
  Var {
    offset: usize,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<AstNode>,
    rhs: Box<AstNode>,
  },
  Assign {
    lhs: Box<AstNode>,
    rhs: Box<AstNode>,
  },
  Return {
    operand: Box<AstNode>,
  },
  If {
    cond: Box<AstNode>,
    then: Box<AstNode>,
  },
}

impl AstNode {
  pub fn number(value: i64) -> Self {
    Self::Num { value }
  }

  pub fn var(offset: usize) -> Self {
    Self::Var { offset }
  }

  pub fn binary(op: BinaryOp, lhs: AstNode, rhs: AstNode) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn assign(lhs: AstNode, rhs: AstNode) -> Self {
    Self::Assign {
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn ret(operand: AstNode) -> Self {
    Self::Return {
      operand: Box::new(operand),
    }
  }

  pub fn if_then(cond: AstNode, then: AstNode) -> Self {
    Self::If {
      cond: Box::new(cond),
      then: Box::new(then),
    }
  }
}

/// A parsed translation unit: the top-level statements in source order and
/// every local they mention.
///
/// Only [`parse`] builds a `Program`, so code generation can rely on its
/// shape: assignment targets are variables, `Return` and `If` appear only in
/// statement position, and no tree is taller than [`MAX_TREE_HEIGHT`].
///
/// ```compile_fail
/// let program = ncc::Program {
///   body: vec![ncc::parser::AstNode::number(1)],
///   locals: ncc::locals::LocalTable::new(),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Program {
  pub(crate) body: Vec<AstNode>,
  pub(crate) locals: LocalTable,
}

impl Program {
  /// Top-level statements in source order.
  pub fn body(&self) -> &[AstNode] {
    &self.body
  }

  pub fn locals(&self) -> &LocalTable {
    &self.locals
  }

  /// Bytes of stack the prologue must reserve for locals.
  pub fn stack_size(&self) -> usize {
    self.locals.stack_size()
  }
}

/// Parse a sequence of statements from the token stream.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Program> {
  let mut parser = Parser::new(tokens, source);
  let mut body = Vec::new();

  while !parser.is_eof() {
    body.push(parser.stmt()?);
  }

  debug!(
    statements = body.len(),
    locals = parser.locals.len(),
    "parsed program"
  );
  Ok(Program {
    body,
    locals: parser.locals,
  })
}

/// Cursor over the token vector plus the state parsing accumulates.
struct Parser<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
  depth: usize,
  /// Height of the tree most recently returned by a parsing method.
  height: usize,
  locals: LocalTable,
}

impl<'a> Parser<'a> {
  /// Take ownership of the token stream; parsing advances `pos` as it consumes input.
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
      depth: 0,
      height: 0,
      locals: LocalTable::new(),
    }
  }

  fn stmt(&mut self) -> CompileResult<AstNode> {
    self.nested(|p| {
      let loc = p.loc();
      if p.consume_kind(TokenKind::Return) {
        let operand = p.expr()?;
        p.skip(";")?;
        p.grow(0, loc)?;
        return Ok(AstNode::ret(operand));
      }

      if p.consume_kind(TokenKind::If) {
        p.skip("(")?;
        let cond = p.expr()?;
        let cond_height = p.height;
        p.skip(")")?;
        let then = p.stmt()?;
        p.grow(cond_height, loc)?;
        return Ok(AstNode::if_then(cond, then));
      }

      let node = p.expr()?;
      p.skip(";")?;
      Ok(node)
    })
  }

  fn expr(&mut self) -> CompileResult<AstNode> {
    self.nested(Self::assign)
  }

  fn assign(&mut self) -> CompileResult<AstNode> {
    let start = self.loc();
    let node = self.equality()?;

    let loc = self.loc();
    if self.equal("=") {
      if !matches!(node, AstNode::Var { .. }) {
        return Err(CompileError::parse(
          self.source,
          start,
          "expected an lvalue on the left of \"=\"",
        ));
      }
      let lhs_height = self.height;
      let rhs = self.nested(Self::assign)?;
      self.grow(lhs_height, loc)?;
      return Ok(AstNode::assign(node, rhs));
    }

    Ok(node)
  }

  fn equality(&mut self) -> CompileResult<AstNode> {
    self.left_assoc(
      &[("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)],
      Self::relational,
    )
  }

  fn relational(&mut self) -> CompileResult<AstNode> {
    self.left_assoc(
      &[
        (">=", BinaryOp::Ge),
        ("<=", BinaryOp::Le),
        (">", BinaryOp::Gt),
        ("<", BinaryOp::Lt),
      ],
      Self::add,
    )
  }

  fn add(&mut self) -> CompileResult<AstNode> {
    self.left_assoc(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], Self::mul)
  }

  fn mul(&mut self) -> CompileResult<AstNode> {
    self.left_assoc(&[("*", BinaryOp::Mul), ("/", BinaryOp::Div)], Self::unary)
  }

  /// Parse `operand (op operand)*`, folding into a left-leaning tree. Every
  /// fold adds a level, so long chains are bounded by `MAX_TREE_HEIGHT`.
  fn left_assoc(
    &mut self,
    ops: &[(&str, BinaryOp)],
    operand: fn(&mut Self) -> CompileResult<AstNode>,
  ) -> CompileResult<AstNode> {
    let mut node = operand(self)?;

    loop {
      let loc = self.loc();
      let Some(op) = self.consume_op(ops) else {
        break;
      };
      let lhs_height = self.height;
      let rhs = operand(self)?;
      self.grow(lhs_height, loc)?;
      node = AstNode::binary(op, node, rhs);
    }

    Ok(node)
  }

  fn unary(&mut self) -> CompileResult<AstNode> {
    if self.equal("+") {
      return self.primary();
    }

    // Negation is lowered to `0 - operand`.
    let loc = self.loc();
    if self.equal("-") {
      let operand = self.primary()?;
      self.grow(1, loc)?;
      return Ok(AstNode::binary(BinaryOp::Sub, AstNode::number(0), operand));
    }

    self.primary()
  }

  fn primary(&mut self) -> CompileResult<AstNode> {
    if self.equal("(") {
      let node = self.expr()?;
      self.skip(")")?;
      return Ok(node);
    }

    if self.peek().map(|token| token.kind) == Some(TokenKind::Ident) {
      let name = self.get_ident()?;
      let offset = self.locals.resolve(name);
      self.height = 1;
      return Ok(AstNode::var(offset));
    }

    let value = self.get_number()?;
    self.height = 1;
    Ok(AstNode::number(value))
  }

  /// Record the height of a node built over a subtree of `lhs_height` and the
  /// subtree just parsed, failing once it exceeds `MAX_TREE_HEIGHT`.
  fn grow(&mut self, lhs_height: usize, loc: usize) -> CompileResult<()> {
    let height = lhs_height.max(self.height) + 1;
    if height > MAX_TREE_HEIGHT {
      return Err(CompileError::nesting_too_deep(
        self.source,
        loc,
        MAX_TREE_HEIGHT,
      ));
    }
    self.height = height;
    Ok(())
  }

  /// Run `f` one nesting level deeper, failing once the limit is exceeded.
  fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> CompileResult<T>) -> CompileResult<T> {
    if self.depth >= MAX_NESTING_DEPTH {
      return Err(CompileError::nesting_too_deep(
        self.source,
        self.loc(),
        MAX_NESTING_DEPTH,
      ));
    }
    self.depth += 1;
    let result = f(self);
    self.depth -= 1;
    result
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  /// Byte offset of the current token, or the end of input once exhausted.
  fn loc(&self) -> usize {
    self.peek().map_or(self.source.len(), |token| token.loc)
  }

  /// Consume the current token if it matches the provided punctuator.
  fn equal(&mut self, op: &str) -> bool {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Punctuator
      && token.len == op.len()
      && token_text(token, self.source) == op
    {
      self.pos += 1;
      return true;
    }
    false
  }

  /// Consume the first punctuator in `ops` that matches the current token.
  fn consume_op(&mut self, ops: &[(&str, BinaryOp)]) -> Option<BinaryOp> {
    ops
      .iter()
      .find(|(text, _)| self.equal(text))
      .map(|&(_, op)| op)
  }

  fn consume_kind(&mut self, kind: TokenKind) -> bool {
    if self.peek().map(|token| token.kind) == Some(kind) {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      let got = describe_token(self.peek(), self.source);
      Err(CompileError::parse(
        self.source,
        self.loc(),
        format!("expected \"{s}\", but got \"{got}\""),
      ))
    }
  }

  /// Parse the current token as an integer literal.
  fn get_number(&mut self) -> CompileResult<i64> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Num
    {
      let value = token.value.ok_or_else(|| {
        CompileError::parse(
          self.source,
          token.loc,
          "internal error: numeric token missing value",
        )
      })?;
      self.pos += 1;
      return Ok(value);
    }

    let got = describe_token(self.peek(), self.source);
    Err(CompileError::parse(
      self.source,
      self.loc(),
      format!("expected a number, but got \"{got}\""),
    ))
  }

  /// Parse the current token as an identifier, returning its text.
  fn get_ident(&mut self) -> CompileResult<&'a str> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Ident
    {
      let name = token_text(token, self.source);
      self.pos += 1;
      return Ok(name);
    }

    let got = describe_token(self.peek(), self.source);
    Err(CompileError::parse(
      self.source,
      self.loc(),
      format!("expected an identifier, but got \"{got}\""),
    ))
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof) | None)
  }
}
