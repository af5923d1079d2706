//! Code generation: lower the parsed AST into Intel-syntax x86-64 assembly.
//!
//! The emitter uses a simple stack machine: every expression leaves a single
//! value on the stack and expression statements pop it into `rax`, so the
//! last one evaluated becomes the exit status. Locals live on the stack frame
//! and are addressed relative to `rbp`.

use tracing::{debug, trace};

use crate::parser::{AstNode, BinaryOp, Program};

/// Emit assembly for a whole program with a fresh generator.
pub fn generate(program: &Program) -> String {
  CodeGen::new().generate(program)
}

/// Assembly emitter. Label numbering is local to one instance.
#[derive(Debug, Default)]
pub struct CodeGen {
  asm: String,
  label_count: usize,
}

impl CodeGen {
  pub fn new() -> Self {
    Self::default()
  }

  /// Consume the generator and return the assembly text for `program`.
  pub fn generate(mut self, program: &Program) -> String {
    self.asm.push_str(".intel_syntax noprefix\n");
    self.asm.push_str(".global main\n");
    self.asm.push_str("main:\n");
    self.emit("push rbp");
    self.emit("mov rbp, rsp");
    let stack_size = program.stack_size();
    if stack_size > 0 {
      self.emit(format!("sub rsp, {stack_size}"));
    }

    if program.body.is_empty() {
      self.emit("mov rax, 0");
    }
    for stmt in &program.body {
      self.emit_stmt(stmt);
    }

    self.emit_epilogue();
    debug!(stack_size, labels = self.label_count, "generated assembly");
    self.asm
  }

  fn emit(&mut self, line: impl AsRef<str>) {
    self.asm.push_str("    ");
    self.asm.push_str(line.as_ref());
    self.asm.push('\n');
  }

  fn emit_epilogue(&mut self) {
    self.emit("mov rsp, rbp");
    self.emit("pop rbp");
    self.emit("ret");
  }

  fn new_label(&mut self, prefix: &str) -> String {
    let label = format!(".L{prefix}{}", self.label_count);
    self.label_count += 1;
    trace!(%label, "allocated label");
    label
  }

  /// Emit a statement. Expression statements pop their value into `rax`;
  /// `return` and `if` leave nothing on the stack.
  fn emit_stmt(&mut self, node: &AstNode) {
    match node {
      AstNode::Return { operand } => {
        self.emit_expr(operand);
        self.emit("pop rax");
        self.emit_epilogue();
      }
      AstNode::If { cond, then } => {
        let end = self.new_label("end");
        self.emit_expr(cond);
        self.emit("pop rax");
        self.emit("cmp rax, 0");
        self.emit(format!("je {end}"));
        self.emit_stmt(then);
        self.asm.push_str(&format!("{end}:\n"));
      }
      _ => {
        self.emit_expr(node);
        self.emit("pop rax");
      }
    }
  }

  /// Emit stack-based code for a single expression node.
  fn emit_expr(&mut self, node: &AstNode) {
    match node {
      AstNode::Num { value } => {
        if i32::try_from(*value).is_ok() {
          self.emit(format!("push {value}"));
        } else {
          self.emit(format!("mov rax, {value}"));
          self.emit("push rax");
        }
      }
      AstNode::Var { .. } => {
        self.emit_addr(node);
        self.emit("pop rax");
        self.emit("mov rax, [rax]");
        self.emit("push rax");
      }
      AstNode::Binary { op, lhs, rhs } => {
        self.emit_expr(lhs);
        self.emit_expr(rhs);
        self.emit("pop rdi");
        self.emit("pop rax");
        match op {
          BinaryOp::Add => self.emit("add rax, rdi"),
          BinaryOp::Sub => self.emit("sub rax, rdi"),
          BinaryOp::Mul => self.emit("imul rax, rdi"),
          BinaryOp::Div => {
            self.emit("cqo");
            self.emit("idiv rdi");
          }
          BinaryOp::Eq => self.emit_compare("rax, rdi", "sete"),
          BinaryOp::Ne => self.emit_compare("rax, rdi", "setne"),
          BinaryOp::Lt => self.emit_compare("rax, rdi", "setl"),
          BinaryOp::Le => self.emit_compare("rax, rdi", "setle"),
          BinaryOp::Gt => self.emit_compare("rdi, rax", "setl"),
          BinaryOp::Ge => self.emit_compare("rdi, rax", "setle"),
        }
        self.emit("push rax");
      }
      AstNode::Assign { lhs, rhs } => {
        self.emit_addr(lhs);
        self.emit_expr(rhs);
        self.emit("pop rdi");
        self.emit("pop rax");
        self.emit("mov [rax], rdi");
        self.emit("push rdi");
      }
      // `Program` is only built by the parser, which never nests these.
      AstNode::Return { .. } | AstNode::If { .. } => {
        unreachable!("statement node in expression position")
      }
    }
  }

  fn emit_compare(&mut self, operands: &str, set: &str) {
    self.emit(format!("cmp {operands}"));
    self.emit(format!("{set} al"));
    self.emit("movzx rax, al");
  }

  /// Push the address of an lvalue.
  fn emit_addr(&mut self, node: &AstNode) {
    match node {
      AstNode::Var { offset } => {
        self.emit(format!("lea rax, [rbp-{offset}]"));
        self.emit("push rax");
      }
      _ => unreachable!("the parser only accepts variables as assignment targets"),
    }
  }
}
