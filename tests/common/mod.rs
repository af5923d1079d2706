//! Shared helpers for the ncc integration tests.
//!
//! # Usage
//!
//! ```ignore
//! #[macro_use]
//! mod common;
//! use common::*;
//! ```
//!
//! - [`run`] - Compile a program and execute the emitted assembly
//! - [`compile_err`] - Compile a program that is expected to fail
//! - [`execute`] - Execute already generated assembly text
//!
//! Execution uses a tiny interpreter for exactly the subset of Intel-syntax
//! x86-64 the code generator emits, so the tests need no assembler or linker.

#![allow(dead_code, unused_macros)]

use std::collections::HashMap;

pub use ncc::{CompileError, compile, generate_assembly};

const STACK_TOP: i64 = 0x7fff_0000;
const RETURN_SENTINEL: i64 = -0xdead;
const STEP_LIMIT: usize = 1_000_000;

/// Compile `source` and return the value left in `rax` when `main` returns.
pub fn run(source: &str) -> i64 {
  let asm = generate_assembly(source)
    .unwrap_or_else(|err| panic!("failed to compile {source:?}:\n{err}"));
  execute(&asm)
}

/// Compile `source`, asserting that compilation fails.
pub fn compile_err(source: &str) -> CompileError {
  match generate_assembly(source) {
    Ok(asm) => panic!("expected {source:?} to fail, got:\n{asm}"),
    Err(err) => err,
  }
}

/// Assert that a program evaluates to the expected value.
macro_rules! assert_run {
  ($source:expr, $expected:expr) => {{
    let source = $source;
    assert_eq!(
      $crate::common::run(source),
      $expected,
      "program: {}",
      source
    );
  }};
}

/// Run generated assembly starting at `main` until it returns.
pub fn execute(asm: &str) -> i64 {
  let lines: Vec<&str> = asm
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .collect();
  let labels: HashMap<&str, usize> = lines
    .iter()
    .enumerate()
    .filter_map(|(idx, line)| line.strip_suffix(':').map(|name| (name, idx)))
    .collect();

  let mut machine = Machine::new();
  machine.push(RETURN_SENTINEL);

  let mut pc = labels["main"] + 1;
  for _ in 0..STEP_LIMIT {
    let line = lines[pc];
    pc += 1;
    if line.ends_with(':') || line.starts_with('.') {
      continue;
    }

    let (mnemonic, rest) = line.split_once(' ').unwrap_or((line, ""));
    let operands: Vec<&str> = rest.split(", ").filter(|op| !op.is_empty()).collect();

    match (mnemonic, operands.as_slice()) {
      ("push", [src]) => {
        let value = machine.read(src);
        machine.push(value);
      }
      ("pop", [dst]) => {
        let value = machine.pop();
        machine.write(dst, value);
      }
      ("mov", [dst, src]) => {
        let value = machine.read(src);
        machine.write(dst, value);
      }
      ("lea", [dst, src]) => {
        let inner = memory_operand(src).unwrap_or_else(|| panic!("lea needs memory: {line}"));
        let addr = machine.address(inner);
        machine.write(dst, addr);
      }
      ("add", [dst, src]) => machine.binary(dst, src, i64::wrapping_add),
      ("sub", [dst, src]) => machine.binary(dst, src, i64::wrapping_sub),
      ("imul", [dst, src]) => machine.binary(dst, src, i64::wrapping_mul),
      ("cqo", []) => {
        let rax = machine.reg("rax");
        machine.write("rdx", if rax < 0 { -1 } else { 0 });
      }
      ("idiv", [src]) => {
        let divisor = machine.read(src);
        let dividend = machine.reg("rax");
        machine.write("rax", dividend.wrapping_div(divisor));
        machine.write("rdx", dividend.wrapping_rem(divisor));
      }
      ("cmp", [lhs, rhs]) => machine.flags = (machine.read(lhs), machine.read(rhs)),
      ("sete" | "setne" | "setl" | "setle", ["al"]) => {
        let (lhs, rhs) = machine.flags;
        let bit = match mnemonic {
          "sete" => lhs == rhs,
          "setne" => lhs != rhs,
          "setl" => lhs < rhs,
          _ => lhs <= rhs,
        };
        let rax = machine.reg("rax");
        machine.write("rax", (rax & !0xff) | i64::from(bit));
      }
      ("movzx", ["rax", "al"]) => {
        let rax = machine.reg("rax");
        machine.write("rax", rax & 0xff);
      }
      ("je", [label]) => {
        let (lhs, rhs) = machine.flags;
        if lhs == rhs {
          pc = labels[label];
        }
      }
      ("ret", []) => {
        let target = machine.pop();
        assert_eq!(target, RETURN_SENTINEL, "returned to a bogus address");
        assert_eq!(machine.reg("rsp"), STACK_TOP, "stack is unbalanced");
        return machine.reg("rax");
      }
      _ => panic!("unsupported instruction: {line}"),
    }
  }

  panic!("program did not return within {STEP_LIMIT} steps");
}

fn memory_operand(operand: &str) -> Option<&str> {
  operand.strip_prefix('[')?.strip_suffix(']')
}

struct Machine {
  regs: HashMap<String, i64>,
  memory: HashMap<i64, i64>,
  flags: (i64, i64),
}

impl Machine {
  fn new() -> Self {
    let regs = ["rax", "rdi", "rdx", "rbp"]
      .into_iter()
      .map(|reg| (reg.to_string(), 0))
      .chain([("rsp".to_string(), STACK_TOP)])
      .collect();
    Self {
      regs,
      memory: HashMap::new(),
      flags: (0, 0),
    }
  }

  fn reg(&self, name: &str) -> i64 {
    *self
      .regs
      .get(name)
      .unwrap_or_else(|| panic!("unknown register {name}"))
  }

  fn address(&self, expr: &str) -> i64 {
    match expr.split_once('-') {
      Some((base, offset)) => self.reg(base) - offset.parse::<i64>().expect("numeric offset"),
      None => self.reg(expr),
    }
  }

  fn read(&self, operand: &str) -> i64 {
    if let Some(inner) = memory_operand(operand) {
      let addr = self.address(inner);
      return self.memory.get(&addr).copied().unwrap_or(0);
    }
    if let Some(value) = self.regs.get(operand) {
      return *value;
    }
    operand
      .parse()
      .unwrap_or_else(|_| panic!("unknown operand {operand}"))
  }

  fn write(&mut self, operand: &str, value: i64) {
    if let Some(inner) = memory_operand(operand) {
      let addr = self.address(inner);
      self.memory.insert(addr, value);
    } else {
      assert!(self.regs.contains_key(operand), "unknown register {operand}");
      self.regs.insert(operand.to_string(), value);
    }
  }

  fn binary(&mut self, dst: &str, src: &str, op: fn(i64, i64) -> i64) {
    let value = op(self.read(dst), self.read(src));
    self.write(dst, value);
  }

  fn push(&mut self, value: i64) {
    let rsp = self.reg("rsp") - 8;
    self.write("rsp", rsp);
    self.memory.insert(rsp, value);
  }

  fn pop(&mut self) -> i64 {
    let rsp = self.reg("rsp");
    let value = self
      .memory
      .get(&rsp)
      .copied()
      .unwrap_or_else(|| panic!("pop from empty stack slot {rsp:#x}"));
    self.write("rsp", rsp + 8);
    value
  }
}
