//! The local variable table.
//!
//! There is one flat namespace for the whole program. Names are bound to
//! frame slots the first time the parser sees them and never change after
//! that, so the offsets embedded in the AST are final.

use std::collections::HashMap;

use tracing::trace;

/// Size in bytes of a single variable slot.
pub const SLOT_SIZE: usize = 8;

/// A named stack slot, addressed as `rbp - offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Local {
  pub name: String,
  pub offset: usize,
}

/// Find-or-create mapping from identifier text to frame offset.
#[derive(Debug, Default, Clone)]
pub struct LocalTable {
  locals: Vec<Local>,
  by_name: HashMap<String, usize>,
}

impl LocalTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Return the offset bound to `name`, binding the next free slot if the
  /// name has not been seen before.
  pub fn resolve(&mut self, name: &str) -> usize {
    if let Some(&idx) = self.by_name.get(name) {
      return self.locals[idx].offset;
    }

    let offset = (self.locals.len() + 1) * SLOT_SIZE;
    trace!(name, offset, "bound new local");
    self.by_name.insert(name.to_string(), self.locals.len());
    self.locals.push(Local {
      name: name.to_string(),
      offset,
    });
    offset
  }

  /// Look a name up without binding it.
  pub fn get(&self, name: &str) -> Option<&Local> {
    self.by_name.get(name).map(|&idx| &self.locals[idx])
  }

  pub fn len(&self) -> usize {
    self.locals.len()
  }

  pub fn is_empty(&self) -> bool {
    self.locals.is_empty()
  }

  /// Locals in first-seen order.
  pub fn iter(&self) -> impl Iterator<Item = &Local> {
    self.locals.iter()
  }

  /// Bytes the prologue has to reserve below the frame pointer.
  pub fn stack_size(&self) -> usize {
    self.locals.len() * SLOT_SIZE
  }
}
