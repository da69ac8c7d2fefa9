// CLCore Process - Per-Thread Dynamic State
//
// Each thread that evaluates owns one Process. Shared state lives in GlobalContext.

use crate::symbol::SymbolId;
use crate::types::Value;

/// A dynamic-extent binding of a special variable
#[derive(Debug, Clone)]
pub struct SpecialBinding {
    pub symbol: SymbolId,
    pub value: Value,
}

/// Process-local evaluation state
#[derive(Debug, Default)]
pub struct Process {
    /// Dynamic bindings, innermost last
    specials: Vec<SpecialBinding>,
}

impl Process {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marker for `unwind_to`
    pub fn dynamic_depth(&self) -> usize {
        self.specials.len()
    }

    pub fn bind_special(&mut self, symbol: SymbolId, value: Value) {
        self.specials.push(SpecialBinding { symbol, value });
    }

    /// Innermost dynamic binding of `symbol`
    pub fn lookup_special(&self, symbol: SymbolId) -> Option<&Value> {
        self.specials
            .iter()
            .rev()
            .find(|b| b.symbol == symbol)
            .map(|b| &b.value)
    }

    /// Assign the innermost dynamic binding. False if `symbol` is not dynamically bound.
    pub fn set_special(&mut self, symbol: SymbolId, value: Value) -> bool {
        match self.specials.iter_mut().rev().find(|b| b.symbol == symbol) {
            Some(binding) => {
                binding.value = value;
                true
            }
            None => false,
        }
    }

    /// Drop every binding made since `depth` was recorded
    pub fn unwind_to(&mut self, depth: usize) {
        self.specials.truncate(depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_innermost_binding_wins() {
        let mut p = Process::default();
        let x = SymbolId(7);
        let depth = p.dynamic_depth();
        p.bind_special(x, Value::Fixnum(1));
        p.bind_special(x, Value::Fixnum(2));
        assert_eq!(p.lookup_special(x), Some(&Value::Fixnum(2)));

        assert!(p.set_special(x, Value::Fixnum(3)));
        assert_eq!(p.lookup_special(x), Some(&Value::Fixnum(3)));

        p.unwind_to(depth + 1);
        assert_eq!(p.lookup_special(x), Some(&Value::Fixnum(1)));
        p.unwind_to(depth);
        assert_eq!(p.lookup_special(x), None);
        assert!(!p.set_special(x, Value::Nil));
    }
}
