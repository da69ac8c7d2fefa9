// CLCore Value Model - Symbolic Data
//
// The closed set of values produced by the reader and consumed by the binder.

use crate::closure::Closure;
use crate::conditions::LispResult;
use crate::eval::Interpreter;
pub use crate::symbol::SymbolId;
use num_bigint::BigInt;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Signature of a built-in function.
pub type PrimitiveFn = fn(&mut Interpreter, &[Value]) -> LispResult<Value>;

/// A symbolic value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Nil,
    T,
    /// Machine-width integer (the fast path)
    Fixnum(i64),
    /// Arbitrary precision integer, only produced by arithmetic overflow
    Bignum(BigInt),
    Char(char),
    String(Arc<str>),
    Symbol(SymbolId),
    Cons(Arc<Cons>),
    Vector(Arc<[Value]>),
    Function(Function),
}

/// An ordered pair. Immutable once it escapes a `ListBuilder`.
#[derive(Clone, Debug)]
pub struct Cons {
    pub car: Value,
    pub cdr: Value,
}

#[derive(Clone, Debug)]
pub enum Function {
    Closure(Arc<Closure>),
    Primitive(Primitive),
}

#[derive(Clone, Copy)]
pub struct Primitive {
    pub name: &'static str,
    pub func: PrimitiveFn,
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<PRIMITIVE {}>", self.name)
    }
}

impl Value {
    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Cons(Arc::new(Cons { car, cdr }))
    }

    pub fn string(s: impl Into<Arc<str>>) -> Value {
        Value::String(s.into())
    }

    pub fn boolean(b: bool) -> Value {
        if b {
            Value::T
        } else {
            Value::Nil
        }
    }

    /// Build a proper list.
    pub fn list<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Value::Nil, |tail, item| Value::cons(item, tail))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::Nil | Value::Cons(_))
    }

    pub fn as_symbol(&self) -> Option<SymbolId> {
        match self {
            Value::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    /// Type name used in messages that have no symbol table to print with
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "null",
            Value::T => "boolean",
            Value::Fixnum(_) => "fixnum",
            Value::Bignum(_) => "bignum",
            Value::Char(_) => "character",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Cons(_) => "cons",
            Value::Vector(_) => "vector",
            Value::Function(_) => "function",
        }
    }

    pub fn car(&self) -> Option<&Value> {
        match self {
            Value::Cons(c) => Some(&c.car),
            _ => None,
        }
    }

    pub fn cdr(&self) -> Option<&Value> {
        match self {
            Value::Cons(c) => Some(&c.cdr),
            _ => None,
        }
    }

    /// Iterate the cars of a list. Stops at the first non-cons tail.
    pub fn iter(&self) -> ListIter<'_> {
        ListIter { current: self }
    }

    /// Elements of a proper list, or `None` for an improper list or a non-list.
    pub fn to_vec(&self) -> Option<Vec<Value>> {
        let mut items = Vec::new();
        let mut current = self;
        loop {
            match current {
                Value::Nil => return Some(items),
                Value::Cons(c) => {
                    items.push(c.car.clone());
                    current = &c.cdr;
                }
                _ => return None,
            }
        }
    }

    /// Identity comparison (EQ).
    pub fn is_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) | (Value::T, Value::T) => true,
            (Value::Fixnum(a), Value::Fixnum(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => Arc::ptr_eq(a, b),
            (Value::Cons(a), Value::Cons(b)) => Arc::ptr_eq(a, b),
            (Value::Vector(a), Value::Vector(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.same(b),
            _ => false,
        }
    }
}

impl Function {
    fn same(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Closure(a), Function::Closure(b)) => Arc::ptr_eq(a, b),
            (Function::Primitive(a), Function::Primitive(b)) => a.name == b.name,
            _ => false,
        }
    }
}

/// Structural equality (EQUAL, extended to vectors).
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bignum(a), Value::Bignum(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Cons(a), Value::Cons(b)) => a.car == b.car && a.cdr == b.cdr,
            (Value::Vector(a), Value::Vector(b)) => a == b,
            _ => self.is_eq(other),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Fixnum(n)
    }
}

impl From<SymbolId> for Value {
    fn from(s: SymbolId) -> Self {
        Value::Symbol(s)
    }
}

pub struct ListIter<'a> {
    current: &'a Value,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<&'a Value> {
        match self.current {
            Value::Cons(c) => {
                self.current = &c.cdr;
                Some(&c.car)
            }
            _ => None,
        }
    }
}

/// Accumulates list elements front to back, then freezes them into conses.
/// The mutable phase never escapes: `finish` consumes the builder.
#[derive(Debug, Default)]
pub struct ListBuilder {
    items: SmallVec<[Value; 8]>,
    tail: Value,
}

impl ListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: Value) {
        self.items.push(item);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Terminate with a non-nil tail, making a dotted list.
    pub fn set_tail(&mut self, tail: Value) {
        self.tail = tail;
    }

    pub fn is_dotted(&self) -> bool {
        !self.tail.is_nil()
    }

    pub fn finish(self) -> Value {
        self.items
            .into_iter()
            .rev()
            .fold(self.tail, |tail, item| Value::cons(item, tail))
    }

    /// Freeze the accumulated elements as a vector. The tail is ignored.
    pub fn finish_vector(self) -> Value {
        Value::Vector(self.items.into_iter().collect())
    }
}
