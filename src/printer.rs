// CLCore Printer - Value Output
//
// Printed representation for diagnostics, error messages and tests.

use crate::closure::ClosureKind;
use crate::symbol::{PackageId, SymbolId, SymbolTable};
use crate::types::{Function, Value};

/// Print options
#[derive(Debug, Clone)]
pub struct PrintOptions {
    /// Print readably (escape strings and characters)
    pub escape: bool,
    /// Print with package prefixes
    pub package_prefix: bool,
    /// Maximum depth to print
    pub max_depth: usize,
    /// Maximum list length to print
    pub max_length: usize,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            escape: true,
            package_prefix: true,
            max_depth: 100,
            max_length: 1000,
        }
    }
}

impl PrintOptions {
    /// For prin1 (readable)
    pub fn prin1() -> Self {
        Self::default()
    }

    /// For princ (human-readable)
    pub fn princ() -> Self {
        Self {
            escape: false,
            ..Self::default()
        }
    }
}

pub struct Printer<'a> {
    symbols: &'a SymbolTable,
    output: String,
    options: PrintOptions,
    current_depth: usize,
}

impl<'a> Printer<'a> {
    pub fn new(symbols: &'a SymbolTable, options: PrintOptions) -> Self {
        Self {
            symbols,
            output: String::new(),
            options,
            current_depth: 0,
        }
    }

    /// Print a value to string
    pub fn print(&mut self, value: &Value) -> &str {
        self.print_value(value);
        &self.output
    }

    fn print_value(&mut self, value: &Value) {
        if self.current_depth > self.options.max_depth {
            self.output.push_str("...");
            return;
        }

        self.current_depth += 1;

        match value {
            Value::Nil => self.output.push_str("NIL"),
            Value::T => self.output.push('T'),
            Value::Fixnum(n) => self.output.push_str(&n.to_string()),
            Value::Bignum(n) => self.output.push_str(&n.to_string()),
            Value::Char(c) => self.print_char(*c),
            Value::String(s) => self.print_string(s),
            Value::Symbol(id) => self.print_symbol(*id),
            Value::Cons(_) => self.print_list(value),
            Value::Vector(items) => {
                self.output.push('#');
                self.print_sequence(items.iter(), &Value::Nil);
            }
            Value::Function(f) => self.print_function(f),
        }

        self.current_depth -= 1;
    }

    fn print_char(&mut self, c: char) {
        if !self.options.escape {
            self.output.push(c);
            return;
        }
        // #\ is followed by exactly one character, never a name
        self.output.push_str("#\\");
        self.output.push(c);
    }

    fn print_string(&mut self, s: &str) {
        if !self.options.escape {
            self.output.push_str(s);
            return;
        }
        self.output.push('"');
        for c in s.chars() {
            if c == '"' || c == '\\' {
                self.output.push('\\');
            }
            self.output.push(c);
        }
        self.output.push('"');
    }

    fn print_symbol(&mut self, id: SymbolId) {
        let Some(sym) = self.symbols.get_symbol(id) else {
            self.output.push_str(&format!("#<symbol:{}>", id.0));
            return;
        };

        match sym.package {
            Some(PackageId::KEYWORD) => self.output.push(':'),
            None if self.options.escape => self.output.push_str("#:"),
            Some(pkg_id)
                if self.options.package_prefix
                    && pkg_id != PackageId::CL_USER
                    && pkg_id != PackageId::COMMON_LISP =>
            {
                if let Some(name) = self.symbols.package_name(pkg_id) {
                    self.output.push_str(name);
                    self.output
                        .push_str(if self.symbols.is_external(id) { ":" } else { "::" });
                }
            }
            _ => {}
        }
        self.output.push_str(&sym.name);
    }

    fn print_list(&mut self, value: &Value) {
        let mut tail = value;
        while let Value::Cons(c) = tail {
            tail = &c.cdr;
        }
        let tail = tail.clone();
        self.print_sequence(value.iter(), &tail);
    }

    /// Parenthesized elements, then ` . tail` for a dotted list
    fn print_sequence<'v>(&mut self, items: impl Iterator<Item = &'v Value>, tail: &Value) {
        self.output.push('(');
        for (count, item) in items.enumerate() {
            if count >= self.options.max_length {
                self.output.push_str(" ...");
                self.output.push(')');
                return;
            }
            if count > 0 {
                self.output.push(' ');
            }
            self.print_value(item);
        }
        if !tail.is_nil() {
            self.output.push_str(" . ");
            self.print_value(tail);
        }
        self.output.push(')');
    }

    fn print_function(&mut self, f: &Function) {
        match f {
            Function::Primitive(p) => {
                self.output.push_str("#<PRIMITIVE ");
                self.output.push_str(p.name);
                self.output.push('>');
            }
            Function::Closure(c) => {
                self.output.push_str(match c.kind() {
                    ClosureKind::Function => "#<CLOSURE ",
                    ClosureKind::Macro => "#<MACRO ",
                });
                match c.name() {
                    Some(name) => self.output.push_str(name),
                    None => self.print_value(&c.lambda_expression(self.lambda_symbol())),
                }
                self.output.push('>');
            }
        }
    }

    fn lambda_symbol(&self) -> Value {
        self.symbols
            .find_symbol("LAMBDA", PackageId::COMMON_LISP)
            .map(Value::Symbol)
            .unwrap_or(Value::Nil)
    }
}

/// Print value to string (like prin1-to-string)
pub fn print_to_string(symbols: &SymbolTable, value: &Value) -> String {
    let mut printer = Printer::new(symbols, PrintOptions::prin1());
    printer.print(value).to_string()
}

/// Print value without escapes (like princ-to-string)
pub fn princ_to_string(symbols: &SymbolTable, value: &Value) -> String {
    let mut printer = Printer::new(symbols, PrintOptions::princ());
    printer.print(value).to_string()
}
