// CLCore Global Context
//
// Runtime-wide state shared by readers and interpreters on every thread.

use crate::printer::{PrintOptions, Printer};
use crate::readtable::Readtable;
use crate::symbol::{PackageId, SymbolId, SymbolTable};
use crate::types::{Function, Primitive, PrimitiveFn, Value};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Symbols the reader and binder compare against by identity
#[derive(Debug, Clone)]
pub struct StandardSymbols {
    pub quote: SymbolId,
    pub function: SymbolId,
    pub lambda: SymbolId,
    pub backquote: SymbolId,
    pub comma: SymbolId,
    pub comma_atsign: SymbolId,
    pub comma_dot: SymbolId,
    pub progn: SymbolId,
    pub r#if: SymbolId,
    pub setq: SymbolId,
    pub defvar: SymbolId,
    pub defun: SymbolId,
    pub defmacro: SymbolId,
    pub and_optional: SymbolId,
    pub and_rest: SymbolId,
    pub and_body: SymbolId,
    pub and_key: SymbolId,
    pub and_aux: SymbolId,
    pub and_allow_other_keys: SymbolId,
    /// :ALLOW-OTHER-KEYS, the call-site override
    pub kw_allow_other_keys: SymbolId,
    /// Feature-expression operators
    pub kw_and: SymbolId,
    pub kw_or: SymbolId,
    pub kw_not: SymbolId,
}

impl StandardSymbols {
    fn new(symbols: &mut SymbolTable) -> Self {
        let mut cl = |name: &str| {
            let sym = symbols.intern_in(name, PackageId::COMMON_LISP);
            symbols.export_symbol(sym);
            sym
        };

        let quote = cl("QUOTE");
        let function = cl("FUNCTION");
        let lambda = cl("LAMBDA");
        let backquote = cl("BACKQUOTE");
        let comma = cl("COMMA");
        let comma_atsign = cl("COMMA-ATSIGN");
        let comma_dot = cl("COMMA-DOT");
        let progn = cl("PROGN");
        let r#if = cl("IF");
        let setq = cl("SETQ");
        let defvar = cl("DEFVAR");
        let defun = cl("DEFUN");
        let defmacro = cl("DEFMACRO");
        let and_optional = cl("&OPTIONAL");
        let and_rest = cl("&REST");
        let and_body = cl("&BODY");
        let and_key = cl("&KEY");
        let and_aux = cl("&AUX");
        let and_allow_other_keys = cl("&ALLOW-OTHER-KEYS");

        Self {
            quote,
            function,
            lambda,
            backquote,
            comma,
            comma_atsign,
            comma_dot,
            progn,
            r#if,
            setq,
            defvar,
            defun,
            defmacro,
            and_optional,
            and_rest,
            and_body,
            and_key,
            and_aux,
            and_allow_other_keys,
            kw_allow_other_keys: symbols.intern_keyword("ALLOW-OTHER-KEYS"),
            kw_and: symbols.intern_keyword("AND"),
            kw_or: symbols.intern_keyword("OR"),
            kw_not: symbols.intern_keyword("NOT"),
        }
    }

    /// Lambda-list markers, which may never name a variable
    pub fn is_lambda_list_marker(&self, sym: SymbolId) -> bool {
        [
            self.and_optional,
            self.and_rest,
            self.and_body,
            self.and_key,
            self.and_aux,
            self.and_allow_other_keys,
        ]
        .contains(&sym)
    }
}

/// State shared by every reader and interpreter of one runtime.
/// Safe to share across threads; the symbol table is behind a lock.
pub struct GlobalContext {
    pub symbols: RwLock<SymbolTable>,
    pub syms: StandardSymbols,
    pub readtable: Readtable,
}

impl GlobalContext {
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        let syms = StandardSymbols::new(&mut symbols);

        let globals = Self {
            symbols: RwLock::new(symbols),
            syms,
            readtable: Readtable::new(),
        };
        crate::primitives::register_primitives(&globals);
        globals
    }

    pub fn symbols(&self) -> RwLockReadGuard<'_, SymbolTable> {
        self.symbols.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn symbols_mut(&self) -> RwLockWriteGuard<'_, SymbolTable> {
        self.symbols.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a built-in as the function of an exported COMMON-LISP symbol
    pub fn register_primitive(&self, name: &'static str, func: PrimitiveFn) {
        let mut table = self.symbols_mut();
        let sym = table.intern_in(name, PackageId::COMMON_LISP);
        table.export_symbol(sym);
        let function = Value::Function(Function::Primitive(Primitive { name, func }));
        table.set_symbol_function(sym, function);
    }

    /// Intern in CL-USER
    pub fn intern(&self, name: &str) -> SymbolId {
        self.intern_in(name, PackageId::CL_USER)
    }

    pub fn intern_in(&self, name: &str, pkg: PackageId) -> SymbolId {
        self.symbols_mut().intern_in(&name.to_uppercase(), pkg)
    }

    pub fn intern_keyword(&self, name: &str) -> SymbolId {
        self.symbols_mut().intern_keyword(&name.to_uppercase())
    }

    /// Symbol value for `name` in CL-USER
    pub fn symbol(&self, name: &str) -> Value {
        Value::Symbol(self.intern(name))
    }

    pub fn keyword(&self, name: &str) -> Value {
        Value::Symbol(self.intern_keyword(name))
    }

    pub fn symbol_name(&self, sym: SymbolId) -> String {
        self.symbols()
            .symbol_name(sym)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#<symbol {}>", sym.0))
    }

    pub fn is_special(&self, sym: SymbolId) -> bool {
        self.symbols().is_special(sym)
    }

    /// Printed representation, for diagnostics
    pub fn render(&self, value: &Value) -> String {
        let table = self.symbols();
        Printer::new(&table, PrintOptions::default())
            .print(value)
            .to_string()
    }
}

impl Default for GlobalContext {
    fn default() -> Self {
        Self::new()
    }
}
