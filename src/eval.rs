// CLCore Evaluator - Environments and a Minimal Interpreter
//
// Just enough evaluation for default forms, `#.` and closure bodies.

use crate::closure::{Closure, ClosureKind};
use crate::conditions::{LispError, LispResult};
use crate::context::GlobalContext;
use crate::process::Process;
use crate::reader::read_all;
use crate::symbol::SymbolId;
use crate::types::{Cons, Function, Value};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, PoisonError, RwLock};

/// Environment for lexical bindings
#[derive(Debug, Clone)]
pub struct Environment {
    /// Lexical bindings: SymbolId -> Value
    bindings: Arc<RwLock<HashMap<SymbolId, Value>>>,
    /// Parent environment (for nested scopes)
    parent: Option<Box<Environment>>,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            bindings: Arc::new(RwLock::new(HashMap::new())),
            parent: None,
        }
    }

    pub fn with_parent(parent: Environment) -> Self {
        Self {
            bindings: Arc::new(RwLock::new(HashMap::new())),
            parent: Some(Box::new(parent)),
        }
    }

    pub fn parent(&self) -> Option<&Environment> {
        self.parent.as_deref()
    }

    pub fn bind(&self, sym: SymbolId, val: Value) {
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(sym, val);
    }

    /// Assign the nearest existing binding. False if `sym` is not bound here or above.
    pub fn set(&self, sym: SymbolId, val: Value) -> bool {
        let mut guard = self.bindings.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = guard.get_mut(&sym) {
            *slot = val;
            return true;
        }
        drop(guard);

        match &self.parent {
            Some(parent) => parent.set(sym, val),
            None => false,
        }
    }

    pub fn lookup(&self, sym: SymbolId) -> Option<Value> {
        let found = self
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&sym)
            .cloned();
        found.or_else(|| self.parent.as_ref().and_then(|p| p.lookup(sym)))
    }

    /// Bound in this frame, ignoring parents
    pub fn is_bound_locally(&self, sym: SymbolId) -> bool {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&sym)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluates a form in a lexical environment
pub trait Evaluator {
    fn eval(&mut self, form: &Value, env: &Environment) -> LispResult<Value>;
}

/// The CLCore interpreter wrapper
/// Holds references to the current Process state and the global context.
pub struct Interpreter<'a> {
    pub process: &'a mut Process,
    pub globals: &'a GlobalContext,
}

impl<'a> Interpreter<'a> {
    pub fn new(process: &'a mut Process, globals: &'a GlobalContext) -> Self {
        Self { process, globals }
    }

    /// Open a dynamic extent. Special bindings made through the returned
    /// guard are dropped with it, on return or unwind.
    pub fn dynamic_extent(&mut self) -> DynamicExtent<'_, 'a> {
        let depth = self.process.dynamic_depth();
        DynamicExtent { interp: self, depth }
    }

    pub fn eval(&mut self, expr: &Value, env: &Environment) -> LispResult<Value> {
        match expr {
            Value::Symbol(sym) => self.symbol_value(*sym, env),
            Value::Cons(cons) => self.eval_compound(cons, env),
            atom => Ok(atom.clone()),
        }
    }

    /// Read every form in `text` and evaluate them in order at top level
    pub fn eval_string(&mut self, text: &str) -> LispResult<Value> {
        let env = Environment::new();
        let mut result = Value::Nil;
        for form in read_all(self.globals, text)? {
            result = self.eval(&form, &env)?;
        }
        Ok(result)
    }

    /// Lexical binding, then dynamic binding, then the global value
    pub fn symbol_value(&self, sym: SymbolId, env: &Environment) -> LispResult<Value> {
        if !self.globals.is_special(sym) {
            if let Some(val) = env.lookup(sym) {
                return Ok(val);
            }
        }
        if let Some(val) = self.process.lookup_special(sym) {
            return Ok(val.clone());
        }
        let global = self.globals.symbols().symbol_value(sym).cloned();
        global.ok_or_else(|| LispError::UnboundVariable {
            name: self.globals.symbol_name(sym),
        })
    }

    /// Bind a parameter: dynamically if `sym` is special, else in `env`
    pub fn bind_variable(&mut self, sym: SymbolId, value: Value, env: &Environment) {
        if self.globals.is_special(sym) {
            self.process.bind_special(sym, value);
        } else {
            env.bind(sym, value);
        }
    }

    fn set_variable(&mut self, sym: SymbolId, value: Value, env: &Environment) -> LispResult<()> {
        if self.globals.symbols().is_constant(sym) {
            return Err(LispError::ConstantAssignment {
                name: self.globals.symbol_name(sym),
            });
        }
        if !self.globals.is_special(sym) && env.set(sym, value.clone()) {
            return Ok(());
        }
        if self.process.set_special(sym, value.clone()) {
            return Ok(());
        }
        self.globals.symbols_mut().set_symbol_value(sym, value);
        Ok(())
    }

    fn eval_compound(&mut self, cons: &Cons, env: &Environment) -> LispResult<Value> {
        let args = &cons.cdr;
        let globals = self.globals;
        let syms = &globals.syms;

        if let Value::Symbol(op) = cons.car {
            if op == syms.quote {
                return self.eval_quote(args);
            } else if op == syms.function {
                return self.eval_function(args, env);
            } else if op == syms.lambda {
                let closure = self.make_closure(None, args, env)?;
                return Ok(Value::Function(Function::Closure(Arc::new(closure))));
            } else if op == syms.progn {
                return self.eval_progn(args, env);
            } else if op == syms.r#if {
                return self.eval_if(args, env);
            } else if op == syms.setq {
                return self.eval_setq(args, env);
            } else if op == syms.defvar {
                return self.eval_defvar(args, env);
            } else if op == syms.defun {
                return self.eval_define(args, env, ClosureKind::Function);
            } else if op == syms.defmacro {
                return self.eval_define(args, env, ClosureKind::Macro);
            }

            let function = self.function_cell(op)?;

            if let Value::Function(Function::Closure(closure)) = &function {
                if closure.kind() == ClosureKind::Macro {
                    let operands = self.form_list(args)?;
                    let expansion = closure.invoke(self, &operands)?;
                    return self.eval(&expansion, env);
                }
            }

            let values = self.eval_args(args, env)?;
            return self.apply(&function, &values);
        }

        // ((lambda (x) ...) args...)
        if let Some(head) = cons.car.car().and_then(Value::as_symbol) {
            if head == syms.lambda {
                let function = self.eval(&cons.car, env)?;
                let values = self.eval_args(args, env)?;
                return self.apply(&function, &values);
            }
        }

        Err(LispError::malformed(format!(
            "illegal function call {}",
            self.globals.render(&cons.car)
        )))
    }

    /// Call a function object, or the global function of a symbol
    pub fn apply(&mut self, function: &Value, args: &[Value]) -> LispResult<Value> {
        match function {
            Value::Function(Function::Primitive(p)) => (p.func)(self, args),
            Value::Function(Function::Closure(c)) => c.invoke(self, args),
            Value::Symbol(sym) => {
                let resolved = self.function_cell(*sym)?;
                self.apply(&resolved, args)
            }
            other => Err(LispError::type_error(
                other.clone(),
                self.globals.render(other),
                "function",
            )),
        }
    }

    pub fn make_closure(
        &self,
        name: Option<String>,
        lambda_tail: &Value,
        env: &Environment,
    ) -> LispResult<Closure> {
        let (params, body) = match lambda_tail {
            Value::Cons(c) => (c.car.clone(), c.cdr.clone()),
            _ => return Err(LispError::malformed("lambda requires a parameter list")),
        };
        match name {
            Some(name) => Closure::named(self.globals, name, params, body, env.clone()),
            None => Closure::new(self.globals, params, body, env.clone()),
        }
    }

    fn eval_args(&mut self, args: &Value, env: &Environment) -> LispResult<SmallVec<[Value; 8]>> {
        let mut values = SmallVec::new();
        let mut current = args;
        while let Value::Cons(c) = current {
            values.push(self.eval(&c.car, env)?);
            current = &c.cdr;
        }
        if !current.is_nil() {
            return Err(LispError::malformed("dotted argument list"));
        }
        Ok(values)
    }

    fn form_list(&self, args: &Value) -> LispResult<Vec<Value>> {
        args.to_vec()
            .ok_or_else(|| LispError::malformed("dotted argument list"))
    }

    fn eval_quote(&mut self, args: &Value) -> LispResult<Value> {
        match self.form_list(args)?.as_slice() {
            [form] => Ok(form.clone()),
            _ => Err(LispError::malformed("QUOTE takes exactly one form")),
        }
    }

    fn eval_function(&mut self, args: &Value, env: &Environment) -> LispResult<Value> {
        let forms = self.form_list(args)?;
        match forms.as_slice() {
            [Value::Symbol(sym)] => self.function_cell(*sym),
            [lambda @ Value::Cons(c)] if c.car.as_symbol() == Some(self.globals.syms.lambda) => {
                self.eval(lambda, env)
            }
            _ => Err(LispError::malformed("FUNCTION takes a symbol or a lambda form")),
        }
    }

    /// Global function of `sym`, cloned so no lock is held across the call
    fn function_cell(&self, sym: SymbolId) -> LispResult<Value> {
        let found = self.globals.symbols().symbol_function(sym).cloned();
        found.ok_or_else(|| LispError::UndefinedFunction {
            name: self.globals.symbol_name(sym),
        })
    }

    fn eval_progn(&mut self, body: &Value, env: &Environment) -> LispResult<Value> {
        let mut result = Value::Nil;
        for form in body.iter() {
            result = self.eval(form, env)?;
        }
        Ok(result)
    }

    fn eval_if(&mut self, args: &Value, env: &Environment) -> LispResult<Value> {
        let forms = self.form_list(args)?;
        let (test, then, otherwise) = match forms.as_slice() {
            [test, then] => (test, then, None),
            [test, then, otherwise] => (test, then, Some(otherwise)),
            _ => return Err(LispError::malformed("IF takes two or three forms")),
        };
        if !self.eval(test, env)?.is_nil() {
            self.eval(then, env)
        } else {
            otherwise.map_or(Ok(Value::Nil), |form| self.eval(form, env))
        }
    }

    fn eval_setq(&mut self, args: &Value, env: &Environment) -> LispResult<Value> {
        let forms = self.form_list(args)?;
        if forms.len() % 2 != 0 {
            return Err(LispError::malformed("odd number of arguments to SETQ"));
        }
        let mut result = Value::Nil;
        for pair in forms.chunks_exact(2) {
            let sym = pair[0].as_symbol().ok_or_else(|| {
                LispError::type_error(pair[0].clone(), self.globals.render(&pair[0]), "symbol")
            })?;
            result = self.eval(&pair[1], env)?;
            self.set_variable(sym, result.clone(), env)?;
        }
        Ok(result)
    }

    /// (defvar name [initial-value]): proclaims NAME special
    fn eval_defvar(&mut self, args: &Value, env: &Environment) -> LispResult<Value> {
        let forms = self.form_list(args)?;
        let (name, init) = match forms.as_slice() {
            [Value::Symbol(name)] => (*name, None),
            [Value::Symbol(name), init] => (*name, Some(init)),
            _ => return Err(LispError::malformed("DEFVAR takes a symbol and an optional value")),
        };

        self.globals.symbols_mut().proclaim_special(name);
        let unbound = self.globals.symbols().symbol_value(name).is_none();
        if let (true, Some(init)) = (unbound, init) {
            let value = self.eval(init, env)?;
            self.globals.symbols_mut().set_symbol_value(name, value);
        }
        Ok(Value::Symbol(name))
    }

    /// (defun name lambda-list . body) and (defmacro name lambda-list . body)
    fn eval_define(
        &mut self,
        args: &Value,
        env: &Environment,
        kind: ClosureKind,
    ) -> LispResult<Value> {
        let (name, tail) = match args {
            Value::Cons(c) => match c.car {
                Value::Symbol(name) => (name, &c.cdr),
                _ => return Err(LispError::malformed("definition name must be a symbol")),
            },
            _ => return Err(LispError::malformed("definition requires a name")),
        };

        let closure = self
            .make_closure(Some(self.globals.symbol_name(name)), tail, env)?
            .with_kind(kind);
        let function = Value::Function(Function::Closure(Arc::new(closure)));
        self.globals.symbols_mut().set_symbol_function(name, function);
        Ok(Value::Symbol(name))
    }
}

/// Guard returned by `Interpreter::dynamic_extent`
pub struct DynamicExtent<'i, 'a> {
    interp: &'i mut Interpreter<'a>,
    depth: usize,
}

impl<'a> Deref for DynamicExtent<'_, 'a> {
    type Target = Interpreter<'a>;

    fn deref(&self) -> &Self::Target {
        &*self.interp
    }
}

impl DerefMut for DynamicExtent<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.interp
    }
}

impl Drop for DynamicExtent<'_, '_> {
    fn drop(&mut self) {
        self.interp.process.unwind_to(self.depth);
    }
}

impl Evaluator for Interpreter<'_> {
    fn eval(&mut self, form: &Value, env: &Environment) -> LispResult<Value> {
        Interpreter::eval(self, form, env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(text: &str) -> LispResult<Value> {
        let globals = GlobalContext::new();
        let mut process = Process::default();
        Interpreter::new(&mut process, &globals).eval_string(text)
    }

    #[test]
    fn test_environment_chain() {
        let outer = Environment::new();
        let x = SymbolId(1);
        outer.bind(x, Value::Fixnum(1));
        let inner = Environment::with_parent(outer.clone());
        assert_eq!(inner.lookup(x), Some(Value::Fixnum(1)));
        assert!(!inner.is_bound_locally(x));

        assert!(inner.set(x, Value::Fixnum(2)));
        assert_eq!(outer.lookup(x), Some(Value::Fixnum(2)));
        assert!(!inner.set(SymbolId(2), Value::Nil));
    }

    #[test]
    fn test_self_evaluating() {
        assert_eq!(eval("42").unwrap(), Value::Fixnum(42));
        assert_eq!(eval("\"s\"").unwrap(), Value::string("s"));
        let globals = GlobalContext::new();
        let mut process = Process::default();
        let v = Interpreter::new(&mut process, &globals).eval_string(":k").unwrap();
        assert_eq!(v, globals.keyword("K"));
    }

    #[test]
    fn test_special_forms() {
        assert_eq!(eval("(quote (a b))").unwrap().to_vec().map(|v| v.len()), Some(2));
        assert_eq!(eval("(if nil 1 2)").unwrap(), Value::Fixnum(2));
        assert_eq!(eval("(if t 1)").unwrap(), Value::Fixnum(1));
        assert_eq!(eval("(if nil 1)").unwrap(), Value::Nil);
        assert_eq!(eval("(progn 1 2 3)").unwrap(), Value::Fixnum(3));
        assert_eq!(eval("(progn)").unwrap(), Value::Nil);
        assert_eq!(eval("(setq x 5) x").unwrap(), Value::Fixnum(5));
        assert_eq!(eval("((lambda (x) x) 9)").unwrap(), Value::Fixnum(9));
    }

    #[test]
    fn test_defun_and_call() {
        assert_eq!(
            eval("(defun add3 (a b c) (+ a (+ b c))) (add3 1 2 3)").unwrap(),
            Value::Fixnum(6)
        );
        assert_eq!(
            eval("(funcall (function +) 1 2)").unwrap(),
            Value::Fixnum(3)
        );
        assert_eq!(eval("(funcall #'(lambda () 7))").unwrap(), Value::Fixnum(7));
    }

    #[test]
    fn test_defmacro_expands_then_evaluates() {
        let v = eval("(defmacro my-if (c a b) (list 'if c a b)) (my-if t 1 (car 5))").unwrap();
        assert_eq!(v, Value::Fixnum(1));
    }

    #[test]
    fn test_defvar_is_dynamic() {
        let src = "(defvar *depth* 1)
                   (defun depth () *depth*)
                   (defun with-depth (*depth*) (depth))
                   (list (with-depth 2) (depth))";
        let v = eval(src).unwrap();
        assert_eq!(v, Value::list([Value::Fixnum(2), Value::Fixnum(1)]));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(eval("nope"), Err(LispError::UnboundVariable { name }) if name == "NOPE"));
        assert!(matches!(eval("(nope)"), Err(LispError::UndefinedFunction { .. })));
        assert!(matches!(eval("(setq :k 1)"), Err(LispError::ConstantAssignment { .. })));
        assert!(matches!(eval("(1 2)"), Err(LispError::MalformedForm { .. })));
    }
}
