// CLCore Closures - Construction and Invocation
//
// A closure pairs a compiled lambda list with a body and the environment it
// was created in. Invocation binds arguments into a fresh child frame.

use crate::conditions::{LispError, LispResult};
use crate::context::GlobalContext;
use crate::eval::{Environment, Interpreter};
use crate::lambda_list::{Arity, LambdaList, Parameter};
use crate::types::Value;
use smallvec::SmallVec;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureKind {
    Function,
    /// Receives its operands unevaluated; the result is evaluated again
    Macro,
}

#[derive(Debug)]
pub struct Closure {
    name: Option<String>,
    kind: ClosureKind,
    /// The lambda list exactly as written
    parameter_list: Value,
    lambda_list: LambdaList,
    body: Value,
    body_forms: Vec<Value>,
    env: Environment,
}

impl Closure {
    pub fn new(
        globals: &GlobalContext,
        parameter_list: Value,
        body: Value,
        env: Environment,
    ) -> LispResult<Self> {
        let lambda_list = LambdaList::compile(globals, &parameter_list)?;
        let body_forms = body
            .to_vec()
            .ok_or_else(|| LispError::malformed("closure body must be a proper list"))?;
        Ok(Self {
            name: None,
            kind: ClosureKind::Function,
            parameter_list,
            lambda_list,
            body,
            body_forms,
            env,
        })
    }

    pub fn named(
        globals: &GlobalContext,
        name: impl Into<String>,
        parameter_list: Value,
        body: Value,
        env: Environment,
    ) -> LispResult<Self> {
        let mut closure = Self::new(globals, parameter_list, body, env)?;
        closure.name = Some(name.into());
        Ok(closure)
    }

    pub fn with_kind(mut self, kind: ClosureKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> ClosureKind {
        self.kind
    }

    pub fn parameter_list(&self) -> &Value {
        &self.parameter_list
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// `(lambda params . body)`, given the LAMBDA symbol
    pub fn lambda_expression(&self, lambda: Value) -> Value {
        Value::cons(
            lambda,
            Value::cons(self.parameter_list.clone(), self.body.clone()),
        )
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn lambda_list(&self) -> &LambdaList {
        &self.lambda_list
    }

    fn check_arg_count(&self, got: usize) -> LispResult<()> {
        let ok = match self.lambda_list.arity() {
            Arity::Fixed(n) => got == n,
            Arity::Variadic => got >= self.lambda_list.required_count(),
        };
        if ok {
            Ok(())
        } else {
            Err(LispError::WrongNumberOfArguments {
                function: self.name.clone().unwrap_or_else(|| "anonymous lambda".into()),
                got,
            })
        }
    }

    /// Call the closure. Dynamic bindings made during the call are undone on
    /// every exit, including errors and panics.
    pub fn invoke(&self, interp: &mut Interpreter<'_>, args: &[Value]) -> LispResult<Value> {
        trace!(
            closure = self.name().unwrap_or("anonymous"),
            args = args.len(),
            "invoke"
        );
        self.check_arg_count(args.len())?;

        let mut extent = interp.dynamic_extent();
        self.bind_and_run(&mut extent, args)
    }

    fn bind_and_run(&self, interp: &mut Interpreter<'_>, args: &[Value]) -> LispResult<Value> {
        let frame = Environment::with_parent(self.env.clone());
        let list = &self.lambda_list;

        let required = list.required();
        for (param, arg) in required.iter().zip(args) {
            interp.bind_variable(param.var, arg.clone(), &frame);
        }

        let mut next = required.len();
        for param in list.optional() {
            match args.get(next) {
                Some(arg) => {
                    interp.bind_variable(param.var, arg.clone(), &frame);
                    next += 1;
                    bind_supplied(interp, param, true, &frame);
                }
                None => {
                    let value = eval_default(interp, param, &frame)?;
                    interp.bind_variable(param.var, value, &frame);
                    bind_supplied(interp, param, false, &frame);
                }
            }
        }

        // Keywords are read from the same tail that &rest collects
        let tail = args.get(next..).unwrap_or(&[]);
        if let Some(rest) = list.rest() {
            interp.bind_variable(rest.var, Value::list(tail.iter().cloned()), &frame);
        }

        if !list.keywords().is_empty() {
            self.bind_keywords(interp, tail, &frame)?;
        }

        for param in list.aux() {
            let value = eval_default(interp, param, &frame)?;
            interp.bind_variable(param.var, value, &frame);
        }

        let mut result = Value::Nil;
        for form in &self.body_forms {
            result = interp.eval(form, &frame)?;
        }
        Ok(result)
    }

    fn bind_keywords(
        &self,
        interp: &mut Interpreter<'_>,
        tail: &[Value],
        frame: &Environment,
    ) -> LispResult<()> {
        if tail.len() % 2 != 0 {
            return Err(LispError::OddKeywordArguments);
        }

        let keywords = self.lambda_list.keywords();
        let allow_key = interp.globals.syms.kw_allow_other_keys;
        let mut bound: SmallVec<[bool; 8]> = SmallVec::from_elem(false, keywords.len());
        let mut unrecognized: Option<&Value> = None;
        let mut override_value: Option<&Value> = None;

        for pair in tail.chunks_exact(2) {
            let (key, value) = (&pair[0], &pair[1]);
            let key_sym = key.as_symbol();
            let index = keywords
                .iter()
                .position(|p| p.keyword.is_some() && p.keyword == key_sym);

            match index {
                Some(i) => {
                    if !bound[i] {
                        bound[i] = true;
                        interp.bind_variable(keywords[i].var, value.clone(), frame);
                        bind_supplied(interp, &keywords[i], true, frame);
                    }
                }
                None if key_sym == Some(allow_key) => {
                    override_value.get_or_insert(value);
                }
                None => {
                    unrecognized.get_or_insert(key);
                }
            }
        }

        if let Some(key) = unrecognized {
            let overridden = override_value.is_some_and(|v| !v.is_nil());
            if !self.lambda_list.allow_other_keys() && !overridden {
                return Err(LispError::UnrecognizedKeyword {
                    keyword: key.clone(),
                    rendered: interp.globals.render(key),
                });
            }
        }

        for (param, _) in keywords.iter().zip(&bound).filter(|(_, b)| !**b) {
            let value = eval_default(interp, param, frame)?;
            interp.bind_variable(param.var, value, frame);
            bind_supplied(interp, param, false, frame);
        }
        Ok(())
    }
}

fn eval_default(
    interp: &mut Interpreter<'_>,
    param: &Parameter,
    frame: &Environment,
) -> LispResult<Value> {
    match &param.init_form {
        Some(form) => interp.eval(form, frame),
        None => Ok(Value::Nil),
    }
}

fn bind_supplied(interp: &mut Interpreter<'_>, param: &Parameter, supplied: bool, frame: &Environment) {
    if let Some(var) = param.supplied_p {
        interp.bind_variable(var, Value::boolean(supplied), frame);
    }
}
