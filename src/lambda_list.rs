// CLCore Lambda Lists
//
// Compiles an ordinary lambda list into a parameter table once, when the
// closure is built. The table is immutable and shared by every invocation.

use crate::conditions::{LispError, LispResult};
use crate::context::GlobalContext;
use crate::symbol::SymbolId;
use crate::types::Value;
use smallvec::SmallVec;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Required,
    Optional,
    Rest,
    Keyword,
    Aux,
}

/// One declared parameter
#[derive(Debug, Clone)]
pub struct Parameter {
    pub var: SymbolId,
    pub kind: ParameterKind,
    /// Default form. `None` means NIL, used without evaluation.
    pub init_form: Option<Value>,
    pub supplied_p: Option<SymbolId>,
    /// Matching key, only for `Keyword` parameters
    pub keyword: Option<SymbolId>,
}

impl Parameter {
    fn new(var: SymbolId, kind: ParameterKind) -> Self {
        Self {
            var,
            kind,
            init_form: None,
            supplied_p: None,
            keyword: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Only required parameters were declared
    Fixed(usize),
    Variadic,
}

#[derive(Debug, Clone)]
pub struct LambdaList {
    required: SmallVec<[Parameter; 4]>,
    optional: Vec<Parameter>,
    rest: Option<Parameter>,
    keywords: Vec<Parameter>,
    aux: Vec<Parameter>,
    allow_other_keys: bool,
    arity: Arity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum LambdaListMode {
    Req,
    Opt,
    Rest,
    Key,
    Aux,
}

impl LambdaList {
    pub fn required(&self) -> &[Parameter] {
        &self.required
    }

    pub fn optional(&self) -> &[Parameter] {
        &self.optional
    }

    pub fn rest(&self) -> Option<&Parameter> {
        self.rest.as_ref()
    }

    pub fn keywords(&self) -> &[Parameter] {
        &self.keywords
    }

    pub fn aux(&self) -> &[Parameter] {
        &self.aux
    }

    pub fn required_count(&self) -> usize {
        self.required.len()
    }

    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn allow_other_keys(&self) -> bool {
        self.allow_other_keys
    }

    /// Every parameter in declaration order
    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.required
            .iter()
            .chain(&self.optional)
            .chain(&self.rest)
            .chain(&self.keywords)
            .chain(&self.aux)
    }

    /// Parse a lambda list such as `(a &optional (b 1 b-p) &rest r &key ((:k c)) &aux d)`
    pub fn compile(globals: &GlobalContext, spec: &Value) -> LispResult<Self> {
        let mut compiler = Compiler {
            globals,
            list: LambdaList {
                required: SmallVec::new(),
                optional: Vec::new(),
                rest: None,
                keywords: Vec::new(),
                aux: Vec::new(),
                allow_other_keys: false,
                arity: Arity::Variadic,
            },
        };
        compiler.run(spec)?;

        let list = compiler.list;
        debug!(
            required = list.required.len(),
            optional = list.optional.len(),
            rest = list.rest.is_some(),
            keywords = list.keywords.len(),
            aux = list.aux.len(),
            "compiled lambda list"
        );
        Ok(list)
    }
}

struct Compiler<'g> {
    globals: &'g GlobalContext,
    list: LambdaList,
}

impl Compiler<'_> {
    fn run(&mut self, spec: &Value) -> LispResult<()> {
        let syms = &self.globals.syms;
        let mut mode = LambdaListMode::Req;
        let mut saw_marker = false;
        let mut rest_var_seen = false;
        let mut after_allow_other_keys = false;

        let mut remaining = spec;
        loop {
            let cons = match remaining {
                Value::Nil => break,
                Value::Cons(cons) => cons,
                _ => return Err(malformed("dotted lambda list")),
            };
            remaining = &cons.cdr;
            let entry = &cons.car;

            if let Some(sym) = entry.as_symbol() {
                let next_mode = if sym == syms.and_optional {
                    Some(LambdaListMode::Opt)
                } else if sym == syms.and_rest || sym == syms.and_body {
                    Some(LambdaListMode::Rest)
                } else if sym == syms.and_key {
                    Some(LambdaListMode::Key)
                } else if sym == syms.and_aux {
                    Some(LambdaListMode::Aux)
                } else {
                    None
                };

                if let Some(next_mode) = next_mode {
                    if next_mode <= mode {
                        return Err(malformed(format!(
                            "{} out of order",
                            self.globals.symbol_name(sym)
                        )));
                    }
                    if mode == LambdaListMode::Rest && !rest_var_seen {
                        return Err(malformed("&REST must be followed by a variable"));
                    }
                    mode = next_mode;
                    saw_marker = true;
                    after_allow_other_keys = false;
                    continue;
                }

                if sym == syms.and_allow_other_keys {
                    if mode != LambdaListMode::Key || after_allow_other_keys {
                        return Err(malformed("&ALLOW-OTHER-KEYS must follow &KEY"));
                    }
                    self.list.allow_other_keys = true;
                    after_allow_other_keys = true;
                    continue;
                }
            }

            if after_allow_other_keys {
                return Err(malformed(format!(
                    "{} follows &ALLOW-OTHER-KEYS",
                    self.globals.render(entry)
                )));
            }

            match mode {
                LambdaListMode::Req => {
                    let var = self.variable(entry)?;
                    self.list
                        .required
                        .push(Parameter::new(var, ParameterKind::Required));
                }
                LambdaListMode::Opt => {
                    let param = self.optional_spec(entry)?;
                    self.list.optional.push(param);
                }
                LambdaListMode::Rest => {
                    if rest_var_seen {
                        return Err(malformed(format!(
                            "{} follows the &REST variable",
                            self.globals.render(entry)
                        )));
                    }
                    let var = self.variable(entry)?;
                    self.list.rest = Some(Parameter::new(var, ParameterKind::Rest));
                    rest_var_seen = true;
                }
                LambdaListMode::Key => {
                    let param = self.keyword_spec(entry)?;
                    self.list.keywords.push(param);
                }
                LambdaListMode::Aux => {
                    let param = self.aux_spec(entry)?;
                    self.list.aux.push(param);
                }
            }
        }

        if mode == LambdaListMode::Rest && !rest_var_seen {
            return Err(malformed("&REST must be followed by a variable"));
        }
        if !saw_marker {
            self.list.arity = Arity::Fixed(self.list.required.len());
        }
        Ok(())
    }

    /// A symbol that may name a variable
    fn variable(&self, entry: &Value) -> LispResult<SymbolId> {
        let usable = entry.as_symbol().filter(|&sym| {
            !self.globals.syms.is_lambda_list_marker(sym)
                && !self.globals.symbols().is_constant(sym)
        });
        usable.ok_or_else(|| LispError::InvalidParameter {
            parameter: self.globals.render(entry),
        })
    }

    /// Elements of a parenthesized parameter spec, between 1 and `max` long
    fn spec_parts(&self, entry: &Value, max: usize) -> LispResult<Vec<Value>> {
        match entry.to_vec() {
            Some(parts) if (1..=max).contains(&parts.len()) => Ok(parts),
            Some(_) => Err(malformed(format!(
                "bad parameter specification {}",
                self.globals.render(entry)
            ))),
            None => Err(LispError::InvalidParameter {
                parameter: self.globals.render(entry),
            }),
        }
    }

    /// `var` or `(var [init-form [supplied-p]])`
    fn optional_spec(&self, entry: &Value) -> LispResult<Parameter> {
        if !matches!(entry, Value::Cons(_)) {
            let var = self.variable(entry)?;
            return Ok(Parameter::new(var, ParameterKind::Optional));
        }
        let parts = self.spec_parts(entry, 3)?;
        let mut param = Parameter::new(self.variable(&parts[0])?, ParameterKind::Optional);
        param.init_form = parts.get(1).cloned();
        param.supplied_p = parts.get(2).map(|p| self.variable(p)).transpose()?;
        Ok(param)
    }

    /// `var`, `(var [init-form [supplied-p]])` or `((key var) [init-form [supplied-p]])`
    fn keyword_spec(&self, entry: &Value) -> LispResult<Parameter> {
        if !matches!(entry, Value::Cons(_)) {
            let var = self.variable(entry)?;
            let mut param = Parameter::new(var, ParameterKind::Keyword);
            param.keyword = Some(self.default_keyword(var));
            return Ok(param);
        }

        let parts = self.spec_parts(entry, 3)?;
        let (keyword, var) = match &parts[0] {
            Value::Cons(_) => match parts[0].to_vec().as_deref() {
                Some([Value::Symbol(key), var]) => (*key, self.variable(var)?),
                _ => {
                    return Err(malformed(format!(
                        "bad keyword parameter name {}",
                        self.globals.render(&parts[0])
                    )))
                }
            },
            single => {
                let var = self.variable(single)?;
                (self.default_keyword(var), var)
            }
        };

        let mut param = Parameter::new(var, ParameterKind::Keyword);
        param.keyword = Some(keyword);
        param.init_form = parts.get(1).cloned();
        param.supplied_p = parts.get(2).map(|p| self.variable(p)).transpose()?;
        Ok(param)
    }

    /// `var` or `(var [init-form])`. A NIL init form is kept as `None`.
    fn aux_spec(&self, entry: &Value) -> LispResult<Parameter> {
        if !matches!(entry, Value::Cons(_)) {
            let var = self.variable(entry)?;
            return Ok(Parameter::new(var, ParameterKind::Aux));
        }
        let parts = self.spec_parts(entry, 2)?;
        let mut param = Parameter::new(self.variable(&parts[0])?, ParameterKind::Aux);
        param.init_form = parts.get(1).filter(|form| !form.is_nil()).cloned();
        Ok(param)
    }

    /// The variable's name interned as a keyword
    fn default_keyword(&self, var: SymbolId) -> SymbolId {
        let name = self.globals.symbol_name(var);
        self.globals.symbols_mut().intern_keyword(&name)
    }
}

fn malformed(message: impl Into<String>) -> LispError {
    LispError::MalformedLambdaList {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_from_string;

    fn compile(globals: &GlobalContext, text: &str) -> LispResult<LambdaList> {
        let spec = read_from_string(globals, text).unwrap();
        LambdaList::compile(globals, &spec)
    }

    #[test]
    fn test_required_only_is_fixed_arity() {
        let globals = GlobalContext::new();
        let ll = compile(&globals, "(a b)").unwrap();
        assert_eq!(ll.arity(), Arity::Fixed(2));
        assert_eq!(ll.required_count(), 2);
        assert_eq!(compile(&globals, "()").unwrap().arity(), Arity::Fixed(0));
    }

    #[test]
    fn test_every_section() {
        let globals = GlobalContext::new();
        let ll = compile(
            &globals,
            "(a &optional (b 1 b-p) c &rest r &key d ((:e ee) 2 e-p) &allow-other-keys &aux (x 3) y)",
        )
        .unwrap();
        assert_eq!(ll.arity(), Arity::Variadic);
        assert_eq!(ll.required_count(), 1);
        assert_eq!(ll.optional().len(), 2);
        assert_eq!(ll.optional()[0].init_form, Some(Value::Fixnum(1)));
        assert_eq!(ll.optional()[0].supplied_p, Some(globals.intern("B-P")));
        assert!(ll.optional()[1].init_form.is_none());
        assert_eq!(ll.rest().map(|p| p.var), Some(globals.intern("R")));
        assert_eq!(ll.keyword_count(), 2);
        assert_eq!(ll.keywords()[0].keyword, Some(globals.intern_keyword("D")));
        assert_eq!(ll.keywords()[1].keyword, Some(globals.intern_keyword("E")));
        assert_eq!(ll.keywords()[1].var, globals.intern("EE"));
        assert!(ll.allow_other_keys());
        assert_eq!(ll.aux().len(), 2);
        assert_eq!(ll.parameters().count(), 8);
    }

    #[test]
    fn test_body_is_rest() {
        let globals = GlobalContext::new();
        let ll = compile(&globals, "(name &body forms)").unwrap();
        assert_eq!(ll.rest().map(|p| p.kind), Some(ParameterKind::Rest));
    }

    #[test]
    fn test_aux_nil_init_is_not_evaluated() {
        let globals = GlobalContext::new();
        let ll = compile(&globals, "(&aux (x nil) (y 'z))").unwrap();
        assert!(ll.aux()[0].init_form.is_none());
        assert!(ll.aux()[1].init_form.is_some());
    }

    #[test]
    fn test_invalid_parameters() {
        let globals = GlobalContext::new();
        for text in [
            "(1)",
            "(:k)",
            "(a \"s\")",
            "((a b))",
            "(&optional (b 1 2))",
            "(&optional nil)",
        ] {
            let err = compile(&globals, text).unwrap_err();
            assert!(
                matches!(err, LispError::InvalidParameter { .. }),
                "{text}: {err}"
            );
        }
        let err = compile(&globals, "(:k)").unwrap_err();
        assert_eq!(
            err.to_string(),
            ":K may not be used as a variable in a lambda list"
        );
    }

    #[test]
    fn test_malformed_lists() {
        let globals = GlobalContext::new();
        for text in [
            "(a . b)",
            "(&rest)",
            "(&rest a b)",
            "(&key a &optional b)",
            "(&optional a &optional b)",
            "(a &allow-other-keys)",
            "(&optional (a 1 a-p extra))",
            "(&aux (x 1 2))",
            "(&key (((a b)) 1))",
        ] {
            let err = compile(&globals, text).unwrap_err();
            assert!(
                matches!(err, LispError::MalformedLambdaList { .. }),
                "{text}: {err}"
            );
        }
    }
}
