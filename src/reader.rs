// CLCore Reader - S-Expression Parser
//
// Recursive descent over a CharacterInputStream, dispatching on the
// readtable's macro characters. Nesting depth equals recursion depth.

use crate::conditions::{LispError, LispResult};
use crate::context::GlobalContext;
use crate::eval::{Environment, Evaluator};
use crate::readtable::{DispatchMacro, MacroCharacter, Readtable};
use crate::streams::{CharSource, CharacterInputStream, EofPolicy, StringSource};
use crate::symbol::{PackageId, SymbolId};
use crate::types::{ListBuilder, Value};
use tracing::{debug, warn};

/// What to do with an unrecognized character after `#`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// Skip the character and yield no value
    #[default]
    Permissive,
    /// Fail with `LispError::UnknownDispatch`
    Strict,
}

#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Names recognized by `#+` and `#-`
    pub features: Vec<String>,
    /// Allow `#.` read-time evaluation
    pub read_eval: bool,
    pub unknown_dispatch: DispatchPolicy,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            features: vec!["CLCORE".to_string()],
            read_eval: true,
            unknown_dispatch: DispatchPolicy::Permissive,
        }
    }
}

/// The CLCore Reader
pub struct Reader<'a, S> {
    stream: &'a mut CharacterInputStream<S>,
    globals: &'a GlobalContext,
    package: PackageId,
    options: ReaderOptions,
    evaluator: Option<&'a mut dyn Evaluator>,
    /// Discarding a `#+`/`#-` form: nothing is interned, resolved or evaluated
    suppress: bool,
}

impl<'a, S: CharSource> Reader<'a, S> {
    pub fn new(stream: &'a mut CharacterInputStream<S>, globals: &'a GlobalContext) -> Self {
        Self {
            stream,
            globals,
            package: PackageId::CL_USER,
            options: ReaderOptions::default(),
            evaluator: None,
            suppress: false,
        }
    }

    /// Package that unqualified tokens are interned in
    pub fn with_package(mut self, package: PackageId) -> Self {
        self.package = package;
        self
    }

    pub fn with_options(mut self, options: ReaderOptions) -> Self {
        self.options = options;
        self
    }

    /// Evaluator used by `#.`
    pub fn with_evaluator(mut self, evaluator: &'a mut dyn Evaluator) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn package(&self) -> PackageId {
        self.package
    }

    pub fn stream(&mut self) -> &mut CharacterInputStream<S> {
        &mut *self.stream
    }

    /// Read one form, then consume a single whitespace character if one is
    /// immediately available.
    pub fn read_form(&mut self, eof: &EofPolicy) -> LispResult<Value> {
        match self.read_top(false)? {
            Some(value) => Ok(value),
            None => eof.on_eof(),
        }
    }

    /// Read one form, leaving whatever follows it in the stream
    pub fn read_preserving_whitespace(&mut self, eof: &EofPolicy) -> LispResult<Value> {
        match self.read_top(true)? {
            Some(value) => Ok(value),
            None => eof.on_eof(),
        }
    }

    pub fn read_char(&mut self, eof: &EofPolicy) -> LispResult<Value> {
        self.stream.read_char(eof)
    }

    pub fn unread_char(&mut self, c: char) {
        self.stream.unread_char(c);
    }

    pub fn read_line(&mut self, eof: &EofPolicy) -> LispResult<Value> {
        self.stream.read_line(eof)
    }

    pub fn discard_buffered_input(&mut self) -> LispResult<()> {
        self.stream.discard_buffered_input()
    }

    fn readtable(&self) -> &'a Readtable {
        &self.globals.readtable
    }

    /// `None` when the source ran out before any form started
    fn read_top(&mut self, preserve_whitespace: bool) -> LispResult<Option<Value>> {
        let value = self.read_object()?;
        if value.is_some() && !preserve_whitespace && self.stream.ready() {
            if let Some(c) = self.stream.read()? {
                if !self.readtable().is_whitespace(c) {
                    self.stream.unread(c);
                }
            }
        }
        Ok(value)
    }

    fn read_object(&mut self) -> LispResult<Option<Value>> {
        while let Some(c) = self.stream.read()? {
            if self.readtable().is_whitespace(c) {
                continue;
            }
            if let Some(value) = self.process_char(c)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// A nested form. Running out of input here is always an error.
    fn read_recursive(&mut self) -> LispResult<Value> {
        self.read_object()?.ok_or(LispError::EndOfFile)
    }

    /// Next non-whitespace character, failing at end of input
    fn next_significant(&mut self) -> LispResult<char> {
        loop {
            match self.stream.read()? {
                None => return Err(LispError::EndOfFile),
                Some(c) if self.readtable().is_whitespace(c) => continue,
                Some(c) => return Ok(c),
            }
        }
    }

    /// Handle the first character of a form. `None` means the character
    /// introduced something that yields no value (a comment, a skipped form).
    fn process_char(&mut self, c: char) -> LispResult<Option<Value>> {
        let Some(m) = self.readtable().macro_character(c) else {
            self.stream.unread(c);
            let token = self.read_token()?;
            return self.make_object(&token).map(Some);
        };

        let globals = self.globals;
        let syms = &globals.syms;
        match m {
            MacroCharacter::String => self.read_string().map(Some),
            MacroCharacter::Quote => self.read_wrapped(syms.quote).map(Some),
            MacroCharacter::Backquote => self.read_wrapped(syms.backquote).map(Some),
            MacroCharacter::Comma => {
                let head = match self.stream.read()? {
                    Some('@') => syms.comma_atsign,
                    Some('.') => syms.comma_dot,
                    Some(other) => {
                        self.stream.unread(other);
                        syms.comma
                    }
                    None => return Err(LispError::EndOfFile),
                };
                self.read_wrapped(head).map(Some)
            }
            MacroCharacter::LeftParen => Ok(Some(self.read_delimited()?.finish())),
            MacroCharacter::RightParen => Err(LispError::UnmatchedParen {
                position: self.stream.position(),
            }),
            MacroCharacter::LineComment => {
                self.skip_line_comment()?;
                Ok(None)
            }
            MacroCharacter::Dispatch => self.read_dispatch(),
        }
    }

    /// `(head form)` for the reader's quoting prefixes
    fn read_wrapped(&mut self, head: SymbolId) -> LispResult<Value> {
        let form = self.read_recursive()?;
        Ok(Value::list([Value::Symbol(head), form]))
    }

    fn skip_line_comment(&mut self) -> LispResult<()> {
        while let Some(c) = self.stream.read()? {
            if c == '\n' {
                break;
            }
        }
        Ok(())
    }

    /// Read a string: a backslash takes the next character literally
    fn read_string(&mut self) -> LispResult<Value> {
        let mut s = String::new();
        loop {
            match self.stream.read()? {
                None => return Err(LispError::EndOfFile),
                Some('"') => break,
                Some('\\') => match self.stream.read()? {
                    None => return Err(LispError::EndOfFile),
                    Some(c) => s.push(c),
                },
                Some(c) => s.push(c),
            }
        }
        Ok(Value::string(s))
    }

    /// Elements up to the closing `)`, with an optional dotted tail.
    /// The opening `(` has been consumed.
    fn read_delimited(&mut self) -> LispResult<ListBuilder> {
        let mut builder = ListBuilder::new();
        loop {
            let c = self.next_significant()?;
            match c {
                ')' => return Ok(builder),
                '.' => match self.stream.read()? {
                    Some(next) if self.readtable().is_token_delimiter(next) => {
                        self.stream.unread(next);
                        if builder.is_empty() {
                            return Err(LispError::NothingBeforeDot {
                                position: self.stream.position(),
                            });
                        }
                        self.read_dotted_tail(&mut builder)?;
                        return Ok(builder);
                    }
                    // Part of a token such as `.5x` or `...`
                    Some(next) => self.stream.unread(next),
                    None => return Err(LispError::EndOfFile),
                },
                _ => {}
            }
            if let Some(item) = self.process_char(c)? {
                builder.push(item);
            }
        }
    }

    /// After a standalone dot: exactly one form, then the closing `)`
    fn read_dotted_tail(&mut self, builder: &mut ListBuilder) -> LispResult<()> {
        let tail = loop {
            let c = self.next_significant()?;
            if c == ')' {
                return Err(LispError::NothingAfterDot {
                    position: self.stream.position(),
                });
            }
            if let Some(value) = self.process_char(c)? {
                break value;
            }
        };

        loop {
            let c = self.next_significant()?;
            if c == ')' {
                break;
            }
            if self.process_char(c)?.is_some() {
                return Err(LispError::ExtraObjectAfterDot {
                    position: self.stream.position(),
                });
            }
        }

        builder.set_tail(tail);
        Ok(())
    }

    /// Dispatch on the character after `#`
    fn read_dispatch(&mut self) -> LispResult<Option<Value>> {
        let c = self.stream.read()?.ok_or(LispError::EndOfFile)?;

        let Some(d) = self.readtable().dispatch_macro(c) else {
            return match self.options.unknown_dispatch {
                DispatchPolicy::Permissive => {
                    warn!(character = %c, "skipping unsupported # dispatch character");
                    Ok(None)
                }
                DispatchPolicy::Strict => Err(LispError::UnknownDispatch {
                    character: c,
                    position: self.stream.position(),
                }),
            };
        };

        match d {
            DispatchMacro::Function => self.read_wrapped(self.globals.syms.function).map(Some),
            DispatchMacro::Vector => {
                let builder = self.read_delimited()?;
                if builder.is_dotted() {
                    return Err(LispError::DottedVector {
                        position: self.stream.position(),
                    });
                }
                Ok(Some(builder.finish_vector()))
            }
            DispatchMacro::Character => {
                let c = self.stream.read()?.ok_or(LispError::EndOfFile)?;
                Ok(Some(Value::Char(c)))
            }
            DispatchMacro::FeaturePlus => self.read_conditional(true),
            DispatchMacro::FeatureMinus => self.read_conditional(false),
            DispatchMacro::Uninterned => {
                let token = self.read_token()?;
                if self.suppress {
                    return Ok(Some(Value::Nil));
                }
                let sym = self.globals.symbols_mut().make_symbol(&token.to_uppercase());
                Ok(Some(Value::Symbol(sym)))
            }
            DispatchMacro::BlockComment => {
                self.skip_block_comment()?;
                Ok(None)
            }
            DispatchMacro::ReadEval => self.read_eval().map(Some),
            // The bits are not read
            DispatchMacro::BitVector => Ok(Some(Value::Nil)),
        }
    }

    /// `#+feature form` / `#-feature form`
    fn read_conditional(&mut self, polarity: bool) -> LispResult<Option<Value>> {
        // Feature names are keywords
        let saved_package = std::mem::replace(&mut self.package, PackageId::KEYWORD);
        let expression = self.read_recursive();
        self.package = saved_package;
        let expression = expression?;

        if self.feature_matches(&expression) == polarity {
            return self.read_recursive().map(Some);
        }

        let saved_suppress = std::mem::replace(&mut self.suppress, true);
        let skipped = self.read_recursive();
        self.suppress = saved_suppress;
        skipped?;
        Ok(None)
    }

    fn feature_matches(&self, expression: &Value) -> bool {
        let syms = &self.globals.syms;
        match expression {
            Value::Symbol(sym) => {
                let name = self.globals.symbol_name(*sym);
                self.options
                    .features
                    .iter()
                    .any(|f| f.eq_ignore_ascii_case(&name))
            }
            Value::Cons(cons) => {
                let mut args = cons.cdr.iter();
                match cons.car.as_symbol() {
                    Some(op) if op == syms.kw_and => args.all(|e| self.feature_matches(e)),
                    Some(op) if op == syms.kw_or => args.any(|e| self.feature_matches(e)),
                    Some(op) if op == syms.kw_not => {
                        args.next().map_or(false, |e| !self.feature_matches(e))
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Skip `#| ... |#`, recursing once per nested comment
    fn skip_block_comment(&mut self) -> LispResult<()> {
        loop {
            match self.stream.read()? {
                None => return Err(LispError::EndOfFile),
                Some('|') => match self.stream.read()? {
                    None => return Err(LispError::EndOfFile),
                    Some('#') => return Ok(()),
                    Some(c) => self.stream.unread(c),
                },
                Some('#') => match self.stream.read()? {
                    None => return Err(LispError::EndOfFile),
                    Some('|') => self.skip_block_comment()?,
                    Some(c) => self.stream.unread(c),
                },
                Some(_) => {}
            }
        }
    }

    /// `#.form`, evaluated in a fresh top-level environment
    fn read_eval(&mut self) -> LispResult<Value> {
        let form = self.read_recursive()?;
        if self.suppress {
            return Ok(Value::Nil);
        }
        if !self.options.read_eval {
            return Err(LispError::ReadEvalDisabled);
        }
        let evaluator = self
            .evaluator
            .as_deref_mut()
            .ok_or(LispError::ReadEvalUnavailable)?;
        debug!(form = %self.globals.render(&form), "read-time evaluation");
        evaluator.eval(&form, &Environment::new())
    }

    /// Characters up to whitespace or a parenthesis. A terminating
    /// whitespace character is consumed, a parenthesis is left unread.
    fn read_token(&mut self) -> LispResult<String> {
        let mut token = String::new();
        while let Some(c) = self.stream.read()? {
            if self.readtable().is_whitespace(c) {
                break;
            }
            if self.readtable().terminates_token(c) {
                self.stream.unread(c);
                break;
            }
            token.push(c);
        }
        Ok(token)
    }

    /// Classify a token as an integer, NIL/T, or a symbol
    fn make_object(&mut self, token: &str) -> LispResult<Value> {
        if self.suppress {
            return Ok(Value::Nil);
        }

        if token.starts_with(|c: char| c == '-' || c.is_ascii_digit()) {
            // Too large for a fixnum falls through to a symbol
            if let Ok(n) = token.parse::<i64>() {
                return Ok(Value::Fixnum(n));
            }
        }

        let name = token.to_uppercase();
        match name.as_str() {
            "NIL" => return Ok(Value::Nil),
            "T" => return Ok(Value::T),
            _ => {}
        }

        if let Some(keyword) = name.strip_prefix(':') {
            return Ok(Value::Symbol(self.globals.symbols_mut().intern_keyword(keyword)));
        }

        if let Some((package, symbol)) = name.split_once("::") {
            let pkg = self.find_package(package)?;
            return Ok(Value::Symbol(self.globals.symbols_mut().intern_in(symbol, pkg)));
        }

        if let Some((package, symbol)) = name.split_once(':') {
            let pkg = self.find_package(package)?;
            let table = self.globals.symbols();
            let sym = table
                .find_symbol(symbol, pkg)
                .ok_or_else(|| LispError::SymbolNotFound {
                    symbol: symbol.to_string(),
                    package: package.to_string(),
                })?;
            if !table.is_external(sym) {
                return Err(LispError::SymbolNotExternal {
                    symbol: symbol.to_string(),
                    package: package.to_string(),
                });
            }
            return Ok(Value::Symbol(sym));
        }

        Ok(Value::Symbol(
            self.globals.symbols_mut().intern_in(&name, self.package),
        ))
    }

    fn find_package(&self, name: &str) -> LispResult<PackageId> {
        self.globals
            .symbols()
            .find_package(name)
            .ok_or_else(|| LispError::PackageNotFound {
                package: name.to_string(),
            })
    }
}

/// Read the first form of `input`
pub fn read_from_string(globals: &GlobalContext, input: &str) -> LispResult<Value> {
    let mut stream = CharacterInputStream::<StringSource>::from_string(input);
    Reader::new(&mut stream, globals).read_form(&EofPolicy::Error)
}

/// Read every form of `input`
pub fn read_all(globals: &GlobalContext, input: &str) -> LispResult<Vec<Value>> {
    let mut stream = CharacterInputStream::<StringSource>::from_string(input);
    let mut reader = Reader::new(&mut stream, globals);
    let mut results = Vec::new();
    while let Some(form) = reader.read_top(false)? {
        results.push(form);
    }
    Ok(results)
}
