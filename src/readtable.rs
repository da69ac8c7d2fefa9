// CLCore Readtables
//
// Character syntax types and the macro / dispatch-macro character tables.

use std::collections::HashMap;

/// Character Syntax Types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxType {
    Constituent,
    Whitespace,
    TerminatingMacro,
    NonTerminatingMacro,
}

/// Reader behavior bound to a macro character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroCharacter {
    String,
    Quote,
    Backquote,
    Comma,
    LeftParen,
    RightParen,
    LineComment,
    Dispatch,
}

/// Reader behavior bound to the character following `#`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMacro {
    Function,
    Vector,
    Character,
    FeaturePlus,
    FeatureMinus,
    Uninterned,
    BlockComment,
    ReadEval,
    BitVector,
}

/// The Readtable
#[derive(Debug, Clone)]
pub struct Readtable {
    syntax_types: HashMap<char, SyntaxType>,
    macro_characters: HashMap<char, MacroCharacter>,
    dispatch_table: HashMap<char, DispatchMacro>,
}

impl Readtable {
    pub fn new() -> Self {
        let mut rt = Self {
            syntax_types: HashMap::new(),
            macro_characters: HashMap::new(),
            dispatch_table: HashMap::new(),
        };
        rt.initialize_standard();
        rt
    }

    fn initialize_standard(&mut self) {
        for c in [' ', '\t', '\n', '\r', '\x0c'] {
            self.syntax_types.insert(c, SyntaxType::Whitespace);
        }

        use MacroCharacter::*;
        for (c, m) in [
            ('"', String),
            ('\'', Quote),
            ('`', Backquote),
            (',', Comma),
            ('(', LeftParen),
            (')', RightParen),
            (';', LineComment),
        ] {
            self.set_macro_character(c, m, SyntaxType::TerminatingMacro);
        }
        self.set_macro_character('#', Dispatch, SyntaxType::NonTerminatingMacro);

        use DispatchMacro::*;
        for (c, d) in [
            ('\'', Function),
            ('(', Vector),
            ('\\', Character),
            ('+', FeaturePlus),
            ('-', FeatureMinus),
            (':', Uninterned),
            ('|', BlockComment),
            ('.', ReadEval),
            ('*', BitVector),
        ] {
            self.dispatch_table.insert(c, d);
        }
    }

    pub fn syntax_type(&self, c: char) -> SyntaxType {
        self.syntax_types
            .get(&c)
            .copied()
            .unwrap_or(SyntaxType::Constituent)
    }

    pub fn set_macro_character(&mut self, c: char, m: MacroCharacter, syntax: SyntaxType) {
        self.syntax_types.insert(c, syntax);
        self.macro_characters.insert(c, m);
    }

    pub fn macro_character(&self, c: char) -> Option<MacroCharacter> {
        self.macro_characters.get(&c).copied()
    }

    pub fn dispatch_macro(&self, sub: char) -> Option<DispatchMacro> {
        self.dispatch_table.get(&sub).copied()
    }

    pub fn is_whitespace(&self, c: char) -> bool {
        self.syntax_type(c) == SyntaxType::Whitespace
    }

    /// Characters that end a token
    pub fn terminates_token(&self, c: char) -> bool {
        c == '(' || c == ')' || self.is_whitespace(c)
    }

    /// Characters that make a preceding `.` a standalone dot
    pub fn is_token_delimiter(&self, c: char) -> bool {
        matches!(c, '"' | '\'' | '(' | ')' | ',' | ';' | '`') || self.is_whitespace(c)
    }
}

impl Default for Readtable {
    fn default() -> Self {
        Self::new()
    }
}
