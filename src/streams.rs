// CLCore Streams - Character Input
//
// A character source plus a two-slot pushback buffer and position counters.

use crate::conditions::{LispError, LispResult, Position};
use crate::types::Value;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::io::BufRead;

/// What to do when input runs out where a character or form was required
#[derive(Debug, Clone, Default)]
pub enum EofPolicy {
    /// Fail with `LispError::EndOfFile`
    #[default]
    Error,
    /// Return this value instead
    Return(Value),
}

impl EofPolicy {
    pub fn on_eof(&self) -> LispResult<Value> {
        match self {
            EofPolicy::Error => Err(LispError::EndOfFile),
            EofPolicy::Return(v) => Ok(v.clone()),
        }
    }
}

/// Producer of characters
pub trait CharSource {
    /// Next character, or `None` at end of source
    fn next_char(&mut self) -> std::io::Result<Option<char>>;

    /// True if `next_char` can produce a character without waiting for more input
    fn ready(&mut self) -> bool;
}

/// In-memory source
#[derive(Debug, Clone)]
pub struct StringSource {
    chars: Vec<char>,
    index: usize,
}

impl StringSource {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            index: 0,
        }
    }
}

impl CharSource for StringSource {
    fn next_char(&mut self) -> std::io::Result<Option<char>> {
        let c = self.chars.get(self.index).copied();
        if c.is_some() {
            self.index += 1;
        }
        Ok(c)
    }

    fn ready(&mut self) -> bool {
        self.index < self.chars.len()
    }
}

/// Source over any buffered reader, decoded and filled a line at a time
#[derive(Debug)]
pub struct BufReadSource<R> {
    inner: R,
    pending: VecDeque<char>,
    exhausted: bool,
}

impl<R: BufRead> BufReadSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
            exhausted: false,
        }
    }

    fn fill(&mut self) -> std::io::Result<()> {
        let mut line = String::new();
        if self.inner.read_line(&mut line)? == 0 {
            self.exhausted = true;
        }
        self.pending.extend(line.chars());
        Ok(())
    }
}

impl<R: BufRead> CharSource for BufReadSource<R> {
    fn next_char(&mut self) -> std::io::Result<Option<char>> {
        if self.pending.is_empty() && !self.exhausted {
            self.fill()?;
        }
        Ok(self.pending.pop_front())
    }

    fn ready(&mut self) -> bool {
        !self.pending.is_empty()
    }
}

/// Character input stream. Not safe for concurrent use; one reader per stream.
#[derive(Debug)]
pub struct CharacterInputStream<S> {
    source: S,
    pushback: SmallVec<[char; 2]>,
    offset: usize,
    line_number: usize,
}

impl CharacterInputStream<StringSource> {
    pub fn from_string(input: &str) -> Self {
        Self::new(StringSource::new(input))
    }
}

impl<R: BufRead> CharacterInputStream<BufReadSource<R>> {
    pub fn from_reader(reader: R) -> Self {
        Self::new(BufReadSource::new(reader))
    }
}

impl<S: CharSource> CharacterInputStream<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            pushback: SmallVec::new(),
            offset: 0,
            line_number: 0,
        }
    }

    /// Characters consumed so far
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Newlines consumed so far
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn position(&self) -> Position {
        Position {
            offset: self.offset,
            line: self.line_number,
        }
    }

    pub(crate) fn read(&mut self) -> LispResult<Option<char>> {
        let c = match self.pushback.pop() {
            Some(c) => Some(c),
            None => self.source.next_char()?,
        };
        if let Some(c) = c {
            self.offset += 1;
            if c == '\n' {
                self.line_number += 1;
            }
        }
        Ok(c)
    }

    pub(crate) fn unread(&mut self, c: char) {
        debug_assert!(self.pushback.len() < 2, "pushback buffer overflow");
        self.pushback.push(c);
        self.offset = self.offset.saturating_sub(1);
        if c == '\n' {
            self.line_number = self.line_number.saturating_sub(1);
        }
    }

    pub(crate) fn ready(&mut self) -> bool {
        !self.pushback.is_empty() || self.source.ready()
    }

    /// read-char: a character value, or the EOF policy's outcome
    pub fn read_char(&mut self, eof: &EofPolicy) -> LispResult<Value> {
        match self.read()? {
            Some(c) => Ok(Value::Char(c)),
            None => eof.on_eof(),
        }
    }

    /// unread-char: `c` must be the character most recently read
    pub fn unread_char(&mut self, c: char) {
        self.unread(c);
    }

    /// read-line: text up to a line terminator. A final unterminated line is
    /// still returned; EOF with nothing accumulated follows the policy.
    pub fn read_line(&mut self, eof: &EofPolicy) -> LispResult<Value> {
        let mut line = String::new();
        loop {
            match self.read()? {
                None if line.is_empty() => return eof.on_eof(),
                None | Some('\n') => break,
                Some('\r') => {
                    if self.ready() {
                        match self.read()? {
                            Some('\n') | None => {}
                            Some(other) => self.unread(other),
                        }
                    }
                    break;
                }
                Some(c) => line.push(c),
            }
        }
        Ok(Value::string(line))
    }

    /// clear-input: drop whatever can be read without waiting
    pub fn discard_buffered_input(&mut self) -> LispResult<()> {
        while self.ready() {
            if self.read()?.is_none() {
                break;
            }
        }
        Ok(())
    }
}
