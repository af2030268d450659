// Core value types: symbols, word forms, morphological slot keys, and edit
// operations. Everything here is immutable and value-equal.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// One atomic unit of a word form (a single character). Abstracted so the
/// rest of the code never touches raw chars directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(char);

impl Symbol {
    /// Sentinel returned when reading before the start of a form.
    pub const BEGIN: Symbol = Symbol('[');
    /// Sentinel returned when reading past the end of a form.
    pub const END: Symbol = Symbol(']');

    pub fn new(c: char) -> Symbol {
        Symbol(c)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable word form: an ordered sequence of symbols. Substring and
/// append always produce new forms; comparison is lexicographic.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Form {
    symbols: Vec<Symbol>,
}

impl Form {
    pub fn new(symbols: Vec<Symbol>) -> Form {
        Form { symbols }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbol(&self, index: usize) -> Symbol {
        self.symbols[index]
    }

    /// Boundary-safe read: negative indices yield BEGIN, indices past the end
    /// yield END.
    pub fn symbol_or_boundary(&self, index: isize) -> Symbol {
        if index < 0 {
            Symbol::BEGIN
        } else if (index as usize) < self.len() {
            self.symbols[index as usize]
        } else {
            Symbol::END
        }
    }

    pub fn substring(&self, start: usize, end: usize) -> Form {
        Form::new(self.symbols[start..end].to_vec())
    }

    pub fn suffix_from(&self, start: usize) -> Form {
        self.substring(start, self.len())
    }

    pub fn append(&self, other: &Form) -> Form {
        let mut symbols = self.symbols.clone();
        symbols.extend_from_slice(&other.symbols);
        Form::new(symbols)
    }

    pub fn reverse(&self) -> Form {
        let mut symbols = self.symbols.clone();
        symbols.reverse();
        Form::new(symbols)
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }
}

impl From<&str> for Form {
    fn from(s: &str) -> Form {
        Form::new(s.chars().map(Symbol::new).collect())
    }
}

impl From<String> for Form {
    fn from(s: String) -> Form {
        Form::from(s.as_str())
    }
}

impl From<Form> for String {
    fn from(form: Form) -> String {
        form.to_string()
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sym in &self.symbols {
            write!(f, "{sym}")?;
        }
        Ok(())
    }
}

/// A slot key: an ordered map of morphological feature names to bound values,
/// identifying one cell of a paradigm (e.g. "Number=Singular:Tense=Past").
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Attributes {
    bindings: BTreeMap<String, String>,
}

impl Attributes {
    pub fn from_pairs<I, S>(pairs: I) -> Attributes
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        Attributes {
            bindings: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse a "Feature=Value:Feature=Value" string.
    pub fn parse(text: &str) -> Result<Attributes, ModelError> {
        let mut bindings = BTreeMap::new();
        for entry in text.split(':') {
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| ModelError::Parse(format!("bad attribute entry: {entry}")))?;
            bindings.insert(name.to_string(), value.to_string());
        }
        if bindings.is_empty() {
            return Err(ModelError::Parse(format!("empty attribute string: {text}")));
        }
        Ok(Attributes { bindings })
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }

    /// Abbreviated rendering used in tables and log lines: the first few
    /// characters of each bound value, concatenated.
    pub fn short_string(&self) -> String {
        self.bindings
            .values()
            .flat_map(|v| v.chars().take(6))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl TryFrom<String> for Attributes {
    type Error = ModelError;

    fn try_from(text: String) -> Result<Attributes, ModelError> {
        Attributes::parse(&text)
    }
}

impl From<Attributes> for String {
    fn from(attrs: Attributes) -> String {
        attrs.to_string()
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.bindings {
            if !first {
                write!(f, ":")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

/// One edit operation in an alignment. The source index advances on Delete,
/// Subst and Equal; the target index advances on Insert, Subst and Equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Equal,
    Subst,
    Insert,
    Delete,
}

impl Operation {
    /// All operations, in a fixed order used for chart indexing and
    /// tie-breaking.
    pub const ALL: [Operation; 4] = [
        Operation::Equal,
        Operation::Subst,
        Operation::Insert,
        Operation::Delete,
    ];

    pub fn index(self) -> usize {
        match self {
            Operation::Equal => 0,
            Operation::Subst => 1,
            Operation::Insert => 2,
            Operation::Delete => 3,
        }
    }

    pub fn advances_source(self) -> bool {
        !matches!(self, Operation::Insert)
    }

    pub fn advances_target(self) -> bool {
        !matches!(self, Operation::Delete)
    }

    pub fn as_char(self) -> char {
        match self {
            Operation::Equal => '=',
            Operation::Subst => 'S',
            Operation::Insert => 'I',
            Operation::Delete => 'D',
        }
    }

    pub fn from_char(c: char) -> Option<Operation> {
        match c {
            '=' => Some(Operation::Equal),
            'S' => Some(Operation::Subst),
            'I' => Some(Operation::Insert),
            'D' => Some(Operation::Delete),
            _ => None,
        }
    }
}

/// Render an operation sequence as a compact string like "==S==DD".
pub fn ops_to_string(ops: &[Operation]) -> String {
    ops.iter().map(|op| op.as_char()).collect()
}

/// Parse a compact operation string; used mostly by tests and diagnostics.
pub fn ops_from_str(text: &str) -> Result<Vec<Operation>, ModelError> {
    text.chars()
        .map(|c| Operation::from_char(c).ok_or_else(|| ModelError::Parse(format!("bad op char: {c}"))))
        .collect()
}

/// A pair of forms together with the operation sequence that rewrites the
/// source into the target, and the cost of doing so.
#[derive(Debug, Clone)]
pub struct Alignment {
    pub src: Form,
    pub trg: Form,
    pub ops: Vec<Operation>,
    pub cost: f64,
}

impl Alignment {
    /// Replays the operation sequence against both forms and checks that it
    /// consumes exactly the source and produces exactly the target, with
    /// Equal/Subst applied only where legal.
    pub fn is_consistent(&self) -> bool {
        let mut src_index = 0;
        let mut trg_index = 0;
        for &op in &self.ops {
            match op {
                Operation::Equal | Operation::Subst => {
                    if src_index >= self.src.len() || trg_index >= self.trg.len() {
                        return false;
                    }
                    let same = self.src.symbol(src_index) == self.trg.symbol(trg_index);
                    if (op == Operation::Equal) != same {
                        return false;
                    }
                }
                Operation::Insert => {
                    if trg_index >= self.trg.len() {
                        return false;
                    }
                }
                Operation::Delete => {
                    if src_index >= self.src.len() {
                        return false;
                    }
                }
            }
            if op.advances_source() {
                src_index += 1;
            }
            if op.advances_target() {
                trg_index += 1;
            }
        }
        src_index == self.src.len() && trg_index == self.trg.len()
    }
}
