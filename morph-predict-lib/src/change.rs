// Morphological rewrite rules and their anchored occurrences.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::span::Span;
use crate::types::{Attributes, Form};

/// A rule rewriting one substring of the base form into one target-side
/// string per inflectional slot. Two occurrences of the same surface change
/// compare equal, so this type doubles as the inventory key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MorphChange {
    pub base: Form,
    pub rewrite: BTreeMap<Attributes, Form>,
}

impl MorphChange {
    pub fn new(base: Form, rewrite: BTreeMap<Attributes, Form>) -> MorphChange {
        MorphChange { base, rewrite }
    }

    pub fn slots(&self) -> impl Iterator<Item = &Attributes> {
        self.rewrite.keys()
    }
}

impl fmt::Display for MorphChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=>", self.base)?;
        for (i, form) in self.rewrite.values().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{form}")?;
        }
        Ok(())
    }
}

/// A rule applied at a particular span of a particular base form.
///
/// `source` records which base form the occurrence was extracted from and is
/// diagnostic only; equality and hashing deliberately ignore it so occurrences
/// of one rule at the same offsets collapse across the training set.
#[derive(Debug, Clone)]
pub struct AnchoredChange {
    pub change: MorphChange,
    pub span: Span,
    pub source: Option<Form>,
}

impl AnchoredChange {
    pub fn new(change: MorphChange, span: Span) -> AnchoredChange {
        AnchoredChange { change, span, source: None }
    }

    /// Two anchored changes conflict when their spans overlap or touch; the
    /// segmentation lattice never applies two rules at adjacent offsets.
    pub fn conflicts_with(&self, other: &AnchoredChange) -> bool {
        self.span.intersects_or_touches(&other.span)
    }
}

impl PartialEq for AnchoredChange {
    fn eq(&self, other: &AnchoredChange) -> bool {
        self.change == other.change && self.span == other.span
    }
}

impl Eq for AnchoredChange {}

impl Hash for AnchoredChange {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.change.hash(state);
        self.span.hash(state);
    }
}

impl fmt::Display for AnchoredChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ [{}, {})", self.change, self.span.start, self.span.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn change(base: &str, rewrite: &str) -> MorphChange {
        let mut map = BTreeMap::new();
        map.insert(Attributes::from_pairs([("tense", "past")]), Form::from(rewrite));
        MorphChange::new(Form::from(base), map)
    }

    #[test]
    fn source_is_ignored_by_equality() {
        let span = Span::new(Form::from("walk"), 4, 4);
        let mut a = AnchoredChange::new(change("", "ed"), span.clone());
        let b = AnchoredChange::new(change("", "ed"), span);
        a.source = Some(Form::from("walk"));
        assert_eq!(a, b);
        let set: HashSet<AnchoredChange> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn touching_spans_conflict() {
        let form = Form::from("gespielt");
        let a = AnchoredChange::new(change("", "ge"), Span::new(form.clone(), 0, 0));
        let b = AnchoredChange::new(change("en", "t"), Span::new(form.clone(), 6, 8));
        let c = AnchoredChange::new(change("", "x"), Span::new(form, 0, 0));
        assert!(!a.conflicts_with(&b));
        assert!(a.conflicts_with(&c));
    }
}
