// Match filtering: where in a base form is a rule allowed to apply?
//
// Every rule may only apply where its source-side text occurs. With match
// filtering enabled, a rule additionally requires one character of context on
// either side whenever that character was invariant across all of its
// training occurrences. This sharply cuts spurious matches of insertion-only
// rules, whose source side is empty and would otherwise match everywhere.

use std::collections::HashMap;

use tracing::debug;

use crate::change::MorphChange;
use crate::error::ModelError;
use crate::inventory::ChangeInventory;
use crate::span::Span;
use crate::types::{Form, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSide {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternElement {
    pub side: ContextSide,
    pub symbol: Symbol,
}

/// A span of literal text plus context requirements around it. Each element
/// advances a cursor away from the matched span, so two Before elements in
/// a row constrain the two characters preceding the span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub text: Form,
    pub elements: Vec<PatternElement>,
}

impl Pattern {
    pub fn bare(text: Form) -> Pattern {
        Pattern { text, elements: Vec::new() }
    }

    pub fn new(text: Form, elements: Vec<PatternElement>) -> Pattern {
        Pattern { text, elements }
    }

    pub fn find_matching_spans(&self, form: &Form) -> Vec<Span> {
        let mut spans = Vec::new();
        if self.text.len() > form.len() {
            return spans;
        }
        for start in 0..=(form.len() - self.text.len()) {
            if self.matches_at(form, start) {
                spans.push(Span::new(form.clone(), start, start + self.text.len()));
            }
        }
        spans
    }

    fn matches_at(&self, form: &Form, start: usize) -> bool {
        let end = start + self.text.len();
        if form.substring(start, end) != self.text {
            return false;
        }
        let mut cursor = FormCursor::new(start, end);
        self.elements
            .iter()
            .all(|element| cursor.read_and_advance(form, element.side) == element.symbol)
    }
}

/// Cursors stepping outward from a span, reading boundary sentinels past
/// either end of the form.
struct FormCursor {
    before_index: isize,
    after_index: isize,
}

impl FormCursor {
    fn new(span_start: usize, span_end: usize) -> FormCursor {
        FormCursor {
            before_index: span_start as isize - 1,
            after_index: span_end as isize,
        }
    }

    fn read_and_advance(&mut self, form: &Form, side: ContextSide) -> Symbol {
        match side {
            ContextSide::Before => {
                let symbol = form.symbol_or_boundary(self.before_index);
                self.before_index -= 1;
                symbol
            }
            ContextSide::After => {
                let symbol = form.symbol_or_boundary(self.after_index);
                self.after_index += 1;
                symbol
            }
        }
    }
}

/// Learned filter patterns for every rule in an inventory.
#[derive(Debug, Clone)]
pub struct ChangeMatcher {
    patterns: HashMap<MorphChange, Pattern>,
}

impl ChangeMatcher {
    /// Builds one pattern per rule. With filtering, a Before (resp. After)
    /// context element is added when the character preceding (following) the
    /// occurrence span was the same across every training occurrence.
    pub fn learn(inventory: &ChangeInventory, use_filtering: bool) -> ChangeMatcher {
        let mut patterns = HashMap::new();
        for rule in inventory.rules() {
            let pattern = if use_filtering {
                let mut before: Option<Symbol> = None;
                let mut bad_before = false;
                let mut after: Option<Symbol> = None;
                let mut bad_after = false;
                for anchored in inventory.occurrences(rule) {
                    let form = &anchored.span.form;
                    let b = form.symbol_or_boundary(anchored.span.start as isize - 1);
                    let a = form.symbol_or_boundary(anchored.span.end as isize);
                    if !bad_before {
                        match before {
                            None => before = Some(b),
                            Some(seen) if seen != b => bad_before = true,
                            Some(_) => {}
                        }
                    }
                    if !bad_after {
                        match after {
                            None => after = Some(a),
                            Some(seen) if seen != a => bad_after = true,
                            Some(_) => {}
                        }
                    }
                }
                let mut elements = Vec::new();
                if let (false, Some(symbol)) = (bad_before, before) {
                    elements.push(PatternElement { side: ContextSide::Before, symbol });
                }
                if let (false, Some(symbol)) = (bad_after, after) {
                    elements.push(PatternElement { side: ContextSide::After, symbol });
                }
                let pattern = Pattern::new(rule.base.clone(), elements);
                debug!(rule = %rule, context = pattern.elements.len(), "learned filter pattern");
                pattern
            } else {
                Pattern::bare(rule.base.clone())
            };
            patterns.insert(rule.clone(), pattern);
        }
        ChangeMatcher { patterns }
    }

    pub fn pattern(&self, rule: &MorphChange) -> Option<&Pattern> {
        self.patterns.get(rule)
    }

    /// All spans of `base` where the rule is allowed to apply.
    pub fn find_matching_spans(
        &self,
        base: &Form,
        rule: &MorphChange,
    ) -> Result<Vec<Span>, ModelError> {
        let pattern = self
            .patterns
            .get(rule)
            .ok_or_else(|| ModelError::UnknownRule(rule.to_string()))?;
        Ok(pattern.find_matching_spans(base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::analysis::AlignmentMode;
    use crate::paradigm::ParadigmInstance;
    use crate::types::Attributes;

    fn slot(value: &str) -> Attributes {
        Attributes::from_pairs([("form", value)])
    }

    fn instance(base: &str, pairs: &[(&str, &str)]) -> ParadigmInstance {
        let mut forms = BTreeMap::new();
        for (value, infl) in pairs {
            forms.insert(slot(value), vec![Form::from(*infl)]);
        }
        ParadigmInstance::new(Form::from(base), forms)
    }

    #[test]
    fn bare_pattern_matches_every_occurrence() {
        let pattern = Pattern::bare(Form::from("ab"));
        let spans = pattern.find_matching_spans(&Form::from("abcab"));
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].start, 0);
        assert_eq!(spans[1].start, 3);
    }

    #[test]
    fn empty_pattern_matches_between_every_symbol() {
        let pattern = Pattern::bare(Form::from(""));
        let spans = pattern.find_matching_spans(&Form::from("abc"));
        assert_eq!(spans.len(), 4);
    }

    #[test]
    fn before_context_restricts_matches() {
        let pattern = Pattern::new(
            Form::from("ab"),
            vec![PatternElement { side: ContextSide::Before, symbol: Symbol::new('g') }],
        );
        assert_eq!(pattern.find_matching_spans(&Form::from("gabab")).len(), 1);
        assert!(pattern.find_matching_spans(&Form::from("abab")).is_empty());
    }

    #[test]
    fn begin_sentinel_anchors_to_word_start() {
        let pattern = Pattern::new(
            Form::from("ab"),
            vec![PatternElement { side: ContextSide::Before, symbol: Symbol::BEGIN }],
        );
        assert_eq!(pattern.find_matching_spans(&Form::from("abab")).len(), 1);
        assert_eq!(pattern.find_matching_spans(&Form::from("abab"))[0].start, 0);
    }

    #[test]
    fn learned_suffix_rule_anchors_to_word_end() {
        // All occurrences of the "ed" rule sit at the word end, so the
        // learned pattern requires the END sentinel after the span.
        let inventory = ChangeInventory::extract(
            vec![
                instance("walk", &[("bare", "walk"), ("past", "walked")]),
                instance("turn", &[("bare", "turn"), ("past", "turned")]),
            ],
            AlignmentMode::Basic,
        )
        .unwrap();
        let matcher = ChangeMatcher::learn(&inventory, true);
        let rule = &inventory.rules()[0];
        let spans = matcher.find_matching_spans(&Form::from("bark"), rule).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0], Span::new(Form::from("bark"), 4, 4));

        // Without filtering the empty-source rule matches everywhere.
        let bare = ChangeMatcher::learn(&inventory, false);
        assert_eq!(bare.find_matching_spans(&Form::from("bark"), rule).unwrap().len(), 5);
    }

    #[test]
    fn unknown_rule_is_rejected() {
        let inventory = ChangeInventory::extract(
            vec![instance("walk", &[("bare", "walk"), ("past", "walked")])],
            AlignmentMode::Basic,
        )
        .unwrap();
        let matcher = ChangeMatcher::learn(&inventory, true);
        let unseen = MorphChange::new(Form::from("zz"), BTreeMap::new());
        assert!(matcher.find_matching_spans(&Form::from("walk"), &unseen).is_err());
    }
}
