// Spans over a form, with fencepost indices: positions sit *between* symbols,
// so a span (start, end) with start == end is a zero-width insertion point.

use std::cmp::Ordering;

use crate::types::{Form, Operation};

/// A half-open interval `[start, end)` anchored to a specific form. Merge
/// operations are only meaningful between spans over the same form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub form: Form,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(form: Form, start: usize, end: usize) -> Span {
        debug_assert!(start <= end && end <= form.len());
        Span { form, start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The base-form text covered by this span.
    pub fn text(&self) -> Form {
        self.form.substring(self.start, self.end)
    }

    /// Smallest span covering both spans.
    pub fn union(&self, other: &Span) -> Span {
        debug_assert_eq!(self.form, other.form);
        Span::new(
            self.form.clone(),
            self.start.min(other.start),
            self.end.max(other.end),
        )
    }

    /// True iff the open intervals overlap.
    pub fn intersects(&self, other: &Span) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// True iff the spans overlap or are adjacent.
    pub fn intersects_or_touches(&self, other: &Span) -> bool {
        self.start <= other.end && self.end >= other.start
    }
}

impl PartialOrd for Span {
    fn partial_cmp(&self, other: &Span) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Span {
    fn cmp(&self, other: &Span) -> Ordering {
        self.form
            .cmp(&other.form)
            .then(self.start.cmp(&other.start))
            .then(self.end.cmp(&other.end))
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}, {})", self.form, self.start, self.end)
    }
}

/// Walks an operation sequence and returns the spans of the base form covered
/// by maximal runs of non-Equal operations. A trailing non-Equal run (e.g. a
/// pure suffix insertion) never sees a switch back to Equal, so it is closed
/// out at the end.
pub fn changed_spans(base: &Form, ops: &[Operation]) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut src_index = 0;
    let mut change_start = 0;
    let mut in_change = false;
    for &op in ops {
        if op != Operation::Equal && !in_change {
            in_change = true;
            change_start = src_index;
        } else if op == Operation::Equal && in_change {
            in_change = false;
            spans.push(Span::new(base.clone(), change_start, src_index));
        }
        if op.advances_source() {
            src_index += 1;
        }
    }
    if in_change {
        spans.push(Span::new(base.clone(), change_start, src_index));
    }
    spans
}

/// Transitively merges spans that overlap (or, when `include_touching` is
/// set, merely touch). Quadratic, but span lists are tiny. Each merge can
/// enlarge the survivor, so merged spans are rechecked against the rest.
pub fn collapse(spans: Vec<Span>, include_touching: bool) -> Vec<Span> {
    let mut pending = spans;
    let mut finished = Vec::new();
    'outer: while !pending.is_empty() {
        let curr = pending[0].clone();
        for i in 1..pending.len() {
            let should_merge = if include_touching {
                curr.intersects_or_touches(&pending[i])
            } else {
                curr.intersects(&pending[i])
            };
            if should_merge {
                let other = pending.remove(i);
                pending[0] = curr.union(&other);
                continue 'outer;
            }
        }
        finished.push(pending.remove(0));
    }
    finished
}

pub fn collapse_overlapping(spans: Vec<Span>) -> Vec<Span> {
    collapse(spans, false)
}

pub fn collapse_touching(spans: Vec<Span>) -> Vec<Span> {
    collapse(spans, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ops_from_str;

    fn span(form: &Form, start: usize, end: usize) -> Span {
        Span::new(form.clone(), start, end)
    }

    #[test]
    fn union_and_intersection() {
        let f = Form::from("abcdef");
        let a = span(&f, 1, 3);
        let b = span(&f, 2, 5);
        assert!(a.intersects(&b));
        assert_eq!(a.union(&b), span(&f, 1, 5));
        let c = span(&f, 3, 4);
        assert!(!a.intersects(&c));
        assert!(a.intersects_or_touches(&c));
    }

    #[test]
    fn collapse_nested_spans() {
        let f = Form::from("abc");
        let spans = vec![span(&f, 0, 1), span(&f, 0, 2), span(&f, 0, 3)];
        let collapsed = collapse_overlapping(spans);
        assert_eq!(collapsed, vec![span(&f, 0, 3)]);
    }

    #[test]
    fn collapse_respects_touch_setting() {
        let f = Form::from("abc");
        let spans = vec![span(&f, 0, 1), span(&f, 1, 3)];
        // Adjacent but not overlapping: distinct under overlap-only collapse.
        let overlap_only = collapse_overlapping(spans.clone());
        assert_eq!(overlap_only.len(), 2);
        let touching = collapse_touching(spans);
        assert_eq!(touching, vec![span(&f, 0, 3)]);
    }

    #[test]
    fn changed_spans_from_ops() {
        let base = Form::from("staffed");
        let ops = ops_from_str("==S==DD").unwrap();
        let spans = changed_spans(&base, &ops);
        assert_eq!(spans, vec![span(&base, 2, 3), span(&base, 5, 7)]);
    }

    #[test]
    fn trailing_insertion_is_zero_width_at_end() {
        let base = Form::from("walk");
        let ops = ops_from_str("====II").unwrap();
        let spans = changed_spans(&base, &ops);
        assert_eq!(spans, vec![span(&base, 4, 4)]);
    }

    #[test]
    fn all_equal_has_no_changed_spans() {
        let base = Form::from("walk");
        let ops = ops_from_str("====").unwrap();
        assert!(changed_spans(&base, &ops).is_empty());
    }
}
