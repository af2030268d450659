// Alignment of each inflected form against its base, followed by span
// merging and rule extraction.

use std::collections::BTreeMap;

use tracing::warn;

use crate::align::{align, EditCosts};
use crate::change::{AnchoredChange, MorphChange};
use crate::error::ModelError;
use crate::paradigm::ParadigmInstance;
use crate::span::{changed_spans, collapse, Span};
use crate::types::{Attributes, Form, Operation};

/// Tiny switching cost so that among equal-cost alignments the one with the
/// fewest contiguous changed regions wins.
pub const SWITCH_COST: f64 = 1e-5;

/// Cap on consistent-alignment re-estimation rounds.
pub const MAX_CONSISTENT_ITERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentMode {
    /// Plain edit distance per form.
    Basic,
    /// Maximize the number of aligned symbols per form.
    MaxAlign,
    /// Max-alignment with positions rewarded for aligning consistently
    /// across the whole paradigm, re-estimated to a fixed point.
    Consistent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentOutcome {
    Converged { iterations: usize },
    CapReached,
}

/// A paradigm instance together with its per-slot alignments and the anchored
/// changes extracted from them.
#[derive(Debug, Clone)]
pub struct AnalyzedParadigm {
    pub instance: ParadigmInstance,
    alignments: BTreeMap<Attributes, Vec<Operation>>,
    changes: Vec<AnchoredChange>,
}

impl AnalyzedParadigm {
    pub fn new(instance: ParadigmInstance) -> AnalyzedParadigm {
        AnalyzedParadigm {
            instance,
            alignments: BTreeMap::new(),
            changes: Vec::new(),
        }
    }

    pub fn alignments(&self) -> &BTreeMap<Attributes, Vec<Operation>> {
        &self.alignments
    }

    pub fn changes(&self) -> &[AnchoredChange] {
        &self.changes
    }

    /// Aligns every inflected form to the base form.
    pub fn analyze(&mut self, mode: AlignmentMode) -> Result<AlignmentOutcome, ModelError> {
        self.alignments.clear();
        match mode {
            AlignmentMode::Basic | AlignmentMode::MaxAlign => {
                self.analyze_simple(mode)?;
                Ok(AlignmentOutcome::Converged { iterations: 1 })
            }
            AlignmentMode::Consistent => self.analyze_consistent(),
        }
    }

    fn analyze_simple(&mut self, mode: AlignmentMode) -> Result<(), ModelError> {
        let base = self.instance.base_form().clone();
        for (slot, alts) in self.instance.slots() {
            let Some(infl) = alts.first() else { continue };
            let costs = match mode {
                AlignmentMode::Basic => EditCosts::standard(base.len(), SWITCH_COST),
                _ => EditCosts::max_alignment(base.len(), SWITCH_COST),
            };
            let aligned = align(&base, infl, &costs)?;
            self.alignments.insert(slot.clone(), aligned.ops);
        }
        Ok(())
    }

    /// Re-estimates per-position Equal rewards until no alignment changes.
    /// Each round rewards a base position once for every slot whose alignment
    /// consumed it with Equal in the previous round. The first round seeds
    /// every position with a reward of 1, otherwise an all-indel path would
    /// undercut any path that pays the switching cost to enter Equal.
    fn analyze_consistent(&mut self) -> Result<AlignmentOutcome, ModelError> {
        let base = self.instance.base_form().clone();
        let mut old_costs = vec![-1.0; base.len()];
        let mut iterations = 0;
        loop {
            if iterations >= MAX_CONSISTENT_ITERS {
                warn!(base = %base, "consistent alignment failed to converge, stopping");
                return Ok(AlignmentOutcome::CapReached);
            }
            let mut changed = false;
            let mut new_costs = vec![0.0; base.len()];
            for (slot, alts) in self.instance.slots() {
                let Some(infl) = alts.first() else { continue };
                let costs = EditCosts::weighted_max_alignment(old_costs.clone(), SWITCH_COST);
                let aligned = align(&base, infl, &costs)?;
                if self.alignments.get(slot) != Some(&aligned.ops) {
                    changed = true;
                }
                update_alignment_costs(&mut new_costs, &aligned.ops);
                self.alignments.insert(slot.clone(), aligned.ops);
            }
            iterations += 1;
            if !changed {
                return Ok(AlignmentOutcome::Converged { iterations });
            }
            old_costs = new_costs;
        }
    }

    /// Extracts the anchored changes characterizing this paradigm: the union
    /// of changed spans across all slots, each paired with the target-side
    /// rewrite it produces in every inflected form.
    pub fn extract_changes(
        &mut self,
        collapse_touching: bool,
    ) -> Result<&[AnchoredChange], ModelError> {
        if self.alignments.is_empty() {
            return Err(ModelError::Parse(format!(
                "paradigm for {} has not been aligned",
                self.instance.base_form()
            )));
        }
        let spans = self.overall_changed_spans(collapse_touching);
        self.changes.clear();
        for span in spans {
            let change = self.extract_change_over_span(&span);
            self.changes.push(AnchoredChange {
                change,
                span,
                source: Some(self.instance.base_form().clone()),
            });
        }
        Ok(&self.changes)
    }

    fn overall_changed_spans(&self, collapse_touching: bool) -> Vec<Span> {
        let base = self.instance.base_form();
        let mut spans = Vec::new();
        for ops in self.alignments.values() {
            spans.extend(changed_spans(base, ops));
            spans = collapse(spans, collapse_touching);
        }
        spans
    }

    fn extract_change_over_span(&self, span: &Span) -> MorphChange {
        let mut rewrite = BTreeMap::new();
        for (slot, ops) in &self.alignments {
            if let Some(infl) = self.instance.infl_form(slot) {
                rewrite.insert(slot.clone(), extract_span_target_side(infl, ops, span));
            }
        }
        let base_text = self
            .instance
            .base_form()
            .substring(span.start, span.end);
        MorphChange::new(base_text, rewrite)
    }
}

fn update_alignment_costs(costs: &mut [f64], ops: &[Operation]) {
    let mut src_index = 0;
    for &op in ops {
        if op == Operation::Equal {
            costs[src_index] -= 1.0;
        }
        if op.advances_source() {
            src_index += 1;
        }
    }
}

/// Walks an operation sequence to recover the target-side substring produced
/// over a source-side span. Insertions sitting on the span's start belong to
/// it, as do trailing insertions at its end.
fn extract_span_target_side(infl: &Form, ops: &[Operation], src_span: &Span) -> Form {
    let mut src_index = 0;
    let mut trg_index = 0;
    let mut trg_start = None;
    let mut trg_end = None;
    for &op in ops {
        if src_index == src_span.start && trg_start.is_none() {
            trg_start = Some(trg_index);
        }
        if src_index == src_span.end && op != Operation::Insert {
            trg_end = Some(trg_index);
            break;
        }
        if op.advances_source() {
            src_index += 1;
        }
        if op.advances_target() {
            trg_index += 1;
        }
    }
    // Zero-width span at the very end of the form.
    let trg_start = trg_start.unwrap_or(trg_index);
    // Ops ran out while inserting.
    let trg_end = trg_end.unwrap_or(trg_index);
    infl.substring(trg_start, trg_end)
}
