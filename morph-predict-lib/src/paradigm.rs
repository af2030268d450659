// Paradigm instances: a base form plus its attested inflected forms, and the
// reconstruction of a full paradigm from a set of anchored changes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::change::AnchoredChange;
use crate::error::ModelError;
use crate::types::{Attributes, Form};

/// Placeholder inflection for slots the corpus never attests.
pub const STAR: &str = "STAR";

pub fn star_form() -> Form {
    Form::from(STAR)
}

/// One lemma with its inflected forms, keyed by attribute bundle. A slot can
/// carry several alternatives; the first one listed is primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParadigmInstance {
    base: Form,
    forms: BTreeMap<Attributes, Vec<Form>>,
}

impl ParadigmInstance {
    pub fn new(base: Form, forms: BTreeMap<Attributes, Vec<Form>>) -> ParadigmInstance {
        ParadigmInstance { base, forms }
    }

    /// Rebuilds an inflected paradigm by splicing each rule's rewrite into the
    /// preserved stretches of the base form. Fails if two changes overlap or
    /// touch, or if a change lacks a rewrite for some requested slot.
    pub fn from_changes(
        base: &Form,
        slots: &BTreeSet<Attributes>,
        changes: &[AnchoredChange],
    ) -> Result<ParadigmInstance, ModelError> {
        let mut ordered: Vec<&AnchoredChange> = changes.iter().collect();
        ordered.sort_by(|a, b| a.span.cmp(&b.span));
        for pair in ordered.windows(2) {
            if pair[0].span.intersects_or_touches(&pair[1].span) {
                return Err(ModelError::OverlappingChanges {
                    prev_end: pair[0].span.end,
                    start: pair[1].span.start,
                });
            }
        }
        let mut forms = BTreeMap::new();
        for slot in slots {
            let mut infl = Form::default();
            let mut consumed = 0;
            for change in &ordered {
                let rewrite = change.change.rewrite.get(slot).ok_or_else(|| {
                    ModelError::IncompleteRewrite {
                        rule: change.change.to_string(),
                    }
                })?;
                infl = infl
                    .append(&base.substring(consumed, change.span.start))
                    .append(rewrite);
                consumed = change.span.end;
            }
            infl = infl.append(&base.suffix_from(consumed));
            forms.insert(slot.clone(), vec![infl]);
        }
        Ok(ParadigmInstance { base: base.clone(), forms })
    }

    pub fn base_form(&self) -> &Form {
        &self.base
    }

    pub fn slot_set(&self) -> BTreeSet<Attributes> {
        self.forms.keys().cloned().collect()
    }

    /// Primary inflected form for a slot.
    pub fn infl_form(&self, slot: &Attributes) -> Option<&Form> {
        self.forms.get(slot).and_then(|alts| alts.first())
    }

    pub fn all_infl_forms(&self, slot: &Attributes) -> &[Form] {
        self.forms.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn slots(&self) -> impl Iterator<Item = (&Attributes, &Vec<Form>)> {
        self.forms.iter()
    }

    pub fn num_slots(&self) -> usize {
        self.forms.len()
    }

    pub fn contains_star(&self) -> bool {
        let star = star_form();
        self.forms.values().flatten().any(|f| *f == star)
    }

    /// Checks a predicted paradigm slot-by-slot against this gold instance;
    /// a predicted form counts if the gold slot lists it among alternatives.
    pub fn count_matches_gold(&self, gold: &ParadigmInstance, allow_stars: bool) -> (usize, usize) {
        let star = star_form();
        let mut total = 0;
        let mut correct = 0;
        for (slot, alts) in &gold.forms {
            if !allow_stars && alts.contains(&star) {
                continue;
            }
            total += 1;
            if let Some(predicted) = self.infl_form(slot) {
                if alts.contains(predicted) {
                    correct += 1;
                }
            }
        }
        (correct, total)
    }

    pub fn matches_gold(&self, gold: &ParadigmInstance) -> bool {
        let (correct, total) = self.count_matches_gold(gold, false);
        correct == total
    }
}

impl fmt::Display for ParadigmInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.base)?;
        for (slot, alts) in &self.forms {
            write!(f, " {}=", slot.short_string())?;
            for (i, alt) in alts.iter().enumerate() {
                if i > 0 {
                    write!(f, "/")?;
                }
                write!(f, "{alt}")?;
            }
        }
        Ok(())
    }
}

/// Keeps only instances whose slot set is the most common one in the
/// collection. Corpora mix part-of-speech paradigms in one file; the model
/// trains on a single canonical slot set.
pub fn filter_noncanonical(instances: Vec<ParadigmInstance>) -> Vec<ParadigmInstance> {
    let mut counts: HashMap<BTreeSet<Attributes>, usize> = HashMap::new();
    for instance in &instances {
        *counts.entry(instance.slot_set()).or_insert(0) += 1;
    }
    let Some((canonical, _)) = counts.iter().max_by_key(|(_, n)| **n) else {
        return instances;
    };
    let canonical = canonical.clone();
    let before = instances.len();
    let kept: Vec<ParadigmInstance> = instances
        .into_iter()
        .filter(|instance| instance.slot_set() == canonical)
        .collect();
    if kept.len() < before {
        warn!(
            dropped = before - kept.len(),
            kept = kept.len(),
            "discarded paradigms with noncanonical slot sets"
        );
    }
    kept
}

/// Drops instances with STAR placeholders in any slot.
pub fn filter_stars(instances: Vec<ParadigmInstance>) -> Vec<ParadigmInstance> {
    let before = instances.len();
    let kept: Vec<ParadigmInstance> = instances
        .into_iter()
        .filter(|instance| !instance.contains_star())
        .collect();
    if kept.len() < before {
        warn!(
            dropped = before - kept.len(),
            "discarded paradigms with unattested slots"
        );
    }
    kept
}

/// Running accuracy tallies for a prediction run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct EvalSummary {
    pub paradigms: usize,
    pub paradigms_correct: usize,
    pub slots: usize,
    pub slots_correct: usize,
}

impl EvalSummary {
    pub fn accumulate(&mut self, predicted: &ParadigmInstance, gold: &ParadigmInstance) {
        let (correct, total) = predicted.count_matches_gold(gold, false);
        self.paradigms += 1;
        if correct == total {
            self.paradigms_correct += 1;
        }
        self.slots += total;
        self.slots_correct += correct;
    }

    pub fn render(&self) -> String {
        format!(
            "paradigm accuracy {}/{} ({:.2}%), form accuracy {}/{} ({:.2}%)",
            self.paradigms_correct,
            self.paradigms,
            percent(self.paradigms_correct, self.paradigms),
            self.slots_correct,
            self.slots,
            percent(self.slots_correct, self.slots),
        )
    }
}

fn percent(num: usize, den: usize) -> f64 {
    if den == 0 {
        return 0.0;
    }
    100.0 * num as f64 / den as f64
}
