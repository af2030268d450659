// Aggregation of anchored changes over a training corpus. The inventory is
// the complete capacity of the predictor: it can only ever propose rules
// that were extracted from at least one training paradigm.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;

use tracing::{debug, info};

use crate::analysis::{AlignmentMode, AnalyzedParadigm};
use crate::change::{AnchoredChange, MorphChange};
use crate::error::ModelError;
use crate::paradigm::ParadigmInstance;
use crate::types::Attributes;

/// Whether adjacent (touching, non-overlapping) changed spans are merged
/// into one rule during extraction.
pub const COLLAPSE_ADJACENT_SPANS: bool = true;

#[derive(Debug, Clone)]
pub struct ChangeInventory {
    analyzed: Vec<AnalyzedParadigm>,
    // First-encounter order; gives every rule a stable index.
    rules: Vec<MorphChange>,
    occurrences: HashMap<MorphChange, Vec<AnchoredChange>>,
    slot_set: BTreeSet<Attributes>,
}

impl ChangeInventory {
    /// Analyzes every training instance and groups the extracted changes by
    /// their unanchored rule identity. Instances with STAR slots are skipped.
    pub fn extract(
        instances: Vec<ParadigmInstance>,
        mode: AlignmentMode,
    ) -> Result<ChangeInventory, ModelError> {
        let mut analyzed = Vec::new();
        let mut rules = Vec::new();
        let mut occurrences: HashMap<MorphChange, Vec<AnchoredChange>> = HashMap::new();
        let mut slot_set = BTreeSet::new();
        let mut skipped = 0;
        for instance in instances {
            if instance.contains_star() {
                skipped += 1;
                continue;
            }
            if slot_set.is_empty() {
                slot_set = instance.slot_set();
            }
            let mut paradigm = AnalyzedParadigm::new(instance);
            paradigm.analyze(mode)?;
            let changes = paradigm.extract_changes(COLLAPSE_ADJACENT_SPANS)?;
            for anchored in changes {
                let entry = occurrences.entry(anchored.change.clone()).or_default();
                if entry.is_empty() {
                    rules.push(anchored.change.clone());
                }
                entry.push(anchored.clone());
            }
            analyzed.push(paradigm);
        }
        if skipped > 0 {
            debug!(skipped, "skipped paradigms with unattested slots");
        }
        info!(
            paradigms = analyzed.len(),
            rules = rules.len(),
            "extracted change inventory"
        );
        Ok(ChangeInventory {
            analyzed,
            rules,
            occurrences,
            slot_set,
        })
    }

    pub fn analyzed(&self) -> &[AnalyzedParadigm] {
        &self.analyzed
    }

    /// Rules in the order they were first encountered.
    pub fn rules(&self) -> &[MorphChange] {
        &self.rules
    }

    pub fn occurrences(&self, rule: &MorphChange) -> &[AnchoredChange] {
        self.occurrences
            .get(rule)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Stable rule index map for featurization.
    pub fn rule_indices(&self) -> HashMap<MorphChange, usize> {
        self.rules
            .iter()
            .enumerate()
            .map(|(i, rule)| (rule.clone(), i))
            .collect()
    }

    pub fn contains(&self, rule: &MorphChange) -> bool {
        self.occurrences.contains_key(rule)
    }

    pub fn slot_set(&self) -> &BTreeSet<Attributes> {
        &self.slot_set
    }

    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let mut counted: Vec<(&MorphChange, usize)> = self
            .rules
            .iter()
            .map(|rule| (rule, self.occurrences(rule).len()))
            .collect();
        counted.sort_by(|a, b| b.1.cmp(&a.1));
        for (rule, count) in counted {
            let _ = writeln!(out, "{count}\t{rule}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::types::Form;

    fn slot(value: &str) -> Attributes {
        Attributes::from_pairs([("tense", value)])
    }

    fn instance(base: &str, pairs: &[(&str, &str)]) -> ParadigmInstance {
        let mut forms = BTreeMap::new();
        for (value, infl) in pairs {
            forms.insert(slot(value), vec![Form::from(*infl)]);
        }
        ParadigmInstance::new(Form::from(base), forms)
    }

    #[test]
    fn shared_suffix_rule_groups_occurrences() {
        let inventory = ChangeInventory::extract(
            vec![
                instance("walk", &[("pres", "walk"), ("past", "walked")]),
                instance("talk", &[("pres", "talk"), ("past", "talked")]),
                instance("jump", &[("pres", "jump"), ("past", "jumped")]),
            ],
            AlignmentMode::Basic,
        )
        .unwrap();
        assert_eq!(inventory.rules().len(), 1);
        let rule = &inventory.rules()[0];
        assert_eq!(rule.base, Form::from(""));
        assert_eq!(rule.rewrite.get(&slot("past")), Some(&Form::from("ed")));
        assert_eq!(inventory.occurrences(rule).len(), 3);
    }

    #[test]
    fn star_instances_are_skipped() {
        let inventory = ChangeInventory::extract(
            vec![
                instance("walk", &[("pres", "walk"), ("past", "walked")]),
                instance("go", &[("pres", "go"), ("past", "STAR")]),
            ],
            AlignmentMode::Basic,
        )
        .unwrap();
        assert_eq!(inventory.analyzed().len(), 1);
    }

    #[test]
    fn rule_indices_follow_first_encounter() {
        let inventory = ChangeInventory::extract(
            vec![
                instance("walk", &[("pres", "walk"), ("past", "walked")]),
                instance("fry", &[("pres", "fry"), ("past", "fried")]),
            ],
            AlignmentMode::Basic,
        )
        .unwrap();
        let indices = inventory.rule_indices();
        assert_eq!(indices.len(), inventory.rules().len());
        for (i, rule) in inventory.rules().iter().enumerate() {
            assert_eq!(indices[rule], i);
        }
    }
}
