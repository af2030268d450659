// The joint model: candidate generation via match filtering, log-linear
// scoring over segmentation lattices, L2-regularized conditional likelihood
// training, and full-paradigm prediction.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use crate::analysis::AlignmentMode;
use crate::change::AnchoredChange;
use crate::error::ModelError;
use crate::features::{FeatureIndexer, FeatureSpace, FrozenFeatures, SpanFeaturizer};
use crate::inventory::ChangeInventory;
use crate::lattice::Lattice;
use crate::opt::{DifferentiableFn, Lbfgs};
use crate::paradigm::ParadigmInstance;
use crate::pattern::ChangeMatcher;
use crate::types::{Attributes, Form};

#[derive(Debug, Clone)]
pub struct JointConfig {
    pub alignment: AlignmentMode,
    pub rule_ngram_order: usize,
    pub rule_max_distance: usize,
    pub preserve_ngram_order: usize,
    pub preserve_max_distance: usize,
    pub use_match_filtering: bool,
    pub l2: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for JointConfig {
    fn default() -> JointConfig {
        JointConfig {
            alignment: AlignmentMode::Consistent,
            rule_ngram_order: 4,
            rule_max_distance: 5,
            preserve_ngram_order: 4,
            preserve_max_distance: 5,
            use_match_filtering: true,
            l2: 1e-5,
            tolerance: 0.01,
            max_iterations: 30,
        }
    }
}

/// A trained predictor: the rule inventory plus learned filter patterns and
/// feature weights.
pub struct JointModel {
    inventory: ChangeInventory,
    matcher: ChangeMatcher,
    rule_featurizer: SpanFeaturizer,
    preserve_featurizer: SpanFeaturizer,
    features: FrozenFeatures,
    weights: Vec<f64>,
}

/// One predicted paradigm with the rule applications that produced it.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub instance: ParadigmInstance,
    pub changes: Vec<AnchoredChange>,
}

impl JointModel {
    /// Featurizes every training paradigm's lattice, then fits the weights by
    /// maximizing L2-regularized conditional log likelihood.
    pub fn train(inventory: ChangeInventory, config: &JointConfig) -> Result<JointModel, ModelError> {
        let matcher = ChangeMatcher::learn(&inventory, config.use_match_filtering);
        let rule_featurizer =
            SpanFeaturizer::new(config.rule_ngram_order, config.rule_max_distance);
        let preserve_featurizer =
            SpanFeaturizer::new(config.preserve_ngram_order, config.preserve_max_distance);
        let rule_indices = inventory.rule_indices();

        let mut indexer = FeatureIndexer::new();
        let mut lattices = Vec::with_capacity(inventory.analyzed().len());
        for analyzed in inventory.analyzed() {
            let base = analyzed.instance.base_form();
            let candidates =
                candidate_changes(base, &inventory, &matcher)?;
            let gold = analyzed.changes();
            let mut space = FeatureSpace::Building(&mut indexer);
            lattices.push(Lattice::build(
                base,
                candidates,
                Some(gold),
                &rule_featurizer,
                &preserve_featurizer,
                &rule_indices,
                &mut space,
            )?);
        }
        info!(
            lattices = lattices.len(),
            features = indexer.len(),
            rules = inventory.rules().len(),
            "featurized training set"
        );

        let dimension = indexer.len();
        let weights = if inventory.rules().is_empty() {
            // Nothing to discriminate between; the optimizer has no gold
            // change edges to fit and would make no progress.
            vec![0.0; dimension]
        } else {
            let mut objective = NegatedLikelihood {
                lattices: &lattices,
                l2: config.l2,
                dimension,
            };
            let minimizer = Lbfgs::new(config.max_iterations);
            minimizer.minimize(&mut objective, vec![0.0; dimension], config.tolerance)?
        };
        let model = JointModel {
            inventory,
            matcher,
            rule_featurizer,
            preserve_featurizer,
            features: indexer.freeze(),
            weights,
        };
        let correct = lattices
            .iter()
            .zip(model.inventory.analyzed())
            .filter(|(lattice, analyzed)| {
                lattice.predicts_correctly(&model.weights, analyzed.changes())
            })
            .count();
        info!(
            correct,
            total = lattices.len(),
            "training segmentation accuracy"
        );
        Ok(model)
    }

    pub fn inventory(&self) -> &ChangeInventory {
        &self.inventory
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Predicts the full paradigm of an unseen base form. The requested slot
    /// set must match the one the inventory was extracted with.
    pub fn predict(
        &self,
        base: &Form,
        slots: &BTreeSet<Attributes>,
    ) -> Result<Prediction, ModelError> {
        if slots != self.inventory.slot_set() {
            return Err(ModelError::SlotSetMismatch);
        }
        let candidates = candidate_changes(base, &self.inventory, &self.matcher)?;
        let mut space = FeatureSpace::Frozen(&self.features);
        let lattice = Lattice::build(
            base,
            candidates,
            None,
            &self.rule_featurizer,
            &self.preserve_featurizer,
            &self.inventory.rule_indices(),
            &mut space,
        )?;
        let changes = lattice.decode(&self.weights);
        debug!(base = %base, changes = changes.len(), "decoded paradigm");
        let instance = ParadigmInstance::from_changes(base, slots, &changes)?;
        Ok(Prediction { instance, changes })
    }
}

/// Anchors every inventory rule at each span where its filter pattern
/// matches the base form.
fn candidate_changes(
    base: &Form,
    inventory: &ChangeInventory,
    matcher: &ChangeMatcher,
) -> Result<Vec<AnchoredChange>, ModelError> {
    let mut candidates = Vec::new();
    for rule in inventory.rules() {
        for span in matcher.find_matching_spans(base, rule)? {
            candidates.push(AnchoredChange::new(rule.clone(), span));
        }
    }
    Ok(candidates)
}

/// Negated L2-regularized conditional log likelihood over all training
/// lattices, in minimization form.
struct NegatedLikelihood<'a> {
    lattices: &'a [Lattice],
    l2: f64,
    dimension: usize,
}

impl DifferentiableFn for NegatedLikelihood<'_> {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn value_and_gradient(&mut self, point: &[f64]) -> (f64, Vec<f64>) {
        let mut objective = 0.0;
        let mut gradient = vec![0.0; self.dimension];
        for lattice in self.lattices {
            objective += lattice.log_likelihood(point);
            lattice.accumulate_gradient(point, &mut gradient);
        }
        for (g, w) in gradient.iter_mut().zip(point) {
            objective -= self.l2 * w * w;
            *g -= 2.0 * self.l2 * w;
        }
        (-objective, gradient.into_iter().map(|g| -g).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

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

    fn training_set() -> Vec<ParadigmInstance> {
        vec![
            instance("walk", &[("pres", "walk"), ("past", "walked")]),
            instance("talk", &[("pres", "talk"), ("past", "talked")]),
            instance("jump", &[("pres", "jump"), ("past", "jumped")]),
        ]
    }

    #[test]
    fn learns_and_applies_a_suffix_rule() {
        let inventory =
            ChangeInventory::extract(training_set(), AlignmentMode::Basic).unwrap();
        let slots = inventory.slot_set().clone();
        let model = JointModel::train(inventory, &JointConfig::default()).unwrap();
        let prediction = model.predict(&Form::from("bark"), &slots).unwrap();
        assert_eq!(
            prediction.instance.infl_form(&slot("past")),
            Some(&Form::from("barked"))
        );
        assert_eq!(
            prediction.instance.infl_form(&slot("pres")),
            Some(&Form::from("bark"))
        );
        assert_eq!(prediction.changes.len(), 1);
    }

    #[test]
    fn slot_set_mismatch_is_rejected() {
        let inventory =
            ChangeInventory::extract(training_set(), AlignmentMode::Basic).unwrap();
        let model = JointModel::train(inventory, &JointConfig::default()).unwrap();
        let wrong: BTreeSet<Attributes> = [slot("subjunctive")].into_iter().collect();
        assert!(matches!(
            model.predict(&Form::from("bark"), &wrong),
            Err(ModelError::SlotSetMismatch)
        ));
    }

    #[test]
    fn zero_rule_inventory_predicts_identity() {
        // Paradigms whose forms equal the base produce no changed spans, so
        // the inventory is empty and prediction copies the base everywhere.
        let inventory = ChangeInventory::extract(
            vec![
                instance("sheep", &[("pres", "sheep"), ("past", "sheep")]),
                instance("deer", &[("pres", "deer"), ("past", "deer")]),
            ],
            AlignmentMode::Basic,
        )
        .unwrap();
        assert!(inventory.rules().is_empty());
        let slots = inventory.slot_set().clone();
        let model = JointModel::train(inventory, &JointConfig::default()).unwrap();
        let prediction = model.predict(&Form::from("fish"), &slots).unwrap();
        assert_eq!(
            prediction.instance.infl_form(&slot("past")),
            Some(&Form::from("fish"))
        );
        assert!(prediction.changes.is_empty());
    }
}
