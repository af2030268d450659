// Semi-Markov segmentation lattice over one base form. States live on the
// fenceposts between symbols; a step either preserves one symbol or applies
// a candidate rule over a span. Likelihood and gradients come from
// forward-backward in log space; decoding is the same recursion max-plus.

use std::collections::HashMap;

use crate::change::{AnchoredChange, MorphChange};
use crate::error::ModelError;
use crate::features::{FeatureSpace, SpanFeaturizer};
use crate::span::Span;
use crate::types::Form;

#[derive(Debug, Clone)]
pub struct Lattice {
    base: Form,
    candidates: Vec<AnchoredChange>,
    change_feats: Vec<Vec<usize>>,
    // Indexed by fencepost; entry len(base) is empty.
    preserve_feats: Vec<Vec<usize>>,
    gold_changes_on: Option<Vec<bool>>,
    // Positions covered by (or immediately following) a gold change are not
    // gold-preserved; their symbols belong to the change.
    gold_preserved: Vec<bool>,
    // Candidate indices by (span start, span end).
    by_span: Vec<Vec<Vec<usize>>>,
}

impl Lattice {
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        base: &Form,
        candidates: Vec<AnchoredChange>,
        gold: Option<&[AnchoredChange]>,
        rule_featurizer: &SpanFeaturizer,
        preserve_featurizer: &SpanFeaturizer,
        rule_indices: &HashMap<MorphChange, usize>,
        features: &mut FeatureSpace<'_>,
    ) -> Result<Lattice, ModelError> {
        let len = base.len();
        let mut change_feats = Vec::with_capacity(candidates.len());
        let mut gold_changes_on = gold.map(|_| Vec::with_capacity(candidates.len()));
        let mut by_span = vec![vec![Vec::new(); len + 1]; len + 1];
        for (i, candidate) in candidates.iter().enumerate() {
            let rule_index = rule_indices
                .get(&candidate.change)
                .ok_or_else(|| ModelError::UnknownRule(candidate.change.to_string()))?;
            // Each candidate fires its rule-identity features plus a factored
            // group keyed by (slot, base substring, per-slot rewrite), so
            // partial rules can share evidence across inventory entries.
            let mut prefixes = vec![format!("CHANGE-{rule_index}:")];
            for (attrs, rewrite) in &candidate.change.rewrite {
                prefixes.push(format!("{attrs}:{}=>{rewrite}", candidate.change.base));
            }
            let span_features = rule_featurizer.features(&candidate.span);
            let mut indexed = Vec::with_capacity(prefixes.len() * span_features.len());
            for prefix in &prefixes {
                for span_feature in &span_features {
                    indexed.push(features.index(&format!("{prefix}{span_feature}")));
                }
            }
            change_feats.push(indexed);
            if let (Some(on), Some(gold)) = (gold_changes_on.as_mut(), gold) {
                on.push(gold.contains(candidate));
            }
            by_span[candidate.span.start][candidate.span.end].push(i);
        }
        let mut preserve_feats = Vec::with_capacity(len + 1);
        let mut gold_preserved = Vec::with_capacity(len + 1);
        for i in 0..len {
            let prefix = format!("PRESERVE:{}", base.symbol(i));
            let span_features = preserve_featurizer.features(&Span::new(base.clone(), i, i + 1));
            let mut indexed = Vec::with_capacity(span_features.len());
            for span_feature in &span_features {
                indexed.push(features.index(&format!("{prefix}{span_feature}")));
            }
            preserve_feats.push(indexed);
            let preserved = gold.map_or(true, |gold| {
                !gold
                    .iter()
                    .any(|change| change.span.start <= i && i <= change.span.end)
            });
            gold_preserved.push(preserved);
        }
        preserve_feats.push(Vec::new());
        gold_preserved.push(true);
        Ok(Lattice {
            base: base.clone(),
            candidates,
            change_feats,
            preserve_feats,
            gold_changes_on,
            gold_preserved,
            by_span,
        })
    }

    pub fn candidates(&self) -> &[AnchoredChange] {
        &self.candidates
    }

    fn change_scores(&self, weights: &[f64]) -> Vec<f64> {
        self.change_feats
            .iter()
            .map(|feats| feats.iter().map(|&f| weights[f]).sum())
            .collect()
    }

    fn preserve_scores(&self, weights: &[f64]) -> Vec<f64> {
        self.preserve_feats
            .iter()
            .map(|feats| feats.iter().map(|&f| weights[f]).sum())
            .collect()
    }

    /// Forward scores on fenceposts, one extra slot holding the total.
    fn alphas(&self, change_scores: &[f64], preserve_scores: &[f64], max: bool) -> Vec<f64> {
        let len = self.base.len();
        let mut alphas = vec![f64::NEG_INFINITY; len + 2];
        alphas[0] = 0.0;
        for i in 0..=len {
            for j in 0..=i {
                for &c in &self.by_span[j][i] {
                    let increment = alphas[j] + change_scores[c] + preserve_scores[i];
                    alphas[i + 1] = combine(alphas[i + 1], increment, max);
                }
            }
            let through = alphas[i] + preserve_scores[i];
            alphas[i + 1] = combine(alphas[i + 1], through, max);
        }
        alphas
    }

    fn betas(&self, change_scores: &[f64], preserve_scores: &[f64]) -> Vec<f64> {
        let len = self.base.len();
        let mut betas = vec![f64::NEG_INFINITY; len + 2];
        betas[len + 1] = 0.0;
        for i in (0..=len + 1).rev() {
            if i <= len {
                for j in i..=len {
                    for &c in &self.by_span[i][j] {
                        let increment = betas[j + 1] + change_scores[c] + preserve_scores[j];
                        betas[i] = combine(betas[i], increment, false);
                    }
                }
            }
            if i > 0 {
                betas[i - 1] = combine(betas[i - 1], betas[i] + preserve_scores[i - 1], false);
            }
        }
        betas
    }

    pub fn forward_normalizer(&self, weights: &[f64]) -> f64 {
        let change_scores = self.change_scores(weights);
        let preserve_scores = self.preserve_scores(weights);
        let alphas = self.alphas(&change_scores, &preserve_scores, false);
        alphas[alphas.len() - 1]
    }

    pub fn backward_normalizer(&self, weights: &[f64]) -> f64 {
        let change_scores = self.change_scores(weights);
        let preserve_scores = self.preserve_scores(weights);
        let betas = self.betas(&change_scores, &preserve_scores);
        betas[0]
    }

    /// Log probability of the gold segmentation under the current weights.
    pub fn log_likelihood(&self, weights: &[f64]) -> f64 {
        let change_scores = self.change_scores(weights);
        let preserve_scores = self.preserve_scores(weights);
        let alphas = self.alphas(&change_scores, &preserve_scores, false);
        let normalizer = alphas[alphas.len() - 1];
        let mut gold_score = 0.0;
        if let Some(on) = &self.gold_changes_on {
            for (i, on) in on.iter().enumerate() {
                if *on {
                    gold_score +=
                        change_scores[i] + preserve_scores[self.candidates[i].span.end];
                }
            }
        }
        for i in 0..self.base.len() {
            if self.gold_preserved[i] {
                gold_score += preserve_scores[i];
            }
        }
        gold_score - normalizer
    }

    /// Adds empirical minus expected feature counts to the gradient.
    pub fn accumulate_gradient(&self, weights: &[f64], gradient: &mut [f64]) {
        let change_scores = self.change_scores(weights);
        let preserve_scores = self.preserve_scores(weights);
        let alphas = self.alphas(&change_scores, &preserve_scores, false);
        let betas = self.betas(&change_scores, &preserve_scores);
        let normalizer = alphas[alphas.len() - 1];
        for (i, candidate) in self.candidates.iter().enumerate() {
            let start = candidate.span.start;
            let end = candidate.span.end;
            if let Some(on) = &self.gold_changes_on {
                if on[i] {
                    add_scaled(gradient, &self.change_feats[i], 1.0);
                    add_scaled(gradient, &self.preserve_feats[end], 1.0);
                }
            }
            let expected =
                (alphas[start] + change_scores[i] + preserve_scores[end] + betas[end + 1]
                    - normalizer)
                    .exp();
            add_scaled(gradient, &self.change_feats[i], -expected);
            add_scaled(gradient, &self.preserve_feats[end], -expected);
        }
        for i in 0..self.base.len() {
            if self.gold_preserved[i] {
                add_scaled(gradient, &self.preserve_feats[i], 1.0);
            }
            let expected = (alphas[i] + preserve_scores[i] + betas[i + 1] - normalizer).exp();
            add_scaled(gradient, &self.preserve_feats[i], -expected);
        }
    }

    /// Viterbi decode. Backtracks from the final fencepost, re-deriving the
    /// best incoming edge at each state; the first candidate encountered wins
    /// ties.
    pub fn decode(&self, weights: &[f64]) -> Vec<AnchoredChange> {
        let change_scores = self.change_scores(weights);
        let preserve_scores = self.preserve_scores(weights);
        let alphas = self.alphas(&change_scores, &preserve_scores, true);
        let mut prediction = Vec::new();
        let mut i = alphas.len() - 1;
        while i > 0 {
            let mut best: Option<usize> = None;
            let mut best_score = f64::NEG_INFINITY;
            for j in 0..i {
                for &c in &self.by_span[j][i - 1] {
                    let score = alphas[j] + change_scores[c] + preserve_scores[i - 1];
                    if score > best_score {
                        best = Some(c);
                        best_score = score;
                    }
                }
            }
            if best_score < alphas[i - 1] + preserve_scores[i - 1] {
                best = None;
            }
            match best {
                Some(c) => {
                    prediction.push(self.candidates[c].clone());
                    i = self.candidates[c].span.start;
                }
                None => i -= 1,
            }
        }
        prediction.reverse();
        prediction
    }

    pub fn predicts_correctly(&self, weights: &[f64], gold: &[AnchoredChange]) -> bool {
        self.decode(weights) == gold
    }
}

fn combine(a: f64, b: f64, max: bool) -> f64 {
    if max {
        a.max(b)
    } else {
        log_add(a, b)
    }
}

fn log_add(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

fn add_scaled(gradient: &mut [f64], feats: &[usize], scale: f64) {
    for &f in feats {
        gradient[f] += scale;
    }
}
