// Context n-gram features over anchored spans, and the feature index that
// maps feature strings to weight-vector positions.

use std::collections::HashMap;

use crate::span::Span;

/// Every unseen feature string maps here at prediction time.
pub const OOV_FEATURE: &str = "UNK_FEAT";

const BEFORE_NAMES: [&str; 4] = ["BUNI", "BBI", "BTRI", "BFOUR"];
const AFTER_NAMES: [&str; 4] = ["AUNI", "ABI", "ATRI", "AFOUR"];

/// Emits character n-gram features around a span: for each position within
/// `max_distance` of either edge, one feature per n-gram order up to
/// `ngram_order` (capped at 4). Positions past the ends of the form read
/// boundary sentinels.
#[derive(Debug, Clone, Copy)]
pub struct SpanFeaturizer {
    ngram_order: usize,
    max_distance: usize,
}

impl SpanFeaturizer {
    pub fn new(ngram_order: usize, max_distance: usize) -> SpanFeaturizer {
        SpanFeaturizer {
            ngram_order: ngram_order.min(BEFORE_NAMES.len()),
            max_distance,
        }
    }

    pub fn features(&self, span: &Span) -> Vec<String> {
        let mut features = Vec::new();
        let start = span.start as isize;
        let end = span.end as isize;
        for i in (start - self.max_distance as isize)..start {
            let offset = i - start;
            for n in 1..=self.ngram_order {
                let mut text = String::new();
                // Before-side n-grams read forward from the anchor position.
                for k in 0..n as isize {
                    text.push_str(&span.form.symbol_or_boundary(i + k).to_string());
                }
                features.push(format!("{}:{}-{}", BEFORE_NAMES[n - 1], offset, text));
            }
        }
        for i in end..(end + self.max_distance as isize) {
            let offset = i - end;
            for n in 1..=self.ngram_order {
                let mut text = String::new();
                // After-side n-grams end at the anchor position.
                for k in (0..n as isize).rev() {
                    text.push_str(&span.form.symbol_or_boundary(i - k).to_string());
                }
                features.push(format!("{}:{}-{}", AFTER_NAMES[n - 1], offset, text));
            }
        }
        features
    }
}

/// Growable feature index used while featurizing the training set.
#[derive(Debug, Clone)]
pub struct FeatureIndexer {
    indices: HashMap<String, usize>,
}

impl FeatureIndexer {
    pub fn new() -> FeatureIndexer {
        let mut indexer = FeatureIndexer { indices: HashMap::new() };
        indexer.add(OOV_FEATURE);
        indexer
    }

    pub fn add(&mut self, feature: &str) -> usize {
        let next = self.indices.len();
        *self.indices.entry(feature.to_string()).or_insert(next)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn freeze(self) -> FrozenFeatures {
        FrozenFeatures { indices: self.indices }
    }
}

impl Default for FeatureIndexer {
    fn default() -> FeatureIndexer {
        FeatureIndexer::new()
    }
}

/// Read-only feature index; unknown features fall back to the OOV slot.
#[derive(Debug, Clone)]
pub struct FrozenFeatures {
    indices: HashMap<String, usize>,
}

impl FrozenFeatures {
    pub fn index(&self, feature: &str) -> usize {
        match self.indices.get(feature) {
            Some(&index) => index,
            None => self.indices[OOV_FEATURE],
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Lattices are built against either a growing index (training) or a frozen
/// one (prediction); this joins the two behind one lookup.
pub enum FeatureSpace<'a> {
    Building(&'a mut FeatureIndexer),
    Frozen(&'a FrozenFeatures),
}

impl FeatureSpace<'_> {
    pub fn index(&mut self, feature: &str) -> usize {
        match self {
            FeatureSpace::Building(indexer) => indexer.add(feature),
            FeatureSpace::Frozen(frozen) => frozen.index(feature),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Form;

    #[test]
    fn unigram_features_at_distance_one() {
        let featurizer = SpanFeaturizer::new(1, 1);
        let span = Span::new(Form::from("walk"), 4, 4);
        let features = featurizer.features(&span);
        assert_eq!(features, vec!["BUNI:-1-k".to_string(), "AUNI:0-]".to_string()]);
    }

    #[test]
    fn higher_orders_emit_one_feature_per_order() {
        let featurizer = SpanFeaturizer::new(4, 2);
        let span = Span::new(Form::from("spielen"), 5, 7);
        let features = featurizer.features(&span);
        // 2 positions per side, 4 orders each.
        assert_eq!(features.len(), 16);
        assert!(features.contains(&"BUNI:-1-l".to_string()));
        assert!(features.contains(&"BBI:-2-el".to_string()));
        assert!(features.contains(&"AUNI:0-]".to_string()));
        // After-side n-grams read backward toward the span edge.
        assert!(features.contains(&"ABI:1-]]".to_string()));
    }

    #[test]
    fn boundary_sentinels_appear_past_the_ends() {
        let featurizer = SpanFeaturizer::new(2, 2);
        let span = Span::new(Form::from("ab"), 0, 0);
        let features = featurizer.features(&span);
        assert!(features.contains(&"BUNI:-2-[".to_string()));
        assert!(features.contains(&"BBI:-1-[a".to_string()));
    }

    #[test]
    fn indexer_assigns_oov_zero_and_stable_indices() {
        let mut indexer = FeatureIndexer::new();
        let a = indexer.add("a");
        let b = indexer.add("b");
        assert_eq!(indexer.add("a"), a);
        assert_eq!((a, b), (1, 2));
        let frozen = indexer.freeze();
        assert_eq!(frozen.index("a"), 1);
        assert_eq!(frozen.index("never-seen"), 0);
        assert_eq!(frozen.index(OOV_FEATURE), 0);
    }

    #[test]
    fn feature_space_building_grows_and_frozen_does_not() {
        let mut indexer = FeatureIndexer::new();
        {
            let mut space = FeatureSpace::Building(&mut indexer);
            assert_eq!(space.index("x"), 1);
        }
        assert_eq!(indexer.len(), 2);
        let frozen = indexer.freeze();
        let mut space = FeatureSpace::Frozen(&frozen);
        assert_eq!(space.index("x"), 1);
        assert_eq!(space.index("y"), 0);
        assert_eq!(frozen.len(), 2);
    }
}
