// End-to-end tests: corpus text in, trained model, predicted paradigms out.

use std::collections::BTreeSet;

use morph_predict_lib::corpus::{read_instances_from_str, write_instance, CorpusFormat};
use morph_predict_lib::{
    AlignmentMode, Attributes, ChangeInventory, Form, JointConfig, JointModel,
};

const ENGLISH_PAST: &str = "\
walk,walk,Tense=Present
walked,walk,Tense=Past
talk,talk,Tense=Present
talked,talk,Tense=Past
jump,jump,Tense=Present
jumped,jump,Tense=Past
";

const GERMAN_PARTICIPLES: &str = "\
spielen,spielen,Form=Infinitive
gespielt,spielen,Form=Participle
kaufen,kaufen,Form=Infinitive
gekauft,kaufen,Form=Participle
machen,machen,Form=Infinitive
gemacht,machen,Form=Participle
";

fn train(corpus: &str, mode: AlignmentMode) -> (JointModel, BTreeSet<Attributes>) {
    let instances = read_instances_from_str(corpus, CorpusFormat::Csv).unwrap();
    let inventory = ChangeInventory::extract(instances, mode).unwrap();
    let slots = inventory.slot_set().clone();
    let model = JointModel::train(inventory, &JointConfig::default()).unwrap();
    (model, slots)
}

#[test]
fn predicts_regular_english_past_tense() {
    let (model, slots) = train(ENGLISH_PAST, AlignmentMode::Basic);
    let prediction = model.predict(&Form::from("bark"), &slots).unwrap();
    let past = Attributes::parse("Tense=Past").unwrap();
    let present = Attributes::parse("Tense=Present").unwrap();
    assert_eq!(prediction.instance.infl_form(&past), Some(&Form::from("barked")));
    assert_eq!(prediction.instance.infl_form(&present), Some(&Form::from("bark")));
}

#[test]
fn predicts_german_circumfix_participle() {
    // The ge- prefix is an insertion-only rule; its matches must be anchored
    // by the learned word-start context or it would apply at every position.
    let (model, slots) = train(GERMAN_PARTICIPLES, AlignmentMode::Consistent);
    let prediction = model.predict(&Form::from("lachen"), &slots).unwrap();
    let participle = Attributes::parse("Form=Participle").unwrap();
    let infinitive = Attributes::parse("Form=Infinitive").unwrap();
    assert_eq!(
        prediction.instance.infl_form(&participle),
        Some(&Form::from("gelacht"))
    );
    assert_eq!(
        prediction.instance.infl_form(&infinitive),
        Some(&Form::from("lachen"))
    );
}

#[test]
fn training_paradigms_are_reproduced() {
    let (model, slots) = train(ENGLISH_PAST, AlignmentMode::Consistent);
    let past = Attributes::parse("Tense=Past").unwrap();
    for base in ["walk", "talk", "jump"] {
        let prediction = model.predict(&Form::from(base), &slots).unwrap();
        assert_eq!(
            prediction.instance.infl_form(&past),
            Some(&Form::from(format!("{base}ed").as_str())),
            "paradigm for {base}"
        );
    }
}

#[test]
fn predictions_survive_a_write_read_cycle() {
    let (model, slots) = train(ENGLISH_PAST, AlignmentMode::Basic);
    let prediction = model.predict(&Form::from("bark"), &slots).unwrap();
    let mut buffer = Vec::new();
    write_instance(&prediction.instance, &mut buffer).unwrap();
    let rendered = String::from_utf8(buffer).unwrap();
    let reread = read_instances_from_str(&rendered, CorpusFormat::Csv).unwrap();
    assert_eq!(reread, vec![prediction.instance]);
}

#[test]
fn identity_paradigms_yield_identity_predictions() {
    let corpus = "\
sheep,sheep,Number=Singular
sheep,sheep,Number=Plural
deer,deer,Number=Singular
deer,deer,Number=Plural
";
    let (model, slots) = train(corpus, AlignmentMode::Consistent);
    let prediction = model.predict(&Form::from("fish"), &slots).unwrap();
    let plural = Attributes::parse("Number=Plural").unwrap();
    assert_eq!(prediction.instance.infl_form(&plural), Some(&Form::from("fish")));
    assert!(prediction.changes.is_empty());
}
