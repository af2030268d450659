// Corpus readers for the two supported inflection-table formats, and the
// matching writer. Both formats carry one inflected form per line:
//
//   inflected,base,Attr=Val:Attr=Val    (csv)
//   inflected<TAB>base<TAB>Attr=Val:... (celex; commas separate alternatives)

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::{info, warn};

use crate::error::ModelError;
use crate::paradigm::{filter_noncanonical, ParadigmInstance};
use crate::types::{Attributes, Form};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusFormat {
    Csv,
    Celex,
}

impl CorpusFormat {
    fn field_delimiter(self) -> char {
        match self {
            CorpusFormat::Csv => ',',
            CorpusFormat::Celex => '\t',
        }
    }

    // The csv format never lists alternatives; its field delimiter would
    // collide with them.
    fn alternative_delimiter(self) -> Option<char> {
        match self {
            CorpusFormat::Csv => None,
            CorpusFormat::Celex => Some(','),
        }
    }
}

pub fn read_instances(
    path: &Path,
    format: CorpusFormat,
) -> Result<Vec<ParadigmInstance>, ModelError> {
    info!(path = %path.display(), "loading paradigm instances");
    let text = fs::read_to_string(path)?;
    read_instances_from_str(&text, format)
}

pub fn read_instances_from_str(
    text: &str,
    format: CorpusFormat,
) -> Result<Vec<ParadigmInstance>, ModelError> {
    // Grouped by base form, in first-encounter order.
    let mut order: Vec<Form> = Vec::new();
    let mut grouped: HashMap<Form, BTreeMap<Attributes, Vec<Form>>> = HashMap::new();
    let mut duplicates = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(format.field_delimiter()).collect();
        let &[infl, base, attrs] = fields.as_slice() else {
            return Err(ModelError::Parse(format!(
                "expected 3 fields, got {}: {line}",
                fields.len()
            )));
        };
        let alternatives: Vec<Form> = match format.alternative_delimiter() {
            Some(delimiter) => infl.split(delimiter).map(Form::from).collect(),
            None => vec![Form::from(infl)],
        };
        let base = Form::from(base);
        let attrs = Attributes::parse(attrs)?;
        if !grouped.contains_key(&base) {
            order.push(base.clone());
        }
        let slots = grouped.entry(base).or_default();
        if slots.insert(attrs, alternatives).is_some() {
            duplicates += 1;
        }
    }
    if duplicates > 0 {
        warn!(duplicates, "discarded duplicate slot entries");
    }
    let mut instances = Vec::with_capacity(order.len());
    for base in order {
        if let Some(slots) = grouped.remove(&base) {
            instances.push(ParadigmInstance::new(base, slots));
        }
    }
    info!(instances = instances.len(), "paradigm instances read");
    Ok(filter_noncanonical(instances))
}

/// Writes an instance back out in csv format, one primary form per line.
pub fn write_instance<W: Write>(
    instance: &ParadigmInstance,
    output: &mut W,
) -> Result<(), ModelError> {
    for (attrs, _) in instance.slots() {
        if let Some(infl) = instance.infl_form(attrs) {
            writeln!(output, "{},{},{}", infl, instance.base_form(), attrs)?;
        }
    }
    Ok(())
}
