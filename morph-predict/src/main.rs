use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use morph_predict_lib::corpus::{read_instances, write_instance};
use morph_predict_lib::paradigm::EvalSummary;
use morph_predict_lib::{
    AlignmentMode, ChangeInventory, CorpusFormat, Form, JointConfig, JointModel,
    ParadigmInstance,
};

#[derive(Parser)]
#[command(
    name = "morph-predict",
    about = "Learns inflectional paradigms from example tables and predicts them for unseen base forms"
)]
struct Cli {
    /// Inflection table data, one inflected form per line.
    #[arg(long)]
    inflections: PathBuf,

    /// Format of the inflection data.
    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,

    /// File listing training base forms, one per line.
    #[arg(long)]
    train: PathBuf,

    /// File listing test base forms, one per line.
    #[arg(long)]
    test: PathBuf,

    /// Where to write the predicted paradigms.
    #[arg(long)]
    output: PathBuf,

    /// Alignment algorithm used during rule extraction.
    #[arg(long, value_enum, default_value_t = Align::Consistent)]
    alignment: Align,

    /// Max n-gram order for context features.
    #[arg(long, default_value_t = 4)]
    ngram_order: usize,

    /// Max distance from a span edge for context features.
    #[arg(long, default_value_t = 5)]
    max_distance: usize,

    /// Disable the learned one-character context filter on rule match sites.
    #[arg(long)]
    no_match_filtering: bool,

    /// Print the extracted rule inventory with occurrence counts.
    #[arg(long)]
    print_changes: bool,

    /// Score predictions against the gold paradigms in the inflection data.
    #[arg(long)]
    evaluate: bool,

    /// Write the output as a JSON report instead of csv lines.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Celex,
}

impl From<Format> for CorpusFormat {
    fn from(format: Format) -> CorpusFormat {
        match format {
            Format::Csv => CorpusFormat::Csv,
            Format::Celex => CorpusFormat::Celex,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Align {
    Basic,
    MaxAlign,
    Consistent,
}

impl From<Align> for AlignmentMode {
    fn from(align: Align) -> AlignmentMode {
        match align {
            Align::Basic => AlignmentMode::Basic,
            Align::MaxAlign => AlignmentMode::MaxAlign,
            Align::Consistent => AlignmentMode::Consistent,
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    predictions: &'a [ParadigmInstance],
    evaluation: Option<&'a EvalSummary>,
}

fn read_form_list(path: &Path) -> Result<Vec<Form>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading form list {}", path.display()))?;
    Ok(text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(Form::from)
        .collect())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let instances = read_instances(&cli.inflections, cli.format.into())
        .with_context(|| format!("reading inflections from {}", cli.inflections.display()))?;
    let train_forms: BTreeSet<Form> = read_form_list(&cli.train)?.into_iter().collect();
    let test_forms = read_form_list(&cli.test)?;
    let mut train_instances = Vec::new();
    let mut gold: HashMap<Form, ParadigmInstance> = HashMap::new();
    for instance in instances {
        if train_forms.contains(instance.base_form()) {
            train_instances.push(instance);
        } else if test_forms.contains(instance.base_form()) {
            gold.insert(instance.base_form().clone(), instance);
        }
    }
    info!(
        train = train_instances.len(),
        test = test_forms.len(),
        gold = gold.len(),
        "partitioned corpus"
    );

    let alignment: AlignmentMode = cli.alignment.into();
    let inventory = ChangeInventory::extract(train_instances, alignment)
        .context("extracting change inventory")?;
    if cli.print_changes {
        print!("{}", inventory.render_summary());
    }
    let slots = inventory.slot_set().clone();
    let config = JointConfig {
        alignment,
        rule_ngram_order: cli.ngram_order,
        rule_max_distance: cli.max_distance,
        preserve_ngram_order: cli.ngram_order,
        preserve_max_distance: cli.max_distance,
        use_match_filtering: !cli.no_match_filtering,
        ..JointConfig::default()
    };
    let model = JointModel::train(inventory, &config).context("training joint model")?;

    let mut predictions = Vec::with_capacity(test_forms.len());
    let mut summary = EvalSummary::default();
    for base in &test_forms {
        let prediction = model
            .predict(base, &slots)
            .with_context(|| format!("predicting paradigm for {base}"))?;
        if cli.evaluate {
            if let Some(gold_instance) = gold.get(base) {
                summary.accumulate(&prediction.instance, gold_instance);
            }
        }
        predictions.push(prediction.instance);
    }

    let output = File::create(&cli.output)
        .with_context(|| format!("creating output file {}", cli.output.display()))?;
    let mut output = BufWriter::new(output);
    if cli.json {
        let report = Report {
            predictions: &predictions,
            evaluation: cli.evaluate.then_some(&summary),
        };
        serde_json::to_writer_pretty(&mut output, &report)?;
        output.write_all(b"\n")?;
    } else {
        for instance in &predictions {
            write_instance(instance, &mut output)?;
        }
    }
    output.flush()?;
    info!(path = %cli.output.display(), "predictions written");

    if cli.evaluate {
        println!("{}", summary.render());
    }
    Ok(())
}
