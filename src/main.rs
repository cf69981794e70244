// ========================================================================================
//
//                      THE STRATEGIC ORCHESTRATOR: AUGUR
//
// ========================================================================================
//
// This binary is a thin conductor over the `augur` library. It parses arguments,
// resolves the model configuration, streams datasets through the model and writes the
// resulting artifacts. All statistics live in the library; nothing here touches a
// belief directly.
//
// ### The Orchestration Mandate ###
//
// 1.  **Fail Loudly, Once:** Every error surfaces as a single `Error: ...` line and a
//     non-zero exit status. No partial model file is ever left behind.
//
// 2.  **One Pass, In Order:** Training consumes the dataset exactly once, example by
//     example, in file order.

use augur::data::{LoadOptions, load_examples};
use augur::metrics::{Auc, LogLoss, Metric, Rmse};
use augur::progress::TrainProgressObserver;
use augur::{EpLogisticRegression, Example, FeatureId, ModelConfig, TrainSummary};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

// ========================================================================================
//                         COMMAND-LINE INTERFACE DEFINITION
// ========================================================================================

#[derive(Parser)]
#[command(
    name = "augur",
    version,
    about = "Online Bayesian probit regression trained by expectation propagation."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct ConfigSource {
    /// Observation-noise variance
    #[arg(long)]
    beta: Option<String>,

    /// TOML file holding model parameters (e.g. `beta = 0.1`)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model in one pass over a sparse dataset
    #[command(about = "Train a model (outputs: model.tsv)")]
    Train {
        /// Path to training data: `<label> <id>:<value> ...` per line, optionally .gz
        training_data: PathBuf,

        #[command(flatten)]
        config: ConfigSource,

        /// Where to write the trained model
        #[arg(long, default_value = "model.tsv")]
        model: PathBuf,

        /// Continue training from an existing model file
        #[arg(long, value_name = "PATH")]
        init_model: Option<PathBuf>,

        /// Feature id added with value 1.0 to every example
        #[arg(long, value_name = "ID", allow_hyphen_values = true)]
        bias_feature: Option<FeatureId>,
    },

    /// Score a dataset with a trained model
    #[command(about = "Apply a trained model (outputs: predictions.tsv)")]
    Predict {
        /// Path to data in the training format (labels are used for evaluation only)
        data: PathBuf,

        /// Path to a trained model file
        #[arg(long)]
        model: PathBuf,

        #[command(flatten)]
        config: ConfigSource,

        /// Where to write one probability per example
        #[arg(long, default_value = "predictions.tsv")]
        output: PathBuf,

        /// Feature id added with value 1.0 to every example
        #[arg(long, value_name = "ID", allow_hyphen_values = true)]
        bias_feature: Option<FeatureId>,
    },

    /// Summarize a trained model file
    Inspect {
        /// Path to a trained model file
        #[arg(long)]
        model: PathBuf,

        /// Number of features with the largest |mean| to list
        #[arg(long, default_value = "10")]
        top: usize,
    },
}

// ========================================================================================
//                           THE MAIN ORCHESTRATION LOGIC
// ========================================================================================

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Train {
            training_data,
            config,
            model,
            init_model,
            bias_feature,
        } => train_command(
            &training_data,
            &config,
            &model,
            init_model.as_deref(),
            LoadOptions { bias_feature },
        ),
        Commands::Predict {
            data,
            model,
            config,
            output,
            bias_feature,
        } => predict_command(&data, &model, &config, &output, LoadOptions { bias_feature }),
        Commands::Inspect { model, top } => inspect_command(&model, top),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn resolve_config(source: &ConfigSource) -> Result<ModelConfig, Box<dyn std::error::Error>> {
    match (&source.beta, &source.config) {
        (Some(beta), _) => {
            let params = [("beta".to_string(), beta.clone())].into_iter().collect();
            Ok(ModelConfig::from_params(&params)?)
        }
        (None, Some(path)) => Ok(ModelConfig::load(path)?),
        (None, None) => Err("either --beta or --config must be provided".into()),
    }
}

fn train_command(
    training_data: &Path,
    config: &ConfigSource,
    model_path: &Path,
    init_model: Option<&Path>,
    options: LoadOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(config)?;
    let mut model = EpLogisticRegression::new(config);
    if let Some(path) = init_model {
        model.load_model(path)?;
    }

    let examples = load_examples(training_data, options)?;
    let mut progress = BarProgress::default();
    let summary = model.train(&examples, &mut progress);

    eprintln!(
        "> Trained on {}/{} examples ({} rejected), {} features",
        summary.examples_trained,
        summary.examples_seen,
        summary.examples_rejected,
        model.store().len()
    );

    model.save_model(model_path)?;
    eprintln!("> Model saved to: {}", model_path.display());
    Ok(())
}

fn predict_command(
    data: &Path,
    model_path: &Path,
    config: &ConfigSource,
    output: &Path,
    options: LoadOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(config)?;
    let mut model = EpLogisticRegression::new(config);
    model.load_model(model_path)?;

    let examples = load_examples(data, options)?;
    let predictions = model.predict_all(&examples);
    save_predictions(&predictions, output)?;
    eprintln!("> Predictions saved to: {}", output.display());

    let has_both_classes = examples.iter().any(Example::is_positive)
        && !examples.iter().all(Example::is_positive);
    if has_both_classes {
        let labels: Vec<f64> = examples.iter().map(|e| e.label).collect();
        let metrics: [&dyn Metric; 3] = [&LogLoss, &Auc, &Rmse];
        for metric in metrics {
            log::info!(
                "{}: {:.6} ({} is better)",
                metric.name(),
                metric.compute(&predictions, &labels),
                if metric.higher_is_better() { "higher" } else { "lower" }
            );
        }
    }
    Ok(())
}

fn inspect_command(model_path: &Path, top: usize) -> Result<(), Box<dyn std::error::Error>> {
    // Beliefs are read verbatim; beta does not affect them.
    let mut model = EpLogisticRegression::new(ModelConfig::new(0.0)?);
    model.load_model(model_path)?;
    let store = model.store();

    println!("features\t{}", store.len());
    println!("id\tmean\tvariance");
    for (id, belief) in store
        .iter()
        .sorted_by(|a, b| b.1.mean.abs().total_cmp(&a.1.mean.abs()).then(a.0.cmp(&b.0)))
        .take(top)
    {
        println!("{id}\t{}\t{}", belief.mean, belief.variance);
    }
    Ok(())
}

/// Save predictions to a TSV file
fn save_predictions(predictions: &[f64], output_path: &Path) -> Result<(), std::io::Error> {
    let mut writer = BufWriter::new(File::create(output_path)?);
    writeln!(writer, "prediction")?;
    let mut buffer = ryu::Buffer::new();
    for &pred in predictions {
        writeln!(writer, "{}", buffer.format(pred))?;
    }
    writer.flush()
}

// ========================================================================================
//                               PROGRESS REPORTING
// ========================================================================================

#[derive(Default)]
struct BarProgress {
    bar: Option<ProgressBar>,
}

impl TrainProgressObserver for BarProgress {
    fn on_start(&mut self, total_examples: usize) {
        let bar = ProgressBar::new(total_examples as u64);
        if let Ok(style) =
            ProgressStyle::with_template("> Training [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        self.bar = Some(bar);
    }

    fn on_advance(&mut self, processed_examples: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(processed_examples as u64);
        }
    }

    fn on_finish(&mut self, summary: &TrainSummary) {
        if let Some(bar) = self.bar.take() {
            bar.finish_with_message(format!("{} examples", summary.examples_seen));
        }
    }
}
