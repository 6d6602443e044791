//! leafscan CLI
//!
//! Training, evaluation, dataset preparation and local prediction for the
//! bean and maize leaf disease classifier.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use leafscan::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use leafscan::dataset::discovery::{is_image_file, list_images};
use leafscan::dataset::prepare::{materialize_split, MaterializeConfig, SPLIT_NAMES};
use leafscan::dataset::split::{stratified_split, DatasetSplits, SplitConfig};
use leafscan::dataset::LeafDataset;
use leafscan::inference::{InferenceService, ServiceConfig};
use leafscan::model::ModelFormat;
use leafscan::training::{run_evaluation, run_training, EvaluationConfig, TrainingConfig};
use leafscan::utils::logging::{init_logging, LogConfig};
use leafscan::utils::split_csv_arg;

/// Bean and maize leaf disease classification
#[derive(Parser, Debug)]
#[command(name = "leafscan")]
#[command(version)]
#[command(about = "Bean and maize leaf disease classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false", conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, default_value = "false")]
    quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a classifier on one dataset root or several crop roots
    Train {
        /// One dataset root (class folders inside)
        #[arg(short, long, conflicts_with = "data_dirs")]
        data_dir: Option<PathBuf>,

        /// Comma-separated dataset roots, one per crop
        #[arg(long)]
        data_dirs: Option<String>,

        /// Comma-separated class folders enforcing the label order (single root only)
        #[arg(long, conflicts_with = "data_dirs")]
        class_names: Option<String>,

        /// Number of training epochs
        #[arg(short, long, default_value = "10")]
        epochs: usize,

        /// Batch size for training
        #[arg(short, long, default_value = "32")]
        batch_size: usize,

        /// Learning rate
        #[arg(short, long, default_value = "0.001")]
        learning_rate: f64,

        /// Output directory for the best checkpoint and its label sidecar
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Random seed for the split and epoch shuffling
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Disable train-split augmentation
        #[arg(long, default_value = "false")]
        no_augmentation: bool,

        /// Input image size
        #[arg(long, default_value = "224")]
        image_size: usize,
    },

    /// Evaluate a trained model on the test split of a dataset
    Evaluate {
        /// Path to the trained model (.mpk or .bin)
        #[arg(short, long)]
        model: PathBuf,

        /// Dataset root used for training
        #[arg(short, long, conflicts_with = "data_dirs")]
        data_dir: Option<PathBuf>,

        /// Comma-separated dataset roots of a multi-crop model
        #[arg(long)]
        data_dirs: Option<String>,

        /// Comma-separated class folders enforcing the label order
        #[arg(long, conflicts_with = "data_dirs")]
        class_names: Option<String>,

        #[arg(short, long, default_value = "32")]
        batch_size: usize,

        /// Seed of the training split
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Model format: scripted or weights_only (default: from the extension)
        #[arg(long, default_value = "")]
        format: String,

        /// Write the confusion matrix to this CSV file
        #[arg(long)]
        confusion_csv: Option<PathBuf>,
    },

    /// Copy a dataset into train/val/test folders
    Split {
        /// Dataset root (class folders inside)
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Output root receiving train/, val/ and test/
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Comma-separated class folders to include
        #[arg(long)]
        class_names: Option<String>,

        #[arg(long, default_value = "0.7")]
        train_ratio: f64,

        #[arg(long, default_value = "0.15")]
        val_ratio: f64,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// Delete the output directory first
        #[arg(long, default_value = "false")]
        overwrite: bool,
    },

    /// Show dataset statistics
    Stats {
        #[arg(short, long, conflicts_with = "data_dirs")]
        data_dir: Option<PathBuf>,

        /// Comma-separated dataset roots, one per crop
        #[arg(long)]
        data_dirs: Option<String>,

        #[arg(long, conflicts_with = "data_dirs")]
        class_names: Option<String>,

        /// Show the stratified split sizes
        #[arg(long, default_value = "false")]
        show_splits: bool,
    },

    /// Run the prediction service on local images and print JSON
    Predict {
        #[command(flatten)]
        service: ServiceConfig,

        /// Image file or directory of images (at most 5 per call)
        #[arg(short, long)]
        input: PathBuf,

        /// auto, bean, beans or maize
        #[arg(long, default_value = "auto")]
        crop_hint: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else {
        LogConfig::default()
    };

    let _ = init_logging(&log_config);

    match cli.command {
        Commands::Train {
            data_dir,
            data_dirs,
            class_names,
            epochs,
            batch_size,
            learning_rate,
            output_dir,
            seed,
            no_augmentation,
            image_size,
        } => {
            print_banner();
            let split = SplitConfig {
                seed,
                ..Default::default()
            };
            let config = TrainingConfig {
                data_dir,
                data_dirs: parse_paths(data_dirs.as_deref()),
                class_names: parse_names(class_names.as_deref()),
                epochs,
                batch_size,
                learning_rate,
                output_dir,
                split,
                augmentation: !no_augmentation,
                image_size,
                ..Default::default()
            };
            cmd_train(&config)?;
        }

        Commands::Evaluate {
            model,
            data_dir,
            data_dirs,
            class_names,
            batch_size,
            seed,
            format,
            confusion_csv,
        } => {
            let split = SplitConfig {
                seed,
                ..Default::default()
            };
            let config = EvaluationConfig {
                model_path: model,
                data_dir,
                data_dirs: parse_paths(data_dirs.as_deref()),
                class_names: parse_names(class_names.as_deref()),
                batch_size,
                split,
                format: ModelFormat::parse(&format)?,
                confusion_csv,
            };
            cmd_evaluate(&config)?;
        }

        Commands::Split {
            data_dir,
            output_dir,
            class_names,
            train_ratio,
            val_ratio,
            seed,
            overwrite,
        } => {
            let config = MaterializeConfig {
                train_ratio,
                val_ratio,
                seed,
                overwrite,
            };
            cmd_split(&data_dir, &output_dir, parse_names(class_names.as_deref()), &config)?;
        }

        Commands::Stats {
            data_dir,
            data_dirs,
            class_names,
            show_splits,
        } => {
            cmd_stats(
                data_dir.as_deref(),
                &parse_paths(data_dirs.as_deref()),
                parse_names(class_names.as_deref()),
                show_splits,
            )?;
        }

        Commands::Predict {
            service,
            input,
            crop_hint,
        } => {
            cmd_predict(&service, &input, &crop_hint)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════╗
 ║   leafscan                                       ║
 ║   Bean and maize leaf disease classification     ║
 ╚══════════════════════════════════════════════════╝
  "#
        .green()
    );
}

fn parse_paths(raw: Option<&str>) -> Vec<PathBuf> {
    raw.map(split_csv_arg)
        .unwrap_or_default()
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

fn parse_names(raw: Option<&str>) -> Option<Vec<String>> {
    raw.map(split_csv_arg).filter(|names| !names.is_empty())
}

fn cmd_train(config: &TrainingConfig) -> Result<()> {
    println!("{}", "Initializing Training...".green().bold());
    println!("  Backend: {}", backend_name());
    println!("  Epochs: {}  Batch size: {}  Learning rate: {}", config.epochs, config.batch_size, config.learning_rate);
    println!();

    let device = default_device();
    let outcome = run_training::<TrainingBackend>(config, &device).context("Training failed")?;

    println!();
    println!("{}", "Training Complete!".green().bold());
    println!("  Best validation accuracy: {:.4}", outcome.best_val_accuracy);
    match (&outcome.model_path, &outcome.metadata_path) {
        (Some(model), Some(metadata)) => {
            println!("  Model: {:?}", model);
            println!("  Label metadata: {:?}", metadata);
            println!();
            println!("{}", "Next steps:".cyan().bold());
            println!("  • Evaluate: leafscan evaluate --model {:?} --data-dir <dir>", model);
            println!("  • Serve:    MODEL_PATH={:?} leafscan-server", model);
        }
        _ => println!(
            "  {} validation accuracy never improved; no checkpoint was written",
            "Warning:".yellow()
        ),
    }
    Ok(())
}

fn cmd_evaluate(config: &EvaluationConfig) -> Result<()> {
    println!("{}", "Evaluating Model...".green().bold());
    println!("  Backend: {}", backend_name());

    let device = default_device();
    let outcome = run_evaluation::<DefaultBackend>(config, &device).context("Evaluation failed")?;

    if let Some(mismatch) = &outcome.class_mismatch {
        println!("{} {}", "Warning:".yellow(), mismatch);
    }

    println!();
    println!("{}", "Classification Report:".cyan().bold());
    println!("{}", outcome.report);
    println!("{}", "Confusion Matrix:".cyan().bold());
    println!("{}", outcome.report.confusion_matrix.display(&outcome.class_names));
    Ok(())
}

fn cmd_split(
    data_dir: &Path,
    output_dir: &Path,
    class_names: Option<Vec<String>>,
    config: &MaterializeConfig,
) -> Result<()> {
    info!("Splitting {:?} into {:?}", data_dir, output_dir);
    let counts = materialize_split(data_dir, output_dir, class_names.as_deref(), config)?;

    println!("{}", "Split complete:".green().bold());
    for split in SPLIT_NAMES {
        println!("  {} ({} images)", split.cyan(), counts.total(split));
        if let Some(per_class) = counts.get(split) {
            for (label, count) in per_class {
                println!("    {:32} {:6}", label, count);
            }
        }
    }
    Ok(())
}

fn cmd_stats(
    data_dir: Option<&Path>,
    data_dirs: &[PathBuf],
    class_names: Option<Vec<String>>,
    show_splits: bool,
) -> Result<()> {
    let dataset = LeafDataset::load(data_dir, data_dirs, class_names.as_deref())?;
    dataset.stats().print();

    if show_splits {
        let split_config = SplitConfig::default();
        let splits = stratified_split(&dataset.samples, &split_config)?;
        let header = format!(
            "Stratified split ({}/{}/{:.2}, seed {}):",
            split_config.train_ratio,
            split_config.val_ratio,
            split_config.test_ratio(),
            split_config.seed
        );
        println!("\n{}", header.bold());
        println!("  {:32} {:>6} {:>6} {:>6}", "class", "train", "val", "test");
        let train = DatasetSplits::class_counts(&splits.train, &dataset.samples, dataset.num_classes());
        let val = DatasetSplits::class_counts(&splits.val, &dataset.samples, dataset.num_classes());
        let test = DatasetSplits::class_counts(&splits.test, &dataset.samples, dataset.num_classes());
        for (idx, name) in dataset.class_names.iter().enumerate() {
            println!("  {:32} {:>6} {:>6} {:>6}", name, train[idx], val[idx], test[idx]);
        }
        println!("  {:32} {:>6} {:>6} {:>6}", "total", splits.train.len(), splits.val.len(), splits.test.len());
    }
    Ok(())
}

fn cmd_predict(service_config: &ServiceConfig, input: &Path, crop_hint: &str) -> Result<()> {
    let files: Vec<PathBuf> = if input.is_dir() {
        list_images(input)
    } else if is_image_file(input) {
        vec![input.to_path_buf()]
    } else {
        bail!("{:?} is neither an image file nor a directory", input);
    };

    if files.is_empty() {
        bail!("No images found in {:?}", input);
    }
    if files.len() > leafscan::MAX_IMAGES_PER_REQUEST {
        bail!(
            "At most {} images per call, got {}",
            leafscan::MAX_IMAGES_PER_REQUEST,
            files.len()
        );
    }

    let service = InferenceService::from_config(service_config).context("Failed to load model")?;

    let mut uploads = Vec::with_capacity(files.len());
    for path in &files {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        uploads.push((name, bytes));
    }

    let results = service.predict_many(uploads, Some(crop_hint))?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
