//! Model Bundle Export Tool
//!
//! Converts a weights-only checkpoint (`.mpk` + label sidecar) into a
//! self-describing bundle: a `.bin` record, its `.model.json` architecture
//! config and a copy of the label sidecar.
//!
//! Usage:
//!   cargo run --release --bin export_model -- --model best_model.mpk --output export/leafscan.bin

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use leafscan::backend::{default_device, DefaultBackend};
use leafscan::model::checkpoint::{bundle_config_path, load_classifier, save_bundle, ModelFormat};
use leafscan::model::vocabulary::{sidecar_path, LabelMetadata, LabelVocabulary};
use leafscan::utils::split_csv_arg;

/// Export a trained model as a self-describing bundle
#[derive(Parser, Debug)]
#[command(name = "export_model")]
#[command(about = "Export a weights-only checkpoint as a scripted model bundle")]
struct Args {
    /// Path to the trained model (.mpk file)
    #[arg(short, long)]
    model: PathBuf,

    /// Bundle path (defaults to the model path with a .bin extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Comma-separated crop:disease labels, overriding the sidecar
    #[arg(long)]
    labels: Option<String>,

    /// Version recorded in the exported sidecar
    #[arg(long)]
    model_version: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let device = default_device();

    println!("=== leafscan Model Export ===");
    println!("Loading model from: {:?}", args.model);

    let explicit = args.labels.as_deref().map(split_csv_arg).unwrap_or_default();
    let (vocabulary, metadata) = LabelVocabulary::resolve(&explicit, &args.model)
        .context("Could not resolve the label vocabulary")?;

    let (model, config) = load_classifier::<DefaultBackend>(
        &args.model,
        ModelFormat::WeightsOnly,
        vocabulary.len(),
        &device,
    )
    .context("Failed to load weights")?;
    vocabulary.check_head_size(model.num_classes())?;

    let output = args
        .output
        .unwrap_or_else(|| args.model.with_extension("bin"))
        .with_extension("bin");
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    save_bundle(&model, &config, &output)?;

    let mut exported = metadata.unwrap_or_else(|| LabelMetadata {
        labels: vocabulary.label_strings(),
        ..Default::default()
    });
    if args.model_version.is_some() {
        exported.model_version = args.model_version;
    }
    let exported_sidecar = sidecar_path(&output);
    exported.save(&exported_sidecar)?;

    println!();
    println!("Export complete!");
    println!("  Bundle:   {:?}", output);
    println!("  Config:   {:?}", bundle_config_path(&output));
    println!("  Labels:   {:?}", exported_sidecar);
    println!("  Classes:  {}", vocabulary.label_strings().join(", "));
    println!();
    println!("Serve it with:");
    println!("  MODEL_PATH={:?} MODEL_FORMAT=scripted leafscan-server", output);

    Ok(())
}
