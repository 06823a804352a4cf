//! Command line tool to evaluate a trained model and classify sequences

use anyhow::{anyhow, Result};
use burn::backend::{libtorch::LibTorchDevice, LibTorch};
use kmer_bert::{
    cli::pipelines::Pipeline,
    datasets::{LoadableDataset, SequenceDataset},
    pipelines::taxonomic_classification::{
        self, infer, load_trained, top_labels, Batcher, PredictConfig, PIPELINE,
    },
    taxonomy::Taxonomy,
};
use pico_args::Arguments;

const HELP: &str = "\
Usage: infer PIPELINE DATASET [OPTIONS] [SEQUENCE...]

Arguments:
  PIPELINE             The pipeline that was trained ('single' or 'multi-tax')
  DATASET              The dataset the model was trained on
  SEQUENCE             Raw sequences to classify. Without any, the test split is scored

Options:
  -h, --help           Print help
  -d, --data-dir       The path to the top-level data directory (defaults to 'data')
  -b, --batch-size     Batch size when scoring the test split
  --cpu                Run on the CPU instead of the first CUDA device
";

#[derive(Debug)]
struct Args {
    /// Prints the usage menu
    help: bool,

    /// The pipeline that was trained
    pipeline: String,

    /// The dataset the model was trained on
    dataset: String,

    /// The path to the top-level data directory
    data_dir: String,

    /// Batch size when scoring the test split
    batch_size: Option<usize>,

    /// Run on the CPU
    cpu: bool,

    /// Raw sequences to classify
    sequences: Vec<String>,
}

fn parse_args() -> Result<Args, pico_args::Error> {
    let mut pargs = Arguments::from_env();

    let help = pargs.contains(["-h", "--help"]);
    let data_dir = pargs
        .opt_value_from_str(["-d", "--data-dir"])?
        .unwrap_or_else(|| "data".to_string());
    let batch_size = pargs.opt_value_from_str(["-b", "--batch-size"])?;
    let cpu = pargs.contains("--cpu");

    if help {
        return Ok(Args {
            help,
            pipeline: String::new(),
            dataset: String::new(),
            data_dir,
            batch_size,
            cpu,
            sequences: Vec::new(),
        });
    }

    let pipeline = pargs.free_from_str()?;
    let dataset = pargs.free_from_str()?;

    let sequences = pargs
        .finish()
        .into_iter()
        .map(|arg| arg.to_string_lossy().to_string())
        .collect();

    Ok(Args {
        help,
        pipeline,
        dataset,
        data_dir,
        batch_size,
        cpu,
        sequences,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = parse_args()?;

    if args.help {
        println!("{}", HELP);
        return Ok(());
    }

    let pipeline = Pipeline::try_from(args.pipeline.as_str())?;

    let artifact_dir = format!(
        "{}/{}/{}/{}",
        args.data_dir, PIPELINE, args.dataset, pipeline
    );

    let device = if args.cpu {
        LibTorchDevice::Cpu
    } else {
        LibTorchDevice::Cuda(0)
    };

    if !args.sequences.is_empty() {
        // Get model predictions
        let (predictions, config) =
            infer::<LibTorch>(device, &artifact_dir, args.sequences.clone())?;

        let labels = top_labels(&predictions, &config.heads);

        // Print out predictions for each sample
        for (i, (sequence, labels)) in args.sequences.iter().zip(labels).enumerate() {
            println!("\n=== Item {i} ===\n- Sequence: {sequence}");

            for (head, (label, prob)) in config.heads.iter().zip(labels) {
                println!("- {}: {label} ({prob:.3})", head.rank);
            }

            println!("================");
        }

        return Ok(());
    }

    let (model, config) = load_trained::<LibTorch>(&device, &artifact_dir)?;

    let test = SequenceDataset::load(&args.data_dir, &args.dataset, "test").await?;
    let taxonomy = Taxonomy::load(format!("{}/taxonomy", args.data_dir)).await?;

    let ranks = config.ranks();
    let batcher = Batcher::<LibTorch>::new(&config, vec![None; ranks.len()], false, device);

    let mut predict_config = PredictConfig::new();
    if let Some(batch_size) = args.batch_size {
        predict_config.batch_size = batch_size;
    }

    let prediction = taxonomic_classification::predict(
        &model,
        &ranks,
        batcher,
        test.labeled(&taxonomy, &ranks),
        &predict_config,
    );

    if prediction.metrics.is_empty() {
        return Err(anyhow!("The test split of {} is empty", args.dataset));
    }

    for (name, value) in prediction.metrics_names.iter().zip(&prediction.metrics) {
        println!("{name}: {value:.4}");
    }

    Ok(())
}
