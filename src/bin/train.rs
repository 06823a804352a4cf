//! Command line tool to fine-tune a pretrained k-mer BERT for taxonomic classification

use anyhow::anyhow;
use burn::{
    backend::{libtorch::LibTorchDevice, Autodiff, LibTorch},
    config::Config as _,
};
use kmer_bert::{
    cli::{
        encoder::parse_lengths,
        pipelines::{parse_ranks, Pipeline},
        EncoderOverrides,
    },
    datasets::{LoadableDataset, SequenceDataset},
    pipelines::taxonomic_classification::{self, training},
    taxonomy::Taxonomy,
};
use log::info;
use pico_args::Arguments;

const HELP: &str = "\
Usage: train PIPELINE DATASET [OPTIONS]

Arguments:
  PIPELINE             The pipeline to use ('single' or 'multi-tax')
  DATASET              The dataset to use, read from DATA_DIR/datasets/DATASET/{train,test}.csv

Options:
  -h, --help           Print help
  -m, --model          The pretrained model, a Hugging Face name or a local directory, whose
                       vocab.txt lists the special tokens then the k-mers in dictionary order
                       (required unless given by --config)
  -c, --config         A training config JSON to start from, as saved in training.json
  -n, --num-epochs     Number of epochs to train for
  -b, --batch-size     Batch size
  -d, --data-dir       The path to the top-level data directory (defaults to 'data')
  -r, --ranks          Comma-separated ranks to predict (e.g., 'superkingdom,kingdom,family')
  --unknown-thr        Classes with fewer sequences are collapsed into 'unknown'
  --unweighted         Do not weight the loss by class frequency
  -k, --kmer           K-mer length (defaults to 3)
  --stride             Distance between the starts of consecutive k-mers (defaults to 3)
  --seq-length         Number of tokens taken from each sequence (defaults to 250)
  --max-length         Width of the encoded arrays (defaults to the sequence length)
  --seq-len-like       Comma-separated token counts to sample from while training
  --cpu                Train on the CPU instead of the first CUDA device
  --no-tui             Disable TUI
";

#[derive(Debug)]
struct Args {
    pipeline: String,
    dataset: String,
    model: Option<String>,
    config: Option<String>,
    num_epochs: Option<usize>,
    batch_size: Option<usize>,
    data_dir: Option<String>,
    ranks: Option<String>,
    unknown_thr: Option<usize>,
    encoder: EncoderOverrides,
    weighted: bool,
    cpu: bool,
    use_tui: bool,
}

impl Args {
    fn parse() -> anyhow::Result<Option<Self>> {
        let mut pargs = Arguments::from_env();

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            return Ok(None);
        }

        let args = Args {
            model: pargs.opt_value_from_str(["-m", "--model"])?,
            config: pargs.opt_value_from_str(["-c", "--config"])?,
            num_epochs: pargs.opt_value_from_str(["-n", "--num-epochs"])?,
            batch_size: pargs.opt_value_from_str(["-b", "--batch-size"])?,
            data_dir: pargs.opt_value_from_str(["-d", "--data-dir"])?,
            ranks: pargs.opt_value_from_str(["-r", "--ranks"])?,
            unknown_thr: pargs.opt_value_from_str("--unknown-thr")?,
            encoder: EncoderOverrides {
                k: pargs.opt_value_from_str(["-k", "--kmer"])?,
                stride: pargs.opt_value_from_str("--stride")?,
                seq_length: pargs.opt_value_from_str("--seq-length")?,
                max_length: pargs.opt_value_from_str("--max-length")?,
                seq_len_like: pargs.opt_value_from_fn("--seq-len-like", parse_lengths)?,
            },
            weighted: !(pargs.contains("--unweighted")),
            cpu: pargs.contains("--cpu"),
            use_tui: !(pargs.contains("--no-tui")),
            pipeline: pargs.free_from_str().map_err(|e| match e {
                pico_args::Error::MissingArgument => anyhow!("Missing required argument: PIPELINE"),
                _ => anyhow!("{}", e),
            })?,
            dataset: pargs.free_from_str().map_err(|e| match e {
                pico_args::Error::MissingArgument => anyhow!("Missing required argument: DATASET"),
                _ => anyhow!("{}", e),
            })?,
        };

        Ok(Some(args))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let Some(args) = Args::parse()? else {
        print!("{}", HELP);

        return Ok(());
    };

    let pipeline = Pipeline::try_from(args.pipeline.as_str())?;

    let base = match &args.config {
        Some(path) => Some(
            training::Config::load(path)
                .map_err(|e| anyhow!("Unable to load training config {}: {}", path, e))?,
        ),
        None => None,
    };

    let model = args
        .model
        .clone()
        .or_else(|| base.as_ref().map(|config| config.model_name.clone()))
        .ok_or_else(|| anyhow!("Missing required argument: --model"))?;

    let ranks = match (&args.ranks, &base) {
        (Some(ranks), _) => parse_ranks(ranks)?,
        (None, Some(config)) => config.ranks.clone(),
        (None, None) => pipeline.default_ranks(),
    };
    pipeline.check_ranks(&ranks)?;

    let mut config = match base {
        Some(mut config) => {
            config.model_name = model;
            config.dataset_name = args.dataset.clone();
            config.pipeline = pipeline.to_string();
            config.ranks = ranks;
            config
        }
        None => training::Config::new(model, args.dataset.clone(), pipeline.to_string(), ranks),
    };

    config.encoder = args.encoder.clone().apply(config.encoder);

    if let Some(num_epochs) = args.num_epochs {
        config.num_epochs = num_epochs;
    }

    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }

    if let Some(data_dir) = &args.data_dir {
        config.data_dir = data_dir.to_string();
    }

    if let Some(unknown_thr) = args.unknown_thr {
        config.unknown_thr = unknown_thr;
    }

    if !args.weighted {
        config.weighted = false;
    }

    let train = SequenceDataset::load(&config.data_dir, &args.dataset, "train").await?;
    let test = SequenceDataset::load(&config.data_dir, &args.dataset, "test").await?;

    let taxonomy = Taxonomy::load(format!("{}/taxonomy", config.data_dir)).await?;

    info!(
        "Training the {} pipeline on {} for {}",
        pipeline,
        args.dataset,
        config
            .ranks
            .iter()
            .map(|rank| rank.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let device = if args.cpu {
        LibTorchDevice::Cpu
    } else {
        LibTorchDevice::Cuda(0)
    };

    taxonomic_classification::train::<Autodiff<LibTorch>, Taxonomy>(
        vec![device],
        train,
        test,
        &taxonomy,
        config,
        args.use_tui,
    )
    .await?;

    Ok(())
}
