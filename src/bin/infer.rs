//! Command line tool to predict the temporal relation in marked sentences

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use burn::backend::{libtorch::LibTorchDevice, LibTorch};
use burn_tlink::{
    pipelines::relation_classification::infer,
    utils::files::read_file,
};
use pico_args::Arguments;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Usage: infer [OPTIONS] [FILE]

Arguments:
  FILE                 A file with one marked sentence per line (reads stdin when omitted)

Options:
  -h, --help           Print help
  -o, --model-dir      The directory holding the trained model (defaults to 'model')
  --no-cuda            Run on the CPU
";

#[derive(Debug)]
struct Args {
    /// Prints the usage menu
    help: bool,

    /// The directory holding the trained model
    model_dir: Option<String>,

    /// Run on the CPU
    no_cuda: bool,

    /// The input file
    input: Option<PathBuf>,
}

fn parse_args() -> Result<Args, pico_args::Error> {
    let mut pargs = Arguments::from_env();

    let args = Args {
        help: pargs.contains(["-h", "--help"]),
        model_dir: pargs.opt_value_from_str(["-o", "--model-dir"])?,
        no_cuda: pargs.contains("--no-cuda"),
        input: pargs.opt_free_from_str()?,
    };

    Ok(args)
}

async fn read_samples(input: Option<&PathBuf>) -> Result<Vec<String>> {
    let lines = match input {
        Some(path) => read_file(path)
            .await
            .map_err(|e| anyhow!("Unable to read {}: {}", path.display(), e))?,
        None => {
            let mut lines = Vec::new();
            let mut reader = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = reader.next_line().await? {
                lines.push(line);
            }

            lines
        }
    };

    Ok(lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    let args = parse_args()?;

    if args.help {
        println!("{}", HELP);
        return Ok(());
    }

    let model_dir = PathBuf::from(args.model_dir.as_deref().unwrap_or("model"));
    let samples = read_samples(args.input.as_ref()).await?;

    let device = if tch::Cuda::is_available() && !args.no_cuda {
        LibTorchDevice::Cuda(0)
    } else {
        LibTorchDevice::Cpu
    };

    // Get model predictions
    let predictions = infer::<LibTorch>(device, &model_dir, samples)?;

    // Print out the prediction for each sample
    for (i, prediction) in predictions.into_iter().enumerate() {
        println!(
            "\n=== Item {i} ===\
             \n- Text: {}\
             \n- Relation: {}\
             \n- Score: {:.4}\
             \n================",
            prediction.text, prediction.label, prediction.score
        );
    }

    Ok(())
}
