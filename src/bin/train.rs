//! Command line tool to fine-tune and evaluate a TLINK relation classifier

use anyhow::anyhow;
use burn::{
    backend::{libtorch::LibTorchDevice, Autodiff, LibTorch},
    config::Config as _,
};
use burn_tlink::{
    cli::{models::Model, pipelines::Pipeline},
    datasets::{tlink::Labels, Mode},
    pipelines::relation_classification::{
        cache::{class_weights, load_and_cache_examples},
        tokenizer::load_tokenizer,
        Datasets, Trainer, Training,
    },
    utils::hugging_face::resolve_model_files,
};
use pico_args::Arguments;

const HELP: &str = "\
Usage: train [OPTIONS]

Options:
  -h, --help                 Print help
  -c, --config               A JSON training config to start from
  -t, --task                 The pipeline to use (defaults to 'tlink-re')
  -m, --model                The model to use, a Hub name or a local directory (e.g., 'klue/bert-base')
  -d, --data-dir             The directory holding the data files (defaults to 'data')
  -o, --model-dir            Where checkpoints are written (defaults to 'model')
  --pred-dir                 Where prediction files are written (defaults to 'preds')
  --max-seq-len              Maximum sequence length
  -b, --batch-size           Training batch size
  --eval-batch-size          Evaluation batch size
  -n, --num-epochs           Number of epochs to train for
  --max-steps                Total number of optimizer steps, overrides the epochs
  --learning-rate            Initial learning rate
  --warmup-steps             Linear warmup steps
  --logging-steps            Evaluate on the dev split every N steps
  --save-steps               Save a checkpoint every N steps
  --patience                 Early stopping patience
  --seed                     Shuffle seed
  --do-train                 Run training
  --do-eval                  Evaluate the saved model on the test split
  --write-pred               Write predictions on each evaluation
  --compute-class-weight     Weight the loss by class frequency
  --no-cache                 Rebuild the feature caches
  --no-cuda                  Train on the CPU
";

#[derive(Debug)]
struct Args {
    config: Option<String>,
    task: Option<String>,
    model: Option<String>,
    data_dir: Option<String>,
    model_dir: Option<String>,
    pred_dir: Option<String>,
    max_seq_len: Option<usize>,
    batch_size: Option<usize>,
    eval_batch_size: Option<usize>,
    num_epochs: Option<usize>,
    max_steps: Option<usize>,
    learning_rate: Option<f64>,
    warmup_steps: Option<usize>,
    logging_steps: Option<usize>,
    save_steps: Option<usize>,
    patience: Option<usize>,
    seed: Option<u64>,
    do_train: bool,
    do_eval: bool,
    write_pred: bool,
    compute_class_weight: bool,
    no_cache: bool,
    no_cuda: bool,
}

impl Args {
    fn parse() -> anyhow::Result<Option<Self>> {
        let mut pargs = Arguments::from_env();

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            return Ok(None);
        }

        let args = Args {
            config: pargs.opt_value_from_str(["-c", "--config"])?,
            task: pargs.opt_value_from_str(["-t", "--task"])?,
            model: pargs.opt_value_from_str(["-m", "--model"])?,
            data_dir: pargs.opt_value_from_str(["-d", "--data-dir"])?,
            model_dir: pargs.opt_value_from_str(["-o", "--model-dir"])?,
            pred_dir: pargs.opt_value_from_str("--pred-dir")?,
            max_seq_len: pargs.opt_value_from_str("--max-seq-len")?,
            batch_size: pargs.opt_value_from_str(["-b", "--batch-size"])?,
            eval_batch_size: pargs.opt_value_from_str("--eval-batch-size")?,
            num_epochs: pargs.opt_value_from_str(["-n", "--num-epochs"])?,
            max_steps: pargs.opt_value_from_str("--max-steps")?,
            learning_rate: pargs.opt_value_from_str("--learning-rate")?,
            warmup_steps: pargs.opt_value_from_str("--warmup-steps")?,
            logging_steps: pargs.opt_value_from_str("--logging-steps")?,
            save_steps: pargs.opt_value_from_str("--save-steps")?,
            patience: pargs.opt_value_from_str("--patience")?,
            seed: pargs.opt_value_from_str("--seed")?,
            do_train: pargs.contains("--do-train"),
            do_eval: pargs.contains("--do-eval"),
            write_pred: pargs.contains("--write-pred"),
            compute_class_weight: pargs.contains("--compute-class-weight"),
            no_cache: pargs.contains("--no-cache"),
            no_cuda: pargs.contains("--no-cuda"),
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            return Err(anyhow!("Unexpected arguments: {:?}", remaining));
        }

        Ok(Some(args))
    }

    /// Start from the given JSON config (or the defaults) and apply the overrides on top
    fn training_config(&self) -> anyhow::Result<Training> {
        let mut config = match &self.config {
            Some(path) => Training::load(path)
                .map_err(|e| anyhow!("Unable to load training config {}: {}", path, e))?,
            None => Training::new(),
        };

        if let Some(task) = &self.task {
            config.task = Pipeline::try_from(task.as_str())?.to_string();
        }

        let pipeline = Pipeline::try_from(config.task.as_str())?;

        config.model_name_or_path = match &self.model {
            Some(model) => Model::try_from(model.as_str())?.to_string(),
            None if self.config.is_some() => config.model_name_or_path.clone(),
            None => pipeline.default_model().to_string(),
        };

        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }

        if let Some(model_dir) = &self.model_dir {
            config.model_dir = model_dir.clone();
        }

        if let Some(pred_dir) = &self.pred_dir {
            config.pred_dir = pred_dir.clone();
        }

        if let Some(max_seq_len) = self.max_seq_len {
            config.max_seq_len = max_seq_len;
        }

        if let Some(batch_size) = self.batch_size {
            config.train_batch_size = batch_size;
        }

        if let Some(eval_batch_size) = self.eval_batch_size {
            config.eval_batch_size = eval_batch_size;
        }

        if let Some(num_epochs) = self.num_epochs {
            config.num_train_epochs = num_epochs;
        }

        if let Some(max_steps) = self.max_steps {
            config.max_steps = max_steps;
        }

        if let Some(learning_rate) = self.learning_rate {
            config.learning_rate = learning_rate;
        }

        if let Some(warmup_steps) = self.warmup_steps {
            config.warmup_steps = warmup_steps;
        }

        if let Some(logging_steps) = self.logging_steps {
            config.logging_steps = logging_steps;
        }

        if let Some(save_steps) = self.save_steps {
            config.save_steps = save_steps;
        }

        if let Some(patience) = self.patience {
            config.patience = patience;
        }

        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        config.write_pred |= self.write_pred;
        config.compute_class_weight |= self.compute_class_weight;
        config.use_cache &= !self.no_cache;
        config.no_cuda |= self.no_cuda;

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    let Some(args) = Args::parse()? else {
        print!("{}", HELP);

        return Ok(());
    };

    if !args.do_train && !args.do_eval {
        return Err(anyhow!("Nothing to do, pass --do-train and/or --do-eval"));
    }

    let config = args.training_config()?;

    log::info!("Training arguments: {}", config);

    let model_files = resolve_model_files(&config.model_name_or_path).await?;

    let tokenizer = load_tokenizer(&model_files.tokenizer)?;
    log::info!(
        "Loaded tokenizer with {} tokens, entity markers included",
        tokenizer.get_vocab_size(true)
    );

    let labels = Labels::load(config.label_path()).await?;

    let train = if args.do_train {
        Some(load_and_cache_examples(&config, &tokenizer, &labels, Mode::Train).await?)
    } else {
        None
    };
    let dev = load_and_cache_examples(&config, &tokenizer, &labels, Mode::Dev).await?;
    let test = load_and_cache_examples(&config, &tokenizer, &labels, Mode::Test).await?;

    let weights = match &train {
        Some(train) if config.compute_class_weight => {
            let weights = class_weights(train, &labels);
            log::info!("Class weights: {:?}", weights);

            Some(weights)
        }
        _ => None,
    };

    let device = if tch::Cuda::is_available() && !config.no_cuda {
        LibTorchDevice::Cuda(0)
    } else {
        LibTorchDevice::Cpu
    };

    let datasets = Datasets {
        train,
        dev: Some(dev),
        test: Some(test),
    };

    let mut trainer = Trainer::<Autodiff<LibTorch>>::new(
        config,
        &model_files,
        tokenizer,
        labels,
        datasets,
        weights,
        device,
    )
    .await?;

    if args.do_train {
        let (global_step, loss) = trainer.train().await?;
        log::info!("global_step = {}, average loss = {}", global_step, loss);
    }

    if args.do_eval {
        trainer.load_model()?;
        trainer.evaluate(Mode::Test, "eval", true).await?;
    }

    Ok(())
}
