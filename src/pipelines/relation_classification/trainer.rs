use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::InMemDataset,
    },
    module::{AutodiffModule, Module},
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    optim::{AdamWConfig, GradientsAccumulator, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion,
    },
};
use tokenizers::Tokenizer;

use crate::{
    datasets::{
        tlink::{self, Labels},
        Mode,
    },
    models::bert::relation_classification::{Config, Model},
    utils::{files::write_lines, hugging_face::ModelFiles, tensors::tensor_to_ids},
};

use super::{
    batcher::{Batcher, Train},
    checkpoint,
    clipping::clip_grad_norm,
    config::Training,
    early_stopping::EarlyStopping,
    metrics::{classification_report, compute_metrics},
    schedule::LinearWarmup,
    Feature,
};

/// Trainer Error
#[derive(thiserror::Error, Debug)]
pub enum TrainerError {
    /// Evaluation was requested on the training split
    #[error("only dev and test datasets are available for evaluation, got {0}")]
    EvaluationMode(Mode),

    /// The split was not provided to the trainer
    #[error("no {0} dataset was provided")]
    MissingDataset(Mode),

    /// Training ran without taking a single optimizer step
    #[error("the training dataset is too small for a single optimizer step")]
    NoSteps,

    /// The sequence length does not fit the model
    #[error("max_seq_len {max_seq_len} exceeds the model's {max_position_embeddings} positions")]
    SequenceTooLong {
        /// The configured sequence length
        max_seq_len: usize,
        /// Positions supported by the model
        max_position_embeddings: usize,
    },
}

/// The features of each split handed to the trainer
#[derive(Clone, Debug, Default)]
pub struct Datasets {
    /// Training features
    pub train: Option<Vec<Feature>>,

    /// Development features
    pub dev: Option<Vec<Feature>>,

    /// Test features
    pub test: Option<Vec<Feature>>,
}

impl Datasets {
    fn get(&self, mode: Mode) -> Option<&Vec<Feature>> {
        match mode {
            Mode::Train => self.train.as_ref(),
            Mode::Dev => self.dev.as_ref(),
            Mode::Test => self.test.as_ref(),
        }
    }
}

/// Fine-tunes and evaluates BERT for relation classification
pub struct Trainer<B: AutodiffBackend> {
    config: Training,
    labels: Labels,
    tokenizer: Tokenizer,
    model_config: Config,
    model: Model<B>,
    datasets: Datasets,
    class_weights: Option<Vec<f32>>,
    texts: BTreeMap<Mode, Vec<String>>,
    device: B::Device,
}

/// Load the sentences of the evaluation splits for prediction files, and clear stale predictions
async fn prediction_texts(
    config: &Training,
    datasets: &Datasets,
    labels: &Labels,
) -> anyhow::Result<BTreeMap<Mode, Vec<String>>> {
    let mut texts = BTreeMap::new();

    for mode in [Mode::Dev, Mode::Test] {
        if datasets.get(mode).is_some() {
            let dataset = tlink::Dataset::load(config.data_file(mode), mode, labels).await?;
            texts.insert(mode, dataset.texts().to_vec());
        }
    }

    if tokio::fs::try_exists(&config.pred_dir).await? {
        tokio::fs::remove_dir_all(&config.pred_dir).await?;
    }

    Ok(texts)
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Load the pretrained model with a fresh classification head
    pub async fn new(
        config: Training,
        model_files: &ModelFiles,
        tokenizer: Tokenizer,
        labels: Labels,
        datasets: Datasets,
        class_weights: Option<Vec<f32>>,
        device: B::Device,
    ) -> anyhow::Result<Self> {
        let model_config = Config::load_pretrained(
            &model_files.config,
            &labels,
            tokenizer.get_vocab_size(true),
            config.hidden_dropout_prob,
        )?;

        if config.max_seq_len > model_config.max_position_embeddings {
            return Err(TrainerError::SequenceTooLong {
                max_seq_len: config.max_seq_len,
                max_position_embeddings: model_config.max_position_embeddings,
            }
            .into());
        }

        let model = Model::load_pretrained(&model_config, &model_files.weights, &device)?;

        log::info!("Loaded {} with {} parameters", config.model_name_or_path, model.num_params());

        let texts = if config.write_pred {
            prediction_texts(&config, &datasets, &labels).await?
        } else {
            BTreeMap::new()
        };

        let mut trainer = Self::with_model(
            config,
            tokenizer,
            labels,
            model_config,
            model,
            datasets,
            class_weights,
            device,
        );
        trainer.texts = texts;

        Ok(trainer)
    }

    /// Build a trainer around an already initialized model
    #[allow(clippy::too_many_arguments)]
    pub fn with_model(
        config: Training,
        tokenizer: Tokenizer,
        labels: Labels,
        model_config: Config,
        model: Model<B>,
        datasets: Datasets,
        class_weights: Option<Vec<f32>>,
        device: B::Device,
    ) -> Self {
        Self {
            config,
            labels,
            tokenizer,
            model_config,
            model,
            datasets,
            class_weights,
            texts: BTreeMap::new(),
            device,
        }
    }

    /// Train on the training split, returning the step count and the mean training loss
    pub async fn train(&mut self) -> anyhow::Result<(usize, f64)> {
        let features = self
            .datasets
            .train
            .clone()
            .ok_or(TrainerError::MissingDataset(Mode::Train))?;

        let config = self.config.clone();
        let accumulation = config.gradient_accumulation_steps.max(1);
        let batches = features.len().div_ceil(config.train_batch_size.max(1));
        let steps_per_epoch = batches / accumulation;

        let (t_total, num_epochs) = if config.max_steps > 0 {
            (
                config.max_steps,
                config.max_steps / steps_per_epoch.max(1) + 1,
            )
        } else {
            (steps_per_epoch * config.num_train_epochs, config.num_train_epochs)
        };

        // Initialize optimizer
        let mut optimizer = AdamWConfig::new()
            .with_epsilon(config.adam_epsilon)
            .with_weight_decay(config.weight_decay)
            .init::<B, Model<B>>();

        // Initialize learning rate scheduler
        let schedule = LinearWarmup::new(config.learning_rate, config.warmup_steps, t_total);

        let loss = self.loss::<B>(&self.device);

        log::info!("***** Running training *****");
        log::info!("  Num examples = {}", features.len());
        log::info!("  Num Epochs = {}", num_epochs);
        log::info!("  Total train batch size = {}", config.train_batch_size);
        log::info!("  Gradient Accumulation steps = {}", accumulation);
        log::info!("  Total optimization steps = {}", t_total);
        log::info!("  Logging steps = {}", config.logging_steps);
        log::info!("  Patience = {}", config.patience);
        log::info!("  Save steps = {}", config.save_steps);

        let mut model = self.model.clone();
        let mut accumulator = GradientsAccumulator::new();
        let mut stopping = EarlyStopping::new(config.patience);

        let mut global_step = 0;
        let mut tr_loss = 0.0;

        'epochs: for epoch in 0..num_epochs {
            log::info!("[Epoch] {}/{}", epoch + 1, num_epochs);

            let dataloader = self.train_loader(&features, epoch);

            for (step, batch) in dataloader.iter().enumerate() {
                let output = model.forward(batch, &loss);

                let mut batch_loss = output.loss;
                if accumulation > 1 {
                    batch_loss = batch_loss.div_scalar(accumulation as f32);
                }

                tr_loss += batch_loss.clone().into_scalar().elem::<f64>();

                let grads = GradientsParams::from_grads(batch_loss.backward(), &model);
                accumulator.accumulate(&model, grads);

                if (step + 1) % accumulation == 0 {
                    let mut grads = accumulator.grads();
                    clip_grad_norm::<B, _>(&model, &mut grads, config.max_grad_norm);

                    let lr = schedule.lr(global_step);
                    model = optimizer.step(lr, model, grads);
                    global_step += 1;

                    if config.logging_steps > 0 && global_step % config.logging_steps == 0 {
                        let results = self
                            .evaluate_model(&model, Mode::Dev, &global_step.to_string(), false)
                            .await?;

                        let stop = stopping.update(results["loss"]);
                        log::info!(
                            "model checked with dev dataset (eval loss: {}, #trigger: {}/{})",
                            results["loss"],
                            stopping.triggers(),
                            stopping.patience()
                        );

                        if stop {
                            log::info!("Early stopped!");
                        }
                    }

                    if config.save_steps > 0 && global_step % config.save_steps == 0 {
                        self.save(&model)?;
                        log::info!("model saved.");
                    }
                }

                if stopping.should_stop() || (config.max_steps > 0 && global_step > config.max_steps)
                {
                    break 'epochs;
                }
            }
        }

        self.model = model;

        if global_step == 0 {
            return Err(TrainerError::NoSteps.into());
        }

        if config.save_steps == 0 {
            self.save_model()?;
        }

        Ok((global_step, tr_loss / global_step as f64))
    }

    /// Training batches in a new random order for each epoch
    ///
    /// A single loader thread keeps every batch at `train_batch_size` (except the last), so the
    /// step count matches the schedule.
    fn train_loader(&self, features: &[Feature], epoch: usize) -> Arc<dyn DataLoader<Train<B>>> {
        DataLoaderBuilder::new(Batcher::<B>::new(self.device.clone()))
            .batch_size(self.config.train_batch_size)
            .shuffle(self.config.seed + epoch as u64)
            .build(InMemDataset::new(features.to_vec()))
    }

    /// Evaluate the current model on the dev or test split
    pub async fn evaluate(
        &self,
        mode: Mode,
        step: &str,
        show_detail: bool,
    ) -> anyhow::Result<BTreeMap<String, f64>> {
        self.evaluate_model(&self.model, mode, step, show_detail).await
    }

    async fn evaluate_model(
        &self,
        model: &Model<B>,
        mode: Mode,
        step: &str,
        show_detail: bool,
    ) -> anyhow::Result<BTreeMap<String, f64>> {
        if mode == Mode::Train {
            return Err(TrainerError::EvaluationMode(mode).into());
        }

        let features = self
            .datasets
            .get(mode)
            .ok_or(TrainerError::MissingDataset(mode))?;

        log::info!("***** Running evaluation on {} dataset *****", mode);
        log::info!("  Num examples = {}", features.len());
        log::info!("  Batch size = {}", self.config.eval_batch_size);

        let model = model.valid();
        let loss = self.loss::<B::InnerBackend>(&self.device);

        // A single worker keeps batches in dataset order
        let dataloader: Arc<dyn DataLoader<Train<B::InnerBackend>>> =
            DataLoaderBuilder::new(Batcher::<B::InnerBackend>::new(self.device.clone()))
                .batch_size(self.config.eval_batch_size)
                .build(InMemDataset::new(features.clone()));

        let mut eval_loss = 0.0;
        let mut nb_eval_steps = 0;
        let mut preds = Vec::with_capacity(features.len());
        let mut out_label_ids = Vec::with_capacity(features.len());

        for batch in dataloader.iter() {
            let output = model.forward(batch, &loss);

            eval_loss += output.loss.into_scalar().elem::<f64>();
            nb_eval_steps += 1;

            preds.extend(tensor_to_ids(output.output.argmax(1)));
            out_label_ids.extend(tensor_to_ids(output.targets));
        }

        let mut results = BTreeMap::from([(
            "loss".to_string(),
            eval_loss / nb_eval_steps.max(1) as f64,
        )]);

        if self.config.write_pred {
            self.write_predictions(mode, step, &out_label_ids, &preds)
                .await?;
        }

        results.extend(compute_metrics(&out_label_ids, &preds));

        log::info!("***** Eval results *****");
        for (key, value) in &results {
            log::info!("  {} = {}", key, value);
        }

        if show_detail {
            for line in classification_report(&out_label_ids, &preds, &self.labels).lines() {
                log::info!("{}", line);
            }
        }

        Ok(results)
    }

    async fn write_predictions(
        &self,
        mode: Mode,
        step: &str,
        out_label_ids: &[usize],
        preds: &[usize],
    ) -> anyhow::Result<()> {
        let texts = self.texts.get(&mode).map(Vec::as_slice).unwrap_or_default();

        let lines = texts
            .iter()
            .zip(out_label_ids.iter().zip(preds))
            .map(|(text, (&truth, &pred))| {
                format!(
                    "{} {} {}",
                    text,
                    self.labels.name(truth),
                    self.labels.name(pred)
                )
            });

        let path = PathBuf::from(&self.config.pred_dir).join(format!("pred_{}.txt", step));
        write_lines(path, lines).await?;

        Ok(())
    }

    /// Save the current model to the model directory, overwriting any previous checkpoint
    pub fn save_model(&self) -> anyhow::Result<()> {
        self.save(&self.model)
    }

    fn save(&self, model: &Model<B>) -> anyhow::Result<()> {
        checkpoint::save(
            &PathBuf::from(&self.config.model_dir),
            model,
            &self.model_config,
            &self.tokenizer,
            &self.config,
        )
    }

    /// Replace the current model with the checkpoint in the model directory
    pub fn load_model(&mut self) -> anyhow::Result<()> {
        let checkpoint::Checkpoint { config, model, .. } =
            checkpoint::load::<B>(&PathBuf::from(&self.config.model_dir), &self.device)?;

        self.model_config = config;
        self.model = model;

        Ok(())
    }

    fn loss<K: Backend>(&self, device: &K::Device) -> CrossEntropyLoss<K> {
        CrossEntropyLossConfig::new()
            .with_weights(self.class_weights.clone())
            .init(device)
    }
}

#[cfg(test)]
mod tests {
    use bert_burn::model::BertModelConfig;
    use burn::backend::{Autodiff, NdArray};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::pipelines::relation_classification::{
        features::convert_examples_to_features, tokenizer::tests::test_tokenizer,
    };

    type TestBackend = Autodiff<NdArray>;

    const SENTENCES: [(&str, usize); 6] = [
        ("[B1] 어제 [E1] 회의가 [B2] 열렸다 [E2]", 1),
        ("[B2] 오늘 [E2] [B1] 발표 [E1] 했다", 0),
        ("[B1] a [E1] [B2] b [E2]", 2),
        ("[B2] c [E2] [B1] a [E1]", 0),
        ("[B1] 어제 [E1] [B2] 발표 [E2] 했다", 1),
        ("[B1] 오늘 [E1] [B2] c [E2]", 2),
    ];

    fn features(tokenizer: &Tokenizer) -> Vec<Feature> {
        let examples: Vec<tlink::Item> = SENTENCES
            .into_iter()
        .enumerate()
        .map(|(i, (text, label))| {
            tlink::Item::new(
                format!("train-{i}"),
                text.split_whitespace().map(str::to_string).collect(),
                text.to_string(),
                label,
            )
        })
        .collect();

        convert_examples_to_features(&examples, 12, tokenizer).unwrap()
    }

    fn trainer(model_dir: &std::path::Path) -> Trainer<TestBackend> {
        let device = Default::default();
        let tokenizer = test_tokenizer();
        let labels = Labels::new(vec!["AFTER".into(), "BEFORE".into(), "OVERLAP".into()]);

        let bert = BertModelConfig::new(2, 1, 1e-12, 8, 16, 14, 16, 2, 0.0, "bert".to_string(), 0)
            .with_with_pooling_layer(Some(true));
        let mut model_config = Config::new_with_labels(bert, &labels);
        model_config.vocab_size = tokenizer.get_vocab_size(true);

        let model = model_config.init::<TestBackend>(&device);

        let features = features(&tokenizer);
        let datasets = Datasets {
            train: Some(features.clone()),
            dev: Some(features[..4].to_vec()),
            test: Some(features),
        };

        let config = Training::new()
            .with_model_dir(model_dir.display().to_string())
            .with_max_seq_len(12)
            .with_train_batch_size(2)
            .with_eval_batch_size(4)
            .with_num_train_epochs(2)
            .with_learning_rate(1e-3)
            .with_logging_steps(2)
            .with_save_steps(0)
            .with_patience(0);

        Trainer::with_model(
            config,
            tokenizer,
            labels,
            model_config,
            model,
            datasets,
            Some(vec![1.0, 1.0, 1.0, 1.0]),
            device,
        )
    }

    #[tokio::test]
    async fn test_train_evaluate_and_reload() -> anyhow::Result<()> {
        let model_dir = std::env::temp_dir().join("burn-tlink-trainer-test");
        let mut trainer = trainer(&model_dir);

        let (global_step, tr_loss) = trainer.train().await?;

        // 6 examples in batches of 2 for 2 epochs
        assert_eq!(global_step, 6);
        assert!(tr_loss.is_finite() && tr_loss > 0.0);

        // save_steps = 0 saves once after training
        assert!(model_dir.join(checkpoint::CONFIG_FILE).exists());
        assert!(model_dir.join(checkpoint::TOKENIZER_FILE).exists());

        let before = trainer.evaluate(Mode::Test, "eval", true).await?;
        assert_eq!(
            before.keys().collect::<Vec<_>>(),
            vec!["acc", "f1", "loss", "precision", "recall"]
        );

        // Checkpoints are stored in half precision
        trainer.load_model()?;
        let after = trainer.evaluate(Mode::Test, "eval", false).await?;
        assert!((before["loss"] - after["loss"]).abs() < 5e-2);

        std::fs::remove_dir_all(model_dir)?;

        Ok(())
    }

    #[tokio::test]
    async fn test_max_steps_and_modes() -> anyhow::Result<()> {
        let model_dir = std::env::temp_dir().join("burn-tlink-trainer-max-steps");
        let mut trainer = trainer(&model_dir);
        trainer.config.max_steps = 2;
        trainer.config.save_steps = 100;
        trainer.config.logging_steps = 0;

        // Training stops once the step count passes max_steps
        let (global_step, _) = trainer.train().await?;
        assert_eq!(global_step, 3);
        assert!(!model_dir.exists());

        let err = trainer.evaluate(Mode::Train, "0", false).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrainerError>(),
            Some(TrainerError::EvaluationMode(Mode::Train))
        ));

        Ok(())
    }

    #[test]
    fn test_train_batches_are_full_regardless_of_threads() {
        let model_dir = std::env::temp_dir().join("burn-tlink-trainer-loader");
        let mut trainer = trainer(&model_dir);
        trainer.config.train_batch_size = 4;

        let features = features(&trainer.tokenizer);

        for epoch in 0..2 {
            let sizes: Vec<usize> = trainer
                .train_loader(&features, epoch)
                .iter()
                .map(|batch| batch.targets.dims()[0])
                .collect();

            assert_eq!(sizes, vec![4, 2]);
        }
    }

    #[tokio::test]
    async fn test_write_predictions() -> anyhow::Result<()> {
        let pred_dir = std::env::temp_dir().join("burn-tlink-trainer-preds");
        let mut trainer = trainer(&std::env::temp_dir().join("burn-tlink-trainer-preds-model"));
        trainer.config.write_pred = true;
        trainer.config.pred_dir = pred_dir.display().to_string();

        let texts: Vec<String> = SENTENCES.iter().map(|(text, _)| text.to_string()).collect();
        trainer.texts.insert(Mode::Test, texts);

        trainer.evaluate(Mode::Test, "eval", false).await?;

        let lines = tokio::fs::read_to_string(pred_dir.join("pred_eval.txt")).await?;
        let lines: Vec<&str> = lines.lines().collect();
        assert_eq!(lines.len(), SENTENCES.len());

        let known: Vec<&str> = trainer.labels.iter().collect();
        for (line, (text, label)) in lines.iter().zip(SENTENCES) {
            let rest = line
                .strip_prefix(text)
                .and_then(|rest| rest.strip_prefix(' '))
                .unwrap();
            let (truth, pred) = rest.split_once(' ').unwrap();

            assert_eq!(truth, trainer.labels.name(label));
            assert!(known.contains(&pred));
        }

        tokio::fs::remove_dir_all(pred_dir).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_prediction_texts_clear_stale_predictions() -> anyhow::Result<()> {
        let root = std::env::temp_dir().join("burn-tlink-trainer-texts");
        let pred_dir = root.join("preds");
        tokio::fs::create_dir_all(&pred_dir).await?;
        tokio::fs::write(pred_dir.join("pred_200.txt"), "stale\n").await?;
        tokio::fs::write(root.join("dev.tsv"), "[B1] a [E1] [B2] b [E2]\tBEFORE\n").await?;
        tokio::fs::write(root.join("test.tsv"), "[B2] c [E2] [B1] a [E1]\tAFTER\n").await?;

        let config = Training::new()
            .with_data_dir(root.display().to_string())
            .with_pred_dir(pred_dir.display().to_string())
            .with_write_pred(true);
        let labels = Labels::new(vec!["AFTER".into(), "BEFORE".into()]);
        let datasets = Datasets {
            train: None,
            dev: Some(Vec::new()),
            test: Some(Vec::new()),
        };

        let texts = prediction_texts(&config, &datasets, &labels).await?;

        assert_eq!(texts[&Mode::Dev], vec!["[B1] a [E1] [B2] b [E2]".to_string()]);
        assert_eq!(texts[&Mode::Test], vec!["[B2] c [E2] [B1] a [E1]".to_string()]);
        assert!(!pred_dir.exists());

        tokio::fs::remove_dir_all(root).await?;

        Ok(())
    }
}
