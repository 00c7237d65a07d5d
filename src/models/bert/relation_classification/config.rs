//! Adapt Bert to the Relation Classification pipeline

use std::{collections::BTreeMap, path::Path};

use bert_burn::model::BertModelConfig;
use burn::{
    config::Config as _,
    nn::{DropoutConfig, LinearConfig},
    tensor::backend::Backend,
};

use crate::datasets::tlink::Labels;

use super::Model;

/// The number of hidden states concatenated for the head: [CLS], entity 1 and entity 2
pub const HEAD_INPUTS: usize = 3;

/// The Model Configuration
#[derive(burn::config::Config)]
pub struct Config {
    // -- Fields copied from BertModelConfig because #[serde(flatten)] is not supported yet
    /// Number of attention heads in the multi-head attention
    pub num_attention_heads: usize,
    /// Number of transformer encoder layers/blocks
    pub num_hidden_layers: usize,
    /// Layer normalization epsilon
    pub layer_norm_eps: f64,
    /// Size of bert embedding (e.g., 768 for bert-base)
    pub hidden_size: usize,
    /// Size of the intermediate position wise feedforward layer
    pub intermediate_size: usize,
    /// Size of the vocabulary, entity markers included
    pub vocab_size: usize,
    /// Max position embeddings, in RoBERTa equal to max_seq_len + 2 (514), for BERT equal to max_seq_len(512)
    pub max_position_embeddings: usize,
    /// Identifier for sentence type in input (e.g., 0 for single sentence, 1 for pair)
    pub type_vocab_size: usize,
    /// Dropout value across layers, typically 0.1
    pub hidden_dropout_prob: f64,
    /// BERT model name (bert, roberta)
    pub model_type: String,
    /// Index of the padding token
    pub pad_token_id: usize,
    /// Maximum sequence length for the tokenizer
    pub max_seq_len: Option<usize>,
    /// Whether to add a pooling layer to the model
    pub with_pooling_layer: Option<bool>,
    // -- End fields copied from BertModelConfig
    /// A map from class ids to class name labels
    pub id2label: BTreeMap<usize, String>,
}

impl Config {
    /// Build the configuration for a set of relation labels
    pub fn new_with_labels(model: BertModelConfig, labels: &Labels) -> Self {
        let id2label = labels
            .iter()
            .enumerate()
            .map(|(i, s)| (i, s.to_string()))
            .collect();

        Config::new(
            model.num_attention_heads,
            model.num_hidden_layers,
            model.layer_norm_eps,
            model.hidden_size,
            model.intermediate_size,
            model.vocab_size,
            model.max_position_embeddings,
            model.type_vocab_size,
            model.hidden_dropout_prob,
            model.model_type,
            model.pad_token_id,
            id2label,
        )
        .with_max_seq_len(model.max_seq_len)
        .with_with_pooling_layer(model.with_pooling_layer)
    }

    /// Load a Hugging Face `config.json` and adapt it to the labels and the extended vocabulary
    pub fn load_pretrained<P: AsRef<Path>>(
        config_file: P,
        labels: &Labels,
        vocab_size: usize,
        hidden_dropout_prob: f64,
    ) -> anyhow::Result<Self> {
        let mut bert_config = BertModelConfig::load(config_file.as_ref())
            .map_err(|e| anyhow!("Unable to load Hugging Face Config file: {}", e))?;

        // The [CLS] state comes from the pooling layer
        bert_config.with_pooling_layer = Some(true);
        bert_config.hidden_dropout_prob = hidden_dropout_prob;

        if vocab_size < bert_config.vocab_size {
            return Err(anyhow!(
                "Tokenizer vocabulary ({}) is smaller than the model vocabulary ({})",
                vocab_size,
                bert_config.vocab_size
            ));
        }
        bert_config.vocab_size = vocab_size;

        let model_config = Config::new_with_labels(bert_config, labels);

        if model_config.id2label.is_empty() {
            return Err(anyhow!("Classes are not defined in the model configuration"));
        }

        Ok(model_config)
    }

    /// Get the Bert model configuration
    pub fn get_bert_config(&self) -> BertModelConfig {
        BertModelConfig::new(
            self.num_attention_heads,
            self.num_hidden_layers,
            self.layer_norm_eps,
            self.hidden_size,
            self.intermediate_size,
            self.vocab_size,
            self.max_position_embeddings,
            self.type_vocab_size,
            self.hidden_dropout_prob,
            self.model_type.clone(),
            self.pad_token_id,
        )
        .with_max_seq_len(self.max_seq_len)
        .with_with_pooling_layer(self.with_pooling_layer)
    }

    /// Initialize the model with random weights
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        let model = self.get_bert_config().init(device);

        let n_classes = self.id2label.len();

        let dropout = DropoutConfig::new(self.hidden_dropout_prob).init();
        let output = LinearConfig::new(self.hidden_size * HEAD_INPUTS, n_classes).init(device);

        Model {
            model,
            dropout,
            output,
            n_classes,
        }
    }
}
