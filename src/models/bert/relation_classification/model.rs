use std::path::Path;

use bert_burn::{
    data::BertInferenceBatch,
    model::{BertModel, BertModelOutput},
};
use burn::{
    module::Module,
    nn::{loss::CrossEntropyLoss, Dropout, Linear},
    tensor::{activation::softmax, backend::Backend, Int, Tensor},
    train::ClassificationOutput,
};
use derive_new::new;

use crate::pipelines::relation_classification::batcher;

use super::{loader::from_safetensors, Config};

/// BERT for relation classification between two marked entities
#[derive(Module, Debug, new)]
pub struct Model<B: Backend> {
    /// The base BERT model
    pub model: BertModel<B>,

    /// Dropout applied to the concatenated entity representation
    pub dropout: Dropout,

    /// Linear layer over the [CLS], entity 1 and entity 2 states
    pub output: Linear<B>,

    /// Total number of classes
    pub n_classes: usize,
}

/// Define model behavior
impl<B: Backend> Model<B> {
    /// Initialize the model and load the pretrained encoder weights
    pub fn load_pretrained(
        config: &Config,
        weights_file: &Path,
        device: &B::Device,
    ) -> anyhow::Result<Self> {
        if config.id2label.is_empty() {
            return Err(anyhow!("Classes are not defined in the model configuration"));
        }

        let record = from_safetensors(weights_file, device, &config.model_type, config.vocab_size)?;

        let mut model = config.init(device);
        model.model = model.model.load_record(record);

        Ok(model)
    }

    /// Unnormalized class scores: [batch_size, n_classes]
    pub fn logits(&self, input: batcher::Infer<B>) -> Tensor<B, 2> {
        let [batch_size, _seq_length] = input.tokens.dims();
        let device = &self.model.devices()[0];

        let BertModelOutput {
            pooled_output,
            hidden_states,
        } = self.model.forward(BertInferenceBatch {
            tokens: input.tokens.to_device(device),
            mask_pad: input.mask_pad.to_device(device),
        });

        let [_, _, hidden_size] = hidden_states.dims();

        let cls = match pooled_output {
            Some(pooled) => pooled.reshape([batch_size, hidden_size]),
            None => hidden_states
                .clone()
                .slice([0..batch_size, 0..1])
                .reshape([batch_size, hidden_size]),
        };

        let e1 = entity_states(hidden_states.clone(), input.e1_starts.to_device(device));
        let e2 = entity_states(hidden_states, input.e2_starts.to_device(device));

        let features = Tensor::cat(vec![cls, e1, e2], 1);

        self.output
            .forward(self.dropout.forward(features))
            .reshape([batch_size, self.n_classes])
    }

    /// Defines forward pass for training and evaluation
    pub fn forward(
        &self,
        item: batcher::Train<B>,
        loss: &CrossEntropyLoss<B>,
    ) -> ClassificationOutput<B> {
        let output = self.logits(item.input);
        let targets = item.targets.to_device(&output.device());

        let loss = loss.forward(output.clone(), targets.clone());

        ClassificationOutput {
            loss,
            output,
            targets,
        }
    }

    /// Defines forward pass for inference, returning class probabilities
    pub fn infer(&self, input: batcher::Infer<B>) -> Tensor<B, 2> {
        softmax(self.logits(input), 1)
    }
}

/// Pick the hidden state at one position per sequence: [batch_size, hidden_size]
fn entity_states<B: Backend>(
    hidden_states: Tensor<B, 3>,
    starts: Tensor<B, 1, Int>,
) -> Tensor<B, 2> {
    let [batch_size, _seq_length, hidden_size] = hidden_states.dims();

    let indices = starts.reshape([batch_size, 1, 1]).repeat(2, hidden_size);

    hidden_states
        .gather(1, indices)
        .reshape([batch_size, hidden_size])
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::NdArray,
        tensor::{Data, Shape},
    };
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::utils::tensors::ids_to_tensor;

    type TestBackend = NdArray;

    #[test]
    fn test_entity_states() {
        let device = Default::default();

        // batch of 2, 3 positions, hidden size 2
        let hidden_states = Tensor::<TestBackend, 3>::from_data(
            Data::<f32, 3>::new(
                vec![0.0, 0.1, 1.0, 1.1, 2.0, 2.1, 10.0, 10.1, 11.0, 11.1, 12.0, 12.1],
                Shape::new([2, 3, 2]),
            ),
            &device,
        );
        let starts = ids_to_tensor::<TestBackend>(vec![2, 1], &device);

        let states = entity_states(hidden_states, starts);

        assert_eq!(states.dims(), [2, 2]);
        assert_eq!(states.into_data().value, vec![2.0, 2.1, 11.0, 11.1]);
    }
}
