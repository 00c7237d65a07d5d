use burn::{
    data::dataloader,
    tensor::{backend::Backend, Bool, Int, Tensor},
};
use derive_new::new;

use crate::utils::tensors::{ids_to_tensor, stack_ids};

use super::Feature;

/// Model input for relation classification
#[derive(Debug, Clone, new)]
pub struct Infer<B: Backend> {
    /// Token ids as 2D tensor: [batch_size, max_seq_length]
    pub tokens: Tensor<B, 2, Int>,

    /// Padding mask for the tokenized text containing booleans for padding locations
    pub mask_pad: Tensor<B, 2, Bool>,

    /// Position of the first entity marker in each sequence: [batch_size]
    pub e1_starts: Tensor<B, 1, Int>,

    /// Position of the second entity marker in each sequence: [batch_size]
    pub e2_starts: Tensor<B, 1, Int>,
}

/// A training batch for relation classification
#[derive(Clone, Debug, new)]
pub struct Train<B: Backend> {
    /// Bert Model input
    pub input: Infer<B>,

    /// Class ids for the batch
    pub targets: Tensor<B, 1, Int>,
}

/// Struct for batching relation classification features
#[derive(Clone, new)]
pub struct Batcher<B: Backend> {
    /// Device on which to perform computation (e.g., CPU or CUDA device)
    device: B::Device,
}

impl<B: Backend> Batcher<B> {
    fn infer(&self, items: &[Feature]) -> Infer<B> {
        let seq_length = items.first().map(|f| f.input_ids.len()).unwrap_or(0);

        let tokens = stack_ids(
            items.iter().map(|f| f.input_ids.clone()).collect(),
            seq_length,
            &self.device,
        );

        let mask_pad = stack_ids::<B>(
            items.iter().map(|f| f.attention_mask.clone()).collect(),
            seq_length,
            &self.device,
        )
        .equal_elem(0);

        let e1_starts = ids_to_tensor(
            items.iter().map(|f| f.entity_starts[0]).collect(),
            &self.device,
        );
        let e2_starts = ids_to_tensor(
            items.iter().map(|f| f.entity_starts[1]).collect(),
            &self.device,
        );

        Infer {
            tokens,
            mask_pad,
            e1_starts,
            e2_starts,
        }
    }
}

/// Implement Batcher trait for Batcher struct for inference
impl<B: Backend> dataloader::batcher::Batcher<Feature, Infer<B>> for Batcher<B> {
    /// Collects features into an inference batch
    fn batch(&self, items: Vec<Feature>) -> Infer<B> {
        self.infer(&items)
    }
}

/// Implement Batcher trait for Batcher struct for training
impl<B: Backend> dataloader::batcher::Batcher<Feature, Train<B>> for Batcher<B> {
    /// Collects features into a training batch
    fn batch(&self, items: Vec<Feature>) -> Train<B> {
        let input = self.infer(&items);

        let targets = ids_to_tensor(items.iter().map(|f| f.label_id).collect(), &self.device);

        Train { input, targets }
    }
}

#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, data::dataloader::batcher::Batcher as _};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::utils::tensors::tensor_to_ids;

    type TestBackend = NdArray;

    fn feature(input_ids: Vec<usize>, entity_starts: [usize; 2], label_id: usize) -> Feature {
        let attention_mask = input_ids.iter().map(|&id| usize::from(id != 0)).collect();
        let token_type_ids = vec![0; input_ids.len()];

        Feature {
            input_ids,
            attention_mask,
            token_type_ids,
            entity_starts,
            label_id,
        }
    }

    #[test]
    fn test_train_batch() {
        let batcher = Batcher::<TestBackend>::new(Default::default());

        let batch: Train<TestBackend> = batcher.batch(vec![
            feature(vec![2, 14, 4, 16, 3, 0], [1, 3], 2),
            feature(vec![2, 16, 5, 14, 6, 3], [3, 1], 0),
        ]);

        assert_eq!(batch.input.tokens.dims(), [2, 6]);
        assert_eq!(
            batch
                .input
                .mask_pad
                .into_data()
                .value,
            vec![false, false, false, false, false, true, false, false, false, false, false, false]
        );
        assert_eq!(tensor_to_ids(batch.input.e1_starts), vec![1, 3]);
        assert_eq!(tensor_to_ids(batch.input.e2_starts), vec![3, 1]);
        assert_eq!(tensor_to_ids(batch.targets), vec![2, 0]);
    }
}
