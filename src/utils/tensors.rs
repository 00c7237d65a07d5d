use burn::tensor::{backend::Backend, Data, ElementConversion, Int, Shape, Tensor};

/// Stack equally sized rows of ids into a `[rows, seq_length]` integer tensor
pub fn stack_ids<B: Backend>(
    rows: Vec<Vec<usize>>,
    seq_length: usize,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let batch_size = rows.len();

    let values = rows
        .into_iter()
        .flat_map(|row| {
            debug_assert_eq!(row.len(), seq_length, "rows must be padded beforehand");
            row.into_iter()
        })
        .map(|e| (e as i64).elem())
        .collect();

    Tensor::from_data(
        Data::new(values, Shape::new([batch_size, seq_length])),
        device,
    )
}

/// Build a 1D integer tensor from a list of ids
pub fn ids_to_tensor<B: Backend>(ids: Vec<usize>, device: &B::Device) -> Tensor<B, 1, Int> {
    let len = ids.len();

    Tensor::from_data(
        Data::new(
            ids.into_iter().map(|e| (e as i64).elem()).collect(),
            Shape::new([len]),
        ),
        device,
    )
}

/// Read back an integer tensor as a flat list of ids
pub fn tensor_to_ids<B: Backend, const D: usize>(tensor: Tensor<B, D, Int>) -> Vec<usize> {
    tensor
        .into_data()
        .convert::<i64>()
        .value
        .into_iter()
        .map(|id| id as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use super::*;

    type TestBackend = NdArray;

    #[test]
    fn test_stack_ids() {
        let device = Default::default();
        let tensor = stack_ids::<TestBackend>(vec![vec![1, 2, 0], vec![3, 4, 5]], 3, &device);

        assert_eq!(tensor.dims(), [2, 3]);
        assert_eq!(tensor_to_ids(tensor), vec![1, 2, 0, 3, 4, 5]);
    }

    #[test]
    fn test_ids_to_tensor() {
        let device = Default::default();
        let tensor = ids_to_tensor::<TestBackend>(vec![7, 0, 2], &device);

        assert_eq!(tensor.dims(), [3]);
        assert_eq!(tensor_to_ids(tensor), vec![7, 0, 2]);
    }
}
