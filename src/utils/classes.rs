use std::hash::Hash;

/// Invert a map by swapping keys and values
pub fn invert_map<K, V, MK, MV>(original: MK) -> MV
where
    K: Ord + Hash + Eq,
    V: Ord + Hash + Eq + Clone,
    MK: IntoIterator<Item = (K, V)>,
    MV: FromIterator<(V, K)>,
{
    original
        .into_iter()
        .map(|(key, value)| (value, key))
        .collect()
}

/// Balanced class weights: `n_samples / (n_classes * count(class))`
///
/// Classes that never occur get a weight of 1.0, since they never contribute to the loss.
pub fn balanced_weights(label_ids: &[usize], n_classes: usize) -> Vec<f32> {
    let mut counts = vec![0usize; n_classes];
    for &id in label_ids {
        if id < n_classes {
            counts[id] += 1;
        }
    }

    let n_samples = label_ids.len() as f32;

    counts
        .into_iter()
        .map(|count| {
            if count == 0 {
                1.0
            } else {
                n_samples / (n_classes as f32 * count as f32)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_invert_map() {
        let id2label = BTreeMap::from([(0, "AFTER".to_string()), (1, "BEFORE".to_string())]);
        let label2id: BTreeMap<String, usize> = invert_map(id2label);

        assert_eq!(label2id["AFTER"], 0);
        assert_eq!(label2id["BEFORE"], 1);
    }

    #[test]
    fn test_balanced_weights() {
        // 4 samples, 3 classes: class 0 x3, class 1 x1, class 2 absent
        let weights = balanced_weights(&[0, 0, 0, 1], 3);

        assert_eq!(weights.len(), 3);
        assert!((weights[0] - 4.0 / 9.0).abs() < 1e-6);
        assert!((weights[1] - 4.0 / 3.0).abs() < 1e-6);
        assert_eq!(weights[2], 1.0);
    }
}
