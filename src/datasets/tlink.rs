use std::{collections::HashMap, path::Path};

use burn::data::dataset::{self, InMemDataset};
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::utils::{classes::invert_map, files::read_file};

use super::{DatasetError, Mode};

/// The name of the TLINK dataset
pub static DATASET: &str = "tlink";

/// The label that unknown relation names fall back to
pub static UNK_LABEL: &str = "UNK";

/// A labeled sentence with two marked entities
#[derive(Clone, Debug, Serialize, Deserialize, new)]
pub struct Item {
    /// Unique id of the example, such as "train-42"
    pub guid: String,

    /// Whitespace-separated words of the sentence, entity markers included
    pub words: Vec<String>,

    /// The sentence as written in the source file
    pub text: String,

    /// Index of the relation label
    pub label: usize,
}

/// The ordered relation labels, always including an UNK bucket
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Labels {
    labels: Vec<String>,
    label2id: HashMap<String, usize>,
    unk: usize,
}

impl Labels {
    /// Build the label list, appending UNK when it is missing
    pub fn new(labels: Vec<String>) -> Self {
        let mut labels: Vec<String> = labels
            .into_iter()
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .collect();

        let unk = match labels.iter().position(|label| label == UNK_LABEL) {
            Some(index) => index,
            None => {
                labels.push(UNK_LABEL.to_string());
                labels.len() - 1
            }
        };

        let label2id = invert_map(labels.iter().cloned().enumerate());

        Self {
            labels,
            label2id,
            unk,
        }
    }

    /// Read a label file holding one label per line
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let lines = read_file(path.as_ref()).await?;

        if lines.iter().all(|line| line.trim().is_empty()) {
            return Err(DatasetError::NoLabels(path.as_ref().display().to_string()));
        }

        Ok(Self::new(lines))
    }

    /// The index of a label, or the UNK index for labels never seen before
    pub fn index_of(&self, label: &str) -> usize {
        self.label2id.get(label).copied().unwrap_or(self.unk)
    }

    /// The label name for an index
    pub fn name(&self, id: usize) -> &str {
        self.labels.get(id).map(String::as_str).unwrap_or(UNK_LABEL)
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True if there are no labels, which `new` never produces
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterate over the label names in index order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

/// Struct for the TLINK dataset
pub struct Dataset {
    /// Underlying In-Memory dataset
    dataset: InMemDataset<Item>,

    /// Sentence texts in file order, used when writing predictions
    texts: Vec<String>,
}

/// Implement the Dataset trait for the TLINK dataset
impl dataset::Dataset<Item> for Dataset {
    /// Returns a specific item from the dataset
    fn get(&self, index: usize) -> Option<Item> {
        self.dataset.get(index)
    }

    /// Returns the length of the dataset
    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl Dataset {
    /// Read the `sentence<TAB>label` file for a split
    pub async fn load<P: AsRef<Path>>(
        path: P,
        mode: Mode,
        labels: &Labels,
    ) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        log::info!("LOOKING AT {}", path.display());

        let content = tokio::fs::read_to_string(path).await?;
        let items = parse_examples(&content, &path.display().to_string(), mode, labels)?;

        Ok(Self::from_items(items))
    }

    /// Wrap already parsed items
    pub fn from_items(items: Vec<Item>) -> Self {
        let texts = items.iter().map(|item| item.text.clone()).collect();

        Self {
            dataset: InMemDataset::new(items),
            texts,
        }
    }

    /// The sentence texts, in dataset order
    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    /// Consume the dataset, returning its items in order
    pub fn into_items(self) -> Vec<Item> {
        use burn::data::dataset::Dataset as _;

        self.dataset.iter().collect()
    }
}

/// Parse tab-separated examples, assigning guids of the form "{mode}-{index}"
pub fn parse_examples(
    content: &str,
    source: &str,
    mode: Mode,
    labels: &Labels,
) -> Result<Vec<Item>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut items = Vec::new();

    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        if record.len() != 2 {
            return Err(DatasetError::Malformed {
                path: source.to_string(),
                line,
            });
        }

        let text = record[0].trim().to_string();
        let label = labels.index_of(record[1].trim());
        let words = text.split_whitespace().map(str::to_string).collect();

        if i % 10_000 == 0 {
            log::info!("{}\t{}", text, record[1].trim());
        }

        items.push(Item::new(format!("{}-{}", mode, i), words, text, label));
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use burn::data::dataset::Dataset as _;
    use pretty_assertions::assert_eq;

    use super::*;

    fn labels() -> Labels {
        Labels::new(vec!["AFTER".into(), "BEFORE".into(), "OVERLAP".into()])
    }

    #[test]
    fn test_labels_append_unk() {
        let labels = labels();

        assert_eq!(labels.len(), 4);
        assert_eq!(labels.index_of(UNK_LABEL), 3);
        assert_eq!(labels.name(3), UNK_LABEL);
        assert_eq!(labels.index_of("BEFORE"), 1);
        assert_eq!(labels.index_of("SIMULTANEOUS"), 3);
    }

    #[test]
    fn test_labels_keep_existing_unk() {
        let labels = Labels::new(vec![
            "AFTER".into(),
            "UNK".into(),
            "".into(),
            " BEFORE ".into(),
        ]);

        assert_eq!(labels.iter().collect::<Vec<_>>(), vec!["AFTER", "UNK", "BEFORE"]);
        assert_eq!(labels.index_of("SIMULTANEOUS"), 1);
        assert_eq!(labels.index_of("BEFORE"), 2);
    }

    #[test]
    fn test_parse_examples() {
        let content = "[B1] 어제 [E1] 회의가 [B2] 열렸다 [E2]\tBEFORE \n\
                       [B2] 오늘 [E2] [B1] 발표 [E1] 했다\tMYSTERY\n";

        let items = parse_examples(content, "train.tsv", Mode::Train, &labels()).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].guid, "train-0");
        assert_eq!(items[0].label, 1);
        assert_eq!(items[0].words.len(), 7);
        assert_eq!(items[0].words[0], "[B1]");
        assert_eq!(items[1].guid, "train-1");
        assert_eq!(items[1].label, 3, "unknown labels go to UNK");
        assert_eq!(items[1].text, "[B2] 오늘 [E2] [B1] 발표 [E1] 했다");
    }

    #[test]
    fn test_parse_examples_rejects_missing_label() {
        let content = "[B1] 어제 [E1] [B2] 열렸다 [E2]\tAFTER\nno label here\n";

        let err = parse_examples(content, "dev.tsv", Mode::Dev, &labels()).unwrap_err();

        assert!(matches!(err, DatasetError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_dataset_exposes_texts() {
        let content = "[B1] a [E1] [B2] b [E2]\tAFTER\n[B1] c [E1] [B2] d [E2]\tOVERLAP\n";
        let items = parse_examples(content, "test.tsv", Mode::Test, &labels()).unwrap();

        let dataset = Dataset::from_items(items);

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.texts()[1], "[B1] c [E1] [B2] d [E2]");
        assert_eq!(dataset.get(0).unwrap().guid, "test-0");
    }
}
