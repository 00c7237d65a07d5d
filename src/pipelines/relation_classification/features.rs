use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::datasets::tlink::Item;

use super::tokenizer::{SpecialTokens, TokenizerError, E1_START, E2_START};

/// Padding segment id
const PAD_SEGMENT_ID: usize = 0;

/// Segment id of the single input sentence, also used for the classifier token
const SEQUENCE_SEGMENT_ID: usize = 0;

/// A single padded model input
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// Token ids, padded to the max sequence length
    pub input_ids: Vec<usize>,

    /// 1 for real tokens, 0 for padding
    pub attention_mask: Vec<usize>,

    /// Segment ids
    pub token_type_ids: Vec<usize>,

    /// Positions of the `[B1]` and `[B2]` markers
    pub entity_starts: [usize; 2],

    /// Index of the relation label
    pub label_id: usize,
}

/// Feature Error
#[derive(thiserror::Error, Debug)]
pub enum FeatureError {
    /// An entity marker is absent, possibly cut off by truncation
    #[error("invalid entity starts in {guid}: {marker} not found within {max_seq_len} tokens")]
    MissingEntityMarker {
        /// The example id
        guid: String,
        /// The marker that was not found
        marker: &'static str,
        /// The sequence length the example was truncated to
        max_seq_len: usize,
    },

    /// A token could not be mapped to an id
    #[error("token {0:?} is not in the vocabulary")]
    UnknownToken(String),

    /// The max sequence length cannot fit the special tokens
    #[error("max_seq_len must be greater than 2, got {0}")]
    SequenceTooShort(usize),

    /// Tokenization failed
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
}

/// Convert examples into padded features with entity marker positions
pub fn convert_examples_to_features(
    examples: &[Item],
    max_seq_len: usize,
    tokenizer: &Tokenizer,
) -> Result<Vec<Feature>, FeatureError> {
    // Account for [CLS] and [SEP]
    let special_tokens_count = 2;
    if max_seq_len <= special_tokens_count {
        return Err(FeatureError::SequenceTooShort(max_seq_len));
    }

    let special = SpecialTokens::detect(tokenizer)?;

    let mut features = Vec::with_capacity(examples.len());

    for (ex_index, example) in examples.iter().enumerate() {
        if ex_index % 5000 == 0 {
            log::info!("Writing example {} of {}", ex_index, examples.len());
        }

        let mut tokens = Vec::new();
        for word in &example.words {
            let encoding = tokenizer
                .encode(word.as_str(), false)
                .map_err(|e| TokenizerError::Encode {
                    word: word.clone(),
                    reason: e.to_string(),
                })?;

            let word_tokens = encoding.get_tokens();
            if word_tokens.is_empty() {
                // Badly encoded words still take up a position
                tokens.push(special.unk.clone());
            } else {
                tokens.extend(word_tokens.iter().cloned());
            }
        }

        tokens.truncate(max_seq_len - special_tokens_count);

        tokens.push(special.sep.clone());
        tokens.insert(0, special.cls.clone());

        let entity_starts = find_entity_starts(&tokens, &example.guid, max_seq_len)?;

        let mut input_ids = tokens
            .iter()
            .map(|token| {
                tokenizer
                    .token_to_id(token)
                    .map(|id| id as usize)
                    .ok_or_else(|| FeatureError::UnknownToken(token.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut token_type_ids = vec![SEQUENCE_SEGMENT_ID; input_ids.len()];
        let mut attention_mask = vec![1; input_ids.len()];

        // Zero-pad up to the sequence length.
        let padding_length = max_seq_len - input_ids.len();
        input_ids.extend(std::iter::repeat(special.pad_id).take(padding_length));
        attention_mask.extend(std::iter::repeat(0).take(padding_length));
        token_type_ids.extend(std::iter::repeat(PAD_SEGMENT_ID).take(padding_length));

        if ex_index < 5 {
            log::info!("*** Example ***");
            log::info!("guid: {}", example.guid);
            log::info!("tokens: {}", tokens.join(" "));
            log::info!("input_ids: {}", join(&input_ids));
            log::info!("attention_mask: {}", join(&attention_mask));
            log::info!("token_type_ids: {}", join(&token_type_ids));
            log::info!("entity_starts: {:?}", entity_starts);
            log::info!("label: {}", example.label);
        }

        features.push(Feature {
            input_ids,
            attention_mask,
            token_type_ids,
            entity_starts,
            label_id: example.label,
        });
    }

    Ok(features)
}

/// Positions of the entity start markers; the last occurrence of each wins
fn find_entity_starts(
    tokens: &[String],
    guid: &str,
    max_seq_len: usize,
) -> Result<[usize; 2], FeatureError> {
    let mut e1 = None;
    let mut e2 = None;

    for (i, token) in tokens.iter().enumerate() {
        match token.as_str() {
            E1_START => e1 = Some(i),
            E2_START => e2 = Some(i),
            _ => {}
        }
    }

    let missing = |marker| FeatureError::MissingEntityMarker {
        guid: guid.to_string(),
        marker,
        max_seq_len,
    };

    Ok([e1.ok_or_else(|| missing(E1_START))?, e2.ok_or_else(|| missing(E2_START))?])
}

fn join(values: &[usize]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
