use std::path::Path;

use tokenizers::{AddedToken, Tokenizer};

/// The tokens delimiting the first entity
pub const E1_START: &str = "[B1]";
/// End of the first entity
pub const E1_END: &str = "[E1]";
/// The tokens delimiting the second entity
pub const E2_START: &str = "[B2]";
/// End of the second entity
pub const E2_END: &str = "[E2]";

/// All entity markers, in the order they are added to the vocabulary
pub const ENTITY_MARKERS: [&str; 4] = [E1_START, E1_END, E2_START, E2_END];

/// The special tokens used when building model inputs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecialTokens {
    /// Classifier token prepended to every sequence
    pub cls: String,

    /// Separator token appended to every sequence
    pub sep: String,

    /// Stand-in for words the tokenizer cannot encode
    pub unk: String,

    /// Padding token
    pub pad: String,

    /// Id of the padding token
    pub pad_id: usize,
}

impl SpecialTokens {
    /// Find the special tokens in the tokenizer vocabulary, BERT style first, then RoBERTa style
    pub fn detect(tokenizer: &Tokenizer) -> Result<Self, TokenizerError> {
        let candidates = [["[CLS]", "[SEP]", "[UNK]", "[PAD]"], ["<s>", "</s>", "<unk>", "<pad>"]];

        for [cls, sep, unk, pad] in candidates {
            let found = [cls, sep, unk]
                .iter()
                .all(|token| tokenizer.token_to_id(token).is_some());

            if let (true, Some(pad_id)) = (found, tokenizer.token_to_id(pad)) {
                return Ok(Self {
                    cls: cls.to_string(),
                    sep: sep.to_string(),
                    unk: unk.to_string(),
                    pad: pad.to_string(),
                    pad_id: pad_id as usize,
                });
            }
        }

        Err(TokenizerError::MissingSpecialTokens)
    }
}

/// Load a tokenizer definition and register the entity markers
pub fn load_tokenizer<P: AsRef<Path>>(path: P) -> Result<Tokenizer, TokenizerError> {
    let mut tokenizer = Tokenizer::from_file(path.as_ref()).map_err(|e| TokenizerError::Load {
        path: path.as_ref().display().to_string(),
        reason: e.to_string(),
    })?;

    // Words are encoded one at a time, so padding or truncation would corrupt them
    tokenizer.with_padding(None);
    tokenizer
        .with_truncation(None)
        .map_err(|e| TokenizerError::Load {
            path: path.as_ref().display().to_string(),
            reason: e.to_string(),
        })?;

    add_entity_markers(&mut tokenizer);

    Ok(tokenizer)
}

/// Register the entity markers as special tokens, returning how many were new
pub fn add_entity_markers(tokenizer: &mut Tokenizer) -> usize {
    let markers: Vec<AddedToken> = ENTITY_MARKERS
        .iter()
        .map(|marker| AddedToken::from(marker.to_string(), true))
        .collect();

    tokenizer.add_special_tokens(&markers)
}

/// Tokenizer Error
#[derive(thiserror::Error, Debug)]
pub enum TokenizerError {
    /// The tokenizer file could not be read
    #[error("unable to load tokenizer from {path}: {reason}")]
    Load {
        /// Path to the tokenizer file
        path: String,
        /// Description of the failure
        reason: String,
    },

    /// Neither BERT nor RoBERTa special tokens are in the vocabulary
    #[error("the tokenizer has no [CLS]/[SEP]/[UNK]/[PAD] or <s>/</s>/<unk>/<pad> tokens")]
    MissingSpecialTokens,

    /// Encoding a word failed
    #[error("unable to encode {word:?}: {reason}")]
    Encode {
        /// The word being encoded
        word: String,
        /// Description of the failure
        reason: String,
    },
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use tokenizers::{
        models::wordpiece::WordPiece, PaddingParams, PaddingStrategy, TruncationParams,
    };

    use super::*;

    /// A tiny WordPiece tokenizer with entity markers, for tests
    pub(crate) fn test_tokenizer() -> Tokenizer {
        let vocab = [
            "[PAD]", "[UNK]", "[CLS]", "[SEP]", "어제", "회의", "##가", "열렸다", "오늘", "발표",
            "했다", "a", "b", "c",
        ];

        let vocab: HashMap<String, u32> = vocab
            .iter()
            .enumerate()
            .map(|(i, token)| (token.to_string(), i as u32))
            .collect();

        let model = WordPiece::builder()
            .vocab(vocab)
            .unk_token("[UNK]".to_string())
            .build()
            .expect("valid wordpiece vocabulary");

        let mut tokenizer = Tokenizer::new(model);
        add_entity_markers(&mut tokenizer);

        tokenizer
    }

    #[test]
    fn test_entity_markers_extend_vocabulary() {
        let tokenizer = test_tokenizer();

        assert_eq!(tokenizer.get_vocab_size(false), 14);
        assert_eq!(tokenizer.get_vocab_size(true), 18);
        assert_eq!(tokenizer.token_to_id(E1_START), Some(14));
        assert_eq!(tokenizer.token_to_id(E2_END), Some(17));
    }

    #[test]
    fn test_markers_are_not_split() {
        let tokenizer = test_tokenizer();
        let encoding = tokenizer.encode("[B2]", false).unwrap();

        assert_eq!(encoding.get_tokens(), &["[B2]".to_string()]);
    }

    #[test]
    fn test_load_tokenizer_drops_padding_and_truncation() {
        let path = std::env::temp_dir().join("burn-tlink-padded-tokenizer.json");

        let mut padded = test_tokenizer();
        padded.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(8),
            ..Default::default()
        }));
        padded
            .with_truncation(Some(TruncationParams {
                max_length: 4,
                ..Default::default()
            }))
            .unwrap();
        padded.save(&path, false).unwrap();

        let tokenizer = load_tokenizer(&path).unwrap();
        let encoding = tokenizer.encode("회의가", false).unwrap();

        assert_eq!(encoding.get_tokens(), &["회의".to_string(), "##가".to_string()]);
        assert_eq!(tokenizer.token_to_id(E2_START), Some(16));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_detect_bert_special_tokens() {
        let tokens = SpecialTokens::detect(&test_tokenizer()).unwrap();

        assert_eq!(tokens.cls, "[CLS]");
        assert_eq!(tokens.sep, "[SEP]");
        assert_eq!(tokens.unk, "[UNK]");
        assert_eq!(tokens.pad_id, 0);
    }
}
