/// Model Variants
/// --------------

/// klue/bert-base, a Korean BERT
pub static KLUE_BERT_BASE: &str = "klue/bert-base";

/// klue/roberta-base, a Korean RoBERTa
pub static KLUE_ROBERTA_BASE: &str = "klue/roberta-base";

/// bert-base-multilingual-cased
pub static MULTILINGUAL_CASED: &str = "bert-base-multilingual-cased";

/// All available BERT models
pub static ALL_MODELS: &[&str; 3] = &[KLUE_BERT_BASE, KLUE_ROBERTA_BASE, MULTILINGUAL_CASED];

/// Relation Classification
/// -----------------------

/// The default model to use
pub static DEFAULT_RELATION_CLASSIFICATION_MODEL: &str = KLUE_BERT_BASE;
