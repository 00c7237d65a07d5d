/// BERT for Relation Classification (such as TLINK between two marked entities)
pub mod relation_classification;
