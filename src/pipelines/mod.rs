/// Relation Classification between two marked entities (TLINK)
pub mod relation_classification;
