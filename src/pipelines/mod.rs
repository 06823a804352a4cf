/// Taxonomic Classification
pub mod taxonomic_classification;
