//! # kmer-bert
//!
//! Taxonomic classification of DNA sequences by fine-tuning a pretrained BERT over k-mer tokens.
#![forbid(unsafe_code)]

/// K-mer tokenization
pub mod tokens;

/// Taxonomy lineages and class weights
pub mod taxonomy;

/// Datasets
pub mod datasets;

/// Models
pub mod models;

/// Pipelines
pub mod pipelines;

/// Evaluation metrics
pub mod metrics;

/// Utilities
pub mod utils;

/// CLI indexes and utilities
pub mod cli;

/// Error macros
#[macro_use]
extern crate anyhow;
