use std::fmt::Display;

use crate::taxonomy::{Rank, DEFAULT_RANKS};

/// The unique string token that identifies the single-rank pipeline
pub static SINGLE: &str = "single";

/// The unique string token that identifies the hierarchical pipeline
pub static MULTI_TAX: &str = "multi-tax";

/// Available Pipelines
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Pipeline {
    /// One head predicting a single rank
    Single,

    /// Chained heads predicting several ranks, from the most general to the most specific
    MultiTax,
}

impl Pipeline {
    /// Get the ranks predicted when none are given
    pub fn default_ranks(&self) -> Vec<Rank> {
        match self {
            Pipeline::Single => vec![Rank::Superkingdom],
            Pipeline::MultiTax => DEFAULT_RANKS.to_vec(),
        }
    }

    /// Check that the given ranks suit this pipeline
    pub fn check_ranks(&self, ranks: &[Rank]) -> Result<(), PipelineError> {
        match (self, ranks.len()) {
            (_, 0) => Err(PipelineError::NoRanks),
            (Pipeline::Single, 1) | (Pipeline::MultiTax, _) => Ok(()),
            (Pipeline::Single, n) => Err(PipelineError::TooManyRanks(n)),
        }
    }
}

impl TryFrom<&str> for Pipeline {
    type Error = PipelineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value == SINGLE {
            Ok(Pipeline::Single)
        } else if value == MULTI_TAX {
            Ok(Pipeline::MultiTax)
        } else {
            Err(PipelineError::Unknown(value.to_string()))
        }
    }
}

impl Display for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Pipeline::Single => SINGLE,
            Pipeline::MultiTax => MULTI_TAX,
        };

        write!(f, "{}", name)
    }
}

/// Parse a comma-separated list of rank names
pub fn parse_ranks(value: &str) -> Result<Vec<Rank>, PipelineError> {
    value
        .split(',')
        .filter(|name| !name.trim().is_empty())
        .map(|name| {
            name.parse()
                .map_err(|_| PipelineError::UnknownRank(name.trim().to_string()))
        })
        .collect()
}

/// Pipeline Error
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// No pipeline found for the given string
    #[error("no pipeline found for {0}")]
    Unknown(String),

    /// No rank found for the given string
    #[error("no rank found for {0}")]
    UnknownRank(String),

    /// The pipeline was given no ranks to predict
    #[error("at least one rank is required")]
    NoRanks,

    /// The single-rank pipeline was given several ranks
    #[error("the single pipeline predicts one rank, but {0} were given")]
    TooManyRanks(usize),
}
