use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// NCBI taxdump parsing and lineage lookups
pub mod ncbi;

/// Class counting and inverse-frequency weighting per rank
pub mod weights;

pub use ncbi::Taxonomy;
pub use weights::{ClassWeights, RankWeights};

/// The name given to taxa missing from a lineage and to collapsed low-frequency classes
pub static UNKNOWN: &str = "unknown";

/// The ranks classes and weights are computed for by default
pub static DEFAULT_RANKS: [Rank; 3] = [Rank::Superkingdom, Rank::Kingdom, Rank::Family];

/// Taxonomic ranks
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    /// Superkingdom (e.g. Bacteria)
    Superkingdom,
    /// Kingdom
    Kingdom,
    /// Phylum
    Phylum,
    /// Class
    Class,
    /// Order
    Order,
    /// Family
    Family,
    /// Genus
    Genus,
    /// Species
    Species,
}

impl Rank {
    /// The rank name as it appears in NCBI `nodes.dmp`
    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Superkingdom => "superkingdom",
            Rank::Kingdom => "kingdom",
            Rank::Phylum => "phylum",
            Rank::Class => "class",
            Rank::Order => "order",
            Rank::Family => "family",
            Rank::Genus => "genus",
            Rank::Species => "species",
        }
    }
}

impl Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Rank {
    type Err = TaxonomyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "superkingdom" => Ok(Rank::Superkingdom),
            "kingdom" => Ok(Rank::Kingdom),
            "phylum" => Ok(Rank::Phylum),
            "class" => Ok(Rank::Class),
            "order" => Ok(Rank::Order),
            "family" => Ok(Rank::Family),
            "genus" => Ok(Rank::Genus),
            "species" => Ok(Rank::Species),
            _ => Err(TaxonomyError::UnknownRank(value.to_string())),
        }
    }
}

/// A taxon found at a given rank of a lineage
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Taxon {
    /// The taxon id, if the rank is present in the lineage
    pub taxid: Option<u32>,

    /// The scientific name, or `"unknown"`
    pub name: String,
}

impl Taxon {
    /// The placeholder for a rank missing from a lineage
    pub fn unknown() -> Self {
        Self {
            taxid: None,
            name: UNKNOWN.to_string(),
        }
    }
}

/// Resolves taxids to the taxa at particular ranks of their lineage
pub trait Lineage {
    /// Return one taxon per requested rank, in order, using [`Taxon::unknown`] for ranks that
    /// cannot be resolved
    fn ranks(&self, taxid: u32, ranks: &[Rank]) -> Vec<Taxon>;
}

/// Taxonomy Error
#[derive(thiserror::Error, Debug)]
pub enum TaxonomyError {
    /// The rank name is not recognized
    #[error("no rank found for {0}")]
    UnknownRank(String),

    /// A taxdump line could not be parsed
    #[error("malformed line {line} in {file}: {reason}")]
    Malformed {
        /// The dump file name
        file: String,
        /// 1-based line number
        line: usize,
        /// What was wrong with the line
        reason: String,
    },

    /// Reading a taxdump file failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
