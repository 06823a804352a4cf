/// Token dictionary over k-mers
pub mod vocab;

/// Splitting raw sequences into k-mers
pub mod kmers;

/// Encoding raw sequences into fixed-length token and segment ids
pub mod encoder;

pub use encoder::{split_batch, Encoded, Encoder, EncoderConfig};
pub use kmers::seq2kmers;
pub use vocab::{TokenDict, VocabError};

/// The nucleotide alphabet used to enumerate the k-mer vocabulary
pub static ALPHABET: &str = "ACGT";
