use derive_new::new;
use rand::{seq::SliceRandom, Rng};

use super::{seq2kmers, TokenDict, ALPHABET};

/// Sequence encoding configuration
#[derive(burn::config::Config, Debug)]
pub struct EncoderConfig {
    /// Symbols the k-mer vocabulary is enumerated over
    #[config(default = "ALPHABET.to_string()")]
    pub alphabet: String,

    /// k-mer length
    #[config(default = 3)]
    pub k: usize,

    /// Distance between the starts of consecutive k-mers
    #[config(default = 3)]
    pub stride: usize,

    /// Number of tokens taken from each sequence, `[CLS]` included
    #[config(default = 250)]
    pub seq_length: usize,

    /// Width of the encoded arrays, defaults to `seq_length`
    pub max_length: Option<usize>,

    /// Take the tokens from a random offset into the sequence instead of its start
    #[config(default = true)]
    pub window: bool,

    /// Draw `seq_length` from this distribution of lengths for every sequence
    pub seq_len_like: Option<Vec<usize>>,
}

impl EncoderConfig {
    /// Width of the encoded arrays
    pub fn max_length(&self) -> usize {
        self.max_length.unwrap_or(self.seq_length)
    }

    /// Initialize an encoder with a fresh vocabulary
    pub fn init(&self) -> Encoder {
        Encoder::new(TokenDict::new(&self.alphabet, self.k), self.clone())
    }
}

/// A sequence encoded as parallel token and segment ids
#[derive(Clone, Debug, PartialEq, Eq, new)]
pub struct Encoded {
    /// Token ids, starting with `[CLS]`
    pub indices: Vec<usize>,

    /// Segment ids, all zero for single-segment input
    pub segments: Vec<usize>,
}

/// Converts raw sequences into fixed-width token id arrays for BERT
#[derive(Clone, Debug, new)]
pub struct Encoder {
    /// The k-mer vocabulary
    pub tokens: TokenDict,

    /// Encoding parameters
    pub config: EncoderConfig,
}

impl Encoder {
    /// Encode a raw sequence.
    ///
    /// The random source decides the window offset and, with `seq_len_like`, the number of
    /// tokens taken. Either way the result is exactly `max_length` wide.
    pub fn encode<R: Rng + ?Sized>(&self, seq: &str, rng: &mut R) -> Encoded {
        let max_length = self.config.max_length();

        let mut seq_length = self.config.seq_length;
        if let Some(lengths) = &self.config.seq_len_like {
            if let Some(length) = lengths.choose(rng) {
                seq_length = max_length.min(*length);
            }
        }

        let kmers = seq2kmers(seq, self.config.k, self.config.stride, true);

        let (start, end) = if self.config.window {
            let start = rng.gen_range(0..=kmers.len().saturating_sub(seq_length + 1));

            (start, start + seq_length.saturating_sub(1))
        } else {
            (0, seq_length)
        };

        let mut indices = Vec::with_capacity(max_length.max(1));
        indices.push(self.tokens.cls_id());
        indices.extend(
            kmers
                .iter()
                .skip(start)
                .take(end.saturating_sub(start))
                .map(|kmer| self.tokens.id_or_unk(kmer)),
        );

        indices.resize(max_length, self.tokens.pad_id());

        Encoded {
            indices,
            segments: vec![0; max_length],
        }
    }
}

/// Transpose a batch of encoded sequences into separate token and segment lists
pub fn split_batch(batch: Vec<Encoded>) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
    batch
        .into_iter()
        .map(|encoded| (encoded.indices, encoded.segments))
        .unzip()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn encoder(config: EncoderConfig) -> Encoder {
        config.init()
    }

    #[test]
    fn test_fixed_window_pads() {
        let encoder = encoder(EncoderConfig::new().with_seq_length(6).with_window(false));
        let mut rng = StdRng::seed_from_u64(0);

        let encoded = encoder.encode("AAAAACGGT", &mut rng);

        // [CLS] AAA AAC GGT, then padding
        assert_eq!(encoded.indices, vec![2, 5, 6, 5 + 43, 0, 0]);
        assert_eq!(encoded.segments, vec![0; 6]);
    }

    #[test]
    fn test_fixed_window_truncates() {
        let encoder = encoder(EncoderConfig::new().with_seq_length(3).with_window(false));
        let mut rng = StdRng::seed_from_u64(0);

        let encoded = encoder.encode("AAAAAAAAAAAA", &mut rng);

        // seq_length k-mers plus [CLS] are truncated back to max_length
        assert_eq!(encoded.indices, vec![2, 5, 5]);
    }

    #[test]
    fn test_unknown_kmers() {
        let encoder = encoder(EncoderConfig::new().with_seq_length(4).with_window(false));
        let mut rng = StdRng::seed_from_u64(0);

        let encoded = encoder.encode("ANAAC", &mut rng);

        // ANA is unknown, the tail AC is padded to ACN which is unknown too
        assert_eq!(encoded.indices, vec![2, 1, 1, 0]);
    }

    #[test]
    fn test_random_window_stays_in_bounds() {
        let encoder = encoder(EncoderConfig::new().with_seq_length(4));
        let mut rng = StdRng::seed_from_u64(42);
        let seq = "AAACCCGGGTTTAAACCCGGGTTT";

        for _ in 0..50 {
            let encoded = encoder.encode(seq, &mut rng);

            assert_eq!(encoded.indices.len(), 4);
            assert_eq!(encoded.indices[0], 2);
            // A window holds seq_length - 1 k-mers, so nothing is padded
            assert!(encoded.indices[1..].iter().all(|id| *id >= 5));
        }
    }

    #[test]
    fn test_window_on_short_sequence() {
        let encoder = encoder(EncoderConfig::new().with_seq_length(10));
        let mut rng = StdRng::seed_from_u64(7);

        let encoded = encoder.encode("AAACCC", &mut rng);

        assert_eq!(encoded.indices, vec![2, 5, 5 + 21, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_max_length_wider_than_seq_length() {
        let encoder = encoder(
            EncoderConfig::new()
                .with_seq_length(2)
                .with_max_length(Some(5))
                .with_window(false),
        );
        let mut rng = StdRng::seed_from_u64(0);

        let encoded = encoder.encode("AAAAAAAAA", &mut rng);

        assert_eq!(encoded.indices, vec![2, 5, 5, 0, 0]);
        assert_eq!(encoded.segments.len(), 5);
    }

    #[test]
    fn test_seq_len_like_is_capped_by_max_length() {
        let encoder = encoder(
            EncoderConfig::new()
                .with_seq_length(3)
                .with_max_length(Some(4))
                .with_window(false)
                .with_seq_len_like(Some(vec![100])),
        );
        let mut rng = StdRng::seed_from_u64(0);

        let encoded = encoder.encode("AAAAAAAAAAAAAAA", &mut rng);

        assert_eq!(encoded.indices, vec![2, 5, 5, 5]);
    }

    #[test]
    fn test_split_batch() {
        let batch = vec![
            Encoded::new(vec![2, 5], vec![0, 0]),
            Encoded::new(vec![2, 6], vec![0, 0]),
        ];

        let (indices, segments) = split_batch(batch);

        assert_eq!(indices, vec![vec![2, 5], vec![2, 6]]);
        assert_eq!(segments, vec![vec![0, 0], vec![0, 0]]);
    }
}
