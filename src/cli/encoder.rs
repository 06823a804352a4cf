use crate::tokens::EncoderConfig;

/// Encoder settings given on the command line, each replacing the configured value when set
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EncoderOverrides {
    /// K-mer length
    pub k: Option<usize>,

    /// Distance between the starts of consecutive k-mers
    pub stride: Option<usize>,

    /// Number of tokens taken from each sequence
    pub seq_length: Option<usize>,

    /// Width of the encoded arrays
    pub max_length: Option<usize>,

    /// Token counts to sample from while training
    pub seq_len_like: Option<Vec<usize>>,
}

impl EncoderOverrides {
    /// Apply the overrides on top of an encoder config
    pub fn apply(self, mut encoder: EncoderConfig) -> EncoderConfig {
        if let Some(k) = self.k {
            encoder.k = k;
        }

        if let Some(stride) = self.stride {
            encoder.stride = stride;
        }

        if let Some(seq_length) = self.seq_length {
            encoder.seq_length = seq_length;
        }

        if self.max_length.is_some() {
            encoder.max_length = self.max_length;
        }

        if self.seq_len_like.is_some() {
            encoder.seq_len_like = self.seq_len_like;
        }

        encoder
    }
}

/// Parse a comma-separated list of token counts
pub fn parse_lengths(value: &str) -> Result<Vec<usize>, EncoderArgsError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|length| !length.is_empty())
        .map(|length| {
            length
                .parse()
                .map_err(|_| EncoderArgsError::InvalidLength(length.to_string()))
        })
        .collect()
}

/// Encoder Arguments Error
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum EncoderArgsError {
    /// A token count that is not a non-negative integer
    #[error("invalid sequence length {0}")]
    InvalidLength(String),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_lengths() {
        assert_eq!(parse_lengths("100, 250,512"), Ok(vec![100, 250, 512]));
        assert_eq!(parse_lengths(""), Ok(vec![]));
        assert_eq!(
            parse_lengths("100,long"),
            Err(EncoderArgsError::InvalidLength("long".to_string()))
        );
    }

    #[test]
    fn test_overrides_replace_only_what_is_set() {
        let encoder = EncoderOverrides {
            k: Some(6),
            seq_len_like: Some(vec![64, 128]),
            ..Default::default()
        }
        .apply(EncoderConfig::new().with_max_length(Some(300)));

        assert_eq!(encoder.k, 6);
        assert_eq!(encoder.stride, 3);
        assert_eq!(encoder.seq_length, 250);
        assert_eq!(encoder.max_length, Some(300));
        assert_eq!(encoder.seq_len_like, Some(vec![64, 128]));
    }

    #[test]
    fn test_no_overrides() {
        let encoder = EncoderOverrides::default().apply(EncoderConfig::new());

        assert_eq!(encoder.k, 3);
        assert_eq!(encoder.max_length, None);
        assert_eq!(encoder.seq_len_like, None);
    }
}
