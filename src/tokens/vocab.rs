use std::collections::HashMap;

/// Padding token
pub static TOKEN_PAD: &str = "";

/// Unknown token
pub static TOKEN_UNK: &str = "[UNK]";

/// Classification token, prepended to every encoded sequence
pub static TOKEN_CLS: &str = "[CLS]";

/// Separator token
pub static TOKEN_SEP: &str = "[SEP]";

/// Mask token
pub static TOKEN_MASK: &str = "[MASK]";

/// The base special tokens, in id order
pub static BASE_TOKENS: [&str; 5] = [TOKEN_PAD, TOKEN_UNK, TOKEN_CLS, TOKEN_SEP, TOKEN_MASK];

/// The name BERT vocabularies usually give the padding token
static BERT_PAD: &str = "[PAD]";

/// Vocabulary Error
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum VocabError {
    /// The pretrained vocabulary has fewer tokens than the dictionary
    #[error("the pretrained vocabulary holds {found} tokens, but {expected} are needed")]
    TooSmall {
        /// Tokens in the dictionary
        expected: usize,
        /// Tokens in the pretrained vocabulary
        found: usize,
    },

    /// A token sits at a different id in the pretrained vocabulary
    #[error("token {id} is {found:?} in the pretrained vocabulary, but {expected:?} here")]
    Mismatch {
        /// The token id
        id: usize,
        /// The dictionary's token
        expected: String,
        /// The pretrained vocabulary's token
        found: String,
    },
}

/// A bidirectional mapping between tokens and their ids.
///
/// The special tokens always occupy ids `0..5`, followed by every k-mer over the alphabet in
/// cartesian-product order (the first alphabet symbol varies slowest).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenDict {
    token2id: HashMap<String, usize>,
    id2token: Vec<String>,
}

impl TokenDict {
    /// Build the dictionary of all `k`-length words over `alphabet`
    pub fn new(alphabet: &str, k: usize) -> Self {
        let mut dict = Self::base();

        let symbols: Vec<char> = alphabet.chars().collect();
        for word in product(&symbols, k) {
            dict.insert(word);
        }

        dict
    }

    /// A dictionary with only the special tokens
    pub fn base() -> Self {
        let mut dict = Self {
            token2id: HashMap::new(),
            id2token: Vec::new(),
        };

        for token in BASE_TOKENS {
            dict.insert(token.to_string());
        }

        dict
    }

    fn insert(&mut self, token: String) {
        if self.token2id.contains_key(&token) {
            return;
        }

        self.token2id.insert(token.clone(), self.id2token.len());
        self.id2token.push(token);
    }

    /// Look up the id of a token
    pub fn get(&self, token: &str) -> Option<usize> {
        self.token2id.get(token).copied()
    }

    /// Look up a token, falling back to the `[UNK]` id
    pub fn id_or_unk(&self, token: &str) -> usize {
        self.get(token).unwrap_or_else(|| self.unk_id())
    }

    /// Look up the token for an id
    pub fn token(&self, id: usize) -> Option<&str> {
        self.id2token.get(id).map(String::as_str)
    }

    /// Total number of tokens, special tokens included
    pub fn len(&self) -> usize {
        self.id2token.len()
    }

    /// Whether the dictionary is empty (never true for a constructed dictionary)
    pub fn is_empty(&self) -> bool {
        self.id2token.is_empty()
    }

    /// Check that a pretrained vocabulary (one token per line, in id order) assigns every token
    /// of this dictionary the same id. The padding token may be spelled `[PAD]`, and tokens past
    /// the end of this dictionary are ignored.
    pub fn check_vocab<S: AsRef<str>>(&self, vocab: &[S]) -> Result<(), VocabError> {
        if vocab.len() < self.len() {
            return Err(VocabError::TooSmall {
                expected: self.len(),
                found: vocab.len(),
            });
        }

        for (id, (expected, found)) in self.id2token.iter().zip(vocab).enumerate() {
            let found = found.as_ref().trim();

            if id == self.pad_id() && found == BERT_PAD {
                continue;
            }

            if expected != found {
                return Err(VocabError::Mismatch {
                    id,
                    expected: expected.clone(),
                    found: found.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Id of the padding token
    pub fn pad_id(&self) -> usize {
        0
    }

    /// Id of the `[UNK]` token
    pub fn unk_id(&self) -> usize {
        1
    }

    /// Id of the `[CLS]` token
    pub fn cls_id(&self) -> usize {
        2
    }
}

/// All words of length `k` over `symbols`, first symbol varying slowest
fn product(symbols: &[char], k: usize) -> Vec<String> {
    let mut words = vec![String::new()];

    for _ in 0..k {
        words = words
            .iter()
            .flat_map(|prefix| {
                symbols.iter().map(move |symbol| {
                    let mut word = prefix.clone();
                    word.push(*symbol);
                    word
                })
            })
            .collect();
    }

    words
}
