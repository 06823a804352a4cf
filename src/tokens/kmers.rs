/// Symbol used to pad incomplete k-mers
pub const PAD_SYMBOL: char = 'N';

/// Split a sequence into upper-cased k-mers of `k` symbols, taking a window every `stride` symbols.
///
/// With `pad`, a sequence shorter than `k` becomes a single `N`-padded k-mer, and a trailing
/// remainder that does not fill a whole k-mer is padded and kept so no symbol is lost.
pub fn seq2kmers(seq: &str, k: usize, stride: usize, pad: bool) -> Vec<String> {
    if k == 0 {
        return Vec::new();
    }

    let symbols: Vec<char> = seq.chars().map(|c| c.to_ascii_uppercase()).collect();
    let stride = stride.max(1);

    if symbols.len() < k {
        return if pad {
            vec![pad_kmer(&symbols, k)]
        } else {
            Vec::new()
        };
    }

    let mut kmers = Vec::with_capacity(symbols.len() / stride + 1);
    let mut last = 0;

    for start in (0..=symbols.len() - k).step_by(stride) {
        kmers.push(symbols[start..start + k].iter().collect());
        last = start;
    }

    let tail = &symbols[last + k..];
    if pad && tail.len() % k != 0 {
        kmers.push(pad_kmer(tail, k));
    }

    kmers
}

fn pad_kmer(symbols: &[char], k: usize) -> String {
    symbols
        .iter()
        .copied()
        .chain(std::iter::repeat(PAD_SYMBOL))
        .take(k.max(symbols.len()))
        .collect()
}
