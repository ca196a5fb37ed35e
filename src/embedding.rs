//! Model-free text embeddings via feature hashing.
//!
//! [`HashEmbedder`] turns text into a fixed-dimension vector without any
//! trained model: tokens and n-grams are hashed into buckets with signed
//! weights (the classic hashing trick), a few corpus-independent statistics
//! fill the tail positions, and the result is L2-normalized. Identical input
//! produces bit-identical output across runs and platforms — the digest is
//! SHA-256, never a runtime-seeded hash.
//!
//! Also provides the vector utilities used by the store and index:
//! - [`cosine_similarity`] — similarity between two embedding vectors
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes for SQLite
//! - [`blob_to_vec`] — decode a SQLite BLOB back into a `Vec<f32>`

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Longest word n-gram emitted (2..=N token sequences).
const WORD_NGRAM_MAX: usize = 3;

/// Feature weights: single tokens carry the base signal, multi-word n-grams
/// are boosted, character bigrams are damped (they are numerous and noisy).
const TOKEN_WEIGHT: f32 = 1.0;
const PHRASE_WEIGHT: f32 = 1.5;
const CHAR_NGRAM_WEIGHT: f32 = 0.5;

static STOPWORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();

fn stopwords() -> &'static HashSet<&'static str> {
    STOPWORDS.get_or_init(|| {
        [
            // English function words
            "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "had", "has",
            "have", "he", "her", "his", "i", "if", "in", "is", "it", "its", "my", "no", "not",
            "of", "on", "or", "our", "she", "so", "that", "the", "their", "them", "they", "this",
            "to", "was", "we", "were", "will", "with", "you", "your",
            // CJK function words (single-character tokens after wide-script splitting)
            "的", "了", "是", "在", "和", "与", "或", "之", "也", "都", "而", "及",
            "の", "は", "が", "を", "に", "で", "と", "も", "な",
        ]
        .into_iter()
        .collect()
    })
}

/// True for characters that become their own single-character token:
/// CJK ideographs, kana, and Hangul syllables. Mixed-script text stays
/// searchable without a word segmentation model.
fn is_wide_script(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30FF}'   // hiragana + katakana
        | '\u{3400}'..='\u{4DBF}' // CJK extension A
        | '\u{4E00}'..='\u{9FFF}' // CJK unified ideographs
        | '\u{AC00}'..='\u{D7AF}' // Hangul syllables
        | '\u{F900}'..='\u{FAFF}' // CJK compatibility ideographs
        | '\u{20000}'..='\u{2A6DF}' // CJK extension B
    )
}

/// Punctuation treated as a token separator during preprocessing.
fn is_separator_punct(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(c,
            '\u{2000}'..='\u{206F}'   // general punctuation
            | '\u{3000}'..='\u{303F}' // CJK symbols and punctuation
            | '\u{FF01}'..='\u{FF0F}' // fullwidth punctuation blocks
            | '\u{FF1A}'..='\u{FF20}'
            | '\u{FF3B}'..='\u{FF40}'
            | '\u{FF5B}'..='\u{FF65}')
}

/// Deterministic hash-feature embedder with a fixed output dimension.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Embed `text` into a vector of `dims` floats.
    ///
    /// Empty or all-separator input yields the all-zero vector (which the
    /// similarity layer scores as 0 against everything).
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];

        let prepared = preprocess(text);
        if prepared.is_empty() {
            return vector;
        }

        let tokens = tokenize(&prepared);

        // 1-grams
        for token in &tokens {
            self.accumulate(&mut vector, token, TOKEN_WEIGHT);
        }

        // Word n-grams, 2..=WORD_NGRAM_MAX consecutive tokens
        for n in 2..=WORD_NGRAM_MAX {
            for window in tokens.windows(n) {
                self.accumulate(&mut vector, &window.join(" "), PHRASE_WEIGHT);
            }
        }

        // Character bigrams within each token
        for token in &tokens {
            let chars: Vec<char> = token.chars().collect();
            if chars.len() < 2 {
                continue;
            }
            let mut gram = String::with_capacity(8);
            for pair in chars.windows(2) {
                gram.clear();
                gram.push(pair[0]);
                gram.push(pair[1]);
                self.accumulate(&mut vector, &gram, CHAR_NGRAM_WEIGHT);
            }
        }

        // Statistical tail features, computed over the preprocessed text
        if self.dims > 3 {
            let chars: Vec<char> = prepared.chars().collect();
            let total = chars.len();
            if total > 0 {
                let wide = chars.iter().filter(|c| is_wide_script(**c)).count();
                let digits = chars.iter().filter(|c| c.is_ascii_digit()).count();
                vector[self.dims - 3] = (total as f32 / 1000.0).min(1.0);
                vector[self.dims - 2] = wide as f32 / total as f32;
                vector[self.dims - 1] = digits as f32 / total as f32;
            }
        }

        l2_normalize(&mut vector);
        vector
    }

    /// Hashing trick: bucket from the digest's low 31 bits, sign from bit 31.
    /// Collisions accumulate (and may cancel); that is the intended behavior.
    fn accumulate(&self, vector: &mut [f32], gram: &str, weight: f32) {
        let digest = Sha256::digest(gram.as_bytes());
        let h = i32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
        let bucket = ((h & 0x7FFF_FFFF) as usize) % self.dims;
        let sign = if h >= 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

/// Lowercase, collapse punctuation/whitespace runs into a single space, trim.
fn preprocess(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() || is_separator_punct(c) {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        for lc in c.to_lowercase() {
            out.push(lc);
        }
    }
    out
}

/// Split preprocessed text into tokens: spaces separate, wide-script
/// characters stand alone, stop-words and blanks are dropped.
fn tokenize(prepared: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    let mut flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.is_empty() {
            if !stopwords().contains(current.as_str()) {
                tokens.push(std::mem::take(current));
            } else {
                current.clear();
            }
        }
    };

    for c in prepared.chars() {
        if c == ' ' {
            flush(&mut current, &mut tokens);
        } else if is_wide_script(c) {
            flush(&mut current, &mut tokens);
            let single = c.to_string();
            if !stopwords().contains(single.as_str()) {
                tokens.push(single);
            }
        } else {
            current.push(c);
        }
    }
    flush(&mut current, &mut tokens);

    tokens
}

fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or when
/// either norm is zero — a saturating default, never an error.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
