//! URL-safe slug generation for entity identity.
//!
//! `slugify` is a pure, deterministic canonicalization of a display name.
//! When the plain slug already exists for a label, `slugify_with_context`
//! appends a short SHA-224 digest of the submitted properties, giving a
//! new slug that is still deterministic for identical input.

use sha2::{Digest, Sha224};
use unicode_normalization::UnicodeNormalization;

use crate::types::PropMap;

/// Number of hex digits of the context digest appended on collision.
const DIGEST_LEN: usize = 10;

/// Word separators: whitespace and the punctuation that never survives
/// into a slug.
const SEPARATORS: &[char] = &[
    '\t', ' ', '!', '"', '#', '$', '%', '&', '\'', '(', ')', '*', '-', '/', '<', '=', '>', '?',
    '@', '[', '\\', ']', '^', '_', '`', '{', '|', '}', ',', '.',
];

/// Canonicalize a display name into a lowercase hyphenated slug.
///
/// Unicode is compatibility-decomposed (NFKD) first, so accented letters
/// fold to their ASCII base where one exists; anything left outside
/// printable ASCII is dropped.
pub fn slugify(text: &str) -> String {
    let ascii: String = text
        .nfkd()
        .filter(|c| *c == '\t' || (' '..='~').contains(c))
        .collect();

    ascii
        .to_lowercase()
        .split(|c: char| SEPARATORS.contains(&c))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Slug with a collision-breaking suffix derived from the submitted
/// property map.
///
/// The suffix is the first [`DIGEST_LEN`] hex chars of SHA-224 over the
/// context's sorted `key=value` items. Two creations with identical
/// context still collide; supplying distinguishing context is the
/// caller's contract.
pub fn slugify_with_context(text: &str, context: &PropMap) -> String {
    let mut items: Vec<(String, String)> = context
        .iter()
        .map(|(k, v)| (k.clone(), v.to_string()))
        .collect();
    items.sort();

    let mut hasher = Sha224::new();
    for (key, value) in &items {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hex::encode(hasher.finalize());

    format!("{}-{}", slugify(text), &digest[..DIGEST_LEN])
}
