//! Local lexical weighting for sparse slots.
//!
//! Terms are lowercased Unicode words with stopwords removed. Each term maps to a stable `u32`
//! index (first four bytes of its blake3 hash) and a saturated term-frequency weight. The store
//! applies IDF at query time, so only TF lives here.

use std::collections::BTreeMap;

use unicode_segmentation::UnicodeSegmentation;

const K1: f32 = 1.2;
const STOPWORDS: &[&str] = &[
	"a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
	"between", "both", "but", "by", "can", "do", "does", "for", "from", "has", "have", "how",
	"in", "into", "is", "it", "its", "may", "more", "no", "not", "of", "on", "or", "other",
	"our", "such", "than", "that", "the", "their", "them", "then", "there", "these", "they",
	"this", "those", "to", "via", "was", "we", "were", "what", "when", "where", "which",
	"while", "who", "with", "within",
];

/// Sparse vector entries sorted by index.
pub fn encode(text: &str) -> Vec<(u32, f32)> {
	let mut by_index: BTreeMap<u32, f32> = BTreeMap::new();

	for (term, weight) in term_weights(text) {
		*by_index.entry(term_index(&term)).or_insert(0.0) += weight;
	}

	by_index.into_iter().collect()
}

/// Weighted terms sorted by descending weight, then alphabetically.
pub fn term_weights(text: &str) -> Vec<(String, f32)> {
	let mut counts: BTreeMap<String, u32> = BTreeMap::new();

	for word in text.unicode_words() {
		let term = word.to_lowercase();

		if term.chars().count() < 2 || STOPWORDS.contains(&term.as_str()) {
			continue;
		}
		if term.chars().all(|ch| ch.is_ascii_digit()) {
			continue;
		}

		*counts.entry(term).or_insert(0) += 1;
	}

	let mut weighted: Vec<(String, f32)> = counts
		.into_iter()
		.map(|(term, tf)| {
			let tf = tf as f32;

			(term, tf * (K1 + 1.0) / (tf + K1))
		})
		.collect();

	weighted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

	weighted
}

pub fn term_index(term: &str) -> u32 {
	let hash = blake3::hash(term.as_bytes());
	let bytes = hash.as_bytes();

	u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
