use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Biological entities attached to every indexed point under `normalized_bridge`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedBridge {
	pub genes: Vec<String>,
	pub diseases: Vec<String>,
	pub processes: Vec<String>,
	pub pathways: Vec<String>,
	pub keywords: Vec<String>,
}
impl NormalizedBridge {
	/// Canonical genes ∪ diseases ∪ pathways, the set used for overlap scoring.
	pub fn entity_set(&self) -> BTreeSet<String> {
		canonical_set(self.genes.iter().chain(&self.diseases).chain(&self.pathways))
	}

	pub fn gene_set(&self) -> BTreeSet<String> {
		canonical_set(&self.genes)
	}

	pub fn disease_set(&self) -> BTreeSet<String> {
		canonical_set(&self.diseases)
	}
}

/// Entity filters produced by the bridge step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityFilters {
	pub genes: Vec<String>,
	pub diseases: Vec<String>,
	pub pathways: Vec<String>,
}
impl EntityFilters {
	pub fn is_empty(&self) -> bool {
		self.genes.is_empty() && self.diseases.is_empty() && self.pathways.is_empty()
	}

	pub fn entity_set(&self) -> BTreeSet<String> {
		canonical_set(self.genes.iter().chain(&self.diseases).chain(&self.pathways))
	}
}

/// NFKC, trimmed, whitespace-collapsed, lowercase.
pub fn canonical_entity(raw: &str) -> String {
	let normalized: String = raw.nfkc().collect();

	normalized.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

pub fn canonical_set<'a, I>(items: I) -> BTreeSet<String>
where
	I: IntoIterator<Item = &'a String>,
{
	items.into_iter().map(|item| canonical_entity(item)).filter(|item| !item.is_empty()).collect()
}

/// Jaccard similarity. Two empty sets score zero.
pub fn jaccard(lhs: &BTreeSet<String>, rhs: &BTreeSet<String>) -> f32 {
	if lhs.is_empty() && rhs.is_empty() {
		return 0.0;
	}

	let shared = lhs.intersection(rhs).count();
	let union = lhs.len() + rhs.len() - shared;

	shared as f32 / union as f32
}

/// Keeps the first occurrence of each canonical form, preserving original spelling.
pub fn dedup_entities<I>(items: I, limit: usize) -> Vec<String>
where
	I: IntoIterator<Item = String>,
{
	let mut seen = BTreeSet::new();
	let mut out = Vec::new();

	for item in items {
		let trimmed = item.trim();

		if trimmed.is_empty() || !seen.insert(canonical_entity(trimmed)) {
			continue;
		}

		out.push(trimmed.to_string());

		if out.len() == limit {
			break;
		}
	}

	out
}
