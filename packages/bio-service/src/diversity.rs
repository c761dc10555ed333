use std::{cmp::Ordering, collections::BTreeSet};

use bio_config::Ranking;
use bio_domain::{
	entities::jaccard,
	track::{Alignment, Track},
};

use crate::router::TaggedHit;

#[derive(Clone, Debug, PartialEq)]
pub struct RerankedHit {
	pub tagged: TaggedHit,
	pub relevance: f32,
	pub diversity_score: f32,
	pub novelty_score: f32,
	pub final_score: f32,
}

#[derive(Clone, Copy)]
struct DiversityPick {
	remaining_pos: usize,
	mmr_score: f32,
	max_similarity: f32,
	retrieval_rank: usize,
}
impl DiversityPick {
	fn better_than(self, other: &Self) -> bool {
		self.mmr_score > other.mmr_score
			|| (self.mmr_score == other.mmr_score && self.retrieval_rank < other.retrieval_rank)
	}
}

/// Lambda for the bridge's alignment verdict. Requests without a bridge count as aligned.
pub fn lambda_for(alignment: Option<Alignment>, ranking: &Ranking) -> f32 {
	match alignment.unwrap_or_default() {
		Alignment::Aligned => ranking.mmr_lambda_aligned,
		Alignment::Partial => ranking.mmr_lambda_partial,
		Alignment::Divergent => ranking.mmr_lambda_divergent,
	}
}

/// Greedy MMR over the `pool` most relevant hits of one collection, returning at most `top_k`.
///
/// Relevance is the hit score; redundancy is the highest Jaccard similarity of entity sets
/// (genes, diseases, pathways) against anything already selected. Equal MMR values keep the
/// earlier retrieval rank, so `lambda = 1.0` reproduces relevance order.
pub fn rerank(hits: Vec<TaggedHit>, lambda: f32, pool: usize, top_k: usize) -> Vec<RerankedHit> {
	let mut candidates = hits;

	candidates.sort_by(|a, b| cmp_f32_desc(a.hit.score, b.hit.score));
	candidates.truncate(pool.max(top_k));

	if candidates.is_empty() || top_k == 0 {
		return Vec::new();
	}

	let entity_sets: Vec<BTreeSet<String>> =
		candidates.iter().map(|tagged| tagged.hit.normalized_bridge().entity_set()).collect();
	let mut remaining: Vec<usize> = (0..candidates.len()).collect();
	let mut selected: Vec<usize> = Vec::new();
	let mut picks: Vec<(usize, f32, f32)> = Vec::new();
	let first = remaining.remove(0);

	selected.push(first);
	picks.push((first, 1.0, candidates[first].hit.score));

	while selected.len() < top_k && !remaining.is_empty() {
		let mut best: Option<DiversityPick> = None;

		for (remaining_pos, candidate_idx) in remaining.iter().copied().enumerate() {
			let max_similarity = selected
				.iter()
				.map(|selected_idx| {
					jaccard(&entity_sets[candidate_idx], &entity_sets[*selected_idx])
				})
				.fold(0.0_f32, f32::max);
			let relevance = candidates[candidate_idx].hit.score;
			let pick = DiversityPick {
				remaining_pos,
				mmr_score: lambda * relevance - (1.0 - lambda) * max_similarity,
				max_similarity,
				retrieval_rank: candidate_idx,
			};

			if best.as_ref().map(|current| pick.better_than(current)).unwrap_or(true) {
				best = Some(pick);
			}
		}

		let Some(best) = best else {
			break;
		};
		let picked = remaining.remove(best.remaining_pos);

		selected.push(picked);
		picks.push((picked, 1.0 - best.max_similarity, best.mmr_score));
	}

	reserve_track_slots(&candidates, &entity_sets, lambda, &mut remaining, &mut picks);

	picks
		.into_iter()
		.map(|(idx, diversity_score, final_score)| {
			let relevance = candidates[idx].hit.score;

			RerankedHit {
				tagged: candidates[idx].clone(),
				relevance,
				diversity_score,
				novelty_score: relevance * diversity_score,
				final_score,
			}
		})
		.collect()
}

/// A track present in the pool but crowded off the page takes the last slot held by a track with
/// more than one pick.
fn reserve_track_slots(
	candidates: &[TaggedHit],
	entity_sets: &[BTreeSet<String>],
	lambda: f32,
	remaining: &mut Vec<usize>,
	picks: &mut [(usize, f32, f32)],
) {
	let mut tracks: Vec<Track> = Vec::new();

	for tagged in candidates {
		if !tracks.contains(&tagged.track) {
			tracks.push(tagged.track);
		}
	}

	for track in tracks {
		if picks_on_track(candidates, picks, track) > 0 {
			continue;
		}

		let held: &[(usize, f32, f32)] = picks;
		let Some(slot) = (0..held.len())
			.rev()
			.find(|slot| picks_on_track(candidates, held, candidates[held[*slot].0].track) > 1)
		else {
			continue;
		};
		let Some(remaining_pos) = remaining.iter().position(|idx| candidates[*idx].track == track)
		else {
			continue;
		};
		let idx = remaining.remove(remaining_pos);
		let max_similarity = picks
			.iter()
			.enumerate()
			.filter(|(pos, _)| *pos != slot)
			.map(|(_, (other, _, _))| jaccard(&entity_sets[idx], &entity_sets[*other]))
			.fold(0.0_f32, f32::max);
		let relevance = candidates[idx].hit.score;

		picks[slot] =
			(idx, 1.0 - max_similarity, lambda * relevance - (1.0 - lambda) * max_similarity);
	}
}

fn picks_on_track(candidates: &[TaggedHit], picks: &[(usize, f32, f32)], track: Track) -> usize {
	picks.iter().filter(|(idx, _, _)| candidates[*idx].track == track).count()
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

#[cfg(test)]
mod tests {
	use bio_domain::hit::RawHit;

	use super::*;

	fn tagged(id: &str, score: f32, genes: &[&str]) -> TaggedHit {
		on_track(id, score, genes, Track::Text)
	}

	fn on_track(id: &str, score: f32, genes: &[&str], track: Track) -> TaggedHit {
		TaggedHit {
			hit: RawHit {
				id: id.to_string(),
				score,
				payload: serde_json::json!({ "normalized_bridge": { "genes": genes } })
					.as_object()
					.cloned()
					.unwrap_or_default(),
			},
			track,
		}
	}

	fn ids(reranked: &[RerankedHit]) -> Vec<&str> {
		reranked.iter().map(|entry| entry.tagged.hit.id.as_str()).collect()
	}

	fn hits() -> Vec<TaggedHit> {
		vec![
			tagged("a", 0.9, &["TP53", "MDM2"]),
			tagged("b", 0.85, &["TP53", "MDM2"]),
			tagged("c", 0.8, &["EGFR"]),
			tagged("d", 0.7, &["TP53"]),
		]
	}

	#[test]
	fn lambda_one_keeps_relevance_order() {
		let reranked = rerank(hits(), 1.0, 10, 4);

		assert_eq!(ids(&reranked), vec!["a", "b", "c", "d"]);
	}

	#[test]
	fn low_lambda_promotes_novel_entities() {
		let reranked = rerank(hits(), 0.3, 10, 3);

		assert_eq!(ids(&reranked), vec!["a", "c", "d"]);
	}

	#[test]
	fn first_pick_has_full_diversity() {
		let reranked = rerank(hits(), 0.5, 10, 2);

		assert_eq!(reranked[0].diversity_score, 1.0);
		assert_eq!(reranked[0].final_score, reranked[0].relevance);
		assert_eq!(reranked[1].novelty_score, reranked[1].relevance * reranked[1].diversity_score);
	}

	#[test]
	fn output_is_bounded_by_top_k_and_pool() {
		assert_eq!(rerank(hits(), 0.7, 2, 1).len(), 1);
		assert!(rerank(Vec::new(), 0.7, 10, 5).is_empty());
	}

	#[test]
	fn every_track_keeps_a_slot_on_a_short_page() {
		let hits = vec![
			on_track("m1", 1.0, &["TP53"], Track::Modal),
			on_track("m2", 0.95, &["MDM2"], Track::Modal),
			on_track("m3", 0.9, &["CDKN1A"], Track::Modal),
			on_track("t1", 0.4, &["EGFR"], Track::Text),
			on_track("t2", 0.3, &["KRAS"], Track::Text),
		];
		let reranked = rerank(hits, 1.0, 10, 2);

		assert_eq!(ids(&reranked), vec!["m1", "t1"]);
		assert_eq!(reranked[1].tagged.track, Track::Text);
		assert_eq!(reranked[1].final_score, 0.4);

		let single = rerank(
			vec![on_track("t1", 0.4, &["EGFR"], Track::Text)],
			1.0,
			10,
			2,
		);

		assert_eq!(ids(&single), vec!["t1"]);
	}

	#[test]
	fn lambda_tracks_alignment() {
		let ranking = Ranking::default();

		assert_eq!(lambda_for(None, &ranking), 0.7);
		assert_eq!(lambda_for(Some(Alignment::Partial), &ranking), 0.5);
		assert_eq!(lambda_for(Some(Alignment::Divergent), &ranking), 0.3);
	}
}
