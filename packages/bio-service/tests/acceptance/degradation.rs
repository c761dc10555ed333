use std::time::Duration;

use bio_domain::collection::CollectionName;
use bio_service::{Error, RecommendRequest};
use bio_testkit::{Harness, ScriptedLlm, test_config};

use super::{
	BRIDGE_PROMPT, P53_SEQUENCE, bridge_reply, complete, harness_with, lean_request, seed_corpus,
};

fn text_request() -> RecommendRequest {
	RecommendRequest { text: Some("TP53 breast cancer".to_string()), ..lean_request() }
}

#[tokio::test]
async fn slow_collection_times_out_alone() {
	let mut cfg = test_config().expect("Failed to load test config.");

	cfg.search.collection_timeout_ms = 50;

	let harness = Harness::with_config(cfg, ScriptedLlm::new()).expect("Failed to build harness.");

	seed_corpus(&harness.store);
	harness.store.delay(CollectionName::Images, Duration::from_millis(500));

	let response =
		complete(harness.service.recommend(text_request()).await.expect("Search failed."));

	assert!(response.notes.contains(&"images: search timed out after 50 ms.".to_string()));
	assert!(response.results[&CollectionName::Images].is_empty());
	assert!(!response.results[&CollectionName::Articles].is_empty());
	assert!(!response.results[&CollectionName::Proteins].is_empty());
}

#[tokio::test]
async fn unavailable_collection_is_reported() {
	let harness = harness_with(ScriptedLlm::new());

	harness.store.mark_unavailable(CollectionName::Structures);

	let response =
		complete(harness.service.recommend(text_request()).await.expect("Search failed."));

	assert!(response.notes.contains(&"structures: collection unavailable.".to_string()));
	assert!(response.results[&CollectionName::Structures].is_empty());
	assert_eq!(response.results.len(), CollectionName::ALL.len());
}

#[tokio::test]
async fn empty_filtered_search_is_retried_without_filter() {
	let harness =
		harness_with(ScriptedLlm::new().on(BRIDGE_PROMPT, bridge_reply("aligned", &["BRCA1"])));
	let response = complete(
		harness
			.service
			.recommend(RecommendRequest {
				sequence: Some(P53_SEQUENCE.to_string()),
				..lean_request()
			})
			.await
			.expect("Search failed."),
	);
	let queries = harness.store.queries_for(CollectionName::Experiments);

	assert!(queries.iter().any(|query| !query.filter.is_empty()));
	assert!(queries.iter().any(|query| query.filter.is_empty()));
	assert!(!response.results[&CollectionName::Experiments].is_empty());
}

#[tokio::test]
async fn failed_encoder_drops_only_its_input() {
	let harness = harness_with(ScriptedLlm::new());

	harness.encoder.fail_on("sequence");

	let response = complete(
		harness
			.service
			.recommend(RecommendRequest {
				sequence: Some(P53_SEQUENCE.to_string()),
				..text_request()
			})
			.await
			.expect("Search failed."),
	);

	assert_eq!(response.search_strategy, "case_1");
	assert_eq!(response.input_type, "text_only");
	assert!(response.notes.iter().any(|note| note.ends_with("continuing without this input.")));
	assert!(harness.llm.calls_matching(BRIDGE_PROMPT) == 0);
}

#[tokio::test]
async fn request_fails_when_every_encoder_fails() {
	let harness = harness_with(ScriptedLlm::new());

	harness.encoder.fail_on("text");

	let err = harness
		.service
		.recommend(text_request())
		.await
		.expect_err("Nothing could be encoded.");

	assert!(matches!(err, Error::EncoderFailure { .. }));
}

#[tokio::test]
async fn repeated_inputs_hit_the_encoding_cache() {
	let harness = harness_with(ScriptedLlm::new());

	for _ in 0..2 {
		harness.service.recommend(text_request()).await.expect("Search failed.");
	}

	assert_eq!(harness.encoder.inputs_for("text").len(), 1);
}
