use bio_service::{Error, RecommendRequest};
use bio_testkit::ScriptedLlm;

use super::{complete, harness_with, lean_request};

fn text_request() -> RecommendRequest {
	RecommendRequest { text: Some("TP53 breast cancer".to_string()), ..lean_request() }
}

#[tokio::test]
async fn top_k_outside_bounds_is_rejected() {
	let harness = harness_with(ScriptedLlm::new());

	for top_k in [0, 51] {
		let err = harness
			.service
			.recommend(RecommendRequest { top_k: Some(top_k), ..text_request() })
			.await
			.expect_err("top_k out of range must be rejected.");

		assert!(matches!(err, Error::InvalidInput { .. }), "Unexpected error for {top_k}: {err}.");
	}

	assert!(harness.store.queries().is_empty());
}

#[tokio::test]
async fn top_k_bounds_the_page_size() {
	let harness = harness_with(ScriptedLlm::new());
	let response = complete(
		harness
			.service
			.recommend(RecommendRequest { top_k: Some(1), ..text_request() })
			.await
			.expect("Search failed."),
	);

	assert!(response.results.values().all(|results| results.len() <= 1));
}

#[tokio::test]
async fn empty_request_is_rejected() {
	let harness = harness_with(ScriptedLlm::new());
	let err = harness
		.service
		.recommend(RecommendRequest { text: Some("   ".to_string()), ..lean_request() })
		.await
		.expect_err("Blank input must be rejected.");

	assert!(matches!(err, Error::InvalidInput { .. }));
}

#[tokio::test]
async fn malformed_image_is_rejected() {
	let harness = harness_with(ScriptedLlm::new());
	let err = harness
		.service
		.recommend(RecommendRequest {
			image_base64: Some("not base64!!".to_string()),
			..lean_request()
		})
		.await
		.expect_err("Malformed base64 must be rejected.");

	assert!(matches!(err, Error::InvalidInput { .. }));
}

#[tokio::test]
async fn data_url_prefix_is_stripped() {
	let harness = harness_with(ScriptedLlm::new());
	let response = complete(
		harness
			.service
			.recommend(RecommendRequest {
				image_base64: Some("data:image/png;base64,aGVsbG8=".to_string()),
				..lean_request()
			})
			.await
			.expect("Image search failed."),
	);

	assert_eq!(response.search_strategy, "case_2");
	assert_eq!(response.input_type, "image");
	assert_eq!(harness.encoder.inputs_for("image"), vec!["aGVsbG8=".to_string()]);
}

#[tokio::test]
async fn short_sequence_is_ignored_with_a_note() {
	let harness = harness_with(ScriptedLlm::new());
	let response = complete(
		harness
			.service
			.recommend(RecommendRequest { sequence: Some("MKT".to_string()), ..text_request() })
			.await
			.expect("Search failed."),
	);

	assert_eq!(response.search_strategy, "case_1");
	assert!(
		response.notes.contains(&"Sequence shorter than 10 residues was ignored.".to_string())
	);
	assert!(harness.encoder.inputs_for("sequence").is_empty());

	let err = harness
		.service
		.recommend(RecommendRequest { sequence: Some("MKT".to_string()), ..lean_request() })
		.await
		.expect_err("A short sequence alone leaves nothing to search.");

	assert!(matches!(err, Error::InvalidInput { .. }));
}

#[tokio::test]
async fn article_context_is_prepended_to_the_query() {
	let harness = harness_with(ScriptedLlm::new());
	let article = "\
Journal of Oncology
TP53 mutations drive resistance in triple-negative breast cancer
Abstract: We profiled 120 tumours and found that TP53 loss correlates with poor response.
Introduction
Breast cancer is heterogeneous.";
	let response = complete(
		harness
			.service
			.recommend(RecommendRequest {
				article: Some(article.to_string()),
				text: Some("chemotherapy response".to_string()),
				..lean_request()
			})
			.await
			.expect("Article search failed."),
	);
	let encoded = harness.encoder.inputs_for("text");

	assert_eq!(response.search_strategy, "case_1");
	assert_eq!(encoded.len(), 1);
	assert!(encoded[0].starts_with("Journal of Oncology. We profiled 120 tumours"));
	assert!(encoded[0].ends_with(". chemotherapy response"));
}

#[tokio::test]
async fn article_without_context_leaves_a_note() {
	let harness = harness_with(ScriptedLlm::new());
	let response = complete(
		harness
			.service
			.recommend(RecommendRequest {
				article: Some("short".to_string()),
				text: Some("TP53".to_string()),
				..lean_request()
			})
			.await
			.expect("Search failed."),
	);

	assert!(
		response
			.notes
			.contains(&"No title or abstract could be extracted from the article.".to_string())
	);
}
