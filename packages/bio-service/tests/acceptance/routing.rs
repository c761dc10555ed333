use bio_domain::{collection::CollectionName, track::{Alignment, Track}};
use bio_service::RecommendRequest;
use bio_testkit::ScriptedLlm;

use super::{
	BRIDGE_PROMPT, P53_SEQUENCE, bridge_reply, complete, dense_width, harness_with, is_sparse,
	lean_request, sequence_width, slot_width,
};

#[tokio::test]
async fn text_only_searches_every_collection_without_bridge() {
	let harness = harness_with(ScriptedLlm::new().on(BRIDGE_PROMPT, bridge_reply("aligned", &[])));
	let response = complete(
		harness
			.service
			.recommend(RecommendRequest {
				text: Some("TP53 breast cancer".to_string()),
				..lean_request()
			})
			.await
			.expect("Text search failed."),
	);

	assert_eq!(response.search_strategy, "case_1");
	assert_eq!(response.input_type, "text_only");
	assert_eq!(harness.llm.calls_matching(BRIDGE_PROMPT), 0);
	assert!(response.bridge_interpretation.is_none());
	assert!(response.divergence_level.is_none());

	for collection in CollectionName::ALL {
		let queries = harness.store.queries_for(collection);

		assert_eq!(queries.len(), 2, "{collection} should get one dense and one sparse query.");
		assert!(queries.iter().any(|query| query.slot == collection.text_slot()));
		assert!(queries.iter().any(|query| query.slot == collection.sparse_slot() && is_sparse(query)));
		assert!(response.results.contains_key(&collection));
	}

	let articles = &response.results[&CollectionName::Articles];

	assert_eq!(articles[0].id, "pmid-1001");
	assert!(articles.iter().all(|result| result.track == Track::Text));
}

#[tokio::test]
async fn sequence_only_bridges_into_text_queries() {
	let harness =
		harness_with(ScriptedLlm::new().on(BRIDGE_PROMPT, bridge_reply("divergent", &["TP53"])));
	let response = complete(
		harness
			.service
			.recommend(RecommendRequest {
				sequence: Some("meepqsdpsv eppLSQETFS".to_string()),
				..lean_request()
			})
			.await
			.expect("Sequence search failed."),
	);

	assert_eq!(response.search_strategy, "case_2");
	assert_eq!(response.input_type, "sequence");
	assert_eq!(harness.encoder.inputs_for("sequence"), vec![P53_SEQUENCE.to_string()]);
	assert_eq!(harness.llm.calls_matching(BRIDGE_PROMPT), 1);

	// Without user text the bridge cannot report disagreement.
	assert_eq!(response.divergence_level, Some(Alignment::Aligned));
	assert!(!response.needs_clarification);

	let protein_queries = harness.store.queries_for(CollectionName::Proteins);

	assert_eq!(protein_queries.len(), 1);
	assert_eq!(protein_queries[0].slot, "sequence");
	assert_eq!(dense_width(&protein_queries[0]), Some(sequence_width()));

	let proteins = &response.results[&CollectionName::Proteins];

	assert_eq!(proteins[0].id, "P04637");
	assert!(proteins.iter().all(|result| result.track == Track::Modal));

	assert!(harness.encoder.inputs_for("text").contains(&"G1 disease X".to_string()));
	assert!(harness.store.queries_for(CollectionName::Articles).iter().any(is_sparse));
	assert!(
		harness
			.store
			.queries_for(CollectionName::Articles)
			.iter()
			.all(|query| query.filter.is_empty())
	);
	assert!(
		harness
			.store
			.queries_for(CollectionName::Experiments)
			.iter()
			.all(|query| query.filter.iter().any(|matcher| matcher.any_of == vec!["TP53".to_string()]))
	);
	assert!(
		response.results[&CollectionName::Experiments]
			.iter()
			.all(|result| result.track == Track::Bridge)
	);
	assert_eq!(response.bridge_interpretation.as_deref(), Some("Tumour suppressor p53 family."));
	assert_eq!(response.extracted_entities.genes, vec!["TP53".to_string()]);
}

#[tokio::test]
async fn text_and_sequence_keep_vector_spaces_apart() {
	let harness =
		harness_with(ScriptedLlm::new().on(BRIDGE_PROMPT, bridge_reply("aligned", &["TP53"])));
	let response = complete(
		harness
			.service
			.recommend(RecommendRequest {
				text: Some("TP53 breast cancer".to_string()),
				sequence: Some(P53_SEQUENCE.to_string()),
				..lean_request()
			})
			.await
			.expect("Combined search failed."),
	);

	assert_eq!(response.search_strategy, "case_3");
	assert_eq!(response.divergence_level, Some(Alignment::Aligned));
	assert_eq!(response.choice_applied, None);

	let queries = harness.store.queries();

	assert!(!queries.is_empty());

	for query in &queries {
		if let Some(width) = dense_width(query) {
			assert_eq!(Some(width), slot_width(query), "Mixed vector space in {query:?}.");
		}
	}

	let protein_queries = harness.store.queries_for(CollectionName::Proteins);

	assert!(protein_queries.iter().all(|query| query.slot == "sequence"));

	// The user's own text drives the other collections; bridge queries are never encoded.
	assert!(!harness.encoder.inputs_for("text").contains(&"G1 disease X".to_string()));
	assert!(
		response.results[&CollectionName::Articles].iter().all(|result| result.track == Track::Text)
	);
}

#[tokio::test]
async fn bridge_failure_falls_back_to_default_queries() {
	let harness = harness_with(ScriptedLlm::new().failing(BRIDGE_PROMPT));
	let response = complete(
		harness
			.service
			.recommend(RecommendRequest {
				sequence: Some(P53_SEQUENCE.to_string()),
				..lean_request()
			})
			.await
			.expect("Sequence search failed."),
	);

	assert!(
		response
			.notes
			.contains(&"Bridge generation failed; default queries were used.".to_string())
	);
	assert_eq!(response.bridge_interpretation.as_deref(), Some("Search results found."));
	assert!(harness.encoder.inputs_for("text").contains(&"protein function".to_string()));
}

#[tokio::test]
async fn graph_and_evidence_follow_request_switches() {
	let harness = harness_with(ScriptedLlm::new());
	let response = complete(
		harness
			.service
			.recommend(RecommendRequest {
				text: Some("TP53 breast cancer".to_string()),
				include_graph: true,
				..lean_request()
			})
			.await
			.expect("Text search failed."),
	);
	let graph = response.neighbor_graph.expect("Graph was requested.");

	assert!(!graph.nodes.is_empty());
	assert!(
		response
			.results
			.values()
			.flatten()
			.all(|result| result.evidence.is_some())
	);

	let response = complete(
		harness
			.service
			.recommend(RecommendRequest {
				text: Some("TP53 breast cancer".to_string()),
				include_evidence: false,
				..lean_request()
			})
			.await
			.expect("Text search failed."),
	);

	assert!(response.neighbor_graph.is_none());
	assert!(response.results.values().flatten().all(|result| result.evidence.is_none()));
}

#[tokio::test]
async fn summary_falls_back_when_the_model_fails() {
	let harness = harness_with(ScriptedLlm::new());
	let response = complete(
		harness
			.service
			.recommend(RecommendRequest {
				text: Some("TP53 breast cancer".to_string()),
				include_summary: true,
				..lean_request()
			})
			.await
			.expect("Text search failed."),
	);
	let summary = response.summary.expect("Summary was requested.");

	assert!(!summary.is_empty());
}
