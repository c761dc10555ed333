use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use bio_api::{routes, state::AppState};
use bio_domain::collection::CollectionName;
use bio_testkit::{Harness, ScriptedLlm, seeded_point};

const BRIDGE_PROMPT: &str = "You bridge biomedical search results";

fn app(llm: ScriptedLlm) -> Router {
	let Harness { service, store, .. } = Harness::new(llm).expect("Failed to build test harness.");

	store.insert(
		CollectionName::Articles,
		seeded_point(
			CollectionName::Articles,
			"pmid-1001",
			&[("text", "TP53 loss in breast cancer")],
			Some("TP53 loss drives resistance in breast cancer"),
			json!({ "title": "TP53 loss drives resistance in breast cancer", "pmid": "1001" }),
		),
	);
	store.insert(
		CollectionName::Proteins,
		seeded_point(
			CollectionName::Proteins,
			"P04637",
			&[("text", "tumour suppressor p53"), ("sequence", "MEEPQSDPSVEPPLSQETFS")],
			None,
			json!({
				"protein_name": "Cellular tumor antigen p53",
				"normalized_bridge": { "genes": ["TP53"] },
			}),
		),
	);

	routes::router(AppState::from_service(service))
}

async fn post_json(app: Router, uri: &str, payload: Value) -> (StatusCode, Value) {
	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri(uri)
				.header("content-type", "application/json")
				.body(Body::from(payload.to_string()))
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call router.");
	let status = response.status();
	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

	(status, json)
}

#[tokio::test]
async fn health_ok() {
	let response = app(ScriptedLlm::new())
		.oneshot(
			Request::builder()
				.uri("/health")
				.body(Body::empty())
				.expect("Failed to build health request."),
		)
		.await
		.expect("Failed to call health endpoint.");

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn recommend_returns_ranked_results() {
	let (status, body) = post_json(
		app(ScriptedLlm::new()),
		"/v1/recommend",
		json!({ "text": "TP53 breast cancer", "include_design_candidates": false }),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["search_strategy"], "case_1");
	assert_eq!(body["needs_clarification"], false);
	assert_eq!(body["results"]["articles"][0]["id"], "pmid-1001");
	assert_eq!(body["results"]["articles"][0]["evidence"]["source"], "PubMed");
}

#[tokio::test]
async fn invalid_top_k_maps_to_bad_request() {
	let (status, body) = post_json(
		app(ScriptedLlm::new()),
		"/v1/recommend",
		json!({ "text": "TP53", "top_k": 0 }),
	)
	.await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "invalid_input");
}

#[tokio::test]
async fn malformed_body_maps_to_bad_request() {
	let (status, body) =
		post_json(app(ScriptedLlm::new()), "/v1/recommend", json!({ "top_k": "many" })).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "invalid_input");
}

#[tokio::test]
async fn unknown_session_maps_to_not_found() {
	let (status, body) = post_json(
		app(ScriptedLlm::new()),
		"/v1/recommend/resume",
		json!({ "session_id": "00000000-0000-4000-8000-000000000000", "user_choice": "intersection" }),
	)
	.await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body["error_code"], "session_not_found");
	assert_eq!(body["fields"], json!(["session_id"]));
}

#[tokio::test]
async fn divergent_request_pauses_then_resumes() {
	let llm = ScriptedLlm::new().on(
		BRIDGE_PROMPT,
		json!({
			"interpretation": "Tumour suppressor p53.",
			"queries": {},
			"filters": { "genes": ["TP53"] },
			"alignment": "divergent",
		}),
	);
	let app = app(llm);
	let (status, paused) = post_json(
		app.clone(),
		"/v1/recommend",
		json!({
			"text": "EGFR inhibitors in lung cancer",
			"sequence": "MEEPQSDPSVEPPLSQETFS",
			"include_summary": false,
			"include_design_candidates": false,
		}),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(paused["needs_clarification"], true);
	assert_eq!(paused["clarification_request"]["default_choice"], "multi_track");

	let session_id = paused["session_id"].clone();
	let (status, resumed) = post_json(
		app,
		"/v1/recommend/resume",
		json!({ "session_id": session_id, "user_choice": "modal_priority" }),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(resumed["choice_applied"], "modal_priority");
	assert_eq!(resumed["needs_clarification"], false);
	assert_eq!(resumed["results"]["proteins"][0]["id"], "P04637");
}
