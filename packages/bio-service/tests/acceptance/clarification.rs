use serde_json::json;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use bio_domain::{
	collection::CollectionName,
	track::{Alignment, Track, UserChoice},
};
use bio_service::{Error, Outcome, RecommendRequest, ResumeRequest, SessionStore};
use bio_testkit::{Harness, ScriptedLlm, seeded_point};

use super::{BRIDGE_PROMPT, P53_SEQUENCE, bridge_reply, complete, harness_with, lean_request};

fn divergent_harness() -> Harness {
	harness_with(ScriptedLlm::new().on(BRIDGE_PROMPT, bridge_reply("divergent", &["TP53"])))
}

fn divergent_request() -> RecommendRequest {
	RecommendRequest {
		text: Some("EGFR inhibitors in lung cancer".to_string()),
		sequence: Some(P53_SEQUENCE.to_string()),
		..lean_request()
	}
}

async fn pause(harness: &Harness) -> Uuid {
	pause_with(harness, divergent_request()).await
}

async fn pause_with(harness: &Harness, request: RecommendRequest) -> Uuid {
	match harness.service.recommend(request).await.expect("Search failed.") {
		Outcome::Pending(pending) => pending.session_id,
		Outcome::Complete(_) => panic!("Divergent tracks must pause for clarification."),
	}
}

#[tokio::test]
async fn divergent_tracks_pause_with_a_clarification_request() {
	let harness = divergent_harness();
	let outcome = harness.service.recommend(divergent_request()).await.expect("Search failed.");
	let Outcome::Pending(pending) = outcome else {
		panic!("Divergent tracks must pause for clarification.");
	};
	let request = &pending.clarification_request;

	assert_eq!(request.options, UserChoice::ALL.to_vec());
	assert_eq!(request.default_choice, UserChoice::MultiTrack);
	assert_eq!(request.timeout_seconds, 10);
	assert_eq!(request.context_modal[0], "Cellular tumor antigen p53");
	assert!(!request.context_text.is_empty());

	let response = &pending.response;

	assert!(response.needs_clarification);
	assert_eq!(response.session_id, Some(pending.session_id));
	assert_eq!(response.query_id, pending.session_id);
	assert_eq!(response.divergence_level, Some(Alignment::Divergent));
	assert!(response.results.is_empty());
	assert_eq!(harness.sessions.len(), 1);
}

#[tokio::test]
async fn aligned_tracks_complete_without_pausing() {
	let harness =
		harness_with(ScriptedLlm::new().on(BRIDGE_PROMPT, bridge_reply("aligned", &["TP53"])));
	let response =
		complete(harness.service.recommend(divergent_request()).await.expect("Search failed."));

	assert!(!response.needs_clarification);
	assert!(harness.sessions.is_empty());
}

#[tokio::test]
async fn resume_applies_the_chosen_strategy_once() {
	let harness = divergent_harness();
	let session_id = pause(&harness).await;
	let response = harness
		.service
		.resume(ResumeRequest { session_id, user_choice: Some(UserChoice::TextPriority) })
		.await
		.expect("Resume failed.");

	assert_eq!(response.query_id, session_id);
	assert_eq!(response.choice_applied, Some(UserChoice::TextPriority));
	assert!(!response.needs_clarification);
	assert!(
		response.results[&CollectionName::Proteins]
			.iter()
			.all(|result| result.track == Track::Text)
	);
	assert!(
		harness
			.store
			.queries_for(CollectionName::Proteins)
			.iter()
			.any(|query| query.slot == "text")
	);

	let err = harness
		.service
		.resume(ResumeRequest { session_id, user_choice: Some(UserChoice::TextPriority) })
		.await
		.expect_err("A session can only be resumed once.");

	assert!(matches!(err, Error::SessionNotFound { .. }));
}

#[tokio::test]
async fn recommend_with_session_and_choice_resumes() {
	let harness = divergent_harness();
	let session_id = pause(&harness).await;
	let response = complete(
		harness
			.service
			.recommend(RecommendRequest {
				session_id: Some(session_id),
				user_choice: Some(UserChoice::ModalPriority),
				..RecommendRequest::default()
			})
			.await
			.expect("Resume through recommend failed."),
	);

	assert_eq!(response.choice_applied, Some(UserChoice::ModalPriority));
	assert!(
		response.results[&CollectionName::Proteins]
			.iter()
			.all(|result| result.track == Track::Modal)
	);
}

#[tokio::test]
async fn preset_choice_skips_the_pause() {
	let harness = divergent_harness();
	let response = complete(
		harness
			.service
			.recommend(RecommendRequest {
				user_choice: Some(UserChoice::MultiTrack),
				..divergent_request()
			})
			.await
			.expect("Search failed."),
	);

	assert_eq!(response.choice_applied, Some(UserChoice::MultiTrack));
	assert!(harness.sessions.is_empty());
}

#[tokio::test]
async fn expired_decision_window_applies_the_default_choice() {
	let harness = divergent_harness();
	let session_id = pause(&harness).await;
	let now = OffsetDateTime::now_utc();
	let mut pending = harness
		.sessions
		.take(session_id, now)
		.await
		.expect("Session lookup failed.")
		.expect("Paused session must be stored.");

	pending.decide_by = now - Duration::seconds(1);
	pending.expires_at = now + Duration::seconds(60);

	harness.sessions.put(&pending).await.expect("Failed to store session.");

	let response = harness
		.service
		.resume(ResumeRequest { session_id, user_choice: Some(UserChoice::Intersection) })
		.await
		.expect("Resume failed.");

	assert_eq!(response.choice_applied, Some(UserChoice::MultiTrack));
	assert!(response.notes.iter().any(|note| note.contains("expired")));
}

#[tokio::test]
async fn fully_expired_sessions_are_gone() {
	let harness = divergent_harness();
	let session_id = pause(&harness).await;
	let now = OffsetDateTime::now_utc();
	let mut pending = harness
		.sessions
		.take(session_id, now)
		.await
		.expect("Session lookup failed.")
		.expect("Paused session must be stored.");

	pending.decide_by = now - Duration::seconds(120);
	pending.expires_at = now - Duration::seconds(60);

	harness.sessions.put(&pending).await.expect("Failed to store session.");

	let err = harness
		.service
		.resume(ResumeRequest { session_id, user_choice: None })
		.await
		.expect_err("Expired sessions must not resume.");

	assert!(matches!(err, Error::SessionNotFound { .. }));
	assert!(harness.sessions.is_empty());
}

#[tokio::test]
async fn unknown_session_is_rejected() {
	let harness = divergent_harness();
	let err = harness
		.service
		.resume(ResumeRequest { session_id: Uuid::new_v4(), user_choice: None })
		.await
		.expect_err("Unknown sessions must not resume.");

	assert!(matches!(err, Error::SessionNotFound { .. }));
}

#[tokio::test]
async fn multi_track_resume_keeps_both_tracks_tagged() {
	let harness = divergent_harness();

	harness.store.insert(
		CollectionName::Proteins,
		seeded_point(
			CollectionName::Proteins,
			"P01116",
			&[("text", "GTPase KRas lung cancer")],
			Some("GTPase KRas oncogene in lung cancer"),
			json!({
				"protein_name": "GTPase KRas",
				"uniprot_id": "P01116",
				"normalized_bridge": { "genes": ["KRAS"], "diseases": ["lung cancer"] },
			}),
		),
	);

	let session_id = pause(&harness).await;
	let response = harness
		.service
		.resume(ResumeRequest { session_id, user_choice: Some(UserChoice::MultiTrack) })
		.await
		.expect("Resume failed.");
	let proteins = &response.results[&CollectionName::Proteins];

	assert_eq!(response.choice_applied, Some(UserChoice::MultiTrack));
	assert!(proteins.iter().any(|result| result.track == Track::Modal));
	assert!(proteins.iter().any(|result| result.track == Track::Text));

	let kras = proteins
		.iter()
		.find(|result| result.id == "P01116")
		.expect("The text-only protein must be merged in.");

	assert_eq!(kras.track, Track::Text);
	assert!(
		proteins
			.iter()
			.filter(|result| result.id == "P04637")
			.all(|result| result.track == Track::Modal)
	);
}

#[tokio::test]
async fn intersection_without_shared_entities_is_explicitly_empty() {
	let harness =
		Harness::new(ScriptedLlm::new().on(BRIDGE_PROMPT, bridge_reply("divergent", &["TP53"])))
			.expect("Failed to build test harness.");

	harness.store.insert(
		CollectionName::Proteins,
		seeded_point(
			CollectionName::Proteins,
			"P04637",
			&[("sequence", P53_SEQUENCE)],
			None,
			json!({
				"protein_name": "Cellular tumor antigen p53",
				"normalized_bridge": { "genes": ["TP53"] },
			}),
		),
	);
	harness.store.insert(
		CollectionName::Articles,
		seeded_point(
			CollectionName::Articles,
			"pmid-2001",
			&[("text", "KRAS mutations in pancreatic cancer")],
			Some("KRAS mutations drive pancreatic cancer"),
			json!({
				"title": "KRAS mutations drive pancreatic cancer",
				"normalized_bridge": { "genes": ["KRAS"], "diseases": ["pancreatic cancer"] },
			}),
		),
	);
	harness.store.insert(
		CollectionName::Experiments,
		seeded_point(
			CollectionName::Experiments,
			"GSE2001",
			&[("text", "KRAS knockdown in pancreatic organoids")],
			Some("KRAS knockdown in pancreatic organoids"),
			json!({
				"title": "KRAS knockdown in pancreatic organoids",
				"normalized_bridge": { "genes": ["KRAS"] },
			}),
		),
	);

	let session_id = pause_with(
		&harness,
		RecommendRequest {
			text: Some("KRAS mutations in pancreatic cancer".to_string()),
			sequence: Some(P53_SEQUENCE.to_string()),
			..lean_request()
		},
	)
	.await;
	let response = harness
		.service
		.resume(ResumeRequest { session_id, user_choice: Some(UserChoice::Intersection) })
		.await
		.expect("An empty intersection is a result, not an error.");

	assert_eq!(response.choice_applied, Some(UserChoice::Intersection));
	assert!(response.intersection_empty);
	assert!(response.results.contains_key(&CollectionName::Proteins));
	assert!(response.results.values().all(Vec::is_empty));
	assert!(response.notes.iter().any(|note| note.contains("No entities are shared")));
}

#[tokio::test]
async fn abandoned_sessions_are_dropped_on_the_next_pause() {
	let harness = divergent_harness();
	let abandoned = pause(&harness).await;
	let now = OffsetDateTime::now_utc();
	let mut pending = harness
		.sessions
		.take(abandoned, now)
		.await
		.expect("Session lookup failed.")
		.expect("Paused session must be stored.");

	pending.decide_by = now - Duration::seconds(120);
	pending.expires_at = now - Duration::seconds(60);

	harness.sessions.put(&pending).await.expect("Failed to store session.");

	assert_eq!(harness.sessions.len(), 1);

	let fresh = pause(&harness).await;

	assert_eq!(harness.sessions.len(), 1);

	let response = harness
		.service
		.resume(ResumeRequest { session_id: fresh, user_choice: None })
		.await
		.expect("The fresh session must resume.");

	assert_eq!(response.choice_applied, Some(UserChoice::MultiTrack));
}
