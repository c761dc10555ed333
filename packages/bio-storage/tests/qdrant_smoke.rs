use std::env;

use serde_json::json;
use uuid::Uuid;

use bio_domain::{
	collection::CollectionName,
	query::{IndexedPoint, PayloadMatch, QueryVector, VectorQuery},
};
use bio_storage::{Error, qdrant::QdrantStore};

fn env_qdrant_url() -> Option<String> {
	env::var("BIO_QDRANT_URL").ok()
}

fn unit(dims: usize, hot: usize) -> Vec<f32> {
	let mut values = vec![0.0; dims];

	values[hot] = 1.0;

	values
}

async fn drop_collections(store: &QdrantStore) {
	for collection in CollectionName::ALL {
		let _ = store.client.delete_collection(store.collection_name(collection)).await;
	}
}

#[tokio::test]
#[ignore = "Requires external Qdrant. Set BIO_QDRANT_URL to run."]
async fn filtered_native_search_round_trips() {
	let Some(url) = env_qdrant_url() else {
		eprintln!("Skipping filtered_native_search_round_trips; set BIO_QDRANT_URL to run this test.");

		return;
	};
	let cfg = bio_config::Qdrant {
		url,
		api_key: None,
		collection_prefix: format!("bio_test_{}_", Uuid::new_v4().simple()),
	};
	let store = QdrantStore::new(&cfg).expect("Failed to build Qdrant client.");

	store.ensure_collections().await.expect("Failed to create collections.");
	store.ensure_collections().await.expect("Collection setup must be idempotent.");

	let points = [(1_u64, "TP53", 0), (2_u64, "EGFR", 1)].map(|(id, gene, hot)| IndexedPoint {
		id: id.to_string(),
		dense: vec![
			("sequence".to_string(), unit(1_280, hot)),
			("text".to_string(), unit(768, hot)),
		],
		sparse: None,
		payload: json!({ "gene_names": [gene], "normalized_bridge": { "genes": [gene] } })
			.as_object()
			.cloned()
			.unwrap_or_default(),
	});

	store.upsert(CollectionName::Proteins, points.to_vec()).await.expect("Failed to upsert points.");

	let query = VectorQuery {
		collection: CollectionName::Proteins,
		slot: "sequence".to_string(),
		vector: QueryVector::Dense(unit(1_280, 1)),
		filter: Vec::new(),
		limit: 5,
	};
	let hits = store.query(&query).await.expect("Search failed.");

	assert_eq!(hits[0].id, "2");
	assert_eq!(hits[0].payload["normalized_bridge"]["genes"][0], "EGFR");

	let filtered = VectorQuery {
		filter: vec![PayloadMatch {
			field: "normalized_bridge.genes".to_string(),
			any_of: vec!["TP53".to_string()],
		}],
		..query
	};
	let hits = store.query(&filtered).await.expect("Filtered search failed.");

	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].id, "1");

	let err = store
		.upsert(
			CollectionName::Proteins,
			vec![IndexedPoint {
				id: "3".to_string(),
				dense: vec![("sequence".to_string(), unit(768, 0))],
				sparse: None,
				payload: Default::default(),
			}],
		)
		.await
		.expect_err("Wrong width must be rejected.");

	assert!(matches!(err, Error::InvalidArgument(_)));

	drop_collections(&store).await;
}

#[tokio::test]
#[ignore = "Requires external Qdrant. Set BIO_QDRANT_URL to run."]
async fn missing_collection_is_reported_unavailable() {
	let Some(url) = env_qdrant_url() else {
		eprintln!(
			"Skipping missing_collection_is_reported_unavailable; set BIO_QDRANT_URL to run this test."
		);

		return;
	};
	let cfg = bio_config::Qdrant {
		url,
		api_key: None,
		collection_prefix: format!("bio_missing_{}_", Uuid::new_v4().simple()),
	};
	let store = QdrantStore::new(&cfg).expect("Failed to build Qdrant client.");
	let err = store
		.query(&VectorQuery {
			collection: CollectionName::Articles,
			slot: "text".to_string(),
			vector: QueryVector::Dense(unit(768, 0)),
			filter: Vec::new(),
			limit: 5,
		})
		.await
		.expect_err("Missing collections must fail.");

	assert!(matches!(err, Error::CollectionUnavailable(_)));
}
