use std::collections::HashMap;

use qdrant_client::{
	Payload, Qdrant,
	qdrant::{
		Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Distance, FieldType,
		Filter, Modifier, PointStruct, Query, QueryPointsBuilder, SparseVectorParamsBuilder,
		SparseVectorsConfigBuilder, UpsertPointsBuilder, Value, Vector, VectorInput,
		VectorParamsBuilder, VectorsConfigBuilder,
	},
};

use bio_domain::{
	collection::{CollectionName, NORMALIZED_BRIDGE_FIELD},
	hit::RawHit,
	query::{IndexedPoint, QueryVector, VectorQuery},
};

use crate::{Error, Result, payload};

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection_prefix: String,
}
impl QdrantStore {
	pub fn new(cfg: &bio_config::Qdrant) -> Result<Self> {
		let mut builder = Qdrant::from_url(&cfg.url);

		if let Some(api_key) = cfg.api_key.as_deref() {
			builder = builder.api_key(api_key);
		}

		let client = builder.build()?;

		Ok(Self { client, collection_prefix: cfg.collection_prefix.clone() })
	}

	pub fn collection_name(&self, collection: CollectionName) -> String {
		format!("{}{}", self.collection_prefix, collection.as_str())
	}

	/// Creates any missing collection with the registry's slots and payload indexes.
	pub async fn ensure_collections(&self) -> Result<()> {
		for collection in CollectionName::ALL {
			let name = self.collection_name(collection);

			if self.client.collection_exists(name.clone()).await? {
				continue;
			}

			let spec = collection.spec();
			let mut vectors_config = VectorsConfigBuilder::default();

			for slot in spec.dense_slots {
				vectors_config.add_named_vector_params(
					slot.name,
					VectorParamsBuilder::new(slot.modality.dimension() as u64, Distance::Cosine),
				);
			}

			let mut sparse_vectors_config = SparseVectorsConfigBuilder::default();

			sparse_vectors_config.add_named_vector_params(
				spec.sparse_slot,
				SparseVectorParamsBuilder::default().modifier(Modifier::Idf as i32),
			);

			let builder = CreateCollectionBuilder::new(name.clone())
				.vectors_config(vectors_config)
				.sparse_vectors_config(sparse_vectors_config);

			self.client.create_collection(builder).await?;

			let bridge_fields =
				["genes", "diseases"].map(|field| format!("{NORMALIZED_BRIDGE_FIELD}.{field}"));
			let fields = spec.payload_indexes.iter().map(|field| field.to_string()).chain(bridge_fields);

			for field in fields {
				let field_type = payload_field_type(&field);
				let index = CreateFieldIndexCollectionBuilder::new(name.clone(), field, field_type)
					.wait(true);

				self.client.create_field_index(index).await?;
			}

			tracing::info!(collection = %name, "Created Qdrant collection.");
		}

		Ok(())
	}

	pub async fn query(&self, query: &VectorQuery) -> Result<Vec<RawHit>> {
		let name = self.collection_name(query.collection);
		let vector = match &query.vector {
			QueryVector::Dense(values) => VectorInput::new_dense(values.clone()),
			QueryVector::Sparse(sparse) =>
				VectorInput::new_sparse(sparse.indices.clone(), sparse.values.clone()),
		};
		let mut search = QueryPointsBuilder::new(name.clone())
			.query(Query::new_nearest(vector))
			.using(query.slot.as_str())
			.with_payload(true)
			.limit(query.limit as u64);

		if !query.filter.is_empty() {
			search = search.filter(Filter {
				must: query
					.filter
					.iter()
					.map(|matcher| {
						Condition::matches(matcher.field.as_str(), matcher.any_of.clone())
					})
					.collect(),
				..Default::default()
			});
		}

		let response = match self.client.query(search).await {
			Ok(response) => response,
			Err(err) => {
				if !self.client.collection_exists(name.clone()).await.unwrap_or(true) {
					return Err(Error::CollectionUnavailable(name));
				}

				return Err(err.into());
			},
		};

		Ok(response
			.result
			.into_iter()
			.filter_map(|point| {
				let id = payload::point_id_to_string(point.id)?;

				Some(RawHit {
					id,
					score: point.score,
					payload: payload::payload_to_json(point.payload),
				})
			})
			.collect())
	}

	pub async fn upsert(&self, collection: CollectionName, points: Vec<IndexedPoint>) -> Result<()> {
		if points.is_empty() {
			return Ok(());
		}

		let spec = collection.spec();
		let mut structs = Vec::with_capacity(points.len());

		for point in points {
			let mut vectors: HashMap<String, Vector> = HashMap::new();

			for (slot, values) in point.dense {
				let Some(declared) = spec.dense_slot(&slot) else {
					return Err(Error::InvalidArgument(format!(
						"{collection} has no dense slot {slot}."
					)));
				};

				if values.len() != declared.modality.dimension() {
					return Err(Error::InvalidArgument(format!(
						"{collection}.{slot} expects {} dimensions, got {}.",
						declared.modality.dimension(),
						values.len()
					)));
				}

				vectors.insert(slot, Vector::from(values));
			}
			if let Some((slot, sparse)) = point.sparse {
				vectors.insert(slot, Vector::new_sparse(sparse.indices, sparse.values));
			}

			let payload: HashMap<String, Value> =
				point.payload.into_iter().map(|(key, value)| (key, Value::from(value))).collect();

			structs.push(PointStruct::new(
				payload::string_to_point_id(&point.id),
				vectors,
				Payload::from(payload),
			));
		}

		let upsert = UpsertPointsBuilder::new(self.collection_name(collection), structs).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}
}

fn payload_field_type(field: &str) -> FieldType {
	match field {
		"year" => FieldType::Integer,
		"resolution" => FieldType::Float,
		_ => FieldType::Keyword,
	}
}
