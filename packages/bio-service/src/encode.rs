use bio_config::EmbeddingProviderConfig;
use bio_domain::modality::{Modality, ModalityVector, SparseVector};
use bio_providers::sparse;

use crate::{BioService, Error, Result, cache::EncodingCache};

/// Raw request inputs after validation, keyed by modality.
#[derive(Clone, Debug, Default)]
pub struct RawInputs {
	pub text: Option<String>,
	/// Non-text inputs in any order. Image input is base64.
	pub modal: Vec<(Modality, String)>,
}

#[derive(Debug, Default)]
pub struct EncodedInputs {
	pub text: Option<ModalityVector>,
	/// Successful non-text encodings in precedence order.
	pub modal: Vec<ModalityVector>,
	pub failures: Vec<Error>,
}
impl EncodedInputs {
	pub fn modalities(&self) -> Vec<Modality> {
		self.modal.iter().map(ModalityVector::kind).collect()
	}

	pub fn vector(&self, modality: Modality) -> Option<&ModalityVector> {
		self.modal.iter().find(|vector| vector.kind() == modality)
	}
}

impl BioService {
	/// Encodes every supplied input independently. Fails only when nothing could be encoded.
	pub async fn encode_inputs(&self, inputs: &RawInputs) -> Result<EncodedInputs> {
		let text_job = async {
			match inputs.text.as_deref() {
				Some(text) => Some(self.encode_text(text).await),
				None => None,
			}
		};
		let modal_jobs = futures::future::join_all(
			Modality::PRECEDENCE
				.into_iter()
				.filter_map(|modality| {
					inputs.modal.iter().find(|(kind, _)| *kind == modality)
				})
				.map(|(modality, input)| self.encode_modal(*modality, input)),
		);
		let (text, modal) = tokio::join!(text_job, modal_jobs);
		let mut encoded = EncodedInputs::default();

		match text {
			Some(Ok(vector)) => encoded.text = Some(vector),
			Some(Err(err)) => {
				tracing::warn!(modality = "text", error = %err, "Encoder failed.");

				encoded.failures.push(err);
			},
			None => {},
		}

		for result in modal {
			match result {
				Ok(vector) => encoded.modal.push(vector),
				Err(err) => {
					tracing::warn!(error = %err, "Encoder failed.");

					encoded.failures.push(err);
				},
			}
		}

		if encoded.text.is_none() && encoded.modal.is_empty() {
			return Err(encoded.failures.into_iter().next().unwrap_or_else(|| Error::InvalidInput {
				message: "Provide at least one of text, sequence, image, structure, or article."
					.to_string(),
			}));
		}

		Ok(encoded)
	}

	/// Dense text embedding plus local sparse term weights.
	pub async fn encode_text(&self, text: &str) -> Result<ModalityVector> {
		let dense = self.encode_dense(Modality::Text, text).await?;
		let (indices, values) = sparse::encode(text).into_iter().unzip();

		Ok(dense.with_sparse(SparseVector { indices, values }))
	}

	pub async fn encode_modal(&self, modality: Modality, input: &str) -> Result<ModalityVector> {
		self.encode_dense(modality, input).await
	}

	async fn encode_dense(&self, modality: Modality, input: &str) -> Result<ModalityVector> {
		let cfg = self.embedding_config(modality);
		let key = EncodingCache::fingerprint(modality, &cfg.model, input);

		self.cache
			.get_or_encode(&key, || async move {
				let inputs = [input.to_string()];
				let mut vectors = self
					.providers
					.embedding
					.embed(cfg, modality.as_str(), &inputs)
					.await
					.map_err(|err| Error::EncoderFailure {
						modality: modality.as_str().to_string(),
						message: err.to_string(),
					})?;
				let Some(values) = vectors.pop() else {
					return Err(Error::EncoderFailure {
						modality: modality.as_str().to_string(),
						message: "Encoder returned no vector.".to_string(),
					});
				};

				Ok(ModalityVector::new(modality, values)?)
			})
			.await
	}

	fn embedding_config(&self, modality: Modality) -> &EmbeddingProviderConfig {
		let providers = &self.cfg.providers;

		match modality {
			Modality::Text => &providers.text_embedding,
			Modality::Sequence => &providers.sequence_embedding,
			Modality::Image => &providers.image_embedding,
			Modality::Structure => &providers.structure_embedding,
		}
	}
}
