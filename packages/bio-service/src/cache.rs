//! Encoder output cache keyed by content fingerprint.
//!
//! Concurrent callers asking for the same key share one in-flight encode through a per-key
//! `OnceCell`. The key map is bounded and evicts the oldest key first.

use std::{
	collections::{HashMap, VecDeque},
	future::Future,
	sync::{Arc, Mutex},
};

use tokio::sync::OnceCell;

use bio_domain::modality::{Modality, ModalityVector};

use crate::Result;

pub struct EncodingCache {
	enabled: bool,
	max_entries: usize,
	inner: Mutex<CacheInner>,
}
impl EncodingCache {
	pub fn new(enabled: bool, max_entries: usize) -> Self {
		Self { enabled, max_entries, inner: Mutex::new(CacheInner::default()) }
	}

	pub fn fingerprint(modality: Modality, model: &str, input: &str) -> String {
		let material = serde_json::json!({
			"modality": modality.as_str(),
			"model": model,
			"input": input,
		});

		blake3::hash(material.to_string().as_bytes()).to_hex().to_string()
	}

	pub async fn get_or_encode<F, Fut>(&self, key: &str, encode: F) -> Result<ModalityVector>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<ModalityVector>>,
	{
		if !self.enabled {
			return encode().await;
		}

		let cell = self.cell(key);
		let vector = cell.get_or_try_init(encode).await?;

		Ok(vector.clone())
	}

	pub fn len(&self) -> usize {
		self.lock().cells.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn cell(&self, key: &str) -> Arc<OnceCell<ModalityVector>> {
		let mut inner = self.lock();

		if let Some(cell) = inner.cells.get(key) {
			return cell.clone();
		}

		let cell = Arc::new(OnceCell::new());

		inner.cells.insert(key.to_string(), cell.clone());
		inner.order.push_back(key.to_string());

		while inner.cells.len() > self.max_entries.max(1) {
			let Some(oldest) = inner.order.pop_front() else {
				break;
			};

			inner.cells.remove(&oldest);
		}

		cell
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
		self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

#[derive(Default)]
struct CacheInner {
	cells: HashMap<String, Arc<OnceCell<ModalityVector>>>,
	order: VecDeque<String>,
}
