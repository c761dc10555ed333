use serde::{Deserialize, Serialize};

use bio_domain::modality::Modality;

use crate::{Error, Result};

/// Which of the three search strategies a request follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "case", rename_all = "snake_case")]
pub enum SearchCase {
	TextOnly,
	ModalOnly { primary: Modality },
	TextAndModal { primary: Modality },
}
impl SearchCase {
	pub fn strategy(self) -> &'static str {
		match self {
			Self::TextOnly => "case_1",
			Self::ModalOnly { .. } => "case_2",
			Self::TextAndModal { .. } => "case_3",
		}
	}

	pub fn primary(self) -> Option<Modality> {
		match self {
			Self::TextOnly => None,
			Self::ModalOnly { primary } | Self::TextAndModal { primary } => Some(primary),
		}
	}

	pub fn is_multimodal(self) -> bool {
		!matches!(self, Self::TextOnly)
	}
}

/// Picks the case from what was supplied. `modalities` may contain `Text`, which is ignored.
pub fn classify(has_text: bool, modalities: &[Modality]) -> Result<SearchCase> {
	let primary =
		Modality::PRECEDENCE.into_iter().find(|modality| modalities.contains(modality));

	match (has_text, primary) {
		(true, None) => Ok(SearchCase::TextOnly),
		(false, Some(primary)) => Ok(SearchCase::ModalOnly { primary }),
		(true, Some(primary)) => Ok(SearchCase::TextAndModal { primary }),
		(false, None) => Err(Error::InvalidInput {
			message: "Provide at least one of text, sequence, image, structure, or article."
				.to_string(),
		}),
	}
}

/// Response label such as `text_only`, `sequence`, or `text_image`.
pub fn input_type_label(has_text: bool, modalities: &[Modality]) -> String {
	let mut parts: Vec<&str> = Vec::new();

	if has_text {
		parts.push(Modality::Text.as_str());
	}

	parts.extend(
		Modality::PRECEDENCE
			.into_iter()
			.filter(|modality| modalities.contains(modality))
			.map(Modality::as_str),
	);

	if parts == [Modality::Text.as_str()] {
		return "text_only".to_string();
	}

	parts.join("_")
}
