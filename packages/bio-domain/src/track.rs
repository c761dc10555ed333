use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// How the bridge judged the user's text against the modality results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
	#[default]
	Aligned,
	Partial,
	Divergent,
}
impl Alignment {
	/// Lenient parse of model output. Anything unrecognized counts as aligned.
	pub fn from_label(raw: &str) -> Self {
		match raw.trim().to_ascii_lowercase().as_str() {
			"partial" => Self::Partial,
			"divergent" => Self::Divergent,
			_ => Self::Aligned,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Aligned => "aligned",
			Self::Partial => "partial",
			Self::Divergent => "divergent",
		}
	}
}

/// Merge strategy for a text+modality request whose two tracks disagree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserChoice {
	Intersection,
	TextPriority,
	ModalPriority,
	#[default]
	MultiTrack,
}
impl UserChoice {
	pub const ALL: [Self; 4] =
		[Self::Intersection, Self::TextPriority, Self::ModalPriority, Self::MultiTrack];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Intersection => "intersection",
			Self::TextPriority => "text_priority",
			Self::ModalPriority => "modal_priority",
			Self::MultiTrack => "multi_track",
		}
	}
}
impl fmt::Display for UserChoice {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for UserChoice {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|choice| choice.as_str() == raw.trim())
			.ok_or_else(|| Error::UnknownChoice { value: raw.to_string() })
	}
}

/// Which search track produced a hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
	Modal,
	Text,
	Bridge,
}
