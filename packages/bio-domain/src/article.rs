//! Title and abstract extraction for article text supplied alongside a query.

use regex::Regex;

const MAX_TITLE_CHARS: usize = 500;
const MAX_ABSTRACT_CHARS: usize = 2_000;
const MAX_CONTEXT_CHARS: usize = 3_000;
const HEADINGS: [(&str, &str); 2] = [
	(r"(?i)\babstract\s*[:.]?\s*", r"(?i)introduction|background|keywords|1\.|methods"),
	(r"(?i)\bsummary\s*[:.]?\s*", r"(?i)introduction|background|keywords|1\."),
];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArticleSummary {
	pub title: Option<String>,
	pub abstract_text: Option<String>,
}
impl ArticleSummary {
	pub fn is_empty(&self) -> bool {
		self.title.is_none() && self.abstract_text.is_none()
	}
}

pub fn extract(text: &str) -> ArticleSummary {
	let lines: Vec<&str> = text.lines().collect();
	let title = lines
		.iter()
		.take(10)
		.map(|line| line.trim())
		.find(|line| line.chars().count() > 10)
		.map(|line| truncate_chars(&collapse_whitespace(line), MAX_TITLE_CHARS));
	let abstract_text = find_abstract(text)
		.or_else(|| {
			lines
				.iter()
				.skip(2)
				.take(13)
				.map(|line| line.trim())
				.find(|line| line.chars().count() > 100)
				.map(str::to_string)
		})
		.map(|raw| truncate_chars(&collapse_whitespace(&raw), MAX_ABSTRACT_CHARS))
		.filter(|raw| !raw.is_empty());

	ArticleSummary { title, abstract_text }
}

/// Joins article context and the user's query as "{title}. {abstract}. {query}".
pub fn enhance_query(summary: &ArticleSummary, user_query: Option<&str>) -> Option<String> {
	let mut parts = Vec::new();

	if let Some(title) = summary.title.as_deref() {
		parts.push(title.to_string());
	}
	if let Some(abstract_text) = summary.abstract_text.as_deref() {
		if abstract_text.chars().count() > MAX_CONTEXT_CHARS {
			parts.push(format!("{}...", truncate_chars(abstract_text, MAX_CONTEXT_CHARS)));
		} else {
			parts.push(abstract_text.to_string());
		}
	}
	if let Some(query) = user_query.map(str::trim).filter(|query| !query.is_empty()) {
		parts.push(query.to_string());
	}

	if parts.is_empty() { None } else { Some(parts.join(". ")) }
}

fn find_abstract(text: &str) -> Option<String> {
	for (heading, terminator) in HEADINGS {
		let (Ok(heading), Ok(terminator)) = (Regex::new(heading), Regex::new(terminator)) else {
			continue;
		};
		let Some(start) = heading.find(text) else { continue };
		let body = &text[start.end()..];
		// The body must hold at least one character before the terminator.
		let end = body
			.char_indices()
			.nth(1)
			.and_then(|(offset, _)| terminator.find_at(body, offset))
			.map(|found| found.start());
		let Some(end) = end else { continue };
		let candidate = body[..end].trim();

		if !candidate.is_empty() {
			return Some(candidate.to_string());
		}
	}

	None
}

fn collapse_whitespace(raw: &str) -> String {
	raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(raw: &str, max: usize) -> String {
	raw.chars().take(max).collect()
}
