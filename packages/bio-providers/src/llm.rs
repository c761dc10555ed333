use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

const MAX_ATTEMPTS: usize = 3;

/// Chat completion that must answer with a JSON object. Retries when the content does not parse.
pub async fn complete_json(cfg: &bio_config::LlmProviderConfig, messages: &[Value]) -> Result<Value> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"response_format": { "type": "json_object" },
		"messages": messages,
	});

	for attempt in 1..=MAX_ATTEMPTS {
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		match parse_completion_json(json) {
			Ok(parsed) => return Ok(parsed),
			Err(err) => {
				tracing::warn!(attempt, error = %err, "LLM returned unparseable JSON.");
			},
		}
	}

	Err(eyre::eyre!("LLM response is not valid JSON after {MAX_ATTEMPTS} attempts."))
}

fn parse_completion_json(json: Value) -> Result<Value> {
	if let Some(content) = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
	{
		let parsed: Value = serde_json::from_str(strip_code_fence(content))
			.map_err(|_| eyre::eyre!("LLM content is not valid JSON."))?;

		if !parsed.is_object() {
			return Err(eyre::eyre!("LLM content must be a JSON object."));
		}

		return Ok(parsed);
	}

	if json.is_object() && json.get("choices").is_none() {
		return Ok(json);
	}

	Err(eyre::eyre!("LLM response is missing message content."))
}

/// Removes a surrounding Markdown code fence, with or without a language tag.
pub fn strip_code_fence(content: &str) -> &str {
	let trimmed = content.trim();
	let Some(rest) = trimmed.strip_prefix("```") else { return trimmed };
	let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");

	rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
