//! `openai.calculate_usage_cost`: summarize a JSONL usage log and price it.
//!
//! The log is a stream of `openai_call` events. Vision-slide calls carry
//! token usage; audio-transcription calls carry transcribed seconds.
//! Pricing is caller-supplied because model prices change over time.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::registry::{Capability, CapabilityError, ResolutionError};

const ERROR_CODE: &str = "usage_cost_error";

pub(crate) fn construct() -> Result<Arc<dyn Capability>, ResolutionError> {
    Ok(Arc::new(CalculateUsageCost))
}

#[derive(Debug, Deserialize)]
struct Input {
    usage_log_path: String,
    #[serde(default)]
    pricing: Option<Pricing>,
    #[serde(default = "default_true")]
    fail_on_unknown_model: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct Pricing {
    #[serde(default = "default_currency")]
    currency: String,
    #[serde(default)]
    token_models: BTreeMap<String, TokenPrice>,
    #[serde(default)]
    audio_models: BTreeMap<String, AudioPrice>,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Deserialize)]
struct TokenPrice {
    input_per_1m: f64,
    output_per_1m: f64,
}

#[derive(Debug, Deserialize)]
struct AudioPrice {
    per_minute: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct TokenTotals {
    calls: u64,
    input_tokens: u64,
    output_tokens: u64,
    total_tokens: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct AudioTotals {
    calls: u64,
    audio_seconds: f64,
}

fn usage_error(message: impl Into<String>) -> CapabilityError {
    CapabilityError::new(ERROR_CODE, message)
}

fn read_jsonl(path: &PathBuf) -> Result<Vec<Value>, CapabilityError> {
    let text = fs::read_to_string(path)
        .map_err(|_| usage_error(format!("usage log not found: {}", path.display())))?;
    let mut events = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: Value = serde_json::from_str(line)
            .map_err(|e| usage_error(format!("invalid JSON on line {}: {}", line_no + 1, e)))?;
        events.push(event);
    }
    Ok(events)
}

fn as_u64(value: &Value) -> u64 {
    value
        .as_u64()
        .or_else(|| value.as_f64().map(|f| f as u64))
        .unwrap_or(0)
}

fn is_ok_call(event: &Value, kind: &str) -> bool {
    event["type"] == "openai_call" && event["status"] == "ok" && event["kind"] == kind
}

fn event_model(event: &Value) -> String {
    event["model"].as_str().unwrap_or("").trim().to_string()
}

fn sum_tokens_by_model(events: &[Value]) -> BTreeMap<String, TokenTotals> {
    let mut out: BTreeMap<String, TokenTotals> = BTreeMap::new();
    for event in events {
        if !is_ok_call(event, "vision_slide") {
            continue;
        }
        let usage = &event["usage"];
        let input = as_u64(&usage["input_tokens"]);
        let output = as_u64(&usage["output_tokens"]);
        let total = match as_u64(&usage["total_tokens"]) {
            0 => input + output,
            total => total,
        };
        let entry = out.entry(event_model(event)).or_default();
        entry.calls += 1;
        entry.input_tokens += input;
        entry.output_tokens += output;
        entry.total_tokens += total;
    }
    out
}

fn sum_audio_by_model(events: &[Value]) -> BTreeMap<String, AudioTotals> {
    let mut out: BTreeMap<String, AudioTotals> = BTreeMap::new();
    for event in events {
        if !is_ok_call(event, "audio_transcription") {
            continue;
        }
        let seconds = event["meta"]["audio_seconds"].as_f64().unwrap_or(0.0);
        let entry = out.entry(event_model(event)).or_default();
        entry.calls += 1;
        entry.audio_seconds += seconds;
    }
    out
}

fn token_cost(totals: &TokenTotals, price: &TokenPrice) -> f64 {
    (totals.input_tokens as f64 / 1_000_000.0) * price.input_per_1m
        + (totals.output_tokens as f64 / 1_000_000.0) * price.output_per_1m
}

/// Sums token and audio usage per model from a JSONL log and, when a
/// pricing table is supplied, computes the estimated cost.
pub struct CalculateUsageCost;

impl Capability for CalculateUsageCost {
    fn id(&self) -> &str {
        "openai.calculate_usage_cost"
    }

    fn invoke(&self, payload: Value) -> Result<Value, CapabilityError> {
        let input: Input = serde_json::from_value(payload)
            .map_err(|e| CapabilityError::new("invalid_arguments", e.to_string()))?;

        let path = PathBuf::from(&input.usage_log_path);
        let events = read_jsonl(&path)?;
        let token_by_model = sum_tokens_by_model(&events);
        let audio_by_model = sum_audio_by_model(&events);

        let currency = input
            .pricing
            .as_ref()
            .map_or_else(default_currency, |p| p.currency.clone());
        let mut total_cost: Option<f64> = input.pricing.as_ref().map(|_| 0.0);
        let mut unknown_models: Vec<String> = Vec::new();
        let mut line_items: Vec<Value> = Vec::new();

        for (model, totals) in &token_by_model {
            let mut unit_prices = Value::Null;
            let mut cost = Value::Null;
            if let Some(pricing) = &input.pricing {
                match pricing.token_models.get(model) {
                    Some(price) => {
                        unit_prices = json!({
                            "input_per_1m": price.input_per_1m,
                            "output_per_1m": price.output_per_1m,
                        });
                        let item_cost = token_cost(totals, price);
                        cost = json!(item_cost);
                        total_cost = Some(total_cost.unwrap_or(0.0) + item_cost);
                    }
                    None => {
                        if input.fail_on_unknown_model {
                            return Err(usage_error(format!(
                                "missing token pricing for model: {model}"
                            )));
                        }
                        unknown_models.push(model.clone());
                    }
                }
            }
            line_items.push(json!({
                "model": model,
                "kind": "tokens",
                "calls": totals.calls,
                "input_tokens": totals.input_tokens,
                "output_tokens": totals.output_tokens,
                "total_tokens": totals.total_tokens,
                "audio_seconds": 0.0,
                "audio_minutes": 0.0,
                "unit_prices": unit_prices,
                "cost": cost,
            }));
        }

        for (model, totals) in &audio_by_model {
            let mut unit_prices = Value::Null;
            let mut cost = Value::Null;
            if let Some(pricing) = &input.pricing {
                match pricing.audio_models.get(model) {
                    Some(price) => {
                        unit_prices = json!({"per_minute": price.per_minute});
                        let item_cost = (totals.audio_seconds / 60.0) * price.per_minute;
                        cost = json!(item_cost);
                        total_cost = Some(total_cost.unwrap_or(0.0) + item_cost);
                    }
                    None => {
                        if input.fail_on_unknown_model {
                            return Err(usage_error(format!(
                                "missing audio pricing for model: {model}"
                            )));
                        }
                        unknown_models.push(model.clone());
                    }
                }
            }
            line_items.push(json!({
                "model": model,
                "kind": "audio_minutes",
                "calls": totals.calls,
                "input_tokens": 0,
                "output_tokens": 0,
                "total_tokens": 0,
                "audio_seconds": totals.audio_seconds,
                "audio_minutes": totals.audio_seconds / 60.0,
                "unit_prices": unit_prices,
                "cost": cost,
            }));
        }

        let summary = json!({
            "total_input_tokens": token_by_model.values().map(|t| t.input_tokens).sum::<u64>(),
            "total_output_tokens": token_by_model.values().map(|t| t.output_tokens).sum::<u64>(),
            "total_tokens": token_by_model.values().map(|t| t.total_tokens).sum::<u64>(),
            "total_audio_seconds": audio_by_model.values().map(|t| t.audio_seconds).sum::<f64>(),
            "total_audio_minutes": audio_by_model.values().map(|t| t.audio_seconds).sum::<f64>() / 60.0,
        });

        unknown_models.sort();
        unknown_models.dedup();

        Ok(json!({
            "currency": currency,
            "total_cost": total_cost,
            "summary": summary,
            "line_items": line_items,
            "unknown_models": unknown_models,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_log(lines: &[Value]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn vision_event(model: &str, input: u64, output: u64) -> Value {
        json!({
            "type": "openai_call",
            "status": "ok",
            "kind": "vision_slide",
            "model": model,
            "usage": {"input_tokens": input, "output_tokens": output},
        })
    }

    #[test]
    fn test_summary_without_pricing() {
        let log = write_log(&[
            vision_event("gpt-vision", 1000, 500),
            vision_event("gpt-vision", 2000, 1000),
            json!({"type": "openai_call", "status": "error", "kind": "vision_slide",
                   "model": "gpt-vision", "usage": {"input_tokens": 999}}),
        ]);

        let result = CalculateUsageCost
            .invoke(json!({"usage_log_path": log.path()}))
            .unwrap();

        assert_eq!(result["total_cost"], Value::Null);
        assert_eq!(result["currency"], "USD");
        assert_eq!(result["summary"]["total_input_tokens"], 3000);
        assert_eq!(result["summary"]["total_output_tokens"], 1500);
        let items = result["line_items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["calls"], 2);
        assert_eq!(items[0]["cost"], Value::Null);
    }

    #[test]
    fn test_cost_with_pricing() {
        let log = write_log(&[
            vision_event("gpt-vision", 1_000_000, 500_000),
            json!({
                "type": "openai_call",
                "status": "ok",
                "kind": "audio_transcription",
                "model": "whisper",
                "meta": {"audio_seconds": 120.0},
            }),
        ]);

        let result = CalculateUsageCost
            .invoke(json!({
                "usage_log_path": log.path(),
                "pricing": {
                    "currency": "EUR",
                    "token_models": {"gpt-vision": {"input_per_1m": 2.0, "output_per_1m": 6.0}},
                    "audio_models": {"whisper": {"per_minute": 0.01}},
                },
            }))
            .unwrap();

        assert_eq!(result["currency"], "EUR");
        // 1M input @ 2.0 + 0.5M output @ 6.0 + 2 min @ 0.01
        let total = result["total_cost"].as_f64().unwrap();
        assert!((total - 5.02).abs() < 1e-9, "{total}");
        let items = result["line_items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["kind"], "audio_minutes");
        assert_eq!(items[1]["audio_minutes"], 2.0);
    }

    #[test]
    fn test_unknown_model_fails_by_default() {
        let log = write_log(&[vision_event("mystery", 10, 10)]);
        let err = CalculateUsageCost
            .invoke(json!({
                "usage_log_path": log.path(),
                "pricing": {"token_models": {}},
            }))
            .unwrap_err();
        assert_eq!(err.code, ERROR_CODE);
        assert!(err.message.contains("mystery"));
    }

    #[test]
    fn test_unknown_model_collected_when_allowed() {
        let log = write_log(&[vision_event("mystery", 10, 10)]);
        let result = CalculateUsageCost
            .invoke(json!({
                "usage_log_path": log.path(),
                "pricing": {"token_models": {}},
                "fail_on_unknown_model": false,
            }))
            .unwrap();
        assert_eq!(result["unknown_models"], json!(["mystery"]));
    }

    #[test]
    fn test_missing_log_is_declared_error() {
        let err = CalculateUsageCost
            .invoke(json!({"usage_log_path": "/nonexistent/usage.jsonl"}))
            .unwrap_err();
        assert_eq!(err.code, ERROR_CODE);
        assert!(err.message.contains("usage log not found"));
    }

    #[test]
    fn test_bad_jsonl_line_reports_line_number() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", vision_event("m", 1, 1)).unwrap();
        writeln!(file, "{{broken").unwrap();
        file.flush().unwrap();

        let err = CalculateUsageCost
            .invoke(json!({"usage_log_path": file.path()}))
            .unwrap_err();
        assert!(err.message.contains("line 2"), "{}", err.message);
    }
}
