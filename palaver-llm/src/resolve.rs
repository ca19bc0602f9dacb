//! Reduce a proxy response body to a plain answer string.
//!
//! Proxies in the wild answer in several shapes. Each shape is a matcher
//! over the parsed document; matchers run in order and the first one that
//! recognises the body decides the answer:
//!
//! | # | Shape | Answer |
//! |---|-------|--------|
//! | 1 | `{"error": …}` | `""` |
//! | 2 | `{"answer": "…"}` | the answer |
//! | 3a | `{"choices": [{"data": {"answer": "…"}}]}` | the answer |
//! | 3b | `{"choices": [{"message": {"content": "…"}}]}` | trimmed content, unwrapped if it is itself `{"answer": …}` |
//! | 3c | `{"choices": [{"text": "…"}]}` | the text |
//! | 4 | `{"response": "…"}` | the response |
//! | 5 | anything else | `""` |
//!
//! Unknown extra fields are ignored. Resolution never fails.

use serde_json::Value;

type Matcher = fn(&Value) -> Option<String>;

const MATCHERS: &[(&str, Matcher)] = &[
    ("error", upstream_error),
    ("answer", top_level_answer),
    ("choices.data.answer", choice_data_answer),
    ("choices.message.content", choice_message_content),
    ("choices.text", choice_text),
    ("response", legacy_response),
];

/// Resolve a raw body. Bodies that are not JSON objects yield `""`.
#[must_use]
pub fn resolve_body(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(doc) => resolve_answer(&doc),
        Err(e) => {
            tracing::warn!(error = %e, "Proxy body is not JSON");
            String::new()
        }
    }
}

/// Resolve a parsed body.
#[must_use]
pub fn resolve_answer(doc: &Value) -> String {
    if !doc.is_object() {
        return String::new();
    }
    for (shape, matcher) in MATCHERS {
        if let Some(answer) = matcher(doc) {
            tracing::trace!(shape, "Proxy response shape matched");
            return answer;
        }
    }
    String::new()
}

/// A string field, or `None` if absent or not a string.
fn string_at(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn first_choice(doc: &Value) -> Option<&Value> {
    doc.get("choices")?.as_array()?.first()
}

fn upstream_error(doc: &Value) -> Option<String> {
    doc.get("error").map(|_| String::new())
}

fn top_level_answer(doc: &Value) -> Option<String> {
    string_at(doc, "answer")
}

fn choice_data_answer(doc: &Value) -> Option<String> {
    string_at(first_choice(doc)?.get("data")?, "answer")
}

fn choice_message_content(doc: &Value) -> Option<String> {
    let content = first_choice(doc)?.get("message")?.get("content")?.as_str()?;
    let trimmed = content.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        if let Some(inner) = serde_json::from_str::<Value>(trimmed)
            .ok()
            .and_then(|v| string_at(&v, "answer"))
        {
            return Some(inner);
        }
    }
    Some(trimmed.to_string())
}

fn choice_text(doc: &Value) -> Option<String> {
    string_at(first_choice(doc)?, "text")
}

fn legacy_response(doc: &Value) -> Option<String> {
    string_at(doc, "response")
}
