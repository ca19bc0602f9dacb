//! Wire types for the inference proxy.

use palaver_core::config::ProxyConfig;
use palaver_core::history::Utterance;
use palaver_core::types::EntityId;
use serde::Serialize;
use serde_json::{json, Value};

/// Per-client request parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSettings {
    /// Model name forwarded to the proxy.
    pub model: String,
    /// Default system prompt (may be blank).
    pub system_prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Token budget.
    pub max_tokens: u32,
}

impl RequestSettings {
    /// Take the request parameters from proxy configuration.
    #[must_use]
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            model: config.model_name.trim().to_string(),
            system_prompt: config.system_prompt.trim().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// One message in the request's `messages` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireMessage {
    /// `user` or `assistant`.
    pub role: &'static str,
    /// Message text.
    pub content: String,
}

/// The request body POSTed to the proxy.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyRequest {
    /// Model name.
    pub model: String,
    /// Effective system prompt.
    pub system: String,
    /// History followed by the new prompt.
    pub messages: Vec<WireMessage>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Token budget.
    pub max_tokens: u32,
    /// Structured-output contract.
    pub response_format: Value,
}

impl ProxyRequest {
    /// Build a request from a history snapshot and the new prompt.
    #[must_use]
    pub fn build(settings: &RequestSettings, system: &str, history: &[Utterance], prompt: &str) -> Self {
        let messages = history
            .iter()
            .map(|u| WireMessage {
                role: u.role.wire_role(),
                content: u.content.clone(),
            })
            .chain(std::iter::once(WireMessage {
                role: "user",
                content: prompt.to_string(),
            }))
            .collect();

        Self {
            model: settings.model.clone(),
            system: system.to_string(),
            messages,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            response_format: answer_schema(),
        }
    }

    /// The text of the final (new) user message.
    #[must_use]
    pub fn prompt(&self) -> &str {
        self.messages.last().map_or("", |m| m.content.as_str())
    }
}

/// The `response_format` block requiring `{ "answer": string }`.
#[must_use]
pub fn answer_schema() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "schema": {
                "type": "object",
                "properties": {
                    "answer": {
                        "type": "string",
                        "description": "The AI\u{2019}s chat reply"
                    }
                },
                "required": ["answer"]
            }
        }
    })
}

/// The single delivery for one `ask` call.
///
/// `token` is opaque to the client; the caller uses it to route the answer
/// back to whatever issued the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion<T> {
    /// Identity the call was made for, if any.
    pub identity: Option<EntityId>,
    /// Resolved answer; empty means "stay silent".
    pub answer: String,
    /// Caller-supplied continuation.
    pub token: T,
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_core::history::Role;

    fn settings() -> RequestSettings {
        RequestSettings::from_config(&ProxyConfig::default())
    }

    #[test]
    fn messages_follow_history_then_prompt() {
        let history = vec![
            Utterance::new(Role::User, "hi"),
            Utterance::new(Role::Assistant, "hello"),
            Utterance::new(Role::System, "Steve joined"),
        ];
        let request = ProxyRequest::build(&settings(), "sys", &history, "what now?");
        let roles: Vec<&str> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["user", "assistant", "user", "user"]);
        assert_eq!(request.prompt(), "what now?");
    }

    #[test]
    fn serialized_body_has_schema_and_fields() {
        let request = ProxyRequest::build(&settings(), "", &[], "hi");
        let body = serde_json::to_value(&request).expect("serializes");
        assert_eq!(body["model"], "default");
        assert_eq!(body["system"], "");
        assert_eq!(body["max_tokens"], 4000);
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(
            body["response_format"]["json_schema"]["schema"]["required"][0],
            "answer"
        );
        assert_eq!(
            body["response_format"]["json_schema"]["schema"]["properties"]["answer"]["type"],
            "string"
        );
    }
}
