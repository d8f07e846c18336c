use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatMessage, CompletionClient, CompletionError, CompletionRequest};
use crate::config::Config;

const STRUCTURED_TOOL: &str = "structured_response";

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
            config.openai_model.clone(),
            config.completion_max_tokens,
        )
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest) -> RequestBody<'a> {
        let (tools, tool_choice) = match &request.schema {
            Some(schema) => (
                Some(vec![Tool {
                    kind: "function",
                    function: FunctionSpec {
                        name: STRUCTURED_TOOL,
                        description: Some("Return a structured response according to the schema"),
                        parameters: Some(schema),
                    },
                }]),
                Some(ToolChoice {
                    kind: "function",
                    function: FunctionSpec {
                        name: STRUCTURED_TOOL,
                        description: None,
                        parameters: None,
                    },
                }),
            ),
            None => (None, None),
        };

        RequestBody {
            model: &self.model,
            messages: &request.messages,
            max_completion_tokens: self.max_tokens,
            tools,
            tool_choice,
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        if request.messages.is_empty() {
            return Err(CompletionError::NoMessages);
        }

        debug!("Requesting completion for {} messages", request.messages.len());

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.body(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ResponseBody = response.json().await?;
        extract_text(parsed)
    }
}

/// Tool-call arguments win over message content; blank text counts as empty.
fn extract_text(response: ResponseBody) -> Result<String, CompletionError> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or(CompletionError::Empty)?;

    let text = message
        .tool_calls
        .into_iter()
        .flatten()
        .next()
        .map(|call| call.function.arguments)
        .or(message.content)
        .unwrap_or_default();

    if text.trim().is_empty() {
        Err(CompletionError::Empty)
    } else {
        Ok(text)
    }
}

#[derive(Serialize)]
struct RequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice<'a>>,
}

#[derive(Serialize)]
struct Tool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionSpec<'a>,
}

#[derive(Serialize)]
struct ToolChoice<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionSpec<'a>,
}

#[derive(Serialize)]
struct FunctionSpec<'a> {
    name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a serde_json::Value>,
}

#[derive(Deserialize)]
struct ResponseBody {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Deserialize)]
struct FunctionCall {
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::structured_response_schema;

    fn parse(json: serde_json::Value) -> Result<String, CompletionError> {
        extract_text(serde_json::from_value(json).unwrap())
    }

    #[test]
    fn reads_message_content() {
        let text = parse(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Be still." } }]
        }));
        assert_eq!(text.unwrap(), "Be still.");
    }

    #[test]
    fn prefers_tool_call_arguments() {
        let text = parse(serde_json::json!({
            "choices": [{ "message": {
                "content": null,
                "tool_calls": [{ "id": "1", "type": "function",
                    "function": { "name": "structured_response", "arguments": "{\"message\":\"hi\"}" } }]
            } }]
        }));
        assert_eq!(text.unwrap(), "{\"message\":\"hi\"}");
    }

    #[test]
    fn missing_or_blank_content_is_empty() {
        assert!(matches!(parse(serde_json::json!({ "choices": [] })), Err(CompletionError::Empty)));
        assert!(matches!(
            parse(serde_json::json!({ "choices": [{ "message": { "content": "  " } }] })),
            Err(CompletionError::Empty)
        ));
    }

    #[test]
    fn plain_request_has_no_tools() {
        let client = OpenAiClient::new("http://localhost/v1/", "key", "model", 1500);
        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]);

        let body = serde_json::to_value(client.body(&request)).unwrap();

        assert_eq!(body["model"], "model");
        assert_eq!(body["max_completion_tokens"], 1500);
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("tools").is_none());
        assert_eq!(client.base_url, "http://localhost/v1");
    }

    #[test]
    fn structured_request_forces_the_tool() {
        let client = OpenAiClient::new("http://localhost/v1", "key", "model", 1500);
        let request = CompletionRequest::new(vec![ChatMessage::user("hi")])
            .with_schema(structured_response_schema());

        let body = serde_json::to_value(client.body(&request)).unwrap();

        assert_eq!(body["tools"][0]["function"]["name"], STRUCTURED_TOOL);
        assert_eq!(body["tools"][0]["function"]["parameters"]["required"][0], "message");
        assert_eq!(body["tool_choice"]["function"]["name"], STRUCTURED_TOOL);
        assert!(body["tool_choice"]["function"].get("parameters").is_none());
    }

    #[tokio::test]
    async fn refuses_empty_message_list() {
        let client = OpenAiClient::new("http://localhost/v1", "key", "model", 1500);
        let result = client.complete(CompletionRequest::default()).await;
        assert!(matches!(result, Err(CompletionError::NoMessages)));
    }
}
