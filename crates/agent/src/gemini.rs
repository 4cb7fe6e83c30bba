//! Google Gemini `generateContent` client with function calling.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use delicia_core::conversation::{ChatTurn, ToolInvocation};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use crate::llm::{ChatRequest, ChatResponse, LlmClient, ToolChoice};

#[derive(Clone, Debug)]
pub struct GeminiSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: SecretString,
    pub temperature: f32,
    pub timeout: Duration,
}

pub struct GeminiClient {
    settings: GeminiSettings,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient").field("model", &self.settings.model).finish()
    }
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        )
    }

    pub fn build_request_body(&self, request: &ChatRequest) -> Value {
        let mut contents = contents_for(&request.turns);
        let mut body = json!({
            "generationConfig": { "temperature": self.settings.temperature },
        });

        // generateContent rejects an empty `contents`; a bare instruction becomes the user turn.
        if contents.is_empty() {
            contents.push(json!({ "role": "user", "parts": [{ "text": request.system }] }));
        } else if !request.system.trim().is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": request.system }] });
        }
        body["contents"] = Value::Array(contents);

        if !request.tools.is_empty() {
            let declarations = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    })
                })
                .collect::<Vec<_>>();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
            body["toolConfig"] =
                json!({ "functionCallingConfig": calling_config(&request.tool_choice) });
        }

        body
    }
}

fn calling_config(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!({ "mode": "AUTO" }),
        ToolChoice::None => json!({ "mode": "NONE" }),
        ToolChoice::Required { allowed } => {
            json!({ "mode": "ANY", "allowedFunctionNames": allowed })
        }
    }
}

/// Maps the conversation log onto Gemini contents. Consecutive tool results share one
/// `user` entry so each model function-call turn is answered by a single response turn.
fn contents_for(turns: &[ChatTurn]) -> Vec<Value> {
    let mut contents: Vec<Value> = Vec::new();
    let mut pending_responses: Vec<Value> = Vec::new();

    let flush = |contents: &mut Vec<Value>, pending: &mut Vec<Value>| {
        if !pending.is_empty() {
            contents.push(json!({ "role": "user", "parts": std::mem::take(pending) }));
        }
    };

    for turn in turns {
        match turn {
            ChatTurn::ToolResult { tool_name, text, .. } => {
                pending_responses.push(json!({
                    "functionResponse": {
                        "name": tool_name,
                        "response": { "result": text },
                    }
                }));
            }
            ChatTurn::Human { text } => {
                flush(&mut contents, &mut pending_responses);
                if !text.trim().is_empty() {
                    contents.push(json!({ "role": "user", "parts": [{ "text": text }] }));
                }
            }
            ChatTurn::Assistant { text, tool_calls } => {
                flush(&mut contents, &mut pending_responses);
                let mut parts = Vec::new();
                if !text.trim().is_empty() {
                    parts.push(json!({ "text": text }));
                }
                for call in tool_calls {
                    parts.push(json!({
                        "functionCall": { "name": call.name, "args": call.arguments }
                    }));
                }
                if !parts.is_empty() {
                    contents.push(json!({ "role": "model", "parts": parts }));
                }
            }
        }
    }
    flush(&mut contents, &mut pending_responses);

    contents
}

pub fn parse_response(parsed: &Value) -> Result<ChatResponse> {
    let candidate = parsed
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .ok_or_else(|| {
            let reason = parsed
                .pointer("/promptFeedback/blockReason")
                .and_then(Value::as_str)
                .unwrap_or("no candidates");
            anyhow!("Gemini returned no candidates ({reason})")
        })?;

    let mut response = ChatResponse::default();
    let parts = candidate.pointer("/content/parts").and_then(Value::as_array);
    for part in parts.into_iter().flatten() {
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            response.text.push_str(text);
        }
        if let Some(call) = part.get("functionCall") {
            let name = call.get("name").and_then(Value::as_str).unwrap_or_default();
            let id = call
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
            let arguments = call.get("args").cloned().unwrap_or_else(|| json!({}));
            response.tool_calls.push(ToolInvocation::new(id, name, arguments));
        }
    }

    Ok(response)
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        let body = self.build_request_body(&request);

        tracing::debug!(
            event_name = "llm.gemini.request",
            model = %self.settings.model,
            turn_count = request.turns.len(),
            tool_count = request.tools.len(),
            "calling Gemini generateContent"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.settings.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("failed to call Gemini API")?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            bail!("Gemini API error (HTTP {status}): {detail}");
        }

        let parsed: Value = response.json().await.context("Gemini response was not JSON")?;
        parse_response(&parsed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use delicia_core::conversation::{ChatTurn, ToolInvocation};
    use serde_json::json;

    use super::{parse_response, GeminiClient, GeminiSettings};
    use crate::llm::{ChatRequest, ToolChoice, ToolSpec};

    fn client() -> GeminiClient {
        GeminiClient::new(GeminiSettings {
            base_url: "https://gemini.test/".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: "key-123".to_string().into(),
            temperature: 0.0,
            timeout: Duration::from_secs(5),
        })
        .expect("client")
    }

    fn menu_tool() -> ToolSpec {
        ToolSpec {
            name: "consultar_menu_y_horarios".to_string(),
            description: "Busca en el menú".to_string(),
            parameters: json!({"type": "object"}),
        }
    }

    #[test]
    fn request_body_maps_turns_tools_and_choice() {
        let request = ChatRequest {
            system: "Eres Bruno".to_string(),
            turns: vec![
                ChatTurn::human("¿Tienen opciones vegetarianas?"),
                ChatTurn::assistant_with_calls(
                    "",
                    vec![ToolInvocation::new(
                        "c1",
                        "consultar_menu_y_horarios",
                        json!({"query": "vegetariano"}),
                    )],
                ),
                ChatTurn::tool_result("c1", "consultar_menu_y_horarios", "Risotto de Hongos"),
                ChatTurn::human("   "),
            ],
            tools: vec![menu_tool()],
            tool_choice: ToolChoice::Auto,
        };

        let body = client().build_request_body(&request);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Eres Bruno");
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
        let contents = body["contents"].as_array().expect("contents");
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["functionCall"]["args"]["query"], "vegetariano");
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["response"]["result"],
            "Risotto de Hongos"
        );
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "consultar_menu_y_horarios"
        );
        assert_eq!(body["toolConfig"]["functionCallingConfig"]["mode"], "AUTO");
    }

    #[test]
    fn forced_choice_lists_allowed_function_names() {
        let request = ChatRequest {
            system: "Eres el Capitán".to_string(),
            turns: vec![ChatTurn::human("Analiza")],
            tools: vec![menu_tool()],
            tool_choice: ToolChoice::Required {
                allowed: vec!["guardar_informe_en_notion".to_string()],
            },
        };

        let body = client().build_request_body(&request);
        let config = &body["toolConfig"]["functionCallingConfig"];

        assert_eq!(config["mode"], "ANY");
        assert_eq!(config["allowedFunctionNames"], json!(["guardar_informe_en_notion"]));
    }

    #[test]
    fn instruction_only_request_becomes_a_user_turn() {
        let request = ChatRequest {
            system: "Despídete brevemente.".to_string(),
            turns: Vec::new(),
            tools: Vec::new(),
            tool_choice: ToolChoice::None,
        };

        let body = client().build_request_body(&request);

        assert!(body.get("systemInstruction").is_none());
        assert!(body.get("tools").is_none());
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Despídete brevemente.");
    }

    #[test]
    fn response_text_and_function_calls_are_extracted() {
        let parsed = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Un momento, "},
                        {"text": "consulto el menú."},
                        {"functionCall": {
                            "name": "consultar_menu_y_horarios",
                            "args": {"query": "postres"}
                        }}
                    ]
                }
            }]
        });

        let response = parse_response(&parsed).expect("parse");

        assert_eq!(response.text, "Un momento, consulto el menú.");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "consultar_menu_y_horarios");
        assert_eq!(response.tool_calls[0].string_argument("query"), Some("postres"));
        assert!(response.tool_calls[0].id.starts_with("call_"));
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let parsed = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let error = parse_response(&parsed).expect_err("no candidates");

        assert!(error.to_string().contains("SAFETY"));
    }

    #[test]
    fn debug_output_hides_the_api_key() {
        assert!(!format!("{:?}", client()).contains("key-123"));
    }
}
