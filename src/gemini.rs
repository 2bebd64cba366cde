use crate::config::AppConfig;
use crate::models::{GenerateImageRequest, GenerateImageResponse, GenerationRequest, TranslateRequest, TranslateResponse};
use crate::prompt::build_prompt;
use serde_json::json;
use thiserror::Error;
use serde::Deserialize;
use reqwest::Client;
use tracing::{info, error, warn};

pub const GENERATION_FAILED: &str = "画像の生成に失敗しました";
pub const NO_IMAGE_DATA: &str = "画像データが見つかりませんでした";
pub const RATE_LIMITED: &str = "APIの利用制限に達しました。しばらく待ってから再試行してください。";
pub const API_KEY_REQUIRED: &str = "APIキーが必要です";
pub const IMAGE_DATA_REQUIRED: &str = "画像データが必要です";
pub const TEXT_REQUIRED: &str = "テキストが必要です";
pub const INVALID_API_KEY: &str = "APIキーが無効です";
pub const TRANSLATION_FAILED: &str = "翻訳中にエラーが発生しました";

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("HTTP {status}: {body}")] Status { status: u16, body: String },
    #[error("画像の生成に失敗しました")] NoCandidate,
    #[error("画像データが見つかりませんでした")] NoImage,
    #[error("no text content found in response")] NoText,
    #[error("parse error: {0}")] Parse(String),
}

/// Upstream quota or rate-limit failure, recognised by message content.
pub fn is_rate_limited(message: &str) -> bool {
    message.contains("429") || message.contains("quota")
}

pub fn is_invalid_api_key(message: &str) -> bool {
    message.contains("API_KEY")
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            let kept: String = s.chars().take(50).collect();
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", kept, s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn head(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect::<String>() + "..."
}

pub(crate) fn preview(data: &str) -> String {
    let total = data.chars().count();
    if total > 50 {
        format!("{}...[{} chars total]", data.chars().take(50).collect::<String>(), total)
    } else {
        data.to_string()
    }
}

fn image_kind(data: &str) -> &'static str {
    if data.starts_with("iVBORw0KGgo") {
        "PNG"
    } else if data.starts_with("/9j/") {
        "JPEG"
    } else if data.starts_with("UklGR") {
        "WEBP"
    } else {
        "Unknown"
    }
}

/// Thin client over the Gemini REST API. The API key travels with every call.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    image_model: String,
    text_model: String,
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.gemini_api_base.trim_end_matches('/').to_string(),
            image_model: config.image_model.clone(),
            text_model: config.text_model.clone(),
        }
    }

    async fn perform_api_call(&self, api_key: &str, model: &str, request_body: serde_json::Value) -> Result<GeminiResponse, GeminiError> {
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, model, api_key);

        info!("🔗 Making request to: {}", url.replace(api_key, "***"));

        let mut logged_body = request_body.clone();
        truncate_base64_in_json(&mut logged_body);
        info!("📤 Request body: {}", serde_json::to_string_pretty(&logged_body).unwrap_or_default());

        let response = self.client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.to_string().replace(api_key, "***")))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response.text().await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(GeminiError::Status { status: status.as_u16(), body: response_text });
        }

        // Truncate base64 image data for cleaner logging
        let truncated_response = if response_text.len() > 1000 {
            if let Ok(mut json_value) = serde_json::from_str::<serde_json::Value>(&response_text) {
                truncate_base64_in_json(&mut json_value);
                serde_json::to_string_pretty(&json_value).unwrap_or_else(|_| head(&response_text, 1000))
            } else {
                head(&response_text, 1000)
            }
        } else {
            response_text.clone()
        };

        info!("📥 Raw Gemini API response: {}", truncated_response);

        serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Parse(e.to_string()))
    }

    /// Sends one reference image plus instructions and returns the raw base64 of the first image part.
    pub async fn generate_image(&self, api_key: &str, prompt: &str, image_base64: &str, mime_type: &str) -> Result<String, GeminiError> {
        info!("Generating image with Gemini API...");

        let request_body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {"text": prompt},
                    {"inlineData": {"mimeType": mime_type, "data": image_base64}}
                ]
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "candidateCount": 1
            }
        });

        let parsed = self.perform_api_call(api_key, &self.image_model, request_body).await?;
        if parsed.candidates.is_empty() {
            warn!("⚠️ No candidates in API response");
            return Err(GeminiError::NoCandidate);
        }

        let image = extract_first_image_b64(&parsed).ok_or(GeminiError::NoImage)?;
        info!("🖼️ Extracted {} image from API response: {}", image_kind(&image), preview(&image));
        Ok(image)
    }

    pub fn build_translation_prompt(text: &str) -> String {
        format!("以下の日本語テキストを、画像生成AIに適した英語プロンプトに翻訳してください。
翻訳のルール:
- 画像生成に適した、具体的で視覚的な表現を使う
- 曖昧な表現を避け、明確な描写にする
- 翻訳結果のみを出力し、説明は含めない

日本語テキスト:
{text}

英語翻訳:")
    }

    pub async fn translate(&self, api_key: &str, text: &str) -> Result<String, GeminiError> {
        info!("🌐 Translating prompt ({} chars)", text.chars().count());

        let request_body = json!({
            "contents": [{
                "parts": [{"text": Self::build_translation_prompt(text)}]
            }]
        });

        let parsed = self.perform_api_call(api_key, &self.text_model, request_body).await?;
        extract_first_text(&parsed).ok_or(GeminiError::NoText)
    }

    /// Full handling of a generation endpoint call: validation, prompt, upstream call, status mapping.
    pub async fn respond_generate_image(&self, req: &GenerateImageRequest) -> (u16, GenerateImageResponse) {
        if req.api_key.is_empty() {
            return (400, GenerateImageResponse::failure(API_KEY_REQUIRED));
        }
        if req.image_base64.is_empty() || req.mime_type.is_empty() {
            return (400, GenerateImageResponse::failure(IMAGE_DATA_REQUIRED));
        }

        let prompt = match req.prompt.as_deref().filter(|p| !p.is_empty()) {
            Some(prompt) => prompt.to_string(),
            None => build_prompt(&GenerationRequest {
                style: req.style,
                custom_prompt: req.custom_prompt.clone(),
                aspect_ratio: req.aspect_ratio,
                ..Default::default()
            }),
        };

        match self.generate_image(&req.api_key, &prompt, &req.image_base64, &req.mime_type).await {
            Ok(image) => (200, GenerateImageResponse::image(image)),
            Err(e) => {
                error!("❌ Failed to generate image: {}", e);
                let message = e.to_string();
                if is_rate_limited(&message) {
                    (429, GenerateImageResponse::failure(RATE_LIMITED))
                } else {
                    (500, GenerateImageResponse::failure(message))
                }
            }
        }
    }

    pub async fn respond_translate(&self, req: &TranslateRequest) -> (u16, TranslateResponse) {
        let failure = |status: u16, message: &str| {
            (status, TranslateResponse { translated_text: None, error: Some(message.to_string()) })
        };

        let Some(text) = req.text.as_deref().filter(|t| !t.is_empty()) else {
            return failure(400, TEXT_REQUIRED);
        };
        let Some(api_key) = req.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return failure(400, API_KEY_REQUIRED);
        };

        match self.translate(api_key, text).await {
            Ok(translated) => {
                info!("✅ Translation done ({} chars)", translated.chars().count());
                (200, TranslateResponse { translated_text: Some(translated), error: None })
            }
            Err(e) => {
                error!("❌ Translation error: {}", e);
                let message = e.to_string();
                if is_invalid_api_key(&message) {
                    failure(401, INVALID_API_KEY)
                } else if is_rate_limited(&message) {
                    failure(429, RATE_LIMITED)
                } else {
                    failure(500, TRANSLATION_FAILED)
                }
            }
        }
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData
    },
    Text { text: String },
    #[allow(dead_code)]
    Other(serde_json::Value)
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(default)]
    data: String,
    #[serde(rename = "mimeType", default)]
    mime_type: String,
}

fn extract_first_image_b64(resp: &GeminiResponse) -> Option<String> {
    for c in &resp.candidates {
        for p in &c.content.parts {
            if let Part::Inline { inline_data } = p {
                if inline_data.data.is_empty() {
                    continue;
                }
                info!("🎯 Found image data with mime type: {}", inline_data.mime_type);
                return Some(inline_data.data.clone());
            }
        }
    }
    info!("⚠️ No inline image data found in response structure");
    None
}

fn extract_first_text(resp: &GeminiResponse) -> Option<String> {
    resp.candidates
        .first()?
        .content
        .parts
        .iter()
        .find_map(|p| match p {
            Part::Text { text } => Some(text.trim().to_string()),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GenerationStyle;

    fn client() -> GeminiClient {
        GeminiClient::new(&AppConfig {
            gemini_api_base: "http://127.0.0.1:9".into(),
            ..Default::default()
        })
    }

    #[test]
    fn parses_inline_image_part() {
        let resp: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [
                {"text": "here you go"},
                {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgoAAAA"}}
            ]}}]
        })).unwrap();
        assert_eq!(extract_first_image_b64(&resp).as_deref(), Some("iVBORw0KGgoAAAA"));
        assert_eq!(extract_first_text(&resp).as_deref(), Some("here you go"));
    }

    #[test]
    fn missing_image_part_yields_none() {
        let resp: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "sorry"}]}}]
        })).unwrap();
        assert!(extract_first_image_b64(&resp).is_none());
    }

    #[test]
    fn truncates_long_base64_for_logs() {
        let mut value = json!({"parts": [{"inlineData": {"data": "A".repeat(200)}}]});
        truncate_base64_in_json(&mut value);
        let data = value["parts"][0]["inlineData"]["data"].as_str().unwrap();
        assert!(data.ends_with("...[truncated 150 chars]"));
    }

    #[test]
    fn log_helpers_cut_on_char_boundaries() {
        let payload = format!("{}é{}", "A".repeat(49), "B".repeat(10));
        assert_eq!(preview(&payload), format!("{}é...[60 chars total]", "A".repeat(49)));

        let mut value = json!({"data": format!("{}ü{}", "A".repeat(49), "B".repeat(100))});
        truncate_base64_in_json(&mut value);
        assert_eq!(value["data"].as_str().map(|s| s.chars().count()), Some(150));
    }

    #[test]
    fn upstream_failure_classification() {
        let quota = GeminiError::Status { status: 429, body: "RESOURCE_EXHAUSTED".into() };
        assert!(is_rate_limited(&quota.to_string()));
        assert!(is_rate_limited("You exceeded your current quota"));
        assert!(is_invalid_api_key("API_KEY_INVALID"));
        assert!(!is_rate_limited("internal"));
    }

    #[tokio::test]
    async fn generate_endpoint_validates_before_calling_upstream() {
        let gemini = client();
        let (status, body) = gemini.respond_generate_image(&GenerateImageRequest {
            image_base64: "AAAA".into(),
            mime_type: "image/png".into(),
            style: GenerationStyle::Figure,
            ..Default::default()
        }).await;
        assert_eq!(status, 400);
        assert_eq!(body.error.as_deref(), Some(API_KEY_REQUIRED));

        let (status, body) = gemini.respond_generate_image(&GenerateImageRequest {
            api_key: "k".repeat(20),
            mime_type: "image/png".into(),
            ..Default::default()
        }).await;
        assert_eq!(status, 400);
        assert_eq!(body.error.as_deref(), Some(IMAGE_DATA_REQUIRED));
    }

    #[tokio::test]
    async fn translate_endpoint_validates_inputs() {
        let gemini = client();
        let (status, body) = gemini.respond_translate(&TranslateRequest { text: None, api_key: Some("key".into()) }).await;
        assert_eq!(status, 400);
        assert_eq!(body.error.as_deref(), Some(TEXT_REQUIRED));

        let (status, body) = gemini.respond_translate(&TranslateRequest { text: Some("猫".into()), api_key: None }).await;
        assert_eq!(status, 400);
        assert_eq!(body.error.as_deref(), Some(API_KEY_REQUIRED));
    }

    #[test]
    fn translation_prompt_embeds_text() {
        assert!(GeminiClient::build_translation_prompt("青い猫").contains("日本語テキスト:\n青い猫\n"));
    }
}
