//! Generative sentence backend over an OpenAI-compatible chat API.

use crate::capability::{GenerationError, SentenceGenerator, Signals};
use crate::types::{BackendDescriptor, BackendKind, CapabilityClass};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that describes human gestures and emotions in Thai language.";
const MAX_TOKENS: u32 = 100;
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Base URL, e.g. `https://api.openai.com`.
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Chat-completions client producing one short Thai sentence per call.
pub struct OpenAiGenerator {
    config: GeneratorConfig,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerationError> {
        if config.api_key.trim().is_empty() {
            return Err(GenerationError::NotConfigured);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn url(&self) -> String {
        format!("{}/v1/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }
}

/// Prompt embedding both signals with their confidences.
pub fn build_prompt(signals: &Signals) -> String {
    let gesture = signals.gesture.as_deref().unwrap_or("unknown");
    let emotion = signals.emotion.as_deref().unwrap_or("neutral");
    let gesture_confidence = signals.gesture_confidence.unwrap_or(0.0);
    let emotion_confidence = signals.emotion_confidence.unwrap_or(0.0);

    format!(
        "Based on the following input, generate a natural, friendly sentence in Thai that describes what you observe:\n\
         \n\
         Hand gesture: {gesture} (confidence: {gesture_confidence:.2})\n\
         Face emotion: {emotion} (confidence: {emotion_confidence:.2})\n\
         \n\
         Generate a short, natural sentence (1-2 sentences) that combines both observations.\n\
         Examples:\n\
         - \"คุณดูมีความสุขและกำลังทักทาย\"\n\
         - \"เห็นท่าทางขอบคุณพร้อมรอยยิ้ม\"\n\
         - \"คุณดูเศร้าและกำลังโบกมือลา\"\n\
         \n\
         Response in Thai only:"
    )
}

/// Pull the trimmed sentence out of a chat-completions body.
fn extract_sentence(body: ChatResponse) -> Result<String, GenerationError> {
    let content = body
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| GenerationError::Malformed("no choices in response".into()))?;
    let sentence = content.trim();
    if sentence.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(sentence.to_string())
}

#[async_trait]
impl SentenceGenerator for OpenAiGenerator {
    async fn generate(&self, signals: &Signals) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_prompt(signals)},
            ],
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
        });

        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(self.config.timeout_secs)
                } else {
                    GenerationError::Http(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Http(format!("HTTP {status} from generative backend")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        let sentence = extract_sentence(parsed)?;
        tracing::debug!(%sentence, model = %self.config.model, "generated sentence");
        Ok(sentence)
    }

    fn identity(&self) -> BackendDescriptor {
        BackendDescriptor {
            name: "OpenAiGenerator".into(),
            version: self.config.model.clone(),
            capability: CapabilityClass::Language,
            kind: BackendKind::Remote,
            loaded: true,
            labels: Vec::new(),
        }
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Composer;
    use crate::types::CompositionSource;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn config(key: &str) -> GeneratorConfig {
        GeneratorConfig {
            endpoint: "https://api.openai.com/".into(),
            model: "gpt-3.5-turbo".into(),
            api_key: key.into(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_prompt_embeds_labels_and_confidences() {
        let prompt = build_prompt(&Signals {
            gesture: Some("hello".into()),
            gesture_confidence: Some(0.953),
            emotion: Some("happy".into()),
            emotion_confidence: Some(0.88),
        });
        assert!(prompt.contains("Hand gesture: hello (confidence: 0.95)"));
        assert!(prompt.contains("Face emotion: happy (confidence: 0.88)"));
    }

    #[test]
    fn test_prompt_defaults_missing_signals() {
        let prompt = build_prompt(&Signals::default());
        assert!(prompt.contains("Hand gesture: unknown (confidence: 0.00)"));
        assert!(prompt.contains("Face emotion: neutral (confidence: 0.00)"));
    }

    #[test]
    fn test_empty_key_is_not_configured() {
        assert!(matches!(OpenAiGenerator::new(config("  ")), Err(GenerationError::NotConfigured)));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let generator = OpenAiGenerator::new(config("sk-test")).unwrap();
        assert_eq!(generator.url(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(generator.identity().kind, BackendKind::Remote);
    }

    #[test]
    fn test_extract_sentence_trims() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "  คุณกำลังทักทาย \n"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_sentence(body).unwrap(), "คุณกำลังทักทาย");
    }

    #[test]
    fn test_extract_sentence_rejects_blank_and_missing() {
        let blank: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "   "}}]}"#).unwrap();
        assert!(matches!(extract_sentence(blank), Err(GenerationError::EmptyResponse)));

        let none: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(extract_sentence(none), Err(GenerationError::Malformed(_))));
    }

    /// Read one HTTP request, headers and `Content-Length` body.
    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return;
            }
        }
    }

    /// Local endpoint answering the first request with a fixed response.
    async fn local_endpoint(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}")
    }

    fn local_generator(endpoint: String, timeout_secs: u64) -> OpenAiGenerator {
        OpenAiGenerator::new(GeneratorConfig {
            endpoint,
            model: "gpt-3.5-turbo".into(),
            api_key: "sk-test".into(),
            timeout_secs,
        })
        .unwrap()
    }

    fn hello_happy() -> Signals {
        Signals {
            gesture: Some("hello".into()),
            gesture_confidence: Some(0.9),
            emotion: Some("happy".into()),
            emotion_confidence: Some(0.8),
        }
    }

    #[tokio::test]
    async fn test_generate_returns_sentence() {
        let endpoint = local_endpoint(
            "200 OK",
            r#"{"choices": [{"message": {"role": "assistant", "content": "สวัสดีครับ"}}]}"#,
        )
        .await;
        let sentence = local_generator(endpoint, 5).generate(&hello_happy()).await.unwrap();
        assert_eq!(sentence, "สวัสดีครับ");
    }

    #[tokio::test]
    async fn test_quota_status_maps_to_http_error() {
        let endpoint = local_endpoint(
            "429 Too Many Requests",
            r#"{"error": {"message": "quota exceeded"}}"#,
        )
        .await;
        let err = local_generator(endpoint, 5).generate(&hello_happy()).await.unwrap_err();
        match err {
            GenerationError::Http(message) => assert!(message.contains("429"), "{message}"),
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_undecodable_body_maps_to_malformed() {
        let endpoint = local_endpoint("200 OK", "<html>gateway error</html>").await;
        let err = local_generator(endpoint, 5).generate(&hello_happy()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_silent_backend_maps_to_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let generator = local_generator(format!("http://{addr}"), 1);
        let err = generator.generate(&hello_happy()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(1)), "{err:?}");
    }

    #[tokio::test]
    async fn test_composer_falls_back_when_quota_exceeded() {
        let endpoint = local_endpoint("429 Too Many Requests", "{}").await;
        let composer = Composer::with_generator(Arc::new(local_generator(endpoint, 5)));
        let result = composer.compose(&hello_happy()).await;
        assert_eq!(result.source, CompositionSource::Template);
        assert_eq!(result.sentence, "คุณดูมีความสุขและกำลังทักทาย");
        assert!((result.confidence - 0.85).abs() < 1e-6);
    }
}
