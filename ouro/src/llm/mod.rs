//! LLM Client module for Ouro
//!
//! Provides the provider-agnostic client trait and one implementation per
//! supported provider.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod gemini;
mod openai;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use gemini::GeminiClient;
pub use openai::OpenAIClient;
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage};

use crate::config::{LlmConfig, ResolvedLlmConfig};

/// Default wait reported for a 429 without a usable retry-after header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Create an LLM client based on the provider specified in config
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let resolved = config.resolve().map_err(|e| LlmError::Config(e.to_string()))?;

    create_client_from_resolved(&resolved)
}

/// Create an LLM client from a resolved configuration
pub fn create_client_from_resolved(config: &ResolvedLlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client_from_resolved: called");
    match config.provider.as_str() {
        "gemini" => {
            debug!("create_client_from_resolved: creating Gemini client");
            Ok(Arc::new(GeminiClient::from_config(config)?))
        }
        "anthropic" => {
            debug!("create_client_from_resolved: creating Anthropic client");
            Ok(Arc::new(AnthropicClient::from_config(config)?))
        }
        "openai" => {
            debug!("create_client_from_resolved: creating OpenAI client");
            Ok(Arc::new(OpenAIClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client_from_resolved: unknown provider");
            Err(LlmError::Config(format!(
                "Unknown LLM provider: '{}'. Supported: gemini, anthropic, openai",
                other
            )))
        }
    }
}

/// Map a non-success HTTP response to an [`LlmError`]
///
/// 429 becomes [`LlmError::RateLimited`]; every other failure status becomes
/// [`LlmError::ApiError`] carrying the response body.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }

    if status == 429 {
        debug!("check_status: rate limited (429)");
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(LlmError::RateLimited {
            retry_after: Duration::from_secs(retry_after),
        });
    }

    debug!(%status, "check_status: API error");
    let message = response.text().await.unwrap_or_default();
    Err(LlmError::ApiError { status, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer a single request with `raw` and return the URL to hit
    async fn serve_once(raw: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            socket.write_all(raw.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}/", addr)
    }

    async fn status_of(raw: &'static str) -> Result<reqwest::Response, LlmError> {
        let url = serve_once(raw).await;
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let response = client.get(&url).send().await.unwrap();
        check_status(response).await
    }

    #[tokio::test]
    async fn test_check_status_rate_limit_reads_retry_after() {
        let result = status_of(
            "HTTP/1.1 429 Too Many Requests\r\nretry-after: 7\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        assert!(matches!(
            result,
            Err(LlmError::RateLimited { retry_after }) if retry_after == Duration::from_secs(7)
        ));
    }

    #[tokio::test]
    async fn test_check_status_rate_limit_unparseable_retry_after() {
        let result = status_of(
            "HTTP/1.1 429 Too Many Requests\r\nretry-after: Wed, 21 Oct 2015 07:28:00 GMT\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        assert!(matches!(
            result,
            Err(LlmError::RateLimited { retry_after })
                if retry_after == Duration::from_secs(DEFAULT_RETRY_AFTER_SECS)
        ));
    }

    #[tokio::test]
    async fn test_check_status_server_error_keeps_body() {
        let result = status_of(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 4\r\nconnection: close\r\n\r\nboom",
        )
        .await;
        assert!(matches!(
            result,
            Err(LlmError::ApiError { status: 500, ref message }) if message == "boom"
        ));
    }

    #[tokio::test]
    async fn test_check_status_success_passes_through() {
        let result = status_of("HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok").await;
        let response = result.unwrap();
        assert_eq!(response.text().await.unwrap(), "ok");
    }

    #[test]
    fn test_create_client_unknown_provider() {
        let config = LlmConfig {
            provider: "nope".to_string(),
            ..Default::default()
        };
        let result = create_client(&config);
        assert!(matches!(result, Err(LlmError::Config(_))));
    }

    #[test]
    fn test_create_client_missing_key() {
        let resolved = ResolvedLlmConfig {
            provider: "gemini".to_string(),
            model: "gemini-1.5-pro".to_string(),
            api_key_env: "OURO_TEST_UNSET_KEY_FOR_CLIENT".to_string(),
            base_url: "http://localhost".to_string(),
            max_tokens: 100,
            timeout_ms: 1000,
        };
        let result = create_client_from_resolved(&resolved);
        assert!(matches!(result, Err(LlmError::Config(msg)) if msg.contains("OURO_TEST_UNSET_KEY_FOR_CLIENT")));
    }
}
