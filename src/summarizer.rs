//! Summarizer collaborators used at ingestion time.
//!
//! - **builtin**: [`TruncatingSummarizer`] from the core crate (leading
//!   sentences, ellipsis-truncated).
//! - **http**: [`HttpSummarizer`], which posts a prompt to a completion
//!   endpoint and reads the summary back out of the JSON response.
//!
//! The HTTP summarizer never fails a tree build. Transport errors, non-2xx
//! statuses, undecodable bodies and unrecognised response shapes are logged
//! with `warn!` and the built-in summary is returned instead.
//!
//! # Blocking I/O
//!
//! [`HttpSummarizer`] uses `reqwest::blocking` because the core
//! [`Summarizer`] contract is synchronous. Construct, use and drop it on a
//! blocking thread (see [`crate::ingest`], which runs tree builds inside
//! [`tokio::task::spawn_blocking`]).
//!
//! # Response shapes
//!
//! The first match wins:
//!
//! | Shape | Example |
//! |-------|---------|
//! | top-level string | `{"summary": "…"}`, `{"text": "…"}`, `{"output": "…"}` |
//! | completion | `{"choices": [{"text": "…"}]}` |
//! | chat (string) | `{"choices": [{"message": "…"}]}` |
//! | chat (object) | `{"choices": [{"message": {"content": "…"}}]}` |

use anyhow::{bail, Context, Result};
use lextree_core::summarize::{Summarizer, TruncatingSummarizer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::SummarizerConfig;

/// Summarizer backed by an HTTP completion endpoint.
pub struct HttpSummarizer {
    client: reqwest::blocking::Client,
    url: String,
    model: Option<String>,
    api_key: Option<String>,
    template: String,
    fallback: TruncatingSummarizer,
}

impl HttpSummarizer {
    /// Build from configuration. The bearer token is read from the
    /// environment variable named by `api_key_env`, if it is set.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is missing or the HTTP client cannot be
    /// constructed.
    pub fn new(config: &SummarizerConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow::anyhow!("summarizer.url required for http provider"))?;

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client for summarizer")?;

        Ok(Self {
            client,
            url,
            model: config.model.clone(),
            api_key,
            template: config.template.clone(),
            fallback: TruncatingSummarizer::new(config.max_sentences, config.max_chars),
        })
    }

    fn prompt(&self, text: &str) -> String {
        self.template.replace("{text}", text)
    }

    fn request(&self, text: &str) -> Result<String> {
        let mut body = serde_json::json!({ "prompt": self.prompt(text) });
        if let Some(model) = &self.model {
            body["model"] = Value::String(model.clone());
        }

        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().unwrap_or_default();
            bail!("Summarizer API error {}: {}", status, body_text);
        }

        let json: Value = response.json()?;
        extract_summary(&json)
            .ok_or_else(|| anyhow::anyhow!("Summarizer response has no recognised summary field"))
    }
}

impl Summarizer for HttpSummarizer {
    fn summarize(&self, text: &str) -> String {
        match self.request(text) {
            Ok(summary) => summary,
            Err(e) => {
                warn!(url = %self.url, error = %e, "summarizer request failed, using built-in summary");
                self.fallback.summarize(text)
            }
        }
    }
}

/// Pull a summary string out of a completion response.
///
/// Returns `None` when no known field holds a non-blank string.
pub fn extract_summary(json: &Value) -> Option<String> {
    let top_level = ["summary", "text", "output"]
        .iter()
        .find_map(|key| json.get(key).and_then(Value::as_str));

    let from_choice = || {
        let choice = json.get("choices")?.get(0)?;
        choice
            .get("text")
            .and_then(Value::as_str)
            .or_else(|| choice.get("message").and_then(Value::as_str))
            .or_else(|| {
                choice
                    .get("message")
                    .and_then(|m| m.get("content"))
                    .and_then(Value::as_str)
            })
    };

    top_level
        .or_else(from_choice)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Create the summarizer selected by `config.provider`.
///
/// # Errors
///
/// Only configuration errors: an unknown provider, or `http` without a
/// URL. Runtime failures of the HTTP provider are absorbed by its fallback.
pub fn create_summarizer(config: &SummarizerConfig) -> Result<Arc<dyn Summarizer>> {
    match config.provider.as_str() {
        "builtin" => Ok(Arc::new(TruncatingSummarizer::new(
            config.max_sentences,
            config.max_chars,
        ))),
        "http" => Ok(Arc::new(HttpSummarizer::new(config)?)),
        other => bail!("Unknown summarizer provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    const SECTION: &str = "First sentence. Second sentence. Third sentence.";

    /// Serve one request with `status` and `body`, sending the raw request
    /// text back over the returned channel.
    fn serve_once(status: &'static str, body: &'static str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/v1/completions", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut request = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
                request.push_str(&line);
                if line == "\r\n" {
                    break;
                }
            }
            let mut payload = vec![0u8; content_length];
            reader.read_exact(&mut payload).unwrap();
            request.push_str(&String::from_utf8_lossy(&payload));

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            reader.get_mut().write_all(response.as_bytes()).unwrap();
            tx.send(request).unwrap();
        });
        (url, rx)
    }

    fn http_config(url: &str) -> SummarizerConfig {
        SummarizerConfig {
            provider: "http".to_string(),
            url: Some(url.to_string()),
            timeout_secs: 2,
            ..SummarizerConfig::default()
        }
    }

    #[test]
    fn test_extract_top_level_fields_in_order() {
        assert_eq!(
            extract_summary(&json!({"summary": " s ", "text": "t"})).as_deref(),
            Some("s")
        );
        assert_eq!(extract_summary(&json!({"text": "t\n"})).as_deref(), Some("t"));
        assert_eq!(extract_summary(&json!({"output": "o"})).as_deref(), Some("o"));
    }

    #[test]
    fn test_extract_choice_shapes() {
        assert_eq!(
            extract_summary(&json!({"choices": [{"text": "completion"}]})).as_deref(),
            Some("completion")
        );
        assert_eq!(
            extract_summary(&json!({"choices": [{"message": "plain"}]})).as_deref(),
            Some("plain")
        );
        assert_eq!(
            extract_summary(&json!({"choices": [{"message": {"role": "assistant", "content": " chat "}}]}))
                .as_deref(),
            Some("chat")
        );
    }

    #[test]
    fn test_extract_unrecognised_shapes() {
        assert!(extract_summary(&json!({})).is_none());
        assert!(extract_summary(&json!({"choices": []})).is_none());
        assert!(extract_summary(&json!({"summary": 42})).is_none());
        assert!(extract_summary(&json!({"summary": "   "})).is_none());
        assert!(extract_summary(&json!(["summary"])).is_none());
    }

    #[test]
    fn test_prompt_fills_template() {
        let summarizer = HttpSummarizer::new(&http_config("http://127.0.0.1:9/v1")).unwrap();
        let prompt = summarizer.prompt("Section text.");
        assert!(prompt.ends_with("\n\nSection text."));
        assert!(!prompt.contains("{text}"));
    }

    #[test]
    fn test_unreachable_endpoint_falls_back() {
        // Port 9 (discard) is closed on test hosts, so the connect fails fast.
        let summarizer = HttpSummarizer::new(&http_config("http://127.0.0.1:9/v1")).unwrap();
        assert_eq!(summarizer.summarize(SECTION), "First sentence. Second sentence.");
    }

    #[test]
    fn test_http_summary_returned_with_model_and_bearer() {
        let (url, requests) = serve_once("200 OK", r#"{"choices":[{"message":{"content":" s "}}]}"#);
        std::env::set_var("LEXTREE_TEST_SUMMARIZER_KEY", "secret-key");
        let config = SummarizerConfig {
            model: Some("summary-model".to_string()),
            api_key_env: "LEXTREE_TEST_SUMMARIZER_KEY".to_string(),
            ..http_config(&url)
        };
        let summarizer = HttpSummarizer::new(&config).unwrap();

        assert_eq!(summarizer.summarize(SECTION), "s");

        let request = requests.recv().unwrap();
        assert!(request.starts_with("POST /v1/completions"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer secret-key"));
        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let json: Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["model"], "summary-model");
        assert!(json["prompt"].as_str().unwrap().ends_with(SECTION));
    }

    #[test]
    fn test_http_without_model_sends_prompt_only() {
        let (url, requests) = serve_once("200 OK", r#"{"summary":"short"}"#);
        let config = SummarizerConfig {
            api_key_env: "LEXTREE_TEST_UNSET_KEY".to_string(),
            ..http_config(&url)
        };
        let summarizer = HttpSummarizer::new(&config).unwrap();
        assert_eq!(summarizer.summarize(SECTION), "short");

        let request = requests.recv().unwrap();
        assert!(!request.to_ascii_lowercase().contains("authorization:"));
        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let json: Value = serde_json::from_str(body).unwrap();
        assert!(json.get("model").is_none());
        assert!(json["prompt"].is_string());
    }

    #[test]
    fn test_http_error_status_falls_back() {
        let (url, _requests) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#);
        let summarizer = HttpSummarizer::new(&http_config(&url)).unwrap();
        assert_eq!(summarizer.summarize(SECTION), "First sentence. Second sentence.");
    }

    #[test]
    fn test_http_unrecognised_body_falls_back() {
        let (url, _requests) = serve_once("200 OK", r#"{"result":"elsewhere"}"#);
        let summarizer = HttpSummarizer::new(&http_config(&url)).unwrap();
        assert_eq!(summarizer.summarize(SECTION), "First sentence. Second sentence.");
    }

    #[test]
    fn test_http_timeout_falls_back() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/v1", listener.local_addr().unwrap());
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let holder = thread::spawn(move || {
            // Accept and hold the connection without answering.
            let conn = listener.accept().unwrap();
            let _ = done_rx.recv();
            drop(conn);
        });

        let config = SummarizerConfig {
            timeout_secs: 1,
            ..http_config(&url)
        };
        let summarizer = HttpSummarizer::new(&config).unwrap();
        assert_eq!(summarizer.summarize(SECTION), "First sentence. Second sentence.");

        done_tx.send(()).unwrap();
        holder.join().unwrap();
    }

    #[test]
    fn test_create_summarizer_selects_provider() {
        let builtin = create_summarizer(&SummarizerConfig::default()).unwrap();
        assert_eq!(builtin.summarize("One. Two. Three."), "One. Two.");

        let missing_url = SummarizerConfig {
            provider: "http".to_string(),
            ..SummarizerConfig::default()
        };
        assert!(create_summarizer(&missing_url).is_err());

        let unknown = SummarizerConfig {
            provider: "oracle".to_string(),
            ..SummarizerConfig::default()
        };
        assert!(create_summarizer(&unknown).is_err());
    }
}
