pub mod doctor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Ask for newline-delimited chunks instead of one JSON object.
    #[serde(default)]
    pub stream: bool,
    /// Upper bound for one round trip, body included. Default 10s.
    pub timeout_ms: Option<u64>,
}

fn default_endpoint() -> String { "http://localhost:11434/api/generate".into() }
fn default_model() -> String { "llama3".into() }

impl Default for OracleConfig {
    fn default() -> Self {
        Self { endpoint: default_endpoint(), model: default_model(), stream: false, timeout_ms: None }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(10_000))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdvisoryError {
    #[error("oracle request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("oracle returned HTTP {0}")]
    Status(u16),

    #[error("oracle reply not understood: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("oracle reply carried no response text")]
    MissingResponse,
}

/// Source of soft, non-deterministic advice.
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Ask once. Never fails: when no usable answer arrives the caller's
    /// `fallback` is returned instead.
    async fn ask(&self, prompt: &str, fallback: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct LinkHealth {
    pub rtt_ms: Option<u32>,
    pub quality: u8,           // 0-100
    pub consecutive_failures: u32,
}

impl Default for LinkHealth {
    fn default() -> Self {
        Self {
            rtt_ms: None,
            quality: 100,
            consecutive_failures: 0,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateChunk {
    response: Option<String>,
    #[serde(default)]
    done: bool,
}

/// Joins the `response` fragments of a streamed reply in arrival order.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    partial: Vec<u8>,
    reply: String,
    fragments: usize,
    done: bool,
}

impl ChunkAssembler {
    /// Feed raw body bytes. Returns true once the final chunk was seen.
    pub fn push(&mut self, bytes: &[u8]) -> Result<bool, AdvisoryError> {
        self.partial.extend_from_slice(bytes);
        while !self.done {
            let Some(nl) = self.partial.iter().position(|b| *b == b'\n') else { break };
            let line: Vec<u8> = self.partial.drain(..=nl).collect();
            self.absorb(&line)?;
        }
        Ok(self.done)
    }

    pub fn finish(mut self) -> Result<String, AdvisoryError> {
        if !self.done {
            let rest = std::mem::take(&mut self.partial);
            self.absorb(&rest)?;
        }
        if self.fragments == 0 {
            return Err(AdvisoryError::MissingResponse);
        }
        Ok(self.reply)
    }

    fn absorb(&mut self, line: &[u8]) -> Result<(), AdvisoryError> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        let chunk: GenerateChunk = serde_json::from_slice(line)?;
        if let Some(fragment) = chunk.response {
            self.reply.push_str(&fragment);
            self.fragments += 1;
        }
        self.done = chunk.done;
        Ok(())
    }
}

/// HTTP client for an Ollama-style `/api/generate` endpoint.
pub struct OracleClient {
    http: reqwest::Client,
    cfg: OracleConfig,
    health: Mutex<LinkHealth>,
}

impl OracleClient {
    pub fn new(cfg: OracleConfig) -> Result<Self, AdvisoryError> {
        let http = reqwest::Client::builder().timeout(cfg.timeout()).build()?;
        Ok(Self { http, cfg, health: Mutex::new(LinkHealth::default()) })
    }

    pub fn link_health(&self) -> LinkHealth {
        self.health.lock().unwrap().clone()
    }

    /// One round trip, no retries. The reply is trimmed.
    pub async fn try_ask(&self, prompt: &str) -> Result<String, AdvisoryError> {
        let start = Instant::now();
        let result = self.generate(prompt).await;

        let mut health = self.health.lock().unwrap();
        match &result {
            Ok(reply) => {
                let rtt = start.elapsed().as_millis() as u32;
                health.rtt_ms = Some(rtt);
                health.consecutive_failures = 0;
                health.quality = (health.quality + 10).min(100);
                info!("advisory: {} chars (RTT: {}ms, quality: {}%)", reply.len(), rtt, health.quality);
            }
            Err(e) => {
                health.consecutive_failures += 1;
                health.quality = health.quality.saturating_sub(20);
                warn!("advisory: call failed (failures: {}, quality: {}%): {}",
                      health.consecutive_failures, health.quality, e);
            }
        }
        result
    }

    async fn generate(&self, prompt: &str) -> Result<String, AdvisoryError> {
        let body = GenerateRequest { model: &self.cfg.model, prompt, stream: self.cfg.stream };
        let mut resp = self.http.post(&self.cfg.endpoint).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AdvisoryError::Status(status.as_u16()));
        }

        let reply = if self.cfg.stream {
            let mut chunks = ChunkAssembler::default();
            while let Some(bytes) = resp.chunk().await? {
                if chunks.push(&bytes)? {
                    break;
                }
            }
            chunks.finish()?
        } else {
            let bytes = resp.bytes().await?;
            let chunk: GenerateChunk = serde_json::from_slice(&bytes)?;
            chunk.response.ok_or(AdvisoryError::MissingResponse)?
        };
        Ok(reply.trim().to_string())
    }
}

#[async_trait]
impl Advisor for OracleClient {
    async fn ask(&self, prompt: &str, fallback: &str) -> String {
        match self.try_ask(prompt).await {
            Ok(reply) => reply,
            Err(_) => {
                warn!(fallback, "advisory: no usable answer, using fallback");
                fallback.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_join_across_split_reads() {
        let mut a = ChunkAssembler::default();
        assert!(!a.push(b"{\"response\":\"La\",\"done\":false}\n{\"resp").unwrap());
        assert!(!a.push(b"onse\":\"nd\",\"done\":false}\n").unwrap());
        assert!(a.push(b"{\"response\":\".\",\"done\":true}\n{\"ignored\":1}").unwrap());
        assert_eq!(a.finish().unwrap(), "Land.");
    }

    #[test]
    fn unterminated_last_line_is_kept() {
        let mut a = ChunkAssembler::default();
        a.push(b"{\"response\":\"hov\"}\n\n{\"response\":\"er\"}").unwrap();
        assert_eq!(a.finish().unwrap(), "hover");
    }

    #[test]
    fn empty_or_broken_streams_are_errors() {
        assert!(matches!(ChunkAssembler::default().finish(), Err(AdvisoryError::MissingResponse)));

        let mut a = ChunkAssembler::default();
        assert!(matches!(a.push(b"not json\n"), Err(AdvisoryError::Decode(_))));
    }
}
