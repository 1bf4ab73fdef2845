//! Shared HTTP plumbing for the web-facing tools.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use agent_core::error::{AgentError, Result};
use reqwest::Client;

/// Browser user agents rotated across requests
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/112.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.0.0 Safari/537.36",
];

static NEXT_AGENT: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn next_user_agent() -> &'static str {
    let idx = NEXT_AGENT.fetch_add(1, Ordering::Relaxed);
    USER_AGENTS[idx % USER_AGENTS.len()]
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AgentError::Config(format!("http client: {}", e)))
}

/// GET a page as text with browser-like headers
pub(crate) async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .header("User-Agent", next_user_agent())
        .header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await
        .map_err(|e| AgentError::ToolExecution(format!("request to {} failed: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(AgentError::ToolExecution(format!(
            "{} returned HTTP {}",
            url,
            response.status()
        )));
    }

    response
        .text()
        .await
        .map_err(|e| AgentError::ToolExecution(format!("reading body from {}: {}", url, e)))
}
