//! Web tools: Brave search and page fetch.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::base::{optional_i64, require_string, Tool};

const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_7_2) AppleWebKit/537.36 (KHTML, like Gecko)";

const DEFAULT_MAX_RESULTS: i64 = 5;
const DEFAULT_FETCH_CHARS: usize = 50_000;

// ─────────────────────────────────────────────
// web_search
// ─────────────────────────────────────────────

/// Brave Search API client. Falls back to `BRAVE_API_KEY` when no key is
/// configured.
pub struct WebSearchTool {
    api_key: Option<String>,
    client: Client,
}

impl WebSearchTool {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            client: Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
        }
    }

    fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("BRAVE_API_KEY").ok())
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web. Returns a numbered list of results with titles, \
         URLs, and descriptions."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query"},
                "count": {
                    "type": "integer",
                    "description": "Number of results (1-10, default 5)",
                    "minimum": 1,
                    "maximum": 10
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let query = require_string(&params, "query")?;
        let count = optional_i64(&params, "count").unwrap_or(DEFAULT_MAX_RESULTS);

        let api_key = self.resolve_api_key().ok_or_else(|| {
            anyhow::anyhow!("No search API key configured (set BRAVE_API_KEY or tools.web.search.apiKey)")
        })?;

        debug!(query = %query, count = count, "web search");

        let resp = self
            .client
            .get("https://api.search.brave.com/res/v1/web/search")
            .header("X-Subscription-Token", &api_key)
            .query(&[("q", query.as_str()), ("count", &count.to_string())])
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Search request failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Search API returned {status}");
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse search response: {e}"))?;

        let results = body["web"]["results"].as_array().cloned().unwrap_or_default();
        if results.is_empty() {
            return Ok("No results found.".into());
        }

        let lines: Vec<String> = results
            .iter()
            .enumerate()
            .map(|(i, r)| {
                format!(
                    "{}. {}\n   {}\n   {}",
                    i + 1,
                    r["title"].as_str().unwrap_or("(untitled)"),
                    r["url"].as_str().unwrap_or(""),
                    r["description"].as_str().unwrap_or("")
                )
            })
            .collect();
        Ok(lines.join("\n\n"))
    }
}

// ─────────────────────────────────────────────
// web_fetch
// ─────────────────────────────────────────────

/// Fetch a page and reduce it to readable text.
pub struct WebFetchTool {
    client: Client,
}

impl WebFetchTool {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .redirect(reqwest::redirect::Policy::limited(5))
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a URL and return its content as text. HTML is stripped to \
         readable text."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "The URL to fetch"},
                "max_chars": {
                    "type": "integer",
                    "description": "Truncate the result to this many characters"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let url = require_string(&params, "url")?;
        let max_chars = optional_i64(&params, "max_chars")
            .map(|n| n.max(0) as usize)
            .unwrap_or(DEFAULT_FETCH_CHARS);

        debug!(url = %url, "web fetch");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Fetch failed: {e}"))?;
        if !resp.status().is_success() {
            anyhow::bail!("Fetch returned {}", resp.status());
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = resp
            .text()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read body: {e}"))?;

        let mut text = if content_type.contains("text/html") {
            html_to_text(&body)
        } else {
            body
        };

        if text.len() > max_chars {
            let dropped = text.len() - max_chars;
            text.truncate(max_chars);
            text.push_str(&format!("\n... (truncated, {dropped} more chars)"));
        }
        Ok(text)
    }
}

/// Crude but dependency-free HTML reduction: drop script/style blocks,
/// strip tags, collapse whitespace, decode the common entities.
fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len() / 2);
    let mut rest = html;

    while let Some(pos) = rest.find('<') {
        text.push_str(&rest[..pos]);
        text.push(' ');
        let tag = &rest[pos..];

        // Script and style bodies are swallowed whole; any other tag is
        // skipped up to its closing '>'.
        let consumed = if starts_with_ci(tag, "<script") {
            find_ci(tag, "</script>").map(|p| p + "</script>".len())
        } else if starts_with_ci(tag, "<style") {
            find_ci(tag, "</style>").map(|p| p + "</style>".len())
        } else {
            tag.find('>').map(|p| p + 1)
        };

        match consumed {
            Some(n) => rest = &tag[n..],
            // Unterminated tag: drop the remainder.
            None => {
                rest = "";
                break;
            }
        }
    }
    text.push_str(rest);

    let decoded = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn starts_with_ci(haystack: &str, prefix: &str) -> bool {
    haystack.len() >= prefix.len()
        && haystack.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Byte offset of an ASCII needle, case-insensitive. Matches always start
/// on a char boundary because the needle begins with an ASCII byte.
fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
