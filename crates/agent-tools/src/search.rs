//! Web Search Tool
//!
//! Searches the web by scraping result pages, falling back across
//! engines (DuckDuckGo, then Bing, then Google) until enough hits are
//! collected. The fallback strategy stays internal: the orchestration
//! loop only sees one success/failure.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    tool::{ParameterSpec, Tool, ToolInvocation, ToolResult, ToolSpec},
};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

use crate::net;

/// One search result
#[derive(Clone, Debug, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
    pub source: &'static str,
}

/// Search engines in fallback order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Engine {
    DuckDuckGo,
    Bing,
    Google,
}

impl Engine {
    const FALLBACK_ORDER: [Engine; 3] = [Engine::DuckDuckGo, Engine::Bing, Engine::Google];

    fn name(self) -> &'static str {
        match self {
            Engine::DuckDuckGo => "DuckDuckGo",
            Engine::Bing => "Bing",
            Engine::Google => "Google",
        }
    }

    fn search_url(self, query: &str) -> String {
        let encoded: String =
            url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        match self {
            Engine::DuckDuckGo => format!("https://html.duckduckgo.com/html/?q={}", encoded),
            Engine::Bing => format!("https://www.bing.com/search?q={}", encoded),
            Engine::Google => format!("https://www.google.com/search?q={}", encoded),
        }
    }
}

/// Tool for searching the web
pub struct WebSearchTool {
    client: Client,
    /// Stop falling back once this many unique hits are collected
    min_results: usize,
    /// Per-engine result cap
    max_per_engine: usize,
}

impl WebSearchTool {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: net::build_client(Duration::from_secs(10))?,
            min_results: 5,
            max_per_engine: 10,
        })
    }

    async fn search(&self, query: &str) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = Vec::new();

        for engine in Engine::FALLBACK_ORDER {
            if hits.len() >= self.min_results {
                break;
            }

            let url = engine.search_url(query);
            tracing::debug!(engine = engine.name(), %url, "querying search engine");

            match net::fetch_text(&self.client, &url).await {
                Ok(body) => {
                    let parsed = parse_results(engine, &body, self.max_per_engine);
                    tracing::debug!(engine = engine.name(), count = parsed.len(), "engine results");
                    hits.extend(parsed);
                }
                Err(e) => {
                    tracing::warn!(engine = engine.name(), error = %e, "search engine failed, falling back");
                }
            }
        }

        dedupe_by_link(hits)
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "web_search".into(),
            description: "Search the web for information on a given query. \
                          Use only for recent facts, time-sensitive information, \
                          or topics you do not already know."
                .into(),
            parameters: vec![ParameterSpec::required(
                "query",
                "string",
                "The search query, exactly as the user phrased it",
            )],
        }
    }

    async fn execute(&self, call: &ToolInvocation) -> Result<ToolResult> {
        let query = call.str_arg("query")?;
        let hits = self.search(query).await;

        if hits.is_empty() {
            return Ok(ToolResult::failure(
                "web_search",
                format!("no results found for '{}' on any engine", query),
            ));
        }

        let mut output = format!("Search results for '{}':\n\n", query);
        for (i, hit) in hits.iter().enumerate() {
            output.push_str(&format!(
                "{}. {}\n   {}\n   {}\n\n",
                i + 1,
                hit.title,
                hit.link,
                hit.snippet
            ));
        }

        Ok(ToolResult::success("web_search", output.trim_end())
            .with_data(serde_json::to_value(&hits)?))
    }
}

fn selector(source: &str) -> Result<Selector> {
    Selector::parse(source)
        .map_err(|e| AgentError::ToolExecution(format!("bad selector '{}': {}", source, e)))
}

/// Extract hits from one engine's result page
fn parse_results(engine: Engine, body: &str, limit: usize) -> Vec<SearchHit> {
    match engine {
        Engine::DuckDuckGo => parse_duckduckgo(body, limit),
        Engine::Bing => parse_bing(body, limit),
        Engine::Google => parse_google(body, limit),
    }
    .unwrap_or_else(|e| {
        tracing::warn!(engine = engine.name(), error = %e, "result extraction failed");
        Vec::new()
    })
}

fn parse_duckduckgo(body: &str, limit: usize) -> Result<Vec<SearchHit>> {
    let document = Html::parse_document(body);
    let result_sel = selector(".result")?;
    let title_sel = selector(".result__title a, .result__a")?;
    let snippet_sel = selector(".result__snippet")?;

    let mut hits = Vec::new();
    for result in document.select(&result_sel).take(limit) {
        let Some(anchor) = result.select(&title_sel).next() else {
            continue;
        };
        let title = text_of(&anchor);
        let Some(link) = anchor.value().attr("href").and_then(unwrap_ddg_redirect) else {
            continue;
        };

        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(|s| text_of(&s))
            .unwrap_or_else(|| "No description available".into());

        if link.starts_with("http") && !title.is_empty() {
            hits.push(SearchHit {
                title,
                link,
                snippet,
                source: Engine::DuckDuckGo.name(),
            });
        }
    }
    Ok(hits)
}

fn parse_bing(body: &str, limit: usize) -> Result<Vec<SearchHit>> {
    let document = Html::parse_document(body);
    let result_sel = selector(".b_algo")?;
    let title_sel = selector("h2")?;
    let link_sel = selector("a")?;
    let snippet_sel = selector(".b_caption p")?;

    let mut hits = Vec::new();
    for result in document.select(&result_sel).take(limit) {
        let title = match result.select(&title_sel).next() {
            Some(t) => text_of(&t),
            None => continue,
        };
        let Some(link) = result
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };

        if link.starts_with("http") && !title.is_empty() {
            let snippet = result
                .select(&snippet_sel)
                .next()
                .map(|s| text_of(&s))
                .unwrap_or_else(|| "No description available".into());

            hits.push(SearchHit {
                title,
                link: link.to_string(),
                snippet,
                source: Engine::Bing.name(),
            });
        }
    }
    Ok(hits)
}

fn parse_google(body: &str, limit: usize) -> Result<Vec<SearchHit>> {
    let document = Html::parse_document(body);
    // Google's markup shifts; try the known containers in turn.
    let container_sels = [".g", "[data-hveid]", ".MjjYud"];
    let title_sel = selector("h3")?;
    let link_sel = selector("a")?;
    let snippet_sel = selector(".VwiC3b, .s3v9rd")?;

    let mut hits = Vec::new();
    for container in container_sels {
        let result_sel = selector(container)?;
        for result in document.select(&result_sel).take(limit) {
            let title = match result.select(&title_sel).next() {
                Some(t) => text_of(&t),
                None => continue,
            };
            let Some(href) = result
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
            else {
                continue;
            };

            let link = unwrap_google_redirect(href);
            if link.starts_with("http") && !title.is_empty() {
                let snippet = result
                    .select(&snippet_sel)
                    .next()
                    .map(|s| text_of(&s))
                    .unwrap_or_else(|| "No description available".into());

                hits.push(SearchHit {
                    title,
                    link,
                    snippet,
                    source: Engine::Google.name(),
                });
            }
        }
        if !hits.is_empty() {
            break;
        }
    }
    Ok(hits)
}

fn text_of(element: &scraper::ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// DuckDuckGo wraps links in a redirect carrying the target in `uddg`
fn unwrap_ddg_redirect(href: &str) -> Option<String> {
    if href.starts_with("http") && !href.contains("duckduckgo.com/l/") {
        return Some(href.to_string());
    }

    let absolute = if href.starts_with('/') {
        format!("https://duckduckgo.com{}", href)
    } else {
        href.to_string()
    };

    let parsed = Url::parse(&absolute).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, value)| value.into_owned())
}

/// Google prepends organic links with `/url?q=`
fn unwrap_google_redirect(href: &str) -> String {
    if let Some(rest) = href.strip_prefix("/url?q=") {
        let target = rest.split('&').next().unwrap_or(rest);
        percent_encoding::percent_decode_str(target)
            .decode_utf8_lossy()
            .into_owned()
    } else {
        href.to_string()
    }
}

fn dedupe_by_link(hits: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut seen = std::collections::HashSet::new();
    hits.into_iter()
        .filter(|hit| seen.insert(hit.link.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DDG_PAGE: &str = r#"
        <html><body>
          <div class="result">
            <h2 class="result__title">
              <a class="result__a" href="/l/?kh=-1&uddg=https%3A%2F%2Fexample.org%2Fpage">Example Page</a>
            </h2>
            <a class="result__snippet">A snippet about the example.</a>
          </div>
          <div class="result">
            <h2 class="result__title">
              <a class="result__a" href="https://direct.example.com/x">Direct Link</a>
            </h2>
          </div>
        </body></html>"#;

    const BING_PAGE: &str = r#"
        <html><body>
          <li class="b_algo">
            <h2><a href="https://example.com/a">First Result</a></h2>
            <a href="https://example.com/a">dup anchor</a>
            <div class="b_caption"><p>First snippet.</p></div>
          </li>
        </body></html>"#;

    #[test]
    fn test_parse_duckduckgo_unwraps_redirects() {
        let hits = parse_duckduckgo(DDG_PAGE, 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Example Page");
        assert_eq!(hits[0].link, "https://example.org/page");
        assert_eq!(hits[0].snippet, "A snippet about the example.");
        assert_eq!(hits[1].link, "https://direct.example.com/x");
        assert_eq!(hits[1].snippet, "No description available");
    }

    #[test]
    fn test_parse_bing() {
        let hits = parse_bing(BING_PAGE, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "First Result");
        assert_eq!(hits[0].link, "https://example.com/a");
        assert_eq!(hits[0].snippet, "First snippet.");
        assert_eq!(hits[0].source, "Bing");
    }

    #[test]
    fn test_google_redirect_unwrapping() {
        assert_eq!(
            unwrap_google_redirect("/url?q=https%3A%2F%2Fexample.com%2Fdoc&sa=U"),
            "https://example.com/doc"
        );
        assert_eq!(
            unwrap_google_redirect("https://plain.example.com"),
            "https://plain.example.com"
        );
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let hits = vec![
            SearchHit {
                title: "a".into(),
                link: "https://x".into(),
                snippet: String::new(),
                source: "DuckDuckGo",
            },
            SearchHit {
                title: "b".into(),
                link: "https://x".into(),
                snippet: String::new(),
                source: "Bing",
            },
            SearchHit {
                title: "c".into(),
                link: "https://y".into(),
                snippet: String::new(),
                source: "Bing",
            },
        ];
        let unique = dedupe_by_link(hits);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].title, "a");
    }

    #[test]
    fn test_empty_page_yields_no_hits() {
        assert!(parse_duckduckgo("<html></html>", 10).unwrap().is_empty());
        assert!(parse_bing("<html></html>", 10).unwrap().is_empty());
        assert!(parse_google("<html></html>", 10).unwrap().is_empty());
    }
}
