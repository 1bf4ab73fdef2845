//! Page Content Tool
//!
//! Fetches a URL and extracts the readable text: tries the usual
//! content containers first, falls back to substantial paragraphs,
//! then to the whole body. Navigation and footer boilerplate is
//! filtered out line by line.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    tool::{ParameterSpec, Tool, ToolInvocation, ToolResult, ToolSpec},
};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::net;

/// Cap on extracted page text, in characters
const MAX_CONTENT_CHARS: usize = 5000;

/// Paragraphs shorter than this are treated as boilerplate
const MIN_PARAGRAPH_CHARS: usize = 40;

/// Containers that usually hold the article body, in preference order
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "#content",
    "#main-content",
    ".content",
    ".post-content",
    ".article-body",
    "[role='main']",
];

/// Line prefixes that mark navigation or footer chrome
const BOILERPLATE_MARKERS: &[&str] = &[
    "cookie",
    "subscribe",
    "sign in",
    "sign up",
    "log in",
    "accept all",
    "privacy policy",
    "terms of service",
    "all rights reserved",
];

/// Tool for fetching and reading a web page
pub struct PageContentTool {
    client: Client,
}

impl PageContentTool {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: net::build_client(Duration::from_secs(15))?,
        })
    }
}

#[async_trait]
impl Tool for PageContentTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "fetch_page".into(),
            description: "Fetch a web page and return its main readable text. \
                          Use after web_search when a snippet is not enough."
                .into(),
            parameters: vec![ParameterSpec::required(
                "url",
                "string",
                "The full URL of the page to read, including the scheme",
            )],
        }
    }

    async fn execute(&self, call: &ToolInvocation) -> Result<ToolResult> {
        let url = call.str_arg("url")?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AgentError::ToolArgument(format!(
                "'url' must start with http:// or https://, got '{}'",
                url
            )));
        }

        let body = match net::fetch_text(&self.client, url).await {
            Ok(body) => body,
            Err(e) => return Ok(ToolResult::failure("fetch_page", e.user_message())),
        };

        // scraper's DOM is not Send, so parsing stays in sync helpers
        // that finish before the next await point.
        let extracted = extract_page(&body);

        if extracted.content.is_empty() {
            return Ok(ToolResult::failure(
                "fetch_page",
                format!("no readable text found at {}", url),
            ));
        }

        let mut output = format!("Content from {}:\n", url);
        if let Some(title) = &extracted.title {
            output.push_str(&format!("Title: {}\n", title));
        }
        if let Some(author) = &extracted.author {
            output.push_str(&format!("Author: {}\n", author));
        }
        if let Some(published) = &extracted.published {
            output.push_str(&format!("Published: {}\n", published));
        }
        output.push('\n');
        output.push_str(&extracted.content);

        Ok(ToolResult::success("fetch_page", output).with_data(serde_json::json!({
            "url": url,
            "title": extracted.title,
            "author": extracted.author,
            "published": extracted.published,
            "chars": extracted.content.len(),
        })))
    }
}

#[derive(Debug, Default)]
struct ExtractedPage {
    title: Option<String>,
    author: Option<String>,
    published: Option<String>,
    content: String,
}

fn extract_page(body: &str) -> ExtractedPage {
    let document = Html::parse_document(body);

    ExtractedPage {
        title: first_text(&document, &["title", "h1"]),
        author: first_meta(&document, &["meta[name='author']", "meta[property='article:author']"])
            .or_else(|| first_text(&document, &[".author", ".byline", "[rel='author']"])),
        published: first_meta(
            &document,
            &[
                "meta[property='article:published_time']",
                "meta[name='date']",
            ],
        )
        .or_else(|| first_attr(&document, "time", "datetime")),
        content: extract_content(&document),
    }
}

/// Main-text extraction ladder: known containers, then long
/// paragraphs, then the raw body.
fn extract_content(document: &Html) -> String {
    for source in CONTENT_SELECTORS {
        if let Ok(sel) = Selector::parse(source) {
            if let Some(element) = document.select(&sel).next() {
                let text = clean_text(&element.text().collect::<String>());
                if text.len() >= MIN_PARAGRAPH_CHARS {
                    return truncate_chars(&text, MAX_CONTENT_CHARS);
                }
            }
        }
    }

    if let Ok(sel) = Selector::parse("p") {
        let paragraphs: Vec<String> = document
            .select(&sel)
            .map(|p| p.text().collect::<String>().trim().to_string())
            .filter(|p| p.len() >= MIN_PARAGRAPH_CHARS)
            .collect();
        if !paragraphs.is_empty() {
            return truncate_chars(&clean_text(&paragraphs.join("\n\n")), MAX_CONTENT_CHARS);
        }
    }

    if let Ok(sel) = Selector::parse("body") {
        if let Some(body) = document.select(&sel).next() {
            return truncate_chars(&clean_text(&body.text().collect::<String>()), MAX_CONTENT_CHARS);
        }
    }

    String::new()
}

/// Collapse whitespace and drop boilerplate lines
fn clean_text(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_boilerplate(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_boilerplate(line: &str) -> bool {
    if line.len() >= 100 {
        return false;
    }
    let lowered = line.to_lowercase();
    BOILERPLATE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let cut: String = text.chars().take(limit).collect();
        format!("{}\n[content truncated at {} characters]", cut, limit)
    }
}

fn first_text(document: &Html, sources: &[&str]) -> Option<String> {
    for source in sources {
        if let Ok(sel) = Selector::parse(source) {
            if let Some(element) = document.select(&sel).next() {
                let text = element.text().collect::<String>().trim().to_string();
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

fn first_meta(document: &Html, sources: &[&str]) -> Option<String> {
    for source in sources {
        if let Some(value) = first_attr(document, source, "content") {
            return Some(value);
        }
    }
    None
}

fn first_attr(document: &Html, source: &str, attr: &str) -> Option<String> {
    let sel = Selector::parse(source).ok()?;
    document
        .select(&sel)
        .next()
        .and_then(|e| e.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"
        <html>
          <head>
            <title>How Rivers Form</title>
            <meta name="author" content="J. Waters">
            <meta property="article:published_time" content="2024-03-01">
          </head>
          <body>
            <nav>Home | About | Subscribe to our newsletter</nav>
            <article>
              <p>Rivers begin as small streams fed by rainfall and snowmelt high in the hills.</p>
              <p>Over time the flowing water carves deeper channels through the landscape.</p>
            </article>
            <footer>All rights reserved. Privacy Policy.</footer>
          </body>
        </html>"#;

    #[test]
    fn test_article_container_preferred() {
        let page = extract_page(ARTICLE);
        assert_eq!(page.title.as_deref(), Some("How Rivers Form"));
        assert_eq!(page.author.as_deref(), Some("J. Waters"));
        assert_eq!(page.published.as_deref(), Some("2024-03-01"));
        assert!(page.content.contains("small streams"));
        assert!(!page.content.contains("Subscribe"));
        assert!(!page.content.contains("All rights reserved"));
    }

    #[test]
    fn test_paragraph_fallback_when_no_container() {
        let html = r#"<html><body>
            <div>
              <p>Short.</p>
              <p>This paragraph is comfortably longer than the minimum threshold for inclusion.</p>
            </div>
        </body></html>"#;
        let page = extract_page(html);
        assert!(page.content.contains("comfortably longer"));
        assert!(!page.content.contains("Short."));
    }

    #[test]
    fn test_body_fallback() {
        let html = "<html><body>Just a bare body with some text in it, nothing structured.</body></html>";
        let page = extract_page(html);
        assert!(page.content.contains("bare body"));
    }

    #[test]
    fn test_boilerplate_lines_dropped() {
        assert!(is_boilerplate("Accept all cookies"));
        assert!(is_boilerplate("Sign in to continue"));
        assert!(!is_boilerplate("The sign in the window read 'open'; beyond it the harbor stretched for miles toward the grey horizon line."));
    }

    #[test]
    fn test_truncation_marker() {
        let long = "x".repeat(MAX_CONTENT_CHARS + 100);
        let out = truncate_chars(&long, MAX_CONTENT_CHARS);
        assert!(out.contains("[content truncated"));
    }

    #[tokio::test]
    async fn test_rejects_non_http_url() {
        let tool = PageContentTool::new().unwrap();
        let call = ToolInvocation::new(
            "fetch_page",
            [("url".to_string(), serde_json::json!("file:///etc/passwd"))]
                .into_iter()
                .collect(),
        );
        let err = tool.execute(&call).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolArgument(_)));
    }
}
