//! Response Parser
//!
//! Extracts structured tool-invocation requests and thinking commentary
//! from raw model text, and strips both to produce the user-visible
//! answer. All malformed-input handling lives here: an unterminated
//! delimiter or an unparseable block makes the whole round malformed,
//! so the orchestration loop can ask the model to correct itself instead
//! of dispatching a partial request set.
//!
//! Recognized grammar, per the system prompt the agent sends:
//!
//! ```text
//! <thinking>internal reasoning, never shown to the user</thinking>
//!
//! ```tool
//! {"tool": "web_search", "arguments": {"query": "rust 1.94 release"}}
//! ```
//! ```

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{AgentError, Result};
use crate::tool::ToolInvocation;

const THINKING_OPEN: &str = "<thinking>";
const THINKING_CLOSE: &str = "</thinking>";
const TOOL_FENCE_OPEN: &str = "```tool";
const TOOL_FENCE_CLOSE: &str = "```";

/// One round of parsed model output
#[derive(Clone, Debug, Default)]
pub struct ParsedResponse {
    /// Thinking commentary, retained for debug logging only
    pub thinking: Option<String>,

    /// Tool requests in order of appearance
    pub requests: Vec<ToolInvocation>,

    /// Raw text with thinking and tool blocks stripped
    pub cleaned: String,

    /// Raw text with only thinking stripped; what gets recorded as the
    /// assistant turn so reasoning text is never replayed
    pub sans_thinking: String,
}

impl ParsedResponse {
    /// The final user-facing answer for this round.
    ///
    /// Present only when the round requested no tools; the cleaned text
    /// then terminates the loop normally.
    pub fn final_answer(&self) -> Option<&str> {
        if self.requests.is_empty() {
            Some(&self.cleaned)
        } else {
            None
        }
    }
}

/// JSON payload inside a ```tool fence
#[derive(Debug, Deserialize)]
struct ToolBlock {
    tool: String,
    #[serde(default)]
    arguments: HashMap<String, serde_json::Value>,
}

/// Parser for one round of raw model output
#[derive(Clone, Copy, Debug, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a raw model response into thinking, requests, and answer.
    ///
    /// Errors with [`AgentError::Parse`] when a delimiter is unterminated
    /// or a tool block carries invalid JSON; no request from a malformed
    /// round is ever dispatched.
    pub fn parse(&self, raw: &str) -> Result<ParsedResponse> {
        let (without_thinking, thinking) = extract_thinking(raw)?;
        let (cleaned, requests) = extract_tool_blocks(&without_thinking)?;

        Ok(ParsedResponse {
            thinking,
            requests,
            cleaned: tidy(&cleaned),
            sans_thinking: without_thinking.trim().to_string(),
        })
    }
}

/// Best-effort thinking removal for text that failed full parsing.
///
/// Complete sections are stripped as usual; an unterminated open tag
/// drops everything from the tag onward. Used when a malformed round is
/// recorded in the conversation: reasoning text must never be replayed
/// to the model, even from a round the parser rejected.
pub fn strip_thinking_lossy(raw: &str) -> String {
    let mut remainder = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(open) = find_ci(rest, THINKING_OPEN) {
        remainder.push_str(&rest[..open]);
        let after_open = open + THINKING_OPEN.len();
        match find_ci(&rest[after_open..], THINKING_CLOSE) {
            Some(close_rel) => {
                rest = &rest[after_open + close_rel + THINKING_CLOSE.len()..];
            }
            None => {
                rest = "";
                break;
            }
        }
    }
    remainder.push_str(rest);

    remainder.trim().to_string()
}

/// Strip every thinking section, returning the remainder and the
/// concatenated thinking text.
fn extract_thinking(raw: &str) -> Result<(String, Option<String>)> {
    let mut remainder = String::with_capacity(raw.len());
    let mut thinking = String::new();
    let mut rest = raw;

    while let Some(open) = find_ci(rest, THINKING_OPEN) {
        let after_open = open + THINKING_OPEN.len();
        let Some(close_rel) = find_ci(&rest[after_open..], THINKING_CLOSE) else {
            return Err(AgentError::Parse(
                "unterminated <thinking> section".into(),
            ));
        };

        remainder.push_str(&rest[..open]);
        if !thinking.is_empty() {
            thinking.push('\n');
        }
        thinking.push_str(rest[after_open..after_open + close_rel].trim());

        rest = &rest[after_open + close_rel + THINKING_CLOSE.len()..];
    }
    remainder.push_str(rest);

    let thinking = if thinking.is_empty() {
        None
    } else {
        Some(thinking)
    };
    Ok((remainder, thinking))
}

/// Strip every ```tool fence, returning the remainder and the parsed
/// invocations in order of appearance.
fn extract_tool_blocks(text: &str) -> Result<(String, Vec<ToolInvocation>)> {
    let mut remainder = String::with_capacity(text.len());
    let mut requests = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find(TOOL_FENCE_OPEN) {
        let after_open = open + TOOL_FENCE_OPEN.len();
        let Some(close_rel) = rest[after_open..].find(TOOL_FENCE_CLOSE) else {
            return Err(AgentError::Parse("unterminated tool block".into()));
        };

        let body = rest[after_open..after_open + close_rel].trim();
        let block: ToolBlock = serde_json::from_str(body).map_err(|e| {
            AgentError::Parse(format!("invalid JSON in tool block: {}", e))
        })?;

        if block.tool.trim().is_empty() {
            return Err(AgentError::Parse("tool block names no tool".into()));
        }

        requests.push(ToolInvocation::new(block.tool, block.arguments));

        remainder.push_str(&rest[..open]);
        rest = &rest[after_open + close_rel + TOOL_FENCE_CLOSE.len()..];
    }
    remainder.push_str(rest);

    Ok((remainder, requests))
}

/// Case-insensitive substring search (ASCII tags only)
fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let haystack_lower = haystack.to_ascii_lowercase();
    haystack_lower.find(&needle.to_ascii_lowercase())
}

/// Collapse blank-line runs left behind by stripped sections
fn tidy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;

    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<ParsedResponse> {
        ResponseParser::new().parse(raw)
    }

    #[test]
    fn test_plain_answer_passes_through() {
        let parsed = parse("The answer is 4.").unwrap();
        assert!(parsed.requests.is_empty());
        assert!(parsed.thinking.is_none());
        assert_eq!(parsed.final_answer(), Some("The answer is 4."));
    }

    #[test]
    fn test_thinking_stripped_from_answer() {
        let raw = "<thinking>2+2 needs no tools</thinking>The answer is 4.";
        let parsed = parse(raw).unwrap();
        assert_eq!(parsed.thinking.as_deref(), Some("2+2 needs no tools"));
        assert_eq!(parsed.final_answer(), Some("The answer is 4."));
        assert!(!parsed.cleaned.contains("thinking"));
    }

    #[test]
    fn test_thinking_tag_case_insensitive() {
        let raw = "<THINKING>hidden</THINKING>ok";
        let parsed = parse(raw).unwrap();
        assert_eq!(parsed.thinking.as_deref(), Some("hidden"));
        assert_eq!(parsed.cleaned, "ok");
    }

    #[test]
    fn test_single_tool_block() {
        let raw = r#"Let me look that up.
```tool
{"tool": "web_search", "arguments": {"query": "rust 1.94"}}
```"#;
        let parsed = parse(raw).unwrap();
        assert_eq!(parsed.requests.len(), 1);
        assert_eq!(parsed.requests[0].name, "web_search");
        assert_eq!(
            parsed.requests[0].arguments["query"],
            serde_json::json!("rust 1.94")
        );
        assert!(parsed.final_answer().is_none());
    }

    #[test]
    fn test_multiple_blocks_keep_order() {
        let raw = r#"```tool
{"tool": "web_search", "arguments": {"query": "a"}}
```
Some commentary.
```tool
{"tool": "create_file", "arguments": {"filename": "notes.md", "content": "x"}}
```"#;
        let parsed = parse(raw).unwrap();
        let names: Vec<_> = parsed.requests.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["web_search", "create_file"]);
        assert_eq!(parsed.cleaned, "Some commentary.");
    }

    #[test]
    fn test_missing_closing_fence_is_malformed() {
        let raw = "```tool\n{\"tool\": \"web_search\", \"arguments\": {}}";
        let err = parse(raw).unwrap_err();
        assert!(matches!(err, AgentError::Parse(_)));
    }

    #[test]
    fn test_unterminated_thinking_is_malformed() {
        let err = parse("<thinking>never closed").unwrap_err();
        assert!(matches!(err, AgentError::Parse(_)));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let raw = "```tool\nnot json at all\n```";
        let err = parse(raw).unwrap_err();
        assert!(matches!(err, AgentError::Parse(_)));
    }

    #[test]
    fn test_block_without_tool_name_is_malformed() {
        let raw = "```tool\n{\"tool\": \"\", \"arguments\": {}}\n```";
        assert!(matches!(parse(raw), Err(AgentError::Parse(_))));
    }

    #[test]
    fn test_missing_arguments_defaults_empty() {
        let raw = "```tool\n{\"tool\": \"fetch_page\"}\n```";
        let parsed = parse(raw).unwrap();
        assert!(parsed.requests[0].arguments.is_empty());
    }

    #[test]
    fn test_thinking_and_tools_combined() {
        let raw = r#"<thinking>need fresh data</thinking>
```tool
{"tool": "web_search", "arguments": {"query": "q"}}
```
I'll check the web."#;
        let parsed = parse(raw).unwrap();
        assert_eq!(parsed.thinking.as_deref(), Some("need fresh data"));
        assert_eq!(parsed.requests.len(), 1);
        assert_eq!(parsed.cleaned, "I'll check the web.");
        assert!(parsed.final_answer().is_none());
    }

    #[test]
    fn test_strip_thinking_lossy_handles_unterminated() {
        assert_eq!(strip_thinking_lossy("<thinking>a</thinking>keep"), "keep");
        assert_eq!(strip_thinking_lossy("before<thinking>never closed"), "before");
        assert_eq!(
            strip_thinking_lossy("<thinking>a</thinking>mid<THINKING>b</THINKING> end"),
            "mid end"
        );
        assert_eq!(strip_thinking_lossy("no tags at all"), "no tags at all");
    }

    #[test]
    fn test_blank_runs_collapsed() {
        let raw = "<thinking>a</thinking>\n\n\n\nline one\n\n\n\nline two";
        let parsed = parse(raw).unwrap();
        assert_eq!(parsed.cleaned, "line one\n\nline two");
    }
}
