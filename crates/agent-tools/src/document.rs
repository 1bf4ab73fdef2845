//! Document Reader Tool
//!
//! Reads local documents for the model to reason over. Plain-text
//! formats and CSV are handled natively; binary office formats are
//! recognized but refused with a clear error so the model can tell the
//! user instead of hallucinating content.

use std::path::Path;

use agent_core::{
    error::{AgentError, Result},
    tool::{ParameterSpec, Tool, ToolInvocation, ToolResult, ToolSpec},
};
use async_trait::async_trait;

/// Cap on returned document text, in characters
const MAX_DOCUMENT_CHARS: usize = 8000;

/// Document formats the tool knows about
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DocumentFormat {
    Text,
    Csv,
    /// Recognized but not readable without a dedicated extractor
    Binary(&'static str),
}

impl DocumentFormat {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim_start_matches('.').to_lowercase().as_str() {
            "txt" | "text" | "md" | "markdown" | "log" | "rst" => Some(Self::Text),
            "csv" => Some(Self::Csv),
            "pdf" => Some(Self::Binary("pdf")),
            "docx" | "doc" => Some(Self::Binary("docx")),
            "pptx" | "ppt" => Some(Self::Binary("pptx")),
            "xlsx" | "xls" => Some(Self::Binary("xlsx")),
            _ => None,
        }
    }

    fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_tag)
    }
}

/// Tool for reading local documents
pub struct DocumentReaderTool;

impl DocumentReaderTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DocumentReaderTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for DocumentReaderTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "read_document".into(),
            description: "Read a local document (txt, md, log, csv) and return its \
                          content with basic metadata. Use when the user refers to \
                          a file on disk."
                .into(),
            parameters: vec![
                ParameterSpec::required("path", "string", "Path to the document"),
                ParameterSpec::optional(
                    "format",
                    "string",
                    "Document format override (inferred from the extension when omitted)",
                ),
                ParameterSpec::optional(
                    "question",
                    "string",
                    "What to look for in the document, echoed back for context",
                ),
            ],
        }
    }

    async fn execute(&self, call: &ToolInvocation) -> Result<ToolResult> {
        let path_arg = call.str_arg("path")?;
        let path = Path::new(path_arg);

        let format = match call.opt_str_arg("format") {
            Some(tag) => DocumentFormat::from_tag(tag).ok_or_else(|| {
                AgentError::UnsupportedFormat(format!("unknown document format '{}'", tag))
            })?,
            None => DocumentFormat::from_path(path).ok_or_else(|| {
                AgentError::UnsupportedFormat(format!(
                    "cannot infer format of '{}'; pass an explicit 'format'",
                    path_arg
                ))
            })?,
        };

        if let DocumentFormat::Binary(kind) = format {
            return Err(AgentError::UnsupportedFormat(format!(
                "{} files need a dedicated extractor; convert '{}' to plain text first",
                kind, path_arg
            )));
        }

        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AgentError::ToolExecution(format!("reading {}: {}", path.display(), e))
        })?;
        let byte_size = raw.len();

        let (body, metadata) = if format == DocumentFormat::Csv {
            describe_csv(&raw)
        } else {
            describe_text(&raw)
        };

        let mut output = format!("Document: {}\n", path.display());
        if let Some(question) = call.opt_str_arg("question") {
            output.push_str(&format!("Question: {}\n", question));
        }
        output.push_str(&format!("{}\n\n{}", summarize(&metadata, byte_size), body));

        Ok(ToolResult::success("read_document", output).with_data(serde_json::json!({
            "path": path.display().to_string(),
            "bytes": byte_size,
            "metadata": metadata,
        })))
    }
}

fn summarize(metadata: &serde_json::Value, byte_size: usize) -> String {
    let mut parts = vec![format!("{} bytes", byte_size)];
    if let Some(lines) = metadata.get("line_count").and_then(|v| v.as_u64()) {
        parts.push(format!("{} lines", lines));
    }
    if let Some(rows) = metadata.get("row_count").and_then(|v| v.as_u64()) {
        parts.push(format!("{} rows", rows));
    }
    if let Some(cols) = metadata.get("column_count").and_then(|v| v.as_u64()) {
        parts.push(format!("{} columns", cols));
    }
    format!("({})", parts.join(", "))
}

fn describe_text(raw: &str) -> (String, serde_json::Value) {
    let line_count = raw.lines().count();
    (
        truncate_chars(raw.trim_end(), MAX_DOCUMENT_CHARS),
        serde_json::json!({ "line_count": line_count }),
    )
}

/// CSV handling: header-aware row/column counts plus the raw rows as
/// the body. Quoted fields are not parsed; counts come from the header
/// line, which is what the model needs to orient itself.
fn describe_csv(raw: &str) -> (String, serde_json::Value) {
    let mut lines = raw.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next().unwrap_or_default();
    let column_count = if header.is_empty() {
        0
    } else {
        header.split(',').count()
    };
    let row_count = lines.count();

    (
        truncate_chars(raw.trim_end(), MAX_DOCUMENT_CHARS),
        serde_json::json!({
            "row_count": row_count,
            "column_count": column_count,
            "columns": header.split(',').map(str::trim).collect::<Vec<_>>(),
        }),
    )
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let cut: String = text.chars().take(limit).collect();
        format!("{}\n[content truncated at {} characters]", cut, limit)
    }
}
