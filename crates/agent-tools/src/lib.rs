//! # agent-tools
//!
//! Built-in tool implementations for the agent:
//!
//! - `web_search`: multi-engine web search with fallback
//! - `fetch_page`: readable-text extraction from a URL
//! - `create_file`: save generated content without overwriting
//! - `read_document`: local text and CSV documents
//!
//! Each tool is independent; register the ones a deployment needs, or
//! use [`default_registry`] for the full set.

use std::path::PathBuf;

use agent_core::{error::Result, tool::ToolRegistry};

mod net;

pub mod document;
pub mod file_create;
pub mod page;
pub mod search;

pub use document::DocumentReaderTool;
pub use file_create::FileCreationTool;
pub use page::PageContentTool;
pub use search::WebSearchTool;

/// Registry pre-loaded with every built-in tool.
///
/// `output_dir` is where `create_file` writes.
pub fn default_registry(output_dir: impl Into<PathBuf>) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(WebSearchTool::new()?)?;
    registry.register(PageContentTool::new()?)?;
    registry.register(FileCreationTool::new(output_dir))?;
    registry.register(DocumentReaderTool::new())?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_has_all_tools() {
        let registry = default_registry("/tmp/agent-output").unwrap();
        assert_eq!(registry.len(), 4);

        let names: Vec<_> = registry
            .describe_all()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(
            names,
            vec!["create_file", "fetch_page", "read_document", "web_search"]
        );
    }
}
