//! File Creation Tool
//!
//! Writes model-produced content to disk inside a configured output
//! directory. Filenames are sanitized to their final component and
//! collisions get a numeric suffix instead of overwriting.

use std::path::{Path, PathBuf};

use agent_core::{
    error::{AgentError, Result},
    tool::{ParameterSpec, Tool, ToolInvocation, ToolResult, ToolSpec},
};
use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Tool for saving generated content to a file
pub struct FileCreationTool {
    output_dir: PathBuf,
}

impl FileCreationTool {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Strip any directory components so writes cannot escape the
    /// output directory.
    fn sanitize_filename(requested: &str) -> Result<String> {
        let name = Path::new(requested)
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .filter(|n| !n.is_empty() && n != "." && n != "..")
            .ok_or_else(|| {
                AgentError::ToolArgument(format!("'{}' is not a usable filename", requested))
            })?;
        Ok(name)
    }

    fn with_extension(name: String, file_type: Option<&str>) -> String {
        if Path::new(&name).extension().is_some() {
            return name;
        }
        let ext = file_type.map(|t| t.trim_start_matches('.')).unwrap_or("txt");
        format!("{}.{}", name, ext)
    }

    /// Create the file, appending `_1`, `_2`, ... until a free name is
    /// found. `create_new` makes the existence check and the create
    /// atomic.
    async fn create_unique(&self, filename: &str) -> Result<(PathBuf, tokio::fs::File)> {
        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename)
            .to_string();
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string);

        for attempt in 0..100 {
            let candidate = if attempt == 0 {
                filename.to_string()
            } else {
                match &ext {
                    Some(ext) => format!("{}_{}.{}", stem, attempt, ext),
                    None => format!("{}_{}", stem, attempt),
                }
            };
            let path = self.output_dir.join(&candidate);

            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(AgentError::ToolExecution(format!(
                        "creating {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }

        Err(AgentError::ToolExecution(format!(
            "could not find a free name for '{}' after 100 attempts",
            filename
        )))
    }
}

#[async_trait]
impl Tool for FileCreationTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "create_file".into(),
            description: "Save content to a new file in the output directory. \
                          Existing files are never overwritten."
                .into(),
            parameters: vec![
                ParameterSpec::required("filename", "string", "Name for the new file"),
                ParameterSpec::required("content", "string", "Text content to write"),
                ParameterSpec::optional(
                    "file_type",
                    "string",
                    "Extension to use when the filename has none (default: txt)",
                ),
            ],
        }
    }

    async fn execute(&self, call: &ToolInvocation) -> Result<ToolResult> {
        let requested = call.str_arg("filename")?;
        let content = call.str_arg("content")?;
        let file_type = call.opt_str_arg("file_type");

        let sanitized = Self::sanitize_filename(requested)?;
        let filename = Self::with_extension(sanitized, file_type);

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| {
                AgentError::ToolExecution(format!(
                    "creating output directory {}: {}",
                    self.output_dir.display(),
                    e
                ))
            })?;

        let (path, mut file) = self.create_unique(&filename).await?;

        file.write_all(content.as_bytes()).await.map_err(|e| {
            AgentError::ToolExecution(format!("writing {}: {}", path.display(), e))
        })?;
        file.flush()
            .await
            .map_err(|e| AgentError::ToolExecution(format!("flushing {}: {}", path.display(), e)))?;

        tracing::info!(path = %path.display(), bytes = content.len(), "file created");

        Ok(ToolResult::success(
            "create_file",
            format!("Created {} ({} bytes)", path.display(), content.len()),
        )
        .with_data(serde_json::json!({
            "path": path.display().to_string(),
            "bytes": content.len(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn call(args: serde_json::Value) -> ToolInvocation {
        let map: HashMap<_, _> = args
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        ToolInvocation::new("create_file", map)
    }

    #[tokio::test]
    async fn test_creates_file_with_default_extension() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileCreationTool::new(dir.path());

        let result = tool
            .execute(&call(
                serde_json::json!({"filename": "notes", "content": "hello"}),
            ))
            .await
            .unwrap();

        assert!(result.success);
        let path = dir.path().join("notes.txt");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
        assert!(result.output.contains("notes.txt"));
    }

    #[tokio::test]
    async fn test_collision_gets_numeric_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileCreationTool::new(dir.path());

        for _ in 0..3 {
            tool.execute(&call(
                serde_json::json!({"filename": "report.md", "content": "x"}),
            ))
            .await
            .unwrap();
        }

        assert!(dir.path().join("report.md").exists());
        assert!(dir.path().join("report_1.md").exists());
        assert!(dir.path().join("report_2.md").exists());
    }

    #[tokio::test]
    async fn test_path_components_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileCreationTool::new(dir.path());

        tool.execute(&call(serde_json::json!({
            "filename": "../escape/secret.txt",
            "content": "data"
        })))
        .await
        .unwrap();

        assert!(dir.path().join("secret.txt").exists());
        assert!(!dir.path().parent().unwrap().join("escape").exists());
    }

    #[tokio::test]
    async fn test_explicit_file_type_applied() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileCreationTool::new(dir.path());

        tool.execute(&call(serde_json::json!({
            "filename": "script",
            "content": "print('hi')",
            "file_type": "py"
        })))
        .await
        .unwrap();

        assert!(dir.path().join("script.py").exists());
    }

    #[tokio::test]
    async fn test_bare_dotdot_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileCreationTool::new(dir.path());

        let err = tool
            .execute(&call(serde_json::json!({"filename": "..", "content": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolArgument(_)));
    }
}
