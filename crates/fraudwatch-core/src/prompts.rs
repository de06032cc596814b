//! Prompt library for the SQL copilot
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/fraudwatch/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Frontmatter carries the generation parameters (temperature, token budget)
//! so an override can tune them together with the wording.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const GENERATE_SQL: &str = include_str!("../../../prompts/generate_sql.md");
    pub const EXPLAIN_RESULT: &str = include_str!("../../../prompts/explain_result.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Question + schema -> one SELECT statement
    GenerateSql,
    /// Question + result rows -> plain-language answer
    ExplainResult,
}

impl PromptId {
    /// Get the string identifier for this prompt
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateSql => "generate_sql",
            Self::ExplainResult => "explain_result",
        }
    }

    /// Get all known prompt IDs
    pub fn all() -> &'static [PromptId] {
        &[Self::GenerateSql, Self::ExplainResult]
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::GenerateSql => defaults::GENERATE_SQL,
            Self::ExplainResult => defaults::EXPLAIN_RESULT,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    /// Unique identifier
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
    /// Sampling temperature for the completion call
    pub temperature: f32,
    /// Completion token budget
    pub max_tokens: u32,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    pub content: String,
    /// Whether this came from an override file
    pub is_override: bool,
}

impl Prompt {
    /// Render the prompt with `{{var}}` placeholders replaced
    pub fn render(&self, vars: &HashMap<&str, &str>) -> String {
        let mut result = self.content.clone();
        for (key, value) in vars {
            let pattern = format!("{{{{{}}}}}", key);
            result = result.replace(&pattern, value);
        }
        result
    }
}

/// Prompt library for loading and caching prompts
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Create a new prompt library with default paths
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with a custom override directory
    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with no override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Get a prompt by ID, loading from override or default
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        if !self.cache.contains_key(&id) {
            let prompt = self.load(id)?;
            self.cache.insert(id, prompt);
        }
        self.cache
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("prompt {}", id.as_str())))
    }

    fn load(&self, id: PromptId) -> Result<Prompt> {
        if let Some(ref override_dir) = self.override_dir {
            let override_path = override_dir.join(format!("{}.md", id.as_str()));
            if override_path.exists() {
                let content = fs::read_to_string(&override_path).map_err(|e| {
                    Error::InvalidData(format!("Failed to read prompt override: {}", e))
                })?;
                let (metadata, body) = parse_prompt(&content)?;
                tracing::debug!(prompt = id.as_str(), path = %override_path.display(), "Using prompt override");
                return Ok(Prompt {
                    metadata,
                    content: body,
                    is_override: true,
                });
            }
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
            is_override: false,
        })
    }

    /// Get the override directory path
    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("fraudwatch").join("prompts").join("overrides"))
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    if !content.starts_with("---") {
        return Err(Error::InvalidData(
            "Prompt must start with YAML frontmatter (---)".into(),
        ));
    }

    let rest = &content[3..];
    let end = rest.find("\n---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 4..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::InvalidData(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prompt() {
        let content = r#"---
id: test_prompt
version: 3
temperature: 0.5
max_tokens: 64
---

Question: {{question}}
"#;

        let (metadata, body) = parse_prompt(content).unwrap();
        assert_eq!(metadata.id, "test_prompt");
        assert_eq!(metadata.version, 3);
        assert_eq!(metadata.max_tokens, 64);
        assert_eq!(body, "Question: {{question}}");
    }

    #[test]
    fn test_parse_prompt_requires_frontmatter() {
        assert!(parse_prompt("no frontmatter here").is_err());
        assert!(parse_prompt("---\nid: x\n").is_err());
    }

    #[test]
    fn test_default_prompts_parse() {
        for id in PromptId::all() {
            let (metadata, _) = parse_prompt(id.default_content()).unwrap();
            assert_eq!(metadata.id, id.as_str());
        }
    }

    #[test]
    fn test_generate_sql_defaults() {
        let mut lib = PromptLibrary::embedded_only();
        let prompt = lib.get(PromptId::GenerateSql).unwrap();
        assert!(!prompt.is_override);
        assert_eq!(prompt.metadata.max_tokens, 2048);
        assert!((prompt.metadata.temperature - 0.2).abs() < f32::EPSILON);
        assert!(prompt.content.contains("{{schema}}"));
        assert!(prompt.content.contains("Return ONLY SQL."));
    }

    #[test]
    fn test_render_replaces_placeholders() {
        let mut lib = PromptLibrary::embedded_only();
        let prompt = lib.get(PromptId::ExplainResult).unwrap().clone();

        let mut vars = HashMap::new();
        vars.insert("question", "How many accounts are frozen?");
        vars.insert("result", r#"[{"frozen_accounts":2.0}]"#);

        let rendered = prompt.render(&vars);
        assert!(rendered.contains("How many accounts are frozen?"));
        assert!(rendered.contains(r#"[{"frozen_accounts":2.0}]"#));
        assert!(rendered.contains("simple banking terms"));
        assert!(!rendered.contains("{{"));
    }

    #[test]
    fn test_override_dir_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("explain_result.md"),
            "---\nid: explain_result\nversion: 9\ntemperature: 0.0\nmax_tokens: 10\n---\nShort: {{question}}",
        )
        .unwrap();

        let mut lib = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        let prompt = lib.get(PromptId::ExplainResult).unwrap();
        assert!(prompt.is_override);
        assert_eq!(prompt.metadata.version, 9);

        // No override for this one, embedded default is used
        assert!(!lib.get(PromptId::GenerateSql).unwrap().is_override);
    }
}
