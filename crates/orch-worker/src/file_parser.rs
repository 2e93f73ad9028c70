//! Turns a model's raw text response into edits on disk.
//!
//! Specialties can supply their own parser (e.g. a frontend agent might
//! expect a different response convention than a docs agent); the
//! registry falls back to [`MarkdownFencedFileParser`] when none is
//! registered for a given specialty.

use std::collections::HashMap;
use std::path::Path;

use orch_core::{Specialty, Task};
use regex::Regex;

use crate::error::{Error, Result};

/// Applies an LLM response to files under `worktree_path`, returning the
/// paths it touched (relative to the worktree root).
pub trait FileParser: Send + Sync {
    fn apply(&self, llm_response: &str, task: &Task, worktree_path: &Path) -> Result<Vec<String>>;
}

/// Expects the model response to contain one or more blocks of the form:
///
/// ```text
/// ### FILE: path/to/file.py
/// ```python
/// <file contents>
/// ```
/// ```
///
/// Any file in `task.file_scope()` that doesn't appear in the response is
/// left untouched — the model may legitimately decide a listed file needs
/// no change.
pub struct MarkdownFencedFileParser {
    file_header: Regex,
}

impl Default for MarkdownFencedFileParser {
    fn default() -> Self {
        Self {
            file_header: Regex::new(r"(?m)^###\s*FILE:\s*(?P<path>\S+)\s*$").unwrap(),
        }
    }
}

impl FileParser for MarkdownFencedFileParser {
    fn apply(&self, llm_response: &str, _task: &Task, worktree_path: &Path) -> Result<Vec<String>> {
        let headers: Vec<_> = self.file_header.captures_iter(llm_response).collect();
        if headers.is_empty() {
            return Err(Error::FileOperation {
                file: String::new(),
                reason: "model response contained no FILE blocks".to_string(),
            });
        }

        let mut modified = Vec::new();

        for (index, caps) in headers.iter().enumerate() {
            let relative_path = caps["path"].to_string();
            let header_end = caps.get(0).unwrap().end();
            let section_end = headers
                .get(index + 1)
                .map_or(llm_response.len(), |next| next.get(0).unwrap().start());
            let section = &llm_response[header_end..section_end];

            let content = extract_fenced_block(section).unwrap_or_else(|| section.trim().to_string());

            let target = worktree_path.join(&relative_path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| Error::FileOperation {
                    file: relative_path.clone(),
                    reason: e.to_string(),
                })?;
            }
            std::fs::write(&target, content).map_err(|e| Error::FileOperation {
                file: relative_path.clone(),
                reason: e.to_string(),
            })?;

            modified.push(relative_path);
        }

        Ok(modified)
    }
}

fn extract_fenced_block(section: &str) -> Option<String> {
    let start = section.find("```")?;
    let after_open = section[start + 3..].find('\n')? + start + 4;
    let close = section[after_open..].find("```")?;
    Some(section[after_open..after_open + close].to_string())
}

/// Looks up the parser for a task's specialty, falling back to the
/// markdown-fence default.
#[derive(Default)]
pub struct ParserRegistry {
    by_specialty: HashMap<Specialty, Box<dyn FileParser>>,
    default_parser: MarkdownFencedFileParser,
}

impl ParserRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, specialty: Specialty, parser: Box<dyn FileParser>) -> &mut Self {
        self.by_specialty.insert(specialty, parser);
        self
    }

    #[must_use]
    pub fn resolve(&self, specialty: Specialty) -> &dyn FileParser {
        self.by_specialty
            .get(&specialty)
            .map_or(&self.default_parser as &dyn FileParser, |boxed| boxed.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task() -> Task {
        Task {
            id: "t1".to_string(),
            title: "demo".to_string(),
            description: String::new(),
            specialty: Specialty::Backend,
            files_to_create: vec!["src/app.py".to_string()],
            files_to_modify: vec![],
            dependencies: vec![],
            estimated_hours: 1.0,
            project_id: "p".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn parses_single_file_block() {
        let tmp = tempfile::tempdir().unwrap();
        let response = "### FILE: src/app.py\n```python\nprint('hi')\n```\n";

        let modified = MarkdownFencedFileParser::default()
            .apply(response, &task(), tmp.path())
            .unwrap();

        assert_eq!(modified, vec!["src/app.py"]);
        let written = std::fs::read_to_string(tmp.path().join("src/app.py")).unwrap();
        assert_eq!(written, "print('hi')\n");
    }

    #[test]
    fn parses_multiple_file_blocks() {
        let tmp = tempfile::tempdir().unwrap();
        let response = "### FILE: a.py\n```\nA\n```\n### FILE: b.py\n```\nB\n```\n";

        let modified = MarkdownFencedFileParser::default()
            .apply(response, &task(), tmp.path())
            .unwrap();

        assert_eq!(modified, vec!["a.py", "b.py"]);
    }

    #[test]
    fn errors_when_no_file_blocks_present() {
        let tmp = tempfile::tempdir().unwrap();
        let result = MarkdownFencedFileParser::default().apply("just prose", &task(), tmp.path());
        assert!(result.is_err());
    }

    #[test]
    fn registry_falls_back_to_default_for_unregistered_specialty() {
        let registry = ParserRegistry::new();
        let tmp = tempfile::tempdir().unwrap();
        let parser = registry.resolve(Specialty::Docs);
        let modified = parser.apply("### FILE: README.md\n```\nhi\n```\n", &task(), tmp.path()).unwrap();
        assert_eq!(modified, vec!["README.md"]);
    }
}
