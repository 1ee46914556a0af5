//! Filesystem tools: read, write, edit, list.
//!
//! All four tools share a [`Sandbox`]: the workspace root plus the
//! confinement flag from `tools.restrictToWorkspace`. Relative paths
//! always resolve against the workspace root, so the model can say
//! `notes/todo.md` regardless of the process working directory. In
//! confined mode a path must stay under the root both lexically (after
//! `.`/`..` folding, before anything touches the disk) and physically
//! (symlinks are resolved and re-checked for paths that exist).

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::base::{optional_bool, optional_i64, optional_string, require_string, Tool};

// ─────────────────────────────────────────────
// Sandbox
// ─────────────────────────────────────────────

/// Path policy shared by the file tools.
#[derive(Clone, Debug)]
pub struct Sandbox {
    root: PathBuf,
    confined: bool,
}

impl Sandbox {
    /// Paths must stay under `root`.
    pub fn confined(root: PathBuf) -> Self {
        Self {
            root,
            confined: true,
        }
    }

    /// Anything goes; `root` still anchors relative paths.
    pub fn open(root: PathBuf) -> Self {
        Self {
            root,
            confined: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a model-supplied path under this policy.
    pub fn resolve(&self, raw: &str) -> anyhow::Result<PathBuf> {
        let expanded = hermod_core::utils::expand_home(raw);
        let absolute = if expanded.is_absolute() {
            expanded
        } else {
            self.root.join(expanded)
        };
        let resolved = fold_dots(&absolute);

        if self.confined {
            let root = fold_dots(&self.root);
            if !resolved.starts_with(&root) {
                anyhow::bail!("Refusing '{raw}': outside the workspace");
            }
            // A path that exists may still point elsewhere via symlinks.
            if resolved.exists() {
                let real = resolved.canonicalize().unwrap_or_else(|_| resolved.clone());
                let real_root = self.root.canonicalize().unwrap_or(root);
                if !real.starts_with(&real_root) {
                    anyhow::bail!("Refusing '{raw}': resolves outside the workspace");
                }
            }
        }

        Ok(resolved)
    }
}

/// Fold `.` and `..` components without touching the filesystem.
fn fold_dots(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

// ─────────────────────────────────────────────
// read_file
// ─────────────────────────────────────────────

pub struct ReadFileTool {
    sandbox: Sandbox,
}

impl ReadFileTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file. Relative paths are taken from the workspace root. \
         For large files, pass start_line and max_lines to read a window."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to read"},
                "start_line": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "First line of the window (1-based)"
                },
                "max_lines": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Number of lines to return"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let raw = require_string(&params, "path")?;
        let path = self.sandbox.resolve(&raw)?;
        if !path.is_file() {
            anyhow::bail!("No such file: {}", path.display());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Could not read {}: {e}", path.display()))?;

        let start = optional_i64(&params, "start_line");
        let max = optional_i64(&params, "max_lines");
        if start.is_none() && max.is_none() {
            return Ok(content);
        }

        let lines: Vec<&str> = content.lines().collect();
        let total = lines.len();
        let from = start.unwrap_or(1).max(1) as usize;
        let count = max.map(|n| n as usize).unwrap_or(total);
        let window: Vec<&str> = lines.iter().skip(from - 1).take(count).copied().collect();

        if window.is_empty() {
            return Ok(format!("[no lines at {from}; the file has {total} lines]"));
        }
        let to = from + window.len() - 1;
        let mut out = window.join("\n");
        if window.len() < total {
            out.push_str(&format!("\n[lines {from}-{to} of {total}]"));
        }
        Ok(out)
    }
}

// ─────────────────────────────────────────────
// write_file
// ─────────────────────────────────────────────

pub struct WriteFileTool {
    sandbox: Sandbox,
}

impl WriteFileTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed. \
         Overwrites by default; pass append=true to add to the end instead."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Destination file"},
                "content": {"type": "string", "description": "Text to write"},
                "append": {
                    "type": "boolean",
                    "description": "Append instead of overwriting (default false)"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let raw = require_string(&params, "path")?;
        let content = require_string(&params, "content")?;
        let append = optional_bool(&params, "append").unwrap_or(false);
        let path = self.sandbox.resolve(&raw)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!("Could not create {}: {e}", parent.display())
            })?;
        }

        let lines = content.lines().count();
        if append && path.exists() {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&path)
                .map_err(|e| anyhow::anyhow!("Could not open {}: {e}", path.display()))?;
            file.write_all(content.as_bytes())
                .map_err(|e| anyhow::anyhow!("Could not append to {}: {e}", path.display()))?;
            Ok(format!("{}: appended {lines} lines", path.display()))
        } else {
            std::fs::write(&path, &content)
                .map_err(|e| anyhow::anyhow!("Could not write {}: {e}", path.display()))?;
            Ok(format!("{}: wrote {lines} lines", path.display()))
        }
    }
}

// ─────────────────────────────────────────────
// edit_file
// ─────────────────────────────────────────────

/// Text replacement that insists on an unambiguous match: an edit whose
/// `find` text occurs more than once is rejected unless `all` is set, so
/// the model cannot silently patch the wrong site.
pub struct EditFileTool {
    sandbox: Sandbox,
}

impl EditFileTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace text in a file. The find text must match exactly one place; \
         include surrounding lines to disambiguate, or pass all=true to \
         replace every occurrence."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to edit"},
                "find": {"type": "string", "description": "Exact text to locate", "minLength": 1},
                "replace": {"type": "string", "description": "Replacement text"},
                "all": {
                    "type": "boolean",
                    "description": "Replace every occurrence (default false)"
                }
            },
            "required": ["path", "find", "replace"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let raw = require_string(&params, "path")?;
        let find = require_string(&params, "find")?;
        let replace = require_string(&params, "replace")?;
        let all = optional_bool(&params, "all").unwrap_or(false);

        let path = self.sandbox.resolve(&raw)?;
        if !path.is_file() {
            anyhow::bail!("No such file: {}", path.display());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Could not read {}: {e}", path.display()))?;

        let matches = content.matches(&find).count();
        if matches == 0 {
            anyhow::bail!("The find text does not occur in {}", path.display());
        }
        if matches > 1 && !all {
            anyhow::bail!(
                "The find text occurs {matches} times in {}; add surrounding \
                 context to pin one site, or pass all=true",
                path.display()
            );
        }

        let (updated, replaced) = if all {
            (content.replace(&find, &replace), matches)
        } else {
            (content.replacen(&find, &replace, 1), 1)
        };
        std::fs::write(&path, updated)
            .map_err(|e| anyhow::anyhow!("Could not write {}: {e}", path.display()))?;

        Ok(format!("{}: {replaced} replacement(s)", path.display()))
    }
}

// ─────────────────────────────────────────────
// list_dir
// ─────────────────────────────────────────────

pub struct ListDirTool {
    sandbox: Sandbox,
}

impl ListDirTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List a directory: subdirectories first, then files with sizes. \
         Without a path, lists the workspace root."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (defaults to the workspace root)"
                }
            },
            "required": []
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let path = match optional_string(&params, "path") {
            Some(raw) => self.sandbox.resolve(&raw)?,
            None => self.sandbox.root().to_path_buf(),
        };
        if !path.is_dir() {
            anyhow::bail!("Not a directory: {}", path.display());
        }

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&path)
            .map_err(|e| anyhow::anyhow!("Could not list {}: {e}", path.display()))?
            .flatten()
        {
            let name = entry.file_name().to_string_lossy().to_string();
            match entry.metadata() {
                Ok(meta) if meta.is_dir() => dirs.push(format!("{name}/")),
                Ok(meta) => files.push(format!("{name} ({} bytes)", meta.len())),
                Err(_) => files.push(name),
            }
        }
        dirs.sort();
        files.sort();

        if dirs.is_empty() && files.is_empty() {
            return Ok("(empty)".into());
        }
        Ok(dirs.into_iter().chain(files).collect::<Vec<_>>().join("\n"))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
