//! Shell execution tool.
//!
//! Commands run under `sh -c`, are killed on timeout, and pass a two-stage
//! screen first. Stage one is the deny-list: regexes from
//! `tools.exec.denyPatterns` in the config, falling back to a built-in set
//! covering destructive commands on both Unix and Windows shells. Stage
//! two applies only in confined mode: the command is tokenized and any
//! token with a `..` segment or an absolute path outside the workspace is
//! refused. Refusals are returned as tool output, so the model sees why
//! and can adjust.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{info, warn};

use super::base::{optional_string, require_string, Tool};

/// Combined output beyond this many characters is clipped in the middle.
const MAX_OUTPUT_CHARS: usize = 10_000;

/// Built-in refusals, used when the operator configures none.
const BUILTIN_DENY: &[&str] = &[
    r"\brm\s+-[a-z]*[rf]",
    r"\bmkfs(\.\w+)?\b",
    r"\bdd\s+.*\bof=/dev/",
    r">\s*/dev/(sd|nvme|hd)",
    r"\b(shutdown|reboot|halt|poweroff)\b",
    r"\bdel\s+/[fqs]",
    r"\bformat(\.com)?\s+[a-z]:",
    r"\brd\s+/s\b",
    r":\s*\(\s*\)\s*\{.*\}\s*;\s*:",
];

pub fn default_deny_patterns() -> Vec<String> {
    BUILTIN_DENY.iter().map(|s| s.to_string()).collect()
}

/// Everything the exec tool needs from configuration.
#[derive(Clone, Debug)]
pub struct ExecPolicy {
    pub timeout_secs: u64,
    /// Refusal regexes, matched against the lowercased command.
    pub deny_patterns: Vec<String>,
    pub confine_to_workspace: bool,
}

impl Default for ExecPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            deny_patterns: default_deny_patterns(),
            confine_to_workspace: false,
        }
    }
}

pub struct ExecTool {
    working_dir: PathBuf,
    timeout: Duration,
    confine: bool,
    /// Compiled pattern plus its source, for refusal messages.
    deny: Vec<(Regex, String)>,
}

impl ExecTool {
    pub fn new(working_dir: PathBuf, policy: ExecPolicy) -> Self {
        let deny = policy
            .deny_patterns
            .into_iter()
            .filter_map(|src| match Regex::new(&src) {
                Ok(re) => Some((re, src)),
                Err(e) => {
                    warn!(pattern = %src, error = %e, "skipping unparseable deny pattern");
                    None
                }
            })
            .collect();

        Self {
            working_dir,
            timeout: Duration::from_secs(policy.timeout_secs),
            confine: policy.confine_to_workspace,
            deny,
        }
    }

    /// `Some(refusal)` when the command must not run.
    fn screen(&self, command: &str) -> Option<String> {
        let lowered = command.to_lowercase();
        for (re, src) in &self.deny {
            if re.is_match(&lowered) {
                warn!(command = command, pattern = %src, "command refused by policy");
                return Some(format!(
                    "Error: command refused by policy (matches deny pattern '{src}')"
                ));
            }
        }

        if self.confine {
            let root = self
                .working_dir
                .canonicalize()
                .unwrap_or_else(|_| self.working_dir.clone());
            for token in path_like_tokens(command) {
                if token.split('/').any(|segment| segment == "..") {
                    return Some(
                        "Error: command refused, '..' path segments are not allowed \
                         in a confined workspace"
                            .into(),
                    );
                }
                if token.starts_with('/') {
                    let p = Path::new(&token);
                    let resolved = p.canonicalize().unwrap_or_else(|_| p.to_path_buf());
                    if !resolved.starts_with(&root) {
                        return Some(format!(
                            "Error: command touches '{token}' outside the workspace"
                        ));
                    }
                }
            }
        }

        None
    }
}

/// Split a command into rough tokens and keep what could be a path:
/// quotes are stripped, and redirect/assignment prefixes (`>`, `2>`,
/// `FOO=`) are peeled so the path behind them is still screened.
fn path_like_tokens(command: &str) -> Vec<String> {
    command
        .split_whitespace()
        .map(|t| t.trim_matches(|c| matches!(c, '"' | '\'' | ';' | '(' | ')' | '&' | '|')))
        .map(|t| {
            let t = t.trim_start_matches(|c: char| c.is_ascii_digit() || c == '>' || c == '<');
            match t.split_once('=') {
                Some((_, rhs)) => rhs,
                None => t,
            }
        })
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keep the head and tail of oversized output; the middle is the least
/// informative part of a long command transcript.
fn clip(text: String, limit: usize) -> String {
    let total = text.chars().count();
    if total <= limit {
        return text;
    }
    let head: String = text.chars().take(limit * 3 / 4).collect();
    let tail: String = text.chars().skip(total - limit / 4).collect();
    format!("{head}\n[... {} chars elided ...]\n{tail}", total - limit)
}

#[async_trait]
impl Tool for ExecTool {
    fn name(&self) -> &str {
        "exec"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its output. Use for builds, \
         git, and any CLI tooling."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "The shell command to run"},
                "working_dir": {
                    "type": "string",
                    "description": "Working directory (defaults to the workspace root)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let command = require_string(&params, "command")?;
        let cwd = match optional_string(&params, "working_dir") {
            Some(dir) => {
                let dir = PathBuf::from(dir);
                if self.confine && !dir.starts_with(&self.working_dir) {
                    return Ok(format!(
                        "Error: working_dir '{}' is outside the workspace",
                        dir.display()
                    ));
                }
                dir
            }
            None => self.working_dir.clone(),
        };

        if let Some(refusal) = self.screen(&command) {
            return Ok(refusal);
        }

        info!(command = %command, cwd = %cwd.display(), "exec");

        let child = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .current_dir(&cwd)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| anyhow::anyhow!("Failed to spawn command: {e}"))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => anyhow::bail!("Command failed: {e}"),
            // Dropping the timed-out future kills the child.
            Err(_) => {
                return Ok(format!(
                    "Error: command timed out after {}s and was killed",
                    self.timeout.as_secs()
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut sections = Vec::new();
        if !stdout.trim().is_empty() {
            sections.push(stdout.trim_end().to_string());
        }
        if !stderr.trim().is_empty() {
            sections.push(format!("[stderr]\n{}", stderr.trim_end()));
        }
        if !output.status.success() {
            sections.push(format!(
                "[exit status: {}]",
                output.status.code().unwrap_or(-1)
            ));
        }

        if sections.is_empty() {
            return Ok("(command produced no output)".into());
        }
        Ok(clip(sections.join("\n"), MAX_OUTPUT_CHARS))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
