//! Skills: markdown playbooks the agent can load into its prompt.
//!
//! A skill is a directory containing `SKILL.md`. It teaches the model how
//! to combine existing tools for a domain; it registers no new tools.
//!
//! Discovery order: `<workspace>/skills/<name>/` first, then the built-in
//! directory. A workspace skill shadows a built-in of the same name.
//!
//! `SKILL.md` may open with frontmatter between `---` lines:
//!
//! ```text
//! ---
//! name: github
//! description: "Work with GitHub through the gh CLI"
//! metadata: {"hermod":{"always":false,"requires":{"bins":["gh"],"env":["GITHUB_TOKEN"]}}}
//! ---
//! ```
//!
//! Always-on skills are injected whole into every system prompt; the rest
//! appear in an XML-like manifest, and the model reads their `SKILL.md`
//! on demand with `read_file`. Availability requires every listed binary
//! on PATH and every listed environment variable set non-empty.

use std::path::{Path, PathBuf};

use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkillSource {
    Workspace,
    Builtin,
}

#[derive(Clone, Debug)]
pub struct SkillInfo {
    pub name: String,
    /// Path to the `SKILL.md` descriptor.
    pub path: PathBuf,
    pub source: SkillSource,
}

#[derive(Clone, Debug, Default)]
pub struct SkillRequires {
    pub bins: Vec<String>,
    pub env: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SkillMeta {
    /// Inject the full body into every system prompt.
    pub always: bool,
    pub requires: SkillRequires,
    pub description: Option<String>,
}

pub struct SkillsLoader {
    workspace_skills: PathBuf,
    builtin_skills: Option<PathBuf>,
}

impl SkillsLoader {
    pub fn new(workspace: &Path, builtin_skills: Option<PathBuf>) -> Self {
        Self {
            workspace_skills: workspace.join("skills"),
            builtin_skills,
        }
    }

    // ────────────── discovery ──────────────

    /// All discovered skills. With `only_available`, skills with unmet
    /// requirements are dropped.
    pub fn list_skills(&self, only_available: bool) -> Vec<SkillInfo> {
        let mut skills = Vec::new();
        scan_dir(&self.workspace_skills, SkillSource::Workspace, &mut skills);

        if let Some(builtin) = &self.builtin_skills {
            let mut found = Vec::new();
            scan_dir(builtin, SkillSource::Builtin, &mut found);
            for skill in found {
                if !skills.iter().any(|s| s.name == skill.name) {
                    skills.push(skill);
                }
            }
        }

        if only_available {
            skills.retain(|s| requirements_met(&self.skill_meta(&s.name).requires));
        }
        skills
    }

    // ────────────── loading ──────────────

    /// Raw descriptor content, workspace first.
    pub fn load_skill(&self, name: &str) -> Option<String> {
        let ws = self.workspace_skills.join(name).join("SKILL.md");
        if ws.is_file() {
            return std::fs::read_to_string(ws).ok();
        }
        let builtin = self.builtin_skills.as_ref()?.join(name).join("SKILL.md");
        std::fs::read_to_string(builtin).ok()
    }

    /// Frontmatter-stripped bodies of the named skills, for prompt
    /// injection.
    pub fn load_for_context(&self, names: &[String]) -> String {
        names
            .iter()
            .filter_map(|name| {
                let content = self.load_skill(name)?;
                let body = strip_frontmatter(&content);
                if body.is_empty() {
                    return None;
                }
                Some(format!("### Skill: {name}\n\n{body}"))
            })
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    }

    /// Names of available skills flagged always-on.
    pub fn always_skills(&self) -> Vec<String> {
        self.list_skills(true)
            .into_iter()
            .filter(|s| self.skill_meta(&s.name).always)
            .map(|s| s.name)
            .collect()
    }

    /// The manifest of every skill, available or not, for the system
    /// prompt. Unavailable entries carry what is missing so the model can
    /// advise installation.
    pub fn skills_manifest(&self) -> String {
        let all = self.list_skills(false);
        if all.is_empty() {
            return String::new();
        }

        let mut lines = vec!["<skills>".to_string()];
        for skill in &all {
            let meta = self.skill_meta(&skill.name);
            let available = requirements_met(&meta.requires);
            let desc = meta.description.as_deref().unwrap_or(&skill.name);

            lines.push(format!(
                "  <skill available=\"{}\">",
                if available { "true" } else { "false" }
            ));
            lines.push(format!("    <name>{}</name>", escape_xml(&skill.name)));
            lines.push(format!("    <description>{}</description>", escape_xml(desc)));
            lines.push(format!("    <location>{}</location>", skill.path.display()));
            if !available {
                let missing = missing_requirements(&meta.requires);
                if !missing.is_empty() {
                    lines.push(format!("    <requires>{}</requires>", escape_xml(&missing)));
                }
            }
            lines.push("  </skill>".to_string());
        }
        lines.push("</skills>".to_string());
        lines.join("\n")
    }

    // ────────────── metadata ──────────────

    pub fn skill_meta(&self, name: &str) -> SkillMeta {
        let Some(content) = self.load_skill(name) else {
            return SkillMeta::default();
        };
        let Some(pairs) = parse_frontmatter(&content) else {
            return SkillMeta::default();
        };

        let description = pairs
            .iter()
            .find(|(k, _)| k == "description")
            .map(|(_, v)| v.trim_matches('"').trim_matches('\'').to_string());
        let always_top = pairs
            .iter()
            .find(|(k, _)| k == "always")
            .is_some_and(|(_, v)| v == "true");
        let metadata_json = pairs
            .iter()
            .find(|(k, _)| k == "metadata")
            .map(|(_, v)| v.as_str())
            .unwrap_or("");
        let (always_meta, requires) = parse_vendor_metadata(metadata_json);

        SkillMeta {
            always: always_top || always_meta,
            requires,
            description,
        }
    }
}

// ─────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────

fn scan_dir(dir: &Path, source: SkillSource, out: &mut Vec<SkillInfo>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let descriptor = path.join("SKILL.md");
        if path.is_dir() && descriptor.is_file() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                debug!(name, source = ?source, "skill discovered");
                out.push(SkillInfo {
                    name: name.to_string(),
                    path: descriptor,
                    source: source.clone(),
                });
            }
        }
    }
}

/// Naive line-based frontmatter: `key: value` pairs between `---` fences.
fn parse_frontmatter(content: &str) -> Option<Vec<(String, String)>> {
    let after = content.strip_prefix("---")?;
    let end = after.find("\n---")?;
    let mut pairs = Vec::new();
    for line in after[..end].lines() {
        let line = line.trim();
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                pairs.push((key.to_string(), value.trim().to_string()));
            }
        }
    }
    Some(pairs)
}

fn strip_frontmatter(content: &str) -> &str {
    let Some(after) = content.strip_prefix("---") else {
        return content;
    };
    match after.find("\n---") {
        Some(end) => after[end + 4..].trim_start_matches('\n'),
        None => content,
    }
}

/// The frontmatter `metadata` field is JSON; its `hermod` object carries
/// `always` and `requires.{bins,env}`.
fn parse_vendor_metadata(raw: &str) -> (bool, SkillRequires) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) else {
        return (false, SkillRequires::default());
    };
    let Some(vendor) = value.get("hermod") else {
        return (false, SkillRequires::default());
    };

    let always = vendor.get("always").and_then(|v| v.as_bool()).unwrap_or(false);
    let string_list = |v: Option<&serde_json::Value>| -> Vec<String> {
        v.and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|s| s.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    };
    let requires = vendor
        .get("requires")
        .map(|r| SkillRequires {
            bins: string_list(r.get("bins")),
            env: string_list(r.get("env")),
        })
        .unwrap_or_default();

    (always, requires)
}

fn requirements_met(requires: &SkillRequires) -> bool {
    requires.bins.iter().all(|b| binary_on_path(b))
        && requires
            .env
            .iter()
            .all(|e| std::env::var(e).map(|v| !v.is_empty()).unwrap_or(false))
}

fn missing_requirements(requires: &SkillRequires) -> String {
    let mut missing = Vec::new();
    for bin in &requires.bins {
        if !binary_on_path(bin) {
            missing.push(format!("CLI: {bin}"));
        }
    }
    for var in &requires.env {
        if std::env::var(var).map(|v| v.is_empty()).unwrap_or(true) {
            missing.push(format!("ENV: {var}"));
        }
    }
    missing.join(", ")
}

fn binary_on_path(name: &str) -> bool {
    let Ok(path_var) = std::env::var("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| dir.join(name).is_file())
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
