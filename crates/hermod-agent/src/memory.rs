//! File-based agent memory.
//!
//! Two kinds of notes live under `<workspace>/memory/`:
//! - `MEMORY.md`: long-term facts and preferences
//! - `YYYY-MM-DD.md`: one file of notes per day
//!
//! The context builder reads memory passively on every prompt; the agent
//! writes it actively through the filesystem tools. Single writer, no
//! locking.

use std::path::{Path, PathBuf};

use chrono::Local;

pub struct MemoryStore {
    memory_dir: PathBuf,
    memory_file: PathBuf,
}

impl MemoryStore {
    /// A store over `<workspace>/memory`. Nothing is created until a write
    /// happens, so read paths work against a missing directory.
    pub fn new(workspace: &Path) -> Self {
        let memory_dir = workspace.join("memory");
        let memory_file = memory_dir.join("MEMORY.md");
        Self {
            memory_dir,
            memory_file,
        }
    }

    // ────────────── long-term ──────────────

    pub fn read_long_term(&self) -> String {
        std::fs::read_to_string(&self.memory_file).unwrap_or_default()
    }

    pub fn write_long_term(&self, content: &str) -> std::io::Result<()> {
        self.ensure_dir()?;
        std::fs::write(&self.memory_file, content)
    }

    // ────────────── daily notes ──────────────

    pub fn today_file(&self) -> PathBuf {
        let today = Local::now().format("%Y-%m-%d");
        self.memory_dir.join(format!("{today}.md"))
    }

    pub fn read_today(&self) -> String {
        std::fs::read_to_string(self.today_file()).unwrap_or_default()
    }

    /// Append to today's notes; a new day file gets a date header first.
    pub fn append_today(&self, content: &str) -> std::io::Result<()> {
        self.ensure_dir()?;
        let path = self.today_file();
        if path.exists() {
            let mut existing = std::fs::read_to_string(&path)?;
            existing.push('\n');
            existing.push_str(content);
            std::fs::write(&path, existing)
        } else {
            let today = Local::now().format("%Y-%m-%d");
            std::fs::write(&path, format!("# {today}\n\n{content}"))
        }
    }

    // ────────────── aggregation ──────────────

    /// Day files, newest first.
    pub fn list_day_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.memory_dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| is_day_file(p))
            .collect();
        files.sort();
        files.reverse();
        files
    }

    /// The newest `days` day files joined with `---` separators.
    pub fn recent_notes(&self, days: usize) -> String {
        self.list_day_files()
            .into_iter()
            .take(days)
            .filter_map(|f| std::fs::read_to_string(&f).ok())
            .filter(|c| !c.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    }

    /// The `# Memory` section for the system prompt, or `None` when there
    /// is nothing to show.
    pub fn memory_context(&self) -> Option<String> {
        let mut sections = Vec::new();

        let long_term = self.read_long_term();
        if !long_term.trim().is_empty() {
            sections.push(format!("## Long-term Memory\n\n{long_term}"));
        }

        let today = self.read_today();
        if !today.trim().is_empty() {
            let date = Local::now().format("%Y-%m-%d");
            sections.push(format!("## Today's Notes ({date})\n\n{today}"));
        }

        if sections.is_empty() {
            None
        } else {
            Some(format!("# Memory\n\n{}", sections.join("\n\n")))
        }
    }

    pub fn memory_file(&self) -> &Path {
        &self.memory_file
    }

    pub fn memory_dir(&self) -> &Path {
        &self.memory_dir
    }

    fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.memory_dir)
    }
}

/// `YYYY-MM-DD.md`, nothing else.
fn is_day_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.len() == 13
        && name.ends_with(".md")
        && name.as_bytes()[4] == b'-'
        && name.as_bytes()[7] == b'-'
        && name[..4].chars().all(|c| c.is_ascii_digit())
        && name[5..7].chars().all(|c| c.is_ascii_digit())
        && name[8..10].chars().all(|c| c.is_ascii_digit())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_empty_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        assert_eq!(store.read_long_term(), "");
        assert_eq!(store.read_today(), "");
        assert!(store.memory_context().is_none());
    }

    #[test]
    fn long_term_write_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        store.write_long_term("Prefers metric units.").unwrap();
        assert_eq!(store.read_long_term(), "Prefers metric units.");
        store.write_long_term("Replaced.").unwrap();
        assert_eq!(store.read_long_term(), "Replaced.");
    }

    #[test]
    fn append_today_creates_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        store.append_today("first").unwrap();
        store.append_today("second").unwrap();

        let content = store.read_today();
        assert!(content.starts_with("# "));
        assert!(content.contains("first"));
        assert!(content.contains("second"));
        assert_eq!(content.matches("# 2").count(), 1);
    }

    #[test]
    fn memory_context_sections() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path());

        store.write_long_term("A standing fact.").unwrap();
        let ctx = store.memory_context().unwrap();
        assert!(ctx.starts_with("# Memory"));
        assert!(ctx.contains("## Long-term Memory"));
        assert!(!ctx.contains("Today's Notes"));

        store.append_today("An event today.").unwrap();
        let ctx = store.memory_context().unwrap();
        assert!(ctx.contains("Today's Notes"));
        assert!(ctx.contains("An event today."));
    }

    #[test]
    fn whitespace_only_memory_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        store.write_long_term("  \n \n").unwrap();
        assert!(store.memory_context().is_none());
    }

    #[test]
    fn day_file_listing_is_strict_and_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        std::fs::create_dir_all(store.memory_dir()).unwrap();
        for name in [
            "2026-03-01.md",
            "2026-03-02.md",
            "2026-3-02.md",
            "MEMORY.md",
            "notes.txt",
        ] {
            std::fs::write(store.memory_dir().join(name), "x").unwrap();
        }

        let files = store.list_day_files();
        assert_eq!(files.len(), 2);
        assert!(files[0].to_string_lossy().contains("2026-03-02"));
    }

    #[test]
    fn recent_notes_takes_newest_n() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path());
        std::fs::create_dir_all(store.memory_dir()).unwrap();
        for (name, body) in [
            ("2026-03-01.md", "day one"),
            ("2026-03-02.md", "day two"),
            ("2026-03-03.md", "day three"),
        ] {
            std::fs::write(store.memory_dir().join(name), body).unwrap();
        }

        let recent = store.recent_notes(2);
        assert!(recent.contains("day three"));
        assert!(recent.contains("day two"));
        assert!(!recent.contains("day one"));
    }
}
