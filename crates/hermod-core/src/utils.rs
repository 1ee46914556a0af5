//! Small shared helpers: paths, filenames, string truncation.

use std::path::PathBuf;

/// The Hermod data directory, `~/.hermod`.
pub fn data_path() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hermod")
}

/// Where session files live, `~/.hermod/sessions`.
pub fn sessions_path() -> PathBuf {
    data_path().join("sessions")
}

/// The default workspace, `~/.hermod/workspace`.
pub fn default_workspace_path() -> PathBuf {
    data_path().join("workspace")
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return dirs_next::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest);
    }
    PathBuf::from(path)
}

/// Strip characters that are hostile in filenames: `<>:"/\|?*`.
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Truncate to `max_len` characters, appending `...` when shortened.
/// Counts characters, not bytes.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{kept}...")
}
