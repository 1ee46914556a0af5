//! Context builder: assembles the message list for each provider call.
//!
//! The system prompt is the `\n\n---\n\n`-joined concatenation of the
//! non-empty parts among: identity, bootstrap files, memory, always-on
//! skill bodies, and the skills manifest. History follows, then the
//! current user turn (multimodal when image media is attached).

use std::path::PathBuf;

use chrono::Local;
use tracing::debug;

use hermod_core::types::{ContentPart, ImageUrl, Message, ToolCall};

use crate::memory::MemoryStore;
use crate::skills::SkillsLoader;

/// Workspace files injected verbatim into the system prompt, in this order.
const BOOTSTRAP_FILES: &[&str] = &["AGENTS.md", "SOUL.md", "USER.md", "TOOLS.md", "IDENTITY.md"];

pub struct ContextBuilder {
    workspace: PathBuf,
    agent_name: String,
    memory: MemoryStore,
    skills: SkillsLoader,
}

impl ContextBuilder {
    pub fn new(workspace: impl Into<PathBuf>, agent_name: impl Into<String>) -> Self {
        let workspace = workspace.into();
        let memory = MemoryStore::new(&workspace);
        let skills = SkillsLoader::new(&workspace, None);
        Self {
            workspace,
            agent_name: agent_name.into(),
            memory,
            skills,
        }
    }

    /// Point the skills loader at a built-in skills directory too.
    pub fn with_builtin_skills(mut self, path: PathBuf) -> Self {
        self.skills = SkillsLoader::new(&self.workspace, Some(path));
        self
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn skills(&self) -> &SkillsLoader {
        &self.skills
    }

    // ────────────── system prompt ──────────────

    pub fn build_system_prompt(&self) -> String {
        let mut parts = vec![self.identity()];

        for filename in BOOTSTRAP_FILES {
            let path = self.workspace.join(filename);
            if let Ok(content) = std::fs::read_to_string(&path) {
                debug!(file = filename, "bootstrap file loaded");
                parts.push(format!("## {filename}\n\n{content}"));
            }
        }

        if let Some(memory) = self.memory.memory_context() {
            parts.push(memory);
        }

        let always = self.skills.always_skills();
        if !always.is_empty() {
            let bodies = self.skills.load_for_context(&always);
            if !bodies.is_empty() {
                parts.push(format!("# Active Skills\n\n{bodies}"));
            }
        }

        let manifest = self.skills.skills_manifest();
        if !manifest.is_empty() {
            parts.push(format!(
                "# Skills\n\n\
                 The following skills extend your capabilities. To use one, read its \
                 SKILL.md with the `read_file` tool. Skills with available=\"false\" \
                 need their dependencies installed first.\n\n\
                 {manifest}"
            ));
        }

        parts.join("\n\n---\n\n")
    }

    fn identity(&self) -> String {
        let now = Local::now().format("%Y-%m-%d %H:%M (%A)");
        let workspace = self.workspace.display();
        let memory_file = self.memory.memory_file().display();
        let today = Local::now().format("%Y-%m-%d");

        format!(
            "# {name}\n\n\
             You are {name}, a helpful personal assistant.\n\n\
             - Time: {now}\n\
             - Host: {os}/{arch}\n\
             - Workspace: {workspace}\n\n\
             You have tools for reading and writing files, running shell commands, \
             searching the web, messaging chat channels, scheduling jobs, and \
             delegating background work to subagents. Prefer tools over guessing.\n\n\
             Reply to conversation with plain text. Only use the `message` tool to \
             reach a different chat than the one you are answering.\n\n\
             When you learn something durable about the user, write it to \
             {memory_file}. Keep daily notes in {workspace}/memory/{today}.md.",
            name = self.agent_name,
            os = std::env::consts::OS,
            arch = std::env::consts::ARCH,
        )
    }

    // ────────────── message list ──────────────

    /// System prompt + history + the current turn. With a channel and chat
    /// id, the system prompt gets a `## Current Session` trailer.
    pub fn build_messages(
        &self,
        history: &[Message],
        current_text: &str,
        media: &[String],
        channel: Option<&str>,
        chat_id: Option<&str>,
    ) -> Vec<Message> {
        let mut system = self.build_system_prompt();
        if let (Some(channel), Some(chat_id)) = (channel, chat_id) {
            system.push_str(&format!(
                "\n\n## Current Session\nChannel: {channel}\nChat ID: {chat_id}"
            ));
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(system));
        messages.extend_from_slice(history);
        messages.push(build_user_turn(current_text, media));
        messages
    }

    /// Append an assistant message; tool calls ride along when present.
    pub fn push_assistant(
        messages: &mut Vec<Message>,
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    ) {
        if tool_calls.is_empty() {
            if let Some(text) = content {
                messages.push(Message::assistant(text));
            }
        } else {
            messages.push(Message::assistant_with_calls(content, tool_calls));
        }
    }

    /// Append a tool result threaded by call id and tool name.
    pub fn push_tool_result(
        messages: &mut Vec<Message>,
        tool_call_id: &str,
        tool_name: &str,
        result: &str,
    ) {
        messages.push(Message::tool_result(tool_call_id, tool_name, result));
    }
}

// ─────────────────────────────────────────────
// Multimodal user content
// ─────────────────────────────────────────────

/// Plain text unless readable image files are attached; then images as
/// base64 data URLs followed by the text. Anything that is not a readable
/// image is silently dropped.
fn build_user_turn(text: &str, media: &[String]) -> Message {
    let mut parts = Vec::new();
    for path in media {
        let Some(mime) = image_mime(path) else {
            continue;
        };
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        parts.push(ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:{mime};base64,{}", base64(&bytes)),
            },
        });
    }

    if parts.is_empty() {
        return Message::user(text);
    }
    parts.push(ContentPart::Text {
        text: text.to_string(),
    });
    Message::user_parts(parts)
}

/// Image MIME type by extension; `None` for everything else.
fn image_mime(path: &str) -> Option<&'static str> {
    let lower = path.to_lowercase();
    let mime = if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        return None;
    };
    Some(mime)
}

/// Standard-alphabet base64, no external dependency.
fn base64(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = Vec::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let b = [chunk[0], *chunk.get(1).unwrap_or(&0), *chunk.get(2).unwrap_or(&0)];
        let triple = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);
        out.push(ALPHABET[(triple >> 18) as usize & 0x3f]);
        out.push(ALPHABET[(triple >> 12) as usize & 0x3f]);
        out.push(if chunk.len() > 1 {
            ALPHABET[(triple >> 6) as usize & 0x3f]
        } else {
            b'='
        });
        out.push(if chunk.len() > 2 {
            ALPHABET[triple as usize & 0x3f]
        } else {
            b'='
        });
    }
    String::from_utf8(out).unwrap_or_default()
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use hermod_core::types::UserContent;

    #[test]
    fn base64_known_vectors() {
        assert_eq!(base64(b"Hello"), "SGVsbG8=");
        assert_eq!(base64(b"Hi"), "SGk=");
        assert_eq!(base64(b"ABC"), "QUJD");
        assert_eq!(base64(b""), "");
    }

    #[test]
    fn image_mime_by_extension() {
        assert_eq!(image_mime("a.png"), Some("image/png"));
        assert_eq!(image_mime("A.JPG"), Some("image/jpeg"));
        assert_eq!(image_mime("b.webp"), Some("image/webp"));
        assert_eq!(image_mime("voice.ogg"), None);
        assert_eq!(image_mime("doc.pdf"), None);
    }

    #[test]
    fn identity_mentions_agent_and_workspace() {
        let ctx = ContextBuilder::new("/tmp/ws", "Hermod");
        let identity = ctx.identity();
        assert!(identity.contains("Hermod"));
        assert!(identity.contains("/tmp/ws"));
    }

    #[test]
    fn system_prompt_includes_bootstrap_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("AGENTS.md"), "agent rules").unwrap();
        std::fs::write(dir.path().join("USER.md"), "about the user").unwrap();

        let ctx = ContextBuilder::new(dir.path(), "Hermod");
        let prompt = ctx.build_system_prompt();
        assert!(prompt.contains("## AGENTS.md"));
        assert!(prompt.contains("agent rules"));
        assert!(prompt.contains("## USER.md"));
        let agents_at = prompt.find("## AGENTS.md").unwrap();
        let user_at = prompt.find("## USER.md").unwrap();
        assert!(agents_at < user_at);
    }

    #[test]
    fn system_prompt_parts_joined_by_rule() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("SOUL.md"), "soul").unwrap();
        let ctx = ContextBuilder::new(dir.path(), "Hermod");
        assert!(ctx.build_system_prompt().contains("\n\n---\n\n"));
    }

    #[test]
    fn system_prompt_includes_memory() {
        let dir = tempfile::tempdir().unwrap();
        let mem = dir.path().join("memory");
        std::fs::create_dir(&mem).unwrap();
        std::fs::write(mem.join("MEMORY.md"), "Likes tea.").unwrap();

        let ctx = ContextBuilder::new(dir.path(), "Hermod");
        let prompt = ctx.build_system_prompt();
        assert!(prompt.contains("# Memory"));
        assert!(prompt.contains("Likes tea."));
    }

    #[test]
    fn system_prompt_includes_skills_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let skill = dir.path().join("skills").join("notes");
        std::fs::create_dir_all(&skill).unwrap();
        std::fs::write(skill.join("SKILL.md"), "---\nname: notes\n---\n\n# N").unwrap();

        let ctx = ContextBuilder::new(dir.path(), "Hermod");
        let prompt = ctx.build_system_prompt();
        assert!(prompt.contains("# Skills"));
        assert!(prompt.contains("<name>notes</name>"));
    }

    #[test]
    fn always_skill_body_is_inlined() {
        let dir = tempfile::tempdir().unwrap();
        let skill = dir.path().join("skills").join("oncall");
        std::fs::create_dir_all(&skill).unwrap();
        std::fs::write(
            skill.join("SKILL.md"),
            "---\nname: oncall\nalways: true\n---\n\n# Escalation ladder",
        )
        .unwrap();

        let ctx = ContextBuilder::new(dir.path(), "Hermod");
        let prompt = ctx.build_system_prompt();
        assert!(prompt.contains("# Active Skills"));
        assert!(prompt.contains("Escalation ladder"));
    }

    #[test]
    fn message_list_shape() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ContextBuilder::new(dir.path(), "Hermod");
        let history = vec![Message::user("earlier"), Message::assistant("noted")];
        let messages = ctx.build_messages(&history, "now this", &[], Some("cli"), Some("direct"));
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role(), "system");
        assert_eq!(messages[3].role(), "user");
    }

    #[test]
    fn session_trailer_only_with_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ContextBuilder::new(dir.path(), "Hermod");

        let with = ctx.build_messages(&[], "x", &[], Some("telegram"), Some("42"));
        let Message::System { content } = &with[0] else {
            panic!("expected system message");
        };
        assert!(content.contains("## Current Session"));
        assert!(content.contains("Channel: telegram"));
        assert!(content.contains("Chat ID: 42"));

        let without = ctx.build_messages(&[], "x", &[], None, None);
        let Message::System { content } = &without[0] else {
            panic!("expected system message");
        };
        assert!(!content.contains("## Current Session"));
    }

    #[test]
    fn media_images_become_parts_with_trailing_text() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("shot.png");
        std::fs::write(&img, [0x89, 0x50, 0x4e, 0x47]).unwrap();

        let msg = build_user_turn("what is this?", &[img.to_string_lossy().into()]);
        let Message::User {
            content: UserContent::Parts(parts),
        } = msg
        else {
            panic!("expected multipart user message");
        };
        assert_eq!(parts.len(), 2);
        match &parts[0] {
            ContentPart::ImageUrl { image_url } => {
                assert!(image_url.url.starts_with("data:image/png;base64,"));
            }
            other => panic!("expected image part, got {other:?}"),
        }
        match &parts[1] {
            ContentPart::Text { text } => assert_eq!(text, "what is this?"),
            other => panic!("expected trailing text, got {other:?}"),
        }
    }

    #[test]
    fn non_image_media_dropped_silently() {
        let dir = tempfile::tempdir().unwrap();
        let voice = dir.path().join("note.ogg");
        std::fs::write(&voice, b"opus").unwrap();

        let msg = build_user_turn("transcribed already", &[voice.to_string_lossy().into()]);
        assert!(matches!(
            msg,
            Message::User {
                content: UserContent::Text(_)
            }
        ));
    }

    #[test]
    fn unreadable_image_dropped_silently() {
        let msg = build_user_turn("hi", &["/nonexistent/shot.png".into()]);
        assert!(matches!(
            msg,
            Message::User {
                content: UserContent::Text(_)
            }
        ));
    }

    #[test]
    fn push_helpers() {
        let mut messages = Vec::new();
        ContextBuilder::push_assistant(&mut messages, Some("thinking".into()), vec![]);
        ContextBuilder::push_assistant(
            &mut messages,
            None,
            vec![ToolCall::new("c1", "exec", "{}")],
        );
        ContextBuilder::push_tool_result(&mut messages, "c1", "exec", "done");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].role(), "tool");

        // No content, no calls: nothing appended.
        ContextBuilder::push_assistant(&mut messages, None, vec![]);
        assert_eq!(messages.len(), 3);
    }
}
