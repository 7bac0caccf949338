//! Per-conversation transcripts, one JSON object per line.
//!
//! Only user and assistant messages are kept. Tool traffic and system
//! prompts are reconstructed on every turn, so they never hit disk.

use crate::{Message, MessageRole};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One transcript line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl TranscriptRecord {
    fn into_message(self) -> Message {
        match self.role {
            MessageRole::User => Message::user(self.content),
            _ => Message::assistant_text(self.content),
        }
    }
}

/// Directory of `<conversation id>.jsonl` files; ids are mapped through
/// [`encode_id`].
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    dir: PathBuf,
}

impl TranscriptStore {
    /// Open (creating if needed) the transcript directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, String> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create {}: {e}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, conversation_id: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", encode_id(conversation_id)))
    }

    /// Stored messages of a conversation, oldest first.
    ///
    /// A missing file is an empty conversation. Lines that fail to parse are
    /// skipped.
    pub fn load(&self, conversation_id: &str) -> Vec<Message> {
        let path = self.path_for(conversation_id);
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Failed to read transcript {}: {e}", path.display());
                return Vec::new();
            }
        };

        text.lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<TranscriptRecord>(line) {
                Ok(record) if record.role.is_persisted() => Some(record.into_message()),
                Ok(_) => None,
                Err(e) => {
                    debug!("Skipping malformed transcript line in {}: {e}", path.display());
                    None
                }
            })
            .collect()
    }

    /// Append one message. System and tool messages are silently dropped.
    pub fn append(&self, conversation_id: &str, message: &Message) -> Result<(), String> {
        if !message.role.is_persisted() {
            return Ok(());
        }
        let record = TranscriptRecord {
            role: message.role.clone(),
            content: message.text().to_string(),
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        };
        let line = serde_json::to_string(&record)
            .map_err(|e| format!("Failed to encode transcript record: {e}"))?;

        let path = self.path_for(conversation_id);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| format!("Failed to open {}: {e}", path.display()))?;
        writeln!(file, "{line}").map_err(|e| format!("Failed to write {}: {e}", path.display()))
    }

    /// Ids of every stored conversation, sorted.
    pub fn list(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "jsonl"))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).and_then(decode_id))
            .collect();
        ids.sort();
        ids
    }

    /// Number of stored conversations.
    pub fn count(&self) -> usize {
        self.list().len()
    }
}

/// Map a conversation id to a file stem that stays inside the transcript
/// directory.
///
/// `[A-Za-z0-9-]` pass through; every other byte, `_` included, becomes
/// `_xx` (lowercase hex). The mapping is reversible, so distinct ids never
/// share a file. The empty id maps to a bare `_`.
pub fn encode_id(id: &str) -> String {
    if id.is_empty() {
        return "_".to_string();
    }
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("_{byte:02x}"));
        }
    }
    out
}

/// Inverse of [`encode_id`]. `None` for stems it cannot have produced.
pub fn decode_id(stem: &str) -> Option<String> {
    if stem == "_" {
        return Some(String::new());
    }
    let mut bytes = Vec::with_capacity(stem.len());
    let mut iter = stem.bytes();
    while let Some(byte) = iter.next() {
        match byte {
            b'_' => {
                let hi = char::from(iter.next()?).to_digit(16)?;
                let lo = char::from(iter.next()?).to_digit(16)?;
                bytes.push(u8::try_from(hi * 16 + lo).ok()?);
            }
            b if b.is_ascii_alphanumeric() || b == b'-' => bytes.push(b),
            _ => return None,
        }
    }
    String::from_utf8(bytes).ok()
}
