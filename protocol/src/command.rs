use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

/// A command an agent wants to run, in three forms: the literal text the
/// executor will run, an optional redacted form safe to show in events and
/// notifications, and a content hash for dedup/audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub raw: String,
    #[serde(default)]
    pub display_redacted: String,
    pub hash: String,
}

impl Command {
    /// Build a `Command` from raw text, computing its hash and defaulting
    /// the redacted form to the raw text when the caller has nothing to
    /// redact.
    pub fn new(raw: impl Into<String>, display_redacted: Option<String>) -> Self {
        let raw = raw.into();
        let hash = hex::encode(Sha256::digest(raw.as_bytes()));
        let display_redacted = display_redacted.unwrap_or_default();
        Self {
            raw,
            display_redacted,
            hash,
        }
    }

    /// The form safe to surface in events, notifications, and logs.
    pub fn display(&self) -> &str {
        if self.display_redacted.is_empty() {
            &self.raw
        } else {
            &self.display_redacted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_falls_back_to_raw_when_redacted_is_empty() {
        let command = Command::new("cat secrets.env", None);
        assert_eq!(command.display(), "cat secrets.env");
    }

    #[test]
    fn display_prefers_redacted_form() {
        let command = Command::new("cat secrets.env", Some("cat ****".to_string()));
        assert_eq!(command.display(), "cat ****");
    }

    #[test]
    fn hash_is_stable_for_identical_input() {
        let a = Command::new("echo hi", None);
        let b = Command::new("echo hi", None);
        assert_eq!(a.hash, b.hash);
    }
}
