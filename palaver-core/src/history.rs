//! Bounded, role-tagged conversation histories.
//!
//! A history is the ordered record of prior turns for one identity. It is
//! capped: pushing past the cap evicts the oldest entry (pure FIFO). Ad-hoc
//! player chat keeps 6 entries, NPC and server event chat keep 20.
//!
//! Persisted histories use a marked line form (`"User: hello"`,
//! `"Assistant: hi"`, `"System: Steve joined"`), which is also how the role
//! of an entry is recovered on load.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Cap for ephemeral per-player ad-hoc chat.
pub const AD_HOC_HISTORY_CAP: usize = 6;

/// Cap for persisted NPC conversations and the shared server event history.
pub const NPC_HISTORY_CAP: usize = 20;

/// Who produced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// A player (or the host speaking for one).
    User,
    /// The inference endpoint.
    Assistant,
    /// A world event narrated into the history.
    System,
}

impl Role {
    /// The line marker used in persisted form.
    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::System => "System",
        }
    }

    /// The role name sent on the wire. Only assistant turns are tagged as
    /// such; everything else is presented to the model as user input.
    #[must_use]
    pub fn wire_role(self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::User | Self::System => "user",
        }
    }
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    /// Who said it.
    pub role: Role,
    /// What was said.
    pub content: String,
}

impl Utterance {
    /// Create an utterance.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Render as a marked line, e.g. `"Assistant: hello"`.
    #[must_use]
    pub fn to_marked(&self) -> String {
        format!("{}: {}", self.role.marker(), self.content)
    }

    /// Parse a marked line. Lines without a known marker are kept whole as
    /// user input rather than rejected.
    #[must_use]
    pub fn from_marked(line: &str) -> Self {
        for role in [Role::Assistant, Role::User, Role::System] {
            if let Some(rest) = line
                .strip_prefix(role.marker())
                .and_then(|r| r.strip_prefix(':'))
            {
                let content = rest.strip_prefix(' ').unwrap_or(rest);
                return Self::new(role, content);
            }
        }
        Self::new(Role::User, line)
    }
}

/// A FIFO-bounded sequence of utterances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHistory {
    cap: usize,
    entries: VecDeque<Utterance>,
}

impl ConversationHistory {
    /// Create an empty history with the given cap (minimum 1).
    #[must_use]
    pub fn with_cap(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            entries: VecDeque::with_capacity(cap),
        }
    }

    /// Empty history sized for ad-hoc chat.
    #[must_use]
    pub fn ad_hoc() -> Self {
        Self::with_cap(AD_HOC_HISTORY_CAP)
    }

    /// Empty history sized for NPC or event chat.
    #[must_use]
    pub fn npc() -> Self {
        Self::with_cap(NPC_HISTORY_CAP)
    }

    /// Rebuild a history from persisted marked lines, keeping the newest
    /// `cap` entries.
    #[must_use]
    pub fn from_marked_lines<I, S>(lines: I, cap: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut history = Self::with_cap(cap);
        for line in lines {
            history.push(Utterance::from_marked(line.as_ref()));
        }
        history
    }

    /// Persisted form, oldest first.
    #[must_use]
    pub fn to_marked_lines(&self) -> Vec<String> {
        self.entries.iter().map(Utterance::to_marked).collect()
    }

    /// Append an utterance, evicting the oldest entries beyond the cap.
    pub fn push(&mut self, utterance: Utterance) {
        self.entries.push_back(utterance);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    /// Append a user turn.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Utterance::new(Role::User, content));
    }

    /// Append an assistant turn.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Utterance::new(Role::Assistant, content));
    }

    /// Append a narrated event.
    pub fn push_system(&mut self, content: impl Into<String>) {
        self.push(Utterance::new(Role::System, content));
    }

    /// Immutable copy of the entries, oldest first. Used to hand a history
    /// to a worker without sharing the live buffer.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Utterance> {
        self.entries.iter().cloned().collect()
    }

    /// Iterate entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Utterance> {
        self.entries.iter()
    }

    /// The configured cap.
    #[must_use]
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::ad_hoc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_eviction_at_ad_hoc_cap() {
        let mut history = ConversationHistory::ad_hoc();
        for i in 0..10 {
            history.push_user(format!("msg {i}"));
        }
        assert_eq!(history.len(), AD_HOC_HISTORY_CAP);
        let first = history.iter().next().expect("non-empty");
        assert_eq!(first.content, "msg 4");
    }

    #[test]
    fn fifo_eviction_at_npc_cap() {
        let mut history = ConversationHistory::npc();
        for i in 0..25 {
            history.push_assistant(format!("reply {i}"));
        }
        assert_eq!(history.len(), NPC_HISTORY_CAP);
        let contents: Vec<_> = history.iter().map(|u| u.content.as_str()).collect();
        assert_eq!(contents.first(), Some(&"reply 5"));
        assert_eq!(contents.last(), Some(&"reply 24"));
    }

    #[test]
    fn marked_lines_recover_roles() {
        assert_eq!(
            Utterance::from_marked("Assistant: hello there"),
            Utterance::new(Role::Assistant, "hello there")
        );
        assert_eq!(
            Utterance::from_marked("System: Steve joined"),
            Utterance::new(Role::System, "Steve joined")
        );
        assert_eq!(
            Utterance::from_marked("no marker here"),
            Utterance::new(Role::User, "no marker here")
        );
    }

    #[test]
    fn wire_roles_only_tag_assistant() {
        assert_eq!(Role::Assistant.wire_role(), "assistant");
        assert_eq!(Role::User.wire_role(), "user");
        assert_eq!(Role::System.wire_role(), "user");
    }

    #[test]
    fn load_trims_to_newest_entries() {
        let lines: Vec<String> = (0..30).map(|i| format!("User: line {i}")).collect();
        let history = ConversationHistory::from_marked_lines(&lines, NPC_HISTORY_CAP);
        assert_eq!(history.len(), NPC_HISTORY_CAP);
        assert_eq!(history.to_marked_lines().first().map(String::as_str), Some("User: line 10"));
    }

    #[test]
    fn snapshot_is_detached() {
        let mut history = ConversationHistory::ad_hoc();
        history.push_user("one");
        let snap = history.snapshot();
        history.push_user("two");
        assert_eq!(snap.len(), 1);
        assert_eq!(history.len(), 2);
    }
}
