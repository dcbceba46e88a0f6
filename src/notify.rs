//! Reply notifications keyed by `(recipient, state, reply pid)`.

use tracing::{info, warn};

use crate::error::{ForumError, ForumResult};
use crate::forum::Forum;
use crate::models::*;
use crate::repo::{MessageRepo, RepoResult, UserRepo};

pub const MESSAGE_PAGE: i64 = 10;
pub const EXCERPT_CHARS: usize = 300;

/// First `EXCERPT_CHARS` characters of sanitized content, never ending
/// inside an HTML entity.
pub fn excerpt(content: &str) -> String {
    let Some((cut, _)) = content.char_indices().nth(EXCERPT_CHARS) else {
        return content.to_string();
    };
    let head = &content[..cut];
    match head.rfind('&') {
        Some(amp) if !head[amp..].contains(';') => head[..amp].to_string(),
        _ => head.to_string(),
    }
}

impl Forum {
    pub async fn notify_reply(&self, recipient: Uid, pid: Pid) -> RepoResult<()> {
        self.repo.add_message(MessageKey::unread(recipient, pid)).await
    }

    /// Removes the notification in both read states.
    pub async fn retract_notification(&self, recipient: Uid, pid: Pid) -> RepoResult<u64> {
        self.repo.remove_messages(recipient, pid, MessageState::ALL).await
    }

    pub(crate) async fn notify_best_effort(&self, recipient: Uid, pid: Pid) {
        if let Err(e) = self.notify_reply(recipient, pid).await {
            warn!(recipient, pid, "notification not stored: {e}");
        }
    }

    pub(crate) async fn retract_best_effort(&self, recipient: Uid, pid: Pid) {
        if let Err(e) = self.retract_notification(recipient, pid).await {
            warn!(recipient, pid, "notification not removed: {e}");
        }
    }

    /// Acknowledges everything received so far in one write.
    pub async fn mark_all_read(&self, who: &Identity, now: Timestamp) -> ForumResult<()> {
        self.repo.set_last_read(who.uid, now).await?;
        info!(uid = who.uid, "notifications cleared");
        Ok(())
    }

    pub async fn mark_read(&self, who: &Identity, pid: Pid) -> ForumResult<()> {
        if !self.repo.set_message_state(who.uid, pid, MessageState::Unread, MessageState::Read).await? {
            return Err(ForumError::Gone);
        }
        Ok(())
    }

    /// Newest notifications first; pass the `time` of the last one seen as
    /// `before` to page further back.
    pub async fn messages(&self, who: &Identity, before: Option<Timestamp>) -> ForumResult<Vec<Notification>> {
        let last_read = self.repo.get_user(who.uid).await?.last_read;
        let rows = self.repo.list_messages(who.uid, before, MESSAGE_PAGE).await?;
        Ok(rows
            .into_iter()
            .map(|(key, post)| Notification {
                pid: post.pid,
                thread: post.thread_pid(),
                replier: post.uid,
                time: post.time,
                unread: key.state == MessageState::Unread && post.time > last_read,
                state: key.state,
                content: excerpt(&post.content),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_keeps_short_text_and_whole_entities() {
        assert_eq!(excerpt("short"), "short");
        assert_eq!(excerpt(&"é".repeat(400)).chars().count(), EXCERPT_CHARS);

        let split = format!("{}&amp;tail", "x".repeat(297));
        assert_eq!(excerpt(&split), "x".repeat(297));
        let whole = format!("{}&lt;tail", "x".repeat(295));
        assert_eq!(excerpt(&whole), format!("{}&lt;t", "x".repeat(295)));
    }
}
