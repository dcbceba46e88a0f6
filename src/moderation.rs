//! Ban and mute.

use metrics::increment_counter;
use tracing::{debug, info, warn};

use crate::error::{ForumError, ForumResult};
use crate::forum::Forum;
use crate::ledger;
use crate::models::*;
use crate::repo::{PostRepo, Tx};

/// What a ban touched, as counted inside its transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BanReport {
    pub threads: Vec<Pid>,
    pub flagged: u64,
    pub deleted: u64,
}

impl Forum {
    /// Bans `uid` and soft deletes everything they wrote, in one transaction.
    ///
    /// The target's live threads are snapshotted before any row changes:
    /// flagging and deleting rewrite the very rows that predicate reads.
    pub async fn ban(&self, moderator: &Identity, uid: Uid) -> ForumResult<BanReport> {
        self.ensure_moderator(moderator)?;

        let mut tx = self.repo.begin().await?;
        if tx.update_grade_where(uid, GradeChange::Set(Grade::BANNED), Grade::VIP).await?.is_none() {
            debug!(moderator = moderator.uid, uid, "ban target missing or privileged");
            return Err(ForumError::Gone);
        }

        let threads = tx.live_threads_by(uid).await?;
        let stray = tx.live_replies_by(uid, &threads).await?;

        let flagged = tx.flag_replies_in(&threads, uid).await?;
        ledger::adjust_all(tx.as_mut(), &ledger::thread_keys(uid), -(threads.len() as i64)).await?;
        for (tid, n) in &stray {
            ledger::adjust(tx.as_mut(), CountKey::Thread(*tid), -n).await?;
        }
        let deleted = tx.delete_posts_by(uid).await?;
        for (tid, _) in &stray {
            tx.refresh_thread_activity(*tid).await?;
        }
        tx.commit().await?;

        increment_counter!("forum_moderation_total", "action" => "ban");
        info!(moderator = moderator.uid, uid, threads = threads.len(), flagged, deleted, "user banned");

        match self.repo.quoted_replies_by(uid).await {
            Ok(replies) => {
                for r in replies {
                    self.retract_best_effort(r.quote_uid, r.pid).await;
                }
            }
            Err(e) => warn!(uid, "notification cleanup skipped: {e}"),
        }

        Ok(BanReport { threads, flagged, deleted })
    }

    /// Mutes a normal user, or lifts an existing mute.
    pub async fn toggle_mute(&self, moderator: &Identity, uid: Uid) -> ForumResult<Grade> {
        self.ensure_moderator(moderator)?;

        let mut tx = self.repo.begin().await?;
        let Some(user) = tx.update_grade_where(uid, GradeChange::ToggleMute, Grade::VIP).await? else {
            return Err(ForumError::Gone);
        };
        tx.commit().await?;

        increment_counter!("forum_moderation_total", "action" => "mute");
        info!(moderator = moderator.uid, uid, grade = user.grade.0, "mute toggled");
        Ok(user.grade)
    }
}
