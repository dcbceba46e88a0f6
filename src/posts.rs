//! Thread and reply lifecycle: create, edit, soft delete and paging.

use metrics::increment_counter;
use tracing::{debug, info, warn};

use crate::error::{ForumError, ForumResult, Reason};
use crate::forum::Forum;
use crate::guard::{unless_elevated, PostGuard};
use crate::ledger;
use crate::models::*;
use crate::repo::{PostRepo, RepoError, Tx};

impl Forum {
    pub async fn create_thread(&self, who: &Identity, raw: &str, now: Timestamp) -> ForumResult<Pid> {
        self.ensure_can_post(who)?;
        self.ensure_interval(who, now)?;
        let content = self.sanitize(raw)?.content;

        let mut tx = self.repo.begin().await?;
        let pid = tx
            .insert_post(NewPost {
                uid: who.uid,
                time: now,
                content,
                kind: PostKind::Thread(ThreadActivity { last_activity: now, last_replier: None }),
            })
            .await?;
        ledger::adjust_all(tx.as_mut(), &ledger::thread_keys(who.uid), 1).await?;
        tx.adjust_user(who.uid, UserDelta::reward(2).posted_at(now)).await?;
        tx.commit().await?;

        increment_counter!("forum_posts_created_total", "kind" => "thread");
        info!(uid = who.uid, pid, "thread created");
        Ok(pid)
    }

    /// Replies to `quote_pid`, which may be the thread root or any editable
    /// reply inside it.
    pub async fn create_reply(&self, who: &Identity, quote_pid: Pid, raw: &str, now: Timestamp) -> ForumResult<Pid> {
        self.ensure_can_post(who)?;
        self.ensure_interval(who, now)?;
        let quote = match self.repo.resolve_quote(quote_pid).await {
            Ok(q) => q,
            Err(RepoError::NotFound) => return Err(ForumError::Forbidden(Reason::NotFound)),
            Err(e) => return Err(e.into()),
        };
        if now > quote.thread_activity + self.settings.reply_window {
            debug!(tid = quote.thread, "thread locked");
            return Err(ForumError::Forbidden(Reason::TooOld));
        }
        let content = self.sanitize(raw)?.content;

        let mut tx = self.repo.begin().await?;
        let pid = tx
            .insert_post(NewPost {
                uid: who.uid,
                time: now,
                content,
                kind: PostKind::Reply(ReplyLink { thread: quote.thread, posted_at: now, quoted: Some(quote.pid) }),
            })
            .await?;
        tx.set_thread_activity(quote.thread, ThreadActivity { last_activity: now, last_replier: Some(who.uid) })
            .await?;
        ledger::adjust(tx.as_mut(), CountKey::Thread(quote.thread), 1).await?;
        tx.adjust_user(who.uid, UserDelta::reward(1).posted_at(now)).await?;
        tx.commit().await?;

        increment_counter!("forum_posts_created_total", "kind" => "reply");
        info!(uid = who.uid, pid, tid = quote.thread, "reply created");

        if who.uid != quote.uid {
            self.notify_best_effort(quote.uid, pid).await;
        }
        Ok(pid)
    }

    /// Replaces the content of an editable post. Authors may edit within the
    /// edit window; elevated callers may edit anything.
    pub async fn edit(&self, who: &Identity, pid: Pid, raw: &str, now: Timestamp) -> ForumResult<Post> {
        self.ensure_can_post(who)?;
        let content = self.sanitize(raw)?.content;
        let elevated = self.settings.elevated_grade;
        let guard = PostGuard::new(pid, PostState::EDITABLE)
            .owned_by(unless_elevated(who, elevated, who.uid))
            .created_after(unless_elevated(who, elevated, now - self.settings.edit_window));

        let mut tx = self.repo.begin().await?;
        let Some(post) = tx.update_post_where(&guard, PostChange::Content(content)).await? else {
            debug!(uid = who.uid, pid, "edit rejected");
            return Err(ForumError::Forbidden(Reason::Denied));
        };
        tx.commit().await?;
        info!(uid = who.uid, pid, "post edited");
        Ok(post)
    }

    /// Moves an editable post to `Deleted` and unwinds its counters. A racing
    /// second delete matches nothing and reports `Gone`.
    pub async fn soft_delete(&self, who: &Identity, pid: Pid) -> ForumResult<()> {
        let guard = PostGuard::new(pid, PostState::EDITABLE)
            .owned_by(unless_elevated(who, self.settings.elevated_grade, who.uid));

        let mut tx = self.repo.begin().await?;
        let Some(post) = tx.update_post_where(&guard, PostChange::State(PostState::Deleted)).await? else {
            debug!(uid = who.uid, pid, "delete rejected");
            return Err(ForumError::Gone);
        };

        match post.kind {
            PostKind::Thread(_) => {
                ledger::adjust_all(tx.as_mut(), &ledger::thread_keys(post.uid), -1).await?;
                tx.adjust_user(post.uid, UserDelta::reward(-2)).await?;
                tx.commit().await?;
                increment_counter!("forum_posts_deleted_total", "kind" => "thread");
                info!(uid = who.uid, pid, "thread deleted");

                match self.repo.quoted_replies_in(pid).await {
                    Ok(replies) => {
                        for r in replies {
                            self.retract_best_effort(r.quote_uid, r.pid).await;
                        }
                    }
                    Err(e) => warn!(pid, "notification cleanup skipped: {e}"),
                }
            }
            PostKind::Reply(link) => {
                tx.refresh_thread_activity(link.thread).await?;
                ledger::adjust(tx.as_mut(), CountKey::Thread(link.thread), -1).await?;
                tx.adjust_user(post.uid, UserDelta::reward(-1)).await?;
                tx.commit().await?;
                increment_counter!("forum_posts_deleted_total", "kind" => "reply");
                info!(uid = who.uid, pid, tid = link.thread, "reply deleted");

                if let Some(quoted) = link.quoted {
                    match self.repo.get_post(quoted).await {
                        Ok(q) if q.uid != post.uid => self.retract_best_effort(q.uid, pid).await,
                        Ok(_) => {}
                        Err(e) => warn!(pid, "notification cleanup skipped: {e}"),
                    }
                }
            }
        }
        Ok(())
    }

    /// One page of a thread. Pages start at 1 and are clamped to the range
    /// that exists.
    pub async fn thread_page(&self, tid: Pid, page: i64, now: Timestamp) -> ForumResult<ThreadPage> {
        let thread = self.repo.get_post(tid).await?;
        let Some(activity) = thread.as_thread() else { return Err(ForumError::Gone) };
        if !thread.state.is_editable() {
            return Err(ForumError::Gone);
        }
        let total = ledger::quantity(self.repo.as_ref(), CountKey::Thread(tid)).await?.max(0);
        let size = self.page_size();
        let pages = ((total + size - 1) / size).max(1);
        let page = page.clamp(1, pages);
        let replies = self.repo.list_replies(tid, (page - 1) * size, size).await?;
        Ok(ThreadPage {
            thread,
            replies,
            page,
            pages,
            total,
            locked: now > activity.last_activity + self.settings.reply_window,
        })
    }

    /// Page of `tid` that holds the reply posted at `time`.
    pub async fn jump_page(&self, tid: Pid, time: Timestamp) -> ForumResult<i64> {
        let before = self.repo.count_replies_until(tid, time).await?;
        let size = self.page_size();
        Ok(((before + size - 1) / size).max(1))
    }
}
