use async_trait::async_trait;

use crate::guard::PostGuard;
use crate::models::*;

#[cfg(feature = "inmem-store")]
pub mod inmem;
#[cfg(feature = "postgres-store")]
pub mod pg;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// One all-or-nothing unit of work. Dropping it without [`Tx::commit`]
/// discards every change made through it.
#[async_trait]
pub trait Tx: Send {
    /// Inserts a live post and returns its new pid.
    async fn insert_post(&mut self, new: NewPost) -> RepoResult<Pid>;
    async fn set_thread_activity(&mut self, tid: Pid, activity: ThreadActivity) -> RepoResult<()>;
    /// Points the root at its newest live reply, or back at itself when none
    /// is left.
    async fn refresh_thread_activity(&mut self, tid: Pid) -> RepoResult<()>;
    /// Upserts `quantity = delta` or adds `delta` to the stored value.
    async fn adjust_count(&mut self, key: CountKey, delta: i64) -> RepoResult<()>;
    async fn adjust_user(&mut self, uid: Uid, delta: UserDelta) -> RepoResult<()>;
    /// Applies `change` only where `guard` holds and returns the updated row,
    /// or `None` when nothing matched.
    async fn update_post_where(&mut self, guard: &PostGuard, change: PostChange) -> RepoResult<Option<Post>>;
    /// Editable thread roots authored by `uid`.
    async fn live_threads_by(&mut self, uid: Uid) -> RepoResult<Vec<Pid>>;
    /// Editable replies by `uid` grouped per thread, skipping `excluded`
    /// threads. Returns `(tid, replies)`.
    async fn live_replies_by(&mut self, uid: Uid, excluded: &[Pid]) -> RepoResult<Vec<(Pid, i64)>>;
    /// Flags other users' live replies inside `threads`.
    async fn flag_replies_in(&mut self, threads: &[Pid], except: Uid) -> RepoResult<u64>;
    /// Deletes every editable post authored by `uid`.
    async fn delete_posts_by(&mut self, uid: Uid) -> RepoResult<u64>;
    /// Changes the grade of `uid` only while it is below `below`.
    async fn update_grade_where(&mut self, uid: Uid, change: GradeChange, below: Grade) -> RepoResult<Option<User>>;
    async fn commit(self: Box<Self>) -> RepoResult<()>;
}

#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn begin(&self) -> RepoResult<Box<dyn Tx>>;
    async fn get_post(&self, pid: Pid) -> RepoResult<Post>;
    /// Resolves the quoted post and its thread root in one read. The quoted
    /// post must be editable.
    async fn resolve_quote(&self, pid: Pid) -> RepoResult<QuoteTarget>;
    /// Replies of `tid` in any state whose quoted post has another author.
    async fn quoted_replies_in(&self, tid: Pid) -> RepoResult<Vec<QuotedReply>>;
    /// Replies by `uid` in any state whose quoted post has another author.
    async fn quoted_replies_by(&self, uid: Uid) -> RepoResult<Vec<QuotedReply>>;
    /// Live replies of `tid` in time order.
    async fn list_replies(&self, tid: Pid, offset: i64, limit: i64) -> RepoResult<Vec<ReplyEntry>>;
    /// Live replies of `tid` posted at or before `time`.
    async fn count_replies_until(&self, tid: Pid, time: Timestamp) -> RepoResult<i64>;
}

#[async_trait]
pub trait CountRepo: Send + Sync {
    /// Stored quantity, `0` when the row was never created.
    async fn count(&self, key: CountKey) -> RepoResult<i64>;
}

#[async_trait]
pub trait MessageRepo: Send + Sync {
    /// Inserting an existing key is a no-op.
    async fn add_message(&self, key: MessageKey) -> RepoResult<()>;
    async fn remove_messages(&self, recipient: Uid, pid: Pid, states: &[MessageState]) -> RepoResult<u64>;
    async fn set_message_state(&self, recipient: Uid, pid: Pid, from: MessageState, to: MessageState) -> RepoResult<bool>;
    /// Newest first, optionally only replies older than `before`.
    async fn list_messages(&self, recipient: Uid, before: Option<Timestamp>, limit: i64) -> RepoResult<Vec<(MessageKey, Post)>>;
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_user(&self, uid: Uid) -> RepoResult<User>;
    async fn create_user(&self, new: NewUser) -> RepoResult<User>;
    async fn update_profile(&self, uid: Uid, upd: ProfileUpdate) -> RepoResult<User>;
    async fn set_last_read(&self, uid: Uid, time: Timestamp) -> RepoResult<()>;
}

pub trait Repo: PostRepo + CountRepo + MessageRepo + UserRepo {}

impl<T> Repo for T where T: PostRepo + CountRepo + MessageRepo + UserRepo {}
