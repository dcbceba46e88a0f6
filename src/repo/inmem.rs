use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::{info, warn};

use super::*;

const SNAPSHOT_FILE: &str = "state.json";

#[derive(Default, Clone, Serialize, Deserialize)]
struct State {
    posts: BTreeMap<Pid, PostRow>,
    counts: HashMap<CountKey, i64>,
    messages: HashSet<MessageKey>,
    users: HashMap<Uid, User>,
    next_pid: Pid,
    next_uid: Uid,
}

impl State {
    fn latest_live_reply(&self, tid: Pid) -> Option<&PostRow> {
        self.posts
            .values()
            .filter(|p| p.tid == tid && p.state == PostState::Live)
            .max_by_key(|p| (p.time, p.pid))
    }
}

/// Process-local store. Every transaction works on a copy of the state and
/// holds the write lock until it commits or is dropped.
#[derive(Clone, Default)]
pub struct InMemRepo {
    state: Arc<RwLock<State>>,
    snapshot_path: Option<Arc<PathBuf>>,
}

impl InMemRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by a JSON snapshot under `FORUM_DATA_DIR`, when set.
    pub fn from_env() -> Self {
        match std::env::var("FORUM_DATA_DIR") {
            Ok(dir) => Self::with_snapshot(Path::new(&dir).join(SNAPSHOT_FILE)),
            Err(_) => Self::new(),
        }
    }

    pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = Self::load_state_from(&path);
        Self {
            state: Arc::new(RwLock::new(state)),
            snapshot_path: Some(Arc::new(path)),
        }
    }

    fn load_state_from(path: &Path) -> State {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                Ok(s) => {
                    info!(path = %path.display(), "loaded snapshot");
                    s
                }
                Err(e) => {
                    warn!(path = %path.display(), "failed to parse snapshot: {e}; starting empty");
                    State::default()
                }
            },
            Err(e) => {
                info!(path = %path.display(), "no snapshot ({e}); starting empty");
                State::default()
            }
        }
    }

    fn persist(path: Option<&Arc<PathBuf>>, state: &State) {
        let Some(path) = path else { return };
        match serde_json::to_vec_pretty(state) {
            Ok(bytes) => {
                if let Some(dir) = path.parent() {
                    let _ = std::fs::create_dir_all(dir);
                }
                if let Err(e) = std::fs::write(path.as_path(), bytes) {
                    warn!(path = %path.display(), "failed to write snapshot: {e}");
                }
            }
            Err(e) => warn!("failed to encode snapshot: {e}"),
        }
    }
}

pub struct InMemTx {
    guard: OwnedRwLockWriteGuard<State>,
    work: State,
    snapshot_path: Option<Arc<PathBuf>>,
}

#[async_trait]
impl Tx for InMemTx {
    async fn insert_post(&mut self, new: NewPost) -> RepoResult<Pid> {
        self.work.next_pid += 1;
        let pid = self.work.next_pid;
        self.work.posts.insert(pid, new.into_row(pid));
        Ok(pid)
    }

    async fn set_thread_activity(&mut self, tid: Pid, activity: ThreadActivity) -> RepoResult<()> {
        if let Some(root) = self.work.posts.get_mut(&tid) {
            root.sort = activity.last_activity;
            root.clue = activity.last_replier.unwrap_or(0);
        }
        Ok(())
    }

    async fn refresh_thread_activity(&mut self, tid: Pid) -> RepoResult<()> {
        let last = self.work.latest_live_reply(tid).map(|p| (p.time, p.uid));
        if let Some(root) = self.work.posts.get_mut(&tid) {
            let (sort, clue) = last.unwrap_or((root.time, 0));
            root.sort = sort;
            root.clue = clue;
        }
        Ok(())
    }

    async fn adjust_count(&mut self, key: CountKey, delta: i64) -> RepoResult<()> {
        *self.work.counts.entry(key).or_insert(0) += delta;
        Ok(())
    }

    async fn adjust_user(&mut self, uid: Uid, delta: UserDelta) -> RepoResult<()> {
        if let Some(u) = self.work.users.get_mut(&uid) {
            u.credits += delta.credits;
            u.golds += delta.golds;
            if let Some(t) = delta.last_time {
                u.last_time = t;
            }
        }
        Ok(())
    }

    async fn update_post_where(&mut self, guard: &PostGuard, change: PostChange) -> RepoResult<Option<Post>> {
        let Some(row) = self.work.posts.get_mut(&guard.pid) else { return Ok(None) };
        if !guard.matches(row) {
            return Ok(None);
        }
        match change {
            PostChange::Content(content) => row.content = content,
            PostChange::State(state) => row.state = state,
        }
        Ok(Some(row.to_post()))
    }

    async fn live_threads_by(&mut self, uid: Uid) -> RepoResult<Vec<Pid>> {
        Ok(self
            .work
            .posts
            .values()
            .filter(|p| p.uid == uid && p.is_root() && p.state.is_editable())
            .map(|p| p.pid)
            .collect())
    }

    async fn live_replies_by(&mut self, uid: Uid, excluded: &[Pid]) -> RepoResult<Vec<(Pid, i64)>> {
        let mut per_thread: BTreeMap<Pid, i64> = BTreeMap::new();
        for p in self.work.posts.values() {
            if p.uid == uid && !p.is_root() && p.state.is_editable() && !excluded.contains(&p.tid) {
                *per_thread.entry(p.tid).or_insert(0) += 1;
            }
        }
        Ok(per_thread.into_iter().collect())
    }

    async fn flag_replies_in(&mut self, threads: &[Pid], except: Uid) -> RepoResult<u64> {
        let mut n = 0;
        for p in self.work.posts.values_mut() {
            if p.state == PostState::Live && p.uid != except && threads.contains(&p.tid) {
                p.state = PostState::Flagged;
                n += 1;
            }
        }
        Ok(n)
    }

    async fn delete_posts_by(&mut self, uid: Uid) -> RepoResult<u64> {
        let mut n = 0;
        for p in self.work.posts.values_mut() {
            if p.uid == uid && p.state.is_editable() {
                p.state = PostState::Deleted;
                n += 1;
            }
        }
        Ok(n)
    }

    async fn update_grade_where(&mut self, uid: Uid, change: GradeChange, below: Grade) -> RepoResult<Option<User>> {
        match self.work.users.get_mut(&uid) {
            Some(u) if u.grade < below => {
                u.grade = change.apply(u.grade);
                Ok(Some(u.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn commit(self: Box<Self>) -> RepoResult<()> {
        let InMemTx { mut guard, work, snapshot_path } = *self;
        *guard = work;
        InMemRepo::persist(snapshot_path.as_ref(), &guard);
        Ok(())
    }
}

#[async_trait]
impl PostRepo for InMemRepo {
    async fn begin(&self) -> RepoResult<Box<dyn Tx>> {
        let guard = self.state.clone().write_owned().await;
        let work = guard.clone();
        Ok(Box::new(InMemTx { guard, work, snapshot_path: self.snapshot_path.clone() }))
    }

    async fn get_post(&self, pid: Pid) -> RepoResult<Post> {
        let s = self.state.read().await;
        s.posts.get(&pid).map(PostRow::to_post).ok_or(RepoError::NotFound)
    }

    async fn resolve_quote(&self, pid: Pid) -> RepoResult<QuoteTarget> {
        let s = self.state.read().await;
        let quote = s.posts.get(&pid).filter(|p| p.state.is_editable()).ok_or(RepoError::NotFound)?;
        let thread = if quote.is_root() { quote.pid } else { quote.tid };
        let root = s.posts.get(&thread).ok_or(RepoError::NotFound)?;
        Ok(QuoteTarget { pid: quote.pid, uid: quote.uid, thread, thread_activity: root.sort })
    }

    async fn quoted_replies_in(&self, tid: Pid) -> RepoResult<Vec<QuotedReply>> {
        let s = self.state.read().await;
        Ok(s.posts
            .values()
            .filter(|p| p.tid == tid)
            .filter_map(|p| {
                let quote = s.posts.get(&p.clue)?;
                (quote.uid != p.uid).then_some(QuotedReply { pid: p.pid, quote_uid: quote.uid })
            })
            .collect())
    }

    async fn quoted_replies_by(&self, uid: Uid) -> RepoResult<Vec<QuotedReply>> {
        let s = self.state.read().await;
        Ok(s.posts
            .values()
            .filter(|p| p.uid == uid && !p.is_root())
            .filter_map(|p| {
                let quote = s.posts.get(&p.clue)?;
                (quote.uid != p.uid).then_some(QuotedReply { pid: p.pid, quote_uid: quote.uid })
            })
            .collect())
    }

    async fn list_replies(&self, tid: Pid, offset: i64, limit: i64) -> RepoResult<Vec<ReplyEntry>> {
        let s = self.state.read().await;
        let mut replies: Vec<&PostRow> = s.posts.values().filter(|p| p.tid == tid && PostState::VISIBLE.contains(&p.state)).collect();
        replies.sort_by_key(|p| (p.time, p.pid));
        Ok(replies
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|p| {
                let quote = (p.clue != p.tid)
                    .then(|| s.posts.get(&p.clue))
                    .flatten()
                    .filter(|q| q.state.is_editable())
                    .map(|q| QuotePreview { pid: q.pid, uid: q.uid, content: q.content.clone() });
                ReplyEntry { post: p.to_post(), quote }
            })
            .collect())
    }

    async fn count_replies_until(&self, tid: Pid, time: Timestamp) -> RepoResult<i64> {
        let s = self.state.read().await;
        Ok(s.posts.values().filter(|p| p.tid == tid && p.state == PostState::Live && p.time <= time).count() as i64)
    }
}

#[async_trait]
impl CountRepo for InMemRepo {
    async fn count(&self, key: CountKey) -> RepoResult<i64> {
        let s = self.state.read().await;
        Ok(s.counts.get(&key).copied().unwrap_or(0))
    }
}

#[async_trait]
impl MessageRepo for InMemRepo {
    async fn add_message(&self, key: MessageKey) -> RepoResult<()> {
        let mut s = self.state.write().await;
        s.messages.insert(key);
        Self::persist(self.snapshot_path.as_ref(), &s);
        Ok(())
    }

    async fn remove_messages(&self, recipient: Uid, pid: Pid, states: &[MessageState]) -> RepoResult<u64> {
        let mut s = self.state.write().await;
        let removed = states
            .iter()
            .filter(|state| s.messages.remove(&MessageKey { recipient, state: **state, pid }))
            .count() as u64;
        Self::persist(self.snapshot_path.as_ref(), &s);
        Ok(removed)
    }

    async fn set_message_state(&self, recipient: Uid, pid: Pid, from: MessageState, to: MessageState) -> RepoResult<bool> {
        let mut s = self.state.write().await;
        if !s.messages.remove(&MessageKey { recipient, state: from, pid }) {
            return Ok(false);
        }
        s.messages.insert(MessageKey { recipient, state: to, pid });
        Self::persist(self.snapshot_path.as_ref(), &s);
        Ok(true)
    }

    async fn list_messages(&self, recipient: Uid, before: Option<Timestamp>, limit: i64) -> RepoResult<Vec<(MessageKey, Post)>> {
        let s = self.state.read().await;
        let mut v: Vec<(MessageKey, Post)> = s
            .messages
            .iter()
            .filter(|k| k.recipient == recipient)
            .filter_map(|k| s.posts.get(&k.pid).map(|p| (*k, p.to_post())))
            .filter(|(_, p)| p.state == PostState::Live)
            .filter(|(_, p)| before.map_or(true, |b| p.time < b))
            .collect();
        v.sort_by(|a, b| (b.1.time, b.1.pid).cmp(&(a.1.time, a.1.pid)));
        v.truncate(limit.max(0) as usize);
        Ok(v)
    }
}

#[async_trait]
impl UserRepo for InMemRepo {
    async fn get_user(&self, uid: Uid) -> RepoResult<User> {
        let s = self.state.read().await;
        s.users.get(&uid).cloned().ok_or(RepoError::NotFound)
    }

    async fn create_user(&self, new: NewUser) -> RepoResult<User> {
        let mut s = self.state.write().await;
        if s.users.values().any(|u| u.mail == new.mail || u.name == new.name) {
            return Err(RepoError::Conflict);
        }
        s.next_uid += 1;
        let user = User {
            uid: s.next_uid,
            grade: new.grade,
            time: new.time,
            mail: new.mail,
            name: new.name,
            credits: 0,
            golds: 0,
            last_time: 0,
            last_read: 0,
        };
        s.users.insert(user.uid, user.clone());
        Self::persist(self.snapshot_path.as_ref(), &s);
        Ok(user)
    }

    async fn update_profile(&self, uid: Uid, upd: ProfileUpdate) -> RepoResult<User> {
        let mut s = self.state.write().await;

        // uniqueness check before taking the mutable borrow
        if s.users.values().any(|u| u.uid != uid && (u.mail == upd.mail || u.name == upd.name)) {
            return Err(RepoError::Conflict);
        }
        let user = s.users.get_mut(&uid).ok_or(RepoError::NotFound)?;
        user.mail = upd.mail;
        user.name = upd.name;
        let updated = user.clone();
        Self::persist(self.snapshot_path.as_ref(), &s);
        Ok(updated)
    }

    async fn set_last_read(&self, uid: Uid, time: Timestamp) -> RepoResult<()> {
        let mut s = self.state.write().await;
        let user = s.users.get_mut(&uid).ok_or(RepoError::NotFound)?;
        user.last_read = time;
        Self::persist(self.snapshot_path.as_ref(), &s);
        Ok(())
    }
}
