use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type Pid = i64;
pub type Uid = i64;
/// Unix seconds.
pub type Timestamp = i64;

/// Lifecycle state of a post. Stored as the `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum PostState {
    Live = 0,
    /// Hidden from listings but still editable, left behind by a ban cascade.
    Flagged = 1,
    /// Never assigned by the current rules.
    Reserved = 2,
    Deleted = 3,
}

impl PostState {
    /// States that may still be edited, replied to or deleted.
    pub const EDITABLE: &'static [PostState] = &[PostState::Live, PostState::Flagged];
    /// States shown in ordinary listings.
    pub const VISIBLE: &'static [PostState] = &[PostState::Live];

    pub fn code(self) -> i16 {
        self as i16
    }

    pub fn is_editable(self) -> bool {
        Self::EDITABLE.contains(&self)
    }
}

/// Row shape of the `post` table. `sort` and `clue` mean different things for
/// roots and replies, so they never leave the crate; use [`PostRow::kind`].
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub(crate) struct PostRow {
    pub pid: Pid,
    pub tid: Pid,
    pub uid: Uid,
    #[sqlx(rename = "type")]
    pub state: PostState,
    pub sort: Timestamp,
    pub clue: i64,
    pub time: Timestamp,
    pub content: String,
}

impl PostRow {
    pub fn is_root(&self) -> bool {
        self.tid == 0
    }

    pub fn kind(&self) -> PostKind {
        if self.is_root() {
            PostKind::Thread(ThreadActivity {
                last_activity: self.sort,
                last_replier: (self.clue != 0).then_some(self.clue),
            })
        } else {
            PostKind::Reply(ReplyLink {
                thread: self.tid,
                posted_at: self.sort,
                quoted: (self.clue != 0).then_some(self.clue),
            })
        }
    }

    pub fn to_post(&self) -> Post {
        Post {
            pid: self.pid,
            uid: self.uid,
            state: self.state,
            time: self.time,
            content: self.content.clone(),
            kind: self.kind(),
        }
    }
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        let kind = row.kind();
        Post { pid: row.pid, uid: row.uid, state: row.state, time: row.time, content: row.content, kind }
    }
}

/// Root-facing view: when the thread last moved and who moved it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadActivity {
    pub last_activity: Timestamp,
    pub last_replier: Option<Uid>,
}

/// Reply-facing view: owning thread, own timestamp and the post it quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyLink {
    pub thread: Pid,
    pub posted_at: Timestamp,
    pub quoted: Option<Pid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PostKind {
    Thread(ThreadActivity),
    Reply(ReplyLink),
}

/// A thread root or a reply, with the overloaded columns projected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub pid: Pid,
    pub uid: Uid,
    pub state: PostState,
    pub time: Timestamp,
    pub content: String,
    #[serde(flatten)]
    pub kind: PostKind,
}

impl Post {
    /// The thread this post belongs to (itself for a root).
    pub fn thread_pid(&self) -> Pid {
        match self.kind {
            PostKind::Thread(_) => self.pid,
            PostKind::Reply(link) => link.thread,
        }
    }

    pub fn as_thread(&self) -> Option<ThreadActivity> {
        match self.kind {
            PostKind::Thread(a) => Some(a),
            PostKind::Reply(_) => None,
        }
    }

    pub fn as_reply(&self) -> Option<ReplyLink> {
        match self.kind {
            PostKind::Reply(l) => Some(l),
            PostKind::Thread(_) => None,
        }
    }
}

/// Insert payload. `kind` decides how `sort`/`clue` get stored.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub uid: Uid,
    pub time: Timestamp,
    pub content: String,
    pub kind: PostKind,
}

impl NewPost {
    pub(crate) fn into_row(self, pid: Pid) -> PostRow {
        let (tid, sort, clue) = match self.kind {
            PostKind::Thread(a) => (0, a.last_activity, a.last_replier.unwrap_or(0)),
            PostKind::Reply(l) => (l.thread, l.posted_at, l.quoted.unwrap_or(0)),
        };
        PostRow {
            pid,
            tid,
            uid: self.uid,
            state: PostState::Live,
            sort,
            clue,
            time: self.time,
            content: self.content,
        }
    }
}

/// The quoted post of a reply together with its owning thread root,
/// resolved in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteTarget {
    pub pid: Pid,
    pub uid: Uid,
    pub thread: Pid,
    pub thread_activity: Timestamp,
}

/// A reply paired with the author of the post it quotes, for notification
/// cleanup. Only produced when the two authors differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotedReply {
    pub pid: Pid,
    pub quote_uid: Uid,
}

#[derive(Debug, Clone)]
pub enum PostChange {
    Content(String),
    State(PostState),
}

/// Key of the `count` table. Encoded into one signed column:
/// `tid` for a thread, `-uid` for an author, `0` for the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", from = "i64")]
pub enum CountKey {
    Global,
    Author(Uid),
    Thread(Pid),
}

impl CountKey {
    pub fn encode(self) -> i64 {
        match self {
            CountKey::Global => 0,
            CountKey::Author(uid) => -uid,
            CountKey::Thread(pid) => pid,
        }
    }

    pub fn decode(raw: i64) -> Self {
        match raw {
            0 => CountKey::Global,
            n if n < 0 => CountKey::Author(-n),
            n => CountKey::Thread(n),
        }
    }
}

impl From<CountKey> for i64 {
    fn from(k: CountKey) -> i64 {
        k.encode()
    }
}

impl From<i64> for CountKey {
    fn from(raw: i64) -> Self {
        CountKey::decode(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    Read = -1,
    Unread = 1,
}

impl MessageState {
    pub const ALL: &'static [MessageState] = &[MessageState::Read, MessageState::Unread];
}

/// Natural key of a reply notification. A notification has no id of its own;
/// it is found again from the reply that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageKey {
    pub recipient: Uid,
    pub state: MessageState,
    pub pid: Pid,
}

impl MessageKey {
    pub fn unread(recipient: Uid, pid: Pid) -> Self {
        Self { recipient, state: MessageState::Unread, pid }
    }
}

/// A notification joined with the reply that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub pid: Pid,
    pub thread: Pid,
    pub replier: Uid,
    pub time: Timestamp,
    pub content: String,
    pub state: MessageState,
    pub unread: bool,
}

/// Trust level. `>= 1` privileged, `0` normal, `-1` muted, `-2` banned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Grade(pub i32);

impl Grade {
    pub const BANNED: Grade = Grade(-2);
    pub const MUTED: Grade = Grade(-1);
    pub const NORMAL: Grade = Grade(0);
    pub const VIP: Grade = Grade(1);
    pub const MODERATOR: Grade = Grade(2);

    pub fn is_privileged(self) -> bool {
        self >= Grade::VIP
    }

    pub fn can_post(self) -> bool {
        self >= Grade::NORMAL
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub uid: Uid,
    pub grade: Grade,
    pub time: Timestamp,
    pub mail: String,
    pub name: String,
    pub credits: i64,
    pub golds: i64,
    pub last_time: Timestamp,
    pub last_read: Timestamp,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub mail: String,
    pub name: String,
    pub time: Timestamp,
    pub grade: Grade,
}

#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub mail: String,
    pub name: String,
}

/// Relative change applied to a user's reward counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserDelta {
    pub credits: i64,
    pub golds: i64,
    pub last_time: Option<Timestamp>,
}

impl UserDelta {
    /// Credits and golds move together.
    pub fn reward(amount: i64) -> Self {
        Self { credits: amount, golds: amount, last_time: None }
    }

    pub fn posted_at(mut self, time: Timestamp) -> Self {
        self.last_time = Some(time);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeChange {
    Set(Grade),
    /// `-1` unless already `-1`, in which case `0`.
    ToggleMute,
}

impl GradeChange {
    pub fn apply(self, current: Grade) -> Grade {
        match self {
            GradeChange::Set(g) => g,
            GradeChange::ToggleMute if current != Grade::MUTED => Grade::MUTED,
            GradeChange::ToggleMute => Grade::NORMAL,
        }
    }
}

/// Who is calling, as resolved by the auth gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: Uid,
    pub grade: Grade,
    pub last_time: Timestamp,
}

impl From<&User> for Identity {
    fn from(u: &User) -> Self {
        Self { uid: u.uid, grade: u.grade, last_time: u.last_time }
    }
}

/// Preview of the post a reply quotes, shown next to it in a thread page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotePreview {
    pub pid: Pid,
    pub uid: Uid,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyEntry {
    #[serde(flatten)]
    pub post: Post,
    pub quote: Option<QuotePreview>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadPage {
    pub thread: Post,
    pub replies: Vec<ReplyEntry>,
    pub page: i64,
    pub pages: i64,
    pub total: i64,
    pub locked: bool,
}
