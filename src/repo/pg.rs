use async_trait::async_trait;
use sqlx::{Pool, Postgres, Transaction};

use super::*;

const POST_COLUMNS: &str = "pid, tid, uid, type, sort, clue, time, content";
const USER_COLUMNS: &str = "uid, grade, time, mail, name, credits, golds, last_time, last_read";

fn internal(e: sqlx::Error) -> RepoError {
    RepoError::Internal(e.to_string())
}

fn write_error(e: sqlx::Error) -> RepoError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Conflict,
        _ => internal(e),
    }
}

fn codes(states: &[PostState]) -> Vec<i16> {
    states.iter().map(|s| s.code()).collect()
}

#[derive(sqlx::FromRow)]
struct ReplyJoinRow {
    #[sqlx(flatten)]
    post: PostRow,
    quote_pid: Option<i64>,
    quote_uid: Option<i64>,
    quote_content: Option<String>,
}

#[derive(sqlx::FromRow)]
struct MessageJoinRow {
    msg_type: MessageState,
    #[sqlx(flatten)]
    post: PostRow,
}

#[derive(Clone)]
pub struct PgRepo { pool: Pool<Postgres> }

impl PgRepo {
    pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

    pub fn pool(&self) -> &Pool<Postgres> { &self.pool }
}

pub struct PgTx { tx: Transaction<'static, Postgres> }

#[async_trait]
impl Tx for PgTx {
    async fn insert_post(&mut self, new: NewPost) -> RepoResult<Pid> {
        let row = new.into_row(0);
        let pid = sqlx::query_scalar::<_, i64>(
            "INSERT INTO post (tid, uid, type, sort, clue, time, content) VALUES ($1,$2,$3,$4,$5,$6,$7) RETURNING pid",
        )
        .bind(row.tid)
        .bind(row.uid)
        .bind(row.state.code())
        .bind(row.sort)
        .bind(row.clue)
        .bind(row.time)
        .bind(&row.content)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(internal)?;
        pid.ok_or_else(|| RepoError::Internal("insert returned no pid".into()))
    }

    async fn set_thread_activity(&mut self, tid: Pid, activity: ThreadActivity) -> RepoResult<()> {
        sqlx::query("UPDATE post SET sort = $2, clue = $3 WHERE pid = $1")
            .bind(tid)
            .bind(activity.last_activity)
            .bind(activity.last_replier.unwrap_or(0))
            .execute(&mut *self.tx)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn refresh_thread_activity(&mut self, tid: Pid) -> RepoResult<()> {
        sqlx::query(r#"
            WITH last AS (
                SELECT uid, time FROM post
                WHERE type = 0 AND tid = $1
                ORDER BY time DESC, pid DESC
                LIMIT 1
            )
            UPDATE post SET
                sort = COALESCE((SELECT time FROM last), post.time),
                clue = COALESCE((SELECT uid FROM last), 0)
            WHERE pid = $1
        "#)
        .bind(tid)
        .execute(&mut *self.tx)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn adjust_count(&mut self, key: CountKey, delta: i64) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO count (uid_tid, quantity) VALUES ($1, $2)
             ON CONFLICT (uid_tid) DO UPDATE SET quantity = count.quantity + EXCLUDED.quantity",
        )
        .bind(key.encode())
        .bind(delta)
        .execute(&mut *self.tx)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn adjust_user(&mut self, uid: Uid, delta: UserDelta) -> RepoResult<()> {
        sqlx::query(
            r#"UPDATE "user" SET credits = credits + $2, golds = golds + $3, last_time = COALESCE($4, last_time) WHERE uid = $1"#,
        )
        .bind(uid)
        .bind(delta.credits)
        .bind(delta.golds)
        .bind(delta.last_time)
        .execute(&mut *self.tx)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn update_post_where(&mut self, guard: &PostGuard, change: PostChange) -> RepoResult<Option<Post>> {
        let (content, state) = match change {
            PostChange::Content(c) => (Some(c), None),
            PostChange::State(s) => (None, Some(s.code())),
        };
        let sql = format!(
            "UPDATE post SET content = COALESCE($5, content), type = COALESCE($6, type)
             WHERE pid = $1 AND type = ANY($2)
               AND ($3::BIGINT IS NULL OR uid = $3)
               AND ($4::BIGINT IS NULL OR time > $4)
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(guard.pid)
            .bind(guard.state_codes())
            .bind(guard.owner)
            .bind(guard.created_after)
            .bind(content)
            .bind(state)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(internal)?;
        Ok(row.map(Post::from))
    }

    async fn live_threads_by(&mut self, uid: Uid) -> RepoResult<Vec<Pid>> {
        sqlx::query_scalar::<_, i64>("SELECT pid FROM post WHERE uid = $1 AND tid = 0 AND type = ANY($2)")
            .bind(uid)
            .bind(codes(PostState::EDITABLE))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(internal)
    }

    async fn live_replies_by(&mut self, uid: Uid, excluded: &[Pid]) -> RepoResult<Vec<(Pid, i64)>> {
        sqlx::query_as::<_, (i64, i64)>(
            "SELECT tid, COUNT(*) FROM post
             WHERE uid = $1 AND tid <> 0 AND type = ANY($2) AND NOT (tid = ANY($3))
             GROUP BY tid ORDER BY tid",
        )
        .bind(uid)
        .bind(codes(PostState::EDITABLE))
        .bind(excluded)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(internal)
    }

    async fn flag_replies_in(&mut self, threads: &[Pid], except: Uid) -> RepoResult<u64> {
        let res = sqlx::query("UPDATE post SET type = $1 WHERE type = $2 AND tid = ANY($3) AND uid <> $4")
            .bind(PostState::Flagged.code())
            .bind(PostState::Live.code())
            .bind(threads)
            .bind(except)
            .execute(&mut *self.tx)
            .await
            .map_err(internal)?;
        Ok(res.rows_affected())
    }

    async fn delete_posts_by(&mut self, uid: Uid) -> RepoResult<u64> {
        let res = sqlx::query("UPDATE post SET type = $1 WHERE uid = $2 AND type = ANY($3)")
            .bind(PostState::Deleted.code())
            .bind(uid)
            .bind(codes(PostState::EDITABLE))
            .execute(&mut *self.tx)
            .await
            .map_err(internal)?;
        Ok(res.rows_affected())
    }

    async fn update_grade_where(&mut self, uid: Uid, change: GradeChange, below: Grade) -> RepoResult<Option<User>> {
        let set = match change {
            GradeChange::Set(g) => format!("grade = {}", g.0),
            GradeChange::ToggleMute => "grade = CASE WHEN grade <> -1 THEN -1 ELSE 0 END".to_string(),
        };
        let sql = format!(r#"UPDATE "user" SET {set} WHERE uid = $1 AND grade < $2 RETURNING {USER_COLUMNS}"#);
        sqlx::query_as::<_, User>(&sql)
            .bind(uid)
            .bind(below)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(internal)
    }

    async fn commit(self: Box<Self>) -> RepoResult<()> {
        self.tx.commit().await.map_err(internal)
    }
}

#[async_trait]
impl PostRepo for PgRepo {
    async fn begin(&self) -> RepoResult<Box<dyn Tx>> {
        let tx = self.pool.begin().await.map_err(internal)?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn get_post(&self, pid: Pid) -> RepoResult<Post> {
        let sql = format!("SELECT {POST_COLUMNS} FROM post WHERE pid = $1");
        sqlx::query_as::<_, PostRow>(&sql)
            .bind(pid)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .map(Post::from)
            .ok_or(RepoError::NotFound)
    }

    async fn resolve_quote(&self, pid: Pid) -> RepoResult<QuoteTarget> {
        let rec = sqlx::query_as::<_, (i64, i64, i64, i64)>(r#"
            SELECT q.pid, q.uid, t.pid, t.sort
            FROM post q
            JOIN post t ON t.pid = CASE WHEN q.tid = 0 THEN q.pid ELSE q.tid END
            WHERE q.pid = $1 AND q.type = ANY($2)
        "#)
        .bind(pid)
        .bind(codes(PostState::EDITABLE))
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?
        .ok_or(RepoError::NotFound)?;
        Ok(QuoteTarget { pid: rec.0, uid: rec.1, thread: rec.2, thread_activity: rec.3 })
    }

    async fn quoted_replies_in(&self, tid: Pid) -> RepoResult<Vec<QuotedReply>> {
        let recs = sqlx::query_as::<_, (i64, i64)>(
            "SELECT p.pid, q.uid FROM post p JOIN post q ON q.pid = p.clue WHERE p.tid = $1 AND p.uid <> q.uid",
        )
        .bind(tid)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;
        Ok(recs.into_iter().map(|(pid, quote_uid)| QuotedReply { pid, quote_uid }).collect())
    }

    async fn quoted_replies_by(&self, uid: Uid) -> RepoResult<Vec<QuotedReply>> {
        let recs = sqlx::query_as::<_, (i64, i64)>(
            "SELECT p.pid, q.uid FROM post p JOIN post q ON q.pid = p.clue WHERE p.uid = $1 AND p.tid <> 0 AND q.uid <> $1",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;
        Ok(recs.into_iter().map(|(pid, quote_uid)| QuotedReply { pid, quote_uid }).collect())
    }

    async fn list_replies(&self, tid: Pid, offset: i64, limit: i64) -> RepoResult<Vec<ReplyEntry>> {
        let recs = sqlx::query_as::<_, ReplyJoinRow>(r#"
            SELECT p.pid, p.tid, p.uid, p.type, p.sort, p.clue, p.time, p.content,
                   q.pid AS quote_pid, q.uid AS quote_uid, q.content AS quote_content
            FROM post p
            LEFT JOIN post q ON p.clue <> p.tid AND q.pid = p.clue AND q.type = ANY($4)
            WHERE p.type = 0 AND p.tid = $1
            ORDER BY p.time ASC, p.pid ASC
            OFFSET $2 LIMIT $3
        "#)
        .bind(tid)
        .bind(offset)
        .bind(limit)
        .bind(codes(PostState::EDITABLE))
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;
        Ok(recs
            .into_iter()
            .map(|r| {
                let quote = match (r.quote_pid, r.quote_uid, r.quote_content) {
                    (Some(pid), Some(uid), Some(content)) => Some(QuotePreview { pid, uid, content }),
                    _ => None,
                };
                ReplyEntry { post: r.post.into(), quote }
            })
            .collect())
    }

    async fn count_replies_until(&self, tid: Pid, time: Timestamp) -> RepoResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM post WHERE type = 0 AND tid = $1 AND time <= $2")
            .bind(tid)
            .bind(time)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)
    }
}

#[async_trait]
impl CountRepo for PgRepo {
    async fn count(&self, key: CountKey) -> RepoResult<i64> {
        let q = sqlx::query_scalar::<_, i64>("SELECT quantity FROM count WHERE uid_tid = $1")
            .bind(key.encode())
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        Ok(q.unwrap_or(0))
    }
}

#[async_trait]
impl MessageRepo for PgRepo {
    async fn add_message(&self, key: MessageKey) -> RepoResult<()> {
        sqlx::query("INSERT INTO message (uid, type, pid) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING")
            .bind(key.recipient)
            .bind(key.state)
            .bind(key.pid)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn remove_messages(&self, recipient: Uid, pid: Pid, states: &[MessageState]) -> RepoResult<u64> {
        let states: Vec<i16> = states.iter().map(|s| *s as i16).collect();
        let res = sqlx::query("DELETE FROM message WHERE uid = $1 AND pid = $2 AND type = ANY($3)")
            .bind(recipient)
            .bind(pid)
            .bind(states)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(res.rows_affected())
    }

    async fn set_message_state(&self, recipient: Uid, pid: Pid, from: MessageState, to: MessageState) -> RepoResult<bool> {
        let res = sqlx::query("UPDATE message SET type = $4 WHERE uid = $1 AND pid = $2 AND type = $3")
            .bind(recipient)
            .bind(pid)
            .bind(from)
            .bind(to)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_messages(&self, recipient: Uid, before: Option<Timestamp>, limit: i64) -> RepoResult<Vec<(MessageKey, Post)>> {
        let recs = sqlx::query_as::<_, MessageJoinRow>(r#"
            SELECT m.type AS msg_type, p.pid, p.tid, p.uid, p.type, p.sort, p.clue, p.time, p.content
            FROM message m
            JOIN post p ON p.pid = m.pid
            WHERE m.uid = $1 AND p.type = 0 AND ($2::BIGINT IS NULL OR p.time < $2)
            ORDER BY p.time DESC, p.pid DESC
            LIMIT $3
        "#)
        .bind(recipient)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;
        Ok(recs
            .into_iter()
            .map(|r| {
                let key = MessageKey { recipient, state: r.msg_type, pid: r.post.pid };
                (key, r.post.into())
            })
            .collect())
    }
}

#[async_trait]
impl UserRepo for PgRepo {
    async fn get_user(&self, uid: Uid) -> RepoResult<User> {
        let sql = format!(r#"SELECT {USER_COLUMNS} FROM "user" WHERE uid = $1"#);
        sqlx::query_as::<_, User>(&sql)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or(RepoError::NotFound)
    }

    async fn create_user(&self, new: NewUser) -> RepoResult<User> {
        let sql = format!(
            r#"INSERT INTO "user" (mail, name, time, grade) VALUES ($1, $2, $3, $4)
               ON CONFLICT DO NOTHING RETURNING {USER_COLUMNS}"#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&new.mail)
            .bind(&new.name)
            .bind(new.time)
            .bind(new.grade)
            .fetch_optional(&self.pool)
            .await
            .map_err(write_error)?
            .ok_or(RepoError::Conflict)
    }

    async fn update_profile(&self, uid: Uid, upd: ProfileUpdate) -> RepoResult<User> {
        let sql = format!(r#"UPDATE "user" SET mail = $2, name = $3 WHERE uid = $1 RETURNING {USER_COLUMNS}"#);
        sqlx::query_as::<_, User>(&sql)
            .bind(uid)
            .bind(&upd.mail)
            .bind(&upd.name)
            .fetch_optional(&self.pool)
            .await
            .map_err(write_error)?
            .ok_or(RepoError::NotFound)
    }

    async fn set_last_read(&self, uid: Uid, time: Timestamp) -> RepoResult<()> {
        let res = sqlx::query(r#"UPDATE "user" SET last_read = $2 WHERE uid = $1"#)
            .bind(uid)
            .bind(time)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
        Ok(())
    }
}
