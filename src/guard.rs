//! Permission predicates that travel into the store.
//!
//! A guard is evaluated by the store as part of the very statement that
//! mutates the row, so "not found", "wrong owner", "wrong state" and "window
//! expired" all surface as zero affected rows.

use crate::models::{Grade, Identity, Pid, PostRow, PostState, Timestamp, Uid};

/// `IsAdmin(identity, elevated, self)`: elevated callers skip `cond`,
/// everyone else must also satisfy it. `None` means "no extra condition".
pub fn unless_elevated<T>(who: &Identity, elevated: Grade, cond: T) -> Option<T> {
    if who.grade >= elevated { None } else { Some(cond) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostGuard {
    pub pid: Pid,
    pub states: &'static [PostState],
    /// Row must be authored by this uid.
    pub owner: Option<Uid>,
    /// Row `time` must be strictly greater than this.
    pub created_after: Option<Timestamp>,
}

impl PostGuard {
    pub fn new(pid: Pid, states: &'static [PostState]) -> Self {
        Self { pid, states, owner: None, created_after: None }
    }

    pub fn owned_by(mut self, owner: Option<Uid>) -> Self {
        self.owner = owner;
        self
    }

    pub fn created_after(mut self, limit: Option<Timestamp>) -> Self {
        self.created_after = limit;
        self
    }

    /// In-memory evaluation; the Postgres store renders the same predicate
    /// into its WHERE clause.
    pub(crate) fn matches(&self, row: &PostRow) -> bool {
        row.pid == self.pid
            && self.states.contains(&row.state)
            && self.owner.map_or(true, |uid| row.uid == uid)
            && self.created_after.map_or(true, |t| row.time > t)
    }

    pub(crate) fn state_codes(&self) -> Vec<i16> {
        self.states.iter().map(|s| s.code()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(uid: Uid, time: Timestamp, state: PostState) -> PostRow {
        PostRow { pid: 5, tid: 0, uid, state, sort: time, clue: 0, time, content: String::new() }
    }

    #[test]
    fn elevated_callers_drop_conditions() {
        let admin = Identity { uid: 1, grade: Grade::MODERATOR, last_time: 0 };
        let user = Identity { uid: 2, grade: Grade::NORMAL, last_time: 0 };
        assert_eq!(unless_elevated(&admin, Grade::MODERATOR, 2), None);
        assert_eq!(unless_elevated(&user, Grade::MODERATOR, 2), Some(2));
    }

    #[test]
    fn guard_checks_every_clause() {
        let g = PostGuard::new(5, PostState::EDITABLE).owned_by(Some(2)).created_after(Some(100));
        assert!(g.matches(&row(2, 101, PostState::Live)));
        assert!(g.matches(&row(2, 101, PostState::Flagged)));
        assert!(!g.matches(&row(3, 101, PostState::Live)));
        assert!(!g.matches(&row(2, 100, PostState::Live)));
        assert!(!g.matches(&row(2, 101, PostState::Deleted)));
    }
}
