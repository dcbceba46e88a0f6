//! Denormalised counters.
//!
//! Quantities only move by relative deltas applied inside a transaction.

use crate::models::{CountKey, Uid};
use crate::repo::{CountRepo, RepoResult, Tx};

/// Keys touched when a thread root appears or disappears.
pub fn thread_keys(author: Uid) -> [CountKey; 2] {
    [CountKey::Author(author), CountKey::Global]
}

pub async fn adjust(tx: &mut dyn Tx, key: CountKey, delta: i64) -> RepoResult<()> {
    if delta == 0 {
        return Ok(());
    }
    tx.adjust_count(key, delta).await
}

pub async fn adjust_all(tx: &mut dyn Tx, keys: &[CountKey], delta: i64) -> RepoResult<()> {
    for key in keys {
        adjust(tx, *key, delta).await?;
    }
    Ok(())
}

pub async fn quantity<R: CountRepo + ?Sized>(repo: &R, key: CountKey) -> RepoResult<i64> {
    repo.count(key).await
}
