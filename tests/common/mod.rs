#![allow(dead_code)]

use std::sync::Arc;

use forumcore::config::{MemConfig, PAGE_SIZE_P, SECRET_KEY};
use forumcore::models::{Grade, Identity, NewUser};
use forumcore::repo::inmem::InMemRepo;
use forumcore::repo::UserRepo;
use forumcore::Forum;

pub const T0: i64 = 1_700_000_000;
pub const SECRET: &str = "test-secret-must-be-32-bytes-long!!";

/// Fresh forum over an empty, non-persistent store.
pub fn forum() -> Forum {
    Forum::new(Arc::new(InMemRepo::new()))
        .with_config(Arc::new(MemConfig::new().with(SECRET_KEY, SECRET)))
}

pub fn forum_with_page_size(size: i64) -> Forum {
    Forum::new(Arc::new(InMemRepo::new()))
        .with_config(Arc::new(MemConfig::new().with(SECRET_KEY, SECRET).with(PAGE_SIZE_P, size)))
}

pub async fn user(forum: &Forum, name: &str, grade: Grade) -> Identity {
    let u = forum
        .repo()
        .create_user(NewUser { mail: format!("{name}@example.org"), name: name.to_string(), time: 0, grade })
        .await
        .unwrap();
    Identity::from(&u)
}

/// Re-reads the identity so `last_time` reflects earlier posts.
pub async fn refresh(forum: &Forum, who: &Identity) -> Identity {
    forum.identify(who.uid).await.unwrap()
}
