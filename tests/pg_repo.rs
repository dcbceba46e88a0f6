#![cfg(feature = "postgres-store")]

use forumcore::guard::PostGuard;
use forumcore::models::*;
use forumcore::repo::pg::PgRepo;
use forumcore::repo::{CountRepo, MessageRepo, PostRepo, Tx, UserRepo};
use serial_test::serial;
use sqlx::postgres::PgPoolOptions;

async fn pg_repo() -> Option<PgRepo> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await
        .ok()?;
    sqlx::migrate!("./migrations").run(&pool).await.ok()?;
    sqlx::query(r#"TRUNCATE post, count, message, "user" RESTART IDENTITY"#).execute(&pool).await.ok()?;
    Some(PgRepo::new(pool))
}

#[tokio::test]
#[serial]
async fn pg_transaction_and_guarded_update() {
    let Some(r) = pg_repo().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let user = r
        .create_user(NewUser { mail: "p@example.org".into(), name: "p".into(), time: 0, grade: Grade::NORMAL })
        .await
        .unwrap();

    let mut tx = r.begin().await.unwrap();
    let tid = tx
        .insert_post(NewPost {
            uid: user.uid,
            time: 100,
            content: "root".into(),
            kind: PostKind::Thread(ThreadActivity { last_activity: 100, last_replier: None }),
        })
        .await
        .unwrap();
    tx.adjust_count(CountKey::Global, 1).await.unwrap();
    tx.adjust_count(CountKey::Global, 1).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(r.count(CountKey::Global).await.unwrap(), 2);

    let mut tx = r.begin().await.unwrap();
    let stranger = PostGuard::new(tid, PostState::EDITABLE).owned_by(Some(user.uid + 1));
    assert!(tx.update_post_where(&stranger, PostChange::Content("x".into())).await.unwrap().is_none());
    let author = PostGuard::new(tid, PostState::EDITABLE).owned_by(Some(user.uid)).created_after(Some(99));
    let post = tx.update_post_where(&author, PostChange::Content("edited".into())).await.unwrap().unwrap();
    assert_eq!(post.content, "edited");
    drop(tx);

    assert_eq!(r.get_post(tid).await.unwrap().content, "root");
}

#[tokio::test]
#[serial]
async fn pg_messages_use_the_natural_key() {
    let Some(r) = pg_repo().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let key = MessageKey::unread(1, 2);
    r.add_message(key).await.unwrap();
    r.add_message(key).await.unwrap();
    assert!(r.set_message_state(1, 2, MessageState::Unread, MessageState::Read).await.unwrap());
    assert_eq!(r.remove_messages(1, 2, MessageState::ALL).await.unwrap(), 1);
}
