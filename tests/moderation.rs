#![cfg(feature = "inmem-store")]

mod common;

use common::*;
use forumcore::error::{ForumError, Reason};
use forumcore::models::*;
use forumcore::repo::{CountRepo, PostRepo, UserRepo};

#[tokio::test]
async fn ban_cascades_over_threads_replies_and_counters() {
    let f = forum();
    let m = user(&f, "mod", Grade::MODERATOR).await;
    let u = user(&f, "troll", Grade::NORMAL).await;
    let v = user(&f, "victim", Grade::NORMAL).await;
    let w = user(&f, "witness", Grade::NORMAL).await;

    let t1 = f.create_thread(&u, "troll thread", T0).await.unwrap();
    let t2 = f.create_thread(&v, "victim thread", T0).await.unwrap();
    let v_in_t1 = f.create_reply(&refresh(&f, &v).await, t1, "why though", T0 + 100).await.unwrap();
    let w_in_t2 = f.create_reply(&w, t2, "welcome", T0 + 100).await.unwrap();
    let u_in_t2 = f.create_reply(&refresh(&f, &u).await, t2, "bad take", T0 + 200).await.unwrap();

    assert_eq!(f.repo().count(CountKey::Global).await.unwrap(), 2);
    assert_eq!(f.repo().count(CountKey::Thread(t2)).await.unwrap(), 2);
    assert_eq!(f.messages(&v, None).await.unwrap().len(), 2);

    let report = f.ban(&m, u.uid).await.unwrap();
    assert_eq!(report.threads, vec![t1]);
    assert_eq!(report.flagged, 1);
    assert_eq!(report.deleted, 2);

    assert_eq!(f.repo().get_user(u.uid).await.unwrap().grade, Grade::BANNED);
    assert_eq!(f.repo().get_post(t1).await.unwrap().state, PostState::Deleted);
    assert_eq!(f.repo().get_post(u_in_t2).await.unwrap().state, PostState::Deleted);
    assert_eq!(f.repo().get_post(v_in_t1).await.unwrap().state, PostState::Flagged);
    assert_eq!(f.repo().get_post(w_in_t2).await.unwrap().state, PostState::Live);

    assert_eq!(f.repo().count(CountKey::Author(u.uid)).await.unwrap(), 0);
    assert_eq!(f.repo().count(CountKey::Global).await.unwrap(), 1);
    assert_eq!(f.repo().count(CountKey::Thread(t2)).await.unwrap(), 1);
    let t2_activity = f.repo().get_post(t2).await.unwrap().as_thread().unwrap();
    assert_eq!(t2_activity, ThreadActivity { last_activity: T0 + 100, last_replier: Some(w.uid) });

    let inbox = f.messages(&v, None).await.unwrap();
    assert_eq!(inbox.iter().map(|n| n.pid).collect::<Vec<_>>(), vec![w_in_t2]);
}

#[tokio::test]
async fn flagged_replies_stay_editable_but_hidden() {
    let f = forum();
    let m = user(&f, "mod", Grade::MODERATOR).await;
    let u = user(&f, "troll", Grade::NORMAL).await;
    let v = user(&f, "victim", Grade::NORMAL).await;

    let t1 = f.create_thread(&u, "troll thread", T0).await.unwrap();
    let reply = f.create_reply(&v, t1, "a reply", T0 + 10).await.unwrap();
    f.ban(&m, u.uid).await.unwrap();

    assert!(f.repo().list_replies(t1, 0, 10).await.unwrap().is_empty());
    let edited = f.edit(&refresh(&f, &v).await, reply, "still mine", T0 + 20).await.unwrap();
    assert_eq!(edited.state, PostState::Flagged);
}

#[tokio::test]
async fn notifications_for_flagged_replies_are_hidden() {
    let f = forum();
    let m = user(&f, "mod", Grade::MODERATOR).await;
    let u = user(&f, "troll", Grade::NORMAL).await;
    let v = user(&f, "victim", Grade::NORMAL).await;
    let w = user(&f, "witness", Grade::NORMAL).await;

    let t1 = f.create_thread(&u, "troll thread", T0).await.unwrap();
    let v_reply = f.create_reply(&v, t1, "why though", T0 + 10).await.unwrap();
    let w_reply = f.create_reply(&w, v_reply, "agreed", T0 + 20).await.unwrap();
    assert_eq!(f.messages(&v, None).await.unwrap().iter().map(|n| n.pid).collect::<Vec<_>>(), vec![w_reply]);

    f.ban(&m, u.uid).await.unwrap();
    assert_eq!(f.repo().get_post(w_reply).await.unwrap().state, PostState::Flagged);
    assert!(f.messages(&v, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn privileged_or_missing_targets_are_gone() {
    let f = forum();
    let m = user(&f, "mod", Grade::MODERATOR).await;
    let vip = user(&f, "vip", Grade::VIP).await;
    let other = user(&f, "other_mod", Grade::MODERATOR).await;

    assert!(matches!(f.ban(&m, vip.uid).await, Err(ForumError::Gone)));
    assert!(matches!(f.ban(&m, other.uid).await, Err(ForumError::Gone)));
    assert!(matches!(f.ban(&m, 9_999).await, Err(ForumError::Gone)));
    assert!(matches!(f.toggle_mute(&m, vip.uid).await, Err(ForumError::Gone)));
    assert_eq!(f.repo().get_user(vip.uid).await.unwrap().grade, Grade::VIP);
}

#[tokio::test]
async fn only_moderators_moderate() {
    let f = forum();
    let vip = user(&f, "vip", Grade::VIP).await;
    let u = user(&f, "someone", Grade::NORMAL).await;

    assert!(matches!(f.ban(&vip, u.uid).await, Err(ForumError::Forbidden(Reason::Denied))));
    assert!(matches!(f.toggle_mute(&vip, u.uid).await, Err(ForumError::Forbidden(Reason::Denied))));
    assert_eq!(f.repo().get_user(u.uid).await.unwrap().grade, Grade::NORMAL);
}

#[tokio::test]
async fn mute_toggles_and_blocks_posting() {
    let f = forum();
    let m = user(&f, "mod", Grade::MODERATOR).await;
    let u = user(&f, "chatty", Grade::NORMAL).await;

    assert_eq!(f.toggle_mute(&m, u.uid).await.unwrap(), Grade::MUTED);
    let muted = refresh(&f, &u).await;
    assert!(matches!(f.create_thread(&muted, "let me speak", T0).await, Err(ForumError::Forbidden(Reason::Muted))));

    assert_eq!(f.toggle_mute(&m, u.uid).await.unwrap(), Grade::NORMAL);
    let unmuted = refresh(&f, &u).await;
    f.create_thread(&unmuted, "thank you", T0).await.unwrap();
}

#[tokio::test]
async fn banned_users_stay_banned() {
    let f = forum();
    let m = user(&f, "mod", Grade::MODERATOR).await;
    let u = user(&f, "troll", Grade::NORMAL).await;

    f.ban(&m, u.uid).await.unwrap();
    let banned = refresh(&f, &u).await;
    assert!(matches!(f.create_thread(&banned, "i'm back", T0).await, Err(ForumError::Forbidden(Reason::Muted))));

    // a second ban still matches grade < 1 and is harmless
    let report = f.ban(&m, u.uid).await.unwrap();
    assert_eq!(report.deleted, 0);
    assert_eq!(f.repo().count(CountKey::Global).await.unwrap(), 0);
}
