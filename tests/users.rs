#![cfg(feature = "inmem-store")]

mod common;

use common::*;
use forumcore::error::ForumError;
use forumcore::models::*;

#[tokio::test]
async fn registration_normalises_mail_and_names_by_time() {
    let f = forum();
    let u = f.register("Alice@Example.org", T0).await.unwrap();
    assert_eq!(u.mail, "alice@example.org");
    assert_eq!(u.name, format!("#{T0}"));
    assert_eq!(u.grade, Grade::NORMAL);
    assert_eq!((u.credits, u.golds, u.last_time), (0, 0, 0));

    let err = f.register("alice@example.org", T0 + 1).await.unwrap_err();
    assert!(matches!(err, ForumError::Conflict));
    assert_eq!(err.code(), "data_conflict");
}

#[tokio::test]
async fn registration_validates_mail() {
    let f = forum();
    assert!(matches!(f.register("   ", T0).await, Err(ForumError::Validation("mail_empty"))));
    assert!(matches!(f.register("not a mail", T0).await, Err(ForumError::Validation("mail_illegal"))));
}

#[tokio::test]
async fn profile_update_checks_uniqueness() {
    let f = forum();
    let a = Identity::from(&f.register("a@example.org", T0).await.unwrap());
    let b = Identity::from(&f.register("b@example.org", T0 + 1).await.unwrap());

    let updated = f.update_profile(&a, "A.New@example.org", "Alice").await.unwrap();
    assert_eq!((updated.mail.as_str(), updated.name.as_str()), ("a.new@example.org", "Alice"));

    assert!(matches!(f.update_profile(&b, "b@example.org", "Alice").await, Err(ForumError::Conflict)));
    assert!(matches!(f.update_profile(&b, "a.new@example.org", "Bob").await, Err(ForumError::Conflict)));
    assert!(matches!(f.update_profile(&b, "b@example.org", "_bob").await, Err(ForumError::Validation("name_illegal"))));

    // keeping your own values is not a conflict
    f.update_profile(&a, "a.new@example.org", "Alice").await.unwrap();
}

#[tokio::test]
async fn unknown_uid_is_unauthenticated() {
    let f = forum();
    assert!(matches!(f.identify(12).await, Err(ForumError::Unauthenticated)));
}
