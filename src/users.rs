//! Registration and profile changes. Credentials are handled elsewhere.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::error::{ForumError, ForumResult};
use crate::forum::Forum;
use crate::models::*;
use crate::repo::UserRepo;

const MAIL_MAX: usize = 320;
const NAME_MAX: usize = 20;

static MAIL_RE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"));
static NAME_RE: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"^[\p{L}][\p{L}\p{N}_-]*$"));

fn is_match(re: &Lazy<Result<Regex, regex::Error>>, input: &str) -> bool {
    match &**re {
        Ok(re) => re.is_match(input),
        Err(_) => false,
    }
}

pub fn check_mail(mail: &str) -> ForumResult<String> {
    let mail = mail.trim().to_lowercase();
    if mail.is_empty() {
        return Err(ForumError::Validation("mail_empty"));
    }
    if mail.chars().count() > MAIL_MAX {
        return Err(ForumError::Validation("mail_too_long"));
    }
    if !is_match(&MAIL_RE, &mail) {
        return Err(ForumError::Validation("mail_illegal"));
    }
    Ok(mail)
}

pub fn check_name(name: &str) -> ForumResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ForumError::Validation("name_empty"));
    }
    if name.chars().count() > NAME_MAX {
        return Err(ForumError::Validation("name_too_long"));
    }
    if !is_match(&NAME_RE, name) {
        return Err(ForumError::Validation("name_illegal"));
    }
    Ok(name.to_string())
}

impl Forum {
    /// Creates a normal user named `#<now>` until they pick a name.
    pub async fn register(&self, mail: &str, now: Timestamp) -> ForumResult<User> {
        let mail = check_mail(mail)?;
        let user = self
            .repo
            .create_user(NewUser { mail, name: format!("#{now}"), time: now, grade: Grade::NORMAL })
            .await?;
        info!(uid = user.uid, "user registered");
        Ok(user)
    }

    pub async fn update_profile(&self, who: &Identity, mail: &str, name: &str) -> ForumResult<User> {
        let upd = ProfileUpdate { mail: check_mail(mail)?, name: check_name(name)? };
        let user = self.repo.update_profile(who.uid, upd).await?;
        info!(uid = user.uid, "profile updated");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mail_rules() {
        assert_eq!(check_mail(" Ann@Example.ORG ").unwrap(), "ann@example.org");
        assert!(matches!(check_mail(""), Err(ForumError::Validation("mail_empty"))));
        assert!(matches!(check_mail("no-at-sign"), Err(ForumError::Validation("mail_illegal"))));
        let long = format!("{}@example.org", "a".repeat(320));
        assert!(matches!(check_mail(&long), Err(ForumError::Validation("mail_too_long"))));
    }

    #[test]
    fn name_rules() {
        assert_eq!(check_name("Zoë_2").unwrap(), "Zoë_2");
        assert!(matches!(check_name("2fast"), Err(ForumError::Validation("name_illegal"))));
        assert!(matches!(check_name("a b"), Err(ForumError::Validation("name_illegal"))));
        assert!(matches!(check_name(&"x".repeat(21)), Err(ForumError::Validation("name_too_long"))));
        assert!(matches!(check_name("  "), Err(ForumError::Validation("name_empty"))));
    }
}
