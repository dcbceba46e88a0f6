use std::collections::HashMap;
use std::str::FromStr;

use crate::models::Grade;

pub const SECRET_KEY: &str = "secret_key";
pub const PAGE_SIZE_P: &str = "page_size_p";

/// Read-only key/value lookup for operational parameters.
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

impl dyn ConfigStore {
    pub fn parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn parsed_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.parsed(key).unwrap_or(default)
    }
}

/// Looks `page_size_p` up as `FORUM_PAGE_SIZE_P`.
#[derive(Clone, Debug, Default)]
pub struct EnvConfig;

impl EnvConfig {
    pub fn var_name(key: &str) -> String {
        format!("FORUM_{}", key.to_ascii_uppercase())
    }
}

impl ConfigStore for EnvConfig {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(Self::var_name(key)).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemConfig(HashMap<String, String>);

impl MemConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }
}

impl ConfigStore for MemConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Rule parameters of the posting engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Minimum seconds between two successful posts of one user.
    pub post_interval: i64,
    /// Seconds after creation during which authors may edit.
    pub edit_window: i64,
    /// Seconds after the last activity after which a thread takes no replies.
    pub reply_window: i64,
    pub min_content_len: usize,
    /// Grade at which the IsAdmin predicate passes.
    pub elevated_grade: Grade,
    pub moderator_grade: Grade,
    pub default_page_size: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            post_interval: 60,
            edit_window: 604_800,
            reply_window: 604_800,
            min_content_len: 3,
            elevated_grade: Grade::MODERATOR,
            moderator_grade: Grade::MODERATOR,
            default_page_size: 20,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        fn i64_env(name: &str, default: i64) -> i64 { std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default) }
        let d = Self::default();
        Self {
            post_interval: i64_env("FORUM_POST_INTERVAL", d.post_interval),
            edit_window: i64_env("FORUM_EDIT_WINDOW", d.edit_window),
            reply_window: i64_env("FORUM_REPLY_WINDOW", d.reply_window),
            min_content_len: i64_env("FORUM_MIN_CONTENT_LEN", d.min_content_len as i64).max(0) as usize,
            elevated_grade: Grade(i64_env("FORUM_ELEVATED_GRADE", d.elevated_grade.0 as i64) as i32),
            moderator_grade: Grade(i64_env("FORUM_MODERATOR_GRADE", d.moderator_grade.0 as i64) as i32),
            default_page_size: d.default_page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_values_fall_back() {
        let cfg: Box<dyn ConfigStore> = Box::new(MemConfig::new().with(PAGE_SIZE_P, "5").with("junk", "x"));
        assert_eq!(cfg.parsed_or::<i64>(PAGE_SIZE_P, 20), 5);
        assert_eq!(cfg.parsed_or::<i64>("junk", 20), 20);
        assert_eq!(cfg.parsed::<i64>("missing"), None);
    }

    #[test]
    fn env_names_are_prefixed() {
        assert_eq!(EnvConfig::var_name(PAGE_SIZE_P), "FORUM_PAGE_SIZE_P");
    }
}
