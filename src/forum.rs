//! The posting engine. One `Forum` value is shared by every request handler;
//! its operations live in `posts`, `notify`, `moderation` and `users`.

use std::sync::Arc;

use tracing::debug;

use crate::config::{ConfigStore, MemConfig, Settings, PAGE_SIZE_P};
use crate::error::{ForumError, ForumResult, Reason};
use crate::filter::{ContentFilter, Filtered, PlainTextFilter};
use crate::models::{Identity, Timestamp, Uid};
use crate::repo::{Repo, RepoError, UserRepo};

#[derive(Clone)]
pub struct Forum {
    pub(crate) repo: Arc<dyn Repo>,
    pub(crate) filter: Arc<dyn ContentFilter>,
    pub(crate) config: Arc<dyn ConfigStore>,
    pub(crate) settings: Settings,
}

impl Forum {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self {
            repo,
            filter: Arc::new(PlainTextFilter),
            config: Arc::new(MemConfig::new()),
            settings: Settings::default(),
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn ContentFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_config(mut self, config: Arc<dyn ConfigStore>) -> Self {
        self.config = config;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn repo(&self) -> &Arc<dyn Repo> {
        &self.repo
    }

    pub fn config(&self) -> &Arc<dyn ConfigStore> {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Auth gate: turns an authenticated uid into the caller identity.
    pub async fn identify(&self, uid: Uid) -> ForumResult<Identity> {
        match self.repo.get_user(uid).await {
            Ok(user) => Ok(Identity::from(&user)),
            Err(RepoError::NotFound) => Err(ForumError::Unauthenticated),
            Err(e) => Err(e.into()),
        }
    }

    /// Replies per thread page, from `page_size_p`.
    pub fn page_size(&self) -> i64 {
        self.config.parsed_or(PAGE_SIZE_P, self.settings.default_page_size).max(1)
    }

    pub(crate) fn sanitize(&self, raw: &str) -> ForumResult<Filtered> {
        let filtered = self.filter.filter(raw).map_err(|e| {
            debug!("content rejected: {e}");
            ForumError::Validation("content_encoding")
        })?;
        if filtered.printable_len < self.settings.min_content_len {
            return Err(ForumError::Forbidden(Reason::ContentShort));
        }
        Ok(filtered)
    }

    /// Read-then-act: two concurrent posts of one user can both pass.
    pub(crate) fn ensure_interval(&self, who: &Identity, now: Timestamp) -> ForumResult<()> {
        if now - who.last_time < self.settings.post_interval {
            debug!(uid = who.uid, "posting too fast");
            return Err(ForumError::Forbidden(Reason::TooFast));
        }
        Ok(())
    }

    pub(crate) fn ensure_can_post(&self, who: &Identity) -> ForumResult<()> {
        if !who.grade.can_post() {
            return Err(ForumError::Forbidden(Reason::Muted));
        }
        Ok(())
    }

    pub(crate) fn ensure_moderator(&self, who: &Identity) -> ForumResult<()> {
        if who.grade < self.settings.moderator_grade {
            return Err(ForumError::Forbidden(Reason::Denied));
        }
        Ok(())
    }
}
