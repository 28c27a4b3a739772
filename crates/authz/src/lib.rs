//! Caller identity and the permission checks page handlers apply.
//!
//! Identity is resolved once per request from the session and passed to every
//! handler as an explicit [`Identity`] value.

use serde::Serialize;
use thebook_kernel::settings::BookEditPolicy;

/// Signed-in user as known to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

/// Who is making the current request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    User(AuthUser),
}

impl Identity {
    pub fn user(id: i64, username: impl Into<String>) -> Self {
        Self::User(AuthUser {
            id,
            username: username.into(),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::User(_))
    }

    pub fn as_user(&self) -> Option<&AuthUser> {
        match self {
            Self::User(user) => Some(user),
            Self::Anonymous => None,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.as_user().map(|u| u.id)
    }

    /// True when the caller is the given user.
    pub fn is(&self, user_id: i64) -> bool {
        self.user_id() == Some(user_id)
    }
}

/// Location of the login page carrying `next` so the visitor returns afterwards.
pub fn login_redirect(login_url: &str, next: &str) -> String {
    #[derive(Serialize)]
    struct Next<'a> {
        next: &'a str,
    }

    let separator = if login_url.contains('?') { '&' } else { '?' };
    match serde_urlencoded::to_string(Next { next }) {
        Ok(query) => format!("{login_url}{separator}{query}"),
        Err(err) => {
            tracing::warn!(%err, "could not encode login redirect target");
            login_url.to_string()
        }
    }
}

/// Only site-relative targets are honoured after login.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(target) if target.starts_with('/') && !target.starts_with("//") => target,
        _ => "/",
    }
}

/// Post edits are reserved for the post's author.
pub fn can_edit_post(identity: &Identity, author_id: i64) -> bool {
    identity.is(author_id)
}

/// Book edits follow the configured policy.
pub fn can_edit_book(
    policy: BookEditPolicy,
    identity: &Identity,
    created_by: Option<i64>,
) -> bool {
    match policy {
        BookEditPolicy::AnyAuthenticated => identity.is_authenticated(),
        BookEditPolicy::CreatorOnly => created_by.is_some_and(|creator| identity.is(creator)),
    }
}
