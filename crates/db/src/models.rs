use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub type UserId = i64;
pub type GroupId = i64;
pub type BookId = i64;
pub type PostId = i64;
pub type CommentId = i64;

/// Account mirrored from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub date_joined: OffsetDateTime,
}

impl User {
    /// Full name when one is known, otherwise the username.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl NewUser {
    pub fn named(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }
}

/// Slugs are non-empty runs of ASCII letters, digits, `-` and `_`.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Topic community posts may be filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub id: GroupId,
    /// Title shown in listings
    pub title: String,
    /// URL-safe unique key
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

/// Book that posts can be written about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    pub id: BookId,
    /// Title of the book
    pub title: String,
    /// Free-text name of whoever wrote the book
    pub author_book: String,
    pub description: String,
    /// Stored image path relative to the media root
    pub image: Option<String>,
    /// User that created the record, if still present
    pub created_by: Option<UserId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author_book: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub created_by: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: PostId,
    pub text: String,
    /// Set once at creation
    pub pub_date: OffsetDateTime,
    pub author: UserId,
    pub group: Option<GroupId>,
    pub book: Option<BookId>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub text: String,
    pub author: UserId,
    pub group: Option<GroupId>,
    pub book: Option<BookId>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub text: String,
    /// Set once at creation
    pub created: OffsetDateTime,
    pub author: UserId,
    pub post: Option<PostId>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub text: String,
    pub author: UserId,
    pub post: PostId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str) -> User {
        User {
            id: 1,
            username: "leo".to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            date_joined: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn display_name_prefers_full_name() {
        assert_eq!(user("Leo", "Tolstoy").display_name(), "Leo Tolstoy");
        assert_eq!(user("Leo", "").display_name(), "Leo");
    }

    #[test]
    fn slug_rules() {
        assert!(is_valid_slug("rust-lang_2024"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("two words"));
        assert!(!is_valid_slug("кириллица"));
    }

    #[test]
    fn display_name_falls_back_to_username() {
        assert_eq!(user("", " ").display_name(), "leo");
    }
}
