//! Seed data loaded at startup, standing in for the administrative interface.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::models::{NewBook, NewGroup, NewUser};
use crate::repository::Repository;

/// Books in a fixtures file name their creator by username.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureBook {
    #[serde(flatten)]
    pub book: NewBook,
    #[serde(default)]
    pub created_by_username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub users: Vec<NewUser>,
    #[serde(default)]
    pub groups: Vec<NewGroup>,
    #[serde(default)]
    pub books: Vec<FixtureBook>,
}

impl Fixtures {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).context("fixtures are not valid JSON")
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixtures from {}", path.display()))?;
        Self::from_json(&raw)
    }

    /// Insert every record, users first so books can reference them.
    pub fn load_into(self, store: &dyn Repository) -> anyhow::Result<()> {
        let (users, groups, books) = (self.users.len(), self.groups.len(), self.books.len());

        for user in self.users {
            let username = user.username.clone();
            store
                .create_user(user)
                .with_context(|| format!("failed to load user '{}'", username))?;
        }
        for group in self.groups {
            let slug = group.slug.clone();
            store
                .create_group(group)
                .with_context(|| format!("failed to load group '{}'", slug))?;
        }
        for FixtureBook {
            mut book,
            created_by_username,
        } in self.books
        {
            if let Some(username) = created_by_username {
                let creator = store
                    .user_by_username(&username)
                    .with_context(|| format!("book '{}' names unknown creator", book.title))?;
                book.created_by = Some(creator.id);
            }
            let title = book.title.clone();
            store
                .create_book(book)
                .with_context(|| format!("failed to load book '{}'", title))?;
        }

        tracing::info!(users, groups, books, "fixtures loaded");
        Ok(())
    }
}
